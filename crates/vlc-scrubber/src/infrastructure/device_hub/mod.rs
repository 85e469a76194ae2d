//! Device hub infrastructure.
//!
//! The hub is whatever knows about plugged-in hardware.  It reports attach and
//! detach events, and it hands out per-device subscriptions for the two
//! reading streams (digital inputs and analog sensors).
//!
//! # Subscriptions
//!
//! Each `subscribe_*` call returns an opaque [`SubscriptionId`] and a receiver.
//! The session manager wraps the id in a [`Subscription`] guard, which calls
//! [`DeviceHub::unsubscribe`] when dropped, so a device's streams are released
//! on every exit path (detach, shutdown, failed attach).
//!
//! # Testability
//!
//! The [`DeviceHub`] trait lets tests drive the session manager with
//! [`memory::InMemoryDeviceHub`] or a mockall mock instead of hardware.

use std::sync::Arc;

use scrubber_core::{HubEvent, InputChange, SensorChange, SerialNumber, SubscriptionId};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

pub mod console;
pub mod memory;

/// Error type for device hub operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// `start` was called while a previous receiver is still live.
    #[error("device hub has already been started")]
    AlreadyStarted,
    /// An event was injected before `start`.
    #[error("device hub has not been started")]
    NotStarted,
    /// The hub has been stopped.
    #[error("device hub has been stopped")]
    Stopped,
    /// No attached device has this serial number.
    #[error("no attached device with serial {0}")]
    NotAttached(SerialNumber),
    /// A device with this id is already attached.
    #[error("device {0} is already attached")]
    DuplicateDevice(scrubber_core::DeviceId),
}

/// Trait abstracting the device subsystem.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceHub: Send + Sync {
    /// Starts the hub and returns the attach/detach event stream.
    fn start(&self) -> Result<UnboundedReceiver<HubEvent>, DeviceError>;

    /// Opens the device's digital-input stream.
    fn subscribe_inputs(
        &self,
        serial: SerialNumber,
    ) -> Result<(SubscriptionId, UnboundedReceiver<InputChange>), DeviceError>;

    /// Opens the device's analog-sensor stream.
    fn subscribe_sensors(
        &self,
        serial: SerialNumber,
    ) -> Result<(SubscriptionId, UnboundedReceiver<SensorChange>), DeviceError>;

    /// Releases a subscription.  Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Stops the hub: closes the event stream and every subscription.
    fn stop(&self);
}

/// Guard that releases a hub subscription when dropped.
pub struct Subscription {
    id: SubscriptionId,
    hub: Arc<dyn DeviceHub>,
}

impl Subscription {
    /// Takes ownership of the subscription `id` on `hub`.
    pub fn new(hub: Arc<dyn DeviceHub>, id: SubscriptionId) -> Self {
        Self { id, hub }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}
