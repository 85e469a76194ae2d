//! DeviceSessionUseCase: tracks the one managed slider and turns its readings
//! into player commands.
//!
//! # Slot lifecycle (for beginners)
//!
//! Only one device is driven at a time.  The slot moves through:
//!
//! ```text
//! Empty ──attach (right kind)──► Attaching ──subscribed──► Active
//!   ▲                               │                        │
//!   └────── subscribe failed ───────┘                        │
//!   └────────────── Detaching ◄──── detach (same id) ────────┘
//! ```
//!
//! - An attach of the wrong kind is rejected and the slot stays `Empty`.
//! - An attach while the slot is taken is rejected; the running device keeps
//!   the slot.
//! - `close_all` moves any state straight to `Empty` and closes the player
//!   session.
//!
//! # Event pumps
//!
//! While `Active`, the input stream and the sensor stream are each drained by
//! their own task.  The pumps hold only a `Weak` reference to the manager.
//! They are never aborted: dropping the device handle signals them to stop,
//! and each one exits after the command it is writing has gone out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use scrubber_core::{
    DeviceId, DeviceInfo, DeviceKind, HubEvent, InputChange, IntentPolicy, PlaybackIntent,
    SensorChange,
};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::dispatch_intent::{CommandSink, IntentDispatcher};
use crate::infrastructure::device_hub::{DeviceError, DeviceHub, Subscription};
use crate::infrastructure::network::{CloseError, SendError};

/// Tunables for the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Only devices of this kind are accepted.
    pub expected_kind: DeviceKind,
    /// Digital input that carries the touch state.
    pub touch_input_index: u8,
    /// Wait between release and `play`.
    pub resume_delay: Duration,
    /// Whether a press cancels resumes that have not fired yet.
    pub cancel_pending_play_on_press: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let policy = IntentPolicy::default();
        Self {
            expected_kind: DeviceKind::LinearTouch,
            touch_input_index: policy.touch_input_index,
            resume_delay: policy.resume_delay,
            cancel_pending_play_on_press: true,
        }
    }
}

impl SessionSettings {
    pub fn policy(&self) -> IntentPolicy {
        IntentPolicy {
            touch_input_index: self.touch_input_index,
            resume_delay: self.resume_delay,
        }
    }
}

/// Why an attach was refused.  None of these are fatal.
#[derive(Debug, Error)]
pub enum DeviceProtocolError {
    #[error("device {device} is a {found}, expected a {expected}")]
    UnexpectedKind {
        device: DeviceId,
        expected: DeviceKind,
        found: DeviceKind,
    },
    #[error("device {rejected} refused: slot is taken by device {occupied_by}")]
    CapacityExceeded {
        rejected: DeviceId,
        occupied_by: DeviceId,
    },
    #[error("could not open device {device}: {source}")]
    Subscribe {
        device: DeviceId,
        #[source]
        source: DeviceError,
    },
}

/// Externally visible state of the device slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Attaching,
    Active,
    Detaching,
}

/// Everything owned on behalf of the active device.  Dropping it releases
/// both subscriptions and tells the pumps to stop.
struct DeviceHandle {
    info: DeviceInfo,
    _inputs: Subscription,
    _sensors: Subscription,
    /// Dropping the sender wakes every pump's `changed()`.
    _stop: watch::Sender<()>,
    pumps: Vec<JoinHandle<()>>,
}

impl DeviceHandle {
    /// Releases the device and waits until both pumps have exited.
    async fn shut_down(self) {
        let DeviceHandle {
            info,
            _inputs: inputs,
            _sensors: sensors,
            _stop: stop,
            pumps,
        } = self;
        drop(stop);
        drop(inputs);
        drop(sensors);
        for pump in pumps {
            if let Err(e) = pump.await {
                warn!("event pump for {info} failed: {e}");
            }
        }
    }
}

enum Slot {
    Empty,
    Attaching(DeviceInfo),
    Active(DeviceHandle),
    Detaching(DeviceId),
}

impl Slot {
    fn state(&self) -> SlotState {
        match self {
            Slot::Empty => SlotState::Empty,
            Slot::Attaching(_) => SlotState::Attaching,
            Slot::Active(_) => SlotState::Active,
            Slot::Detaching(_) => SlotState::Detaching,
        }
    }

    fn device_id(&self) -> Option<DeviceId> {
        match self {
            Slot::Empty => None,
            Slot::Attaching(info) => Some(info.device_id),
            Slot::Active(handle) => Some(handle.info.device_id),
            Slot::Detaching(id) => Some(*id),
        }
    }
}

/// Owns the device slot and the intent dispatcher.
pub struct DeviceSessionManager {
    hub: Arc<dyn DeviceHub>,
    dispatcher: Arc<IntentDispatcher>,
    settings: SessionSettings,
    policy: IntentPolicy,
    slot: Mutex<Slot>,
}

impl DeviceSessionManager {
    /// Creates a manager that sends through `sink` and listens to `hub`.
    pub fn new(
        sink: Arc<dyn CommandSink>,
        hub: Arc<dyn DeviceHub>,
        settings: SessionSettings,
    ) -> Self {
        let dispatcher = IntentDispatcher::new(sink, settings.cancel_pending_play_on_press);
        Self {
            hub,
            dispatcher: Arc::new(dispatcher),
            policy: settings.policy(),
            settings,
            slot: Mutex::new(Slot::Empty),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the hub and handles attach/detach events until the hub stops.
    ///
    /// # Errors
    ///
    /// Fails only if the hub cannot be started.
    pub async fn run(self: Arc<Self>) -> Result<(), DeviceError> {
        let events = self.hub.start()?;
        self.pump_events(events).await;
        Ok(())
    }

    /// Like [`Self::run`], but starts the hub before returning so events
    /// injected right afterwards are not lost.
    pub fn spawn(self: &Arc<Self>) -> Result<JoinHandle<()>, DeviceError> {
        let events = self.hub.start()?;
        Ok(tokio::spawn(Arc::clone(self).pump_events(events)))
    }

    async fn pump_events(self: Arc<Self>, mut events: UnboundedReceiver<HubEvent>) {
        info!("waiting for devices");
        while let Some(event) = events.recv().await {
            match event {
                HubEvent::Attached(info) => {
                    if let Err(e) = self.handle_attach(info) {
                        warn!("ignoring attach: {e}");
                    }
                }
                HubEvent::Detached(device_id) => {
                    self.handle_detach(device_id);
                }
            }
        }
        debug!("device event stream closed");
    }

    /// Takes `info` into the slot and opens its streams.
    ///
    /// # Errors
    ///
    /// The attach is refused, and the slot left as it was, when the device
    /// has the wrong kind or the slot is taken.  A failed subscription
    /// returns the slot to `Empty`.
    pub fn handle_attach(self: &Arc<Self>, info: DeviceInfo) -> Result<(), DeviceProtocolError> {
        if info.kind != self.settings.expected_kind {
            return Err(DeviceProtocolError::UnexpectedKind {
                device: info.device_id,
                expected: self.settings.expected_kind.clone(),
                found: info.kind,
            });
        }

        {
            let mut slot = self.slot();
            if let Some(occupied_by) = slot.device_id() {
                return Err(DeviceProtocolError::CapacityExceeded {
                    rejected: info.device_id,
                    occupied_by,
                });
            }
            *slot = Slot::Attaching(info.clone());
        }
        info!("attaching {info}");

        let (inputs, sensors) = match self.open_device(&info) {
            Ok(streams) => streams,
            Err(source) => {
                let mut slot = self.slot();
                if matches!(&*slot, Slot::Attaching(pending) if pending.device_id == info.device_id)
                {
                    *slot = Slot::Empty;
                }
                error!("could not open {info}: {source}");
                return Err(DeviceProtocolError::Subscribe {
                    device: info.device_id,
                    source,
                });
            }
        };

        let mut slot = self.slot();
        if !matches!(&*slot, Slot::Attaching(pending) if pending.device_id == info.device_id) {
            // Detached or shut down while subscribing; the guards unsubscribe.
            debug!("{info} went away while attaching");
            return Ok(());
        }
        let (input_sub, input_rx) = inputs;
        let (sensor_sub, sensor_rx) = sensors;
        let (stop, stop_rx) = watch::channel(());
        let pumps = vec![
            tokio::spawn(pump_inputs(Arc::downgrade(self), input_rx, stop_rx.clone())),
            tokio::spawn(pump_sensors(Arc::downgrade(self), sensor_rx, stop_rx)),
        ];
        *slot = Slot::Active(DeviceHandle {
            info: info.clone(),
            _inputs: input_sub,
            _sensors: sensor_sub,
            _stop: stop,
            pumps,
        });
        info!("{info} is active");
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn open_device(
        &self,
        info: &DeviceInfo,
    ) -> Result<
        (
            (Subscription, UnboundedReceiver<InputChange>),
            (Subscription, UnboundedReceiver<SensorChange>),
        ),
        DeviceError,
    > {
        let (input_id, input_rx) = self.hub.subscribe_inputs(info.serial)?;
        let inputs = Subscription::new(Arc::clone(&self.hub), input_id);
        // On failure `inputs` is dropped here and releases the first stream.
        let (sensor_id, sensor_rx) = self.hub.subscribe_sensors(info.serial)?;
        let sensors = Subscription::new(Arc::clone(&self.hub), sensor_id);
        Ok(((inputs, input_rx), (sensors, sensor_rx)))
    }

    /// Releases the slot if `device_id` holds it.  Returns whether anything
    /// was released.
    pub fn handle_detach(&self, device_id: DeviceId) -> bool {
        let handle = {
            let mut slot = self.slot();
            if slot.device_id() != Some(device_id) {
                debug!("ignoring detach of {device_id}: not the managed device");
                return false;
            }
            match std::mem::replace(&mut *slot, Slot::Detaching(device_id)) {
                Slot::Active(handle) => Some(handle),
                _ => None,
            }
        };

        // Unsubscribing happens outside the lock.
        if let Some(handle) = handle {
            info!("detaching {}", handle.info);
            drop(handle);
        }

        let mut slot = self.slot();
        if matches!(&*slot, Slot::Detaching(id) if *id == device_id) {
            *slot = Slot::Empty;
        }
        info!("device {device_id} detached");
        true
    }

    /// Handles a digital input change of the active device.
    ///
    /// Returns the intent that was dispatched, or `None` when no device is
    /// active or the input is not the touch input.
    ///
    /// # Errors
    ///
    /// Propagates the [`SendError`] of an immediate command.
    pub async fn handle_input(
        &self,
        change: InputChange,
    ) -> Result<Option<PlaybackIntent>, SendError> {
        if self.slot_state() != SlotState::Active {
            debug!("dropping {change:?}: no active device");
            return Ok(None);
        }
        let Some(intent) = self.policy.for_input(change) else {
            debug!("ignoring input {}", change.index);
            return Ok(None);
        };
        self.dispatcher.dispatch(intent).await?;
        Ok(Some(intent))
    }

    /// Handles a sensor change of the active device; see
    /// [`Self::handle_input`].
    pub async fn handle_sensor(
        &self,
        change: SensorChange,
    ) -> Result<Option<PlaybackIntent>, SendError> {
        if self.slot_state() != SlotState::Active {
            debug!("dropping {change:?}: no active device");
            return Ok(None);
        }
        let intent = self.policy.for_sensor(change);
        self.dispatcher.dispatch(intent).await?;
        Ok(Some(intent))
    }

    pub fn slot_state(&self) -> SlotState {
        self.slot().state()
    }

    /// The device in the `Active` slot, if any.
    pub fn active_device(&self) -> Option<DeviceInfo> {
        match &*self.slot() {
            Slot::Active(handle) => Some(handle.info.clone()),
            _ => None,
        }
    }

    /// `1` while a device is active, else `0`.
    pub fn active_device_count(&self) -> usize {
        usize::from(self.slot_state() == SlotState::Active)
    }

    pub fn pending_play_count(&self) -> usize {
        self.dispatcher.pending_count()
    }

    /// Resolves once a command could not be written because the player
    /// connection broke.
    pub async fn channel_lost(&self) {
        self.dispatcher.channel_lost().await;
    }

    /// Stops the hub, releases the device, drops pending resumes and closes
    /// the player session.
    ///
    /// A command the pumps are already writing is finished before the
    /// session is closed.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`CloseError`]; everything else has been released
    /// by then regardless.
    pub async fn close_all(&self) -> Result<(), CloseError> {
        self.hub.stop();
        let released = std::mem::replace(&mut *self.slot(), Slot::Empty);
        if let Slot::Active(handle) = released {
            info!("releasing {}", handle.info);
            handle.shut_down().await;
        }
        let cancelled = self.dispatcher.cancel_pending();
        if cancelled > 0 {
            debug!("dropped {cancelled} pending resume(s)");
        }
        self.dispatcher.close_sink().await
    }
}

async fn pump_inputs(
    manager: Weak<DeviceSessionManager>,
    mut rx: UnboundedReceiver<InputChange>,
    mut stop: watch::Receiver<()>,
) {
    loop {
        let change = tokio::select! {
            biased;
            _ = stop.changed() => break,
            change = rx.recv() => match change {
                Some(change) => change,
                None => break,
            },
        };
        let Some(manager) = manager.upgrade() else {
            break;
        };
        // Send failures are reported by the dispatcher.
        let _ = manager.handle_input(change).await;
    }
}

async fn pump_sensors(
    manager: Weak<DeviceSessionManager>,
    mut rx: UnboundedReceiver<SensorChange>,
    mut stop: watch::Receiver<()>,
) {
    loop {
        let change = tokio::select! {
            biased;
            _ = stop.changed() => break,
            change = rx.recv() => match change {
                Some(change) => change,
                None => break,
            },
        };
        let Some(manager) = manager.upgrade() else {
            break;
        };
        let _ = manager.handle_sensor(change).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
