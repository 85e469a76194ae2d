//! In-process device hub.
//!
//! Events are injected through [`InMemoryDeviceHub::attach`],
//! [`InMemoryDeviceHub::detach`], [`InMemoryDeviceHub::input_changed`] and
//! [`InMemoryDeviceHub::sensor_changed`].  The binary feeds it from the
//! console; tests feed it directly.
//!
//! Readings are routed only to live subscriptions of the matching serial
//! number, exactly as a hardware hub only reports readings of open devices.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use scrubber_core::{
    DeviceId, DeviceInfo, HubEvent, InputChange, SensorChange, SerialNumber, SubscriptionId,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use super::{DeviceError, DeviceHub};

#[derive(Default)]
struct HubState {
    events: Option<UnboundedSender<HubEvent>>,
    stopped: bool,
    attached: HashMap<DeviceId, DeviceInfo>,
    inputs: HashMap<SubscriptionId, (SerialNumber, UnboundedSender<InputChange>)>,
    sensors: HashMap<SubscriptionId, (SerialNumber, UnboundedSender<SensorChange>)>,
}

impl HubState {
    fn events(&self) -> Result<&UnboundedSender<HubEvent>, DeviceError> {
        if self.stopped {
            return Err(DeviceError::Stopped);
        }
        self.events.as_ref().ok_or(DeviceError::NotStarted)
    }

    fn is_attached(&self, serial: SerialNumber) -> bool {
        self.attached.values().any(|info| info.serial == serial)
    }
}

/// A [`DeviceHub`] driven entirely by method calls.
#[derive(Default)]
pub struct InMemoryDeviceHub {
    state: Mutex<HubState>,
}

impl InMemoryDeviceHub {
    /// Creates a hub with no attached devices.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports a device as plugged in.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotStarted`] / [`DeviceError::Stopped`] outside the
    /// started lifetime, [`DeviceError::DuplicateDevice`] if the id is taken.
    pub fn attach(&self, info: DeviceInfo) -> Result<(), DeviceError> {
        let mut state = self.state();
        let events = state.events()?.clone();
        if state.attached.contains_key(&info.device_id) {
            return Err(DeviceError::DuplicateDevice(info.device_id));
        }
        state.attached.insert(info.device_id, info.clone());
        let _ = events.send(HubEvent::Attached(info));
        Ok(())
    }

    /// Reports a device as unplugged.  Its open streams are closed.
    ///
    /// The detach event is delivered even for unknown ids; a real hub can race
    /// attach and detach too, and the session manager must cope.
    pub fn detach(&self, device_id: DeviceId) -> Result<(), DeviceError> {
        let mut state = self.state();
        let events = state.events()?.clone();
        if let Some(info) = state.attached.remove(&device_id) {
            state.inputs.retain(|_, (serial, _)| *serial != info.serial);
            state.sensors.retain(|_, (serial, _)| *serial != info.serial);
        }
        let _ = events.send(HubEvent::Detached(device_id));
        Ok(())
    }

    /// Delivers a digital-input change to the subscriptions of `serial`, or to
    /// every input subscription when `serial` is `None`.  Returns how many
    /// subscriptions received it.
    pub fn input_changed(&self, serial: Option<SerialNumber>, change: InputChange) -> usize {
        let state = self.state();
        let delivered = state
            .inputs
            .values()
            .filter(|(s, _)| serial.map_or(true, |wanted| wanted == *s))
            .filter(|(_, tx)| tx.send(change).is_ok())
            .count();
        debug!("input {change:?} delivered to {delivered} subscription(s)");
        delivered
    }

    /// Delivers a sensor change; see [`Self::input_changed`].
    pub fn sensor_changed(&self, serial: Option<SerialNumber>, change: SensorChange) -> usize {
        let state = self.state();
        let delivered = state
            .sensors
            .values()
            .filter(|(s, _)| serial.map_or(true, |wanted| wanted == *s))
            .filter(|(_, tx)| tx.send(change).is_ok())
            .count();
        debug!("sensor {change:?} delivered to {delivered} subscription(s)");
        delivered
    }

    /// Number of live subscriptions across both streams.
    pub fn subscription_count(&self) -> usize {
        let state = self.state();
        state.inputs.len() + state.sensors.len()
    }

    /// Devices currently reported as plugged in.
    pub fn attached_devices(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = self.state().attached.values().cloned().collect();
        devices.sort_by_key(|info| info.device_id);
        devices
    }
}

impl DeviceHub for InMemoryDeviceHub {
    fn start(&self) -> Result<UnboundedReceiver<HubEvent>, DeviceError> {
        let mut state = self.state();
        if state.stopped {
            return Err(DeviceError::Stopped);
        }
        if state.events.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(DeviceError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.events = Some(tx);
        Ok(rx)
    }

    fn subscribe_inputs(
        &self,
        serial: SerialNumber,
    ) -> Result<(SubscriptionId, UnboundedReceiver<InputChange>), DeviceError> {
        let mut state = self.state();
        state.events()?;
        if !state.is_attached(serial) {
            return Err(DeviceError::NotAttached(serial));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        state.inputs.insert(id, (serial, tx));
        Ok((id, rx))
    }

    fn subscribe_sensors(
        &self,
        serial: SerialNumber,
    ) -> Result<(SubscriptionId, UnboundedReceiver<SensorChange>), DeviceError> {
        let mut state = self.state();
        state.events()?;
        if !state.is_attached(serial) {
            return Err(DeviceError::NotAttached(serial));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        state.sensors.insert(id, (serial, tx));
        Ok((id, rx))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state();
        if state.inputs.remove(&id).is_none() {
            state.sensors.remove(&id);
        }
    }

    fn stop(&self) {
        let mut state = self.state();
        state.stopped = true;
        // Dropping the senders closes every receiver.
        state.events = None;
        state.inputs.clear();
        state.sensors.clear();
        state.attached.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use scrubber_core::DeviceKind;

    fn slider(id: u32, serial: SerialNumber) -> DeviceInfo {
        DeviceInfo::new(DeviceId(id), DeviceKind::LinearTouch, serial)
    }

    #[test]
    fn test_attach_before_start_is_rejected() {
        let hub = InMemoryDeviceHub::new();
        assert_eq!(hub.attach(slider(1, 100)), Err(DeviceError::NotStarted));
    }

    #[test]
    fn test_attach_and_detach_are_reported_in_order() {
        // Arrange
        let hub = InMemoryDeviceHub::new();
        let mut rx = hub.start().expect("start should succeed");

        // Act
        hub.attach(slider(1, 100)).unwrap();
        hub.detach(DeviceId(1)).unwrap();

        // Assert
        assert_eq!(rx.try_recv().unwrap(), HubEvent::Attached(slider(1, 100)));
        assert_eq!(rx.try_recv().unwrap(), HubEvent::Detached(DeviceId(1)));
        assert!(hub.attached_devices().is_empty());
    }

    #[test]
    fn test_start_twice_is_rejected_while_receiver_lives() {
        let hub = InMemoryDeviceHub::new();
        let rx = hub.start().unwrap();
        assert_eq!(hub.start().err(), Some(DeviceError::AlreadyStarted));

        // Once the first receiver is gone the hub can be restarted.
        drop(rx);
        assert!(hub.start().is_ok());
    }

    #[test]
    fn test_duplicate_device_id_is_rejected() {
        let hub = InMemoryDeviceHub::new();
        let _rx = hub.start().unwrap();
        hub.attach(slider(1, 100)).unwrap();
        assert_eq!(
            hub.attach(slider(1, 200)),
            Err(DeviceError::DuplicateDevice(DeviceId(1)))
        );
    }

    #[test]
    fn test_subscribe_requires_attached_serial() {
        let hub = InMemoryDeviceHub::new();
        let _rx = hub.start().unwrap();
        assert_eq!(
            hub.subscribe_inputs(100).err(),
            Some(DeviceError::NotAttached(100))
        );
    }

    #[test]
    fn test_readings_reach_only_matching_serial() {
        // Arrange
        let hub = InMemoryDeviceHub::new();
        let _rx = hub.start().unwrap();
        hub.attach(slider(1, 100)).unwrap();
        hub.attach(slider(2, 200)).unwrap();
        let (_, mut first) = hub.subscribe_sensors(100).unwrap();
        let (_, mut second) = hub.subscribe_sensors(200).unwrap();
        let change = SensorChange { index: 0, raw_value: 455 };

        // Act
        let delivered = hub.sensor_changed(Some(200), change);

        // Assert
        assert_eq!(delivered, 1);
        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv().unwrap(), change);
    }

    #[test]
    fn test_untargeted_input_reaches_every_subscription() {
        let hub = InMemoryDeviceHub::new();
        let _rx = hub.start().unwrap();
        hub.attach(slider(1, 100)).unwrap();
        let (_, mut inputs) = hub.subscribe_inputs(100).unwrap();
        let change = InputChange { index: 0, pressed: true };

        assert_eq!(hub.input_changed(None, change), 1);
        assert_eq!(inputs.try_recv().unwrap(), change);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = InMemoryDeviceHub::new();
        let _rx = hub.start().unwrap();
        hub.attach(slider(1, 100)).unwrap();
        let (id, _inputs) = hub.subscribe_inputs(100).unwrap();
        assert_eq!(hub.subscription_count(), 1);

        hub.unsubscribe(id);
        hub.unsubscribe(id);

        assert_eq!(hub.subscription_count(), 0);
        assert_eq!(hub.input_changed(None, InputChange { index: 0, pressed: true }), 0);
    }

    #[test]
    fn test_detach_closes_device_streams() {
        let hub = InMemoryDeviceHub::new();
        let _rx = hub.start().unwrap();
        hub.attach(slider(1, 100)).unwrap();
        let (_, mut sensors) = hub.subscribe_sensors(100).unwrap();

        hub.detach(DeviceId(1)).unwrap();

        assert_eq!(hub.subscription_count(), 0);
        assert!(matches!(
            sensors.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_stop_closes_event_stream_and_blocks_restart() {
        let hub = InMemoryDeviceHub::new();
        let mut rx = hub.start().unwrap();

        hub.stop();

        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(hub.start().err(), Some(DeviceError::Stopped));
        assert_eq!(hub.attach(slider(1, 100)), Err(DeviceError::Stopped));
    }
}
