//! Device identity and event types.
//!
//! A *device hub* (the collaborator that talks to the hardware) reports two
//! kinds of information:
//!
//! - **Lifecycle** – a device was plugged in ([`HubEvent::Attached`]) or
//!   removed ([`HubEvent::Detached`]).
//! - **Readings** – on an open device, a digital input toggled
//!   ([`InputChange`]) or an analog sensor moved ([`SensorChange`]).
//!
//! Readings are delivered per subscription; each subscription is identified by
//! an opaque [`SubscriptionId`].

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serial number printed on the device and reported by the hub.
pub type SerialNumber = u32;

/// Hub-assigned identifier of an attached device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of device the hub reports on attach.
///
/// Only one kind (normally [`DeviceKind::LinearTouch`]) is accepted by the
/// session manager; every other kind is rejected as invalid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceKind {
    /// A linear touch slider: one digital touch input plus one position sensor.
    LinearTouch,
    /// Any other device, carrying the kind name the hub reported.
    Other(String),
}

impl FromStr for DeviceKind {
    type Err = Infallible;

    /// Parses a kind name.  Case, `-`, `_` and spaces are ignored when
    /// recognising the linear touch slider, so `linear-touch`, `LinearTouch`
    /// and `LINEAR_TOUCH` all map to [`DeviceKind::LinearTouch`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        if folded == "lineartouch" {
            Ok(DeviceKind::LinearTouch)
        } else {
            Ok(DeviceKind::Other(s.trim().to_string()))
        }
    }
}

impl From<String> for DeviceKind {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<DeviceKind> for String {
    fn from(kind: DeviceKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::LinearTouch => f.write_str("linear-touch"),
            DeviceKind::Other(name) => f.write_str(name),
        }
    }
}

/// Everything the hub tells us about a device when it is plugged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Hub-assigned identifier; detach events refer to this.
    pub device_id: DeviceId,
    /// Reported device kind.
    pub kind: DeviceKind,
    /// Serial number used to open the device and subscribe to its readings.
    pub serial: SerialNumber,
    /// Product name (e.g. `"Phidget Touch Slider"`).
    pub name: String,
    /// User-assigned label; often empty.
    pub label: String,
}

impl DeviceInfo {
    /// Builds a `DeviceInfo` whose name is the kind's display name and whose
    /// label is empty.
    pub fn new(device_id: DeviceId, kind: DeviceKind, serial: SerialNumber) -> Self {
        let name = kind.to_string();
        Self {
            device_id,
            kind,
            serial,
            name,
            label: String::new(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, serial {})", self.name, self.kind, self.serial)?;
        if !self.label.is_empty() {
            write!(f, " \"{}\"", self.label)?;
        }
        Ok(())
    }
}

/// Attach/detach notifications from the device hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A device was plugged in.
    Attached(DeviceInfo),
    /// The device with this id was unplugged.
    Detached(DeviceId),
}

/// A digital input on an open device changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputChange {
    /// Input index on the device (the touch input is index 0 on a slider).
    pub index: u8,
    /// `true` when the input became active (finger down).
    pub pressed: bool,
}

/// An analog sensor on an open device reported a new raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorChange {
    /// Sensor index on the device.
    pub index: u8,
    /// Raw reading; nominally `0..=1000`.
    pub raw_value: i32,
}

/// Opaque handle for one event-stream subscription handed out by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generates a fresh random subscription id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_parses_linear_touch_spellings() {
        for spelling in ["linear-touch", "LinearTouch", "LINEAR_TOUCH", "linear touch"] {
            let kind: DeviceKind = spelling.parse().unwrap();
            assert_eq!(kind, DeviceKind::LinearTouch, "spelling {spelling:?}");
        }
    }

    #[test]
    fn test_device_kind_keeps_unknown_name() {
        let kind: DeviceKind = " interface-kit ".parse().unwrap();
        assert_eq!(kind, DeviceKind::Other("interface-kit".to_string()));
        assert_eq!(kind.to_string(), "interface-kit");
    }

    #[test]
    fn test_device_kind_deserializes_from_toml_string() {
        // Arrange
        #[derive(Deserialize)]
        struct Wrapper {
            kind: DeviceKind,
        }

        // Act
        let parsed: Wrapper = toml::from_str("kind = \"linear-touch\"").unwrap();

        // Assert
        assert_eq!(parsed.kind, DeviceKind::LinearTouch);
    }

    #[test]
    fn test_device_info_new_uses_kind_as_name() {
        let info = DeviceInfo::new(DeviceId(3), DeviceKind::LinearTouch, 12345);
        assert_eq!(info.name, "linear-touch");
        assert!(info.label.is_empty());
        assert_eq!(info.to_string(), "linear-touch (linear-touch, serial 12345)");
    }

    #[test]
    fn test_device_info_display_includes_label_when_present() {
        let mut info = DeviceInfo::new(DeviceId(1), DeviceKind::LinearTouch, 7);
        info.name = "Phidget Touch Slider".to_string();
        info.label = "scrubber".to_string();
        assert_eq!(
            info.to_string(),
            "Phidget Touch Slider (linear-touch, serial 7) \"scrubber\""
        );
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }
}
