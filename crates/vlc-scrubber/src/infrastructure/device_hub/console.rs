//! Console control input.
//!
//! The binary reads its control input line by line.  `quit` ends the program;
//! every other line describes a device event and is fed into the
//! [`InMemoryDeviceHub`]:
//!
//! ```text
//! attach <device-id> <kind> <serial> [name...]
//! detach <device-id>
//! input  <index> <on|off|1|0|true|false|pressed|released> [serial]
//! sensor <index> <raw-value> [serial]
//! ```
//!
//! Lines without a serial number go to every open device.

use scrubber_core::{DeviceId, DeviceInfo, DeviceKind, InputChange, SensorChange, SerialNumber};
use thiserror::Error;

use super::memory::InMemoryDeviceHub;
use super::DeviceError;

/// A parsed control-input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlInput {
    /// `quit`: stop the program.
    Quit,
    /// Empty or comment (`#`) line.
    Blank,
    Attach(DeviceInfo),
    Detach(DeviceId),
    Input {
        serial: Option<SerialNumber>,
        change: InputChange,
    },
    Sensor {
        serial: Option<SerialNumber>,
        change: SensorChange,
    },
}

/// Why a control-input line could not be understood.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseEventError {
    #[error("unknown control input {0:?}")]
    UnknownVerb(String),
    #[error("`{verb}` is missing its {field}")]
    Missing {
        verb: &'static str,
        field: &'static str,
    },
    #[error("invalid {field} {value:?}")]
    Invalid { field: &'static str, value: String },
    #[error("unexpected trailing text {0:?}")]
    Trailing(String),
}

/// Parses one line of control input.
pub fn parse_line(line: &str) -> Result<ControlInput, ParseEventError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(ControlInput::Blank);
    }
    if line == "quit" {
        return Ok(ControlInput::Quit);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    match verb {
        "attach" => {
            let device_id = DeviceId(number(words.next(), "attach", "device id")?);
            let kind: DeviceKind = match words.next() {
                Some(kind) => kind.parse().unwrap_or_else(|never| match never {}),
                None => {
                    return Err(ParseEventError::Missing {
                        verb: "attach",
                        field: "kind",
                    })
                }
            };
            let serial = number(words.next(), "attach", "serial number")?;
            let mut info = DeviceInfo::new(device_id, kind, serial);
            let name = words.collect::<Vec<_>>().join(" ");
            if !name.is_empty() {
                info.name = name;
            }
            Ok(ControlInput::Attach(info))
        }
        "detach" => {
            let device_id = DeviceId(number(words.next(), "detach", "device id")?);
            no_trailing(words)?;
            Ok(ControlInput::Detach(device_id))
        }
        "input" => {
            let index = number(words.next(), "input", "index")?;
            let pressed = match words.next() {
                Some(state) => parse_state(state)?,
                None => {
                    return Err(ParseEventError::Missing {
                        verb: "input",
                        field: "state",
                    })
                }
            };
            let serial = optional_number(words.next(), "serial number")?;
            no_trailing(words)?;
            Ok(ControlInput::Input {
                serial,
                change: InputChange { index, pressed },
            })
        }
        "sensor" => {
            let index = number(words.next(), "sensor", "index")?;
            let raw_value = number(words.next(), "sensor", "raw value")?;
            let serial = optional_number(words.next(), "serial number")?;
            no_trailing(words)?;
            Ok(ControlInput::Sensor {
                serial,
                change: SensorChange { index, raw_value },
            })
        }
        other => Err(ParseEventError::UnknownVerb(other.to_string())),
    }
}

/// Feeds a parsed line into `hub`.  `Quit` and `Blank` are no-ops here.
pub fn apply(hub: &InMemoryDeviceHub, input: ControlInput) -> Result<(), DeviceError> {
    match input {
        ControlInput::Quit | ControlInput::Blank => Ok(()),
        ControlInput::Attach(info) => hub.attach(info),
        ControlInput::Detach(device_id) => hub.detach(device_id),
        ControlInput::Input { serial, change } => {
            hub.input_changed(serial, change);
            Ok(())
        }
        ControlInput::Sensor { serial, change } => {
            hub.sensor_changed(serial, change);
            Ok(())
        }
    }
}

fn number<T: std::str::FromStr>(
    word: Option<&str>,
    verb: &'static str,
    field: &'static str,
) -> Result<T, ParseEventError> {
    let word = word.ok_or(ParseEventError::Missing { verb, field })?;
    word.parse().map_err(|_| ParseEventError::Invalid {
        field,
        value: word.to_string(),
    })
}

fn optional_number<T: std::str::FromStr>(
    word: Option<&str>,
    field: &'static str,
) -> Result<Option<T>, ParseEventError> {
    word.map(|w| {
        w.parse().map_err(|_| ParseEventError::Invalid {
            field,
            value: w.to_string(),
        })
    })
    .transpose()
}

fn parse_state(word: &str) -> Result<bool, ParseEventError> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" | "pressed" | "down" => Ok(true),
        "off" | "0" | "false" | "released" | "up" => Ok(false),
        _ => Err(ParseEventError::Invalid {
            field: "state",
            value: word.to_string(),
        }),
    }
}

fn no_trailing<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<(), ParseEventError> {
    match words.next() {
        Some(extra) => Err(ParseEventError::Trailing(extra.to_string())),
        None => Ok(()),
    }
}
