//! # scrubber-core
//!
//! Shared library for VLC Scrubber containing the playback decision rules,
//! the player's text command format, and the device identity types.
//!
//! It has zero dependencies on sockets, async runtimes, or device SDKs.
//!
//! # Architecture overview (for beginners)
//!
//! VLC Scrubber turns a linear touch slider into a remote control for a
//! media player.  Touching the slider pauses playback, sliding along it seeks,
//! and letting go resumes playback a few seconds later.
//!
//! This crate (`scrubber-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – What a device *is* (`DeviceInfo`, `DeviceKind`), what it
//!   reports (`InputChange`, `SensorChange`), and what the application decides
//!   to do about each report (`PlaybackIntent`).
//!
//! - **`protocol`** – How decisions travel to the player.  The player speaks a
//!   line-oriented text protocol: a password line, a free-form greeting, then
//!   one command per line (`pause`, `play`, `seek 46%`).

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `scrubber_core::PlaybackIntent` instead of the full module path.
pub use domain::device::{
    DeviceId, DeviceInfo, DeviceKind, HubEvent, InputChange, SensorChange, SerialNumber,
    SubscriptionId,
};
pub use domain::intent::{seek_percent, IntentPolicy, PlaybackIntent};
pub use protocol::command::PlayerCommand;
