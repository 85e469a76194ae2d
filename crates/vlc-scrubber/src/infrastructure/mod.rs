//! Infrastructure layer.
//!
//! Contains the adapters that touch the outside world: the TCP control
//! channel to the player, the device hub seam, and the settings file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `scrubber_core`, but the domain in `scrubber_core` never depends on it.

pub mod device_hub;
pub mod network;
pub mod storage;
