//! Storage infrastructure: the settings file.
//!
//! The `config` sub-module reads the optional TOML settings file and turns it
//! into the runtime settings of the control channel and the session manager.
//! Nothing is ever written back.

pub mod config;
