//! TOML-based settings for vlc-scrubber.
//!
//! The settings file is optional.  Without `--config` it is looked up at the
//! platform-appropriate location:
//! - Windows:  `%APPDATA%\VlcScrubber\config.toml`
//! - Linux:    `~/.config/vlc-scrubber/config.toml`
//! - macOS:    `~/Library/Application Support/VlcScrubber/config.toml`
//!
//! ```toml
//! [player]
//! host = "localhost"
//! port = 4212
//! password = "password"
//! connect_timeout_ms = 5000
//! greeting_idle_ms = 500
//! handshake_timeout_ms = 10000
//!
//! [device]
//! expected_kind = "linear-touch"
//! touch_input_index = 0
//! resume_delay_secs = 5
//! cancel_pending_play_on_press = true
//!
//! [logging]
//! log_level = "info"
//! log_file = "vlcscrubber.log"
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "...")]`, and every section is
//! optional, so a partial file (or an empty one) fills the gaps with the
//! built-in defaults.  Command-line flags are applied on top by `main.rs`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scrubber_core::DeviceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::device_session::SessionSettings;
use crate::infrastructure::network::ChannelConfig;

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScrubberConfig {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the player's remote-control interface listens.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_password")]
    pub password: String,
    /// Limit for establishing the TCP connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Silence after which the greeting counts as finished.
    #[serde(default = "default_greeting_idle_ms")]
    pub greeting_idle_ms: u64,
    /// Limit for the whole password exchange.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Which device to drive and how its readings map to commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default = "default_expected_kind")]
    pub expected_kind: DeviceKind,
    #[serde(default)]
    pub touch_input_index: u8,
    #[serde(default = "default_resume_delay_secs")]
    pub resume_delay_secs: u64,
    #[serde(default = "default_true")]
    pub cancel_pending_play_on_press: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write logs to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    4212
}
fn default_password() -> String {
    "password".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_greeting_idle_ms() -> u64 {
    500
}
fn default_handshake_timeout_ms() -> u64 {
    10_000
}
fn default_expected_kind() -> DeviceKind {
    DeviceKind::LinearTouch
}
fn default_resume_delay_secs() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: default_password(),
            connect_timeout_ms: default_connect_timeout_ms(),
            greeting_idle_ms: default_greeting_idle_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("greeting_idle_ms", &self.greeting_idle_ms)
            .field("handshake_timeout_ms", &self.handshake_timeout_ms)
            .finish()
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            expected_kind: default_expected_kind(),
            touch_input_index: 0,
            resume_delay_secs: default_resume_delay_secs(),
            cancel_pending_play_on_press: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl ScrubberConfig {
    /// Settings for the player connection.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            host: self.player.host.clone(),
            port: self.player.port,
            password: self.player.password.clone(),
            connect_timeout: Duration::from_millis(self.player.connect_timeout_ms),
            greeting_idle: Duration::from_millis(self.player.greeting_idle_ms),
            handshake_timeout: Duration::from_millis(self.player.handshake_timeout_ms),
        }
    }

    /// Settings for the device session manager.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            expected_kind: self.device.expected_kind.clone(),
            touch_input_index: self.device.touch_input_index,
            resume_delay: Duration::from_secs(self.device.resume_delay_secs),
            cancel_pending_play_on_press: self.device.cancel_pending_play_on_press,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the settings file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default settings file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Parses settings from TOML text.
pub fn load_config_str(content: &str) -> Result<ScrubberConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Loads settings from `path`, or from [`config_file_path`] when `path` is
/// `None`.  A missing file yields [`ScrubberConfig::default()`], as does a
/// platform without a config directory when no path was given.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<ScrubberConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Ok(path) => path,
            Err(ConfigError::NoPlatformConfigDir) => return Ok(ScrubberConfig::default()),
            Err(e) => return Err(e),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => load_config_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ScrubberConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("VlcScrubber"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("vlc-scrubber"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("VlcScrubber")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
