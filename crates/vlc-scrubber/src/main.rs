//! vlc-scrubber: entry point.
//!
//! Connects to a media player's remote-control interface, waits for a linear
//! touch slider and turns its readings into player commands.
//!
//! # Usage
//!
//! ```text
//! vlc-scrubber [OPTIONS]
//!
//! Options:
//!   --host <HOST>           Player host [default: localhost]
//!   --port <PORT>           Player remote-control port [default: 4212]
//!   --password <PASSWORD>   Remote-control password [default: password]
//!   --config <PATH>         TOML settings file
//!   --log-file <PATH>       Also write logs to this file
//!   --resume-delay <SECS>   Wait between release and play [default: 5]
//! ```
//!
//! Flags win over the settings file; `--host`, `--port` and `--password` can
//! also come from `VLC_SCRUBBER_HOST`, `VLC_SCRUBBER_PORT` and
//! `VLC_SCRUBBER_PASSWORD`.
//!
//! # Control input
//!
//! Standard input is read line by line.  `quit` (or Ctrl+C, or end of input)
//! shuts down cleanly.  Every other line is a device event for the in-process
//! hub; see `infrastructure::device_hub::console` for the syntax.
//!
//! # Exit codes
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | `quit`, Ctrl+C or end of input                       |
//! | 1    | could not connect or authenticate, or connection lost |
//! | 2    | invalid command-line usage                           |

use std::fs::OpenOptions;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use vlc_scrubber::application::device_session::DeviceSessionManager;
use vlc_scrubber::infrastructure::device_hub::console::{self, ControlInput};
use vlc_scrubber::infrastructure::device_hub::memory::InMemoryDeviceHub;
use vlc_scrubber::infrastructure::network::ControlChannel;
use vlc_scrubber::infrastructure::storage::config::{load_config, LoggingConfig, ScrubberConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Scrub a media player with a linear touch slider.
///
/// Every flag is optional; anything not given falls back to the settings file
/// and then to the built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "vlc-scrubber", version)]
struct Cli {
    /// Host running the player's remote-control interface.
    #[arg(long, env = "VLC_SCRUBBER_HOST")]
    host: Option<String>,

    /// Remote-control TCP port.
    #[arg(long, env = "VLC_SCRUBBER_PORT")]
    port: Option<u16>,

    /// Remote-control password, sent as the first line.
    #[arg(long, env = "VLC_SCRUBBER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// TOML settings file.  Defaults to the platform config directory.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write logs to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Seconds between lifting the finger and resuming playback.
    #[arg(long, value_name = "SECS")]
    resume_delay: Option<u64>,
}

impl Cli {
    /// Overrides the settings-file values with the flags that were given.
    fn apply_to(&self, config: &mut ScrubberConfig) {
        if let Some(host) = &self.host {
            config.player.host = host.clone();
        }
        if let Some(port) = self.port {
            config.player.port = port;
        }
        if let Some(password) = &self.password {
            config.player.password = password.clone();
        }
        if let Some(path) = &self.log_file {
            config.logging.log_file = Some(path.clone());
        }
        if let Some(secs) = self.resume_delay {
            config.device.resume_delay_secs = secs;
        }
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the configured level.  With a log file, a second
/// ANSI-free layer appends to it.
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &logging.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("could not open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

// ── Control input ─────────────────────────────────────────────────────────────

/// Reads stdin on a plain thread so a pending read never holds up runtime
/// shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Why the control loop ended.
#[derive(Debug, PartialEq, Eq)]
enum Shutdown {
    Quit,
    CtrlC,
    EndOfInput,
    ChannelLost,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `Cli::parse()` exits with status 2 and a usage message on bad flags.
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load settings")?;
    cli.apply_to(&mut config);
    init_logging(&config.logging)?;

    // ── Player connection ─────────────────────────────────────────────────────
    let channel = Arc::new(ControlChannel::new(config.channel_config()));
    info!("connecting to player at {}", channel.config().endpoint());
    if let Err(e) = channel.connect().await {
        error!("{e}");
        return Err(e).context("could not connect to the player");
    }

    // ── Device session ────────────────────────────────────────────────────────
    let hub = Arc::new(InMemoryDeviceHub::new());
    let manager = Arc::new(DeviceSessionManager::new(
        channel.clone(),
        hub.clone(),
        config.session_settings(),
    ));
    let events = manager.spawn().context("could not start the device hub")?;

    // ── Control loop ──────────────────────────────────────────────────────────
    let mut lines = spawn_stdin_reader();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let lost = manager.channel_lost();
    tokio::pin!(lost);

    let shutdown = loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    break Shutdown::EndOfInput;
                };
                match console::parse_line(&line) {
                    Ok(ControlInput::Quit) => break Shutdown::Quit,
                    Ok(input) => {
                        if let Err(e) = console::apply(&hub, input) {
                            warn!("device event rejected: {e}");
                        }
                    }
                    Err(e) => warn!("ignoring control input: {e}"),
                }
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("failed to listen for Ctrl+C: {e}");
                }
                break Shutdown::CtrlC;
            }
            () = &mut lost => break Shutdown::ChannelLost,
        }
    };
    info!("shutting down ({shutdown:?})");

    // ── Shutdown ──────────────────────────────────────────────────────────────
    // `close_all` waits for a line in flight; a player that stopped reading
    // never lets it finish.
    match tokio::time::timeout(Duration::from_secs(5), manager.close_all()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("closing the player session: {e}"),
        Err(_) => warn!("player did not take the last command in time"),
    }
    if tokio::time::timeout(Duration::from_secs(1), events).await.is_err() {
        warn!("device event pump did not stop in time");
    }

    if shutdown == Shutdown::ChannelLost {
        anyhow::bail!("lost connection to the player");
    }
    info!("vlc-scrubber stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
