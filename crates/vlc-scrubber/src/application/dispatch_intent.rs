//! DispatchIntentUseCase: turns playback intents into player commands.
//!
//! # Timing model
//!
//! ```text
//! Pause            ──► send "pause" on the caller's task (done before return)
//! SeekTo(n)        ──► send "seek n%" on the caller's task
//! PlayAfterDelay(d)──► spawn { sleep(d); send "play" }   (caller returns at once)
//! ```
//!
//! The resume is the only deferred command.  Running it on its own task means
//! a 5-second wait never holds up a seek or a second touch.
//!
//! # Cancellation
//!
//! With `cancel_pending_play_on_press` set, a new `Pause` cancels every resume
//! that is still sleeping, so touching the slider again inside the delay keeps
//! the player paused.  With it cleared, every release produces its own `play`.
//!
//! Only the sleep can be cancelled.  A resume whose delay has run out writes
//! its `play` to the end, and its task is never aborted, so a line is never
//! cut off halfway through a write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use scrubber_core::{PlaybackIntent, PlayerCommand};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::infrastructure::network::{CloseError, SendError};

/// Destination for player commands.
///
/// The production implementation is the TCP `ControlChannel`; tests use a
/// recording implementation.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Sends one command line.
    async fn send_command(&self, command: PlayerCommand) -> Result<(), SendError>;

    /// Releases the underlying session.
    async fn close(&self) -> Result<(), CloseError>;
}

/// A scheduled resume.
struct PendingPlay {
    /// Wakes the task out of its sleep.  The permit is stored, so a cancel
    /// that lands before the task first polls still counts.
    cancel: Arc<Notify>,
    /// Set once the delay has elapsed; from then on the `play` goes out.
    fired: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PendingPlay {
    fn is_waiting(&self) -> bool {
        !self.task.is_finished() && !self.fired.load(Ordering::SeqCst)
    }
}

/// Issues intents against a [`CommandSink`] and owns the delayed resumes.
pub struct IntentDispatcher {
    sink: Arc<dyn CommandSink>,
    cancel_pending_play_on_press: bool,
    pending_plays: Mutex<Vec<PendingPlay>>,
    channel_lost: Arc<Notify>,
}

impl IntentDispatcher {
    /// Creates a dispatcher that sends through `sink`.
    pub fn new(sink: Arc<dyn CommandSink>, cancel_pending_play_on_press: bool) -> Self {
        Self {
            sink,
            cancel_pending_play_on_press,
            pending_plays: Mutex::new(Vec::new()),
            channel_lost: Arc::new(Notify::new()),
        }
    }

    /// Carries out `intent`.
    ///
    /// Immediate intents have been written to the sink when this returns.  A
    /// delayed resume has only been scheduled.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`SendError`] for immediate intents.  Failures of a
    /// delayed resume are logged by its task.
    pub async fn dispatch(&self, intent: PlaybackIntent) -> Result<(), SendError> {
        let command = intent.command();
        if let Some(delay) = intent.delay() {
            self.schedule(command, delay);
            return Ok(());
        }

        if intent == PlaybackIntent::Pause && self.cancel_pending_play_on_press {
            let cancelled = self.cancel_pending();
            if cancelled > 0 {
                debug!("press cancelled {cancelled} pending resume(s)");
            }
        }
        info!("sending {command}");
        let result = self.sink.send_command(command).await;
        if let Err(ref e) = result {
            report_failure(command, e, &self.channel_lost);
        }
        result
    }

    fn schedule(&self, command: PlayerCommand, delay: Duration) {
        let sink = Arc::clone(&self.sink);
        let channel_lost = Arc::clone(&self.channel_lost);
        let cancel = Arc::new(Notify::new());
        let fired = Arc::new(AtomicBool::new(false));
        debug!("sending {command} in {delay:?}");

        let task = {
            let cancel = Arc::clone(&cancel);
            let fired = Arc::clone(&fired);
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    () = cancel.notified() => {
                        debug!("delayed {command} cancelled");
                        return;
                    }
                    () = time::sleep(delay) => {}
                }
                fired.store(true, Ordering::SeqCst);
                info!("sending {command}");
                if let Err(e) = sink.send_command(command).await {
                    report_failure(command, &e, &channel_lost);
                }
            })
        };

        let mut pending = self.pending_plays.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(PendingPlay::is_waiting);
        pending.push(PendingPlay {
            cancel,
            fired,
            task,
        });
    }

    /// Cancels every resume that is still waiting out its delay and returns
    /// how many were cancelled.  A resume that is already writing finishes.
    pub fn cancel_pending(&self) -> usize {
        let mut pending = self.pending_plays.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cancelled = 0;
        for play in pending.drain(..) {
            if play.is_waiting() {
                play.cancel.notify_one();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Number of resumes scheduled but not yet fired.
    pub fn pending_count(&self) -> usize {
        let mut pending = self.pending_plays.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(PendingPlay::is_waiting);
        pending.len()
    }

    /// Resolves once a send has failed with an I/O error, i.e. the player
    /// connection is gone for good.
    pub async fn channel_lost(&self) {
        self.channel_lost.notified().await;
    }

    /// Releases the sink's session.
    pub async fn close_sink(&self) -> Result<(), CloseError> {
        self.sink.close().await
    }
}

fn report_failure(command: PlayerCommand, error: &SendError, channel_lost: &Notify) {
    if error.is_fatal() {
        error!("lost connection to player while sending {command}: {error}");
        channel_lost.notify_one();
    } else {
        warn!("could not send {command}: {error}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
