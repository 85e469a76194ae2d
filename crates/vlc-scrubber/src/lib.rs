//! vlc-scrubber library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does vlc-scrubber do? (for beginners)
//!
//! A linear touch slider is plugged into this computer.  The media player
//! (VLC with its remote-control interface enabled) runs on this or another
//! machine.  vlc-scrubber sits between the two:
//!
//! 1. Connects to the player over TCP and sends the password.
//! 2. Waits for the slider to be plugged in (only one slider is supported).
//! 3. Turns touches into `pause`, slider positions into `seek n%`, and
//!    lifting the finger into `play` five seconds later.

/// Application layer: device session state machine and intent dispatch.
pub mod application;

/// Infrastructure layer: player connection, device hub, settings file.
pub mod infrastructure;
