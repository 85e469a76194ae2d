//! Application layer use cases.
//!
//! - **`dispatch_intent`** – Turns a [`scrubber_core::PlaybackIntent`] into a
//!   player command.  Immediate intents are sent on the caller's task; the
//!   delayed resume is scheduled on its own task so it never holds up the
//!   next event.
//!
//! - **`device_session`** – The single device slot.  Accepts or rejects
//!   attach events, opens the device's two event streams, and releases them
//!   again on detach or shutdown.

pub mod device_session;
pub mod dispatch_intent;
