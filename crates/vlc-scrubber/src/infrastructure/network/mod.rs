//! Network infrastructure: the control channel to the media player.
//!
//! Architecture:
//! - `ControlChannel` owns the TCP stream to the player's remote-control port.
//! - The password handshake runs once, inside `connect`.
//! - After that, each command is one line written under a single writer lock,
//!   so commands from concurrent tasks never interleave.

pub mod control_channel;

pub use control_channel::{
    AuthenticationError, ChannelConfig, CloseError, ConnectError, ControlChannel, SendError,
    Session,
};
