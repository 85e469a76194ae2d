//! The media player's remote-control text protocol.
//!
//! # Wire format
//!
//! ```text
//! client → player   <password>\n
//! player → client   <greeting line>\n ...        (free-form, may end with a prompt)
//! player → client   Wrong password\n             (only when the password is rejected)
//! client → player   pause\n | play\n | seek <n>%\n
//! ```
//!
//! Commands are fire-and-forget: the player does not acknowledge them.

pub mod command;
pub mod handshake;

pub use command::PlayerCommand;
pub use handshake::{is_rejection, normalize_line, WRONG_PASSWORD};
