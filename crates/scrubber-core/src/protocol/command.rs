//! Player commands and their text line encoding.

use std::fmt;

/// A single command understood by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    /// `pause`
    Pause,
    /// `play`
    Play,
    /// `seek <n>%`
    Seek(u8),
}

impl PlayerCommand {
    /// Encodes the command as one newline-terminated line, ready for the wire.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scrubber_core::PlayerCommand;
    ///
    /// assert_eq!(PlayerCommand::Seek(46).encode(), b"seek 46%\n");
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let mut line = self.to_string().into_bytes();
        line.push(b'\n');
        line
    }
}

impl fmt::Display for PlayerCommand {
    /// Writes the command line without its terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerCommand::Pause => f.write_str("pause"),
            PlayerCommand::Play => f.write_str("play"),
            PlayerCommand::Seek(percent) => write!(f, "seek {percent}%"),
        }
    }
}
