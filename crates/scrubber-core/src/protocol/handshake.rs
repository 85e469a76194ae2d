//! Helpers for the password handshake.
//!
//! The player's greeting is free text, and a telnet-style endpoint may prefix
//! it with option-negotiation bytes that are not valid UTF-8.  Lines are
//! therefore decoded lossily and stripped of control characters before they
//! are compared against the rejection text.

/// The exact line the player sends when the password is wrong.
pub const WRONG_PASSWORD: &str = "Wrong password";

/// Decodes one received line for logging and comparison.
///
/// Trailing `\r\n`, surrounding control characters, and bytes that are not
/// valid UTF-8 are removed.
pub fn normalize_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c.is_control() || c == char::REPLACEMENT_CHARACTER)
        .to_string()
}

/// `true` only for the exact rejection line.
pub fn is_rejection(line: &str) -> bool {
    line == WRONG_PASSWORD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_line_terminators() {
        assert_eq!(normalize_line(b"Welcome, Master\r\n"), "Welcome, Master");
        assert_eq!(normalize_line(b"Password:\n"), "Password:");
    }

    #[test]
    fn test_normalize_strips_telnet_negotiation_prefix() {
        // IAC WILL ECHO followed by the prompt.
        let raw = [0xFF, 0xFB, 0x01, b'P', b'a', b's', b's', b'w', b'o', b'r', b'd', b':'];
        assert_eq!(normalize_line(&raw), "Password:");
    }

    #[test]
    fn test_normalize_keeps_spaces() {
        assert_eq!(normalize_line(b"> "), "> ");
        assert_eq!(normalize_line(b"Wrong password\r\n"), WRONG_PASSWORD);
    }

    #[test]
    fn test_is_rejection_requires_exact_text() {
        assert!(is_rejection("Wrong password"));
        assert!(!is_rejection("wrong password"));
        assert!(!is_rejection("Wrong password!"));
        assert!(!is_rejection("Welcome"));
    }
}
