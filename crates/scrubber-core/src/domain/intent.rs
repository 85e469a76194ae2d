//! Playback intents: what the player should do in response to a device event.
//!
//! An intent is derived from a single event and dispatched straight away; it
//! is never stored.
//!
//! | Event                          | Intent                          | Wire command |
//! |--------------------------------|---------------------------------|--------------|
//! | touch input pressed            | [`PlaybackIntent::Pause`]       | `pause`      |
//! | touch input released           | [`PlaybackIntent::PlayAfterDelay`] | `play` (later) |
//! | position sensor changed to `v` | [`PlaybackIntent::SeekTo`]      | `seek n%`    |

use std::time::Duration;

use crate::domain::device::{InputChange, SensorChange};
use crate::protocol::command::PlayerCommand;

/// Divisor that maps the sensor's raw range (`0..=1000`) onto percent.
pub const SENSOR_DIVISOR: f64 = 10.0;

/// Largest seek target in percent.
pub const MAX_SEEK_PERCENT: u8 = 100;

/// Wait between lifting the finger and resuming playback.
pub const DEFAULT_RESUME_DELAY: Duration = Duration::from_secs(5);

/// Index of the digital input that carries the touch state on a slider.
pub const DEFAULT_TOUCH_INPUT_INDEX: u8 = 0;

/// A decision about which player command to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackIntent {
    /// Pause playback now.
    Pause,
    /// Resume playback once the delay has elapsed.
    PlayAfterDelay(Duration),
    /// Jump to this position, in percent of the media length.
    SeekTo(u8),
}

impl PlaybackIntent {
    /// The command that carries out this intent.
    pub fn command(&self) -> PlayerCommand {
        match self {
            PlaybackIntent::Pause => PlayerCommand::Pause,
            PlaybackIntent::PlayAfterDelay(_) => PlayerCommand::Play,
            PlaybackIntent::SeekTo(percent) => PlayerCommand::Seek(*percent),
        }
    }

    /// How long to wait before issuing [`Self::command`]; `None` means now.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            PlaybackIntent::PlayAfterDelay(delay) => Some(*delay),
            _ => None,
        }
    }
}

/// Converts a raw sensor reading to a seek position.
///
/// `round(raw / 10)`, rounding halves away from zero, then clamped to
/// `0..=100` so a miscalibrated sensor can never produce `seek 101%` or a
/// negative seek.
///
/// # Examples
///
/// ```rust
/// use scrubber_core::seek_percent;
///
/// assert_eq!(seek_percent(455), 46);
/// assert_eq!(seek_percent(1000), 100);
/// assert_eq!(seek_percent(1200), 100);
/// assert_eq!(seek_percent(-30), 0);
/// ```
pub fn seek_percent(raw_value: i32) -> u8 {
    let percent = (f64::from(raw_value) / SENSOR_DIVISOR).round();
    percent.clamp(0.0, f64::from(MAX_SEEK_PERCENT)) as u8
}

/// The rules that turn device events into intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentPolicy {
    /// Only this digital input drives pause/play.
    pub touch_input_index: u8,
    /// Delay applied to the resume after a release.
    pub resume_delay: Duration,
}

impl Default for IntentPolicy {
    fn default() -> Self {
        Self {
            touch_input_index: DEFAULT_TOUCH_INPUT_INDEX,
            resume_delay: DEFAULT_RESUME_DELAY,
        }
    }
}

impl IntentPolicy {
    /// Intent for a digital input change, or `None` for inputs other than the
    /// touch input.
    pub fn for_input(&self, change: InputChange) -> Option<PlaybackIntent> {
        if change.index != self.touch_input_index {
            return None;
        }
        Some(if change.pressed {
            PlaybackIntent::Pause
        } else {
            PlaybackIntent::PlayAfterDelay(self.resume_delay)
        })
    }

    /// Intent for a sensor change.  Every sensor index seeks.
    pub fn for_sensor(&self, change: SensorChange) -> PlaybackIntent {
        PlaybackIntent::SeekTo(seek_percent(change.raw_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_percent_rounds_half_up() {
        assert_eq!(seek_percent(455), 46);
        assert_eq!(seek_percent(454), 45);
        assert_eq!(seek_percent(5), 1);
        assert_eq!(seek_percent(4), 0);
    }

    #[test]
    fn test_seek_percent_covers_nominal_range() {
        // Every in-range reading must map onto round(v / 10) exactly.
        for raw in 0..=1000 {
            let expected = (f64::from(raw) / 10.0).round() as u8;
            assert_eq!(seek_percent(raw), expected, "raw {raw}");
        }
    }

    #[test]
    fn test_seek_percent_clamps_out_of_range_readings() {
        assert_eq!(seek_percent(1004), 100);
        assert_eq!(seek_percent(i32::MAX), 100);
        assert_eq!(seek_percent(-4), 0);
        assert_eq!(seek_percent(-500), 0);
        assert_eq!(seek_percent(i32::MIN), 0);
    }

    #[test]
    fn test_policy_press_on_touch_input_is_pause() {
        let policy = IntentPolicy::default();
        let intent = policy.for_input(InputChange { index: 0, pressed: true });
        assert_eq!(intent, Some(PlaybackIntent::Pause));
    }

    #[test]
    fn test_policy_release_on_touch_input_is_delayed_play() {
        let policy = IntentPolicy::default();
        let intent = policy.for_input(InputChange { index: 0, pressed: false });
        assert_eq!(
            intent,
            Some(PlaybackIntent::PlayAfterDelay(Duration::from_secs(5)))
        );
    }

    #[test]
    fn test_policy_ignores_other_inputs() {
        let policy = IntentPolicy::default();
        assert_eq!(policy.for_input(InputChange { index: 1, pressed: true }), None);
        assert_eq!(policy.for_input(InputChange { index: 7, pressed: false }), None);
    }

    #[test]
    fn test_policy_respects_custom_touch_index_and_delay() {
        // Arrange
        let policy = IntentPolicy {
            touch_input_index: 2,
            resume_delay: Duration::from_millis(750),
        };

        // Act
        let on_two = policy.for_input(InputChange { index: 2, pressed: false });
        let on_zero = policy.for_input(InputChange { index: 0, pressed: true });

        // Assert
        assert_eq!(
            on_two,
            Some(PlaybackIntent::PlayAfterDelay(Duration::from_millis(750)))
        );
        assert_eq!(on_zero, None);
    }

    #[test]
    fn test_policy_sensor_on_any_index_seeks() {
        let policy = IntentPolicy::default();
        let intent = policy.for_sensor(SensorChange { index: 3, raw_value: 455 });
        assert_eq!(intent, PlaybackIntent::SeekTo(46));
    }

    #[test]
    fn test_intent_command_and_delay() {
        assert_eq!(PlaybackIntent::Pause.command(), PlayerCommand::Pause);
        assert_eq!(PlaybackIntent::Pause.delay(), None);

        let resume = PlaybackIntent::PlayAfterDelay(Duration::from_secs(5));
        assert_eq!(resume.command(), PlayerCommand::Play);
        assert_eq!(resume.delay(), Some(Duration::from_secs(5)));

        assert_eq!(PlaybackIntent::SeekTo(12).command(), PlayerCommand::Seek(12));
    }
}
