//! User-facing control commands
//!
//! The shortcut-level actions a player UI exposes (space toggles, shift
//! arrows skip or nudge volume, and so on), plus a small text syntax so a
//! terminal host can drive the engine line by line.

use crate::types::RepeatMode;
use std::str::FromStr;

/// Volume change per up/down step
pub const VOLUME_STEP: f32 = 0.1;

/// Volume restored by unmute when nothing was remembered
pub const UNMUTE_VOLUME: f32 = 0.7;

/// Speeds offered by the speed menu
pub const PLAYBACK_SPEEDS: [f32; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    TogglePlayPause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    ToggleMute,
    SetVolume(f32),
    /// Absolute position in seconds
    Seek(f64),
    /// Position as a percentage of duration
    SeekPercent(f64),
    SetSpeed(f32),
    Stop,
    SetShuffle(bool),
    SetRepeat(RepeatMode),
    SetCrossfade(u32),
    /// Minutes; `None` cancels
    SleepTimer(Option<u32>),
    EqPreset(String),
    EqBand { index: usize, gain_db: f32 },
}

impl FromStr for PlayerCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or("empty command")?.to_ascii_lowercase();
        let arg = parts.next();

        let number = |what: &str| -> Result<f64, String> {
            let raw = arg.ok_or_else(|| format!("{what} needs a value"))?;
            raw.trim_end_matches(['%', 'x', 's'])
                .parse::<f64>()
                .map_err(|_| format!("'{raw}' is not a number"))
        };

        let command = match verb.as_str() {
            "toggle" | "space" | "p" => Self::TogglePlayPause,
            "next" | "n" => Self::Next,
            "prev" | "previous" | "b" => Self::Previous,
            "vol+" | "up" => Self::VolumeUp,
            "vol-" | "down" => Self::VolumeDown,
            "mute" | "m" => Self::ToggleMute,
            "vol" | "volume" => Self::SetVolume(number("volume")? as f32),
            "seek" => {
                if arg.is_some_and(|a| a.ends_with('%')) {
                    Self::SeekPercent(number("seek")?)
                } else {
                    Self::Seek(number("seek")?)
                }
            }
            "speed" => Self::SetSpeed(number("speed")? as f32),
            "stop" => Self::Stop,
            "shuffle" => Self::SetShuffle(parse_switch(arg)?),
            "repeat" => Self::SetRepeat(arg.ok_or("repeat needs off|all|one")?.parse()?),
            "crossfade" | "xfade" => Self::SetCrossfade(number("crossfade")?.max(0.0) as u32),
            "sleep" => match arg {
                Some("off" | "cancel") | None => Self::SleepTimer(None),
                Some(_) => Self::SleepTimer(Some(number("sleep")?.max(0.0) as u32)),
            },
            "eq" => {
                let first = arg.ok_or("eq needs a preset or a band and gain")?;
                match (first.parse::<usize>(), parts.next()) {
                    (Ok(index), Some(gain)) => Self::EqBand {
                        index,
                        gain_db: gain.parse().map_err(|_| format!("'{gain}' is not a gain"))?,
                    },
                    _ => Self::EqPreset(first.to_string()),
                }
            }
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(command)
    }
}

fn parse_switch(arg: Option<&str>) -> Result<bool, String> {
    match arg.map(str::to_ascii_lowercase).as_deref() {
        None | Some("on" | "true" | "1") => Ok(true),
        Some("off" | "false" | "0") => Ok(false),
        Some(other) => Err(format!("expected on|off, got '{other}'")),
    }
}

/// Nearest offered speed at or after `current` in the speed menu, wrapping
pub fn next_speed(current: f32) -> f32 {
    PLAYBACK_SPEEDS
        .iter()
        .copied()
        .find(|&speed| speed > current + f32::EPSILON)
        .unwrap_or(PLAYBACK_SPEEDS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        assert_eq!("space".parse::<PlayerCommand>().unwrap(), PlayerCommand::TogglePlayPause);
        assert_eq!("NEXT".parse::<PlayerCommand>().unwrap(), PlayerCommand::Next);
        assert_eq!("mute".parse::<PlayerCommand>().unwrap(), PlayerCommand::ToggleMute);
    }

    #[test]
    fn test_parse_seek_forms() {
        assert_eq!("seek 42".parse::<PlayerCommand>().unwrap(), PlayerCommand::Seek(42.0));
        assert_eq!("seek 50%".parse::<PlayerCommand>().unwrap(), PlayerCommand::SeekPercent(50.0));
        assert!("seek".parse::<PlayerCommand>().is_err());
        assert!("seek soon".parse::<PlayerCommand>().is_err());
    }

    #[test]
    fn test_parse_settings() {
        assert_eq!("speed 1.25x".parse::<PlayerCommand>().unwrap(), PlayerCommand::SetSpeed(1.25));
        assert_eq!("repeat one".parse::<PlayerCommand>().unwrap(), PlayerCommand::SetRepeat(RepeatMode::One));
        assert_eq!("shuffle off".parse::<PlayerCommand>().unwrap(), PlayerCommand::SetShuffle(false));
        assert_eq!("crossfade 5s".parse::<PlayerCommand>().unwrap(), PlayerCommand::SetCrossfade(5));
        assert_eq!("sleep 15".parse::<PlayerCommand>().unwrap(), PlayerCommand::SleepTimer(Some(15)));
        assert_eq!("sleep off".parse::<PlayerCommand>().unwrap(), PlayerCommand::SleepTimer(None));
    }

    #[test]
    fn test_parse_eq() {
        assert_eq!(
            "eq jazz".parse::<PlayerCommand>().unwrap(),
            PlayerCommand::EqPreset("jazz".to_string())
        );
        assert_eq!(
            "eq 3 -4.5".parse::<PlayerCommand>().unwrap(),
            PlayerCommand::EqBand { index: 3, gain_db: -4.5 }
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        assert!("dance".parse::<PlayerCommand>().is_err());
        assert!("   ".parse::<PlayerCommand>().is_err());
    }

    #[test]
    fn test_next_speed_wraps() {
        assert_eq!(next_speed(1.0), 1.25);
        assert_eq!(next_speed(2.0), 0.5);
        assert_eq!(next_speed(0.6), 0.75);
    }
}
