//! Player settings
//!
//! Layered like this, later sources winning:
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `mood-player.toml` if present)
//! 3. `MOOD_`-prefixed environment variables, `__` between sections
//!    (e.g. `MOOD_PLAYBACK__VOLUME=0.4`)
//! 4. command-line flags (applied by `main`)

use config::{Config, ConfigError, Environment, File};
use mood_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Looked for in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "mood-player.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PlayerSettings {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub equalizer: EqualizerSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EqualizerSettings {
    /// Preset applied at startup (flat, bass, treble, vocal, rock, pop, jazz, classical)
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OutputSettings {
    /// Print every engine event as a JSON line on stdout
    #[serde(default)]
    pub json_events: bool,
}

impl PlayerSettings {
    /// Load from file and process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, Environment::with_prefix("MOOD"))
    }

    fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        match path {
            // An explicit file must exist
            Some(path) => settings = settings.add_source(File::from(path.to_path_buf())),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    settings = settings.add_source(File::from(fallback));
                }
            }
        }

        settings = settings.add_source(
            env.prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = settings.build()?.try_deserialize()?;
        Ok(settings.normalized())
    }

    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.playback = self.playback.normalized();
        self
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
