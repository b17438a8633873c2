//! Recorder configuration
//!
//! Holds the name tables that turn raw controller indices into macro tokens,
//! the frame rate, the trigger threshold and the hotkey bindings. The file
//! lives at `<config_dir>/padmacro/config.toml`; when it is missing the
//! defaults (a DS4 seen through SDL on Windows) are written there first.

use crate::hotkey::parse_key;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "padmacro";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Hat direction tokens. Diagonals emit two of these at once.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HatNames {
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
}

impl Default for HatNames {
    fn default() -> Self {
        Self {
            up: "UP()".to_string(),
            down: "DOWN()".to_string(),
            left: "LEFT()".to_string(),
            right: "RIGHT()".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HotkeyConfig {
    pub toggle_record: String,
    pub request_stop: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle_record: "f1".to_string(),
            request_stop: "esc".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RecorderConfig {
    /// Sampling rate of the frame driver. One macro tick is one frame.
    pub fps: u32,

    /// Normalized axis value at which a trigger counts as held.
    pub trigger_threshold: f32,

    /// Upper bound for `sleep(n)` when nothing was held during the gap.
    pub downtime_cap: u32,

    pub hat_index: u8,

    /// Directory that receives the recorded macro files.
    pub output_dir: PathBuf,

    pub file_prefix: String,

    /// Button token to button index. Indices without a token are ignored.
    pub buttons: BTreeMap<String, u8>,

    /// Trigger token to axis index.
    pub triggers: BTreeMap<String, u8>,

    pub hat: HatNames,

    pub hotkeys: HotkeyConfig,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        let buttons = [
            (0, "LK()"),
            (1, "MK()"),
            (2, "LP()"),
            (3, "MP()"),
            (4, "L1"),
            (5, "HP()"),
            (8, "Share"),
            (9, "Options"),
            (10, "L3"),
            (11, "R3"),
            (12, "PS"),
            (13, "Touchpad"),
        ]
        .into_iter()
        .map(|(idx, name)| (name.to_string(), idx))
        .collect();

        // L2/R2 also show up as buttons 6/7 on some drivers; they are read as axes here
        let triggers = [("DRIVE_RUSH()", 4), ("HK()", 5)]
            .into_iter()
            .map(|(name, axis)| (name.to_string(), axis))
            .collect();

        Self {
            fps: 60,
            trigger_threshold: 0.5,
            downtime_cap: 99,
            hat_index: 0,
            output_dir: PathBuf::from("."),
            file_prefix: "ds4_log_".to_string(),
            buttons,
            triggers,
            hat: HatNames::default(),
            hotkeys: HotkeyConfig::default(),
        }
    }
}

impl RecorderConfig {
    /// Default location of the config file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push(CONFIG_DIR);
            path.push(CONFIG_FILE);
            path
        })
    }

    /// Loads the config from the default location, creating it with defaults
    /// when it does not exist yet.
    pub async fn load_or_create() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_or_create_at(&path).await,
            None => {
                warn!("No config directory available on this platform, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub async fn load_or_create_at(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            info!("Config file {} not found, writing defaults", path.display());
            let config = Self::default();
            config.save_to(path).await?;
            return Ok(config);
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        debug!("Parsed config: {:?}", config);
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Checks frame timing values, token spelling and that no token is
    /// shared between buttons, hat and triggers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be at least 1".to_string()));
        }
        if !self.trigger_threshold.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "trigger_threshold must be finite, got {}",
                self.trigger_threshold
            )));
        }
        if self.downtime_cap == 0 {
            return Err(ConfigError::Invalid(
                "downtime_cap must be at least 1".to_string(),
            ));
        }

        let mut owners: HashMap<&str, &str> = HashMap::new();
        let hat_tokens = [
            &self.hat.up,
            &self.hat.down,
            &self.hat.left,
            &self.hat.right,
        ];
        let all_tokens = self
            .buttons
            .keys()
            .map(|name| ("buttons", name))
            .chain(hat_tokens.into_iter().map(|name| ("hat", name)))
            .chain(self.triggers.keys().map(|name| ("triggers", name)));

        for (channel, token) in all_tokens {
            check_token(token)?;
            if let Some(previous) = owners.insert(token.as_str(), channel) {
                return Err(ConfigError::Invalid(format!(
                    "token {:?} is used by both {} and {}",
                    token, previous, channel
                )));
            }
        }

        let mut keys = Vec::with_capacity(2);
        for (label, key) in [
            ("toggle_record", &self.hotkeys.toggle_record),
            ("request_stop", &self.hotkeys.request_stop),
        ] {
            match parse_key(key) {
                Some(parsed) => keys.push(parsed),
                None => {
                    return Err(ConfigError::Invalid(format!(
                        "unknown key {:?} for hotkey {}",
                        key, label
                    )))
                }
            }
        }
        if keys[0] == keys[1] {
            return Err(ConfigError::Invalid(
                "toggle_record and request_stop must use different keys".to_string(),
            ));
        }

        Ok(())
    }
}

// Tokens end up after a p/r prefix on their own line
fn check_token(token: &str) -> Result<(), ConfigError> {
    if token.is_empty() {
        return Err(ConfigError::Invalid("empty input token".to_string()));
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ConfigError::Invalid(format!(
            "input token {:?} contains whitespace or control characters",
            token
        )));
    }
    Ok(())
}
