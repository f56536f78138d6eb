//! Configuration management (<config_dir>/config.toml)
//!
//! Handles loading, saving, and providing defaults for host settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::{DEFAULT_SAVE_FILE, RuntimeConfig};
use crate::save_store::{PersistenceConfig, write_atomic};

/// Name of the configuration file inside [`config_dir`]
pub const CONFIG_FILE: &str = "config.toml";

/// Error loading or saving the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write config {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{field} key '{key}' is not a recognized key")]
    UnknownKey { field: &'static str, key: String },

    #[error("no config directory available on this platform")]
    NoConfigDir,
}

/// Host configuration.
///
/// Contains all user-configurable settings organized into sections.
/// Serialized to/from TOML format for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Save slot and autosave cadence
    #[serde(default)]
    pub save: SaveConfig,
    /// Output surface settings
    #[serde(default)]
    pub display: DisplayConfig,
    /// Simulation speed
    #[serde(default)]
    pub sim: SimConfig,
    /// Key bindings
    #[serde(default)]
    pub keys: KeyConfig,
}

/// Save configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveConfig {
    /// Save file (default: `<data_dir>/pocketpet.sav`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Seconds between autosaves (default: 60)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Wait after the engine reports nothing to save (default: 1000)
    #[serde(default = "default_unchanged_retry_ms")]
    pub unchanged_retry_ms: u64,
    /// Wait after a failed or refused save (default: 5000)
    #[serde(default = "default_failure_retry_ms")]
    pub failure_retry_ms: u64,
}

/// Display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Output multiplier (default: 1)
    #[serde(default = "default_scale")]
    pub scale: u32,
    /// Frames per second, 0 for unpaced (default: 60)
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// Log frames slower than this (default: 250)
    #[serde(default = "default_slow_frame_warning_ms")]
    pub slow_frame_warning_ms: u64,
}

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Simulated seconds per real second (default: 1.0)
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
}

/// Key bindings.
///
/// Keys are single characters (`"q"`, `"="`) or names such as `"esc"`,
/// `"enter"`, `"space"`, `"left"` and `"f1"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "default_left_key")]
    pub left: String,
    #[serde(default = "default_middle_key")]
    pub middle: String,
    #[serde(default = "default_right_key")]
    pub right: String,
    #[serde(default = "default_quit_key")]
    pub quit: String,
    #[serde(default = "default_time_faster_key")]
    pub time_faster: String,
    #[serde(default = "default_time_slower_key")]
    pub time_slower: String,
    #[serde(default = "default_zoom_in_key")]
    pub zoom_in: String,
    #[serde(default = "default_zoom_out_key")]
    pub zoom_out: String,
}

fn default_interval_secs() -> u64 {
    60
}
fn default_unchanged_retry_ms() -> u64 {
    1000
}
fn default_failure_retry_ms() -> u64 {
    5000
}

fn default_scale() -> u32 {
    1
}
fn default_target_fps() -> u32 {
    60
}
fn default_slow_frame_warning_ms() -> u64 {
    250
}

fn default_time_scale() -> f32 {
    1.0
}

fn default_left_key() -> String {
    "q".to_string()
}
fn default_middle_key() -> String {
    "w".to_string()
}
fn default_right_key() -> String {
    "e".to_string()
}
fn default_quit_key() -> String {
    "esc".to_string()
}
fn default_time_faster_key() -> String {
    "=".to_string()
}
fn default_time_slower_key() -> String {
    "-".to_string()
}
fn default_zoom_in_key() -> String {
    "p".to_string()
}
fn default_zoom_out_key() -> String {
    "o".to_string()
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            path: None,
            interval_secs: default_interval_secs(),
            unchanged_retry_ms: default_unchanged_retry_ms(),
            failure_retry_ms: default_failure_retry_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            target_fps: default_target_fps(),
            slow_frame_warning_ms: default_slow_frame_warning_ms(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            left: default_left_key(),
            middle: default_middle_key(),
            right: default_right_key(),
            quit: default_quit_key(),
            time_faster: default_time_faster_key(),
            time_slower: default_time_slower_key(),
            zoom_in: default_zoom_in_key(),
            zoom_out: default_zoom_out_key(),
        }
    }
}

impl KeyConfig {
    /// Every binding with its config field name, in a stable order.
    pub fn bindings(&self) -> [(&'static str, &str); 8] {
        [
            ("keys.left", self.left.as_str()),
            ("keys.middle", self.middle.as_str()),
            ("keys.right", self.right.as_str()),
            ("keys.quit", self.quit.as_str()),
            ("keys.time_faster", self.time_faster.as_str()),
            ("keys.time_slower", self.time_slower.as_str()),
            ("keys.zoom_in", self.zoom_in.as_str()),
            ("keys.zoom_out", self.zoom_out.as_str()),
        ]
    }
}

impl Config {
    /// The configured save file, or the default one in [`data_dir`].
    ///
    /// Falls back to the working directory when the platform has no data
    /// directory.
    pub fn save_path(&self) -> PathBuf {
        match &self.save.path {
            Some(path) => path.clone(),
            None => data_dir()
                .map(|dir| dir.join(DEFAULT_SAVE_FILE))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_FILE)),
        }
    }

    /// Host loop settings described by this configuration.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            persistence: PersistenceConfig {
                save_path: self.save_path(),
                save_interval: Duration::from_secs(self.save.interval_secs),
                unchanged_retry: Duration::from_millis(self.save.unchanged_retry_ms),
                failure_retry: Duration::from_millis(self.save.failure_retry_ms),
            },
            target_fps: self.display.target_fps,
            time_scale: self.sim.time_scale,
            display_scale: self.display.scale,
            slow_frame_warning: Duration::from_millis(self.display.slow_frame_warning_ms),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("io.pocketpet", "", "PocketPet")
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\PocketPet\config`
/// On macOS: `~/Library/Application Support/io.pocketpet.PocketPet`
/// On Linux: `~/.config/PocketPet`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory for the save file and logs.
///
/// On Windows: `%APPDATA%\PocketPet\data`
/// On macOS: `~/Library/Application Support/io.pocketpet.PocketPet`
/// On Linux: `~/.local/share/PocketPet`
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Default location of the configuration file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Loads the configuration from disk.
///
/// Reads `config.toml` from the platform's configuration directory.
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let (config, error) = load_or_default(&path);
    if let Some(e) = error {
        tracing::warn!("Using default config: {}", e);
    }
    config
}

/// Loads `path`, falling back to defaults.
///
/// A missing file is not an error. Any other failure is returned next to the
/// defaults so the caller can report it.
pub fn load_or_default(path: &Path) -> (Config, Option<ConfigError>) {
    match load_from(path) {
        Ok(config) => (config, None),
        Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            (Config::default(), None)
        }
        Err(e) => (Config::default(), Some(e)),
    }
}

/// Loads the configuration from a specific file.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Saves the configuration to disk.
///
/// Writes `config.toml` to the platform's configuration directory and
/// returns the path written.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)?;
    Ok(path)
}

/// Saves the configuration to a specific file, creating its directory.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    write_atomic(path, content.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Key named in a binding, normalized for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyName {
    /// Printable character, lowercased
    Char(char),
    Esc,
    Enter,
    Tab,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    /// Function key F1-F12
    F(u8),
}

/// Parse a key string from the config.
///
/// Returns `None` if the name is not recognized.
pub fn parse_key_name(s: &str) -> Option<KeyName> {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next())
        && !c.is_control()
    {
        return Some(KeyName::Char(c.to_ascii_lowercase()));
    }

    let lower = s.trim().to_ascii_lowercase();
    let key = match lower.as_str() {
        "esc" | "escape" => KeyName::Esc,
        "enter" | "return" => KeyName::Enter,
        "space" => KeyName::Char(' '),
        "tab" => KeyName::Tab,
        "backspace" => KeyName::Backspace,
        "up" => KeyName::Up,
        "down" => KeyName::Down,
        "left" => KeyName::Left,
        "right" => KeyName::Right,
        other => {
            let n: u8 = other.strip_prefix('f')?.parse().ok()?;
            if !(1..=12).contains(&n) {
                return None;
            }
            KeyName::F(n)
        }
    };
    Some(key)
}

impl KeyConfig {
    /// Parse every binding, failing on the first unrecognized key.
    pub fn parsed(&self) -> Result<[(&'static str, KeyName); 8], ConfigError> {
        let mut out = [("", KeyName::Esc); 8];
        for (slot, (field, key)) in out.iter_mut().zip(self.bindings()) {
            let name = parse_key_name(key).ok_or_else(|| ConfigError::UnknownKey {
                field,
                key: key.to_string(),
            })?;
            *slot = (field, name);
        }
        Ok(out)
    }
}

/// Validate that every binding parses and no two bindings share a key.
///
/// Returns a list of warning messages for any problems found.
pub fn validate_keybindings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut used_keys: HashMap<KeyName, &'static str> = HashMap::new();

    for (name, key) in config.keys.bindings() {
        let Some(parsed) = parse_key_name(key) else {
            warnings.push(format!("{} key '{}' is not a recognized key", name, key));
            continue;
        };
        if let Some(other) = used_keys.insert(parsed, name) {
            warnings.push(format!(
                "{} key '{}' conflicts with {}",
                name, key, other
            ));
        }
    }

    warnings
}
