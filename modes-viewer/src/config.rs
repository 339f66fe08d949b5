//! Configuration file management for modes-viewer.
//!
//! Reads/writes `~/.modes-viewer/config.yaml`. Every key is optional;
//! missing sections fall back to the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use modes_core::AdsbLevel;

use crate::error::{Result, ViewerError};

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub server: ServerConfig,
    pub viewer: ViewerConfig,
    pub replay: ReplayConfig,
}

/// ADSBSpy-style TCP feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Level assumed for planes that have not reported their version yet.
    pub default_level: AdsbLevel,
    pub queue_capacity: usize,
    /// Point ground distances are measured from in plane summaries.
    pub reference: Option<Reference>,
    /// Evict planes not seen for this long. Never evicts when unset.
    pub stale_after_secs: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            host: "localhost".into(),
            port: 47806,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 8081,
            static_dir: PathBuf::from("web"),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            default_level: AdsbLevel::Level2,
            queue_capacity: crate::mux::DEFAULT_QUEUE_CAPACITY,
            reference: Some(Reference {
                lat: 34.670619,
                lon: 33.029099,
            }),
            stale_after_secs: None,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig { interval_ms: 200 }
    }
}

impl Reference {
    pub fn as_pair(self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Get the config directory path (`~/.modes-viewer/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".modes-viewer")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `path`, or from `~/.modes-viewer/config.yaml`.
///
/// Returns the default config if the file doesn't exist. A file that exists
/// but doesn't parse is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(&path)?;
    parse_config(&text).map_err(|e| ViewerError::Config(format!("{}: {e}", path.display())))
}

/// Save config to `path`, or to `~/.modes-viewer/config.yaml`.
pub fn save_config(config: &Config, path: Option<&Path>) -> Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let text = serde_yaml::to_string(config).map_err(|e| ViewerError::Config(e.to_string()))?;
    std::fs::write(&path, text)?;

    Ok(path)
}

fn parse_config(text: &str) -> std::result::Result<Config, serde_yaml::Error> {
    let blank = text
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'));
    if blank {
        return Ok(Config::default());
    }
    serde_yaml::from_str(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
