//! Runtime configuration and store key layout.
//!
//! Every field has a default, so a partial (or missing) config file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::state::DEFAULT_VOLUME;
use crate::core::time::EpochMillis;

/// Error type for loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings shared by controllers and the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// URL of the single looped background track
    pub audio_url: String,
    /// Element id the media resource is registered under
    pub media_element_id: String,
    /// Element id of the play/pause affordance
    pub control_id: String,
    /// Prefix for the four store keys
    pub store_prefix: String,
    pub cache_name: String,
    pub audio_cache_name: String,
    pub default_volume: f64,
    /// Persisted or canonical state older than this is discarded
    pub freshness_window_ms: EpochMillis,
    pub sweep_interval_ms: u64,
    /// Delay before resuming a saved "playing" mode on page load
    pub resume_delay_ms: EpochMillis,
    /// Delay before restoring when the page becomes visible again
    pub restore_delay_ms: EpochMillis,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            audio_url: "Lagu/The Land of Her Serenity - Yu-Peng Chen.mp3".to_string(),
            media_element_id: "background-audio".to_string(),
            control_id: "audio-control".to_string(),
            store_prefix: "fislab-audio".to_string(),
            cache_name: "fislab-audio-v1".to_string(),
            audio_cache_name: "fislab-audio-cache-v1".to_string(),
            default_volume: DEFAULT_VOLUME,
            freshness_window_ms: 5 * 60 * 1_000,
            sweep_interval_ms: 60 * 1_000,
            resume_delay_ms: 1_000,
            restore_delay_ms: 100,
        }
    }
}

impl SyncConfig {
    /// Load config from a JSON file, or return defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(?path, "no config file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SyncConfig = serde_json::from_str(&content)?;

        tracing::info!(?path, "loaded config");
        Ok(config)
    }

    /// Save config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn store_keys(&self) -> StoreKeys {
        StoreKeys::with_prefix(&self.store_prefix)
    }

    /// Bare file name of the audio resource, used to recognise requests for it
    pub fn audio_file_name(&self) -> &str {
        self.audio_url
            .rsplit('/')
            .next()
            .unwrap_or(self.audio_url.as_str())
    }
}

/// Names of the four persisted keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    /// "playing" / "paused"
    pub mode: String,
    pub time: String,
    pub volume: String,
    /// Composite JSON record
    pub state: String,
}

impl StoreKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            mode: prefix.to_string(),
            time: format!("{prefix}-time"),
            volume: format!("{prefix}-volume"),
            state: format!("{prefix}-state"),
        }
    }
}

impl Default for StoreKeys {
    fn default() -> Self {
        SyncConfig::default().store_keys()
    }
}
