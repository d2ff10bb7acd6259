use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::BUFFER_POOL_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for a `BufferManager`, persisted as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Number of frames in the pool, fixed for the manager's lifetime
    pub num_frames: usize,
    /// Sync the store after `flush_file` writes its pages back
    pub sync_on_flush: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            num_frames: BUFFER_POOL_SIZE,
            sync_on_flush: true,
        }
    }
}

impl BufferConfig {
    pub fn with_frames(num_frames: usize) -> Self {
        Self {
            num_frames,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.num_frames == 0 {
            return Err(ConfigError::Invalid(
                "num_frames must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
