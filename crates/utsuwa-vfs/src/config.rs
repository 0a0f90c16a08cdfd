//! Configuration for the in-memory engine.
//!
//! Configs are plain RON:
//!
//! ```ron
//! (
//!     name: "scratch",
//!     max_file_size: Some(1048576),
//!     max_open_handles: None,
//! )
//! ```
//!
//! Omitted fields take their defaults.

use serde::{Deserialize, Serialize};

/// Default backend name.
const DEFAULT_NAME: &str = "MemoryFs";

/// In-memory engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemFsConfig {
    /// Reported by `Fs::name`.
    pub name: String,
    /// Largest size a file may grow to; `None` for no limit.
    pub max_file_size: Option<u64>,
    /// Most handles that may be open at once; `None` for no limit.
    pub max_open_handles: Option<usize>,
}

impl Default for MemFsConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            max_file_size: None,
            max_open_handles: None,
        }
    }
}

impl MemFsConfig {
    /// Parse a RON document.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Read and parse a RON file from the host filesystem.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }
}

/// Errors that can occur when loading a config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}
