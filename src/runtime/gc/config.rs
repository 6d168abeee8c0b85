use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// When objects whose last handle went away are freed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimPolicy {
    /// Objects linger until the next explicit `collect()`.
    #[default]
    Deferred,
    /// Objects are untracked and freed as soon as their last handle is
    /// released.
    Eager,
}

/// Isolate settings.
///
/// Every field has a default, so a partial JSON document is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolateConfig {
    pub reclaim: ReclaimPolicy,
    /// Tracked-object count at which `should_collect()` starts returning
    /// `true`. Advisory only; the isolate never collects by itself.
    pub collect_threshold: Option<usize>,
    /// Record allocation and collection telemetry.
    pub telemetry: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid isolate config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl IsolateConfig {
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&source)
    }

    pub fn with_reclaim(mut self, reclaim: ReclaimPolicy) -> Self {
        self.reclaim = reclaim;
        self
    }

    pub fn with_collect_threshold(mut self, threshold: usize) -> Self {
        self.collect_threshold = Some(threshold);
        self
    }

    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry = enabled;
        self
    }
}
