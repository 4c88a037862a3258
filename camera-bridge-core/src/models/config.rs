use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::stream::StreamRole;

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguration {
    /// Role used to generate the default stream configuration on open
    /// (default: view-finder).
    pub role: StreamRole,

    /// Default wait used by blocking polls, in milliseconds (default: 100).
    pub poll_timeout_ms: u64,
}

impl SessionConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_timeout_ms == 0 {
            return Err("poll timeout must be positive".into());
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::Config(format!("failed to parse session configuration: {}", e)))?;
        config.validate().map_err(CaptureError::Config)?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            role: StreamRole::Viewfinder,
            poll_timeout_ms: 100,
        }
    }
}
