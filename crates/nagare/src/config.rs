use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NagareError, NagareResult};

pub const DEFAULT_BUFFER_SECONDS: f64 = 4.0;
// 0.5 MiB
pub const DEFAULT_INITIAL_FETCH_SIZE: u64 = 1024 * 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Seconds of lookahead to keep buffered.
    pub buffer_seconds: f64,
    /// Size of the first range request, before any throughput is known.
    pub initial_fetch_size: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: DEFAULT_BUFFER_SECONDS,
            initial_fetch_size: DEFAULT_INITIAL_FETCH_SIZE,
        }
    }
}

impl StreamConfig {
    pub fn load(path: impl AsRef<Path>) -> NagareResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> NagareResult<Self> {
        let config: Self = toml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn buffer_seconds(mut self, buffer_seconds: f64) -> Self {
        self.buffer_seconds = buffer_seconds;
        self
    }

    pub fn initial_fetch_size(mut self, initial_fetch_size: u64) -> Self {
        self.initial_fetch_size = initial_fetch_size;
        self
    }

    pub fn validate(&self) -> NagareResult<()> {
        if !self.buffer_seconds.is_finite() || self.buffer_seconds <= 0.0 {
            return Err(NagareError::InvalidConfig(format!(
                "buffer_seconds must be a positive number, got {}",
                self.buffer_seconds
            )));
        }
        if self.initial_fetch_size == 0 {
            return Err(NagareError::InvalidConfig(
                "initial_fetch_size must not be zero".to_string(),
            ));
        }
        Ok(())
    }
}
