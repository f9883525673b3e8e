use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use cvingest_io::{DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, ReaderOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PROGRESS_EVERY: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid ingest config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

///
/// Settings of one ingestion run. Every field is optional in TOML.
///
/// ```toml
/// flatten = true
/// stringify_nested = false
/// queue_capacity = 16
/// limit = 1000
/// ```
///
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Disassemble records into entities. Off: one nested record per archive.
    pub flatten: bool,
    /// Encode nested payload and list-of-object fields as JSON strings.
    pub stringify_nested: bool,
    pub queue_capacity: usize,
    pub poll_interval_ms: u64,
    /// Log progress every this many records, 0 disables.
    pub progress_every: u64,
    /// Stop after this many records.
    pub limit: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            flatten: true,
            stringify_nested: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            progress_every: DEFAULT_PROGRESS_EVERY,
            limit: None,
        }
    }
}

impl IngestConfig {
    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn with_stringify_nested(mut self, stringify_nested: bool) -> Self {
        self.stringify_nested = stringify_nested;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_progress_every(mut self, progress_every: u64) -> Self {
        self.progress_every = progress_every;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            queue_capacity: self.queue_capacity,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

impl TryFrom<&Path> for IngestConfig {
    type Error = ConfigError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let toml_str = read_to_string(path)?;
        let config: IngestConfig = toml::from_str(&toml_str)?;
        config.validate()?;
        Ok(config)
    }
}
