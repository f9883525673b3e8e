//! Destinations for emitted entity records.

use std::collections::BTreeMap;
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Entity sink closed: {0}")]
    Closed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Anything that accepts tagged entity records.
pub trait EntitySink {
    ///
    /// Take one record.
    ///
    /// # Arguments
    /// - entity_type: the record's `entity_type`
    /// - record: the record, already carrying `entity_type` and `release_date`
    ///
    fn accept(&mut self, entity_type: &str, record: Value) -> SinkResult<()>;

    /// Called once after the last record.
    fn finish(&mut self) -> SinkResult<()> {
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<Value>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_types(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|r| r.get("entity_type").and_then(Value::as_str))
            .collect()
    }
}

impl EntitySink for VecSink {
    fn accept(&mut self, _entity_type: &str, record: Value) -> SinkResult<()> {
        self.records.push(record);
        Ok(())
    }
}

/// Forwards records to a callback.
pub struct CallbackSink<F>(pub F);

impl<F> EntitySink for CallbackSink<F>
where
    F: FnMut(&str, Value) -> SinkResult<()>,
{
    fn accept(&mut self, entity_type: &str, record: Value) -> SinkResult<()> {
        (self.0)(entity_type, record)
    }
}

/// Forwards records to another thread.
pub struct ChannelSink {
    tx: Sender<Value>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Value>) -> Self {
        Self { tx }
    }
}

impl EntitySink for ChannelSink {
    fn accept(&mut self, entity_type: &str, record: Value) -> SinkResult<()> {
        self.tx
            .send(record)
            .map_err(|_| SinkError::Closed(format!("receiver gone while sending {}", entity_type)))
    }
}

///
/// Writes one newline-delimited JSON file per entity type into a directory,
/// `<entity_type>.ndjson`. Files are created on first use.
///
pub struct NdjsonDirSink {
    dir: PathBuf,
    writers: BTreeMap<String, BufWriter<File>>,
}

impl NdjsonDirSink {
    pub fn new(dir: &Path) -> SinkResult<Self> {
        create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            writers: BTreeMap::new(),
        })
    }

    pub fn path_for(&self, entity_type: &str) -> PathBuf {
        self.dir.join(format!("{}.ndjson", entity_type))
    }

    /// Paths of the files written so far.
    pub fn files(&self) -> Vec<PathBuf> {
        self.writers.keys().map(|t| self.path_for(t)).collect()
    }
}

impl EntitySink for NdjsonDirSink {
    fn accept(&mut self, entity_type: &str, record: Value) -> SinkResult<()> {
        if !self.writers.contains_key(entity_type) {
            let file = File::create(self.path_for(entity_type))?;
            self.writers
                .insert(entity_type.to_string(), BufWriter::new(file));
        }
        let writer = self
            .writers
            .get_mut(entity_type)
            .ok_or_else(|| SinkError::Closed(format!("no writer for {}", entity_type)))?;
        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}
