//! Reader → model → disassembler → sink.

use std::collections::BTreeMap;
use std::io::Read;

use cvingest_core::IngestError;
use cvingest_core::utils::get_dynamic_reader_from;
use cvingest_io::{Cancellation, ReleaseReader};
use cvingest_model::{Entity, ReleaseRecord};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigError, IngestConfig};
use crate::sink::{EntitySink, SinkError};

pub const RELEASE_DATE_KEY: &str = "release_date";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub release_date: Option<String>,
    pub records: u64,
    /// Emitted entities per `entity_type`.
    pub entities: BTreeMap<String, u64>,
    /// The run ended on cancellation, or on the record limit with input left over.
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn total_entities(&self) -> u64 {
        self.entities.values().sum()
    }
}

/// Structured values that get string-encoded in stringify mode.
fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(|v| v.is_object() || v.is_array()),
        _ => false,
    }
}

///
/// Serialize an entity into the record handed to the sink.
///
/// # Arguments
/// - entity: the entity
/// - release_date: `ReleaseDate` of the release, copied onto every record
/// - stringify_nested: encode nested fields as JSON strings
///
pub fn to_record(entity: &Entity, release_date: Option<&str>, stringify_nested: bool) -> serde_json::Result<Value> {
    let mut value = serde_json::to_value(entity)?;
    if let Value::Object(map) = &mut value {
        if stringify_nested {
            for field in map.values_mut() {
                if is_nested(field) {
                    *field = Value::String(field.to_string());
                }
            }
        }
        map.insert(
            RELEASE_DATE_KEY.to_string(),
            release_date.map_or(Value::Null, |d| Value::String(d.to_string())),
        );
    }
    Ok(value)
}

///
/// Run a release through the whole pipeline.
///
/// # Arguments
/// - input: the release, plain or gzip-compressed
/// - config: run settings
/// - sink: receives every record
/// - cancel: stops the run between records when set
///
pub fn run_pipeline<R, S>(input: R, config: &IngestConfig, sink: &mut S, cancel: Cancellation) -> PipelineResult<RunSummary>
where
    R: Read + Send + 'static,
    S: EntitySink + ?Sized,
{
    run_pipeline_with_progress(input, config, sink, cancel, |_| {})
}

/// [run_pipeline], calling `progress` after every record.
pub fn run_pipeline_with_progress<R, S, P>(
    input: R,
    config: &IngestConfig,
    sink: &mut S,
    cancel: Cancellation,
    mut progress: P,
) -> PipelineResult<RunSummary>
where
    R: Read + Send + 'static,
    S: EntitySink + ?Sized,
    P: FnMut(&RunSummary),
{
    config.validate()?;

    let reader = get_dynamic_reader_from(input)?;
    let mut stream = ReleaseReader::spawn(reader, config.reader_options(), cancel.clone())?;

    let mut summary = RunSummary {
        release_date: stream.release_date().map(str::to_string),
        ..Default::default()
    };
    info!(
        "Reading {} released {}",
        stream.header().root_tag,
        summary.release_date.as_deref().unwrap_or("(no date)")
    );

    let mut limit_reached = config.limit == Some(0);
    while !limit_reached {
        let Some(record) = stream.next() else {
            break;
        };
        let record = record?;
        let record = ReleaseRecord::build(&record.tag, record.node)?;
        debug!("Processing {}", record.accession());

        let entities = if config.flatten {
            record.disassemble()?
        } else {
            vec![record.into_entity()]
        };

        for entity in &entities {
            let value = to_record(entity, summary.release_date.as_deref(), config.stringify_nested)
                .map_err(IngestError::from)?;
            sink.accept(entity.entity_type(), value)?;
            *summary
                .entities
                .entry(entity.entity_type().to_string())
                .or_default() += 1;
        }

        summary.records += 1;
        progress(&summary);
        if config.progress_every > 0 && summary.records % config.progress_every == 0 {
            info!(
                "Processed {} records, {} entities",
                summary.records,
                summary.total_entities()
            );
        }

        if config.limit.is_some_and(|limit| summary.records >= limit) {
            info!("Record limit of {} reached", summary.records);
            limit_reached = true;
        }
    }

    // the caller's handle is left alone; dropping the stream stops the producer
    summary.stopped_early = cancel.is_cancelled() || (limit_reached && stream.next().is_some());
    drop(stream);
    sink.finish()?;

    info!(
        "Done: {} records, {} entities",
        summary.records,
        summary.total_entities()
    );
    Ok(summary)
}
