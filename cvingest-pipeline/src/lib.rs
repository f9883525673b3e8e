//! # Ingestion pipeline for ClinVar releases.
//!
//! Ties the streaming reader, the domain model and the disassembler together and
//! hands the resulting records to an [EntitySink].
//!
//! ```no_run
//! use std::fs::File;
//! use std::path::Path;
//!
//! use cvingest_io::Cancellation;
//! use cvingest_pipeline::{IngestConfig, NdjsonDirSink, run_pipeline};
//!
//! let input = File::open("ClinVarVCVRelease_2024-03.xml.gz").unwrap();
//! let mut sink = NdjsonDirSink::new(Path::new("out")).unwrap();
//! let summary = run_pipeline(input, &IngestConfig::default(), &mut sink, Cancellation::new()).unwrap();
//! println!("{} records", summary.records);
//! ```
//!
pub mod config;
pub mod pipeline;
pub mod sink;

// re-exports
pub use config::{ConfigError, IngestConfig};
pub use pipeline::{PipelineError, RunSummary, run_pipeline, run_pipeline_with_progress, to_record};
pub use sink::{CallbackSink, ChannelSink, EntitySink, NdjsonDirSink, SinkError, VecSink};
