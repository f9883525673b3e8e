use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use cvingest_io::Cancellation;
use cvingest_pipeline::{IngestConfig, NdjsonDirSink, RunSummary, run_pipeline_with_progress};

use super::consts::*;

/// Config file (if any) with the command line flags applied on top.
pub fn config_from_matches(matches: &ArgMatches) -> Result<IngestConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => IngestConfig::try_from(Path::new(path))
            .with_context(|| format!("Failed to load ingest config from {}", path))?,
        None => IngestConfig::default(),
    };

    if matches.get_flag("no-flatten") {
        config = config.with_flatten(false);
    }
    if matches.get_flag("stringify") {
        config = config.with_stringify_nested(true);
    }
    if let Some(limit) = matches.get_one::<u64>("limit") {
        config = config.with_limit(Some(*limit));
    }
    if let Some(capacity) = matches.get_one::<usize>("queue-capacity") {
        config = config.with_queue_capacity(*capacity);
    }
    Ok(config)
}

pub fn run_parse(matches: &ArgMatches) -> Result<RunSummary> {
    let input = matches
        .get_one::<String>("input")
        .context("A path to a ClinVar release is required.")?;

    let default_out = DEFAULT_OUT.to_string();
    let output = matches.get_one::<String>("output").unwrap_or(&default_out);

    let config = config_from_matches(matches)?;

    let file = File::open(input).with_context(|| format!("Failed to open {}", input))?;
    let mut sink = NdjsonDirSink::new(Path::new(output))
        .with_context(|| format!("Failed to create output directory {}", output))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("[{elapsed_precise}] {spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = run_pipeline_with_progress(file, &config, &mut sink, Cancellation::new(), |progress| {
        spinner.set_message(format!(
            "{} records, {} entities",
            progress.records,
            progress.total_entities()
        ));
    });
    let summary = match result {
        Ok(summary) => {
            spinner.finish_and_clear();
            summary
        }
        Err(e) => {
            spinner.abandon();
            return Err(e).with_context(|| format!("Failed to ingest {}", input));
        }
    };

    info!(
        "Wrote {} entities from {} records to {}",
        summary.total_entities(),
        summary.records,
        output
    );
    for (entity_type, count) in &summary.entities {
        info!("  {}: {}", entity_type, count);
    }
    if summary.stopped_early {
        info!("Stopped before the end of {}", input);
    }

    Ok(summary)
}
