//! Sync command for merging sessions from a fitness platform.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use mantra_core::{Clock, ConflictEngine, EngineError, ExerciseStore, ExternalSource};
use mantra_source::{FileSource, HttpSource, SessionMapping};

use crate::SourceConfig;

/// Source backed by the platform API named in the config.
pub fn http_source(config: &SourceConfig) -> Result<HttpSource> {
    let Some(base_url) = config.base_url.as_deref().filter(|url| !url.trim().is_empty()) else {
        bail!("no source configured; set source.base_url in config.toml or pass --file");
    };
    let Some(api_key) = config.api_key.as_deref() else {
        bail!("source.api_key is not set (or export MANTRA_SOURCE__API_KEY)");
    };
    let source = HttpSource::new(base_url, api_key)
        .context("invalid source configuration")?
        .with_mapping(mapping(config));
    Ok(source)
}

/// Source backed by a JSON lines export.
pub fn file_source(path: &Path, config: &SourceConfig) -> FileSource {
    FileSource::new(path).with_mapping(mapping(config))
}

fn mapping(config: &SourceConfig) -> SessionMapping {
    SessionMapping::default().with_lookback_hours(config.lookback_hours)
}

/// Fetches from `source` and merges the result.
///
/// An unavailable source is reported and skipped, not treated as a failure;
/// the store is left as it was.
pub async fn run<W, S, C, X>(
    writer: &mut W,
    engine: &ConflictEngine<S, C>,
    source: &X,
) -> Result<()>
where
    W: Write,
    S: ExerciseStore,
    C: Clock,
    X: ExternalSource,
{
    let report = match engine.merge_from_source(source).await {
        Ok(report) => report,
        Err(EngineError::SourceUnavailable(err)) => {
            writeln!(writer, "Sync skipped: {err}")?;
            return Ok(());
        }
        Err(err) => return Err(err).context("failed to merge synced exercises"),
    };

    writeln!(
        writer,
        "Fetched {} session(s) from {}: {} added, {} duplicate(s), {} invalid, {} expired.",
        report.fetched,
        source.name(),
        report.inserted,
        report.duplicates,
        report.invalid,
        report.expired
    )?;
    if report.detect.groups > 0 {
        writeln!(
            writer,
            "{} exercise(s) in {} conflict group(s); see 'mantra conflicts'.",
            report.detect.conflicted, report.detect.groups
        )?;
    }
    Ok(())
}
