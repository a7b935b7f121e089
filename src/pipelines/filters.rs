use std::path::Path;

use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, warn};

use crate::config::defs::{FilterSpec, RunConfig};
use crate::pipelines::sample::ExtractArtifacts;

/// Sums the count column of a clustered tsv and converts a percent cutoff
/// into an absolute minimum read count. The percent is of the clustered
/// total, not of the raw read count.
pub fn get_filter_count(file_in: &Path, filter_percent: f64) -> Result<u64> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(file_in)
        .with_context(|| format!("failed to open {}", file_in.display()))?;

    let mut total = 0u64;
    let mut rows = 0u64;
    for record in reader.records() {
        let record = record.with_context(|| format!("failed to read {}", file_in.display()))?;
        let count: u64 = record
            .get(1)
            .ok_or_else(|| anyhow!("malformed clustered row in {}", file_in.display()))?
            .parse()
            .with_context(|| format!("malformed count column in {}", file_in.display()))?;
        total += count;
        rows += 1;
    }

    if rows == 0 {
        return Err(anyhow!(
            "failed to determine filter cutoff for empty file {}. Please remove it and try again",
            file_in.display()
        ));
    }
    Ok((total as f64 * filter_percent / 100.0).round() as u64)
}

/// Applies the final abundance and length filters to a clustered tsv,
/// writing surviving rows under a `barcode\tcount` header.
/// Returns Ok(true) when zero rows survive.
pub fn filter_by_count(
    file_in: &Path,
    filter_count: u64,
    length: u32,
    offset: u32,
    final_path: &Path,
) -> Result<bool> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(file_in)
        .with_context(|| format!("failed to open {}", file_in.display()))?;
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(final_path)
        .with_context(|| format!("failed to create {}", final_path.display()))?;
    writer.write_record(["barcode", "count"])?;

    let mut kept = 0u64;
    for record in reader.records() {
        let record = record.with_context(|| format!("failed to read {}", file_in.display()))?;
        let barcode = record
            .get(0)
            .ok_or_else(|| anyhow!("malformed clustered row in {}", file_in.display()))?;
        let count_field = record
            .get(1)
            .ok_or_else(|| anyhow!("malformed clustered row in {}", file_in.display()))?;
        let count: u64 = count_field
            .parse()
            .with_context(|| format!("malformed count column in {}", file_in.display()))?;

        let length_diff = (barcode.chars().count() as i64 - i64::from(length)).abs();
        if count > filter_count && length_diff <= i64::from(offset) {
            writer.write_record([barcode, count_field])?;
            kept += 1;
        }
    }
    writer.flush()?;

    if kept == 0 {
        warn!("no barcodes passed final length and abundance filters");
        return Ok(true);
    }
    Ok(false)
}

/// Final filtering for one sample's clustered counts. Ok(true) means the
/// result was empty and the sample should end in a warning state.
pub fn read_filter(files: &ExtractArtifacts, cfg: &RunConfig) -> Result<bool> {
    let min_count = match cfg.filter {
        FilterSpec::Count(count) => {
            debug!("post-clustering filtering with {} read cutoff", count);
            count
        }
        FilterSpec::Percent(percent) => {
            debug!("post-clustering filtering with {}% cutoff", percent);
            get_filter_count(&files.clustered, percent)?
        }
    };

    filter_by_count(
        &files.clustered,
        min_count,
        cfg.args.length,
        cfg.args.offset,
        &files.final_path(min_count),
    )
}
