use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::config::defs::{PipelineError, RunConfig, TSV_EXTS};
use crate::pipelines::collect_input_files;
use crate::utils::file::sample_name;

struct ReceiptRow {
    barcode: String,
    count: u64,
    sample: String,
    percent: f64,
}

/// Combines the per-sample outputs of extract into one tsv, annotating each
/// row with its sample and the barcode's share of that sample's reads, plus
/// per-barcode overlap columns unless --no-overlap.
pub fn run(cfg: &RunConfig) -> Result<(), PipelineError> {
    let files = collect_input_files(cfg, TSV_EXTS, true)?;
    let by_sample: BTreeMap<String, PathBuf> = files
        .into_iter()
        .map(|f| (sample_name(&f), f))
        .collect();

    info!("Combining output files for {} samples.", by_sample.len());
    debug!(
        "samples: {}",
        by_sample.keys().cloned().collect::<Vec<_>>().join(", ")
    );

    let mut rows: Vec<ReceiptRow> = Vec::new();
    for (sample, file) in &by_sample {
        let sample_rows = read_final_tsv(sample, file).map_err(|e| {
            PipelineError::InputError(format!(
                "{}\ncheck files in input directory: {}",
                e,
                cfg.input_dir.display()
            ))
        })?;
        rows.extend(sample_rows);
    }

    // overlap: which samples share each barcode
    let mut overlap: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if !cfg.args.no_overlap {
        for row in &rows {
            overlap
                .entry(row.barcode.clone())
                .or_default()
                .push(row.sample.clone());
        }
        for samples in overlap.values_mut() {
            samples.sort();
        }
    }

    rows.sort_by(|a, b| {
        b.sample
            .cmp(&a.sample)
            .then(b.count.cmp(&a.count))
            .then(b.barcode.cmp(&a.barcode))
    });

    write_combined(cfg, &rows, &overlap).map_err(PipelineError::Other)?;
    info!("wrote {}", cfg.output.display());
    Ok(())
}

fn read_final_tsv(sample: &str, file: &Path) -> Result<Vec<ReceiptRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(file)
        .with_context(|| format!("failed to open {}", file.display()))?;

    let headers = reader.headers()?.clone();
    let barcode_idx = headers
        .iter()
        .position(|h| h == "barcode")
        .ok_or_else(|| anyhow!("missing column barcode in {}", file.display()))?;
    let count_idx = headers
        .iter()
        .position(|h| h == "count")
        .ok_or_else(|| anyhow!("missing column count in {}", file.display()))?;

    let mut barcodes: Vec<(String, u64)> = Vec::new();
    let mut total = 0u64;
    for record in reader.records() {
        let record = record.with_context(|| format!("failed to read {}", file.display()))?;
        let barcode = record
            .get(barcode_idx)
            .ok_or_else(|| anyhow!("malformed row in {}", file.display()))?
            .to_string();
        let count: u64 = record
            .get(count_idx)
            .ok_or_else(|| anyhow!("malformed row in {}", file.display()))?
            .parse()
            .with_context(|| format!("malformed count column in {}", file.display()))?;
        total += count;
        barcodes.push((barcode, count));
    }

    Ok(barcodes
        .into_iter()
        .map(|(barcode, count)| {
            let percent = if total == 0 {
                0.0
            } else {
                round5(count as f64 / total as f64 * 100.0)
            };
            ReceiptRow {
                barcode,
                count,
                sample: sample.to_string(),
                percent,
            }
        })
        .collect())
}

fn write_combined(
    cfg: &RunConfig,
    rows: &[ReceiptRow],
    overlap: &BTreeMap<String, Vec<String>>,
) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&cfg.output)
        .with_context(|| format!("failed to create {}", cfg.output.display()))?;

    if cfg.args.no_overlap {
        writer.write_record(["barcode", "count", "sample", "percent"])?;
        for row in rows {
            let count = row.count.to_string();
            let percent = row.percent.to_string();
            writer.write_record([
                row.barcode.as_str(),
                count.as_str(),
                row.sample.as_str(),
                percent.as_str(),
            ])?;
        }
    } else {
        writer.write_record(["barcode", "count", "sample", "percent", "samples", "n_samples"])?;
        for row in rows {
            let samples = overlap.get(&row.barcode).cloned().unwrap_or_default();
            let count = row.count.to_string();
            let percent = row.percent.to_string();
            let joined = samples.join(";");
            let n_samples = samples.len().to_string();
            writer.write_record([
                row.barcode.as_str(),
                count.as_str(),
                row.sample.as_str(),
                percent.as_str(),
                joined.as_str(),
                n_samples.as_str(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn round5(value: f64) -> f64 {
    (value * 1e5).round() / 1e5
}
