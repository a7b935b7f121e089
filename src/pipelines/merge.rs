use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::config::defs::{FASTQ_EXTS, PipelineError, RunConfig, create_dir};
use crate::pipelines::sample::{MergeSample, Sample};
use crate::pipelines::{collect_input_files, confirm_samples, run_batch};

lazy_static! {
    static ref PE_FASTQ_RE: Regex =
        Regex::new(r"^(?P<sample>.+?)\..*(?P<read>R[12])\..*fastq(?:\.gz)?$")
            .expect("invalid paired-end fastq pattern");
}

/// Merges overlapping paired-end reads with fastp, one merged fastq per
/// R1/R2 pair.
pub async fn run(cfg: Arc<RunConfig>) -> Result<(), PipelineError> {
    let files = collect_input_files(&cfg, FASTQ_EXTS, false)?;
    let pairs = get_pefastqs(files)?;

    let mut samples: Vec<MergeSample> = pairs
        .into_values()
        .map(|(r1, r2)| MergeSample::new(r1, r2, &cfg))
        .collect();

    if samples.iter().all(|s| s.completed()) {
        debug!("all samples are already complete");
        return Ok(());
    }

    if !confirm_samples(&samples, &cfg) {
        info!("Exiting.");
        return Ok(());
    }

    create_dir(&cfg.output)?;
    run_batch(&mut samples, &cfg).await;
    Ok(())
}

/// Pairs input fastq files by sample and read direction. Expects fastq(.gz)
/// files with R1 or R2 in the name; anything else is fatal.
pub fn get_pefastqs(files: Vec<PathBuf>) -> Result<BTreeMap<String, (PathBuf, PathBuf)>, PipelineError> {
    let mut pefastqs: BTreeMap<String, BTreeMap<String, PathBuf>> = BTreeMap::new();

    for f in files {
        let name = f
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let captures = PE_FASTQ_RE.captures(&name).ok_or_else(|| {
            PipelineError::InputError(format!(
                "failed to obtain sample/read info from {}\n\
                 merge mode expects fastq(.gz) files with R1 or R2 in the name",
                name
            ))
        })?;
        let sample = captures["sample"].to_string();
        let read = captures["read"].to_string();

        let reads = pefastqs.entry(sample.clone()).or_default();
        if let Some(previous) = reads.get(&read) {
            return Err(PipelineError::InputError(format!(
                "detected multiple {} files for {}\nfiles: {} and {}",
                read,
                sample,
                f.display(),
                previous.display()
            )));
        }
        reads.insert(read, f);
    }

    let mut pairs = BTreeMap::new();
    for (sample, mut reads) in pefastqs {
        match (reads.remove("R1"), reads.remove("R2")) {
            (Some(r1), Some(r2)) => {
                pairs.insert(sample, (r1, r2));
            }
            _ => {
                return Err(PipelineError::InputError(format!(
                    "please ensure there is an R1 and R2 for all samples; {} is missing a mate",
                    sample
                )));
            }
        }
    }
    Ok(pairs)
}
