pub mod extract;
pub mod filters;
pub mod merge;
pub mod receipt;
pub mod sample;
pub mod scrna;

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::config::defs::{PipelineError, RunConfig};
use crate::pipelines::sample::{Sample, SampleStatus};
use crate::utils::file::sample_name;

/// Scans the input directory and validates its contents eagerly, before any
/// sample is constructed. Every problem found here is fatal.
pub fn collect_input_files(
    cfg: &RunConfig,
    exts: &[&str],
    check_duplicates: bool,
) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = fs::read_dir(&cfg.input_dir).map_err(|e| {
        PipelineError::InputError(format!("cannot read {}: {}", cfg.input_dir.display(), e))
    })?;

    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry.map_err(PipelineError::IOError)?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with('.') {
            continue;
        }
        candidates.push(path);
    }
    candidates.sort();

    if candidates.is_empty() {
        return Err(PipelineError::InputError(format!(
            "source dir {} appears to be empty...",
            cfg.input_dir.display()
        )));
    }

    let bad_files: Vec<String> = candidates
        .iter()
        .filter_map(|f| {
            let name = f.file_name()?.to_string_lossy().into_owned();
            if exts.iter().any(|ext| name.ends_with(ext)) {
                None
            } else {
                Some(name)
            }
        })
        .collect();

    let broken_symlinks: Vec<String> = candidates
        .iter()
        .filter(|f| f.is_symlink() && !f.exists())
        .map(|f| f.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
        .collect();

    let mut duplicates: Vec<String> = Vec::new();
    if check_duplicates {
        let mut stems: HashMap<String, usize> = HashMap::new();
        for f in &candidates {
            *stems.entry(sample_name(f)).or_insert(0) += 1;
        }
        duplicates = stems
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(stem, _)| stem)
            .collect();
        duplicates.sort();
    }

    if !bad_files.is_empty() {
        error!(
            "there is a non {} file in the provided input directory: {}",
            exts.join("/"),
            bad_files.join("; ")
        );
    }
    if !broken_symlinks.is_empty() {
        error!(
            "there is a broken symlink in the provided input directory: {}\n\
             If using docker: ensure that symlinks are resolved within the mounted volume \
             or they won't be found.",
            broken_symlinks.join("; ")
        );
    }
    if !duplicates.is_empty() {
        error!(
            "there appear to be duplicate files in the input directory for sample(s): {}\n\
             See the merge module for overlapping PE reads.",
            duplicates.join("; ")
        );
    }
    if !bad_files.is_empty() || !broken_symlinks.is_empty() || !duplicates.is_empty() {
        return Err(PipelineError::InputError(format!(
            "invalid contents in {}",
            cfg.input_dir.display()
        )));
    }

    match &cfg.args.samples {
        Some(samples) => filter_input_by_sample(candidates, samples),
        None => Ok(candidates),
    }
}

/// Keeps only the candidate files whose sample name appears in the
/// user-provided allowlist; unknown names are fatal.
fn filter_input_by_sample(
    candidates: Vec<PathBuf>,
    samples: &str,
) -> Result<Vec<PathBuf>, PipelineError> {
    let wanted: Vec<&str> = samples.split(',').map(str::trim).collect();

    let mut found: Vec<String> = Vec::new();
    let mut files: Vec<PathBuf> = Vec::new();
    let mut ignored = 0usize;
    for f in candidates {
        let name = sample_name(&f);
        if wanted.contains(&name.as_str()) {
            found.push(name);
            files.push(f);
        } else {
            ignored += 1;
        }
    }

    let not_found: Vec<&str> = wanted
        .iter()
        .filter(|s| !found.iter().any(|f| f == *s))
        .copied()
        .collect();
    if !not_found.is_empty() {
        return Err(PipelineError::InputError(format!(
            "unknown sample(s) -> {}",
            not_found.join(", ")
        )));
    }

    if ignored > 0 {
        info!("ignoring {} samples", ignored);
    }
    Ok(files)
}

/// Asks for confirmation on stdin. Anything but y/yes declines.
pub fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Logs the queue split into processed and pending samples, then asks for
/// confirmation unless --yes. Returns false when the user declines.
pub fn confirm_samples<S: Sample>(samples: &[S], cfg: &RunConfig) -> bool {
    let completed: Vec<&str> = samples
        .iter()
        .filter(|s| s.completed())
        .map(|s| s.name())
        .collect();
    let pending: Vec<&str> = samples
        .iter()
        .filter(|s| !s.completed())
        .map(|s| s.name())
        .collect();

    if !completed.is_empty() {
        info!("processed: {}", completed.join(", "));
    }
    if !pending.is_empty() {
        info!("to be processed: {}", pending.join(", "));
    }
    info!("There are {} samples to finish processing.", pending.len());

    if cfg.args.yes || pending.is_empty() {
        return true;
    }
    confirm("Continue with these samples?")
}

/// Runs every incomplete sample strictly in order. Stage failures are
/// captured per sample; the batch always runs to the end.
pub async fn run_batch<S: Sample>(samples: &mut [S], cfg: &RunConfig) {
    let names: Vec<&str> = samples
        .iter()
        .filter(|s| !s.completed())
        .map(|s| s.name())
        .collect();
    debug!("processing {} samples: {}", names.len(), names.join(";"));

    for sample in samples.iter_mut() {
        if sample.completed() {
            continue;
        }
        sample.pipeline(cfg).await;
        debug!("sample {} finished: {}", sample.name(), sample.status());
    }

    let failed = samples
        .iter()
        .filter(|s| s.status() == SampleStatus::Fail)
        .count();
    if failed > 0 {
        error!(
            "Failed to complete {} samples.\nSee {} for more info.",
            failed,
            cfg.log_file.display()
        );
    }
}
