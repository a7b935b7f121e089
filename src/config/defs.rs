use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use thiserror::Error;

use crate::cli::Arguments;

// External software
pub const FASTP_TAG: &str = "fastp";
pub const CUTADAPT_TAG: &str = "cutadapt";
pub const STARCODE_TAG: &str = "starcode";

// Pipeline modules
pub const EXTRACT_TAG: &str = "extract";
pub const MERGE_TAG: &str = "merge";
pub const SCRNA_TAG: &str = "scrna";
pub const RECEIPT_TAG: &str = "receipt";

pub const FASTQ_EXTS: &[&str] = &[".fastq", ".fastq.gz"];
pub const SAM_EXTS: &[&str] = &[".sam"];
pub const TSV_EXTS: &[&str] = &[".tsv"];

lazy_static! {
    pub static ref MODULE_TOOLS: HashMap<&'static str, Vec<&'static str>> = {
        let mut m = HashMap::new();
        m.insert(EXTRACT_TAG, vec![FASTP_TAG, CUTADAPT_TAG, STARCODE_TAG]);
        m.insert(MERGE_TAG, vec![FASTP_TAG]);
        m.insert(SCRNA_TAG, vec![CUTADAPT_TAG]);
        m.insert(RECEIPT_TAG, vec![]);
        m
    };
}

// Size of a bare `barcode\tcount` header line, the smallest final artifact a
// successful run can leave behind.
pub const FINAL_HEADER_BYTES: u64 = 14;

/// Minimum-abundance cutoff for the final filter. Exactly one form is in
/// effect for a run; a percent cutoff is resolved against the clustered
/// file's total read count before any row is filtered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterSpec {
    Count(u64),
    Percent(f64),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("[InputError]: {0}")]
    InputError(String),

    #[error(
        "[PermissionError]: {0}\n\
         If you are using docker please supply a user flag, for example `-u $(id -u):$(id -g)`"
    )]
    Permission(String),

    #[error("missing runtime dependencies: {0}")]
    MissingTools(String),

    #[error("io error: {0}")]
    IOError(#[from] io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug)]
pub struct RunConfig {
    pub cwd: PathBuf,
    pub input_dir: PathBuf,
    pub pipeline_dir: PathBuf,
    /// Directory of final artifacts; a single file path in receipt mode.
    pub output: PathBuf,
    pub log_file: PathBuf,
    pub filter: FilterSpec,
    pub args: Arguments,
}

impl RunConfig {
    /// Validates the parsed arguments and resolves the per-module directory
    /// defaults. Filter mutual exclusivity is enforced here, before any
    /// sample is constructed.
    pub fn from_args(args: Arguments, cwd: PathBuf) -> Result<RunConfig, PipelineError> {
        let filter = match (args.filter_count, args.filter_percent) {
            (Some(_), Some(_)) => {
                return Err(PipelineError::InvalidConfig(
                    "`--filter-count` and `--filter-percent` are mutually exclusive".to_string(),
                ));
            }
            (Some(count), None) => FilterSpec::Count(count),
            (None, Some(percent)) => FilterSpec::Percent(percent),
            (None, None) => FilterSpec::Percent(0.005),
        };

        let input = match &args.input {
            Some(input) => resolve_path(input, &cwd),
            None if args.module == RECEIPT_TAG => cwd.join("outs"),
            None => {
                return Err(PipelineError::InvalidConfig(
                    "input directory required (-i)".to_string(),
                ));
            }
        };
        if !input.is_dir() {
            return Err(PipelineError::InputError(format!(
                "input directory {} does not exist",
                input.display()
            )));
        }

        let output = match &args.output {
            Some(out) => resolve_path(out, &cwd),
            None => match args.module.as_str() {
                MERGE_TAG => cwd.join("mergedfastqs"),
                RECEIPT_TAG => cwd.join("combined.tsv"),
                _ => cwd.join("outs"),
            },
        };

        let pipeline_dir = resolve_path(&args.pipeline, &cwd);
        match pipeline_dir.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => {
                return Err(PipelineError::InputError(format!(
                    "pipeline parent directory for {} does not exist",
                    pipeline_dir.display()
                )));
            }
        }
        create_dir(&pipeline_dir)?;

        let log_file = match &args.log_file {
            Some(path) => resolve_path(path, &cwd),
            None => pipeline_dir.join("barseq.log"),
        };

        Ok(RunConfig {
            cwd,
            input_dir: input,
            pipeline_dir,
            output,
            log_file,
            filter,
            args,
        })
    }
}

fn resolve_path(path: &str, cwd: &Path) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() { path } else { cwd.join(path) }
}

/// Creates a directory, mapping a permission failure onto the deployment
/// hint users actually need.
pub fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => {
            PipelineError::Permission(format!("cannot write to {}", path.display()))
        }
        _ => PipelineError::IOError(e),
    })
}
