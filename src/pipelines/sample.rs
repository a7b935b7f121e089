use std::fmt;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::config::defs::{
    CUTADAPT_TAG, FASTP_TAG, FINAL_HEADER_BYTES, FilterSpec, RunConfig, STARCODE_TAG,
};
use crate::pipelines::filters::{get_filter_count, read_filter};
use crate::utils::command::{cutadapt, fastp, run_cmd, starcode};
use crate::utils::fastq::{fastq_to_tsv, labeled_fastq_to_tsv};
use crate::utils::file::{check_output, non_empty, sample_name};
use crate::utils::sam::sam_to_name_labeled_fastq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStatus {
    Complete,
    Incomplete,
    Warn,
    Fail,
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            SampleStatus::Complete => "complete",
            SampleStatus::Incomplete => "incomplete",
            SampleStatus::Warn => "warning",
            SampleStatus::Fail => "failed",
        };
        write!(f, "{}", tag)
    }
}

/// One unit of pipeline work. Implementors own their expected artifact
/// paths; completion state is reconstructed from the filesystem alone.
#[allow(async_fn_in_trait)]
pub trait Sample {
    fn name(&self) -> &str;
    fn status(&self) -> SampleStatus;
    fn set_status(&mut self, status: SampleStatus);

    /// Per-artifact existence map, in stage order.
    fn check(&self, cfg: &RunConfig) -> Vec<(&'static str, bool)>;

    /// Runs the remaining stages strictly in dependency order, stopping at
    /// the first failure.
    async fn run_stages(&mut self, cfg: &RunConfig);

    fn completed(&self) -> bool {
        self.status() == SampleStatus::Complete
    }

    async fn pipeline(&mut self, cfg: &RunConfig) {
        debug!("starting sample: {}", self.name());
        self.run_stages(cfg).await;
        if self.status() == SampleStatus::Incomplete {
            self.set_status(SampleStatus::Complete);
        }
        self.finished();
    }

    fn finished(&self) {
        match self.status() {
            SampleStatus::Complete => info!("✔ {}", self.name()),
            SampleStatus::Warn => warn!("⚠ {}", self.name()),
            _ => error!("✘ {}", self.name()),
        }
    }
}

fn initial_status(exists: &[(&'static str, bool)]) -> SampleStatus {
    if exists.iter().all(|(_, ok)| *ok) {
        SampleStatus::Complete
    } else {
        SampleStatus::Incomplete
    }
}

/// Renders the clustering ratio as a single path-safe token: `3.0` becomes
/// `3` and `2.5` becomes `2_5`, so the clustered artifact name stays one
/// parseable path segment.
pub fn ratio_tag(ratio: f64) -> String {
    if ratio.fract() == 0.0 {
        format!("{}", ratio as i64)
    } else {
        ratio.to_string().replace('.', "_")
    }
}

/// Expected artifact paths for one extract sample, derived purely from the
/// sample name and run parameters. Never touches the filesystem; renaming
/// rules here are the cache schema, so every parameter that changes a
/// stage's output must appear in that stage's file name.
#[derive(Debug, Clone)]
pub struct ExtractArtifacts {
    pub quality: PathBuf,
    pub barcode_fastq: PathBuf,
    pub barcodes: PathBuf,
    pub clustered: PathBuf,
    stem: String,
    out_dir: PathBuf,
    offset: u32,
}

impl ExtractArtifacts {
    pub fn new(name: &str, cfg: &RunConfig) -> Self {
        let quality = cfg
            .pipeline_dir
            .join(format!("{}.q{}.fastq", name, cfg.args.quality));
        let barcode_fastq = cfg
            .pipeline_dir
            .join(format!("{}.q{}.barcode.fastq", name, cfg.args.quality));
        let barcodes = cfg
            .pipeline_dir
            .join(format!("{}.q{}.barcodes.tsv", name, cfg.args.quality));
        let stem = format!(
            "{}.q{}.barcodes.r{}d{}",
            name,
            cfg.args.quality,
            ratio_tag(cfg.args.ratio),
            cfg.args.distance
        );
        let clustered = cfg.pipeline_dir.join(format!("{}.tsv", stem));
        ExtractArtifacts {
            quality,
            barcode_fastq,
            barcodes,
            clustered,
            stem,
            out_dir: cfg.output.clone(),
            offset: cfg.args.offset,
        }
    }

    /// Final artifact path once the minimum count cutoff is known.
    pub fn final_path(&self, min_count: u64) -> PathBuf {
        self.out_dir
            .join(format!("{}.min{}_off{}.tsv", self.stem, min_count, self.offset))
    }

    /// Resolves the configured filter spec against the clustered counts and
    /// names the final artifact. None until the clustered file exists, since
    /// a percent cutoff has no absolute value before then.
    pub fn resolved_final(&self, filter: &FilterSpec) -> Option<PathBuf> {
        if !self.clustered.is_file() {
            return None;
        }
        let min_count = match filter {
            FilterSpec::Count(count) => *count,
            FilterSpec::Percent(percent) => get_filter_count(&self.clustered, *percent).ok()?,
        };
        Some(self.final_path(min_count))
    }
}

pub struct ExtractSample {
    pub name: String,
    pub fastq: PathBuf,
    pub files: ExtractArtifacts,
    pub files_exist: Vec<(&'static str, bool)>,
    status: SampleStatus,
}

impl ExtractSample {
    pub fn new(fastq: PathBuf, cfg: &RunConfig) -> Self {
        let name = sample_name(&fastq);
        let files = ExtractArtifacts::new(&name, cfg);
        let mut sample = ExtractSample {
            name,
            fastq,
            files,
            files_exist: Vec::new(),
            status: SampleStatus::Incomplete,
        };
        sample.files_exist = sample.check(cfg);
        sample.status = initial_status(&sample.files_exist);
        sample
    }

    async fn filter(&mut self, cfg: &RunConfig) -> bool {
        let msg = "quality filtering reads with fastp";
        if check_output(&self.files.quality, msg) {
            return false;
        }

        let qc_dir = cfg.pipeline_dir.join("qc");
        if let Err(e) = fs::create_dir_all(&qc_dir) {
            error!("failed to create {}: {}", qc_dir.display(), e);
            return true;
        }
        let json = qc_dir.join(format!("{}.json", self.name));
        let html = qc_dir.join(format!("{}.html", self.name));

        info!("{}: {}", self.name, msg);
        let args = fastp::filter_args(cfg, &self.fastq, &self.files.quality, &json, &html);
        run_cmd(FASTP_TAG, &args, &self.name, &self.files.quality).await
    }

    async fn cutadapt(&mut self, cfg: &RunConfig) -> bool {
        let msg = "extracting barcodes with cutadapt";

        if cfg.args.skip_trimming && !self.files.barcode_fastq.is_file() {
            if let Err(e) = fs::copy(&self.files.quality, &self.files.barcode_fastq) {
                error!("failed to copy reads for {}: {}", self.name, e);
                return true;
            }
        }

        if check_output(&self.files.barcode_fastq, msg) {
            return false;
        }

        info!("{}: {}", self.name, msg);
        let args = cutadapt::extract_args(cfg, &self.files.quality, &self.files.barcode_fastq);
        run_cmd(CUTADAPT_TAG, &args, &self.name, &self.files.barcode_fastq).await
    }

    fn tabularize(&mut self) -> bool {
        let msg = "converting fastq to tsv";
        if check_output(&self.files.barcodes, msg) {
            return false;
        }
        info!("{}: {}", self.name, msg);
        fastq_to_tsv(&self.files.barcode_fastq, &self.files.barcodes)
    }

    async fn starcode(&mut self, cfg: &RunConfig) -> bool {
        let msg = "clustering barcodes with starcode";
        if check_output(&self.files.clustered, msg) {
            return false;
        }
        info!("{}: {}", self.name, msg);
        let args = starcode::cluster_args(cfg, &self.files.barcode_fastq, &self.files.clustered);
        run_cmd(STARCODE_TAG, &args, &self.name, &self.files.clustered).await
    }

    fn read_filter(&mut self, cfg: &RunConfig) {
        match read_filter(&self.files, cfg) {
            Ok(true) => self.status = SampleStatus::Warn,
            Ok(false) => self.status = SampleStatus::Complete,
            Err(e) => {
                error!("{}: {}", self.name, e);
                self.status = SampleStatus::Fail;
            }
        }
    }
}

impl Sample for ExtractSample {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> SampleStatus {
        self.status
    }

    fn set_status(&mut self, status: SampleStatus) {
        self.status = status;
    }

    fn check(&self, cfg: &RunConfig) -> Vec<(&'static str, bool)> {
        let mut exists = Vec::new();
        for (tag, path) in [
            ("quality", &self.files.quality),
            ("barcodes", &self.files.barcodes),
            ("clustered", &self.files.clustered),
        ] {
            let ok = non_empty(path);
            if path.is_file() && !ok {
                warn!("{} appears to be empty", path.display());
            }
            exists.push((tag, ok));
        }

        let final_ok = match self.files.resolved_final(&cfg.filter) {
            Some(final_path) => {
                let ok = final_path.is_file();
                if ok
                    && final_path
                        .metadata()
                        .map(|m| m.len() <= FINAL_HEADER_BYTES)
                        .unwrap_or(true)
                {
                    warn!("{} appears to be empty", final_path.display());
                }
                ok
            }
            None => false,
        };
        exists.push(("final", final_ok));
        exists
    }

    async fn run_stages(&mut self, cfg: &RunConfig) {
        if self.filter(cfg).await {
            self.status = SampleStatus::Fail;
            return;
        }
        if self.cutadapt(cfg).await {
            self.status = SampleStatus::Fail;
            return;
        }
        if self.tabularize() {
            self.status = SampleStatus::Fail;
            return;
        }
        if self.starcode(cfg).await {
            self.status = SampleStatus::Fail;
            return;
        }
        self.read_filter(cfg);
    }
}

pub struct MergeSample {
    pub name: String,
    pub fastq_r1: PathBuf,
    pub fastq_r2: PathBuf,
    pub merged: PathBuf,
    status: SampleStatus,
}

impl MergeSample {
    pub fn new(fastq_r1: PathBuf, fastq_r2: PathBuf, cfg: &RunConfig) -> Self {
        let name = sample_name(&fastq_r1);
        let merged = cfg.output.join(format!("{}.merged.raw.fastq", name));
        let mut sample = MergeSample {
            name,
            fastq_r1,
            fastq_r2,
            merged,
            status: SampleStatus::Incomplete,
        };
        sample.status = initial_status(&sample.check(cfg));
        sample
    }

    async fn fastp_merge(&mut self, cfg: &RunConfig) -> bool {
        let msg = "merging paired end reads with fastp";
        if check_output(&self.merged, msg) {
            return false;
        }

        let qc_dir = cfg.pipeline_dir.join("merge_qc");
        if let Err(e) = fs::create_dir_all(&qc_dir) {
            error!("failed to create {}: {}", qc_dir.display(), e);
            return true;
        }
        let json = qc_dir.join(format!("{}.json", self.name));
        let html = qc_dir.join(format!("{}.html", self.name));

        info!("{}: {}", self.name, msg);
        let args = fastp::merge_args(cfg, &self.fastq_r1, &self.fastq_r2, &self.merged, &json, &html);
        run_cmd(FASTP_TAG, &args, &self.name, &self.merged).await
    }
}

impl Sample for MergeSample {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> SampleStatus {
        self.status
    }

    fn set_status(&mut self, status: SampleStatus) {
        self.status = status;
    }

    fn check(&self, _cfg: &RunConfig) -> Vec<(&'static str, bool)> {
        let ok = non_empty(&self.merged);
        if self.merged.is_file() && !ok {
            warn!("{} appears to be empty", self.merged.display());
        }
        vec![("final", ok)]
    }

    async fn run_stages(&mut self, cfg: &RunConfig) {
        if self.fastp_merge(cfg).await {
            self.status = SampleStatus::Fail;
        }
    }
}

pub struct ScrnaSample {
    pub name: String,
    pub sam: PathBuf,
    pub fastq: PathBuf,
    pub barcode_fastq: PathBuf,
    pub barcodes: PathBuf,
    status: SampleStatus,
}

impl ScrnaSample {
    pub fn new(sam: PathBuf, cfg: &RunConfig) -> Self {
        let name = sample_name(&sam);
        let fastq = cfg
            .pipeline_dir
            .join(format!("{}.umi_cell_labeled.fastq", name));
        let barcode_fastq = cfg
            .pipeline_dir
            .join(format!("{}.umi_cell_labeled.barcode.fastq", name));
        let barcodes = cfg
            .output
            .join(format!("{}.umi_cell_labeled.barcode.tsv", name));
        let mut sample = ScrnaSample {
            name,
            sam,
            fastq,
            barcode_fastq,
            barcodes,
            status: SampleStatus::Incomplete,
        };
        sample.status = initial_status(&sample.check(cfg));
        sample
    }

    fn sam_to_fastq(&mut self) -> bool {
        let msg = "converting sam to labeled fastq";
        if check_output(&self.fastq, msg) {
            return false;
        }
        info!("{}: {}", self.name, msg);
        sam_to_name_labeled_fastq(&self.name, &self.sam, &self.fastq)
    }

    async fn cutadapt(&mut self, cfg: &RunConfig) -> bool {
        let msg = "extracting barcodes with cutadapt";
        if check_output(&self.barcode_fastq, msg) {
            return false;
        }
        info!("{}: {}", self.name, msg);
        let args = cutadapt::scrna_args(cfg, &self.fastq, &self.barcode_fastq);
        run_cmd(CUTADAPT_TAG, &args, &self.name, &self.barcode_fastq).await
    }

    fn tabularize(&mut self) -> bool {
        let msg = "converting labeled fastq to tsv";
        if check_output(&self.barcodes, msg) {
            return false;
        }
        info!("{}: {}", self.name, msg);
        labeled_fastq_to_tsv(&self.barcode_fastq, &self.barcodes)
    }
}

impl Sample for ScrnaSample {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> SampleStatus {
        self.status
    }

    fn set_status(&mut self, status: SampleStatus) {
        self.status = status;
    }

    fn check(&self, _cfg: &RunConfig) -> Vec<(&'static str, bool)> {
        vec![
            ("fastq", non_empty(&self.fastq)),
            ("barcode_fastq", non_empty(&self.barcode_fastq)),
            ("barcodes", non_empty(&self.barcodes)),
        ]
    }

    async fn run_stages(&mut self, cfg: &RunConfig) {
        if self.sam_to_fastq() {
            self.status = SampleStatus::Fail;
            return;
        }
        if self.cutadapt(cfg).await {
            self.status = SampleStatus::Fail;
            return;
        }
        if self.tabularize() {
            self.status = SampleStatus::Fail;
        }
    }
}
