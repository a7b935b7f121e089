use std::sync::Arc;

use tracing::{debug, info};

use crate::config::defs::{PipelineError, RunConfig, SAM_EXTS, create_dir};
use crate::pipelines::sample::{Sample, ScrnaSample};
use crate::pipelines::{collect_input_files, confirm_samples, run_batch};

/// Extracts expressed DNA barcodes from scRNA-seq sam files. Designed for
/// interoperability with the 10X workflow: bam output should be converted
/// to sam first, ideally restricted to unmapped reads.
pub async fn run(cfg: Arc<RunConfig>) -> Result<(), PipelineError> {
    let files = collect_input_files(&cfg, SAM_EXTS, true)?;

    let mut samples: Vec<ScrnaSample> = files
        .into_iter()
        .map(|f| ScrnaSample::new(f, &cfg))
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
