use std::sync::Arc;

use tracing::{debug, info};

use crate::config::defs::{FASTQ_EXTS, FilterSpec, PipelineError, RunConfig, create_dir};
use crate::pipelines::sample::{ExtractSample, Sample, ratio_tag};
use crate::pipelines::{collect_input_files, confirm, run_batch};

/// Extracts DNA barcodes from a directory of fastq files, one sample per
/// file. Sample names are delimited with a "."; anything after the first
/// period in a file name is ignored.
pub async fn run(cfg: Arc<RunConfig>) -> Result<(), PipelineError> {
    let files = collect_input_files(&cfg, FASTQ_EXTS, true)?;

    info!("checking {}", cfg.pipeline_dir.display());
    let mut samples: Vec<ExtractSample> = files
        .into_iter()
        .map(|f| ExtractSample::new(f, &cfg))
        .collect();

    if samples.iter().all(|s| s.completed()) {
        debug!("all samples are already complete");
        return Ok(());
    }

    show_sample_queue(&samples, &cfg);
    let pending = samples.iter().filter(|s| !s.completed()).count();
    info!("There are {} samples to finish processing.", pending);
    if !cfg.args.yes && !confirm("Continue with these samples?") {
        info!("Exiting.");
        return Ok(());
    }

    create_dir(&cfg.output)?;
    run_batch(&mut samples, &cfg).await;
    Ok(())
}

/// Logs one line per sample showing which artifacts already exist.
fn show_sample_queue(samples: &[ExtractSample], cfg: &RunConfig) {
    let filter_column = match cfg.filter {
        FilterSpec::Percent(_) => "min(%)",
        FilterSpec::Count(_) => "min(N)",
    };
    let columns = format!(
        "q{} | barcodes | r{}d{} | {}_off{}",
        cfg.args.quality,
        ratio_tag(cfg.args.ratio),
        cfg.args.distance,
        filter_column,
        cfg.args.offset
    );
    info!("sample queue [{}]", columns);

    for sample in samples {
        let cells: Vec<&str> = sample
            .files_exist
            .iter()
            .map(|(_, ok)| if *ok { "✔" } else { "queued" })
            .collect();
        info!("  {}: {}", sample.name(), cells.join(" | "));
    }
}
