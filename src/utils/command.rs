/// Functions and structs for building and running external tool commands

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, error};
use which::which;

use crate::config::defs::{MODULE_TOOLS, PipelineError, STARCODE_TAG};

pub mod fastp {
    use std::path::Path;

    use crate::config::defs::RunConfig;

    const EXTRACT_DEFAULT_ARGS: &str = "--dont_eval_duplication";
    const MERGE_DEFAULT_ARGS: &str = "-m -c -G -Q -L";

    /// Quality-filter invocation for the extract pipeline.
    pub fn filter_args(
        cfg: &RunConfig,
        input: &Path,
        output: &Path,
        json: &Path,
        html: &Path,
    ) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-i".to_string());
        args_vec.push(input.to_string_lossy().to_string());
        args_vec.push("-o".to_string());
        args_vec.push(output.to_string_lossy().to_string());
        args_vec.push("-q".to_string());
        args_vec.push(cfg.args.quality.to_string());
        args_vec.push("-u".to_string());
        args_vec.push(cfg.args.unqualified_percent.to_string());
        args_vec.push("-w".to_string());
        args_vec.push(cfg.args.threads.to_string());
        args_vec.push("-h".to_string());
        args_vec.push(html.to_string_lossy().to_string());
        args_vec.push("-j".to_string());
        args_vec.push(json.to_string_lossy().to_string());
        push_extra(&mut args_vec, cfg.args.fastp_args.as_deref(), EXTRACT_DEFAULT_ARGS);
        args_vec
    }

    /// Paired-end merge invocation for the merge pipeline.
    pub fn merge_args(
        cfg: &RunConfig,
        fastq_r1: &Path,
        fastq_r2: &Path,
        merged: &Path,
        json: &Path,
        html: &Path,
    ) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-i".to_string());
        args_vec.push(fastq_r1.to_string_lossy().to_string());
        args_vec.push("-I".to_string());
        args_vec.push(fastq_r2.to_string_lossy().to_string());
        args_vec.push("-w".to_string());
        args_vec.push(cfg.args.threads.to_string());
        args_vec.push("-j".to_string());
        args_vec.push(json.to_string_lossy().to_string());
        args_vec.push("-h".to_string());
        args_vec.push(html.to_string_lossy().to_string());
        args_vec.push("--merged_out".to_string());
        args_vec.push(merged.to_string_lossy().to_string());
        push_extra(&mut args_vec, cfg.args.fastp_args.as_deref(), MERGE_DEFAULT_ARGS);
        args_vec
    }

    fn push_extra(args_vec: &mut Vec<String>, extra: Option<&str>, default: &str) {
        for arg in extra.unwrap_or(default).split_whitespace() {
            args_vec.push(arg.to_string());
        }
    }
}

pub mod cutadapt {
    use std::path::Path;

    use crate::config::defs::RunConfig;

    /// Barcode extraction for the extract pipeline. The trimmed length is
    /// bounded by the target length plus or minus the clustering distance.
    pub fn extract_args(cfg: &RunConfig, input: &Path, output: &Path) -> Vec<String> {
        let min_length = cfg.args.length.saturating_sub(u32::from(cfg.args.distance));
        let max_length = cfg.args.length + u32::from(cfg.args.distance);
        args(cfg, input, output, min_length, max_length, cfg.args.unlinked_adapters)
    }

    /// Barcode extraction for the scrna pipeline; always unlinked adapters.
    pub fn scrna_args(cfg: &RunConfig, input: &Path, output: &Path) -> Vec<String> {
        args(cfg, input, output, cfg.args.minimum_length, cfg.args.length, true)
    }

    fn args(
        cfg: &RunConfig,
        input: &Path,
        output: &Path,
        min_length: u32,
        max_length: u32,
        unlinked: bool,
    ) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-e".to_string());
        args_vec.push(cfg.args.error.to_string());
        args_vec.push("-j".to_string());
        args_vec.push(cfg.args.threads.to_string());
        args_vec.push(format!("--minimum-length={}", min_length));
        args_vec.push(format!("--maximum-length={}", max_length));
        if unlinked {
            args_vec.push("-g".to_string());
            args_vec.push(cfg.args.upstream_adapter.clone());
            args_vec.push("-a".to_string());
            args_vec.push(cfg.args.downstream_adapter.clone());
        } else {
            args_vec.push("-g".to_string());
            args_vec.push(format!(
                "{}...{}",
                cfg.args.upstream_adapter, cfg.args.downstream_adapter
            ));
        }
        for arg in cfg.args.cutadapt_args.split_whitespace() {
            args_vec.push(arg.to_string());
        }
        args_vec.push("-o".to_string());
        args_vec.push(output.to_string_lossy().to_string());
        args_vec.push(input.to_string_lossy().to_string());
        args_vec
    }
}

pub mod starcode {
    use std::path::Path;

    use crate::config::defs::RunConfig;

    /// Message-passing clustering of extracted barcodes.
    pub fn cluster_args(cfg: &RunConfig, input: &Path, output: &Path) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-d".to_string());
        args_vec.push(cfg.args.distance.to_string());
        args_vec.push("-r".to_string());
        args_vec.push(cfg.args.ratio.to_string());
        args_vec.push("-t".to_string());
        args_vec.push(cfg.args.threads.to_string());
        args_vec.push("-i".to_string());
        args_vec.push(input.to_string_lossy().to_string());
        args_vec.push("-o".to_string());
        args_vec.push(output.to_string_lossy().to_string());
        args_vec
    }
}

/// Verifies that every external tool the module needs is on PATH.
pub fn check_tools(module: &str) -> Result<(), PipelineError> {
    let required = MODULE_TOOLS
        .get(module)
        .ok_or_else(|| PipelineError::InvalidConfig(format!("Invalid module: {}", module)))?;

    let mut missing: Vec<&str> = Vec::new();
    for tool in required {
        match which(tool) {
            Ok(path) => debug!("found {} at {}", tool, path.display()),
            Err(_) => missing.push(tool),
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::MissingTools(missing.join(", ")));
    }
    Ok(())
}

/// Failure test applied to every finished subprocess: nonzero exit, or the
/// expected output file is missing or empty.
pub fn exit_status(status: &ExitStatus, file: &Path) -> bool {
    !status.success() || file.metadata().map(|m| m.len() == 0).unwrap_or(true)
}

/// Runs one external command to completion and classifies the outcome.
/// Returns true on failure; subprocess failures never escape as errors.
pub async fn run_cmd(tool: &str, args: &[String], sample: &str, output: &Path) -> bool {
    let rendered = format!("{} {}", tool, args.join(" "));

    let result = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let out = match result {
        Ok(out) => out,
        Err(e) => {
            error!("failed to spawn {}: {}. Is {} installed?", tool, e, tool);
            error!("[{}Error]: Subprocess for sample failed: {}", capitalize(tool), sample);
            return true;
        }
    };

    let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&out.stderr));

    // starcode floods its output with progress lines
    let text = if tool == STARCODE_TAG {
        text.lines()
            .filter(|line| !line.starts_with("progress"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text
    };

    if exit_status(&out.status, output) {
        error!("subcommand:\n  {}", rendered);
        error!("subcommand output:\n{}", prefix_lines(&text));
        error!("[{}Error]: Subprocess for sample failed: {}", capitalize(tool), sample);
        true
    } else {
        debug!("subcommand:\n  {}", rendered);
        debug!("subcommand output:\n{}", prefix_lines(&text));
        false
    }
}

fn prefix_lines(text: &str) -> String {
    text.lines()
        .map(|line| format!("| {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn capitalize(tool: &str) -> String {
    let mut chars = tool.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
