use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::{Read, Reader, Record};
use tracing::{debug, error};

fn aux_string(record: &Record, tag: &[u8]) -> Option<String> {
    match record.aux(tag) {
        Ok(Aux::String(value)) => Some(value.to_string()),
        _ => None,
    }
}

/// Converts a sam file into a fastq whose read names carry the umi and cell
/// barcode as `<name>_<umi>_<cell>`. Reads missing either tag are dropped.
/// Returns true on failure.
pub fn sam_to_name_labeled_fastq(sample: &str, sam_file: &Path, out_file: &Path) -> bool {
    match convert(sam_file, out_file) {
        Ok(written) => {
            debug!("{}: labeled {} sam records", sample, written);
            false
        }
        Err(e) => {
            error!(
                "couldn't convert sam file {}: {}. Is it the correct format?",
                sam_file.display(),
                e
            );
            true
        }
    }
}

fn convert(sam_file: &Path, out_file: &Path) -> Result<u64> {
    let mut reader = Reader::from_path(sam_file).context("failed to open sam file")?;
    let mut writer = BufWriter::new(File::create(out_file)?);

    let mut record = Record::new();
    let mut written = 0u64;
    while let Some(result) = reader.read(&mut record) {
        result.context("failed to parse sam record")?;

        // prefer corrected tags, stripping the gem-group suffix from CB
        let cell = match aux_string(&record, b"CB") {
            Some(cb) => Some(cb.split('-').next().unwrap_or_default().to_string()),
            None => aux_string(&record, b"CR"),
        };
        let umi = aux_string(&record, b"UB").or_else(|| aux_string(&record, b"UR"));

        if let (Some(cell), Some(umi)) = (cell, umi) {
            let qual: String = record.qual().iter().map(|q| (q + 33) as char).collect();
            writeln!(
                writer,
                "@{}_{}_{}",
                String::from_utf8_lossy(record.qname()),
                umi,
                cell
            )?;
            writer.write_all(&record.seq().as_bytes())?;
            writeln!(writer)?;
            writeln!(writer, "+")?;
            writeln!(writer, "{}", qual)?;
            written += 1;
        }
    }
    writer.flush()?;
    Ok(written)
}
