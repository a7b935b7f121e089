use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use seq_io::fastq::{OwnedRecord, Reader};
use tracing::error;

use crate::utils::file::is_gzipped;

/// Reader over a fastq file that may or may not be gzipped.
pub enum FileReader {
    Gzipped(GzDecoder<File>),
    Uncompressed(BufReader<File>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileReader::Gzipped(reader) => reader.read(buf),
            FileReader::Uncompressed(reader) => reader.read(buf),
        }
    }
}

pub fn fastq_reader(path: &Path) -> io::Result<Reader<FileReader>> {
    let is_gz = is_gzipped(path)?;
    let file = File::open(path)?;
    let reader = if is_gz {
        FileReader::Gzipped(GzDecoder::new(file))
    } else {
        FileReader::Uncompressed(BufReader::new(file))
    };
    Ok(Reader::new(reader))
}

/// Tabularizes a barcode fastq into `info\tbarcode` rows, one per read.
/// Returns true on failure.
pub fn fastq_to_tsv(in_file: &Path, out_file: &Path) -> bool {
    match convert(in_file, out_file, "info\tbarcode", write_plain_row) {
        Ok(0) => {
            error!(
                "failed to convert fastq to tsv: {}\nno reads found, check cutadapt output",
                in_file.display()
            );
            true
        }
        Ok(_) => false,
        Err(e) => {
            error!(
                "failed to convert fastq to tsv: {}\nensure fastq was not corrupted and contains all reads ({})",
                in_file.display(),
                e
            );
            true
        }
    }
}

/// Tabularizes a umi/cell-labeled fastq into `info\tumi\tcell\tbarcode`
/// rows. Read names are expected to end in `_<umi>_<cell>`.
/// Returns true on failure.
pub fn labeled_fastq_to_tsv(in_file: &Path, out_file: &Path) -> bool {
    match convert(in_file, out_file, "info\tumi\tcell\tbarcode", write_labeled_row) {
        Ok(0) => {
            error!(
                "failed to convert fastq to tsv: {}\nno reads found, check cutadapt output",
                in_file.display()
            );
            true
        }
        Ok(_) => false,
        Err(e) => {
            error!(
                "failed to convert fastq to tsv: {}\nensure fastq was not corrupted and contains all reads ({})",
                in_file.display(),
                e
            );
            true
        }
    }
}

fn convert(
    in_file: &Path,
    out_file: &Path,
    header: &str,
    write_row: fn(&mut BufWriter<File>, &OwnedRecord) -> anyhow::Result<()>,
) -> anyhow::Result<u64> {
    let mut reader = fastq_reader(in_file)?;
    let mut writer = BufWriter::new(File::create(out_file)?);
    writeln!(writer, "{}", header)?;

    let mut rows = 0u64;
    for record in reader.records() {
        let record = record?;
        write_row(&mut writer, &record)?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

fn write_plain_row(writer: &mut BufWriter<File>, record: &OwnedRecord) -> anyhow::Result<()> {
    writeln!(
        writer,
        "@{}\t{}",
        String::from_utf8_lossy(&record.head),
        String::from_utf8_lossy(&record.seq)
    )?;
    Ok(())
}

fn write_labeled_row(writer: &mut BufWriter<File>, record: &OwnedRecord) -> anyhow::Result<()> {
    let head = String::from_utf8_lossy(&record.head).into_owned();
    let mut parts = head.rsplitn(3, '_');
    let cell = parts.next();
    let umi = parts.next();
    let info = parts.next();
    match (info, umi, cell) {
        (Some(info), Some(umi), Some(cell)) => {
            writeln!(
                writer,
                "@{}\t{}\t{}\t{}",
                info,
                umi,
                cell,
                String::from_utf8_lossy(&record.seq)
            )?;
            Ok(())
        }
        _ => Err(anyhow::anyhow!("read name {} carries no umi/cell label", head)),
    }
}
