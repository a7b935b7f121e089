use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;

use tracing::debug;

pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    file.read_exact(&mut buffer)?;
    Ok(buffer == [0x1F, 0x8B]) // Gzip magic bytes
}

/// First dot-delimited token of the file name; anything after the first
/// period is ignored when naming samples.
pub fn sample_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// True when the file exists with nonzero size. A zero-byte file left by a
/// killed subprocess counts as not yet produced.
pub fn non_empty(file: &Path) -> bool {
    file.is_file() && file.metadata().map(|m| m.len() > 0).unwrap_or(false)
}

/// Stage skip check: logs the outcome and returns true when the expected
/// artifact is already present.
pub fn check_output(file: &Path, message: &str) -> bool {
    let exists = non_empty(file);
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if exists {
        debug!("found output file: {}", name);
    } else {
        debug!("missing output file: {}", name);
        debug!("{}", message);
    }
    exists
}
