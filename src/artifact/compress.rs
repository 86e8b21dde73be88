// Gzip compression for backup artifacts

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::ArtifactError;

/// Suffixes of files that are already archives and are uploaded as-is
pub const ARCHIVE_SUFFIXES: &[&str] = &["tar", "zip", "gz"];

/// Whether the file already carries an archive suffix
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ARCHIVE_SUFFIXES.iter().any(|suffix| ext.eq_ignore_ascii_case(suffix)))
        .unwrap_or(false)
}

pub fn gzip(data: &[u8], level: u32) -> Result<Vec<u8>, ArtifactError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder
        .write_all(data)
        .map_err(|e| ArtifactError::Compression(format!("Failed to compress data: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ArtifactError::Compression(format!("Failed to finalize compression: {}", e)))
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, ArtifactError> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ArtifactError::Compression(format!("Failed to decompress data: {}", e)))?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_suffixes() {
        assert!(is_archive(Path::new("/tmp/files_blackbox_01_02_2025.tar.gz")));
        assert!(is_archive(Path::new("dump.tar")));
        assert!(is_archive(Path::new("dump.ZIP")));
        assert!(!is_archive(Path::new("dump.sql")));
        assert!(!is_archive(Path::new("dump")));
    }

    #[test]
    fn test_gzip_is_reversible() {
        let data = b"CREATE TABLE users (id int);\n".repeat(50);
        let compressed = gzip(&data, 6).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(gunzip(&compressed).unwrap(), data);
    }
}
