//! SHA-256 hashing helpers shared by writers and scanners.
//!
//! Two distinct hashes exist in this system and must not be confused:
//! - the content digest (see `payload::digest`) covers logical tensor
//!   content independent of container encoding;
//! - the file hash computed here covers the exact serialized byte stream.
//!
//! All hashes are rendered as lowercase hex with no prefix.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Computes the SHA-256 of a byte slice, rendered as lowercase hex.
///
/// Deterministic: the same input always produces the same output.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Computes the SHA-256 of an entire file, reading in chunks.
///
/// # Errors
///
/// Returns the underlying `io::Error` if the file cannot be read.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 1 << 16];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_deterministic() {
        let data = b"checkpoint bytes for hashing";
        assert_eq!(sha256_hex(data), sha256_hex(data));
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_detects_changes() {
        assert_ne!(sha256_hex(b"original"), sha256_hex(b"modified"));
    }

    #[test]
    fn test_file_hash_matches_memory_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blob.bin");
        let data = b"file content for hash test";
        std::fs::write(&path, data).unwrap();

        assert_eq!(sha256_file(&path).unwrap(), sha256_hex(data));
    }

    #[test]
    fn test_file_hash_large_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("large.bin");

        // Larger than one read buffer
        let data = vec![0xABu8; (1 << 16) + 4096];
        std::fs::write(&path, &data).unwrap();

        assert_eq!(sha256_file(&path).unwrap(), sha256_hex(&data));
    }

    #[test]
    fn test_file_hash_missing_file() {
        assert!(sha256_file(Path::new("/nonexistent/blob.bin")).is_err());
    }
}
