//! Byte-prefix fingerprints.
//!
//! Two files are treated as duplicates when their first [`PREFIX_LEN`] bytes
//! are identical. This is not a content hash: files that share a header but
//! differ later will compare equal.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of leading bytes compared.
pub const PREFIX_LEN: usize = 1024;

/// The leading bytes of a non-empty file, used as an equality key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Reads up to [`PREFIX_LEN`] bytes from the start of `path`.
///
/// Returns `Ok(None)` for a zero-length file. A file shorter than the prefix
/// yields only the bytes it has, so `"abc"` and `"abc\0"` never collide.
pub fn read_prefix(path: &Path) -> io::Result<Option<Fingerprint>> {
    let file = File::open(path)?;
    let mut prefix = Vec::with_capacity(PREFIX_LEN);
    file.take(PREFIX_LEN as u64).read_to_end(&mut prefix)?;

    if prefix.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Fingerprint(prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_has_no_fingerprint() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("empty");
        fs::write(&path, "").unwrap();

        assert!(read_prefix(&path).unwrap().is_none());
    }

    #[test]
    fn test_short_file_uses_bytes_read() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let short = temp_dir.path().join("short");
        let padded = temp_dir.path().join("padded");
        fs::write(&short, b"abc").unwrap();
        fs::write(&padded, b"abc\0\0\0").unwrap();

        let short_fp = read_prefix(&short).unwrap().unwrap();
        let padded_fp = read_prefix(&padded).unwrap().unwrap();

        assert_eq!(short_fp.as_bytes(), b"abc");
        assert_ne!(short_fp, padded_fp);
    }

    #[test]
    fn test_all_zero_file_is_a_real_fingerprint() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("zeros");
        fs::write(&path, vec![0u8; 16]).unwrap();

        let fp = read_prefix(&path).unwrap();
        assert_eq!(fp.map(|f| f.as_bytes().len()), Some(16));
    }

    #[test]
    fn test_only_prefix_is_compared() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        let mut a = vec![7u8; PREFIX_LEN];
        let mut b = a.clone();
        a.extend_from_slice(b"tail one");
        b.extend_from_slice(b"another tail");
        fs::write(&first, &a).unwrap();
        fs::write(&second, &b).unwrap();

        let fp_a = read_prefix(&first).unwrap().unwrap();
        assert_eq!(fp_a.as_bytes().len(), PREFIX_LEN);
        assert_eq!(Some(fp_a), read_prefix(&second).unwrap());
    }

    #[test]
    fn test_difference_inside_prefix_is_detected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        let a = vec![1u8; 2048];
        let mut b = a.clone();
        b[PREFIX_LEN - 1] = 2;
        fs::write(&first, &a).unwrap();
        fs::write(&second, &b).unwrap();

        assert_ne!(read_prefix(&first).unwrap(), read_prefix(&second).unwrap());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        assert!(read_prefix(&temp_dir.path().join("missing")).is_err());
    }
}
