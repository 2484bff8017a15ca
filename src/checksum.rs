// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Expected checksums and file digests.
//!
//! A checksum argument is `algorithm:hexvalue` or a bare value, which means
//! md5. Digests are always compared as lowercase hex.

use md5::{Digest, Md5};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, ValidationError};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Md5,
    Adler32,
}

impl ChecksumAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Adler32 => "adler32",
        }
    }

    /// Number of hex digits in a digest.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Adler32 => 8,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" | "md" => Ok(Self::Md5),
            "adler32" | "ad" => Ok(Self::Adler32),
            other => Err(ValidationError::UnsupportedChecksum(other.to_string())),
        }
    }
}

/// Expected checksum of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumSpec {
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex, padded to the algorithm's full width
    pub value: String,
}

impl ChecksumSpec {
    /// Parse `algorithm:value` or a bare md5 value.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (algorithm, raw) = match input.split_once(':') {
            Some((algorithm, value)) => (algorithm.parse()?, value.trim()),
            None => (ChecksumAlgorithm::Md5, input),
        };

        let invalid = || ValidationError::InvalidChecksum {
            algorithm: algorithm.to_string(),
            value: raw.to_string(),
        };

        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut value = raw.to_ascii_lowercase();
        if algorithm == ChecksumAlgorithm::Adler32 && value.len() < algorithm.hex_len() {
            value = format!("{:0>width$}", value, width = algorithm.hex_len());
        }
        if value.len() != algorithm.hex_len() {
            return Err(invalid());
        }

        Ok(Self { algorithm, value })
    }

    /// Compare against the digest of `path`.
    ///
    /// Returns the computed digest (or the IO error that prevented it) when
    /// the file does not match.
    pub fn check(&self, path: &Path) -> std::result::Result<(), Option<String>> {
        match file_digest(path, self.algorithm) {
            Ok(actual) if actual == self.value => Ok(()),
            Ok(actual) => Err(Some(actual)),
            Err(_) => Err(None),
        }
    }
}

impl fmt::Display for ChecksumSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Lowercase hex digest of a file.
pub fn file_digest(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let file = File::open(path)?;
    digest_reader(BufReader::new(file), algorithm)
}

/// Lowercase hex digest of everything `reader` yields.
pub fn digest_reader<R: Read>(mut reader: R, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    match algorithm {
        ChecksumAlgorithm::Md5 => {
            let mut hasher = Md5::new();
            loop {
                let n = reader.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(hex::encode(hasher.finalize()))
        }
        ChecksumAlgorithm::Adler32 => {
            let mut hasher = adler2::Adler32::new();
            loop {
                let n = reader.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                hasher.write_slice(&buffer[..n]);
            }
            Ok(format!("{:08x}", hasher.checksum()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_explicit_and_bare() {
        let spec = ChecksumSpec::parse("md5:5EB63BBBE01EEED093CB22BB8F5ACDC3").unwrap();
        assert_eq!(spec.algorithm, ChecksumAlgorithm::Md5);
        assert_eq!(spec.value, "5eb63bbbe01eeed093cb22bb8f5acdc3");

        let spec = ChecksumSpec::parse("5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
        assert_eq!(spec.algorithm, ChecksumAlgorithm::Md5);

        let spec = ChecksumSpec::parse("adler32:1e60398").unwrap();
        assert_eq!(spec.algorithm, ChecksumAlgorithm::Adler32);
        assert_eq!(spec.value, "01e60398");
        assert_eq!(spec.to_string(), "adler32:01e60398");
    }

    #[test]
    fn test_parse_rejects_unknown_algorithm() {
        assert!(matches!(
            ChecksumSpec::parse("sha1:abcdef"),
            Err(ValidationError::UnsupportedChecksum(name)) if name == "sha1"
        ));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(matches!(
            ChecksumSpec::parse("md5:xyz"),
            Err(ValidationError::InvalidChecksum { .. })
        ));
        assert!(matches!(
            ChecksumSpec::parse("md5:abcd"),
            Err(ValidationError::InvalidChecksum { .. })
        ));
        assert!(matches!(
            ChecksumSpec::parse("adler32:"),
            Err(ValidationError::InvalidChecksum { .. })
        ));
        assert!(matches!(
            ChecksumSpec::parse("adler32:123456789"),
            Err(ValidationError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(
            digest_reader(Cursor::new(b"hello world"), ChecksumAlgorithm::Md5).unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            digest_reader(Cursor::new(b"Wikipedia"), ChecksumAlgorithm::Adler32).unwrap(),
            "11e60398"
        );
        assert_eq!(
            digest_reader(Cursor::new(b""), ChecksumAlgorithm::Adler32).unwrap(),
            "00000001"
        );
    }

    #[test]
    fn test_check_file() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(b"hello world").unwrap();

        let spec = ChecksumSpec::parse("md5:5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
        assert_eq!(spec.check(file.path()), Ok(()));

        let wrong = ChecksumSpec::parse("md5:00000000000000000000000000000000").unwrap();
        assert_eq!(
            wrong.check(file.path()),
            Err(Some("5eb63bbbe01eeed093cb22bb8f5acdc3".to_string()))
        );

        let missing = file.path().with_extension("gone");
        assert_eq!(spec.check(&missing), Err(None));
    }
}
