//! Checksums for emitted artifacts
//!
//! The writer can record a `checksums.sha256` manifest next to the artifacts
//! (same line format as `sha256sum`), so consumers can confirm that two runs
//! over the same declarations produced byte-identical output.

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// File name of the manifest inside the output directory
pub const MANIFEST_FILE: &str = "checksums.sha256";

/// SHA256 checksum, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, data: &[u8]) -> bool {
        *self == Self::from_bytes(data)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `<checksum>  <relative path>` per artifact, in write order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: Vec<(String, Checksum)>,
}

impl ChecksumManifest {
    pub fn push(&mut self, path: impl Into<String>, checksum: Checksum) {
        self.entries.push((path.into(), checksum));
    }

    pub fn entries(&self) -> &[(String, Checksum)] {
        &self.entries
    }

    pub fn render(&self) -> String {
        let mut out: String = self
            .entries
            .iter()
            .map(|(path, checksum)| format!("{}  {}", checksum, path))
            .collect::<Vec<_>>()
            .join("\n");
        out.push('\n');
        out
    }

    /// Parse a rendered manifest; blank lines are ignored
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter_map(|line| line.split_once("  "))
            .map(|(checksum, path)| (path.to_string(), Checksum(checksum.to_string())))
            .collect();
        Self { entries }
    }

    /// Re-hash every listed file under `dir`; returns the paths that differ
    pub fn verify(&self, dir: &Path) -> Result<Vec<String>> {
        let mut mismatched = Vec::new();
        for (path, checksum) in &self.entries {
            let data = fs::read(dir.join(path))?;
            if !checksum.verify(&data) {
                tracing::warn!(path = %path, "checksum mismatch");
                mismatched.push(path.clone());
            }
        }
        Ok(mismatched)
    }
}
