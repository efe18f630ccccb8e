use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Immutable snapshot of the limits an upload request is processed under.
///
/// Built once at startup and shared (behind an `Arc`) by every request; the
/// pipeline never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted file, in bytes. A file is rejected as soon as more
    /// than this many bytes have been read from it.
    pub max_file_size: u64,
    /// Lowercase extensions (without the leading dot) that may be uploaded.
    pub allowed_extensions: BTreeSet<String>,
    /// How many bytes are read from an upload, counted, and written to disk
    /// at a time.
    pub chunk_size: usize,
    pub concurrency: ConcurrencyBounds,
}
impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * MIB,
            allowed_extensions: ["txt", "pdf"].into_iter().map(String::from).collect(),
            chunk_size: MIB as usize,
            concurrency: ConcurrencyBounds::default(),
        }
    }
}
impl UploadConfig {
    /// Whether `extension` (already lowercased, no leading dot) may be uploaded.
    pub fn is_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(extension)
    }

    /// Lowercases and trims the configured extensions so `".PDF"`, `"pdf "`
    /// and `"pdf"` all mean the same thing.
    pub(crate) fn normalize(mut self) -> Self {
        self.allowed_extensions = self
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.max_file_size == 0 {
            problems.push("upload.max_file_size must be greater than zero".to_string());
        }
        if self.chunk_size == 0 {
            problems.push("upload.chunk_size must be greater than zero".to_string());
        }
        if self.allowed_extensions.is_empty() {
            problems.push("upload.allowed_extensions must name at least one extension".to_string());
        }
        if self.concurrency.lower == 0 {
            problems.push("upload.concurrency.lower must be at least 1".to_string());
        }
        if self.concurrency.lower > self.concurrency.upper {
            problems.push(format!(
                "upload.concurrency.lower ({}) exceeds upload.concurrency.upper ({})",
                self.concurrency.lower, self.concurrency.upper
            ));
        }
        problems
    }
}

/// How many files of one request may be processed at the same time.
///
/// The effective limit for a request of `n` files is `n` clamped into
/// `lower..=upper`: small requests still get a reasonably wide gate, large
/// ones can't exhaust file descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyBounds {
    pub lower: usize,
    pub upper: usize,
}
impl Default for ConcurrencyBounds {
    fn default() -> Self {
        Self { lower: 10, upper: 20 }
    }
}
impl ConcurrencyBounds {
    /// `min(upper, max(lower, files))`
    pub fn limit_for(&self, files: usize) -> usize {
        self.upper.min(self.lower.max(files))
    }
}
