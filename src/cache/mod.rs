//! Content-addressed compression cache
//!
//! Compressed artifacts are stored under the SHA-256 digest of the
//! uncompressed data:
//!
//! ```text
//! <root>/<first 3 hex digits>/<digest>.zx02   compressed artifact
//! <root>/<first 3 hex digits>/<digest>.dat    staged uncompressed input
//! ```
//!
//! An artifact only ever appears once the compressor has succeeded, so any
//! artifact present in the cache is usable.

/// External compressor invocation
pub mod compressor;
/// Parallel job runners
pub mod runner;
/// Cache warming ahead of a build
pub mod warm;

pub use compressor::{Compressor, ExternalCompressor};
pub use runner::{default_parallelism, JobRunner, NinjaRunner, ThreadPoolRunner};
pub use warm::{CacheWarmScheduler, WarmPlan, WarmReport};

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of hex digits used for the shard directory
pub const SHARD_PREFIX_LEN: usize = 3;

/// Extension of compressed artifacts
pub const ARTIFACT_EXTENSION: &str = "zx02";

/// Extension of staged uncompressed inputs
pub const INPUT_EXTENSION: &str = "dat";

/// Suffix for compressor output that has not been accepted yet
pub const PARTIAL_SUFFIX: &str = "partial";

/// SHA-256 digest of uncompressed content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Digest of `data`
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex digest
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Location of one cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Digest of the uncompressed content
    pub key: CacheKey,
    /// Shard directory holding the entry
    pub dir: PathBuf,
    /// Compressed artifact
    pub artifact: PathBuf,
    /// Staged uncompressed input
    pub input: PathBuf,
}

impl CacheEntry {
    /// Has the artifact been produced?
    pub fn is_cached(&self) -> bool {
        self.artifact.is_file()
    }

    /// Path for compressor output that is not yet accepted into the cache
    pub fn partial_path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.{}",
            self.key, ARTIFACT_EXTENSION, PARTIAL_SUFFIX
        ))
    }
}

/// Content-addressed store of compressed artifacts
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
    compressor: Arc<dyn Compressor>,
}

impl ContentCache {
    /// Create a cache rooted at `root` that fills misses with `compressor`
    pub fn new<P: Into<PathBuf>>(root: P, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            root: root.into(),
            compressor,
        }
    }

    /// Root directory of the cache
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compressor used to fill misses
    pub fn compressor(&self) -> &dyn Compressor {
        self.compressor.as_ref()
    }

    /// Entry for a digest
    pub fn entry(&self, key: &CacheKey) -> CacheEntry {
        let hash = key.to_hex();
        let dir = self.root.join(&hash[..SHARD_PREFIX_LEN]);
        CacheEntry {
            key: *key,
            artifact: dir.join(format!("{hash}.{ARTIFACT_EXTENSION}")),
            input: dir.join(format!("{hash}.{INPUT_EXTENSION}")),
            dir,
        }
    }

    /// Entry for uncompressed content
    pub fn entry_for(&self, data: &[u8]) -> CacheEntry {
        self.entry(&CacheKey::of(data))
    }

    /// Is a compressed artifact already present for this content?
    pub fn is_cached(&self, data: &[u8]) -> bool {
        self.entry_for(data).is_cached()
    }

    /// Write the uncompressed input for an entry so the compressor can read it
    pub fn stage_input(&self, entry: &CacheEntry, data: &[u8]) -> Result<()> {
        if entry.input.is_file() {
            return Ok(());
        }

        fs::create_dir_all(&entry.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&entry.dir)?;
        tmp.write_all(data)?;
        persist_or_accept(tmp.into_temp_path(), &entry.input)
    }

    /// Run the compressor for a staged entry and move its output into place
    ///
    /// The compressor writes into a private temporary directory that is
    /// removed on failure, so a failing run never leaves an artifact behind.
    pub fn compress_entry(&self, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&entry.dir)?;
        let scratch = tempfile::Builder::new()
            .prefix(".compress-")
            .tempdir_in(&entry.dir)?;
        let output = scratch
            .path()
            .join(format!("{}.{}", entry.key, ARTIFACT_EXTENSION));

        self.compressor.compress(&entry.input, &output)?;
        accept_artifact(&output, &entry.artifact)?;

        tracing::debug!(key = %entry.key, "compressed into cache");
        Ok(())
    }

    /// Compressed form of `data`, compressing on a cache miss
    pub fn get_or_compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let entry = self.entry_for(data);
        if entry.is_cached() {
            tracing::trace!(key = %entry.key, "cache hit");
        } else {
            tracing::debug!(key = %entry.key, bytes = data.len(), "cache miss");
            self.stage_input(&entry, data)?;
            self.compress_entry(&entry)?;
        }

        Ok(fs::read(&entry.artifact)?)
    }
}

/// Move a finished artifact into its cache location
///
/// Concurrent writers of the same digest produce identical bytes, so losing
/// a rename race to an existing artifact is not an error.
pub(crate) fn accept_artifact(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) if to.is_file() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn persist_or_accept(tmp: tempfile::TempPath, dest: &Path) -> Result<()> {
    match tmp.persist(dest) {
        Ok(()) => Ok(()),
        Err(_) if dest.is_file() => Ok(()),
        Err(err) => Err(io::Error::from(err).into()),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::error::BootDiskError;

    #[test]
    fn test_cache_key_hex() {
        let key = CacheKey::of(b"");
        assert_eq!(
            key.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(key.to_string(), key.to_hex());
    }

    #[test]
    fn test_entry_paths() {
        let cache = ContentCache::new("/cache", Arc::new(ReversingCompressor::default()));
        let entry = cache.entry_for(b"");
        assert_eq!(entry.dir, Path::new("/cache/e3b"));
        assert_eq!(
            entry.artifact,
            Path::new("/cache/e3b/e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855.zx02")
        );
        assert_eq!(
            entry.input.extension().and_then(|e| e.to_str()),
            Some("dat")
        );
    }

    #[test]
    fn test_get_or_compress_memoises_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let compressor = Arc::new(ReversingCompressor::default());
        let cache = ContentCache::new(dir.path(), compressor.clone());

        let first = cache.get_or_compress(b"abc").unwrap();
        assert_eq!(first, b"cba");
        assert_eq!(compressor.calls(), 1);
        assert!(cache.is_cached(b"abc"));

        let second = cache.get_or_compress(b"abc").unwrap();
        assert_eq!(second, first);
        assert_eq!(compressor.calls(), 1);
    }

    #[test]
    fn test_shared_across_cache_instances() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(ReversingCompressor::default());
        ContentCache::new(dir.path(), first.clone())
            .get_or_compress(b"shared")
            .unwrap();

        let second = Arc::new(ReversingCompressor::default());
        let data = ContentCache::new(dir.path(), second.clone())
            .get_or_compress(b"shared")
            .unwrap();
        assert_eq!(data, b"derahs");
        assert_eq!(second.calls(), 0);
    }

    #[test]
    fn test_failed_compression_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(FailingCompressor));

        let result = cache.get_or_compress(b"data");
        assert!(matches!(result, Err(BootDiskError::ToolFailed { .. })));

        let entry = cache.entry_for(b"data");
        assert!(!entry.is_cached());
        let leftovers: Vec<_> = fs::read_dir(&entry.dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p != &entry.input)
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    }

    #[test]
    fn test_stage_input_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(ReversingCompressor::default()));
        let entry = cache.entry_for(b"xyz");
        cache.stage_input(&entry, b"xyz").unwrap();
        cache.stage_input(&entry, b"xyz").unwrap();
        assert_eq!(fs::read(&entry.input).unwrap(), b"xyz");
    }
}
