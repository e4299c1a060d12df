//! Cache warming ahead of a build
//!
//! Finds every distinct piece of content that still needs compressing and
//! hands the whole batch to a [`JobRunner`], so identical files (repeated
//! blank frames and the like) are compressed once and the work is spread
//! over the available processors. Skipping this step only costs time: the
//! build compresses any remaining misses itself.

use crate::cache::{CacheEntry, CacheKey, ContentCache, JobRunner};
use crate::error::Result;
use crate::files::FileList;
use std::collections::BTreeMap;
use std::fs;

/// Distinct cache misses found in a file list
#[derive(Debug, Clone, Default)]
pub struct WarmPlan {
    /// Number of compressed files with a local source that were examined
    pub candidates: usize,
    /// Distinct misses, ordered by digest, with their uncompressed content
    pub jobs: Vec<(CacheEntry, Vec<u8>)>,
}

impl WarmPlan {
    /// Cache entries that need compressing
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.jobs.iter().map(|(entry, _)| entry.clone()).collect()
    }

    /// Is there nothing to do?
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Summary of a warming run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WarmReport {
    /// Compressed files with a local source
    pub candidates: usize,
    /// Distinct contents that were compressed
    pub compressed: usize,
}

/// Drives distinct cache misses through a [`JobRunner`]
pub struct CacheWarmScheduler<'a> {
    cache: &'a ContentCache,
    runner: &'a dyn JobRunner,
}

impl<'a> CacheWarmScheduler<'a> {
    /// Create a scheduler for `cache` using `runner`
    pub fn new(cache: &'a ContentCache, runner: &'a dyn JobRunner) -> Self {
        Self { cache, runner }
    }

    /// Find distinct misses among the compressed files of `files`
    ///
    /// Files whose source is missing are skipped here; the build reports
    /// them.
    pub fn plan(&self, files: &FileList) -> Result<WarmPlan> {
        let mut candidates = 0;
        let mut misses: BTreeMap<CacheKey, (CacheEntry, Vec<u8>)> = BTreeMap::new();

        for file in files.iter().filter(|f| f.compressed && f.path.is_file()) {
            candidates += 1;

            let data = fs::read(&file.path)?;
            if data.is_empty() {
                continue;
            }

            let entry = self.cache.entry_for(&data);
            if misses.contains_key(&entry.key) || entry.is_cached() {
                continue;
            }
            misses.insert(entry.key, (entry, data));
        }

        Ok(WarmPlan {
            candidates,
            jobs: misses.into_values().collect(),
        })
    }

    /// Compress every distinct miss in `files`
    ///
    /// Safe to repeat: a second run over a warm cache finds nothing to do.
    pub fn warm(&self, files: &FileList) -> Result<WarmReport> {
        let plan = self.plan(files)?;
        tracing::info!(
            candidates = plan.candidates,
            misses = plan.jobs.len(),
            runner = self.runner.name(),
            "warming compression cache"
        );

        if plan.is_empty() {
            return Ok(WarmReport {
                candidates: plan.candidates,
                compressed: 0,
            });
        }

        for (entry, data) in &plan.jobs {
            self.cache.stage_input(entry, data)?;
        }
        self.runner.run(self.cache, &plan.entries())?;

        Ok(WarmReport {
            candidates: plan.candidates,
            compressed: plan.jobs.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::{FailingCompressor, ReversingCompressor};
    use crate::cache::ThreadPoolRunner;
    use crate::error::BootDiskError;
    use crate::files::FileDescriptor;
    use std::path::Path;
    use std::sync::Arc;

    fn write(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_plan_deduplicates_by_content() {
        let src = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(cache_dir.path(), Arc::new(ReversingCompressor::default()));
        let runner = ThreadPoolRunner::new(2);

        let files = FileList::new(vec![
            FileDescriptor::new("blank0", write(src.path(), "b0", &[0; 100])).compressed(true),
            FileDescriptor::new("blank1", write(src.path(), "b1", &[0; 100])).compressed(true),
            FileDescriptor::new("pic", write(src.path(), "p", b"picture")).compressed(true),
            FileDescriptor::new("raw", write(src.path(), "r", b"raw")),
            FileDescriptor::new("gone", src.path().join("missing")).compressed(true),
        ])
        .unwrap();

        let plan = CacheWarmScheduler::new(&cache, &runner).plan(&files).unwrap();
        assert_eq!(plan.candidates, 3);
        assert_eq!(plan.jobs.len(), 2);
        let keys: Vec<_> = plan.jobs.iter().map(|(e, _)| e.key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_warm_then_rewarm_is_noop() {
        let src = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let compressor = Arc::new(ReversingCompressor::default());
        let cache = ContentCache::new(cache_dir.path(), compressor.clone());
        let runner = ThreadPoolRunner::new(2);

        let files = FileList::new(vec![
            FileDescriptor::new("a", write(src.path(), "a", b"aaaa")).compressed(true),
            FileDescriptor::new("b", write(src.path(), "b", b"aaaa")).compressed(true),
            FileDescriptor::new("c", write(src.path(), "c", b"cccc")).compressed(true),
        ])
        .unwrap();

        let scheduler = CacheWarmScheduler::new(&cache, &runner);
        let report = scheduler.warm(&files).unwrap();
        assert_eq!(report, WarmReport { candidates: 3, compressed: 2 });
        assert_eq!(compressor.calls(), 2);

        let report = scheduler.warm(&files).unwrap();
        assert_eq!(report.compressed, 0);
        assert_eq!(compressor.calls(), 2);
        assert!(cache.is_cached(b"aaaa"));
        assert!(cache.is_cached(b"cccc"));
    }

    #[test]
    fn test_warm_failure_is_reported() {
        let src = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(cache_dir.path(), Arc::new(FailingCompressor));
        let runner = ThreadPoolRunner::new(2);

        let files = FileList::new(vec![
            FileDescriptor::new("a", write(src.path(), "a", b"1")).compressed(true),
            FileDescriptor::new("b", write(src.path(), "b", b"2")).compressed(true),
        ])
        .unwrap();

        let result = CacheWarmScheduler::new(&cache, &runner).warm(&files);
        assert!(matches!(result, Err(BootDiskError::ToolFailed { .. })));
        assert!(!cache.is_cached(b"1"));
        assert!(!cache.is_cached(b"2"));
    }
}
