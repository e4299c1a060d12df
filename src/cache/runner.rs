//! Parallel job runners for filling the cache

use crate::cache::{accept_artifact, CacheEntry, ContentCache};
use crate::error::{BootDiskError, Result};
use rayon::prelude::*;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;

/// Name of the generated job description file in the cache root
pub const NINJA_FILE_NAME: &str = "build.ninja";

/// Number of jobs to run at once when not configured
pub fn default_parallelism() -> usize {
    thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .max(1)
}

/// Runs one compression job per staged cache entry
///
/// Jobs are independent and may run in any order. If any job fails the
/// whole run fails, and no artifact is left behind for the failing entry.
pub trait JobRunner {
    /// Compress every entry in `jobs` into `cache`
    fn run(&self, cache: &ContentCache, jobs: &[CacheEntry]) -> Result<()>;

    /// Short name for log messages
    fn name(&self) -> &'static str;
}

/// Runs jobs on an in-process thread pool
#[derive(Debug, Clone)]
pub struct ThreadPoolRunner {
    threads: usize,
}

impl ThreadPoolRunner {
    /// Create a runner with `threads` workers (at least 1)
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Default for ThreadPoolRunner {
    fn default() -> Self {
        Self::new(default_parallelism())
    }
}

impl JobRunner for ThreadPoolRunner {
    fn run(&self, cache: &ContentCache, jobs: &[CacheEntry]) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads.min(jobs.len()))
            .build()
            .map_err(|err| BootDiskError::config(format!("failed to start thread pool: {err}")))?;

        pool.install(|| jobs.par_iter().try_for_each(|entry| cache.compress_entry(entry)))
    }

    fn name(&self) -> &'static str {
        "threads"
    }
}

/// Runs jobs through the `ninja` build tool
///
/// A job description file is written to the cache root with one build edge
/// per entry. Outputs go to partial paths and are only moved into place
/// once ninja has exited successfully.
#[derive(Debug, Clone)]
pub struct NinjaRunner {
    program: PathBuf,
    compressor: PathBuf,
    jobs: usize,
}

impl NinjaRunner {
    /// Create a runner that drives `compressor` through the ninja at `program`
    pub fn new<P: Into<PathBuf>, C: Into<PathBuf>>(program: P, compressor: C, jobs: usize) -> Self {
        Self {
            program: program.into(),
            compressor: compressor.into(),
            jobs: jobs.max(1),
        }
    }

    /// Contents of the job description file for `jobs`
    pub fn job_file(&self, cache: &ContentCache, jobs: &[CacheEntry]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# generated by bootdisk; do not edit");
        let _ = writeln!(out, "builddir = {}", ninja_escape_path(cache.root()));
        let _ = writeln!(
            out,
            "compressor = {}",
            shell_quote(&self.compressor.display().to_string()).replace('$', "$$")
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "rule compress");
        let _ = writeln!(out, "  command = $compressor $in $out");
        let _ = writeln!(out, "  description = COMPRESS $in");

        for entry in jobs {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "build {}: compress {}",
                ninja_escape_path(&entry.partial_path()),
                ninja_escape_path(&entry.input)
            );
        }

        out
    }
}

impl JobRunner for NinjaRunner {
    fn run(&self, cache: &ContentCache, jobs: &[CacheEntry]) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }

        // A stale partial newer than its input would make ninja skip the job.
        remove_partials(jobs)?;

        fs::create_dir_all(cache.root())?;
        let job_file = cache.root().join(NINJA_FILE_NAME);
        fs::write(&job_file, self.job_file(cache, jobs))?;

        let tool = self.program.display().to_string();
        tracing::debug!(%tool, jobs = jobs.len(), parallelism = self.jobs, "running ninja");

        let status = Command::new(&self.program)
            .arg("-f")
            .arg(&job_file)
            .arg("-j")
            .arg(self.jobs.to_string())
            .status()
            .map_err(|source| BootDiskError::ToolLaunch {
                tool: tool.clone(),
                source,
            })?;

        if !status.success() {
            remove_partials(jobs)?;
            return Err(BootDiskError::ToolFailed {
                tool,
                status: status.to_string(),
            });
        }

        for entry in jobs {
            let partial = entry.partial_path();
            if !partial.is_file() {
                remove_partials(jobs)?;
                return Err(BootDiskError::ToolFailed {
                    tool,
                    status: format!("no output written to {}", partial.display()),
                });
            }
            accept_artifact(&partial, &entry.artifact)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ninja"
    }
}

fn remove_partials(jobs: &[CacheEntry]) -> Result<()> {
    for entry in jobs {
        match fs::remove_file(entry.partial_path()) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Escape a path for use in a ninja build line
fn ninja_escape_path(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.display().to_string().chars() {
        match c {
            '$' | ' ' | ':' => {
                escaped.push('$');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Quote a word for the POSIX shell ninja runs commands with
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '+' | ','));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::{FailingCompressor, ReversingCompressor};
    use crate::cache::CacheKey;
    use std::sync::Arc;

    fn staged(cache: &ContentCache, contents: &[&[u8]]) -> Vec<CacheEntry> {
        contents
            .iter()
            .map(|data| {
                let entry = cache.entry_for(data);
                cache.stage_input(&entry, data).unwrap();
                entry
            })
            .collect()
    }

    #[test]
    fn test_thread_pool_runs_all_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let compressor = Arc::new(ReversingCompressor::default());
        let cache = ContentCache::new(dir.path(), compressor.clone());
        let jobs = staged(&cache, &[b"one", b"two", b"three"]);

        ThreadPoolRunner::new(4).run(&cache, &jobs).unwrap();

        assert_eq!(compressor.calls(), 3);
        for entry in &jobs {
            assert!(entry.is_cached());
        }
        assert_eq!(fs::read(&cache.entry_for(b"two").artifact).unwrap(), b"owt");
    }

    #[test]
    fn test_thread_pool_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(FailingCompressor));
        let jobs = staged(&cache, &[b"one", b"two"]);

        let result = ThreadPoolRunner::new(2).run(&cache, &jobs);
        assert!(matches!(result, Err(BootDiskError::ToolFailed { .. })));
        assert!(jobs.iter().all(|entry| !entry.is_cached()));
    }

    #[test]
    fn test_thread_pool_no_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(FailingCompressor));
        ThreadPoolRunner::new(2).run(&cache, &[]).unwrap();
    }

    #[test]
    fn test_job_file() {
        let cache = ContentCache::new("/tmp/my cache", Arc::new(ReversingCompressor::default()));
        let entry = cache.entry(&CacheKey::of(b""));
        let runner = NinjaRunner::new("ninja", "/opt/zx02/bin/zx02", 8);

        let file = runner.job_file(&cache, &[entry]);
        assert!(file.contains("builddir = /tmp/my$ cache\n"));
        assert!(file.contains("compressor = /opt/zx02/bin/zx02\n"));
        assert!(file.contains("rule compress\n  command = $compressor $in $out\n"));
        assert!(file.contains(
            "build /tmp/my$ cache/e3b/e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855.zx02.partial: compress /tmp/my$ cache/e3b/"
        ));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/usr/bin/zx02"), "/usr/bin/zx02");
        assert_eq!(shell_quote("my tool"), "'my tool'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_ninja_escape_path() {
        assert_eq!(ninja_escape_path(Path::new("a b:c$d")), "a$ b$:c$$d");
    }

    #[test]
    fn test_ninja_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(ReversingCompressor::default()));
        let jobs = staged(&cache, &[b"one"]);

        let runner = NinjaRunner::new(dir.path().join("no-such-ninja"), "zx02", 1);
        let result = runner.run(&cache, &jobs);
        assert!(matches!(result, Err(BootDiskError::ToolLaunch { .. })));
        assert!(!jobs[0].is_cached());
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A stand-in for ninja that copies each build edge's input to its output
    /// and then runs `tail`
    #[cfg(unix)]
    fn fake_ninja(dir: &Path, tail: &str) -> PathBuf {
        let body = format!(
            "grep '^build ' \"$2\" | while read -r _ out _ in; do\n\
             \x20 cp \"$in\" \"${{out%:}}\"\n\
             done\n\
             {tail}"
        );
        script(dir, "ninja", &body)
    }

    #[cfg(unix)]
    #[test]
    fn test_ninja_accepts_outputs() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(FailingCompressor));
        let jobs = staged(&cache, &[b"one", b"two"]);

        let runner = NinjaRunner::new(fake_ninja(bin.path(), "exit 0"), "zx02", 2);
        runner.run(&cache, &jobs).unwrap();

        assert!(dir.path().join(NINJA_FILE_NAME).is_file());
        for entry in &jobs {
            assert!(entry.is_cached());
            assert!(!entry.partial_path().exists());
        }
        assert_eq!(fs::read(&jobs[1].artifact).unwrap(), b"two");
        assert_eq!(cache.get_or_compress(b"one").unwrap(), b"one");
    }

    #[cfg(unix)]
    #[test]
    fn test_ninja_failure_discards_outputs() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(FailingCompressor));
        let jobs = staged(&cache, &[b"one", b"two"]);

        let runner = NinjaRunner::new(fake_ninja(bin.path(), "exit 1"), "zx02", 2);
        let result = runner.run(&cache, &jobs);

        assert!(matches!(result, Err(BootDiskError::ToolFailed { .. })));
        for entry in &jobs {
            assert!(!entry.is_cached());
            assert!(!entry.partial_path().exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_ninja_missing_output() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(FailingCompressor));
        let jobs = staged(&cache, &[b"one", b"two"]);
        let empty = script(bin.path(), "ninja", "exit 0");

        let result = NinjaRunner::new(&empty, "zx02", 1).run(&cache, &jobs);
        match result {
            Err(BootDiskError::ToolFailed { status, .. }) => {
                assert!(status.starts_with("no output written to "));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(jobs.iter().all(|entry| !entry.is_cached()));
    }

    #[cfg(unix)]
    #[test]
    fn test_ninja_rerun_after_failure() {
        let bin = tempfile::tempdir().unwrap();
        let bin2 = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path(), Arc::new(FailingCompressor));
        let jobs = staged(&cache, &[b"frame"]);

        let failing = NinjaRunner::new(fake_ninja(bin.path(), "exit 1"), "zx02", 1);
        assert!(failing.run(&cache, &jobs).is_err());

        let working = NinjaRunner::new(fake_ninja(bin2.path(), "exit 0"), "zx02", 1);
        working.run(&cache, &jobs).unwrap();
        assert_eq!(fs::read(&jobs[0].artifact).unwrap(), b"frame");
    }

    #[test]
    fn test_default_parallelism() {
        assert!(default_parallelism() >= 1);
    }
}
