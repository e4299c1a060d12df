//! Build manifest and environment configuration
//!
//! A manifest is a TOML file:
//!
//! ```toml
//! [build]
//! bootstrap = "build/loader0.prg"
//! loader = "build/loader1.bin"
//! hidden = true
//!
//! [output]
//! image = "build/disk.img"
//! toc_json = "build/toc.json"
//! toc_packed = "build/toc.bin"
//!
//! [compression]
//! compressor = "zx02"
//! runner = "ninja"
//!
//! [[file]]
//! ident = "screen0"
//! path = "beeb/screen0.bin"
//! compressed = true
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use crate::cache::{
    default_parallelism, ContentCache, ExternalCompressor, JobRunner, NinjaRunner,
    ThreadPoolRunner,
};
use crate::error::{BootDiskError, Result};
use crate::files::{FileDescriptor, FileList};
use crate::io::OutputPaths;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming the compressor executable
pub const COMPRESSOR_ENV: &str = "BOOTDISK_COMPRESSOR";

/// Environment variable naming the cache directory
pub const CACHE_ENV: &str = "BOOTDISK_CACHE";

/// Compressor used when nothing else is configured
pub const DEFAULT_COMPRESSOR: &str = "zx02";

/// Ninja executable used when nothing else is configured
pub const DEFAULT_NINJA: &str = "ninja";

/// Snapshot of the process environment
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    /// Build an environment from explicit pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            vars: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Look up a non-empty variable
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// How cache warming jobs are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// In-process thread pool
    #[default]
    Threads,
    /// External ninja build
    Ninja,
}

/// `[build]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Bootstrap program (2-byte load address, then code)
    pub bootstrap: Option<PathBuf>,
    /// Loader for the loader region
    pub loader: Option<PathBuf>,
    /// Hide the bootstrap's loading text
    #[serde(default)]
    pub hidden: bool,
}

/// `[output]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    /// Final disk image
    pub image: Option<PathBuf>,
    /// Table of contents as JSON
    pub toc_json: Option<PathBuf>,
    /// Packed binary table of contents
    pub toc_packed: Option<PathBuf>,
    /// Padded EXEC region
    pub exec_region: Option<PathBuf>,
    /// Padded loader region
    pub loader_region: Option<PathBuf>,
}

/// `[compression]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionSection {
    /// Compressor executable
    pub compressor: Option<PathBuf>,
    /// Cache directory
    pub cache: Option<PathBuf>,
    /// Parallel jobs when warming the cache
    pub jobs: Option<usize>,
    /// Job runner for cache warming
    #[serde(default)]
    pub runner: RunnerKind,
    /// Ninja executable
    pub ninja: Option<PathBuf>,
}

/// One `[[file]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    /// Identifier used by the target code
    pub ident: String,
    /// Source path
    pub path: PathBuf,
    /// Store compressed
    #[serde(default)]
    pub compressed: bool,
}

/// A parsed build manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Bootstrap and loader settings
    #[serde(default)]
    pub build: BuildSection,
    /// Output locations
    #[serde(default)]
    pub output: OutputSection,
    /// Compression settings
    #[serde(default)]
    pub compression: CompressionSection,
    /// Files in disk order
    #[serde(default, rename = "file")]
    pub files: Vec<FileEntry>,
}

impl Manifest {
    /// Parse manifest text without resolving paths
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a manifest, resolving relative paths against its directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            BootDiskError::config(format!("cannot read manifest {}: {err}", path.display()))
        })?;
        let mut manifest = Self::parse(&text)?;
        if let Some(dir) = path.parent() {
            manifest.resolve_paths(dir);
        }
        tracing::debug!(path = %path.display(), files = manifest.files.len(), "loaded manifest");
        Ok(manifest)
    }

    /// Make every relative path relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        let resolve_opt = |p: &mut Option<PathBuf>| {
            if let Some(p) = p {
                resolve(p);
            }
        };

        resolve_opt(&mut self.build.bootstrap);
        resolve_opt(&mut self.build.loader);
        resolve_opt(&mut self.output.image);
        resolve_opt(&mut self.output.toc_json);
        resolve_opt(&mut self.output.toc_packed);
        resolve_opt(&mut self.output.exec_region);
        resolve_opt(&mut self.output.loader_region);
        resolve_opt(&mut self.compression.cache);
        // Compressor and ninja may be bare program names looked up on PATH
        for program in [&mut self.compression.compressor, &mut self.compression.ninja] {
            if let Some(p) = program {
                if p.components().count() > 1 {
                    resolve(p);
                }
            }
        }
        for file in &mut self.files {
            resolve(&mut file.path);
        }
    }

    /// The file list, validated for unique identifiers
    pub fn file_list(&self) -> Result<FileList> {
        FileList::new(
            self.files
                .iter()
                .map(|f| FileDescriptor::new(f.ident.clone(), f.path.clone()).compressed(f.compressed))
                .collect(),
        )
    }

    /// Requested output locations
    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths {
            image: self.output.image.clone(),
            toc_json: self.output.toc_json.clone(),
            toc_packed: self.output.toc_packed.clone(),
            exec_region: self.output.exec_region.clone(),
            loader_region: self.output.loader_region.clone(),
        }
    }
}

/// Fully resolved compression settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionSettings {
    /// Compressor executable
    pub compressor: PathBuf,
    /// Cache directory
    pub cache_dir: PathBuf,
    /// Parallel jobs
    pub jobs: usize,
    /// Job runner
    pub runner: RunnerKind,
    /// Ninja executable
    pub ninja: PathBuf,
}

impl CompressionSettings {
    /// Resolve settings; the environment overrides the manifest
    pub fn resolve(section: &CompressionSection, env: &Environment) -> Result<Self> {
        let compressor = env
            .var(COMPRESSOR_ENV)
            .map(PathBuf::from)
            .or_else(|| section.compressor.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPRESSOR));

        let cache_dir = match env.var(CACHE_ENV).map(PathBuf::from).or_else(|| section.cache.clone()) {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };

        let jobs = match section.jobs {
            Some(0) => return Err(BootDiskError::config("jobs must be at least 1")),
            Some(jobs) => jobs,
            None => default_parallelism(),
        };

        Ok(Self {
            compressor,
            cache_dir,
            jobs,
            runner: section.runner,
            ninja: section
                .ninja
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NINJA)),
        })
    }

    /// Content cache backed by the external compressor
    pub fn cache(&self) -> ContentCache {
        ContentCache::new(
            &self.cache_dir,
            Arc::new(ExternalCompressor::new(&self.compressor)),
        )
    }

    /// Job runner for cache warming
    pub fn runner(&self) -> Box<dyn JobRunner> {
        match self.runner {
            RunnerKind::Threads => Box::new(ThreadPoolRunner::new(self.jobs)),
            RunnerKind::Ninja => Box::new(NinjaRunner::new(&self.ninja, &self.compressor, self.jobs)),
        }
    }
}

/// Per-user cache directory
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("bootdisk"))
        .ok_or_else(|| {
            BootDiskError::config(format!(
                "no cache directory available; set {CACHE_ENV}"
            ))
        })
}
