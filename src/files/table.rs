//! Lazily resolved raw and disk-form file contents

use crate::cache::ContentCache;
use crate::error::{BootDiskError, Result};
use crate::files::{FileDescriptor, FileList};
use std::fs;
use std::io;
use std::sync::{Arc, OnceLock};

/// Disk form of a file: the compressed artifact if `compressed`, else `raw`
pub fn disk_form(raw: &[u8], compressed: bool, cache: &ContentCache) -> Result<Vec<u8>> {
    if compressed {
        cache.get_or_compress(raw)
    } else {
        Ok(raw.to_vec())
    }
}

/// Side table of loaded contents for a [`FileList`]
///
/// Raw bytes are read at most once per build and are immutable afterwards.
/// Disk-form bytes are derived from them on first use.
#[derive(Debug)]
pub struct FileTable {
    files: FileList,
    raw: Vec<OnceLock<Arc<[u8]>>>,
    disk: Vec<OnceLock<Arc<[u8]>>>,
}

impl FileTable {
    /// Create an empty table for `files`
    pub fn new(files: FileList) -> Self {
        let count = files.len();
        Self {
            files,
            raw: (0..count).map(|_| OnceLock::new()).collect(),
            disk: (0..count).map(|_| OnceLock::new()).collect(),
        }
    }

    /// The underlying file list
    pub fn files(&self) -> &FileList {
        &self.files
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the table has no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn descriptor(&self, index: usize) -> Result<&FileDescriptor> {
        self.files
            .get(index)
            .ok_or_else(|| BootDiskError::config(format!("no file at index {index}")))
    }

    /// Uncompressed contents of file `index`
    pub fn raw(&self, index: usize) -> Result<Arc<[u8]>> {
        let cell = &self.raw[self.check_index(index)?];
        if let Some(data) = cell.get() {
            return Ok(data.clone());
        }

        let file = self.descriptor(index)?;
        let data: Arc<[u8]> = match fs::read(&file.path) {
            Ok(data) => data.into(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(BootDiskError::MissingFile {
                    ident: file.ident.clone(),
                    path: file.path.clone(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        Ok(cell.get_or_init(|| data).clone())
    }

    /// On-disk contents of file `index`
    ///
    /// Empty files are rejected before any compression is attempted.
    pub fn disk_data(&self, index: usize, cache: &ContentCache) -> Result<Arc<[u8]>> {
        let cell = &self.disk[self.check_index(index)?];
        if let Some(data) = cell.get() {
            return Ok(data.clone());
        }

        let file = self.descriptor(index)?;
        let raw = self.raw(index)?;
        if raw.is_empty() {
            return Err(BootDiskError::EmptyFile {
                ident: file.ident.clone(),
                path: file.path.clone(),
            });
        }

        let data: Arc<[u8]> = disk_form(&raw, file.compressed, cache)?.into();
        Ok(cell.get_or_init(|| data).clone())
    }

    /// On-disk contents of every file, in list order
    pub fn resolve_all(&self, cache: &ContentCache) -> Result<Vec<Arc<[u8]>>> {
        (0..self.len())
            .map(|index| self.disk_data(index, cache))
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<usize> {
        if index < self.len() {
            Ok(index)
        } else {
            Err(BootDiskError::config(format!(
                "no file at index {index} (have {})",
                self.len()
            )))
        }
    }
}
