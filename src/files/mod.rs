//! Logical file descriptors and the ordered file list

/// Lazily resolved raw and disk-form file contents
pub mod table;

pub use table::{disk_form, FileTable};

use crate::error::{BootDiskError, Result};
use std::collections::HashSet;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// A file to be placed on the disk
///
/// Descriptors are immutable. Their contents are loaded separately by a
/// [`FileTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Short symbolic name used by the target code to refer to the file
    pub ident: String,
    /// Source path of the uncompressed data
    pub path: PathBuf,
    /// Store the file compressed
    pub compressed: bool,
}

impl FileDescriptor {
    /// Create an uncompressed file descriptor
    pub fn new<S: Into<String>, P: Into<PathBuf>>(ident: S, path: P) -> Self {
        Self {
            ident: ident.into(),
            path: path.into(),
            compressed: false,
        }
    }

    /// Set whether the file is stored compressed
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Source path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Ordered list of files with unique identifiers
///
/// The declared order determines physical placement on the disk.
#[derive(Debug, Clone, Default)]
pub struct FileList {
    files: Vec<FileDescriptor>,
}

impl FileList {
    /// Create a file list, rejecting duplicate identifiers
    pub fn new(files: Vec<FileDescriptor>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(files.len());
        for file in &files {
            if !seen.insert(file.ident.as_str()) {
                return Err(BootDiskError::DuplicateIdent(file.ident.clone()));
            }
        }

        Ok(Self { files })
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the list has no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Get a file by index
    pub fn get(&self, index: usize) -> Option<&FileDescriptor> {
        self.files.get(index)
    }

    /// Iterate over files in declared order
    pub fn iter(&self) -> std::slice::Iter<'_, FileDescriptor> {
        self.files.iter()
    }

    /// Find the index of a file by identifier
    pub fn position(&self, ident: &str) -> Option<usize> {
        self.files.iter().position(|f| f.ident == ident)
    }

    /// Assembler source defining one constant per file index
    ///
    /// ```text
    /// file_screen0=0 ; data/screen0.dat
    /// num_files=1
    /// ```
    pub fn constants_source(&self) -> String {
        let mut output = String::new();
        for (index, file) in self.files.iter().enumerate() {
            let _ = writeln!(
                output,
                "file_{}={} ; {}",
                file.ident,
                index,
                file.path.display()
            );
        }
        let _ = writeln!(output, "num_files={}", self.files.len());
        output
    }
}

impl<'a> IntoIterator for &'a FileList {
    type Item = &'a FileDescriptor;
    type IntoIter = std::slice::Iter<'a, FileDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
