//! Error types and Result alias

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for disk build operations
pub type Result<T> = std::result::Result<T, BootDiskError>;

/// Errors that can occur while assembling a disk image
///
/// Every variant is fatal: a build either completes or aborts without
/// writing any output.
#[derive(Debug, Error)]
pub enum BootDiskError {
    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The same identifier appears twice in the file list
    #[error("duplicate ident in files list: {0}")]
    DuplicateIdent(String),

    /// A file named in the file list does not exist
    #[error("file not found for {ident}: {}", path.display())]
    MissingFile {
        /// Identifier of the file
        ident: String,
        /// Path that could not be found
        path: PathBuf,
    },

    /// A file in the file list has no content
    #[error("file is empty for {ident}: {}", path.display())]
    EmptyFile {
        /// Identifier of the file
        ident: String,
        /// Path of the empty file
        path: PathBuf,
    },

    /// A region, file or the whole image exceeds its byte budget
    #[error("{what} too large: {size} bytes (max is {max}; overrun by {overrun})")]
    TooLarge {
        /// Description of the oversized item
        what: String,
        /// Actual size in bytes
        size: usize,
        /// Maximum allowed size in bytes
        max: usize,
        /// Number of bytes over the budget
        overrun: usize,
    },

    /// More files than the packed table of contents can describe
    #[error("too many files: {count} (max is {max})")]
    TooManyFiles {
        /// Number of files in the list
        count: usize,
        /// Maximum supported number of files
        max: usize,
    },

    /// Bootstrap program is shorter than its header plus one byte of code
    #[error("file too small: {size} bytes (need at least 3)")]
    BootstrapTooSmall {
        /// Actual size in bytes
        size: usize,
    },

    /// An external tool could not be started
    #[error("failed to run {tool}: {source}")]
    ToolLaunch {
        /// Program that was being started
        tool: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// An external tool exited unsuccessfully
    #[error("{tool} failed: {status}")]
    ToolFailed {
        /// Program that failed
        tool: String,
        /// Exit status description
        status: String,
    },

    /// Invalid build configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Build manifest could not be parsed
    #[error("Manifest parse error: {0}")]
    Manifest(#[from] toml::de::Error),

    /// Table of contents could not be serialised or parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Packed table of contents is truncated or inconsistent
    #[error("Malformed packed TOC at offset {offset}: {message}")]
    MalformedToc {
        /// Byte offset where the problem was found
        offset: usize,
        /// Error message
        message: String,
    },

    /// A disk image does not have the size its geometry requires
    #[error("Invalid image size: expected {expected} bytes, found {actual}")]
    ImageSize {
        /// Size required by the geometry
        expected: usize,
        /// Size of the data supplied
        actual: usize,
    },
}

impl BootDiskError {
    /// Create a budget violation error from an actual size and its maximum
    pub fn too_large<S: Into<String>>(what: S, size: usize, max: usize) -> Self {
        BootDiskError::TooLarge {
            what: what.into(),
            size,
            max,
            overrun: size.saturating_sub(max),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        BootDiskError::Config(message.into())
    }

    /// Create a malformed packed TOC error
    pub fn malformed_toc<S: Into<String>>(offset: usize, message: S) -> Self {
        BootDiskError::MalformedToc {
            offset,
            message: message.into(),
        }
    }

    /// Is this a configuration error (bad file list or settings)?
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BootDiskError::DuplicateIdent(_)
                | BootDiskError::MissingFile { .. }
                | BootDiskError::EmptyFile { .. }
                | BootDiskError::Config(_)
                | BootDiskError::Manifest(_)
        )
    }

    /// Is this a budget violation?
    pub fn is_budget(&self) -> bool {
        matches!(
            self,
            BootDiskError::TooLarge { .. } | BootDiskError::TooManyFiles { .. }
        )
    }
}
