//! External compressor invocation

use crate::error::{BootDiskError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Turns an uncompressed file into a compressed file
pub trait Compressor: Send + Sync + fmt::Debug {
    /// Compress `input` and write the result to `output`
    ///
    /// `output` does not exist when this is called. The result is only
    /// moved into the cache if this returns `Ok`.
    fn compress(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Compressor run as a subprocess: `program <input> <output>`
#[derive(Debug, Clone)]
pub struct ExternalCompressor {
    program: PathBuf,
}

impl ExternalCompressor {
    /// Create a compressor that runs `program`
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Path of the compressor executable
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Compressor for ExternalCompressor {
    fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        let tool = self.program.display().to_string();
        tracing::debug!(%tool, input = %input.display(), "running compressor");

        let status = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .status()
            .map_err(|source| BootDiskError::ToolLaunch {
                tool: tool.clone(),
                source,
            })?;

        if !status.success() {
            return Err(BootDiskError::ToolFailed {
                tool,
                status: status.to_string(),
            });
        }

        if !output.is_file() {
            return Err(BootDiskError::ToolFailed {
                tool,
                status: format!("no output written to {}", output.display()),
            });
        }

        Ok(())
    }
}
