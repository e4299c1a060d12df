//! Artifact writer

use crate::error::Result;
use crate::image::BuildOutput;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where to write each build artifact; `None` skips that artifact
#[derive(Debug, Clone, Default)]
pub struct OutputPaths {
    /// Final disk image
    pub image: Option<PathBuf>,
    /// Table of contents as JSON
    pub toc_json: Option<PathBuf>,
    /// Packed binary table of contents
    pub toc_packed: Option<PathBuf>,
    /// Padded EXEC region on its own
    pub exec_region: Option<PathBuf>,
    /// Padded loader region on its own
    pub loader_region: Option<PathBuf>,
}

impl OutputPaths {
    /// Check if no artifact was requested
    pub fn is_empty(&self) -> bool {
        self.image.is_none()
            && self.toc_json.is_none()
            && self.toc_packed.is_none()
            && self.exec_region.is_none()
            && self.loader_region.is_none()
    }
}

/// Write `data` to `path` via a temporary file in the same directory
///
/// Readers never observe a partially written file.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Write every requested artifact of a build
///
/// All serialisation happens before the first file is written.
pub fn write_build(output: &BuildOutput, paths: &OutputPaths) -> Result<()> {
    let toc_json = match paths.toc_json {
        Some(_) => Some(output.toc.to_json()?),
        None => None,
    };

    let artifacts: [(&Option<PathBuf>, Option<&[u8]>); 5] = [
        (&paths.exec_region, Some(output.exec_region.as_slice())),
        (&paths.loader_region, Some(output.loader_region.as_slice())),
        (&paths.image, Some(output.image.as_bytes())),
        (&paths.toc_json, toc_json.as_deref()),
        (&paths.toc_packed, Some(output.packed_toc.as_slice())),
    ];

    for (path, data) in artifacts {
        if let (Some(path), Some(data)) = (path, data) {
            write_atomic(path, data)?;
            tracing::debug!(path = %path.display(), bytes = data.len(), "wrote artifact");
        }
    }
    Ok(())
}
