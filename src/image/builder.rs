//! Builder for assembling disk images

use crate::boot::BootstrapEncoder;
use crate::cache::ContentCache;
use crate::error::{BootDiskError, Result};
use crate::files::{FileList, FileTable};
use crate::format::{DiskGeometry, Region, MAX_FILES};
use crate::image::DiskImage;
use crate::io::OutputPaths;
use crate::layout::{Layout, LayoutEngine};
use crate::toc::Toc;

/// Pad `data` with zeros up to `max`, failing if it is already larger
pub fn pad_to_budget(mut data: Vec<u8>, max: usize, what: &str) -> Result<Vec<u8>> {
    if data.len() > max {
        return Err(BootDiskError::too_large(what, data.len(), max));
    }
    data.resize(max, 0);
    Ok(data)
}

/// Every artifact of a successful build, held in memory
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// EXEC region, padded to its budget
    pub exec_region: Vec<u8>,
    /// Loader region, padded to its budget
    pub loader_region: Vec<u8>,
    /// Placement of every file
    pub layout: Layout,
    /// Table of contents
    pub toc: Toc,
    /// Packed binary table of contents
    pub packed_toc: Vec<u8>,
    /// Final disk image
    pub image: DiskImage,
}

impl BuildOutput {
    /// Write the requested artifacts
    pub fn write(&self, paths: &OutputPaths) -> Result<()> {
        crate::io::write_build(self, paths)
    }
}

/// Builder for assembling a bootable disk image
#[derive(Debug, Clone)]
pub struct DiskImageAssembler {
    geometry: DiskGeometry,
    encoder: BootstrapEncoder,
    bootstrap: Option<Vec<u8>>,
    loader: Vec<u8>,
}

impl DiskImageAssembler {
    /// Create a new assembler for the reference geometry
    pub fn new() -> Self {
        Self {
            geometry: DiskGeometry::default(),
            encoder: BootstrapEncoder::new(),
            bootstrap: None,
            loader: Vec::new(),
        }
    }

    /// Set the disk geometry
    pub fn geometry(mut self, geometry: DiskGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Set the bootstrap encoder
    pub fn encoder(mut self, encoder: BootstrapEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Hide the bootstrap's loading text
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.encoder = self.encoder.hidden(hidden);
        self
    }

    /// Set the bootstrap program (2-byte load address followed by code)
    pub fn bootstrap(mut self, blob: Vec<u8>) -> Self {
        self.bootstrap = Some(blob);
        self
    }

    /// Set the loader stored in the loader region
    pub fn loader(mut self, loader: Vec<u8>) -> Self {
        self.loader = loader;
        self
    }

    /// The EXEC and loader regions, each padded to its budget
    pub fn regions(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        self.geometry.validate()?;
        let blob = self
            .bootstrap
            .as_deref()
            .ok_or_else(|| BootDiskError::config("no bootstrap program"))?;

        let exec = pad_to_budget(
            self.encoder.encode(blob)?,
            self.geometry.exec_region_size(),
            Region::Exec.name(),
        )?;
        let loader = pad_to_budget(
            self.loader.clone(),
            self.geometry.loader_region_size(),
            Region::Loader.name(),
        )?;
        Ok((exec, loader))
    }

    /// Assemble everything, resolving file contents through `cache`
    ///
    /// The fixed regions are checked before any file is read or
    /// compressed. Nothing is written to the output locations.
    pub fn assemble(&self, files: &FileTable, cache: &ContentCache) -> Result<BuildOutput> {
        let (exec, loader) = self.regions()?;
        check_file_count(files.len())?;

        let disk_data = files.resolve_all(cache)?;
        self.finish(exec, loader, files.files(), &disk_data)
    }

    /// Assemble from already resolved disk-form contents
    pub fn assemble_data<D: AsRef<[u8]>>(
        &self,
        files: &FileList,
        disk_data: &[D],
    ) -> Result<BuildOutput> {
        let (exec, loader) = self.regions()?;
        check_file_count(files.len())?;
        self.finish(exec, loader, files, disk_data)
    }

    fn finish<D: AsRef<[u8]>>(
        &self,
        exec_region: Vec<u8>,
        loader_region: Vec<u8>,
        files: &FileList,
        disk_data: &[D],
    ) -> Result<BuildOutput> {
        if files.len() != disk_data.len() {
            return Err(BootDiskError::config(format!(
                "{} files but {} data buffers",
                files.len(),
                disk_data.len()
            )));
        }

        let layout = LayoutEngine::new(self.geometry)
            .place(files.iter().zip(disk_data.iter().map(|d| d.as_ref())))?;
        let toc = Toc::from_layout(&layout);
        let packed_toc = toc.to_packed()?;
        let image = DiskImage::assemble(self.geometry, &exec_region, &loader_region, layout.data())?;

        tracing::info!(
            files = toc.len(),
            used = layout.data().len(),
            free = layout.free_bytes(),
            "assembled disk image"
        );

        Ok(BuildOutput {
            exec_region,
            loader_region,
            layout,
            toc,
            packed_toc,
            image,
        })
    }
}

impl Default for DiskImageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn check_file_count(count: usize) -> Result<()> {
    if count > MAX_FILES {
        return Err(BootDiskError::TooManyFiles {
            count,
            max: MAX_FILES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::{FailingCompressor, ReversingCompressor};
    use crate::files::FileDescriptor;
    use std::fs;
    use std::sync::Arc;

    const BOOTSTRAP: [u8; 3] = [0x00, 0x19, 0x60];

    fn list(names: &[&str]) -> FileList {
        FileList::new(names.iter().map(|n| FileDescriptor::new(*n, format!("{n}.bin"))).collect())
            .unwrap()
    }

    #[test]
    fn test_pad_to_budget() {
        assert_eq!(pad_to_budget(vec![1, 2], 4, "x").unwrap(), vec![1, 2, 0, 0]);
        let err = pad_to_budget(vec![0; 5], 4, "loader").unwrap_err();
        assert_eq!(
            err.to_string(),
            "loader too large: 5 bytes (max is 4; overrun by 1)"
        );
    }

    #[test]
    fn test_single_file_build() {
        let output = DiskImageAssembler::new()
            .bootstrap(BOOTSTRAP.to_vec())
            .loader(vec![0xAA; 4096])
            .assemble_data(&list(&["a"]), &[vec![0u8; 4096]])
            .unwrap();

        let entry = &output.toc.entries()[0];
        assert_eq!((entry.track, entry.sector, entry.num_bytes), (2, 0, 4096));
        assert_eq!(output.packed_toc[0], 1);
        assert_eq!(&output.packed_toc[1..], &[2, 0, 0, 0xF0]);
        assert_eq!(output.image.len(), (2 * 80 * 16 - 7) * 256);
        assert_eq!(output.exec_region.len(), 2304);
        assert!(output.exec_region.starts_with(b"*BASIC\r!6400=96:CALL6400\x06\r"));
        assert_eq!(output.image.loader_region(), &[0xAA; 4096][..]);
    }

    #[test]
    fn test_missing_bootstrap() {
        let err = DiskImageAssembler::new()
            .assemble_data::<Vec<u8>>(&FileList::default(), &[])
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_exec_overflow() {
        let mut blob = vec![0x00, 0x19];
        blob.extend(std::iter::repeat(0x5A).take(1200));
        let err = DiskImageAssembler::new()
            .bootstrap(blob)
            .assemble_data::<Vec<u8>>(&FileList::default(), &[])
            .unwrap_err();
        assert!(err.to_string().starts_with("*EXEC bootstrap too large"));
    }

    #[test]
    fn test_loader_overflow_checked_before_files() {
        let cache_dir = tempfile::tempdir().unwrap();
        let compressor = Arc::new(ReversingCompressor::default());
        let cache = ContentCache::new(cache_dir.path(), compressor.clone());

        let src = tempfile::tempdir().unwrap();
        let path = src.path().join("a");
        fs::write(&path, b"abc").unwrap();
        let table = FileTable::new(
            FileList::new(vec![FileDescriptor::new("a", &path).compressed(true)]).unwrap(),
        );

        let err = DiskImageAssembler::new()
            .bootstrap(BOOTSTRAP.to_vec())
            .loader(vec![0; 4097])
            .assemble(&table, &cache)
            .unwrap_err();
        assert!(matches!(err, BootDiskError::TooLarge { ref what, .. } if what == "loader"));
        assert_eq!(compressor.calls(), 0);
    }

    #[test]
    fn test_compressed_files_resolved_through_cache() {
        let cache_dir = tempfile::tempdir().unwrap();
        let compressor = Arc::new(ReversingCompressor::default());
        let cache = ContentCache::new(cache_dir.path(), compressor.clone());

        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a"), b"abc").unwrap();
        fs::write(src.path().join("b"), b"xyz").unwrap();
        let table = FileTable::new(
            FileList::new(vec![
                FileDescriptor::new("a", src.path().join("a")).compressed(true),
                FileDescriptor::new("b", src.path().join("b")),
            ])
            .unwrap(),
        );

        let output = DiskImageAssembler::new()
            .bootstrap(BOOTSTRAP.to_vec())
            .assemble(&table, &cache)
            .unwrap();

        let a = &output.toc.entries()[0];
        assert!(a.compressed);
        assert_eq!(output.image.read_file(a.track, a.sector, a.num_bytes).unwrap(), b"cba");
        let b = &output.toc.entries()[1];
        assert_eq!((b.track, b.sector), (2, 1));
        assert_eq!(output.image.read_file(b.track, b.sector, b.num_bytes).unwrap(), b"xyz");
        assert_eq!(compressor.calls(), 1);
    }

    #[test]
    fn test_compressor_failure_aborts() {
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(cache_dir.path(), Arc::new(FailingCompressor));

        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a"), b"abc").unwrap();
        let table = FileTable::new(
            FileList::new(vec![FileDescriptor::new("a", src.path().join("a")).compressed(true)])
                .unwrap(),
        );

        let err = DiskImageAssembler::new()
            .bootstrap(BOOTSTRAP.to_vec())
            .assemble(&table, &cache)
            .unwrap_err();
        assert!(matches!(err, BootDiskError::ToolFailed { .. }));
    }

    #[test]
    fn test_oversized_geometry_is_an_error() {
        let names: Vec<String> = (0..160).map(|i| format!("f{i}")).collect();
        let files = FileList::new(
            names.iter().map(|n| FileDescriptor::new(n.as_str(), n.as_str())).collect(),
        )
        .unwrap();
        let data = vec![vec![0u8; 4096]; 160];

        let err = DiskImageAssembler::new()
            .geometry(DiskGeometry::default().with_tracks_per_side(82))
            .bootstrap(BOOTSTRAP.to_vec())
            .assemble_data(&files, &data)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_too_many_files() {
        let names: Vec<String> = (0..256).map(|i| format!("f{i}")).collect();
        let files = FileList::new(
            names.iter().map(|n| FileDescriptor::new(n.as_str(), n.as_str())).collect(),
        )
        .unwrap();
        let data = vec![vec![1u8]; 256];

        let err = DiskImageAssembler::new()
            .bootstrap(BOOTSTRAP.to_vec())
            .assemble_data(&files, &data)
            .unwrap_err();
        assert!(matches!(err, BootDiskError::TooManyFiles { count: 256, .. }));
    }
}
