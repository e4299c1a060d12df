//! Disk image assembly and access

/// Assembler producing every build artifact
pub mod builder;
/// Logical to physical track ordering
pub mod interleave;

pub use builder::{BuildOutput, DiskImageAssembler};
pub use interleave::{deinterleave, interleave};

use crate::error::{BootDiskError, Result};
use crate::format::{DiskGeometry, Region};
use std::path::Path;

/// A complete disk image
///
/// The image holds every sector of side 0 followed by every sector of
/// side 1, except the catalogue sectors at the very start of side 0 which
/// are written by other tooling. The EXEC region therefore starts at
/// offset 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskImage {
    geometry: DiskGeometry,
    data: Vec<u8>,
}

impl DiskImage {
    /// Build an image from its regions
    ///
    /// `file_data` is in logical track order starting at the first data
    /// track. Each region is checked against its own budget.
    pub fn assemble(
        geometry: DiskGeometry,
        exec_region: &[u8],
        loader_region: &[u8],
        file_data: &[u8],
    ) -> Result<Self> {
        geometry.validate()?;
        check_budget(Region::Exec, exec_region.len(), geometry.exec_region_size())?;
        check_budget(Region::Loader, loader_region.len(), geometry.loader_region_size())?;
        check_budget(Region::Data, file_data.len(), geometry.data_budget())?;

        let mut full = interleave(file_data, &geometry);

        let exec_start = geometry.catalogue_sectors * geometry.sector_size;
        full[exec_start..exec_start + exec_region.len()].copy_from_slice(exec_region);

        let loader_start = interleave::physical_offset(&geometry, 0, 1);
        full[loader_start..loader_start + loader_region.len()].copy_from_slice(loader_region);

        let data = full.split_off(exec_start);
        debug_assert_eq!(data.len(), geometry.image_size());

        Ok(Self { geometry, data })
    }

    /// Wrap existing image bytes, which must be exactly the image size
    pub fn from_bytes(geometry: DiskGeometry, data: Vec<u8>) -> Result<Self> {
        if data.len() != geometry.image_size() {
            return Err(BootDiskError::ImageSize {
                expected: geometry.image_size(),
                actual: data.len(),
            });
        }
        Ok(Self { geometry, data })
    }

    /// Open an image file
    pub fn open<P: AsRef<Path>>(path: P, geometry: DiskGeometry) -> Result<Self> {
        crate::io::read_image(path, geometry)
    }

    /// Save the image to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::io::write_atomic(path, &self.data)
    }

    /// Geometry of the image
    pub fn geometry(&self) -> &DiskGeometry {
        &self.geometry
    }

    /// Raw image bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the image has no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The EXEC region (rest of side 0 track 0)
    pub fn exec_region(&self) -> &[u8] {
        &self.data[..self.geometry.exec_region_size()]
    }

    /// The loader region (side 1 track 0)
    pub fn loader_region(&self) -> &[u8] {
        let start = self.image_offset(0, 1, 0);
        &self.data[start..start + self.geometry.loader_region_size()]
    }

    /// Read one sector by logical track and sector
    ///
    /// Returns `None` for catalogue sectors and positions off the disk.
    pub fn read_sector(&self, logical_track: usize, sector: usize) -> Option<&[u8]> {
        let g = &self.geometry;
        if logical_track >= g.logical_tracks() || sector >= g.sectors_per_track {
            return None;
        }
        if logical_track == 0 && sector < g.catalogue_sectors {
            return None;
        }

        let (track, side) = g.physical_track(logical_track);
        let start = self.image_offset(track, side, sector);
        self.data.get(start..start + g.sector_size)
    }

    /// Read `num_bytes` starting at a logical (track, sector)
    ///
    /// Follows logical sector order, so a run crossing a track boundary
    /// continues on the other side.
    pub fn read_file(&self, logical_track: usize, sector: usize, num_bytes: usize) -> Option<Vec<u8>> {
        let g = &self.geometry;
        let first = logical_track * g.sectors_per_track + sector;

        let mut out = Vec::with_capacity(num_bytes.next_multiple_of(g.sector_size));
        for index in first..first + num_bytes.div_ceil(g.sector_size) {
            let (t, s) = g.track_and_sector(index);
            out.extend_from_slice(self.read_sector(t, s)?);
        }
        out.truncate(num_bytes);
        Some(out)
    }

    fn image_offset(&self, track: usize, side: usize, sector: usize) -> usize {
        let g = &self.geometry;
        interleave::physical_offset(g, track, side) + sector * g.sector_size
            - g.catalogue_sectors * g.sector_size
    }
}

fn check_budget(region: Region, size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(BootDiskError::too_large(region.name(), size, max));
    }
    Ok(())
}
