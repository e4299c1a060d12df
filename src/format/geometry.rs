//! Disk geometry and region budgets

use crate::error::{BootDiskError, Result};
use crate::format::constants::*;

/// Geometry of the target medium and the sizes of its reserved regions
///
/// Side 0 track 0 holds the catalogue followed by the EXEC region, side 1
/// track 0 holds the loader, and every other track holds file data.
/// Logical tracks number (track, side) pairs in interleaved order, so
/// `logical_track = track * 2 + side`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    /// Number of sides (the layout assumes 2)
    pub num_sides: usize,
    /// Number of tracks per side
    pub tracks_per_side: usize,
    /// Sectors per track
    pub sectors_per_track: usize,
    /// Sector size in bytes
    pub sector_size: usize,
    /// Catalogue sectors at the start of side 0 track 0, omitted from the image
    pub catalogue_sectors: usize,
    /// Largest single file in bytes
    pub max_file_size: usize,
}

impl DiskGeometry {
    /// 80 track, double-sided, 16 x 256 byte sectors, 7 catalogue sectors
    pub fn adfs_l_fdload() -> Self {
        Self {
            num_sides: NUM_SIDES,
            tracks_per_side: TRACKS_PER_SIDE,
            sectors_per_track: SECTORS_PER_TRACK,
            sector_size: SECTOR_SIZE,
            catalogue_sectors: CATALOGUE_SECTORS,
            max_file_size: MAX_FILE_SIZE,
        }
    }

    /// Same layout with a different number of tracks per side
    pub fn with_tracks_per_side(mut self, tracks_per_side: usize) -> Self {
        self.tracks_per_side = tracks_per_side;
        self
    }

    /// Same layout with a different per-file maximum
    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Check the geometry can be laid out and described by the packed TOC
    ///
    /// Every placement made on a valid geometry has a track of at most
    /// 159, a sector below 16 and a size of at most 65536 bytes.
    pub fn validate(&self) -> Result<()> {
        if self.num_sides != NUM_SIDES {
            return Err(BootDiskError::config(format!(
                "geometry needs {NUM_SIDES} sides, has {}",
                self.num_sides
            )));
        }
        if self.tracks_per_side == 0 {
            return Err(BootDiskError::config("geometry has no tracks"));
        }
        if self.logical_tracks() > MAX_PACKED_TRACK as usize + 1 {
            return Err(BootDiskError::config(format!(
                "geometry has {} logical tracks, packed TOC addresses at most {}",
                self.logical_tracks(),
                MAX_PACKED_TRACK as usize + 1
            )));
        }
        if self.sectors_per_track == 0 || self.sectors_per_track > SECTORS_PER_TRACK {
            return Err(BootDiskError::config(format!(
                "geometry has {} sectors per track, must be 1 to {SECTORS_PER_TRACK}",
                self.sectors_per_track
            )));
        }
        if self.sector_size == 0 || self.catalogue_sectors > self.sectors_per_track {
            return Err(BootDiskError::config(format!(
                "geometry has {} byte sectors and {} catalogue sectors",
                self.sector_size, self.catalogue_sectors
            )));
        }
        if self.max_file_size == 0 || self.max_file_size > MAX_FILE_SIZE {
            return Err(BootDiskError::config(format!(
                "geometry allows {} byte files, must be 1 to {MAX_FILE_SIZE}",
                self.max_file_size
            )));
        }
        Ok(())
    }

    /// Bytes per track
    pub fn track_size(&self) -> usize {
        self.sectors_per_track * self.sector_size
    }

    /// Total number of logical tracks (both sides)
    pub fn logical_tracks(&self) -> usize {
        self.num_sides * self.tracks_per_side
    }

    /// Number of reserved tracks (EXEC track and loader track)
    pub fn reserved_tracks(&self) -> usize {
        2
    }

    /// Logical sector where file data starts
    pub fn reserved_prefix_sectors(&self) -> usize {
        self.reserved_tracks() * self.sectors_per_track
    }

    /// Maximum size of the EXEC region in bytes
    pub fn exec_region_size(&self) -> usize {
        (self.sectors_per_track - self.catalogue_sectors) * self.sector_size
    }

    /// Maximum size of the loader region in bytes
    pub fn loader_region_size(&self) -> usize {
        self.track_size()
    }

    /// Maximum size of the logical file data buffer in bytes
    pub fn data_budget(&self) -> usize {
        (self.logical_tracks() - self.reserved_tracks()) * self.track_size()
    }

    /// Total size of the produced image in bytes
    pub fn image_size(&self) -> usize {
        (self.logical_tracks() * self.sectors_per_track - self.catalogue_sectors)
            * self.sector_size
    }

    /// Split a logical sector index into (logical track, sector)
    pub fn track_and_sector(&self, sector_index: usize) -> (usize, usize) {
        (
            sector_index / self.sectors_per_track,
            sector_index % self.sectors_per_track,
        )
    }

    /// Split a logical track into (physical track, side)
    pub fn physical_track(&self, logical_track: usize) -> (usize, usize) {
        (logical_track / self.num_sides, logical_track % self.num_sides)
    }

    /// Is this (track, side) one of the two reserved slots?
    pub fn is_reserved(&self, track: usize, side: usize) -> bool {
        track == 0 && side < self.reserved_tracks()
    }
}

impl Default for DiskGeometry {
    fn default() -> Self {
        Self::adfs_l_fdload()
    }
}
