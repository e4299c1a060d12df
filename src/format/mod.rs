//! Disk geometry, region budgets and constants

/// Format constants
pub mod constants;
/// Disk geometry and region budgets
pub mod geometry;

pub use constants::*;
pub use geometry::DiskGeometry;

/// Region of the produced disk image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Catalogue sectors written by other tooling (not part of the image)
    Catalogue,
    /// Textual self-loading bootstrap program
    Exec,
    /// Secondary loader
    Loader,
    /// File data
    Data,
}

impl Region {
    /// Get a human-readable name for this region
    pub fn name(&self) -> &'static str {
        match self {
            Region::Catalogue => "catalogue",
            Region::Exec => "*EXEC bootstrap",
            Region::Loader => "loader",
            Region::Data => "file data",
        }
    }

    /// Classify a logical sector index
    pub fn of_sector(geometry: &DiskGeometry, sector_index: usize) -> Self {
        let (logical_track, sector) = geometry.track_and_sector(sector_index);
        match logical_track {
            0 if sector < geometry.catalogue_sectors => Region::Catalogue,
            0 => Region::Exec,
            1 => Region::Loader,
            _ => Region::Data,
        }
    }
}
