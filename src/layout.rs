//! Logical sector placement of files

use crate::error::{BootDiskError, Result};
use crate::files::FileDescriptor;
use crate::format::DiskGeometry;
use std::path::PathBuf;

/// A file with its computed placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedFile {
    /// Index in the file list
    pub index: usize,
    /// Identifier of the file
    pub ident: String,
    /// Source path of the file
    pub path: PathBuf,
    /// Stored compressed
    pub compressed: bool,
    /// First logical sector
    pub sector_index: usize,
    /// Logical track (`sector_index / sectors_per_track`)
    pub track: usize,
    /// Sector within the track (`sector_index % sectors_per_track`)
    pub sector: usize,
    /// Size of the on-disk data in bytes
    pub num_bytes: usize,
}

impl PlacedFile {
    /// Number of sectors occupied by the file
    pub fn sector_count(&self, geometry: &DiskGeometry) -> usize {
        self.num_bytes.div_ceil(geometry.sector_size)
    }

    /// One past the last logical sector occupied by the file
    pub fn end_sector(&self, geometry: &DiskGeometry) -> usize {
        self.sector_index + self.sector_count(geometry)
    }
}

/// Result of placing every file
#[derive(Debug, Clone)]
pub struct Layout {
    geometry: DiskGeometry,
    data: Vec<u8>,
    files: Vec<PlacedFile>,
}

impl Layout {
    /// Geometry the layout was computed for
    pub fn geometry(&self) -> &DiskGeometry {
        &self.geometry
    }

    /// Logical file data, starting at the first data track, sector aligned
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Placed files in list order
    pub fn files(&self) -> &[PlacedFile] {
        &self.files
    }

    /// First logical sector not used by any file
    pub fn next_free_sector(&self) -> usize {
        self.geometry.reserved_prefix_sectors() + self.data.len() / self.geometry.sector_size
    }

    /// Bytes of the data budget still free
    pub fn free_bytes(&self) -> usize {
        self.geometry.data_budget() - self.data.len()
    }
}

/// Places files into consecutive sector runs after the reserved tracks
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    geometry: DiskGeometry,
}

impl LayoutEngine {
    /// Create an engine for `geometry`
    pub fn new(geometry: DiskGeometry) -> Self {
        Self { geometry }
    }

    /// Place files in order
    ///
    /// Each file starts on a sector boundary immediately after the previous
    /// one. Empty files, files over the per-file maximum and overflowing the
    /// data budget are all fatal, as is a geometry the packed TOC cannot
    /// describe.
    pub fn place<'a, I>(&self, files: I) -> Result<Layout>
    where
        I: IntoIterator<Item = (&'a FileDescriptor, &'a [u8])>,
    {
        let geometry = &self.geometry;
        geometry.validate()?;
        let sector_size = geometry.sector_size;
        let budget = geometry.data_budget();

        let mut data = Vec::new();
        let mut placed = Vec::new();

        for (index, (file, disk_data)) in files.into_iter().enumerate() {
            if disk_data.is_empty() {
                return Err(BootDiskError::EmptyFile {
                    ident: file.ident.clone(),
                    path: file.path.clone(),
                });
            }

            if disk_data.len() > geometry.max_file_size {
                return Err(BootDiskError::too_large(
                    format!("file {}", file.ident),
                    disk_data.len(),
                    geometry.max_file_size,
                ));
            }

            let sector_index = geometry.reserved_prefix_sectors() + data.len() / sector_size;
            let (track, sector) = geometry.track_and_sector(sector_index);

            data.extend_from_slice(disk_data);
            data.resize(data.len().next_multiple_of(sector_size), 0);

            if data.len() > budget {
                return Err(BootDiskError::too_large("file data", data.len(), budget));
            }

            tracing::trace!(
                ident = %file.ident,
                track,
                sector,
                bytes = disk_data.len(),
                "placed file"
            );

            placed.push(PlacedFile {
                index,
                ident: file.ident.clone(),
                path: file.path.clone(),
                compressed: file.compressed,
                sector_index,
                track,
                sector,
                num_bytes: disk_data.len(),
            });
        }

        tracing::debug!(
            files = placed.len(),
            bytes = data.len(),
            free = budget - data.len(),
            "layout complete"
        );

        Ok(Layout {
            geometry: *geometry,
            data,
            files: placed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn place(geometry: DiskGeometry, sizes: &[usize]) -> Result<Layout> {
        let files: Vec<(FileDescriptor, Vec<u8>)> = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| (FileDescriptor::new(format!("f{i}"), format!("F{i}")), vec![0xAA; n]))
            .collect();
        LayoutEngine::new(geometry).place(files.iter().map(|(f, d)| (f, d.as_slice())))
    }

    #[test]
    fn test_first_file_after_reserved_tracks() {
        let layout = place(DiskGeometry::default(), &[4096]).unwrap();
        let file = &layout.files()[0];
        assert_eq!(file.sector_index, 32);
        assert_eq!((file.track, file.sector), (2, 0));
        assert_eq!(file.num_bytes, 4096);
        assert_eq!(layout.data().len(), 4096);
    }

    #[test]
    fn test_sector_alignment() {
        // 1 byte at L2 S0, 3841 bytes at L2 S1 to L3 S0, then L3 S1
        let layout = place(DiskGeometry::default(), &[1, 3841, 10]).unwrap();
        let positions: Vec<_> = layout.files().iter().map(|f| (f.track, f.sector)).collect();
        assert_eq!(positions, vec![(2, 0), (2, 1), (3, 1)]);
        assert_eq!(layout.data().len(), 256 + 3840 + 256 + 256);
        assert_eq!(layout.data()[1], 0);
        assert_eq!(layout.next_free_sector(), 32 + 18);
    }

    #[test]
    fn test_max_file_size_boundary() {
        let layout = place(DiskGeometry::default(), &[65536]).unwrap();
        assert_eq!(layout.files()[0].num_bytes, 65536);

        let err = place(DiskGeometry::default(), &[65537]).unwrap_err();
        match err {
            BootDiskError::TooLarge {
                size, max, overrun, ..
            } => {
                assert_eq!((size, max, overrun), (65537, 65536, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_byte_file_rejected() {
        let err = place(DiskGeometry::default(), &[10, 0]).unwrap_err();
        assert!(matches!(err, BootDiskError::EmptyFile { ref ident, .. } if ident == "f1"));
    }

    #[test]
    fn test_data_budget() {
        let geometry = DiskGeometry::default().with_tracks_per_side(3);
        assert_eq!(geometry.data_budget(), 4 * 4096);

        place(geometry, &[4096, 4096, 4096, 4096]).unwrap();

        let err = place(geometry, &[4096, 4096, 4096, 4096, 1]).unwrap_err();
        match err {
            BootDiskError::TooLarge { size, max, overrun, .. } => {
                assert_eq!((size, max, overrun), (16640, 16384, 256));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reference_budget_fills_exactly() {
        let sizes = vec![4096; 2 * 79];
        let layout = place(DiskGeometry::default(), &sizes).unwrap();
        assert_eq!(layout.free_bytes(), 0);
        let last = layout.files().last().unwrap();
        assert_eq!(last.end_sector(layout.geometry()), 160 * 16);
        assert!(last.track <= 159);
    }

    #[test]
    fn test_unpackable_geometry_rejected() {
        let geometry = DiskGeometry::default().with_tracks_per_side(82);
        let err = place(geometry, &[4096; 160]).unwrap_err();
        assert!(matches!(err, BootDiskError::Config(_)));

        let geometry = DiskGeometry::default().with_max_file_size(65537);
        assert!(place(geometry, &[65537]).unwrap_err().is_configuration());
    }

    proptest! {
        #[test]
        fn prop_placements_ordered_and_disjoint(sizes in prop::collection::vec(1usize..15000, 1..40)) {
            let geometry = DiskGeometry::default();
            let layout = place(geometry, &sizes).unwrap();
            prop_assert_eq!(layout.files().len(), sizes.len());

            let mut next = geometry.reserved_prefix_sectors();
            for (i, file) in layout.files().iter().enumerate() {
                prop_assert_eq!(file.index, i);
                prop_assert_eq!(file.num_bytes, sizes[i]);
                prop_assert_eq!(file.sector_index, next);
                prop_assert_eq!(file.track, file.sector_index / 16);
                prop_assert_eq!(file.sector, file.sector_index % 16);
                prop_assert!(file.sector < 16);
                next = file.end_sector(&geometry);
            }
            prop_assert_eq!(next, layout.next_free_sector());
        }
    }
}
