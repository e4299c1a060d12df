//! Disk image reader

use crate::error::Result;
use crate::format::DiskGeometry;
use crate::image::DiskImage;
use std::fs;
use std::path::Path;

/// Read an image file, which must be exactly the size `geometry` requires
pub fn read_image<P: AsRef<Path>>(path: P, geometry: DiskGeometry) -> Result<DiskImage> {
    let data = fs::read(path)?;
    DiskImage::from_bytes(geometry, data)
}
