//! Reference geometry constants for the 80 track double-sided target

/// Bytes per sector
pub const SECTOR_SIZE: usize = 256;

/// Sectors per track
pub const SECTORS_PER_TRACK: usize = 16;

/// Tracks per side
pub const TRACKS_PER_SIDE: usize = 80;

/// Number of sides
pub const NUM_SIDES: usize = 2;

/// Bytes per track
pub const TRACK_SIZE: usize = SECTORS_PER_TRACK * SECTOR_SIZE;

/// Catalogue sectors at the start of side 0 track 0, written by other tooling
pub const CATALOGUE_SECTORS: usize = 7;

/// Sectors of side 0 track 0 available to the EXEC bootstrap
pub const EXEC_REGION_SECTORS: usize = SECTORS_PER_TRACK - CATALOGUE_SECTORS;

/// Size of the loader region (side 1 track 0)
pub const LOADER_REGION_SIZE: usize = TRACK_SIZE;

/// Largest single file that can be placed
pub const MAX_FILE_SIZE: usize = 65536;

/// Largest number of files the packed TOC can describe
pub const MAX_FILES: usize = 255;

/// Highest logical track the packed TOC can describe
pub const MAX_PACKED_TRACK: u16 = 159;

/// Compressed flag in the packed TOC sector byte
pub const PACKED_COMPRESSED_FLAG: u8 = 0x80;

/// Sector number mask in the packed TOC sector byte
pub const PACKED_SECTOR_MASK: u8 = 0x0F;

/// Size of one packed TOC entry
pub const PACKED_ENTRY_SIZE: usize = 4;

/// Round a byte count up to a whole number of sectors
#[inline]
pub fn sectors_for(num_bytes: usize) -> usize {
    num_bytes.div_ceil(SECTOR_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sectors_for() {
        assert_eq!(sectors_for(0), 0);
        assert_eq!(sectors_for(1), 1);
        assert_eq!(sectors_for(256), 1);
        assert_eq!(sectors_for(257), 2);
        assert_eq!(sectors_for(3841), 16);
    }

    #[test]
    fn test_exec_region() {
        assert_eq!(EXEC_REGION_SECTORS, 9);
        assert_eq!(EXEC_REGION_SECTORS * SECTOR_SIZE, 2304);
    }
}
