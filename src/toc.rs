//! Table of contents in structured (JSON) and packed binary form
//!
//! The packed form is read by the bootstrap code on the target:
//!
//! ```text
//! +0  file count
//! +1  per file, in list order:
//!       logical track (0-159)
//!       sector (bits 0-3) | 0x80 if compressed
//!       -num_bytes, 16-bit little-endian two's complement
//! ```

use crate::error::{BootDiskError, Result};
use crate::format::constants::*;
use crate::layout::{Layout, PlacedFile};
use serde::{Deserialize, Serialize};

/// One file's entry in the table of contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Identifier of the file
    pub ident: String,
    /// Source path of the file
    pub path: String,
    /// Stored compressed
    pub compressed: bool,
    /// Index in the file list
    pub index: usize,
    /// Logical track, `ltrack` in the JSON form
    #[serde(rename = "ltrack")]
    pub track: usize,
    /// Sector within the track
    pub sector: usize,
    /// Size of the on-disk data in bytes
    pub num_bytes: usize,
}

impl From<&PlacedFile> for TocEntry {
    fn from(file: &PlacedFile) -> Self {
        Self {
            ident: file.ident.clone(),
            path: file.path.display().to_string(),
            compressed: file.compressed,
            index: file.index,
            track: file.track,
            sector: file.sector,
            num_bytes: file.num_bytes,
        }
    }
}

/// Ordered table of contents
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Toc {
    entries: Vec<TocEntry>,
}

impl Toc {
    /// Table of contents for a layout, in file list order
    pub fn from_layout(layout: &Layout) -> Self {
        Self {
            entries: layout.files().iter().map(TocEntry::from).collect(),
        }
    }

    /// Entries in file list order
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by identifier
    pub fn get(&self, ident: &str) -> Option<&TocEntry> {
        self.entries.iter().find(|e| e.ident == ident)
    }

    /// Pretty-printed JSON, 4-space indent
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        Ok(out)
    }

    /// Parse the JSON form
    pub fn from_json(json: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }

    /// Packed binary form
    pub fn to_packed(&self) -> Result<Vec<u8>> {
        if self.entries.len() > MAX_FILES {
            return Err(BootDiskError::TooManyFiles {
                count: self.entries.len(),
                max: MAX_FILES,
            });
        }

        let mut out = Vec::with_capacity(1 + self.entries.len() * PACKED_ENTRY_SIZE);
        out.push(self.entries.len() as u8);
        for entry in &self.entries {
            out.extend_from_slice(&PackedEntry::from(entry).to_bytes());
        }
        Ok(out)
    }
}

/// One entry of the packed table of contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedEntry {
    /// Logical track
    pub track: u8,
    /// Sector within the track
    pub sector: u8,
    /// Stored compressed
    pub compressed: bool,
    /// `-num_bytes` as a 16-bit two's complement value
    pub size_word: u16,
}

impl PackedEntry {
    /// Size in bytes (a size word of 0 means 65536)
    pub fn num_bytes(&self) -> usize {
        match self.size_word {
            0 => 0x10000,
            word => 0x10000 - word as usize,
        }
    }

    /// Encode as 4 bytes
    pub fn to_bytes(&self) -> [u8; PACKED_ENTRY_SIZE] {
        let flags = if self.compressed { PACKED_COMPRESSED_FLAG } else { 0 };
        let [lo, hi] = self.size_word.to_le_bytes();
        [self.track, (self.sector & PACKED_SECTOR_MASK) | flags, lo, hi]
    }

    /// Decode from 4 bytes
    pub fn from_bytes(bytes: [u8; PACKED_ENTRY_SIZE]) -> Self {
        Self {
            track: bytes[0],
            sector: bytes[1] & PACKED_SECTOR_MASK,
            compressed: bytes[1] & PACKED_COMPRESSED_FLAG != 0,
            size_word: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

impl From<&TocEntry> for PackedEntry {
    /// # Panics
    ///
    /// If the entry's track, sector or size cannot be represented. The
    /// layout never produces such entries.
    fn from(entry: &TocEntry) -> Self {
        assert!(
            entry.track <= MAX_PACKED_TRACK as usize,
            "track {} out of range for {}",
            entry.track,
            entry.ident
        );
        assert!(
            entry.sector < SECTORS_PER_TRACK,
            "sector {} out of range for {}",
            entry.sector,
            entry.ident
        );
        assert!(
            entry.num_bytes >= 1 && entry.num_bytes <= MAX_FILE_SIZE,
            "size {} out of range for {}",
            entry.num_bytes,
            entry.ident
        );

        Self {
            track: entry.track as u8,
            sector: entry.sector as u8,
            compressed: entry.compressed,
            size_word: (entry.num_bytes as u32).wrapping_neg() as u16,
        }
    }
}

/// Decode a packed table of contents
pub fn decode_packed(data: &[u8]) -> Result<Vec<PackedEntry>> {
    let (&count, body) = data
        .split_first()
        .ok_or_else(|| BootDiskError::malformed_toc(0, "missing file count"))?;

    let expected = count as usize * PACKED_ENTRY_SIZE;
    if body.len() != expected {
        return Err(BootDiskError::malformed_toc(
            1,
            format!(
                "{count} entries need {expected} bytes, found {}",
                body.len()
            ),
        ));
    }

    Ok(body
        .chunks_exact(PACKED_ENTRY_SIZE)
        .map(|chunk| PackedEntry::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
