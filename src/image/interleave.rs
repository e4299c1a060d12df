//! Logical to physical track ordering
//!
//! File data is laid out in logical track order, where logical track
//! `n` is physical track `n / 2` on side `n % 2`. The image stores all of
//! side 0 followed by all of side 1, so the data has to be redistributed
//! track by track.

use crate::format::DiskGeometry;

/// Byte offset of a physical (track, side) in a full side-major buffer
#[inline]
pub fn physical_offset(geometry: &DiskGeometry, track: usize, side: usize) -> usize {
    (side * geometry.tracks_per_side + track) * geometry.track_size()
}

/// Index into the logical file data of the track stored at (track, side)
///
/// Returns `None` for the reserved EXEC and loader slots.
#[inline]
pub fn data_track_index(geometry: &DiskGeometry, track: usize, side: usize) -> Option<usize> {
    if geometry.is_reserved(track, side) {
        None
    } else {
        Some((track - 1) * geometry.num_sides + side)
    }
}

/// Redistribute logical file data into side-major physical order
///
/// The result covers every track of both sides. The reserved slots are
/// left zeroed, as is any track past the end of `logical`.
pub fn interleave(logical: &[u8], geometry: &DiskGeometry) -> Vec<u8> {
    let track_size = geometry.track_size();
    let mut physical = vec![0u8; geometry.logical_tracks() * track_size];

    for side in 0..geometry.num_sides {
        for track in 0..geometry.tracks_per_side {
            let Some(index) = data_track_index(geometry, track, side) else {
                continue;
            };

            let start = index * track_size;
            if start >= logical.len() {
                continue;
            }
            let chunk = &logical[start..(start + track_size).min(logical.len())];

            let dest = physical_offset(geometry, track, side);
            physical[dest..dest + chunk.len()].copy_from_slice(chunk);
        }
    }

    physical
}

/// Inverse of [`interleave`]: gather the data tracks back into logical order
pub fn deinterleave(physical: &[u8], geometry: &DiskGeometry) -> Vec<u8> {
    let track_size = geometry.track_size();
    let data_tracks = geometry.logical_tracks() - geometry.reserved_tracks();
    let mut logical = vec![0u8; data_tracks * track_size];

    for side in 0..geometry.num_sides {
        for track in 0..geometry.tracks_per_side {
            let Some(index) = data_track_index(geometry, track, side) else {
                continue;
            };

            let src = physical_offset(geometry, track, side);
            if src + track_size > physical.len() {
                continue;
            }
            logical[index * track_size..(index + 1) * track_size]
                .copy_from_slice(&physical[src..src + track_size]);
        }
    }

    logical
}
