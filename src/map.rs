//! Logical sector map of a layout

use crate::format::Region;
use crate::layout::Layout;
use std::fmt::Write;

/// ANSI color codes for the sector map
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BRIGHT_WHITE: &str = "\x1b[97m";
    pub const DARK_WHITE: &str = "\x1b[37m";
    pub const BRIGHT_YELLOW: &str = "\x1b[93m";
    pub const DARK_YELLOW: &str = "\x1b[2;33m";
    pub const BRIGHT_CYAN: &str = "\x1b[96m";
}

const BLOCK_NO_DATA: &str = "\u{2591}"; // ░
const BLOCK_HAS_DATA: &str = "\u{2593}"; // ▓

/// What occupies a logical sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorUse {
    /// Catalogue, EXEC or loader region
    Reserved(Region),
    /// Data of the file with this list index
    File(usize),
    /// Unused
    Free,
}

impl SectorUse {
    fn glyph(&self, color: bool) -> (&'static str, &'static str) {
        if color {
            match self {
                SectorUse::Reserved(Region::Catalogue) => (colors::DARK_YELLOW, BLOCK_NO_DATA),
                SectorUse::Reserved(_) => (colors::BRIGHT_YELLOW, BLOCK_HAS_DATA),
                // Alternate shades so neighbouring files stay distinguishable
                SectorUse::File(index) if index % 2 == 0 => (colors::BRIGHT_WHITE, BLOCK_HAS_DATA),
                SectorUse::File(_) => (colors::BRIGHT_CYAN, BLOCK_HAS_DATA),
                SectorUse::Free => (colors::DARK_WHITE, BLOCK_NO_DATA),
            }
        } else {
            let c = match self {
                SectorUse::Reserved(Region::Catalogue) => "-",
                SectorUse::Reserved(Region::Loader) => "L",
                SectorUse::Reserved(_) => "E",
                SectorUse::File(index) if index % 2 == 0 => "#",
                SectorUse::File(_) => "%",
                SectorUse::Free => ".",
            };
            ("", c)
        }
    }
}

/// Classify every logical sector of a layout's geometry
pub fn sector_usage(layout: &Layout) -> Vec<SectorUse> {
    let geometry = layout.geometry();
    let total = geometry.logical_tracks() * geometry.sectors_per_track;

    let mut usage: Vec<SectorUse> = (0..total)
        .map(|index| match Region::of_sector(geometry, index) {
            Region::Data => SectorUse::Free,
            region => SectorUse::Reserved(region),
        })
        .collect();

    for file in layout.files() {
        let end = file.end_sector(geometry).min(total);
        for slot in &mut usage[file.sector_index..end] {
            *slot = SectorUse::File(file.index);
        }
    }
    usage
}

/// Render the layout as a grid with one column per logical track
///
/// Sector 0 is the bottom row. With `color` the grid uses ANSI colors,
/// otherwise plain characters.
pub fn render_layout_map(layout: &Layout, color: bool) -> String {
    let geometry = layout.geometry();
    let usage = sector_usage(layout);
    let num_tracks = geometry.logical_tracks();
    let mut out = String::new();

    let _ = writeln!(out, "=== Layout Map (logical tracks) ===");
    if color {
        let _ = writeln!(
            out,
            "Legend: {}Reserved{} {}File{} {}Free{}",
            colors::BRIGHT_YELLOW,
            colors::RESET,
            colors::BRIGHT_WHITE,
            colors::RESET,
            colors::DARK_WHITE,
            colors::RESET
        );
    } else {
        let _ = writeln!(out, "Legend: - catalogue  E exec  L loader  #/% file  . free");
    }
    out.push('\n');

    for sector in (0..geometry.sectors_per_track).rev() {
        let _ = write!(out, "{sector:>2} ");
        for track in 0..num_tracks {
            let (code, block) = usage[track * geometry.sectors_per_track + sector].glyph(color);
            out.push_str(code);
            out.push_str(block);
            if color {
                out.push_str(colors::RESET);
            }
        }
        out.push('\n');
    }

    // Track number axis, labels every 10 columns
    out.push_str("   ");
    let mut printed_cols = vec![false; num_tracks];
    for track in 0..num_tracks {
        if track % 10 == 0 && !printed_cols[track] {
            for (i, digit) in track.to_string().chars().enumerate() {
                let col = track + i;
                if col < num_tracks {
                    out.push(digit);
                    printed_cols[col] = true;
                }
            }
        } else if !printed_cols[track] {
            out.push(' ');
        }
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "{} files, {} bytes used, {} bytes free",
        layout.files().len(),
        layout.data().len(),
        layout.free_bytes()
    );
    out
}
