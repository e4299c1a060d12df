/*!
# bootdisk

A Rust library for assembling self-booting BBC Micro ADFS L disk images with a
sector-addressed table of contents.

## Features

- Sector placement of an ordered file list after two reserved boot tracks
- Table of contents as JSON and as a packed binary form for 6502 code
- Content-addressed compression cache with parallel warming
- `*EXEC` bootstrap encoding of a machine code loader as BASIC pokes
- Physical re-interleaving into a side-major disk image

## Quick Start

```rust,no_run
use bootdisk::{
    ContentCache, DiskImageAssembler, ExternalCompressor, FileDescriptor, FileList, FileTable,
    OutputPaths,
};
use std::sync::Arc;

let files = FileList::new(vec![
    FileDescriptor::new("screen0", "beeb/screen0.bin").compressed(true),
    FileDescriptor::new("font", "beeb/font.bin"),
])?;
let table = FileTable::new(files);
let cache = ContentCache::new(".cache", Arc::new(ExternalCompressor::new("zx02")));

let output = DiskImageAssembler::new()
    .bootstrap(std::fs::read("build/loader0.prg")?)
    .loader(std::fs::read("build/loader1.bin")?)
    .hidden(true)
    .assemble(&table, &cache)?;

output.write(&OutputPaths {
    image: Some("build/disk.img".into()),
    toc_packed: Some("build/toc.bin".into()),
    ..Default::default()
})?;
# Ok::<(), bootdisk::BootDiskError>(())
```

## Modules

- `format`: geometry, region budgets and constants
- `files`: file descriptors and lazily resolved contents
- `cache`: content cache, compressors and job runners
- `boot`: `*EXEC` bootstrap encoder
- `layout`: logical sector placement
- `toc`: table of contents encodings
- `image`: re-interleaving and image assembly
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// `*EXEC` bootstrap encoder
pub mod boot;
/// Content-addressed compression cache
pub mod cache;
/// Build manifest and environment configuration
pub mod config;
/// Error types and Result alias
pub mod error;
/// File descriptors and resolved contents
pub mod files;
/// Disk geometry and constants
pub mod format;
/// Disk image assembly
pub mod image;
/// Reading and writing build artifacts
pub mod io;
/// Logical sector placement
pub mod layout;
/// Layout map visualization
pub mod map;
/// Table of contents encodings
pub mod toc;

// Re-export common types
pub use boot::{shortest_literal, BootstrapEncoder};
pub use cache::{
    CacheEntry, CacheKey, CacheWarmScheduler, Compressor, ContentCache, ExternalCompressor,
    JobRunner, NinjaRunner, ThreadPoolRunner, WarmPlan, WarmReport,
};
pub use config::{CompressionSettings, Environment, Manifest, RunnerKind};
pub use error::{BootDiskError, Result};
pub use files::{FileDescriptor, FileList, FileTable};
pub use format::{DiskGeometry, Region};
pub use image::{BuildOutput, DiskImage, DiskImageAssembler};
pub use io::OutputPaths;
pub use layout::{Layout, LayoutEngine, PlacedFile};
pub use map::render_layout_map;
pub use toc::{decode_packed, PackedEntry, Toc, TocEntry};
