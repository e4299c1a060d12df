//! Reading and writing build artifacts

/// Disk image reader
pub mod reader;
/// Artifact writer
pub mod writer;

pub use reader::read_image;
pub use writer::{write_atomic, write_build, OutputPaths};
