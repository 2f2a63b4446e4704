//! CBM DOS structures: header/BAM, directory chain, data chains and packing

/// Header/BAM sector codec
pub mod bam;
/// Data-sector chains
pub mod chain;
/// Directory chain codec
pub mod directory;
/// Packing program files onto a fresh image
pub mod packer;
/// PETASCII text conversion
pub mod petascii;
/// Program files
pub mod program;

pub use bam::{parse_bam, BamHeader};
pub use chain::{chain_sectors, read_file};
pub use directory::{parse_directory, write_directory, DirEntry, FileType};
pub use packer::{ImagePacker, PackReport};
pub use program::ProgramFile;
