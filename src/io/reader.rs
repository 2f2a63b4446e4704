//! D64 file reader

use crate::error::Result;
use crate::image::DiskImage;
use log::info;
use std::fs;
use std::path::Path;

/// Check if a file is likely a D64 image based on extension
pub fn is_d64_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("d64"))
        .unwrap_or(false)
}

/// Read a D64 file from disk
///
/// The disk size is identified from the file length; an appended
/// error-info block is accepted and discarded.
pub fn read_d64<P: AsRef<Path>>(path: P) -> Result<DiskImage> {
    let filename = path
        .as_ref()
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string());

    let data = fs::read(&path)?;
    let mut image = DiskImage::from_bytes(&data)?;
    image.filename = filename;

    info!(
        "Read {} ({}, {} directory entries)",
        path.as_ref().display(),
        image.size(),
        image.directory().len()
    );
    Ok(image)
}
