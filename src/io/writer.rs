//! D64 file writer

use crate::error::Result;
use crate::image::DiskImage;
use log::info;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write a D64 file to disk as a flat sector dump
pub fn write_d64<P: AsRef<Path>>(image: &DiskImage, path: P) -> Result<()> {
    let mut file = File::create(&path)?;

    for track in image.tracks() {
        for sector in track.sectors() {
            file.write_all(sector.data())?;
        }
    }
    file.flush()?;

    info!(
        "Wrote {} ({} sectors)",
        path.as_ref().display(),
        image.total_sectors()
    );
    Ok(())
}
