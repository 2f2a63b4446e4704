//! Lay program files out on a fresh image

use crate::error::{D64Error, Result};
use crate::filesystem::bam;
use crate::filesystem::directory::{self, DirEntry, MAX_DIR_ENTRIES};
use crate::filesystem::program::ProgramFile;
use crate::format::*;
use crate::image::DiskImage;
use log::{debug, info};
use std::collections::HashSet;

/// Summary of a packing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackReport {
    /// Number of files written
    pub files: usize,
    /// Data sectors allocated to files
    pub data_sectors: usize,
    /// Directory sectors written
    pub directory_sectors: usize,
    /// Blocks free as recorded in the new header
    pub blocks_free: usize,
}

/// Builder for packing program files into a new image
pub struct ImagePacker {
    disk_name: String,
    disk_id: [u8; 2],
    size: DiskSize,
}

impl ImagePacker {
    /// Create a packer for a standard 35-track disk with the given name
    pub fn new(disk_name: &str) -> Self {
        Self {
            disk_name: disk_name.to_string(),
            disk_id: *b"00",
            size: DiskSize::Standard,
        }
    }

    /// Set the two-byte disk ID
    pub fn id(mut self, disk_id: [u8; 2]) -> Self {
        self.disk_id = disk_id;
        self
    }

    /// Set the disk size
    pub fn size(mut self, size: DiskSize) -> Self {
        self.size = size;
        self
    }

    /// Pack files into a freshly formatted image
    ///
    /// Files are placed in order. Each one starts at the first free data
    /// sector (track 18 is never used for data) and continues on the next
    /// free sectors in ascending order, linked through the first two bytes
    /// of every sector. The last sector of a file links to (0, 0).
    pub fn build(&self, programs: &[ProgramFile]) -> Result<(DiskImage, PackReport)> {
        if programs.len() > MAX_DIR_ENTRIES {
            return Err(D64Error::DirectoryFull {
                entries: programs.len(),
            });
        }

        info!(
            "Packing {} files into '{}' ({})",
            programs.len(),
            self.disk_name,
            self.size
        );

        let mut image = DiskImage::format(self.size);
        let order: Vec<(u8, u8)> = self
            .size
            .locations()
            .filter(|&(track, _)| track != DIR_TRACK)
            .collect();
        let mut reserved = HashSet::new();
        let mut entries = Vec::with_capacity(programs.len());

        for (packed, program) in programs.iter().enumerate() {
            let needed = program.estimated_sectors();
            let mut chain = Vec::with_capacity(needed);
            let mut from = 0;

            while chain.len() < needed {
                let next = order[from..].iter().position(|&(t, s)| {
                    !reserved.contains(&(t, s)) && image.read_sector(t, s).is_free()
                });
                match next {
                    Some(offset) => {
                        chain.push(order[from + offset]);
                        from += offset + 1;
                    }
                    None => {
                        return Err(D64Error::DiskFull {
                            file: program.name().to_string(),
                            packed,
                        });
                    }
                }
            }

            for (i, &(track, sector)) in chain.iter().enumerate() {
                let link = chain.get(i + 1).copied().unwrap_or((0, 0));
                let start = (i * BLOCK_PAYLOAD).min(program.size());
                let end = (start + BLOCK_PAYLOAD).min(program.size());

                let block = image.sector_mut(track, sector);
                block.set_bytes(0, &[link.0, link.1]);
                block.set_bytes(2, &program.data()[start..end]);
                reserved.insert((track, sector));
            }

            let (first_track, first_sector) = chain[0];
            debug!(
                "'{}': {} bytes in {} sectors from {}/{}",
                program.name(),
                program.size(),
                chain.len(),
                first_track,
                first_sector
            );
            entries.push(DirEntry::program(
                program.name(),
                first_track,
                first_sector,
                chain.len() as u16,
            ));
        }

        let dir_sectors = directory::write_directory(&mut image, &entries)?;
        let allocation = bam::encode_allocation(self.size.track_count(), |track, sector| {
            if track == DIR_TRACK {
                sector == BAM_SECTOR || dir_sectors.contains(&sector)
            } else {
                reserved.contains(&(track, sector))
            }
        });
        bam::write_header(
            image.sector_mut(DIR_TRACK, BAM_SECTOR),
            &self.disk_name,
            self.disk_id,
            &allocation,
        );
        image.refresh();

        let report = PackReport {
            files: entries.len(),
            data_sectors: reserved.len(),
            directory_sectors: dir_sectors.len(),
            blocks_free: image.header().blocks_free(),
        };
        info!(
            "Packed {} files in {} sectors, {} blocks free",
            report.files, report.data_sectors, report.blocks_free
        );
        Ok((image, report))
    }

    /// Pack files and replace `target` with the result
    ///
    /// `target` is untouched when packing fails.
    pub fn pack(&self, target: &mut DiskImage, programs: &[ProgramFile]) -> Result<PackReport> {
        let (image, report) = self.build(programs)?;
        *target = image;
        Ok(report)
    }
}
