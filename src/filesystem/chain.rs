//! Linked data-sector chains

use crate::filesystem::directory::DirEntry;
use crate::format::{BLOCK_PAYLOAD, SECTOR_SIZE};
use crate::image::DiskImage;
use log::warn;

/// Follow a data chain from its first sector, returning every visited address
///
/// A link whose track byte is 0 ends the chain. Links outside the geometry
/// stop traversal, as does visiting more sectors than the disk holds.
pub fn chain_sectors(image: &DiskImage, first_track: u8, first_sector: u8) -> Vec<(u8, u8)> {
    let mut visited = Vec::new();
    if !image.contains(first_track, first_sector) {
        warn!(
            "Chain start {}/{} is outside the disk",
            first_track, first_sector
        );
        return visited;
    }

    let (mut track, mut sector) = (first_track, first_sector);
    loop {
        if visited.len() >= image.total_sectors() {
            warn!(
                "Chain from {}/{} exceeds {} sectors, stopping",
                first_track,
                first_sector,
                image.total_sectors()
            );
            break;
        }
        visited.push((track, sector));

        let (next_track, next_sector) = image.read_sector(track, sector).link();
        if next_track == 0 {
            break;
        }
        if !image.contains(next_track, next_sector) {
            warn!(
                "Chain link {}/{} from {}/{} is outside the disk, stopping",
                next_track, next_sector, track, sector
            );
            break;
        }
        track = next_track;
        sector = next_sector;
    }

    visited
}

/// Read a file's payload by following its chain
///
/// Every sector contributes 254 bytes except the last: a last sector whose
/// link is (0, n) with n >= 2 holds bytes 2..=n, and a (0, 0) or (0, 1) link
/// means the whole payload is used.
pub fn read_file(image: &DiskImage, entry: &DirEntry) -> Vec<u8> {
    let sectors = chain_sectors(image, entry.first_track, entry.first_sector);
    let mut data = Vec::with_capacity(sectors.len() * BLOCK_PAYLOAD);

    for &(track, sector) in &sectors {
        let block = image.read_sector(track, sector);
        let (next_track, last_index) = block.link();
        let end = if next_track == 0 && last_index >= 2 {
            last_index as usize + 1
        } else {
            SECTOR_SIZE
        };
        data.extend_from_slice(&block.data()[2..end]);
    }

    data
}
