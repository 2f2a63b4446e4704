//! Header/BAM sector (track 18, sector 0)

use crate::filesystem::petascii;
use crate::format::*;
use crate::image::{DiskImage, Sector};

/// Fields decoded from the header sector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BamHeader {
    /// Disk name, PETASCII-decoded without padding
    pub disk_name: String,
    /// DOS version byte
    pub dos_version: u8,
    /// Two-byte disk ID
    pub disk_id: [u8; 2],
    /// Raw allocation region (offsets 0x04..0x90), not validated
    pub allocation: [u8; BAM_ENTRIES_LEN],
}

impl BamHeader {
    /// Decode the header fields from a sector
    pub fn from_sector(sector: &Sector) -> Self {
        let mut disk_id = [0u8; 2];
        disk_id.copy_from_slice(sector.bytes(BAM_ID_OFFSET, 2));

        let mut allocation = [0u8; BAM_ENTRIES_LEN];
        allocation.copy_from_slice(sector.bytes(BAM_ENTRIES_OFFSET, BAM_ENTRIES_LEN));

        Self {
            disk_name: petascii::decode_name(sector.bytes(BAM_NAME_OFFSET, NAME_LENGTH)),
            dos_version: sector.byte(BAM_DOS_VERSION_OFFSET),
            disk_id,
            allocation,
        }
    }

    /// Disk ID as printable text
    pub fn id_string(&self) -> String {
        petascii::decode(&self.disk_id)
    }

    /// Allocation entry for a track: (free count, sector bitmap)
    ///
    /// Returns `None` for tracks the region does not describe (0 and 36+).
    pub fn track_entry(&self, track: u8) -> Option<(u8, u32)> {
        if track == 0 || track as usize > BAM_TRACKS {
            return None;
        }
        let i = (track as usize - 1) * 4;
        let e = &self.allocation[i..i + 4];
        Some((e[0], u32::from_le_bytes([e[1], e[2], e[3], 0])))
    }

    /// Whether the allocation map marks a sector free
    pub fn is_marked_free(&self, track: u8, sector: u8) -> Option<bool> {
        self.track_entry(track)
            .map(|(_, bitmap)| sector < 24 && bitmap & (1 << sector) != 0)
    }

    /// "Blocks free" as a directory listing reports it (directory track excluded)
    pub fn blocks_free(&self) -> usize {
        (1..=BAM_TRACKS as u8)
            .filter(|&t| t != DIR_TRACK)
            .filter_map(|t| self.track_entry(t))
            .map(|(free, _)| free as usize)
            .sum()
    }
}

impl Default for BamHeader {
    fn default() -> Self {
        Self::from_sector(&Sector::new())
    }
}

/// Decode the header sector of an image
pub fn parse_bam(image: &DiskImage) -> BamHeader {
    BamHeader::from_sector(image.read_sector(DIR_TRACK, BAM_SECTOR))
}

/// Build the allocation region from a per-sector "in use" predicate
///
/// Only tracks 1..=35 fit in the region; entries for tracks the image does
/// not have stay zero.
pub fn encode_allocation<F>(track_count: u8, in_use: F) -> [u8; BAM_ENTRIES_LEN]
where
    F: Fn(u8, u8) -> bool,
{
    let mut region = [0u8; BAM_ENTRIES_LEN];
    let tracks = (track_count as usize).min(BAM_TRACKS) as u8;

    for track in 1..=tracks {
        let mut bitmap = 0u32;
        let mut free = 0u8;
        for sector in 0..sectors_per_track(track) {
            if !in_use(track, sector) {
                bitmap |= 1 << sector;
                free += 1;
            }
        }
        let i = (track as usize - 1) * 4;
        let bytes = bitmap.to_le_bytes();
        region[i] = free;
        region[i + 1..i + 4].copy_from_slice(&bytes[..3]);
    }

    region
}

/// Write a complete header sector
pub fn write_header(sector: &mut Sector, disk_name: &str, disk_id: [u8; 2], allocation: &[u8; BAM_ENTRIES_LEN]) {
    sector.fill(0);
    sector.set_bytes(0, &[DIR_TRACK, FIRST_DIR_SECTOR]);
    sector.set_byte(BAM_DOS_VERSION_OFFSET, DOS_VERSION);
    sector.set_bytes(BAM_ENTRIES_OFFSET, allocation);
    sector.set_bytes(BAM_NAME_OFFSET, &petascii::encode_name(disk_name, NAME_LENGTH));
    sector.set_bytes(BAM_NAME_OFFSET + NAME_LENGTH, &[PADDING_BYTE; 2]);
    sector.set_bytes(BAM_ID_OFFSET, &disk_id);
    sector.set_byte(BAM_ID_OFFSET + 2, PADDING_BYTE);
    sector.set_bytes(BAM_DOS_TYPE_OFFSET, &DOS_TYPE);
    sector.set_bytes(BAM_DOS_TYPE_OFFSET + 2, &[PADDING_BYTE; 4]);
}
