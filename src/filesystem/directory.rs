//! Directory chain: 32-byte slots, eight per sector, linked from (18,1)

use crate::error::{D64Error, Result};
use crate::filesystem::petascii;
use crate::format::*;
use crate::image::DiskImage;
use log::{debug, warn};

/// Type byte written for closed PRG files
pub const CLOSED_PRG: u8 = 0x82;

/// Maximum number of directory sectors on the directory track
pub const MAX_DIR_SECTORS: usize = 18;

/// Maximum number of directory entries
pub const MAX_DIR_ENTRIES: usize = MAX_DIR_SECTORS * DIR_ENTRIES_PER_SECTOR;

/// File type from the low three bits of the type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Deleted
    Del,
    /// Sequential
    Seq,
    /// Program
    Prg,
    /// User
    Usr,
    /// Relative
    Rel,
    /// Type values 5..=7
    Unknown(u8),
}

impl FileType {
    /// Classify a raw type byte
    pub fn from_byte(byte: u8) -> Self {
        match byte & 0x07 {
            0 => FileType::Del,
            1 => FileType::Seq,
            2 => FileType::Prg,
            3 => FileType::Usr,
            4 => FileType::Rel,
            other => FileType::Unknown(other),
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Del => write!(f, "DEL"),
            FileType::Seq => write!(f, "SEQ"),
            FileType::Prg => write!(f, "PRG"),
            FileType::Usr => write!(f, "USR"),
            FileType::Rel => write!(f, "REL"),
            FileType::Unknown(_) => write!(f, "*"),
        }
    }
}

/// Where a slot lives on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLocation {
    /// Directory track
    pub track: u8,
    /// Directory sector
    pub sector: u8,
    /// Slot within the sector (0..8)
    pub slot: u8,
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name, PETASCII-decoded without padding
    pub title: String,
    /// File type
    pub file_type: FileType,
    /// Raw type byte (includes the closed/locked flags)
    pub type_byte: u8,
    /// First data track (1-based)
    pub first_track: u8,
    /// First data sector (0-based)
    pub first_sector: u8,
    /// Next directory track; only meaningful in slot 0
    pub next_dir_track: u8,
    /// Next directory sector; only meaningful in slot 0
    pub next_dir_sector: u8,
    /// File size in sectors
    pub blocks: u16,
    /// Position of the slot, if read from disk
    pub location: Option<SlotLocation>,
}

impl DirEntry {
    /// A closed PRG entry, not yet placed in a directory sector
    pub fn program(title: &str, first_track: u8, first_sector: u8, blocks: u16) -> Self {
        Self {
            title: title.to_string(),
            file_type: FileType::Prg,
            type_byte: CLOSED_PRG,
            first_track,
            first_sector,
            next_dir_track: 0,
            next_dir_sector: 0,
            blocks,
            location: None,
        }
    }

    /// Parse a 32-byte slot; unused slots (type byte 0) yield `None`
    pub fn parse(slot: &[u8], location: Option<SlotLocation>) -> Option<Self> {
        if slot.len() < DIR_ENTRY_SIZE {
            return None;
        }

        let type_byte = slot[SLOT_FILE_TYPE];
        if type_byte == 0 {
            return None;
        }

        Some(Self {
            title: petascii::decode_name(&slot[SLOT_NAME..SLOT_NAME + NAME_LENGTH]),
            file_type: FileType::from_byte(type_byte),
            type_byte,
            first_track: slot[SLOT_FIRST_TRACK],
            first_sector: slot[SLOT_FIRST_SECTOR],
            next_dir_track: slot[SLOT_NEXT_TRACK],
            next_dir_sector: slot[SLOT_NEXT_SECTOR],
            blocks: u16::from_le_bytes([slot[SLOT_BLOCKS], slot[SLOT_BLOCKS + 1]]),
            location,
        })
    }

    /// Encode into a 32-byte slot; the chain bytes are left to the caller
    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut slot = [0u8; DIR_ENTRY_SIZE];
        slot[SLOT_FILE_TYPE] = self.type_byte;
        slot[SLOT_FIRST_TRACK] = self.first_track;
        slot[SLOT_FIRST_SECTOR] = self.first_sector;
        slot[SLOT_NAME..SLOT_NAME + NAME_LENGTH]
            .copy_from_slice(&petascii::encode_name(&self.title, NAME_LENGTH));
        slot[SLOT_BLOCKS..SLOT_BLOCKS + 2].copy_from_slice(&self.blocks.to_le_bytes());
        slot
    }
}

/// Walk the directory chain starting at (18,1)
///
/// Traversal stops at a zero track link, at a link outside the geometry, or
/// after visiting as many sectors as the disk has.
pub fn parse_directory(image: &DiskImage) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    let mut track = DIR_TRACK;
    let mut sector = FIRST_DIR_SECTOR;
    let limit = image.total_sectors();

    for visited in 0.. {
        if visited >= limit {
            warn!("Directory chain longer than {} sectors, stopping", limit);
            break;
        }

        let data = image.read_sector(track, sector).data();
        for (slot, chunk) in data.chunks(DIR_ENTRY_SIZE).enumerate() {
            let location = SlotLocation {
                track,
                sector,
                slot: slot as u8,
            };
            if let Some(entry) = DirEntry::parse(chunk, Some(location)) {
                entries.push(entry);
            }
        }

        let (next_track, next_sector) = (data[SLOT_NEXT_TRACK], data[SLOT_NEXT_SECTOR]);
        if next_track == 0 {
            break;
        }
        if !image.contains(next_track, next_sector) {
            warn!(
                "Directory link {}/{} from {}/{} is outside the disk, stopping",
                next_track, next_sector, track, sector
            );
            break;
        }
        track = next_track;
        sector = next_sector;
    }

    debug!("Parsed {} directory entries", entries.len());
    entries
}

/// Serialize entries into the directory chain starting at (18,1)
///
/// Directory sectors are taken in ascending order on the directory track.
/// Returns the directory sectors written.
pub fn write_directory(image: &mut DiskImage, entries: &[DirEntry]) -> Result<Vec<u8>> {
    if entries.len() > MAX_DIR_ENTRIES {
        return Err(D64Error::DirectoryFull {
            entries: entries.len(),
        });
    }

    let sector_count = entries.len().div_ceil(DIR_ENTRIES_PER_SECTOR).max(1);
    let sectors: Vec<u8> = (0..sector_count as u8).map(|i| FIRST_DIR_SECTOR + i).collect();

    for (i, &sector) in sectors.iter().enumerate() {
        let start = i * DIR_ENTRIES_PER_SECTOR;
        let end = (start + DIR_ENTRIES_PER_SECTOR).min(entries.len());
        let target = image.sector_mut(DIR_TRACK, sector);
        target.fill(0);

        for (slot, entry) in entries[start..end].iter().enumerate() {
            target.set_bytes(slot * DIR_ENTRY_SIZE, &entry.encode());
        }

        let link = match sectors.get(i + 1) {
            Some(&next) => [DIR_TRACK, next],
            None => [0, 0xFF],
        };
        target.set_bytes(0, &link);
    }

    debug!(
        "Wrote {} directory entries in {} sectors",
        entries.len(),
        sectors.len()
    );
    Ok(sectors)
}
