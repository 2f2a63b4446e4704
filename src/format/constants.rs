//! D64 geometry tables and layout constants

/// Bytes in every sector
pub const SECTOR_SIZE: usize = 256;

/// Payload bytes in a linked data sector (two bytes go to the link)
pub const BLOCK_PAYLOAD: usize = 254;

/// Highest track number of any supported disk size
pub const MAX_TRACKS: usize = 40;

/// Track holding the header/BAM sector and the directory chain
pub const DIR_TRACK: u8 = 18;

/// Sector of the header/BAM block on the directory track
pub const BAM_SECTOR: u8 = 0;

/// First sector of the directory chain on the directory track
pub const FIRST_DIR_SECTOR: u8 = 1;

/// Size of a directory slot
pub const DIR_ENTRY_SIZE: usize = 32;

/// Directory slots per directory sector
pub const DIR_ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;

/// Length of disk and file names
pub const NAME_LENGTH: usize = 16;

/// Padding byte used after names (shifted space)
pub const PADDING_BYTE: u8 = 0xA0;

/// DOS version byte written by CBM DOS 2.6
pub const DOS_VERSION: u8 = 0x41;

/// DOS type written after the disk ID
pub const DOS_TYPE: [u8; 2] = *b"2A";

/// Header sector: offset of the DOS version byte
pub const BAM_DOS_VERSION_OFFSET: usize = 0x02;

/// Header sector: offset of the allocation region
pub const BAM_ENTRIES_OFFSET: usize = 0x04;

/// Header sector: length of the allocation region (35 tracks x 4 bytes)
pub const BAM_ENTRIES_LEN: usize = 0x8C;

/// Tracks described by the allocation region
pub const BAM_TRACKS: usize = BAM_ENTRIES_LEN / 4;

/// Header sector: offset of the disk name
pub const BAM_NAME_OFFSET: usize = 0x90;

/// Header sector: offset of the disk ID
pub const BAM_ID_OFFSET: usize = 0xA2;

/// Header sector: offset of the DOS type
pub const BAM_DOS_TYPE_OFFSET: usize = 0xA5;

/// Directory slot: next directory track (slot 0 only)
pub const SLOT_NEXT_TRACK: usize = 0;

/// Directory slot: next directory sector (slot 0 only)
pub const SLOT_NEXT_SECTOR: usize = 1;

/// Directory slot: file type byte
pub const SLOT_FILE_TYPE: usize = 2;

/// Directory slot: first data track
pub const SLOT_FIRST_TRACK: usize = 3;

/// Directory slot: first data sector
pub const SLOT_FIRST_SECTOR: usize = 4;

/// Directory slot: PETASCII name
pub const SLOT_NAME: usize = 5;

/// Directory slot: little-endian block count
pub const SLOT_BLOCKS: usize = 30;

/// Sectors per track for tracks 1..=40
pub const SECTORS_PER_TRACK: [u8; MAX_TRACKS] = [
    21, 21, 21, 21, 21, 21, 21, 21, 21, 21, // 1-10
    21, 21, 21, 21, 21, 21, 21, 19, 19, 19, // 11-20
    19, 19, 19, 19, 18, 18, 18, 18, 18, 18, // 21-30
    17, 17, 17, 17, 17, 17, 17, 17, 17, 17, // 31-40
];

/// Byte offset of each track in a flat image, tracks 1..=40
pub const TRACK_OFFSETS: [usize; MAX_TRACKS] = [
    0, 5376, 10752, 16128, 21504, 26880, 32256, 37632, 43008, 48384,
    53760, 59136, 64512, 69888, 75264, 80640, 86016, 91392, 96256, 101120,
    105984, 110848, 115712, 120576, 125440, 130048, 134656, 139264, 143872, 148480,
    153088, 157440, 161792, 166144, 170496, 174848, 179200, 183552, 187904, 192256,
];
