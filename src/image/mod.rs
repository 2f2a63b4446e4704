//! D64 image data structures

/// Sector definition
pub mod sector;
/// Track definition
pub mod track;

pub use sector::Sector;
pub use track::Track;

use crate::error::{D64Error, Result};
use crate::filesystem::bam::{self, BamHeader};
use crate::filesystem::directory::{self, DirEntry};
use crate::filesystem::{ImagePacker, PackReport, ProgramFile};
use crate::format::{DiskSize, SECTOR_SIZE};
use log::{debug, warn};
use std::path::Path;

/// Main D64 image container
///
/// Tracks are 1-based and sectors 0-based at every public boundary. Header
/// fields and the directory are a snapshot re-derived from the sector bytes
/// by [`DiskImage::refresh`].
#[derive(Debug, Clone)]
pub struct DiskImage {
    /// Disk size (track count)
    pub(crate) size: DiskSize,
    /// Tracks in ascending order; index 0 is track 1
    pub(crate) tracks: Vec<Track>,
    /// Decoded header sector
    header: BamHeader,
    /// Decoded directory chain
    directory: Vec<DirEntry>,
    /// Has the image been modified?
    pub(crate) changed: bool,
    /// Original filename if loaded from disk
    pub(crate) filename: Option<String>,
}

impl DiskImage {
    /// Create a zero-filled image of the given size
    pub fn format(size: DiskSize) -> Self {
        let tracks = (1..=size.track_count()).map(Track::new).collect();
        let mut image = Self {
            size,
            tracks,
            header: BamHeader::default(),
            directory: Vec::new(),
            changed: true,
            filename: None,
        };
        image.refresh();
        image
    }

    /// Replace the contents with a zero-filled image of the given size
    pub fn reformat(&mut self, size: DiskSize) {
        *self = Self::format(size);
    }

    /// Build an image from a flat sector dump, detecting the size from its length
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let size = DiskSize::from_image_len(bytes.len()).ok_or_else(|| {
            D64Error::invalid_format(format!(
                "{} bytes does not match any supported D64 size",
                bytes.len()
            ))
        })?;

        let mut image = Self::format(size);
        image.load_bytes(bytes);
        image.changed = false;
        Ok(image)
    }

    /// Open a D64 file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::io::reader::read_d64(path)
    }

    /// Save the image to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        crate::io::writer::write_d64(self, &path)?;
        self.filename = path
            .as_ref()
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string());
        self.changed = false;
        Ok(())
    }

    /// Fill sectors in ascending (track, sector) order from a flat byte stream
    ///
    /// The current geometry is kept. A short stream leaves the remaining
    /// sectors zero; bytes beyond the geometry (such as an error-info
    /// block) are ignored. The header and directory are re-derived afterwards.
    pub fn load_bytes(&mut self, bytes: &[u8]) {
        let expected = self.size.image_len();
        if bytes.len() < expected {
            warn!(
                "Image data is {} bytes, expected {}; padding with zeros",
                bytes.len(),
                expected
            );
        }

        let mut chunks = bytes.chunks(SECTOR_SIZE);
        for track in &mut self.tracks {
            for sector in track.sectors_mut() {
                sector.fill(0);
                if let Some(chunk) = chunks.next() {
                    sector.set_bytes(0, chunk);
                }
            }
        }

        self.changed = true;
        self.refresh();
    }

    /// Concatenate every sector in ascending (track, sector) order
    pub fn serialize_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.size.image_len());
        for track in &self.tracks {
            track.read_logical(&mut data);
        }
        data
    }

    /// Re-derive the header fields and directory from the sector bytes
    pub fn refresh(&mut self) {
        self.header = bam::parse_bam(self);
        self.directory = directory::parse_directory(self);
        debug!(
            "Refreshed image '{}': {} directory entries",
            self.header.disk_name,
            self.directory.len()
        );
    }

    /// Pack program files into a freshly formatted image of the same size
    ///
    /// On error the image is left unchanged.
    pub fn generate(&mut self, programs: &[ProgramFile], disk_name: &str) -> Result<PackReport> {
        ImagePacker::new(disk_name)
            .size(self.size)
            .pack(self, programs)
    }

    /// Get the disk size
    pub fn size(&self) -> DiskSize {
        self.size
    }

    /// Number of tracks
    pub fn track_count(&self) -> u8 {
        self.size.track_count()
    }

    /// Total number of sectors
    pub fn total_sectors(&self) -> usize {
        self.size.total_sectors()
    }

    /// Get all tracks
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Get a track by its 1-based number
    pub fn get_track(&self, track: u8) -> Option<&Track> {
        if track == 0 {
            return None;
        }
        self.tracks.get(track as usize - 1)
    }

    /// Whether (track, sector) lies inside this image's geometry
    pub fn contains(&self, track: u8, sector: u8) -> bool {
        self.get_track(track)
            .map(|t| (sector as usize) < t.sector_count())
            .unwrap_or(false)
    }

    /// Every (track, sector) address of this image in ascending order
    pub fn locations(&self) -> impl Iterator<Item = (u8, u8)> {
        self.size.locations()
    }

    /// Position of a sector in ascending geometry order
    ///
    /// # Panics
    ///
    /// Panics if the address is outside the geometry.
    pub fn sector_index(&self, track: u8, sector: u8) -> usize {
        self.check(track, sector);
        self.tracks[..track as usize - 1]
            .iter()
            .map(|t| t.sector_count())
            .sum::<usize>()
            + sector as usize
    }

    fn check(&self, track: u8, sector: u8) {
        assert!(
            self.contains(track, sector),
            "track {} sector {} outside a {}-track image",
            track,
            sector,
            self.track_count()
        );
    }

    /// Per-sector free flags for a track using the all-zero heuristic
    ///
    /// # Panics
    ///
    /// Panics if the track is outside the geometry.
    pub fn track_free_mask(&self, track: u8) -> Vec<bool> {
        self.check(track, 0);
        self.tracks[track as usize - 1].free_mask()
    }

    /// Borrow a sector
    ///
    /// # Panics
    ///
    /// Panics if the address is outside the geometry.
    pub fn read_sector(&self, track: u8, sector: u8) -> &Sector {
        self.check(track, sector);
        &self.tracks[track as usize - 1].sectors()[sector as usize]
    }

    /// Mutably borrow a sector
    ///
    /// The header and directory snapshot are not updated; call
    /// [`DiskImage::refresh`] once edits are done.
    ///
    /// # Panics
    ///
    /// Panics if the address is outside the geometry.
    pub fn sector_mut(&mut self, track: u8, sector: u8) -> &mut Sector {
        self.check(track, sector);
        self.changed = true;
        &mut self.tracks[track as usize - 1].sectors_mut()[sector as usize]
    }

    /// Write a single byte
    ///
    /// # Panics
    ///
    /// Panics if the address or index is outside the geometry.
    pub fn write_byte(&mut self, track: u8, sector: u8, index: usize, value: u8) {
        self.sector_mut(track, sector).set_byte(index, value);
    }

    /// Disk name from the header sector
    pub fn disk_name(&self) -> &str {
        &self.header.disk_name
    }

    /// DOS version byte from the header sector
    pub fn dos_version(&self) -> u8 {
        self.header.dos_version
    }

    /// Two-byte disk ID from the header sector
    pub fn disk_id(&self) -> [u8; 2] {
        self.header.disk_id
    }

    /// Raw allocation region from the header sector
    pub fn bam(&self) -> &[u8] {
        &self.header.allocation
    }

    /// Decoded header sector
    pub fn header(&self) -> &BamHeader {
        &self.header
    }

    /// Directory entries in chain order
    pub fn directory(&self) -> &[DirEntry] {
        &self.directory
    }

    /// Number of sectors whose contents are all zero
    pub fn free_sector_count(&self) -> usize {
        self.tracks.iter().map(|t| t.free_count()).sum()
    }

    /// Number of sectors holding any non-zero byte
    pub fn used_sector_count(&self) -> usize {
        self.total_sectors() - self.free_sector_count()
    }

    /// Share of free sectors, 0.0..=100.0
    pub fn free_percent(&self) -> f64 {
        self.free_sector_count() as f64 * 100.0 / self.total_sectors() as f64
    }

    /// Get the original filename if loaded from or saved to disk
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Check if the image has been modified
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Mark the image as unchanged
    pub fn mark_unchanged(&mut self) {
        self.changed = false;
    }
}

impl Default for DiskImage {
    fn default() -> Self {
        Self::format(DiskSize::Standard)
    }
}
