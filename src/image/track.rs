//! Track data structures

use crate::format::sectors_per_track;
use crate::image::sector::Sector;

/// A disk track holding the fixed number of sectors its position dictates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Track number (1-based)
    pub track_number: u8,
    /// Sectors in this track
    sectors: Vec<Sector>,
}

impl Track {
    /// Create a zero-filled track; the sector count comes from the geometry table
    ///
    /// # Panics
    ///
    /// Panics if `track_number` is not a valid 1-based track.
    pub fn new(track_number: u8) -> Self {
        let count = sectors_per_track(track_number) as usize;
        Self {
            track_number,
            sectors: vec![Sector::new(); count],
        }
    }

    /// Get a reference to all sectors
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Get a mutable reference to all sectors
    pub fn sectors_mut(&mut self) -> &mut [Sector] {
        &mut self.sectors
    }

    /// Get a sector by its 0-based index
    pub fn get_sector(&self, sector: u8) -> Option<&Sector> {
        self.sectors.get(sector as usize)
    }

    /// Get the number of sectors in this track
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Per-sector free flags using the all-zero heuristic
    pub fn free_mask(&self) -> Vec<bool> {
        self.sectors.iter().map(|s| s.is_free()).collect()
    }

    /// Number of sectors whose contents are all zero
    pub fn free_count(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_free()).count()
    }

    /// Append every sector, in order, to `out`
    pub fn read_logical(&self, out: &mut Vec<u8>) {
        for sector in &self.sectors {
            out.extend_from_slice(sector.data());
        }
    }
}
