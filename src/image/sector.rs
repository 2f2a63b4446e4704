//! Sector data structures

use crate::format::SECTOR_SIZE;

/// A 256-byte disk sector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    data: [u8; SECTOR_SIZE],
}

impl Sector {
    /// Create a zero-filled sector
    pub fn new() -> Self {
        Self {
            data: [0; SECTOR_SIZE],
        }
    }

    /// Get a reference to the sector data
    pub fn data(&self) -> &[u8; SECTOR_SIZE] {
        &self.data
    }

    /// Read a single byte
    pub fn byte(&self, index: usize) -> u8 {
        self.data[index]
    }

    /// Write a single byte
    pub fn set_byte(&mut self, index: usize, value: u8) {
        self.data[index] = value;
    }

    /// Copy `bytes` into the sector starting at `offset`
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Free-space heuristic: true when every byte is zero
    ///
    /// This is not the allocation bitmap; a used sector that happens to hold
    /// only zeros also reports free.
    pub fn is_free(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Chain link stored in the first two bytes (next track, next sector)
    pub fn link(&self) -> (u8, u8) {
        (self.data[0], self.data[1])
    }

    /// Fill the sector with a specific byte value
    pub fn fill(&mut self, byte: u8) {
        self.data.fill(byte);
    }
}

impl Default for Sector {
    fn default() -> Self {
        Self::new()
    }
}
