//! D64 geometry: supported disk sizes and the fixed track/sector table

/// Format constants
pub mod constants;

pub use constants::*;

/// Supported disk sizes, by total track count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiskSize {
    /// 35 tracks, 683 sectors
    Standard,
    /// 36 tracks
    Extended36,
    /// 37 tracks
    Extended37,
    /// 38 tracks
    Extended38,
    /// 39 tracks
    Extended39,
    /// 40 tracks, 768 sectors
    Extended40,
}

impl DiskSize {
    /// Every supported size, smallest first
    pub const ALL: [DiskSize; 6] = [
        DiskSize::Standard,
        DiskSize::Extended36,
        DiskSize::Extended37,
        DiskSize::Extended38,
        DiskSize::Extended39,
        DiskSize::Extended40,
    ];

    /// Number of tracks on a disk of this size
    pub fn track_count(&self) -> u8 {
        match self {
            DiskSize::Standard => 35,
            DiskSize::Extended36 => 36,
            DiskSize::Extended37 => 37,
            DiskSize::Extended38 => 38,
            DiskSize::Extended39 => 39,
            DiskSize::Extended40 => 40,
        }
    }

    /// Look up a size by its track count
    pub fn from_track_count(tracks: u8) -> Option<DiskSize> {
        Self::ALL.iter().copied().find(|s| s.track_count() == tracks)
    }

    /// Total number of sectors
    pub fn total_sectors(&self) -> usize {
        (1..=self.track_count())
            .map(|t| sectors_per_track(t) as usize)
            .sum()
    }

    /// Length of a flat image of this size in bytes
    pub fn image_len(&self) -> usize {
        self.total_sectors() * SECTOR_SIZE
    }

    /// Identify the size of a flat image from its byte length
    ///
    /// Accepts the plain sector dump and the variant with one trailing
    /// error-info byte per sector.
    pub fn from_image_len(len: usize) -> Option<DiskSize> {
        Self::ALL.iter().copied().find(|s| {
            len == s.image_len() || len == s.image_len() + s.total_sectors()
        })
    }

    /// Every (track, sector) address in ascending geometry order
    pub fn locations(self) -> impl Iterator<Item = (u8, u8)> {
        (1..=self.track_count()).flat_map(|t| (0..sectors_per_track(t)).map(move |s| (t, s)))
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            DiskSize::Standard => "Standard (35 tracks)",
            DiskSize::Extended36 => "Extended (36 tracks)",
            DiskSize::Extended37 => "Extended (37 tracks)",
            DiskSize::Extended38 => "Extended (38 tracks)",
            DiskSize::Extended39 => "Extended (39 tracks)",
            DiskSize::Extended40 => "Extended (40 tracks)",
        }
    }
}

impl Default for DiskSize {
    fn default() -> Self {
        DiskSize::Standard
    }
}

impl std::fmt::Display for DiskSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn check_track(track: u8) {
    assert!(
        track >= 1 && track as usize <= MAX_TRACKS,
        "track {} outside 1..={}",
        track,
        MAX_TRACKS
    );
}

/// Sectors on a track (1-based track number)
///
/// # Panics
///
/// Panics if the track is 0 or beyond track 40.
#[inline]
pub fn sectors_per_track(track: u8) -> u8 {
    check_track(track);
    SECTORS_PER_TRACK[track as usize - 1]
}

/// Byte offset of a track in a flat image (1-based track number)
///
/// # Panics
///
/// Panics if the track is 0 or beyond track 40.
#[inline]
pub fn track_offset(track: u8) -> usize {
    check_track(track);
    TRACK_OFFSETS[track as usize - 1]
}

/// Byte offset of a sector in a flat image
///
/// # Panics
///
/// Panics if the track or sector is outside the geometry.
pub fn sector_offset(track: u8, sector: u8) -> usize {
    assert!(
        sector < sectors_per_track(track),
        "sector {} outside track {}",
        sector,
        track
    );
    track_offset(track) + sector as usize * SECTOR_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_geometry() {
        for track in 1..=17 {
            assert_eq!(sectors_per_track(track), 21);
        }
        for track in 18..=24 {
            assert_eq!(sectors_per_track(track), 19);
        }
        for track in 25..=30 {
            assert_eq!(sectors_per_track(track), 18);
        }
        for track in 31..=35 {
            assert_eq!(sectors_per_track(track), 17);
        }
        assert_eq!(DiskSize::Standard.total_sectors(), 683);
        assert_eq!(DiskSize::Standard.image_len(), 174_848);
    }

    #[test]
    fn test_extended_sizes() {
        assert_eq!(DiskSize::Extended36.total_sectors(), 700);
        assert_eq!(DiskSize::Extended40.total_sectors(), 768);
        assert_eq!(DiskSize::Extended40.image_len(), 196_608);
    }

    #[test]
    fn test_size_detection() {
        assert_eq!(DiskSize::from_image_len(174_848), Some(DiskSize::Standard));
        assert_eq!(DiskSize::from_image_len(175_531), Some(DiskSize::Standard));
        assert_eq!(DiskSize::from_image_len(196_608), Some(DiskSize::Extended40));
        assert_eq!(DiskSize::from_image_len(197_376), Some(DiskSize::Extended40));
        assert_eq!(DiskSize::from_image_len(1000), None);
    }

    #[test]
    fn test_track_count_round_trip() {
        for size in DiskSize::ALL {
            assert_eq!(DiskSize::from_track_count(size.track_count()), Some(size));
        }
        assert_eq!(DiskSize::from_track_count(41), None);
    }

    #[test]
    fn test_locations_order() {
        let all: Vec<(u8, u8)> = DiskSize::Standard.locations().collect();
        assert_eq!(all.len(), 683);
        assert_eq!(all[0], (1, 0));
        assert_eq!(all[20], (1, 20));
        assert_eq!(all[21], (2, 0));
        assert_eq!(all[682], (35, 16));
    }

    #[test]
    fn test_sector_offset() {
        assert_eq!(sector_offset(1, 0), 0);
        assert_eq!(sector_offset(18, 0), 91_392);
        assert_eq!(sector_offset(18, 1), 91_392 + 256);
    }

    #[test]
    #[should_panic]
    fn test_track_zero_panics() {
        sectors_per_track(0);
    }

    #[test]
    #[should_panic]
    fn test_sector_out_of_range_panics() {
        sector_offset(31, 17);
    }
}
