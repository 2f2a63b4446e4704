//! Sector map visualization

use crate::format::DIR_TRACK;
use crate::image::DiskImage;
use std::fmt::Write;

/// ANSI color codes for sector map
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BRIGHT_WHITE: &str = "\x1b[97m";
    pub const DARK_WHITE: &str = "\x1b[37m";
    pub const BRIGHT_YELLOW: &str = "\x1b[93m";
    pub const DARK_YELLOW: &str = "\x1b[2;33m";
}

const BLOCK_FREE: char = '\u{2591}'; // ░
const BLOCK_IN_USE: char = '\u{2593}'; // ▓

/// Render the free/used grid: one column per track, sector 0 on the bottom row
///
/// Freeness is the all-zero heuristic. The directory track is highlighted
/// when `color` is set.
pub fn render_sector_map(image: &DiskImage, color: bool) -> String {
    let mut out = String::new();
    let num_tracks = image.track_count() as usize;
    let max_sectors = image
        .tracks()
        .iter()
        .map(|t| t.sector_count())
        .max()
        .unwrap_or(0);

    let _ = writeln!(
        out,
        "=== Sector Map ({} free of {}) ===",
        image.free_sector_count(),
        image.total_sectors()
    );
    if color {
        let _ = writeln!(
            out,
            "Legend: {}{} In Use{} {}{} Free{} {}{} Directory{}",
            colors::BRIGHT_WHITE,
            BLOCK_IN_USE,
            colors::RESET,
            colors::DARK_WHITE,
            BLOCK_FREE,
            colors::RESET,
            colors::BRIGHT_YELLOW,
            BLOCK_IN_USE,
            colors::RESET
        );
    } else {
        let _ = writeln!(out, "Legend: {} In Use {} Free", BLOCK_IN_USE, BLOCK_FREE);
    }
    out.push('\n');

    for row in (0..max_sectors).rev() {
        let _ = write!(out, "{:>2} ", row);
        for track in image.tracks() {
            let Some(sector) = track.get_sector(row as u8) else {
                out.push(' ');
                continue;
            };

            let in_use = !sector.is_free();
            let block = if in_use { BLOCK_IN_USE } else { BLOCK_FREE };
            if color {
                let code = match (track.track_number == DIR_TRACK, in_use) {
                    (true, true) => colors::BRIGHT_YELLOW,
                    (true, false) => colors::DARK_YELLOW,
                    (false, true) => colors::BRIGHT_WHITE,
                    (false, false) => colors::DARK_WHITE,
                };
                let _ = write!(out, "{}{}{}", code, block, colors::RESET);
            } else {
                out.push(block);
            }
        }
        out.push('\n');
    }

    // Track axis: numbers at 1, 5, 10, ... spelled out across columns
    out.push_str("   ");
    let mut col = 1;
    while col <= num_tracks {
        if col == 1 || col % 5 == 0 {
            let label = col.to_string();
            let fits = label.len().min(num_tracks - col + 1);
            out.push_str(&label[..fits]);
            col += fits;
        } else {
            out.push(' ');
            col += 1;
        }
    }
    out.push('\n');

    out
}

/// Print the sector map to stdout
pub fn draw_sector_map(image: &DiskImage) {
    print!("{}", render_sector_map(image, true));
}
