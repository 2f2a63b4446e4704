/*!
# d64burner

A Rust library for building 1541 D64 disk images and transferring them to
an external flash programmer over a serial link.

## Features

- Fixed 1541 geometry for 35 to 40 track images
- Header/BAM and directory chain decoding, PETASCII names
- Packing program files into linked sector chains with a fresh directory
- Full and quick (sparse) burns, and byte-by-byte read-back, over a
  command/acknowledge protocol with bounded timeouts
- Background jobs with progress reporting, and an in-process programmer
  emulator for testing

## Quick Start

```rust,no_run
use d64burner::{BurnMode, Burner, BurnerConfig, DiskImage, ProgramFile, TcpTransport};

// Pack some programs onto a new disk
let mut image = DiskImage::default();
let programs = vec![
    ProgramFile::open("intro.prg")?,
    ProgramFile::open("game.prg")?.with_name("THE GAME")?,
];
let report = image.generate(&programs, "COMPILATION")?;
println!("{} files, {} blocks free", report.files, report.blocks_free);

// List the directory
for entry in image.directory() {
    println!("{:>4} \"{}\" {}", entry.blocks, entry.title, entry.file_type);
}

// Save it
image.save("compilation.d64")?;

// Burn only the sectors holding data
let burner = Burner::new(BurnerConfig::from_env()?);
let mut transport = TcpTransport::new();
let report = burner.burn(&mut transport, &image, BurnMode::Quick, |p| {
    eprint!("\r{} %", p.percent());
})?;
println!("{}", report);

// Read it back, replacing the image on success
burner.verify_into(&mut transport, &mut image, |_| {})?;
# Ok::<(), d64burner::D64Error>(())
```

## Serial bridge

[`TcpTransport`] talks to a TCP-to-serial bridge such as ser2net. The
bridge owns the physical port, so it must be configured for 19200 baud,
8 data bits, no parity and one stop bit, matching `LineSettings::default()`.
The line settings passed to the transport are only logged.

## Modules

- `format`: geometry table and on-disk constants
- `image`: core image data structures (DiskImage, Track, Sector)
- `filesystem`: header/BAM, directory and chain codecs, and the packer
- `burner`: transport, protocol, background jobs and emulator
- `io`: D64 file reading and writing
- `map`: sector map rendering
- `error`: error types and Result alias
*/

#![warn(missing_docs)]

/// Burner protocol, transports and background jobs
pub mod burner;
/// Error types and Result alias
pub mod error;
/// CBM DOS structures on the image
pub mod filesystem;
/// Geometry and format constants
pub mod format;
/// Core image data structures (DiskImage, Track, Sector)
pub mod image;
/// I/O operations for reading and writing D64 files
pub mod io;
/// Sector map visualization
pub mod map;

// Re-export common types
pub use burner::{
    BurnJob, BurnMode, BurnReport, BurnState, Burner, BurnerConfig, EmulatedBurner, Finished,
    JobKind, JobOutcome, LineSettings, Progress, TcpTransport, Transport, VerifyReport,
};
pub use error::{D64Error, Result};
pub use filesystem::{
    BamHeader, DirEntry, FileType, ImagePacker, PackReport, ProgramFile,
};
pub use format::DiskSize;
pub use image::{DiskImage, Sector, Track};
