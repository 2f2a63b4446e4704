//! Burner protocol: erase, burn and read-back over a [`Transport`]

/// Connection settings
pub mod config;
/// In-process programmer emulator
pub mod emulator;
/// Background operations
pub mod job;
/// Command/acknowledge state machine
pub mod protocol;
/// Byte-stream endpoints
pub mod transport;

pub use config::{BurnerConfig, LineSettings, Parity};
pub use emulator::EmulatedBurner;
pub use job::{BurnJob, Finished, JobKind, JobOutcome};
pub use transport::{TcpTransport, Transport};

use crate::error::{D64Error, Result};
use crate::format::DiskSize;
use crate::image::DiskImage;
use log::info;
use protocol::Session;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wire opcodes
pub mod opcodes {
    /// Erase the whole flash
    pub const ERASE: u8 = 0xED;
    /// Burn one sector: followed by track, sector and 256 payload bytes
    pub const BURN: u8 = 0xBD;
    /// Acknowledge sent back by the programmer
    pub const ACK: u8 = 0xF0;
    /// Restart sequential read at the first byte
    pub const RESET_READ: u8 = 0xFA;
    /// Next byte of the sequential read
    pub const CONTINUE_READ: u8 = 0xFD;
    /// Read the flash status register
    pub const FLASH_STATUS: u8 = 0x68;
    /// Read the test byte
    pub const READ_TEST: u8 = 0xFB;
    /// Write the test byte
    pub const WRITE_TEST: u8 = 0xBB;
}

/// Where an operation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnState {
    /// Nothing started
    Idle,
    /// Opening the transport
    Connecting,
    /// Waiting for the erase acknowledge
    Erasing,
    /// Transmitting every sector
    FullBurn,
    /// Transmitting sectors that hold data
    QuickBurn,
    /// Reading the flash back
    Verify,
    /// Finished successfully
    Completed,
    /// Ended by a timeout, mismatch or I/O error
    Aborted,
}

impl std::fmt::Display for BurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BurnState::Idle => "idle",
            BurnState::Connecting => "connecting",
            BurnState::Erasing => "erasing",
            BurnState::FullBurn => "burning",
            BurnState::QuickBurn => "quick burning",
            BurnState::Verify => "reading",
            BurnState::Completed => "completed",
            BurnState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// Which sectors a burn transmits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnMode {
    /// Every sector
    Full,
    /// Only sectors holding a non-zero byte
    Quick,
}

impl BurnMode {
    /// State the protocol is in while transmitting
    pub fn state(&self) -> BurnState {
        match self {
            BurnMode::Full => BurnState::FullBurn,
            BurnMode::Quick => BurnState::QuickBurn,
        }
    }
}

/// Progress counters for a running or finished operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Lifecycle state
    pub state: BurnState,
    /// Sectors handled, including those skipped by a quick burn
    pub processed: usize,
    /// Sectors actually sent over the wire
    pub transmitted: usize,
    /// Sectors in the whole operation
    pub total: usize,
}

impl Progress {
    /// Idle counters for an operation over `total` sectors
    pub fn new(total: usize) -> Self {
        Self {
            state: BurnState::Idle,
            processed: 0,
            transmitted: 0,
            total,
        }
    }

    /// Set the processed counter
    pub fn with_processed(mut self, processed: usize) -> Self {
        self.processed = processed;
        self
    }

    /// Processed share, 0..=100
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.processed * 100 / self.total
        }
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} sectors", self.processed, self.total)
    }
}

/// Result of a completed burn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnReport {
    /// Full or quick
    pub mode: BurnMode,
    /// Final counters
    pub progress: Progress,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl std::fmt::Display for BurnReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p = &self.progress;
        let share = if p.total == 0 { 0 } else { p.transmitted * 100 / p.total };
        write!(
            f,
            "Burned {} out of {} sectors ({} %) in {:.1} s",
            p.transmitted,
            p.total,
            share,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Result of a completed read-back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Bytes received
    pub bytes: usize,
    /// Sectors assembled
    pub sectors: usize,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl std::fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read {} sectors ({} bytes) in {:.1} s",
            self.sectors,
            self.bytes,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Render a status register MSB first, e.g. `1000_0001`
pub fn format_status(status: u8) -> String {
    let bits = format!("{:08b}", status);
    format!("{}_{}", &bits[..4], &bits[4..])
}

/// Clears the busy flag when dropped
pub(crate) struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Entry point for programmer operations
///
/// Clones share one busy flag, so at most one burn, read-back or auxiliary
/// operation runs at a time across all of them.
#[derive(Debug, Clone)]
pub struct Burner {
    config: BurnerConfig,
    busy: Arc<AtomicBool>,
}

impl Burner {
    /// Create a burner with the given settings
    pub fn new(config: BurnerConfig) -> Self {
        Self {
            config,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current settings
    pub fn config(&self) -> &BurnerConfig {
        &self.config
    }

    /// Replace the settings
    pub fn set_config(&mut self, config: BurnerConfig) {
        self.config = config;
    }

    /// Whether an operation is in progress
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn acquire(&self) -> Result<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| D64Error::Busy)?;
        Ok(BusyGuard(Arc::clone(&self.busy)))
    }

    /// Erase the programmer and transmit the image
    ///
    /// `on_progress` is called after every sector. The transport is closed
    /// on return, whatever the outcome.
    pub fn burn<T, F>(
        &self,
        transport: &mut T,
        image: &DiskImage,
        mode: BurnMode,
        on_progress: F,
    ) -> Result<BurnReport>
    where
        T: Transport + ?Sized,
        F: FnMut(&Progress),
    {
        let _guard = self.acquire()?;
        self.run_burn(transport, image, mode, on_progress)
    }

    pub(crate) fn run_burn<T, F>(
        &self,
        transport: &mut T,
        image: &DiskImage,
        mode: BurnMode,
        mut on_progress: F,
    ) -> Result<BurnReport>
    where
        T: Transport + ?Sized,
        F: FnMut(&Progress),
    {
        let started = Instant::now();
        info!(
            "Starting {:?} burn of {} sectors on {}",
            mode,
            image.total_sectors(),
            self.config.port
        );

        let mut session = Session::open(transport, &self.config, image.total_sectors())?;
        protocol::burn(&mut session, image, mode, &mut on_progress)?;
        let progress = session.finish();

        let report = BurnReport {
            mode,
            progress,
            elapsed: started.elapsed(),
        };
        info!("{}", report);
        Ok(report)
    }

    /// Read the programmer's flash back into a new image
    pub fn verify<T, F>(
        &self,
        transport: &mut T,
        size: DiskSize,
        on_progress: F,
    ) -> Result<(DiskImage, VerifyReport)>
    where
        T: Transport + ?Sized,
        F: FnMut(&Progress),
    {
        let _guard = self.acquire()?;
        self.run_verify(transport, size, on_progress)
    }

    pub(crate) fn run_verify<T, F>(
        &self,
        transport: &mut T,
        size: DiskSize,
        mut on_progress: F,
    ) -> Result<(DiskImage, VerifyReport)>
    where
        T: Transport + ?Sized,
        F: FnMut(&Progress),
    {
        let started = Instant::now();
        info!("Reading back {} from {}", size, self.config.port);

        let mut session = Session::open(transport, &self.config, size.total_sectors())?;
        let image = protocol::read_back(&mut session, size, &mut on_progress)?;
        let progress = session.finish();

        let report = VerifyReport {
            bytes: size.image_len(),
            sectors: progress.processed,
            elapsed: started.elapsed(),
        };
        info!("{}", report);
        Ok((image, report))
    }

    /// Read back with `target`'s geometry and replace it on success
    ///
    /// On any error `target` is left as it was.
    pub fn verify_into<T, F>(
        &self,
        transport: &mut T,
        target: &mut DiskImage,
        on_progress: F,
    ) -> Result<VerifyReport>
    where
        T: Transport + ?Sized,
        F: FnMut(&Progress),
    {
        let (image, report) = self.verify(transport, target.size(), on_progress)?;
        *target = image;
        Ok(report)
    }

    /// Read the flash status register
    pub fn read_flash_status<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<u8> {
        let _guard = self.acquire()?;
        self.run_flash_status(transport)
    }

    pub(crate) fn run_flash_status<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<u8> {
        let mut session = Session::open(transport, &self.config, 0)?;
        session.send_byte(opcodes::FLASH_STATUS)?;
        let status = session.await_byte()?;
        session.finish();
        info!("Flash status {}", format_status(status));
        Ok(status)
    }

    /// Write the test byte and wait for the acknowledge
    pub fn write_test_byte<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        let _guard = self.acquire()?;
        self.run_write_test(transport)
    }

    pub(crate) fn run_write_test<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        let mut session = Session::open(transport, &self.config, 0)?;
        session.send_byte(opcodes::WRITE_TEST)?;
        session.await_ack()?;
        session.finish();
        Ok(())
    }

    /// Read the test byte
    pub fn read_test_byte<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<u8> {
        let _guard = self.acquire()?;
        self.run_read_test(transport)
    }

    pub(crate) fn run_read_test<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<u8> {
        let mut session = Session::open(transport, &self.config, 0)?;
        session.send_byte(opcodes::READ_TEST)?;
        let value = session.await_byte()?;
        session.finish();
        Ok(value)
    }
}

impl Default for Burner {
    fn default() -> Self {
        Self::new(BurnerConfig::default())
    }
}
