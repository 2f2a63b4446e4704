//! Command/acknowledge state machine
//!
//! Every request is answered before the next one is sent. A response that
//! does not arrive within the configured timeout, or an acknowledge slot
//! that holds anything but 0xF0, aborts the whole operation and closes the
//! transport.

use crate::burner::config::BurnerConfig;
use crate::burner::opcodes;
use crate::burner::transport::Transport;
use crate::burner::{BurnMode, BurnState, Progress};
use crate::error::{D64Error, Result};
use crate::format::{sectors_per_track, DiskSize, SECTOR_SIZE};
use crate::image::DiskImage;
use log::{debug, trace, warn};
use std::io;
use std::thread;
use std::time::{Duration, Instant};

/// One open link to the programmer, closed when dropped
pub(crate) struct Session<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    timeout: Duration,
    poll_interval: Duration,
    progress: Progress,
    open: bool,
}

impl<'t, T: Transport + ?Sized> Session<'t, T> {
    /// Open the transport for an operation over `total` sectors
    pub(crate) fn open(transport: &'t mut T, config: &BurnerConfig, total: usize) -> Result<Self> {
        let mut progress = Progress::new(total);
        progress.state = BurnState::Connecting;

        if let Err(e) = transport.open(&config.port, &config.line) {
            warn!("Cannot open '{}': {}", config.port, e);
            transport.close();
            return Err(D64Error::configuration(format!(
                "cannot open '{}': {}",
                config.port, e
            )));
        }
        debug!("Opened '{}' at {}", config.port, config.line);

        Ok(Self {
            transport,
            timeout: config.timeout,
            poll_interval: config.poll_interval,
            progress,
            open: true,
        })
    }

    pub(crate) fn progress(&self) -> Progress {
        self.progress
    }

    pub(crate) fn set_state(&mut self, state: BurnState) {
        self.progress.state = state;
    }

    fn advance(&mut self, transmitted: bool) {
        self.progress.processed += 1;
        if transmitted {
            self.progress.transmitted += 1;
        }
    }

    fn close(&mut self) {
        if self.open {
            self.transport.close();
            self.open = false;
        }
    }

    fn abort_io(&mut self, error: io::Error) -> D64Error {
        warn!("Transport error after {}: {}", self.progress, error);
        self.progress.state = BurnState::Aborted;
        self.close();
        D64Error::Io(error)
    }

    /// Mark the operation completed and close the transport
    pub(crate) fn finish(mut self) -> Progress {
        self.progress.state = BurnState::Completed;
        self.close();
        self.progress
    }

    pub(crate) fn send_byte(&mut self, byte: u8) -> Result<()> {
        trace!("> {:02X}", byte);
        match self.transport.send_byte(byte) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.abort_io(e)),
        }
    }

    pub(crate) fn send_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("> {} bytes", bytes.len());
        match self.transport.send_buffer(bytes) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.abort_io(e)),
        }
    }

    /// Poll for one response byte until the deadline
    pub(crate) fn await_byte(&mut self) -> Result<u8> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.transport.is_data_available() {
                Ok(true) => {
                    return match self.transport.read_byte() {
                        Ok(byte) => {
                            trace!("< {:02X}", byte);
                            Ok(byte)
                        }
                        Err(e) => Err(self.abort_io(e)),
                    };
                }
                Ok(false) => {}
                Err(e) => return Err(self.abort_io(e)),
            }

            if Instant::now() >= deadline {
                warn!("No response within {:?} after {}", self.timeout, self.progress);
                self.progress.state = BurnState::Aborted;
                self.close();
                return Err(D64Error::Timeout {
                    progress: self.progress,
                });
            }
            if !self.poll_interval.is_zero() {
                thread::sleep(self.poll_interval);
            }
        }
    }

    /// Wait for the acknowledge byte
    pub(crate) fn await_ack(&mut self) -> Result<()> {
        let received = self.await_byte()?;
        if received == opcodes::ACK {
            return Ok(());
        }

        warn!("Expected acknowledge, got 0x{:02X} after {}", received, self.progress);
        self.progress.state = BurnState::Aborted;
        self.close();
        Err(D64Error::ProtocolMismatch {
            received,
            progress: self.progress,
        })
    }
}

impl<T: Transport + ?Sized> Drop for Session<'_, T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Burn sequence steps; sector steps carry the index into the location list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Erase,
    Select(usize),
    Address(usize),
    Payload(usize),
    Done,
}

fn burn_step<T: Transport + ?Sized>(
    session: &mut Session<'_, T>,
    image: &DiskImage,
    mode: BurnMode,
    locations: &[(u8, u8)],
    step: Step,
) -> Result<Step> {
    match step {
        Step::Erase => {
            session.set_state(BurnState::Erasing);
            session.send_byte(opcodes::ERASE)?;
            session.await_ack()?;
            debug!("Erase acknowledged");
            session.set_state(mode.state());
            Ok(Step::Select(0))
        }
        Step::Select(i) => match locations.get(i) {
            None => Ok(Step::Done),
            Some(&(track, sector))
                if mode == BurnMode::Quick && image.read_sector(track, sector).is_free() =>
            {
                session.advance(false);
                Ok(Step::Select(i + 1))
            }
            Some(_) => Ok(Step::Address(i)),
        },
        Step::Address(i) => {
            let (track, sector) = locations[i];
            // The programmer numbers tracks from 0
            session.send_byte(opcodes::BURN)?;
            session.send_buffer(&[track - 1, sector])?;
            session.await_ack()?;
            Ok(Step::Payload(i))
        }
        Step::Payload(i) => {
            let (track, sector) = locations[i];
            session.send_buffer(image.read_sector(track, sector).data())?;
            session.await_ack()?;
            session.advance(true);
            Ok(Step::Select(i + 1))
        }
        Step::Done => Ok(Step::Done),
    }
}

/// Erase, then transmit sectors in ascending geometry order
pub(crate) fn burn<T, F>(
    session: &mut Session<'_, T>,
    image: &DiskImage,
    mode: BurnMode,
    on_progress: &mut F,
) -> Result<()>
where
    T: Transport + ?Sized,
    F: FnMut(&Progress),
{
    let locations: Vec<(u8, u8)> = image.locations().collect();
    let mut step = Step::Erase;
    let mut reported = 0;

    while step != Step::Done {
        step = burn_step(session, image, mode, &locations, step)?;

        let progress = session.progress();
        if progress.processed != reported {
            reported = progress.processed;
            on_progress(&progress);
        }
    }

    Ok(())
}

/// Position of the next byte of a sequential read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    tracks: u8,
    pub(crate) track: u8,
    pub(crate) sector: u8,
    pub(crate) index: usize,
}

impl Cursor {
    pub(crate) fn start(size: DiskSize) -> Self {
        Self {
            tracks: size.track_count(),
            track: 1,
            sector: 0,
            index: 0,
        }
    }

    /// Step to the next byte; false once past the final track
    pub(crate) fn advance(&mut self) -> bool {
        self.index += 1;
        if self.index < SECTOR_SIZE {
            return true;
        }

        self.index = 0;
        self.sector += 1;
        if self.sector < sectors_per_track(self.track) {
            return true;
        }

        self.sector = 0;
        self.track += 1;
        self.track <= self.tracks
    }
}

/// Stream the whole flash back, one byte per request
pub(crate) fn read_back<T, F>(
    session: &mut Session<'_, T>,
    size: DiskSize,
    on_progress: &mut F,
) -> Result<DiskImage>
where
    T: Transport + ?Sized,
    F: FnMut(&Progress),
{
    let mut image = DiskImage::format(size);
    let mut cursor = Cursor::start(size);
    session.set_state(BurnState::Verify);

    session.send_byte(opcodes::RESET_READ)?;
    let first = session.await_byte()?;
    image.write_byte(cursor.track, cursor.sector, cursor.index, first);

    while cursor.advance() {
        if cursor.index == 0 {
            session.advance(false);
            on_progress(&session.progress());
        }
        session.send_byte(opcodes::CONTINUE_READ)?;
        let byte = session.await_byte()?;
        image.write_byte(cursor.track, cursor.sector, cursor.index, byte);
    }
    session.advance(false);
    on_progress(&session.progress());

    image.refresh();
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burner::config::LineSettings;
    use crate::burner::emulator::{EmulatedBurner, NAK};

    fn config() -> BurnerConfig {
        BurnerConfig::new("emu")
            .with_timeout(Duration::from_millis(20))
            .with_poll_interval(Duration::ZERO)
    }

    /// Refuses to open but records every close
    #[derive(Default)]
    struct RefusingPort {
        closes: usize,
    }

    impl Transport for RefusingPort {
        fn open(&mut self, _port: &str, _line: &LineSettings) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::AddrInUse, "port in use"))
        }

        fn send_buffer(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::NotConnected))
        }

        fn is_data_available(&mut self) -> io::Result<bool> {
            Ok(false)
        }

        fn read_byte(&mut self) -> io::Result<u8> {
            Err(io::Error::from(io::ErrorKind::NotConnected))
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    #[test]
    fn test_open_failure_closes_transport() {
        let mut port = RefusingPort::default();
        {
            let result = Session::open(&mut port, &config(), 683);
            assert!(matches!(result, Err(D64Error::Configuration(_))));
        }
        assert_eq!(port.closes, 1);
    }

    #[test]
    fn test_cursor_walks_geometry() {
        let mut cursor = Cursor::start(DiskSize::Standard);
        let mut steps = 1;
        while cursor.advance() {
            steps += 1;
        }
        assert_eq!(steps, 683 * 256);
    }

    #[test]
    fn test_cursor_wraps() {
        let mut cursor = Cursor::start(DiskSize::Standard);
        for _ in 0..255 {
            assert!(cursor.advance());
        }
        assert_eq!((cursor.track, cursor.sector, cursor.index), (1, 0, 255));
        assert!(cursor.advance());
        assert_eq!((cursor.track, cursor.sector, cursor.index), (1, 1, 0));
        for _ in 0..(20 * 256) {
            assert!(cursor.advance());
        }
        assert_eq!((cursor.track, cursor.sector, cursor.index), (2, 0, 0));
    }

    #[test]
    fn test_await_ack_mismatch_closes() {
        let mut emulator = EmulatedBurner::new(DiskSize::Standard).reject_after(0);
        {
            let mut session = Session::open(&mut emulator, &config(), 10).unwrap();
            session.send_byte(opcodes::ERASE).unwrap();
            let err = session.await_ack().unwrap_err();
            assert!(matches!(err, D64Error::ProtocolMismatch { received: NAK, .. }));
            assert_eq!(session.progress().state, BurnState::Aborted);
        }
        assert!(!emulator.is_open());
        assert_eq!(emulator.close_count(), 1);
    }

    #[test]
    fn test_await_byte_timeout_closes() {
        let mut emulator = EmulatedBurner::new(DiskSize::Standard).silent();
        {
            let mut session = Session::open(&mut emulator, &config(), 0).unwrap();
            session.send_byte(opcodes::READ_TEST).unwrap();
            let started = Instant::now();
            let err = session.await_byte().unwrap_err();
            assert!(matches!(err, D64Error::Timeout { .. }));
            assert!(started.elapsed() >= Duration::from_millis(20));
        }
        assert!(!emulator.is_open());
    }

    #[test]
    fn test_wire_address_is_zero_based() {
        let mut image = DiskImage::format(DiskSize::Standard);
        image.write_byte(18, 3, 0, 1);
        let mut emulator = EmulatedBurner::new(DiskSize::Standard);
        {
            let mut session = Session::open(&mut emulator, &config(), 683).unwrap();
            burn(&mut session, &image, BurnMode::Quick, &mut |_| {}).unwrap();
        }
        assert_eq!(emulator.burned(), &[(18, 3)]);
    }
}
