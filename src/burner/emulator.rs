//! In-process programmer emulator
//!
//! Speaks the same wire protocol as the hardware: erase, sector burn,
//! sequential read-back and the auxiliary registers. Faults can be
//! injected to exercise the abort paths.

use crate::burner::config::LineSettings;
use crate::burner::opcodes;
use crate::burner::transport::Transport;
use crate::format::{sector_offset, sectors_per_track, DiskSize, SECTOR_SIZE};
use crate::image::DiskImage;
use log::trace;
use std::collections::VecDeque;
use std::io::{self, ErrorKind};

/// Byte sent instead of an acknowledge when a fault is injected
pub const NAK: u8 = 0x13;

#[derive(Debug, Clone)]
enum Pending {
    Opcode,
    Address(Vec<u8>),
    Payload { track: u8, sector: u8, data: Vec<u8> },
}

/// Emulated programmer with flash storage for one disk
#[derive(Debug, Clone)]
pub struct EmulatedBurner {
    size: DiskSize,
    flash: Vec<u8>,
    outbox: VecDeque<u8>,
    pending: Pending,
    read_pos: usize,
    streamed: usize,
    open: bool,
    fail_open: bool,
    silent: bool,
    reject_after: Option<usize>,
    stream_limit: Option<usize>,
    acks: usize,
    burned: Vec<(u8, u8)>,
    erases: usize,
    opens: usize,
    closes: usize,
    status: u8,
    test_byte: u8,
}

impl EmulatedBurner {
    /// An emulator with blank flash for a disk size
    pub fn new(size: DiskSize) -> Self {
        Self {
            size,
            flash: vec![0; size.image_len()],
            outbox: VecDeque::new(),
            pending: Pending::Opcode,
            read_pos: 0,
            streamed: 0,
            open: false,
            fail_open: false,
            silent: false,
            reject_after: None,
            stream_limit: None,
            acks: 0,
            burned: Vec::new(),
            erases: 0,
            opens: 0,
            closes: 0,
            status: 0,
            test_byte: 0,
        }
    }

    /// An emulator whose flash already holds an image
    pub fn with_image(image: &DiskImage) -> Self {
        let mut burner = Self::new(image.size());
        burner.flash = image.serialize_bytes();
        burner
    }

    /// Never answer anything
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Acknowledge `n` times, then answer every request with [`NAK`]
    pub fn reject_after(mut self, n: usize) -> Self {
        self.reject_after = Some(n);
        self
    }

    /// Stop answering read-back requests after `n` bytes
    pub fn with_stream_limit(mut self, n: usize) -> Self {
        self.stream_limit = Some(n);
        self
    }

    /// Refuse to open
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Preset the flash status register
    pub fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    /// Flash contents as a flat image
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Sectors burned so far, in arrival order
    pub fn burned(&self) -> &[(u8, u8)] {
        &self.burned
    }

    /// Number of erase commands handled
    pub fn erase_count(&self) -> usize {
        self.erases
    }

    /// Current test byte register
    pub fn test_byte(&self) -> u8 {
        self.test_byte
    }

    /// Whether the link is open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of successful opens
    pub fn open_count(&self) -> usize {
        self.opens
    }

    /// Number of closes of an open link
    pub fn close_count(&self) -> usize {
        self.closes
    }

    fn ack(&mut self) {
        if self.silent {
            return;
        }
        match self.reject_after {
            Some(n) if self.acks >= n => self.outbox.push_back(NAK),
            _ => {
                self.acks += 1;
                self.outbox.push_back(opcodes::ACK);
            }
        }
    }

    fn reply(&mut self, byte: u8) {
        if !self.silent {
            self.outbox.push_back(byte);
        }
    }

    fn stream_next(&mut self) {
        if self.stream_limit.is_some_and(|limit| self.streamed >= limit) {
            return;
        }
        if let Some(&byte) = self.flash.get(self.read_pos) {
            self.reply(byte);
            self.streamed += 1;
        }
        self.read_pos += 1;
    }

    fn feed(&mut self, byte: u8) {
        let pending = std::mem::replace(&mut self.pending, Pending::Opcode);
        self.pending = match pending {
            Pending::Opcode => {
                self.command(byte);
                if byte == opcodes::BURN {
                    Pending::Address(Vec::with_capacity(2))
                } else {
                    Pending::Opcode
                }
            }
            Pending::Address(mut address) => {
                address.push(byte);
                if address.len() < 2 {
                    Pending::Address(address)
                } else {
                    self.ack();
                    Pending::Payload {
                        track: address[0].saturating_add(1),
                        sector: address[1],
                        data: Vec::with_capacity(SECTOR_SIZE),
                    }
                }
            }
            Pending::Payload {
                track,
                sector,
                mut data,
            } => {
                data.push(byte);
                if data.len() < SECTOR_SIZE {
                    Pending::Payload {
                        track,
                        sector,
                        data,
                    }
                } else {
                    self.store(track, sector, &data);
                    self.ack();
                    Pending::Opcode
                }
            }
        };
    }

    fn command(&mut self, opcode: u8) {
        trace!("Emulator opcode 0x{:02X}", opcode);
        match opcode {
            opcodes::ERASE => {
                self.flash.fill(0);
                self.erases += 1;
                self.ack();
            }
            opcodes::RESET_READ => {
                self.read_pos = 0;
                self.stream_next();
            }
            opcodes::CONTINUE_READ => self.stream_next(),
            opcodes::FLASH_STATUS => self.reply(self.status),
            opcodes::READ_TEST => self.reply(self.test_byte),
            opcodes::WRITE_TEST => {
                self.test_byte = opcodes::WRITE_TEST;
                self.ack();
            }
            _ => {}
        }
    }

    fn store(&mut self, track: u8, sector: u8, data: &[u8]) {
        let in_geometry = track <= self.size.track_count()
            && sector < sectors_per_track(track);
        if in_geometry {
            let offset = sector_offset(track, sector);
            self.flash[offset..offset + SECTOR_SIZE].copy_from_slice(data);
        }
        self.burned.push((track, sector));
    }
}

impl Transport for EmulatedBurner {
    fn open(&mut self, port: &str, _line: &LineSettings) -> io::Result<()> {
        if self.fail_open {
            return Err(io::Error::new(
                ErrorKind::NotFound,
                format!("no programmer on '{}'", port),
            ));
        }
        self.open = true;
        self.opens += 1;
        self.outbox.clear();
        self.pending = Pending::Opcode;
        Ok(())
    }

    fn send_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(ErrorKind::NotConnected, "emulator is not open"));
        }
        for &byte in bytes {
            self.feed(byte);
        }
        Ok(())
    }

    fn is_data_available(&mut self) -> io::Result<bool> {
        Ok(self.open && !self.outbox.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.outbox
            .pop_front()
            .ok_or_else(|| io::Error::new(ErrorKind::WouldBlock, "no data"))
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closes += 1;
        }
    }
}
