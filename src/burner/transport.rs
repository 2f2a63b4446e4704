//! Byte-stream endpoints to the programmer

use crate::burner::config::LineSettings;
use log::debug;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A half-duplex byte link to the programmer
///
/// Implementations own the underlying device; callers open it at the start
/// of an operation and close it on every exit path.
pub trait Transport {
    /// Open the link
    fn open(&mut self, port: &str, line: &LineSettings) -> io::Result<()>;

    /// Send a single byte
    fn send_byte(&mut self, byte: u8) -> io::Result<()> {
        self.send_buffer(&[byte])
    }

    /// Send a block of bytes
    fn send_buffer(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Whether a byte can be read without blocking
    fn is_data_available(&mut self) -> io::Result<bool>;

    /// Read one byte
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Close the link; closing twice is harmless
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, port: &str, line: &LineSettings) -> io::Result<()> {
        (**self).open(port, line)
    }

    fn send_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).send_byte(byte)
    }

    fn send_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).send_buffer(bytes)
    }

    fn is_data_available(&mut self) -> io::Result<bool> {
        (**self).is_data_available()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Transport over a TCP serial bridge (`host:port`)
///
/// The bridge owns the physical line and must itself be set to 19200 8N1
/// (`LineSettings::default()`); the line settings are only logged.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a closed transport
    pub fn new() -> Self {
        Self {
            stream: None,
            connect_timeout: Duration::from_secs(3),
        }
    }

    /// Whether the link is open
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "transport is not open"))
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn open(&mut self, port: &str, line: &LineSettings) -> io::Result<()> {
        self.close();

        let addr = port
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, format!("no address for '{}'", port)))?;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_nodelay(true)?;

        debug!("Connected to {} ({})", addr, line);
        self.stream = Some(stream);
        Ok(())
    }

    fn send_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream()?.write_all(bytes)
    }

    fn is_data_available(&mut self) -> io::Result<bool> {
        let stream = self.stream()?;
        stream.set_nonblocking(true)?;
        let mut probe = [0u8; 1];
        let result = stream.peek(&mut probe);
        stream.set_nonblocking(false)?;

        match result {
            Ok(n) => Ok(n > 0),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.stream()?.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("Connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let bridge = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut byte = [0u8; 1];
            socket.read_exact(&mut byte).unwrap();
            socket.write_all(&[byte[0] ^ 0xFF]).unwrap();
        });

        let mut transport = TcpTransport::new();
        assert!(transport.is_data_available().is_err());
        transport.open(&addr, &LineSettings::default()).unwrap();
        transport.send_byte(0x0F).unwrap();

        while !transport.is_data_available().unwrap() {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(transport.read_byte().unwrap(), 0xF0);

        transport.close();
        transport.close();
        assert!(!transport.is_open());
        bridge.join().unwrap();
    }

    #[test]
    fn test_open_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut transport = TcpTransport::new();
        assert!(transport.open(&addr, &LineSettings::default()).is_err());
    }
}
