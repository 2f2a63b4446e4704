//! Error types and Result alias

use crate::burner::Progress;
use thiserror::Error;

/// Result type alias for D64 operations
pub type Result<T> = std::result::Result<T, D64Error>;

/// Errors that can occur when building, storing or burning D64 images
#[derive(Debug, Error)]
pub enum D64Error {
    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unrecognized image file
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The transport could not be opened, nothing was transferred
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The programmer did not answer within the deadline
    #[error("Timeout after {progress}")]
    Timeout {
        /// Counters at the moment of the abort
        progress: Progress,
    },

    /// The programmer answered with something other than an acknowledge
    #[error("Not an acknowledge: received 0x{received:02X} after {progress}")]
    ProtocolMismatch {
        /// The byte that was received instead
        received: u8,
        /// Counters at the moment of the abort
        progress: Progress,
    },

    /// No free sector left for a program file
    #[error("Disk full: no room for '{file}' ({packed} files packed)")]
    DiskFull {
        /// Display name of the file that did not fit
        file: String,
        /// Number of files that were packed before it
        packed: usize,
    },

    /// More entries than the directory track can hold
    #[error("Directory full: {entries} entries do not fit on the directory track")]
    DirectoryFull {
        /// Number of entries requested
        entries: usize,
    },

    /// Another burn, verify or auxiliary operation is running
    #[error("Operation already in progress")]
    Busy,

    /// Invalid display name
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

impl D64Error {
    /// Create an invalid format error
    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        D64Error::InvalidFormat(message.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        D64Error::Configuration(message.into())
    }

    /// Partial-progress counters carried by protocol errors
    pub fn progress(&self) -> Option<Progress> {
        match self {
            D64Error::Timeout { progress } => Some(*progress),
            D64Error::ProtocolMismatch { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = D64Error::DiskFull {
            file: "GAME".to_string(),
            packed: 3,
        };
        assert_eq!(
            err.to_string(),
            "Disk full: no room for 'GAME' (3 files packed)"
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let err = D64Error::ProtocolMismatch {
            received: 0x13,
            progress: Progress::new(683).with_processed(10),
        };
        assert_eq!(
            err.to_string(),
            "Not an acknowledge: received 0x13 after 10 of 683 sectors"
        );
    }

    #[test]
    fn test_progress_accessor() {
        let err = D64Error::Timeout {
            progress: Progress::new(683).with_processed(5),
        };
        assert_eq!(err.progress().map(|p| p.processed), Some(5));
        assert!(D64Error::Busy.progress().is_none());
    }
}
