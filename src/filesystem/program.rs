//! Program files queued for packing

use crate::error::{D64Error, Result};
use crate::format::{BLOCK_PAYLOAD, NAME_LENGTH};
use std::fs;
use std::path::Path;

/// A raw program blob with its directory display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramFile {
    data: Vec<u8>,
    name: String,
}

impl ProgramFile {
    /// Create a program file, rejecting names longer than 16 characters
    pub fn new(name: &str, data: Vec<u8>) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            data,
            name: name.to_string(),
        })
    }

    /// Read a program file; the name is the uppercased file stem cut to 16 characters
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_uppercase()
            .chars()
            .take(NAME_LENGTH)
            .collect();

        Ok(Self { data, name })
    }

    /// Replace the display name
    pub fn with_name(mut self, name: &str) -> Result<Self> {
        self.set_name(name)?;
        Ok(self)
    }

    /// Replace the display name in place
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.name = name.to_string();
        Ok(())
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Sectors the payload occupies once chained (at least one)
    pub fn estimated_sectors(&self) -> usize {
        self.data.len().div_ceil(BLOCK_PAYLOAD).max(1)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.chars().count() > NAME_LENGTH {
        return Err(D64Error::InvalidFilename(format!(
            "'{}' is longer than {} characters",
            name, NAME_LENGTH
        )));
    }
    Ok(())
}
