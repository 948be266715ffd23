//! Low-level pak archive parser.
//!
//! This module handles the binary parsing of pak file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! Pak files are read from the front:
//! 1. Read the 12-byte header and check the `PACK` magic
//! 2. Check the directory fits inside the source
//! 3. Read the whole directory in one call (a single Range request over HTTP)
//! 4. Decode and validate every 64-byte record
//!
//! Nothing is returned until every record has passed validation, so a
//! caller never sees a partially parsed archive.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Error, FormatError, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Header and validated directory of one pak file.
#[derive(Debug, Clone)]
pub struct ParsedDirectory {
    pub header: PakHeader,
    pub entries: Vec<PakEntry>,
    pub by_name: HashMap<String, usize>,
}

/// Low-level pak file parser.
///
/// Typically used through [`PakArchive::open`](super::PakArchive::open)
/// rather than directly.
pub struct PakParser {
    /// The underlying data source
    reader: Arc<dyn ReadAt>,
    /// Archive identity used in error messages
    label: String,
    /// Total size of the archive in bytes
    size: u64,
}

impl PakParser {
    pub fn new(reader: Arc<dyn ReadAt>, label: impl Into<String>) -> Self {
        let size = reader.size();
        Self {
            reader,
            label: label.into(),
            size,
        }
    }

    fn format_error(&self, source: FormatError) -> Error {
        Error::format(self.label.clone(), source)
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::archive_io(self.label.clone(), source)
    }

    /// Read and check the fixed header.
    ///
    /// # Errors
    ///
    /// [`FormatError::TruncatedHeader`] if the source is shorter than the
    /// header, [`FormatError::BadMagic`] or
    /// [`FormatError::MisalignedDirectory`] if the fields are wrong, and
    /// [`FormatError::DirectoryOutOfBounds`] if the directory does not fit.
    pub async fn read_header(&self) -> Result<PakHeader> {
        if self.size < HEADER_SIZE as u64 {
            return Err(self.format_error(FormatError::TruncatedHeader { len: self.size }));
        }

        let mut buf = [0u8; HEADER_SIZE];
        self.reader
            .read_exact_at(0, &mut buf)
            .await
            .map_err(|e| self.io_error(e))?;

        let header = PakHeader::from_bytes(&buf).map_err(|e| self.format_error(e))?;

        if header.dir_end() > self.size {
            return Err(self.format_error(FormatError::DirectoryOutOfBounds {
                offset: header.dir_offset,
                size: header.dir_size,
                total: self.size,
            }));
        }

        debug!(
            "{}: directory at {} holds {} entries",
            self.label,
            header.dir_offset,
            header.entry_count()
        );
        Ok(header)
    }

    /// Read and validate every directory record.
    pub async fn read_directory(&self, header: &PakHeader) -> Result<ParsedDirectory> {
        let mut dir_data = vec![0u8; header.dir_size as usize];
        self.reader
            .read_exact_at(header.dir_offset as u64, &mut dir_data)
            .await
            .map_err(|e| self.io_error(e))?;

        let count = header.entry_count();
        let mut entries = Vec::with_capacity(count);
        let mut by_name = HashMap::with_capacity(count);

        for (index, raw) in dir_data.chunks_exact(RECORD_SIZE).enumerate() {
            let record = DirectoryRecord::from_bytes(raw).map_err(|e| self.format_error(e))?;
            let entry = self.validate_record(index, &record)?;

            if by_name.contains_key(&entry.name) {
                return Err(self.format_error(FormatError::DuplicateEntry {
                    name: entry.name,
                    index,
                }));
            }

            trace!(
                "{}: entry {} '{}' at {} ({} bytes)",
                self.label, index, entry.name, entry.offset, entry.length
            );
            by_name.insert(entry.name.clone(), entries.len());
            entries.push(entry);
        }

        Ok(ParsedDirectory {
            header: *header,
            entries,
            by_name,
        })
    }

    /// Turn a raw record into a [`PakEntry`], checking its name and bounds.
    fn validate_record(&self, index: usize, record: &DirectoryRecord) -> Result<PakEntry> {
        let name_bytes = record.name_bytes();
        if name_bytes.is_empty() {
            return Err(self.format_error(FormatError::EmptyName { index }));
        }
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| self.format_error(FormatError::InvalidName { index }))?
            .to_string();

        let offset = record.offset as u64;
        let length = record.length as u64;
        if offset < HEADER_SIZE as u64 || offset + length > self.size {
            return Err(self.format_error(FormatError::EntryOutOfBounds {
                name,
                offset: record.offset,
                length: record.length,
                total: self.size,
            }));
        }

        Ok(PakEntry {
            name,
            offset,
            length,
        })
    }

    /// Read the header and the directory.
    pub async fn parse(&self) -> Result<ParsedDirectory> {
        let header = self.read_header().await?;
        self.read_directory(&header).await
    }
}
