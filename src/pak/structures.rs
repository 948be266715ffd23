use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// Pak file magic
pub const MAGIC: &[u8; 4] = b"PACK";
/// Fixed header size
pub const HEADER_SIZE: usize = 12;
/// Width of the name field in a directory record
pub const NAME_LEN: usize = 56;
/// Size of one directory record
pub const RECORD_SIZE: usize = NAME_LEN + 8;

/// Pak header - 12 bytes at the start of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PakHeader {
    pub dir_offset: u32,
    pub dir_size: u32,
}

impl PakHeader {
    pub const MAGIC: &'static [u8; 4] = MAGIC;
    pub const SIZE: usize = HEADER_SIZE;

    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < Self::SIZE {
            return Err(FormatError::TruncatedHeader {
                len: data.len() as u64,
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[0..4]);
        if &magic != Self::MAGIC {
            return Err(FormatError::BadMagic(magic));
        }

        let dir_offset = LittleEndian::read_u32(&data[4..8]);
        let dir_size = LittleEndian::read_u32(&data[8..12]);

        if dir_size as usize % RECORD_SIZE != 0 {
            return Err(FormatError::MisalignedDirectory { size: dir_size });
        }

        Ok(Self {
            dir_offset,
            dir_size,
        })
    }

    /// Number of records in the directory
    pub fn entry_count(&self) -> usize {
        self.dir_size as usize / RECORD_SIZE
    }

    /// First byte past the directory
    pub fn dir_end(&self) -> u64 {
        self.dir_offset as u64 + self.dir_size as u64
    }
}

/// One raw directory record - 64 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub name: [u8; NAME_LEN],
    pub offset: u32,
    pub length: u32,
}

impl DirectoryRecord {
    pub const NAME_LEN: usize = NAME_LEN;
    pub const SIZE: usize = RECORD_SIZE;

    /// Split a record off the front of `data`.
    ///
    /// Callers hand in a slice sized from the header, so a short slice here
    /// is reported as a misaligned directory.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < Self::SIZE {
            return Err(FormatError::MisalignedDirectory {
                size: data.len() as u32,
            });
        }

        let mut name = [0u8; Self::NAME_LEN];
        name.copy_from_slice(&data[..Self::NAME_LEN]);

        let offset = LittleEndian::read_u32(&data[Self::NAME_LEN..Self::NAME_LEN + 4]);
        let length = LittleEndian::read_u32(&data[Self::NAME_LEN + 4..Self::SIZE]);

        Ok(Self {
            name,
            offset,
            length,
        })
    }

    /// Name bytes up to the first NUL, or the whole field if there is none
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(Self::NAME_LEN);
        &self.name[..end]
    }
}

/// Validated pak entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PakEntry {
    pub name: String,
    pub offset: u64,
    pub length: u64,
}

impl PakEntry {
    /// One past the last byte of the entry's data
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Last path segment of the name
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(magic: &[u8; 4], offset: u32, size: u32) -> Vec<u8> {
        let mut buf = magic.to_vec();
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.extend_from_slice(&size.to_le_bytes());
        buf
    }

    #[test]
    fn test_header_parses() {
        let header = PakHeader::from_bytes(&header_bytes(b"PACK", 12, 128)).unwrap();
        assert_eq!(header.dir_offset, 12);
        assert_eq!(header.dir_size, 128);
        assert_eq!(header.entry_count(), 2);
        assert_eq!(header.dir_end(), 140);
    }

    #[test]
    fn test_header_bad_magic() {
        let err = PakHeader::from_bytes(&header_bytes(b"PACX", 12, 0)).unwrap_err();
        assert_eq!(err, FormatError::BadMagic(*b"PACX"));
    }

    #[test]
    fn test_header_short() {
        let err = PakHeader::from_bytes(b"PACK\x0c\x00").unwrap_err();
        assert_eq!(err, FormatError::TruncatedHeader { len: 6 });
    }

    #[test]
    fn test_header_misaligned() {
        let err = PakHeader::from_bytes(&header_bytes(b"PACK", 12, 65)).unwrap_err();
        assert_eq!(err, FormatError::MisalignedDirectory { size: 65 });
    }

    #[test]
    fn test_record_name_terminates_at_nul() {
        let mut raw = vec![0u8; DirectoryRecord::SIZE];
        raw[..8].copy_from_slice(b"progs.da");
        // Garbage after the terminator is ignored
        raw[9..12].copy_from_slice(b"xyz");
        raw[56..60].copy_from_slice(&1000u32.to_le_bytes());
        raw[60..64].copy_from_slice(&42u32.to_le_bytes());

        let record = DirectoryRecord::from_bytes(&raw).unwrap();
        assert_eq!(record.name_bytes(), b"progs.da");
        assert_eq!(record.offset, 1000);
        assert_eq!(record.length, 42);
    }

    #[test]
    fn test_record_name_fills_field() {
        let mut raw = vec![b'a'; DirectoryRecord::SIZE];
        raw[56..].copy_from_slice(&[0; 8]);
        let record = DirectoryRecord::from_bytes(&raw).unwrap();
        assert_eq!(record.name_bytes().len(), DirectoryRecord::NAME_LEN);
    }

    #[test]
    fn test_entry_file_name() {
        let entry = PakEntry {
            name: "sound/misc/basekey.wav".into(),
            offset: 12,
            length: 0,
        };
        assert_eq!(entry.file_name(), "basekey.wav");
        assert_eq!(entry.end(), 12);
    }
}
