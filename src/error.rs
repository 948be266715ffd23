//! Error types for pak parsing and extraction.

use thiserror::Error;

/// Result type for pak operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// Callers that only need to decide how to react (reject the archive, report
/// a missing resource, retry, fix the calling code) match on this instead of
/// on the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or corrupt archive structure. Not retriable.
    Format,
    /// The requested entry does not exist in any archive.
    NotFound,
    /// The underlying byte source or destination failed. May be transient.
    Io,
    /// The operation was invoked on a closed archive.
    State,
}

/// Structural problems found while validating a pak file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The source is too short to hold the fixed header
    #[error("truncated header: {len} bytes available, 12 required")]
    TruncatedHeader { len: u64 },

    /// Invalid pak magic bytes
    #[error("invalid pak magic: expected 'PACK', got {0:?}")]
    BadMagic([u8; 4]),

    /// Directory size is not a whole number of records
    #[error("directory size {size} is not a multiple of the 64-byte record size")]
    MisalignedDirectory { size: u32 },

    /// Directory extends past the end of the archive
    #[error("directory at {offset} with size {size} exceeds archive length {total}")]
    DirectoryOutOfBounds { offset: u32, size: u32, total: u64 },

    /// Directory record with an empty name
    #[error("directory record {index} has an empty name")]
    EmptyName { index: usize },

    /// Directory record whose name is not valid UTF-8
    #[error("directory record {index} has a name that is not valid UTF-8")]
    InvalidName { index: usize },

    /// Entry data lies outside the archive
    #[error(
        "entry '{name}' at offset {offset} with length {length} is outside the archive data (length {total})"
    )]
    EntryOutOfBounds {
        name: String,
        offset: u32,
        length: u32,
        total: u64,
    },

    /// The same name appears twice in one directory
    #[error("duplicate entry '{name}' in directory record {index}")]
    DuplicateEntry { name: String, index: usize },
}

/// Pak error types
#[derive(Error, Debug)]
pub enum Error {
    /// The archive failed validation
    #[error("{archive}: {source}")]
    Format {
        /// Identity of the offending archive (path, URL or label)
        archive: String,
        #[source]
        source: FormatError,
    },

    /// No archive contains the requested entry
    #[error("entry not found: {0}")]
    NotFound(String),

    /// IO error on a destination or other non-archive file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error while opening or reading an archive
    #[error("{archive}: IO error: {source}")]
    ArchiveIo {
        archive: String,
        #[source]
        source: std::io::Error,
    },

    /// The archive was closed before the operation ran
    #[error("archive is closed: {archive}")]
    Closed { archive: String },

    /// An entry name that cannot be mapped below a destination directory
    #[error("entry name does not map to a safe relative path: {0}")]
    UnsafePath(String),
}

impl Error {
    /// Wrap a [`FormatError`] with the identity of the archive it came from.
    pub fn format(archive: impl Into<String>, source: FormatError) -> Self {
        Self::Format {
            archive: archive.into(),
            source,
        }
    }

    /// Tag an I/O failure with the archive it happened on.
    pub fn archive_io(archive: impl Into<String>, source: std::io::Error) -> Self {
        Self::ArchiveIo {
            archive: archive.into(),
            source,
        }
    }

    /// Identity of the archive involved, when the error names one.
    pub fn archive(&self) -> Option<&str> {
        match self {
            Error::Format { archive, .. }
            | Error::ArchiveIo { archive, .. }
            | Error::Closed { archive } => Some(archive),
            _ => None,
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Format { .. } | Error::UnsafePath(_) => ErrorKind::Format,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Io(_) | Error::ArchiveIo { .. } => ErrorKind::Io,
            Error::Closed { .. } => ErrorKind::State,
        }
    }

    /// The structural problem, if this is a format error raised by the parser.
    pub fn format_error(&self) -> Option<&FormatError> {
        match self {
            Error::Format { source, .. } => Some(source),
            _ => None,
        }
    }
}
