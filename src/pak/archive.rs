use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};

use super::parser::PakParser;
use super::structures::{PakEntry, PakHeader};

/// Bytes moved per read when streaming an entry out.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// An opened, validated pak file.
///
/// The directory is fixed once [`open`](Self::open) returns. The only state
/// change is the one-way transition to closed, after which every read,
/// lookup or listing fails with [`Error::Closed`].
pub struct PakArchive {
    label: String,
    source: RwLock<Option<Arc<dyn ReadAt>>>,
    size: u64,
    header: PakHeader,
    entries: Vec<PakEntry>,
    by_name: HashMap<String, usize>,
}

impl std::fmt::Debug for PakArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakArchive")
            .field("label", &self.label)
            .field("size", &self.size)
            .field("entries", &self.entries.len())
            .field("open", &self.is_open())
            .finish()
    }
}

impl PakArchive {
    /// Parse and validate a pak from any byte source.
    ///
    /// `label` identifies the archive in error messages. On failure the
    /// source is dropped before the error is returned.
    pub async fn open(label: impl Into<String>, source: Arc<dyn ReadAt>) -> Result<Self> {
        let label = label.into();
        let parsed = PakParser::new(source.clone(), label.clone()).parse().await?;
        debug!(
            "Opened {} ({} bytes, {} entries)",
            label,
            source.size(),
            parsed.entries.len()
        );

        Ok(Self {
            label,
            size: source.size(),
            source: RwLock::new(Some(source)),
            header: parsed.header,
            entries: parsed.entries,
            by_name: parsed.by_name,
        })
    }

    /// Open a pak file on the local filesystem.
    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let reader = LocalFileReader::new(path).map_err(|e| Error::archive_io(&label, e))?;
        Self::open(label, Arc::new(reader)).await
    }

    /// Open a remote pak file through HTTP Range requests.
    pub async fn open_url(url: &str) -> Result<Self> {
        let reader = HttpRangeReader::new(url.to_string())
            .await
            .map_err(|e| Error::archive_io(url, e))?;
        Self::open(url, Arc::new(reader)).await
    }

    /// Open a pak that is already in memory.
    pub async fn from_bytes(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::open(label, Arc::new(MemoryReader::new(bytes))).await
    }

    /// Open a path or an `http://`/`https://` URL.
    pub async fn open_location(location: &str) -> Result<Self> {
        if is_http_url(location) {
            Self::open_url(location).await
        } else {
            Self::open_path(location).await
        }
    }

    /// Archive identity (path, URL or caller-supplied label)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Total length of the byte source
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn dir_offset(&self) -> u64 {
        self.header.dir_offset as u64
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_open(&self) -> bool {
        self.source
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Release the byte source. Closing twice is a no-op.
    ///
    /// Reads already in flight keep their own handle and finish normally.
    pub fn close(&self) {
        let released = match self.source.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if released.is_some() {
            debug!("Closed {}", self.label);
        }
    }

    fn closed(&self) -> Error {
        Error::Closed {
            archive: self.label.clone(),
        }
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::archive_io(self.label.clone(), source)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(self.closed())
        }
    }

    /// Handle to the byte source, if the archive is still open.
    pub(crate) fn source(&self) -> Result<Arc<dyn ReadAt>> {
        self.source
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or_else(|| self.closed())
    }

    /// Directory entries in directory order.
    pub fn entries(&self) -> Result<&[PakEntry]> {
        self.ensure_open()?;
        Ok(&self.entries)
    }

    /// Directory entries regardless of state; the index is built from these.
    pub(crate) fn directory(&self) -> &[PakEntry] {
        &self.entries
    }

    /// Find an entry by exact name.
    pub fn lookup(&self, name: &str) -> Result<&PakEntry> {
        self.ensure_open()?;
        self.by_name
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Entry names in directory order, optionally limited to a prefix.
    ///
    /// Each call returns a fresh iterator.
    pub fn list_entries<'a>(
        &'a self,
        prefix: Option<&'a str>,
    ) -> Result<impl Iterator<Item = &'a str> + 'a> {
        self.ensure_open()?;
        Ok(self
            .entries
            .iter()
            .map(|e| e.name.as_str())
            .filter(move |name| prefix.is_none_or(|p| name.starts_with(p))))
    }

    /// Read the full content of `entry`, which must belong to this archive.
    pub async fn read_entry(&self, entry: &PakEntry) -> Result<Vec<u8>> {
        let source = self.source()?;
        let mut buf = vec![0u8; entry.length as usize];
        source
            .read_exact_at(entry.offset, &mut buf)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(buf)
    }

    /// Read the full content of the named entry.
    pub async fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.lookup(name)?;
        self.read_entry(entry).await
    }

    /// Stream `entry` into `writer` in [`COPY_CHUNK_SIZE`] pieces.
    ///
    /// Returns the number of bytes written, always `entry.length` on success.
    /// Read failures name this archive; write failures are plain
    /// [`Error::Io`].
    pub async fn copy_entry<W>(&self, entry: &PakEntry, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let source = self.source()?;
        let mut buf = vec![0u8; COPY_CHUNK_SIZE.min(entry.length as usize)];
        let mut copied = 0u64;

        while copied < entry.length {
            let n = (entry.length - copied).min(buf.len() as u64) as usize;
            source
                .read_exact_at(entry.offset + copied, &mut buf[..n])
                .await
                .map_err(|e| self.io_error(e))?;
            writer.write_all(&buf[..n]).await?;
            copied += n as u64;
            trace!("{}: copied {}/{} bytes", entry.name, copied, entry.length);
        }

        Ok(copied)
    }
}

/// Whether `location` is an `http://` or `https://` URL
pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
