use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempPath;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};

use super::archive::PakArchive;
use super::index::{EntryLocation, PakIndex};

/// Pak entry extractor
pub struct PakExtractor {
    index: PakIndex,
}

impl PakExtractor {
    pub fn new(index: PakIndex) -> Self {
        Self { index }
    }

    /// Open every source in order (lowest precedence first) and index them.
    pub async fn open_all<I, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::new(PakIndex::open_all(sources).await?))
    }

    pub fn index(&self) -> &PakIndex {
        &self.index
    }

    pub fn archives(&self) -> &[Arc<PakArchive>] {
        self.index.archives()
    }

    /// Resolve a name to its owning archive and byte range
    pub fn lookup(&self, name: &str) -> Result<EntryLocation<'_>> {
        self.index.lookup(name)
    }

    /// List entry names, optionally limited to a prefix
    pub fn list_entries<'a>(
        &'a self,
        prefix: Option<&'a str>,
    ) -> Result<impl Iterator<Item = &'a str> + 'a> {
        self.index.list_entries(prefix)
    }

    /// Extract entry data to memory
    pub async fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        self.index.read_bytes(name).await
    }

    /// Stream entry data into a writer
    pub async fn extract_to_writer<W>(&self, name: &str, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let location = self.index.lookup(name)?;
        let written = location.archive.copy_entry(location.entry, writer).await?;
        writer.flush().await?;
        Ok(written)
    }

    /// Extract entry to stdout
    pub async fn extract_to_stdout(&self, name: &str) -> Result<u64> {
        let mut stdout = tokio::io::stdout();
        self.extract_to_writer(name, &mut stdout).await
    }

    /// Extract entry to disk.
    ///
    /// Data goes to a uniquely named hidden sibling that is renamed over
    /// `output_path` only once the whole range is on disk. If anything fails
    /// the partial file is removed and `output_path` is left as it was.
    pub async fn extract_to_file(&self, name: &str, output_path: &Path) -> Result<u64> {
        let location = self.index.lookup(name)?;
        // Fail on a closed archive before touching the filesystem
        location.archive.source()?;

        let (partial, mut file) = create_partial(output_path).await?;
        let result = location.archive.copy_entry(location.entry, &mut file).await;
        commit_partial(partial, output_path, file, result).await
    }
}

/// Write `data` to `output_path` with the same all-or-nothing guarantee as
/// [`PakExtractor::extract_to_file`].
pub async fn write_file_atomic(output_path: &Path, data: &[u8]) -> Result<u64> {
    let (partial, mut file) = create_partial(output_path).await?;
    let result = file
        .write_all(data)
        .await
        .map(|_| data.len() as u64)
        .map_err(Into::into);
    commit_partial(partial, output_path, file, result).await
}

/// Open a uniquely named hidden sibling of `output_path` to write into.
///
/// The returned [`TempPath`] deletes the file when dropped, so any early
/// return leaves nothing behind.
async fn create_partial(output_path: &Path) -> Result<(TempPath, fs::File)> {
    let file_name = output_path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("destination has no file name: {}", output_path.display()),
        )
    })?;
    let parent = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).await?;

    let mut prefix = OsString::from(".");
    prefix.push(file_name);
    prefix.push(".");
    let partial = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".partial")
        .tempfile_in(parent)?;
    let (file, path) = partial.into_parts();
    Ok((path, fs::File::from_std(file)))
}

/// Move a finished partial file into place, or drop it if writing failed.
async fn commit_partial(
    partial: TempPath,
    output_path: &Path,
    mut file: fs::File,
    result: Result<u64>,
) -> Result<u64> {
    let result = match result {
        Ok(written) => async {
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, Error>(written)
        }
        .await,
        Err(e) => Err(e),
    };
    drop(file);

    let written = result?;
    partial
        .persist(output_path)
        .map_err(|e| Error::Io(e.error))?;
    debug!("Wrote {} ({} bytes)", output_path.display(), written);
    Ok(written)
}
