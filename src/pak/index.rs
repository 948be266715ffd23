//! Combined name index over several archives.
//!
//! Archives are layered in the order given: when two archives hold the same
//! name, the later one wins, the way engines let `pak1.pak` override
//! `pak0.pak`. A name keeps the position where it was first seen, so the
//! listing order depends only on the order of the input archives.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};

use super::archive::PakArchive;
use super::structures::PakEntry;

/// Position of a winning entry: (archive slot, directory slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    archive: usize,
    entry: usize,
}

/// A resolved entry: the archive that owns it and its byte range.
#[derive(Debug, Clone, Copy)]
pub struct EntryLocation<'a> {
    pub archive: &'a Arc<PakArchive>,
    pub entry: &'a PakEntry,
}

impl EntryLocation<'_> {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn offset(&self) -> u64 {
        self.entry.offset
    }

    pub fn length(&self) -> u64 {
        self.entry.length
    }
}

/// Immutable name index over one or more archives.
#[derive(Debug, Clone)]
pub struct PakIndex {
    archives: Vec<Arc<PakArchive>>,
    slots: IndexMap<String, Slot>,
}

impl PakIndex {
    /// Build the index; `archives` is ordered lowest precedence first.
    pub fn new(archives: Vec<Arc<PakArchive>>) -> Self {
        let mut slots: IndexMap<String, Slot> = IndexMap::new();

        for (archive_idx, archive) in archives.iter().enumerate() {
            for (entry_idx, entry) in archive.directory().iter().enumerate() {
                let slot = Slot {
                    archive: archive_idx,
                    entry: entry_idx,
                };
                if let Some(previous) = slots.insert(entry.name.clone(), slot) {
                    debug!(
                        "{} overrides {} from {}",
                        archive.label(),
                        entry.name,
                        archives[previous.archive].label()
                    );
                }
            }
        }

        debug!(
            "Indexed {} names from {} archives",
            slots.len(),
            archives.len()
        );
        Self { archives, slots }
    }

    /// Open every source in order and index them.
    ///
    /// A source is a filesystem path or an `http://`/`https://` URL. The first
    /// source that fails to open fails the whole call.
    pub async fn open_all<I, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut archives = Vec::new();
        for source in sources {
            archives.push(Arc::new(PakArchive::open_location(source.as_ref()).await?));
        }
        Ok(Self::new(archives))
    }

    /// Archives in precedence order, lowest first.
    pub fn archives(&self) -> &[Arc<PakArchive>] {
        &self.archives
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    fn locate(&self, slot: Slot) -> EntryLocation<'_> {
        let archive = &self.archives[slot.archive];
        EntryLocation {
            archive,
            entry: &archive.directory()[slot.entry],
        }
    }

    /// Resolve `name` to the highest-precedence archive holding it.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no archive has the name, [`Error::Closed`] if
    /// the owning archive has been closed.
    pub fn lookup(&self, name: &str) -> Result<EntryLocation<'_>> {
        let slot = self
            .slots
            .get(name)
            .copied()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let location = self.locate(slot);
        if !location.archive.is_open() {
            return Err(Error::Closed {
                archive: location.archive.label().to_string(),
            });
        }
        Ok(location)
    }

    /// Fails with [`Error::Closed`] naming the first closed archive, if any.
    fn ensure_open(&self) -> Result<()> {
        match self.archives.iter().find(|a| !a.is_open()) {
            Some(archive) => Err(Error::Closed {
                archive: archive.label().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Names in index order, optionally limited to a prefix.
    ///
    /// Lazy, and each call starts a fresh sequence. Fails with
    /// [`Error::Closed`] once any archive in the index has been closed.
    pub fn list_entries<'a>(
        &'a self,
        prefix: Option<&'a str>,
    ) -> Result<impl Iterator<Item = &'a str> + 'a> {
        self.ensure_open()?;
        Ok(self
            .slots
            .keys()
            .map(String::as_str)
            .filter(move |name| prefix.is_none_or(|p| name.starts_with(p))))
    }

    /// Winning entries with their owning archive, in index order.
    pub fn entries(&self) -> Result<impl Iterator<Item = EntryLocation<'_>> + '_> {
        self.ensure_open()?;
        Ok(self.slots.values().map(|&slot| self.locate(slot)))
    }

    /// Read the full content of `name` from its winning archive.
    pub async fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let location = self.lookup(name)?;
        location.archive.read_entry(location.entry).await
    }
}

impl From<PakArchive> for PakIndex {
    fn from(archive: PakArchive) -> Self {
        Self::new(vec![Arc::new(archive)])
    }
}
