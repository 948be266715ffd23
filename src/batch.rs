//! Batch extraction of many resources into a directory.
//!
//! Selection, renaming and content transforms live here, on top of
//! [`PakIndex`], so the archive layer never inspects entry content.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::pak::{PakIndex, write_file_atomic};

/// Content transform applied to each resource before it is written.
pub type Transform<'a> = &'a (dyn Fn(Vec<u8>) -> Vec<u8> + Send + Sync);

/// Which resources a batch handles, and where each one goes.
#[derive(Debug, Clone, Default)]
pub enum Selection {
    /// Every name in the index, written under its own name
    #[default]
    All,
    /// Only these names, written under their own names
    Names(BTreeSet<String>),
    /// Only these names, each written to the mapped relative path
    Renamed(IndexMap<String, PathBuf>),
}

impl Selection {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Names(names.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Replace files that already exist at the destination
    pub overwrite: bool,
    /// Drop the directory part of each name
    pub junk_paths: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            junk_paths: false,
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Resources written, with their destination
    pub extracted: Vec<(String, PathBuf)>,
    /// Resources left alone because the destination existed
    pub skipped: Vec<(String, PathBuf)>,
    /// Selected names no archive contains
    pub missing: Vec<String>,
    /// Resources that could not be read or written
    pub failed: Vec<(String, Error)>,
}

impl BatchReport {
    /// True when every selected resource was found and nothing failed.
    pub fn is_success(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }

    /// The kind of the most significant problem, if any.
    ///
    /// Failures outrank missing names.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.failed.first() {
            Some((_, e)) => Some(e.kind()),
            None if !self.missing.is_empty() => Some(ErrorKind::NotFound),
            None => None,
        }
    }
}

/// Every resource name across the index.
pub fn resource_names(index: &PakIndex) -> Result<BTreeSet<String>> {
    Ok(index.list_entries(None)?.map(String::from).collect())
}

/// Map a `/` separated resource name to a relative filesystem path.
///
/// # Errors
///
/// [`Error::UnsafePath`] for names with empty, `.` or `..` segments, or
/// segments the host platform would read as a root or drive prefix.
pub fn entry_output_path(name: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for segment in name.split('/') {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == segment => path.push(part),
            _ => return Err(Error::UnsafePath(name.to_string())),
        }
    }
    Ok(path)
}

fn check_relative(name: &str, path: &Path) -> Result<PathBuf> {
    let is_safe = path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if is_safe {
        Ok(path.to_path_buf())
    } else {
        Err(Error::UnsafePath(name.to_string()))
    }
}

/// Resolve the selection into (name, relative output path) pairs.
fn plan(
    index: &PakIndex,
    selection: &Selection,
    report: &mut BatchReport,
) -> Result<Vec<(String, Result<PathBuf>)>> {
    let mut planned = Vec::new();
    let mut select = |name: &str, target: Result<PathBuf>| {
        if index.contains(name) {
            planned.push((name.to_string(), target));
        } else {
            report.missing.push(name.to_string());
        }
    };

    match selection {
        Selection::All => {
            for name in index.list_entries(None)? {
                select(name, entry_output_path(name));
            }
        }
        Selection::Names(names) => {
            for name in names {
                select(name, entry_output_path(name));
            }
        }
        Selection::Renamed(map) => {
            for (name, target) in map {
                select(name, check_relative(name, target));
            }
        }
    }
    Ok(planned)
}

/// Extract the selected resources below `dest_dir`, passing each through
/// `transform` first when one is given.
///
/// A failure on one resource is recorded in the report and the batch moves
/// on to the next. The call itself only fails when [`Selection::All`] cannot
/// list the index because an archive in it was closed.
pub async fn process_resources(
    index: &PakIndex,
    selection: &Selection,
    dest_dir: &Path,
    options: BatchOptions,
    transform: Option<Transform<'_>>,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();

    for (name, target) in plan(index, selection, &mut report)? {
        let relative = match target {
            Ok(relative) => relative,
            Err(e) => {
                warn!("Refusing to extract {}: {}", name, e);
                report.failed.push((name, e));
                continue;
            }
        };
        let relative = if options.junk_paths {
            relative
                .file_name()
                .map(PathBuf::from)
                .unwrap_or(relative)
        } else {
            relative
        };
        let output_path = dest_dir.join(relative);

        if !options.overwrite && output_path.exists() {
            debug!("Skipping {}: {} exists", name, output_path.display());
            report.skipped.push((name, output_path));
            continue;
        }

        let result = async {
            let data = index.read_bytes(&name).await?;
            let data = match transform {
                Some(f) => f(data),
                None => data,
            };
            write_file_atomic(&output_path, &data).await
        }
        .await;

        match result {
            Ok(written) => {
                debug!("Extracted {} ({} bytes)", name, written);
                report.extracted.push((name, output_path));
            }
            Err(e) => {
                warn!("Failed to extract {}: {}", name, e);
                report.failed.push((name, e));
            }
        }
    }

    Ok(report)
}

/// [`process_resources`] without a transform.
pub async fn extract_resources(
    index: &PakIndex,
    selection: &Selection,
    dest_dir: &Path,
    options: BatchOptions,
) -> Result<BatchReport> {
    process_resources(index, selection, dest_dir, options, None).await
}
