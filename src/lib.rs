//! # expak
//!
//! Read Quake-style pak files: list their resources and extract them, from
//! the local filesystem, from memory, or from remote HTTP servers.
//!
//! A pak file is a 12-byte header, raw resource data, and a flat directory of
//! 64-byte records naming each resource's byte range. Every archive is fully
//! validated when it is opened: the magic, the directory bounds and every
//! entry's byte range are checked before any content can be read.
//!
//! ## Features
//!
//! - Open paks from local files, in-memory buffers, or HTTP URLs (Range requests)
//! - Layer several paks; later paks override earlier ones on name collision
//! - Exact-range reads, streamed extraction, and all-or-nothing file writes
//! - Batch extraction with name selection, renaming, and a content transform hook
//!
//! ## Example
//!
//! ```no_run
//! use expak::PakExtractor;
//!
//! #[tokio::main]
//! async fn main() -> expak::Result<()> {
//!     // pak1.pak overrides pak0.pak
//!     let extractor = PakExtractor::open_all(["id1/pak0.pak", "id1/pak1.pak"]).await?;
//!
//!     for name in extractor.list_entries(Some("maps/"))? {
//!         println!("{}", name);
//!     }
//!
//!     let progs = extractor.read_bytes("progs.dat").await?;
//!     println!("progs.dat is {} bytes", progs.len());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cli;
pub mod error;
pub mod io;
pub mod pak;

pub use batch::{BatchOptions, BatchReport, Selection};
pub use cli::Cli;
pub use error::{Error, ErrorKind, FormatError, Result};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use pak::{EntryLocation, PakArchive, PakEntry, PakExtractor, PakIndex};
