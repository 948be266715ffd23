//! Pak archive parsing and extraction.
//!
//! This module provides functionality for reading Quake-style pak files
//! and pulling resources out of one archive or a stack of them.
//!
//! ## Architecture
//!
//! The module is organized into these components:
//!
//! - [`structures`]: Data structures representing pak format elements (header, directory records)
//! - [`parser`]: Low-level parsing and validation of the header and directory
//! - [`archive`]: An opened archive with its open/closed lifecycle
//! - [`index`]: Name index over several archives with override precedence
//! - [`extractor`]: High-level extraction API for end users
//!
//! ## Pak Format Overview
//!
//! A pak file consists of:
//! 1. A 12-byte header: `PACK`, directory offset, directory size (u32 LE)
//! 2. Raw entry data, stored uncompressed
//! 3. A flat directory of 64-byte records: 56-byte NUL-padded name,
//!    data offset, data length (u32 LE)
//!
//! Names are `/` separated and case-sensitive. A name with no NUL inside
//! its 56-byte field uses the whole field.
//!
//! ## Limitations
//!
//! - No compression
//! - No writing or repacking

pub mod archive;
pub mod extractor;
pub mod index;
pub mod parser;
pub mod structures;

pub use archive::PakArchive;
pub use extractor::{PakExtractor, write_file_atomic};
pub use index::{EntryLocation, PakIndex};
pub use parser::PakParser;
pub use structures::*;
