//! # starhopper
//!
//! A Rust library for reading Bethesda game data containers.
//!
//! ## Overview
//!
//! Starfield ships its data in a handful of undocumented binary formats.
//! This library decodes them into lazily materialized structures:
//!
//! - BA2 (`BTDX`) package archives, with zlib and LZ4 compressed entries
//! - ESM plugins: nested groups, records and fields, with compressed records
//!   and a registry of high level record decoders
//! - Localized string tables (`.strings`, `.dlstrings`, `.ilstrings`),
//!   readable and writable
//! - CompiledDB (`.cdb`) databases, readable and writable
//! - `.mesh` geometry, with Wavefront OBJ export
//!
//! Every format is read through [`io::BinaryReader`], a little-endian cursor
//! that reports truncated input as [`Error::EndOfStream`].
//!
//! ## Example - Reading an archive
//!
//! ```rust,no_run
//! use starhopper::{Archive, BtdxArchive};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut ba2 = BtdxArchive::open("Starfield - Interface.ba2")?;
//!
//!     // List all entries
//!     for entry in ba2.entries()? {
//!         println!("{} ({} bytes)", entry.path, entry.size);
//!     }
//!
//!     // Read a specific file
//!     let file = ba2.find("interface\\fontconfig.txt")?;
//!     let data = ba2.read_file(&file)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Example - Walking a plugin
//!
//! ```rust,no_run
//! use starhopper::esm::{EsmFile, Unit};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut esm = EsmFile::open("Starfield.esm")?;
//!
//!     for unit in esm.units()?.to_vec() {
//!         if let Unit::Group(group) = unit {
//!             let count = esm.children(&group).count();
//!             println!("{}: {} children", group.display_label(), count);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod btdx;
pub mod btdx_utils;
pub mod cdb;
pub mod common;
pub mod compression;
pub mod error;
pub mod esm;
pub mod io;
pub mod mesh;
pub mod strings;
pub mod utils;

pub use archive::{Archive, ArchiveEntry, EntryMeta};
pub use btdx::{BtdxArchive, BtdxHeader, GeneralFile};
pub use cdb::{CdbRecord, CompiledDb};
pub use common::{Range, Tag};
pub use error::{Error, Result};
pub use esm::EsmFile;
pub use mesh::{Mesh, MeshBuffer, MeshFile};
pub use strings::{StringTable, StringsKind};
pub use utils::{create_glob_matcher, format_size, matches_filter};
