//! CompiledDB (`.cdb`) structured database handling
//!
//! A compiled database is a serialization of engine data structures. Its
//! records are not understood beyond their type tag and size, but the
//! container itself round-trips.
//!
//! ## Format Details
//!
//! - Header: magic `BETH`, header size (always 8), version, record count.
//! - The stored record count is one more than the number of records that
//!   follow. Writers must keep this off-by-one.
//! - Record: 4 byte type tag, `u32` size, `size` bytes of payload.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::debug;

use crate::archive::{Archive, ArchiveEntry, EntryMeta};
use crate::common::Tag;
use crate::error::{Error, Result};
use crate::io::{BinaryReader, BinaryWriter};

/// File signature of a compiled database
pub const CDB_MAGIC: &[u8; 4] = b"BETH";

/// Size declared in every compiled database header
pub const CDB_HEADER_SIZE: u32 = 8;

/// Version written by [`CompiledDb::save`] when none is given
pub const DEFAULT_VERSION: u32 = 4;

/// One opaque record of a compiled database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdbRecord {
    pub tag: Tag,
    pub data: Vec<u8>,
}

impl CdbRecord {
    pub fn new(tag: Tag, data: Vec<u8>) -> Self {
        Self { tag, data }
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }
}

/// A parsed compiled database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledDb {
    pub version: u32,
    /// Record count as stored in the header, `records.len() + 1` when read
    pub record_count: u32,
    pub records: Vec<CdbRecord>,
}

impl CompiledDb {
    /// Load a compiled database from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    /// Parse a compiled database from a stream
    pub fn read_from<R: Read + Seek>(stream: R) -> Result<Self> {
        let mut reader = BinaryReader::new(stream)?;

        let mut header = reader.capture();
        header.magic("magic", CDB_MAGIC)?;
        header.u32("size")?.ensure_eq(CDB_HEADER_SIZE)?;
        let version = header.u32("version")?.get();
        let record_count = header.u32("record_count")?.get();

        let mut records = Vec::with_capacity(reader.capacity_for(record_count.saturating_sub(1) as u64, 8)?);
        for _ in 0..record_count.saturating_sub(1) {
            let mut record = reader.capture();
            let tag = Tag::from(record.array::<4>("type")?.get());
            let size = record.u32("size")?.get();
            let data = record.bytes("data", size as u64)?.get();
            records.push(CdbRecord { tag, data });
        }

        debug!(version, records = records.len(), "parsed compiled database");
        Ok(Self {
            version,
            record_count,
            records,
        })
    }

    /// Serialize with the given version.
    ///
    /// The record count is written as `records.len() + 1` and every record
    /// is emitted verbatim.
    pub fn save<W: Write + Seek>(&self, destination: W, version: u32) -> Result<()> {
        let mut writer = BinaryWriter::new(destination)?;
        writer
            .write(CDB_MAGIC)?
            .u32(CDB_HEADER_SIZE)?
            .u32(version)?
            .u32(self.records.len() as u32 + 1)?;

        for record in &self.records {
            writer.write(record.tag.as_bytes())?.u32(record.size())?.write(&record.data)?;
        }
        writer.flush()
    }

    fn entry_name(index: usize, tag: Tag) -> String {
        format!("{:05}.{}", index, tag)
    }
}

/// Records are exposed as entries named `{index}.{TAG}`.
impl Archive for CompiledDb {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        Ok(self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| ArchiveEntry {
                path: Self::entry_name(index, record.tag),
                size: record.data.len() as u64,
                index,
                meta: EntryMeta::Record { tag: record.tag },
            })
            .collect())
    }

    fn open(&mut self, entry: &ArchiveEntry) -> Result<Box<dyn Read + '_>> {
        let record = self
            .records
            .get(entry.index)
            .ok_or_else(|| Error::NotFound(entry.path.clone()))?;
        Ok(Box::new(Cursor::new(record.data.as_slice())))
    }

    /// `path` must end in a four character record tag, e.g. `STRT` or
    /// `00003.STRT`. The record is appended.
    fn add(&mut self, path: &str, content: Vec<u8>) -> Result<()> {
        let tag_text = path.rsplit('.').next().unwrap_or(path);
        let tag = Tag::parse(tag_text).ok_or_else(|| Error::Validation {
            field: "type",
            value: path.to_string(),
        })?;
        self.records.push(CdbRecord::new(tag, content));
        Ok(())
    }

    fn remove(&mut self, entry: &ArchiveEntry) -> Result<()> {
        if entry.index >= self.records.len() {
            return Err(Error::NotFound(entry.path.clone()));
        }
        self.records.remove(entry.index);
        Ok(())
    }

    fn save(&mut self, out: &mut dyn Write) -> Result<()> {
        let mut buffer = Cursor::new(Vec::new());
        CompiledDb::save(self, &mut buffer, self.version)?;
        out.write_all(buffer.get_ref())?;
        Ok(())
    }
}
