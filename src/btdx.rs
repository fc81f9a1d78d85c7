//! BTDX (`.ba2`) package container handling
//!
//! BA2 archives hold the loose files of the game (meshes, scripts,
//! interface data) in a flat index with optional per-entry compression.
//!
//! ## Format Details
//!
//! - Header: magic `BTDX`, version (1-3), 4 byte kind, file count, absolute
//!   offset of the name table. Versions 2 and 3 carry two extra reserved
//!   `u32`s, version 3 one more.
//! - Name table: one `u16` length-prefixed path per file, in index order.
//! - File index (kind `GNRL` only), directly after the header: hash,
//!   extension, directory hash, flags, `u64` data offset, packed size,
//!   unpacked size, sentinel.
//! - A packed size of zero means the data is stored as-is; otherwise it is a
//!   zlib stream or LZ4 data that must inflate to exactly the unpacked size.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::archive::{prepare_destination, Archive, ArchiveEntry, EntryMeta};
use crate::common::Range;
use crate::compression::decompress_block;
use crate::error::{Error, Result};
use crate::io::{decode_text, BinaryReader};

/// File signature of every BA2 archive
pub const BTDX_MAGIC: &[u8; 4] = b"BTDX";

/// The only archive kind whose file index is understood
pub const GENERAL_KIND: &str = "GNRL";

/// Parsed BA2 header
#[derive(Debug, Clone, PartialEq)]
pub struct BtdxHeader {
    pub version: u32,
    /// Archive kind, right-trimmed (`GNRL`, `DX10`, ...)
    pub kind: String,
    pub file_count: u32,
    pub names_offset: u64,
    pub range: Range,
}

impl BtdxHeader {
    pub fn is_general(&self) -> bool {
        self.kind == GENERAL_KIND
    }
}

/// An entry of a `GNRL` archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralFile {
    pub hash: u32,
    pub extension: String,
    pub directory_hash: u32,
    /// Absolute offset of the entry's data
    pub offset: u64,
    /// Size of the stored data, zero when stored uncompressed
    pub packed_size: u32,
    pub unpacked_size: u32,
    pub path: String,
    /// Where the index record itself lives
    pub range: Range,
}

impl GeneralFile {
    pub fn is_compressed(&self) -> bool {
        self.packed_size != 0
    }

    /// Bytes occupied in the archive
    pub fn stored_size(&self) -> u64 {
        if self.is_compressed() {
            self.packed_size as u64
        } else {
            self.unpacked_size as u64
        }
    }
}

/// A BA2 archive reader
pub struct BtdxArchive<R> {
    reader: BinaryReader<R>,
    header: BtdxHeader,
    name_table: Vec<String>,
    files: Option<Vec<GeneralFile>>,
}

impl BtdxArchive<BufReader<File>> {
    /// Open a BA2 file for reading
    ///
    /// # Example
    /// ```no_run
    /// use starhopper::BtdxArchive;
    /// let mut ba2 = BtdxArchive::open("Starfield - Interface.ba2")?;
    /// for file in ba2.files()? {
    ///     println!("{}", file.path);
    /// }
    /// # Ok::<(), starhopper::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> BtdxArchive<R> {
    /// Parse the header and name table of an archive stream
    pub fn new(stream: R) -> Result<Self> {
        let mut reader = BinaryReader::new(stream)?;
        let header = Self::parse_header(&mut reader)?;
        debug!(
            version = header.version,
            kind = %header.kind,
            file_count = header.file_count,
            "parsed BTDX header"
        );
        let name_table = Self::parse_name_table(&mut reader, &header)?;

        Ok(Self {
            reader,
            header,
            name_table,
            files: None,
        })
    }

    fn parse_header(reader: &mut BinaryReader<R>) -> Result<BtdxHeader> {
        let mut c = reader.capture();
        c.magic("file_id", BTDX_MAGIC)?;
        let version = c.u32("version")?.ensure(|v| (1..=3).contains(v))?.get();
        let kind = c
            .string("type", 4)?
            .change(|t| t.trim_end_matches(|ch: char| ch.is_whitespace() || ch == '\0').to_string())
            .get();
        let file_count = c.u32("file_count")?.get();
        let names_offset = c.u64("names_offset")?.get();

        if version >= 2 {
            c.u32("unknown_1")?;
            c.u32("unknown_2")?;
        }
        if version == 3 {
            c.u32("unknown_3")?;
        }

        let range = c.set("loc", c.range()).get();
        Ok(BtdxHeader {
            version,
            kind,
            file_count,
            names_offset,
            range,
        })
    }

    /// Reads the path of every file, then returns the cursor to the end of
    /// the header, where the file index starts.
    fn parse_name_table(reader: &mut BinaryReader<R>, header: &BtdxHeader) -> Result<Vec<String>> {
        reader.seek(header.names_offset)?;
        let mut names = Vec::with_capacity(reader.capacity_for(header.file_count as u64, 2)?);
        for _ in 0..header.file_count {
            let len = reader.u16()?;
            let bytes = reader.read(len as u64)?;
            names.push(decode_text(&bytes));
        }
        reader.seek(header.range.end())?;
        Ok(names)
    }

    pub fn header(&self) -> &BtdxHeader {
        &self.header
    }

    pub fn name_table(&self) -> &[String] {
        &self.name_table
    }

    /// The file index, parsed on first use.
    ///
    /// Archives of a kind other than `GNRL` have no readable index and
    /// enumerate as empty.
    pub fn files(&mut self) -> Result<&[GeneralFile]> {
        if self.files.is_none() {
            let files = if self.header.is_general() {
                self.parse_files()?
            } else {
                warn!(kind = %self.header.kind, "unsupported BTDX kind, no entries enumerated");
                Vec::new()
            };
            self.files = Some(files);
        }
        Ok(self.files.as_deref().unwrap_or_default())
    }

    fn parse_files(&mut self) -> Result<Vec<GeneralFile>> {
        self.reader.seek(self.header.range.end())?;
        let mut files = Vec::with_capacity(self.reader.capacity_for(self.header.file_count as u64, 36)?);

        for index in 0..self.header.file_count as usize {
            let mut c = self.reader.capture();
            let hash = c.u32("hash")?.get();
            let extension = c
                .string("ext", 4)?
                .change(|t| t.trim_end_matches(|ch: char| ch.is_whitespace() || ch == '\0').to_string())
                .get();
            let directory_hash = c.u32("directory_hash")?.get();
            c.u32("unknown_0")?;
            let offset = c.u64("offset")?.get();
            let packed_size = c.u32("packed_size")?.get();
            let unpacked_size = c.u32("unpacked_size")?.get();
            c.u32("unknown_1")?;
            let range = c.set("loc", c.range()).get();

            files.push(GeneralFile {
                hash,
                extension,
                directory_hash,
                offset,
                packed_size,
                unpacked_size,
                path: self.name_table.get(index).cloned().unwrap_or_default(),
                range,
            });
        }

        debug!(count = files.len(), "parsed BTDX file index");
        Ok(files)
    }

    /// Find a file by its path within the archive
    pub fn find(&mut self, path: &str) -> Result<GeneralFile> {
        self.files()?
            .iter()
            .find(|f| f.path == path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    /// Read and, if needed, decompress a file's content
    pub fn read_file(&mut self, file: &GeneralFile) -> Result<Vec<u8>> {
        self.reader.seek(file.offset)?;
        if !file.is_compressed() {
            return self.reader.read(file.unpacked_size as u64);
        }

        let packed = self.reader.read(file.packed_size as u64)?;
        decompress_block(&packed, file.unpacked_size as usize).map_err(|e| match e {
            Error::CorruptData(msg) => Error::CorruptData(format!("{}: {}", file.path, msg)),
            other => other,
        })
    }

    fn file_at(&mut self, index: usize) -> Result<GeneralFile> {
        self.files()?
            .get(index)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("entry #{}", index)))
    }
}

impl<R: Read + Seek> Archive for BtdxArchive<R> {
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        Ok(self
            .files()?
            .iter()
            .enumerate()
            .map(|(index, file)| ArchiveEntry {
                path: file.path.clone(),
                size: file.unpacked_size as u64,
                index,
                meta: EntryMeta::Package {
                    hash: file.hash,
                    extension: file.extension.clone(),
                    directory_hash: file.directory_hash,
                    packed_size: file.packed_size,
                },
            })
            .collect())
    }

    fn open(&mut self, entry: &ArchiveEntry) -> Result<Box<dyn Read + '_>> {
        let file = self.file_at(entry.index)?;
        let data = self.read_file(&file)?;
        Ok(Box::new(Cursor::new(data)))
    }

    /// Stored entries are streamed straight to disk without buffering
    /// the whole file.
    fn extract_into(&mut self, entry: &ArchiveEntry, directory: &Path, overwrite: bool) -> Result<PathBuf> {
        let file = self.file_at(entry.index)?;
        let final_path = prepare_destination(directory, &entry.path, overwrite)?;

        let mut out = BufWriter::new(File::create(&final_path)?);
        if file.is_compressed() {
            let data = self.read_file(&file)?;
            std::io::Write::write_all(&mut out, &data)?;
        } else {
            self.reader.seek(file.offset)?;
            self.reader.copy_to(file.unpacked_size as u64, &mut out)?;
        }
        std::io::Write::flush(&mut out)?;

        Ok(final_path)
    }
}
