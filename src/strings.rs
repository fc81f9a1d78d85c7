//! Localized string tables (`.strings`, `.dlstrings`, `.ilstrings`)
//!
//! ## Format Details
//!
//! - Header: `u32` count, `u32` size of the string data, then `count`
//!   directory entries of `(u32 id, u32 offset)`.
//! - Offsets are relative to the end of the directory.
//! - `.strings` entries are null terminated. `.dlstrings` and `.ilstrings`
//!   entries are a `u32` length followed by that many bytes, which include
//!   a trailing null.
//! - The kind of table is not stored in the file and comes from its
//!   extension.
//!
//! Text is decoded as UTF-8, falling back to Windows-1252 when the bytes are
//! not valid UTF-8. This is a heuristic: Windows-1252 text that happens to be
//! valid UTF-8 is decoded as UTF-8.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::common::Range;
use crate::error::{Error, Result};
use crate::io::{decode_text, needs_fallback, BinaryReader, BinaryWriter};

/// Encoding variant of a string table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringsKind {
    /// Null terminated entries
    Strings,
    /// Length prefixed entries
    DlStrings,
    /// Length prefixed entries
    IlStrings,
}

impl StringsKind {
    /// Pick the kind from a file extension, ignoring case
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "strings" => Some(Self::Strings),
            "dlstrings" => Some(Self::DlStrings),
            "ilstrings" => Some(Self::IlStrings),
            _ => None,
        }
    }

    pub fn is_length_prefixed(self) -> bool {
        matches!(self, Self::DlStrings | Self::IlStrings)
    }
}

/// Parsed string table header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringsHeader {
    pub count: u32,
    pub size: u32,
    /// `(id, offset)` pairs in file order
    pub directory: Vec<(u32, u32)>,
    pub range: Range,
}

/// A string table reader
pub struct StringTable<R> {
    reader: BinaryReader<R>,
    kind: StringsKind,
    header: StringsHeader,
    strings: Option<BTreeMap<u32, String>>,
}

impl StringTable<BufReader<File>> {
    /// Open a string table, taking its kind from the file extension
    ///
    /// # Example
    /// ```no_run
    /// use starhopper::StringTable;
    /// let mut table = StringTable::open("Starfield_en.strings")?;
    /// if let Some(text) = table.get(0x0001_0F2A)? {
    ///     println!("{}", text);
    /// }
    /// # Ok::<(), starhopper::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let kind = StringsKind::from_path(path)
            .ok_or_else(|| Error::UnsupportedVariant(format!("string table {}", path.display())))?;
        Self::open_as(path, kind)
    }

    /// Open a string table with an explicit kind
    pub fn open_as<P: AsRef<Path>>(path: P, kind: StringsKind) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), kind)
    }
}

impl<R: Read + Seek> StringTable<R> {
    /// Parse the header and directory; strings are decoded on first use
    pub fn new(stream: R, kind: StringsKind) -> Result<Self> {
        let mut reader = BinaryReader::new(stream)?;
        let header = Self::parse_header(&mut reader)?;
        debug!(count = header.count, ?kind, "parsed string table directory");

        Ok(Self {
            reader,
            kind,
            header,
            strings: None,
        })
    }

    fn parse_header(reader: &mut BinaryReader<R>) -> Result<StringsHeader> {
        let start = reader.pos();
        let count = reader.u32()?;
        let capacity = reader.capacity_for(count as u64, 8)?;
        reader.seek(start)?;

        let mut c = reader.capture();
        c.u32("count")?;
        let size = c.u32("size")?.get();

        let mut directory = Vec::with_capacity(capacity);
        for _ in 0..count {
            let id = c.u32("id")?.get();
            let offset = c.u32("offset")?.get();
            directory.push((id, offset));
        }

        let range = c.set("loc", c.range()).get();
        Ok(StringsHeader {
            count,
            size,
            directory,
            range,
        })
    }

    pub fn kind(&self) -> StringsKind {
        self.kind
    }

    pub fn header(&self) -> &StringsHeader {
        &self.header
    }

    /// The `id -> text` mapping, decoded on first use
    pub fn strings(&mut self) -> Result<&BTreeMap<u32, String>> {
        if self.strings.is_none() {
            let strings = self.decode_all()?;
            self.strings = Some(strings);
        }
        Ok(self.strings.get_or_insert_with(BTreeMap::new))
    }

    pub fn get(&mut self, id: u32) -> Result<Option<&str>> {
        Ok(self.strings()?.get(&id).map(String::as_str))
    }

    fn decode_all(&mut self) -> Result<BTreeMap<u32, String>> {
        let base = self.header.range.end();
        let mut strings = BTreeMap::new();

        for &(id, offset) in &self.header.directory {
            self.reader.seek(base + offset as u64)?;
            let mut bytes = if self.kind.is_length_prefixed() {
                let size = self.reader.u32()?;
                self.reader.read(size as u64)?
            } else {
                self.reader.cstring_bytes()?
            };
            if bytes.last() == Some(&0) {
                bytes.pop();
            }

            if needs_fallback(&bytes) {
                warn!(id, "string is not valid UTF-8, decoding as Windows-1252");
            }
            strings.insert(id, decode_text(&bytes));
        }

        Ok(strings)
    }
}

/// Windows-1252 when `legacy` is set and the text is representable in it,
/// UTF-8 otherwise
fn encode_text(text: &str, legacy: bool) -> Vec<u8> {
    if legacy {
        let (encoded, _, unmappable) = encoding_rs::WINDOWS_1252.encode(text);
        if !unmappable {
            return encoded.into_owned();
        }
    }
    text.as_bytes().to_vec()
}

/// Write a string table of the given kind.
///
/// Directory offsets and the size field are backpatched once the data they
/// describe has been written. Set `legacy_encoding` to store non-ASCII text
/// as Windows-1252 instead of UTF-8.
pub fn write_strings<W: Write + Seek>(
    writer: &mut BinaryWriter<W>,
    kind: StringsKind,
    strings: &BTreeMap<u32, String>,
    legacy_encoding: bool,
) -> Result<()> {
    let start = writer.pos();
    writer.u32(strings.len() as u32)?;
    let size_at = writer.pos();
    writer.u32(0)?;

    let mut offset_slots = Vec::with_capacity(strings.len());
    for &id in strings.keys() {
        writer.u32(id)?;
        offset_slots.push(writer.pos());
        writer.u32(0)?;
    }

    let data_start = writer.pos();
    for (slot, text) in offset_slots.into_iter().zip(strings.values()) {
        let offset = (writer.pos() - data_start) as u32;
        writer.patch_u32(slot, offset)?;

        let bytes = encode_text(text, legacy_encoding);
        if kind.is_length_prefixed() {
            writer.u32(bytes.len() as u32 + 1)?;
        }
        writer.cstring(&bytes)?;
    }

    let size = (writer.pos() - data_start) as u32;
    writer.patch_u32(size_at, size)?;
    debug!(count = strings.len(), size, start, "wrote string table");
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Cursor;

    fn sample() -> BTreeMap<u32, String> {
        let mut strings = BTreeMap::new();
        strings.insert(1, "Hello".to_string());
        strings.insert(7, "Café au lait".to_string());
        strings.insert(42, String::new());
        strings
    }

    fn round_trip(kind: StringsKind, legacy: bool) -> StringTable<Cursor<Vec<u8>>> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new())).unwrap();
        write_strings(&mut writer, kind, &sample(), legacy).unwrap();
        StringTable::new(Cursor::new(writer.into_inner().into_inner()), kind).unwrap()
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(StringsKind::from_path("a/Starfield_en.STRINGS"), Some(StringsKind::Strings));
        assert_eq!(StringsKind::from_path("x.dlstrings"), Some(StringsKind::DlStrings));
        assert_eq!(StringsKind::from_path("x.ilstrings"), Some(StringsKind::IlStrings));
        assert_eq!(StringsKind::from_path("x.txt"), None);
    }

    #[test]
    fn test_round_trip_all_kinds() {
        for kind in [StringsKind::Strings, StringsKind::DlStrings, StringsKind::IlStrings] {
            for legacy in [false, true] {
                let mut table = round_trip(kind, legacy);
                assert_eq!(table.header().count, 3);
                assert_eq!(table.strings().unwrap(), &sample());
            }
        }
    }

    #[test]
    fn test_size_field_covers_string_data() {
        let table = round_trip(StringsKind::Strings, false);
        // "Hello\0" + "Café au lait\0" (é is two bytes) + "\0"
        assert_eq!(table.header().size, 6 + 14 + 1);
        assert_eq!(table.header().range, Range::new(0, 8 + 3 * 8));
    }

    #[test]
    fn test_windows_1252_fallback() {
        // "Caf\xe9" is not UTF-8
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(9).unwrap();
        bytes.write_u32::<LittleEndian>(5).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(5).unwrap();
        bytes.extend_from_slice(b"Caf\xe9\0");

        let mut table = StringTable::new(Cursor::new(bytes), StringsKind::DlStrings).unwrap();
        assert_eq!(table.get(5).unwrap(), Some("Café"));
        assert_eq!(table.get(6).unwrap(), None);
    }

    #[test]
    fn test_offsets_are_relative_to_directory_end() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(2).unwrap();
        bytes.write_u32::<LittleEndian>(6).unwrap();
        bytes.write_u32::<LittleEndian>(10).unwrap();
        bytes.write_u32::<LittleEndian>(3).unwrap();
        bytes.write_u32::<LittleEndian>(20).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.extend_from_slice(b"ab\0cd\0");

        let mut table = StringTable::new(Cursor::new(bytes), StringsKind::Strings).unwrap();
        assert_eq!(table.get(10).unwrap(), Some("cd"));
        assert_eq!(table.get(20).unwrap(), Some("ab"));
    }

    #[test]
    fn test_truncated_directory() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(4).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();

        assert!(matches!(
            StringTable::new(Cursor::new(bytes), StringsKind::Strings),
            Err(Error::EndOfStream { .. })
        ));
    }

    #[test]
    fn test_huge_count_is_end_of_stream() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(u32::MAX).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();

        assert!(matches!(
            StringTable::new(Cursor::new(bytes), StringsKind::Strings),
            Err(Error::EndOfStream { .. })
        ));
    }
}
