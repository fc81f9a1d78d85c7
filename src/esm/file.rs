use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;

use super::{Field, Group, Record, RecordFlags, Unit, ESCAPE_TAG, GROUP_TAG, HEADER_TAG};
use crate::common::{Range, Tag};
use crate::compression::inflate_exact;
use crate::error::{Error, Result};
use crate::io::BinaryReader;

/// An ESM file reader.
///
/// Seeks are shared state on the underlying stream: to walk two parts of
/// the same file independently, open it twice.
pub struct EsmFile<R> {
    reader: BinaryReader<R>,
    header: Record,
    units: Option<Vec<Unit>>,
}

impl EsmFile<BufReader<File>> {
    /// Open an ESM file and parse its header
    ///
    /// # Example
    /// ```no_run
    /// use starhopper::esm::{EsmFile, Unit};
    /// let mut esm = EsmFile::open("Starfield.esm")?;
    /// for unit in esm.units()?.to_vec() {
    ///     if let Unit::Group(group) = unit {
    ///         println!("{}", group.display_label());
    ///     }
    /// }
    /// # Ok::<(), starhopper::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> EsmFile<R> {
    pub fn new(stream: R) -> Result<Self> {
        let mut reader = BinaryReader::new(stream)?;
        let header = parse_header(&mut reader)?;
        debug!(version = header.version, size = header.size, "parsed ESM header");
        reader.seek(header.range.end())?;

        Ok(Self {
            reader,
            header,
            units: None,
        })
    }

    /// The `TES4` header record. Its fields are read like any other record.
    pub fn header(&self) -> &Record {
        &self.header
    }

    /// The top level groups and records, parsed on first use
    pub fn units(&mut self) -> Result<&[Unit]> {
        if self.units.is_none() {
            let start = self.header.range.end();
            let end = self.reader.stream_len()?;
            let units = Children::new(self, start, end).collect::<Result<Vec<_>>>()?;
            debug!(count = units.len(), "parsed ESM top level");
            self.units = Some(units);
        }
        Ok(self.units.as_deref().unwrap_or_default())
    }

    /// Iterate over the direct children of a group
    pub fn children(&mut self, group: &Group) -> Children<'_, R> {
        let (start, end) = (group.body_start(), group.range.end());
        Children::new(self, start, end)
    }

    /// Iterate over the fields of a record, inflating the body first if the
    /// record is compressed
    pub fn fields(&mut self, record: &Record) -> Result<Fields<'_, R>> {
        self.reader.seek(record.body_start())?;

        if !record.is_compressed() {
            return Ok(Fields {
                source: FieldSource::Stream(&mut self.reader),
                end: record.range.end(),
                done: false,
            });
        }

        let body = self.inflate_body(record)?;
        let end = body.len() as u64;
        Ok(Fields {
            source: FieldSource::Buffer(BinaryReader::new(Cursor::new(body))?),
            end,
            done: false,
        })
    }

    /// The whole field area of a record, decompressed if needed
    pub fn payload(&mut self, record: &Record) -> Result<Vec<u8>> {
        self.reader.seek(record.body_start())?;
        if record.is_compressed() {
            self.inflate_body(record)
        } else {
            self.reader.read(record.size as u64)
        }
    }

    /// Expects the reader at the record body
    fn inflate_body(&mut self, record: &Record) -> Result<Vec<u8>> {
        let decompressed_size = self.reader.u32()?;
        let packed_size = record.size.checked_sub(4).ok_or(Error::Validation {
            field: "size",
            value: record.size.to_string(),
        })?;
        let packed = self.reader.read(packed_size as u64)?;
        inflate_exact(&packed, decompressed_size as usize)
    }

    /// Parse the group or record at `offset`
    pub fn unit_at(&mut self, offset: u64) -> Result<Unit> {
        self.reader.seek(offset)?;
        let tag = self.reader.peek(4)?;
        if tag == GROUP_TAG.as_bytes() {
            Ok(Unit::Group(parse_group(&mut self.reader)?))
        } else {
            Ok(Unit::Record(parse_record(&mut self.reader)?))
        }
    }

    /// Current position of the underlying stream
    pub fn pos(&self) -> u64 {
        self.reader.pos()
    }
}

/// Children of a group or of the file, parsed one at a time.
///
/// Each child is skipped using its declared size whether or not its body
/// was read. Once exhausted, the stream is left at the end of the parent.
pub struct Children<'a, R> {
    file: &'a mut EsmFile<R>,
    next: u64,
    end: u64,
    done: bool,
}

impl<'a, R: Read + Seek> Children<'a, R> {
    fn new(file: &'a mut EsmFile<R>, start: u64, end: u64) -> Self {
        Self {
            file,
            next: start,
            end,
            done: false,
        }
    }

    fn advance(&mut self) -> Result<Option<Unit>> {
        if self.next >= self.end {
            self.file.reader.seek(self.end)?;
            return Ok(None);
        }

        let unit = self.file.unit_at(self.next)?;
        let unit_end = unit.range().end();
        if unit_end <= self.next {
            return Err(Error::CorruptData(format!(
                "{} at {:#x} declares an empty range",
                unit.tag(),
                self.next
            )));
        }

        self.next = unit_end;
        self.file.reader.seek(unit_end)?;
        Ok(Some(unit))
    }
}

impl<R: Read + Seek> Iterator for Children<'_, R> {
    type Item = Result<Unit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(unit)) => Some(Ok(unit)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

enum FieldSource<'a, R> {
    Stream(&'a mut BinaryReader<R>),
    Buffer(BinaryReader<Cursor<Vec<u8>>>),
}

/// Fields of one record, read lazily
pub struct Fields<'a, R> {
    source: FieldSource<'a, R>,
    end: u64,
    done: bool,
}

impl<R: Read + Seek> Iterator for Fields<'_, R> {
    type Item = Result<Field>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match &mut self.source {
            FieldSource::Stream(reader) if reader.pos() < self.end => parse_field(&mut **reader),
            FieldSource::Buffer(reader) if reader.pos() < self.end => parse_field(reader),
            _ => {
                self.done = true;
                return None;
            }
        };

        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

fn parse_header<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Record> {
    let mut c = reader.capture();
    let tag = Tag::from(c.magic("type", HEADER_TAG.as_bytes())?);
    let size = c.u32("size")?.get();
    let flags = c.u32("flags")?.change(RecordFlags::from_bits_retain).get();
    let form_id = c.u32("form_id")?.ensure_eq(0)?.get();
    let revision = c.u32("revision")?.get();
    let version = c.u16("version")?.get();
    c.skip(2)?;
    let range = c.set("loc", Range::sized(c.start_pos(), size as u64 + 24)).get();

    Ok(Record {
        tag,
        size,
        flags,
        form_id,
        revision,
        version,
        range,
    })
}

fn parse_group<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Group> {
    let mut c = reader.capture();
    let tag = Tag::from(c.array::<4>("type")?.get());
    let size = c.u32("size")?.get();
    let label = c.array::<4>("label")?.get();
    let group_type = c.u32("group_type")?.get();
    c.skip(2)?;
    c.skip(2)?;
    let version = c.u16("version")?.get();
    c.skip(2)?;
    let range = c.set("loc", Range::sized(c.start_pos(), size as u64)).get();

    Ok(Group {
        tag,
        size,
        label,
        group_type,
        version,
        range,
    })
}

fn parse_record<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Record> {
    let mut c = reader.capture();
    let tag = Tag::from(c.array::<4>("type")?.get());
    let size = c.u32("size")?.get();
    let flags = c.u32("flags")?.change(RecordFlags::from_bits_retain).get();
    let form_id = c.u32("form_id")?.get();
    let revision = c.u32("revision")?.get();
    let version = c.u16("version")?.get();
    c.skip(2)?;
    let range = c.set("loc", Range::sized(c.start_pos(), size as u64 + 24)).get();

    Ok(Record {
        tag,
        size,
        flags,
        form_id,
        revision,
        version,
        range,
    })
}

/// Read one field. An `XXXX` field is folded into the field it announces.
fn parse_field<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Field> {
    let mut c = reader.capture();
    let mut tag = Tag::from(c.array::<4>("type")?.get());
    let mut size = c.u16("size")?.get() as u32;

    if tag == ESCAPE_TAG {
        size = c.u32("size")?.get();
        tag = Tag::from(c.array::<4>("type")?.get());
        c.skip(2)?;
    }

    let data = if size == 0 {
        c.set("data", Vec::new()).get()
    } else {
        c.bytes("data", size as u64)?.get()
    };

    Ok(Field { tag, size, data })
}
