//! Named field capture over a [`BinaryReader`]
//!
//! A capture is opened at the start of a structure and reads it field by
//! field. Each read is recorded under a name together with the bytes it
//! occupied, and hands back a [`Captured`] value that can be validated with
//! [`Captured::ensure`] or re-interpreted with [`Captured::change`] before
//! being moved into the caller's typed struct:
//!
//! ```rust
//! use std::io::Cursor;
//! use starhopper::io::BinaryReader;
//!
//! let mut reader = BinaryReader::new(Cursor::new(b"BETH\x08\x00\x00\x00".to_vec()))?;
//! let mut c = reader.capture();
//! c.magic("magic", b"BETH")?;
//! let size = c.u32("size")?.ensure_eq(8)?.get();
//! assert_eq!(size, 8);
//! assert_eq!(c.range().size(), 8);
//! # Ok::<(), starhopper::Error>(())
//! ```

use std::fmt::Debug;
use std::io::{Read, Seek};

use super::reader::BinaryReader;
use crate::common::Range;
use crate::error::{Error, Result};

/// Where a named field was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpan {
    pub name: &'static str,
    pub range: Range,
    /// Set for values injected with [`Capture::set`] rather than read
    pub computed: bool,
}

/// A value that was just read by a [`Capture`]
#[derive(Debug, Clone, PartialEq)]
pub struct Captured<V> {
    name: &'static str,
    value: V,
}

impl<V> Captured<V> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn get(self) -> V {
        self.value
    }

    /// Replace the value with `transform(value)`
    pub fn change<W>(self, transform: impl FnOnce(V) -> W) -> Captured<W> {
        Captured {
            name: self.name,
            value: transform(self.value),
        }
    }
}

impl<V: Debug> Captured<V> {
    /// Fail with a validation error unless `predicate` holds
    pub fn ensure(self, predicate: impl FnOnce(&V) -> bool) -> Result<Self> {
        if predicate(&self.value) {
            Ok(self)
        } else {
            Err(Error::Validation {
                field: self.name,
                value: format!("{:?}", self.value),
            })
        }
    }

    /// Fail with a validation error unless the value equals `expected`
    pub fn ensure_eq(self, expected: V) -> Result<Self>
    where
        V: PartialEq,
    {
        self.ensure(|v| *v == expected)
    }
}

/// Scoped, named reads over a cursor.
///
/// `start_pos` is fixed when the capture is opened and is the origin for
/// [`Capture::seek`] and [`Capture::range`].
pub struct Capture<'r, R> {
    reader: &'r mut BinaryReader<R>,
    start_pos: u64,
    layout: Vec<FieldSpan>,
}

macro_rules! capture_primitive {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self, name: &'static str) -> Result<Captured<$ty>> {
                self.read_field(name, |r| r.$name())
            }
        )*
    };
}

impl<'r, R: Read + Seek> Capture<'r, R> {
    pub(crate) fn new(reader: &'r mut BinaryReader<R>) -> Self {
        let start_pos = reader.pos();
        Self {
            reader,
            start_pos,
            layout: Vec::new(),
        }
    }

    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    /// Current absolute position of the underlying cursor
    pub fn pos(&self) -> u64 {
        self.reader.pos()
    }

    /// Bytes consumed since the capture was opened
    pub fn range(&self) -> Range {
        Range::new(self.start_pos, self.reader.pos())
    }

    /// Direct access to the cursor for reads that should not be recorded
    pub fn reader(&mut self) -> &mut BinaryReader<R> {
        self.reader
    }

    capture_primitive!(
        u8: u8,
        u16: u16,
        u32: u32,
        u64: u64,
        i8: i8,
        i16: i16,
        i32: i32,
        i64: i64,
        f32: f32,
        f64: f64,
        half: f32,
        cstring: String,
    );

    pub fn bytes(&mut self, name: &'static str, size: u64) -> Result<Captured<Vec<u8>>> {
        self.read_field(name, |r| r.read(size))
    }

    pub fn array<const N: usize>(&mut self, name: &'static str) -> Result<Captured<[u8; N]>> {
        self.read_field(name, |r| r.array::<N>())
    }

    pub fn string(&mut self, name: &'static str, size: u64) -> Result<Captured<String>> {
        self.read_field(name, |r| r.string(size))
    }

    /// Read a fixed magic number, failing with [`Error::BadMagic`] on mismatch
    pub fn magic<const N: usize>(&mut self, name: &'static str, expected: &[u8; N]) -> Result<[u8; N]> {
        let found = self.array::<N>(name)?.get();
        if &found != expected {
            return Err(Error::BadMagic {
                expected: String::from_utf8_lossy(expected).into_owned(),
                found: String::from_utf8_lossy(&found).into_owned(),
            });
        }
        Ok(found)
    }

    /// Record a computed value that was not read from the stream
    pub fn set<V>(&mut self, name: &'static str, value: V) -> Captured<V> {
        let here = self.reader.pos();
        self.layout.push(FieldSpan {
            name,
            range: Range::new(here, here),
            computed: true,
        });
        Captured { name, value }
    }

    pub fn skip(&mut self, count: u64) -> Result<&mut Self> {
        self.reader.skip(count)?;
        Ok(self)
    }

    /// Seek relative to the start of the capture, not the stream
    pub fn seek(&mut self, offset: u64) -> Result<&mut Self> {
        self.reader.seek(self.start_pos + offset)?;
        Ok(self)
    }

    /// Fields captured so far, in read order
    pub fn fields(&self) -> &[FieldSpan] {
        &self.layout
    }

    pub fn into_layout(self) -> Vec<FieldSpan> {
        self.layout
    }

    fn read_field<V>(
        &mut self,
        name: &'static str,
        read: impl FnOnce(&mut BinaryReader<R>) -> Result<V>,
    ) -> Result<Captured<V>> {
        let start = self.reader.pos();
        let value = read(self.reader)?;
        self.layout.push(FieldSpan {
            name,
            range: Range::new(start, self.reader.pos()),
            computed: false,
        });
        Ok(Captured { name, value })
    }
}
