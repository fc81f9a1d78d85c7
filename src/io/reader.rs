//! Seekable little-endian cursor

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

use super::capture::Capture;
use super::decode_text;
use crate::error::{Error, Result};

/// A cursor over a seekable byte stream.
///
/// `pos` always mirrors the real position of the underlying stream. Every
/// primitive read advances it by exactly the width of the type, and a read
/// that cannot be fully satisfied fails with [`Error::EndOfStream`] instead
/// of returning a partial value.
pub struct BinaryReader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Wrap a stream, starting at its current position
    pub fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self { inner, pos })
    }

    /// Current absolute position in the stream
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Total length of the underlying stream
    pub fn stream_len(&mut self) -> Result<u64> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(self.pos))?;
        Ok(len)
    }

    /// Capacity for `count` items of at least `width` bytes each, bounded by
    /// what is left in the stream.
    pub fn capacity_for(&mut self, count: u64, width: u64) -> Result<usize> {
        let remaining = self.stream_len()?.saturating_sub(self.pos);
        Ok(count.min(remaining / width.max(1)) as usize)
    }

    /// Seek to an absolute offset
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Move forward by `count` bytes without reading them
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.seek(self.pos + count)
    }

    /// Open a capture anchored at the current position
    pub fn capture(&mut self) -> Capture<'_, R> {
        Capture::new(self)
    }

    /// Read exactly `size` bytes
    pub fn read(&mut self, size: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let got = (&mut self.inner).take(size).read_to_end(&mut buf)? as u64;
        if got < size {
            let offset = self.pos;
            self.resync()?;
            return Err(Error::EndOfStream {
                offset,
                wanted: size,
            });
        }
        self.pos += size;
        Ok(buf)
    }

    /// Read exactly `N` bytes into an array
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.primitive(N as u64, |r| r.read_exact(&mut buf))?;
        Ok(buf)
    }

    /// Read `size` bytes without consuming them
    pub fn peek(&mut self, size: u64) -> Result<Vec<u8>> {
        let start = self.pos;
        let bytes = self.read(size)?;
        self.seek(start)?;
        Ok(bytes)
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.primitive(1, |r| r.read_u8())
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.primitive(2, |r| r.read_u16::<LittleEndian>())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.primitive(4, |r| r.read_u32::<LittleEndian>())
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.primitive(8, |r| r.read_u64::<LittleEndian>())
    }

    pub fn i8(&mut self) -> Result<i8> {
        self.primitive(1, |r| r.read_i8())
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.primitive(2, |r| r.read_i16::<LittleEndian>())
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.primitive(4, |r| r.read_i32::<LittleEndian>())
    }

    pub fn i64(&mut self) -> Result<i64> {
        self.primitive(8, |r| r.read_i64::<LittleEndian>())
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.primitive(4, |r| r.read_f32::<LittleEndian>())
    }

    pub fn f64(&mut self) -> Result<f64> {
        self.primitive(8, |r| r.read_f64::<LittleEndian>())
    }

    /// IEEE 754 half precision float, widened to `f32`
    pub fn half(&mut self) -> Result<f32> {
        let bits = self.u16()?;
        Ok(half::f16::from_bits(bits).to_f32())
    }

    /// Read `size` bytes and decode them as text
    pub fn string(&mut self, size: u64) -> Result<String> {
        let bytes = self.read(size)?;
        Ok(decode_text(&bytes))
    }

    /// Read bytes up to a null terminator; the terminator is consumed but
    /// not returned
    pub fn cstring_bytes(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            match self.u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(bytes)
    }

    /// Read a null terminated string
    pub fn cstring(&mut self) -> Result<String> {
        let bytes = self.cstring_bytes()?;
        Ok(decode_text(&bytes))
    }

    /// Copy exactly `size` bytes from the current position into `out`
    pub fn copy_to<W: Write>(&mut self, size: u64, out: &mut W) -> Result<u64> {
        let copied = io::copy(&mut (&mut self.inner).take(size), out)?;
        if copied < size {
            let offset = self.pos;
            self.resync()?;
            return Err(Error::EndOfStream {
                offset,
                wanted: size,
            });
        }
        self.pos += size;
        Ok(copied)
    }

    fn primitive<T>(&mut self, width: u64, read: impl FnOnce(&mut R) -> io::Result<T>) -> Result<T> {
        match read(&mut self.inner) {
            Ok(value) => {
                self.pos += width;
                Ok(value)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                let offset = self.pos;
                self.resync()?;
                Err(Error::EndOfStream {
                    offset,
                    wanted: width,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A failed read may have consumed part of the stream
    fn resync(&mut self) -> Result<()> {
        self.pos = self.inner.stream_position()?;
        Ok(())
    }
}
