//! Little-endian writer with position tracking for backpatching

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};

use crate::error::Result;

/// Writing counterpart of [`BinaryReader`](super::BinaryReader).
///
/// Methods return `&mut Self` so fixed layouts can be written as a chain.
/// `seek` is absolute and is used to go back and patch sizes and offsets
/// that are only known after the data they describe has been written.
pub struct BinaryWriter<W> {
    inner: W,
    pos: u64,
}

impl<W: Write + Seek> BinaryWriter<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self { inner, pos })
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn seek(&mut self, offset: u64) -> Result<&mut Self> {
        self.pos = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(self)
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.inner.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(self)
    }

    pub fn u8(&mut self, value: u8) -> Result<&mut Self> {
        self.inner.write_u8(value)?;
        self.pos += 1;
        Ok(self)
    }

    pub fn u16(&mut self, value: u16) -> Result<&mut Self> {
        self.inner.write_u16::<LittleEndian>(value)?;
        self.pos += 2;
        Ok(self)
    }

    pub fn u32(&mut self, value: u32) -> Result<&mut Self> {
        self.inner.write_u32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(self)
    }

    pub fn u64(&mut self, value: u64) -> Result<&mut Self> {
        self.inner.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(self)
    }

    pub fn i32(&mut self, value: i32) -> Result<&mut Self> {
        self.inner.write_i32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(self)
    }

    pub fn f32(&mut self, value: f32) -> Result<&mut Self> {
        self.inner.write_f32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(self)
    }

    /// Write `bytes` followed by a null terminator
    pub fn cstring(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.write(bytes)?.u8(0)
    }

    /// Overwrite a `u32` at `offset`, then return to the current position
    pub fn patch_u32(&mut self, offset: u64, value: u32) -> Result<&mut Self> {
        let resume = self.pos;
        self.seek(offset)?.u32(value)?.seek(resume)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
