//! Small value types shared by every container format

use std::fmt;

/// Location of a decoded unit within its source stream.
///
/// `start` is inclusive and `end` exclusive. A `Range` is attached to every
/// header, group, record and table entry so callers can re-seek to it or
/// skip past it without decoding the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    start: u64,
    end: u64,
}

impl Range {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(end >= start, "range end {} before start {}", end, start);
        Self {
            start,
            end: end.max(start),
        }
    }

    /// A range of `size` bytes beginning at `start`
    pub fn sized(start: u64, size: u64) -> Self {
        Self::new(start, start + size)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}..0x{:08X} ({} bytes)", self.start, self.end, self.size())
    }
}

/// A four byte identifier such as `GRUP`, `EDID` or `BETH`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Tag(*bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Parse a tag from the first four bytes of `s`
    pub fn parse(s: &str) -> Option<Self> {
        let bytes: [u8; 4] = s.as_bytes().try_into().ok()?;
        Some(Tag(bytes))
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Tag(bytes)
    }
}

impl PartialEq<[u8; 4]> for Tag {
    fn eq(&self, other: &[u8; 4]) -> bool {
        &self.0 == other
    }
}

impl PartialEq<&[u8; 4]> for Tag {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_size() {
        let range = Range::new(24, 124);
        assert_eq!(range.size(), 100);
        assert!(range.contains(24));
        assert!(!range.contains(124));
        assert_eq!(Range::sized(8, 4), Range::new(8, 12));
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(Tag::new(b"GRUP").to_string(), "GRUP");
        assert_eq!(Tag([b'A', 0, b'B', b'C']).to_string(), "A\\x00BC");
        assert_eq!(Tag::parse("EDID"), Some(Tag::new(b"EDID")));
        assert_eq!(Tag::parse("EDI"), None);
    }
}
