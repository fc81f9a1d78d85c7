//! World data (`.esm`) files
//!
//! An ESM file is a `TES4` header record followed by a run of groups and
//! records. Groups nest further groups and records; records hold fields.
//!
//! ## Format Details
//!
//! - Record header (24 bytes): tag, `u32` size of the body, `u32` flags,
//!   form id, revision, `u16` version, 2 reserved bytes. The record spans
//!   `size + 24` bytes.
//! - Group header (24 bytes): `GRUP`, `u32` size *including* the header,
//!   4 byte label, `u32` group type, 4 reserved bytes, `u16` version,
//!   2 reserved bytes.
//! - Field: tag, `u16` size, payload. An `XXXX` field announces that the
//!   next field's size is the `u32` it carries.
//! - Records flagged [`RecordFlags::COMPRESSED`] start their body with the
//!   decompressed size, followed by a zlib stream holding the fields.
//!
//! Groups, records and fields are plain values. Navigation goes through the
//! [`EsmFile`] that produced them, which owns the stream.

mod file;
pub mod records;
pub mod utils;

pub use file::{Children, EsmFile, Fields};

use std::fmt;

use crate::common::{Range, Tag};

/// Tag of every group header
pub const GROUP_TAG: Tag = Tag::new(b"GRUP");

/// Tag of the file header record
pub const HEADER_TAG: Tag = Tag::new(b"TES4");

/// Field tag announcing a 32-bit size for the next field
pub const ESCAPE_TAG: Tag = Tag::new(b"XXXX");

/// Width of both the record and the group header
pub const UNIT_HEADER_SIZE: u64 = 24;

bitflags::bitflags! {
    /// Record header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RecordFlags: u32 {
        const MASTER = 0x01;
        const DELETED = 0x20;
        const LOCALIZED = 0x80;
        const SHADOWS = 0x200;
        const PERSISTENT = 0x400;
        const IGNORED = 0x1000;
        const VISIBLE_WHEN_DISTANT = 0x8000;
        const DANGEROUS = 0x20000;
        /// The body is a zlib stream
        const COMPRESSED = 0x40000;
        const CANT_WAIT = 0x80000;
    }
}

/// What a group contains, which also decides how its label is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupType {
    Top,
    WorldChildren,
    InteriorCellBlock,
    InteriorCellSubBlock,
    ExteriorCellBlock,
    ExteriorCellSubBlock,
    CellChildren,
    TopicChildren,
    CellPersistentChildren,
    CellTemporaryChildren,
    CellVisibleDistantChildren,
}

impl GroupType {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0x00 => Self::Top,
            0x01 => Self::WorldChildren,
            0x02 => Self::InteriorCellBlock,
            0x03 => Self::InteriorCellSubBlock,
            0x04 => Self::ExteriorCellBlock,
            0x05 => Self::ExteriorCellSubBlock,
            0x06 => Self::CellChildren,
            0x07 => Self::TopicChildren,
            0x08 => Self::CellPersistentChildren,
            0x09 => Self::CellTemporaryChildren,
            0x0A => Self::CellVisibleDistantChildren,
            _ => return None,
        })
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Top => "Top",
            Self::WorldChildren => "World Children",
            Self::InteriorCellBlock => "Interior Cell Block",
            Self::InteriorCellSubBlock => "Interior Cell Sub-Block",
            Self::ExteriorCellBlock => "Exterior Cell Block",
            Self::ExteriorCellSubBlock => "Exterior Cell Sub-Block",
            Self::CellChildren => "Cell Children",
            Self::TopicChildren => "Topic Children",
            Self::CellPersistentChildren => "Cell Persistent Children",
            Self::CellTemporaryChildren => "Cell Temporary Children",
            Self::CellVisibleDistantChildren => "Cell Visible Distant Children",
        }
    }
}

/// A group header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub tag: Tag,
    /// Declared size, header included
    pub size: u32,
    pub label: [u8; 4],
    pub group_type: u32,
    pub version: u16,
    pub range: Range,
}

impl Group {
    pub fn kind(&self) -> Option<GroupType> {
        GroupType::from_u32(self.group_type)
    }

    /// Where the group's children start
    pub fn body_start(&self) -> u64 {
        self.range.start() + UNIT_HEADER_SIZE
    }

    /// Human readable label.
    ///
    /// Only top level groups carry a readable name. Other labels are a form
    /// id or a pair of block coordinates.
    pub fn display_label(&self) -> String {
        let word = u32::from_le_bytes(self.label);
        let x = u16::from_le_bytes([self.label[0], self.label[1]]);
        let y = u16::from_le_bytes([self.label[2], self.label[3]]);

        match self.kind() {
            Some(GroupType::Top) => Tag(self.label).to_string(),
            Some(kind @ (GroupType::ExteriorCellBlock | GroupType::ExteriorCellSubBlock)) => {
                format!("{} {}, {}", kind.describe(), x, y)
            }
            Some(kind) => format!("{} [{:08X}]", kind.describe(), word),
            None => format!(
                "Unknown (T:{}, V:{:02x}{:02x}{:02x}{:02x})",
                self.group_type, self.label[0], self.label[1], self.label[2], self.label[3]
            ),
        }
    }
}

/// A record header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub tag: Tag,
    /// Declared size of the body, header excluded
    pub size: u32,
    pub flags: RecordFlags,
    pub form_id: u32,
    pub revision: u32,
    pub version: u16,
    pub range: Range,
}

impl Record {
    pub fn is_compressed(&self) -> bool {
        self.flags.contains(RecordFlags::COMPRESSED)
    }

    pub fn body_start(&self) -> u64 {
        self.range.start() + UNIT_HEADER_SIZE
    }
}

/// The smallest tagged unit of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub tag: Tag,
    /// Payload size; the 32-bit size when announced by an `XXXX` field
    pub size: u32,
    pub data: Vec<u8>,
}

/// A child of the file or of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Group(Group),
    Record(Record),
}

impl Unit {
    pub fn tag(&self) -> Tag {
        match self {
            Unit::Group(g) => g.tag,
            Unit::Record(r) => r.tag,
        }
    }

    pub fn range(&self) -> Range {
        match self {
            Unit::Group(g) => g.range,
            Unit::Record(r) => r.range,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Group(g) => write!(f, "GRUP {}", g.display_label()),
            Unit::Record(r) => write!(f, "{} [{:08X}]", r.tag, r.form_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(group_type: u32, label: [u8; 4]) -> Group {
        Group {
            tag: GROUP_TAG,
            size: 24,
            label,
            group_type,
            version: 0,
            range: Range::sized(0, 24),
        }
    }

    #[test]
    fn test_group_labels() {
        assert_eq!(group(0, *b"GMST").display_label(), "GMST");
        assert_eq!(
            group(1, 0x0001_F00Du32.to_le_bytes()).display_label(),
            "World Children [0001F00D]"
        );
        assert_eq!(
            group(4, [3, 0, 0xFE, 0xFF]).display_label(),
            "Exterior Cell Block 3, 65534"
        );
        assert_eq!(group(0x20, [1, 2, 3, 4]).display_label(), "Unknown (T:32, V:01020304)");
    }

    #[test]
    fn test_record_flags() {
        let flags = RecordFlags::from_bits_retain(0x40001 | 0x2);
        assert!(flags.contains(RecordFlags::COMPRESSED));
        assert!(flags.contains(RecordFlags::MASTER));
        assert_eq!(flags.bits(), 0x40003);
    }
}
