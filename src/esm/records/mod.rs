//! High level record decoding
//!
//! A [`RecordDescriptor`] gives the expected field structure of one record
//! type. [`HighLevelRecord`] walks a record's fields in step with that
//! structure and decodes each one into named [`Value`]s. Fields beyond the
//! end of the structure are not decoded. Records without a descriptor have
//! every field decoded as raw bytes.
//!
//! ```rust,no_run
//! use starhopper::esm::{records::HighLevelRecord, EsmFile, Unit};
//!
//! let mut esm = EsmFile::open("Starfield.esm")?;
//! for unit in esm.units()?.to_vec() {
//!     let Unit::Group(group) = unit else { continue };
//!     let children: Vec<Unit> = esm.children(&group).collect::<Result<_, _>>()?;
//!     for child in children {
//!         if let Unit::Record(record) = child {
//!             let decoded = HighLevelRecord::read(&mut esm, &record)?;
//!             println!("{:?}", decoded.first("EDID").ok());
//!         }
//!     }
//! }
//! # Ok::<(), starhopper::Error>(())
//! ```

pub mod fields;
mod glob;
mod gmst;
pub mod types;

pub use glob::Glob;
pub use gmst::Gmst;
pub use types::{BasicType, FieldValues, Value};

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::sync::OnceLock;

use self::fields::{FieldDecoder, Unknown};
use super::{EsmFile, Field, Record};
use crate::common::Tag;
use crate::error::{Error, Result};

/// Field structure of one record type
pub trait RecordDescriptor: Send + Sync {
    fn tag(&self) -> Tag;

    fn label(&self) -> &'static str;

    /// Decoders for `record`, paired with its fields by position. Built per
    /// record so that structures may depend on the instance.
    fn structure(&self, record: &Record, fields: &[Field]) -> Vec<Box<dyn FieldDecoder>>;
}

/// Fallback for record types without a descriptor
pub struct UnknownRecord;

impl RecordDescriptor for UnknownRecord {
    fn tag(&self) -> Tag {
        Tag::default()
    }

    fn label(&self) -> &'static str {
        "An Unknown Record"
    }

    fn structure(&self, _record: &Record, _fields: &[Field]) -> Vec<Box<dyn FieldDecoder>> {
        vec![Box::new(Unknown { name: "Unknown" })]
    }
}

static UNKNOWN_RECORD: UnknownRecord = UnknownRecord;

static REGISTRY: OnceLock<BTreeMap<Tag, Box<dyn RecordDescriptor>>> = OnceLock::new();

/// Every built-in record descriptor, keyed by tag
pub fn registry() -> &'static BTreeMap<Tag, Box<dyn RecordDescriptor>> {
    REGISTRY.get_or_init(|| {
        let builtin: Vec<Box<dyn RecordDescriptor>> = vec![Box::new(Glob), Box::new(Gmst)];
        builtin.into_iter().map(|d| (d.tag(), d)).collect()
    })
}

/// Look up the descriptor registered for a record tag
pub fn descriptor(tag: Tag) -> Option<&'static dyn RecordDescriptor> {
    registry().get(&tag).map(|d| d.as_ref())
}

/// One decoded field
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub tag: Tag,
    pub kind: &'static str,
    pub name: &'static str,
    pub label: &'static str,
    pub values: FieldValues,
}

/// A record with its fields decoded through its descriptor
#[derive(Debug, Clone)]
pub struct HighLevelRecord {
    record: Record,
    results: Vec<DecodedField>,
}

impl HighLevelRecord {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            results: Vec::new(),
        }
    }

    /// Read `record`'s fields from `file` and decode them.
    ///
    /// Records without a descriptor decode as a single raw field holding
    /// the whole (decompressed) payload.
    pub fn read<R: Read + Seek>(file: &mut EsmFile<R>, record: &Record) -> Result<Self> {
        let fields = if Self::can_be_handled(record) {
            file.fields(record)?.collect::<Result<Vec<_>>>()?
        } else {
            let data = file.payload(record)?;
            vec![Field {
                tag: record.tag,
                size: data.len() as u32,
                data,
            }]
        };
        let mut decoded = Self::new(record.clone());
        decoded.decode(&fields)?;
        Ok(decoded)
    }

    /// Decode already read fields, appending to the results
    pub fn decode(&mut self, fields: &[Field]) -> Result<()> {
        let structure = Self::handler(&self.record).structure(&self.record, fields);
        for (decoder, field) in structure.iter().zip(fields) {
            let values = decoder.read_field(self, field)?;
            self.results.push(DecodedField {
                tag: field.tag,
                kind: decoder.kind(),
                name: decoder.name(),
                label: decoder.label(),
                values,
            });
        }
        Ok(())
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn results(&self) -> &[DecodedField] {
        &self.results
    }

    /// Values of the first decoded field of the given decoder kind
    pub fn first(&self, kind: &str) -> Result<&FieldValues> {
        self.results
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| &r.values)
            .ok_or_else(|| Error::NotFound(format!("{} field in {} record", kind, self.record.tag)))
    }

    /// Like [`first`](Self::first), returning `default` when absent
    pub fn first_or<'a>(&'a self, kind: &str, default: &'a FieldValues) -> &'a FieldValues {
        self.first(kind).unwrap_or(default)
    }

    pub fn can_be_handled(record: &Record) -> bool {
        registry().contains_key(&record.tag)
    }

    pub fn handler(record: &Record) -> &'static dyn RecordDescriptor {
        descriptor(record.tag).unwrap_or(&UNKNOWN_RECORD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esm::file::tests::{esm, field, group, record};
    use crate::esm::Unit;
    use std::io::Cursor;

    fn decode_all(units: &[Vec<u8>]) -> Vec<HighLevelRecord> {
        let mut file = EsmFile::new(Cursor::new(esm(&[group(b"TEST", 0, &units.concat())]))).unwrap();
        let Unit::Group(top) = file.units().unwrap()[0].clone() else {
            panic!("expected a group")
        };
        let children: Vec<Unit> = file.children(&top).collect::<Result<_>>().unwrap();
        children
            .into_iter()
            .map(|unit| match unit {
                Unit::Record(r) => HighLevelRecord::read(&mut file, &r).unwrap(),
                Unit::Group(_) => panic!("expected a record"),
            })
            .collect()
    }

    fn gmst(edid: &[u8], data: &[u8]) -> Vec<u8> {
        record(b"GMST", 0, 1, &[field(b"EDID", edid), field(b"DATA", data)].concat())
    }

    #[test]
    fn test_registry() {
        assert!(descriptor(Tag::new(b"GLOB")).is_some());
        assert_eq!(descriptor(Tag::new(b"GMST")).map(|d| d.label()), Some("Game Setting"));
        assert!(descriptor(Tag::new(b"WEAP")).is_none());
    }

    #[test]
    fn test_glob() {
        let body = [field(b"EDID", b"GameHour\0"), field(b"FLTV", &9.5f32.to_le_bytes())].concat();
        let decoded = decode_all(&[record(b"GLOB", 0, 2, &body)]);
        let glob = &decoded[0];

        assert!(HighLevelRecord::can_be_handled(glob.record()));
        assert_eq!(
            glob.first("EDID").unwrap().get("name"),
            Some(&Value::String("GameHour".into()))
        );
        assert_eq!(glob.first("FLTV").unwrap().get("value"), Some(&Value::Float(9.5)));
        assert_eq!(glob.results()[1].name, "Value");
    }

    #[test]
    fn test_gmst_type_follows_each_editor_id() {
        let decoded = decode_all(&[
            gmst(b"sGreeting\0", b"Hello\0"),
            gmst(b"iCount\0", &(-3i32).to_le_bytes()),
            gmst(b"fScale\0", &0.25f32.to_le_bytes()),
            gmst(b"bEnabled\0", &[1]),
            gmst(b"uOdd\0", &[7, 8]),
        ]);

        let values: Vec<Value> = decoded
            .iter()
            .map(|r| r.first("DATA").unwrap().get("value").unwrap().clone())
            .collect();
        assert_eq!(
            values,
            vec![
                Value::String("Hello".into()),
                Value::Int(-3),
                Value::Float(0.25),
                Value::Bool(true),
                Value::Bytes(vec![7, 8]),
            ]
        );
    }

    #[test]
    fn test_extra_fields_are_not_decoded() {
        let body = [
            field(b"EDID", b"Extra\0"),
            field(b"FLTV", &1.0f32.to_le_bytes()),
            field(b"XTRA", b"ignored"),
        ]
        .concat();
        let decoded = decode_all(&[record(b"GLOB", 0, 3, &body)]);
        assert_eq!(decoded[0].results().len(), 2);
    }

    #[test]
    fn test_unknown_record_falls_back_to_raw_bytes() {
        let body = [field(b"EDID", b"Thing\0"), field(b"DNAM", &[1, 2, 3])].concat();
        let decoded = decode_all(&[record(b"WEAP", 0, 4, &body)]);
        let weap = &decoded[0];

        assert!(!HighLevelRecord::can_be_handled(weap.record()));
        assert_eq!(HighLevelRecord::handler(weap.record()).label(), "An Unknown Record");
        assert_eq!(weap.results().len(), 1);
        assert_eq!(weap.results()[0].tag, Tag::new(b"WEAP"));
        assert_eq!(weap.results()[0].values.get("size"), Some(&Value::UInt(body.len() as u32)));
        assert_eq!(weap.results()[0].values.get("data"), Some(&Value::Bytes(body.clone())));
        assert!(matches!(weap.first("EDID"), Err(Error::NotFound(_))));

        let default = FieldValues::new().with("name", Value::String("none".into()));
        assert_eq!(weap.first_or("EDID", &default), &default);
    }
}
