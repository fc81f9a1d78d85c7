//! Field decoders

use std::io::Cursor;

use super::types::{BasicType, FieldValues, Value};
use super::HighLevelRecord;
use crate::error::Result;
use crate::esm::Field;
use crate::io::BinaryReader;

/// A cursor over the payload of a single field
pub type FieldReader<'a> = BinaryReader<Cursor<&'a [u8]>>;

/// Decodes one field's payload into named values
pub trait FieldDecoder {
    /// Stable identifier used by [`HighLevelRecord::first`]
    fn kind(&self) -> &'static str;

    /// Human readable description of what the decoder reads
    fn label(&self) -> &'static str;

    /// Name of this field in its record's structure
    fn name(&self) -> &'static str;

    /// Decode a field. `record` holds the fields of the same record decoded
    /// so far.
    fn read(&self, record: &HighLevelRecord, field: &Field, reader: &mut FieldReader<'_>) -> Result<FieldValues>;

    fn read_field(&self, record: &HighLevelRecord, field: &Field) -> Result<FieldValues> {
        let mut reader = BinaryReader::new(Cursor::new(field.data.as_slice()))?;
        self.read(record, field, &mut reader)
    }
}

/// Editor id: a null terminated string
pub struct Edid {
    pub name: &'static str,
}

impl FieldDecoder for Edid {
    fn kind(&self) -> &'static str {
        "EDID"
    }

    fn label(&self) -> &'static str {
        "Editor ID"
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self, _record: &HighLevelRecord, _field: &Field, reader: &mut FieldReader<'_>) -> Result<FieldValues> {
        let mut c = reader.capture();
        let name = c.cstring("name")?.change(Value::String).get();
        Ok(FieldValues::new().with("name", name))
    }
}

pub struct Fltv {
    pub name: &'static str,
}

impl FieldDecoder for Fltv {
    fn kind(&self) -> &'static str {
        "FLTV"
    }

    fn label(&self) -> &'static str {
        "Float Value"
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self, _record: &HighLevelRecord, _field: &Field, reader: &mut FieldReader<'_>) -> Result<FieldValues> {
        let mut c = reader.capture();
        let value = c.f32("value")?.change(Value::Float).get();
        Ok(FieldValues::new().with("value", value))
    }
}

/// Picks how a [`Data`] field is read from what was decoded before it
pub type TypeSelector = Box<dyn Fn(&HighLevelRecord) -> BasicType>;

/// A field whose primitive type depends on earlier fields of the same
/// record. The selector runs for every record instance.
pub struct Data {
    pub name: &'static str,
    pub type_of: TypeSelector,
}

impl Data {
    pub fn new(name: &'static str, type_of: impl Fn(&HighLevelRecord) -> BasicType + 'static) -> Self {
        Self {
            name,
            type_of: Box::new(type_of),
        }
    }
}

impl FieldDecoder for Data {
    fn kind(&self) -> &'static str {
        "DATA"
    }

    fn label(&self) -> &'static str {
        "Arbitrary Data"
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self, record: &HighLevelRecord, field: &Field, reader: &mut FieldReader<'_>) -> Result<FieldValues> {
        let mut c = reader.capture();
        let value = match (self.type_of)(record) {
            BasicType::String => c.cstring("value")?.change(Value::String),
            BasicType::Int => c.i32("value")?.change(Value::Int),
            BasicType::Float => c.f32("value")?.change(Value::Float),
            BasicType::Bool => c.u8("value")?.change(|b| Value::Bool(b != 0)),
            BasicType::Unknown => c.bytes("value", field.size as u64)?.change(Value::Bytes),
        };
        Ok(FieldValues::new().with("value", value.get()))
    }
}

/// Raw passthrough for fields without a decoder
pub struct Unknown {
    pub name: &'static str,
}

impl FieldDecoder for Unknown {
    fn kind(&self) -> &'static str {
        "Unknown"
    }

    fn label(&self) -> &'static str {
        "Unknown"
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self, _record: &HighLevelRecord, field: &Field, reader: &mut FieldReader<'_>) -> Result<FieldValues> {
        let mut c = reader.capture();
        let size = c.set("size", Value::UInt(field.size)).get();
        let data = c.bytes("data", field.data.len() as u64)?.change(Value::Bytes).get();
        Ok(FieldValues::new().with("size", size).with("data", data))
    }
}
