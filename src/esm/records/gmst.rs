use tracing::warn;

use super::fields::{Data, Edid, FieldDecoder};
use super::{BasicType, HighLevelRecord, RecordDescriptor, Value};
use crate::common::Tag;
use crate::esm::{Field, Record};

/// Game setting. The type of its value is encoded in the first character
/// of its editor id.
pub struct Gmst;

fn setting_type(record: &HighLevelRecord) -> BasicType {
    let code = record
        .first("EDID")
        .ok()
        .and_then(|edid| edid.get("name"))
        .and_then(Value::as_str)
        .and_then(|name| name.chars().next());

    match code.map(BasicType::from_code) {
        Some(BasicType::Unknown) | None => {
            warn!(form_id = record.record().form_id, ?code, "unknown game setting type");
            BasicType::Unknown
        }
        Some(kind) => kind,
    }
}

impl RecordDescriptor for Gmst {
    fn tag(&self) -> Tag {
        Tag::new(b"GMST")
    }

    fn label(&self) -> &'static str {
        "Game Setting"
    }

    fn structure(&self, _record: &Record, _fields: &[Field]) -> Vec<Box<dyn FieldDecoder>> {
        vec![
            Box::new(Edid { name: "Editor ID" }),
            Box::new(Data::new("Value", setting_type)),
        ]
    }
}
