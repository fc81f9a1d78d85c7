use super::fields::{Edid, FieldDecoder, Fltv};
use super::RecordDescriptor;
use crate::common::Tag;
use crate::esm::{Field, Record};

/// Global variable
pub struct Glob;

impl RecordDescriptor for Glob {
    fn tag(&self) -> Tag {
        Tag::new(b"GLOB")
    }

    fn label(&self) -> &'static str {
        "Global"
    }

    fn structure(&self, _record: &Record, _fields: &[Field]) -> Vec<Box<dyn FieldDecoder>> {
        vec![Box::new(Edid { name: "Editor ID" }), Box::new(Fltv { name: "Value" })]
    }
}
