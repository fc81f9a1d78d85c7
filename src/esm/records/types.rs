//! Typed values produced by field decoders

use std::fmt;

/// Primitive interpretation chosen for data-dependent fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    String,
    Int,
    Float,
    Bool,
    Unknown,
}

impl BasicType {
    /// Game setting type code, taken from the first character of an
    /// editor id (`sName`, `iCount`, `fScale`, `bEnabled`)
    pub fn from_code(code: char) -> Self {
        match code {
            's' => Self::String,
            'i' => Self::Int,
            'f' => Self::Float,
            'b' => Self::Bool,
            _ => Self::Unknown,
        }
    }
}

/// A decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i32),
    UInt(u32),
    Float(f32),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Bytes(b) => {
                for byte in b.iter().take(32) {
                    write!(f, "{:02x}", byte)?;
                }
                if b.len() > 32 {
                    write!(f, "... ({} bytes)", b.len())?;
                }
                Ok(())
            }
        }
    }
}

/// Named values decoded from one field, in decode order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues(Vec<(&'static str, Value)>);

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: Value) -> Self {
        self.0.push((name, value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.0.iter().map(|(n, v)| (*n, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes() {
        assert_eq!(BasicType::from_code('s'), BasicType::String);
        assert_eq!(BasicType::from_code('b'), BasicType::Bool);
        assert_eq!(BasicType::from_code('u'), BasicType::Unknown);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::String("a".into()).to_string(), "\"a\"");
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "dead");
        let values = FieldValues::new().with("value", Value::Float(1.5));
        assert_eq!(values.get("value").and_then(Value::as_f32), Some(1.5));
        assert!(values.get("name").is_none());
    }
}
