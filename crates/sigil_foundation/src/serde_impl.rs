//! `serde` support for values, used to persist compiled constant pools.
//!
//! Only data values round-trip. References serialize as their target;
//! objects are handles to run-time state and are rejected.

use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};

use crate::array::{Array, Key};
use crate::value::Value;

#[derive(Serialize, Deserialize)]
enum Repr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<(Key, Repr)>),
}

impl Repr {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(n) => Self::Int(*n),
            Value::Float(f) => Self::Float(*f),
            Value::String(s) => Self::String(s.to_string()),
            Value::Array(array) => Self::Array(
                array
                    .iter()
                    .map(|(k, v)| Ok((k, Self::from_value(v)?)))
                    .collect::<Result<_, String>>()?,
            ),
            Value::Reference(r) => Self::from_value(&r.borrow())?,
            Value::Object(o) => return Err(format!("cannot serialize {} object", o.class_name())),
        })
    }

    fn into_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(n) => Value::Int(n),
            Self::Float(f) => Value::Float(f),
            Self::String(s) => Value::from(s),
            Self::Array(entries) => Value::Array(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect::<Array>(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Repr::from_value(self)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Repr::deserialize(deserializer).map(Repr::into_value)
    }
}
