//! Dynamic element type flowing through a pipeline

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single element of a data pipeline
///
/// The engine never inspects element contents; stages only move, buffer and
/// group them. Batching stages produce `List` elements and `zip` produces
/// `List` or `Dict` elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Data {
    /// Absence of a value
    #[default]
    Null,

    /// Boolean value
    Bool(bool),

    /// Signed integer value
    Int(i64),

    /// Floating point value
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Raw bytes
    Bytes(Vec<u8>),

    /// Ordered list of elements
    List(Vec<Data>),

    /// String-keyed map of elements
    Dict(BTreeMap<String, Data>),
}

impl Data {
    /// Name of the variant, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Data::Null => "null",
            Data::Bool(_) => "bool",
            Data::Int(_) => "int",
            Data::Float(_) => "float",
            Data::String(_) => "string",
            Data::Bytes(_) => "bytes",
            Data::List(_) => "list",
            Data::Dict(_) => "dict",
        }
    }

    /// Whether this is `Data::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Data::Null)
    }

    /// The boolean value, if this is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Data::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer value, if this is an `Int`
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Data::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float value, if this is a `Float`
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Data::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The string value, if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::String(v) => Some(v),
            _ => None,
        }
    }

    /// The raw bytes, if this is `Bytes`
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Data::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// The elements, if this is a `List`
    pub fn as_list(&self) -> Option<&[Data]> {
        match self {
            Data::List(v) => Some(v),
            _ => None,
        }
    }

    /// The entries, if this is a `Dict`
    pub fn as_dict(&self) -> Option<&BTreeMap<String, Data>> {
        match self {
            Data::Dict(v) => Some(v),
            _ => None,
        }
    }

    /// Consume the element, returning the inner list if it is one
    pub fn into_list(self) -> Result<Vec<Data>, Data> {
        match self {
            Data::List(v) => Ok(v),
            other => Err(other),
        }
    }

    /// Consume the element, returning the inner dict if it is one
    pub fn into_dict(self) -> Result<BTreeMap<String, Data>, Data> {
        match self {
            Data::Dict(v) => Ok(v),
            other => Err(other),
        }
    }

    /// Number of items for lists, dicts, strings and bytes
    pub fn len(&self) -> Option<usize> {
        match self {
            Data::String(v) => Some(v.len()),
            Data::Bytes(v) => Some(v.len()),
            Data::List(v) => Some(v.len()),
            Data::Dict(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Whether `len()` is known and zero
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "<{}>", self.kind()),
        }
    }
}

impl From<bool> for Data {
    fn from(v: bool) -> Self {
        Data::Bool(v)
    }
}

impl From<i64> for Data {
    fn from(v: i64) -> Self {
        Data::Int(v)
    }
}

impl From<i32> for Data {
    fn from(v: i32) -> Self {
        Data::Int(i64::from(v))
    }
}

impl From<f64> for Data {
    fn from(v: f64) -> Self {
        Data::Float(v)
    }
}

impl From<String> for Data {
    fn from(v: String) -> Self {
        Data::String(v)
    }
}

impl From<&str> for Data {
    fn from(v: &str) -> Self {
        Data::String(v.to_owned())
    }
}

impl From<Vec<u8>> for Data {
    fn from(v: Vec<u8>) -> Self {
        Data::Bytes(v)
    }
}

impl From<Vec<Data>> for Data {
    fn from(v: Vec<Data>) -> Self {
        Data::List(v)
    }
}

impl From<BTreeMap<String, Data>> for Data {
    fn from(v: BTreeMap<String, Data>) -> Self {
        Data::Dict(v)
    }
}

impl<T: Into<Data>> FromIterator<T> for Data {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Data::List(iter.into_iter().map(Into::into).collect())
    }
}
