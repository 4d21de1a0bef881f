use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// The serialization target a value is converted to or from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    #[default]
    /// Only null, bool, number, text, sequences and string-keyed maps.
    /// Blobs travel as base85 text and timestamps as RFC 3339 text.
    JsonSafe,
    /// Same shape, but blobs and timestamps pass through natively.
    RichBinary,
}

impl Target {
    /// Whether blobs and timestamps are native to this target.
    pub fn is_rich(self) -> bool {
        matches!(self, Target::RichBinary)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::JsonSafe => write!(f, "json-safe"),
            Target::RichBinary => write!(f, "rich-binary"),
        }
    }
}

/// An encoded value: the primitive vocabulary a target understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Bytes),              // RichBinary only
    Timestamp(DateTime<Utc>),  // RichBinary only
    Seq(Vec<Encoded>),
    Map(IndexMap<String, Encoded>),
}

/// The type tag of an encoded value, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
    Seq,
    Map,
}

impl fmt::Display for EncodedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodedKind::Null => "null",
            EncodedKind::Bool => "bool",
            EncodedKind::Int => "integer",
            EncodedKind::Float => "float",
            EncodedKind::Text => "text",
            EncodedKind::Bytes => "bytes",
            EncodedKind::Timestamp => "timestamp",
            EncodedKind::Seq => "sequence",
            EncodedKind::Map => "map",
        };
        write!(f, "{name}")
    }
}

impl Encoded {
    /// Returns the kind tag of this encoded value.
    pub fn kind(&self) -> EncodedKind {
        match self {
            Encoded::Null => EncodedKind::Null,
            Encoded::Bool(_) => EncodedKind::Bool,
            Encoded::Int(_) => EncodedKind::Int,
            Encoded::Float(_) => EncodedKind::Float,
            Encoded::Text(_) => EncodedKind::Text,
            Encoded::Bytes(_) => EncodedKind::Bytes,
            Encoded::Timestamp(_) => EncodedKind::Timestamp,
            Encoded::Seq(_) => EncodedKind::Seq,
            Encoded::Map(_) => EncodedKind::Map,
        }
    }

    /// True when the value (recursively) only uses the JSON-safe vocabulary.
    pub fn is_json_safe(&self) -> bool {
        match self {
            Encoded::Bytes(_) | Encoded::Timestamp(_) => false,
            Encoded::Float(f) => f.is_finite(),
            Encoded::Seq(items) => items.iter().all(Encoded::is_json_safe),
            Encoded::Map(entries) => entries.values().all(Encoded::is_json_safe),
            _ => true,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Encoded>> {
        match self {
            Encoded::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Encoded::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for Encoded {
    fn from(value: bool) -> Self {
        Encoded::Bool(value)
    }
}

impl From<i64> for Encoded {
    fn from(value: i64) -> Self {
        Encoded::Int(value)
    }
}

impl From<f64> for Encoded {
    fn from(value: f64) -> Self {
        Encoded::Float(value)
    }
}

impl From<&str> for Encoded {
    fn from(value: &str) -> Self {
        Encoded::Text(value.to_string())
    }
}

impl From<String> for Encoded {
    fn from(value: String) -> Self {
        Encoded::Text(value)
    }
}
