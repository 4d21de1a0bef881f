// Descriptor-driven conversion between values and target encodings
//
// `to_target` lowers a conforming value into the target's primitive
// vocabulary; `from_target` lifts it back. Structure parsing fills absent
// fields from their defaults in declared order, so the first failure is
// reported deterministically with its dotted path.

use bytes::Bytes;
use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::codec::types::{Encoded, Target};
use crate::codec::{base85, timestamp};
use crate::internal::error::{Error, Result, ResultExt};
use crate::schema::defaults::Resolved;
use crate::schema::types::{Kind, StructType, TypeDescriptor};
use crate::schema::validator::MAX_EXACT_FLOAT_INT;
use crate::schema::value::{StructValue, Value};

/// What to do with input keys no field declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFields {
    /// Reject with `UnknownFieldError`.
    #[default]
    Strict,
    /// Drop them with a warning.
    Lenient,
}

/// Configuration for schema mapping
#[derive(Debug, Clone, Default)]
pub struct MapperConfig {
    /// Policy for undeclared keys while parsing structures
    pub unknown_fields: UnknownFields,

    /// Target representation for encoding and decoding
    pub target: Target,
}

/// Schema mapper for converting between values and target encodings
#[derive(Debug, Clone, Default)]
pub struct SchemaMapper {
    config: MapperConfig,
}

impl SchemaMapper {
    /// Creates a new schema mapper with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new schema mapper with custom configuration
    pub fn with_config(config: MapperConfig) -> Self {
        Self { config }
    }

    /// Shorthand for a mapper with the given target and strict unknown-field policy.
    pub fn for_target(target: Target) -> Self {
        Self::with_config(MapperConfig { target, ..MapperConfig::default() })
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Encodes a value described by `descriptor`.
    pub fn to_target(&self, descriptor: &TypeDescriptor, value: &Value) -> Result<Encoded> {
        let target = self.config.target;
        match (descriptor.kind(), value) {
            (_, Value::Null) => Ok(Encoded::Null),
            (Kind::Any, value) => any_to_encoded(value, target),
            (Kind::Int, Value::Int(i)) => Ok(Encoded::Int(*i)),
            (Kind::Float, Value::Float(f)) => float_to_encoded(*f, target),
            (Kind::Str, Value::Str(s)) => Ok(Encoded::Text(s.clone())),
            (Kind::Bool, Value::Bool(b)) => Ok(Encoded::Bool(*b)),
            (Kind::Path, Value::Path(p)) => p
                .to_str()
                .map(|s| Encoded::Text(s.to_string()))
                .ok_or_else(|| Error::conversion(format!("Path {} is not valid UTF-8", p.display()))),
            (Kind::Bytes, Value::Bytes(b)) => Ok(match target {
                Target::JsonSafe => Encoded::Text(base85::encode(b)),
                Target::RichBinary => Encoded::Bytes(b.clone()),
            }),
            (Kind::Datetime, Value::Datetime(d)) => Ok(match target {
                Target::JsonSafe => Encoded::Text(timestamp::format(d)?),
                Target::RichBinary => Encoded::Timestamp(*d),
            }),
            (Kind::Enum(en), Value::Str(member)) => en.number_of(member).map(Encoded::Int).ok_or_else(|| {
                Error::validation(format!("`{member}` is not a member of {}", en.name()))
            }),
            (Kind::List(element), Value::List(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.to_target(element, item).within(i.to_string())?);
                }
                Ok(Encoded::Seq(out))
            }
            (Kind::Map(element) | Kind::DefaultMap(element), Value::Map(entries)) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    out.insert(key.clone(), self.to_target(element, item).within(key.as_str())?);
                }
                Ok(Encoded::Map(out))
            }
            (Kind::Tuple(elements), Value::Tuple(items)) => {
                check_arity(elements.len(), items.len())?;
                let mut out = Vec::with_capacity(items.len());
                for (i, (element, item)) in elements.iter().zip(items).enumerate() {
                    out.push(self.to_target(element, item).within(i.to_string())?);
                }
                Ok(Encoded::Seq(out))
            }
            (Kind::Struct(st), Value::Struct(fields)) => self.encode_struct(st, fields),
            (_, value) => Err(Error::validation(format!(
                "Type mismatch: expected {}, got {}",
                descriptor.type_name(),
                value.shape_name()
            ))),
        }
    }

    /// Decodes an encoded value described by `descriptor`.
    pub fn from_target(&self, descriptor: &TypeDescriptor, encoded: &Encoded) -> Result<Value> {
        let target = self.config.target;
        match (descriptor.kind(), encoded) {
            (_, Encoded::Null) => Ok(Value::Null),
            (Kind::Any, encoded) => any_from_encoded(encoded),
            (Kind::Int, Encoded::Int(i)) => Ok(Value::Int(*i)),
            (Kind::Int, Encoded::Float(f)) => float_to_int(*f).map(Value::Int),
            (Kind::Float, Encoded::Float(f)) => Ok(Value::Float(*f)),
            (Kind::Float, Encoded::Int(i)) => int_to_float(*i).map(Value::Float),
            (Kind::Str, Encoded::Text(s)) => Ok(Value::Str(s.clone())),
            (Kind::Bool, Encoded::Bool(b)) => Ok(Value::Bool(*b)),
            (Kind::Path, Encoded::Text(s)) => Ok(Value::Path(s.into())),
            (Kind::Bytes, Encoded::Text(s)) if target == Target::JsonSafe => {
                Ok(Value::Bytes(Bytes::from(base85::decode(s)?)))
            }
            (Kind::Bytes, Encoded::Bytes(b)) if target.is_rich() => Ok(Value::Bytes(b.clone())),
            (Kind::Datetime, Encoded::Text(s)) if target == Target::JsonSafe => {
                Ok(Value::Datetime(timestamp::parse(s)?))
            }
            (Kind::Datetime, Encoded::Timestamp(d)) if target.is_rich() => Ok(Value::Datetime(*d)),
            (Kind::Enum(en), Encoded::Int(number)) => en
                .member_of(*number)
                .map(|member| Value::Str(member.to_string()))
                .ok_or_else(|| Error::conversion(format!("{number} is not a member of {}", en.name()))),
            (Kind::List(element), Encoded::Seq(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.from_target(element, item).within(i.to_string())?);
                }
                Ok(Value::List(out))
            }
            (Kind::Map(element) | Kind::DefaultMap(element), Encoded::Map(entries)) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    out.insert(key.clone(), self.from_target(element, item).within(key.as_str())?);
                }
                Ok(Value::Map(out))
            }
            (Kind::Tuple(elements), Encoded::Seq(items)) => {
                check_arity(elements.len(), items.len())?;
                let mut out = Vec::with_capacity(items.len());
                for (i, (element, item)) in elements.iter().zip(items).enumerate() {
                    out.push(self.from_target(element, item).within(i.to_string())?);
                }
                Ok(Value::Tuple(out))
            }
            (Kind::Struct(st), encoded) => self.parse(st, encoded).map(Value::Struct),
            (_, encoded) => Err(Error::conversion(format!(
                "Cannot decode {} from {} for the {target} target",
                descriptor.type_name(),
                encoded.kind()
            ))),
        }
    }

    /// Parses raw input into a structure value.
    ///
    /// Supplied fields are decoded through their descriptors; absent ones are
    /// filled from their defaults. Fields resolving to `Missing` are left out.
    pub fn parse(&self, st: &StructType, raw: &Encoded) -> Result<StructValue> {
        let entries = raw.as_map().ok_or_else(|| {
            Error::validation(format!("Expected a map for {st}, got {}", raw.kind()))
        })?;

        let mut out = StructValue::new();
        for (name, field) in st.fields() {
            let resolved = match entries.get(name) {
                Some(item) => Resolved::Value(self.from_target(field, item).within(name.as_str())?),
                None => field.resolve_default().within(name.as_str())?,
            };
            if let Resolved::Value(value) = resolved {
                trace!(structure = %st, field = %name, "resolved field");
                out.set(name.as_str(), value);
            }
        }

        for key in entries.keys() {
            if st.contains(key) {
                continue;
            }
            match self.config.unknown_fields {
                UnknownFields::Strict => return Err(Error::unknown_field(key.as_str())),
                UnknownFields::Lenient => {
                    warn!(structure = %st, field = %key, "dropping unknown field");
                }
            }
        }

        Ok(out)
    }

    /// Encodes a structure value field by field, in declared order.
    ///
    /// Absent fields are omitted; an explicit null is emitted as null.
    pub fn encode_struct(&self, st: &StructType, value: &StructValue) -> Result<Encoded> {
        for (name, _) in value.iter() {
            if !st.contains(name) {
                return Err(Error::validation(format!("{st} has no field `{name}`")).within(name.as_str()));
            }
        }

        let mut out = IndexMap::with_capacity(value.len());
        for (name, field) in st.fields() {
            if let Some(item) = value.get(name) {
                out.insert(name.clone(), self.to_target(field, item).within(name.as_str())?);
            }
        }
        Ok(Encoded::Map(out))
    }
}

impl TypeDescriptor {
    /// Encodes `value` for `target`.
    pub fn to_target(&self, value: &Value, target: Target) -> Result<Encoded> {
        SchemaMapper::for_target(target).to_target(self, value)
    }

    /// Decodes `encoded` from `target`.
    pub fn from_target(&self, encoded: &Encoded, target: Target) -> Result<Value> {
        SchemaMapper::for_target(target).from_target(self, encoded)
    }
}

impl StructType {
    /// Parses `raw` with the strict unknown-field policy.
    pub fn parse(&self, raw: &Encoded, target: Target) -> Result<StructValue> {
        SchemaMapper::for_target(target).parse(self, raw)
    }

    pub fn to_target(&self, value: &StructValue, target: Target) -> Result<Encoded> {
        SchemaMapper::for_target(target).encode_struct(self, value)
    }
}

fn check_arity(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::validation(format!("Tuple arity mismatch: expected {expected}, got {actual}")))
    }
}

fn int_to_float(i: i64) -> Result<f64> {
    if i.unsigned_abs() <= MAX_EXACT_FLOAT_INT as u64 {
        Ok(i as f64)
    } else {
        Err(Error::conversion(format!("Integer {i} would lose precision as Float")))
    }
}

fn float_to_encoded(f: f64, target: Target) -> Result<Encoded> {
    if target == Target::JsonSafe && !f.is_finite() {
        return Err(Error::conversion(format!("Float {f} is not representable in JSON")));
    }
    Ok(Encoded::Float(f))
}

fn float_to_int(f: f64) -> Result<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(f as i64)
    } else {
        Err(Error::conversion(format!("Float {f} is not an exact integer")))
    }
}

fn any_to_encoded(value: &Value, target: Target) -> Result<Encoded> {
    match value {
        Value::Null => Ok(Encoded::Null),
        Value::Bool(b) => Ok(Encoded::Bool(*b)),
        Value::Int(i) => Ok(Encoded::Int(*i)),
        Value::Float(f) => float_to_encoded(*f, target),
        Value::Str(s) => Ok(Encoded::Text(s.clone())),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(any_to_encoded(item, target).within(i.to_string())?);
            }
            Ok(Encoded::Seq(out))
        }
        Value::Map(entries) => {
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                out.insert(key.clone(), any_to_encoded(item, target).within(key.as_str())?);
            }
            Ok(Encoded::Map(out))
        }
        other => Err(Error::validation(format!(
            "Any only holds JSON-shaped values, got {}",
            other.shape_name()
        ))),
    }
}

fn any_from_encoded(encoded: &Encoded) -> Result<Value> {
    match encoded {
        Encoded::Null => Ok(Value::Null),
        Encoded::Bool(b) => Ok(Value::Bool(*b)),
        Encoded::Int(i) => Ok(Value::Int(*i)),
        Encoded::Float(f) => Ok(Value::Float(*f)),
        Encoded::Text(s) => Ok(Value::Str(s.clone())),
        Encoded::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(any_from_encoded(item).within(i.to_string())?);
            }
            Ok(Value::List(out))
        }
        Encoded::Map(entries) => {
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                out.insert(key.clone(), any_from_encoded(item).within(key.as_str())?);
            }
            Ok(Value::Map(out))
        }
        other => Err(Error::conversion(format!("Any cannot hold {}", other.kind()))),
    }
}
