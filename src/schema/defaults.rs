// Default resolution for shapecast descriptors
//
// Every descriptor carries exactly one default specifier. Resolution either
// produces a fresh value, reports that the field should be left out, or fails.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use indexmap::IndexMap;

use crate::internal::error::{Error, Result, ResultExt};
use crate::schema::types::{Kind, StructType, TypeDescriptor};
use crate::schema::validator::SchemaValidator;
use crate::schema::value::{StructValue, Value};

/// Error type returned by user factories.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// A zero-argument default producer.
///
/// Factories compare by identity: two factories are equal only when they
/// share the same closure.
#[derive(Clone)]
pub struct Factory {
    func: Arc<dyn Fn() -> std::result::Result<Value, FactoryError> + Send + Sync>,
}

impl Factory {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> std::result::Result<Value, FactoryError> + Send + Sync + 'static,
    {
        Self { func: Arc::new(func) }
    }

    /// Wraps an infallible producer.
    pub fn from_fn<F, V>(func: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self::new(move || Ok(func().into()))
    }

    pub fn call(&self) -> std::result::Result<Value, FactoryError> {
        (self.func)()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.func) as *const ()
    }
}

impl PartialEq for Factory {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Factory@{:p}", self.addr())
    }
}

/// The default specifier attached to a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultSpec {
    /// No default; the value must be supplied.
    Required,
    /// A fixed value, cloned on every resolution.
    Constant(Value),
    /// A user factory, invoked on every resolution.
    Factory(Factory),
    /// The current UTC time at resolution.
    Now,
    /// Leave the field out of the resulting structure.
    Missing,
    /// The descriptor's zero value.
    Empty,
}

impl DefaultSpec {
    /// Whether a value may be omitted for a field with this specifier.
    pub fn is_optional(&self) -> bool {
        !matches!(self, DefaultSpec::Required)
    }
}

/// Outcome of resolving a default.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Value(Value),
    Missing,
}

impl Resolved {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Missing => None,
        }
    }
}

impl TypeDescriptor {
    /// Resolves this descriptor's default specifier.
    pub fn resolve_default(&self) -> Result<Resolved> {
        match self.default_spec() {
            DefaultSpec::Required => Err(Error::missing_required()),
            DefaultSpec::Constant(value) => {
                SchemaValidator::new().validate(self, value).map_err(|err| {
                    Error::default_failed(format!(
                        "constant {value} is not a valid {} value: {err}",
                        self.type_name()
                    ))
                })?;
                Ok(Resolved::Value(value.clone()))
            }
            DefaultSpec::Factory(factory) => {
                let value = factory
                    .call()
                    .map_err(|err| Error::default_failed(format!("factory failed: {err}")))?;
                SchemaValidator::new().validate(self, &value).map_err(|err| {
                    Error::default_failed(format!("factory produced an invalid {self} value: {err}"))
                })?;
                Ok(Resolved::Value(value))
            }
            DefaultSpec::Now => Ok(Resolved::Value(Value::Datetime(Utc::now()))),
            DefaultSpec::Missing => Ok(Resolved::Missing),
            DefaultSpec::Empty => self.kind().empty_value().map(Resolved::Value),
        }
    }

    /// Whether this descriptor's own default can ever produce a value.
    pub fn default_is_resolvable(&self) -> bool {
        match self.default_spec() {
            DefaultSpec::Required => false,
            DefaultSpec::Empty => self.kind().has_empty_value(),
            _ => true,
        }
    }

    /// Checks that every `.empty` in the tree has an empty value and every
    /// `DefaultDict` value descriptor has a default.
    ///
    /// Fails with `UnresolvableFieldType` at the offending path.
    pub fn check_defaults(&self) -> Result<()> {
        if matches!(self.default_spec(), DefaultSpec::Empty) && !self.kind().has_empty_value() {
            return Err(Error::unresolvable(format!("{} has no empty value", self.type_name())));
        }
        match self.kind() {
            Kind::List(element) | Kind::Map(element) => element.check_defaults(),
            Kind::DefaultMap(element) => {
                if !element.default_is_resolvable() || matches!(element.default_spec(), DefaultSpec::Missing) {
                    return Err(Error::unresolvable(format!(
                        "{} needs a value descriptor with a default, got {element}",
                        self.type_name()
                    )));
                }
                element.check_defaults()
            }
            Kind::Tuple(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    element.check_defaults().within(i.to_string())?;
                }
                Ok(())
            }
            Kind::Struct(st) => {
                for (name, field) in st.fields() {
                    field.check_defaults().within(name.as_str())?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The entry for `key` in a `DefaultDict` value, inserting the value
    /// descriptor's default when absent.
    pub fn entry_or_default<'a>(&self, value: &'a mut Value, key: &str) -> Result<&'a mut Value> {
        let element = match self.kind() {
            Kind::DefaultMap(element) => element,
            _ => return Err(Error::validation(format!("{self} is not a DefaultDict"))),
        };
        let entries = match value {
            Value::Map(entries) => entries,
            other => {
                return Err(Error::validation(format!(
                    "Expected a map for {self}, got {}",
                    other.shape_name()
                )))
            }
        };
        if !entries.contains_key(key) {
            let fresh = match element.resolve_default().within(key)? {
                Resolved::Value(fresh) => fresh,
                Resolved::Missing => {
                    return Err(Error::default_failed(format!("{element} leaves entries out")).within(key))
                }
            };
            entries.insert(key.to_string(), fresh);
        }
        entries
            .get_mut(key)
            .ok_or_else(|| Error::default_failed("entry vanished after insertion").within(key))
    }
}

impl Kind {
    /// Builds the zero value of this kind.
    pub fn empty_value(&self) -> Result<Value> {
        match self {
            Kind::Any => Ok(Value::Null),
            Kind::Int => Ok(Value::Int(0)),
            Kind::Float => Ok(Value::Float(0.0)),
            Kind::Str => Ok(Value::Str(String::new())),
            Kind::Bool => Ok(Value::Bool(false)),
            Kind::Bytes => Ok(Value::Bytes(Bytes::new())),
            Kind::Path => Ok(Value::Path(PathBuf::new())),
            Kind::Datetime => Err(Error::default_failed("Datetime has no empty value")),
            Kind::List(_) => Ok(Value::List(Vec::new())),
            Kind::Map(_) | Kind::DefaultMap(_) => Ok(Value::Map(IndexMap::new())),
            Kind::Enum(en) => Err(Error::default_failed(format!("{} has no empty value", en.name()))),
            Kind::Tuple(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for (i, element) in elements.iter().enumerate() {
                    out.push(element.kind().empty_value().within(i.to_string())?);
                }
                Ok(Value::Tuple(out))
            }
            Kind::Struct(st) => st.resolve_defaults().map(Value::Struct),
        }
    }

    /// Whether [`empty_value`](Self::empty_value) can succeed.
    pub fn has_empty_value(&self) -> bool {
        match self {
            Kind::Datetime | Kind::Enum(_) => false,
            Kind::Tuple(elements) => elements.iter().all(|element| element.kind().has_empty_value()),
            Kind::Struct(st) => st.is_empty_constructible(),
            _ => true,
        }
    }
}

impl StructType {
    /// Resolves every field's default, in declared order.
    ///
    /// Fails on the first field that is required or whose default fails.
    pub fn resolve_defaults(&self) -> Result<StructValue> {
        let mut out = StructValue::new();
        for (name, field) in self.fields() {
            if let Resolved::Value(value) = field.resolve_default().within(name.as_str())? {
                out.set(name.as_str(), value);
            }
        }
        Ok(out)
    }

    /// True when every field has a default that can resolve, so `{}` parses.
    pub fn is_empty_constructible(&self) -> bool {
        self.fields().all(|(_, field)| field.default_is_resolvable())
    }
}
