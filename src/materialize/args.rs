// Constructor arguments
//
// Materialization hands each constructor an `Arguments` table of already
// materialized fields. Nested classes arrive as boxed instances, everything
// else as plain values or containers of arguments.

use std::any::{type_name, Any};
use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::derive::class::{ConstructError, ConstructResult};
use crate::schema::value::{StructValue, Value};

/// A materialized argument.
pub enum Arg {
    Value(Value),
    /// A constructed class instance.
    Instance(Box<dyn Any + Send>),
    List(Vec<Arg>),
    Tuple(Vec<Arg>),
    Map(IndexMap<String, Arg>),
    /// A structure without a class binding.
    Struct(IndexMap<String, Arg>),
}

impl Arg {
    pub fn shape_name(&self) -> &'static str {
        match self {
            Arg::Value(value) => value.shape_name(),
            Arg::Instance(_) => "instance",
            Arg::List(_) => "list",
            Arg::Tuple(_) => "tuple",
            Arg::Map(_) => "map",
            Arg::Struct(_) => "struct",
        }
    }

    /// Reassembles a plain value. Fails if an instance is found anywhere inside.
    pub fn into_value(self) -> ConstructResult<Value> {
        match self {
            Arg::Value(value) => Ok(value),
            Arg::Instance(_) => Err(ConstructError::new("a constructed instance is not a plain value")),
            Arg::List(items) => collect_values(items).map(Value::List),
            Arg::Tuple(items) => collect_values(items).map(Value::Tuple),
            Arg::Map(entries) => collect_entries(entries).map(Value::Map),
            Arg::Struct(entries) => collect_entries(entries).map(|fields| Value::Struct(fields.into())),
        }
    }

    /// Downcasts a constructed instance.
    pub fn into_instance<T: Any>(self) -> ConstructResult<T> {
        match self {
            Arg::Instance(boxed) => boxed
                .downcast::<T>()
                .map(|instance| *instance)
                .map_err(|_| ConstructError::new(format!("instance is not a {}", type_name::<T>()))),
            other => Err(ConstructError::new(format!(
                "expected a constructed instance, got {}",
                other.shape_name()
            ))),
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => write!(f, "Value({value:?})"),
            Arg::Instance(_) => write!(f, "Instance(..)"),
            Arg::List(items) => f.debug_tuple("List").field(items).finish(),
            Arg::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Arg::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Arg::Struct(entries) => f.debug_tuple("Struct").field(entries).finish(),
        }
    }
}

fn collect_values(items: Vec<Arg>) -> ConstructResult<Vec<Value>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| item.into_value().map_err(|err| err.within(i.to_string())))
        .collect()
}

fn collect_entries(entries: IndexMap<String, Arg>) -> ConstructResult<IndexMap<String, Value>> {
    entries
        .into_iter()
        .map(|(key, item)| {
            let value = item.into_value().map_err(|err| err.within(key.as_str()))?;
            Ok((key, value))
        })
        .collect()
}

impl ConstructError {
    /// Prefixes the field path with `segment`.
    pub fn within(mut self, segment: impl Into<String>) -> Self {
        let segment = segment.into();
        self.field = Some(match self.field.take() {
            Some(inner) => format!("{segment}.{inner}"),
            None => segment,
        });
        self
    }
}

/// Conversion from a materialized argument into a constructor input.
pub trait FromArg: Sized {
    fn from_arg(arg: Arg) -> ConstructResult<Self>;
}

fn mismatch(expected: &str, arg: &Arg) -> ConstructError {
    ConstructError::new(format!("expected {expected}, got {}", arg.shape_name()))
}

impl FromArg for Arg {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        Ok(arg)
    }
}

impl FromArg for Value {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        arg.into_value()
    }
}

impl FromArg for bool {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Value(Value::Bool(b)) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromArg for i64 {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Value(Value::Int(i)) => Ok(i),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromArg for f64 {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Value(Value::Float(f)) => Ok(f),
            Arg::Value(Value::Int(i)) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromArg for String {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Value(Value::Str(s)) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromArg for Bytes {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Value(Value::Bytes(b)) => Ok(b),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FromArg for DateTime<Utc> {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Value(Value::Datetime(d)) => Ok(d),
            other => Err(mismatch("datetime", &other)),
        }
    }
}

impl FromArg for PathBuf {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Value(Value::Path(p)) => Ok(p),
            other => Err(mismatch("path", &other)),
        }
    }
}

impl FromArg for StructValue {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Struct(entries) => collect_entries(entries).map(StructValue::from),
            Arg::Value(Value::Struct(fields)) => Ok(fields),
            other => Err(mismatch("struct", &other)),
        }
    }
}

impl<T: FromArg> FromArg for Option<T> {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Value(Value::Null) => Ok(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

impl<T: FromArg> FromArg for Vec<T> {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        let items = match arg {
            Arg::List(items) | Arg::Tuple(items) => items,
            Arg::Value(Value::List(values)) | Arg::Value(Value::Tuple(values)) => {
                values.into_iter().map(Arg::Value).collect()
            }
            other => return Err(mismatch("list", &other)),
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| T::from_arg(item).map_err(|err| err.within(i.to_string())))
            .collect()
    }
}

impl<T: FromArg> FromArg for IndexMap<String, T> {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        let entries = match arg {
            Arg::Map(entries) => entries,
            Arg::Value(Value::Map(values)) => values.into_iter().map(|(k, v)| (k, Arg::Value(v))).collect(),
            other => return Err(mismatch("map", &other)),
        };
        entries
            .into_iter()
            .map(|(key, item)| {
                let value = T::from_arg(item).map_err(|err| err.within(key.as_str()))?;
                Ok((key, value))
            })
            .collect()
    }
}

impl<A: FromArg, B: FromArg> FromArg for (A, B) {
    fn from_arg(arg: Arg) -> ConstructResult<Self> {
        match arg {
            Arg::Tuple(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(a), Some(b)) => Ok((
                        A::from_arg(a).map_err(|err| err.within("0"))?,
                        B::from_arg(b).map_err(|err| err.within("1"))?,
                    )),
                    _ => Err(ConstructError::new("expected a pair")),
                }
            }
            other => Err(mismatch("pair", &other)),
        }
    }
}

/// The named arguments passed to a constructor.
#[derive(Debug, Default)]
pub struct Arguments {
    entries: IndexMap<String, Arg>,
}

impl Arguments {
    pub fn new(entries: IndexMap<String, Arg>) -> Self {
        Self { entries }
    }

    /// Removes and returns a raw argument.
    pub fn take(&mut self, name: &str) -> Option<Arg> {
        self.entries.shift_remove(name)
    }

    /// Extracts a required argument.
    pub fn value<T: FromArg>(&mut self, name: &str) -> ConstructResult<T> {
        let arg = self
            .take(name)
            .ok_or_else(|| ConstructError::at(name, "argument was not supplied"))?;
        T::from_arg(arg).map_err(|err| err.within(name))
    }

    /// Extracts an argument that may be absent or null.
    pub fn optional<T: FromArg>(&mut self, name: &str) -> ConstructResult<Option<T>> {
        match self.take(name) {
            None | Some(Arg::Value(Value::Null)) => Ok(None),
            Some(arg) => T::from_arg(arg).map(Some).map_err(|err| err.within(name)),
        }
    }

    /// Extracts a nested class instance.
    pub fn instance<T: Any>(&mut self, name: &str) -> ConstructResult<T> {
        let arg = self
            .take(name)
            .ok_or_else(|| ConstructError::at(name, "argument was not supplied"))?;
        arg.into_instance().map_err(|err| err.within(name))
    }

    /// Extracts a nested class instance that may be absent or null.
    pub fn optional_instance<T: Any>(&mut self, name: &str) -> ConstructResult<Option<T>> {
        match self.take(name) {
            None | Some(Arg::Value(Value::Null)) => Ok(None),
            Some(arg) => arg.into_instance().map(Some).map_err(|err| err.within(name)),
        }
    }

    /// Extracts a list of nested class instances.
    pub fn instances<T: Any>(&mut self, name: &str) -> ConstructResult<Vec<T>> {
        let items = match self.take(name) {
            Some(Arg::List(items)) | Some(Arg::Tuple(items)) => items,
            Some(other) => return Err(mismatch("list of instances", &other).within(name)),
            None => return Err(ConstructError::at(name, "argument was not supplied")),
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| item.into_instance().map_err(|err| err.within(i.to_string()).within(name)))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names not yet taken, in declared order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Everything not yet taken.
    pub fn into_rest(self) -> IndexMap<String, Arg> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(entries: Vec<(&str, Arg)>) -> Arguments {
        Arguments::new(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn test_value_extraction() {
        let mut a = args(vec![
            ("name", Arg::Value(Value::from("Laika"))),
            ("age", Arg::Value(Value::Int(3))),
            ("tags", Arg::List(vec![Arg::Value(Value::from("a")), Arg::Value(Value::from("b"))])),
        ]);
        assert_eq!(a.value::<String>("name").unwrap(), "Laika");
        assert_eq!(a.value::<f64>("age").unwrap(), 3.0);
        assert_eq!(a.value::<Vec<String>>("tags").unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert!(a.is_empty());
    }

    #[test]
    fn test_missing_and_optional() {
        let mut a = args(vec![("nick", Arg::Value(Value::Null))]);
        assert_eq!(a.optional::<String>("nick").unwrap(), None);
        assert_eq!(a.optional::<String>("absent").unwrap(), None);
        let err = a.value::<String>("name").unwrap_err();
        assert_eq!(err.field.as_deref(), Some("name"));
    }

    #[test]
    fn test_nested_error_field_path() {
        let mut a = args(vec![(
            "tags",
            Arg::List(vec![Arg::Value(Value::from("a")), Arg::Value(Value::Int(1))]),
        )]);
        let err = a.value::<Vec<String>>("tags").unwrap_err();
        assert_eq!(err.field.as_deref(), Some("tags.1"));
    }

    #[test]
    fn test_instances() {
        let mut a = args(vec![(
            "pets",
            Arg::List(vec![Arg::Instance(Box::new(1u8)), Arg::Instance(Box::new(2u8))]),
        )]);
        assert_eq!(a.instances::<u8>("pets").unwrap(), vec![1, 2]);

        let mut wrong = args(vec![("pet", Arg::Instance(Box::new(1u8)))]);
        assert!(wrong.instance::<String>("pet").is_err());
    }

    #[test]
    fn test_into_value_rejects_instances() {
        let arg = Arg::Struct([("x".to_string(), Arg::Instance(Box::new(0u8)))].into_iter().collect());
        let err = arg.into_value().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("x"));
    }
}
