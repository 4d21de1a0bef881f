// Materialization: structure values into live instances
//
// The second pipeline stage. Nested structures are materialized depth-first
// in declared field order, so a class constructor only ever sees arguments
// whose own constructors already succeeded.

pub use self::args::{Arg, Arguments, FromArg};

pub mod args;

use std::any::Any;

use indexmap::IndexMap;
use tracing::trace;

use crate::codec::types::{Encoded, Target};
use crate::derive::class::{ClassBinding, ConstructError, Derive};
use crate::internal::error::{Error, Result, ResultExt};
use crate::schema::types::{Kind, StructType, TypeDescriptor};
use crate::schema::value::{StructValue, Value};

/// Materializes a value against its descriptor into an argument tree.
pub fn materialize_value(descriptor: &TypeDescriptor, value: &Value) -> Result<Arg> {
    match (descriptor.kind(), value) {
        (_, Value::Null) => Ok(Arg::Value(Value::Null)),
        (Kind::Struct(st), Value::Struct(fields)) => materialize_struct(st, fields),
        (Kind::List(element), Value::List(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(materialize_value(element, item).within(i.to_string())?);
            }
            Ok(Arg::List(out))
        }
        (Kind::Tuple(elements), Value::Tuple(items)) if elements.len() == items.len() => {
            let mut out = Vec::with_capacity(items.len());
            for (i, (element, item)) in elements.iter().zip(items).enumerate() {
                out.push(materialize_value(element, item).within(i.to_string())?);
            }
            Ok(Arg::Tuple(out))
        }
        (Kind::Map(element) | Kind::DefaultMap(element), Value::Map(entries)) => {
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                out.insert(key.clone(), materialize_value(element, item).within(key.as_str())?);
            }
            Ok(Arg::Map(out))
        }
        (Kind::Struct(_) | Kind::List(_) | Kind::Tuple(_) | Kind::Map(_) | Kind::DefaultMap(_), other) => {
            Err(Error::validation(format!(
                "Type mismatch: expected {}, got {}",
                descriptor.type_name(),
                other.shape_name()
            )))
        }
        (_, other) => Ok(Arg::Value(other.clone())),
    }
}

/// Materializes a structure value, invoking its class constructor if bound.
pub fn materialize_struct(st: &StructType, value: &StructValue) -> Result<Arg> {
    for name in value.names() {
        if !st.contains(name) {
            return Err(Error::validation(format!("{st} has no field `{name}`")).within(name));
        }
    }

    let mut entries = IndexMap::with_capacity(value.len());
    for (name, field) in st.fields() {
        if let Some(item) = value.get(name) {
            entries.insert(name.clone(), materialize_value(field, item).within(name.as_str())?);
        }
    }

    match st.class() {
        Some(binding) => {
            let mut args = Arguments::new(entries);
            let instance = binding
                .construct(&mut args)
                .map_err(|err| constructor_failed(binding, err))?;
            trace!(class = %binding.name(), "materialized instance");
            Ok(Arg::Instance(instance))
        }
        None => Ok(Arg::Struct(entries)),
    }
}

fn constructor_failed(binding: &ClassBinding, err: ConstructError) -> Error {
    let mut error = Error::materialize(format!("{} constructor failed: {}", binding.name(), err.message));
    if let Some(field) = &err.field {
        for segment in field.rsplit('.') {
            error = error.within(segment);
        }
    }
    error
}

/// Materializes `value` through `descriptor` and downcasts the instance.
pub fn materialize_as<T: Any>(descriptor: &TypeDescriptor, value: &Value) -> Result<T> {
    materialize_value(descriptor, value)?
        .into_instance()
        .map_err(|err| Error::materialize(err.message))
}

/// Materializes a structure value into `T`, deriving `T`'s descriptor.
pub fn materialize<T: Derive>(value: &StructValue) -> Result<T> {
    let descriptor = crate::derive::derive::<T>()?;
    let st = descriptor
        .as_struct()
        .ok_or_else(|| Error::materialize("derived descriptor is not a structure"))?;
    materialize_struct(st, value)?
        .into_instance()
        .map_err(|err| Error::materialize(err.message))
}

/// Parses raw target input for `T` and materializes it.
pub fn from_target<T: Derive>(raw: &Encoded, target: Target) -> Result<T> {
    let descriptor = crate::derive::derive::<T>()?;
    let st = descriptor
        .as_struct()
        .ok_or_else(|| Error::materialize("derived descriptor is not a structure"))?;
    let value = st.parse(raw, target)?;
    materialize_struct(st, &value)?
        .into_instance()
        .map_err(|err| Error::materialize(err.message))
}
