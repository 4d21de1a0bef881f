// Default-shape inference
//
// When a parameter has no annotation, the kind of its default value picks the
// descriptor. Scalars map to themselves,
// null maps to Any, and containers infer their element kind only when every
// element agrees. `guess_struct` applies the same rules to a table of
// example values.

use crate::internal::error::{Error, Result, ResultExt};
use crate::schema::types::{Identity, StructType, TypeDescriptor};
use crate::schema::value::Value;

/// Builds a structure whose fields are inferred from example values, each
/// example becoming that field's constant default.
///
/// A `None` name makes the structure anonymous.
pub fn guess_struct<I, K>(name: Option<&str>, examples: I) -> Result<StructType>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let identity = match name {
        Some(name) => Identity::Named(name.to_string()),
        None => Identity::Anonymous,
    };
    let mut st = StructType::with_identity(identity);
    for (field, example) in examples {
        let field = field.into();
        let descriptor = descriptor_for_value(&example).within(field.as_str())?.default(example);
        st = st.field(field, descriptor);
    }
    Ok(st)
}

/// Infers a required descriptor from a default value's shape.
pub fn descriptor_for_value(value: &Value) -> Result<TypeDescriptor> {
    match value {
        Value::Null => Ok(TypeDescriptor::any()),
        Value::Bool(_) => Ok(TypeDescriptor::bool()),
        Value::Int(_) => Ok(TypeDescriptor::int()),
        Value::Float(_) => Ok(TypeDescriptor::float()),
        Value::Str(_) => Ok(TypeDescriptor::str()),
        Value::Bytes(_) => Ok(TypeDescriptor::bytes()),
        Value::Datetime(_) => Ok(TypeDescriptor::datetime()),
        Value::Path(_) => Ok(TypeDescriptor::path()),
        Value::List(items) => Ok(TypeDescriptor::list(common_descriptor(items.iter())?)),
        Value::Map(entries) => Ok(TypeDescriptor::map(common_descriptor(entries.values())?)),
        Value::Tuple(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                elements.push(descriptor_for_value(item).within(i.to_string())?);
            }
            Ok(TypeDescriptor::tuple(elements))
        }
        Value::Struct(_) => Err(Error::unresolvable(
            "a structure default needs an annotation to name its type",
        )),
    }
}

// The shared element descriptor, or Any when elements disagree or there are none.
fn common_descriptor<'a>(items: impl Iterator<Item = &'a Value>) -> Result<TypeDescriptor> {
    let mut common: Option<TypeDescriptor> = None;
    for (i, item) in items.enumerate() {
        let descriptor = descriptor_for_value(item).within(i.to_string())?;
        match &common {
            None => common = Some(descriptor),
            Some(existing) if *existing == descriptor => {}
            Some(_) => return Ok(TypeDescriptor::any()),
        }
    }
    Ok(common.unwrap_or_else(TypeDescriptor::any))
}
