// Structural validation for shapecast values
//
// Checks container shape and scalar kind only. Business constraints are out
// of scope; errors carry the dotted path of the first offending value.

use crate::internal::error::{Error, Result, ResultExt};
use crate::schema::types::{Kind, StructType, TypeDescriptor};
use crate::schema::value::{StructValue, Value};

/// Largest integer magnitude a 64-bit float represents exactly.
pub(crate) const MAX_EXACT_FLOAT_INT: i64 = 1 << 53;

/// Configuration for schema validation
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum nesting depth for validation
    pub max_nesting_depth: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { max_nesting_depth: 64 }
    }
}

/// Schema validator
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    config: ValidatorConfig,
}

impl SchemaValidator {
    /// Creates a new schema validator with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new schema validator with custom configuration
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validates a value against a descriptor
    pub fn validate(&self, descriptor: &TypeDescriptor, value: &Value) -> Result<()> {
        self.validate_value(descriptor, value, 0)
    }

    /// Validates a structure value against a structure type
    pub fn validate_struct(&self, st: &StructType, value: &StructValue) -> Result<()> {
        self.validate_fields(st, value, 0)
    }

    fn validate_value(&self, descriptor: &TypeDescriptor, value: &Value, depth: usize) -> Result<()> {
        if depth > self.config.max_nesting_depth {
            return Err(Error::validation(format!(
                "Maximum nesting depth ({}) exceeded",
                self.config.max_nesting_depth
            )));
        }

        match (descriptor.kind(), value) {
            // Every descriptor accepts an explicit null.
            (_, Value::Null) => Ok(()),
            (Kind::Any, value) => self.validate_json_shaped(value, depth),
            (Kind::Int, Value::Int(_)) => Ok(()),
            (Kind::Float, Value::Float(_)) => Ok(()),
            (Kind::Str, Value::Str(_)) => Ok(()),
            (Kind::Bool, Value::Bool(_)) => Ok(()),
            (Kind::Bytes, Value::Bytes(_)) => Ok(()),
            (Kind::Datetime, Value::Datetime(_)) => Ok(()),
            (Kind::Path, Value::Path(_)) => Ok(()),
            (Kind::List(element), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.validate_value(element, item, depth + 1).within(i.to_string())?;
                }
                Ok(())
            }
            (Kind::Map(element) | Kind::DefaultMap(element), Value::Map(entries)) => {
                for (key, item) in entries {
                    self.validate_value(element, item, depth + 1).within(key.as_str())?;
                }
                Ok(())
            }
            (Kind::Enum(en), Value::Str(member)) => match en.number_of(member) {
                Some(_) => Ok(()),
                None => Err(Error::validation(format!("`{member}` is not a member of {}", en.name()))),
            },
            (Kind::Tuple(elements), Value::Tuple(items)) => {
                if elements.len() != items.len() {
                    return Err(Error::validation(format!(
                        "Tuple arity mismatch: expected {}, got {}",
                        elements.len(),
                        items.len()
                    )));
                }
                for (i, (element, item)) in elements.iter().zip(items).enumerate() {
                    self.validate_value(element, item, depth + 1).within(i.to_string())?;
                }
                Ok(())
            }
            (Kind::Struct(st), Value::Struct(fields)) => self.validate_fields(st, fields, depth),
            (_, value) => Err(Error::validation(format!(
                "Type mismatch: expected {}, got {}",
                descriptor.type_name(),
                value.shape_name()
            ))),
        }
    }

    fn validate_fields(&self, st: &StructType, value: &StructValue, depth: usize) -> Result<()> {
        for (name, _) in value.iter() {
            if !st.contains(name) {
                return Err(Error::validation(format!("{st} has no field `{name}`")).within(name.as_str()));
            }
        }
        for (name, field) in st.fields() {
            match value.get(name) {
                Some(item) => self.validate_value(field, item, depth + 1).within(name.as_str())?,
                None if field.has_default() => {}
                None => return Err(Error::missing_required().within(name.as_str())),
            }
        }
        Ok(())
    }

    fn validate_json_shaped(&self, value: &Value, depth: usize) -> Result<()> {
        if depth > self.config.max_nesting_depth {
            return Err(Error::validation(format!(
                "Maximum nesting depth ({}) exceeded",
                self.config.max_nesting_depth
            )));
        }
        match value {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => Ok(()),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.validate_json_shaped(item, depth + 1).within(i.to_string())?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                for (key, item) in entries {
                    self.validate_json_shaped(item, depth + 1).within(key.as_str())?;
                }
                Ok(())
            }
            other => Err(Error::validation(format!(
                "Any only holds JSON-shaped values, got {}",
                other.shape_name()
            ))),
        }
    }
}

impl TypeDescriptor {
    /// Validates `value` with the default validator configuration.
    pub fn validate(&self, value: &Value) -> Result<()> {
        SchemaValidator::new().validate(self, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_scalars_and_null() {
        assert!(TypeDescriptor::int().validate(&Value::Int(1)).is_ok());
        assert!(TypeDescriptor::int().validate(&Value::Null).is_ok());
        assert!(TypeDescriptor::int().validate(&Value::Str("1".into())).is_err());
        assert!(TypeDescriptor::float().validate(&Value::Float(3.0)).is_ok());
        assert!(TypeDescriptor::float().validate(&Value::Int(3)).is_err());
    }

    #[test]
    fn test_enum_members_and_default_maps() {
        let colour = crate::schema::types::EnumType::new("Colour").member("red", 1).into_descriptor();
        assert!(colour.validate(&Value::Str("red".into())).is_ok());
        assert!(colour.validate(&Value::Str("blue".into())).is_err());
        assert!(colour.validate(&Value::Int(1)).is_err());

        let counts = TypeDescriptor::default_map(TypeDescriptor::int().default(0));
        let err = counts.validate(&Value::Map([("a".to_string(), Value::Bool(true))].into_iter().collect())).unwrap_err();
        assert_eq!(err.path().to_string(), "a");
    }

    #[test]
    fn test_list_reports_failing_index() {
        let desc = TypeDescriptor::list(TypeDescriptor::int());
        let value = Value::List(vec![Value::Int(1), Value::Int(2), Value::Bool(true)]);
        let err = desc.validate(&value).unwrap_err();
        assert_eq!(err.path().to_string(), "2");
    }

    #[test]
    fn test_any_rejects_blobs() {
        let value = Value::List(vec![Value::Bytes(Bytes::from_static(b"x"))]);
        assert!(TypeDescriptor::any().validate(&value).is_err());
        assert!(TypeDescriptor::any().validate(&Value::from(vec!["a", "b"])).is_ok());
    }

    #[test]
    fn test_struct_fields() {
        let st = StructType::named("Dog")
            .field("name", TypeDescriptor::str())
            .field("nick", TypeDescriptor::str().missing());
        let desc = st.into_descriptor();

        let ok = StructValue::new().with("name", "Laika");
        assert!(desc.validate(&Value::Struct(ok)).is_ok());

        let missing = StructValue::new();
        let err = desc.validate(&Value::Struct(missing)).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { .. }));

        let extra = StructValue::new().with("name", "Laika").with("bogus", 1);
        let err = desc.validate(&Value::Struct(extra)).unwrap_err();
        assert_eq!(err.path().to_string(), "bogus");
    }

    #[test]
    fn test_max_depth() {
        let mut desc = TypeDescriptor::int();
        let mut value = Value::Int(1);
        for _ in 0..4 {
            desc = TypeDescriptor::list(desc);
            value = Value::List(vec![value]);
        }
        let shallow = SchemaValidator::with_config(ValidatorConfig { max_nesting_depth: 2 });
        assert!(shallow.validate(&desc, &value).is_err());
        assert!(SchemaValidator::new().validate(&desc, &value).is_ok());
    }
}
