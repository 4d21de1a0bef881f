// Descriptor type system for shapecast
//
// A `TypeDescriptor` pairs a kind (scalar, container or structure) with a
// default specifier. Descriptors are immutable once built: every builder
// method returns a new descriptor and containers hold their parameters
// behind `Arc`, so sharing a descriptor across threads is free.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::derive::class::ClassBinding;
use crate::schema::defaults::{DefaultSpec, Factory};
use crate::schema::validator::MAX_EXACT_FLOAT_INT;
use crate::schema::value::Value;

/// The shape a descriptor describes.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    /// Any JSON-shaped value (null, bool, numbers, text, lists, maps).
    Any,
    Int,
    Float,
    Str,
    Bool,
    Bytes,
    Datetime,
    Path,
    /// Homogeneous ordered sequence.
    List(Arc<TypeDescriptor>),
    /// String-keyed map, insertion order preserved.
    Map(Arc<TypeDescriptor>),
    /// String-keyed map whose absent keys read as the value descriptor's default.
    DefaultMap(Arc<TypeDescriptor>),
    /// Fixed-arity heterogeneous sequence.
    Tuple(Arc<[TypeDescriptor]>),
    Struct(Arc<StructType>),
    /// Named integer enumeration; values hold the member name.
    Enum(Arc<EnumType>),
}

impl Kind {
    /// Whether values of this kind are text on the command line.
    pub fn is_string_like(&self) -> bool {
        matches!(self, Kind::Str | Kind::Path | Kind::Datetime | Kind::Bytes)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Kind::List(_) | Kind::Map(_) | Kind::DefaultMap(_) | Kind::Tuple(_))
    }
}

/// A closed set of named integer members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    members: IndexMap<String, i64>,
}

impl EnumType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: IndexMap::new() }
    }

    /// Appends a member. Redeclaring a name replaces its number.
    pub fn member(mut self, name: impl Into<String>, number: i64) -> Self {
        self.members.insert(name.into(), number);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> indexmap::map::Iter<'_, String, i64> {
        self.members.iter()
    }

    pub fn number_of(&self, member: &str) -> Option<i64> {
        self.members.get(member).copied()
    }

    /// The first member declared with `number`.
    pub fn member_of(&self, number: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, n)| **n == number)
            .map(|(name, _)| name.as_str())
    }

    pub fn into_descriptor(self) -> TypeDescriptor {
        TypeDescriptor::enumeration(self)
    }
}

/// A type descriptor: kind plus default specifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    kind: Kind,
    default: DefaultSpec,
}

impl TypeDescriptor {
    /// Creates a required descriptor of the given kind.
    pub fn new(kind: Kind) -> Self {
        Self { kind, default: DefaultSpec::Required }
    }

    pub fn any() -> Self {
        Self::new(Kind::Any)
    }

    pub fn int() -> Self {
        Self::new(Kind::Int)
    }

    pub fn float() -> Self {
        Self::new(Kind::Float)
    }

    pub fn str() -> Self {
        Self::new(Kind::Str)
    }

    pub fn bool() -> Self {
        Self::new(Kind::Bool)
    }

    pub fn bytes() -> Self {
        Self::new(Kind::Bytes)
    }

    pub fn datetime() -> Self {
        Self::new(Kind::Datetime)
    }

    pub fn path() -> Self {
        Self::new(Kind::Path)
    }

    /// `List[element]`
    pub fn list(element: TypeDescriptor) -> Self {
        Self::new(Kind::List(Arc::new(element)))
    }

    /// `Map[Str, value]`
    pub fn map(value: TypeDescriptor) -> Self {
        Self::new(Kind::Map(Arc::new(value)))
    }

    /// `DefaultDict[Str, value]`
    pub fn default_map(value: TypeDescriptor) -> Self {
        Self::new(Kind::DefaultMap(Arc::new(value)))
    }

    /// `Tuple[e1, .., en]`
    pub fn tuple(elements: Vec<TypeDescriptor>) -> Self {
        Self::new(Kind::Tuple(elements.into()))
    }

    pub fn structure(st: impl Into<Arc<StructType>>) -> Self {
        Self::new(Kind::Struct(st.into()))
    }

    pub fn enumeration(en: impl Into<Arc<EnumType>>) -> Self {
        Self::new(Kind::Enum(en.into()))
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn default_spec(&self) -> &DefaultSpec {
        &self.default
    }

    pub fn has_default(&self) -> bool {
        self.default.is_optional()
    }

    /// The nested structure, if this describes one.
    pub fn as_struct(&self) -> Option<&Arc<StructType>> {
        match &self.kind {
            Kind::Struct(st) => Some(st),
            _ => None,
        }
    }

    /// True for structures bound to a constructible class.
    pub fn is_derived_class(&self) -> bool {
        self.as_struct().is_some_and(|st| st.class().is_some())
    }

    /// Returns a copy with a different default specifier.
    ///
    /// Integer constants on a Float descriptor are stored as floats.
    pub fn with_default(&self, default: DefaultSpec) -> Self {
        let default = match (&self.kind, default) {
            (Kind::Float, DefaultSpec::Constant(Value::Int(i)))
                if i.unsigned_abs() <= MAX_EXACT_FLOAT_INT as u64 =>
            {
                DefaultSpec::Constant(Value::Float(i as f64))
            }
            (_, default) => default,
        };
        Self { kind: self.kind.clone(), default }
    }

    /// `.default(v)`: a constant default.
    pub fn default(&self, value: impl Into<Value>) -> Self {
        self.with_default(DefaultSpec::Constant(value.into()))
    }

    /// `.none`: defaults to an explicit null.
    pub fn none(&self) -> Self {
        self.with_default(DefaultSpec::Constant(Value::Null))
    }

    /// `.empty`: defaults to the kind's zero value.
    pub fn empty(&self) -> Self {
        self.with_default(DefaultSpec::Empty)
    }

    /// `.missing`: left out of the structure when not supplied.
    pub fn missing(&self) -> Self {
        self.with_default(DefaultSpec::Missing)
    }

    pub fn required(&self) -> Self {
        self.with_default(DefaultSpec::Required)
    }

    /// `.now`: the current time at resolution.
    pub fn now(&self) -> Self {
        self.with_default(DefaultSpec::Now)
    }

    pub fn factory(&self, factory: Factory) -> Self {
        self.with_default(DefaultSpec::Factory(factory))
    }

    /// The kind without its default, e.g. `List[Bytes]`.
    pub fn type_name(&self) -> String {
        match &self.kind {
            Kind::Any => "Any".to_string(),
            Kind::Int => "Int".to_string(),
            Kind::Float => "Float".to_string(),
            Kind::Str => "Str".to_string(),
            Kind::Bool => "Bool".to_string(),
            Kind::Bytes => "Bytes".to_string(),
            Kind::Datetime => "Datetime".to_string(),
            Kind::Path => "Path".to_string(),
            Kind::List(element) => format!("List[{element}]"),
            Kind::Map(value) => format!("Map[Str, {value}]"),
            Kind::DefaultMap(value) => format!("DefaultDict[Str, {value}]"),
            Kind::Tuple(elements) => {
                let parts: Vec<String> = elements.iter().map(ToString::to_string).collect();
                format!("Tuple[{}]", parts.join(", "))
            }
            Kind::Struct(st) => st.to_string(),
            Kind::Enum(en) => en.name().to_string(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())?;
        match &self.default {
            DefaultSpec::Required => Ok(()),
            DefaultSpec::Constant(Value::Null) => write!(f, ".none"),
            DefaultSpec::Constant(value) => write!(f, ".default({value})"),
            DefaultSpec::Factory(_) => write!(f, ".factory"),
            DefaultSpec::Now => write!(f, ".now"),
            DefaultSpec::Missing => write!(f, ".missing"),
            DefaultSpec::Empty => write!(f, ".empty"),
        }
    }
}

/// Whether a structure has a stable external name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Looked up by name in a [`SchemaRegistry`](crate::schema::SchemaRegistry) on decode.
    Named(String),
    /// Self-describing; persisted together with its schema.
    Anonymous,
}

/// An ordered table of named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    identity: Identity,
    fields: IndexMap<String, TypeDescriptor>,
    class: Option<ClassBinding>,
}

impl StructType {
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_identity(Identity::Named(name.into()))
    }

    pub fn anonymous() -> Self {
        Self::with_identity(Identity::Anonymous)
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self { identity, fields: IndexMap::new(), class: None }
    }

    /// Appends a field. Redeclaring a name replaces its descriptor in place.
    pub fn field(mut self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    pub(crate) fn bind_class(mut self, class: ClassBinding) -> Self {
        self.class = Some(class);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The registered name of a named structure.
    pub fn name(&self) -> Option<&str> {
        match &self.identity {
            Identity::Named(name) => Some(name),
            Identity::Anonymous => None,
        }
    }

    pub fn class(&self) -> Option<&ClassBinding> {
        self.class.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields in declared order.
    pub fn fields(&self) -> indexmap::map::Iter<'_, String, TypeDescriptor> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Wraps this structure in a required descriptor.
    pub fn into_descriptor(self) -> TypeDescriptor {
        TypeDescriptor::structure(self)
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Identity::Named(name) => write!(f, "{name}"),
            Identity::Anonymous => {
                write!(f, "Struct(")?;
                for (i, (name, field)) in self.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {field}")?;
                }
                write!(f, ")")
            }
        }
    }
}
