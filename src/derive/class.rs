// Class tables for derivation
//
// A derivable class describes its constructor as a declarative parameter
// table (`ClassSpec`) and supplies a construction function that pulls its
// arguments by name. Derivation reads the table; materialization calls the
// constructor.

use std::any::{Any, TypeId};
use std::fmt;

use indexmap::IndexMap;

use crate::materialize::Arguments;
use crate::schema::defaults::{DefaultSpec, Factory};
use crate::schema::types::TypeDescriptor;
use crate::schema::value::Value;

/// Result of a user constructor.
pub type ConstructResult<T> = std::result::Result<T, ConstructError>;

/// A constructor failure, optionally tied to the argument that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructError {
    /// Dotted path of the offending argument, relative to the constructor.
    pub field: Option<String>,
    pub message: String,
}

impl ConstructError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { field: None, message: message.into() }
    }

    pub fn at(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: Some(field.into()), message: message.into() }
    }
}

impl fmt::Display for ConstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "`{field}`: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ConstructError {}

/// A class whose structure descriptor can be derived from its constructor table.
///
/// ```ignore
/// impl Derive for Owner {
///     fn class_spec() -> ClassSpec {
///         ClassSpec::new("Owner").param(Param::new("name").annotated(Annotation::Str))
///     }
///     fn construct(args: &mut Arguments) -> ConstructResult<Self> {
///         Ok(Owner { name: args.value("name")? })
///     }
/// }
/// ```
pub trait Derive: Sized + Send + 'static {
    /// The constructor's parameter table.
    fn class_spec() -> ClassSpec;

    /// Builds an instance from resolved arguments.
    fn construct(args: &mut Arguments) -> ConstructResult<Self>;
}

pub(crate) type ConstructFn = fn(&mut Arguments) -> ConstructResult<Box<dyn Any + Send>>;

fn construct_boxed<T: Derive>(args: &mut Arguments) -> ConstructResult<Box<dyn Any + Send>> {
    T::construct(args).map(|instance| Box::new(instance) as Box<dyn Any + Send>)
}

/// A type-erased reference to a derivable class.
#[derive(Clone, Copy)]
pub struct ClassRef {
    type_id: TypeId,
    spec: fn() -> ClassSpec,
    construct: ConstructFn,
}

impl ClassRef {
    pub fn of<T: Derive>() -> Self {
        Self { type_id: TypeId::of::<T>(), spec: T::class_spec, construct: construct_boxed::<T> }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn spec(&self) -> ClassSpec {
        (self.spec)()
    }

    pub(crate) fn binding(&self, name: &str) -> ClassBinding {
        ClassBinding { type_id: self.type_id, name: name.to_string(), construct: self.construct }
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassRef({})", self.spec().name)
    }
}

/// The constructor attached to a derived structure.
#[derive(Clone)]
pub struct ClassBinding {
    type_id: TypeId,
    name: String,
    construct: ConstructFn,
}

impl ClassBinding {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn construct(&self, args: &mut Arguments) -> ConstructResult<Box<dyn Any + Send>> {
        (self.construct)(args)
    }
}

impl PartialEq for ClassBinding {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for ClassBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassBinding({})", self.name)
    }
}

/// A constructor parameter annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Any,
    Int,
    Float,
    Str,
    Bool,
    Bytes,
    Datetime,
    Path,
    List(Box<Annotation>),
    Map(Box<Annotation>),
    Tuple(Vec<Annotation>),
    /// Another derivable class.
    Class(ClassRef),
    /// A ready-made descriptor, used as is.
    Descriptor(TypeDescriptor),
}

impl Annotation {
    pub fn class<T: Derive>() -> Self {
        Annotation::Class(ClassRef::of::<T>())
    }

    pub fn list(element: Annotation) -> Self {
        Annotation::List(Box::new(element))
    }

    pub fn map(value: Annotation) -> Self {
        Annotation::Map(Box::new(value))
    }

    /// Classes referenced anywhere inside this annotation.
    pub(crate) fn class_refs(&self, out: &mut Vec<ClassRef>) {
        match self {
            Annotation::List(inner) | Annotation::Map(inner) => inner.class_refs(out),
            Annotation::Tuple(items) => items.iter().for_each(|item| item.class_refs(out)),
            Annotation::Class(class) => out.push(*class),
            _ => {}
        }
    }
}

/// How a parameter receives its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamKind {
    #[default]
    Positional,
    /// Collects extra positional arguments into a list.
    Variadic,
    /// Collects extra keyword arguments into a map.
    Keywords,
}

/// A parameter's declared default.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParamDefault {
    #[default]
    Unset,
    Spec(DefaultSpec),
    /// A default-constructed instance of another class.
    Instance(ClassRef),
}

/// One constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<Annotation>,
    pub default: ParamDefault,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Positional,
            annotation: None,
            default: ParamDefault::Unset,
        }
    }

    pub fn variadic(name: impl Into<String>) -> Self {
        Self { kind: ParamKind::Variadic, ..Self::new(name) }
    }

    pub fn keywords(name: impl Into<String>) -> Self {
        Self { kind: ParamKind::Keywords, ..Self::new(name) }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn default(self, value: impl Into<Value>) -> Self {
        self.default_spec(DefaultSpec::Constant(value.into()))
    }

    pub fn default_spec(mut self, spec: DefaultSpec) -> Self {
        self.default = ParamDefault::Spec(spec);
        self
    }

    pub fn none(self) -> Self {
        self.default_spec(DefaultSpec::Constant(Value::Null))
    }

    pub fn empty(self) -> Self {
        self.default_spec(DefaultSpec::Empty)
    }

    pub fn missing(self) -> Self {
        self.default_spec(DefaultSpec::Missing)
    }

    pub fn now(self) -> Self {
        self.default_spec(DefaultSpec::Now)
    }

    pub fn factory(self, factory: Factory) -> Self {
        self.default_spec(DefaultSpec::Factory(factory))
    }

    /// Defaults to an instance of `T` built from its own defaults.
    pub fn default_instance<T: Derive>(mut self) -> Self {
        self.default = ParamDefault::Instance(ClassRef::of::<T>());
        self
    }

    pub(crate) fn class_refs(&self) -> Vec<ClassRef> {
        let mut out = Vec::new();
        if let Some(annotation) = &self.annotation {
            annotation.class_refs(&mut out);
        }
        if let ParamDefault::Instance(class) = &self.default {
            out.push(*class);
        }
        out
    }
}

/// A class's constructor table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSpec {
    pub name: String,
    pub params: Vec<Param>,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Vec::new() }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name == name)
    }
}

/// A per-field override applied after derivation's own rules.
#[derive(Debug, Clone, PartialEq)]
pub enum Override {
    /// Use the descriptor's own default, discarding the parameter's.
    SchemaDefault,
    /// A constant default.
    Value(Value),
    /// Any default specifier.
    Default(DefaultSpec),
    /// Replace the field's descriptor wholesale.
    Descriptor(TypeDescriptor),
}

/// Overrides keyed by parameter name. A name that is absent is left alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Overrides {
    entries: IndexMap<String, Override>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, entry: Override) -> Self {
        self.entries.insert(name.into(), entry);
        self
    }

    pub fn value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, Override::Value(value.into()))
    }

    pub fn schema_default(self, name: impl Into<String>) -> Self {
        self.set(name, Override::SchemaDefault)
    }

    pub fn default_spec(self, name: impl Into<String>, spec: DefaultSpec) -> Self {
        self.set(name, Override::Default(spec))
    }

    pub fn descriptor(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.set(name, Override::Descriptor(descriptor))
    }

    pub fn get(&self, name: &str) -> Option<&Override> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order-insensitive content hash, used as the derivation cache key.
    ///
    /// Factories hash by identity, so two distinct closures never collide.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        let mut hasher = blake3::Hasher::new();
        for name in names {
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
            hasher.update(format!("{:?}", self.entries[name]).as_bytes());
            hasher.update(b"\0");
        }
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let a = Overrides::new().value("x", 1).value("y", "two");
        let b = Overrides::new().value("y", "two").value("x", 1);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), Overrides::new().fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_factories() {
        let f1 = Factory::from_fn(|| 1i64);
        let f2 = Factory::from_fn(|| 1i64);
        let a = Overrides::new().default_spec("x", DefaultSpec::Factory(f1.clone()));
        let b = Overrides::new().default_spec("x", DefaultSpec::Factory(f2));
        let c = Overrides::new().default_spec("x", DefaultSpec::Factory(f1));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_param_builders() {
        let param = Param::variadic("rest").annotated(Annotation::Int);
        assert_eq!(param.kind, ParamKind::Variadic);
        assert_eq!(param.default, ParamDefault::Unset);
        let param = Param::new("n").default(3);
        assert_eq!(param.default, ParamDefault::Spec(DefaultSpec::Constant(Value::Int(3))));
    }

    #[test]
    fn test_construct_error_display() {
        assert_eq!(ConstructError::at("age", "negative").to_string(), "`age`: negative");
        assert_eq!(ConstructError::new("bad").to_string(), "bad");
    }
}
