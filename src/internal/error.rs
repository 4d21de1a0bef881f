use std::fmt;

use thiserror::Error;

/// A dotted field path (`module.layers`, `tricks.2.name`).
///
/// Errors are raised at the innermost point of a recursive conversion and
/// re-rooted with [`Error::within`] while unwinding, so the path is built
/// back to front.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path (the value being converted itself).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parses a dotted path such as `module.layers`.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        Self(dotted.split('.').map(str::to_string).collect())
    }

    /// Returns a copy with `segment` prepended.
    pub fn prefixed(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(segment.into());
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    /// Returns a copy with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        FieldPath::parse(dotted)
    }
}

/// Unified error type for the shapecast library.
///
/// Every variant carries the dotted path of the field where it originated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A value does not have the shape its descriptor describes.
    #[error("Validation Error at `{path}`: {message}")]
    ValidationError { path: FieldPath, message: String },

    /// An encoded value cannot be converted to or from a target representation.
    #[error("Conversion Error at `{path}`: {message}")]
    ConversionError { path: FieldPath, message: String },

    /// A required field was not supplied and has no default.
    #[error("Missing required field `{path}`")]
    MissingRequiredField { path: FieldPath },

    /// A key that no field declares (strict mode only).
    #[error("Unknown field `{path}`")]
    UnknownFieldError { path: FieldPath },

    /// A default could not be produced (factory failure, no empty value, ...).
    #[error("Default Error at `{path}`: {message}")]
    DefaultError { path: FieldPath, message: String },

    /// Derivation could not select a descriptor for a constructor parameter.
    #[error("Unresolvable field type at `{path}`: {message}")]
    UnresolvableFieldType { path: FieldPath, message: String },

    /// The class reference graph loops back on itself.
    #[error("Derivation cycle at `{path}`: {cycle}")]
    DerivationCycleError { path: FieldPath, cycle: String },

    /// A target constructor failed, or its arguments could not be extracted.
    #[error("Materialize Error at `{path}`: {message}")]
    MaterializeError { path: FieldPath, message: String },

    /// Decoding referenced a named structure that was never registered.
    #[error("Unregistered structure `{name}` at `{path}`")]
    UnregisteredStructure { path: FieldPath, name: String },

    /// Bad command-line token.
    #[error("Usage Error at `{path}`: {message}")]
    UsageError { path: FieldPath, message: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::ValidationError { path: FieldPath::root(), message: message.into() }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Error::ConversionError { path: FieldPath::root(), message: message.into() }
    }

    pub fn missing_required() -> Self {
        Error::MissingRequiredField { path: FieldPath::root() }
    }

    pub fn unknown_field(name: impl Into<String>) -> Self {
        Error::UnknownFieldError { path: FieldPath::root().child(name) }
    }

    pub fn default_failed(message: impl Into<String>) -> Self {
        Error::DefaultError { path: FieldPath::root(), message: message.into() }
    }

    pub fn unresolvable(message: impl Into<String>) -> Self {
        Error::UnresolvableFieldType { path: FieldPath::root(), message: message.into() }
    }

    pub fn cycle(cycle: impl Into<String>) -> Self {
        Error::DerivationCycleError { path: FieldPath::root(), cycle: cycle.into() }
    }

    pub fn materialize(message: impl Into<String>) -> Self {
        Error::MaterializeError { path: FieldPath::root(), message: message.into() }
    }

    pub fn unregistered(name: impl Into<String>) -> Self {
        Error::UnregisteredStructure { path: FieldPath::root(), name: name.into() }
    }

    pub fn usage(path: impl Into<FieldPath>, message: impl Into<String>) -> Self {
        Error::UsageError { path: path.into(), message: message.into() }
    }

    /// The dotted path where the error originated.
    pub fn path(&self) -> &FieldPath {
        match self {
            Error::ValidationError { path, .. }
            | Error::ConversionError { path, .. }
            | Error::MissingRequiredField { path }
            | Error::UnknownFieldError { path }
            | Error::DefaultError { path, .. }
            | Error::UnresolvableFieldType { path, .. }
            | Error::DerivationCycleError { path, .. }
            | Error::MaterializeError { path, .. }
            | Error::UnregisteredStructure { path, .. }
            | Error::UsageError { path, .. } => path,
        }
    }

    fn path_mut(&mut self) -> &mut FieldPath {
        match self {
            Error::ValidationError { path, .. }
            | Error::ConversionError { path, .. }
            | Error::MissingRequiredField { path }
            | Error::UnknownFieldError { path }
            | Error::DefaultError { path, .. }
            | Error::UnresolvableFieldType { path, .. }
            | Error::DerivationCycleError { path, .. }
            | Error::MaterializeError { path, .. }
            | Error::UnregisteredStructure { path, .. }
            | Error::UsageError { path, .. } => path,
        }
    }

    /// Re-roots the error one level up: `within("owner")` turns `name` into `owner.name`.
    pub fn within(mut self, segment: impl Into<String>) -> Self {
        let path = self.path_mut();
        *path = path.prefixed(segment);
        self
    }

    /// True for errors that can only happen while building a schema.
    pub fn is_derivation_error(&self) -> bool {
        matches!(self, Error::UnresolvableFieldType { .. } | Error::DerivationCycleError { .. })
    }
}

/// A specialized `Result` type for shapecast operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension for attaching a path segment to the error side of a `Result`.
pub(crate) trait ResultExt<T> {
    fn within(self, segment: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn within(self, segment: impl Into<String>) -> Result<T> {
        self.map_err(|err| err.within(segment))
    }
}
