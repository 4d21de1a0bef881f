// shapecast library entry point
//
// Typed schemas with default resolution, a derivation engine that builds
// structure descriptors from declarative class tables, and a two-stage
// conversion pipeline (parse into structural values, then materialize) for
// a JSON-safe and a rich binary target.

pub mod cli;
pub mod codec;
pub mod derive;
pub mod internal;
pub mod materialize;
pub mod schema;

pub use crate::cli::{CliConfig, CliOutcome, CliParser};
pub use crate::codec::{Encoded, Target};
pub use crate::derive::{
    derive, derive_with, guess_struct, Annotation, ClassSpec, ConstructError, ConstructResult, Derive, Override,
    Overrides, Param,
};
pub use crate::internal::error::{Error, FieldPath, Result};
pub use crate::materialize::{from_target, materialize, Arg, Arguments, FromArg};
pub use crate::schema::{
    DefaultSpec, EnumType, Envelope, Factory, Kind, MapperConfig, SchemaMapper, SchemaRegistry, SchemaSnapshot,
    StructType, StructValue, TypeDescriptor, UnknownFields, Value,
};
