// Schema module for shapecast
//
// This module provides the descriptor model and the value-level half of the
// conversion pipeline. It includes:
//
// 1. Type descriptors for scalars, containers, enumerations and structures
// 2. Default resolution (required, constant, factory, missing, empty)
// 3. Structural validation
// 4. Target mapping and structure parsing
// 5. The named-structure registry, schema snapshots and persistence envelopes

// Re-export public types and functions
pub use self::defaults::{DefaultSpec, Factory, FactoryError, Resolved};
pub use self::envelope::Envelope;
pub use self::mapper::{MapperConfig, SchemaMapper, UnknownFields};
pub use self::registry::SchemaRegistry;
pub use self::snapshot::SchemaSnapshot;
pub use self::types::{EnumType, Identity, Kind, StructType, TypeDescriptor};
pub use self::validator::{SchemaValidator, ValidatorConfig};
pub use self::value::{StructValue, Value};

// Sub-modules
pub mod defaults;
pub mod envelope;
pub mod mapper;
pub mod registry;
pub mod snapshot;
pub mod types;
pub mod validator;
pub mod value;
