// Derivation module for shapecast
//
// Builds structure descriptors from declarative class tables instead of
// runtime introspection. Results are memoized per (class, overrides) in a
// process-wide single-flight cache.

pub use self::cache::DerivationCache;
pub use self::class::{
    Annotation, ClassBinding, ClassRef, ClassSpec, ConstructError, ConstructResult, Derive, Override,
    Overrides, Param, ParamDefault, ParamKind,
};
pub use self::inference::guess_struct;

pub mod cache;
pub mod class;
mod engine;
pub mod inference;

use crate::internal::error::Result;
use crate::schema::types::TypeDescriptor;

/// Derives the structure descriptor of `T` through the global cache.
pub fn derive<T: Derive>() -> Result<TypeDescriptor> {
    DerivationCache::global().derive::<T>()
}

/// Derives `T` with overrides through the global cache.
pub fn derive_with<T: Derive>(overrides: &Overrides) -> Result<TypeDescriptor> {
    DerivationCache::global().derive_with::<T>(overrides)
}
