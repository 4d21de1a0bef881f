// Single-flight derivation cache
//
// One slot per (class, override set). The map lock is only held long enough
// to fetch or create the slot; the derivation itself runs inside the slot's
// `OnceCell`, so concurrent callers for the same key block on one computation
// and all observe its result, failures included.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::{Lazy, OnceCell};
use tracing::debug;

use crate::derive::class::{ClassRef, Derive, Overrides};
use crate::derive::engine;
use crate::internal::error::Result;
use crate::schema::types::{StructType, TypeDescriptor};

static GLOBAL: Lazy<DerivationCache> = Lazy::new(DerivationCache::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    class: TypeId,
    overrides: blake3::Hash,
}

type Slot = Arc<OnceCell<Result<Arc<StructType>>>>;

/// Memoized derivations keyed by class and override fingerprint.
#[derive(Debug, Default)]
pub struct DerivationCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    computed: AtomicUsize,
}

impl DerivationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by [`derive`](crate::derive::derive).
    pub fn global() -> &'static DerivationCache {
        &GLOBAL
    }

    /// Derives `T` with no overrides.
    pub fn derive<T: Derive>(&self) -> Result<TypeDescriptor> {
        self.derive_with::<T>(&Overrides::new())
    }

    /// Derives `T` with caller-supplied overrides.
    pub fn derive_with<T: Derive>(&self, overrides: &Overrides) -> Result<TypeDescriptor> {
        self.derive_class(ClassRef::of::<T>(), overrides).map(TypeDescriptor::structure)
    }

    /// Derives a class, computing it at most once per override set.
    pub fn derive_class(&self, class: ClassRef, overrides: &Overrides) -> Result<Arc<StructType>> {
        let key = CacheKey { class: class.type_id(), overrides: overrides.fingerprint() };
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key).or_default().clone()
        };

        if let Some(done) = slot.get() {
            debug!(class = ?class, "derivation cache hit");
            return done.clone();
        }

        slot.get_or_init(|| {
            debug!(class = ?class, "derivation cache miss");
            self.computed.fetch_add(1, Ordering::Relaxed);
            engine::derive_uncached(class, overrides, self)
        })
        .clone()
    }

    /// Number of cached (class, override set) entries.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many derivations actually ran.
    pub fn computations(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }
}
