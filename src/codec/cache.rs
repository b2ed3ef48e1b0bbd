//! Memoized resolved descriptors, one per concrete type.

use super::{Codec, TypeDescriptor};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

/// Cache of resolved descriptors keyed by the concrete Rust type.
///
/// Generic substitution runs once per distinct instantiation; `Page<i64>`
/// and `Page<String>` get separate entries.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: DashMap<TypeId, Arc<TypeDescriptor>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved descriptor of `T`, computed on first use.
    pub fn get_or_resolve<T: Codec>(&self) -> Arc<TypeDescriptor> {
        let key = TypeId::of::<T>();
        if let Some(hit) = self.entries.get(&key) {
            return Arc::clone(hit.value());
        }
        // Resolve outside the shard lock.
        let resolved = Arc::new(T::descriptor().resolved());
        tracing::trace!(descriptor = %resolved, "Resolved descriptor");
        Arc::clone(self.entries.entry(key).or_insert(resolved).value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
