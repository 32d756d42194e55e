//! In-memory storage for rate-limit state.
//!
//! Provides concurrent, sharded storage keyed by client identifier.

use crate::application::ports::{Storage, StorageError, WindowStorage};
use crate::domain::window::RequestWindow;
use dashmap::DashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Thread-safe sharded storage backed by DashMap.
///
/// `with_entry_mut` holds the shard lock for the key while the accessor
/// runs, so concurrent requests from one client are serialized and never
/// lose each other's timestamps.
#[derive(Debug)]
pub struct ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    map: DashMap<K, V>,
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a new sharded storage instance.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Insert or update a value.
    pub fn insert(&self, key: K, value: V) {
        self.map.insert(key, value);
    }

    /// Get a reference to a value.
    pub fn get<Q>(&self, key: &Q) -> Option<dashmap::mapref::one::Ref<'_, K, V>>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key)
    }

    /// Remove a key and return its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<(K, V)>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(key)
    }
}

impl<K, V> Default for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Storage<K, V> for ShardedStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + Debug,
    V: Send + Sync + Debug,
{
    fn with_entry_mut<F, R>(
        &self,
        key: K,
        factory: impl FnOnce() -> V,
        accessor: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut V) -> R,
    {
        let mut value_ref = self.map.entry(key).or_insert_with(factory);
        Ok(accessor(&mut value_ref))
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.map.len())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.map.clear();
        Ok(())
    }

    fn retain<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.map.retain(f);
        Ok(())
    }
}

// Shared handle, so one map can back several limiters
impl<K, V> Storage<K, V> for Arc<ShardedStorage<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync + Debug,
    V: Send + Sync + Debug,
{
    fn with_entry_mut<F, R>(
        &self,
        key: K,
        factory: impl FnOnce() -> V,
        accessor: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).with_entry_mut(key, factory, accessor)
    }

    fn len(&self) -> Result<usize, StorageError> {
        (**self).len()
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }

    fn retain<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        (**self).retain(f)
    }
}

impl WindowStorage for ShardedStorage<String, RequestWindow> {}

impl WindowStorage for Arc<ShardedStorage<String, RequestWindow>> {}
