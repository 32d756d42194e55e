//! Storage doubles that misbehave on purpose.

use crate::application::ports::{Storage, StorageError, WindowStorage};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Storage whose every operation fails with `StorageError::Unavailable`.
///
/// Counts `with_entry_mut` calls so tests can see whether the backend was
/// consulted at all.
#[derive(Debug, Clone, Default)]
pub struct FailingStorage {
    calls: Arc<AtomicUsize>,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `with_entry_mut` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn error() -> StorageError {
        StorageError::Unavailable("backend offline".to_string())
    }
}

impl<K, V> Storage<K, V> for FailingStorage
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    fn with_entry_mut<F, R>(
        &self,
        _key: K,
        _factory: impl FnOnce() -> V,
        _accessor: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut V) -> R,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Self::error())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Err(Self::error())
    }

    fn clear(&self) -> Result<(), StorageError> {
        Err(Self::error())
    }

    fn retain<F>(&self, _f: F) -> Result<(), StorageError>
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        Err(Self::error())
    }
}

impl WindowStorage for FailingStorage {}

/// Storage that panics inside `with_entry_mut`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingStorage;

impl PanickingStorage {
    pub fn new() -> Self {
        Self
    }
}

impl<K, V> Storage<K, V> for PanickingStorage
where
    K: Hash + Eq + Clone + Send + Sync + Debug,
    V: Send + Sync,
{
    fn with_entry_mut<F, R>(
        &self,
        key: K,
        _factory: impl FnOnce() -> V,
        _accessor: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut V) -> R,
    {
        panic!("storage exploded while reading {:?}", key)
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(0)
    }

    fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn retain<F>(&self, _f: F) -> Result<(), StorageError>
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        Ok(())
    }
}

impl WindowStorage for PanickingStorage {}
