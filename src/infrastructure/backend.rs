//! Runtime selection of the rate-limit storage backend.

use crate::application::ports::{Storage, StorageError, WindowStorage};
use crate::domain::window::{RequestWindow, WindowDecision};
use crate::infrastructure::file_storage::FileStorage;
use crate::infrastructure::storage::ShardedStorage;
use std::sync::Arc;

#[cfg(feature = "redis-storage")]
use crate::infrastructure::redis_storage::RedisStorage;

/// One of the rate-limit storage adapters, chosen by configuration.
#[derive(Debug, Clone)]
pub enum RateLimitBackend {
    /// Per-process sharded map
    Memory(Arc<ShardedStorage<String, RequestWindow>>),
    /// JSON state file
    File(Arc<FileStorage>),
    /// Shared Redis instance
    #[cfg(feature = "redis-storage")]
    Redis(RedisStorage),
}

impl RateLimitBackend {
    /// Fresh in-memory backend.
    pub fn memory() -> Self {
        RateLimitBackend::Memory(Arc::new(ShardedStorage::new()))
    }

    /// File backend at `path`.
    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        RateLimitBackend::File(Arc::new(FileStorage::new(path)))
    }

    /// Short name for logs and health output.
    pub fn kind(&self) -> &'static str {
        match self {
            RateLimitBackend::Memory(_) => "memory",
            RateLimitBackend::File(_) => "file",
            #[cfg(feature = "redis-storage")]
            RateLimitBackend::Redis(_) => "redis",
        }
    }
}

impl Storage<String, RequestWindow> for RateLimitBackend {
    fn with_entry_mut<F, R>(
        &self,
        key: String,
        factory: impl FnOnce() -> RequestWindow,
        accessor: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut RequestWindow) -> R,
    {
        match self {
            RateLimitBackend::Memory(storage) => storage.with_entry_mut(key, factory, accessor),
            RateLimitBackend::File(storage) => storage.with_entry_mut(key, factory, accessor),
            #[cfg(feature = "redis-storage")]
            RateLimitBackend::Redis(storage) => storage.with_entry_mut(key, factory, accessor),
        }
    }

    fn len(&self) -> Result<usize, StorageError> {
        match self {
            RateLimitBackend::Memory(storage) => storage.len(),
            RateLimitBackend::File(storage) => storage.len(),
            #[cfg(feature = "redis-storage")]
            RateLimitBackend::Redis(storage) => storage.len(),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self {
            RateLimitBackend::Memory(storage) => storage.clear(),
            RateLimitBackend::File(storage) => storage.clear(),
            #[cfg(feature = "redis-storage")]
            RateLimitBackend::Redis(storage) => storage.clear(),
        }
    }

    fn retain<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnMut(&String, &mut RequestWindow) -> bool,
    {
        match self {
            RateLimitBackend::Memory(storage) => storage.retain(f),
            RateLimitBackend::File(storage) => storage.retain(f),
            #[cfg(feature = "redis-storage")]
            RateLimitBackend::Redis(storage) => storage.retain(f),
        }
    }
}

impl WindowStorage for RateLimitBackend {
    fn admit_window(
        &self,
        client: &str,
        now: i64,
        max_requests: u32,
        timeframe_secs: u64,
    ) -> Result<WindowDecision, StorageError> {
        match self {
            RateLimitBackend::Memory(storage) => {
                storage.admit_window(client, now, max_requests, timeframe_secs)
            }
            RateLimitBackend::File(storage) => {
                storage.admit_window(client, now, max_requests, timeframe_secs)
            }
            #[cfg(feature = "redis-storage")]
            RateLimitBackend::Redis(storage) => {
                storage.admit_window(client, now, max_requests, timeframe_secs)
            }
        }
    }
}
