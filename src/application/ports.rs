//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::license::License;
use crate::domain::version::PluginVersion;
use crate::domain::window::{RequestWindow, WindowDecision};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;

/// Port for obtaining current time.
///
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Current Unix time in whole seconds.
    fn unix_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Failure of a rate-limit storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Persisted state could not be read
    #[error("failed to read rate limit state: {0}")]
    Read(String),
    /// Updated state could not be written
    #[error("failed to write rate limit state: {0}")]
    Write(String),
    /// Backend could not be reached at all
    #[error("rate limit backend unavailable: {0}")]
    Unavailable(String),
}

/// Port for concurrent key-value storage of rate-limit state.
///
/// `with_entry_mut` is the atomic read-modify-write primitive: the accessor
/// runs while the entry is held, so two concurrent calls for the same key
/// observe each other's updates (within the atomicity the backend offers).
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    /// * `factory` - Function to create a new value if the key doesn't exist
    /// * `accessor` - Function that gets mutable access to the value
    ///
    /// # Errors
    /// Returns `StorageError` if existing state could not be loaded. A failure
    /// to persist after the accessor ran is logged by the backend and does
    /// not undo the accessor's result.
    fn with_entry_mut<F, R>(
        &self,
        key: K,
        factory: impl FnOnce() -> V,
        accessor: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut V) -> R;

    /// Get the number of entries in the storage.
    fn len(&self) -> Result<usize, StorageError>;

    /// Check if the storage is empty.
    fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|len| len == 0)
    }

    /// Clear all entries from the storage.
    fn clear(&self) -> Result<(), StorageError>;

    /// Remove entries for which the predicate returns false.
    fn retain<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnMut(&K, &mut V) -> bool;
}

/// Storage of one request window per client.
///
/// `admit_window` prunes, counts and records a request in a single step.
/// The default runs [`RequestWindow::admit`] inside `with_entry_mut`;
/// backends shared between processes override it with an operation the
/// server applies atomically.
pub trait WindowStorage: Storage<String, RequestWindow> {
    /// Admit or reject a request from `client` at Unix time `now`.
    fn admit_window(
        &self,
        client: &str,
        now: i64,
        max_requests: u32,
        timeframe_secs: u64,
    ) -> Result<WindowDecision, StorageError> {
        self.with_entry_mut(client.to_string(), RequestWindow::new, |window| {
            window.admit(now, max_requests, timeframe_secs)
        })
    }
}

/// Failure of the license store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be queried
    #[error("license store unavailable: {0}")]
    Unavailable(String),
    /// A stored record could not be read into a license
    #[error("corrupt license record: {0}")]
    Corrupt(String),
}

/// Port for read-only license lookup.
///
/// The store is owned by an external write path; this crate only reads.
pub trait LicenseStore: Send + Sync + Debug {
    /// Find the license with exactly this key and token.
    ///
    /// Lookup is never by domain: a record is only ever reachable through
    /// its full credential pair.
    fn find_by_credentials(&self, key: &str, token: &str)
        -> Result<Option<License>, StoreError>;
}

impl<T: LicenseStore + ?Sized> LicenseStore for Arc<T> {
    fn find_by_credentials(
        &self,
        key: &str,
        token: &str,
    ) -> Result<Option<License>, StoreError> {
        (**self).find_by_credentials(key, token)
    }
}

/// A downloadable release of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: PluginVersion,
    /// File name relative to the downloads location
    pub file_name: String,
}

/// Failure of the release catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("release catalog unavailable: {0}")]
    Unavailable(String),
}

/// Port for looking up the latest release of a plugin.
pub trait ReleaseCatalog: Send + Sync + Debug {
    /// Latest release for a plugin slug, if any.
    fn latest_release(&self, slug: &str) -> Result<Option<Release>, CatalogError>;
}

impl<T: ReleaseCatalog + ?Sized> ReleaseCatalog for Arc<T> {
    fn latest_release(&self, slug: &str) -> Result<Option<Release>, CatalogError> {
        (**self).latest_release(slug)
    }
}
