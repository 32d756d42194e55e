//! In-memory license store.
//!
//! Useful for tests and small deployments: licenses are seeded from a JSON
//! file (an array of license objects) at startup and looked up by their
//! key and token.

use crate::application::ports::{LicenseStore, StoreError};
use crate::domain::license::License;
use dashmap::DashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Error loading a license seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read license file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid license file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// License store held in a concurrent map keyed by `(key, token)`.
#[derive(Debug, Default)]
pub struct MemoryLicenseStore {
    licenses: DashMap<(String, String), License>,
}

impl MemoryLicenseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given licenses.
    pub fn from_licenses(licenses: impl IntoIterator<Item = License>) -> Self {
        let store = Self::new();
        for license in licenses {
            store.insert(license);
        }
        store
    }

    /// Load licenses from a JSON array file.
    ///
    /// # Errors
    /// Returns `SeedError` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let licenses: Vec<License> =
            serde_json::from_str(&content).map_err(|source| SeedError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::from_licenses(licenses))
    }

    /// Insert or replace the license with this license's key and token.
    pub fn insert(&self, license: License) {
        let id = (license.license_key.clone(), license.token.clone());
        self.licenses.insert(id, license);
    }

    /// Number of licenses held.
    pub fn len(&self) -> usize {
        self.licenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.licenses.is_empty()
    }
}

impl LicenseStore for MemoryLicenseStore {
    fn find_by_credentials(
        &self,
        key: &str,
        token: &str,
    ) -> Result<Option<License>, StoreError> {
        let id = (key.to_string(), token.to_string());
        Ok(self.licenses.get(&id).map(|entry| entry.value().clone()))
    }
}
