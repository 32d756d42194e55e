//! SQLite license store.
//!
//! Reads the `licenses` and `settings` tables maintained by the license
//! administration application. The database is opened read-only; this
//! crate never writes license data.
//!
//! Expected columns of `licenses`: `domain`, `secondary_domain`,
//! `license_key`, `token`, `status`, `expires_at`, `license_type`,
//! `site_limit`. Other columns are ignored.

use crate::application::ports::{LicenseStore, StoreError};
use crate::domain::license::{parse_expiry, License, LicenseFieldError, LicenseStatus, SiteLimit};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

const FIND_LICENSE: &str = "SELECT domain, secondary_domain, license_key, token, status, \
     expires_at, license_type, site_limit \
     FROM licenses WHERE license_key = ?1 AND token = ?2 LIMIT 1";

/// License store over the administration database.
pub struct SqliteLicenseStore {
    conn: Mutex<Connection>,
}

impl fmt::Debug for SqliteLicenseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteLicenseStore").finish_non_exhaustive()
    }
}

/// A `licenses` row as stored, before typing.
#[derive(Debug)]
struct LicenseRow {
    domain: String,
    secondary_domain: Option<String>,
    license_key: String,
    token: String,
    status: Option<String>,
    expires_at: Option<String>,
    license_type: Option<String>,
    site_limit: Option<String>,
}

impl LicenseRow {
    fn into_license(self) -> Result<License, LicenseFieldError> {
        Ok(License {
            primary_domain: self.domain,
            secondary_domain: self.secondary_domain.filter(|d| !d.trim().is_empty()),
            license_key: self.license_key,
            token: self.token,
            status: LicenseStatus::from_stored(self.status.as_deref().unwrap_or_default()),
            // Column default of the administration schema
            license_type: self.license_type.as_deref().unwrap_or("Trial").parse()?,
            site_limit: SiteLimit::from_stored(self.site_limit.as_deref()),
            expires_at: parse_expiry(self.expires_at.as_deref())?,
        })
    }
}

impl SqliteLicenseStore {
    /// Open the database at `path` read-only.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            StoreError::Unavailable(format!("failed to open {}: {e}", path.display()))
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    /// Read a value from the `settings` table.
    ///
    /// A missing key yields `None`, and so does a value that does not parse
    /// as `T` (logged).
    pub fn setting<T: FromStr>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let conn = self.conn()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Unavailable(format!("failed to read setting {key}: {e}")))?;

        let Some(raw) = raw.flatten() else {
            return Ok(None);
        };

        match raw.trim().parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                warn!(key = %key, value = %raw, "ignoring unparseable setting");
                Ok(None)
            }
        }
    }
}

impl LicenseStore for SqliteLicenseStore {
    fn find_by_credentials(
        &self,
        key: &str,
        token: &str,
    ) -> Result<Option<License>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(FIND_LICENSE, params![key, token], |row| {
                Ok(LicenseRow {
                    domain: row.get(0)?,
                    secondary_domain: row.get(1)?,
                    license_key: row.get(2)?,
                    token: row.get(3)?,
                    status: row.get(4)?,
                    expires_at: row.get(5)?,
                    license_type: row.get(6)?,
                    site_limit: row.get(7)?,
                })
            })
            .optional()
            .map_err(|e| match e {
                rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..) => StoreError::Corrupt(e.to_string()),
                other => StoreError::Unavailable(other.to_string()),
            })?;

        row.map(|row| {
            row.into_license()
                .map_err(|e| StoreError::Corrupt(e.to_string()))
        })
        .transpose()
    }
}
