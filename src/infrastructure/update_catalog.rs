//! Release catalog over a downloads directory.
//!
//! Releases are uploaded as `<stem>-<version>.zip`, where the stem is the
//! first segment of the plugin slug in lower case. The same directory is
//! served under `/downloads/`.

use crate::application::ports::{CatalogError, Release, ReleaseCatalog};
use crate::domain::version::{release_version, slug_stem};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Scans a directory for release archives on every lookup.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the release files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReleaseCatalog for DirectoryCatalog {
    fn latest_release(&self, slug: &str) -> Result<Option<Release>, CatalogError> {
        let stem = slug_stem(slug);
        if stem.is_empty() {
            return Ok(None);
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| {
            CatalogError::Unavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        // Stable choice between equal versions such as 1.2 and 1.2.0
        names.sort();

        let mut latest: Option<Release> = None;
        for name in names {
            let Some(version) = release_version(&name, &stem) else {
                continue;
            };
            if latest.as_ref().map_or(true, |current| version > current.version) {
                latest = Some(Release {
                    version,
                    file_name: name,
                });
            }
        }

        debug!(
            slug = %slug,
            latest = latest.as_ref().map(|r| r.file_name.as_str()),
            "release lookup"
        );
        Ok(latest)
    }
}
