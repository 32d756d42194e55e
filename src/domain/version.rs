//! Plugin release versions.
//!
//! Release files carry dotted numeric versions (`1.2`, `1.2.10`) rather than
//! strict semver, so versions compare component by component with missing
//! components counting as zero: `1.2 == 1.2.0 < 1.2.1 < 1.10`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{0}'")]
pub struct VersionError(pub String);

/// A dotted numeric version.
#[derive(Debug, Clone)]
pub struct PluginVersion {
    parts: Vec<u64>,
    raw: String,
}

impl PluginVersion {
    /// Components with trailing zeros removed, for comparison.
    fn significant(&self) -> &[u64] {
        let end = self
            .parts
            .iter()
            .rposition(|&p| p != 0)
            .map_or(0, |i| i + 1);
        &self.parts[..end]
    }
}

impl FromStr for PluginVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        if trimmed.is_empty() {
            return Err(VersionError(s.to_string()));
        }

        let parts = trimmed
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError(s.to_string()))?;

        Ok(Self {
            parts,
            raw: trimmed.to_string(),
        })
    }
}

impl PartialEq for PluginVersion {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for PluginVersion {}

impl PartialOrd for PluginVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significant().cmp(other.significant())
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// File-name stem used for a plugin slug: the lower-cased first path segment.
///
/// `"my-plugin/my-plugin.php"` becomes `"my-plugin"`.
pub fn slug_stem(slug: &str) -> String {
    slug.split('/').next().unwrap_or_default().to_lowercase()
}

/// Version encoded in a release file name `<stem>-<version>.zip`, if the file
/// belongs to `stem`. Matching is case-insensitive.
pub fn release_version(file_name: &str, stem: &str) -> Option<PluginVersion> {
    let lower = file_name.to_lowercase();
    let version = lower
        .strip_suffix(".zip")?
        .strip_prefix(stem)?
        .strip_prefix('-')?;

    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    version.parse().ok()
}
