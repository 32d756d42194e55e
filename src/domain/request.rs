//! Validation request parameters.

use std::fmt;
use thiserror::Error;

/// One or more of `domain`, `key`, `token` was absent or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("missing required parameters: domain, key, token")]
pub struct MissingParameters;

/// A license validation request with all three fields present.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    /// Domain the client is running on, as supplied
    pub domain: String,
    pub key: String,
    pub token: String,
}

impl ValidationRequest {
    /// Build a request from optional raw form fields.
    ///
    /// Fields are trimmed; any field that is missing or blank after trimming
    /// rejects the whole request.
    pub fn from_fields(
        domain: Option<&str>,
        key: Option<&str>,
        token: Option<&str>,
    ) -> Result<Self, MissingParameters> {
        fn required(value: Option<&str>) -> Result<String, MissingParameters> {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(MissingParameters)
        }

        Ok(Self {
            domain: required(domain)?,
            key: required(key)?,
            token: required(token)?,
        })
    }

    /// Key prefix safe to put in logs.
    pub fn key_hint(&self) -> &str {
        redact(&self.key)
    }
}

// Keys and tokens are credentials; keep them out of Debug output.
impl fmt::Debug for ValidationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRequest")
            .field("domain", &self.domain)
            .field("key", &format_args!("{}…", self.key_hint()))
            .finish_non_exhaustive()
    }
}

/// First few characters of a credential.
pub fn redact(credential: &str) -> &str {
    let end = credential
        .char_indices()
        .nth(6)
        .map_or(credential.len(), |(i, _)| i);
    &credential[..end]
}
