//! Validation verdicts.

use crate::domain::license::{LicenseType, SiteLimit};
use chrono::NaiveDate;
use std::fmt;

/// Value reported as `matched_domain` for unlimited licenses.
pub const UNLIMITED_MATCH: &str = "Unlimited License";

/// Which domain satisfied the site-limit policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedDomain {
    /// The request domain matched the license (as supplied by the client)
    Domain(String),
    /// Domain matching was waived
    Unlimited,
}

impl MatchedDomain {
    pub fn as_str(&self) -> &str {
        match self {
            MatchedDomain::Domain(domain) => domain,
            MatchedDomain::Unlimited => UNLIMITED_MATCH,
        }
    }
}

impl fmt::Display for MatchedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was `invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// No license has this key and token
    CredentialMismatch,
    /// Single-site license used from a domain it was not issued for
    DomainMismatch,
}

/// What a `valid` verdict reports as its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Last valid day
    Date(NaiveDate),
    /// Lifetime license without a stored date
    Lifetime,
    /// No date stored
    Unset,
}

/// License fields disclosed once the domain policy passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseDetails {
    pub license_type: LicenseType,
    pub site_limit: SiteLimit,
    pub matched_domain: MatchedDomain,
}

/// Internal failure behind an `error` verdict.
///
/// The variant (and its payload) is for server-side logs only; clients see
/// a fixed generic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictError {
    /// Request lacked `domain`, `key` or `token`
    MissingParameters,
    /// Stored site limit outside the vocabulary
    UnrecognizedSiteLimit(String),
    /// Stored record could not be read into a license
    CorruptRecord,
    /// License store could not be queried, or the check failed unexpectedly
    Internal,
}

/// Outcome of validating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Invalid(InvalidReason),
    Inactive(LicenseDetails),
    Expired {
        details: LicenseDetails,
        expires_at: NaiveDate,
    },
    Valid {
        details: LicenseDetails,
        expires: Expiry,
    },
    Error(VerdictError),
}

impl Verdict {
    /// Wire status string of this verdict.
    pub fn status(&self) -> &'static str {
        match self {
            Verdict::Invalid(_) => "invalid",
            Verdict::Inactive(_) => "inactive",
            Verdict::Expired { .. } => "expired",
            Verdict::Valid { .. } => "valid",
            Verdict::Error(_) => "error",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }

    /// License details, if this verdict discloses any.
    pub fn details(&self) -> Option<&LicenseDetails> {
        match self {
            Verdict::Inactive(details)
            | Verdict::Expired { details, .. }
            | Verdict::Valid { details, .. } => Some(details),
            Verdict::Invalid(_) | Verdict::Error(_) => None,
        }
    }
}
