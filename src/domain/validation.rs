//! The license decision function.
//!
//! Checks run in a fixed order, and the order is part of the security
//! contract:
//!
//! 1. credential lookup (done by the caller; `None` here means no match)
//! 2. domain / site-limit policy
//! 3. status
//! 4. expiry
//!
//! A request from a domain the license was not issued for stops at step 2
//! and learns nothing about the license's status or expiry.

use crate::domain::license::{License, LicenseType, SiteLimit};
use crate::domain::verdict::{
    Expiry, InvalidReason, LicenseDetails, MatchedDomain, Verdict, VerdictError,
};
use chrono::NaiveDate;

/// Decide the verdict for a request from `domain` given the license found
/// by its key and token (if any) and the current calendar date.
pub fn evaluate(domain: &str, license: Option<&License>, today: NaiveDate) -> Verdict {
    let Some(license) = license else {
        return Verdict::Invalid(InvalidReason::CredentialMismatch);
    };

    let matched_domain = match &license.site_limit {
        SiteLimit::Single => {
            if !license.authorizes_domain(domain) {
                return Verdict::Invalid(InvalidReason::DomainMismatch);
            }
            MatchedDomain::Domain(domain.to_string())
        }
        SiteLimit::Unlimited => MatchedDomain::Unlimited,
        SiteLimit::Unrecognized(raw) => {
            return Verdict::Error(VerdictError::UnrecognizedSiteLimit(raw.clone()));
        }
    };

    let details = LicenseDetails {
        license_type: license.license_type,
        site_limit: license.site_limit.clone(),
        matched_domain,
    };

    if !license.status.is_active() {
        return Verdict::Inactive(details);
    }

    if license.is_expired_on(today) {
        if let Some(expires_at) = license.expires_at {
            return Verdict::Expired {
                details,
                expires_at,
            };
        }
    }

    let expires = match (license.expires_at, license.license_type) {
        (Some(date), _) => Expiry::Date(date),
        (None, LicenseType::Lifetime) => Expiry::Lifetime,
        (None, _) => Expiry::Unset,
    };

    Verdict::Valid { details, expires }
}
