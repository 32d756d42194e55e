//! Wire representation of license verdicts.

use crate::domain::verdict::{Expiry, InvalidReason, Verdict, VerdictError};
use serde::Serialize;

pub const MSG_CREDENTIAL_MISMATCH: &str = "License key or token mismatch.";
pub const MSG_DOMAIN_MISMATCH: &str = "Domain mismatch for this license key.";
pub const MSG_INACTIVE: &str = "License is not active.";
pub const MSG_EXPIRED: &str = "License has expired.";
pub const MSG_VALID: &str = "License is valid and active.";
pub const MSG_MISSING_PARAMETERS: &str = "Missing required parameters: domain, key, token.";
pub const MSG_CONFIGURATION_ERROR: &str = "Internal license configuration error.";
pub const MSG_DATA_ERROR: &str = "Internal license data error.";
pub const MSG_INTERNAL_ERROR: &str = "An internal server error occurred during license check.";
pub const MSG_RATE_LIMITED: &str = "Rate limit exceeded. Please try again later.";
pub const MSG_METHOD_NOT_ALLOWED: &str = "Invalid request method. Use POST.";

/// Value reported for a lifetime license without a stored date.
pub const LIFETIME_EXPIRY: &str = "Lifetime";

/// JSON body of a license check response.
///
/// Absent fields are omitted. `expires_at` distinguishes omitted (`None`)
/// from an explicit JSON `null` (`Some(None)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_domain: Option<String>,
}

impl LicenseResponse {
    fn bare(status: &'static str, message: &'static str) -> Self {
        Self {
            status,
            message,
            license_type: None,
            site_limit: None,
            expires_at: None,
            matched_domain: None,
        }
    }

    /// Body for a request refused by the rate limiter.
    pub fn rate_limited() -> Self {
        Self::bare("error", MSG_RATE_LIMITED)
    }

    /// Body for a request with the wrong HTTP method.
    pub fn method_not_allowed() -> Self {
        Self::bare("error", MSG_METHOD_NOT_ALLOWED)
    }

    /// Body for a request lacking domain, key or token.
    pub fn missing_parameters() -> Self {
        Self::bare("error", MSG_MISSING_PARAMETERS)
    }

    /// Body for an unexpected failure inside the check.
    pub fn internal_error() -> Self {
        Self::bare("error", MSG_INTERNAL_ERROR)
    }

    /// Map a verdict to its wire body.
    pub fn from_verdict(verdict: &Verdict) -> Self {
        let mut response = Self::bare(verdict.status(), verdict_message(verdict));

        if let Some(details) = verdict.details() {
            response.license_type = Some(details.license_type.to_string());
            response.site_limit = Some(details.site_limit.to_string());
            response.matched_domain = Some(details.matched_domain.to_string());
        }

        match verdict {
            Verdict::Expired { expires_at, .. } => {
                response.expires_at = Some(Some(expires_at.format("%Y-%m-%d").to_string()));
            }
            Verdict::Valid { expires, .. } => {
                response.expires_at = Some(expiry_value(expires));
            }
            _ => {}
        }

        response
    }
}

impl From<&Verdict> for LicenseResponse {
    fn from(verdict: &Verdict) -> Self {
        Self::from_verdict(verdict)
    }
}

/// Client-facing message for a verdict.
pub fn verdict_message(verdict: &Verdict) -> &'static str {
    match verdict {
        Verdict::Invalid(InvalidReason::CredentialMismatch) => MSG_CREDENTIAL_MISMATCH,
        Verdict::Invalid(InvalidReason::DomainMismatch) => MSG_DOMAIN_MISMATCH,
        Verdict::Inactive(_) => MSG_INACTIVE,
        Verdict::Expired { .. } => MSG_EXPIRED,
        Verdict::Valid { .. } => MSG_VALID,
        Verdict::Error(VerdictError::MissingParameters) => MSG_MISSING_PARAMETERS,
        Verdict::Error(VerdictError::UnrecognizedSiteLimit(_)) => MSG_CONFIGURATION_ERROR,
        Verdict::Error(VerdictError::CorruptRecord) => MSG_DATA_ERROR,
        Verdict::Error(VerdictError::Internal) => MSG_INTERNAL_ERROR,
    }
}

/// Wire value of a valid license's expiry: a date, `"Lifetime"`, or null.
pub fn expiry_value(expires: &Expiry) -> Option<String> {
    match expires {
        Expiry::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
        Expiry::Lifetime => Some(LIFETIME_EXPIRY.to_string()),
        Expiry::Unset => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::license::{LicenseType, SiteLimit};
    use crate::domain::verdict::{LicenseDetails, MatchedDomain};
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn details(matched: MatchedDomain) -> LicenseDetails {
        LicenseDetails {
            license_type: LicenseType::Yearly,
            site_limit: SiteLimit::Single,
            matched_domain: matched,
        }
    }

    fn to_json(verdict: &Verdict) -> Value {
        serde_json::to_value(LicenseResponse::from_verdict(verdict)).unwrap()
    }

    #[test]
    fn test_invalid_has_no_details() {
        assert_eq!(
            to_json(&Verdict::Invalid(InvalidReason::CredentialMismatch)),
            json!({"status": "invalid", "message": "License key or token mismatch."})
        );
        assert_eq!(
            to_json(&Verdict::Invalid(InvalidReason::DomainMismatch)),
            json!({"status": "invalid", "message": "Domain mismatch for this license key."})
        );
    }

    #[test]
    fn test_inactive_has_no_expiry() {
        let verdict = Verdict::Inactive(details(MatchedDomain::Domain("a.com".to_string())));
        assert_eq!(
            to_json(&verdict),
            json!({
                "status": "inactive",
                "message": "License is not active.",
                "license_type": "Yearly",
                "site_limit": "Single",
                "matched_domain": "a.com",
            })
        );
    }

    #[test]
    fn test_expired_reports_date() {
        let verdict = Verdict::Expired {
            details: details(MatchedDomain::Domain("a.com".to_string())),
            expires_at: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        };
        let body = to_json(&verdict);
        assert_eq!(body["status"], "expired");
        assert_eq!(body["message"], "License has expired.");
        assert_eq!(body["expires_at"], "2020-01-01");
    }

    #[test]
    fn test_valid_expiry_variants() {
        let valid = |expires| Verdict::Valid {
            details: details(MatchedDomain::Unlimited),
            expires,
        };

        let dated = to_json(&valid(Expiry::Date(NaiveDate::from_ymd_opt(2099, 1, 1).unwrap())));
        assert_eq!(dated["expires_at"], "2099-01-01");
        assert_eq!(dated["matched_domain"], "Unlimited License");
        assert_eq!(dated["message"], "License is valid and active.");

        assert_eq!(to_json(&valid(Expiry::Lifetime))["expires_at"], "Lifetime");

        let unset = to_json(&valid(Expiry::Unset));
        assert_eq!(unset.get("expires_at"), Some(&Value::Null));
    }

    #[test]
    fn test_error_messages_are_generic() {
        let body = to_json(&Verdict::Error(VerdictError::UnrecognizedSiteLimit(
            "Secret".to_string(),
        )));
        assert_eq!(
            body,
            json!({"status": "error", "message": "Internal license configuration error."})
        );

        assert_eq!(
            to_json(&Verdict::Error(VerdictError::CorruptRecord))["message"],
            "Internal license data error."
        );
        assert_eq!(
            to_json(&Verdict::Error(VerdictError::Internal))["message"],
            "An internal server error occurred during license check."
        );
    }

    #[test]
    fn test_fixed_bodies() {
        assert_eq!(
            serde_json::to_value(LicenseResponse::rate_limited()).unwrap(),
            json!({"status": "error", "message": "Rate limit exceeded. Please try again later."})
        );
        assert_eq!(
            serde_json::to_value(LicenseResponse::method_not_allowed()).unwrap(),
            json!({"status": "error", "message": "Invalid request method. Use POST."})
        );
        assert_eq!(
            serde_json::to_value(LicenseResponse::missing_parameters()).unwrap(),
            json!({"status": "error", "message": "Missing required parameters: domain, key, token."})
        );
    }

    #[test]
    fn test_field_order() {
        let verdict = Verdict::Expired {
            details: details(MatchedDomain::Domain("a.com".to_string())),
            expires_at: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        };
        let text = serde_json::to_string(&LicenseResponse::from_verdict(&verdict)).unwrap();
        assert_eq!(
            text,
            r#"{"status":"expired","message":"License has expired.","license_type":"Yearly","site_limit":"Single","expires_at":"2020-01-01","matched_domain":"a.com"}"#
        );
    }
}
