//! License records as read from the license store.
//!
//! Licenses are owned by the (external) write path; this crate only reads
//! them. Stored values are parsed into strong types here so the validation
//! engine never deals with raw strings, except for a site limit outside the
//! known vocabulary, which is carried through so it can be reported.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a stored license field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseFieldError {
    /// Unknown license type
    #[error("unknown license type '{0}'")]
    UnknownType(String),
    /// Expiry date is not `YYYY-MM-DD` (optionally followed by a time)
    #[error("invalid expiry date '{0}'")]
    InvalidExpiry(String),
}

/// Activation status of a license.
///
/// Deserializes through [`LicenseStatus::from_stored`], so every store reads
/// an unknown status the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LicenseStatus {
    /// License may be used
    Active,
    /// License exists but is switched off
    Inactive,
}

impl LicenseStatus {
    /// Read a stored status. Anything other than `active` is inactive.
    pub fn from_stored(value: &str) -> Self {
        if value == "active" {
            LicenseStatus::Active
        } else {
            LicenseStatus::Inactive
        }
    }

    /// Whether the license is active.
    pub fn is_active(&self) -> bool {
        matches!(self, LicenseStatus::Active)
    }

    /// Stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Inactive => "inactive",
        }
    }
}

impl From<String> for LicenseStatus {
    fn from(value: String) -> Self {
        LicenseStatus::from_stored(&value)
    }
}

impl From<LicenseStatus> for String {
    fn from(value: LicenseStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commercial type of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseType {
    Trial,
    Monthly,
    Yearly,
    /// Never expires, regardless of any stored date
    Lifetime,
}

impl LicenseType {
    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::Trial => "Trial",
            LicenseType::Monthly => "Monthly",
            LicenseType::Yearly => "Yearly",
            LicenseType::Lifetime => "Lifetime",
        }
    }
}

impl FromStr for LicenseType {
    type Err = LicenseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Trial" => Ok(LicenseType::Trial),
            "Monthly" => Ok(LicenseType::Monthly),
            "Yearly" => Ok(LicenseType::Yearly),
            "Lifetime" => Ok(LicenseType::Lifetime),
            other => Err(LicenseFieldError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain policy of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SiteLimit {
    /// Request domain must match the primary or secondary domain
    Single,
    /// Any domain may use the license
    Unlimited,
    /// Stored value outside the vocabulary (a data error)
    Unrecognized(String),
}

impl SiteLimit {
    /// Read a stored site limit. A missing value means `Single`.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            None | Some("Single") => SiteLimit::Single,
            Some("Unlimited") => SiteLimit::Unlimited,
            Some(other) => SiteLimit::Unrecognized(other.to_string()),
        }
    }

    /// Wire name of the site limit.
    pub fn as_str(&self) -> &str {
        match self {
            SiteLimit::Single => "Single",
            SiteLimit::Unlimited => "Unlimited",
            SiteLimit::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for SiteLimit {
    fn from(value: String) -> Self {
        SiteLimit::from_stored(Some(&value))
    }
}

impl From<SiteLimit> for String {
    fn from(value: SiteLimit) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SiteLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a stored expiry value.
///
/// Only the leading `YYYY-MM-DD` is significant; stores that kept a full
/// datetime in the column still yield the calendar date. Blank values mean
/// no expiry.
pub fn parse_expiry(value: Option<&str>) -> Result<Option<NaiveDate>, LicenseFieldError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    raw.get(..10)
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .map(Some)
        .ok_or_else(|| LicenseFieldError::InvalidExpiry(raw.to_string()))
}

/// A license record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Unique domain the license was issued for
    pub primary_domain: String,
    /// Optional second domain, only honoured for `Single` licenses
    #[serde(default)]
    pub secondary_domain: Option<String>,
    pub license_key: String,
    pub token: String,
    pub status: LicenseStatus,
    pub license_type: LicenseType,
    pub site_limit: SiteLimit,
    /// Last valid day, if the license expires
    #[serde(default)]
    pub expires_at: Option<NaiveDate>,
}

impl License {
    /// Whether `domain` equals the primary or secondary domain, ignoring case.
    pub fn authorizes_domain(&self, domain: &str) -> bool {
        self.primary_domain.eq_ignore_ascii_case(domain)
            || self
                .secondary_domain
                .as_deref()
                .is_some_and(|secondary| secondary.eq_ignore_ascii_case(domain))
    }

    /// Whether the license is past its expiry date on `today`.
    ///
    /// The expiry date itself is still valid. Lifetime licenses never expire.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        if self.license_type == LicenseType::Lifetime {
            return false;
        }
        self.expires_at.is_some_and(|expires_at| today > expires_at)
    }
}
