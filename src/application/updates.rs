//! Software update metadata for deployed plugins.
//!
//! Plugins poll with `check_update` (is there something newer than my
//! version?) and `plugin_information` (details of the latest release). The
//! answer comes from a [`ReleaseCatalog`]. License fields sent alongside are
//! only checked when `enforce_license` is on; otherwise every caller is
//! treated as licensed for update purposes.

use crate::application::formatter::expiry_value;
use crate::application::ports::{LicenseStore, Release, ReleaseCatalog};
use crate::application::validator::LicenseValidator;
use crate::domain::request::{redact, ValidationRequest};
use crate::domain::verdict::{Verdict, VerdictError};
use crate::domain::version::PluginVersion;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, info};

pub const MSG_MISSING_UPDATE_PARAMETERS: &str =
    "Missing required parameters (action, slug, version).";
pub const MSG_INVALID_ACTION: &str = "Invalid action specified.";
pub const MSG_PLUGIN_UNAVAILABLE: &str = "Plugin information not available.";

/// Plugin name used when the slug has no configured name.
pub const UNKNOWN_PLUGIN: &str = "Unknown Plugin";

/// License type reported when license enforcement is off.
pub const BYPASS_LICENSE_TYPE: &str = "Update Access";

/// Static metadata and policy for update responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Validate license fields before answering
    pub enforce_license: bool,
    /// Display names keyed by full plugin slug
    pub plugin_names: BTreeMap<String, String>,
    pub homepage: String,
    pub author: String,
    /// Minimum host application version
    pub requires: String,
    /// Host application version the release was tested with
    pub tested: String,
    pub requires_php: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enforce_license: false,
            plugin_names: BTreeMap::new(),
            homepage: String::new(),
            author: String::new(),
            requires: "5.0".to_string(),
            tested: "6.5".to_string(),
            requires_php: "7.4".to_string(),
        }
    }
}

impl UpdateConfig {
    /// Display name for a slug.
    pub fn plugin_name(&self, slug: &str) -> &str {
        self.plugin_names
            .get(slug)
            .map_or(UNKNOWN_PLUGIN, String::as_str)
    }
}

/// `action`, `slug` or `version` was absent or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("missing required parameters (action, slug, version)")]
pub struct MissingUpdateParameters;

/// Recognized update actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    CheckUpdate,
    PluginInformation,
}

impl UpdateAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "check_update" => Some(UpdateAction::CheckUpdate),
            "plugin_information" => Some(UpdateAction::PluginInformation),
            _ => None,
        }
    }
}

/// An update request with its required fields present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub action: String,
    pub slug: String,
    /// Version currently installed on the client
    pub version: String,
    /// License fields, when all three were supplied
    pub license: Option<ValidationRequest>,
}

impl UpdateRequest {
    /// Build a request from optional raw form fields.
    pub fn from_fields(
        action: Option<&str>,
        slug: Option<&str>,
        version: Option<&str>,
        domain: Option<&str>,
        license_key: Option<&str>,
        license_token: Option<&str>,
    ) -> Result<Self, MissingUpdateParameters> {
        fn required(value: Option<&str>) -> Result<String, MissingUpdateParameters> {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(MissingUpdateParameters)
        }

        Ok(Self {
            action: required(action)?,
            slug: required(slug)?,
            version: required(version)?,
            license: ValidationRequest::from_fields(domain, license_key, license_token).ok(),
        })
    }
}

/// Description and changelog shown in the plugin details dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSections {
    pub description: String,
    pub changelog: String,
}

/// Update metadata for one plugin release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub slug: String,
    pub name: String,
    pub new_version: String,
    pub version: String,
    pub url: String,
    pub package: String,
    pub author: String,
    pub homepage: String,
    pub requires: String,
    pub tested: String,
    pub requires_php: String,
    pub sections: PluginSections,
    pub banners: BTreeMap<String, String>,
    pub license_status: String,
    pub license_type: String,
    pub expires_at: Option<String>,
}

/// License facts copied into plugin info.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LicenseGrant {
    license_type: String,
    expires_at: Option<String>,
}

impl LicenseGrant {
    fn bypass() -> Self {
        Self {
            license_type: BYPASS_LICENSE_TYPE.to_string(),
            expires_at: None,
        }
    }
}

/// Result of an update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A newer release exists (`check_update`)
    Update(Box<PluginInfo>),
    /// No newer release, or none at all (`check_update`)
    NoUpdate,
    /// Details of the latest release (`plugin_information`)
    Information(Box<PluginInfo>),
    /// No release to describe (`plugin_information`)
    NotAvailable,
    /// Action outside the vocabulary
    InvalidAction,
    /// License enforcement is on and the license did not validate
    LicenseRefused(Verdict),
}

/// Answers update requests.
#[derive(Debug, Clone)]
pub struct UpdateService<C, L>
where
    C: ReleaseCatalog,
    L: LicenseStore,
{
    catalog: C,
    validator: LicenseValidator<L>,
    config: UpdateConfig,
}

impl<C, L> UpdateService<C, L>
where
    C: ReleaseCatalog,
    L: LicenseStore,
{
    pub fn new(catalog: C, validator: LicenseValidator<L>, config: UpdateConfig) -> Self {
        Self {
            catalog,
            validator,
            config,
        }
    }

    /// Answer one update request.
    ///
    /// `base_url` is the public origin (scheme and host, no trailing slash)
    /// under which `/downloads/` is served.
    pub fn handle(&self, request: &UpdateRequest, base_url: &str) -> UpdateOutcome {
        let Some(action) = UpdateAction::parse(&request.action) else {
            debug!(action = %request.action, "invalid update action");
            return UpdateOutcome::InvalidAction;
        };

        let grant = match self.authorize(request) {
            Ok(grant) => grant,
            Err(verdict) => return UpdateOutcome::LicenseRefused(verdict),
        };

        let release = self.latest_release(&request.slug);

        match action {
            UpdateAction::CheckUpdate => match release {
                Some(release) if is_newer(&release.version, &request.version) => {
                    info!(
                        slug = %request.slug,
                        current = %request.version,
                        latest = %release.version,
                        "update available"
                    );
                    UpdateOutcome::Update(Box::new(self.plugin_info(
                        &request.slug,
                        &release,
                        base_url,
                        grant,
                    )))
                }
                _ => UpdateOutcome::NoUpdate,
            },
            UpdateAction::PluginInformation => match release {
                Some(release) => UpdateOutcome::Information(Box::new(self.plugin_info(
                    &request.slug,
                    &release,
                    base_url,
                    grant,
                ))),
                None => UpdateOutcome::NotAvailable,
            },
        }
    }

    fn authorize(&self, request: &UpdateRequest) -> Result<LicenseGrant, Verdict> {
        if !self.config.enforce_license {
            if let Some(license) = &request.license {
                debug!(
                    slug = %request.slug,
                    domain = %license.domain,
                    key = %redact(&license.key),
                    "license fields ignored for update request"
                );
            }
            return Ok(LicenseGrant::bypass());
        }

        let Some(license) = &request.license else {
            return Err(Verdict::Error(VerdictError::MissingParameters));
        };

        match self.validator.validate(license) {
            Verdict::Valid { details, expires } => Ok(LicenseGrant {
                license_type: details.license_type.to_string(),
                expires_at: expiry_value(&expires),
            }),
            refused => {
                info!(
                    slug = %request.slug,
                    domain = %license.domain,
                    status = refused.status(),
                    "update refused by license check"
                );
                Err(refused)
            }
        }
    }

    fn latest_release(&self, slug: &str) -> Option<Release> {
        match self.catalog.latest_release(slug) {
            Ok(release) => release,
            Err(e) => {
                error!(slug = %slug, error = %e, "release catalog lookup failed");
                None
            }
        }
    }

    fn plugin_info(
        &self,
        slug: &str,
        release: &Release,
        base_url: &str,
        grant: LicenseGrant,
    ) -> PluginInfo {
        let version = release.version.to_string();

        PluginInfo {
            slug: slug.to_string(),
            name: self.config.plugin_name(slug).to_string(),
            new_version: version.clone(),
            version: version.clone(),
            url: self.config.homepage.clone(),
            package: format!(
                "{}/downloads/{}",
                base_url.trim_end_matches('/'),
                release.file_name
            ),
            author: self.config.author.clone(),
            homepage: self.config.homepage.clone(),
            requires: self.config.requires.clone(),
            tested: self.config.tested.clone(),
            requires_php: self.config.requires_php.clone(),
            sections: PluginSections {
                description: "Plugin update.".to_string(),
                changelog: format!("Updated to version {}", version),
            },
            banners: BTreeMap::new(),
            license_status: "valid".to_string(),
            license_type: grant.license_type,
            expires_at: grant.expires_at,
        }
    }

    /// Get the update configuration.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }
}

/// Whether `latest` is newer than the client's `current` version string.
///
/// A client version that does not parse is treated as older than any
/// release.
fn is_newer(latest: &PluginVersion, current: &str) -> bool {
    match current.parse::<PluginVersion>() {
        Ok(current) => latest > &current,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CatalogError, Clock};
    use crate::domain::license::{License, LicenseStatus, LicenseType, SiteLimit};
    use crate::infrastructure::license_store::MemoryLicenseStore;
    use crate::infrastructure::mocks::MockClock;
    use chrono::NaiveDate;
    use std::sync::Arc;

    const BASE: &str = "http://updates.test";

    #[derive(Debug)]
    struct FixedCatalog(Option<Release>);

    impl ReleaseCatalog for FixedCatalog {
        fn latest_release(&self, _slug: &str) -> Result<Option<Release>, CatalogError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug)]
    struct BrokenCatalog;

    impl ReleaseCatalog for BrokenCatalog {
        fn latest_release(&self, _slug: &str) -> Result<Option<Release>, CatalogError> {
            Err(CatalogError::Unavailable("no such directory".to_string()))
        }
    }

    fn release(version: &str) -> Release {
        Release {
            version: version.parse().unwrap(),
            file_name: format!("my-plugin-{}.zip", version),
        }
    }

    fn license() -> License {
        License {
            primary_domain: "a.com".to_string(),
            secondary_domain: None,
            license_key: "K".to_string(),
            token: "Tk".to_string(),
            status: LicenseStatus::Active,
            license_type: LicenseType::Lifetime,
            site_limit: SiteLimit::Single,
            expires_at: None,
        }
    }

    fn service<C: ReleaseCatalog>(
        catalog: C,
        config: UpdateConfig,
    ) -> UpdateService<C, MemoryLicenseStore> {
        let clock: Arc<dyn Clock> = Arc::new(MockClock::at_date(2024, 6, 15));
        let validator =
            LicenseValidator::new(MemoryLicenseStore::from_licenses([license()]), clock);
        UpdateService::new(catalog, validator, config)
    }

    fn request(action: &str, version: &str, key: Option<&str>) -> UpdateRequest {
        UpdateRequest::from_fields(
            Some(action),
            Some("my-plugin/my-plugin.php"),
            Some(version),
            key.map(|_| "a.com"),
            key,
            key.map(|_| "Tk"),
        )
        .unwrap()
    }

    fn enforcing() -> UpdateConfig {
        UpdateConfig {
            enforce_license: true,
            ..UpdateConfig::default()
        }
    }

    #[test]
    fn test_missing_parameters() {
        assert_eq!(
            UpdateRequest::from_fields(Some("check_update"), Some("x"), Some(" "), None, None, None),
            Err(MissingUpdateParameters)
        );
        assert_eq!(
            UpdateRequest::from_fields(None, Some("x"), Some("1.0"), None, None, None),
            Err(MissingUpdateParameters)
        );
    }

    #[test]
    fn test_check_update_offers_newer_release() {
        let service = service(FixedCatalog(Some(release("1.2.0"))), UpdateConfig::default());

        let UpdateOutcome::Update(info) = service.handle(&request("check_update", "1.1", None), BASE)
        else {
            panic!("expected an update");
        };
        assert_eq!(info.new_version, "1.2.0");
        assert_eq!(info.package, "http://updates.test/downloads/my-plugin-1.2.0.zip");
        assert_eq!(info.name, UNKNOWN_PLUGIN);
        assert_eq!(info.license_status, "valid");
        assert_eq!(info.license_type, "Update Access");
        assert_eq!(info.expires_at, None);
        assert_eq!(info.sections.changelog, "Updated to version 1.2.0");
    }

    #[test]
    fn test_check_update_same_or_newer_client() {
        let service = service(FixedCatalog(Some(release("1.2"))), UpdateConfig::default());

        for current in ["1.2", "1.2.0", "1.3"] {
            assert_eq!(
                service.handle(&request("check_update", current, None), BASE),
                UpdateOutcome::NoUpdate
            );
        }
    }

    #[test]
    fn test_check_update_without_release() {
        let service = service(FixedCatalog(None), UpdateConfig::default());
        assert_eq!(
            service.handle(&request("check_update", "1.0", None), BASE),
            UpdateOutcome::NoUpdate
        );
    }

    #[test]
    fn test_catalog_failure_reads_as_no_release() {
        let service = service(BrokenCatalog, UpdateConfig::default());
        assert_eq!(
            service.handle(&request("plugin_information", "1.0", None), BASE),
            UpdateOutcome::NotAvailable
        );
    }

    #[test]
    fn test_plugin_information() {
        let mut config = UpdateConfig::default();
        config
            .plugin_names
            .insert("my-plugin/my-plugin.php".to_string(), "My Plugin".to_string());
        let service = service(FixedCatalog(Some(release("2.0"))), config);

        // Information is served even when the client is already current
        let UpdateOutcome::Information(info) =
            service.handle(&request("plugin_information", "2.0", None), BASE)
        else {
            panic!("expected plugin information");
        };
        assert_eq!(info.name, "My Plugin");
        assert_eq!(info.slug, "my-plugin/my-plugin.php");
        assert_eq!(info.requires, "5.0");
    }

    #[test]
    fn test_invalid_action() {
        let service = service(FixedCatalog(Some(release("2.0"))), UpdateConfig::default());
        assert_eq!(
            service.handle(&request("delete_everything", "1.0", None), BASE),
            UpdateOutcome::InvalidAction
        );
    }

    #[test]
    fn test_enforced_license_valid_copies_details() {
        let service = service(FixedCatalog(Some(release("2.0"))), enforcing());

        let UpdateOutcome::Update(info) =
            service.handle(&request("check_update", "1.0", Some("K")), BASE)
        else {
            panic!("expected an update");
        };
        assert_eq!(info.license_type, "Lifetime");
        assert_eq!(info.expires_at.as_deref(), Some("Lifetime"));
    }

    #[test]
    fn test_enforced_license_refused() {
        let service = service(FixedCatalog(Some(release("2.0"))), enforcing());

        let outcome = service.handle(&request("check_update", "1.0", Some("wrong")), BASE);
        assert!(matches!(
            outcome,
            UpdateOutcome::LicenseRefused(Verdict::Invalid(_))
        ));
    }

    #[test]
    fn test_enforced_license_missing_fields() {
        let service = service(FixedCatalog(Some(release("2.0"))), enforcing());

        assert_eq!(
            service.handle(&request("check_update", "1.0", None), BASE),
            UpdateOutcome::LicenseRefused(Verdict::Error(VerdictError::MissingParameters))
        );
    }

    #[test]
    fn test_enforced_license_expired() {
        let store = MemoryLicenseStore::from_licenses([License {
            license_type: LicenseType::Monthly,
            expires_at: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..license()
        }]);
        let clock: Arc<dyn Clock> = Arc::new(MockClock::at_date(2024, 6, 15));
        let service = UpdateService::new(
            FixedCatalog(Some(release("2.0"))),
            LicenseValidator::new(store, clock),
            enforcing(),
        );

        let outcome = service.handle(&request("plugin_information", "1.0", Some("K")), BASE);
        assert!(matches!(
            outcome,
            UpdateOutcome::LicenseRefused(Verdict::Expired { .. })
        ));
    }

    #[test]
    fn test_unparseable_client_version_gets_update() {
        assert!(is_newer(&"1.0".parse().unwrap(), "1.0-beta"));
        assert!(!is_newer(&"1.0".parse().unwrap(), "v1.0"));
    }
}
