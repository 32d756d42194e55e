//! License validation: store lookup plus the decision function.

use crate::application::ports::{Clock, LicenseStore, StoreError};
use crate::domain::request::ValidationRequest;
use crate::domain::validation::evaluate;
use crate::domain::verdict::{Verdict, VerdictError};
use std::sync::Arc;
use tracing::{debug, error};

/// Validates license requests against a [`LicenseStore`].
///
/// The record is re-read on every call; nothing is cached, so a license
/// switched off in the store stops validating on the next request.
#[derive(Debug, Clone)]
pub struct LicenseValidator<L>
where
    L: LicenseStore,
{
    store: L,
    clock: Arc<dyn Clock>,
}

impl<L> LicenseValidator<L>
where
    L: LicenseStore,
{
    pub fn new(store: L, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Produce the verdict for one request.
    ///
    /// Store failures become an `error` verdict; their details only reach
    /// the server log.
    pub fn validate(&self, request: &ValidationRequest) -> Verdict {
        let license = match self.store.find_by_credentials(&request.key, &request.token) {
            Ok(license) => license,
            Err(StoreError::Corrupt(reason)) => {
                error!(key = %request.key_hint(), %reason, "license record could not be read");
                return Verdict::Error(VerdictError::CorruptRecord);
            }
            Err(e @ StoreError::Unavailable(_)) => {
                error!(key = %request.key_hint(), error = %e, "license lookup failed");
                return Verdict::Error(VerdictError::Internal);
            }
        };

        let verdict = evaluate(&request.domain, license.as_ref(), self.clock.today());

        if let Verdict::Error(VerdictError::UnrecognizedSiteLimit(raw)) = &verdict {
            error!(
                key = %request.key_hint(),
                site_limit = %raw,
                "license has an unrecognized site limit"
            );
        } else {
            debug!(
                domain = %request.domain,
                key = %request.key_hint(),
                status = verdict.status(),
                "license checked"
            );
        }

        verdict
    }

    /// Get a reference to the license store.
    pub fn store(&self) -> &L {
        &self.store
    }
}
