//! HTTP adapter.
//!
//! Routes:
//! - `/license-check` (POST form: `domain`, `key`, `token`)
//! - `/update-check` (POST form: `action`, `slug`, `version`, optional
//!   `domain`, `license_key`, `license_token`)
//! - `/downloads/*` release archives
//! - `/healthz` rate limiter status
//!
//! Handlers move the blocking work (rate limit state, license lookup,
//! release scan) onto Tokio's blocking pool.

use crate::application::formatter::{LicenseResponse, MSG_METHOD_NOT_ALLOWED, MSG_RATE_LIMITED};
use crate::application::limiter::RateLimiter;
use crate::application::metrics::MetricsSnapshot;
use crate::application::ports::{Clock, LicenseStore, ReleaseCatalog};
use crate::application::updates::{
    UpdateConfig, UpdateOutcome, UpdateRequest, UpdateService, MSG_INVALID_ACTION,
    MSG_MISSING_UPDATE_PARAMETERS, MSG_PLUGIN_UNAVAILABLE,
};
use crate::application::validator::LicenseValidator;
use crate::domain::request::ValidationRequest;
use crate::domain::verdict::{Verdict, VerdictError};
use crate::infrastructure::backend::RateLimitBackend;
use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Form, Json, Router};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Client identifier used when the peer address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

const MSG_UPDATE_INTERNAL_ERROR: &str = "An internal server error occurred during update check.";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    limiter: RateLimiter<RateLimitBackend>,
    validator: LicenseValidator<Arc<dyn LicenseStore>>,
    updates: UpdateService<Arc<dyn ReleaseCatalog>, Arc<dyn LicenseStore>>,
    public_base_url: Option<String>,
    downloads_dir: Option<PathBuf>,
}

impl AppState {
    /// Wire the services together. One rate limiter guards both endpoints.
    pub fn new(
        limiter: RateLimiter<RateLimitBackend>,
        store: Arc<dyn LicenseStore>,
        catalog: Arc<dyn ReleaseCatalog>,
        clock: Arc<dyn Clock>,
        update_config: UpdateConfig,
    ) -> Self {
        let validator = LicenseValidator::new(store, clock);
        let updates = UpdateService::new(catalog, validator.clone(), update_config);

        Self {
            limiter,
            validator,
            updates,
            public_base_url: None,
            downloads_dir: None,
        }
    }

    /// Origin used to build download links instead of the `Host` header.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Serve release archives from `dir` under `/downloads/`.
    pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = Some(dir.into());
        self
    }

    pub fn limiter(&self) -> &RateLimiter<RateLimitBackend> {
        &self.limiter
    }

    fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_base_url {
            return url.clone();
        }
        headers
            .get(header::HOST)
            .and_then(|host| host.to_str().ok())
            .filter(|host| !host.is_empty())
            .map_or_else(|| "http://localhost".to_string(), |host| format!("http://{}", host))
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let downloads_dir = state.downloads_dir.clone();

    let router = Router::new()
        .route("/license-check", any(license_check))
        .route("/update-check", any(update_check))
        .route("/healthz", get(healthz));

    let router = match downloads_dir {
        Some(dir) => router.nest_service("/downloads", ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Client identifier: the IP of the TCP peer.
///
/// Forwarding headers are not consulted; they are client-controlled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| UNKNOWN_CLIENT.to_string(), |info| info.0.ip().to_string());
        Ok(ClientIp(ip))
    }
}

/// Body of the update endpoint's error responses.
#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

fn message(status: StatusCode, message: &'static str) -> Response {
    (status, Json(MessageBody { message })).into_response()
}

/// Raw form pairs in body order. A field sent more than once keeps its last
/// value, and an unreadable body counts as an empty form.
type FormPairs = Result<Form<Vec<(String, String)>>, FormRejection>;

fn form_pairs(form: FormPairs) -> Vec<(String, String)> {
    form.map(|Form(pairs)| pairs).unwrap_or_default()
}

#[derive(Debug, Default)]
struct LicenseForm {
    domain: Option<String>,
    key: Option<String>,
    token: Option<String>,
}

impl LicenseForm {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "domain" => form.domain = Some(value),
                "key" => form.key = Some(value),
                "token" => form.token = Some(value),
                _ => {}
            }
        }
        form
    }
}

enum LicenseCheck {
    RateLimited,
    Checked(Verdict),
}

async fn license_check(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    method: Method,
    form: FormPairs,
) -> Response {
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(LicenseResponse::method_not_allowed()),
        )
            .into_response();
    }

    let form = LicenseForm::from_pairs(form_pairs(form));

    let result = tokio::task::spawn_blocking(move || {
        if state.limiter.admit(&client).is_reject() {
            return LicenseCheck::RateLimited;
        }

        let verdict = match ValidationRequest::from_fields(
            form.domain.as_deref(),
            form.key.as_deref(),
            form.token.as_deref(),
        ) {
            Ok(request) => state.validator.validate(&request),
            Err(_) => Verdict::Error(VerdictError::MissingParameters),
        };
        LicenseCheck::Checked(verdict)
    })
    .await;

    match result {
        Ok(LicenseCheck::RateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(LicenseResponse::rate_limited()),
        )
            .into_response(),
        Ok(LicenseCheck::Checked(verdict)) => {
            Json(LicenseResponse::from_verdict(&verdict)).into_response()
        }
        Err(e) => {
            error!(error = %e, "license check failed unexpectedly");
            Json(LicenseResponse::internal_error()).into_response()
        }
    }
}

#[derive(Debug, Default)]
struct UpdateForm {
    action: Option<String>,
    slug: Option<String>,
    version: Option<String>,
    domain: Option<String>,
    license_key: Option<String>,
    license_token: Option<String>,
}

impl UpdateForm {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (name, value) in pairs {
            let field = match name.as_str() {
                "action" => &mut form.action,
                "slug" => &mut form.slug,
                "version" => &mut form.version,
                "domain" => &mut form.domain,
                "license_key" => &mut form.license_key,
                "license_token" => &mut form.license_token,
                _ => continue,
            };
            *field = Some(value);
        }
        form
    }
}

enum UpdateCheck {
    RateLimited,
    MissingParameters,
    Handled(UpdateOutcome),
}

async fn update_check(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    method: Method,
    headers: HeaderMap,
    form: FormPairs,
) -> Response {
    if method != Method::POST {
        return message(StatusCode::METHOD_NOT_ALLOWED, MSG_METHOD_NOT_ALLOWED);
    }

    let form = UpdateForm::from_pairs(form_pairs(form));
    let base_url = state.base_url(&headers);

    let result = tokio::task::spawn_blocking(move || {
        if state.limiter.admit(&client).is_reject() {
            return UpdateCheck::RateLimited;
        }

        match UpdateRequest::from_fields(
            form.action.as_deref(),
            form.slug.as_deref(),
            form.version.as_deref(),
            form.domain.as_deref(),
            form.license_key.as_deref(),
            form.license_token.as_deref(),
        ) {
            Ok(request) => UpdateCheck::Handled(state.updates.handle(&request, &base_url)),
            Err(_) => UpdateCheck::MissingParameters,
        }
    })
    .await;

    match result {
        Ok(UpdateCheck::RateLimited) => message(StatusCode::TOO_MANY_REQUESTS, MSG_RATE_LIMITED),
        Ok(UpdateCheck::MissingParameters) => {
            message(StatusCode::BAD_REQUEST, MSG_MISSING_UPDATE_PARAMETERS)
        }
        Ok(UpdateCheck::Handled(outcome)) => match outcome {
            UpdateOutcome::Update(info) | UpdateOutcome::Information(info) => {
                Json(info).into_response()
            }
            UpdateOutcome::NoUpdate => Json(false).into_response(),
            UpdateOutcome::NotAvailable => message(StatusCode::NOT_FOUND, MSG_PLUGIN_UNAVAILABLE),
            UpdateOutcome::InvalidAction => message(StatusCode::BAD_REQUEST, MSG_INVALID_ACTION),
            UpdateOutcome::LicenseRefused(verdict) => {
                Json(LicenseResponse::from_verdict(&verdict)).into_response()
            }
        },
        Err(e) => {
            error!(error = %e, "update check failed unexpectedly");
            message(StatusCode::INTERNAL_SERVER_ERROR, MSG_UPDATE_INTERNAL_ERROR)
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    rate_limiter: LimiterHealth,
}

#[derive(Debug, Serialize)]
struct LimiterHealth {
    enabled: bool,
    backend: &'static str,
    circuit: &'static str,
    #[serde(flatten)]
    metrics: MetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<Health> {
    let limiter = &state.limiter;

    Json(Health {
        status: "ok",
        rate_limiter: LimiterHealth {
            enabled: limiter.config().is_enabled(),
            backend: limiter.storage().kind(),
            circuit: limiter.circuit_breaker().state().as_str(),
            metrics: limiter.metrics().snapshot(),
        },
    })
}

/// Run the idle-window sweep once on the blocking pool, logging the result.
pub async fn sweep_idle(limiter: RateLimiter<RateLimitBackend>) {
    match tokio::task::spawn_blocking(move || limiter.prune_idle()).await {
        Ok(Ok(0)) => {}
        Ok(Ok(removed)) => tracing::debug!(removed, "swept idle rate limit windows"),
        Ok(Err(e)) => warn!(error = %e, "failed to sweep idle rate limit windows"),
        Err(e) => warn!(error = %e, "idle sweep task failed"),
    }
}

/// Sweep idle windows every `every`, starting one period from now.
pub fn spawn_sweeper(
    limiter: RateLimiter<RateLimitBackend>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            sweep_idle(limiter.clone()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_license_form_repeated_field_keeps_last() {
        let form = LicenseForm::from_pairs(pairs(&[
            ("domain", "c.com"),
            ("key", "K"),
            ("token", "Tk"),
            ("domain", "a.com"),
            ("extra", "ignored"),
        ]));

        assert_eq!(form.domain.as_deref(), Some("a.com"));
        assert_eq!(form.key.as_deref(), Some("K"));
        assert_eq!(form.token.as_deref(), Some("Tk"));
    }

    #[test]
    fn test_update_form_repeated_field_keeps_last() {
        let form = UpdateForm::from_pairs(pairs(&[
            ("action", "check_update"),
            ("slug", "gate"),
            ("version", "1.0"),
            ("version", "1.2"),
        ]));

        assert_eq!(form.action.as_deref(), Some("check_update"));
        assert_eq!(form.version.as_deref(), Some("1.2"));
        assert!(form.license_key.is_none());
    }
}
