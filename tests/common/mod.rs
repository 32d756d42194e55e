//! Helpers shared by the HTTP integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use license_gate::infrastructure::mocks::MockClock;
use license_gate::{
    build_router, AppState, DirectoryCatalog, License, LicenseStatus, LicenseStore, LicenseType,
    MemoryLicenseStore, RateLimitBackend, RateLimitConfig, RateLimiter, SiteLimit, UpdateConfig,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

pub const CLIENT: [u8; 4] = [203, 0, 113, 7];

/// Scenario license: a.com / b.com, key K, token Tk, active Yearly, Single.
pub fn license() -> License {
    License {
        primary_domain: "a.com".to_string(),
        secondary_domain: Some("b.com".to_string()),
        license_key: "K".to_string(),
        token: "Tk".to_string(),
        status: LicenseStatus::Active,
        license_type: LicenseType::Yearly,
        site_limit: SiteLimit::Single,
        expires_at: NaiveDate::from_ymd_opt(2099, 1, 1),
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: MockClock,
    pub limiter: RateLimiter<RateLimitBackend>,
}

/// App on a memory backend, clock at 2024-06-15, downloads under `downloads`.
pub fn app_with(
    licenses: Vec<License>,
    limits: RateLimitConfig,
    downloads: &Path,
    updates: UpdateConfig,
) -> TestApp {
    let store: Arc<dyn LicenseStore> = Arc::new(MemoryLicenseStore::from_licenses(licenses));
    app_with_store(store, limits, downloads, updates)
}

pub fn app_with_store(
    store: Arc<dyn LicenseStore>,
    limits: RateLimitConfig,
    downloads: &Path,
    updates: UpdateConfig,
) -> TestApp {
    let clock = MockClock::at_date(2024, 6, 15);
    let limiter = RateLimiter::new(RateLimitBackend::memory(), Arc::new(clock.clone()), limits);
    let state = AppState::new(
        limiter.clone(),
        store,
        Arc::new(DirectoryCatalog::new(downloads)),
        Arc::new(clock.clone()),
        updates,
    )
    .with_downloads_dir(downloads);

    TestApp {
        router: build_router(state),
        clock,
        limiter,
    }
}

/// App with generous limits and no releases.
pub fn app(licenses: Vec<License>) -> TestApp {
    app_with(
        licenses,
        RateLimitConfig::new(100, 60),
        Path::new("/nonexistent/downloads"),
        UpdateConfig::default(),
    )
}

pub fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .extension(ConnectInfo(SocketAddr::from((CLIENT, 40_000))))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from((CLIENT, 40_000))))
        .body(Body::empty())
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
