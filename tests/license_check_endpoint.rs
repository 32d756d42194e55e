//! End-to-end tests of `/license-check` through the axum router.

mod common;

use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{app, form, json, request, send};
use license_gate::application::ports::StoreError;
use license_gate::{License, LicenseStatus, LicenseStore, LicenseType, SiteLimit};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_valid_on_primary_domain() {
    let app = app(vec![common::license()]);

    let response = send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json(response).await,
        json!({
            "status": "valid",
            "message": "License is valid and active.",
            "license_type": "Yearly",
            "site_limit": "Single",
            "expires_at": "2099-01-01",
            "matched_domain": "a.com"
        })
    );
}

#[tokio::test]
async fn test_valid_on_secondary_domain_ignoring_case() {
    let app = app(vec![common::license()]);

    let body = json(send(&app.router, form("/license-check", "domain=B.COM&key=K&token=Tk")).await).await;

    assert_eq!(body["status"], "valid");
    assert_eq!(body["matched_domain"], "B.COM");
}

#[tokio::test]
async fn test_domain_mismatch_is_invalid_without_details() {
    let app = app(vec![common::license()]);

    let body = json(send(&app.router, form("/license-check", "domain=c.com&key=K&token=Tk")).await).await;

    assert_eq!(
        body,
        json!({"status": "invalid", "message": "Domain mismatch for this license key."})
    );
}

#[tokio::test]
async fn test_unknown_credentials_are_invalid() {
    let app = app(vec![common::license()]);

    let body = json(send(&app.router, form("/license-check", "domain=a.com&key=K&token=wrong")).await).await;

    assert_eq!(
        body,
        json!({"status": "invalid", "message": "License key or token mismatch."})
    );
}

#[tokio::test]
async fn test_unlimited_license_reports_sentinel_domain() {
    let mut license = common::license();
    license.site_limit = SiteLimit::Unlimited;
    let app = app(vec![license]);

    let body = json(send(&app.router, form("/license-check", "domain=anything.org&key=K&token=Tk")).await).await;

    assert_eq!(body["status"], "valid");
    assert_eq!(body["site_limit"], "Unlimited");
    assert_eq!(body["matched_domain"], "Unlimited License");
}

#[tokio::test]
async fn test_inactive_omits_expiry() {
    let mut license = common::license();
    license.status = LicenseStatus::Inactive;
    let app = app(vec![license]);

    let body = json(send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await).await;

    assert_eq!(
        body,
        json!({
            "status": "inactive",
            "message": "License is not active.",
            "license_type": "Yearly",
            "site_limit": "Single",
            "matched_domain": "a.com"
        })
    );
}

#[tokio::test]
async fn test_expired_trial() {
    let mut license = common::license();
    license.license_type = LicenseType::Trial;
    license.expires_at = NaiveDate::from_ymd_opt(2020, 1, 1);
    let app = app(vec![license]);

    let body = json(send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await).await;

    assert_eq!(body["status"], "expired");
    assert_eq!(body["message"], "License has expired.");
    assert_eq!(body["expires_at"], "2020-01-01");
}

#[tokio::test]
async fn test_expiry_day_itself_is_valid() {
    let mut license = common::license();
    license.expires_at = NaiveDate::from_ymd_opt(2024, 6, 15);
    let app = app(vec![license]);

    let body = json(send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await).await;
    assert_eq!(body["status"], "valid");

    app.clock.set_date(2024, 6, 16);
    let body = json(send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await).await;
    assert_eq!(body["status"], "expired");
}

#[tokio::test]
async fn test_lifetime_without_date() {
    let mut license = common::license();
    license.license_type = LicenseType::Lifetime;
    license.expires_at = None;
    let app = app(vec![license]);

    let body = json(send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await).await;

    assert_eq!(body["status"], "valid");
    assert_eq!(body["expires_at"], "Lifetime");
}

#[tokio::test]
async fn test_mismatched_domain_hides_expired_status() {
    let mut license = common::license();
    license.status = LicenseStatus::Inactive;
    license.expires_at = NaiveDate::from_ymd_opt(2020, 1, 1);
    let app = app(vec![license]);

    let body = json(send(&app.router, form("/license-check", "domain=c.com&key=K&token=Tk")).await).await;

    assert_eq!(body["status"], "invalid");
    assert!(body.get("expires_at").is_none());
}

#[tokio::test]
async fn test_unrecognized_site_limit_is_generic_error() {
    let mut license = common::license();
    license.site_limit = SiteLimit::Unrecognized("Triple".to_string());
    let app = app(vec![license]);

    let body = json(send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await).await;

    assert_eq!(
        body,
        json!({"status": "error", "message": "Internal license configuration error."})
    );
}

#[tokio::test]
async fn test_missing_parameters() {
    let app = app(vec![common::license()]);

    for body in ["domain=a.com&key=K", "domain=%20&key=K&token=Tk", ""] {
        let response = send(&app.router, form("/license-check", body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json(response).await,
            json!({
                "status": "error",
                "message": "Missing required parameters: domain, key, token."
            })
        );
    }
}

#[tokio::test]
async fn test_repeated_field_uses_last_value() {
    let app = app(vec![common::license()]);

    let body = json(
        send(
            &app.router,
            form("/license-check", "domain=c.com&key=K&token=Tk&domain=a.com"),
        )
        .await,
    )
    .await;

    assert_eq!(body["status"], "valid");
    assert_eq!(body["matched_domain"], "a.com");
}

#[tokio::test]
async fn test_body_without_form_content_type_counts_as_missing() {
    let app = app(vec![common::license()]);

    let response = send(&app.router, request("POST", "/license-check")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["message"], "Missing required parameters: domain, key, token.");
}

#[tokio::test]
async fn test_wrong_method() {
    let app = app(vec![common::license()]);

    for method in ["GET", "PUT", "DELETE"] {
        let response = send(&app.router, request(method, "/license-check")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            json(response).await,
            json!({"status": "error", "message": "Invalid request method. Use POST."})
        );
    }
}

#[derive(Debug)]
struct OfflineStore;

impl LicenseStore for OfflineStore {
    fn find_by_credentials(&self, _key: &str, _token: &str) -> Result<Option<License>, StoreError> {
        Err(StoreError::Unavailable("database is locked".to_string()))
    }
}

#[tokio::test]
async fn test_store_failure_does_not_leak_details() {
    let app = common::app_with_store(
        Arc::new(OfflineStore),
        license_gate::RateLimitConfig::new(100, 60),
        std::path::Path::new("/nonexistent"),
        license_gate::UpdateConfig::default(),
    );

    let response = send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "An internal server error occurred during license check.");
    assert!(!body.to_string().contains("locked"));
}

#[tokio::test]
async fn test_healthz_reports_limiter() {
    let app = app(vec![common::license()]);
    send(&app.router, form("/license-check", "domain=a.com&key=K&token=Tk")).await;

    let response = send(&app.router, request("GET", "/healthz")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json(response).await,
        json!({
            "status": "ok",
            "rate_limiter": {
                "enabled": true,
                "backend": "memory",
                "circuit": "closed",
                "admitted": 1,
                "rejected": 0,
                "failed_open": 0
            }
        })
    );
}
