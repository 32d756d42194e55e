//! # license-gate
//!
//! License validation service for distributed software plugins, with a
//! sliding-window, fail-open rate limiter in front of every endpoint.
//!
//! A client posts `domain`, `key` and `token`; the service looks the
//! license up by key and token and answers with one verdict:
//! `invalid`, `inactive`, `expired`, `valid` or `error`. A companion
//! endpoint answers plugin update checks from a directory of release
//! archives.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use license_gate::{
//!     build_router, AppState, DirectoryCatalog, MemoryLicenseStore, RateLimitBackend,
//!     RateLimitConfig, RateLimiter, SystemClock, UpdateConfig,
//! };
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let clock = Arc::new(SystemClock::new());
//! let limiter = RateLimiter::new(RateLimitBackend::memory(), clock.clone(), RateLimitConfig::new(10, 60));
//! let state = AppState::new(
//!     limiter,
//!     Arc::new(MemoryLicenseStore::from_json_file("licenses.json")?),
//!     Arc::new(DirectoryCatalog::new("downloads")),
//!     clock,
//!     UpdateConfig::default(),
//! )
//! .with_downloads_dir("downloads");
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(
//!     listener,
//!     build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Validation Order
//!
//! The first failing check decides the verdict:
//!
//! 1. No license for the key and token: `invalid`
//! 2. `Single` site limit and the domain is neither the primary nor the
//!    secondary domain (case-insensitive): `invalid`, with no license
//!    details. `Unlimited` skips this check; an unrecognized site limit
//!    is an `error`
//! 3. License not active: `inactive`
//! 4. Past the expiry date (lifetime licenses never expire): `expired`
//! 5. Otherwise: `valid`
//!
//! A domain the license was not issued for learns nothing about its status
//! or expiry:
//!
//! ```rust
//! use chrono::NaiveDate;
//! use license_gate::{evaluate, InvalidReason, License, LicenseStatus, LicenseType, SiteLimit, Verdict};
//!
//! let license = License {
//!     primary_domain: "a.com".to_string(),
//!     secondary_domain: None,
//!     license_key: "K".to_string(),
//!     token: "Tk".to_string(),
//!     status: LicenseStatus::Inactive,
//!     license_type: LicenseType::Yearly,
//!     site_limit: SiteLimit::Single,
//!     expires_at: NaiveDate::from_ymd_opt(2020, 1, 1),
//! };
//! let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
//!
//! assert_eq!(
//!     evaluate("c.com", Some(&license), today),
//!     Verdict::Invalid(InvalidReason::DomainMismatch)
//! );
//! assert_eq!(evaluate("A.com", Some(&license), today).status(), "inactive");
//! ```
//!
//! ## Rate Limiting
//!
//! Each client IP gets a window of request timestamps. A request is
//! admitted while fewer than `max_requests` fall within the last
//! `timeframe_seconds`; otherwise the client gets HTTP 429. Setting either
//! value to zero disables limiting.
//!
//! Window state lives behind the [`Storage`] port:
//! - [`ShardedStorage`]: per process, in memory
//! - [`FileStorage`]: a JSON file of `{ "<ip>": [timestamps...] }`
//! - `RedisStorage` (feature `redis-storage`): shared between instances
//!
//! ## Fail-Safe Operation
//!
//! Storage trouble never locks clients out. Errors and panics in the
//! backend admit the request, and a circuit breaker stops consulting a
//! failing backend until it recovers:
//!
//! ```rust,no_run
//! # use license_gate::{CircuitState, RateLimitBackend, RateLimitConfig, RateLimiter, SystemClock};
//! # use std::sync::Arc;
//! # let limiter = RateLimiter::new(RateLimitBackend::memory(), Arc::new(SystemClock::new()), RateLimitConfig::default());
//! match limiter.circuit_breaker().state() {
//!     CircuitState::Closed => println!("Normal operation"),
//!     CircuitState::Open => println!("Failing open - admitting all requests"),
//!     CircuitState::HalfOpen => println!("Testing recovery"),
//! }
//!
//! let snapshot = limiter.metrics().snapshot();
//! println!("Rejection rate: {:.2}%", snapshot.rejection_rate() * 100.0);
//! ```

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

pub mod config;

// Re-export commonly used types for convenience
pub use domain::{
    license::{License, LicenseStatus, LicenseType, SiteLimit},
    request::ValidationRequest,
    validation::evaluate,
    verdict::{Expiry, InvalidReason, LicenseDetails, MatchedDomain, Verdict, VerdictError},
    version::PluginVersion,
    window::{RequestWindow, WindowDecision},
};

pub use application::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState},
    formatter::LicenseResponse,
    limiter::{LimitDecision, RateLimitConfig, RateLimiter},
    metrics::{Metrics, MetricsSnapshot},
    ports::{
        Clock, LicenseStore, ReleaseCatalog, Storage, StorageError, StoreError, WindowStorage,
    },
    updates::{PluginInfo, UpdateConfig, UpdateOutcome, UpdateRequest, UpdateService},
    validator::LicenseValidator,
};

pub use infrastructure::{
    backend::RateLimitBackend,
    clock::SystemClock,
    file_storage::FileStorage,
    http::{build_router, AppState},
    license_store::MemoryLicenseStore,
    storage::ShardedStorage,
    update_catalog::DirectoryCatalog,
};

#[cfg(feature = "sqlite")]
pub use infrastructure::sqlite_store::SqliteLicenseStore;

#[cfg(feature = "redis-storage")]
pub use infrastructure::redis_storage::{RedisStorage, RedisStorageConfig};
