//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Rate-limit storage (sharded map, JSON file, Redis)
//! - License stores (in-memory, SQLite)
//! - Release catalog (downloads directory)
//! - HTTP (axum router and handlers)

pub mod backend;
pub mod clock;
pub mod file_storage;
pub mod http;
pub mod license_store;
pub mod storage;
pub mod update_catalog;

#[cfg(feature = "sqlite")]
pub mod sqlite_store;

#[cfg(feature = "redis-storage")]
pub mod redis_storage;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for testing
/// rate limiting and validation behavior.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// license-gate = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
