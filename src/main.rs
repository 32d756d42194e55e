//! license-gate server binary.
//!
//! Usage:
//!   license-gate --database licenses.db --downloads-dir downloads
//!
//! Run with `--help` for every flag and its environment variable.

use anyhow::{Context, Result};
use clap::Parser;
use license_gate::config::{Config, LicenseBackend, LimitBackend};
use license_gate::infrastructure::http::spawn_sweeper;
use license_gate::{
    build_router, AppState, CircuitBreaker, Clock, DirectoryCatalog, LicenseStore,
    MemoryLicenseStore, RateLimitBackend, RateLimitConfig, RateLimiter, SystemClock,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn setup_logging(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

/// License store plus any rate-limit settings it carries.
struct OpenedStore {
    store: Arc<dyn LicenseStore>,
    stored_max: Option<u32>,
    stored_timeframe: Option<u64>,
}

fn open_store(config: &Config) -> Result<OpenedStore> {
    match config.license_store {
        LicenseBackend::Memory => {
            let store = match &config.licenses_file {
                Some(path) => MemoryLicenseStore::from_json_file(path)?,
                None => {
                    warn!("no --licenses-file given; every license check will be invalid");
                    MemoryLicenseStore::new()
                }
            };
            info!(licenses = store.len(), "loaded in-memory license store");
            Ok(OpenedStore {
                store: Arc::new(store),
                stored_max: None,
                stored_timeframe: None,
            })
        }
        #[cfg(feature = "sqlite")]
        LicenseBackend::Sqlite => {
            let path = config
                .database
                .as_ref()
                .context("--database is required with the sqlite license store")?;
            let store = license_gate::SqliteLicenseStore::open(path)?;

            let stored_max = store.setting::<u32>("rate_limit_max_requests").unwrap_or_else(|e| {
                warn!(error = %e, "could not read rate_limit_max_requests setting");
                None
            });
            let stored_timeframe = store.setting::<u64>("rate_limit_timeframe").unwrap_or_else(|e| {
                warn!(error = %e, "could not read rate_limit_timeframe setting");
                None
            });

            info!(database = %path.display(), "opened sqlite license store");
            Ok(OpenedStore {
                store: Arc::new(store),
                stored_max,
                stored_timeframe,
            })
        }
        #[cfg(not(feature = "sqlite"))]
        LicenseBackend::Sqlite => {
            anyhow::bail!("the sqlite license store needs the `sqlite` feature")
        }
    }
}

async fn open_backend(config: &Config, limits: RateLimitConfig) -> Result<RateLimitBackend> {
    match config.rate_limit_backend {
        LimitBackend::Memory => Ok(RateLimitBackend::memory()),
        LimitBackend::File => {
            let path = config
                .state_file
                .as_ref()
                .context("--state-file is required with the file rate-limit backend")?;
            Ok(RateLimitBackend::file(path))
        }
        #[cfg(feature = "redis-storage")]
        LimitBackend::Redis => {
            use license_gate::{RedisStorage, RedisStorageConfig};
            use std::time::Duration;

            let url = config
                .redis_url
                .as_deref()
                .context("--redis-url is required with the redis rate-limit backend")?;
            let redis_config = RedisStorageConfig {
                ttl: Duration::from_secs(limits.timeframe_secs.max(1)),
                key_prefix: config.redis_prefix.clone(),
            };
            let storage = RedisStorage::connect_with_config(url, redis_config)
                .await
                .with_context(|| format!("failed to connect to redis at {url}"))?;
            Ok(RateLimitBackend::Redis(storage))
        }
        #[cfg(not(feature = "redis-storage"))]
        LimitBackend::Redis => {
            let _ = limits;
            anyhow::bail!("the redis rate-limit backend needs the `redis-storage` feature")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    setup_logging(&config.log_level);
    config.validate()?;

    let opened = open_store(&config)?;
    let limits = config.rate_limit(opened.stored_max, opened.stored_timeframe);
    let backend = open_backend(&config, limits).await?;

    info!(
        backend = backend.kind(),
        max_requests = limits.max_requests,
        timeframe_secs = limits.timeframe_secs,
        enabled = limits.is_enabled(),
        "rate limiter configured"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let limiter = RateLimiter::new(backend, clock.clone(), limits).with_circuit_breaker(Arc::new(
        CircuitBreaker::with_config(config.circuit_breaker()),
    ));

    let mut state = AppState::new(
        limiter.clone(),
        opened.store,
        Arc::new(DirectoryCatalog::new(&config.downloads_dir)),
        clock,
        config.updates(),
    )
    .with_downloads_dir(&config.downloads_dir);
    if let Some(url) = &config.public_base_url {
        state = state.with_public_base_url(url);
    }

    if let Some(every) = config.sweep_every() {
        spawn_sweeper(limiter, every);
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(address = %config.bind, "license-gate listening");

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutting down");
    })
    .await?;

    Ok(())
}
