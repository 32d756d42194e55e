//! Command-line and environment configuration.
//!
//! Every flag can also be set through a `LICENSE_GATE_*` environment
//! variable.

use crate::application::circuit_breaker::CircuitBreakerConfig;
use crate::application::limiter::RateLimitConfig;
use crate::application::updates::UpdateConfig;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Fallback when neither the command line nor the settings table sets it.
pub const DEFAULT_MAX_REQUESTS: u32 = 10;
/// Fallback when neither the command line nor the settings table sets it.
pub const DEFAULT_TIMEFRAME_SECS: u64 = 60;

/// Where licenses are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LicenseBackend {
    /// JSON seed file loaded into memory
    Memory,
    /// SQLite database with `licenses` and `settings` tables
    Sqlite,
}

/// Where rate-limit windows are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LimitBackend {
    Memory,
    File,
    Redis,
}

/// `slug=Display Name` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginName {
    pub slug: String,
    pub name: String,
}

impl FromStr for PluginName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (slug, name) = s
            .split_once('=')
            .ok_or_else(|| format!("expected SLUG=NAME, got {s:?}"))?;
        let (slug, name) = (slug.trim(), name.trim());
        if slug.is_empty() || name.is_empty() {
            return Err(format!("expected SLUG=NAME, got {s:?}"));
        }
        Ok(Self {
            slug: slug.to_string(),
            name: name.to_string(),
        })
    }
}

/// Inconsistent flag combination.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--database is required with the sqlite license store")]
    MissingDatabase,
    #[error("the sqlite license store needs the `sqlite` feature")]
    SqliteDisabled,
    #[error("--state-file is required with the file rate-limit backend")]
    MissingStateFile,
    #[error("the redis rate-limit backend needs the `redis-storage` feature")]
    RedisDisabled,
    #[error("--redis-url is required with the redis rate-limit backend")]
    MissingRedisUrl,
    #[error("--circuit-failure-threshold must be at least 1")]
    ZeroFailureThreshold,
}

/// License validation and update server.
#[derive(Debug, Clone, Parser)]
#[command(name = "license-gate", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LICENSE_GATE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// License store backend
    #[arg(long, env = "LICENSE_GATE_LICENSE_STORE", value_enum, default_value = "sqlite")]
    pub license_store: LicenseBackend,

    /// SQLite database path (sqlite store)
    #[arg(long, env = "LICENSE_GATE_DATABASE")]
    pub database: Option<PathBuf>,

    /// JSON array of licenses (memory store); empty store when absent
    #[arg(long, env = "LICENSE_GATE_LICENSES_FILE")]
    pub licenses_file: Option<PathBuf>,

    /// Rate-limit state backend
    #[arg(long, env = "LICENSE_GATE_RATE_LIMIT_BACKEND", value_enum, default_value = "memory")]
    pub rate_limit_backend: LimitBackend,

    /// State file (file backend)
    #[arg(long, env = "LICENSE_GATE_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Redis URL (redis backend), e.g. redis://127.0.0.1/
    #[arg(long, env = "LICENSE_GATE_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Prefix for rate-limit keys in Redis
    #[arg(long, env = "LICENSE_GATE_REDIS_PREFIX", default_value = "license-gate:rate:")]
    pub redis_prefix: String,

    /// Requests allowed per client per timeframe (0 disables limiting)
    #[arg(long, env = "LICENSE_GATE_MAX_REQUESTS")]
    pub max_requests: Option<u32>,

    /// Timeframe in seconds (0 disables limiting)
    #[arg(long, env = "LICENSE_GATE_TIMEFRAME_SECONDS")]
    pub timeframe_seconds: Option<u64>,

    /// Seconds between idle-window sweeps (0 disables sweeping)
    #[arg(long, env = "LICENSE_GATE_SWEEP_INTERVAL", default_value_t = 300)]
    pub sweep_interval: u64,

    /// Consecutive storage failures before the limiter stops consulting storage
    #[arg(long, env = "LICENSE_GATE_CIRCUIT_FAILURE_THRESHOLD", default_value_t = 5)]
    pub circuit_failure_threshold: u32,

    /// Seconds before storage is retried after the circuit opens
    #[arg(long, env = "LICENSE_GATE_CIRCUIT_RECOVERY_SECONDS", default_value_t = 30)]
    pub circuit_recovery_seconds: u64,

    /// Directory holding release archives, served under /downloads/
    #[arg(long, env = "LICENSE_GATE_DOWNLOADS_DIR", default_value = "downloads")]
    pub downloads_dir: PathBuf,

    /// Public origin for download links (defaults to the request's Host)
    #[arg(long, env = "LICENSE_GATE_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Require a valid license on update checks
    #[arg(long, env = "LICENSE_GATE_ENFORCE_LICENSE")]
    pub enforce_license: bool,

    /// Plugin display name as SLUG=NAME (repeatable)
    #[arg(
        long = "plugin-name",
        env = "LICENSE_GATE_PLUGIN_NAMES",
        value_delimiter = ','
    )]
    pub plugin_names: Vec<PluginName>,

    /// Plugin homepage reported in update info
    #[arg(long, env = "LICENSE_GATE_HOMEPAGE", default_value = "")]
    pub homepage: String,

    /// Plugin author reported in update info
    #[arg(long, env = "LICENSE_GATE_AUTHOR", default_value = "")]
    pub author: String,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, env = "LICENSE_GATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Check flag combinations clap cannot express.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.license_store == LicenseBackend::Sqlite {
            if !cfg!(feature = "sqlite") {
                return Err(ConfigError::SqliteDisabled);
            }
            if self.database.is_none() {
                return Err(ConfigError::MissingDatabase);
            }
        }

        match self.rate_limit_backend {
            LimitBackend::Memory => {}
            LimitBackend::File => {
                if self.state_file.is_none() {
                    return Err(ConfigError::MissingStateFile);
                }
            }
            LimitBackend::Redis => {
                if !cfg!(feature = "redis-storage") {
                    return Err(ConfigError::RedisDisabled);
                }
                if self.redis_url.is_none() {
                    return Err(ConfigError::MissingRedisUrl);
                }
            }
        }

        if self.circuit_failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }

        Ok(())
    }

    /// Rate limit settings: flags first, then stored values, then 10 / 60.
    pub fn rate_limit(&self, stored_max: Option<u32>, stored_timeframe: Option<u64>) -> RateLimitConfig {
        RateLimitConfig::new(
            self.max_requests
                .or(stored_max)
                .unwrap_or(DEFAULT_MAX_REQUESTS),
            self.timeframe_seconds
                .or(stored_timeframe)
                .unwrap_or(DEFAULT_TIMEFRAME_SECS),
        )
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_failure_threshold,
            recovery_timeout: Duration::from_secs(self.circuit_recovery_seconds),
        }
    }

    pub fn updates(&self) -> UpdateConfig {
        UpdateConfig {
            enforce_license: self.enforce_license,
            plugin_names: self
                .plugin_names
                .iter()
                .map(|p| (p.slug.clone(), p.name.clone()))
                .collect(),
            homepage: self.homepage.clone(),
            author: self.author.clone(),
            ..UpdateConfig::default()
        }
    }

    /// Interval of the idle-window sweeper, `None` when disabled.
    pub fn sweep_every(&self) -> Option<Duration> {
        (self.sweep_interval > 0).then(|| Duration::from_secs(self.sweep_interval))
    }
}
