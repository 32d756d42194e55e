//! Redis-backed storage implementation.
//!
//! Shares rate-limit windows across several server instances.
//!
//! ## Architecture
//!
//! - Keys: client identifier with a configurable prefix
//! - Values: the window as a JSON array of Unix seconds
//! - TTL: refreshed on every write, so idle clients expire on their own
//!
//! ## Atomicity
//!
//! Admission (`admit_window`) runs as a Lua script, so Redis prunes,
//! counts and records a request in one step and instances sharing a
//! client never overshoot its budget. The generic `with_entry_mut` and
//! `retain` are still a GET followed by a SET; they serve the idle sweep
//! and tests, where a lost update only delays cleanup.
//!
//! ## Example
//!
//! ```rust,ignore
//! use license_gate::{RateLimitConfig, RateLimiter, RedisStorage, RedisStorageConfig, SystemClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RedisStorageConfig {
//!         key_prefix: "license-gate:rate:".to_string(),
//!         ttl: Duration::from_secs(60),
//!     };
//!
//!     let storage = RedisStorage::connect_with_config("redis://127.0.0.1/", config)
//!         .await
//!         .expect("Failed to connect to Redis");
//!
//!     let limiter = RateLimiter::new(storage, Arc::new(SystemClock::new()), RateLimitConfig::default());
//! }
//! ```

use crate::application::ports::{Storage, StorageError, WindowStorage};
use crate::domain::window::{RequestWindow, WindowDecision};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

/// Configuration for Redis storage.
#[derive(Debug, Clone)]
pub struct RedisStorageConfig {
    /// Expiry of an idle client's window (should be at least the timeframe)
    pub ttl: Duration,
    /// Key prefix for Redis keys (default: "license-gate:rate:")
    pub key_prefix: String,
}

impl Default for RedisStorageConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            key_prefix: "license-gate:rate:".to_string(),
        }
    }
}

/// Prune, count and record one request against a stored window.
///
/// KEYS[1] window key; ARGV now, max requests, timeframe, ttl.
/// Returns 1 when admitted, 0 when rejected. Unreadable state starts an
/// empty window. An empty window is written as a literal `[]` because
/// cjson encodes an empty table as an object.
const ADMIT_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local max_requests = tonumber(ARGV[2])
local timeframe = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local kept = {}
local raw = redis.call('GET', KEYS[1])
if raw then
  local ok, stored = pcall(cjson.decode, raw)
  if ok and type(stored) == 'table' then
    for _, ts in ipairs(stored) do
      if type(ts) == 'number' and now - ts < timeframe then
        table.insert(kept, ts)
      end
    end
  end
end
table.sort(kept)

local admitted = 0
if #kept < max_requests then
  table.insert(kept, now)
  admitted = 1
end

local encoded = '[]'
if #kept > 0 then
  encoded = cjson.encode(kept)
end
redis.call('SET', KEYS[1], encoded, 'EX', ttl)
return admitted
"#;

/// Redis-backed storage for distributed rate limiting.
#[derive(Clone)]
pub struct RedisStorage {
    connection: Arc<Mutex<ConnectionManager>>,
    config: RedisStorageConfig,
    admit_script: Script,
}

impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn unavailable(e: RedisError) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

impl RedisStorage {
    /// Connect to Redis with default configuration.
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        Self::connect_with_config(url, RedisStorageConfig::default()).await
    }

    /// Connect to Redis with custom configuration.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1/")
    /// * `config` - Storage configuration
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect_with_config(
        url: &str,
        config: RedisStorageConfig,
    ) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            config,
            admit_script: Script::new(ADMIT_SCRIPT),
        })
    }

    fn key(&self, client: &str) -> String {
        format!("{}{}", self.config.key_prefix, client)
    }

    /// Run an async Redis operation from the synchronous storage port.
    fn block_on<T>(
        &self,
        operation: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(operation))
        } else {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| StorageError::Unavailable(format!("no async runtime: {}", e)))?;
            runtime.block_on(operation)
        }
    }

    async fn load(
        conn: &mut ConnectionManager,
        key: &str,
    ) -> Result<Option<RequestWindow>, StorageError> {
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| StorageError::Read(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(window) => Ok(Some(window)),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding unreadable rate limit window");
                Ok(None)
            }
        }
    }

    async fn save(
        &self,
        conn: &mut ConnectionManager,
        key: &str,
        window: &RequestWindow,
    ) -> Result<(), StorageError> {
        let value =
            serde_json::to_string(window).map_err(|e| StorageError::Write(e.to_string()))?;
        conn.set_ex::<_, _, ()>(key, value, self.config.ttl.as_secs().max(1))
            .await
            .map_err(|e| StorageError::Write(e.to_string()))
    }

    /// All keys under our prefix.
    async fn scan_keys(&self, conn: &mut ConnectionManager) -> Result<Vec<String>, StorageError> {
        let pattern = format!("{}*", self.config.key_prefix);
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(conn)
                .await
                .map_err(unavailable)?;

            found.extend(keys);
            if next == 0 {
                return Ok(found);
            }
            cursor = next;
        }
    }
}

impl WindowStorage for RedisStorage {
    /// Admit through the Lua admission script, atomic across instances.
    fn admit_window(
        &self,
        client: &str,
        now: i64,
        max_requests: u32,
        timeframe_secs: u64,
    ) -> Result<WindowDecision, StorageError> {
        let redis_key = self.key(client);
        let ttl = self.config.ttl.as_secs().max(1);

        self.block_on(async {
            let mut conn = self.connection.lock().await;

            let admitted: i64 = self
                .admit_script
                .key(&redis_key)
                .arg(now)
                .arg(max_requests)
                .arg(timeframe_secs)
                .arg(ttl)
                .invoke_async(&mut *conn)
                .await
                .map_err(unavailable)?;

            Ok(if admitted == 1 {
                WindowDecision::Admit
            } else {
                WindowDecision::Reject
            })
        })
    }
}

impl Storage<String, RequestWindow> for RedisStorage {
    /// Load, update and write back one client's window.
    ///
    /// A failed GET is returned as an error (the limiter admits). A failed
    /// SET is logged and the accessor's result is kept.
    fn with_entry_mut<F, R>(
        &self,
        key: String,
        factory: impl FnOnce() -> RequestWindow,
        accessor: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut RequestWindow) -> R,
    {
        let redis_key = self.key(&key);

        self.block_on(async {
            let mut conn = self.connection.lock().await;

            let mut window = Self::load(&mut conn, &redis_key)
                .await?
                .unwrap_or_else(factory);
            let result = accessor(&mut window);

            if let Err(e) = self.save(&mut conn, &redis_key, &window).await {
                warn!(error = %e, client = %key, "failed to persist rate limit window to Redis");
            }

            Ok(result)
        })
    }

    /// Counts keys with SCAN; expensive on large keyspaces.
    fn len(&self) -> Result<usize, StorageError> {
        self.block_on(async {
            let mut conn = self.connection.lock().await;
            Ok(self.scan_keys(&mut conn).await?.len())
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.block_on(async {
            let mut conn = self.connection.lock().await;
            let keys = self.scan_keys(&mut conn).await?;
            if !keys.is_empty() {
                conn.del::<_, ()>(&keys).await.map_err(unavailable)?;
            }
            Ok(())
        })
    }

    fn retain<F>(&self, mut f: F) -> Result<(), StorageError>
    where
        F: FnMut(&String, &mut RequestWindow) -> bool,
    {
        self.block_on(async {
            let mut conn = self.connection.lock().await;

            for redis_key in self.scan_keys(&mut conn).await? {
                let Some(client) = redis_key.strip_prefix(&self.config.key_prefix) else {
                    continue;
                };
                let client = client.to_string();

                let Some(mut window) = Self::load(&mut conn, &redis_key).await? else {
                    continue;
                };

                if f(&client, &mut window) {
                    if let Err(e) = self.save(&mut conn, &redis_key, &window).await {
                        warn!(error = %e, client = %client, "failed to update rate limit window in Redis");
                    }
                } else if let Err(e) = conn.del::<_, ()>(&redis_key).await {
                    warn!(error = %e, client = %client, "failed to delete rate limit window from Redis");
                }
            }

            Ok(())
        })
    }
}
