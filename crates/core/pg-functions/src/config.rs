//! Connection and pool configuration.

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format as _, Toml},
};

/// Prefix of the environment variables overriding the TOML configuration.
///
/// Nested keys are separated by `__`, e.g. `PG_FUNCTIONS_CONFIG_FUNCTIONS_DB__URL`.
pub const ENV_PREFIX: &str = "PG_FUNCTIONS_CONFIG_";

/// Default maximum number of connections in the pool.
pub const DEFAULT_POOL_MAX_CONNECTIONS: u32 = 10;

/// Default minimum number of connections kept open: a quarter of the maximum, at least one.
pub const DEFAULT_POOL_MIN_CONNECTIONS: u32 = {
    let v = DEFAULT_POOL_MAX_CONNECTIONS.div_ceil(4);
    if v < 1 { 1 } else { v }
};

/// Default maximum lifetime for a pooled connection (30 minutes).
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Default idle timeout for a pooled connection (10 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default acquire timeout when checking out a connection (5 seconds).
///
/// An operation that cannot get a connection in time fails with
/// [`Error::CancelledOrTimedOut`](crate::Error::CancelledOrTimedOut).
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection pool configuration.
///
/// | Field              | Default                                  |
/// |--------------------|------------------------------------------|
/// | `max_connections`  | [`DEFAULT_POOL_MAX_CONNECTIONS`] (10)     |
/// | `min_connections`  | [`DEFAULT_POOL_MIN_CONNECTIONS`] (3)      |
/// | `acquire_timeout`  | [`DEFAULT_ACQUIRE_TIMEOUT`] (5 s)        |
/// | `max_lifetime`     | [`DEFAULT_MAX_LIFETIME`] (30 min)        |
/// | `idle_timeout`     | [`DEFAULT_IDLE_TIMEOUT`] (10 min)        |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl PoolConfig {
    /// Creates a `PoolConfig` for `size` connections.
    ///
    /// `min_connections` is `size.div_ceil(4).max(1)`; the rest are the crate defaults.
    pub fn with_size(size: u32) -> Self {
        Self {
            max_connections: size,
            min_connections: size.div_ceil(4).max(1),
            ..Self::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_POOL_MAX_CONNECTIONS,
            min_connections: DEFAULT_POOL_MIN_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            max_lifetime: DEFAULT_MAX_LIFETIME,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Database connection settings, the `[functions_db]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct FunctionsDbConfig {
    /// Database connection URL (required)
    pub url: String,
    /// Size of the connection pool (default: 10)
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// List functions in system schemas by default (default: false)
    #[serde(default)]
    pub include_system_schemas: bool,
}

impl FunctionsDbConfig {
    /// The pool configuration for [`FunctionsDbConfig::pool_size`]
    pub fn pool(&self) -> PoolConfig {
        PoolConfig::with_size(self.pool_size)
    }
}

/// Serde default for [`FunctionsDbConfig::pool_size`]. Returns [`DEFAULT_POOL_MAX_CONNECTIONS`].
fn default_pool_size() -> u32 {
    DEFAULT_POOL_MAX_CONNECTIONS
}

/// Load the database configuration from a TOML file and environment variables.
///
/// Sources, highest priority first:
/// 1. `PG_FUNCTIONS_CONFIG_FUNCTIONS_DB__*` env vars
/// 2. The `[functions_db]` section of the TOML file at `config_path` (may not exist)
///
/// Returns `Ok(None)` when no source provides `functions_db.url`.
pub fn load(config_path: &Path) -> Result<Option<FunctionsDbConfig>, LoadConfigError> {
    load_with_env_prefix(config_path, ENV_PREFIX)
}

fn load_with_env_prefix(
    config_path: &Path,
    env_prefix: &str,
) -> Result<Option<FunctionsDbConfig>, LoadConfigError> {
    let figment = Figment::new()
        .merge(Toml::file(config_path))
        .merge(Env::prefixed(env_prefix).split("__"));

    if figment.find_value("functions_db.url").is_err() {
        tracing::debug!(path = %config_path.display(), "no functions_db url configured");
        return Ok(None);
    }

    figment
        .extract_inner::<FunctionsDbConfig>("functions_db")
        .map(Some)
        .map_err(|err| LoadConfigError(Box::new(err)))
}

/// The configuration sources hold an invalid `[functions_db]` section.
#[derive(Debug, thiserror::Error)]
#[error("Invalid functions_db configuration: {0}")]
pub struct LoadConfigError(#[source] pub Box<figment::Error>);
