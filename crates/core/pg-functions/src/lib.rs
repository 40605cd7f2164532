//! Management of PostgreSQL functions through the system catalog
//!
//! [`FunctionsDb`] lists, retrieves, creates, updates and removes function overloads. Requests
//! are normalized and compiled into DDL locally; the database's catalog is the only state, and
//! every descriptor returned is re-read from it.

use std::sync::Arc;

use tracing::instrument;

pub mod config;
mod db;
mod error;
pub mod functions;
mod response;
#[cfg(feature = "temp-db")]
pub mod temp;

use self::{config::PoolConfig, db::ConnPool};
#[cfg(feature = "temp-db")]
pub use self::temp::{KEEP_TEMP_DIRS, temp_functions_db};
pub use self::{
    config::FunctionsDbConfig,
    db::{ConnError, Connection, Executor, Transaction},
    error::Error,
    functions::{
        Behavior, FunctionDescriptor, FunctionId, FunctionRef, FunctionUpdate, Language,
        ListOptions, NewFunction, NotFoundError, Parallel,
    },
    response::{ErrorBody, Response},
};

/// Default pool size for the database.
pub const DEFAULT_POOL_SIZE: u32 = config::DEFAULT_POOL_MAX_CONNECTIONS;

/// Connection pool to the managed database. Clones will refer to the same instance.
#[derive(Clone, Debug)]
pub struct FunctionsDb {
    pool: ConnPool,
    #[cfg(feature = "temp-db")]
    pub(crate) url: Arc<str>,
    #[cfg(not(feature = "temp-db"))]
    url: Arc<str>,
    include_system_schemas: bool,
}

impl FunctionsDb {
    /// Sets up a connection pool of `pool_size` connections
    #[instrument(skip_all, err)]
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, Error> {
        Self::connect_with_config(url, &PoolConfig::with_size(pool_size)).await
    }

    /// Sets up a connection pool with full control over pool sizing and timeouts
    #[instrument(skip(url), err)]
    pub async fn connect_with_config(url: &str, config: &PoolConfig) -> Result<Self, Error> {
        let pool = ConnPool::connect(url, config).await?;
        Ok(Self::new(pool, url))
    }

    /// Sets up a connection pool from loaded configuration
    ///
    /// See [`config::load`].
    #[instrument(skip_all, err)]
    pub async fn from_config(config: &FunctionsDbConfig) -> Result<Self, Error> {
        let db = Self::connect_with_config(&config.url, &config.pool()).await?;
        Ok(db.with_system_schemas(config.include_system_schemas))
    }

    /// Sets up a connection pool, retrying while a freshly started database is still coming up.
    #[cfg(feature = "temp-db")]
    #[instrument(skip_all, err)]
    pub async fn connect_with_retry(url: &str, pool_size: u32) -> Result<Self, Error> {
        let pool = ConnPool::connect_with_retry(url, &PoolConfig::with_size(pool_size)).await?;
        Ok(Self::new(pool, url))
    }

    fn new(pool: ConnPool, url: &str) -> Self {
        Self {
            pool,
            url: url.into(),
            include_system_schemas: false,
        }
    }

    /// Configures whether [`FunctionsDb::list_options`] includes system schemas
    pub fn with_system_schemas(self, include_system_schemas: bool) -> Self {
        Self {
            include_system_schemas,
            ..self
        }
    }

    /// Opens a dedicated connection to the same database, outside the pool
    #[instrument(skip(self), err)]
    pub async fn dedicated_connection(&self) -> Result<Connection, Error> {
        Ok(Connection::connect(&self.url).await?)
    }

    /// Begins a new database transaction
    ///
    /// Returns a `Transaction` that provides RAII semantics - it will automatically
    /// roll back when dropped unless explicitly committed with `.commit()`.
    #[instrument(skip(self), err)]
    pub async fn begin_txn(&self) -> Result<Transaction, Error> {
        let tx = self.pool.begin().await?;
        Ok(Transaction::new(tx))
    }

    /// List options carrying this instance's configured schema visibility
    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            include_system_schemas: self.include_system_schemas,
            ..ListOptions::default()
        }
    }

    pub fn default_pool_size() -> u32 {
        DEFAULT_POOL_SIZE
    }
}

db::delegate_executor!(&FunctionsDb, |db| &db.pool);

/// Function management API
impl FunctionsDb {
    /// Lists functions ordered by id.
    pub async fn list_functions(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<FunctionDescriptor>, Error> {
        functions::list(self, options).await
    }

    /// Retrieves one function by id or by signature.
    pub async fn retrieve_function(
        &self,
        func_ref: impl Into<FunctionRef>,
    ) -> Result<FunctionDescriptor, Error> {
        functions::retrieve(self, &func_ref.into()).await
    }

    /// Creates a function and returns it as stored.
    pub async fn create_function(&self, function: &NewFunction) -> Result<FunctionDescriptor, Error> {
        functions::create(self, function).await
    }

    /// Applies a partial update and returns the function as stored afterwards.
    pub async fn update_function(
        &self,
        id: FunctionId,
        changes: &FunctionUpdate,
    ) -> Result<FunctionDescriptor, Error> {
        functions::update(self, id, changes).await
    }

    /// Drops a function and returns the descriptor it had before removal.
    pub async fn remove_function(&self, id: FunctionId) -> Result<FunctionDescriptor, Error> {
        functions::remove(self, id).await
    }
}

/// Private module for sealed trait pattern
///
/// This module contains the `Sealed` trait used to prevent external
/// implementations of our `Executor` trait. The trait implementations
/// are generated next to each executor type by `db::delegate_executor!`.
pub(crate) mod _priv {
    /// Sealed trait to prevent external implementations
    ///
    /// This trait has no methods and serves only as a marker.
    pub trait Sealed {}
}
