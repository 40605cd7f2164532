//! Database connection and connection pool implementations

use sqlx::{Connection as _, PgConnection, Pool, Postgres, postgres::PgPoolOptions};

use crate::config::PoolConfig;

/// A dedicated connection to the database.
#[derive(Debug)]
pub struct Connection(PgConnection);

impl Connection {
    /// Opens a single connection outside of any pool.
    #[tracing::instrument(skip_all, err)]
    pub async fn connect(url: &str) -> Result<Self, ConnError> {
        PgConnection::connect(url)
            .await
            .map(Self)
            .map_err(ConnError::ConnectionError)
    }
}

impl std::ops::Deref for Connection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

super::delegate_executor!(&mut Connection, |conn| &mut conn.0);

/// A connection pool to the database.
#[derive(Debug, Clone)]
pub struct ConnPool(Pool<Postgres>);

impl ConnPool {
    /// Creates a connection pool sized and timed by `config`.
    #[tracing::instrument(skip(url), err)]
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self, ConnError> {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .max_lifetime(config.max_lifetime)
            .idle_timeout(config.idle_timeout)
            .connect(url)
            .await
            .map(Self)
            .map_err(ConnError::ConnectionError)
    }

    /// Creates a connection pool, retrying with exponential backoff while the server is still
    /// starting up.
    ///
    /// Retries up to 20 times when receiving error code 57P03 (database starting up).
    /// Used with ephemeral PostgreSQL instances.
    #[cfg(feature = "temp-db")]
    #[tracing::instrument(skip(url), err)]
    pub async fn connect_with_retry(url: &str, config: &PoolConfig) -> Result<Self, ConnError> {
        use std::time::Duration;

        use backon::{ExponentialBuilder, Retryable};

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(100))
            .with_max_times(20);

        fn is_db_starting_up(err: &ConnError) -> bool {
            matches!(
                err,
                ConnError::ConnectionError(sqlx::Error::Database(db_err))
                    if db_err.code().is_some_and(|code| code == "57P03")
            )
        }

        fn notify_retry(err: &ConnError, dur: Duration) {
            tracing::warn!(
                error = %err,
                "Database still starting up during connection. Retrying in {:.1}s",
                dur.as_secs_f32()
            );
        }

        (|| Self::connect(url, config))
            .retry(retry_policy)
            .when(is_db_starting_up)
            .notify(notify_retry)
            .await
    }
}

impl std::ops::Deref for ConnPool {
    type Target = Pool<Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

super::delegate_executor!(&ConnPool, |pool| &pool.0);

/// Errors that can occur when connecting to the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Failed to establish database connection.
    #[error("Error connecting to database: {0}")]
    ConnectionError(#[source] sqlx::Error),
}
