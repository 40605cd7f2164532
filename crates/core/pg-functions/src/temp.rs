//! Throwaway PostgreSQL instances for tests

use std::sync::LazyLock;

use pgtemp::{PgTempDB, PgTempDBBuilder};
use tokio::sync::OnceCell;

use crate::FunctionsDb;

/// Whether to keep the temporary data directory after the database is dropped
///
/// `false` unless the `KEEP_TEMP_DIRS` environment variable is `true` or `1`.
pub static KEEP_TEMP_DIRS: LazyLock<bool> = LazyLock::new(|| {
    std::env::var("KEEP_TEMP_DIRS")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
});

/// A [`FunctionsDb`] backed by a temporary PostgreSQL server
///
/// The server and its data directory are deleted on drop.
pub struct TempFunctionsDb {
    inner: FunctionsDb,

    /// Dropping this stops the server
    _temp_db: PgTempDB,
}

impl TempFunctionsDb {
    /// Start a temporary server and connect to it
    ///
    /// Panics if the server cannot be started or connected to; this is test support code.
    pub async fn new(keep: bool, pool_size: u32) -> Self {
        // Set C locale. To remove this `unsafe` we need:
        // https://github.com/boustrophedon/pgtemp/pull/21
        unsafe {
            std::env::set_var("LANG", "C");
        }

        let builder = PgTempDBBuilder::new().persist_data(keep);
        let pg_temp = PgTempDB::from_builder(builder);

        tracing::info!(
            "initializing temp functions db at: {}",
            pg_temp.data_dir().display()
        );
        let uri = pg_temp.connection_uri();

        let functions_db = FunctionsDb::connect_with_retry(&uri, pool_size)
            .await
            .expect("failed to connect to temp functions db");

        TempFunctionsDb {
            inner: functions_db,
            _temp_db: pg_temp,
        }
    }

    /// Connection URL of the temporary server
    pub fn url(&self) -> &str {
        self.inner.url.as_ref()
    }
}

impl std::ops::Deref for TempFunctionsDb {
    type Target = FunctionsDb;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Shared among tests: catches more interaction bugs, at the cost of some determinism.
static TEMP_FUNCTIONS_DB: OnceCell<TempFunctionsDb> = OnceCell::const_new();

/// Get the shared temporary [`FunctionsDb`], starting it on first use
pub async fn temp_functions_db(keep: bool, pool_size: u32) -> &'static TempFunctionsDb {
    TEMP_FUNCTIONS_DB
        .get_or_init(|| async { TempFunctionsDb::new(keep, pool_size).await })
        .await
}
