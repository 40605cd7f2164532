//! Database connection layer
//!
//! Connection pool, dedicated connection and transaction wrappers, all usable as an
//! [`Executor`] for the catalog queries and DDL in [`crate::functions`].
//!
//! Private to the crate; lib.rs re-exports the public types.

mod conn;
mod exec;
mod txn;

pub use conn::{ConnError, ConnPool, Connection};
pub(crate) use exec::delegate_executor;
pub use exec::Executor;
pub use txn::Transaction;
