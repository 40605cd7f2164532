//! Transaction wrapper with rollback on drop

use sqlx::Postgres;

use crate::error::Error;

/// An open database transaction
///
/// Rolled back when dropped unless [`Transaction::commit`] was called. PostgreSQL DDL is
/// transactional, so a multi-statement function update either lands completely or not at all.
#[derive(Debug)]
pub struct Transaction(sqlx::Transaction<'static, Postgres>);

impl Transaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self(tx)
    }

    /// Commits all statements executed within this transaction.
    pub async fn commit(self) -> Result<(), Error> {
        self.0.commit().await.map_err(Error::from)
    }

    /// Rolls back all statements executed within this transaction.
    ///
    /// Equivalent to dropping the transaction, but reports rollback failures.
    pub async fn rollback(self) -> Result<(), Error> {
        self.0.rollback().await.map_err(Error::from)
    }
}

super::delegate_executor!(&mut Transaction, |tx| &mut *tx.0);
