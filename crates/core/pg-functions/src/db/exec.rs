//! Custom executor trait for function management operations
//!
//! This module defines a marker trait that extends [`sqlx::Executor`] and restricts
//! which types can be used as database executors in the public API.

use sqlx::Postgres;

/// Database executor trait that extends [`sqlx::Executor`]
///
/// Implemented for `&FunctionsDb`, `&ConnPool`, `&mut Connection` and `&mut Transaction`.
/// The trait is sealed: catalog reads and DDL only run over the crate's own connection types.
pub trait Executor<'c>: sqlx::Executor<'c, Database = Postgres> + crate::_priv::Sealed {}

/// Implement [`sqlx::Executor`], [`Executor`] and the sealing marker for a reference to a
/// wrapper type by forwarding every call to the executor it wraps.
///
/// `delegate_executor!(&Wrapper, |this| &this.inner)` for shared access,
/// `delegate_executor!(&mut Wrapper, |this| &mut this.inner)` for exclusive access.
macro_rules! delegate_executor {
    (&mut $ty:ty, |$this:ident| $inner:expr) => {
        $crate::db::delegate_executor!(@impl [mut] $ty, |$this| $inner);
    };
    (&$ty:ty, |$this:ident| $inner:expr) => {
        $crate::db::delegate_executor!(@impl [] $ty, |$this| $inner);
    };
    (@impl [$($mutability:tt)?] $ty:ty, |$this:ident| $inner:expr) => {
        impl<'c> sqlx::Executor<'c> for &'c $($mutability)? $ty {
            type Database = sqlx::Postgres;

            fn fetch_many<'e, 'q: 'e, E>(
                self,
                query: E,
            ) -> futures::stream::BoxStream<
                'e,
                Result<
                    sqlx::Either<
                        <sqlx::Postgres as sqlx::Database>::QueryResult,
                        <sqlx::Postgres as sqlx::Database>::Row,
                    >,
                    sqlx::Error,
                >,
            >
            where
                'c: 'e,
                E: 'q + sqlx::Execute<'q, Self::Database>,
            {
                let $this = self;
                sqlx::Executor::fetch_many($inner, query)
            }

            fn fetch_optional<'e, 'q: 'e, E>(
                self,
                query: E,
            ) -> futures::future::BoxFuture<
                'e,
                Result<Option<<sqlx::Postgres as sqlx::Database>::Row>, sqlx::Error>,
            >
            where
                'c: 'e,
                E: 'q + sqlx::Execute<'q, Self::Database>,
            {
                let $this = self;
                sqlx::Executor::fetch_optional($inner, query)
            }

            fn prepare_with<'e, 'q: 'e>(
                self,
                sql: &'q str,
                parameters: &'e [<sqlx::Postgres as sqlx::Database>::TypeInfo],
            ) -> futures::future::BoxFuture<
                'e,
                Result<<sqlx::Postgres as sqlx::Database>::Statement<'q>, sqlx::Error>,
            >
            where
                'c: 'e,
            {
                let $this = self;
                sqlx::Executor::prepare_with($inner, sql, parameters)
            }

            fn describe<'e, 'q: 'e>(
                self,
                sql: &'q str,
            ) -> futures::future::BoxFuture<'e, Result<sqlx::Describe<Self::Database>, sqlx::Error>>
            where
                'c: 'e,
            {
                let $this = self;
                sqlx::Executor::describe($inner, sql)
            }
        }

        impl<'c> $crate::db::Executor<'c> for &'c $($mutability)? $ty {}

        impl<'c> $crate::_priv::Sealed for &'c $($mutability)? $ty {}
    };
}

pub(crate) use delegate_executor;
