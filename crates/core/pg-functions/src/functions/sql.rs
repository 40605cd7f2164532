//! Internal SQL operations for function introspection and DDL execution

use sqlx::{Executor, Postgres};

use super::{FunctionId, catalog::RawFunctionRow};

/// Columns shared by every introspection query, in [`RawFunctionRow`] order.
///
/// Only plain functions (`prokind = 'f'`) are considered; procedures, aggregates and window
/// functions cannot be managed through the statements rendered by this crate.
const SELECT_FUNCTIONS: &str = indoc::indoc! {r#"
    SELECT p.oid::int8 AS id,
           n.nspname::text AS schema,
           p.proname::text AS name,
           pg_get_function_arguments(p.oid) AS arguments,
           pg_get_function_result(p.oid) AS result,
           t.typname::text AS return_type,
           l.lanname::text AS language,
           p.prosrc AS definition,
           p.provolatile::text AS volatility,
           p.proparallel::text AS parallel,
           p.proisstrict AS is_strict,
           p.prosecdef AS security_definer,
           p.proleakproof AS leakproof,
           p.procost AS cost,
           p.prorows AS rows,
           p.proconfig AS config
    FROM pg_catalog.pg_proc p
    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
    JOIN pg_catalog.pg_language l ON l.oid = p.prolang
    JOIN pg_catalog.pg_type t ON t.oid = p.prorettype
    WHERE p.prokind = 'f'
"#};

/// List functions ordered by id
///
/// System schemas (`pg_catalog`, `information_schema`, `pg_toast*`, `pg_temp*`) are excluded
/// unless `include_system_schemas` is set. `schemas` restricts the result to the given schemas.
/// A `None` limit returns every remaining row.
pub async fn list<'c, E>(
    exe: E,
    include_system_schemas: bool,
    schemas: Option<&[String]>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<RawFunctionRow>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = format!(
        "{SELECT_FUNCTIONS}{}",
        indoc::indoc! {r#"
              AND ($1 OR (n.nspname NOT IN ('pg_catalog', 'information_schema')
                          AND n.nspname NOT LIKE 'pg\_toast%'
                          AND n.nspname NOT LIKE 'pg\_temp%'))
              AND ($2::text[] IS NULL OR n.nspname = ANY($2))
            ORDER BY p.oid
            LIMIT $3 OFFSET $4
        "#}
    );

    sqlx::query_as(&query)
        .bind(include_system_schemas)
        .bind(schemas.map(<[String]>::to_vec))
        .bind(limit)
        .bind(offset.unwrap_or(0))
        .fetch_all(exe)
        .await
}

/// Get a function by its id
pub async fn get_by_id<'c, E>(exe: E, id: FunctionId) -> Result<Option<RawFunctionRow>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = format!("{SELECT_FUNCTIONS}  AND p.oid::int8 = $1\n");

    sqlx::query_as(&query).bind(id).fetch_optional(exe).await
}

/// Get the overload a `schema.name(type, ...)` signature resolves to
///
/// Type names are resolved by the server, so aliases and unqualified names on the search path
/// match what is stored.
pub async fn get_by_signature<'c, E>(
    exe: E,
    signature: &str,
) -> Result<Option<RawFunctionRow>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = format!("{SELECT_FUNCTIONS}  AND p.oid = to_regprocedure($1)::oid\n");

    sqlx::query_as(&query)
        .bind(signature)
        .fetch_optional(exe)
        .await
}

/// Execute a rendered DDL statement over the simple query protocol
pub async fn execute<'c, E>(exe: E, statement: &str) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    tracing::debug!(%statement, "executing function DDL");
    exe.execute(sqlx::raw_sql(statement)).await?;
    Ok(())
}
