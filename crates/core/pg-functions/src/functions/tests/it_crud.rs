//! In-tree DB integration tests for function management

use indexmap::IndexMap;

use crate::{
    Behavior, DEFAULT_POOL_SIZE, Error, FunctionDescriptor, FunctionRef, FunctionUpdate,
    KEEP_TEMP_DIRS, Language, ListOptions, NewFunction, Parallel,
    functions::{self, sql},
    temp::TempFunctionsDb,
    temp_functions_db,
};

/// A fresh, empty database per test
async fn temp_db() -> TempFunctionsDb {
    TempFunctionsDb::new(*KEEP_TEMP_DIRS, DEFAULT_POOL_SIZE).await
}

fn test_func() -> NewFunction {
    NewFunction {
        name: "test_func".to_string(),
        args: vec!["a int2".to_string(), "b int2".to_string()],
        definition: "select a + b".to_string(),
        return_type: "int4".to_string(),
        behavior: Behavior::Stable,
        security_definer: true,
        config_params: Some(IndexMap::from([
            ("search_path".to_string(), "hooks, auth".to_string()),
            ("role".to_string(), "postgres".to_string()),
        ])),
        ..Default::default()
    }
}

fn add_func(name: &str) -> NewFunction {
    NewFunction {
        name: name.to_string(),
        args: vec!["integer".to_string(), "integer".to_string()],
        definition: "select $1 + $2;".to_string(),
        return_type: "integer".to_string(),
        behavior: Behavior::Immutable,
        strict: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn create_returns_the_descriptor_read_back_from_the_catalog() {
    //* Given
    let db = temp_db().await;

    //* When
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    //* Then
    assert!(*created.id > 0);
    assert_eq!(created.schema, "public");
    assert_eq!(created.name, "test_func");
    assert_eq!(created.argument_types, "a smallint, b smallint");
    assert_eq!(created.identity_argument_types, "a smallint, b smallint");
    assert_eq!(created.return_type, "int4");
    assert_eq!(created.language.as_str(), "sql");
    assert_eq!(created.definition, "select a + b");
    assert_eq!(created.behavior, Behavior::Stable);
    assert!(created.security_definer);
    let config = created.config_params.expect("config should be stored");
    let keys: Vec<_> = config.keys().map(String::as_str).collect();
    assert_eq!(keys, ["search_path", "role"]);
    assert_eq!(config["search_path"], "hooks, auth");
    assert_eq!(config["role"], "postgres");
    assert_eq!(
        created.complete_statement,
        indoc::indoc! {"
            CREATE OR REPLACE FUNCTION public.test_func(a smallint, b smallint)
             RETURNS integer
             LANGUAGE sql
             STABLE SECURITY DEFINER
             SET search_path TO 'hooks', 'auth'
             SET role TO 'postgres'
            AS $function$select a + b$function$
        "}
    );
}

#[tokio::test]
async fn complete_statement_matches_the_server_rendering() {
    //* Given
    let db = temp_db().await;
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    //* When
    let server_rendering: String = sqlx::query_scalar("SELECT pg_get_functiondef($1::int8::oid)")
        .bind(created.id)
        .fetch_one(&*db)
        .await
        .expect("Failed to render function on the server");

    //* Then
    assert_eq!(created.complete_statement, server_rendering);
}

#[tokio::test]
async fn re_executing_the_complete_statement_changes_nothing() {
    //* Given
    let db = temp_db().await;
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    //* When
    sql::execute(&*db, &created.complete_statement)
        .await
        .expect("Failed to re-execute complete statement");

    //* Then
    let retrieved = db
        .retrieve_function(created.id)
        .await
        .expect("Failed to retrieve function");
    assert_eq!(retrieved, created);
}

#[tokio::test]
async fn retrieve_by_signature_ignores_argument_names_and_aliases() {
    //* Given
    let db = temp_db().await;
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    //* When
    let by_signature = db
        .retrieve_function(FunctionRef::Signature {
            schema: "public".to_string(),
            name: "test_func".to_string(),
            args: vec!["smallint".to_string(), "x int2".to_string()],
        })
        .await
        .expect("Failed to retrieve function by signature");
    let other_overload = db
        .retrieve_function(FunctionRef::Signature {
            schema: "public".to_string(),
            name: "test_func".to_string(),
            args: vec!["int4".to_string()],
        })
        .await;

    //* Then
    assert_eq!(by_signature.id, created.id);
    assert!(
        matches!(&other_overload, Err(err) if err.is_not_found()),
        "unexpected result: {other_overload:?}"
    );
}

#[tokio::test]
async fn list_orders_by_id_and_hides_system_schemas() {
    //* Given
    let db = temp_db().await;
    let first = db
        .create_function(&add_func("add_first"))
        .await
        .expect("Failed to create first function");
    let second = db
        .create_function(&add_func("add_second"))
        .await
        .expect("Failed to create second function");

    //* When
    let listed = db
        .list_functions(&db.list_options())
        .await
        .expect("Failed to list functions");
    let page = db
        .list_functions(&ListOptions {
            schemas: Some(vec!["public".to_string()]),
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        })
        .await
        .expect("Failed to list a page of functions");
    let with_system = db
        .list_functions(&ListOptions {
            include_system_schemas: true,
            limit: Some(10),
            ..Default::default()
        })
        .await
        .expect("Failed to list system functions");

    //* Then
    let ids: Vec<_> = listed.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert_eq!(listed[0].argument_types, "integer, integer");
    assert!(listed[0].strict);
    assert_eq!(
        listed[0].complete_statement,
        indoc::indoc! {"
            CREATE OR REPLACE FUNCTION public.add_first(integer, integer)
             RETURNS integer
             LANGUAGE sql
             IMMUTABLE STRICT
            AS $function$select $1 + $2;$function$
        "}
    );

    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, second.id);

    assert_eq!(with_system.len(), 10);
    assert!(with_system.iter().all(|f| f.schema == "pg_catalog"));
}

#[tokio::test]
async fn update_renames_and_relocates_keeping_the_id() {
    //* Given
    let db = temp_db().await;
    sqlx::query("CREATE SCHEMA test_schema")
        .execute(&*db)
        .await
        .expect("Failed to create schema");
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    let changes = FunctionUpdate {
        schema: Some("test_schema".to_string()),
        name: Some("test_func_renamed".to_string()),
        behavior: Some(Behavior::Immutable),
        security_definer: Some(false),
        ..Default::default()
    };

    //* When
    let updated = db
        .update_function(created.id, &changes)
        .await
        .expect("Failed to update function");

    //* Then
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.schema, "test_schema");
    assert_eq!(updated.name, "test_func_renamed");
    assert_eq!(updated.behavior, Behavior::Immutable);
    assert!(!updated.security_definer);
    assert_eq!(updated.definition, created.definition);
    assert_eq!(updated.config_params, created.config_params);
    assert!(
        updated
            .complete_statement
            .starts_with("CREATE OR REPLACE FUNCTION test_schema.test_func_renamed(a smallint, b smallint)\n"),
        "unexpected statement: {}",
        updated.complete_statement
    );

    let retrieved = db
        .retrieve_function(created.id)
        .await
        .expect("Failed to retrieve updated function");
    assert_eq!(retrieved, updated);
}

#[tokio::test]
async fn update_replaces_body_and_clears_config() {
    //* Given
    let db = temp_db().await;
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    let changes = FunctionUpdate {
        definition: Some("select a * b".to_string()),
        config_params: Some(IndexMap::new()),
        ..Default::default()
    };

    //* When
    let updated = db
        .update_function(created.id, &changes)
        .await
        .expect("Failed to update function");

    //* Then
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.definition, "select a * b");
    assert_eq!(updated.config_params, None);
    assert!(!updated.complete_statement.contains(" SET "));
}

#[tokio::test]
async fn empty_update_returns_the_unchanged_descriptor() {
    //* Given
    let db = temp_db().await;
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    //* When
    let updated = db
        .update_function(created.id, &FunctionUpdate::default())
        .await
        .expect("Failed to apply empty update");

    //* Then
    assert_eq!(updated, created);
}

#[tokio::test]
async fn failed_update_leaves_the_function_untouched() {
    //* Given
    let db = temp_db().await;
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    let changes = FunctionUpdate {
        name: Some("test_func_renamed".to_string()),
        definition: Some("selec a + b".to_string()),
        ..Default::default()
    };

    //* When
    let result = db.update_function(created.id, &changes).await;

    //* Then
    match result {
        Err(Error::Execution { code, message }) => {
            assert_eq!(code.as_deref(), Some("42601"));
            assert!(message.contains("syntax error"), "unexpected message: {message}");
        }
        other => panic!("expected an execution error, got {other:?}"),
    }
    let retrieved = db
        .retrieve_function(created.id)
        .await
        .expect("Failed to retrieve function");
    assert_eq!(retrieved, created);
}

#[tokio::test]
async fn remove_returns_the_pre_removal_descriptor() {
    //* Given
    let db = temp_db().await;
    let created = db
        .create_function(&test_func())
        .await
        .expect("Failed to create function");

    //* When
    let removed = db
        .remove_function(created.id)
        .await
        .expect("Failed to remove function");

    //* Then
    assert_eq!(removed, created);

    let err = db
        .retrieve_function(created.id)
        .await
        .expect_err("removed function should not be found");
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        format!("Cannot find a function with ID {}", created.id)
    );

    let err = db
        .remove_function(created.id)
        .await
        .expect_err("second removal should fail");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn invalid_requests_fail_before_touching_the_database() {
    //* Given
    let db = temp_db().await;
    let bad_type = NewFunction {
        args: vec!["a varchar(abc)".to_string()],
        ..add_func("bad_type")
    };
    let bad_order = NewFunction {
        args: vec!["a int4 default 1".to_string(), "b int4".to_string()],
        ..add_func("bad_order")
    };

    //* When
    let bad_type = db.create_function(&bad_type).await;
    let bad_order = db.create_function(&bad_order).await;

    //* Then
    assert!(matches!(bad_type, Err(Error::Validation(_))));
    assert!(matches!(bad_order, Err(Error::Compilation(_))));
    let listed = db
        .list_functions(&ListOptions::default())
        .await
        .expect("Failed to list functions");
    assert!(listed.is_empty());
}

#[tokio::test]
async fn operations_run_over_transactions_and_dedicated_connections() {
    //* Given
    let db = temp_db().await;
    let mut conn = db
        .dedicated_connection()
        .await
        .expect("Failed to open dedicated connection");

    let created = db
        .create_function(&add_func("add_in_txn"))
        .await
        .expect("Failed to create function");
    let statement = created
        .complete_statement
        .replace("add_in_txn", "add_uncommitted");

    let mut tx = db.begin_txn().await.expect("Failed to begin transaction");
    sql::execute(&mut tx, &statement)
        .await
        .expect("Failed to create function in transaction");

    //* When
    let inside = functions::list(&mut tx, &ListOptions::default())
        .await
        .expect("Failed to list inside transaction");
    tx.rollback().await.expect("Failed to roll back");
    let outside = functions::list(&mut conn, &ListOptions::default())
        .await
        .expect("Failed to list over dedicated connection");

    //* Then
    let names = |list: &[FunctionDescriptor]| {
        list.iter().map(|f| f.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&inside), vec!["add_in_txn", "add_uncommitted"]);
    assert_eq!(names(&outside), vec!["add_in_txn"]);
}

#[tokio::test]
async fn empty_update_keeps_planner_attributes() {
    //* Given
    let db = temp_db().await;
    let created = db
        .create_function(&NewFunction {
            parallel: Parallel::Safe,
            leakproof: true,
            cost: Some(5.0),
            ..add_func("add_planned")
        })
        .await
        .expect("Failed to create function");

    //* When
    let updated = db
        .update_function(created.id, &FunctionUpdate::default())
        .await
        .expect("Failed to apply empty update");

    //* Then
    assert_eq!(updated, created);
    assert_eq!(updated.parallel, Parallel::Safe);
    assert!(updated.leakproof);
    assert_eq!(updated.cost, 5.0);

    let stored: (String, bool, f32) = sqlx::query_as(
        "SELECT proparallel::text, proleakproof, procost FROM pg_proc WHERE oid = $1::int8::oid",
    )
    .bind(created.id)
    .fetch_one(&*db)
    .await
    .expect("Failed to read catalog row");
    assert_eq!(stored, ("s".to_string(), true, 5.0));

    let server_rendering: String = sqlx::query_scalar("SELECT pg_get_functiondef($1::int8::oid)")
        .bind(created.id)
        .fetch_one(&*db)
        .await
        .expect("Failed to render function on the server");
    assert_eq!(updated.complete_statement, server_rendering);
    assert!(
        server_rendering.contains(" IMMUTABLE PARALLEL SAFE STRICT LEAKPROOF COST 5\n"),
        "unexpected rendering: {server_rendering}"
    );
}

#[tokio::test]
async fn create_accepts_user_defined_types_and_any_language_case() {
    //* Given
    let db = temp_db().await;
    sql::execute(
        &*db,
        "CREATE TYPE mood AS ENUM ('ok'); CREATE TABLE profiles (id int);",
    )
    .await
    .expect("Failed to create types");
    let function = NewFunction {
        name: "profiles_for".to_string(),
        args: vec!["m mood".to_string(), "l pg_lsn".to_string()],
        definition: "select * from profiles".to_string(),
        return_type: "setof profiles".to_string(),
        language: Language::new("SQL").expect("valid language"),
        ..Default::default()
    };

    //* When
    let created = db
        .create_function(&function)
        .await
        .expect("Failed to create function");
    let by_signature = db
        .retrieve_function(FunctionRef::Signature {
            schema: "public".to_string(),
            name: "profiles_for".to_string(),
            args: vec!["mood".to_string(), "pg_lsn".to_string()],
        })
        .await
        .expect("Failed to retrieve function by signature");

    //* Then
    assert_eq!(created.argument_types, "m mood, l pg_lsn");
    assert_eq!(created.result, "SETOF profiles");
    assert_eq!(created.return_type, "profiles");
    assert_eq!(created.language.as_str(), "sql");
    assert_eq!(by_signature, created);
}

#[tokio::test]
async fn missing_types_are_reported_by_the_database() {
    //* Given
    let db = temp_db().await;
    let function = NewFunction {
        args: vec!["a no_such_type".to_string()],
        ..add_func("add_missing")
    };

    //* When
    let result = db.create_function(&function).await;

    //* Then
    assert!(
        matches!(&result, Err(Error::Execution { code, .. }) if code.as_deref() == Some("42704")),
        "unexpected result: {result:?}"
    );
}

#[tokio::test]
async fn set_clauses_keep_the_declared_order() {
    //* Given
    let db = temp_db().await;
    sql::execute(
        &*db,
        indoc::indoc! {"
            CREATE FUNCTION public.q() RETURNS void LANGUAGE sql
              SET search_path TO 'hooks', 'auth'
              SET role TO 'postgres'
            AS $$ select 1 $$
        "},
    )
    .await
    .expect("Failed to create function on the server");

    //* When
    let retrieved = db
        .retrieve_function(FunctionRef::Signature {
            schema: "public".to_string(),
            name: "q".to_string(),
            args: Vec::new(),
        })
        .await
        .expect("Failed to retrieve function");

    //* Then
    let server_rendering: String = sqlx::query_scalar("SELECT pg_get_functiondef($1::int8::oid)")
        .bind(retrieved.id)
        .fetch_one(&*db)
        .await
        .expect("Failed to render function on the server");
    assert_eq!(retrieved.complete_statement, server_rendering);

    let config = retrieved.config_params.expect("config should be stored");
    let keys: Vec<_> = config.keys().map(String::as_str).collect();
    assert_eq!(keys, ["search_path", "role"]);
}

#[tokio::test]
async fn statement_timeouts_surface_as_cancellation() {
    //* Given
    let db = temp_functions_db(*KEEP_TEMP_DIRS, DEFAULT_POOL_SIZE).await;
    let mut conn = db
        .dedicated_connection()
        .await
        .expect("Failed to open dedicated connection");
    sql::execute(&mut conn, "SET statement_timeout = '1ms'")
        .await
        .expect("Failed to set statement timeout");

    //* When
    let result = sql::execute(&mut conn, "SELECT pg_sleep(1)")
        .await
        .map_err(Error::from);

    //* Then
    assert!(
        matches!(&result, Err(Error::CancelledOrTimedOut(_))),
        "unexpected result: {result:?}"
    );
    assert!(!matches!(&result, Err(err) if err.is_not_found()));
}
