//! Catalog row to descriptor mapping

use indexmap::IndexMap;

use super::{
    Behavior, FunctionDescriptor, FunctionId, Language, Parallel,
    ddl::{CompileError, render_create},
    signature::{ValidationError, argument_types, identity_argument_types, parse_argument_list},
};

/// One function overload as read from `pg_proc` and its joined catalogs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawFunctionRow {
    /// `pg_proc.oid`
    pub id: FunctionId,
    pub schema: String,
    pub name: String,
    /// Output of `pg_get_function_arguments`
    pub arguments: String,
    /// Output of `pg_get_function_result`
    pub result: String,
    /// `pg_type.typname` of the return type
    pub return_type: String,
    pub language: String,
    /// `pg_proc.prosrc`
    pub definition: String,
    /// `pg_proc.provolatile` as text
    pub volatility: String,
    /// `pg_proc.proparallel` as text
    pub parallel: String,
    pub is_strict: bool,
    pub security_definer: bool,
    pub leakproof: bool,
    /// `pg_proc.procost`
    pub cost: f32,
    /// `pg_proc.prorows`, zero unless the function returns a set
    pub rows: f32,
    /// `pg_proc.proconfig`, entries of the form `key=value`
    pub config: Option<Vec<String>>,
}

/// Convert a catalog row into a descriptor, recomputing every derived field.
pub fn into_descriptor(row: RawFunctionRow) -> Result<FunctionDescriptor, MapError> {
    let id = row.id;

    let arguments = parse_argument_list(&row.arguments)
        .map_err(|source| MapError::Arguments { id, source })?;

    let behavior = Behavior::from_volatility_code(&row.volatility).ok_or_else(|| {
        MapError::UnknownVolatility {
            id,
            code: row.volatility.clone(),
        }
    })?;
    let parallel = Parallel::from_parallel_code(&row.parallel).ok_or_else(|| {
        MapError::UnknownParallelSafety {
            id,
            code: row.parallel.clone(),
        }
    })?;

    let mut descriptor = FunctionDescriptor {
        id,
        schema: row.schema,
        name: row.name,
        argument_types: argument_types(&arguments),
        identity_argument_types: identity_argument_types(&arguments),
        arguments,
        return_type: row.return_type,
        result: row.result.trim().to_string(),
        language: Language::from_catalog(row.language),
        definition: row.definition,
        behavior,
        parallel,
        strict: row.is_strict,
        security_definer: row.security_definer,
        leakproof: row.leakproof,
        cost: row.cost,
        rows: row.rows,
        config_params: parse_config(row.config),
        complete_statement: String::new(),
    };

    descriptor.complete_statement = render_create(&descriptor.as_create())
        .map_err(|source| MapError::Render { id, source })?;

    Ok(descriptor)
}

/// Parse `proconfig` entries into a map, keeping their catalog order.
///
/// Each entry splits at its first `=`; an entry without `=` maps to an empty value. A missing or
/// empty array maps to `None`.
pub fn parse_config(config: Option<Vec<String>>) -> Option<IndexMap<String, String>> {
    let entries = config.filter(|entries| !entries.is_empty())?;
    Some(
        entries
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (entry, String::new()),
            })
            .collect(),
    )
}

/// A catalog row that cannot be turned into a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The `pg_get_function_arguments` output could not be parsed.
    #[error("function {id}: cannot parse catalog arguments: {source}")]
    Arguments {
        id: FunctionId,
        #[source]
        source: ValidationError,
    },

    /// `provolatile` holds an unexpected code.
    #[error("function {id}: unknown volatility code '{code}'")]
    UnknownVolatility { id: FunctionId, code: String },

    /// `proparallel` holds an unexpected code.
    #[error("function {id}: unknown parallel safety code '{code}'")]
    UnknownParallelSafety { id: FunctionId, code: String },

    /// The catalog state cannot be rendered back into a create statement.
    #[error("function {id}: cannot render create statement: {source}")]
    Render {
        id: FunctionId,
        #[source]
        source: CompileError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::signature::ArgMode;

    fn test_func_row() -> RawFunctionRow {
        RawFunctionRow {
            id: FunctionId::from(16390_u32),
            schema: "public".to_string(),
            name: "test_func".to_string(),
            arguments: "a smallint, b smallint".to_string(),
            result: "integer".to_string(),
            return_type: "int4".to_string(),
            language: "sql".to_string(),
            definition: "select a + b".to_string(),
            volatility: "s".to_string(),
            parallel: "u".to_string(),
            is_strict: false,
            security_definer: true,
            leakproof: false,
            cost: 100.0,
            rows: 0.0,
            config: Some(vec![
                "search_path=hooks, auth".to_string(),
                "role=postgres".to_string(),
            ]),
        }
    }

    #[test]
    fn into_descriptor_maps_every_field() {
        //* Given
        let row = test_func_row();

        //* When
        let descriptor = into_descriptor(row).expect("row should map");

        //* Then
        assert_eq!(*descriptor.id, 16390);
        assert_eq!(descriptor.schema, "public");
        assert_eq!(descriptor.name, "test_func");
        assert_eq!(descriptor.argument_types, "a smallint, b smallint");
        assert_eq!(descriptor.identity_argument_types, "a smallint, b smallint");
        assert_eq!(descriptor.return_type, "int4");
        assert_eq!(descriptor.language.as_str(), "sql");
        assert_eq!(descriptor.definition, "select a + b");
        assert_eq!(descriptor.behavior, Behavior::Stable);
        assert!(descriptor.security_definer);
        assert!(!descriptor.strict);

        let config = descriptor.config_params.expect("config should be present");
        assert_eq!(config.get("search_path").map(String::as_str), Some("hooks, auth"));
        assert_eq!(config.get("role").map(String::as_str), Some("postgres"));

        assert_eq!(
            descriptor.complete_statement,
            "CREATE OR REPLACE FUNCTION public.test_func(a smallint, b smallint)\n \
             RETURNS integer\n \
             LANGUAGE sql\n \
             STABLE SECURITY DEFINER\n \
             SET search_path TO 'hooks', 'auth'\n \
             SET role TO 'postgres'\n\
             AS $function$select a + b$function$\n"
        );
    }

    #[test]
    fn into_descriptor_keeps_user_defined_types_from_the_catalog() {
        //* Given
        let row = RawFunctionRow {
            arguments: "m mood, VARIADIC tags text[] DEFAULT '{}'::text[]".to_string(),
            result: "SETOF mood".to_string(),
            return_type: "mood".to_string(),
            volatility: "v".to_string(),
            security_definer: false,
            config: None,
            ..test_func_row()
        };

        //* When
        let descriptor = into_descriptor(row).expect("row should map");

        //* Then
        assert_eq!(descriptor.arguments.len(), 2);
        assert_eq!(descriptor.arguments[0].type_name, "mood");
        assert_eq!(descriptor.arguments[1].mode, ArgMode::Variadic);
        assert_eq!(descriptor.identity_argument_types, "m mood");
        assert_eq!(descriptor.config_params, None);
        assert_eq!(
            descriptor.complete_statement,
            "CREATE OR REPLACE FUNCTION public.test_func(m mood, VARIADIC tags text[] DEFAULT '{}'::text[])\n \
             RETURNS SETOF mood\n \
             LANGUAGE sql\n\
             AS $function$select a + b$function$\n"
        );
    }

    #[test]
    fn into_descriptor_rejects_unknown_volatility() {
        //* Given
        let row = RawFunctionRow {
            volatility: "x".to_string(),
            ..test_func_row()
        };

        //* When
        let result = into_descriptor(row);

        //* Then
        assert!(matches!(
            result,
            Err(MapError::UnknownVolatility { code, .. }) if code == "x"
        ));
    }

    #[test]
    fn into_descriptor_carries_planner_attributes() {
        //* Given
        let row = RawFunctionRow {
            arguments: "n integer".to_string(),
            result: "SETOF integer".to_string(),
            volatility: "i".to_string(),
            parallel: "s".to_string(),
            security_definer: false,
            leakproof: true,
            cost: 5.0,
            rows: 20.0,
            config: None,
            ..test_func_row()
        };

        //* When
        let descriptor = into_descriptor(row).expect("row should map");

        //* Then
        assert_eq!(descriptor.parallel, Parallel::Safe);
        assert!(descriptor.leakproof);
        assert_eq!(descriptor.cost, 5.0);
        assert_eq!(descriptor.rows, 20.0);
        assert_eq!(
            descriptor.complete_statement,
            "CREATE OR REPLACE FUNCTION public.test_func(n integer)\n \
             RETURNS SETOF integer\n \
             LANGUAGE sql\n \
             IMMUTABLE PARALLEL SAFE LEAKPROOF COST 5 ROWS 20\n\
             AS $function$select a + b$function$\n"
        );
    }

    #[test]
    fn into_descriptor_rejects_unknown_parallel_safety() {
        //* Given
        let row = RawFunctionRow {
            parallel: "?".to_string(),
            ..test_func_row()
        };

        //* When
        let result = into_descriptor(row);

        //* Then
        assert!(matches!(
            result,
            Err(MapError::UnknownParallelSafety { code, .. }) if code == "?"
        ));
    }

    #[test]
    fn parse_config_keeps_catalog_order() {
        //* When
        let config = parse_config(Some(vec![
            "search_path=hooks, auth".to_string(),
            "role=postgres".to_string(),
        ]))
        .expect("config should be present");

        //* Then
        let keys: Vec<_> = config.keys().map(String::as_str).collect();
        assert_eq!(keys, ["search_path", "role"]);
    }

    #[test]
    fn parse_config_splits_at_the_first_equals_sign() {
        //* When
        let config = parse_config(Some(vec![
            "app.expr=a=b".to_string(),
            "flag".to_string(),
            "search_path=\"$user\", public".to_string(),
        ]))
        .expect("config should be present");

        //* Then
        assert_eq!(config.get("app.expr").map(String::as_str), Some("a=b"));
        assert_eq!(config.get("flag").map(String::as_str), Some(""));
        assert_eq!(
            config.get("search_path").map(String::as_str),
            Some("\"$user\", public")
        );
    }

    #[test]
    fn parse_config_maps_empty_arrays_to_none() {
        assert_eq!(parse_config(None), None);
        assert_eq!(parse_config(Some(Vec::new())), None);
    }
}
