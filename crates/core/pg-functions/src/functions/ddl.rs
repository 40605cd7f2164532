//! DDL rendering for function mutations
//!
//! The create statement is laid out exactly like `pg_get_functiondef` prints it, so the same
//! text serves both as the statement executed on create/alter and as the `complete_statement`
//! re-rendered from catalog state.
//!
//! Nothing here touches the database. Errors only report input that cannot be rendered into a
//! valid statement.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::{
    Behavior, Parallel,
    ident::{quote_ident, quote_literal},
    signature::{Argument, ArgMode, argument_types, signature_types},
};

/// Configuration parameters whose value is a list, printed as one quoted token per element.
const LIST_PARAMETERS: &[&str] = &[
    "local_preload_libraries",
    "search_path",
    "session_preload_libraries",
    "shared_preload_libraries",
    "temp_tablespaces",
    "unix_socket_directories",
];

/// Everything needed to render a `CREATE OR REPLACE FUNCTION` statement.
#[derive(Debug, Clone, Copy)]
pub struct CreateFunction<'a> {
    pub schema: &'a str,
    pub name: &'a str,
    pub arguments: &'a [Argument],
    /// Canonical `RETURNS` clause body
    pub result: &'a str,
    pub language: &'a str,
    pub behavior: Behavior,
    pub parallel: Parallel,
    pub strict: bool,
    pub security_definer: bool,
    pub leakproof: bool,
    /// Estimated execution cost; omitted when it equals the language's default
    pub cost: Option<f32>,
    /// Estimated result rows; omitted unless positive and other than the default `1000`
    pub rows: Option<f32>,
    pub config_params: Option<&'a IndexMap<String, String>>,
    pub definition: &'a str,
}

/// Addresses one existing overload: `schema.name(input types)`.
#[derive(Debug, Clone, Copy)]
pub struct FunctionTarget<'a> {
    pub schema: &'a str,
    pub name: &'a str,
    pub arguments: &'a [Argument],
}

impl std::fmt::Display for FunctionTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}({})",
            quote_ident(self.schema),
            quote_ident(self.name),
            signature_types(self.arguments)
        )
    }
}

/// Render the `CREATE OR REPLACE FUNCTION` statement.
///
/// Clause order is fixed: header, `RETURNS`, `LANGUAGE`, the attribute line, one `SET` line per
/// configuration parameter in map order, and the dollar-quoted body.
///
/// The attribute line holds volatility other than `VOLATILE`, `PARALLEL` other than `UNSAFE`,
/// `STRICT`, `SECURITY DEFINER`, `LEAKPROOF`, then non-default `COST` and `ROWS`. It is omitted
/// when empty.
pub fn render_create(func: &CreateFunction<'_>) -> Result<String, CompileError> {
    check_identifier("schema", func.schema)?;
    check_identifier("name", func.name)?;
    check_identifier("language", func.language)?;
    check_no_nul("return type", func.result)?;
    check_no_nul("definition", func.definition)?;
    check_arguments(func.arguments)?;

    let mut sql = format!(
        "CREATE OR REPLACE FUNCTION {}.{}({})\n",
        quote_ident(func.schema),
        quote_ident(func.name),
        argument_types(func.arguments)
    );
    sql.push_str(&format!(" RETURNS {}\n", func.result));
    sql.push_str(&format!(" LANGUAGE {}\n", quote_ident(func.language)));

    let mut attributes = String::new();
    match func.behavior {
        Behavior::Immutable => attributes.push_str(" IMMUTABLE"),
        Behavior::Stable => attributes.push_str(" STABLE"),
        Behavior::Volatile => {}
    }
    match func.parallel {
        Parallel::Safe => attributes.push_str(" PARALLEL SAFE"),
        Parallel::Restricted => attributes.push_str(" PARALLEL RESTRICTED"),
        Parallel::Unsafe => {}
    }
    if func.strict {
        attributes.push_str(" STRICT");
    }
    if func.security_definer {
        attributes.push_str(" SECURITY DEFINER");
    }
    if func.leakproof {
        attributes.push_str(" LEAKPROOF");
    }
    if let Some(cost) = func.cost.filter(|&cost| cost != default_cost(func.language)) {
        attributes.push_str(&format!(" COST {}", format_float(cost)));
    }
    if let Some(rows) = func.rows.filter(|&rows| rows > 0.0 && rows != DEFAULT_ROWS) {
        attributes.push_str(&format!(" ROWS {}", format_float(rows)));
    }
    if !attributes.is_empty() {
        sql.push_str(&attributes);
        sql.push('\n');
    }

    for (key, value) in func.config_params.into_iter().flatten() {
        check_identifier("configuration parameter name", key)?;
        check_no_nul("configuration parameter value", value)?;
        sql.push_str(&format!(
            " SET {} TO {}\n",
            quote_ident(key),
            render_config_value(key, value)
        ));
    }

    let tag = dollar_quote_tag(func.definition);
    sql.push_str(&format!("AS {tag}{}{tag}\n", func.definition));

    Ok(sql)
}

/// Cost assumed when none is declared: `1` for C and internal functions, `100` otherwise.
pub fn default_cost(language: &str) -> f32 {
    match language {
        "c" | "internal" => 1.0,
        _ => 100.0,
    }
}

/// Rows assumed for set-returning functions when none is declared.
pub const DEFAULT_ROWS: f32 = 1000.0;

/// Print a cost or row estimate the way C's `%g` does: six significant digits, no trailing
/// zeros, exponent notation outside `1e-4..1e6`.
fn format_float(value: f32) -> String {
    let value = f64::from(value);
    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };

    if (-4..6).contains(&exponent) {
        let decimals = usize::try_from(5 - exponent).unwrap_or(0);
        return trim_fraction(format!("{value:.decimals$}"));
    }

    let sign = if exponent < 0 { '-' } else { '+' };
    format!(
        "{}e{sign}{:02}",
        trim_fraction(mantissa.to_string()),
        exponent.abs()
    )
}

fn trim_fraction(number: String) -> String {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        number
    }
}

/// Render `ALTER FUNCTION ... RENAME TO ...`.
pub fn render_rename(target: &FunctionTarget<'_>, new_name: &str) -> Result<String, CompileError> {
    check_target(target)?;
    check_identifier("name", new_name)?;
    Ok(format!(
        "ALTER FUNCTION {target} RENAME TO {}",
        quote_ident(new_name)
    ))
}

/// Render `ALTER FUNCTION ... SET SCHEMA ...`.
pub fn render_set_schema(
    target: &FunctionTarget<'_>,
    new_schema: &str,
) -> Result<String, CompileError> {
    check_target(target)?;
    check_identifier("schema", new_schema)?;
    Ok(format!(
        "ALTER FUNCTION {target} SET SCHEMA {}",
        quote_ident(new_schema)
    ))
}

/// Render `DROP FUNCTION ...`.
pub fn render_drop(target: &FunctionTarget<'_>) -> Result<String, CompileError> {
    check_target(target)?;
    Ok(format!("DROP FUNCTION {target}"))
}

/// Render the value side of a `SET key TO value` clause.
///
/// List-valued parameters are split into their elements and each element is quoted on its
/// own: `hooks, auth` becomes `'hooks', 'auth'`. Any other value is a single literal.
pub fn render_config_value(key: &str, value: &str) -> String {
    if is_list_parameter(key) {
        split_config_list(value)
            .iter()
            .map(|item| quote_literal(item))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        quote_literal(value)
    }
}

/// Pick the dollar-quote tag for a body: `$function$`, extended with `x` until it does not
/// occur in the body.
pub fn dollar_quote_tag(body: &str) -> String {
    let mut tag = String::from("$function");
    while body.contains(&tag) {
        tag.push('x');
    }
    tag.push('$');
    tag
}

/// Check that an argument list forms a declarable signature.
///
/// - input arguments after a defaulted one must also be defaulted
/// - only input arguments may have defaults
/// - `VARIADIC` must be the last input argument
/// - names are unique among inputs and among outputs
pub fn check_arguments(args: &[Argument]) -> Result<(), CompileError> {
    let mut input_names = HashSet::new();
    let mut output_names = HashSet::new();
    let mut seen_default = false;
    let mut seen_variadic = false;

    for arg in args {
        let label = arg.to_string();
        check_no_nul("argument", &label)?;

        if arg.mode == ArgMode::Out {
            if arg.default.is_some() {
                return Err(CompileError::OutputDefault { argument: label });
            }
        } else {
            if seen_variadic {
                return Err(CompileError::VariadicNotLast { argument: label });
            }
            if arg.default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(CompileError::MissingDefault { argument: label });
            }
            seen_variadic = arg.mode == ArgMode::Variadic;
        }

        if let Some(name) = &arg.name {
            let is_output = matches!(arg.mode, ArgMode::Out | ArgMode::InOut);
            let duplicate_input = arg.is_input() && !input_names.insert(name.as_str());
            let duplicate_output = is_output && !output_names.insert(name.as_str());
            if duplicate_input || duplicate_output {
                return Err(CompileError::DuplicateArgumentName { name: name.clone() });
            }
        }
    }

    Ok(())
}

pub(crate) fn is_list_parameter(key: &str) -> bool {
    LIST_PARAMETERS
        .iter()
        .any(|param| param.eq_ignore_ascii_case(key))
}

/// Split a list-valued parameter into its elements.
///
/// Elements are comma separated and trimmed; a double-quoted element is dequoted with `""`
/// collapsed, and may contain commas. Empty elements are skipped.
pub(crate) fn split_config_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => quoted = !quoted,
            ',' if !quoted => {
                let item = current.trim().to_string();
                if !item.is_empty() {
                    items.push(item);
                }
                current.clear();
            }
            c if !quoted && c.is_whitespace() && current.is_empty() => {}
            c => current.push(c),
        }
    }
    let item = current.trim().to_string();
    if !item.is_empty() {
        items.push(item);
    }
    items
}

fn check_target(target: &FunctionTarget<'_>) -> Result<(), CompileError> {
    check_identifier("schema", target.schema)?;
    check_identifier("name", target.name)
}

fn check_identifier(field: &'static str, value: &str) -> Result<(), CompileError> {
    if value.trim().is_empty() {
        return Err(CompileError::EmptyIdentifier(field));
    }
    check_no_nul(field, value)
}

fn check_no_nul(field: &'static str, value: &str) -> Result<(), CompileError> {
    if value.contains('\0') {
        return Err(CompileError::NulByte(field));
    }
    Ok(())
}

/// Errors raised when a statement cannot be rendered from the given input.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A required identifier is blank.
    #[error("function {0} must not be empty")]
    EmptyIdentifier(&'static str),

    /// A value contains a NUL byte, which PostgreSQL cannot store.
    #[error("function {0} must not contain NUL bytes")]
    NulByte(&'static str),

    /// An input argument without a default follows one with a default.
    #[error("argument `{argument}` must have a default because a preceding argument has one")]
    MissingDefault { argument: String },

    /// An `OUT` argument declares a default.
    #[error("argument `{argument}` is an output argument and cannot have a default")]
    OutputDefault { argument: String },

    /// An input argument follows the `VARIADIC` argument.
    #[error("argument `{argument}` follows the VARIADIC argument, which must be the last input")]
    VariadicNotLast { argument: String },

    /// Two input (or two output) arguments share a name.
    #[error("argument name `{name}` is used more than once")]
    DuplicateArgumentName { name: String },
}
