//! Argument and type normalization
//!
//! Turns argument declarations (as written in a create request, or as printed by
//! `pg_get_function_arguments`) into [`Argument`] values with canonical type spellings, and
//! derives the comma-joined signature strings exposed on a function descriptor.
//!
//! Everything in this module is pure: no I/O and no shared state.

use super::ident::{parse_ident, quote_ident};

/// Canonical spellings, keyed by the lowercase, single-spaced, modifier-free alias.
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("\"char\"", "\"char\""),
    ("anyarray", "anyarray"),
    ("anycompatible", "anycompatible"),
    ("anycompatiblearray", "anycompatiblearray"),
    ("anyelement", "anyelement"),
    ("anyenum", "anyenum"),
    ("anymultirange", "anymultirange"),
    ("anynonarray", "anynonarray"),
    ("anyrange", "anyrange"),
    ("bigint", "bigint"),
    ("bit", "bit"),
    ("bit varying", "bit varying"),
    ("bool", "boolean"),
    ("boolean", "boolean"),
    ("box", "box"),
    ("bpchar", "bpchar"),
    ("bytea", "bytea"),
    ("char", "bpchar"),
    ("character", "bpchar"),
    ("character varying", "character varying"),
    ("cidr", "cidr"),
    ("circle", "circle"),
    ("cstring", "cstring"),
    ("date", "date"),
    ("daterange", "daterange"),
    ("decimal", "numeric"),
    ("double precision", "double precision"),
    ("event_trigger", "event_trigger"),
    ("fdw_handler", "fdw_handler"),
    ("float", "double precision"),
    ("float4", "real"),
    ("float8", "double precision"),
    ("index_am_handler", "index_am_handler"),
    ("inet", "inet"),
    ("int", "integer"),
    ("int2", "smallint"),
    ("int4", "integer"),
    ("int4range", "int4range"),
    ("int8", "bigint"),
    ("int8range", "int8range"),
    ("integer", "integer"),
    ("internal", "internal"),
    ("interval", "interval"),
    ("json", "json"),
    ("jsonb", "jsonb"),
    ("jsonpath", "jsonpath"),
    ("language_handler", "language_handler"),
    ("line", "line"),
    ("lseg", "lseg"),
    ("macaddr", "macaddr"),
    ("macaddr8", "macaddr8"),
    ("money", "money"),
    ("name", "name"),
    ("numeric", "numeric"),
    ("numrange", "numrange"),
    ("oid", "oid"),
    ("path", "path"),
    ("point", "point"),
    ("polygon", "polygon"),
    ("real", "real"),
    ("record", "record"),
    ("refcursor", "refcursor"),
    ("regclass", "regclass"),
    ("regnamespace", "regnamespace"),
    ("regproc", "regproc"),
    ("regprocedure", "regprocedure"),
    ("regrole", "regrole"),
    ("regtype", "regtype"),
    ("smallint", "smallint"),
    ("table_am_handler", "table_am_handler"),
    ("text", "text"),
    ("time", "time without time zone"),
    ("time with time zone", "time with time zone"),
    ("time without time zone", "time without time zone"),
    ("timestamp", "timestamp without time zone"),
    ("timestamp with time zone", "timestamp with time zone"),
    ("timestamp without time zone", "timestamp without time zone"),
    ("timestamptz", "timestamp with time zone"),
    ("timetz", "time with time zone"),
    ("trigger", "trigger"),
    ("tsm_handler", "tsm_handler"),
    ("tsquery", "tsquery"),
    ("tsrange", "tsrange"),
    ("tstzrange", "tstzrange"),
    ("tsvector", "tsvector"),
    ("uuid", "uuid"),
    ("varbit", "bit varying"),
    ("varchar", "character varying"),
    ("void", "void"),
    ("xml", "xml"),
];

/// The mode of a function argument.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArgMode {
    #[default]
    In,
    Out,
    InOut,
    Variadic,
}

impl ArgMode {
    /// The keyword prefix printed before the argument, empty for `IN`.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::In => "",
            Self::Out => "OUT ",
            Self::InOut => "INOUT ",
            Self::Variadic => "VARIADIC ",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            w if w.eq_ignore_ascii_case("IN") => Some(Self::In),
            w if w.eq_ignore_ascii_case("OUT") => Some(Self::Out),
            w if w.eq_ignore_ascii_case("INOUT") => Some(Self::InOut),
            w if w.eq_ignore_ascii_case("VARIADIC") => Some(Self::Variadic),
            _ => None,
        }
    }
}

/// One declared function argument with its type in canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Argument {
    pub mode: ArgMode,
    /// Argument name as stored by the database (unquoted identifiers folded to lowercase)
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Default expression, verbatim
    pub default: Option<String>,
}

impl Argument {
    /// Whether the argument takes part in the call signature (everything but `OUT`).
    pub fn is_input(&self) -> bool {
        self.mode != ArgMode::Out
    }

    /// Render as `[MODE ][name ]type`, without any default.
    pub fn render_declaration(&self) -> String {
        match &self.name {
            Some(name) => format!("{}{} {}", self.mode.prefix(), quote_ident(name), self.type_name),
            None => format!("{}{}", self.mode.prefix(), self.type_name),
        }
    }
}

impl std::fmt::Display for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_declaration())?;
        if let Some(default) = &self.default {
            write!(f, " DEFAULT {default}")?;
        }
        Ok(())
    }
}

/// Parse a single argument declaration.
///
/// Accepts `[IN|OUT|INOUT|VARIADIC] [name] type [DEFAULT expr | = expr]`. The leading word is
/// taken as the argument name only when the remaining words do not form a known type on their
/// own, so `double precision` is an unnamed argument while `a double precision` is named `a`.
pub fn parse_argument(raw: &str) -> Result<Argument, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyArgument);
    }

    let (head, default) = split_default(text);
    let default = match default {
        Some(expr) if expr.trim().is_empty() => {
            return Err(invalid_argument(raw, "empty default expression"));
        }
        Some(expr) => Some(expr.trim().to_string()),
        None => None,
    };

    let mut words = split_words(head);
    let mode = match words.first().and_then(|w| ArgMode::from_keyword(w)) {
        Some(mode) if words.len() > 1 => {
            words.remove(0);
            mode
        }
        _ => ArgMode::In,
    };

    let (name, type_name) = match words.as_slice() {
        [] => return Err(invalid_argument(raw, "missing argument type")),
        [single] => (None, canonical_type(single)?),
        [first, rest @ ..] => {
            let whole = words.join(" ");
            match known_type(&whole) {
                Some(canonical) => (None, canonical),
                None => {
                    let name = parse_ident(first)
                        .ok_or_else(|| invalid_argument(raw, "invalid argument name"))?;
                    (Some(name), canonical_type(&rest.join(" "))?)
                }
            }
        }
    };

    Ok(Argument {
        mode,
        name,
        type_name,
        default,
    })
}

/// Parse a comma-separated argument list such as the output of `pg_get_function_arguments`.
///
/// Commas inside parentheses or quotes do not split. An empty or blank list yields no
/// arguments.
pub fn parse_argument_list(raw: &str) -> Result<Vec<Argument>, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(raw, ',')
        .into_iter()
        .map(|entry| parse_argument(entry))
        .collect()
}

/// Resolve a type name to its canonical spelling.
///
/// Aliases resolve to the engine's names (`int4` to `integer`, `bool` to `boolean`, ...),
/// type modifiers are dropped because function arguments never keep them, and array suffixes
/// are preserved as `[]`. Any other well-formed name (`mood`, `pg_lsn`, `auth.users`) is kept
/// as written; whether such a type exists is for the database to say.
pub fn canonical_type(raw: &str) -> Result<String, ValidationError> {
    let invalid = || ValidationError::InvalidArgumentType {
        type_name: raw.trim().to_string(),
    };

    let mut base = raw.trim();
    if base.is_empty() || base.contains('\0') {
        return Err(invalid());
    }

    let mut dimensions = 0;
    while let Some(stripped) = strip_array_suffix(base) {
        base = stripped;
        dimensions += 1;
    }

    let base = strip_modifiers(base).ok_or_else(invalid)?;
    let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
    if base.is_empty() {
        return Err(invalid());
    }

    let resolved = match resolve_base(&base) {
        Some(resolved) => resolved,
        None => return Err(invalid()),
    };

    Ok(format!("{resolved}{}", "[]".repeat(dimensions)))
}

/// Resolve a `RETURNS` clause body (`integer`, `SETOF text`, `TABLE(a int4, b text)`).
pub fn canonical_result(raw: &str) -> Result<String, ValidationError> {
    let text = raw.trim();
    let lower = text.to_ascii_lowercase();

    if let Some(rest) = lower.strip_prefix("setof ") {
        let rest = &text[text.len() - rest.len()..];
        return Ok(format!("SETOF {}", canonical_type(rest)?));
    }

    if lower.starts_with("table") && text.ends_with(')') {
        if let Some(open) = text.find('(') {
            if text[..open].trim().eq_ignore_ascii_case("table") {
                let columns = parse_argument_list(&text[open + 1..text.len() - 1])?;
                if columns.is_empty() || columns.iter().any(|c| c.name.is_none()) {
                    return Err(ValidationError::InvalidArgumentType {
                        type_name: text.to_string(),
                    });
                }
                let rendered = columns
                    .iter()
                    .map(Argument::render_declaration)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Ok(format!("TABLE({rendered})"));
            }
        }
    }

    canonical_type(text)
}

/// All arguments in declaration order, as `[MODE ]name type[ DEFAULT expr]`.
pub fn argument_types(args: &[Argument]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The arguments that identify the overload.
///
/// `OUT` arguments never participate. Trailing defaulted arguments are then dropped one at a
/// time from the end until a non-defaulted argument is reached.
pub fn identity_argument_types(args: &[Argument]) -> String {
    let mut inputs: Vec<&Argument> = args.iter().filter(|a| a.is_input()).collect();
    while inputs.last().is_some_and(|a| a.default.is_some()) {
        inputs.pop();
    }
    inputs
        .iter()
        .map(|a| a.render_declaration())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Type list PostgreSQL uses to address one overload in `ALTER FUNCTION`/`DROP FUNCTION`:
/// every input argument, without names or defaults.
pub fn signature_types(args: &[Argument]) -> String {
    args.iter()
        .filter(|a| a.is_input())
        .map(|a| format!("{}{}", a.mode.prefix(), a.type_name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split `text` at every occurrence of `sep` that is outside parentheses, brackets and quotes.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for idx in top_level_offsets(text) {
        if text[idx..].starts_with(sep) {
            parts.push(text[start..idx].trim());
            start = idx + sep.len_utf8();
        }
    }
    parts.push(text[start..].trim());
    parts
}

/// Errors raised while normalizing a function declaration.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A required descriptor field is missing or blank.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// An argument declaration is blank.
    #[error("empty argument declaration")]
    EmptyArgument,

    /// An argument declaration could not be parsed.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: String,
        reason: &'static str,
    },

    /// A type name is malformed.
    #[error("invalid argument type `{type_name}`")]
    InvalidArgumentType { type_name: String },
}

fn invalid_argument(raw: &str, reason: &'static str) -> ValidationError {
    ValidationError::InvalidArgument {
        argument: raw.trim().to_string(),
        reason,
    }
}

fn known_type(text: &str) -> Option<String> {
    canonical_type(text)
        .ok()
        .filter(|_| !text.contains('.'))
}

fn resolve_base(base: &str) -> Option<String> {
    let lower = if base.starts_with('"') {
        base.to_string()
    } else {
        base.to_ascii_lowercase()
    };

    if let Ok(idx) = TYPE_ALIASES.binary_search_by(|(alias, _)| alias.cmp(&lower.as_str())) {
        return Some(TYPE_ALIASES[idx].1.to_string());
    }

    // `_int4` is the catalog's name for `int4[]`
    if let Some(element) = lower.strip_prefix('_') {
        if let Ok(idx) = TYPE_ALIASES.binary_search_by(|(alias, _)| alias.cmp(&element)) {
            return Some(format!("{}[]", TYPE_ALIASES[idx].1));
        }
    }

    let parts = split_qualified(base)?;
    match parts.as_slice() {
        [schema, name] if schema == "pg_catalog" => resolve_base(&quote_ident(name)),
        [schema, name] => Some(format!("{}.{}", quote_ident(schema), quote_ident(name))),
        [name] => Some(quote_ident(name)),
        _ => None,
    }
}

/// Split `schema.name` into its identifiers, honouring quoted identifiers.
fn split_qualified(text: &str) -> Option<Vec<String>> {
    let parts = split_top_level(text, '.');
    if parts.len() > 2 {
        return None;
    }
    parts.into_iter().map(parse_ident).collect()
}

fn strip_array_suffix(text: &str) -> Option<&str> {
    let text = text.trim_end();
    let body = text.strip_suffix(']')?;
    let open = body.rfind('[')?;
    body[open + 1..]
        .chars()
        .all(|c| c.is_ascii_digit())
        .then(|| body[..open].trim_end())
}

/// Remove `(...)` type modifiers, which must only hold numbers.
fn strip_modifiers(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        let close = rest[open..].find(')')? + open;
        let modifiers = &rest[open + 1..close];
        if !modifiers
            .chars()
            .all(|c| c.is_ascii_digit() || c == ',' || c.is_whitespace())
        {
            return None;
        }
        out.push_str(&rest[..open]);
        out.push(' ');
        rest = &rest[close + 1..];
    }
    if rest.contains(')') {
        return None;
    }
    out.push_str(rest);
    Some(out)
}

/// Split a declaration into its top-level `DEFAULT` (or `=`) clause.
fn split_default(text: &str) -> (&str, Option<&str>) {
    let offsets = top_level_offsets(text);
    for &idx in &offsets {
        let rest = &text[idx..];
        if rest.starts_with('=') {
            return (&text[..idx], Some(&rest[1..]));
        }
        let is_keyword = rest.len() >= 7
            && rest.is_char_boundary(7)
            && rest[..7].eq_ignore_ascii_case("default")
            && rest[7..].starts_with(char::is_whitespace)
            && text[..idx].ends_with(char::is_whitespace);
        if is_keyword {
            return (&text[..idx], Some(&rest[7..]));
        }
    }
    (text, None)
}

/// Split on top-level whitespace.
fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = None;
    let offsets = top_level_offsets(text);
    let mut top = offsets.iter().peekable();
    for (idx, c) in text.char_indices() {
        let is_top = top.peek().is_some_and(|&&o| o == idx);
        if is_top {
            top.next();
        }
        if is_top && c.is_whitespace() {
            if let Some(s) = start.take() {
                words.push(&text[s..idx]);
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        words.push(&text[s..]);
    }
    words
}

/// Byte offsets of the characters sitting outside parentheses, brackets and quotes.
fn top_level_offsets(text: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (idx, c) in text.char_indices() {
        match quote {
            // A doubled quote closes and immediately reopens, which nets out
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                _ if depth == 0 => offsets.push(idx),
                _ => {}
            },
        }
    }
    offsets
}
