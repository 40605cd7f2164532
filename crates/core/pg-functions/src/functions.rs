//! Function management module
//!
//! This module manages PostgreSQL function overloads as [`FunctionDescriptor`]s: it lists and
//! retrieves them from the system catalog, and creates, updates and removes them by rendering
//! and executing DDL. The catalog is the only source of truth; every descriptor returned here is
//! re-read after the statement that produced it.

use indexmap::IndexMap;

mod behavior;
pub mod catalog;
pub mod ddl;
mod function_id;
pub mod ident;
mod language;
mod parallel;
pub mod signature;
pub(crate) mod sql;

pub use self::{
    behavior::{Behavior, BehaviorFromStrError},
    function_id::{FunctionId, FunctionIdFromStrError, FunctionIdI64ConvError},
    language::{Language, LanguageError},
    parallel::{Parallel, ParallelFromStrError},
};
use self::{
    catalog::into_descriptor,
    ddl::{
        CreateFunction, FunctionTarget, render_create, render_drop, render_rename,
        render_set_schema,
    },
    ident::quote_ident,
    signature::{Argument, ValidationError, canonical_result, parse_argument},
};
use crate::{FunctionsDb, db::Executor, error::Error};

/// List functions matching the given options, ordered by id
#[tracing::instrument(skip(exe), err)]
pub async fn list<'c, E>(exe: E, options: &ListOptions) -> Result<Vec<FunctionDescriptor>, Error>
where
    E: Executor<'c>,
{
    let rows = sql::list(
        exe,
        options.include_system_schemas,
        options.schemas.as_deref(),
        options.limit,
        options.offset,
    )
    .await?;

    rows.into_iter()
        .map(|row| into_descriptor(row).map_err(Error::Mapping))
        .collect()
}

/// Retrieve one function by id or by signature
///
/// A lookup that matches no overload is an [`Error::NotFound`], never an empty descriptor.
#[tracing::instrument(skip(exe), err)]
pub async fn retrieve<'c, E>(exe: E, func_ref: &FunctionRef) -> Result<FunctionDescriptor, Error>
where
    E: Executor<'c>,
{
    match func_ref {
        FunctionRef::Id(id) => retrieve_by_id(exe, *id).await,
        FunctionRef::Signature { schema, name, args } => {
            let arguments = args
                .iter()
                .map(|arg| parse_argument(arg))
                .collect::<Result<Vec<_>, _>>()?;
            retrieve_by_signature(exe, schema, name, &arguments).await
        }
    }
}

/// Create a function and return its descriptor as stored by the database
///
/// The statement is executed and the new overload re-read in a single transaction.
#[tracing::instrument(skip(db), err)]
pub async fn create(db: &FunctionsDb, function: &NewFunction) -> Result<FunctionDescriptor, Error> {
    let (arguments, result) = function.normalize()?;
    let statement = render_create(&function.as_create(&arguments, &result))?;

    let mut tx = db.begin_txn().await?;
    sql::execute(&mut tx, &statement).await?;
    let descriptor =
        retrieve_by_signature(&mut tx, &function.schema, &function.name, &arguments).await?;
    tx.commit().await?;

    Ok(descriptor)
}

/// Apply a partial update to an existing function
///
/// This function performs in a single transaction:
///
///  1. Reads the current descriptor
///  2. Moves the function to the new schema, if the schema changes
///  3. Renames the function, if the name changes
///  4. Re-issues the create statement with the merged attributes
///  5. Re-reads the descriptor by id
///
/// All statements are rendered before any of them runs. If any step fails, the transaction is
/// rolled back. An empty update still re-issues the create statement.
#[tracing::instrument(skip(db), err)]
pub async fn update(
    db: &FunctionsDb,
    id: FunctionId,
    changes: &FunctionUpdate,
) -> Result<FunctionDescriptor, Error> {
    let mut tx = db.begin_txn().await?;

    let current = retrieve_by_id(&mut tx, id).await?;
    let mut merged = current.clone();
    changes.apply(&mut merged)?;

    let mut statements = Vec::with_capacity(3);
    if merged.schema != current.schema {
        statements.push(render_set_schema(&current.target(), &merged.schema)?);
    }
    if merged.name != current.name {
        // Addressed at the schema the function lives in after the move
        let relocated = FunctionTarget {
            schema: &merged.schema,
            name: &current.name,
            arguments: &current.arguments,
        };
        statements.push(render_rename(&relocated, &merged.name)?);
    }
    statements.push(render_create(&merged.as_create())?);

    for statement in &statements {
        sql::execute(&mut tx, statement).await?;
    }

    let updated = retrieve_by_id(&mut tx, id).await?;
    tx.commit().await?;

    Ok(updated)
}

/// Drop a function and return the descriptor it had just before removal
#[tracing::instrument(skip(db), err)]
pub async fn remove(db: &FunctionsDb, id: FunctionId) -> Result<FunctionDescriptor, Error> {
    let mut tx = db.begin_txn().await?;

    let current = retrieve_by_id(&mut tx, id).await?;
    let statement = render_drop(&current.target())?;
    sql::execute(&mut tx, &statement).await?;

    tx.commit().await?;

    Ok(current)
}

async fn retrieve_by_id<'c, E>(exe: E, id: FunctionId) -> Result<FunctionDescriptor, Error>
where
    E: Executor<'c>,
{
    let row = sql::get_by_id(exe, id)
        .await?
        .ok_or(NotFoundError::Id(id))?;
    into_descriptor(row).map_err(Error::Mapping)
}

/// Overloads are told apart by their input argument types only; names, modes and defaults of
/// `arguments` do not take part in the lookup. Type names are resolved by the server.
async fn retrieve_by_signature<'c, E>(
    exe: E,
    schema: &str,
    name: &str,
    arguments: &[Argument],
) -> Result<FunctionDescriptor, Error>
where
    E: Executor<'c>,
{
    let types = arguments
        .iter()
        .filter(|arg| arg.is_input())
        .map(|arg| arg.type_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let signature = format!("{}.{}({types})", quote_ident(schema), quote_ident(name));

    let row = sql::get_by_signature(exe, &signature)
        .await?
        .ok_or_else(|| NotFoundError::Signature {
            schema: schema.to_string(),
            name: name.to_string(),
            types,
        })?;
    into_descriptor(row).map_err(Error::Mapping)
}

/// One function overload as currently stored in the catalog
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionDescriptor {
    /// Catalog object id; stable across renames and relocations
    pub id: FunctionId,
    pub schema: String,
    pub name: String,
    /// Declared arguments, in order
    pub arguments: Vec<Argument>,
    /// Every argument as declared, e.g. `a integer, b integer DEFAULT 0`
    pub argument_types: String,
    /// The arguments identifying the overload, e.g. `a integer`
    pub identity_argument_types: String,
    /// Catalog name of the return type, e.g. `int4`
    pub return_type: String,
    /// Body of the `RETURNS` clause, e.g. `integer` or `SETOF text`
    pub result: String,
    pub language: Language,
    /// Function body, verbatim
    pub definition: String,
    pub behavior: Behavior,
    pub parallel: Parallel,
    pub strict: bool,
    pub security_definer: bool,
    pub leakproof: bool,
    /// Planner cost estimate, in units of `cpu_operator_cost`
    pub cost: f32,
    /// Planner row estimate; zero unless the function returns a set
    pub rows: f32,
    /// Configuration parameters set on entry, in declaration order
    pub config_params: Option<IndexMap<String, String>>,
    /// Statement that recreates the function exactly as it is
    pub complete_statement: String,
}

impl FunctionDescriptor {
    /// The create statement inputs for this descriptor
    pub fn as_create(&self) -> CreateFunction<'_> {
        CreateFunction {
            schema: &self.schema,
            name: &self.name,
            arguments: &self.arguments,
            result: &self.result,
            language: self.language.as_str(),
            behavior: self.behavior,
            parallel: self.parallel,
            strict: self.strict,
            security_definer: self.security_definer,
            leakproof: self.leakproof,
            cost: Some(self.cost),
            rows: Some(self.rows),
            config_params: self.config_params.as_ref(),
            definition: &self.definition,
        }
    }

    /// The `schema.name(types)` address of this overload
    pub fn target(&self) -> FunctionTarget<'_> {
        FunctionTarget {
            schema: &self.schema,
            name: &self.name,
            arguments: &self.arguments,
        }
    }
}

/// A request to create a function
///
/// Each entry of `args` is a declaration like `a int4`, `OUT total numeric` or
/// `b text DEFAULT 'x'`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NewFunction {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub definition: String,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default)]
    pub parallel: Parallel,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub security_definer: bool,
    #[serde(default)]
    pub leakproof: bool,
    /// Left to the database's default when unset
    #[serde(default)]
    pub cost: Option<f32>,
    /// Only valid for set-returning functions
    #[serde(default)]
    pub rows: Option<f32>,
    #[serde(default)]
    pub config_params: Option<IndexMap<String, String>>,
}

impl Default for NewFunction {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            name: String::new(),
            args: Vec::new(),
            definition: String::new(),
            return_type: default_return_type(),
            language: Language::default(),
            behavior: Behavior::default(),
            parallel: Parallel::default(),
            strict: false,
            security_definer: false,
            leakproof: false,
            cost: None,
            rows: None,
            config_params: None,
        }
    }
}

impl NewFunction {
    /// Parse the argument declarations and the return type into canonical form.
    pub fn normalize(&self) -> Result<(Vec<Argument>, String), ValidationError> {
        if self.schema.trim().is_empty() {
            return Err(ValidationError::MissingField("schema"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.return_type.trim().is_empty() {
            return Err(ValidationError::MissingField("return_type"));
        }

        let arguments = self
            .args
            .iter()
            .map(|arg| parse_argument(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let result = canonical_result(&self.return_type)?;

        Ok((arguments, result))
    }

    fn as_create<'a>(&'a self, arguments: &'a [Argument], result: &'a str) -> CreateFunction<'a> {
        CreateFunction {
            schema: &self.schema,
            name: &self.name,
            arguments,
            result,
            language: self.language.as_str(),
            behavior: self.behavior,
            parallel: self.parallel,
            strict: self.strict,
            security_definer: self.security_definer,
            leakproof: self.leakproof,
            cost: self.cost,
            rows: self.rows,
            config_params: self.config_params.as_ref().filter(|params| !params.is_empty()),
            definition: &self.definition,
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_return_type() -> String {
    "void".to_string()
}

/// A partial update of a function
///
/// Unset fields keep their current value. The argument list and return type are not part of
/// an update: changing them makes a different overload.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FunctionUpdate {
    pub schema: Option<String>,
    pub name: Option<String>,
    pub definition: Option<String>,
    pub behavior: Option<Behavior>,
    pub parallel: Option<Parallel>,
    pub strict: Option<bool>,
    pub security_definer: Option<bool>,
    pub leakproof: Option<bool>,
    pub cost: Option<f32>,
    pub rows: Option<f32>,
    /// Replaces the whole parameter set; an empty map clears it
    pub config_params: Option<IndexMap<String, String>>,
}

impl FunctionUpdate {
    /// Whether the update leaves every field untouched
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge the set fields into `descriptor`.
    ///
    /// Derived fields of `descriptor` are left stale; callers re-read the descriptor after
    /// executing the update.
    pub fn apply(&self, descriptor: &mut FunctionDescriptor) -> Result<(), ValidationError> {
        if let Some(schema) = &self.schema {
            if schema.trim().is_empty() {
                return Err(ValidationError::MissingField("schema"));
            }
            descriptor.schema.clone_from(schema);
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ValidationError::MissingField("name"));
            }
            descriptor.name.clone_from(name);
        }
        if let Some(definition) = &self.definition {
            descriptor.definition.clone_from(definition);
        }
        if let Some(behavior) = self.behavior {
            descriptor.behavior = behavior;
        }
        if let Some(parallel) = self.parallel {
            descriptor.parallel = parallel;
        }
        if let Some(strict) = self.strict {
            descriptor.strict = strict;
        }
        if let Some(security_definer) = self.security_definer {
            descriptor.security_definer = security_definer;
        }
        if let Some(leakproof) = self.leakproof {
            descriptor.leakproof = leakproof;
        }
        if let Some(cost) = self.cost {
            descriptor.cost = cost;
        }
        if let Some(rows) = self.rows {
            descriptor.rows = rows;
        }
        if let Some(params) = &self.config_params {
            descriptor.config_params = (!params.is_empty()).then(|| params.clone());
        }
        Ok(())
    }
}

/// How to find a single function
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FunctionRef {
    /// By catalog object id
    Id(FunctionId),
    /// By schema, name and argument declarations
    Signature {
        schema: String,
        name: String,
        args: Vec<String>,
    },
}

impl From<FunctionId> for FunctionRef {
    fn from(id: FunctionId) -> Self {
        Self::Id(id)
    }
}

/// Options for [`list`]
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ListOptions {
    /// Include `pg_catalog`, `information_schema` and the toast/temp schemas
    pub include_system_schemas: bool,
    /// Only list functions in these schemas
    pub schemas: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// No function matches the requested id or signature.
#[derive(Debug, thiserror::Error)]
pub enum NotFoundError {
    #[error("Cannot find a function with ID {0}")]
    Id(FunctionId),

    #[error("Cannot find a function {schema}.{name}({types})")]
    Signature {
        schema: String,
        name: String,
        types: String,
    },
}
