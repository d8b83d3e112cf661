//! Runtime table schema
//!
//! Turns a [`TableSpec`] into column descriptors bound to compiled mappings,
//! plus the table's compiled accept predicate. Building happens once per
//! table registration, before any search is issued, and fails as a whole:
//! a table with one broken mapping registers no columns at all.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attributes::AttributeMap;
use crate::config::{ColumnSpec, ScriptLimits, TableSpec};
use crate::error::{ConnectorError, ConnectorResult};
use crate::filter::{accept, AcceptPredicate};
use crate::mapping::{coerce, default_mapping, CompiledMapping};
use crate::script::ScriptEngine;
use crate::types::{TypedValue, ValueType};

/// Resolver bound to one column of one table.
pub type ColumnResolver = Arc<dyn Fn(&AttributeMap) -> ConnectorResult<TypedValue> + Send + Sync>;

/// A column ready to produce values from entries.
#[derive(Clone)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Column description.
    pub description: String,
    /// Canonical column type.
    pub value_type: ValueType,
    /// Primary key flag (host schema metadata).
    pub key: bool,
    /// Unique flag (host schema metadata).
    pub unique: bool,
    /// Not-null flag (host schema metadata).
    pub not_null: bool,
    resolver: ColumnResolver,
}

impl ColumnDescriptor {
    /// Produce this column's value for an entry.
    ///
    /// The entry is only read; the same map can be resolved concurrently for
    /// every column.
    pub fn resolve(&self, entry: &AttributeMap) -> ConnectorResult<TypedValue> {
        (self.resolver)(entry)
    }
}

impl std::fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("key", &self.key)
            .field("unique", &self.unique)
            .field("not_null", &self.not_null)
            .finish_non_exhaustive()
    }
}

/// A fully resolved row, columns in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub columns: Vec<(String, TypedValue)>,
}

impl Row {
    /// Value of a column, looked up case-insensitively.
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.columns
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A registered table.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Table description.
    pub description: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
    /// Compiled accept predicate, if one was configured.
    pub predicate: Option<AcceptPredicate>,
    /// Child tables.
    pub relations: Vec<TableDescriptor>,
}

impl TableDescriptor {
    /// Get a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Get a relation by name (case-insensitive).
    pub fn relation(&self, name: &str) -> Option<&TableDescriptor> {
        self.relations
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Check whether an entry passes this table's predicate.
    pub fn accepts(&self, entry: &AttributeMap) -> bool {
        accept(self.predicate.as_ref(), entry)
    }

    /// Resolve every column of a row.
    ///
    /// The first failing column aborts the whole row.
    pub fn resolve_row(&self, entry: &AttributeMap) -> ConnectorResult<Row> {
        let columns = self
            .columns
            .iter()
            .map(|column| Ok((column.name.clone(), column.resolve(entry)?)))
            .collect::<ConnectorResult<Vec<_>>>()?;
        Ok(Row { columns })
    }
}

/// Builds table descriptors from table specifications.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    limits: ScriptLimits,
}

impl SchemaBuilder {
    /// Create a builder with default script limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom script limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ScriptLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build a table and its relations.
    ///
    /// `accept_script` is the table's row-admission script (usually the
    /// query's). Any invalid column, mapping or script fails the whole build.
    pub fn build(
        &self,
        table: &TableSpec,
        accept_script: Option<&str>,
    ) -> ConnectorResult<TableDescriptor> {
        table.validate()?;

        let engine = ScriptEngine::new(&self.limits);
        let descriptor = build_table(&engine, table, accept_script)?;

        info!(
            table = %descriptor.name,
            columns = descriptor.columns.len(),
            relations = descriptor.relations.len(),
            has_predicate = descriptor.predicate.is_some(),
            "Registered table"
        );
        Ok(descriptor)
    }
}

fn build_table(
    engine: &ScriptEngine,
    table: &TableSpec,
    accept_script: Option<&str>,
) -> ConnectorResult<TableDescriptor> {
    let columns = table
        .columns
        .iter()
        .map(|column| build_column(engine, &table.name, column))
        .collect::<ConnectorResult<Vec<_>>>()?;

    let predicate = accept_script
        .filter(|source| !source.trim().is_empty())
        .map(|source| {
            AcceptPredicate::compile(engine, source).map_err(|message| {
                ConnectorError::ScriptCompile {
                    table: table.name.clone(),
                    message,
                }
            })
        })
        .transpose()?;

    let relations = table
        .relations
        .iter()
        .map(|relation| build_table(engine, &relation.table, relation.accept_script.as_deref()))
        .collect::<ConnectorResult<Vec<_>>>()?;

    Ok(TableDescriptor {
        name: table.name.clone(),
        description: table.effective_description(),
        columns,
        predicate,
        relations,
    })
}

fn build_column(
    engine: &ScriptEngine,
    table: &str,
    column: &ColumnSpec,
) -> ConnectorResult<ColumnDescriptor> {
    let declared = column.column_type.as_deref();
    let value_type = match declared {
        None => ValueType::String,
        Some(declared) => ValueType::from_declared(declared).unwrap_or_else(|| {
            warn!(
                table = %table,
                column = %column.name,
                declared_type = %declared,
                "Unknown column type, using string"
            );
            ValueType::String
        }),
    };

    let explicit = column.mapping.as_deref().filter(|m| !m.trim().is_empty());
    let source = explicit.unwrap_or_else(|| default_mapping(declared, value_type));
    let direct = explicit.is_none();

    let mapping = CompiledMapping::compile(engine, source).map_err(|message| {
        ConnectorError::MappingParse {
            table: table.to_string(),
            column: column.name.clone(),
            message,
        }
    })?;

    debug!(
        table = %table,
        column = %column.name,
        value_type = %value_type,
        mapping = %mapping.source(),
        "Compiled column mapping"
    );

    let table_name = table.to_string();
    let column_name = column.name.clone();
    let source_attribute = column.source_attribute().to_string();
    let resolver: ColumnResolver = Arc::new(move |entry: &AttributeMap| {
        // A directly mapped column is null when its attribute is absent.
        if direct && !entry.contains(&source_attribute) {
            return Ok(TypedValue::Null);
        }
        let value = mapping
            .evaluate(entry, &column_name, &source_attribute)
            .map_err(|message| ConnectorError::ColumnMapping {
                table: table_name.clone(),
                column: column_name.clone(),
                message,
            })?;
        Ok(coerce(value, value_type))
    });

    Ok(ColumnDescriptor {
        name: column.name.clone(),
        description: column.effective_description(),
        value_type,
        key: column.key,
        unique: column.unique,
        not_null: column.not_null,
        resolver,
    })
}
