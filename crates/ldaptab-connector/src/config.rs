//! Table, query and scan configuration
//!
//! User-authored specifications consumed once at configuration time and never
//! mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ConnectorError, ConnectorResult};
use crate::types::SearchScope;

/// Directory search to run for a table scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Root of the search (e.g., "ou=people,dc=example,dc=com").
    #[serde(alias = "baseDN", alias = "basedn")]
    pub base_dn: String,

    /// Directory filter-language string, passed to the server as-is.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Search breadth.
    #[serde(default)]
    pub scope: SearchScope,

    /// Attributes to request. When empty the list is derived from the
    /// table's columns.
    #[serde(default)]
    pub attributes: Vec<String>,

    /// Optional row-admission script evaluated against every entry.
    #[serde(
        default,
        alias = "acceptScript",
        skip_serializing_if = "Option::is_none"
    )]
    pub accept_script: Option<String>,
}

fn default_filter() -> String {
    "(objectClass=*)".to_string()
}

impl QuerySpec {
    /// Create a new subtree query with the default filter.
    pub fn new(base_dn: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            filter: default_filter(),
            scope: SearchScope::WholeSubtree,
            attributes: Vec::new(),
            accept_script: None,
        }
    }

    /// Set the search filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set the search scope.
    #[must_use]
    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the requested attributes.
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the acceptance script.
    pub fn with_accept_script(mut self, script: impl Into<String>) -> Self {
        self.accept_script = Some(script.into());
        self
    }

    /// Validate the query.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.base_dn.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration("base_dn is required"));
        }
        if self.filter.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "filter must not be empty",
            ));
        }
        Ok(())
    }

    /// Attribute names to request from the directory.
    ///
    /// Uses the explicit list when one is configured, otherwise collects the
    /// source attribute of every column of the table and its relations,
    /// deduplicated case-insensitively in declaration order.
    ///
    /// Scripts may read any attribute through `entry`, so when the table has
    /// an explicit mapping or an accept script anywhere the derived list is
    /// empty, which asks the directory for every user attribute.
    pub fn requested_attributes(&self, table: &TableSpec) -> Vec<String> {
        if !self.attributes.is_empty() {
            return self.attributes.clone();
        }
        if has_script(self.accept_script.as_deref()) || table.uses_scripts() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut attributes = Vec::new();
        table.collect_source_attributes(&mut seen, &mut attributes);
        attributes
    }
}

/// A single column of a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,

    /// Human readable description; synthesized from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared type (e.g., "string", "[]string", "int", "bool", "json", "sid").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,

    /// Directory attribute feeding the column; defaults to the column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Mapping script deriving the value from the entry.
    #[serde(
        default,
        alias = "transform",
        skip_serializing_if = "Option::is_none"
    )]
    pub mapping: Option<String>,

    /// Primary key flag (host schema metadata).
    #[serde(default, alias = "pk")]
    pub key: bool,

    /// Unique flag (host schema metadata).
    #[serde(default)]
    pub unique: bool,

    /// Not-null flag (host schema metadata).
    #[serde(default, alias = "notnull")]
    pub not_null: bool,
}

impl ColumnSpec {
    /// Create a new string column reading the attribute of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            column_type: None,
            attribute: None,
            mapping: None,
            key: false,
            unique: false,
            not_null: false,
        }
    }

    /// Set the declared type.
    pub fn with_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    /// Set the source attribute.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Set the mapping script.
    pub fn with_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.mapping = Some(mapping.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark as primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Mark as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as not null.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Directory attribute feeding this column.
    pub fn source_attribute(&self) -> &str {
        self.attribute.as_deref().unwrap_or(&self.name)
    }

    /// Description, or `"column <name>"` when none was configured.
    pub fn effective_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("column {}", self.name))
    }
}

/// A child table fed from the rows of its parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSpec {
    /// The relation's own table definition.
    #[serde(flatten)]
    pub table: TableSpec,

    /// Optional admission script evaluated against each parent row.
    #[serde(
        default,
        alias = "acceptScript",
        alias = "filter",
        skip_serializing_if = "Option::is_none"
    )]
    pub accept_script: Option<String>,
}

/// A table produced from directory entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,

    /// Human readable description; synthesized from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered column definitions.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,

    /// Child tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationSpec>,
}

impl TableSpec {
    /// Create a new table without columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Append a column.
    #[must_use]
    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a relation.
    #[must_use]
    pub fn with_relation(mut self, table: TableSpec, accept_script: Option<String>) -> Self {
        self.relations.push(RelationSpec {
            table,
            accept_script,
        });
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description, or `"table <name>"` when none was configured.
    pub fn effective_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("table {}", self.name))
    }

    /// Validate the table and its relations.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "table name is required",
            ));
        }
        if self.columns.is_empty() {
            return Err(ConnectorError::invalid_configuration(format!(
                "table '{}' has no columns",
                self.name
            )));
        }

        let mut names = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(ConnectorError::invalid_configuration(format!(
                    "table '{}' has a column without a name",
                    self.name
                )));
            }
            if !names.insert(column.name.to_lowercase()) {
                return Err(ConnectorError::invalid_configuration(format!(
                    "table '{}' declares column '{}' more than once",
                    self.name, column.name
                )));
            }
        }

        for relation in &self.relations {
            relation.table.validate()?;
        }

        Ok(())
    }

    /// Check whether any column or relation of this table runs a script of
    /// its own.
    fn uses_scripts(&self) -> bool {
        self.columns.iter().any(|c| has_script(c.mapping.as_deref()))
            || self.relations.iter().any(|r| {
                has_script(r.accept_script.as_deref()) || r.table.uses_scripts()
            })
    }

    fn collect_source_attributes(&self, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        for column in &self.columns {
            let attribute = column.source_attribute();
            if seen.insert(attribute.to_lowercase()) {
                out.push(attribute.to_string());
            }
        }
        for relation in &self.relations {
            relation.table.collect_source_attributes(seen, out);
        }
    }
}

fn has_script(source: Option<&str>) -> bool {
    source.is_some_and(|s| !s.trim().is_empty())
}

/// Settings for a single table scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Entries requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Capacity of the row channel between the scan and the host.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Fixed page size of the paged search.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ScanSettings {
    /// Validate the settings.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.page_size == 0 {
            return Err(ConnectorError::invalid_configuration(
                "page_size must be greater than zero",
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConnectorError::invalid_configuration(
                "channel_capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Sandbox limits for mapping and accept scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptLimits {
    /// Maximum number of operations before termination.
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
    /// Maximum call stack depth.
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,
    /// Maximum string size in bytes.
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,
    /// Maximum array size.
    #[serde(default = "default_max_collection_size")]
    pub max_array_size: usize,
    /// Maximum map size.
    #[serde(default = "default_max_collection_size")]
    pub max_map_size: usize,
}

fn default_max_operations() -> u64 {
    100_000
}

fn default_max_call_levels() -> usize {
    64
}

fn default_max_string_size() -> usize {
    1 << 20
}

fn default_max_collection_size() -> usize {
    10_000
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_collection_size(),
            max_map_size: default_max_collection_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_table() -> TableSpec {
        TableSpec::new("users")
            .with_column(ColumnSpec::new("dn").primary_key())
            .with_column(ColumnSpec::new("name").with_attribute("givenName"))
            .with_column(ColumnSpec::new("groups").with_attribute("memberOf"))
    }

    #[test]
    fn test_query_spec_defaults() {
        let query: QuerySpec =
            serde_json::from_str(r#"{"base_dn": "dc=example,dc=com"}"#).unwrap();
        assert_eq!(query.filter, "(objectClass=*)");
        assert_eq!(query.scope, SearchScope::WholeSubtree);
        assert!(query.attributes.is_empty());
        assert!(query.accept_script.is_none());
    }

    #[test]
    fn test_query_spec_aliases() {
        let query: QuerySpec = serde_json::from_str(
            r#"{"baseDN": "dc=example,dc=com", "scope": "base", "acceptScript": "true"}"#,
        )
        .unwrap();
        assert_eq!(query.base_dn, "dc=example,dc=com");
        assert_eq!(query.scope, SearchScope::Base);
        assert_eq!(query.accept_script.as_deref(), Some("true"));
    }

    #[test]
    fn test_query_spec_validation() {
        assert!(QuerySpec::new("dc=example,dc=com").validate().is_ok());
        assert!(QuerySpec::new("  ").validate().is_err());
        assert!(QuerySpec::new("dc=example,dc=com")
            .with_filter("")
            .validate()
            .is_err());
    }

    #[test]
    fn test_requested_attributes_explicit() {
        let query = QuerySpec::new("dc=example,dc=com").with_attributes(["cn", "sn"]);
        assert_eq!(query.requested_attributes(&users_table()), vec!["cn", "sn"]);
    }

    #[test]
    fn test_requested_attributes_derived() {
        let table = users_table().with_relation(
            TableSpec::new("user_groups")
                .with_column(ColumnSpec::new("member").with_attribute("MEMBEROF"))
                .with_column(ColumnSpec::new("mail")),
            None,
        );
        let query = QuerySpec::new("dc=example,dc=com");
        assert_eq!(
            query.requested_attributes(&table),
            vec!["dn", "givenName", "memberOf", "mail"]
        );
    }

    #[test]
    fn test_requested_attributes_all_when_scripts_read_entry() {
        let query = QuerySpec::new("dc=example,dc=com");

        let mapped = users_table().with_column(
            ColumnSpec::new("full_name")
                .with_mapping("`${bytesToString(entry.givenName)} ${bytesToString(entry.sn)}`"),
        );
        assert!(query.requested_attributes(&mapped).is_empty());

        let filtered = query.clone().with_accept_script(r#"entry.has("mail")"#);
        assert!(filtered.requested_attributes(&users_table()).is_empty());

        let relation = users_table().with_relation(
            TableSpec::new("admins").with_column(ColumnSpec::new("dn")),
            Some(r#"entry.has("adminCount")"#.to_string()),
        );
        assert!(query.requested_attributes(&relation).is_empty());

        // An explicit list is still honored.
        let explicit = query.with_attributes(["givenName", "sn"]);
        assert_eq!(explicit.requested_attributes(&mapped), vec!["givenName", "sn"]);
    }

    #[test]
    fn test_column_spec_deserialization() {
        let column: ColumnSpec = serde_json::from_str(
            r#"{"name": "sid", "type": "sid", "attribute": "objectSid", "pk": true, "notnull": true}"#,
        )
        .unwrap();
        assert_eq!(column.column_type.as_deref(), Some("sid"));
        assert_eq!(column.source_attribute(), "objectSid");
        assert!(column.key);
        assert!(column.not_null);
        assert!(!column.unique);
        assert_eq!(column.effective_description(), "column sid");
    }

    #[test]
    fn test_column_mapping_alias() {
        let column: ColumnSpec =
            serde_json::from_str(r#"{"name": "upper", "transform": "uppercase(\"x\")"}"#).unwrap();
        assert_eq!(column.mapping.as_deref(), Some("uppercase(\"x\")"));
    }

    #[test]
    fn test_table_validation() {
        assert!(users_table().validate().is_ok());
        assert!(TableSpec::new("empty").validate().is_err());
        assert!(TableSpec::new("")
            .with_column(ColumnSpec::new("a"))
            .validate()
            .is_err());

        let duplicate = TableSpec::new("dup")
            .with_column(ColumnSpec::new("Name"))
            .with_column(ColumnSpec::new("name"));
        assert!(duplicate.validate().is_err());

        let bad_relation = users_table().with_relation(TableSpec::new("child"), None);
        assert!(bad_relation.validate().is_err());
    }

    #[test]
    fn test_table_relation_deserialization() {
        let table: TableSpec = serde_json::from_str(
            r#"{
                "name": "users",
                "columns": [{"name": "cn"}],
                "relations": [
                    {"name": "admins", "filter": "entry.has(\"adminCount\")", "columns": [{"name": "cn"}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(table.relations.len(), 1);
        assert_eq!(table.relations[0].table.name, "admins");
        assert!(table.relations[0].accept_script.is_some());
        assert_eq!(table.effective_description(), "table users");
    }

    #[test]
    fn test_scan_settings() {
        let settings = ScanSettings::default();
        assert_eq!(settings.page_size, 100);
        assert!(settings.validate().is_ok());

        let zero = ScanSettings {
            page_size: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }
}
