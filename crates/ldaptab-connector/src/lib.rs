//! # Directory Table Connector
//!
//! Declarative extraction of directory entries into typed table rows.
//!
//! A table is described by a [`TableSpec`](config::TableSpec) (columns, types,
//! mapping scripts) and fed by a [`QuerySpec`](config::QuerySpec) (base DN,
//! filter, scope, attributes, optional accept script). At registration time
//! the [`SchemaBuilder`](schema::SchemaBuilder) compiles every mapping and the
//! accept script; a single broken script rejects the whole table. At scan
//! time the [`Pipeline`](pipeline::Pipeline) pages through the directory,
//! normalizes each entry into a case-insensitive
//! [`AttributeMap`](attributes::AttributeMap), filters it and hands accepted
//! maps to the host. The host then resolves column values on demand through
//! the table's column descriptors.
//!
//! ## Example
//!
//! ```ignore
//! use ldaptab_connector::prelude::*;
//!
//! let spec = TableSpec::new("users")
//!     .with_column(ColumnSpec::new("dn").primary_key())
//!     .with_column(ColumnSpec::new("name").with_mapping(
//!         "`${bytesToString(entry.givenName)} ${bytesToString(entry.sn)}`",
//!     ))
//!     .with_column(ColumnSpec::new("sid").with_type("sid").with_attribute("objectSid"));
//! let query = QuerySpec::new("ou=people,dc=example,dc=com")
//!     .with_filter("(objectClass=person)");
//!
//! let table = SchemaBuilder::new().build(&spec, query.accept_script.as_deref())?;
//!
//! let mut pipeline = Pipeline::new(client, ScanSettings::default());
//! let request = pipeline.request_for(&query, &spec);
//! let (tx, mut rx) = tokio::sync::mpsc::channel(256);
//! let summary = pipeline.scan(&request, &table, &tx, &CancellationToken::new()).await?;
//!
//! while let Ok(entry) = rx.try_recv() {
//!     let row = table.resolve_row(&entry)?;
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`config`] - Table, query, scan and script-limit configuration
//! - [`error`] - Error type with configuration/row-scoped classification
//! - [`types`] - Column types, typed values and search scope
//! - [`attributes`] - Raw entries and the normalized attribute map
//! - [`sid`] - Binary SID decoding
//! - [`script`] / [`helpers`] - Script sandbox and helper functions
//! - [`mapping`] / [`filter`] - Column mappings and accept predicates
//! - [`schema`] - Table and column descriptors
//! - [`operation`] / [`traits`] / [`search`] - Directory client seam and paged search
//! - [`pipeline`] - Scan orchestration

pub mod attributes;
pub mod config;
pub mod error;
pub mod filter;
pub mod helpers;
pub mod mapping;
pub mod operation;
pub mod pipeline;
pub mod schema;
pub mod script;
pub mod search;
pub mod sid;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::attributes::{normalize, AttributeMap, AttributeValue, RawEntry};
    pub use crate::config::{ColumnSpec, QuerySpec, RelationSpec, ScanSettings, ScriptLimits, TableSpec};
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::filter::{accept, verdict, AcceptPredicate, Verdict};
    pub use crate::mapping::{coerce, CompiledMapping};
    pub use crate::operation::{SearchPage, SearchRequest};
    pub use crate::pipeline::{relation_row, Pipeline, ScanState, ScanSummary};
    pub use crate::schema::{ColumnDescriptor, Row, SchemaBuilder, TableDescriptor};
    pub use crate::sid::{decode_sid, Sid};
    pub use crate::traits::DirectoryClient;
    pub use crate::types::{SearchScope, TypedValue, ValueType};

    pub use tokio_util::sync::CancellationToken;
}

// Re-export async_trait for directory client implementors
pub use async_trait::async_trait;
