//! # LDAP Table Source
//!
//! LDAP directory client for the directory table connector.
//!
//! ## Features
//!
//! - LDAP v3 simple bind, LDAPS and STARTTLS
//! - Paged search (RFC 2696) with the cookie threaded page to page
//! - Text and binary attribute values (e.g. `objectSid`) kept as raw bytes
//!
//! ## Example
//!
//! ```ignore
//! use ldaptab_connector_ldap::{LdapSource, SourceConfig};
//! use ldaptab_connector::prelude::*;
//!
//! let config = SourceConfig::from_json(&std::fs::read_to_string("users.json")?)?;
//! let mut source = LdapSource::register(config)?;
//! source.connect().await?;
//!
//! let (tx, mut rx) = source.channel();
//! let consumer = tokio::spawn(async move {
//!     let mut entries = Vec::new();
//!     while let Some(entry) = rx.recv().await {
//!         entries.push(entry);
//!     }
//!     entries
//! });
//! let summary = source.scan(&tx, &CancellationToken::new()).await?;
//! drop(tx);
//!
//! for entry in consumer.await? {
//!     let row = source.table().resolve_row(&entry)?;
//! }
//! source.close().await?;
//! ```

pub mod config;
pub mod connector;
pub mod source;

// Re-exports
pub use config::{ConnectionSettings, LdapConfig, SourceConfig, TlsConfig};
pub use connector::LdapDirectory;
pub use source::LdapSource;
