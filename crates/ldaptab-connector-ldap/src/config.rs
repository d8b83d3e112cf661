//! LDAP source configuration
//!
//! Connection settings for the directory server and the top-level source
//! configuration tying a connection to a table and its query.

use serde::{Deserialize, Serialize};
use tracing::warn;

use ldaptab_connector::config::{QuerySpec, ScanSettings, ScriptLimits, TableSpec};
use ldaptab_connector::error::{ConnectorError, ConnectorResult};

/// Connection timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Timeout for a single search page in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

/// TLS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Whether to use SSL/TLS.
    #[serde(default)]
    pub enabled: bool,

    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verify_certificate: true,
        }
    }
}

impl TlsConfig {
    /// Log a warning for insecure settings.
    pub fn warn_if_insecure(&self) {
        if self.enabled && !self.verify_certificate {
            warn!("TLS certificate verification is disabled for the directory connection");
        }
    }
}

/// Connection to an LDAP server.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server hostname or IP address.
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Bind DN for authentication (e.g., "cn=reader,dc=example,dc=com").
    /// An empty bind DN performs an anonymous bind.
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Connection timeouts.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// TLS configuration.
    #[serde(default)]
    pub tls: TlsConfig,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("connection", &self.connection)
            .field("tls", &self.tls)
            .finish()
    }
}

fn default_ldap_port() -> u16 {
    389
}

impl LdapConfig {
    /// Create a new LDAP config with required fields.
    pub fn new(host: impl Into<String>, bind_dn: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            bind_dn: bind_dn.into(),
            bind_password: None,
            connection: ConnectionSettings::default(),
            tls: TlsConfig::default(),
        }
    }

    /// Set bind password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self.tls.enabled = true;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self.tls.enabled = true;
        self
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Validate the connection settings.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration("host is required"));
        }

        if self.port == 0 {
            return Err(ConnectorError::invalid_configuration("port must not be 0"));
        }

        if self.use_ssl && self.use_starttls {
            return Err(ConnectorError::invalid_configuration(
                "cannot use both SSL and STARTTLS",
            ));
        }

        if !self.bind_dn.is_empty() && self.bind_password.is_none() {
            warn!(bind_dn = %self.bind_dn, "Bind DN configured without a password");
        }

        self.tls.warn_if_insecure();
        Ok(())
    }

    /// A copy with the password masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.bind_password.is_some() {
            config.bind_password = Some("***REDACTED***".to_string());
        }
        config
    }
}

/// One table sourced from an LDAP directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory connection.
    #[serde(flatten)]
    pub ldap: LdapConfig,

    /// Search feeding the table.
    pub query: QuerySpec,

    /// Table definition.
    pub table: TableSpec,

    /// Scan settings.
    #[serde(default)]
    pub scan: ScanSettings,

    /// Script sandbox limits.
    #[serde(default)]
    pub limits: ScriptLimits,
}

impl SourceConfig {
    /// Create a source configuration with default scan settings.
    pub fn new(ldap: LdapConfig, query: QuerySpec, table: TableSpec) -> Self {
        Self {
            ldap,
            query,
            table,
            scan: ScanSettings::default(),
            limits: ScriptLimits::default(),
        }
    }

    /// Parse a source configuration from JSON.
    pub fn from_json(json: &str) -> ConnectorResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            ConnectorError::invalid_configuration(format!("invalid source configuration: {e}"))
        })
    }

    /// Validate every section.
    pub fn validate(&self) -> ConnectorResult<()> {
        self.ldap.validate()?;
        self.query.validate()?;
        self.table.validate()?;
        self.scan.validate()
    }
}
