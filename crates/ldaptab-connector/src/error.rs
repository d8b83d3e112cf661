//! Connector error types
//!
//! Error definitions for table registration, directory scans and row resolution.

use thiserror::Error;

/// Error that can occur while registering tables, scanning the directory or
/// resolving rows.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (raised while setting up the session)
    /// Failed to establish a connection to the directory server.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The bind was rejected by the directory server.
    #[error("bind failed for {bind_dn}: invalid credentials")]
    AuthenticationFailed { bind_dn: String },

    // Configuration errors (raised before any data is requested)
    /// Configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A column mapping could not be compiled.
    #[error("failed to parse mapping for column '{column}' of table '{table}': {message}")]
    MappingParse {
        table: String,
        column: String,
        message: String,
    },

    /// An acceptance script could not be compiled.
    #[error("failed to compile accept script for table '{table}': {message}")]
    ScriptCompile { table: String, message: String },

    // Scan errors
    /// The directory search failed.
    #[error("search failed: {message}")]
    SearchFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The acceptance predicate failed for a single entry.
    #[error("accept predicate failed for '{dn}': {message}")]
    FilterPredicate { dn: String, message: String },

    /// The scan was cancelled before the search was exhausted.
    #[error("scan cancelled after {pages} page(s)")]
    Cancelled { pages: usize },

    /// The host dropped the row channel while the scan was still producing.
    #[error("row delivery failed: {message}")]
    DeliveryFailed { message: String },

    // Row errors
    /// A column mapping failed at evaluation time.
    #[error("mapping for column '{column}' of table '{table}' failed: {message}")]
    ColumnMapping {
        table: String,
        column: String,
        message: String,
    },

    /// A binary SID buffer is shorter than its own header implies.
    #[error("invalid SID: {message}")]
    InvalidSid { message: String },
}

impl ConnectorError {
    /// Check if this error is raised at configuration time.
    ///
    /// Configuration errors prevent the affected table from ever producing
    /// rows and are reported before any search is issued.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ConnectorError::InvalidConfiguration { .. }
                | ConnectorError::MappingParse { .. }
                | ConnectorError::ScriptCompile { .. }
        )
    }

    /// Check if this error only affects a single entry or row, leaving the
    /// rest of the scan intact.
    pub fn is_row_scoped(&self) -> bool {
        matches!(
            self,
            ConnectorError::FilterPredicate { .. }
                | ConnectorError::ColumnMapping { .. }
                | ConnectorError::InvalidSid { .. }
        )
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::AuthenticationFailed { .. } => "BIND_FAILED",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::MappingParse { .. } => "MAPPING_PARSE",
            ConnectorError::ScriptCompile { .. } => "SCRIPT_COMPILE",
            ConnectorError::SearchFailed { .. } => "SEARCH_FAILED",
            ConnectorError::FilterPredicate { .. } => "FILTER_PREDICATE",
            ConnectorError::Cancelled { .. } => "CANCELLED",
            ConnectorError::DeliveryFailed { .. } => "DELIVERY_FAILED",
            ConnectorError::ColumnMapping { .. } => "COLUMN_MAPPING",
            ConnectorError::InvalidSid { .. } => "INVALID_SID",
        }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with a source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error.
    pub fn search_failed(message: impl Into<String>) -> Self {
        ConnectorError::SearchFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a search failed error with a source.
    pub fn search_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::SearchFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors() {
        let parse = ConnectorError::MappingParse {
            table: "users".to_string(),
            column: "name".to_string(),
            message: "unexpected token".to_string(),
        };
        assert!(parse.is_configuration_error());
        assert!(!parse.is_row_scoped());

        let compile = ConnectorError::ScriptCompile {
            table: "users".to_string(),
            message: "bad".to_string(),
        };
        assert!(compile.is_configuration_error());

        assert!(!ConnectorError::search_failed("boom").is_configuration_error());
    }

    #[test]
    fn test_row_scoped_errors() {
        let predicate = ConnectorError::FilterPredicate {
            dn: "cn=a,dc=example,dc=com".to_string(),
            message: "not a bool".to_string(),
        };
        assert!(predicate.is_row_scoped());

        let mapping = ConnectorError::ColumnMapping {
            table: "users".to_string(),
            column: "sid".to_string(),
            message: "bad sid".to_string(),
        };
        assert!(mapping.is_row_scoped());

        assert!(!ConnectorError::Cancelled { pages: 2 }.is_row_scoped());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ConnectorError::connection_failed("test").error_code(),
            "CONNECTION_FAILED"
        );
        assert_eq!(
            ConnectorError::AuthenticationFailed {
                bind_dn: "cn=admin".to_string()
            }
            .error_code(),
            "BIND_FAILED"
        );
        assert_eq!(
            ConnectorError::search_failed("test").error_code(),
            "SEARCH_FAILED"
        );
        assert_eq!(
            ConnectorError::Cancelled { pages: 0 }.error_code(),
            "CANCELLED"
        );
    }

    #[test]
    fn test_error_display() {
        let err = ConnectorError::MappingParse {
            table: "users".to_string(),
            column: "fullName".to_string(),
            message: "unexpected end of input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse mapping for column 'fullName' of table 'users': unexpected end of input"
        );

        let err = ConnectorError::Cancelled { pages: 3 };
        assert_eq!(err.to_string(), "scan cancelled after 3 page(s)");
    }

    #[test]
    fn test_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ConnectorError::search_failed_with_source("page request failed", io_err);

        if let ConnectorError::SearchFailed { source, .. } = err {
            assert!(source.is_some());
        } else {
            panic!("Expected SearchFailed variant");
        }
    }
}
