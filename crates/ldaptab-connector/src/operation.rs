//! Search operation types
//!
//! Requests and page results exchanged with a [`DirectoryClient`](crate::traits::DirectoryClient).

use serde::{Deserialize, Serialize};

use crate::attributes::RawEntry;
use crate::config::{QuerySpec, ScanSettings, TableSpec};
use crate::types::SearchScope;

/// One paged search, as sent to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Root of the search.
    pub base_dn: String,
    /// Filter string, passed through unchanged.
    pub filter: String,
    /// Search breadth.
    pub scope: SearchScope,
    /// Attributes to return.
    pub attributes: Vec<String>,
    /// Entries per page.
    pub page_size: u32,
}

impl SearchRequest {
    /// Build the request for a table scan.
    pub fn for_table(query: &QuerySpec, table: &TableSpec, settings: &ScanSettings) -> Self {
        Self {
            base_dn: query.base_dn.clone(),
            filter: query.filter.clone(),
            scope: query.scope,
            attributes: query.requested_attributes(table),
            page_size: settings.page_size,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Entries in server order.
    pub entries: Vec<RawEntry>,
    /// Continuation cookie; empty when this is the last page.
    pub cookie: Vec<u8>,
}

impl SearchPage {
    /// Create a page.
    pub fn new(entries: Vec<RawEntry>, cookie: Vec<u8>) -> Self {
        Self { entries, cookie }
    }

    /// Create the final page of a search.
    pub fn last(entries: Vec<RawEntry>) -> Self {
        Self::new(entries, Vec::new())
    }

    /// Check whether more pages follow.
    pub fn has_more(&self) -> bool {
        !self.cookie.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSpec;

    #[test]
    fn test_request_for_table_derives_attributes() {
        let query = QuerySpec::new("ou=people,dc=example,dc=com").with_filter("(objectClass=person)");
        let table = TableSpec::new("users")
            .with_column(ColumnSpec::new("cn"))
            .with_column(ColumnSpec::new("name").with_attribute("givenName"))
            .with_column(ColumnSpec::new("CN"));

        let request = SearchRequest::for_table(&query, &table, &ScanSettings::default());
        assert_eq!(request.page_size, 100);
        assert_eq!(request.scope, SearchScope::WholeSubtree);
        assert_eq!(request.filter, "(objectClass=person)");
        assert_eq!(request.attributes, vec!["cn", "givenName"]);
    }

    #[test]
    fn test_explicit_attributes_win() {
        let query = QuerySpec::new("dc=example,dc=com").with_attributes(["uid", "mail"]);
        let table = TableSpec::new("users").with_column(ColumnSpec::new("cn"));
        let request = SearchRequest::for_table(&query, &table, &ScanSettings::default());
        assert_eq!(request.attributes, vec!["uid", "mail"]);
    }

    #[test]
    fn test_page_continuation() {
        assert!(SearchPage::new(vec![], vec![1, 2]).has_more());
        assert!(!SearchPage::last(vec![RawEntry::new("cn=a")]).has_more());
    }
}
