//! Directory client trait
//!
//! The seam between the pipeline and a concrete directory protocol client.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::operation::{SearchPage, SearchRequest};

/// A live directory session able to run paged searches.
///
/// The session is owned by the pipeline and driven sequentially: paging
/// cookies are threaded from one response into the next request, so pages
/// are never fetched in parallel.
#[async_trait]
pub trait DirectoryClient: Send {
    /// Fetch one page.
    ///
    /// `cookie` is empty for the first page and otherwise the cookie of the
    /// previous page. Any network or protocol failure is returned as
    /// [`ConnectorError::SearchFailed`](crate::error::ConnectorError::SearchFailed).
    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: Vec<u8>,
    ) -> ConnectorResult<SearchPage>;

    /// Short description used in logs.
    fn describe(&self) -> String {
        "directory".to_string()
    }
}
