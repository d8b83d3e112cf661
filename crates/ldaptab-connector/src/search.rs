//! Lazy paged search over a [`DirectoryClient`].

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ConnectorError, ConnectorResult};
use crate::operation::{SearchPage, SearchRequest};
use crate::traits::DirectoryClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    /// More pages may be requested.
    Open,
    /// The last page was received.
    Exhausted,
    /// A page failed or the search was cancelled.
    Halted,
}

/// A single pass over a search result set.
///
/// Pages are requested one at a time, each carrying the previous page's
/// cookie. The sequence is finite and cannot be restarted; once it has ended
/// or failed every further call returns `Ok(None)`.
pub struct PagedSearch<'a, C: DirectoryClient + ?Sized> {
    client: &'a mut C,
    request: SearchRequest,
    cancel: CancellationToken,
    cookie: Vec<u8>,
    pages: usize,
    progress: Progress,
}

impl<'a, C: DirectoryClient + ?Sized> PagedSearch<'a, C> {
    /// Start a search. Nothing is sent until the first page is requested.
    pub fn new(client: &'a mut C, request: SearchRequest, cancel: CancellationToken) -> Self {
        Self {
            client,
            request,
            cancel,
            cookie: Vec::new(),
            pages: 0,
            progress: Progress::Open,
        }
    }

    /// Number of pages received so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Fetch the next page.
    ///
    /// Cancellation is checked before every request; a page already in
    /// flight is always completed.
    pub async fn next_page(&mut self) -> ConnectorResult<Option<SearchPage>> {
        if self.progress != Progress::Open {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            self.progress = Progress::Halted;
            debug!(pages = self.pages, "Search cancelled before next page");
            return Err(ConnectorError::Cancelled { pages: self.pages });
        }

        let cookie = std::mem::take(&mut self.cookie);
        let page = match self.client.search_page(&self.request, cookie).await {
            Ok(page) => page,
            Err(e) => {
                self.progress = Progress::Halted;
                return Err(e);
            }
        };

        self.pages += 1;
        debug!(
            page = self.pages,
            entries = page.entries.len(),
            more = page.has_more(),
            "Received search page"
        );

        if page.has_more() {
            self.cookie.clone_from(&page.cookie);
        } else {
            self.progress = Progress::Exhausted;
        }
        Ok(Some(page))
    }
}
