//! Scan pipeline
//!
//! Drives one table scan: paged search, normalization, acceptance filtering
//! and delivery of accepted entries to the host's row channel.
//!
//! ```text
//! Idle -> Searching -> (PageReceived -> Normalizing -> Filtering -> Delivering)* -> Done
//!              \                                                            /
//!               `------------------------> Error <---------------------------'
//! ```
//!
//! Column values are not computed here. The host resolves them later through
//! the table's column descriptors, using the delivered attribute maps.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use crate::attributes::{normalize, AttributeMap};
use crate::config::{QuerySpec, ScanSettings, TableSpec};
use crate::error::{ConnectorError, ConnectorResult};
use crate::filter::{verdict, Verdict};
use crate::operation::SearchRequest;
use crate::schema::TableDescriptor;
use crate::search::PagedSearch;
use crate::traits::DirectoryClient;

/// Stage of a table scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Searching,
    PageReceived,
    Normalizing,
    Filtering,
    Delivering,
    Done,
    Error,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::Searching => "searching",
            ScanState::PageReceived => "page_received",
            ScanState::Normalizing => "normalizing",
            ScanState::Filtering => "filtering",
            ScanState::Delivering => "delivering",
            ScanState::Done => "done",
            ScanState::Error => "error",
        };
        f.write_str(name)
    }
}

fn advance(state: &mut ScanState, next: ScanState) {
    trace!(from = %state, to = %next, "Scan state");
    *state = next;
}

/// Counters for a completed scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Pages received.
    pub pages: usize,
    /// Entries received.
    pub entries: usize,
    /// Entries delivered to the host.
    pub accepted: usize,
    /// Entries the predicate returned false for.
    pub rejected: usize,
    /// Entries dropped because the predicate failed.
    pub predicate_failures: usize,
}

/// Table scan driver.
///
/// Owns the directory session it was built with; one pipeline runs one scan
/// at a time.
pub struct Pipeline<C: DirectoryClient> {
    client: C,
    settings: ScanSettings,
    state: ScanState,
}

impl<C: DirectoryClient> Pipeline<C> {
    /// Create a pipeline over an established directory session.
    pub fn new(client: C, settings: ScanSettings) -> Self {
        Self {
            client,
            settings,
            state: ScanState::Idle,
        }
    }

    /// Stage of the current scan, or how the last one ended.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Scan settings.
    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// The directory session.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Give the directory session back.
    pub fn into_client(self) -> C {
        self.client
    }

    /// Build the search request for a table.
    pub fn request_for(&self, query: &QuerySpec, table: &TableSpec) -> SearchRequest {
        SearchRequest::for_table(query, table, &self.settings)
    }

    /// Run one scan and deliver every accepted entry to `sink`.
    ///
    /// Returns when the search is exhausted. A search failure ends the scan
    /// with the rows delivered so far; predicate failures only drop the
    /// offending entry. Cancellation is honored before each page and while
    /// waiting on a full channel.
    #[instrument(skip_all, fields(table = %table.name, base_dn = %request.base_dn))]
    pub async fn scan(
        &mut self,
        request: &SearchRequest,
        table: &TableDescriptor,
        sink: &mpsc::Sender<AttributeMap>,
        cancel: &CancellationToken,
    ) -> ConnectorResult<ScanSummary> {
        let state = &mut self.state;
        *state = ScanState::Idle;
        let mut summary = ScanSummary::default();

        let mut search = PagedSearch::new(&mut self.client, request.clone(), cancel.clone());
        advance(state, ScanState::Searching);

        let outcome = loop {
            let page = match search.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            advance(state, ScanState::PageReceived);
            summary.pages += 1;
            summary.entries += page.entries.len();

            for raw in page.entries {
                advance(state, ScanState::Normalizing);
                let entry = normalize(raw);

                advance(state, ScanState::Filtering);
                match verdict(table.predicate.as_ref(), &entry) {
                    Verdict::Accepted => {}
                    Verdict::Rejected => {
                        summary.rejected += 1;
                        continue;
                    }
                    Verdict::Failed => {
                        summary.predicate_failures += 1;
                        continue;
                    }
                }

                advance(state, ScanState::Delivering);
                if let Err(e) = deliver(sink, entry, cancel, summary.pages).await {
                    advance(state, ScanState::Error);
                    error!(error = %e, accepted = summary.accepted, "Row delivery stopped");
                    return Err(e);
                }
                summary.accepted += 1;
            }
            advance(state, ScanState::Searching);
        };

        match outcome {
            Ok(()) => {
                advance(state, ScanState::Done);
                info!(
                    pages = summary.pages,
                    entries = summary.entries,
                    accepted = summary.accepted,
                    rejected = summary.rejected,
                    predicate_failures = summary.predicate_failures,
                    "Scan completed"
                );
                Ok(summary)
            }
            Err(e) => {
                advance(state, ScanState::Error);
                error!(
                    error = %e,
                    pages = summary.pages,
                    accepted = summary.accepted,
                    "Scan halted"
                );
                Err(e)
            }
        }
    }
}

async fn deliver(
    sink: &mpsc::Sender<AttributeMap>,
    entry: AttributeMap,
    cancel: &CancellationToken,
    pages: usize,
) -> ConnectorResult<()> {
    tokio::select! {
        biased;
        sent = sink.send(entry) => sent.map_err(|_| ConnectorError::DeliveryFailed {
            message: "row channel closed by receiver".to_string(),
        }),
        () = cancel.cancelled() => Err(ConnectorError::Cancelled { pages }),
    }
}

/// Row for a relation of a parent entry.
///
/// The parent's attribute map passes through when the relation's predicate
/// accepts it (or the relation has none).
pub fn relation_row(relation: &TableDescriptor, parent: &AttributeMap) -> Option<AttributeMap> {
    if relation.accepts(parent) {
        debug!(relation = %relation.name, dn = %parent.dn(), "Relation row produced");
        Some(parent.clone())
    } else {
        None
    }
}
