//! Common test utilities for ldaptab-connector integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use ldaptab_connector::async_trait;
use ldaptab_connector::prelude::*;

static TRACING: Once = Once::new();

/// Install a test subscriber once; honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Request log shared between a test and its directory.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    inner: Arc<Mutex<Vec<(SearchRequest, Vec<u8>)>>>,
}

impl RequestLog {
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn cookies(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cookie)| cookie.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    fn record(&self, request: &SearchRequest, cookie: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .push((request.clone(), cookie.to_vec()));
    }
}

/// In-memory directory paging through a fixed entry list.
///
/// The cookie is the offset of the next page, encoded big-endian.
pub struct InMemoryDirectory {
    entries: Vec<RawEntry>,
    fail_on_page: Option<usize>,
    cancel_after_page: Option<(usize, CancellationToken)>,
    log: RequestLog,
}

impl InMemoryDirectory {
    pub fn new(entries: Vec<RawEntry>) -> Self {
        Self {
            entries,
            fail_on_page: None,
            cancel_after_page: None,
            log: RequestLog::default(),
        }
    }

    /// Fail the given (zero-based) page request with a search error.
    pub fn failing_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Trigger `token` once the given (zero-based) page has been served.
    pub fn cancelling_after_page(mut self, page: usize, token: CancellationToken) -> Self {
        self.cancel_after_page = Some((page, token));
        self
    }

    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: Vec<u8>,
    ) -> ConnectorResult<SearchPage> {
        let page_index = self.log.len();
        self.log.record(request, &cookie);

        if self.fail_on_page == Some(page_index) {
            return Err(ConnectorError::search_failed("connection reset by peer"));
        }

        let offset = if cookie.is_empty() {
            0
        } else {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&cookie);
            u64::from_be_bytes(raw) as usize
        };
        let end = (offset + request.page_size as usize).min(self.entries.len());
        let entries = self.entries[offset..end]
            .iter()
            .map(|entry| select_attributes(entry, &request.attributes))
            .collect();
        let next = if end < self.entries.len() {
            (end as u64).to_be_bytes().to_vec()
        } else {
            Vec::new()
        };

        if let Some((after, token)) = &self.cancel_after_page {
            if *after == page_index {
                token.cancel();
            }
        }

        Ok(SearchPage::new(entries, next))
    }

    fn describe(&self) -> String {
        format!("in-memory ({} entries)", self.entries.len())
    }
}

/// Return only the requested attributes, as a server would; an empty list
/// means all of them.
fn select_attributes(entry: &RawEntry, requested: &[String]) -> RawEntry {
    if requested.is_empty() {
        return entry.clone();
    }
    RawEntry {
        dn: entry.dn.clone(),
        attributes: entry
            .attributes
            .iter()
            .filter(|(name, _)| requested.iter().any(|r| r.eq_ignore_ascii_case(name)))
            .cloned()
            .collect(),
    }
}

/// Person entry with the usual attributes.
pub fn person(index: usize) -> RawEntry {
    RawEntry::new(format!("uid=user{index},ou=people,dc=example,dc=com"))
        .with_value("uid", format!("user{index}"))
        .with_value("givenName", format!("Given{index}"))
        .with_value("sn", format!("Family{index}"))
        .with_value("uidNumber", (10_000 + index).to_string())
        .with_value(
            "accountEnabled",
            if index % 2 == 0 { "TRUE" } else { "FALSE" },
        )
        .with_values("memberOf", ["cn=staff,dc=example,dc=com"])
}

pub fn people(count: usize) -> Vec<RawEntry> {
    (0..count).map(person).collect()
}

/// Encoded SID `S-1-5-21-<a>-<b>-<rid>`.
pub fn sid(a: u32, b: u32, rid: u32) -> Vec<u8> {
    let mut bytes = vec![0x01, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05];
    for sub in [21, a, b, rid] {
        bytes.extend_from_slice(&sub.to_le_bytes());
    }
    bytes
}

pub fn users_table() -> TableSpec {
    TableSpec::new("users")
        .with_column(ColumnSpec::new("dn").primary_key())
        .with_column(ColumnSpec::new("uid").unique().not_null())
        .with_column(
            ColumnSpec::new("display_name").with_mapping(
                "`${bytesToString(entry.GivenName)} ${bytesToString(entry.SN)}`",
            ),
        )
        .with_column(
            ColumnSpec::new("uid_number")
                .with_type("int")
                .with_attribute("uidNumber"),
        )
        .with_column(
            ColumnSpec::new("groups")
                .with_type("[]string")
                .with_attribute("memberOf"),
        )
}

pub fn query() -> QuerySpec {
    QuerySpec::new("ou=people,dc=example,dc=com").with_filter("(objectClass=person)")
}
