//! LDAP directory client
//!
//! Establishes a bound session with `ldap3` and runs paged searches using the
//! simple paged results control (RFC 2696).

use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults, RawControl};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use ldaptab_connector::attributes::RawEntry;
use ldaptab_connector::error::{ConnectorError, ConnectorResult};
use ldaptab_connector::operation::{SearchPage, SearchRequest};
use ldaptab_connector::traits::DirectoryClient;
use ldaptab_connector::types::SearchScope;

use crate::config::LdapConfig;

/// Result code for invalid credentials.
const LDAP_INVALID_CREDENTIALS: u32 = 49;

/// A bound LDAP session.
pub struct LdapDirectory {
    ldap: Ldap,
    url: String,
    read_timeout: Duration,
}

impl LdapDirectory {
    /// Connect and bind.
    #[instrument(skip(config), fields(host = %config.host, port = config.port))]
    pub async fn connect(config: &LdapConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let url = config.url();

        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(
                config.connection.connection_timeout_secs,
            ))
            .set_starttls(config.use_starttls)
            .set_no_tls_verify(!config.tls.verify_certificate);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {url}"),
                    e,
                )
            })?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &config.bind_dn;
        let bind_password = config.bind_password.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let result = ldap
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("LDAP bind failed for {bind_dn}"),
                    e,
                )
            })?;

        if result.rc != 0 {
            if result.rc == LDAP_INVALID_CREDENTIALS {
                return Err(ConnectorError::AuthenticationFailed {
                    bind_dn: bind_dn.clone(),
                });
            }
            return Err(ConnectorError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(host = %config.host, "LDAP connection established successfully");

        Ok(Self {
            ldap,
            url,
            read_timeout: Duration::from_secs(config.connection.read_timeout_secs),
        })
    }

    /// Unbind and close the session.
    pub async fn unbind(mut self) -> ConnectorResult<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| ConnectorError::connection_failed_with_source("LDAP unbind failed", e))
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("url", &self.url)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectory {
    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: Vec<u8>,
    ) -> ConnectorResult<SearchPage> {
        let control: RawControl = PagedResults {
            size: page_size(request.page_size),
            cookie,
        }
        .into();

        let attributes = requested_attributes(&request.attributes);

        debug!(
            base_dn = %request.base_dn,
            filter = %request.filter,
            page_size = request.page_size,
            "Searching LDAP"
        );

        let result = self
            .ldap
            .with_controls(vec![control])
            .with_timeout(self.read_timeout)
            .search(
                &request.base_dn,
                to_ldap_scope(request.scope),
                &request.filter,
                attributes,
            )
            .await
            .map_err(|e| ConnectorError::search_failed_with_source("LDAP search failed", e))?;

        let (entries, done) = result
            .success()
            .map_err(|e| ConnectorError::search_failed_with_source("LDAP search failed", e))?;

        let next_cookie = paged_cookie(&done.ctrls);
        let entries: Vec<RawEntry> = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(entry_to_raw)
            .collect();

        Ok(SearchPage::new(entries, next_cookie))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn page_size(size: u32) -> i32 {
    i32::try_from(size).unwrap_or(i32::MAX)
}

fn requested_attributes(attributes: &[String]) -> Vec<String> {
    if attributes.is_empty() {
        vec!["*".to_string()]
    } else {
        attributes.to_vec()
    }
}

fn to_ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::WholeSubtree => Scope::Subtree,
    }
}

/// Cookie of the paged results response control; empty when absent.
fn paged_cookie(controls: &[Control]) -> Vec<u8> {
    controls
        .iter()
        .find_map(|Control(kind, raw)| match kind {
            Some(ControlType::PagedResults) if raw.val.is_some() => {
                Some(raw.parse::<PagedResults>().cookie)
            }
            _ => None,
        })
        .unwrap_or_default()
}

/// Merge text and binary attributes into raw byte values.
fn entry_to_raw(entry: SearchEntry) -> RawEntry {
    let mut attributes: Vec<(String, Vec<Vec<u8>>)> =
        Vec::with_capacity(entry.attrs.len() + entry.bin_attrs.len());

    for (name, values) in entry.attrs {
        attributes.push((name, values.into_iter().map(String::into_bytes).collect()));
    }
    for (name, values) in entry.bin_attrs {
        attributes.push((name, values));
    }

    RawEntry {
        dn: entry.dn,
        attributes,
    }
}
