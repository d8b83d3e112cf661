//! LDAP-backed table source.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use ldaptab_connector::attributes::AttributeMap;
use ldaptab_connector::error::{ConnectorError, ConnectorResult};
use ldaptab_connector::operation::SearchRequest;
use ldaptab_connector::pipeline::{Pipeline, ScanSummary};
use ldaptab_connector::schema::{SchemaBuilder, TableDescriptor};

use crate::config::SourceConfig;
use crate::connector::LdapDirectory;

/// A table registered against an LDAP directory.
///
/// Registration compiles the schema without touching the network; the
/// session is opened by [`LdapSource::connect`].
pub struct LdapSource {
    config: SourceConfig,
    table: TableDescriptor,
    request: SearchRequest,
    pipeline: Option<Pipeline<LdapDirectory>>,
}

impl LdapSource {
    /// Validate the configuration and build the table.
    pub fn register(config: SourceConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let table = SchemaBuilder::new()
            .with_limits(config.limits.clone())
            .build(&config.table, config.query.accept_script.as_deref())?;
        let request = SearchRequest::for_table(&config.query, &config.table, &config.scan);

        info!(
            table = %table.name,
            base_dn = %request.base_dn,
            attributes = request.attributes.len(),
            "Registered LDAP table"
        );

        Ok(Self {
            config,
            table,
            request,
            pipeline: None,
        })
    }

    /// The registered table.
    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    /// The search issued by every scan.
    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Check whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Open and bind the directory session.
    pub async fn connect(&mut self) -> ConnectorResult<()> {
        let directory = LdapDirectory::connect(&self.config.ldap).await?;
        self.pipeline = Some(Pipeline::new(directory, self.config.scan.clone()));
        Ok(())
    }

    /// Scan the table, delivering accepted entries to `sink`.
    #[instrument(skip_all, fields(table = %self.table.name))]
    pub async fn scan(
        &mut self,
        sink: &mpsc::Sender<AttributeMap>,
        cancel: &CancellationToken,
    ) -> ConnectorResult<ScanSummary> {
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| ConnectorError::connection_failed("not connected"))?;
        pipeline.scan(&self.request, &self.table, sink, cancel).await
    }

    /// A row channel with the configured capacity.
    pub fn channel(&self) -> (mpsc::Sender<AttributeMap>, mpsc::Receiver<AttributeMap>) {
        mpsc::channel(self.config.scan.channel_capacity)
    }

    /// Close the directory session.
    pub async fn close(&mut self) -> ConnectorResult<()> {
        match self.pipeline.take() {
            Some(pipeline) => pipeline.into_client().unbind().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for LdapSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSource")
            .field("ldap", &self.config.ldap.redacted())
            .field("table", &self.table.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}
