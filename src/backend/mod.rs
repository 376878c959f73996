//! Backend orchestration: query translation, connector dispatch and
//! record collection assembly.

mod query_builder;

pub use query_builder::QueryBuilder;

use std::sync::Arc;

use crate::connector::{Connector, ConnectorError};
use crate::models::{DocumentItem, FacetMap, ParamBag, Query, SearchArgs};

/// Errors surfaced by the backend boundary
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A connector call failed
    #[error("Backend exception: {0}")]
    Connector(#[from] ConnectorError),
}

/// One search result, paired with the identifier of the backend that
/// produced it
#[derive(Debug, Clone)]
pub struct SearchRecord {
    /// Backend source identifier, empty until injected
    pub source: String,

    /// The normalized document
    pub doc: DocumentItem,
}

/// Turns connector documents into typed records.
///
/// The boundary exists so callers can substitute richer record types
/// without touching the connectors.
pub trait RecordFactory: Send + Sync + std::fmt::Debug {
    /// Build a record from one normalized document
    fn make_record(&self, doc: DocumentItem) -> SearchRecord;
}

/// Factory producing plain [`SearchRecord`]s
#[derive(Debug, Clone, Default)]
pub struct DefaultRecordFactory;

impl RecordFactory for DefaultRecordFactory {
    fn make_record(&self, doc: DocumentItem) -> SearchRecord {
        SearchRecord {
            source: String::new(),
            doc,
        }
    }
}

/// The collection handed back to search callers
#[derive(Debug, Clone, Default)]
pub struct RecordCollection {
    /// Identifier of the backend that produced the collection
    pub source: String,

    /// Total hits reported by the API
    pub total: usize,

    /// 0-based offset of the first record
    pub offset: usize,

    /// Records on this page
    pub records: Vec<SearchRecord>,

    /// Facets keyed by field
    pub facets: FacetMap,

    /// "Did you mean" suggestions
    pub did_you_mean: Vec<String>,

    /// Error marker carried over from the connector (e.g. for disallowed
    /// empty searches); not a failure
    pub error: Option<String>,
}

impl RecordCollection {
    /// Stamp the source identifier on the collection and every record
    pub fn set_source_identifier(&mut self, identifier: &str) {
        self.source = identifier.to_string();
        for record in &mut self.records {
            record.source = identifier.to_string();
        }
    }
}

/// Search backend tying the query builder, a connector and the record
/// factory together.
#[derive(Debug)]
pub struct Backend {
    connector: Arc<dyn Connector>,
    identifier: String,
    query_builder: Option<QueryBuilder>,
    record_factory: Option<Arc<dyn RecordFactory>>,
}

impl Backend {
    /// Create a backend over the given connector
    pub fn new(connector: Arc<dyn Connector>, identifier: impl Into<String>) -> Self {
        Self {
            connector,
            identifier: identifier.into(),
            query_builder: None,
            record_factory: None,
        }
    }

    /// Replace the default query builder
    pub fn with_query_builder(mut self, builder: QueryBuilder) -> Self {
        self.query_builder = Some(builder);
        self
    }

    /// Replace the default record factory
    pub fn with_record_factory(mut self, factory: Arc<dyn RecordFactory>) -> Self {
        self.record_factory = Some(factory);
        self
    }

    /// This backend's source identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    fn query_builder(&self) -> QueryBuilder {
        self.query_builder.clone().unwrap_or_default()
    }

    fn record_factory(&self) -> Arc<dyn RecordFactory> {
        self.record_factory
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultRecordFactory))
    }

    /// Execute a search.
    ///
    /// `offset` and `limit` describe the caller's paging window; the wire
    /// protocols are page-based, so the offset is converted to a 1-based
    /// page number before dispatch. Caller `params` are merged over the
    /// query builder's bag and may override anything but the query itself.
    pub async fn search(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
        params: Option<&ParamBag>,
    ) -> Result<RecordCollection, BackendError> {
        let page = if limit > 0 { offset / limit + 1 } else { 1 };

        let mut bag = self.query_builder().build(query);
        if let Some(params) = params {
            bag.merge(params);
        }
        bag.set("limit", limit.to_string());
        bag.set("pageNumber", page.to_string());

        let args = SearchArgs::from_bag(&bag);
        tracing::debug!(
            identifier = %self.identifier,
            page,
            limit,
            "dispatching search"
        );
        let response = self
            .connector
            .query(self.connector.institution_code(), bag.terms(), &args)
            .await?;

        Ok(self.collect(response, offset))
    }

    /// Retrieve a single record by id
    pub async fn retrieve(
        &self,
        record_id: &str,
        params: Option<&ParamBag>,
    ) -> Result<RecordCollection, BackendError> {
        let on_campus = params
            .and_then(|p| p.bool_param("onCampus"))
            .unwrap_or(false);
        let inst_code = params.and_then(|p| p.first("instCode")).map(str::to_string);

        tracing::debug!(identifier = %self.identifier, %record_id, "retrieving record");
        let response = self
            .connector
            .get_record(record_id, inst_code.as_deref(), on_campus)
            .await?;

        Ok(self.collect(response, 0))
    }

    /// Retrieve several records in one call, where the connector supports it
    pub async fn retrieve_batch(
        &self,
        record_ids: &[String],
        params: Option<&ParamBag>,
    ) -> Result<RecordCollection, BackendError> {
        let on_campus = params
            .and_then(|p| p.bool_param("onCampus"))
            .unwrap_or(false);
        let inst_code = params.and_then(|p| p.first("instCode")).map(str::to_string);

        let response = self
            .connector
            .get_records(record_ids, inst_code.as_deref(), on_campus)
            .await?;

        Ok(self.collect(response, 0))
    }

    fn collect(
        &self,
        response: crate::models::QueryResponse,
        offset: usize,
    ) -> RecordCollection {
        let factory = self.record_factory();
        let mut collection = RecordCollection {
            source: String::new(),
            total: response.record_count,
            offset,
            records: response
                .documents
                .into_iter()
                .map(|doc| factory.make_record(doc))
                .collect(),
            facets: response.facets,
            did_you_mean: response.did_you_mean,
            error: response.error,
        };
        collection.set_source_identifier(&self.identifier);
        collection
    }
}
