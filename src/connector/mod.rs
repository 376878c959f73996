//! Protocol connectors for the Primo Central APIs.
//!
//! This module defines the [`Connector`] trait implemented by the two wire
//! protocols: [`LegacyConnector`] speaks the XML brief-search API,
//! [`RestConnector`] speaks the JWT-authenticated REST/JSON API. Both own
//! all wire concerns: request construction, authentication, caching,
//! response parsing and highlighting reconciliation.
//!
//! Cross-cutting concerns are shared by composition rather than
//! inheritance: [`CachingClient`] wraps the transport with a response
//! cache, [`TokenCache`] holds the session-scoped JWT.

mod cache;
mod highlight;
mod legacy;
mod rest;
mod token;
mod xml;

pub use cache::{cache_key, CacheResult, CachingClient, MemoryCache, ResponseCache};
pub use legacy::LegacyConnector;
pub use rest::RestConnector;
pub use token::{MemoryTokenCache, TokenCache};

use async_trait::async_trait;

use crate::models::{QueryResponse, SearchArgs, SearchTerm};

/// The Connector trait defines the interface both protocol implementations
/// expose to the backend.
///
/// Batch retrieval is an optional capability: the legacy API supports it,
/// the REST API does not, so the default body reports `NotImplemented`.
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
    /// The institution code this connector was configured with
    fn institution_code(&self) -> &str;

    /// Execute a search and return the normalized result
    async fn query(
        &self,
        institution: &str,
        terms: &[SearchTerm],
        args: &SearchArgs,
    ) -> Result<QueryResponse, ConnectorError>;

    /// Retrieve a single record by id. An empty id short-circuits to the
    /// canned empty response without a network call.
    async fn get_record(
        &self,
        record_id: &str,
        inst_code: Option<&str>,
        on_campus: bool,
    ) -> Result<QueryResponse, ConnectorError>;

    /// Retrieve several records in one call (legacy API only)
    async fn get_records(
        &self,
        _record_ids: &[String],
        _inst_code: Option<&str>,
        _on_campus: bool,
    ) -> Result<QueryResponse, ConnectorError> {
        Err(ConnectorError::NotImplemented)
    }
}

/// Errors that can occur when talking to a Primo API
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The requested operation is not implemented for this connector
    #[error("Operation not implemented for this connector")]
    NotImplemented,

    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML or JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authorization failure that could not be recovered by token renewal
    #[error("Authorization failed: {0}")]
    Auth(String),

    /// Non-success status from the API, carrying the response body
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        ConnectorError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Parse(format!("JSON: {}", err))
    }
}

/// Map an abstract search handler onto its Primo index codename.
///
/// Unknown handlers return None; the legacy connector silently skips those
/// terms while the REST connector falls back to "any". The asymmetry is an
/// observed quirk of the two protocols and is preserved deliberately.
pub(crate) fn map_index(handler: &str) -> Option<&'static str> {
    match handler {
        "AllFields" => Some("any"),
        "Title" => Some("title"),
        "Author" => Some("creator"),
        "Subject" => Some("sub"),
        "Abstract" => Some("desc"),
        "ISSN" => Some("issn"),
        _ => None,
    }
}

/// Compute the wire precision qualifier for a term.
pub(crate) fn precision_for(phrase: bool, operator: Option<&str>) -> String {
    if phrase {
        "exact".to_string()
    } else if let Some(op) = operator {
        op.to_string()
    } else {
        "contains".to_string()
    }
}

/// Replace the wire separators (comma, semicolon) inside a term so it
/// cannot break the `index,precision,term` triple encoding.
pub(crate) fn sanitize_term(term: &str) -> String {
    term.replace([',', ';'], " ")
}
