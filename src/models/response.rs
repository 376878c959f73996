//! Normalized connector response types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::DocumentItem;

/// Error marker returned for empty/disallowed queries. Not a failure: the
/// caller receives a regular, empty response carrying this marker.
pub const EMPTY_SEARCH_ERROR: &str = "empty_search_disallowed";

/// One facet value with its hit count.
///
/// A `None` count marks a session-selected value: the REST API sorts those
/// above every counted value, so the option encodes "treat as maximum".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    /// The facet value as returned by the API
    pub value: String,

    /// Hit count; None for force-inserted selected values
    pub count: Option<u64>,
}

/// Facet field name to ordered value list
pub type FacetMap = BTreeMap<String, Vec<FacetValue>>;

/// Normalized result of one connector call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Total hits reported by the API (may exceed the returned page)
    pub record_count: usize,

    /// Documents on the requested page
    pub documents: Vec<DocumentItem>,

    /// Facets keyed by field, values in API/selection order
    pub facets: FacetMap,

    /// "Did you mean" suggestions
    pub did_you_mean: Vec<String>,

    /// Error marker; set but non-fatal for disallowed empty searches
    pub error: Option<String>,
}

impl QueryResponse {
    /// The canned response for an empty or disallowed query. No HTTP call
    /// is made before returning this.
    pub fn empty_search_disallowed() -> Self {
        Self {
            error: Some(EMPTY_SEARCH_ERROR.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_empty_response() {
        let response = QueryResponse::empty_search_disallowed();
        assert_eq!(response.record_count, 0);
        assert!(response.documents.is_empty());
        assert!(response.facets.is_empty());
        assert_eq!(response.error.as_deref(), Some(EMPTY_SEARCH_ERROR));
    }
}
