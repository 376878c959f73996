//! Core data structures: the abstract query tree, request parameter
//! containers and the normalized document/response models.

mod params;
mod query;
mod record;
mod response;

pub use params::{Filter, FilterOp, ParamBag, SearchArgs, SearchTerm};
pub use query::{GroupOperator, Query, QueryGroup, TermQuery};
pub use record::{normalize_issns, DocumentItem};
pub use response::{FacetMap, FacetValue, QueryResponse, EMPTY_SEARCH_ERROR};

pub(crate) use record::{cdi_prefixed, strip_record_prefix};
