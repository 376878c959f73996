//! # Primo Backend
//!
//! A search backend for Ex Libris Primo Central, exposing the legacy XML
//! brief-search API and the JWT-authenticated REST/JSON API behind one
//! connector abstraction.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Query, ParamBag, DocumentItem, etc.)
//! - [`backend`]: Orchestration: query translation, dispatch, record
//!   collection assembly
//! - [`connector`]: The two wire protocol implementations and their shared
//!   caching/auth plumbing
//! - [`utils`]: HTTP transport abstraction
//! - [`config`]: Configuration management

pub mod backend;
pub mod config;
pub mod connector;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use backend::{Backend, BackendError, QueryBuilder, RecordCollection};
pub use connector::{Connector, ConnectorError, LegacyConnector, RestConnector};
pub use models::{ParamBag, Query, QueryResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
