//! Utility modules supporting the backend:
//!
//! - [`HttpTransport`]: transport seam between the connectors and reqwest
//! - [`ReqwestTransport`]: production transport with sensible defaults
//! - [`StubTransport`]: deterministic transport for tests
//! - [`HttpResponse`]: minimal response view the connectors consume

mod http;

pub use http::{HttpResponse, HttpTransport, ReqwestTransport, StubTransport};
