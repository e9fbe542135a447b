//! HTTP message subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (ServerRequest: method, headers, URI, streaming entity)
//!     → [route chain picks a route] (crate::routing)
//!     → response.rs (Response built by the route)
//!     → server.rs (stream the response entity back)
//!     → Send to client
//! ```

pub mod charset;
pub mod error;
pub mod header;
pub mod method;
pub mod query;
pub mod request;
pub mod request_id;
pub mod response;
pub mod server;

pub use charset::Charset;
pub use error::{BoxError, HttpError, HttpResult};
pub use header::{Header, HeaderMap};
pub use method::{Method, UnknownMethod};
pub use query::QueryParameters;
pub use request::{Request, ServerRequest, TrailerSlot, UriParameters};
pub use request_id::{MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
pub use response::{Response, ResponseBuilder};
pub use server::HttpServer;
