//! Reactive HTTP message pipeline.
//!
//! Single-consumption message bodies ([`Entity`]), request and response
//! messages, and a short-circuiting route chain ([`RouteBuilder`]) served
//! over Axum.
//!
//! ```text
//!   wire request ─▶ http::server ─▶ ServerRequest ─▶ routing::Router ─▶ Route
//!                                    (Entity)                            │
//!   wire response ◀─ http::server ◀───────────── Response (Entity) ◀─────┘
//! ```

pub mod config;
pub mod demo;
pub mod entity;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ServerConfig;
pub use entity::Entity;
pub use http::{HttpError, HttpResult, HttpServer, Method, Response, ServerRequest};
pub use lifecycle::Shutdown;
pub use routing::{Dispatch, RouteBuilder, Router};
