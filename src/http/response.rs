//! Response messages and their builder.
//!
//! # Responsibilities
//! - Hold status, headers and body entity of a response
//! - Build responses fluently: headers and body first, status last
//!
//! # Design Decisions
//! - Bodies are entities, so streaming and buffered responses share one
//!   path toward the transport
//! - JSON bodies are serialized eagerly and tagged with `Content-Type`

use std::io;

use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;

use crate::entity::Entity;
use crate::http::error::HttpResult;
use crate::http::header::HeaderMap;

pub const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// A response: status, headers and body.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    entity: Entity,
}

impl Response {
    pub fn new(status: u16, headers: HeaderMap, entity: Entity) -> Self {
        Self {
            status,
            headers,
            entity,
        }
    }

    /// A response with no headers and no body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderMap::new(), Entity::empty())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn into_parts(self) -> (u16, HeaderMap, Entity) {
        (self.status, self.headers, self.entity)
    }

    /// Rebuild with extra headers, keeping status and body.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Fluent builder for [`Response`].
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    headers: HeaderMap,
    entity: Option<Entity>,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Buffered body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.entity = Some(Entity::from_bytes(body));
        self
    }

    /// Plain-text body.
    pub fn text(self, body: impl Into<String>) -> Self {
        self.header(CONTENT_TYPE, TEXT_PLAIN).body(body.into())
    }

    /// JSON body serialized from `value`.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> HttpResult<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self.header(CONTENT_TYPE, APPLICATION_JSON).body(body))
    }

    /// Body produced incrementally by `stream`.
    pub fn streaming_body<S>(mut self, stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        self.entity = Some(Entity::from_stream(stream));
        self
    }

    /// Use an existing entity as the body.
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Finish with an explicit status code.
    pub fn status(self, status: u16) -> Response {
        Response::new(status, self.headers, self.entity.unwrap_or_default())
    }

    pub fn ok(self) -> Response {
        self.status(200)
    }

    pub fn created(self) -> Response {
        self.status(201)
    }

    pub fn no_content(self) -> Response {
        self.status(204)
    }

    pub fn bad_request(self) -> Response {
        self.status(400)
    }

    pub fn unauthorized(self) -> Response {
        self.status(401)
    }

    pub fn forbidden(self) -> Response {
        self.status(403)
    }

    pub fn not_found(self) -> Response {
        self.status(404)
    }

    pub fn internal_server_error(self) -> Response {
        self.status(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn text_response() {
        let resp = ResponseBuilder::new().header("X-Custom", "1").text("hello").ok();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers().get("x-custom"), Some("1"));
        assert_eq!(resp.headers().get("content-type"), Some(TEXT_PLAIN));
        assert_eq!(resp.entity().as_string().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn json_response() {
        let resp = ResponseBuilder::new()
            .json(&json!({ "id": 7 }))
            .unwrap()
            .created();
        assert_eq!(resp.status(), 201);
        assert_eq!(resp.headers().get("Content-Type"), Some("application/json"));
        let body: Value = resp.entity().as_json().await.unwrap();
        assert_eq!(body, json!({ "id": 7 }));
    }

    #[tokio::test]
    async fn streaming_response() {
        let chunks: Vec<io::Result<Bytes>> = vec![Ok(Bytes::from("hello ")), Ok(Bytes::from("world"))];
        let resp = ResponseBuilder::new()
            .streaming_body(stream::iter(chunks))
            .ok();
        let (status, _, entity) = resp.into_parts();
        assert_eq!(status, 200);
        assert_eq!(entity.as_bytes().await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn status_only_has_empty_body() {
        let resp = ResponseBuilder::new().not_found();
        assert_eq!(resp.status(), 404);
        assert!(resp.headers().is_empty());
        assert!(resp.entity().as_bytes().await.unwrap().is_empty());

        let resp = Response::empty(204).with_header("Retry-After", "5");
        assert_eq!(resp.headers().get("retry-after"), Some("5"));
    }
}
