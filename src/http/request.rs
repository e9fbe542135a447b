//! Request messages.
//!
//! # Responsibilities
//! - Hold method, headers, URI and body entity of a request
//! - Decode query parameters lazily, once, with the request charset
//! - Expose trailing headers once the transport has read them
//! - Carry URI template captures from the matched route
//!
//! # Design Decisions
//! - Headers are immutable once attached
//! - Query decoding runs at most once, even on concurrent first access
//! - Trailers live in a shared single-assignment slot so the transport
//!   can fill it while a route holds the request

use std::sync::{Arc, OnceLock};

use crate::entity::Entity;
use crate::http::charset::Charset;
use crate::http::header::HeaderMap;
use crate::http::method::Method;
use crate::http::query::QueryParameters;
use crate::http::response::ResponseBuilder;

/// Shared slot the transport fills with trailing headers.
pub type TrailerSlot = Arc<OnceLock<HeaderMap>>;

/// A request: method, headers, URI and body.
#[derive(Debug)]
pub struct Request {
    method: Method,
    headers: HeaderMap,
    uri: String,
    entity: Entity,
}

impl Request {
    pub fn new(method: Method, headers: HeaderMap, uri: impl Into<String>, entity: Entity) -> Self {
        Self {
            method,
            headers,
            uri: uri.into(),
            entity,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of header `name` (case-insensitive).
    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The request URI as received.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The URI without query or fragment.
    pub fn path(&self) -> &str {
        let end = self.uri.find(['?', '#']).unwrap_or(self.uri.len());
        &self.uri[..end]
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }
}

/// Values captured by URI template placeholders, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriParameters {
    entries: Vec<(String, String)>,
}

impl UriParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn extend(&mut self, other: UriParameters) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A request received by the server.
#[derive(Debug)]
pub struct ServerRequest {
    request: Request,
    charset: Charset,
    query: OnceLock<QueryParameters>,
    uri_parameters: UriParameters,
    trailers: TrailerSlot,
}

impl ServerRequest {
    /// Create a server request; `charset` decodes the query string.
    pub fn new(
        method: Method,
        headers: HeaderMap,
        uri: impl Into<String>,
        charset: Charset,
        entity: Entity,
    ) -> Self {
        Self {
            request: Request::new(method, headers, uri, entity),
            charset,
            query: OnceLock::new(),
            uri_parameters: UriParameters::new(),
            trailers: TrailerSlot::default(),
        }
    }

    /// Use an externally owned trailer slot, typically one the transport
    /// fills after the last body frame.
    pub fn with_trailer_slot(mut self, slot: TrailerSlot) -> Self {
        self.trailers = slot;
        self
    }

    pub fn method(&self) -> Method {
        self.request.method()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.request.first_header(name)
    }

    pub fn uri(&self) -> &str {
        self.request.uri()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn entity(&self) -> &Entity {
        self.request.entity()
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn as_request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    /// Query parameters, decoded on first access and cached.
    pub fn query_parameters(&self) -> &QueryParameters {
        self.query
            .get_or_init(|| QueryParameters::from_uri(self.request.uri(), self.charset))
    }

    /// First value of query parameter `name`.
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query_parameters().get(name)
    }

    /// Value captured by placeholder `name` of the matched URI template.
    pub fn uri_parameter(&self, name: &str) -> Option<&str> {
        self.uri_parameters.get(name)
    }

    pub fn uri_parameters(&self) -> &UriParameters {
        &self.uri_parameters
    }

    pub(crate) fn set_uri_parameters(&mut self, parameters: UriParameters) {
        self.uri_parameters = parameters;
    }

    /// Trailing headers, once the transport has set them.
    pub fn trailing_headers(&self) -> Option<&HeaderMap> {
        self.trailers.get()
    }

    /// First value of trailing header `name`; `None` until trailers are set.
    pub fn first_trailing_header(&self, name: &str) -> Option<&str> {
        self.trailing_headers().and_then(|trailers| trailers.get(name))
    }

    /// Set the trailing headers. Only the first call takes effect;
    /// returns false if trailers were already set.
    pub fn set_trailing_headers(&self, trailers: HeaderMap) -> bool {
        let accepted = self.trailers.set(trailers).is_ok();
        if !accepted {
            tracing::warn!(uri = %self.uri(), "Trailing headers already set, ignoring");
        }
        accepted
    }

    /// Handle to the trailer slot for the transport.
    pub fn trailer_slot(&self) -> TrailerSlot {
        Arc::clone(&self.trailers)
    }

    /// Start building the response to this request.
    pub fn respond(&self) -> ResponseBuilder {
        ResponseBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> ServerRequest {
        ServerRequest::new(Method::Get, HeaderMap::new(), uri, Charset::Utf8, Entity::empty())
    }

    #[test]
    fn accessors() {
        let headers = HeaderMap::new().with("Host", "example.com");
        let req = ServerRequest::new(
            Method::Post,
            headers,
            "/users?page=1#top",
            Charset::Latin1,
            Entity::from_bytes("hello"),
        );
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.uri(), "/users?page=1#top");
        assert_eq!(req.path(), "/users");
        assert_eq!(req.first_header("host"), Some("example.com"));
        assert_eq!(req.charset(), Charset::Latin1);
        assert!(!req.entity().is_consumed());
    }

    #[test]
    fn question_mark_inside_fragment_is_not_a_query() {
        let req = get("/p#frag?a=1");
        assert_eq!(req.path(), "/p");
        assert!(req.query_parameters().is_empty());
        assert_eq!(req.query_parameter("a"), None);
    }

    #[test]
    fn query_parameters_are_cached() {
        let req = get("/search?q=cats&q=dogs&lang=en");

        let first = req.query_parameters() as *const QueryParameters;
        assert_eq!(req.query_parameters().get_all("q"), ["cats", "dogs"]);
        assert_eq!(req.query_parameter("lang"), Some("en"));
        assert_eq!(req.query_parameters() as *const QueryParameters, first);
    }

    #[test]
    fn missing_query_stays_empty() {
        let req = get("/search");
        assert!(req.query_parameters().is_empty());
        assert!(req.query_parameters().is_empty());
        assert_eq!(req.query_parameter("q"), None);
    }

    #[test]
    fn trailing_headers_default_to_absent() {
        let req = get("/upload");
        assert!(req.trailing_headers().is_none());
        assert_eq!(req.first_trailing_header("checksum"), None);

        assert!(req.set_trailing_headers(HeaderMap::new().with("checksum", "abc")));
        assert_eq!(req.first_trailing_header("checksum"), Some("abc"));
        assert_eq!(req.first_trailing_header("Checksum"), Some("abc"));
        assert_eq!(req.first_trailing_header("expires"), None);

        assert!(!req.set_trailing_headers(HeaderMap::new().with("checksum", "zzz")));
        assert_eq!(req.first_trailing_header("checksum"), Some("abc"));
    }

    #[test]
    fn shared_trailer_slot() {
        let slot = TrailerSlot::default();
        let req = get("/upload").with_trailer_slot(slot.clone());
        let _ = slot.set(HeaderMap::new().with("x-digest", "sha-256=..."));
        assert_eq!(req.first_trailing_header("X-Digest"), Some("sha-256=..."));
    }

    #[test]
    fn uri_parameters_lookup() {
        let mut req = get("/users/42");
        assert!(req.uri_parameters().is_empty());

        let mut params = UriParameters::new();
        params.insert("id", "42");
        req.set_uri_parameters(params);
        assert_eq!(req.uri_parameter("id"), Some("42"));
        assert_eq!(req.uri_parameter("name"), None);
    }
}
