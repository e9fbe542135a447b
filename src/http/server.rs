//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app with a single fallback handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Convert wire requests into `ServerRequest`s and responses back
//! - Dispatch requests through the compiled route chain
//! - Bind server to listener and stop on shutdown signal
//!
//! # Status Mapping
//! - `Dispatch::NotMatched` → 404
//! - Undecodable or malformed request content → 400
//! - Buffering limit exceeded → 413
//! - Any other route failure → 500
//! - Methods outside the supported set → 501

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response as AxumResponse},
    Router as AxumRouter,
};
use bytes::Bytes;
use futures_util::{stream, Stream};
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{HttpConfig, ServerConfig};
use crate::entity::Entity;
use crate::http::charset::Charset;
use crate::http::error::HttpError;
use crate::http::header::HeaderMap;
use crate::http::method::Method;
use crate::http::request::{ServerRequest, TrailerSlot};
use crate::http::request_id::{MakeRequestUuidV4, RequestIdExt};
use crate::http::response::Response;
use crate::observability::{metrics, spans};
use crate::routing::{Dispatch, Router};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub http: Arc<HttpConfig>,
}

/// HTTP server serving one route chain.
pub struct HttpServer {
    app: AxumRouter,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server for `router`.
    pub fn new(config: ServerConfig, router: Router) -> Self {
        let state = AppState {
            router: Arc::new(router),
            http: Arc::new(config.http.clone()),
        };
        let app = Self::build_app(&config, state);
        Self { app, config }
    }

    /// Build the Axum app with all middleware layers.
    #[allow(deprecated)]
    fn build_app(config: &ServerConfig, state: AppState) -> AxumRouter {
        AxumRouter::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(spans::make_request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// The Axum app, for serving on a custom listener or driving in tests.
    pub fn into_app(self) -> AxumRouter {
        self.app
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Converts the request, runs the chain and converts the outcome.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> AxumResponse {
    let start = Instant::now();
    let method_str = request.method().as_str().to_string();
    let request_id = request.request_id().unwrap_or("unknown").to_string();

    let method = match method_str.parse::<Method>() {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(request_id = %request_id, method = %method_str, "Unsupported method");
            metrics::record_request(&method_str, 501, start);
            return (StatusCode::NOT_IMPLEMENTED, e.to_string()).into_response();
        }
    };

    let server_request = into_server_request(request, method, &state.http);
    let path = server_request.path().to_string();

    let response = match state.router.dispatch(server_request).await {
        Ok(Dispatch::Matched(resp)) => into_axum_response(resp),
        Ok(Dispatch::NotMatched) => {
            tracing::debug!(request_id = %request_id, path = %path, "No route matched");
            (StatusCode::NOT_FOUND, "No matching route found").into_response()
        }
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                tracing::error!(request_id = %request_id, path = %path, error = %e, "Route failed");
            } else {
                tracing::warn!(request_id = %request_id, path = %path, error = %e, "Rejected request content");
            }
            (status, e.to_string()).into_response()
        }
    };

    metrics::record_request(&method_str, response.status().as_u16(), start);
    response
}

/// Build a `ServerRequest` whose entity streams the wire body.
pub fn into_server_request(request: Request<Body>, method: Method, http: &HttpConfig) -> ServerRequest {
    let (parts, body) = request.into_parts();

    let headers = convert_headers(&parts.headers);
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    let slot = TrailerSlot::default();
    let released_uri = uri.clone();
    let mut entity = Entity::from_stream(body_source(body, Arc::clone(&slot)))
        .with_completion(move || tracing::trace!(uri = %released_uri, "Request body released"));
    if let Some(limit) = http.body_limit() {
        entity = entity.with_limit(limit);
    }

    let charset = headers
        .get("content-type")
        .and_then(content_type_charset)
        .unwrap_or(http.default_charset);

    ServerRequest::new(method, headers, uri, charset, entity).with_trailer_slot(slot)
}

/// The `charset` parameter of a `Content-Type` value, when supported.
fn content_type_charset(content_type: &str) -> Option<Charset> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        value.trim().trim_matches('"').parse().ok()
    })
}

/// Body frames as a chunk source. Trailer frames fill `trailers`.
fn body_source(body: Body, trailers: TrailerSlot) -> impl Stream<Item = io::Result<Bytes>> + Send {
    stream::unfold(Some(body), move |state| {
        let trailers = Arc::clone(&trailers);
        async move {
            let mut body = state?;
            loop {
                match body.frame().await? {
                    Err(e) => return Some((Err(io::Error::other(e)), None)),
                    Ok(frame) => match frame.into_data() {
                        Ok(data) if data.is_empty() => continue,
                        Ok(data) => return Some((Ok(data), Some(body))),
                        Err(frame) => {
                            if let Ok(map) = frame.into_trailers() {
                                tracing::debug!(count = map.len(), "Trailing headers received");
                                let _ = trailers.set(convert_headers(&map));
                            }
                        }
                    },
                }
            }
        }
    })
}

fn convert_headers(map: &axum::http::HeaderMap) -> HeaderMap {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Turn a route response into a streaming Axum response.
pub fn into_axum_response(response: Response) -> AxumResponse {
    let (status, headers, entity) = response.into_parts();

    let Ok(status) = StatusCode::from_u16(status) else {
        tracing::error!(status, "Route produced an invalid status code");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut builder = axum::http::Response::builder().status(status);
    for header in headers.iter() {
        builder = builder.header(header.name.as_str(), header.value.as_str());
    }

    match builder.body(Body::from_stream(entity.as_chunks())) {
        Ok(resp) => resp.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Route produced an invalid response head");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn error_status(err: &HttpError) -> StatusCode {
    match err {
        HttpError::Decode { .. } | HttpError::MalformedContent(_) => StatusCode::BAD_REQUEST,
        HttpError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        HttpError::Io(_)
        | HttpError::AlreadyConsumed
        | HttpError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_config() -> HttpConfig {
        HttpConfig {
            default_charset: Charset::Latin1,
            max_buffered_body_bytes: 4,
            read_chunk_size: 1024,
        }
    }

    #[tokio::test]
    async fn converts_wire_request() {
        let request = Request::builder()
            .method("POST")
            .uri("http://example.com/items/3?tag=a%FC")
            .header("X-Trace", "t1")
            .header("x-trace", "t2")
            .body(Body::from("abcd"))
            .unwrap();

        let req = into_server_request(request, Method::Post, &http_config());
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.uri(), "/items/3?tag=a%FC");
        assert_eq!(req.headers().get_all("x-trace"), vec!["t1", "t2"]);
        assert_eq!(req.charset(), Charset::Latin1);
        assert_eq!(req.query_parameter("tag"), Some("aü"));
        assert_eq!(req.entity().as_bytes().await.unwrap(), "abcd");
    }

    #[test]
    fn charset_from_content_type() {
        let request = Request::builder()
            .uri("/")
            .header("Content-Type", "text/plain; Charset=\"utf-8\"")
            .body(Body::empty())
            .unwrap();
        let req = into_server_request(request, Method::Post, &http_config());
        assert_eq!(req.charset(), Charset::Utf8);

        assert_eq!(content_type_charset("text/plain; charset=koi8-r"), None);
        assert_eq!(content_type_charset("application/json"), None);
        assert_eq!(content_type_charset("text/html;q=1; charset=latin1"), Some(Charset::Latin1));
    }

    #[tokio::test]
    async fn request_body_respects_limit() {
        let request = Request::builder()
            .uri("/upload")
            .body(Body::from("too long"))
            .unwrap();
        let req = into_server_request(request, Method::Put, &http_config());
        let err = req.entity().as_bytes().await.unwrap_err();
        assert!(matches!(err, HttpError::TooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn trailers_land_in_the_slot() {
        let frames: Vec<Result<hyper::body::Frame<Bytes>, io::Error>> = vec![
            Ok(hyper::body::Frame::data(Bytes::from("part"))),
            Ok(hyper::body::Frame::trailers(
                [("checksum", "abc")]
                    .into_iter()
                    .map(|(k, v)| {
                        (
                            axum::http::HeaderName::from_static(k),
                            axum::http::HeaderValue::from_static(v),
                        )
                    })
                    .collect(),
            )),
        ];
        let body = Body::new(http_body_util::StreamBody::new(stream::iter(frames)));
        let request = Request::builder().uri("/upload").body(body).unwrap();

        let req = into_server_request(request, Method::Post, &HttpConfig::default());
        assert!(req.trailing_headers().is_none());
        assert_eq!(req.entity().as_string().await.unwrap(), "part");
        assert_eq!(req.first_trailing_header("Checksum"), Some("abc"));
    }

    #[tokio::test]
    async fn converts_route_response() {
        let resp = Response::empty(201)
            .with_header("Location", "/items/3")
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2");
        let resp = into_axum_response(resp);

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers()["location"], "/items/3");
        assert_eq!(resp.headers().get_all("set-cookie").iter().count(), 2);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[test]
    fn invalid_status_becomes_500() {
        let resp = into_axum_response(Response::empty(42));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(error_status(&HttpError::Decode { charset: Charset::Utf8 }), StatusCode::BAD_REQUEST);
        assert_eq!(error_status(&HttpError::TooLarge { limit: 1 }), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(error_status(&HttpError::AlreadyConsumed), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_status(&HttpError::handler("boom")), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
