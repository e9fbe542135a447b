//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response as AxumResponse};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

use reactive_http::config::ServerConfig;
use reactive_http::http::HttpServer;
use reactive_http::lifecycle::Shutdown;
use reactive_http::{Entity, Router};

/// Defaults with the metrics endpoint off.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.observability.metrics_enabled = false;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Drive one request through the full middleware stack without a socket.
pub async fn oneshot(config: ServerConfig, router: Router, request: Request<Body>) -> AxumResponse<Body> {
    let app = HttpServer::new(config, router).into_app();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: AxumResponse<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Start a server on an ephemeral port.
pub async fn start_server(config: ServerConfig, router: Router) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = HttpServer::new(config, router).run(listener, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

/// `count` chunks of `size` bytes each, all filled with `fill`.
pub fn chunks(count: usize, size: usize, fill: u8) -> Vec<io::Result<Bytes>> {
    (0..count).map(|_| Ok(Bytes::from(vec![fill; size]))).collect()
}

/// An entity over `count` chunks whose completion increments `fired`.
pub fn counted_entity(count: usize, size: usize, fired: &Arc<AtomicUsize>) -> Entity {
    let fired = Arc::clone(fired);
    Entity::from_stream(stream::iter(chunks(count, size, b'x'))).with_completion(move || {
        fired.fetch_add(1, Ordering::SeqCst);
    })
}

/// Chunk `c` of body `index`: a marker like `007-012|` repeated `repeat` times.
pub fn tagged_chunk(index: usize, c: usize, repeat: usize) -> Bytes {
    Bytes::from(format!("{index:03}-{c:03}|").repeat(repeat))
}

/// The full body `tagged_entity(index, count, repeat, ..)` should deliver.
pub fn tagged_body(index: usize, count: usize, repeat: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|c| tagged_chunk(index, c, repeat).to_vec())
        .collect()
}

/// Like `counted_entity`, but every chunk is tagged with its body and chunk
/// number, and the source yields to the scheduler between chunks.
pub fn tagged_entity(index: usize, count: usize, repeat: usize, fired: &Arc<AtomicUsize>) -> Entity {
    let fired = Arc::clone(fired);
    let source = stream::iter(0..count).then(move |c| async move {
        tokio::task::yield_now().await;
        Ok::<_, io::Error>(tagged_chunk(index, c, repeat))
    });
    Entity::from_stream(source).with_completion(move || {
        fired.fetch_add(1, Ordering::SeqCst);
    })
}
