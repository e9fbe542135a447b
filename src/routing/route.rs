//! The route capability.

use std::future::Future;

use futures_util::future::BoxFuture;

use crate::http::error::HttpResult;
use crate::http::request::ServerRequest;
use crate::http::response::Response;

/// Future returned by a route.
pub type RouteFuture = BoxFuture<'static, HttpResult<Response>>;

/// Turns a request into a response, asynchronously.
///
/// Any `async fn(ServerRequest) -> HttpResult<Response>` (or closure
/// returning such a future) is a route.
pub trait Route: Send + Sync + 'static {
    fn apply(&self, request: ServerRequest) -> RouteFuture;
}

impl<F, Fut> Route for F
where
    F: Fn(ServerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HttpResult<Response>> + Send + 'static,
{
    fn apply(&self, request: ServerRequest) -> RouteFuture {
        Box::pin(self(request))
    }
}
