//! Route chain construction and dispatch.
//!
//! # Responsibilities
//! - Register (condition, route) entries in order through a fluent chain
//! - Evaluate entries top-to-bottom per request, first match wins
//! - Fill the request's URI parameters from the winning condition
//! - Signal an explicit not-matched outcome when nothing applies
//!
//! # Design Decisions
//! - The chain is compiled once and immutable afterwards (shared via Arc,
//!   evaluated without locks)
//! - Conditions are evaluated lazily: entries after the first match are
//!   never inspected
//! - Registration errors are collected and reported when the chain is
//!   finished, so building stays a single fluent expression

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::http::error::HttpResult;
use crate::http::method::Method;
use crate::http::request::{ServerRequest, UriParameters};
use crate::http::response::Response;
use crate::observability::metrics;
use crate::routing::bean::{Bean, BeanMethod, BoundBean};
use crate::routing::error::{RouteError, RouteResult};
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, UriMatcher};
use crate::routing::route::{Route, RouteFuture};
use crate::routing::template::UriTemplate;

type Invoker = Arc<dyn Fn(ServerRequest, BeanMethod) -> RouteFuture + Send + Sync>;
type PostProcessor = Arc<dyn Fn(Response) -> Response + Send + Sync>;

/// Outcome of evaluating a chain against one request.
#[derive(Debug)]
pub enum Dispatch {
    /// A route ran and produced this response.
    Matched(Response),
    /// No condition matched and no default route was registered.
    NotMatched,
}

impl Dispatch {
    pub fn is_matched(&self) -> bool {
        matches!(self, Dispatch::Matched(_))
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Dispatch::Matched(resp) => Some(resp),
            Dispatch::NotMatched => None,
        }
    }
}

enum BeanDispatch {
    Direct,
    Invoker(Invoker),
    PostProcess(PostProcessor),
}

enum Target {
    Route {
        matcher: Box<dyn Matcher>,
        route: Arc<dyn Route>,
    },
    Bean {
        bean: BoundBean,
        dispatch: BeanDispatch,
    },
}

struct Entry {
    label: String,
    target: Target,
}

enum Selected<'a> {
    Route(&'a Arc<dyn Route>),
    Bean(&'a BeanMethod, &'a BeanDispatch),
}

impl Entry {
    fn select(&self, request: &ServerRequest) -> Option<(Selected<'_>, UriParameters)> {
        match &self.target {
            Target::Route { matcher, route } => {
                matcher.matches(request).map(|p| (Selected::Route(route), p))
            }
            Target::Bean { bean, dispatch } => bean
                .resolve(request)
                .map(|(method, p)| (Selected::Bean(method, dispatch), p)),
        }
    }
}

/// Starts a route chain.
///
/// ```ignore
/// let router = RouteBuilder::new()
///     .if_method_and_uri_match(Method::Get, "/users/{id}", get_user)
///     .else_if_uri_matches("/health", health)
///     .or_else(not_found)?;
/// ```
#[derive(Default)]
pub struct RouteBuilder {
    entries: Vec<Entry>,
    errors: Vec<RouteError>,
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route requests whose path matches `pattern`.
    pub fn if_uri_matches(mut self, pattern: &str, route: impl Route) -> ElseBuilder {
        match UriTemplate::parse(pattern) {
            Ok(template) => self.push_route(pattern, Box::new(UriMatcher::new(template)), route),
            Err(e) => self.errors.push(e),
        }
        ElseBuilder { chain: self }
    }

    /// Route requests with exactly `method`.
    pub fn if_method_matches(mut self, method: Method, route: impl Route) -> ElseBuilder {
        self.push_route(method.as_str(), Box::new(MethodMatcher::new(method)), route);
        ElseBuilder { chain: self }
    }

    /// Route requests with `method` whose path matches `pattern`.
    pub fn if_method_and_uri_match(
        mut self,
        method: Method,
        pattern: &str,
        route: impl Route,
    ) -> ElseBuilder {
        match UriTemplate::parse(pattern) {
            Ok(template) => {
                let matcher = AndMatcher::new(vec![
                    Box::new(MethodMatcher::new(method)) as Box<dyn Matcher>,
                    Box::new(UriMatcher::new(template)),
                ]);
                self.push_route(&format!("{method} {pattern}"), Box::new(matcher), route);
            }
            Err(e) => self.errors.push(e),
        }
        ElseBuilder { chain: self }
    }

    /// Route requests accepted by a caller-supplied condition.
    pub fn if_matches(mut self, matcher: impl Matcher + 'static, route: impl Route) -> ElseBuilder {
        let label = format!("{matcher:?}");
        self.push_route(&label, Box::new(matcher), route);
        ElseBuilder { chain: self }
    }

    /// Route requests to the first matching method bound on `bean`.
    pub fn if_matches_bean_method<T>(mut self, bean: Bean<T>) -> ElseBuilder
    where
        T: Send + Sync + 'static,
    {
        self.push_bean(bean, BeanDispatch::Direct);
        ElseBuilder { chain: self }
    }

    /// Like [`if_matches_bean_method`](Self::if_matches_bean_method), but the
    /// resolved method is handed to `invoker`, which decides how to call it.
    pub fn if_matches_bean_method_with<T, F, Fut>(mut self, bean: Bean<T>, invoker: F) -> ElseBuilder
    where
        T: Send + Sync + 'static,
        F: Fn(ServerRequest, BeanMethod) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<Response>> + Send + 'static,
    {
        let invoker: Invoker =
            Arc::new(move |request: ServerRequest, method: BeanMethod| -> RouteFuture {
                Box::pin(invoker(request, method))
            });
        self.push_bean(bean, BeanDispatch::Invoker(invoker));
        ElseBuilder { chain: self }
    }

    /// Like [`if_matches_bean_method`](Self::if_matches_bean_method), passing
    /// every produced response through `post_processor`.
    pub fn if_matches_bean_method_then<T, P>(mut self, bean: Bean<T>, post_processor: P) -> ElseBuilder
    where
        T: Send + Sync + 'static,
        P: Fn(Response) -> Response + Send + Sync + 'static,
    {
        self.push_bean(bean, BeanDispatch::PostProcess(Arc::new(post_processor)));
        ElseBuilder { chain: self }
    }

    fn push_route(&mut self, label: &str, matcher: Box<dyn Matcher>, route: impl Route) {
        self.entries.push(Entry {
            label: label.to_string(),
            target: Target::Route {
                matcher,
                route: Arc::new(route),
            },
        });
    }

    fn push_bean<T>(&mut self, bean: Bean<T>, dispatch: BeanDispatch)
    where
        T: Send + Sync + 'static,
    {
        let label = format!("bean:{}", bean.name());
        match bean.bind() {
            Ok(bean) => self.entries.push(Entry {
                label,
                target: Target::Bean { bean, dispatch },
            }),
            Err(e) => self.errors.push(e),
        }
    }

    fn finish(self, default: Option<Arc<dyn Route>>) -> RouteResult<Router> {
        if let Some(e) = self.errors.into_iter().next() {
            return Err(e);
        }
        tracing::debug!(
            entries = self.entries.len(),
            has_default = default.is_some(),
            "Route chain compiled"
        );
        Ok(Router {
            entries: self.entries,
            default,
        })
    }
}

/// Continuation of a route chain after at least one entry.
pub struct ElseBuilder {
    chain: RouteBuilder,
}

impl ElseBuilder {
    pub fn else_if_uri_matches(self, pattern: &str, route: impl Route) -> ElseBuilder {
        self.chain.if_uri_matches(pattern, route)
    }

    pub fn else_if_method_matches(self, method: Method, route: impl Route) -> ElseBuilder {
        self.chain.if_method_matches(method, route)
    }

    pub fn else_if_method_and_uri_match(
        self,
        method: Method,
        pattern: &str,
        route: impl Route,
    ) -> ElseBuilder {
        self.chain.if_method_and_uri_match(method, pattern, route)
    }

    pub fn else_if_matches(self, matcher: impl Matcher + 'static, route: impl Route) -> ElseBuilder {
        self.chain.if_matches(matcher, route)
    }

    pub fn else_if_matches_bean_method<T>(self, bean: Bean<T>) -> ElseBuilder
    where
        T: Send + Sync + 'static,
    {
        self.chain.if_matches_bean_method(bean)
    }

    pub fn else_if_matches_bean_method_with<T, F, Fut>(self, bean: Bean<T>, invoker: F) -> ElseBuilder
    where
        T: Send + Sync + 'static,
        F: Fn(ServerRequest, BeanMethod) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<Response>> + Send + 'static,
    {
        self.chain.if_matches_bean_method_with(bean, invoker)
    }

    pub fn else_if_matches_bean_method_then<T, P>(self, bean: Bean<T>, post_processor: P) -> ElseBuilder
    where
        T: Send + Sync + 'static,
        P: Fn(Response) -> Response + Send + Sync + 'static,
    {
        self.chain.if_matches_bean_method_then(bean, post_processor)
    }

    /// Finish the chain with a default route for unmatched requests.
    pub fn or_else(self, route: impl Route) -> RouteResult<Router> {
        self.chain.finish(Some(Arc::new(route)))
    }

    /// Finish the chain with no default; unmatched requests dispatch to
    /// [`Dispatch::NotMatched`].
    pub fn build(self) -> RouteResult<Router> {
        self.chain.finish(None)
    }
}

/// A compiled, immutable route chain.
pub struct Router {
    entries: Vec<Entry>,
    default: Option<Arc<dyn Route>>,
}

impl Router {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the first route whose condition accepts `request`.
    pub async fn dispatch(&self, mut request: ServerRequest) -> HttpResult<Dispatch> {
        let start = Instant::now();
        let method = request.method();

        let selected = self
            .entries
            .iter()
            .enumerate()
            .find_map(|(index, entry)| entry.select(&request).map(|s| (index, entry, s)));

        let Some((index, entry, (selected, params))) = selected else {
            return match &self.default {
                Some(route) => {
                    tracing::debug!(%method, path = %request.path(), "No route matched, using default");
                    metrics::record_dispatch("default");
                    route.apply(request).await.map(Dispatch::Matched)
                }
                None => {
                    tracing::debug!(%method, path = %request.path(), "No route matched");
                    metrics::record_dispatch("not_matched");
                    Ok(Dispatch::NotMatched)
                }
            };
        };

        tracing::debug!(
            %method,
            path = %request.path(),
            entry = index,
            route = %entry.label,
            "Route matched"
        );
        metrics::record_dispatch("matched");
        request.set_uri_parameters(params);

        let result = match selected {
            Selected::Route(route) => route.apply(request).await,
            Selected::Bean(bean_method, BeanDispatch::Direct) => bean_method.invoke(request).await,
            Selected::Bean(bean_method, BeanDispatch::Invoker(invoker)) => {
                invoker(request, bean_method.clone()).await
            }
            Selected::Bean(bean_method, BeanDispatch::PostProcess(post)) => {
                bean_method.invoke(request).await.map(|resp| post(resp))
            }
        };

        if let Err(e) = &result {
            tracing::warn!(
                %method,
                route = %entry.label,
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Route failed"
            );
        }
        result.map(Dispatch::Matched)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field(
                "entries",
                &self.entries.iter().map(|e| e.label.as_str()).collect::<Vec<_>>(),
            )
            .field("has_default", &self.default.is_some())
            .finish()
    }
}
