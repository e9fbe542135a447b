//! Handler beans.
//!
//! A bean is a shared handler object whose methods are bound to
//! (method, URI template) pairs once, at startup. At request time the
//! chain asks the bean which bound method, if any, fits the request.
//!
//! ```ignore
//! let users = Bean::new("users", UserService::default())
//!     .handler("get_user", "/users/{id}", UserService::get_user)
//!     .handler("post_user", "/users", UserService::post_user);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::http::error::HttpResult;
use crate::http::method::Method;
use crate::http::request::{ServerRequest, UriParameters};
use crate::http::response::Response;
use crate::routing::error::{RouteError, RouteResult};
use crate::routing::route::{Route, RouteFuture};
use crate::routing::template::UriTemplate;

/// A handler object plus its method bindings, under construction.
pub struct Bean<T> {
    name: String,
    target: Arc<T>,
    methods: Vec<BeanMethod>,
    errors: Vec<RouteError>,
}

impl<T> Bean<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, target: T) -> Self {
        Self::from_arc(name, Arc::new(target))
    }

    pub fn from_arc(name: impl Into<String>, target: Arc<T>) -> Self {
        Self {
            name: name.into(),
            target,
            methods: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Bind `handler` under `name` for requests with `method` whose path
    /// matches `pattern`.
    pub fn on<F, Fut>(mut self, method: Method, pattern: &str, name: &str, handler: F) -> Self
    where
        F: Fn(Arc<T>, ServerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<Response>> + Send + 'static,
    {
        match UriTemplate::parse(pattern) {
            Ok(template) => {
                let target = Arc::clone(&self.target);
                let route = move |request: ServerRequest| handler(Arc::clone(&target), request);
                self.methods.push(BeanMethod {
                    name: name.to_string(),
                    method,
                    template,
                    route: Arc::new(route),
                });
            }
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Bind `handler`, deriving the HTTP method from the verb prefix of
    /// `name` (`get_user` binds GET, `postComment` binds POST).
    pub fn handler<F, Fut>(mut self, name: &str, pattern: &str, handler: F) -> Self
    where
        F: Fn(Arc<T>, ServerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<Response>> + Send + 'static,
    {
        match Method::from_handler_name(name) {
            Some(method) => self.on(method, pattern, name, handler),
            None => {
                self.errors.push(RouteError::UnknownHandlerVerb {
                    bean: self.name.clone(),
                    name: name.to_string(),
                });
                self
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Freeze the bindings, reporting the first registration error.
    pub fn bind(self) -> RouteResult<BoundBean> {
        if let Some(e) = self.errors.into_iter().next() {
            return Err(e);
        }
        if self.methods.is_empty() {
            return Err(RouteError::EmptyBean(self.name));
        }
        Ok(BoundBean {
            name: self.name,
            methods: self.methods,
        })
    }
}

/// One resolved bean method binding.
#[derive(Clone)]
pub struct BeanMethod {
    name: String,
    method: Method,
    template: UriTemplate,
    route: Arc<dyn Route>,
}

impl BeanMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_method(&self) -> Method {
        self.method
    }

    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    /// Call the bound handler.
    pub fn invoke(&self, request: ServerRequest) -> RouteFuture {
        self.route.apply(request)
    }

    fn matches(&self, request: &ServerRequest) -> Option<UriParameters> {
        if request.method() != self.method {
            return None;
        }
        self.template.matches(request.path())
    }
}

impl fmt::Debug for BeanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanMethod")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("template", &self.template.as_str())
            .finish()
    }
}

/// A bean whose bindings are frozen. Type-erased so chains can hold
/// beans of different handler types.
#[derive(Debug, Clone)]
pub struct BoundBean {
    name: String,
    methods: Vec<BeanMethod>,
}

impl BoundBean {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[BeanMethod] {
        &self.methods
    }

    /// First bound method, in binding order, matching the request.
    pub fn resolve(&self, request: &ServerRequest) -> Option<(&BeanMethod, UriParameters)> {
        self.methods
            .iter()
            .find_map(|m| m.matches(request).map(|params| (m, params)))
    }
}
