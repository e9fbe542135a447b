//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method
//! - Match the request path against a URI template
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - A match yields the URI parameters it captured, empty for
//!   conditions that capture nothing
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use std::fmt;

use crate::http::method::Method;
use crate::http::request::{ServerRequest, UriParameters};
use crate::routing::template::UriTemplate;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns the captured URI parameters if the request matches.
    fn matches(&self, req: &ServerRequest) -> Option<UriParameters>;
}

/// Matches the request method.
#[derive(Debug, Clone, Copy)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &ServerRequest) -> Option<UriParameters> {
        (req.method() == self.method).then(UriParameters::new)
    }
}

/// Matches the request path against a URI template.
#[derive(Debug, Clone)]
pub struct UriMatcher {
    template: UriTemplate,
}

impl UriMatcher {
    pub fn new(template: UriTemplate) -> Self {
        Self { template }
    }
}

impl Matcher for UriMatcher {
    fn matches(&self, req: &ServerRequest) -> Option<UriParameters> {
        self.template.matches(req.path())
    }
}

/// Matches when a plain predicate over the request holds.
pub struct PredicateMatcher<F> {
    name: &'static str,
    predicate: F,
}

impl<F> PredicateMatcher<F>
where
    F: Fn(&ServerRequest) -> bool + Send + Sync,
{
    pub fn new(name: &'static str, predicate: F) -> Self {
        Self { name, predicate }
    }
}

impl<F> fmt::Debug for PredicateMatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateMatcher")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> Matcher for PredicateMatcher<F>
where
    F: Fn(&ServerRequest) -> bool + Send + Sync,
{
    fn matches(&self, req: &ServerRequest) -> Option<UriParameters> {
        (self.predicate)(req).then(UriParameters::new)
    }
}

/// Combines multiple matchers with AND semantics.
///
/// Evaluation stops at the first failing matcher.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &ServerRequest) -> Option<UriParameters> {
        let mut captured = UriParameters::new();
        for matcher in &self.matchers {
            captured.extend(matcher.matches(req)?);
        }
        Some(captured)
    }
}
