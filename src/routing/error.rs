//! Route registration errors.

use thiserror::Error;

/// Errors detected while building a route chain.
///
/// All of these are startup-time problems; evaluating a compiled chain
/// never produces them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A URI pattern could not be parsed.
    #[error("invalid URI template {pattern:?}: {reason}")]
    InvalidTemplate { pattern: String, reason: String },

    /// A bean handler name does not start with an HTTP verb.
    #[error("cannot derive an HTTP method from handler name {name:?} on bean {bean:?}")]
    UnknownHandlerVerb { bean: String, name: String },

    /// A bean was registered without any handler methods.
    #[error("bean {0:?} has no handler methods")]
    EmptyBean(String),
}

/// Result type for route registration.
pub type RouteResult<T> = Result<T, RouteError>;
