//! Error kinds shared by entities, messages and routes.

use thiserror::Error;

use crate::http::charset::Charset;

/// Opaque error raised by application route code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while consuming a message body or running a route.
///
/// Not matching any route is not an error; see
/// [`Dispatch::NotMatched`](crate::routing::Dispatch::NotMatched).
#[derive(Debug, Error)]
pub enum HttpError {
    /// Reading the body source failed.
    #[error("I/O error while reading body: {0}")]
    Io(#[from] std::io::Error),

    /// Body bytes are not valid in the requested text encoding.
    #[error("body is not valid {charset}")]
    Decode { charset: Charset },

    /// Body text could not be parsed as JSON.
    #[error("malformed JSON content: {0}")]
    MalformedContent(#[from] serde_json::Error),

    /// The entity body was already consumed by an earlier view.
    #[error("entity body has already been consumed")]
    AlreadyConsumed,

    /// A buffering view exceeded the configured body limit.
    #[error("body exceeds buffering limit of {limit} bytes")]
    TooLarge { limit: usize },

    /// Failure raised by a route handler.
    #[error("route handler failed: {0}")]
    Handler(BoxError),
}

impl HttpError {
    /// Wrap an arbitrary handler error.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        HttpError::Handler(err.into())
    }

    /// Returns true if the error was caused by the content the client sent.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HttpError::Decode { .. } | HttpError::MalformedContent(_) | HttpError::TooLarge { .. }
        )
    }
}

/// Result type for body and route operations.
pub type HttpResult<T> = Result<T, HttpError>;
