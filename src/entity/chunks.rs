//! Single-pass chunk stream over a body source.
//!
//! # Responsibilities
//! - Yield source chunks in order, exactly once
//! - Release the source and run the completion callback on every exit path
//!
//! # Design Decisions
//! - The callback lives in a guard whose `Drop` runs it, so exhaustion,
//!   a source error, an abandoned stream and an entity that is never read
//!   all release the source the same way
//! - The source is dropped before the callback runs

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;

use crate::http::error::{HttpError, HttpResult};
use crate::observability::metrics;

/// The raw byte source handed over by the transport.
pub type BodySource = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A type-erased, fallible stream of body chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = HttpResult<Bytes>> + Send>>;

/// Cleanup hook invoked when body consumption terminates.
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Runs the completion callback at most once, and at the latest on drop.
pub(crate) struct CompletionGuard {
    callback: Option<CompletionCallback>,
}

impl CompletionGuard {
    pub(crate) fn new(callback: Option<CompletionCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn replace(&mut self, callback: CompletionCallback) {
        self.callback = Some(callback);
    }

    pub(crate) fn complete(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.complete();
    }
}

/// Yields the chunks of one body source, then releases it.
///
/// After the first terminal event (end of source or error) the stream
/// only returns `None`.
pub(crate) struct Chunks {
    // Field order matters: the source drops before the guard fires.
    source: Option<BodySource>,
    guard: CompletionGuard,
    delivered: u64,
}

impl Chunks {
    pub(crate) fn new(source: BodySource) -> Self {
        Self {
            source: Some(source),
            guard: CompletionGuard::new(None),
            delivered: 0,
        }
    }

    pub(crate) fn guard_mut(&mut self) -> &mut CompletionGuard {
        &mut self.guard
    }

    fn finish(&mut self) {
        self.source = None;
        self.guard.complete();
        metrics::record_entity_bytes(self.delivered);
    }
}

impl Stream for Chunks {
    type Item = HttpResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(source) = this.source.as_mut() else {
            return Poll::Ready(None);
        };

        match source.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.delivered += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(error = %e, delivered = this.delivered, "Body source failed");
                this.finish();
                Poll::Ready(Some(Err(HttpError::Io(e))))
            }
            Poll::Ready(None) => {
                tracing::debug!(delivered = this.delivered, "Body source exhausted");
                this.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for Chunks {
    fn drop(&mut self) {
        if self.source.is_some() {
            tracing::debug!(
                delivered = self.delivered,
                "Body released before exhaustion"
            );
        }
    }
}
