//! Message bodies.
//!
//! # Data Flow
//! ```text
//! body source (transport stream, reader, bytes)
//!     → Entity (owns source + completion callback)
//!     → as_chunks()  ── the only view that reads the source
//!         → as_bytes()   (accumulate)
//!             → as_string()  (decode)
//!                 → as_json()    (parse)
//! ```
//!
//! # Design Decisions
//! - The first view call takes the source out of the entity; any later
//!   call fails with [`HttpError::AlreadyConsumed`]
//! - Buffering views honour an optional byte limit; `as_chunks` never
//!   buffers
//! - The completion callback runs exactly once on every path, including
//!   an entity that is dropped without being read

mod chunks;

use std::fmt;
use std::io;
use std::sync::{Mutex, PoisonError};

use bytes::{Bytes, BytesMut};
use futures_util::{future, stream, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::http::charset::Charset;
use crate::http::error::{HttpError, HttpResult};

pub use chunks::{BodySource, ChunkStream, CompletionCallback};
use chunks::Chunks;

/// Default read size for reader-backed entities (8 KB).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// A body that can be read exactly once, through one of four views.
pub struct Entity {
    body: Mutex<Option<Chunks>>,
    limit: Option<usize>,
}

impl Entity {
    /// Create an entity over a stream of byte chunks.
    pub fn from_stream<S>(source: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            body: Mutex::new(Some(Chunks::new(Box::pin(source)))),
            limit: None,
        }
    }

    /// Create an entity that reads `reader` in chunks of `chunk_size` bytes.
    pub fn from_reader<R>(reader: R, chunk_size: usize) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::from_stream(ReaderStream::with_capacity(reader, chunk_size.max(1)))
    }

    /// Create an entity over an in-memory body.
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        let body = body.into();
        if body.is_empty() {
            return Self::empty();
        }
        Self::from_stream(stream::once(future::ready(Ok(body))))
    }

    /// An entity with no body.
    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    /// Attach a cleanup hook that runs once when consumption terminates.
    ///
    /// Replaces any previously attached hook. If a view has already taken
    /// the body, the hook runs immediately.
    pub fn with_completion(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        match self
            .body
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(chunks) => chunks.guard_mut().replace(Box::new(callback)),
            None => callback(),
        }
        self
    }

    /// Limit how many bytes the buffering views may accumulate.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true once a view has taken the body.
    pub fn is_consumed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Chunks>> {
        self.body.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stream the body chunks in source order.
    ///
    /// The callback runs when the stream ends, fails, or is dropped.
    /// If the body was already taken the stream yields a single
    /// [`HttpError::AlreadyConsumed`].
    pub fn as_chunks(&self) -> ChunkStream {
        match self.lock().take() {
            Some(chunks) => Box::pin(chunks),
            None => {
                tracing::warn!("Entity body requested after it was consumed");
                Box::pin(stream::once(future::ready(Err(HttpError::AlreadyConsumed))))
            }
        }
    }

    /// Collect the whole body into one buffer.
    pub async fn as_bytes(&self) -> HttpResult<Bytes> {
        let mut chunks = self.as_chunks();
        let mut buf = BytesMut::new();

        while let Some(chunk) = chunks.try_next().await? {
            if let Some(limit) = self.limit {
                if buf.len() + chunk.len() > limit {
                    return Err(HttpError::TooLarge { limit });
                }
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(buf.freeze())
    }

    /// Collect the body and decode it as UTF-8.
    pub async fn as_string(&self) -> HttpResult<String> {
        self.as_string_with(Charset::Utf8).await
    }

    /// Collect the body and decode it with `charset`.
    pub async fn as_string_with(&self, charset: Charset) -> HttpResult<String> {
        let bytes = self.as_bytes().await?;
        charset.decode(&bytes)
    }

    /// Collect the body and parse it as JSON.
    ///
    /// Use `serde_json::Value` for an untyped structured value.
    pub async fn as_json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        let text = self.as_string().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("consumed", &self.is_consumed())
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn parts(body: &[&'static str]) -> Vec<io::Result<Bytes>> {
        body.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect()
    }

    fn counted(body: &[&'static str], fired: &Arc<AtomicUsize>) -> Entity {
        let fired = fired.clone();
        Entity::from_stream(stream::iter(parts(body))).with_completion(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn bytes_equal_concatenated_chunks() {
        let body = ["alpha-", "beta-", "", "gamma"];

        let chunked: Vec<Bytes> = Entity::from_stream(stream::iter(parts(&body)))
            .as_chunks()
            .try_collect()
            .await
            .unwrap();
        let concatenated: Vec<u8> = chunked.iter().flat_map(|c| c.iter().copied()).collect();

        let bytes = Entity::from_stream(stream::iter(parts(&body)))
            .as_bytes()
            .await
            .unwrap();

        assert_eq!(chunked.len(), 4);
        assert_eq!(bytes.as_ref(), concatenated.as_slice());
        assert_eq!(bytes, "alpha-beta-gamma");
    }

    #[tokio::test]
    async fn callback_fires_once_for_every_view() {
        let fired = Arc::new(AtomicUsize::new(0));

        let _ = counted(&["a", "b"], &fired).as_chunks().count().await;
        let _ = counted(&["a", "b"], &fired).as_bytes().await.unwrap();
        let _ = counted(&["hi"], &fired).as_string().await.unwrap();
        let _ = counted(&["{\"a\":", "1}"], &fired)
            .as_json::<Value>()
            .await
            .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn callback_fires_when_consumer_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let entity = counted(&["a", "b", "c"], &fired);

        let mut chunks = entity.as_chunks();
        assert_eq!(chunks.next().await.unwrap().unwrap(), "a");
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        drop(chunks);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        drop(entity);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_fires_when_source_fails() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let source = stream::iter(vec![
            Ok(Bytes::from("partial")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer went away")),
        ]);
        let entity = Entity::from_stream(source).with_completion(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(matches!(entity.as_bytes().await, Err(HttpError::Io(_))));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_fires_when_entity_dropped_unread() {
        let fired = Arc::new(AtomicUsize::new(0));
        drop(counted(&["unread"], &fired));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hook_attached_after_consumption_runs_immediately() {
        let fired = Arc::new(AtomicUsize::new(0));
        let entity = counted(&["body"], &fired);
        assert_eq!(entity.as_bytes().await.unwrap(), "body");
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let late = Arc::clone(&fired);
        let entity = entity.with_completion(move || {
            late.fetch_add(10, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 11);

        drop(entity);
        assert_eq!(fired.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn second_view_fails_fast() {
        let entity = Entity::from_bytes("once");
        assert_eq!(entity.as_string().await.unwrap(), "once");
        assert!(entity.is_consumed());

        assert!(matches!(entity.as_bytes().await, Err(HttpError::AlreadyConsumed)));
        assert!(matches!(
            entity.as_json::<Value>().await,
            Err(HttpError::AlreadyConsumed)
        ));
        let mut chunks = entity.as_chunks();
        assert!(matches!(chunks.next().await, Some(Err(HttpError::AlreadyConsumed))));
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_views_only_one_reads() {
        let entity = Entity::from_bytes("shared");
        let (a, b) = tokio::join!(entity.as_bytes(), entity.as_bytes());

        let results = [a, b];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(HttpError::AlreadyConsumed)))
            .count();
        assert_eq!((ok, conflicts), (1, 1));
    }

    #[tokio::test]
    async fn json_round_trip() {
        let value = json!({
            "name": "widget",
            "tags": ["a", "b"],
            "dimensions": { "w": 1.5, "h": 2 },
            "active": true,
            "parent": null
        });
        let entity = Entity::from_bytes(serde_json::to_vec(&value).unwrap());
        assert_eq!(entity.as_json::<Value>().await.unwrap(), value);
    }

    #[tokio::test]
    async fn malformed_json_is_reported() {
        let entity = Entity::from_bytes("{\"unterminated\": ");
        assert!(matches!(
            entity.as_json::<Value>().await,
            Err(HttpError::MalformedContent(_))
        ));
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_decode_error() {
        let entity = Entity::from_bytes(vec![0x68, 0x69, 0xff]);
        assert!(matches!(
            entity.as_string().await,
            Err(HttpError::Decode { charset: Charset::Utf8 })
        ));

        let entity = Entity::from_bytes(vec![0x68, 0x69, 0xff]);
        assert_eq!(entity.as_string_with(Charset::Latin1).await.unwrap(), "hiÿ");
    }

    #[tokio::test]
    async fn buffering_limit_is_enforced() {
        let fired = Arc::new(AtomicUsize::new(0));
        let entity = counted(&["1234", "5678"], &fired).with_limit(6);
        assert!(matches!(
            entity.as_bytes().await,
            Err(HttpError::TooLarge { limit: 6 })
        ));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let entity = Entity::from_bytes("123456").with_limit(6);
        assert_eq!(entity.as_bytes().await.unwrap(), "123456");
    }

    #[tokio::test]
    async fn reader_source_is_chunked() {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).collect();
        let entity = Entity::from_reader(std::io::Cursor::new(data.clone()), 1024);

        let chunks: Vec<Bytes> = entity.as_chunks().try_collect().await.unwrap();
        assert!(chunks.len() >= 10);
        assert!(chunks.iter().all(|c| c.len() <= 1024));
        let reassembled: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        assert_eq!(reassembled, data);
    }

    #[tokio::test]
    async fn empty_entity_has_no_chunks() {
        let entity = Entity::empty();
        assert_eq!(entity.as_chunks().count().await, 0);
        assert!(Entity::from_bytes("").as_bytes().await.unwrap().is_empty());
    }
}
