//! Queue entries and their classification.
//!
//! Every interpolated value becomes an [`Interpolation`] when the template is
//! built. The variant is the classification: nothing is probed again while
//! the queue drains.

use std::fmt;
use std::future::Future;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt, TryStreamExt};

// ─── Interpolation ────────────────────────────────────────────

/// A value interpolated into a template.
pub enum Interpolation {
    /// Contributes nothing.
    Empty,
    /// Text, encoded with the stream's encoding on flush.
    Text(String),
    /// Raw bytes, emitted as-is.
    Bytes(Bytes),
    /// Flattened in place, in order.
    Seq(Vec<Interpolation>),
    /// Resolves to another interpolation.
    Future(Deferred),
    /// Relayed chunk by chunk.
    Stream(Source),
    /// A dynamic value with no byte representation. Fails when reached.
    Unsupported(String),
}

/// Tag returned by [`Interpolation::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Empty,
    Literal,
    Bytes,
    Sequence,
    Awaitable,
    PullSource,
    Unsupported,
}

impl EntryKind {
    /// Entries that go into the literal buffer.
    pub fn is_coalescable(&self) -> bool {
        matches!(self, EntryKind::Literal | EntryKind::Bytes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Literal => "literal",
            Self::Bytes => "bytes",
            Self::Sequence => "sequence",
            Self::Awaitable => "awaitable",
            Self::PullSource => "pull-source",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Interpolation {
    /// Interpolate a future. Its output is itself interpolated once it resolves.
    pub fn future<F, T>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Into<Interpolation> + 'static,
    {
        Interpolation::Future(Deferred::new(fut))
    }

    /// Interpolate a byte stream.
    ///
    /// A value that is both a stream and a future should come through here:
    /// the pull-source reading wins.
    pub fn stream<S, B>(stream: S) -> Self
    where
        S: Stream<Item = anyhow::Result<B>> + Send + 'static,
        B: Into<Bytes> + 'static,
    {
        Interpolation::Stream(Source::new(stream))
    }

    /// Interpolate a sequence of values.
    pub fn seq<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Interpolation>,
    {
        Interpolation::Seq(items.into_iter().map(Into::into).collect())
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Interpolation::Empty => EntryKind::Empty,
            Interpolation::Text(_) => EntryKind::Literal,
            Interpolation::Bytes(_) => EntryKind::Bytes,
            Interpolation::Seq(_) => EntryKind::Sequence,
            Interpolation::Future(_) => EntryKind::Awaitable,
            Interpolation::Stream(_) => EntryKind::PullSource,
            Interpolation::Unsupported(_) => EntryKind::Unsupported,
        }
    }

    /// Number of pull-sources held by this value, nested sequences included.
    pub(crate) fn source_count(&self) -> usize {
        match self {
            Interpolation::Stream(_) => 1,
            Interpolation::Seq(items) => items.iter().map(Interpolation::source_count).sum(),
            Interpolation::Future(deferred) => deferred
                .resolved_value()
                .map_or(0, Interpolation::source_count),
            _ => 0,
        }
    }
}

impl fmt::Debug for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Empty => f.write_str("Empty"),
            Interpolation::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Interpolation::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Interpolation::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Interpolation::Future(deferred) => f.debug_tuple("Future").field(deferred).finish(),
            Interpolation::Stream(source) => f.debug_tuple("Stream").field(source).finish(),
            Interpolation::Unsupported(desc) => f.debug_tuple("Unsupported").field(desc).finish(),
        }
    }
}

impl From<&str> for Interpolation {
    fn from(text: &str) -> Self {
        Interpolation::Text(text.to_string())
    }
}

impl From<String> for Interpolation {
    fn from(text: String) -> Self {
        Interpolation::Text(text)
    }
}

impl From<Bytes> for Interpolation {
    fn from(bytes: Bytes) -> Self {
        Interpolation::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Interpolation {
    fn from(bytes: Vec<u8>) -> Self {
        Interpolation::Bytes(bytes.into())
    }
}

impl From<&[u8]> for Interpolation {
    fn from(bytes: &[u8]) -> Self {
        Interpolation::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<Interpolation>> for Interpolation {
    fn from(items: Vec<Interpolation>) -> Self {
        Interpolation::Seq(items)
    }
}

impl From<()> for Interpolation {
    fn from(_: ()) -> Self {
        Interpolation::Empty
    }
}

impl<T: Into<Interpolation>> From<Option<T>> for Interpolation {
    fn from(value: Option<T>) -> Self {
        value.map_or(Interpolation::Empty, Into::into)
    }
}

impl From<serde_json::Value> for Interpolation {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Interpolation::Empty,
            Value::String(text) => Interpolation::Text(text),
            Value::Array(items) => Interpolation::seq(items),
            other => Interpolation::Unsupported(other.to_string()),
        }
    }
}

// ─── Deferred (awaitable) ─────────────────────────────────────

enum DeferredState {
    Pending(BoxFuture<'static, anyhow::Result<Interpolation>>),
    Resolved(Box<Interpolation>),
    Taken,
}

/// An interpolated future. It may be driven before the queue reaches it; the
/// resolved value is held until then.
pub struct Deferred {
    state: DeferredState,
}

impl Deferred {
    pub fn new<F, T>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Into<Interpolation> + 'static,
    {
        Self {
            state: DeferredState::Pending(fut.map(|res| res.map(Into::into)).boxed()),
        }
    }

    /// A future that has already resolved.
    pub fn resolved(value: impl Into<Interpolation>) -> Self {
        Self {
            state: DeferredState::Resolved(Box::new(value.into())),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, DeferredState::Resolved(_))
    }

    /// Nothing left to drive.
    pub(crate) fn is_settled(&self) -> bool {
        !matches!(self.state, DeferredState::Pending(_))
    }

    fn resolved_value(&self) -> Option<&Interpolation> {
        match &self.state {
            DeferredState::Resolved(value) => Some(&**value),
            _ => None,
        }
    }

    /// Drive the future without handing out its value. Returns the failure,
    /// once, if the future rejected.
    pub(crate) fn poll_watch(&mut self, cx: &mut Context<'_>) -> Option<anyhow::Error> {
        let DeferredState::Pending(fut) = &mut self.state else {
            return None;
        };
        match fut.poll_unpin(cx) {
            Poll::Ready(Ok(value)) => {
                self.state = DeferredState::Resolved(Box::new(value));
                None
            }
            Poll::Ready(Err(err)) => {
                self.state = DeferredState::Taken;
                Some(err)
            }
            Poll::Pending => None,
        }
    }

    /// Take the resolved value, driving the future if needed.
    pub(crate) fn poll_take(&mut self, cx: &mut Context<'_>) -> Poll<anyhow::Result<Interpolation>> {
        if let Some(err) = self.poll_watch(cx) {
            return Poll::Ready(Err(err));
        }
        match std::mem::replace(&mut self.state, DeferredState::Taken) {
            DeferredState::Resolved(value) => Poll::Ready(Ok(*value)),
            DeferredState::Pending(fut) => {
                self.state = DeferredState::Pending(fut);
                Poll::Pending
            }
            DeferredState::Taken => Poll::Ready(Err(anyhow::anyhow!(
                "interpolated future polled after completion"
            ))),
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            DeferredState::Pending(_) => "pending",
            DeferredState::Resolved(_) => "resolved",
            DeferredState::Taken => "taken",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

// ─── Source (pull-source) ─────────────────────────────────────

/// An interpolated byte stream with a single-chunk look-ahead slot.
///
/// The slot lets the driver watch an unreached stream for failure without
/// buffering more than the stream's next chunk.
pub struct Source {
    inner: BoxStream<'static, anyhow::Result<Bytes>>,
    lookahead: Option<Bytes>,
    finished: bool,
}

impl Source {
    pub fn new<S, B>(stream: S) -> Self
    where
        S: Stream<Item = anyhow::Result<B>> + Send + 'static,
        B: Into<Bytes> + 'static,
    {
        Self {
            inner: stream.map_ok(Into::into).boxed(),
            lookahead: None,
            finished: false,
        }
    }

    pub fn has_lookahead(&self) -> bool {
        self.lookahead.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Watching cannot make progress until the stream is attached.
    pub(crate) fn is_settled(&self) -> bool {
        self.lookahead.is_some() || self.finished
    }

    /// Fill the look-ahead slot if it is empty. Returns the failure, once, if
    /// the stream failed.
    pub(crate) fn poll_watch(&mut self, cx: &mut Context<'_>) -> Option<anyhow::Error> {
        if self.lookahead.is_some() || self.finished {
            return None;
        }
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.lookahead = Some(chunk);
                None
            }
            Poll::Ready(Some(Err(err))) => {
                self.finished = true;
                Some(err)
            }
            Poll::Ready(None) => {
                self.finished = true;
                None
            }
            Poll::Pending => None,
        }
    }

    /// Next chunk: the look-ahead slot first, then the stream itself.
    pub(crate) fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<anyhow::Result<Bytes>>> {
        if let Some(chunk) = self.lookahead.take() {
            return Poll::Ready(Some(Ok(chunk)));
        }
        if self.finished {
            return Poll::Ready(None);
        }
        let next = self.inner.poll_next_unpin(cx);
        if matches!(next, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            self.finished = true;
        }
        next
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("lookahead", &self.lookahead.as_ref().map(Bytes::len))
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;
    use serde_json::json;

    #[test]
    fn classify_conversions() {
        assert_eq!(Interpolation::from("tom").kind(), EntryKind::Literal);
        assert_eq!(Interpolation::from(b"tom".to_vec()).kind(), EntryKind::Bytes);
        assert_eq!(Interpolation::from(None::<String>).kind(), EntryKind::Empty);
        assert_eq!(Interpolation::from(Some("x")).kind(), EntryKind::Literal);
        assert_eq!(Interpolation::seq(["a", "b"]).kind(), EntryKind::Sequence);
        assert_eq!(
            Interpolation::future(async { anyhow::Ok("d") }).kind(),
            EntryKind::Awaitable
        );
        assert_eq!(
            Interpolation::stream(futures::stream::empty::<anyhow::Result<Bytes>>()).kind(),
            EntryKind::PullSource
        );
    }

    #[test]
    fn classify_json() {
        assert_eq!(Interpolation::from(json!(null)).kind(), EntryKind::Empty);
        assert_eq!(Interpolation::from(json!("x")).kind(), EntryKind::Literal);
        assert_eq!(Interpolation::from(json!(["x", null])).kind(), EntryKind::Sequence);
        assert_eq!(Interpolation::from(json!(42)).kind(), EntryKind::Unsupported);
        assert_eq!(Interpolation::from(json!({"a": 1})).kind(), EntryKind::Unsupported);
    }

    #[test]
    fn coalescable_kinds() {
        assert!(EntryKind::Literal.is_coalescable());
        assert!(EntryKind::Bytes.is_coalescable());
        assert!(!EntryKind::Empty.is_coalescable());
        assert!(!EntryKind::PullSource.is_coalescable());
        assert!(!EntryKind::Awaitable.is_coalescable());
    }

    #[test]
    fn source_count_sees_nested_streams() {
        let value = Interpolation::seq([
            Interpolation::from("a"),
            Interpolation::stream(futures::stream::empty::<anyhow::Result<Bytes>>()),
            Interpolation::seq([Interpolation::stream(
                futures::stream::empty::<anyhow::Result<Bytes>>(),
            )]),
        ]);
        assert_eq!(value.source_count(), 2);
    }

    #[test]
    fn deferred_keeps_early_value() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut deferred = Deferred::new(async { anyhow::Ok("early") });
        assert!(deferred.poll_watch(&mut cx).is_none());
        assert!(deferred.is_resolved());

        match deferred.poll_take(&mut cx) {
            Poll::Ready(Ok(Interpolation::Text(text))) => assert_eq!(text, "early"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn deferred_reports_rejection_once() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut deferred =
            Deferred::new(async { Err::<String, _>(anyhow::anyhow!("destroyed")) });
        let err = deferred.poll_watch(&mut cx).expect("rejection");
        assert_eq!(err.to_string(), "destroyed");
        assert!(deferred.poll_watch(&mut cx).is_none());
    }

    #[test]
    fn deferred_holds_nested_futures_and_streams() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let inner = Interpolation::future(async {
            anyhow::Ok(Interpolation::stream(futures::stream::empty::<anyhow::Result<Bytes>>()))
        });
        let outer = Interpolation::Future(Deferred::resolved(inner));
        // The resolved outer value is itself an unresolved future.
        assert_eq!(outer.source_count(), 0);

        let Interpolation::Future(mut deferred) = outer else {
            panic!("expected a future");
        };
        let mut inner = match deferred.poll_take(&mut cx) {
            Poll::Ready(Ok(Interpolation::Future(inner))) => inner,
            other => panic!("unexpected {other:?}"),
        };
        assert!(inner.poll_watch(&mut cx).is_none());
        assert!(inner.is_settled());
        assert_eq!(Interpolation::Future(inner).source_count(), 1);
    }

    #[test]
    fn source_lookahead_holds_one_chunk() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut source = Source::new(futures::stream::iter(vec![
            anyhow::Ok("a"),
            anyhow::Ok("b"),
        ]));
        assert!(source.poll_watch(&mut cx).is_none());
        assert!(source.has_lookahead());
        // Slot is full, nothing more is pulled.
        assert!(source.poll_watch(&mut cx).is_none());

        let first = source.poll_chunk(&mut cx);
        assert!(matches!(first, Poll::Ready(Some(Ok(ref b))) if &b[..] == b"a"));
        let second = source.poll_chunk(&mut cx);
        assert!(matches!(second, Poll::Ready(Some(Ok(ref b))) if &b[..] == b"b"));
        assert!(matches!(source.poll_chunk(&mut cx), Poll::Ready(None)));
        assert!(source.is_finished());
    }
}
