//! Output driver
//!
//! [`TemplateStream`] is the consumer-facing state machine. Every
//! `poll_next` is a pull; handing out a chunk is a push the consumer accepted,
//! after which nothing more is produced until the next pull. That holds for
//! literal flushes, sub-stream relays and output following a resolved future
//! alike.
//!
//! ## Transitions
//!
//! | From       | Event                         | To                     |
//! |------------|-------------------------------|------------------------|
//! | `Idle`     | pull                          | `Draining`             |
//! | `Draining` | reached a sub-stream          | `Pumping`              |
//! | `Draining` | reached an unresolved future  | `Awaiting`             |
//! | `Draining` | queue and buffer exhausted    | `Ended`                |
//! | `Pumping`  | sub-stream ended              | `Draining`             |
//! | `Awaiting` | future resolved               | `Draining`             |
//! | any live   | failure with error            | `Errored` → `Destroyed`|
//! | any live   | destroy / abort without error | `Destroyed`            |

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::FusedStream;
use futures::task::AtomicWaker;
use futures::{Stream, StreamExt};
use tracing::{debug, trace, warn};

use crate::awaiter::AsyncAwaiter;
use crate::buffer::LiteralBuffer;
use crate::codec::TextCodec;
use crate::config::TemplateConfig;
use crate::entry::{EntryKind, Interpolation};
use crate::error::TemplateError;
use crate::pump::SubStreamPump;
use crate::queue::WorkQueue;

// ─── States ───────────────────────────────────────────────────

/// Observable driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Not pulled yet.
    Idle,
    Draining,
    /// Suspended on an interpolated future.
    Awaiting,
    /// Relaying a sub-stream.
    Pumping,
    /// Finished gracefully.
    Ended,
    /// Failed; the error has not been handed to the consumer yet.
    Errored,
    Destroyed,
}

impl DriverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Errored | Self::Destroyed)
    }
}

enum Phase {
    Idle,
    Draining,
    Awaiting(AsyncAwaiter),
    Pumping(SubStreamPump),
    Ended,
    Errored(TemplateError),
    Destroyed,
}

/// Outcome of draining the queue until something observable happens.
enum Step {
    Emit(Bytes),
    /// Phase changed to pumping or awaiting.
    Suspend,
    End,
    Fail(TemplateError),
}

// ─── Abort handle ─────────────────────────────────────────────

#[derive(Debug, Default)]
struct AbortShared {
    aborted: AtomicBool,
    reason: Mutex<Option<TemplateError>>,
    waker: AtomicWaker,
}

/// Requests destruction of a [`TemplateStream`] from outside the consumer.
///
/// The stream observes the request on its next poll and wakes itself so a
/// consumer parked on it gets to see it. Sources it holds are released on
/// that poll, or when the stream is dropped, not by the request itself.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    shared: Arc<AbortShared>,
}

impl AbortHandle {
    /// Destroy silently: the stream ends without an error.
    pub fn abort(&self) {
        self.request(None);
    }

    /// Destroy with an error surfaced to the consumer.
    pub fn abort_with(&self, error: TemplateError) {
        self.request(Some(error));
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }

    fn request(&self, error: Option<TemplateError>) {
        {
            let mut reason = self
                .shared
                .reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !self.shared.aborted.swap(true, Ordering::AcqRel) {
                *reason = error;
            }
        }
        self.shared.waker.wake();
    }
}

// ─── TemplateStream ───────────────────────────────────────────

/// The rendered byte stream of one template.
///
/// Yields `Ok(chunk)` in template order, at most one `Err`, then ends.
/// Dropping it drops every source it still holds.
pub struct TemplateStream {
    queue: WorkQueue,
    buffer: LiteralBuffer,
    phase: Phase,
    config: TemplateConfig,
    codec: Arc<dyn TextCodec>,
    abort: Arc<AbortShared>,
    emitted: usize,
    /// Every queued future is resolved and every queued sub-stream holds a
    /// look-ahead chunk or has finished. Cleared when entries are prepended.
    watch_settled: bool,
}

impl TemplateStream {
    pub(crate) fn new(queue: WorkQueue, config: TemplateConfig, codec: Arc<dyn TextCodec>) -> Self {
        Self {
            queue,
            buffer: LiteralBuffer::new(),
            phase: Phase::Idle,
            config,
            codec,
            abort: Arc::new(AbortShared::default()),
            emitted: 0,
            watch_settled: false,
        }
    }

    pub fn state(&self) -> DriverState {
        match self.phase {
            Phase::Idle => DriverState::Idle,
            Phase::Draining => DriverState::Draining,
            Phase::Awaiting(_) => DriverState::Awaiting,
            Phase::Pumping(_) => DriverState::Pumping,
            Phase::Ended => DriverState::Ended,
            Phase::Errored(_) => DriverState::Errored,
            Phase::Destroyed => DriverState::Destroyed,
        }
    }

    /// Chunks handed to the consumer so far.
    pub fn chunks_emitted(&self) -> usize {
        self.emitted
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            shared: Arc::clone(&self.abort),
        }
    }

    /// Tear the stream down, dropping every queued sub-stream and future
    /// whether or not it was ever reached.
    ///
    /// With an error, the next poll yields it and the stream then ends;
    /// without one the stream just ends. Only the first call has any effect.
    pub fn destroy(&mut self, error: Option<TemplateError>) {
        if matches!(
            self.phase,
            Phase::Ended | Phase::Errored(_) | Phase::Destroyed
        ) {
            if let Some(err) = error {
                warn!(error = %err, "failure after template stream closed, ignoring");
            }
            return;
        }

        let mut cascaded = self.queue.clear();
        if let Phase::Pumping(_) = std::mem::replace(&mut self.phase, Phase::Destroyed) {
            cascaded += 1;
        }
        self.buffer = LiteralBuffer::new();

        match error {
            Some(err) => {
                debug!(cascaded, error = %err, "template stream failed");
                self.phase = Phase::Errored(err);
            }
            None => debug!(cascaded, "template stream destroyed"),
        }
        self.abort.waker.wake();
    }

    /// Drain the whole stream into one buffer.
    pub async fn collect_bytes(mut self) -> Result<Bytes, TemplateError> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }

    fn check_abort(&mut self) {
        if !self.abort.aborted.load(Ordering::Acquire) {
            return;
        }
        let reason = self
            .abort
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.destroy(reason);
    }

    /// Drive futures and sub-streams the queue has not reached, so a failure
    /// surfaces even when it happens out of order.
    ///
    /// Settled entries stay settled until they are dequeued, so once a pass
    /// finds nothing left to drive the queue is not walked again until new
    /// entries are prepended.
    fn watch_pending(&mut self, cx: &mut Context<'_>) -> Option<TemplateError> {
        if self.watch_settled {
            return None;
        }
        let mut settled = true;
        for entry in self.queue.iter_mut() {
            match entry {
                Interpolation::Future(deferred) => {
                    if let Some(err) = deferred.poll_watch(cx) {
                        return Some(TemplateError::Rejected(err));
                    }
                    settled &= deferred.is_settled();
                }
                Interpolation::Stream(source) => {
                    if let Some(err) = source.poll_watch(cx) {
                        return Some(TemplateError::SubStream(err));
                    }
                    settled &= source.is_settled();
                }
                _ => {}
            }
        }
        self.watch_settled = settled;
        None
    }

    fn flush(&mut self) -> Result<Option<Bytes>, TemplateError> {
        self.buffer.flush(self.codec.as_ref(), self.config.encoding)
    }

    fn drain(&mut self) -> Step {
        loop {
            let Some(entry) = self.queue.dequeue() else {
                return match self.flush() {
                    Ok(Some(chunk)) => Step::Emit(chunk),
                    Ok(None) => Step::End,
                    Err(err) => Step::Fail(err),
                };
            };

            // Sub-streams, futures and unsupported entries end a literal run.
            let kind = entry.kind();
            let breaks_run =
                !kind.is_coalescable() && !matches!(kind, EntryKind::Empty | EntryKind::Sequence);
            if breaks_run && !self.buffer.is_empty() {
                self.queue.prepend_one(entry);
                return match self.flush() {
                    Ok(Some(chunk)) => Step::Emit(chunk),
                    Ok(None) => continue,
                    Err(err) => Step::Fail(err),
                };
            }

            match entry {
                Interpolation::Empty => {}
                Interpolation::Text(text) => self.buffer.push_text(text),
                Interpolation::Bytes(bytes) => self.buffer.push_bytes(bytes),
                Interpolation::Seq(items) => {
                    self.queue.prepend_sequence(items);
                    self.watch_settled = false;
                }
                Interpolation::Stream(source) => {
                    debug!(queued = self.queue.len(), "attaching sub-stream");
                    self.phase = Phase::Pumping(SubStreamPump::attach(source));
                    return Step::Suspend;
                }
                Interpolation::Future(deferred) => {
                    debug!(
                        resolved = deferred.is_resolved(),
                        queued = self.queue.len(),
                        "awaiting interpolated future"
                    );
                    self.phase = Phase::Awaiting(AsyncAwaiter::new(deferred));
                    return Step::Suspend;
                }
                Interpolation::Unsupported(desc) => {
                    return Step::Fail(TemplateError::UnsupportedEntry(desc));
                }
            }
        }
    }

    fn emit(&mut self, chunk: Bytes) -> Poll<Option<Result<Bytes, TemplateError>>> {
        self.emitted += 1;
        trace!(len = chunk.len(), chunk = self.emitted, "emitting chunk");
        Poll::Ready(Some(Ok(chunk)))
    }
}

impl Stream for TemplateStream {
    type Item = Result<Bytes, TemplateError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.abort.waker.register(cx.waker());
        this.check_abort();

        if this.config.watch_pending && !this.state().is_terminal() {
            if let Some(err) = this.watch_pending(cx) {
                this.destroy(Some(err));
            }
        }

        loop {
            match &mut this.phase {
                Phase::Idle => {
                    trace!(queued = this.queue.len(), "first pull");
                    this.phase = Phase::Draining;
                }
                Phase::Draining => match this.drain() {
                    Step::Emit(chunk) => return this.emit(chunk),
                    Step::Suspend => {}
                    Step::End => {
                        debug!(chunks = this.emitted, "template stream ended");
                        this.phase = Phase::Ended;
                    }
                    Step::Fail(err) => this.destroy(Some(err)),
                },
                Phase::Pumping(pump) => match pump.poll_relay(cx) {
                    Poll::Ready(Some(Ok(chunk))) => return this.emit(chunk),
                    Poll::Ready(Some(Err(err))) => this.destroy(Some(err)),
                    Poll::Ready(None) => {
                        debug!(relayed = pump.relayed(), "sub-stream ended, detaching");
                        this.phase = Phase::Draining;
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Awaiting(awaiter) => match awaiter.poll_resolve(cx) {
                    Poll::Ready(Ok(value)) => {
                        debug!(kind = %value.kind(), "interpolated future resolved");
                        this.queue.prepend_one(value);
                        this.watch_settled = false;
                        this.phase = Phase::Draining;
                    }
                    Poll::Ready(Err(err)) => this.destroy(Some(err)),
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Errored(_) => {
                    if let Phase::Errored(err) = std::mem::replace(&mut this.phase, Phase::Destroyed) {
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Phase::Ended | Phase::Destroyed => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for TemplateStream {
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Ended | Phase::Destroyed)
    }
}

impl Drop for TemplateStream {
    fn drop(&mut self) {
        if !self.state().is_terminal() {
            let cascaded = self.queue.clear() + usize::from(matches!(self.phase, Phase::Pumping(_)));
            debug!(cascaded, "template stream dropped before completion");
        }
    }
}

impl std::fmt::Debug for TemplateStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStream")
            .field("state", &self.state())
            .field("queued", &self.queue.len())
            .field("buffered", &self.buffer.len())
            .field("emitted", &self.emitted)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
