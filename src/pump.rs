//! Sub-stream pump
//!
//! Relays one attached sub-stream into the output, one chunk per pull.

use std::task::{Context, Poll};

use bytes::Bytes;

use crate::entry::Source;
use crate::error::TemplateError;

/// Lifecycle of an attached sub-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Attached, waiting for the sub-stream to produce.
    Attached,
    /// A look-ahead chunk is ready to relay.
    HasData,
    /// A chunk was handed to the consumer; waiting for the next pull.
    Draining,
    /// The sub-stream finished or failed.
    Ended,
}

#[derive(Debug)]
pub struct SubStreamPump {
    source: Source,
    state: PumpState,
    relayed: usize,
}

impl SubStreamPump {
    pub fn attach(source: Source) -> Self {
        let state = if source.has_lookahead() {
            PumpState::HasData
        } else if source.is_finished() {
            PumpState::Ended
        } else {
            PumpState::Attached
        };
        Self {
            source,
            state,
            relayed: 0,
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Chunks relayed so far.
    pub fn relayed(&self) -> usize {
        self.relayed
    }

    /// Relay the next chunk. `Ready(None)` means the sub-stream ended and the
    /// pump should be detached.
    pub fn poll_relay(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, TemplateError>>> {
        loop {
            match self.source.poll_chunk(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    self.state = PumpState::Draining;
                    self.relayed += 1;
                    return Poll::Ready(Some(Ok(chunk)));
                }
                Poll::Ready(Some(Err(err))) => {
                    self.state = PumpState::Ended;
                    return Poll::Ready(Some(Err(TemplateError::SubStream(err))));
                }
                Poll::Ready(None) => {
                    self.state = PumpState::Ended;
                    return Poll::Ready(None);
                }
                Poll::Pending => {
                    self.state = PumpState::Attached;
                    return Poll::Pending;
                }
            }
        }
    }
}
