//! Async awaiter
//!
//! Holds the single future the driver is suspended on.

use std::task::{Context, Poll};

use crate::entry::{Deferred, Interpolation};
use crate::error::TemplateError;

#[derive(Debug)]
pub struct AsyncAwaiter {
    deferred: Deferred,
}

impl AsyncAwaiter {
    pub fn new(deferred: Deferred) -> Self {
        Self { deferred }
    }

    /// Resolve to the interpolation the future produced, or its failure.
    pub fn poll_resolve(&mut self, cx: &mut Context<'_>) -> Poll<Result<Interpolation, TemplateError>> {
        self.deferred
            .poll_take(cx)
            .map(|res| res.map_err(TemplateError::Rejected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::task::noop_waker_ref;
    use futures::FutureExt;

    #[test]
    fn waits_until_resolved() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let (tx, rx) = oneshot::channel::<&'static str>();
        let mut awaiter = AsyncAwaiter::new(Deferred::new(rx.map(|r| r.map_err(anyhow::Error::from))));

        assert!(awaiter.poll_resolve(&mut cx).is_pending());
        tx.send("d").unwrap();

        match awaiter.poll_resolve(&mut cx) {
            Poll::Ready(Ok(Interpolation::Text(text))) => assert_eq!(text, "d"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejection_is_wrapped() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut awaiter = AsyncAwaiter::new(Deferred::new(async {
            Err::<(), _>(anyhow::anyhow!("destroyed"))
        }));
        match awaiter.poll_resolve(&mut cx) {
            Poll::Ready(Err(TemplateError::Rejected(err))) => assert_eq!(err.to_string(), "destroyed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn already_resolved() {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut awaiter = AsyncAwaiter::new(Deferred::resolved(vec![1u8, 2, 3]));
        assert!(matches!(
            awaiter.poll_resolve(&mut cx),
            Poll::Ready(Ok(Interpolation::Bytes(_)))
        ));
    }
}
