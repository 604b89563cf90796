use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::task::AtomicWaker;

/// A shared pause/resume switch in front of a byte source.
///
/// Cloning a `Gate` yields another handle to the same switch, so the party that owns
/// the stream and the party that decides when bytes may be pulled can be different.
/// Only one task waits on a gate at a time: the one reading the stream.
#[derive(Debug, Clone)]
pub struct Gate {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    paused: AtomicBool,
    waker: AtomicWaker,
}

impl Gate {
    pub fn new(paused: bool) -> Self {
        Self { inner: Arc::new(Inner { paused: AtomicBool::new(paused), waker: AtomicWaker::new() }) }
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Release);
    }

    /// Lets the waiting reader, if any, pull from the source again.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Release);
        self.inner.waker.wake();
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    /// Ready once the gate is open, otherwise registers the task to be woken by [`Gate::resume`].
    pub fn poll_resumed(&self, cx: &mut Context<'_>) -> Poll<()> {
        if !self.is_paused() {
            return Poll::Ready(());
        }

        self.inner.waker.register(cx.waker());

        // re-check, resume may have raced with the registration
        if self.is_paused() { Poll::Pending } else { Poll::Ready(()) }
    }
}
