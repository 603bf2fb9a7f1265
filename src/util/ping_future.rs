//! A future completed from a callback, such as the one of `BufferSlice::map_async`.
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

pub struct Ping<T> {
    complete: Arc<Mutex<Shared<T>>>,
}

/// The completing half, moved into the callback.
pub struct PingWaker<T> {
    complete: Arc<Mutex<Shared<T>>>,
}

struct Shared<T> {
    done: Option<T>,
    waker: Option<Waker>,
}

impl<T> Ping<T> {
    pub fn new() -> (Self, PingWaker<T>) {
        let complete = Arc::new(Mutex::new(Shared {
            done: None,
            waker: None,
        }));

        let ping = Ping {
            complete: Arc::clone(&complete),
        };

        let waker = PingWaker { complete };
        (ping, waker)
    }
}

impl<T> PingWaker<T> {
    pub fn complete(self, value: T) {
        let mut lock = match self.complete.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };

        lock.done = Some(value);
        if let Some(w) = lock.waker.take() {
            w.wake();
        }
    }
}

impl<T> Future for Ping<T> {
    type Output = T;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut lock = match self.complete.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(value) = lock.done.take() {
            return Poll::Ready(value);
        }

        lock.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}
