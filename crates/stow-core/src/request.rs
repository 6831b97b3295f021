//! One-shot engine requests
//!
//! Storage engines report completion through callbacks (`onsuccess` / `onerror`).
//! A [`Responder`] is handed to the callback side and a [`Request`] future to the
//! caller. The responder is consumed by settling, so a request resolves or
//! rejects exactly once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::engine::{EngineError, EngineResult};

/// Create a pending request and the responder that settles it.
pub fn request<T>() -> (Responder<T>, Request<T>) {
    let (tx, rx) = oneshot::channel();
    (Responder { tx }, Request { rx })
}

/// Settling side of a request, owned by the engine callback.
#[derive(Debug)]
pub struct Responder<T> {
    tx: oneshot::Sender<EngineResult<T>>,
}

impl<T> Responder<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, error: EngineError) {
        self.settle(Err(error));
    }

    pub fn settle(self, result: EngineResult<T>) {
        if self.tx.send(result).is_err() {
            debug!("request settled after its future was dropped");
        }
    }
}

/// Future side of a request: pending until the engine settles it.
///
/// Resolves to `Err` with [`EngineErrorKind::AbortError`](crate::EngineErrorKind)
/// if the responder is dropped without settling.
#[derive(Debug)]
#[must_use = "requests do nothing unless awaited"]
pub struct Request<T> {
    rx: oneshot::Receiver<EngineResult<T>>,
}

impl<T> Request<T> {
    /// A request that is already settled, for failures the engine raises synchronously.
    pub fn ready(result: EngineResult<T>) -> Self {
        let (responder, request) = request();
        responder.settle(result);
        request
    }
}

impl<T> Future for Request<T> {
    type Output = EngineResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(EngineError::abort(
                "request dropped before completion",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
