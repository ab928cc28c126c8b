//! The network capability request blocks fetch through.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::{FetchError, Response};

/// Performs a single request.
///
/// `options` are the effective request options (ambient options merged with
/// the block's own) or `None` when neither side set any. Implementations
/// decide which fields they understand.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Send a request to `url` and return the complete response.
    async fn perform_request(
        &self,
        url: &str,
        options: Option<&JsonValue>,
    ) -> Result<Response, FetchError>;
}

enum Route {
    Respond(Response),
    Fail(FetchError),
}

/// In-memory fetcher serving canned responses (for development/testing).
///
/// Unknown URLs fail with a 404 [`FetchError::Http`]. Every call is counted
/// and recorded so callers can assert how many requests were really made.
#[derive(Default)]
pub struct StaticFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
    calls: AtomicUsize,
    yielding: bool,
}

impl StaticFetcher {
    /// Create a fetcher with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` as JSON with status 200 for `url`.
    pub fn with_json(self, url: impl Into<String>, body: JsonValue) -> Self {
        self.with_response(url, Response::json_body(200, &body))
    }

    /// Serve a prepared response for `url`.
    pub fn with_response(self, url: impl Into<String>, response: Response) -> Self {
        self.lock_routes().insert(url.into(), Route::Respond(response));
        self
    }

    /// Fail every request to `url` with `error`.
    pub fn with_failure(self, url: impl Into<String>, error: FetchError) -> Self {
        self.lock_routes().insert(url.into(), Route::Fail(error));
        self
    }

    /// Suspend once inside every request before answering, so concurrent
    /// callers interleave the way they would on a real network.
    pub fn yielding(mut self) -> Self {
        self.yielding = true;
        self
    }

    /// Number of requests performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in call order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_routes(&self) -> std::sync::MutexGuard<'_, HashMap<String, Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, url: &str) -> Result<Response, FetchError> {
        match self.lock_routes().get(url) {
            Some(Route::Respond(response)) => Ok(response.clone()),
            Some(Route::Fail(error)) => Err(error.clone()),
            None => Err(FetchError::Http {
                status: 404,
                message: format!("no route for {}", url),
            }),
        }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn perform_request(
        &self,
        url: &str,
        _options: Option<&JsonValue>,
    ) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        tracing::trace!(url, "static fetch");

        if self.yielding {
            YieldOnce::default().await;
        }

        self.answer(url)
    }
}

/// Returns `Pending` once, waking itself, then completes.
#[derive(Default)]
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
