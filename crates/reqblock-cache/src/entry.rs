//! Cache entries and in-flight placeholders.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqblock_core::Graph;
use reqblock_data::FetchError;

/// Outcome of a request shared by everyone waiting on it.
pub type SharedResult = Result<Arc<Graph>, FetchError>;

/// An in-flight request that any number of consumers can await.
///
/// Cloning is cheap and every clone resolves to the same result; the
/// underlying work runs once no matter how many clones are polled.
#[derive(Clone)]
pub struct Placeholder {
    inner: Shared<BoxFuture<'static, SharedResult>>,
}

impl Placeholder {
    /// Wrap a request future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = SharedResult> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// A placeholder that is already resolved.
    pub fn ready(result: SharedResult) -> Self {
        Self::new(futures::future::ready(result))
    }

    /// The result, if the request has completed.
    pub fn peek(&self) -> Option<&SharedResult> {
        self.inner.peek()
    }

    /// Check if the request has completed.
    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }
}

impl Future for Placeholder {
    type Output = SharedResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.peek() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Placeholder").field("state", &state).finish()
    }
}

/// A value stored under a fingerprint.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// A settled value.
    Settled(Arc<Graph>),
    /// A request still in flight (client-side stores only).
    Pending(Placeholder),
}

impl CacheEntry {
    /// Create a settled entry.
    pub fn settled(graph: impl Into<Arc<Graph>>) -> Self {
        CacheEntry::Settled(graph.into())
    }

    /// Get the settled value, if any.
    pub fn as_settled(&self) -> Option<&Arc<Graph>> {
        match self {
            CacheEntry::Settled(graph) => Some(graph),
            CacheEntry::Pending(_) => None,
        }
    }

    /// Check if this is an in-flight placeholder.
    pub fn is_pending(&self) -> bool {
        matches!(self, CacheEntry::Pending(_))
    }
}

impl From<Graph> for CacheEntry {
    fn from(graph: Graph) -> Self {
        CacheEntry::Settled(Arc::new(graph))
    }
}

impl From<Arc<Graph>> for CacheEntry {
    fn from(graph: Arc<Graph>) -> Self {
        CacheEntry::Settled(graph)
    }
}

impl From<Placeholder> for CacheEntry {
    fn from(placeholder: Placeholder) -> Self {
        CacheEntry::Pending(placeholder)
    }
}
