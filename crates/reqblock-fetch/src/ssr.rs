//! Server-render registration.
//!
//! While rendering on a server, each request block reports the observable it
//! loaded from to an [`SsrRegistry`]. Failed requests are not reported. A driver renders the tree, awaits
//! whatever was registered, and renders again until a pass registers nothing
//! new. [`RenderPromises`] is the reference registry and
//! [`render_to_fixed_point`] the reference driver.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use reqblock_cache::Placeholder;

use crate::SsrError;

/// Identity of one request block instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Use a known id, e.g. to address the same logical block across passes.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block-{}", self.0)
    }
}

/// What a registry knows about one instance.
#[derive(Debug, Clone, Default)]
pub struct InstanceInfo {
    /// The instance rendered in an earlier pass.
    pub seen: bool,
    /// The most recent observable the instance registered.
    pub observable: Option<Placeholder>,
}

/// Output of a render through a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSlot<R> {
    /// The instance rendered.
    Ready(R),
    /// The instance is waiting on an observable; render again after it settles.
    Pending,
}

impl<R> RenderSlot<R> {
    /// Check if the slot is still waiting.
    pub fn is_pending(&self) -> bool {
        matches!(self, RenderSlot::Pending)
    }

    /// Get the rendered output, if any.
    pub fn into_ready(self) -> Option<R> {
        match self {
            RenderSlot::Ready(output) => Some(output),
            RenderSlot::Pending => None,
        }
    }

    /// Transform the rendered output.
    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> RenderSlot<U> {
        match self {
            RenderSlot::Ready(output) => RenderSlot::Ready(f(output)),
            RenderSlot::Pending => RenderSlot::Pending,
        }
    }
}

/// Sink for in-flight observables during server rendering.
pub trait SsrRegistry: Send + Sync {
    /// Report the observable `id` is waiting on.
    ///
    /// Registering again while an earlier observable for `id` is still in
    /// flight has no effect.
    fn register_ssr_observable(&self, id: InstanceId, observable: Placeholder);

    /// Record that `id` is rendering and return what was known before.
    fn visit(&self, id: InstanceId) -> InstanceInfo;
}

impl dyn SsrRegistry + '_ {
    /// Render `id` through the registry.
    ///
    /// `finish` runs unless the instance's observable is still in flight.
    pub fn add_promise<R>(&self, id: InstanceId, finish: impl FnOnce() -> R) -> RenderSlot<R> {
        match self.visit(id).observable {
            Some(observable) if !observable.is_settled() => RenderSlot::Pending,
            _ => RenderSlot::Ready(finish()),
        }
    }
}

#[derive(Debug, Default)]
struct Promises {
    infos: HashMap<InstanceId, InstanceInfo>,
    queue: Vec<Placeholder>,
}

/// Reference [`SsrRegistry`] used by [`render_to_fixed_point`].
#[derive(Debug, Default)]
pub struct RenderPromises {
    state: Mutex<Promises>,
}

impl RenderPromises {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if observables were registered since the last
    /// [`consume_and_await`](Self::consume_and_await).
    pub fn has_promises(&self) -> bool {
        !self.lock().queue.is_empty()
    }

    /// Await every observable registered since the last call.
    ///
    /// Failures are left for the blocks themselves to report. Returns how
    /// many observables were awaited.
    pub async fn consume_and_await(&self) -> usize {
        let queue = std::mem::take(&mut self.lock().queue);
        let count = queue.len();
        tracing::debug!(count, "awaiting registered observables");
        futures::future::join_all(queue).await;
        count
    }

    /// The observable registered for `id`.
    pub fn get_ssr_observable(&self, id: InstanceId) -> Option<Placeholder> {
        self.lock().infos.get(&id).and_then(|info| info.observable.clone())
    }

    /// What the registry knows about `id`, without marking it seen.
    pub fn lookup_info(&self, id: InstanceId) -> InstanceInfo {
        self.lock().infos.get(&id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Promises> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SsrRegistry for RenderPromises {
    fn register_ssr_observable(&self, id: InstanceId, observable: Placeholder) {
        let mut state = self.lock();
        let info = state.infos.entry(id).or_default();
        if info.observable.as_ref().is_some_and(|current| !current.is_settled()) {
            return;
        }
        tracing::debug!(instance = %id, "registered ssr observable");
        info.observable = Some(observable.clone());
        state.queue.push(observable);
    }

    fn visit(&self, id: InstanceId) -> InstanceInfo {
        let mut state = self.lock();
        let info = state.infos.entry(id).or_default();
        let before = info.clone();
        info.seen = true;
        before
    }
}

/// Render until a pass registers no new observables.
///
/// `pass` receives the zero-based pass number. The output of the first pass
/// that leaves nothing to await is returned.
pub async fn render_to_fixed_point<F, Fut, R>(
    registry: &RenderPromises,
    max_passes: usize,
    mut pass: F,
) -> Result<R, SsrError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = R>,
{
    for number in 0..max_passes {
        let output = pass(number).await;
        if !registry.has_promises() {
            tracing::debug!(passes = number + 1, "render settled");
            return Ok(output);
        }
        registry.consume_and_await().await;
    }
    Err(SsrError::PassLimit(max_passes))
}
