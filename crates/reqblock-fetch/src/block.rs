//! The request block: one consumer's fetch lifecycle.
//!
//! A block moves through [`Phase`]s as it is activated:
//!
//! ```text
//! Idle ──(settled cache entry at construction)──────────────▶ Success
//!   │
//!   └─activate─▶ Validating ──(no context / no url)──────────▶ Error
//!                    │
//!                    └─▶ Loading ──(skip / cache / network)──▶ Success | Error
//! ```
//!
//! Blocks sharing a context share its cache. On a client store the first
//! block to miss writes an in-flight [`Placeholder`] before it suspends, so a
//! block activated afterwards with the same fingerprint awaits that request
//! instead of sending its own.

use std::fmt;
use std::sync::Arc;

use reqblock_cache::{CacheEntry, Placeholder, SharedResult};
use reqblock_core::{effective_options, Ambient, Fingerprint, Graph};
use reqblock_data::{resolve_url, FetchError, Fetcher};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{BlockError, InstanceId, RenderSlot, RequestBlockContext};

/// Turns the cached graph into the data a block exposes.
pub type Parser<T> = Arc<dyn Fn(&Arc<Graph>, &BlockParams) -> T + Send + Sync>;

/// Observes a block's state at a lifecycle event.
pub type Callback<T> = Arc<dyn Fn(&ConsumerState<T>) + Send + Sync>;

/// What a block requests.
///
/// Compared structurally: [`RequestBlock::reconfigure`] with equal params
/// does nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockParams {
    /// Location of the resource, absolute or relative to the context origin.
    pub url: String,
    /// Request options, merged over the context's default options.
    pub options: Option<JsonValue>,
    /// Settle with no data and no request.
    pub skip: bool,
    /// Use `options` alone, without the context's defaults.
    pub ignore_context_options: bool,
}

impl BlockParams {
    /// Request `url` with no options.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the request options.
    pub fn with_options(mut self, options: JsonValue) -> Self {
        self.options = Some(options);
        self
    }

    /// Set whether the request is skipped.
    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Set whether context options are ignored.
    pub fn ignore_context_options(mut self, ignore: bool) -> Self {
        self.ignore_context_options = ignore;
        self
    }
}

/// Pluggable behaviour of a block.
pub struct BlockHooks<T> {
    pub parser: Parser<T>,
    pub on_load: Callback<T>,
    pub on_error: Callback<T>,
    pub on_request: Callback<T>,
}

fn noop<T: 'static>() -> Callback<T> {
    Arc::new(|_: &ConsumerState<T>| {})
}

impl<T: 'static> BlockHooks<T> {
    /// Hooks with a custom parser and no-op callbacks.
    pub fn with_parser(
        parser: impl Fn(&Arc<Graph>, &BlockParams) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            parser: Arc::new(parser),
            on_load: noop(),
            on_error: noop(),
            on_request: noop(),
        }
    }

    /// Called when the block settles successfully.
    pub fn on_load(mut self, f: impl Fn(&ConsumerState<T>) + Send + Sync + 'static) -> Self {
        self.on_load = Arc::new(f);
        self
    }

    /// Called when the block settles with an error.
    pub fn on_error(mut self, f: impl Fn(&ConsumerState<T>) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(f);
        self
    }

    /// Called once per activation when loading starts.
    pub fn on_request(mut self, f: impl Fn(&ConsumerState<T>) + Send + Sync + 'static) -> Self {
        self.on_request = Arc::new(f);
        self
    }
}

impl Default for BlockHooks<Arc<Graph>> {
    fn default() -> Self {
        Self::with_parser(|graph, _| Arc::clone(graph))
    }
}

impl<T> Clone for BlockHooks<T> {
    fn clone(&self) -> Self {
        Self {
            parser: Arc::clone(&self.parser),
            on_load: Arc::clone(&self.on_load),
            on_error: Arc::clone(&self.on_error),
            on_request: Arc::clone(&self.on_request),
        }
    }
}

impl<T> fmt::Debug for BlockHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHooks").finish_non_exhaustive()
    }
}

/// The state a block exposes to its callbacks and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerState<T> {
    pub fetched: bool,
    pub loading: bool,
    pub data: Option<T>,
    pub error: Option<BlockError>,
}

impl<T> Default for ConsumerState<T> {
    fn default() -> Self {
        Self {
            fetched: false,
            loading: false,
            data: None,
            error: None,
        }
    }
}

/// Lifecycle phase of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not yet activated.
    Idle,
    /// Checking preconditions.
    Validating,
    /// Waiting on the cache or the network.
    Loading,
    /// Settled with data (or deliberately none).
    Success,
    /// Settled with an error.
    Error,
}

/// One consumer of a request.
pub struct RequestBlock<T = Arc<Graph>> {
    id: InstanceId,
    params: BlockParams,
    hooks: BlockHooks<T>,
    context: Option<Arc<RequestBlockContext>>,
    state: ConsumerState<T>,
    phase: Phase,
}

impl<T> RequestBlock<T> {
    /// Create a block with a fresh instance id.
    ///
    /// A settled cache entry for the block's fingerprint is adopted right
    /// away: the block starts in [`Phase::Success`] and `on_load` fires.
    pub fn new(
        params: BlockParams,
        hooks: BlockHooks<T>,
        context: Option<Arc<RequestBlockContext>>,
    ) -> Self {
        Self::with_id(InstanceId::next(), params, hooks, context)
    }

    /// Create a block with a known instance id.
    pub fn with_id(
        id: InstanceId,
        params: BlockParams,
        hooks: BlockHooks<T>,
        context: Option<Arc<RequestBlockContext>>,
    ) -> Self {
        let mut block = Self {
            id,
            params,
            hooks,
            context,
            state: ConsumerState::default(),
            phase: Phase::Idle,
        };

        if let Some(data) = block.check_cache() {
            block.state.data = Some(data);
            block.state.fetched = true;
            block.phase = Phase::Success;
            (block.hooks.on_load)(&block.state);
        }
        block
    }

    /// Current state.
    pub fn state(&self) -> &ConsumerState<T> {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current params.
    pub fn params(&self) -> &BlockParams {
        &self.params
    }

    /// Instance id.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The block's current fingerprint, or `None` without a context.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        reqblock_core::fingerprint(
            &self.params.url,
            self.params.options.as_ref(),
            self.ambient(),
            self.params.ignore_context_options,
        )
    }

    /// Mount the block: run one activation unless it already has a result.
    pub async fn activate(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }
        self.request_data().await;
    }

    /// Replace the params and run a fresh activation if they changed.
    pub async fn reconfigure(&mut self, params: BlockParams) {
        if params == self.params {
            return;
        }
        tracing::debug!(instance = %self.id, url = %params.url, "request block params changed");
        self.params = params;
        self.state.fetched = false;
        self.request_data().await;
    }

    /// Render `children` with the current state.
    ///
    /// With a server-render registry in the context the render goes through
    /// it and may come back [`RenderSlot::Pending`].
    pub fn render<R>(&self, children: impl FnOnce(&ConsumerState<T>) -> R) -> RenderSlot<R> {
        let finish = || children(&self.state);
        match self.context.as_ref().and_then(|c| c.render_promises.as_ref()) {
            Some(registry) => registry.add_promise(self.id, finish),
            None => RenderSlot::Ready(finish()),
        }
    }

    fn ambient(&self) -> Ambient<'_> {
        match &self.context {
            Some(context) => Ambient::Present(context.options.as_ref()),
            None => Ambient::Absent,
        }
    }

    fn check_cache(&self) -> Option<T> {
        if self.params.skip {
            return None;
        }
        let context = self.context.as_ref()?;
        let key = self.fingerprint()?;
        let graph = context.cache.read(key.as_str())?.as_settled().cloned()?;
        tracing::debug!(instance = %self.id, fingerprint = %key, "cache hit at construction");
        Some((self.hooks.parser)(&graph, &self.params))
    }

    fn validate(&self) -> Result<Arc<RequestBlockContext>, BlockError> {
        let context = self.context.clone().ok_or(BlockError::MissingContext)?;
        if self.params.url.is_empty() {
            return Err(BlockError::MissingUrl);
        }
        Ok(context)
    }

    async fn request_data(&mut self) {
        self.phase = Phase::Validating;
        let context = match self.validate() {
            Ok(context) => context,
            Err(error) => {
                tracing::warn!(instance = %self.id, error = %error, "request block precondition failed");
                self.settle_error(error);
                return;
            }
        };

        self.phase = Phase::Loading;
        self.state.error = None;
        self.state.loading = true;
        (self.hooks.on_request)(&self.state);

        match self.fetch_data(&context).await {
            Ok(graph) => {
                self.state.data = graph.map(|graph| (self.hooks.parser)(&graph, &self.params));
                self.state.fetched = true;
                self.state.loading = false;
                self.phase = Phase::Success;
                (self.hooks.on_load)(&self.state);
            }
            Err(error) => self.settle_error(BlockError::Fetch(error)),
        }
    }

    fn settle_error(&mut self, error: BlockError) {
        self.state.error = Some(error);
        self.state.fetched = true;
        self.state.loading = false;
        self.phase = Phase::Error;
        (self.hooks.on_error)(&self.state);
    }

    async fn fetch_data(
        &self,
        context: &Arc<RequestBlockContext>,
    ) -> Result<Option<Arc<Graph>>, FetchError> {
        if self.params.skip {
            return Ok(None);
        }

        let options = effective_options(
            self.params.options.as_ref(),
            Ambient::Present(context.options.as_ref()),
            self.params.ignore_context_options,
        );
        let key = Fingerprint::compute(&self.params.url, options.as_ref());
        let cache = &context.cache;

        let observable = match cache.read(key.as_str()) {
            Some(CacheEntry::Settled(graph)) => {
                tracing::debug!(instance = %self.id, fingerprint = %key, "cache hit");
                return Ok(Some(graph));
            }
            Some(CacheEntry::Pending(placeholder)) => {
                tracing::debug!(instance = %self.id, fingerprint = %key, "joining in-flight request");
                placeholder
            }
            None => {
                let url = resolve_url(&self.params.url, context.origin.as_deref());
                tracing::debug!(instance = %self.id, fingerprint = %key, url = %url, "cache miss");
                let placeholder = Placeholder::new(perform(
                    Arc::clone(&context.fetcher),
                    Arc::clone(cache),
                    key.clone(),
                    url,
                    options,
                ));
                if !cache.server_mode() {
                    cache.write(key.as_str(), placeholder.clone());
                }
                placeholder
            }
        };

        let result = observable.clone().await;

        // Failed requests are never registered.
        if let (Ok(_), Some(registry)) = (&result, &context.render_promises) {
            registry.register_ssr_observable(self.id, observable);
        }

        result.map(Some)
    }
}

async fn perform(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<reqblock_cache::CacheStore>,
    key: Fingerprint,
    url: String,
    options: Option<JsonValue>,
) -> SharedResult {
    let response = fetcher.perform_request(&url, options.as_ref()).await?;
    let graph = Arc::new(response.graph()?);
    cache.write(key.into_string(), Arc::clone(&graph));
    Ok(graph)
}

impl<T: fmt::Debug> fmt::Debug for RequestBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBlock")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
