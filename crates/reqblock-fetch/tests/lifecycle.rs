//! Lifecycle tests: construction, activation, reconfiguration and failure.

mod common;

use std::sync::Arc;

use common::{data_json, Event, Recorder};
use reqblock_cache::CacheStore;
use reqblock_core::{Fingerprint, Graph, Value};
use reqblock_data::{FetchError, StaticFetcher};
use reqblock_fetch::{BlockError, BlockParams, Phase, RequestBlock, RequestBlockProvider};
use serde_json::json;

#[tokio::test]
async fn test_cache_hit_at_construction_skips_network() {
    let fetcher = Arc::new(StaticFetcher::new().with_json("/a", json!({"from": "network"})));
    let cache = Arc::new(CacheStore::new());
    cache.write(
        Fingerprint::compute("/a", None).into_string(),
        Graph::from_json(&json!({"from": "cache"})),
    );
    let context = RequestBlockProvider::new(fetcher.clone()).with_cache(cache).build();
    let recorder = Recorder::new();

    let mut block = RequestBlock::new(BlockParams::new("/a"), recorder.hooks(), Some(context));

    assert_eq!(block.phase(), Phase::Success);
    assert!(block.state().fetched);
    assert_eq!(data_json(block.state()), Some(json!({"from": "cache"})));
    assert_eq!(recorder.events(), vec![Event::Load]);

    block.activate().await;

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(recorder.events(), vec![Event::Load]);
}

#[tokio::test]
async fn test_activation_fetches_and_caches() {
    let fetcher = Arc::new(StaticFetcher::new().with_json("/a", json!({"id": 1})));
    let context = RequestBlockProvider::new(fetcher.clone()).build();
    let recorder = Recorder::new();

    let mut block = RequestBlock::new(BlockParams::new("/a"), recorder.hooks(), Some(Arc::clone(&context)));
    assert_eq!(block.phase(), Phase::Idle);

    block.activate().await;

    assert_eq!(block.phase(), Phase::Success);
    assert_eq!(recorder.events(), vec![Event::Request, Event::Load]);
    assert_eq!(data_json(block.state()), Some(json!({"id": 1})));
    assert!(block.state().fetched);
    assert!(!block.state().loading);
    assert!(block.state().error.is_none());

    let key = block.fingerprint().unwrap();
    assert!(context.cache.read(key.as_str()).unwrap().as_settled().is_some());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_on_request_sees_loading_state() {
    let context = RequestBlockProvider::new(Arc::new(StaticFetcher::new().with_json("/a", json!(1)))).build();
    let recorder = Recorder::new();

    let mut block = RequestBlock::new(BlockParams::new("/a"), recorder.hooks(), Some(context));
    block.activate().await;

    let states = recorder.states();
    assert!(states[0].loading);
    assert!(!states[0].fetched);
    assert!(states[0].data.is_none());
    assert!(!states[1].loading);
    assert!(states[1].fetched);
}

#[tokio::test]
async fn test_skip_resolves_without_data() {
    let fetcher = Arc::new(StaticFetcher::new().with_json("/a", json!({"id": 1})));
    let context = RequestBlockProvider::new(fetcher.clone()).build();
    let recorder = Recorder::new();

    let mut block = RequestBlock::new(
        BlockParams::new("/a").skip(true),
        recorder.hooks(),
        Some(Arc::clone(&context)),
    );
    block.activate().await;

    assert_eq!(block.phase(), Phase::Success);
    assert!(block.state().data.is_none());
    assert!(block.state().fetched);
    assert_eq!(recorder.events(), vec![Event::Request, Event::Load]);
    assert_eq!(fetcher.calls(), 0);
    assert!(context.cache.is_empty());
}

#[test]
fn test_skip_ignores_cached_value() {
    let cache = Arc::new(CacheStore::new());
    cache.write(Fingerprint::compute("/a", None).into_string(), Graph::from_json(&json!(1)));
    let context = RequestBlockProvider::new(Arc::new(StaticFetcher::new()))
        .with_cache(cache)
        .build();

    let block: RequestBlock = RequestBlock::new(
        BlockParams::new("/a").skip(true),
        Default::default(),
        Some(context),
    );

    assert_eq!(block.phase(), Phase::Idle);
    assert!(block.state().data.is_none());
}

#[tokio::test]
async fn test_reconfigure_reruns_once_per_change() {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_json("/a", json!("a"))
            .with_json("/b", json!("b")),
    );
    let context = RequestBlockProvider::new(fetcher.clone()).build();
    let recorder = Recorder::new();

    let mut block = RequestBlock::new(BlockParams::new("/a"), recorder.hooks(), Some(context));
    block.activate().await;
    block.reconfigure(BlockParams::new("/b")).await;

    assert_eq!(fetcher.requests(), vec!["/a".to_string(), "/b".to_string()]);
    assert_eq!(data_json(block.state()), Some(json!("b")));
    assert_eq!(
        recorder.events(),
        vec![Event::Request, Event::Load, Event::Request, Event::Load]
    );

    block.reconfigure(BlockParams::new("/b")).await;

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(recorder.events().len(), 4);
}

#[tokio::test]
async fn test_reconfigure_back_uses_cache() {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_json("/a", json!("a"))
            .with_json("/b", json!("b")),
    );
    let context = RequestBlockProvider::new(fetcher.clone()).build();
    let recorder = Recorder::new();

    let mut block = RequestBlock::new(BlockParams::new("/a"), recorder.hooks(), Some(context));
    block.activate().await;
    block.reconfigure(BlockParams::new("/b")).await;
    block.reconfigure(BlockParams::new("/a")).await;

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(data_json(block.state()), Some(json!("a")));
    assert_eq!(recorder.events(), [Event::Request, Event::Load].repeat(3));
}

#[tokio::test]
async fn test_activation_served_from_cache_fires_on_request() {
    let fetcher = Arc::new(StaticFetcher::new().with_json("/a", json!("a")));
    let context = RequestBlockProvider::new(fetcher.clone()).build();
    let (first, second) = (Recorder::new(), Recorder::new());

    let mut early = RequestBlock::new(BlockParams::new("/a"), first.hooks(), Some(Arc::clone(&context)));
    let mut late = RequestBlock::new(BlockParams::new("/a"), second.hooks(), Some(context));
    assert_eq!(late.phase(), Phase::Idle);

    early.activate().await;
    late.activate().await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(first.events(), vec![Event::Request, Event::Load]);
    assert_eq!(second.events(), vec![Event::Request, Event::Load]);

    let states = second.states();
    assert!(states[0].loading);
    assert!(!states[1].loading);
    assert_eq!(data_json(&states[1]), Some(json!("a")));
}

#[tokio::test]
async fn test_missing_context_reports_error() {
    let recorder = Recorder::new();
    let mut block = RequestBlock::new(BlockParams::new("/a"), recorder.hooks(), None);

    block.activate().await;

    assert_eq!(block.phase(), Phase::Error);
    assert_eq!(recorder.events(), vec![Event::Error]);

    let state = recorder.last_state().unwrap();
    assert_eq!(state.error, Some(BlockError::MissingContext));
    assert!(state.fetched);
    assert!(!state.loading);
    assert!(state.data.is_none());
}

#[tokio::test]
async fn test_network_failure_reports_error() {
    let fetcher = Arc::new(StaticFetcher::new().with_failure("/a", FetchError::Timeout));
    let context = RequestBlockProvider::new(fetcher.clone()).build();
    let recorder = Recorder::new();

    let mut block = RequestBlock::new(BlockParams::new("/a"), recorder.hooks(), Some(Arc::clone(&context)));
    block.activate().await;

    assert_eq!(block.phase(), Phase::Error);
    assert_eq!(recorder.events(), vec![Event::Request, Event::Error]);
    assert_eq!(
        block.state().error,
        Some(BlockError::Fetch(FetchError::Timeout))
    );

    // The failed request stays cached and is not retried.
    let mut second: RequestBlock = RequestBlock::new(BlockParams::new("/a"), Default::default(), Some(context));
    second.activate().await;

    assert_eq!(second.phase(), Phase::Error);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_failure_keeps_previous_data() {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_json("/a", json!("a"))
            .with_failure("/broken", FetchError::Request("connection reset".into())),
    );
    let context = RequestBlockProvider::new(fetcher).build();

    let mut block: RequestBlock = RequestBlock::new(BlockParams::new("/a"), Default::default(), Some(context));
    block.activate().await;
    block.reconfigure(BlockParams::new("/broken")).await;

    assert_eq!(block.phase(), Phase::Error);
    assert_eq!(data_json(block.state()), Some(json!("a")));
}

#[tokio::test]
async fn test_unknown_route_is_http_error() {
    let context = RequestBlockProvider::new(Arc::new(StaticFetcher::new())).build();
    let mut block: RequestBlock = RequestBlock::new(BlockParams::new("/nowhere"), Default::default(), Some(context));
    block.activate().await;

    assert!(matches!(
        block.state().error,
        Some(BlockError::Fetch(FetchError::Http { status: 404, .. }))
    ));
}

#[tokio::test]
async fn test_origin_prefixes_relative_locations() {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_json("https://api.test/products", json!(["p1"]))
            .with_json("https://other.test/x", json!("x")),
    );
    let context = RequestBlockProvider::new(fetcher.clone())
        .with_origin("https://api.test")
        .build();

    let mut relative: RequestBlock =
        RequestBlock::new(BlockParams::new("/products"), Default::default(), Some(Arc::clone(&context)));
    let mut absolute: RequestBlock =
        RequestBlock::new(BlockParams::new("https://other.test/x"), Default::default(), Some(context));
    relative.activate().await;
    absolute.activate().await;

    assert_eq!(
        fetcher.requests(),
        vec!["https://api.test/products".to_string(), "https://other.test/x".to_string()]
    );
    assert_eq!(data_json(relative.state()), Some(json!(["p1"])));
}

#[tokio::test]
async fn test_custom_parser_runs_on_cached_graph() {
    let fetcher = Arc::new(StaticFetcher::new().with_json("/count", json!({"items": [1, 2, 3]})));
    let context = RequestBlockProvider::new(fetcher).build();
    let hooks = reqblock_fetch::BlockHooks::with_parser(|graph: &Arc<Graph>, _: &BlockParams| {
        graph
            .get(graph.root(), "items")
            .and_then(Value::as_node)
            .and_then(|id| graph.node(id))
            .map(|items| items.len())
            .unwrap_or(0)
    });

    let mut block = RequestBlock::new(BlockParams::new("/count"), hooks.clone(), Some(Arc::clone(&context)));
    block.activate().await;
    assert_eq!(block.state().data, Some(3));

    let cached = RequestBlock::new(BlockParams::new("/count"), hooks, Some(context));
    assert_eq!(cached.phase(), Phase::Success);
    assert_eq!(cached.state().data, Some(3));
}
