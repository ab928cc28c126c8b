//! Shared helpers for request block integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use reqblock_core::Graph;
use reqblock_fetch::{BlockHooks, ConsumerState};
use serde_json::Value as JsonValue;

/// Lifecycle event observed through a block's callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Request,
    Load,
    Error,
}

/// Records every callback a block fires, with the state it saw.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<(Event, ConsumerState<Arc<Graph>>)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hooks(&self) -> BlockHooks<Arc<Graph>> {
        let (request, load, error) = (self.clone(), self.clone(), self.clone());
        BlockHooks::default()
            .on_request(move |state| request.push(Event::Request, state))
            .on_load(move |state| load.push(Event::Load, state))
            .on_error(move |state| error.push(Event::Error, state))
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().iter().map(|(event, _)| *event).collect()
    }

    pub fn states(&self) -> Vec<ConsumerState<Arc<Graph>>> {
        self.log.lock().unwrap().iter().map(|(_, state)| state.clone()).collect()
    }

    pub fn last_state(&self) -> Option<ConsumerState<Arc<Graph>>> {
        self.log.lock().unwrap().last().map(|(_, state)| state.clone())
    }

    fn push(&self, event: Event, state: &ConsumerState<Arc<Graph>>) {
        self.log.lock().unwrap().push((event, state.clone()));
    }
}

/// The block's data as plain JSON.
pub fn data_json(state: &ConsumerState<Arc<Graph>>) -> Option<JsonValue> {
    state.data.as_ref().map(|graph| graph.to_json().unwrap())
}
