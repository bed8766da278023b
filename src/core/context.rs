// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Shared task context and per-tick scratch state

use std::sync::Arc;

use serde_json::Value;

use crate::comm::EdgeCommAdapter;
use crate::config::Config;
use crate::store::{EdgeEvent, EdgeEventStore};

use super::events::DispatchEvent;

/// Per-tick values written by upstream tasks, readable downstream.
/// Reset at the start of every tick.
#[derive(Debug, Default)]
pub struct Scratch {
    /// Latest-per-camera events observed by the ingestion stage.
    pub events: Vec<EdgeEvent>,
    pub raw_count: usize,
    pub dropped: usize,

    /// Tracking output (opaque to the control plane).
    pub tracked_objects: Vec<Value>,
    pub global_objects: Vec<Value>,

    /// Payload handed to the rules stage by the formatting stage.
    pub rules_payload: Option<Value>,
}

/// Shared mutable container visible to every task in a pipeline.
///
/// Owned by the workflow runner; tasks borrow it for the duration of one
/// `run()` and never retain references. Confined to the loop task - the only
/// cross-thread state is the event store behind its own mutex.
pub struct TaskContext {
    pub config: Arc<Config>,
    pub store: Arc<EdgeEventStore>,
    pub adapter: Arc<dyn EdgeCommAdapter>,
    pub event_queue: Vec<DispatchEvent>,
    pub scratch: Scratch,
}

impl TaskContext {
    pub fn new(
        config: Arc<Config>,
        store: Arc<EdgeEventStore>,
        adapter: Arc<dyn EdgeCommAdapter>,
    ) -> Self {
        Self {
            config,
            store,
            adapter,
            event_queue: Vec::new(),
            scratch: Scratch::default(),
        }
    }

    /// Append an event for the dispatch stage at the end of the tick.
    pub fn enqueue_event(&mut self, event: DispatchEvent) {
        self.event_queue.push(event);
    }

    /// Swap the queue out for draining, leaving it empty.
    pub fn drain_events(&mut self) -> Vec<DispatchEvent> {
        std::mem::take(&mut self.event_queue)
    }

    pub fn reset_scratch(&mut self) {
        self.scratch = Scratch::default();
    }
}
