// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Task contracts for pipeline composition

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::context::TaskContext;

/// Outcome of a single task run.
#[derive(Debug, Default)]
pub struct TaskResult {
    /// False short-circuits the remaining processing stages of the pipeline.
    pub ok: bool,
    /// Overrides the registry default for the next loop interval.
    pub sleep: Option<Duration>,
    pub payload: Map<String, Value>,
}

impl TaskResult {
    pub fn ok() -> Self {
        Self {
            ok: true,
            sleep: None,
            payload: Map::new(),
        }
    }

    pub fn short_circuit() -> Self {
        Self {
            ok: false,
            sleep: None,
            payload: Map::new(),
        }
    }

    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = Some(sleep);
        self
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    /// Shallow merge of another result's payload, last writer wins.
    pub fn absorb(&mut self, other: TaskResult) {
        self.ok = other.ok;
        if other.sleep.is_some() {
            self.sleep = other.sleep;
        }
        for (key, value) in other.payload {
            self.payload.insert(key, value);
        }
    }
}

/// A pipeline node. Tasks compose sequentially inside a pipeline task and
/// must bound any external I/O they perform.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absorb_merges_shallow_last_writer_wins() {
        let mut merged = TaskResult::ok()
            .with_field("events", json!(3))
            .with_field("phase", json!("working"));
        merged.absorb(
            TaskResult::ok()
                .with_sleep(Duration::from_secs(2))
                .with_field("events", json!(5)),
        );

        assert!(merged.ok);
        assert_eq!(merged.sleep, Some(Duration::from_secs(2)));
        assert_eq!(merged.payload["events"], json!(5));
        assert_eq!(merged.payload["phase"], json!("working"));
    }
}
