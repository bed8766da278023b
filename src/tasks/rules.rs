// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Rule evaluation stage

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::core::{DispatchEvent, Task, TaskContext, TaskResult};

#[derive(Debug, Default)]
pub struct RuleOutcome {
    pub payload: Map<String, Value>,
    /// Violation/notification events to forward at the end of the tick.
    pub events: Vec<DispatchEvent>,
}

/// Project-specific rule logic over the formatted payload.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    async fn evaluate(&self, rules_payload: Option<&Value>) -> Result<RuleOutcome>;
}

/// Fallback engine that only reports the global object count.
pub struct DefaultRuleEngine;

#[async_trait]
impl RuleEngine for DefaultRuleEngine {
    async fn evaluate(&self, rules_payload: Option<&Value>) -> Result<RuleOutcome> {
        let total = rules_payload
            .and_then(|payload| payload.get("global_summary"))
            .and_then(|summary| summary.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        debug!(global_objects = total, "default rule engine evaluated");
        let mut payload = Map::new();
        payload.insert("global_objects".to_string(), json!(total));
        Ok(RuleOutcome {
            payload,
            events: Vec::new(),
        })
    }
}

pub struct RuleEvaluationTask {
    engine: Box<dyn RuleEngine>,
}

impl RuleEvaluationTask {
    pub fn new(engine: Box<dyn RuleEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for RuleEvaluationTask {
    fn name(&self) -> &str {
        "rule_evaluation"
    }

    async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult> {
        let outcome = self
            .engine
            .evaluate(ctx.scratch.rules_payload.as_ref())
            .await?;
        info!(events = outcome.events.len(), "rule evaluation completed");
        for event in outcome.events {
            ctx.enqueue_event(event);
        }
        let mut result = TaskResult::ok();
        result.payload = outcome.payload;
        Ok(result)
    }
}
