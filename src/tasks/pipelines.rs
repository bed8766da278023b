// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Built-in pipeline composites

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::core::{Task, TaskContext, TaskResult};
use crate::error::Result as CrateResult;
use crate::pipeline::PluginRegistry;

use super::dispatch::EventDispatchTask;
use super::formatting::FormatConversionTask;
use super::ingestion::IngestionTask;
use super::rules::RuleEvaluationTask;
use super::tracking::TrackingTask;

/// Sequential pipeline: Ingestion -> MCMOT -> Format -> Rules, then the
/// terminal dispatch stage. A stage returning `ok=false` (or failing) skips
/// the remaining processing stages; the dispatch stage always runs so the
/// event queue drains every tick.
pub struct WorkingPipelineTask {
    nodes: Vec<Box<dyn Task>>,
    dispatch: EventDispatchTask,
}

impl WorkingPipelineTask {
    pub fn new(nodes: Vec<Box<dyn Task>>, dispatch: EventDispatchTask) -> Self {
        Self { nodes, dispatch }
    }

    pub fn from_config(config: &Arc<Config>, plugins: &PluginRegistry) -> CrateResult<Self> {
        let mut nodes: Vec<Box<dyn Task>> = vec![
            Box::new(IngestionTask::new(plugins.ingestion_engine(config)?)),
            Box::new(TrackingTask::new(
                plugins.tracking_engine(config)?,
                config.mcmot_enabled,
            )),
        ];
        if config.format_task_enabled {
            nodes.push(Box::new(FormatConversionTask::new(
                plugins.format_engine(config)?,
            )));
        } else {
            debug!("format conversion disabled, skipping stage");
        }
        nodes.push(Box::new(RuleEvaluationTask::new(
            plugins.rule_engine(config)?,
        )));

        Ok(Self::new(
            nodes,
            EventDispatchTask::new(plugins.dispatch_engine(config)?),
        ))
    }
}

#[async_trait]
impl Task for WorkingPipelineTask {
    fn name(&self) -> &str {
        "working_pipeline"
    }

    async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult> {
        let mut merged = TaskResult::ok();
        let mut processing_ok = true;

        for node in &mut self.nodes {
            match node.run(ctx).await {
                Ok(result) => {
                    let stop = !result.ok;
                    merged.absorb(result);
                    if stop {
                        warn!(task = node.name(), "stage short-circuited the pipeline");
                        processing_ok = false;
                        break;
                    }
                }
                Err(e) => {
                    error!(task = node.name(), "pipeline stage failed: {e:#}");
                    processing_ok = false;
                    break;
                }
            }
        }

        match self.dispatch.run(ctx).await {
            Ok(result) => merged.absorb(result),
            Err(e) => {
                error!("event dispatch stage failed: {e:#}");
                processing_ok = false;
            }
        }
        merged.ok = processing_ok;
        Ok(merged)
    }
}

/// Minimal pipeline for phases with nothing to compute. Drains the queue and
/// asks the loop for the configured idle sleep.
pub struct IdlePipelineTask {
    idle: std::time::Duration,
    dispatch: EventDispatchTask,
}

impl IdlePipelineTask {
    pub fn from_config(config: &Arc<Config>, plugins: &PluginRegistry) -> CrateResult<Self> {
        Ok(Self {
            idle: config.non_working_idle,
            dispatch: EventDispatchTask::new(plugins.dispatch_engine(config)?),
        })
    }
}

#[async_trait]
impl Task for IdlePipelineTask {
    fn name(&self) -> &str {
        "idle_pipeline"
    }

    async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult> {
        debug!("idle pipeline tick");
        let mut result = self.dispatch.run(ctx).await?;
        result.sleep = Some(self.idle);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::testing::NullAdapter;
    use crate::core::DispatchEvent;
    use crate::store::{EdgeEventPayload, EdgeEventStore};
    use crate::tasks::dispatch::HandlerDispatchEngine;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn context() -> TaskContext {
        let store = Arc::new(EdgeEventStore::new(60.0, 2.0));
        store.add_event(EdgeEventPayload {
            camera_id: "cam01".to_string(),
            timestamp: Utc::now().timestamp() as f64,
            detections: vec![json!({"class_name": "person"})],
            models: vec![],
        });
        TaskContext::new(
            Arc::new(Config::default()),
            store,
            Arc::new(NullAdapter::default()),
        )
    }

    fn dispatch_stage() -> EventDispatchTask {
        EventDispatchTask::new(Box::new(HandlerDispatchEngine::with_builtin_handlers(
            Duration::from_secs(5),
        )))
    }

    #[tokio::test]
    async fn full_pipeline_runs_in_order() {
        let config = Arc::new(Config::default());
        let plugins = PluginRegistry::with_builtins();
        let mut pipeline = WorkingPipelineTask::from_config(&config, &plugins).unwrap();

        let mut ctx = context();
        let result = pipeline.run(&mut ctx).await.unwrap();

        assert!(result.ok);
        // Every stage left its mark: ingestion counts, tracking output,
        // rules payload, and a drained queue.
        assert_eq!(ctx.scratch.events.len(), 1);
        assert_eq!(ctx.scratch.tracked_objects.len(), 1);
        assert!(ctx.scratch.rules_payload.is_some());
        assert!(ctx.event_queue.is_empty());
        assert_eq!(result.payload["events"], json!(1));
    }

    #[tokio::test]
    async fn short_circuit_still_drains_queue() {
        struct StopTask;

        #[async_trait]
        impl Task for StopTask {
            fn name(&self) -> &str {
                "stop"
            }

            async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult> {
                ctx.enqueue_event(DispatchEvent::new("stop", ["log"], json!({})));
                Ok(TaskResult::short_circuit())
            }
        }

        struct NeverTask;

        #[async_trait]
        impl Task for NeverTask {
            fn name(&self) -> &str {
                "never"
            }

            async fn run(&mut self, _ctx: &mut TaskContext) -> Result<TaskResult> {
                panic!("downstream stage must be skipped");
            }
        }

        let mut pipeline = WorkingPipelineTask::new(
            vec![Box::new(StopTask), Box::new(NeverTask)],
            dispatch_stage(),
        );
        let mut ctx = context();
        let result = pipeline.run(&mut ctx).await.unwrap();

        assert!(!result.ok);
        assert!(ctx.event_queue.is_empty());
        assert_eq!(result.payload["dispatched"], json!(1));
    }

    #[tokio::test]
    async fn idle_pipeline_requests_idle_sleep() {
        let config = Arc::new(Config::default());
        let plugins = PluginRegistry::with_builtins();
        let mut pipeline = IdlePipelineTask::from_config(&config, &plugins).unwrap();

        let mut ctx = context();
        let result = pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(result.sleep, Some(config.non_working_idle));
    }
}
