// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Multi-camera tracking stage - seam to the external MC-MOT engine

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::core::{Task, TaskContext, TaskResult};
use crate::store::EdgeEvent;

#[derive(Debug, Default)]
pub struct TrackingOutcome {
    pub tracked_objects: Vec<Value>,
    pub global_objects: Vec<Value>,
}

/// The multi-camera tracking seam. Implementations wrap the external MC-MOT
/// engine (cross-camera ID assignment, coordinate mapping); only the output
/// shape is part of this contract.
#[async_trait]
pub trait TrackingEngine: Send + Sync {
    async fn process(&self, events: &[EdgeEvent]) -> Result<TrackingOutcome>;
}

/// Default engine when no tracker is configured: forward detections as
/// per-camera tracked objects without global identities.
pub struct PassthroughTrackingEngine;

#[async_trait]
impl TrackingEngine for PassthroughTrackingEngine {
    async fn process(&self, events: &[EdgeEvent]) -> Result<TrackingOutcome> {
        let mut tracked = Vec::new();
        for event in events {
            for detection in &event.detections {
                let mut object = json!({
                    "camera_id": event.camera_id,
                    "timestamp": event.timestamp,
                });
                if let (Some(object_map), Some(detection_map)) =
                    (object.as_object_mut(), detection.as_object())
                {
                    for (key, value) in detection_map {
                        object_map.insert(key.clone(), value.clone());
                    }
                }
                tracked.push(object);
            }
        }
        Ok(TrackingOutcome {
            tracked_objects: tracked,
            global_objects: Vec::new(),
        })
    }
}

pub struct TrackingTask {
    engine: Box<dyn TrackingEngine>,
    enabled: bool,
}

impl TrackingTask {
    pub fn new(engine: Box<dyn TrackingEngine>, enabled: bool) -> Self {
        Self { engine, enabled }
    }
}

#[async_trait]
impl Task for TrackingTask {
    fn name(&self) -> &str {
        "mc_mot"
    }

    async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult> {
        if !self.enabled {
            debug!(
                events = ctx.scratch.events.len(),
                "tracking disabled, passing through"
            );
            ctx.scratch.tracked_objects = Vec::new();
            ctx.scratch.global_objects = Vec::new();
            return Ok(TaskResult::ok().with_field("skipped", json!(true)));
        }

        let outcome = self.engine.process(&ctx.scratch.events).await?;
        info!(
            events = ctx.scratch.events.len(),
            tracked = outcome.tracked_objects.len(),
            global_objects = outcome.global_objects.len(),
            "tracking completed"
        );
        let result = TaskResult::ok()
            .with_field("tracked", json!(outcome.tracked_objects.len()))
            .with_field("global_objects", json!(outcome.global_objects.len()));
        ctx.scratch.tracked_objects = outcome.tracked_objects;
        ctx.scratch.global_objects = outcome.global_objects;
        Ok(result)
    }
}
