// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Format conversion stage - normalize tracking output for the rules stage

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::info;

use crate::core::{Scratch, Task, TaskContext, TaskResult};

/// Converts the tick's tracking output into the payload consumed by rule
/// engines.
pub trait FormatEngine: Send + Sync {
    fn build_payload(&self, scratch: &Scratch, now: DateTime<Utc>) -> Value;
}

/// Default payload: raw collections plus per-camera and global summaries.
pub struct DefaultFormatEngine;

impl FormatEngine for DefaultFormatEngine {
    fn build_payload(&self, scratch: &Scratch, now: DateTime<Utc>) -> Value {
        json!({
            "events": scratch.events,
            "tracked_objects": scratch.tracked_objects,
            "global_objects": scratch.global_objects,
            "camera_summary": summarize_by_camera(&scratch.tracked_objects),
            "global_summary": summarize_global(&scratch.global_objects),
            "metadata": {
                "generated_at": now.to_rfc3339(),
            },
        })
    }
}

fn class_name(object: &Value) -> &str {
    object
        .get("class_name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

fn summarize_by_camera(tracked: &[Value]) -> Value {
    let mut summary: BTreeMap<&str, (usize, BTreeMap<&str, usize>)> = BTreeMap::new();
    for object in tracked {
        let camera = object
            .get("camera_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let entry = summary.entry(camera).or_default();
        entry.0 += 1;
        *entry.1.entry(class_name(object)).or_default() += 1;
    }
    let mut out = serde_json::Map::new();
    for (camera, (total, classes)) in summary {
        out.insert(
            camera.to_string(),
            json!({"total": total, "classes": classes}),
        );
    }
    Value::Object(out)
}

fn summarize_global(global_objects: &[Value]) -> Value {
    let mut classes: BTreeMap<&str, usize> = BTreeMap::new();
    for object in global_objects {
        *classes.entry(class_name(object)).or_default() += 1;
    }
    json!({"total": global_objects.len(), "classes": classes})
}

pub struct FormatConversionTask {
    engine: Box<dyn FormatEngine>,
}

impl FormatConversionTask {
    pub fn new(engine: Box<dyn FormatEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for FormatConversionTask {
    fn name(&self) -> &str {
        "format_conversion"
    }

    async fn run(&mut self, ctx: &mut TaskContext) -> Result<TaskResult> {
        let payload = self.engine.build_payload(&ctx.scratch, Utc::now());
        info!(
            events = ctx.scratch.events.len(),
            tracked = ctx.scratch.tracked_objects.len(),
            global_objects = ctx.scratch.global_objects.len(),
            "format conversion completed"
        );
        ctx.scratch.rules_payload = Some(payload);
        Ok(TaskResult::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn summaries_count_cameras_and_classes() {
        let mut scratch = Scratch::default();
        scratch.tracked_objects = vec![
            json!({"camera_id": "cam01", "class_name": "person"}),
            json!({"camera_id": "cam01", "class_name": "forklift"}),
            json!({"camera_id": "cam02", "class_name": "person"}),
            json!({"camera_id": "cam02"}),
        ];
        scratch.global_objects = vec![
            json!({"global_id": 1, "class_name": "person"}),
            json!({"global_id": 2, "class_name": "person"}),
        ];

        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let payload = DefaultFormatEngine.build_payload(&scratch, now);

        assert_eq!(payload["camera_summary"]["cam01"]["total"], json!(2));
        assert_eq!(
            payload["camera_summary"]["cam02"]["classes"]["unknown"],
            json!(1)
        );
        assert_eq!(payload["global_summary"]["total"], json!(2));
        assert_eq!(payload["global_summary"]["classes"]["person"], json!(2));
        assert!(payload["metadata"]["generated_at"]
            .as_str()
            .unwrap()
            .starts_with("2026-03-02"));
    }
}
