// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Pipeline schedule file - phase to pipeline bindings

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

/// A pipeline declaration: symbolic name plus the factory-registry key that
/// instantiates it.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub name: String,
    pub class_path: String,
}

/// The pipeline a phase runs and its optional tick interval.
#[derive(Debug, Clone)]
pub struct PhaseBinding {
    pub pipeline: String,
    pub interval: Option<Duration>,
}

/// Parsed and validated schedule document.
#[derive(Debug, Clone)]
pub struct PipelineSchedule {
    pub pipelines: HashMap<String, PipelineSpec>,
    pub phases: HashMap<String, PhaseBinding>,
}

impl PipelineSchedule {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read pipeline schedule {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("pipeline schedule is not valid JSON: {e}")))?;
        let doc = doc
            .as_object()
            .ok_or_else(|| Error::Config("pipeline schedule must be a JSON object".to_string()))?;

        for key in doc.keys() {
            if key != "pipelines" && key != "phases" {
                warn!("pipeline schedule: ignoring unknown key {key:?}");
            }
        }

        let raw_pipelines = doc
            .get("pipelines")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                Error::Config("pipeline schedule requires a pipelines object".to_string())
            })?;
        let raw_phases = doc.get("phases").and_then(Value::as_object).ok_or_else(|| {
            Error::Config("pipeline schedule requires a phases object".to_string())
        })?;
        if raw_phases.is_empty() {
            return Err(Error::Config(
                "pipeline schedule declares no phases".to_string(),
            ));
        }

        let mut pipelines = HashMap::new();
        for (name, cfg) in raw_pipelines {
            pipelines.insert(name.clone(), parse_pipeline(name, cfg)?);
        }

        let mut phases = HashMap::new();
        for (phase, cfg) in raw_phases {
            phases.insert(phase.clone(), parse_phase(phase, cfg)?);
        }

        for (phase, binding) in &phases {
            if !pipelines.contains_key(&binding.pipeline) {
                return Err(Error::Config(format!(
                    "phase {phase:?} references unknown pipeline {:?}",
                    binding.pipeline
                )));
            }
        }

        Ok(Self { pipelines, phases })
    }
}

fn parse_pipeline(name: &str, cfg: &Value) -> Result<PipelineSpec> {
    let cfg = cfg
        .as_object()
        .ok_or_else(|| Error::Config(format!("pipeline {name:?} must be an object")))?;
    let class_path = cfg
        .get("class")
        .or_else(|| cfg.get("pipeline_class"))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Config(format!("pipeline {name:?} is missing class")))?;
    for key in cfg.keys() {
        if key != "class" && key != "pipeline_class" {
            warn!("pipeline {name:?}: ignoring unknown key {key:?}");
        }
    }
    Ok(PipelineSpec {
        name: name.to_string(),
        class_path: class_path.to_string(),
    })
}

fn parse_phase(phase: &str, cfg: &Value) -> Result<PhaseBinding> {
    // String shorthand binds a phase straight to a pipeline name.
    if let Some(pipeline) = cfg.as_str() {
        return Ok(PhaseBinding {
            pipeline: pipeline.to_string(),
            interval: None,
        });
    }
    let cfg = cfg.as_object().ok_or_else(|| {
        Error::Config(format!("phase {phase:?} must name a pipeline or be an object"))
    })?;
    let pipeline = cfg
        .get("pipeline")
        .or_else(|| cfg.get("pipeline_name"))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Config(format!("phase {phase:?} is missing pipeline")))?;

    let interval = match cfg.get("interval_seconds") {
        None => None,
        Some(value) => {
            let seconds = value.as_f64().ok_or_else(|| {
                Error::Config(format!("phase {phase:?} interval_seconds must be a number"))
            })?;
            if seconds <= 0.0 {
                return Err(Error::Config(format!(
                    "phase {phase:?} interval_seconds must be positive"
                )));
            }
            Some(Duration::from_secs_f64(seconds))
        }
    };
    for key in cfg.keys() {
        if !matches!(key.as_str(), "pipeline" | "pipeline_name" | "interval_seconds") {
            warn!("phase {phase:?}: ignoring unknown key {key:?}");
        }
    }
    Ok(PhaseBinding {
        pipeline: pipeline.to_string(),
        interval,
    })
}
