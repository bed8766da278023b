// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Registry of instantiated pipelines keyed by phase

use std::collections::HashMap;
use std::time::Duration;

use crate::core::Task;
use crate::error::{Error, Result};

pub struct PipelineEntry {
    pub task: Box<dyn Task>,
    pub default_sleep: Option<Duration>,
}

impl std::fmt::Debug for PipelineEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEntry")
            .field("task", &self.task.name())
            .field("default_sleep", &self.default_sleep)
            .finish()
    }
}

/// Stores pipeline instances keyed by phase name. Built once at startup;
/// instances are reused for the process lifetime.
#[derive(Default)]
pub struct PipelineRegistry {
    entries: HashMap<String, PipelineEntry>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        phase: &str,
        task: Box<dyn Task>,
        default_sleep: Option<Duration>,
    ) -> Result<()> {
        let key = phase.trim();
        if key.is_empty() {
            return Err(Error::Config("pipeline phase name must not be empty".to_string()));
        }
        self.entries
            .insert(key.to_string(), PipelineEntry { task, default_sleep });
        Ok(())
    }

    pub fn get_mut(&mut self, phase: &str) -> Result<&mut PipelineEntry> {
        if !self.entries.contains_key(phase) {
            let mut known: Vec<&str> = self.entries.keys().map(String::as_str).collect();
            known.sort_unstable();
            let known = if known.is_empty() {
                "<none>".to_string()
            } else {
                known.join(", ")
            };
            return Err(Error::Task(format!(
                "unknown pipeline {phase:?}, known phases: {known}"
            )));
        }
        Ok(self.entries.get_mut(phase).unwrap())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TaskContext, TaskResult};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;

    struct NoopTask;

    #[async_trait]
    impl Task for NoopTask {
        fn name(&self) -> &str {
            "noop"
        }

        async fn run(&mut self, _ctx: &mut TaskContext) -> AnyResult<TaskResult> {
            Ok(TaskResult::ok())
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = PipelineRegistry::new();
        registry
            .register("working", Box::new(NoopTask), Some(Duration::from_secs(1)))
            .unwrap();

        let entry = registry.get_mut("working").unwrap();
        assert_eq!(entry.default_sleep, Some(Duration::from_secs(1)));
        assert_eq!(registry.names(), vec!["working".to_string()]);
    }

    #[test]
    fn unknown_phase_names_known_keys() {
        let mut registry = PipelineRegistry::new();
        registry.register("working", Box::new(NoopTask), None).unwrap();

        let err = registry.get_mut("modeling").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("modeling"));
        assert!(message.contains("working"));
    }

    #[test]
    fn empty_phase_name_is_rejected() {
        let mut registry = PipelineRegistry::new();
        assert!(registry.register("  ", Box::new(NoopTask), None).is_err());
    }
}
