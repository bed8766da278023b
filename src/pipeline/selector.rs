// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Pipeline selectors - which pipeline runs for the current tick

use std::time::Duration;

use crate::core::TaskContext;
use crate::phase::Phase;

/// The selector decision: a pipeline name plus optional overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub name: String,
    /// Overrides the registry default sleep for the next interval.
    pub sleep: Option<Duration>,
    /// Custom selectors may signal a phase change of their own.
    pub phase_changed: bool,
}

impl Selection {
    pub fn of(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sleep: None,
            phase_changed: false,
        }
    }
}

/// Strategy choosing the pipeline for a tick. The selector is authoritative
/// on the pipeline name; the phase engine on the phase itself.
pub trait PipelineSelector: Send + Sync {
    fn select(&self, phase: &Phase, ctx: &TaskContext) -> Selection;
}

/// Default selector: run the pipeline registered for the current phase.
pub struct WorkingHoursSelector;

impl PipelineSelector for WorkingHoursSelector {
    fn select(&self, phase: &Phase, _ctx: &TaskContext) -> Selection {
        Selection::of(phase.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::testing::NullAdapter;
    use crate::config::Config;
    use crate::store::EdgeEventStore;
    use std::sync::Arc;

    #[test]
    fn default_selector_returns_phase_name() {
        let ctx = TaskContext::new(
            Arc::new(Config::default()),
            Arc::new(EdgeEventStore::new(60.0, 2.0)),
            Arc::new(NullAdapter::default()),
        );
        let selection = WorkingHoursSelector.select(&Phase::working(), &ctx);
        assert_eq!(selection, Selection::of("working"));
        assert!(selection.sleep.is_none());
    }
}
