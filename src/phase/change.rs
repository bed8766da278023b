// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Phase change hooks

use tracing::info;

/// Side effects to run when the committed phase changes.
pub trait PhaseChangeEngine: Send + Sync {
    fn on_phase_change(&self, old_phase: Option<&str>, new_phase: &str);
}

/// Default hook that logs the transition.
pub struct LoggingPhaseChangeEngine;

impl PhaseChangeEngine for LoggingPhaseChangeEngine {
    fn on_phase_change(&self, old_phase: Option<&str>, new_phase: &str) {
        info!(
            "phase changed: {} -> {}",
            old_phase.unwrap_or("<none>"),
            new_phase
        );
    }
}
