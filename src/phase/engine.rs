// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! Phase engines - debouncing and stale handling over a scheduler

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::StaleMode;
use crate::store::EdgeEventStore;

use super::scheduler::SchedulerEngine;
use super::Phase;

/// Resolves the committed phase for the current tick. Idempotent within the
/// same `now` and state; reads the clock and the store only.
pub trait PhaseEngine: Send + Sync {
    fn current_phase(&mut self, now: DateTime<Utc>, store: &EdgeEventStore) -> Phase;
}

/// Pass-through over a scheduler, no debounce.
pub struct TimeBasedPhaseEngine {
    scheduler: Box<dyn SchedulerEngine>,
}

impl TimeBasedPhaseEngine {
    pub fn new(scheduler: Box<dyn SchedulerEngine>) -> Self {
        Self { scheduler }
    }
}

impl PhaseEngine for TimeBasedPhaseEngine {
    fn current_phase(&mut self, now: DateTime<Utc>, store: &EdgeEventStore) -> Phase {
        self.scheduler.resolve(now, store)
    }
}

/// Commits a phase switch only after the scheduler's candidate has persisted
/// for the stable window. Also owns the stale fallback: when no edge events
/// have arrived within the stale threshold the engine either freezes on the
/// committed phase or force-commits the configured unknown phase.
pub struct DebouncedPhaseEngine {
    scheduler: Box<dyn SchedulerEngine>,
    stable: Duration,
    stale_after: Duration,
    stale_mode: StaleMode,
    unknown_phase: String,

    committed: Option<Phase>,
    candidate: Option<Phase>,
    candidate_since: Option<DateTime<Utc>>,
    stale_active: bool,
}

impl DebouncedPhaseEngine {
    pub fn new(
        scheduler: Box<dyn SchedulerEngine>,
        stable: Duration,
        stale_after: Duration,
        stale_mode: StaleMode,
        unknown_phase: impl Into<String>,
    ) -> Self {
        Self {
            scheduler,
            stable,
            stale_after,
            stale_mode,
            unknown_phase: unknown_phase.into(),
            committed: None,
            candidate: None,
            candidate_since: None,
            stale_active: false,
        }
    }

    fn is_stale(&self, now: DateTime<Utc>, store: &EdgeEventStore) -> bool {
        if self.stale_after.is_zero() {
            return false;
        }
        match store.last_event_age(now) {
            None => true,
            Some(age) => age > self.stale_after.as_secs_f64(),
        }
    }

    fn commit(&mut self, phase: Phase) -> Phase {
        info!(phase = %phase.name, "phase committed");
        self.committed = Some(phase.clone());
        self.candidate = None;
        self.candidate_since = None;
        phase
    }
}

impl PhaseEngine for DebouncedPhaseEngine {
    fn current_phase(&mut self, now: DateTime<Utc>, store: &EdgeEventStore) -> Phase {
        let raw = self.scheduler.resolve(now, store);

        if self.is_stale(now, store) {
            if !self.stale_active {
                warn!(
                    mode = ?self.stale_mode,
                    "no edge events within stale window, applying stale mode"
                );
                self.stale_active = true;
            }
            return match self.stale_mode {
                StaleMode::Unknown => {
                    let unknown = Phase::named(self.unknown_phase.clone(), false);
                    if self.committed.as_ref() != Some(&unknown) {
                        return self.commit(unknown);
                    }
                    unknown
                }
                // Freeze on the committed phase; before the first commit the
                // scheduler output stands in.
                StaleMode::Freeze => self.committed.clone().unwrap_or(raw),
            };
        }
        self.stale_active = false;

        let committed = match &self.committed {
            None => return self.commit(raw),
            Some(committed) => committed.clone(),
        };

        if raw.name == committed.name {
            self.candidate = None;
            self.candidate_since = None;
            return committed;
        }

        match (&self.candidate, self.candidate_since) {
            (Some(candidate), Some(since)) if candidate.name == raw.name => {
                let waited = now.signed_duration_since(since);
                if waited.num_milliseconds() as f64 / 1000.0 >= self.stable.as_secs_f64() {
                    self.commit(raw)
                } else {
                    committed
                }
            }
            _ => {
                self.candidate = Some(raw);
                self.candidate_since = Some(now);
                committed
            }
        }
    }
}
