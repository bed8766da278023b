//! Phase decision layer - scheduler engines, phase engines, change hooks

mod change;
mod engine;
mod scheduler;

pub use change::{LoggingPhaseChangeEngine, PhaseChangeEngine};
pub use engine::{DebouncedPhaseEngine, PhaseEngine, TimeBasedPhaseEngine};
pub use scheduler::{
    IronGateScheduler, SchedulerEngine, SinglePhaseScheduler, TimeWindowScheduler,
};

/// A site-wide operational label selecting which pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub working: bool,
}

impl Phase {
    pub fn working() -> Self {
        Self {
            name: "working".to_string(),
            working: true,
        }
    }

    pub fn non_working() -> Self {
        Self {
            name: "non_working".to_string(),
            working: false,
        }
    }

    pub fn named(name: impl Into<String>, working: bool) -> Self {
        Self {
            name: name.into(),
            working,
        }
    }
}
