//! Pipeline layer - schedule, registry, selector, plugin factories

mod plugins;
mod registry;
mod schedule;
mod selector;

pub use plugins::{
    DispatchFactory, FactorySet, FormatFactory, IngestionFactory, PhaseChangeFactory,
    PhaseEngineFactory, PipelineFactory, PluginRegistry, RuleFactory, SchedulerFactory,
    SelectorFactory, TrackingFactory,
};
pub use registry::{PipelineEntry, PipelineRegistry};
pub use schedule::{PhaseBinding, PipelineSchedule, PipelineSpec};
pub use selector::{PipelineSelector, Selection, WorkingHoursSelector};
