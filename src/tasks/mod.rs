//! Built-in pipeline tasks and their engine seams

mod dispatch;
mod formatting;
mod ingestion;
mod pipelines;
mod rules;
mod tracking;

pub use dispatch::{
    DispatchEngine, DispatchHandler, DispatchOutcome, EventDispatchTask, HandlerDispatchEngine,
    LogHandler,
};
pub use formatting::{DefaultFormatEngine, FormatConversionTask, FormatEngine};
pub use ingestion::{DefaultIngestionEngine, IngestionEngine, IngestionOutcome, IngestionTask};
pub use pipelines::{IdlePipelineTask, WorkingPipelineTask};
pub use rules::{DefaultRuleEngine, RuleEngine, RuleEvaluationTask, RuleOutcome};
pub use tracking::{PassthroughTrackingEngine, TrackingEngine, TrackingOutcome, TrackingTask};
