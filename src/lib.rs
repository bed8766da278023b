// Copyright (c) 2026 edgebridge contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/edgebridge/edgebridge

//! edgebridge - phase-aware edge integration daemon
//!
//! A long-running daemon bridging edge inference producers (cameras) with
//! downstream monitoring and action systems:
//! - Edge-event ingestion over HTTP or MQTT into a latest-per-camera store
//! - Debounced phase decision from time windows or external signals
//! - Per-phase pipelines selected and throttled every tick
//! - Dispatch events routed to named external handlers at the tick's end
//!
//! # Architecture
//!
//! ```text
//!    edge events ──► EdgeCommAdapter ──► EdgeEventStore
//!                                            │
//!   phase publish ◄─ EdgeCommAdapter         ▼
//!                          ▲          PhaseTask ── PhaseEngine
//!                          │              │
//!                          │        PipelineSelector ──► PipelineRegistry
//!                          │              │
//!                          │       selected pipeline:
//!                          │       Ingestion → Tracking → Format → Rules
//!                          │              │                         │
//!                          └── phase changes ── event_queue ── EventDispatch
//!                                        WorkflowRunner (loop, sleep)
//! ```

pub mod comm;
pub mod config;
pub mod core;
pub mod error;
pub mod phase;
pub mod pipeline;
pub mod runner;
pub mod store;
pub mod tasks;

// Re-exports for convenience
pub use comm::EdgeCommAdapter;
pub use config::Config;
pub use core::{DispatchEvent, Scratch, Task, TaskContext, TaskResult};
pub use error::{Error, Result};
pub use phase::{Phase, PhaseEngine, SchedulerEngine};
pub use pipeline::{PipelineRegistry, PipelineSchedule, PipelineSelector, PluginRegistry};
pub use runner::WorkflowRunner;
pub use store::{EdgeEvent, EdgeEventStore};

/// edgebridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// edgebridge name
pub const NAME: &str = "edgebridge";
