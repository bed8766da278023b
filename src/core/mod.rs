//! Core module - task contracts, shared context, dispatch events

mod context;
mod events;
mod task;

pub use context::{Scratch, TaskContext};
pub use events::DispatchEvent;
pub use task::{Task, TaskResult};
