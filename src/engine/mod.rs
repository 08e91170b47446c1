//! The loop engine: command queue, snapshot publishing, and the per-sample
//! orchestrator that ties every other module together.

pub mod command;
pub mod core;
pub mod snapshot;

pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use core::Engine;
pub use snapshot::{EngineSnapshot, LoopSnapshot};
