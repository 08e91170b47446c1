//! Multi-layer loops, pending-operation scheduling, and tempo-following
//! time-stretch.

pub mod loop_;
pub mod pending;
pub mod stretch;

pub use loop_::{Loop, LoopLayer, LoopState};
pub use pending::{PendingOp, PendingState};
pub use stretch::Stretcher;
