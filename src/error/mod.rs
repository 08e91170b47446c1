//! Error types for the looper engine.
//!
//! Only construction-time failures are represented as `Result` errors; once an
//! engine exists, all runtime failures are handled locally (logged through
//! `on_message` and the diagnostics ring) rather than propagated, since there
//! is no caller on the audio thread able to receive a `Result`.

mod engine;

pub use engine::{log_engine_error, EngineError};

/// Standard way to get a stable numeric code and a human-readable message
/// from an error type.
pub trait ErrorCode {
    /// The numeric error code.
    fn code(&self) -> i32;

    /// The human-readable error message.
    fn message(&self) -> String;
}
