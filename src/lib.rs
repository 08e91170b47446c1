// Loopcraft - Real-time live looper engine
// Lock-free, allocation-free audio DSP pipeline for sample-accurate looping.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod loop_engine;

pub use config::{EngineConfig, RuntimeSettings};
pub use engine::{Engine, EngineCommand, EngineSnapshot};
pub use error::EngineError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_constructs_with_default_config() {
        assert!(Engine::new(EngineConfig::default()).is_ok());
    }
}
