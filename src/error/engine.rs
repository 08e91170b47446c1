use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Log a construction error with structured context.
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors that can occur constructing an `Engine`.
///
/// Error code range: 2001-2006.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// `num_input_channels` was zero.
    NoInputChannels,
    /// `sample_rate` was zero.
    InvalidSampleRate,
    /// `min_bpm` was zero or negative.
    InvalidMinBpm { min_bpm: f64 },
    /// `max_loops` was outside `[1, 64]`.
    MaxLoopsOutOfRange { max_loops: usize },
    /// `max_lookback_bars` was outside `[1, 64]`.
    MaxLookbackBarsOutOfRange { max_lookback_bars: usize },
    /// `beats_per_bar` was zero.
    InvalidBeatsPerBar,
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::NoInputChannels => 2001,
            EngineError::InvalidSampleRate => 2002,
            EngineError::InvalidMinBpm { .. } => 2003,
            EngineError::MaxLoopsOutOfRange { .. } => 2004,
            EngineError::MaxLookbackBarsOutOfRange { .. } => 2005,
            EngineError::InvalidBeatsPerBar => 2006,
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::NoInputChannels => "num_input_channels must be at least 1".to_string(),
            EngineError::InvalidSampleRate => "sample_rate must be greater than 0".to_string(),
            EngineError::InvalidMinBpm { min_bpm } => {
                format!("min_bpm must be greater than 0 (got {})", min_bpm)
            }
            EngineError::MaxLoopsOutOfRange { max_loops } => {
                format!("max_loops must be in [1, 64] (got {})", max_loops)
            }
            EngineError::MaxLookbackBarsOutOfRange { max_lookback_bars } => {
                format!(
                    "max_lookback_bars must be in [1, 64] (got {})",
                    max_lookback_bars
                )
            }
            EngineError::InvalidBeatsPerBar => "beats_per_bar must be greater than 0".to_string(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        assert_eq!(EngineError::NoInputChannels.code(), 2001);
        assert_eq!(EngineError::InvalidSampleRate.code(), 2002);
        assert_eq!(EngineError::InvalidMinBpm { min_bpm: 0.0 }.code(), 2003);
        assert_eq!(EngineError::MaxLoopsOutOfRange { max_loops: 0 }.code(), 2004);
    }

    #[test]
    fn test_engine_error_messages() {
        let err = EngineError::MaxLoopsOutOfRange { max_loops: 100 };
        assert!(err.message().contains("100"));
        let err = EngineError::InvalidBeatsPerBar;
        assert!(err.message().contains("beats_per_bar"));
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::NoInputChannels;
        let display = format!("{}", err);
        assert!(display.contains("EngineError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
