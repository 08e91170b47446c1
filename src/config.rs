//! Construction-time and runtime configuration for the looper engine.
//!
//! `EngineConfig` is consumed once, at construction. `RuntimeSettings` holds
//! the subset of fields the engine allows changing after construction (via
//! `Engine::set_*` methods); it is also `Serialize`/`Deserialize` so a caller
//! can persist and restore a session's settings however it likes. Parsing an
//! actual on-disk file is left to the caller — this crate only carries the
//! value types.

use serde::{Deserialize, Serialize};

/// Parameters fixed for the lifetime of an `Engine`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Number of loop slots, in `[1, 64]`.
    pub max_loops: usize,
    /// Maximum lookback depth in bars, in `[1, 64]`. Determines ring buffer capacity.
    pub max_lookback_bars: usize,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Slowest supported tempo; used with `max_lookback_bars` to size ring buffers.
    pub min_bpm: f64,
    /// Number of input channels `process_block` expects.
    pub num_input_channels: usize,
    /// Beats per bar (time signature numerator).
    pub beats_per_bar: u32,
    /// Activity threshold below which an input channel is not considered "live".
    /// `<= 0.0` disables detection (every channel is always live).
    pub live_threshold: f32,
    /// Width of the activity detection window, in milliseconds.
    pub live_window_ms: f32,
    pub runtime: RuntimeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_loops: 8,
            max_lookback_bars: 4,
            sample_rate: 48_000,
            min_bpm: 40.0,
            num_input_channels: 1,
            beats_per_bar: 4,
            live_threshold: 0.01,
            live_window_ms: 50.0,
            runtime: RuntimeSettings::default(),
        }
    }
}

/// Settings the engine allows changing after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeSettings {
    pub default_quantize: crate::audio::metronome::Quantize,
    pub lookback_bars: usize,
    pub crossfade_samples: usize,
    pub latency_compensation_samples: usize,
    pub input_monitoring: bool,
    pub live_threshold: f32,
    pub click_enabled: bool,
    pub click_volume: f32,
    pub midi_sync_enabled: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            default_quantize: crate::audio::metronome::Quantize::Bar,
            lookback_bars: 2,
            // 10ms at 48kHz; scaled by actual sample rate at construction.
            crossfade_samples: 480,
            latency_compensation_samples: 0,
            input_monitoring: true,
            live_threshold: 0.01,
            click_enabled: false,
            click_volume: 0.5,
            midi_sync_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_loops, 8);
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.runtime.lookback_bars, 2);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
