//! Metronome click generator.
//!
//! The teacher generates its click as a short burst of seeded white noise;
//! since this crate drops the `rand` dependency (see DESIGN.md), the click is
//! instead a deterministic decaying sinusoid, re-triggered on every beat.

const CLICK_FREQ_HZ: f32 = 1000.0;
const CLICK_DURATION_MS: f32 = 20.0;

pub struct Click {
    sample_rate: u32,
    duration_samples: u32,
    volume: f32,
    enabled: bool,
    /// Samples elapsed since the click was last triggered; `>= duration_samples`
    /// means silent.
    pos: u32,
}

impl Click {
    pub fn new(sample_rate: u32) -> Self {
        let duration_samples = (CLICK_DURATION_MS / 1000.0 * sample_rate as f32) as u32;
        Self {
            sample_rate,
            duration_samples,
            volume: 0.5,
            enabled: false,
            pos: duration_samples,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Re-trigger the click from the beginning; called on every beat boundary.
    pub fn trigger(&mut self) {
        self.pos = 0;
    }

    /// Produce the next output sample and advance the click's internal position.
    pub fn next_sample(&mut self) -> f32 {
        if !self.enabled || self.pos >= self.duration_samples {
            self.pos = self.pos.saturating_add(1);
            return 0.0;
        }
        let t = self.pos as f32 / self.sample_rate as f32;
        let decay = 1.0 - (self.pos as f32 / self.duration_samples as f32);
        let sample = (2.0 * std::f32::consts::PI * CLICK_FREQ_HZ * t).sin() * decay * self.volume;
        self.pos += 1;
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_when_disabled() {
        let mut c = Click::new(48_000);
        c.set_enabled(false);
        c.trigger();
        assert_eq!(c.next_sample(), 0.0);
    }

    #[test]
    fn test_silent_after_duration_elapses() {
        let mut c = Click::new(48_000);
        c.set_enabled(true);
        c.trigger();
        for _ in 0..c.duration_samples {
            c.next_sample();
        }
        assert_eq!(c.next_sample(), 0.0);
    }

    #[test]
    fn test_decays_toward_zero() {
        // Compare peak amplitude over a short window near the start vs. near
        // the end, rather than single raw samples: the underlying sinusoid
        // crosses zero regularly, so any one sample can be near-zero
        // regardless of the decay envelope.
        let mut c = Click::new(48_000);
        c.set_enabled(true);
        c.set_volume(1.0);
        c.trigger();
        let early_peak = (0..20)
            .map(|_| c.next_sample().abs())
            .fold(0.0_f32, f32::max);
        for _ in 0..(c.duration_samples - 40) {
            c.next_sample();
        }
        let late_peak = (0..20)
            .map(|_| c.next_sample().abs())
            .fold(0.0_f32, f32::max);
        assert!(late_peak < early_peak);
    }

    #[test]
    fn test_volume_clamped() {
        let mut c = Click::new(48_000);
        c.set_volume(5.0);
        assert_eq!(c.volume, 1.0);
        c.set_volume(-5.0);
        assert_eq!(c.volume, 0.0);
    }
}
