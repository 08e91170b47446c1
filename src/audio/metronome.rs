//! Sample-accurate tempo clock.
//!
//! Grounded in the teacher's `samples_per_beat`/`is_on_beat` boundary math,
//! generalized from a single stateless predicate into a stateful clock that
//! tracks bar position and fires beat/bar boundary callbacks as it advances,
//! and that preserves phase across a BPM change.

use serde::{Deserialize, Serialize};

/// Which boundary a scheduled operation snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantize {
    Free,
    Beat,
    Bar,
}

/// A point-in-time read of the metronome's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetronomePosition {
    pub total_samples: u64,
    pub bar: u64,
    pub beat: u32,
    pub beat_fraction: f64,
}

pub struct Metronome {
    sample_rate: u32,
    bpm: f64,
    beats_per_bar: u32,
    total_samples: u64,
    /// Fractional beat count at the current `total_samples`, kept so BPM
    /// changes can preserve phase rather than resetting it.
    beat_count: f64,
}

/// Compute samples-per-beat for a given tempo and sample rate.
pub fn samples_per_beat(bpm: f64, sample_rate: u32) -> f64 {
    60.0 / bpm * sample_rate as f64
}

impl Metronome {
    pub fn new(sample_rate: u32, bpm: f64, beats_per_bar: u32) -> Self {
        Self {
            sample_rate,
            bpm,
            beats_per_bar,
            total_samples: 0,
            beat_count: 0.0,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn samples_per_beat(&self) -> f64 {
        samples_per_beat(self.bpm, self.sample_rate)
    }

    pub fn samples_per_bar(&self) -> f64 {
        self.samples_per_beat() * self.beats_per_bar as f64
    }

    pub fn position(&self) -> MetronomePosition {
        let beat_in_bar = self.beat_count % self.beats_per_bar as f64;
        MetronomePosition {
            total_samples: self.total_samples,
            bar: (self.beat_count / self.beats_per_bar as f64).floor() as u64,
            beat: beat_in_bar.floor() as u32,
            beat_fraction: beat_in_bar.fract(),
        }
    }

    /// Set BPM, preserving the current fractional position within the beat.
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
    }

    /// Advance the clock by `n` samples, calling `on_beat`/`on_bar` for every
    /// boundary crossed, each with the position *at* that boundary.
    pub fn advance<FB, FR>(&mut self, n: u64, mut on_beat: FB, mut on_bar: FR)
    where
        FB: FnMut(MetronomePosition),
        FR: FnMut(MetronomePosition),
    {
        let spb = self.samples_per_beat();
        for _ in 0..n {
            self.total_samples += 1;
            let prev_beat_int = (self.beat_count + 1e-9).floor();
            self.beat_count += 1.0 / spb;
            let cur_beat_int = (self.beat_count + 1e-9).floor();
            if cur_beat_int > prev_beat_int {
                let pos = self.position();
                on_beat(pos);
                if pos.beat == 0 {
                    on_bar(pos);
                }
            }
        }
    }

    /// Samples remaining until the next boundary matching `q`.
    pub fn samples_until_boundary(&self, q: Quantize) -> u64 {
        match q {
            Quantize::Free => 0,
            Quantize::Beat => {
                let spb = self.samples_per_beat();
                let next_beat = (self.beat_count.floor() + 1.0) * spb;
                (next_beat - self.beat_count * spb).round().max(0.0) as u64
            }
            Quantize::Bar => {
                let spb = self.samples_per_beat();
                let bpb = self.beats_per_bar as f64;
                let next_bar_beats = ((self.beat_count / bpb).floor() + 1.0) * bpb;
                ((next_bar_beats - self.beat_count) * spb).round().max(0.0) as u64
            }
        }
    }
}
