//! A multi-layer audio loop: overdub, undo/redo, reverse, variable speed,
//! crossfade, and tempo-following time-stretch.
//!
//! Grounded in `other_examples/e7cbd3e2_..._track.rs.rs`'s undo/redo-via-deque
//! shape, generalized so every non-base layer (not just the most recent) can
//! be independently deactivated and reactivated in FIFO order.

use crate::loop_engine::stretch::Stretcher;
use std::collections::VecDeque;

const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;
const STRETCH_THRESHOLD_BPM: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Empty,
    Playing,
    Muted,
    Recording,
}

#[derive(Debug, Clone)]
pub struct LoopLayer {
    pub samples: Vec<f32>,
    pub gain: f32,
    pub active: bool,
}

impl LoopLayer {
    fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            gain: 1.0,
            active: true,
        }
    }
}

pub struct Loop {
    pub state: LoopState,
    layers: Vec<LoopLayer>,
    loop_length: usize,
    pos: f64,
    reversed: bool,
    speed: f32,
    pub length_in_bars: f64,
    pub crossfade_samples: usize,
    pub recorded_bpm: f64,
    pub current_bpm: f64,
    /// Indices of deactivated non-base layers, in the order they were
    /// undone; `redo_layer` reactivates from the front.
    undone_order: VecDeque<usize>,
    stretcher: Stretcher,
    raw_mix: Vec<f32>,
    /// Raw read position used by the most recent `process_sample` call, so
    /// `record_sample` can align an overdub with the content that was just
    /// played rather than with the (already advanced) next position.
    last_read_pos: usize,
}

impl Loop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Empty,
            layers: Vec::new(),
            loop_length: 0,
            pos: 0.0,
            reversed: false,
            speed: 1.0,
            length_in_bars: 0.0,
            crossfade_samples: 0,
            recorded_bpm: 0.0,
            current_bpm: 0.0,
            undone_order: VecDeque::new(),
            stretcher: Stretcher::new(),
            raw_mix: Vec::new(),
            last_read_pos: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state == LoopState::Empty
    }

    pub fn loop_length(&self) -> usize {
        self.loop_length
    }

    pub fn active_layer_count(&self) -> usize {
        self.layers.iter().filter(|l| l.active).count()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn reversed(&self) -> bool {
        self.reversed
    }

    pub fn play_pos(&self) -> usize {
        self.pos.floor() as usize
    }

    /// Install `audio` as the base layer, wiping any prior state. Called on
    /// both capture-fulfillment and classic-record-fulfillment.
    pub fn load_from_capture(&mut self, audio: Vec<f32>, bpm: f64, length_in_bars: f64) {
        self.loop_length = audio.len();
        self.layers = vec![LoopLayer::new(audio)];
        self.undone_order.clear();
        self.pos = 0.0;
        self.last_read_pos = 0;
        self.reversed = false;
        self.speed = 1.0;
        self.length_in_bars = length_in_bars;
        self.recorded_bpm = bpm;
        self.current_bpm = bpm;
        self.stretcher.reset();
        self.state = if self.loop_length == 0 {
            LoopState::Empty
        } else {
            LoopState::Playing
        };
        self.recompute_mix();
    }

    /// Append a layer, resizing `audio` to `loop_length` (truncating the tail
    /// or zero-extending) if it doesn't already match.
    pub fn add_layer(&mut self, mut audio: Vec<f32>) {
        audio.resize(self.loop_length, 0.0);
        self.layers.push(LoopLayer::new(audio));
        self.recompute_mix();
    }

    pub fn start_overdub(&mut self) {
        if self.is_empty() {
            return;
        }
        self.layers.push(LoopLayer::new(vec![0.0; self.loop_length]));
        self.state = LoopState::Recording;
        self.recompute_mix();
    }

    pub fn stop_overdub(&mut self) {
        if self.state == LoopState::Recording {
            self.state = LoopState::Playing;
            self.recompute_mix();
        }
    }

    /// Deactivate the most recent active non-base layer.
    pub fn undo_layer(&mut self) {
        if let Some(idx) = (1..self.layers.len()).rev().find(|&i| self.layers[i].active) {
            self.layers[idx].active = false;
            self.undone_order.push_back(idx);
            self.recompute_mix();
        }
    }

    /// Reactivate the earliest layer that was undone (FIFO).
    pub fn redo_layer(&mut self) {
        if let Some(idx) = self.undone_order.pop_front() {
            self.layers[idx].active = true;
            self.recompute_mix();
        }
    }

    pub fn toggle_mute(&mut self) {
        self.state = match self.state {
            LoopState::Muted => LoopState::Playing,
            LoopState::Playing => LoopState::Muted,
            other => other,
        };
    }

    pub fn set_muted(&mut self, muted: bool) {
        if muted {
            if self.state == LoopState::Playing {
                self.state = LoopState::Muted;
            }
        } else if self.state == LoopState::Muted {
            self.state = LoopState::Playing;
        }
    }

    pub fn toggle_reverse(&mut self) {
        self.reversed = !self.reversed;
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }

    pub fn clear(&mut self) {
        self.state = LoopState::Empty;
        self.layers.clear();
        self.loop_length = 0;
        self.pos = 0.0;
        self.last_read_pos = 0;
        self.reversed = false;
        self.speed = 1.0;
        self.length_in_bars = 0.0;
        self.recorded_bpm = 0.0;
        self.current_bpm = 0.0;
        self.undone_order.clear();
        self.stretcher.reset();
        self.raw_mix.clear();
    }

    pub fn set_current_bpm(&mut self, bpm: f64) {
        let was_active = self.is_stretch_active();
        self.current_bpm = bpm;
        let now_active = self.is_stretch_active();
        if now_active && !was_active {
            self.recompute_mix();
            self.stretcher.configure(self.pos);
        } else if !now_active && was_active {
            self.stretcher.reset();
        }
    }

    pub fn is_stretch_active(&self) -> bool {
        self.recorded_bpm > 0.0
            && self.current_bpm > 0.0
            && (self.current_bpm - self.recorded_bpm).abs() > STRETCH_THRESHOLD_BPM
    }

    fn recompute_mix(&mut self) {
        if self.loop_length == 0 {
            self.raw_mix.clear();
            return;
        }
        let mut mix = vec![0.0; self.loop_length];
        for layer in &self.layers {
            if layer.active {
                for (m, s) in mix.iter_mut().zip(layer.samples.iter()) {
                    *m += s * layer.gain;
                }
            }
        }
        self.raw_mix = mix;
    }

    fn crossfade_gain(&self, pos: usize) -> f32 {
        let cf = self.crossfade_samples;
        if cf == 0 || self.loop_length <= 2 * cf {
            return 1.0;
        }
        if pos < cf {
            pos as f32 / cf as f32
        } else if pos >= self.loop_length - cf {
            (self.loop_length - pos) as f32 / cf as f32
        } else {
            1.0
        }
    }

    /// Produce one output sample and advance playback position.
    pub fn process_sample(&mut self) -> f32 {
        if self.is_empty() || self.loop_length == 0 {
            return 0.0;
        }
        if self.is_stretch_active() {
            return self.process_stretched_sample();
        }

        let idx = self.play_pos().min(self.loop_length - 1);
        let read_pos = if self.reversed {
            self.loop_length - 1 - idx
        } else {
            idx
        };
        self.last_read_pos = read_pos;
        let mut sample = 0.0;
        for layer in &self.layers {
            if layer.active {
                sample += layer.samples[read_pos] * layer.gain;
            }
        }
        sample *= self.crossfade_gain(idx);
        let out = if self.state == LoopState::Muted {
            0.0
        } else {
            sample
        };

        self.pos = (self.pos + self.speed as f64) % self.loop_length as f64;
        out
    }

    fn process_stretched_sample(&mut self) -> f32 {
        if self.raw_mix.is_empty() {
            return 0.0;
        }
        self.last_read_pos = (self.stretcher.read_pos().floor() as usize) % self.loop_length;
        let ratio = self.current_bpm / self.recorded_bpm;
        let sample = self.stretcher.next_sample(&self.raw_mix, ratio);
        let idx = self.play_pos().min(self.loop_length - 1);
        let gain = self.crossfade_gain(idx);
        self.pos = (self.pos + self.speed as f64) % self.loop_length as f64;
        if self.state == LoopState::Muted {
            0.0
        } else {
            sample * gain
        }
    }

    /// Add `input` into the newest layer at the raw position last read by
    /// `process_sample`, so an overdub lands on the content that was just
    /// played back rather than the (already advanced) next position; a
    /// no-op unless this loop is actively overdub-recording.
    pub fn record_sample(&mut self, input: f32) {
        if self.state != LoopState::Recording {
            return;
        }
        let pos = self.last_read_pos;
        if let Some(layer) = self.layers.last_mut() {
            if pos < layer.samples.len() {
                layer.samples[pos] += input;
            }
        }
    }
}

impl Default for Loop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_at_unit_speed() {
        let mut l = Loop::new();
        let audio = vec![1.0, 2.0, 3.0, 4.0];
        l.load_from_capture(audio.clone(), 120.0, 1.0);
        let out: Vec<f32> = (0..4).map(|_| l.process_sample()).collect();
        assert_eq!(out, audio);
    }

    #[test]
    fn test_double_reverse_returns_to_original_direction() {
        let mut l = Loop::new();
        l.load_from_capture(vec![1.0, 2.0, 3.0, 4.0], 120.0, 1.0);
        let before = l.reversed();
        l.toggle_reverse();
        l.toggle_reverse();
        assert_eq!(l.reversed(), before);
    }

    #[test]
    fn test_overdub_undo_redo_layers() {
        let mut l = Loop::new();
        l.load_from_capture(vec![1.0, 1.0, 1.0, 1.0], 120.0, 1.0);
        l.start_overdub();
        for _ in 0..4 {
            let _ = l.process_sample();
            l.record_sample(2.0);
        }
        l.stop_overdub();
        l.pos = 0.0;
        let mixed: Vec<f32> = (0..4).map(|_| l.process_sample()).collect();
        assert_eq!(mixed, vec![3.0, 3.0, 3.0, 3.0]);

        l.undo_layer();
        l.pos = 0.0;
        let undone: Vec<f32> = (0..4).map(|_| l.process_sample()).collect();
        assert_eq!(undone, vec![1.0, 1.0, 1.0, 1.0]);

        l.redo_layer();
        l.pos = 0.0;
        let redone: Vec<f32> = (0..4).map(|_| l.process_sample()).collect();
        assert_eq!(redone, vec![3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_speed_clamped() {
        let mut l = Loop::new();
        l.load_from_capture(vec![0.0; 8], 120.0, 1.0);
        l.set_speed(0.0);
        assert_eq!(l.speed(), MIN_SPEED);
        l.set_speed(10.0);
        assert_eq!(l.speed(), MAX_SPEED);
    }

    #[test]
    fn test_crossfade_disabled_when_loop_too_short() {
        let mut l = Loop::new();
        l.load_from_capture(vec![1.0; 4], 120.0, 1.0);
        l.crossfade_samples = 10;
        assert_eq!(l.crossfade_gain(0), 1.0);
    }

    #[test]
    fn test_stretch_activates_above_threshold() {
        let mut l = Loop::new();
        l.load_from_capture(vec![0.1; 2048], 120.0, 1.0);
        assert!(!l.is_stretch_active());
        l.set_current_bpm(60.0);
        assert!(l.is_stretch_active());
    }

    #[test]
    fn test_tempo_follow_halves_raw_advance_rate() {
        // A 2-bar loop captured at 120 BPM, played back at 60 BPM: stretch
        // activates and the underlying raw read cursor should advance at
        // roughly half the rate of samples produced (half-speed, preserved
        // pitch), landing near 48_000 after 96_000 output samples.
        let mut l = Loop::new();
        l.load_from_capture(vec![0.2; 96_000], 120.0, 2.0);
        l.set_current_bpm(60.0);
        assert!(l.is_stretch_active());
        for _ in 0..96_000 {
            l.process_sample();
        }
        let read_pos = l.stretcher.read_pos();
        assert!(
            (read_pos - 48_000.0).abs() < 4096.0,
            "raw read_pos {} expected ~48000",
            read_pos
        );
    }

    #[test]
    fn test_clear_resets_to_empty() {
        let mut l = Loop::new();
        l.load_from_capture(vec![1.0; 4], 120.0, 1.0);
        l.clear();
        assert!(l.is_empty());
        assert_eq!(l.process_sample(), 0.0);
    }
}
