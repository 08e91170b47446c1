//! Tempo-following, pitch-preserving time stretch.
//!
//! A phase-vocoder stretcher: analysis frames are windowed and FFT'd at a hop
//! that varies with the tempo ratio, bin phases are advanced by the
//! ratio-compensated expected increment, and synthesis frames are IFFT'd and
//! overlap-added at a fixed output hop. Grounded in the teacher's
//! `analysis/features/fft.rs` (`FftPlanner<f32>` plus a precomputed Hann
//! window), repurposed here from spectral analysis into resynthesis.
//!
//! Fixed contract per the engine: `configure` (re)allocates all working
//! buffers once, `process`/`next_sample` consume raw loop samples and
//! produce stretched output with no further allocation, and `reset` clears
//! phase/overlap state without deallocating.
//!
//! A synthesis frame covers `HOP_OUT` output samples, but the engine mixes
//! one sample at a time; a full analysis/synthesis step only runs once every
//! `HOP_OUT` samples requested, with the remainder served out of `ready`.
//! `next_sample` and `process` share this buffer, so callers may freely mix
//! single-sample and batched calls without losing alignment.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

const FRAME_SIZE: usize = 1024;
const HOP_OUT: usize = FRAME_SIZE / 4;

pub struct Stretcher {
    fft_fwd: Arc<dyn Fft<f32>>,
    fft_inv: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    last_input_phase: Vec<f32>,
    last_output_phase: Vec<f32>,
    overlap: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    /// The most recently synthesized `HOP_OUT`-sample block, not yet fully
    /// handed out; `ready_pos == HOP_OUT` means it's exhausted.
    ready: Vec<f32>,
    ready_pos: usize,
    /// Fractional read position into the raw loop buffer, advanced by
    /// `hop_in` (which varies with the tempo ratio) each analysis step.
    read_pos: f64,
    configured: bool,
}

impl Stretcher {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft_fwd = planner.plan_fft_forward(FRAME_SIZE);
        let fft_inv = planner.plan_fft_inverse(FRAME_SIZE);
        let window = hann_window(FRAME_SIZE);
        Self {
            fft_fwd,
            fft_inv,
            window,
            last_input_phase: vec![0.0; FRAME_SIZE],
            last_output_phase: vec![0.0; FRAME_SIZE],
            overlap: vec![0.0; FRAME_SIZE],
            scratch: vec![Complex::new(0.0, 0.0); FRAME_SIZE],
            ready: vec![0.0; HOP_OUT],
            ready_pos: HOP_OUT,
            read_pos: 0.0,
            configured: false,
        }
    }

    /// (Re)configure for a fresh loop; must be called before `process` the
    /// first time a loop starts stretching, and again whenever the raw
    /// source content changes out from under the stretcher (e.g. a new
    /// capture/record replaces the loop).
    pub fn configure(&mut self, start_read_pos: f64) {
        self.read_pos = start_read_pos;
        self.reset();
        self.configured = true;
    }

    /// Clear phase-tracking and overlap-add state without touching
    /// `read_pos` or reallocating.
    pub fn reset(&mut self) {
        self.last_input_phase.iter_mut().for_each(|p| *p = 0.0);
        self.last_output_phase.iter_mut().for_each(|p| *p = 0.0);
        self.overlap.iter_mut().for_each(|s| *s = 0.0);
        self.ready_pos = HOP_OUT;
    }

    pub fn read_pos(&self) -> f64 {
        self.read_pos
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Produce one stretched sample at tempo ratio `ratio`
    /// (`current_bpm / recorded_bpm`), reading from `raw` (the loop's
    /// underlying samples, indexed modulo `raw.len()`). This is the engine's
    /// per-sample entry point; a new analysis/synthesis step only runs once
    /// every `HOP_OUT` calls.
    pub fn next_sample(&mut self, raw: &[f32], ratio: f64) -> f32 {
        if raw.is_empty() {
            return 0.0;
        }
        if self.ready_pos >= HOP_OUT {
            self.step_frame(raw, ratio.clamp(0.25, 4.0));
        }
        let s = self.ready[self.ready_pos];
        self.ready_pos += 1;
        s
    }

    /// Fill `out` with stretched samples, draining any already-synthesized
    /// block first. Returns the number of raw samples the read cursor
    /// advanced by during this call (0 when served entirely from `ready`).
    pub fn process(&mut self, raw: &[f32], ratio: f64, out: &mut [f32]) -> f64 {
        if raw.is_empty() || out.is_empty() {
            return 0.0;
        }
        let ratio = ratio.clamp(0.25, 4.0);
        let mut produced = 0;
        let mut consumed = 0.0;

        while produced < out.len() {
            if self.ready_pos >= HOP_OUT {
                consumed += self.step_frame(raw, ratio);
            }
            let take = (HOP_OUT - self.ready_pos).min(out.len() - produced);
            out[produced..produced + take]
                .copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + take]);
            self.ready_pos += take;
            produced += take;
        }

        consumed
    }

    /// Run one analysis/synthesis step, refilling `ready` with a fresh
    /// `HOP_OUT`-sample block and advancing `read_pos` by `hop_in`. Returns
    /// `hop_in`, the number of raw samples consumed.
    fn step_frame(&mut self, raw: &[f32], ratio: f64) -> f64 {
        let hop_in = HOP_OUT as f64 * ratio;
        let n = raw.len();
        let base = self.read_pos.floor() as i64;
        for i in 0..FRAME_SIZE {
            let idx = (base + i as i64).rem_euclid(n as i64) as usize;
            self.scratch[i] = Complex::new(raw[idx] * self.window[i], 0.0);
        }
        self.fft_fwd.process(&mut self.scratch);

        let expected_in_phase_inc = 2.0 * std::f32::consts::PI * hop_in as f32 / FRAME_SIZE as f32;
        let expected_out_phase_inc =
            2.0 * std::f32::consts::PI * HOP_OUT as f32 / FRAME_SIZE as f32;

        for bin in 0..FRAME_SIZE {
            let mag = self.scratch[bin].norm();
            let phase = self.scratch[bin].arg();
            let delta =
                phase - self.last_input_phase[bin] - expected_in_phase_inc * bin as f32;
            let wrapped = wrap_phase(delta);
            self.last_input_phase[bin] = phase;
            let true_freq_phase = expected_in_phase_inc * bin as f32 + wrapped;
            let out_phase = self.last_output_phase[bin]
                + true_freq_phase * (expected_out_phase_inc / expected_in_phase_inc.max(1e-9));
            self.last_output_phase[bin] = out_phase;
            self.scratch[bin] = Complex::from_polar(mag, out_phase);
        }

        self.fft_inv.process(&mut self.scratch);
        let norm = 1.0 / FRAME_SIZE as f32;
        for i in 0..FRAME_SIZE {
            let windowed = self.scratch[i].re * norm * self.window[i];
            if i < self.overlap.len() {
                self.overlap[i] += windowed;
            }
        }

        self.ready.copy_from_slice(&self.overlap[..HOP_OUT]);
        self.ready_pos = 0;

        // Shift the overlap buffer left by HOP_OUT.
        self.overlap.copy_within(HOP_OUT.., 0);
        for s in &mut self.overlap[FRAME_SIZE - HOP_OUT..] {
            *s = 0.0;
        }

        self.read_pos = (self.read_pos + hop_in) % n as f64;
        hop_in
    }
}

impl Default for Stretcher {
    fn default() -> Self {
        Self::new()
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

fn wrap_phase(phase: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    let mut p = phase;
    while p > std::f32::consts::PI {
        p -= two_pi;
    }
    while p < -std::f32::consts::PI {
        p += two_pi;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_ratio_consumes_roughly_half_the_samples() {
        let mut s = Stretcher::new();
        s.configure(0.0);
        let raw: Vec<f32> = (0..96_000).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut out = vec![0.0; 96_000];
        let consumed = s.process(&raw, 0.5, &mut out);
        // Expect consumption proportional to ratio, within a couple of frames' slack.
        let expected = 0.5 * 96_000.0;
        assert!(
            (consumed - expected).abs() < FRAME_SIZE as f64 * 4.0,
            "consumed {} expected ~{}",
            consumed,
            expected
        );
    }

    #[test]
    fn test_ratio_one_consumes_roughly_the_output_length() {
        let mut s = Stretcher::new();
        s.configure(0.0);
        let raw: Vec<f32> = (0..48_000).map(|i| (i as f32 * 0.02).sin()).collect();
        let mut out = vec![0.0; 48_000];
        let consumed = s.process(&raw, 1.0, &mut out);
        assert!((consumed - 48_000.0).abs() < FRAME_SIZE as f64 * 4.0);
    }

    #[test]
    fn test_reset_clears_phase_state_without_changing_read_pos() {
        let mut s = Stretcher::new();
        s.configure(100.0);
        let raw = vec![0.1; 4096];
        let mut out = vec![0.0; 512];
        s.process(&raw, 1.0, &mut out);
        s.reset();
        assert!(s.last_input_phase.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_output_is_finite() {
        let mut s = Stretcher::new();
        s.configure(0.0);
        let raw: Vec<f32> = (0..8192).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let mut out = vec![0.0; 4096];
        s.process(&raw, 1.3, &mut out);
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_next_sample_matches_process_over_same_span() {
        // Calling next_sample() one at a time must advance read_pos
        // identically to calling process() once for the whole span,
        // regardless of how the output is chunked.
        let raw: Vec<f32> = (0..48_000).map(|i| (i as f32 * 0.02).sin()).collect();

        let mut batched = Stretcher::new();
        batched.configure(0.0);
        let mut out = vec![0.0; 4096];
        batched.process(&raw, 0.5, &mut out);

        let mut stepped = Stretcher::new();
        stepped.configure(0.0);
        for _ in 0..4096 {
            stepped.next_sample(&raw, 0.5);
        }

        assert_eq!(batched.read_pos(), stepped.read_pos());
    }
}
