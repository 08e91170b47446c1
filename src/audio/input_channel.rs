//! One input channel: a continuous lookback ring buffer plus O(1) activity
//! ("is this channel live right now?") detection.
//!
//! A per-sample full-window scan to find the current peak would be too
//! expensive to run every block, so the window is divided into fixed-size
//! blocks; each block caches its own peak, and the channel's overall peak is
//! the max of the cached block peaks plus the in-progress block.

use crate::audio::ring_buffer::RingBuffer;

const BLOCK_SIZE: usize = 64;

pub struct InputChannel {
    ring: RingBuffer,
    threshold: f32,
    block_peaks: Vec<f32>,
    block_write_pos: usize,
    current_block_peak: f32,
    current_block_len: usize,
    cached_peak: f32,
}

impl InputChannel {
    /// `ring_capacity` sizes the lookback buffer; `window_samples` sizes the
    /// activity detection window (divided into `BLOCK_SIZE`-sample blocks).
    pub fn new(ring_capacity: usize, window_samples: usize, threshold: f32) -> Self {
        let num_blocks = (window_samples / BLOCK_SIZE).max(1);
        Self {
            ring: RingBuffer::new(ring_capacity),
            threshold,
            block_peaks: vec![0.0; num_blocks],
            block_write_pos: 0,
            current_block_peak: 0.0,
            current_block_len: 0,
            cached_peak: 0.0,
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Feed one input sample: store it in the lookback ring and update
    /// activity tracking.
    pub fn write_sample(&mut self, s: f32) {
        self.ring.write_sample(s);

        let mag = s.abs();
        if mag > self.current_block_peak {
            self.current_block_peak = mag;
        }
        self.current_block_len += 1;
        if self.current_block_len >= BLOCK_SIZE {
            self.block_peaks[self.block_write_pos] = self.current_block_peak;
            self.block_write_pos = (self.block_write_pos + 1) % self.block_peaks.len();
            self.cached_peak = self
                .block_peaks
                .iter()
                .cloned()
                .fold(0.0_f32, f32::max);
            self.current_block_peak = 0.0;
            self.current_block_len = 0;
        }
    }

    /// Current activity level: the max of completed block peaks and the
    /// in-progress block.
    pub fn peak(&self) -> f32 {
        self.cached_peak.max(self.current_block_peak)
    }

    /// Whether this channel currently counts as carrying live input.
    pub fn is_live(&self) -> bool {
        self.threshold <= 0.0 || self.peak() > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_not_live_with_threshold() {
        let mut ch = InputChannel::new(1024, 256, 0.01);
        for _ in 0..512 {
            ch.write_sample(0.0);
        }
        assert!(!ch.is_live());
    }

    #[test]
    fn test_loud_input_becomes_live_after_one_block() {
        let mut ch = InputChannel::new(1024, 256, 0.01);
        for _ in 0..BLOCK_SIZE {
            ch.write_sample(0.5);
        }
        assert!(ch.is_live());
    }

    #[test]
    fn test_threshold_disabled_is_always_live() {
        let ch = InputChannel::new(1024, 256, 0.0);
        assert!(ch.is_live());
    }

    #[test]
    fn test_peak_tracks_in_progress_block_before_flush() {
        let mut ch = InputChannel::new(1024, 256, 0.01);
        ch.write_sample(0.8);
        assert!((ch.peak() - 0.8).abs() < 1e-6);
    }
}
