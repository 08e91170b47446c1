//! Fixed-capacity circular sample store with lookback reads.
//!
//! Every input channel keeps one of these running continuously so that a
//! "capture" can reach backward into audio that arrived before the capture
//! command was ever issued. Capacity is fixed at construction; writes never
//! allocate and never fail, overwriting the oldest data once full.

/// A fixed-capacity ring of `f32` samples.
pub struct RingBuffer {
    data: Vec<f32>,
    capacity: usize,
    write_pos: usize,
    total_written: u64,
}

impl RingBuffer {
    /// Create a ring buffer holding up to `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            data: vec![0.0; capacity],
            capacity,
            write_pos: 0,
            total_written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid samples currently held: `min(total_written, capacity)`.
    pub fn available(&self) -> u64 {
        self.total_written.min(self.capacity as u64)
    }

    /// Append `samples` to the buffer, wrapping and overwriting the oldest
    /// data as needed. If `samples` is longer than capacity, only its tail
    /// survives.
    pub fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let src = if samples.len() > self.capacity {
            self.write_pos = 0;
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        let mut remaining = src;
        while !remaining.is_empty() {
            let space_to_end = self.capacity - self.write_pos;
            let chunk = remaining.len().min(space_to_end);
            self.data[self.write_pos..self.write_pos + chunk].copy_from_slice(&remaining[..chunk]);
            self.write_pos = (self.write_pos + chunk) % self.capacity;
            remaining = &remaining[chunk..];
        }
        self.total_written += src.len() as u64;
    }

    /// Write one sample; equivalent to `write(&[s])` but avoids a slice
    /// round-trip on the audio thread's hottest path.
    pub fn write_sample(&mut self, s: f32) {
        self.data[self.write_pos] = s;
        self.write_pos = (self.write_pos + 1) % self.capacity;
        self.total_written += 1;
    }

    /// Copy the most recent `n` samples into `out` (oldest first). If fewer
    /// than `n` samples are available, the missing leading portion of `out`
    /// is zero-filled.
    pub fn read_most_recent(&self, n: usize, out: &mut [f32]) {
        self.read_from_past(n, 0, out);
    }

    /// Copy `n` samples starting `samples_ago` samples before the write
    /// cursor into `out` (oldest first). `samples_ago` is clamped to
    /// `available()`; any destination slots for which no data exists are
    /// zero-filled.
    pub fn read_from_past(&self, n: usize, samples_ago: u64, out: &mut [f32]) {
        assert!(out.len() >= n, "out buffer too small");
        let available = self.available();

        // out[n-1] is `samples_ago` samples old; out[0] is `samples_ago + n - 1`
        // samples old. A given slot is zero-filled if its age has no backing data.
        for i in 0..n {
            let age = samples_ago + (n - 1 - i) as u64;
            out[i] = if age < available {
                let idx = ((self.write_pos as i64 - 1 - age as i64)
                    .rem_euclid(self.capacity as i64)) as usize;
                self.data[idx]
            } else {
                0.0
            };
        }
    }

    /// Reset to the empty state without freeing the backing allocation.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.write_pos = 0;
        self.total_written = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_before_and_after_wrap() {
        let mut rb = RingBuffer::new(4);
        assert_eq!(rb.available(), 0);
        rb.write(&[1.0, 2.0]);
        assert_eq!(rb.available(), 2);
        rb.write(&[3.0, 4.0, 5.0]);
        assert_eq!(rb.available(), 4);
    }

    #[test]
    fn test_write_then_read_most_recent_roundtrip() {
        let mut rb = RingBuffer::new(8);
        let input = [1.0, 2.0, 3.0, 4.0];
        rb.write(&input);
        let mut out = [0.0; 4];
        rb.read_most_recent(4, &mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn test_read_from_past_zero_pads_when_insufficient_history() {
        let mut rb = RingBuffer::new(8);
        rb.write(&[1.0, 2.0]);
        let mut out = [0.0; 4];
        rb.read_from_past(4, 0, &mut out);
        assert_eq!(out, [0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_wraparound_read() {
        let mut rb = RingBuffer::new(4);
        rb.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // capacity 4, last 4 written are 3,4,5,6
        let mut out = [0.0; 4];
        rb.read_most_recent(4, &mut out);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_read_from_past_lookback() {
        let mut rb = RingBuffer::new(8);
        rb.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut out = [0.0; 2];
        // Most recent sample (6) is age 0; 2 samples whose newest is age 4
        // covers ages [4, 5], i.e. values 2 (age 4) and 1 (age 5).
        rb.read_from_past(2, 4, &mut out);
        assert_eq!(out, [1.0, 2.0]);
    }

    #[test]
    fn test_clear_resets_available() {
        let mut rb = RingBuffer::new(4);
        rb.write(&[1.0, 2.0, 3.0]);
        rb.clear();
        assert_eq!(rb.available(), 0);
        let mut out = [1.0; 4];
        rb.read_most_recent(4, &mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_write_longer_than_capacity_keeps_tail() {
        let mut rb = RingBuffer::new(3);
        rb.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut out = [0.0; 3];
        rb.read_most_recent(3, &mut out);
        assert_eq!(out, [3.0, 4.0, 5.0]);
    }
}
