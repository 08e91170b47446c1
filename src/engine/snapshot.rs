//! Non-blocking state snapshot for consumers off the audio thread.
//!
//! The audio thread only ever *tries* to lock the snapshot mutex, and never
//! allocates while doing so: `loops`/`input_channels` are pre-sized at
//! construction and refreshed in place, element by element, rather than
//! rebuilt. On contention the audio thread skips publishing for that block
//! rather than waiting — the next block's publish attempt will catch up.
//! Consumers (UI, tests) take a normal blocking lock and may allocate freely,
//! since they are never on the real-time path. Grounded in
//! `other_examples/d2ebe211_..._engine.rs.rs`'s `try_lock` discipline and the
//! teacher's `telemetry/mod.rs` bounded-history shape (here stripped of its
//! tokio broadcast sender, since this crate has no async runtime).

use crate::audio::Quantize;
use crate::loop_engine::LoopState;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct LoopSnapshot {
    pub state: LoopStateSnapshot,
    pub loop_length: usize,
    pub length_in_bars: f64,
    pub layer_count: usize,
    pub active_layer_count: usize,
    pub speed: f32,
    pub reversed: bool,
    pub play_pos: usize,
    pub recorded_bpm: f64,
}

/// `serde`-friendly mirror of `loop_engine::LoopState` (the original isn't
/// derived for serde since it lives on the hot path and shouldn't carry that
/// dependency into its definition).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopStateSnapshot {
    #[default]
    Empty,
    Playing,
    Muted,
    Recording,
}

impl From<LoopState> for LoopStateSnapshot {
    fn from(s: LoopState) -> Self {
        match s {
            LoopState::Empty => LoopStateSnapshot::Empty,
            LoopState::Playing => LoopStateSnapshot::Playing,
            LoopState::Muted => LoopStateSnapshot::Muted,
            LoopState::Recording => LoopStateSnapshot::Recording,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct InputChannelSnapshot {
    pub peak: f32,
    pub live: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSnapshot {
    pub total_samples: u64,
    pub bar: u64,
    pub beat: u32,
    pub bpm: f64,
    pub loops: Vec<LoopSnapshot>,
    pub input_channels: Vec<InputChannelSnapshot>,
    pub is_recording: bool,
    pub recording_loop_idx: Option<usize>,
    pub default_quantize: Quantize,
    pub recent_messages: Vec<String>,
}

const MAX_RECENT_MESSAGES: usize = 64;

/// The mutable half of the snapshot, updated via `try_lock` from the audio
/// thread and read via a blocking lock from any other thread. `loops` and
/// `input_channels` are allocated once, at `SnapshotPublisher::new`, to the
/// engine's fixed loop/channel counts, and never resized afterward.
struct PublishedState {
    total_samples: u64,
    bar: u64,
    beat: u32,
    bpm: f64,
    loops: Vec<LoopSnapshot>,
    input_channels: Vec<InputChannelSnapshot>,
    is_recording: bool,
    recording_loop_idx: Option<usize>,
    default_quantize: Quantize,
    recent_messages: VecDeque<String>,
    /// Whether `try_publish` has ever succeeded; `latest()` returns `None`
    /// until it has, same as the old `Option<EngineSnapshot>` did.
    published: bool,
}

pub struct SnapshotPublisher {
    inner: Mutex<PublishedState>,
}

impl SnapshotPublisher {
    /// `num_loops`/`num_input_channels` size the snapshot buffers once,
    /// up front, so the audio thread's per-block `try_publish` never
    /// allocates or resizes them.
    pub fn new(num_loops: usize, num_input_channels: usize) -> Self {
        Self {
            inner: Mutex::new(PublishedState {
                total_samples: 0,
                bar: 0,
                beat: 0,
                bpm: 0.0,
                loops: vec![LoopSnapshot::default(); num_loops],
                input_channels: vec![InputChannelSnapshot::default(); num_input_channels],
                is_recording: false,
                recording_loop_idx: None,
                default_quantize: Quantize::Free,
                recent_messages: VecDeque::new(),
                published: false,
            }),
        }
    }

    /// Attempt to publish fresh engine state; a contended lock is not waited
    /// on — the caller should just try again next block. `loops` and
    /// `input_channels` must have the same lengths passed to `new`; every
    /// field is written in place, so this never allocates.
    #[allow(clippy::too_many_arguments)]
    pub fn try_publish(
        &self,
        total_samples: u64,
        bar: u64,
        beat: u32,
        bpm: f64,
        loops: &[LoopSnapshot],
        input_channels: &[InputChannelSnapshot],
        is_recording: bool,
        recording_loop_idx: Option<usize>,
        default_quantize: Quantize,
    ) -> bool {
        if let Ok(mut guard) = self.inner.try_lock() {
            guard.total_samples = total_samples;
            guard.bar = bar;
            guard.beat = beat;
            guard.bpm = bpm;
            guard.loops.copy_from_slice(loops);
            guard.input_channels.copy_from_slice(input_channels);
            guard.is_recording = is_recording;
            guard.recording_loop_idx = recording_loop_idx;
            guard.default_quantize = default_quantize;
            guard.published = true;
            true
        } else {
            false
        }
    }

    /// Append a diagnostic message, dropping the oldest once the ring is
    /// full. Also try-lock only, so a contended log write is silently
    /// skipped rather than blocking the audio thread.
    pub fn try_log(&self, message: String) {
        if let Ok(mut guard) = self.inner.try_lock() {
            if guard.recent_messages.len() >= MAX_RECENT_MESSAGES {
                guard.recent_messages.pop_front();
            }
            guard.recent_messages.push_back(message);
        }
    }

    /// Blocking read, for non-real-time consumers. Never called from the
    /// audio thread.
    pub fn latest(&self) -> Option<EngineSnapshot> {
        let guard = self.inner.lock().unwrap();
        if !guard.published {
            return None;
        }
        Some(EngineSnapshot {
            total_samples: guard.total_samples,
            bar: guard.bar,
            beat: guard.beat,
            bpm: guard.bpm,
            loops: guard.loops.clone(),
            input_channels: guard.input_channels.clone(),
            is_recording: guard.is_recording,
            recording_loop_idx: guard.recording_loop_idx,
            default_quantize: guard.default_quantize,
            recent_messages: guard.recent_messages.iter().cloned().collect(),
        })
    }

    /// Blocking read of just the diagnostics ring, for non-real-time
    /// consumers. Never called from the audio thread.
    pub fn recent_messages(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .recent_messages
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_then_read() {
        let publisher = SnapshotPublisher::new(2, 1);
        assert!(publisher.latest().is_none());
        let loops = vec![LoopSnapshot::default(); 2];
        let channels = vec![InputChannelSnapshot::default(); 1];
        publisher.try_publish(0, 0, 0, 120.0, &loops, &channels, false, None, Quantize::Bar);
        let snap = publisher.latest().unwrap();
        assert_eq!(snap.bpm, 120.0);
        assert_eq!(snap.loops.len(), 2);
        assert_eq!(snap.input_channels.len(), 1);
    }

    #[test]
    fn test_recent_messages_bounded() {
        let publisher = SnapshotPublisher::new(0, 0);
        for i in 0..(MAX_RECENT_MESSAGES + 10) {
            publisher.try_log(format!("msg {}", i));
        }
        assert_eq!(publisher.recent_messages().len(), MAX_RECENT_MESSAGES);
    }
}
