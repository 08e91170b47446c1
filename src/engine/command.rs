//! Lock-free command queue from the control thread to the audio thread.
//!
//! # Why lock-free?
//!
//! A mutex-protected command queue causes audible dropouts: the control
//! thread holds the lock for a moment to push a command, the audio callback
//! calls `try_lock` and fails, and a failed lock means silence for that
//! block. With a lock-free SPSC ring, pushes and pops are both O(1) and
//! never block either side.
//!
//! `rtrb` is used exactly as in the teacher's buffer pool: a fixed-capacity
//! ring allocated once at startup, never resized.

use crate::audio::Quantize;

/// Capacity of the command queue. 256 commands is enough headroom for a
/// performer mashing buttons; if the queue fills, new commands are dropped
/// rather than the producer blocking.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// One operation a pending slot can hold, named exactly as in
/// `loop_engine::pending` so `ScheduleOp` commands map onto a slot 1:1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduledOp {
    Mute,
    Unmute,
    ToggleMute,
    StartOverdub,
    StopOverdub,
    ToggleReverse,
    Undo,
    Redo,
    Clear,
}

/// Commands sent from the control thread to the audio thread.
///
/// Each variant is processed at the next block boundary: scheduling ops are
/// slotted into the target loop's `PendingState` (§4.5), to fire once their
/// quantize deadline is reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    /// Schedule one of the toggle/undo-style ops on a loop.
    ScheduleOp {
        loop_idx: usize,
        op: ScheduledOp,
        quantize: Quantize,
    },
    /// Capture the last `lookback_bars` bars of input (0 = use the engine's
    /// current default) into `loop_idx`.
    CaptureLoop {
        loop_idx: usize,
        quantize: Quantize,
        lookback_bars: u32,
    },
    /// Start a classic record-from-now onto `loop_idx`.
    Record { loop_idx: usize, quantize: Quantize },
    /// Stop the classic recording in progress on `loop_idx`.
    StopRecord { loop_idx: usize, quantize: Quantize },
    /// Schedule a speed change on `loop_idx`.
    SetSpeed {
        loop_idx: usize,
        quantize: Quantize,
        speed: f32,
    },
    /// Change the global tempo.
    SetBpm { bpm: f64 },
    /// Drop every pending op on every loop.
    CancelPending,
    /// Drop every pending op on one loop.
    CancelPendingForLoop { loop_idx: usize },
}

/// Create a command channel: `(producer, consumer)`, producer owned by the
/// control thread, consumer owned by the audio thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_roundtrip() {
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::Record {
            loop_idx: 0,
            quantize: Quantize::Bar,
        })
        .unwrap();
        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, EngineCommand::Record { loop_idx: 0, .. }));
    }

    #[test]
    fn test_command_channel_empty_pop_errs() {
        let (_tx, mut rx) = command_channel();
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_queue_overflow_rejected_not_blocking() {
        let (mut tx, _rx) = command_channel();
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            tx.push(EngineCommand::CancelPending).unwrap();
        }
        assert!(tx.push(EngineCommand::CancelPending).is_err());
    }

    #[test]
    fn test_command_size_stays_small() {
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 32, "EngineCommand is {} bytes, expected <= 32", size);
    }
}
