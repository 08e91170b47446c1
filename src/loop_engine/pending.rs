//! Per-loop pending operations, snapped to sample-index deadlines.
//!
//! Eight independent slots (one per operation family) hold at most one
//! pending op each; writing to a slot overwrites whatever was pending there
//! ("last write wins"), while slots across families never displace each
//! other — a pending mute does not cancel a pending reverse. This lets a
//! performer change their mind about one thing right up until the boundary
//! hits without losing other scheduled changes.

use crate::audio::Quantize;

/// One pending operation, with the sample at which it should fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingOp<T> {
    pub execute_sample: u64,
    pub quantize: Quantize,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOp {
    Capture { lookback_samples: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOp {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteOp {
    Mute,
    Unmute,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverdubOp {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverseOp {
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedOp {
    Set(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOp {
    Undo(u32),
    Redo(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOp {
    Clear,
}

/// The eight independent pending-operation slots for one loop.
#[derive(Default)]
pub struct PendingState {
    pub capture: Option<PendingOp<CaptureOp>>,
    pub record: Option<PendingOp<RecordOp>>,
    pub mute: Option<PendingOp<MuteOp>>,
    pub overdub: Option<PendingOp<OverdubOp>>,
    pub reverse: Option<PendingOp<ReverseOp>>,
    pub speed: Option<PendingOp<SpeedOp>>,
    pub undo: Option<PendingOp<UndoOp>>,
    pub clear: Option<PendingOp<ClearOp>>,
}

impl PendingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_any(&self) -> bool {
        self.capture.is_some()
            || self.record.is_some()
            || self.mute.is_some()
            || self.overdub.is_some()
            || self.reverse.is_some()
            || self.speed.is_some()
            || self.undo.is_some()
            || self.clear.is_some()
    }

    /// Drop every pending slot.
    pub fn cancel_all(&mut self) {
        self.capture = None;
        self.record = None;
        self.mute = None;
        self.overdub = None;
        self.reverse = None;
        self.speed = None;
        self.undo = None;
        self.clear = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_within_a_slot() {
        let mut p = PendingState::new();
        p.reverse = Some(PendingOp {
            execute_sample: 100,
            quantize: Quantize::Bar,
            value: ReverseOp::Toggle,
        });
        p.reverse = Some(PendingOp {
            execute_sample: 200,
            quantize: Quantize::Bar,
            value: ReverseOp::Toggle,
        });
        assert_eq!(p.reverse.unwrap().execute_sample, 200);
    }

    #[test]
    fn test_independent_slots_do_not_displace_each_other() {
        let mut p = PendingState::new();
        p.mute = Some(PendingOp {
            execute_sample: 10,
            quantize: Quantize::Beat,
            value: MuteOp::Mute,
        });
        p.reverse = Some(PendingOp {
            execute_sample: 20,
            quantize: Quantize::Beat,
            value: ReverseOp::Toggle,
        });
        assert!(p.mute.is_some());
        assert!(p.reverse.is_some());
    }

    #[test]
    fn test_cancel_all_clears_every_slot() {
        let mut p = PendingState::new();
        p.mute = Some(PendingOp {
            execute_sample: 10,
            quantize: Quantize::Beat,
            value: MuteOp::Mute,
        });
        p.clear = Some(PendingOp {
            execute_sample: 10,
            quantize: Quantize::Beat,
            value: ClearOp::Clear,
        });
        p.cancel_all();
        assert!(!p.has_any());
    }
}
