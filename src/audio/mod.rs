//! Per-channel audio plumbing: ring buffers, activity detection, the
//! sample-accurate metronome, the click generator, and MIDI clock output.

pub mod click;
pub mod input_channel;
pub mod metronome;
pub mod midi_clock;
pub mod ring_buffer;

pub use click::Click;
pub use input_channel::InputChannel;
pub use metronome::{Metronome, MetronomePosition, Quantize};
pub use midi_clock::MidiClock;
pub use ring_buffer::RingBuffer;
