//! PC-6001 PSG bytecode sequencer and voicing driver
//!
//! A driver for music scored against the PC-6001's PSG (a three-voice
//! square-wave + noise generator, AY-3-8910/YM2149 compatible). The driver
//! interprets a compact bytecode stream at a fixed 2 ms tick cadence and
//! emits PSG register writes through a pluggable [`Backend`], with
//! note/rest events fanned out through a pluggable [`NoteSink`].
//!
//! # Scope
//!
//! This crate owns the bytecode sequencer and per-voice state machine: note
//! gating, the software envelope ("EG"), LFO vibrato, detune, ties, tempo
//! conversion, and the three-voice synchronization contract for the shared
//! mixer (register 7) and noise period (register 6) registers.
//!
//! It deliberately does **not** own: parsing a song file into three channel
//! byte buffers (see [`Driver::load_song`], which takes already-split
//! slices), talking to real or emulated PSG hardware (see [`Backend`]), or
//! rendering a UI (see [`NoteSink`]). Those are external collaborators a
//! host wires in.
//!
//! # Quick start
//!
//! ```
//! use pc6001_psg_driver::{Backend, Driver, NoteEvent, NoteSink};
//!
//! struct RecordingBackend(Vec<(u8, u8)>);
//! impl Backend for RecordingBackend {
//!     fn write_reg(&mut self, reg: u8, val: u8) {
//!         self.0.push((reg, val));
//!     }
//! }
//!
//! struct NullSink;
//! impl NoteSink for NullSink {
//!     fn note_event(&mut self, _event: NoteEvent) {}
//! }
//!
//! // `0x85` = octave 5, `0x9F` = volume 15, `0x21` = note C length-1-byte,
//! // `96` = length, `0xFF` = end of stream.
//! let song_a = [0x85, 0x9F, 0x21, 96, 0xFF];
//! let mut driver = Driver::new();
//! driver.load_song(&song_a, &[0xFF], &[0xFF]).unwrap();
//!
//! let mut backend = RecordingBackend(Vec::new());
//! let mut sink = NullSink;
//! for _ in 0..10 {
//!     driver.tick(&mut backend, &mut sink);
//! }
//! ```

#![warn(missing_docs)]

mod backend;
mod channel;
mod config;
mod driver;
mod error;
mod interpreter;
mod mixer;
mod shared;
mod tempo;
mod tone;
mod voicing;

pub use backend::{Backend, NoteEvent, NoteSink};
pub use config::DriverConfig;
pub use driver::Driver;
pub use error::DriverError;
pub use tempo::bpm_x10;
pub use tone::tone;
