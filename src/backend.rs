//! External collaborator interfaces (C7, C9, C10): the hardware backend
//! and the note-event sink the driver fans register writes and note
//! events out through.
//!
//! Neither trait is implemented by this crate; a host supplies concrete
//! types (a real PSG chip driver, an emulator, a terminal UI, a test
//! recorder). The driver borrows both for the duration of each
//! [`crate::Driver::tick`] call and owns neither — the idiomatic
//! replacement for the source's `{write_reg_fn, note_event_fn, opaque}`
//! function-pointer-plus-context-pointer triple.

/// A PSG hardware backend (real chip or emulator).
///
/// Only [`Backend::write_reg`] is called by the driver itself;
/// `init`/`enable`/`disable`/`reset`/`fini` are exercised by the host
/// around the driver's lifetime, not by the driver, but live on the same
/// trait so one implementation satisfies the whole external contract.
pub trait Backend {
    /// Delivers `val` to PSG register `reg` (`0..=15`). Must be safe to
    /// call repeatedly while the backend is enabled.
    fn write_reg(&mut self, reg: u8, val: u8);

    /// Prepares the backend for use. Default implementation is a no-op;
    /// hosts that need one-time hardware setup override it.
    fn init(&mut self) {}

    /// Enables output on the backend. Default implementation is a no-op.
    fn enable(&mut self) {}

    /// Disables output on the backend. Default implementation is a no-op.
    fn disable(&mut self) {}

    /// Resets the backend to its power-on register state. Default
    /// implementation is a no-op.
    fn reset(&mut self) {}

    /// Releases any resources the backend holds. Default implementation
    /// is a no-op.
    fn fini(&mut self) {}

    /// Returns the backend's last error, if any, as a bounded string.
    /// The driver never calls this; it exists for the host to surface
    /// hardware failures that can't be propagated back into the
    /// interpreter (see the crate's error handling design).
    fn last_error(&self) -> Option<&str> {
        None
    }
}

/// A single note or rest decode, reported once per decode (never once
/// per tick — envelope-only ticks emit no event).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// Channel index, `0..=2` (A, B, C).
    pub ch: u8,
    /// Octave in use when the note was decoded, `1..=8`.
    pub octave: u8,
    /// Chromatic note, `0` (rest) or `1..=12` (C..B).
    pub note: u8,
    /// Emitted volume, `0..=15`.
    pub volume: u8,
    /// Note length in channel ticks.
    pub len: u16,
    /// Whether this decode was a rest.
    pub is_rest: bool,
    /// Current tempo, BPM×10, at the time of this decode.
    pub bpm_x10: u16,
}

/// Consumes note/rest events as the bytecode interpreter decodes them.
/// No feedback flows back into the driver; a sink is a pure observer
/// (terminal UI, logger, test recorder).
pub trait NoteSink {
    /// Called once per note or rest decode.
    fn note_event(&mut self, event: NoteEvent);
}
