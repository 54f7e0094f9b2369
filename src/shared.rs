//! Shared/main state: the song-level registers that all three channels
//! read and write (tempo, and the shadows of the two registers physically
//! shared across voices).

use crate::tempo::bpm_x10 as compute_bpm_x10;

/// Registers and scratch state owned by the driver as a whole rather than
/// by any one channel.
#[derive(Debug, Clone)]
pub(crate) struct SharedState {
    /// Ticks per 96th note, in 2 ms units. Always `> 0` while the driver
    /// is in use.
    pub tempo_val: u8,
    /// Countdown to the next channel tick; resets to `tempo_val` each
    /// time it reaches zero.
    pub tempo_counter: u8,
    /// Derived tempo, BPM×10, recomputed whenever `tempo_val` changes.
    pub bpm_x10: u16,
    /// Shadow of the shared noise-period register (6).
    pub reg6_value: u8,
    /// Shadow of the shared mixer register (7).
    pub reg7_value: u8,
    /// Scratch value the `I` opcode writes, readable by the host.
    pub i_command_value: u8,
    /// Reserved fade slots carried from the data model for fidelity; no
    /// opcode in this dialect drives them.
    pub fade_value: u8,
    /// See [`SharedState::fade_value`].
    pub fade_step: i8,
    /// See [`SharedState::fade_value`].
    pub fade_active: bool,
}

impl SharedState {
    pub fn new() -> Self {
        let tempo_val = 10;
        Self {
            tempo_val,
            tempo_counter: tempo_val,
            bpm_x10: compute_bpm_x10(tempo_val),
            reg6_value: 0,
            reg7_value: 0,
            i_command_value: 0,
            fade_value: 0,
            fade_step: 0,
            fade_active: false,
        }
    }

    /// Sets `tempo_val` and recomputes `bpm_x10`. Does not touch
    /// `tempo_counter` — an in-flight countdown runs to completion against
    /// the old tempo, matching a bytecode `T` command taking effect on the
    /// next tempo boundary rather than retroactively.
    pub fn set_tempo(&mut self, t96: u8) {
        self.tempo_val = t96;
        self.bpm_x10 = compute_bpm_x10(t96);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
