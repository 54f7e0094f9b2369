//! Per-voice channel state (C3).

use bitflags::bitflags;

bitflags! {
    /// Per-channel status bits. Bit layout mirrors the source for
    /// documentation fidelity; nest depth is tracked as a plain `u8`
    /// field rather than packed into this byte (see [`Channel::nest_depth`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelFlags: u8 {
        /// The channel is in its gated-off / rest tail: volume stays 0
        /// and no envelope/LFO work executes.
        const REST = 0x80;
        /// The vibrato LFO is programmed and running.
        const VIB_ON = 0x40;
        /// Vibrato phase sign: set means the LFO is currently subtracting
        /// from `freq_value`.
        const VIB_PM = 0x20;
        /// The software envelope is in its second stage.
        const EG_STAGE2 = 0x10;
        /// This note is tied to the previous one.
        const TIE = 0x08;
    }
}

/// PSG register offsets, parameterized by channel index (`0..=2`).
pub(crate) const NOISEPER: u8 = 6;
pub(crate) const MIXER: u8 = 7;

pub(crate) fn afine(ch: u8) -> u8 {
    ch * 2
}

pub(crate) fn acoarse(ch: u8) -> u8 {
    ch * 2 + 1
}

pub(crate) fn avol(ch: u8) -> u8 {
    8 + ch
}

/// One voice's complete bytecode cursor, programmable defaults, and
/// per-tick working state.
///
/// Owned by the driver, never aliased across threads; the only inputs
/// from outside are its bytecode buffer (copied in at load time, see the
/// crate design notes on owned vs. borrowed buffers) and `tick` calls.
#[derive(Debug, Clone)]
pub struct Channel {
    pub(crate) channel_index: u8,

    pub(crate) data: Vec<u8>,
    pub(crate) offset: usize,

    pub(crate) wait_counter: u16,
    pub(crate) q_counter: u8,

    pub(crate) l_default: u8,
    pub(crate) lplus_default: u8,
    pub(crate) q_default: u8,
    pub(crate) volume: u8,
    pub(crate) octave: u8,
    pub(crate) detune: u8,

    pub(crate) nest_flag: [u8; 4],
    pub(crate) nest_depth: u8,
    pub(crate) l_backup: u8,
    pub(crate) lplus_backup: u8,
    pub(crate) nest_octave_backup: u8,

    pub(crate) j_return_offset: u16,
    pub(crate) jump_octave_backup: u8,

    pub(crate) vib_wait_base: u8,
    pub(crate) vib_count_base: u8,
    pub(crate) vib_amp_base: u8,
    pub(crate) vib_delta_base: u8,
    pub(crate) vib_wait_work: u8,
    pub(crate) vib_count_work: u8,
    pub(crate) vib_amp_work: u8,
    pub(crate) vib_offset: i16,

    pub(crate) eg_width_base: i8,
    pub(crate) eg_delta_base: i8,
    pub(crate) eg2_width_base: i8,
    pub(crate) eg_count_base: u8,
    pub(crate) eg2_count_base: u8,
    pub(crate) eg_count_work: u8,
    pub(crate) eg_width_work: i8,
    pub(crate) volume_adjust: i8,

    pub(crate) flags: ChannelFlags,
    pub(crate) freq_value: u16,
    pub(crate) active: bool,

    /// Observability counter for the "unknown opcode" tolerance path.
    pub(crate) unknown_opcode_count: u32,
}

impl Channel {
    /// Creates a channel in its documented power-on defaults:
    /// `l=24, lplus=192, volume=12, octave=4`, inactive until a song is
    /// loaded.
    pub(crate) fn new(channel_index: u8) -> Self {
        Self {
            channel_index,
            data: Vec::new(),
            offset: 0,
            wait_counter: 1,
            q_counter: 0,
            l_default: 24,
            lplus_default: 192,
            q_default: 0,
            volume: 12,
            octave: 4,
            detune: 0,
            nest_flag: [0; 4],
            nest_depth: 0,
            l_backup: 0,
            lplus_backup: 0,
            nest_octave_backup: 0,
            j_return_offset: 0,
            jump_octave_backup: 0,
            vib_wait_base: 0,
            vib_count_base: 0,
            vib_amp_base: 0,
            vib_delta_base: 0,
            vib_wait_work: 0,
            vib_count_work: 0,
            vib_amp_work: 0,
            vib_offset: 0,
            eg_width_base: 0,
            eg_delta_base: 0,
            eg2_width_base: 0,
            eg_count_base: 0,
            eg2_count_base: 0,
            eg_count_work: 0,
            eg_width_work: 0,
            volume_adjust: 0,
            flags: ChannelFlags::empty(),
            freq_value: 0,
            active: false,
            unknown_opcode_count: 0,
        }
    }

    /// Assigns this channel a fresh bytecode buffer and resets its cursor
    /// and tick counters; programmable defaults (length/volume/octave/…)
    /// are left untouched, matching the documented "reset-free between
    /// songs" lifecycle.
    pub(crate) fn load(&mut self, data: &[u8]) {
        self.data = data.to_vec();
        self.offset = 0;
        self.wait_counter = 1;
        self.active = true;
    }

    /// Whether this channel is currently decoding bytecode (as opposed to
    /// ticking down the current note's remaining wait).
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reads the next byte from the bytecode buffer, advancing the
    /// cursor. Returns `None` on overrun rather than panicking or reading
    /// out of bounds.
    pub(crate) fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.offset)?;
        self.offset += 1;
        Some(byte)
    }

    /// Reads a little-endian `u16` operand, advancing the cursor by two
    /// bytes. Returns `None` (without partially advancing past what was
    /// actually available) on overrun.
    pub(crate) fn read_u16(&mut self) -> Option<u16> {
        let lo = self.read_u8()? as u16;
        let hi = self.read_u8()? as u16;
        Some(lo | (hi << 8))
    }
}
