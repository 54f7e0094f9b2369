//! Bytecode interpreter (C4): decodes one command/note object per
//! invocation, advancing the channel's cursor.
//!
//! The bytecode is a stream of one-byte opcodes with 0-5 inline operand
//! bytes. Bit 7 clear is a note/rest object; bit 7 set is a command
//! object. A command never consumes a channel tick: [`Channel::decode_until_note`]
//! loops over commands until it lands on (and processes) one note object,
//! or runs off the end of the buffer.

use crate::backend::{Backend, NoteEvent, NoteSink};
use crate::channel::{acoarse, afine, avol, Channel, ChannelFlags, MIXER, NOISEPER};
use crate::config::DriverConfig;
use crate::mixer::apply_mixer_command;
use crate::shared::SharedState;
use crate::tone::{apply_detune, sign_magnitude_to_twos, tone, twos_to_sign_magnitude};

impl Channel {
    /// Decodes commands until one note/rest object is fully processed, or
    /// the buffer runs out. Called once per channel tick whose
    /// `wait_counter` has just reached zero.
    pub(crate) fn decode_until_note<B: Backend, N: NoteSink>(
        &mut self,
        shared: &mut SharedState,
        config: &DriverConfig,
        backend: &mut B,
        sink: &mut N,
    ) {
        loop {
            let opcode = match self.read_u8() {
                Some(b) => b,
                None => {
                    self.overrun();
                    return;
                }
            };

            if opcode & 0x80 == 0 {
                if self.decode_note(opcode, shared, config, backend, sink).is_none() {
                    self.overrun();
                }
                return;
            }

            match self.decode_command(opcode, shared, backend) {
                Some(true) => continue,
                Some(false) => return,
                None => {
                    self.overrun();
                    return;
                }
            }
        }
    }

    /// Runs off the end of the buffer without a terminating `0xFF`:
    /// treated as an implicit end marker with no jump-return set.
    fn overrun(&mut self) {
        log::warn!(
            "channel {} ran off the end of its bytecode without a terminating 0xFF",
            self.channel_index
        );
        self.active = false;
    }

    fn decode_note<B: Backend, N: NoteSink>(
        &mut self,
        opcode: u8,
        shared: &mut SharedState,
        config: &DriverConfig,
        backend: &mut B,
        sink: &mut N,
    ) -> Option<()> {
        let tie_this = opcode & 0x40 != 0;
        let length_code = (opcode >> 4) & 0x03;
        let pitch = opcode & 0x0F;

        let len = match length_code {
            0b00 => self.l_default as u16,
            0b01 => self.lplus_default as u16,
            0b10 => self.read_u8()? as u16,
            _ => self.read_u16()?,
        };
        let len = len.max(1);

        self.wait_counter = len;
        let mut q = if tie_this { 0 } else { self.q_default };
        if q as u16 >= len {
            q = (len - 1) as u8;
        }
        self.q_counter = q;

        let prev_tie = self.flags.contains(ChannelFlags::TIE);
        let ch = self.channel_index;

        if pitch == 0 {
            self.flags.insert(ChannelFlags::REST);
            backend.write_reg(avol(ch), 0);
            sink.note_event(NoteEvent {
                ch,
                octave: self.octave,
                note: 0,
                volume: 0,
                len,
                is_rest: true,
                bpm_x10: shared.bpm_x10,
            });
        } else {
            self.flags.remove(ChannelFlags::REST);

            if !prev_tie && self.eg_width_base != 0 {
                self.flags.remove(ChannelFlags::EG_STAGE2);
                self.eg_count_work = self.eg_count_base;
                self.eg_width_work = 0;
            }

            if self.flags.contains(ChannelFlags::VIB_ON) {
                let skip_reinit = config.keep_vibrato_tie && prev_tie;
                if !skip_reinit {
                    self.init_lfo();
                }
            }

            let base = tone(self.octave, pitch);
            let detuned = apply_detune(base, self.detune);
            self.freq_value = detuned;

            if !prev_tie {
                backend.write_reg(avol(ch), 0);
            }
            backend.write_reg(afine(ch), (detuned & 0xFF) as u8);
            backend.write_reg(acoarse(ch), ((detuned >> 8) & 0x0F) as u8);

            let volume = if prev_tie {
                (self.volume as i16 + self.volume_adjust as i16).clamp(0, 15) as u8
            } else {
                self.volume
            };
            backend.write_reg(avol(ch), volume);

            sink.note_event(NoteEvent {
                ch,
                octave: self.octave,
                note: pitch,
                volume,
                len,
                is_rest: false,
                bpm_x10: shared.bpm_x10,
            });
        }

        if tie_this {
            self.flags.insert(ChannelFlags::TIE);
        } else {
            self.flags.remove(ChannelFlags::TIE);
        }

        Some(())
    }

    /// (Re)initializes the vibrato LFO working counters from their base
    /// parameters.
    pub(crate) fn init_lfo(&mut self) {
        self.vib_wait_work = self.vib_wait_base;
        self.vib_count_work = self.vib_count_base.max(1);
        self.vib_amp_work = self.vib_amp_base;
        self.vib_offset = 0;
        if self.vib_delta_base & 0x80 != 0 {
            self.flags.insert(ChannelFlags::VIB_PM);
        } else {
            self.flags.remove(ChannelFlags::VIB_PM);
        }
    }

    /// Decodes one command object. Returns `Some(true)` to keep decoding,
    /// `Some(false)` to stop (end-of-stream with no jump return pending),
    /// or `None` on operand overrun.
    fn decode_command<B: Backend>(
        &mut self,
        opcode: u8,
        shared: &mut SharedState,
        backend: &mut B,
    ) -> Option<bool> {
        match opcode {
            0x80..=0x8F => {
                self.octave = opcode & 0x0F;
                Some(true)
            }
            0x90..=0x9F => {
                self.volume = opcode & 0x0F;
                Some(true)
            }
            0xA0..=0xAF => {
                self.volume = self.volume.saturating_add(opcode & 0x0F).min(15);
                Some(true)
            }
            0xB0..=0xBF => {
                self.volume = self.volume.saturating_sub(opcode & 0x0F);
                Some(true)
            }
            0xEA => {
                let p1 = self.read_u8()?;
                self.eg_width_base = p1 as i8;
                if p1 != 0 {
                    self.eg_count_base = self.read_u8()?;
                    self.eg_delta_base = self.read_u8()? as i8;
                    self.eg2_width_base = self.read_u8()? as i8;
                    self.eg2_count_base = self.read_u8()?;
                }
                Some(true)
            }
            0xEB => {
                let v = self.read_u8()?;
                shared.reg6_value = v;
                backend.write_reg(NOISEPER, v);
                Some(true)
            }
            0xEC => {
                let d = self.read_u8()? as i8;
                let new_val = (shared.reg6_value as i16 + d as i16).clamp(0, 31) as u8;
                shared.reg6_value = new_val;
                backend.write_reg(NOISEPER, new_val);
                Some(true)
            }
            0xED | 0xEE | 0xEF => {
                let code = opcode - 0xED;
                shared.reg7_value = apply_mixer_command(shared.reg7_value, self.channel_index, code);
                backend.write_reg(MIXER, shared.reg7_value);
                Some(true)
            }
            0xF0 => {
                let count = self.read_u8()?;
                if (self.nest_depth as usize) < self.nest_flag.len() {
                    self.l_backup = self.l_default;
                    self.lplus_backup = self.lplus_default;
                    self.nest_octave_backup = self.octave;
                    self.nest_flag[self.nest_depth as usize] = count;
                    self.nest_depth += 1;
                }
                Some(true)
            }
            0xF1 => {
                let anchor = self.offset;
                let off8 = self.read_u8()?;
                self.apply_nest_loop(anchor, -(off8 as i16));
                Some(true)
            }
            0xF2 => {
                let anchor = self.offset;
                let off16 = self.read_u16()?;
                self.apply_nest_loop(anchor, off16 as i16);
                Some(true)
            }
            0xF3 => {
                let anchor = self.offset;
                let off16 = self.read_u16()?;
                self.apply_nest_alt_last(anchor, off16 as i16);
                Some(true)
            }
            0xF4 => {
                let v = self.read_u8()?;
                shared.i_command_value = v;
                Some(true)
            }
            0xF5 => {
                let p1 = self.read_u8()?;
                let p2 = self.read_u8()?;
                let p3 = self.read_u8()?;
                let p4 = self.read_u8()?;
                self.vib_wait_base = p1;
                self.vib_count_base = p2;
                self.vib_amp_base = p3.wrapping_mul(2);
                self.vib_delta_base = p4;
                if p4 != 0 {
                    self.flags.insert(ChannelFlags::VIB_ON);
                } else {
                    self.flags.remove(ChannelFlags::VIB_ON);
                }
                self.init_lfo();
                Some(true)
            }
            0xF6 => Some(true),
            0xF7 => {
                self.lplus_default = self.read_u8()?;
                Some(true)
            }
            0xF8 => {
                let t96 = self.read_u8()?;
                let _legacy_port = self.read_u8()?;
                shared.set_tempo(t96);
                Some(true)
            }
            0xF9 => {
                self.l_default = self.read_u8()?;
                Some(true)
            }
            0xFA => {
                self.q_default = self.read_u8()?;
                Some(true)
            }
            0xFB => {
                self.detune = self.read_u8()?;
                Some(true)
            }
            0xFC => {
                let d = self.read_u8()? as i8;
                let cur = sign_magnitude_to_twos(self.detune);
                self.detune = twos_to_sign_magnitude(cur.wrapping_add(d));
                Some(true)
            }
            0xFD => {
                let v = self.read_u8()?;
                self.vib_delta_base = v;
                if v != 0 {
                    self.flags.insert(ChannelFlags::VIB_ON);
                } else {
                    self.flags.remove(ChannelFlags::VIB_ON);
                }
                Some(true)
            }
            0xFE => {
                self.j_return_offset = self.offset as u16;
                self.jump_octave_backup = self.octave;
                Some(true)
            }
            0xFF => Some(self.end_marker()),
            _ => {
                self.unknown_opcode_count += 1;
                log::warn!(
                    "channel {} hit unknown opcode {:#04X} at offset {}",
                    self.channel_index,
                    opcode,
                    self.offset - 1
                );
                Some(true)
            }
        }
    }

    fn end_marker(&mut self) -> bool {
        if self.j_return_offset != 0 {
            self.offset = self.j_return_offset as usize;
            self.octave = self.jump_octave_backup;
            true
        } else {
            self.active = false;
            false
        }
    }

    /// `anchor` is the cursor position right after the jump opcode itself
    /// (before its offset operand was read) — offsets are measured from
    /// there, not from after the operand, so the encoded distance covers
    /// exactly the bytes being replayed.
    fn apply_nest_loop(&mut self, anchor: usize, delta: i16) {
        if self.nest_depth == 0 {
            return;
        }
        let top = (self.nest_depth - 1) as usize;
        if self.nest_flag[top] > 0 {
            self.nest_flag[top] -= 1;
        }
        if self.nest_flag[top] != 0 {
            self.offset = (anchor as i64 + delta as i64).max(0) as usize;
            self.l_default = self.l_backup;
            self.lplus_default = self.lplus_backup;
            self.octave = self.nest_octave_backup;
        } else {
            self.nest_depth -= 1;
        }
    }

    fn apply_nest_alt_last(&mut self, anchor: usize, delta: i16) {
        if self.nest_depth == 0 {
            return;
        }
        let top = (self.nest_depth - 1) as usize;
        if self.nest_flag[top] == 1 {
            self.nest_depth -= 1;
            self.offset = (anchor as i64 + delta as i64).max(0) as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        writes: Vec<(u8, u8)>,
    }

    impl Backend for RecordingBackend {
        fn write_reg(&mut self, reg: u8, val: u8) {
            self.writes.push((reg, val));
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<NoteEvent>,
    }

    impl NoteSink for RecordingSink {
        fn note_event(&mut self, event: NoteEvent) {
            self.events.push(event);
        }
    }

    fn decode(ch: &mut Channel, data: &[u8]) -> (RecordingBackend, RecordingSink) {
        ch.load(data);
        let mut shared = SharedState::new();
        let config = DriverConfig::default();
        let mut backend = RecordingBackend::default();
        let mut sink = RecordingSink::default();
        ch.decode_until_note(&mut shared, &config, &mut backend, &mut sink);
        (backend, sink)
    }

    #[test]
    fn unknown_opcode_is_skipped_without_consuming_operands() {
        let mut ch = Channel::new(0);
        let (_backend, sink) = decode(&mut ch, &[0xC5, 0x21, 8, 0xFF]);

        assert_eq!(ch.unknown_opcode_count, 1);
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].note, 1);
    }

    #[test]
    fn overrun_without_terminator_deactivates_the_channel() {
        let mut ch = Channel::new(0);
        // `L` (0xF9) expects one operand byte that never comes.
        let (_backend, sink) = decode(&mut ch, &[0xF9]);

        assert!(!ch.active);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn jump_then_end_continues_decoding_instead_of_stopping() {
        let mut ch = Channel::new(0);
        ch.load(&[0xFE, 0x21, 8, 0xFF]);
        // Simulate having already played through to the 0xFF once, with
        // the jump-return point `J` set at offset 1 (right after itself).
        ch.offset = 3;
        ch.j_return_offset = 1;
        ch.jump_octave_backup = ch.octave;

        let mut shared = SharedState::new();
        let config = DriverConfig::default();
        let mut backend = RecordingBackend::default();
        let mut sink = RecordingSink::default();
        ch.decode_until_note(&mut shared, &config, &mut backend, &mut sink);

        assert!(ch.active);
        assert_eq!(sink.events.len(), 1);
        // Looped back through the note at offset 1 and landed right after
        // it again, at the same 0xFF it started from.
        assert_eq!(ch.offset, 3);
    }

    #[test]
    fn long_jump_can_move_forward_over_unreachable_bytes() {
        // `[` (count=2), then `]` long jumping forward past filler bytes
        // straight to the note.
        let data = [0xF0, 2, 0xF2, 6, 0, 0, 0, 0, 0, 0x21, 8, 0xFF];
        let mut ch = Channel::new(0);
        let (_backend, sink) = decode(&mut ch, &data);

        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0].note, 1);
        assert_eq!(ch.nest_flag[0], 1);
        assert_eq!(ch.nest_depth, 1);
        assert_eq!(ch.offset, 11);
    }
}
