//! Voicing engine (C5): per-tick note gating, software envelope, and
//! vibrato LFO, feeding register writes to the backend.

use crate::backend::{Backend, NoteSink};
use crate::channel::{acoarse, afine, avol, Channel, ChannelFlags};
use crate::config::DriverConfig;
use crate::shared::SharedState;

impl Channel {
    /// Advances this channel by one channel tick (already divided down
    /// from the driver's 2 ms host tick by the tempo dispatcher). Only
    /// does anything when [`Channel::is_active`].
    pub(crate) fn tick<B: Backend, N: NoteSink>(
        &mut self,
        shared: &mut SharedState,
        config: &DriverConfig,
        backend: &mut B,
        sink: &mut N,
    ) {
        if !self.active {
            return;
        }

        self.wait_counter = self.wait_counter.saturating_sub(1);

        if self.wait_counter > 0 {
            if self.flags.contains(ChannelFlags::REST) {
                return;
            }
            if self.wait_counter == self.q_counter as u16 {
                backend.write_reg(avol(self.channel_index), 0);
                self.flags.insert(ChannelFlags::REST);
                return;
            }
            if self.flags.contains(ChannelFlags::VIB_ON) && self.step_lfo(backend) {
                return;
            }
            if self.eg_width_base != 0 {
                self.step_eg(backend);
            }
            return;
        }

        self.decode_until_note(shared, config, backend, sink);
    }

    /// Advances the vibrato LFO by one tick. Returns `true` when the tick
    /// should stop here (the LFO is still in its wait/count-down phase),
    /// `false` when it fell through to an actual step (and the envelope
    /// step should still run this tick).
    fn step_lfo<B: Backend>(&mut self, backend: &mut B) -> bool {
        if self.vib_wait_work > 0 {
            self.vib_wait_work -= 1;
            return true;
        }

        self.vib_count_work = self.vib_count_work.saturating_sub(1);
        if self.vib_count_work > 0 {
            return true;
        }
        self.vib_count_work = self.vib_count_base.max(1);

        let step = (self.vib_delta_base & 0x7F) as i16;
        if self.flags.contains(ChannelFlags::VIB_PM) {
            self.vib_offset -= step;
        } else {
            self.vib_offset += step;
        }

        let period = (self.freq_value as i32 + self.vib_offset as i32).clamp(1, 0x0FFF) as u16;
        backend.write_reg(afine(self.channel_index), (period & 0xFF) as u8);
        backend.write_reg(acoarse(self.channel_index), ((period >> 8) & 0x0F) as u8);

        if self.vib_amp_base != 0 {
            self.vib_amp_work = self.vib_amp_work.saturating_sub(1);
            if self.vib_amp_work == 0 {
                self.vib_amp_work = self.vib_amp_base;
                self.flags.toggle(ChannelFlags::VIB_PM);
            }
        }

        false
    }

    /// Advances the two-stage software envelope by one tick, writing a
    /// new volume whenever a stage boundary changes `volume_adjust`.
    fn step_eg<B: Backend>(&mut self, backend: &mut B) {
        if !self.flags.contains(ChannelFlags::EG_STAGE2) {
            self.eg_count_work = self.eg_count_work.wrapping_sub(1);
            if self.eg_count_work == 0 {
                if self.eg_width_work != self.eg_width_base {
                    self.eg_count_work = self.eg_count_base;
                    self.eg_width_work = self.eg_width_work.wrapping_add(self.eg_delta_base);
                    self.volume_adjust = self.eg_width_work;
                    self.emit_volume(backend);
                } else {
                    self.flags.insert(ChannelFlags::EG_STAGE2);
                    self.eg_width_work = 0;
                    self.eg_count_work = self.eg2_count_base & 0x7F;
                    if self.eg2_width_base != 0 {
                        self.volume_adjust = self.eg2_width_base.wrapping_add(self.eg_width_base);
                        self.emit_volume(backend);
                    }
                }
            }
        } else if self.eg2_width_base != 0 {
            self.eg_count_work = self.eg_count_work.wrapping_sub(1);
            if self.eg_count_work == 0 {
                self.eg_count_work = self.eg2_count_base & 0x7F;
                if self.eg_width_work < 15 {
                    self.eg_width_work += 1;
                }
                let delta: i8 = if self.eg2_count_base & 0x80 != 0 {
                    -self.eg_width_work
                } else {
                    self.eg_width_work
                };
                self.volume_adjust = delta
                    .wrapping_add(self.eg_width_base)
                    .wrapping_add(self.eg2_width_base);
                self.emit_volume(backend);
            }
        }
    }

    fn emit_volume<B: Backend>(&mut self, backend: &mut B) {
        let vol = (self.volume as i16 + self.volume_adjust as i16).clamp(0, 15) as u8;
        backend.write_reg(avol(self.channel_index), vol);
    }
}
