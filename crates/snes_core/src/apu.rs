//! The main CPU's window into the audio subsystem: the $2140-$2143 mailbox
//! and the SPC700 + its private bus, stepped in its own catch-up loop.
//!
//! Grounded on `Apu::ReadRegister`/`WriteRegister` in `original_source`: the
//! mailbox doesn't actually run the real IPL boot ROM (we don't have a
//! legally redistributable dump of it), so the 0xAA/0xBB/0xCC/0xFF handshake
//! byte values are special-cased directly on the mailbox the way the
//! original's `isInit` flag does, rather than executing real SPC700 boot
//! code.

use log::trace;

use crate::audio_bus::AudioBus;
use spc700::Cpu as Spc700Cpu;

/// Approximate master-clock-to-SPC700-instruction ratio. Audio timing isn't
/// cycle-exact in this core (see the module-level SPC700 IPL note); this
/// just keeps the audio CPU running at roughly the right rate relative to
/// the main CPU so mailbox polling loops make progress.
const MASTER_CYCLES_PER_SPC_STEP: u32 = 21;

pub struct Apu {
    cpu: Spc700Cpu,
    bus: AudioBus,
    cycle_debt: u32,
    /// Mirrors the original's `isInit`: false until the main program writes
    /// 0xCC to port 0, at which point the mailbox stops faking 0xAA/0xBB.
    initialized: bool,
    ports: [u8; 4],
}

impl Apu {
    pub fn new() -> Self {
        Apu {
            cpu: Spc700Cpu::new(),
            bus: AudioBus::new(),
            cycle_debt: 0,
            initialized: false,
            ports: [0; 4],
        }
    }

    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
    }

    /// Reads one of $2140-$2143 from the main CPU's side.
    pub fn read_port(&self, index: usize) -> u8 {
        match index {
            0 if !self.initialized => 0xAA,
            1 if !self.initialized => 0xBB,
            _ => self.ports[index],
        }
    }

    /// Writes one of $2140-$2143 from the main CPU's side.
    pub fn write_port(&mut self, index: usize, value: u8) {
        match index {
            0 => {
                if value == 0xCC && !self.initialized {
                    trace!("APU handshake: stage 2");
                    self.initialized = true;
                }
                self.ports[0] = value;
            }
            1 => {
                if value == 0xFF && self.ports == [0, 0, 0, 0] {
                    trace!("APU handshake: back to stage 1");
                    self.initialized = false;
                }
                self.ports[1] = value;
            }
            _ => self.ports[index] = value,
        }
        self.bus.mailbox.to_spc[index] = value;
    }

    /// Advances the SPC700 to account for `master_cycles` having elapsed on
    /// the main CPU side, and mirrors anything it wrote to the mailbox back
    /// onto the main-side ports.
    pub fn catch_up(&mut self, master_cycles: u32) {
        self.cycle_debt += master_cycles;
        while self.cycle_debt >= MASTER_CYCLES_PER_SPC_STEP {
            self.cycle_debt -= MASTER_CYCLES_PER_SPC_STEP;
            self.cpu.step(&mut self.bus);
            self.bus.tick(2);
        }
        self.ports = self.bus.mailbox.to_main;
    }
}

impl Default for Apu {
    fn default() -> Self {
        Apu::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_fake_aa_bb_until_handshake_byte_written() {
        let apu = Apu::new();
        assert_eq!(apu.read_port(0), 0xAA);
        assert_eq!(apu.read_port(1), 0xBB);
    }

    #[test]
    fn writing_cc_to_port0_ends_the_fake_handshake() {
        let mut apu = Apu::new();
        apu.write_port(0, 0xCC);
        assert_eq!(apu.read_port(0), 0xCC);
    }

    #[test]
    fn writing_ff_with_all_zero_ports_resets_to_stage_one() {
        let mut apu = Apu::new();
        apu.write_port(0, 0xCC);
        assert!(apu.initialized);
        apu.write_port(0, 0);
        apu.write_port(1, 0xFF);
        assert!(!apu.initialized);
        assert_eq!(apu.read_port(0), 0xAA);
    }

    #[test]
    fn catch_up_runs_the_spc700_proportionally_to_master_cycles() {
        let mut apu = Apu::new();
        apu.reset();
        apu.catch_up(MASTER_CYCLES_PER_SPC_STEP * 4);
    }
}
