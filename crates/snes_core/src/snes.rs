//! The orchestrator that wires the main CPU, the system bus, and the debug
//! hook boundary together and drives the run loop.
//!
//! Grounded on `Snes::run` in the teacher: one main-CPU instruction is
//! stepped, the master cycles it (and whatever bus-level I/O it touched)
//! charged are converted into an APU catch-up budget, and H-blank/V-blank
//! edges crossed along the way drive H-DMA and the auto-joypad latch. The
//! teacher runs this loop itself on a background thread behind a UI; this
//! crate never spawns a thread -- `DebugHooks` is the seam an embedder hangs
//! a worker/UI off of, called synchronously from `step`.

use log::{error, info};

use wdc65816::Cpu;

use crate::bus::Bus;
use crate::debug::{DebugHooks, NullDebugHooks};
use crate::error::CoreError;
use crate::rom::Cartridge;

/// Approximated master-clock-to-SPC700 ratio; see `apu::Apu` for why this
/// isn't computed from the nominal clock frequencies directly.
const APU_DIVIDER: u32 = 21;

pub struct Snes<H: DebugHooks = NullDebugHooks> {
    cpu: Cpu,
    bus: Bus,
    hooks: H,
    first_line_of_frame: bool,
}

impl Snes<NullDebugHooks> {
    pub fn new(cartridge: Cartridge) -> Self {
        Snes::with_hooks(cartridge, NullDebugHooks)
    }
}

impl<H: DebugHooks> Snes<H> {
    pub fn with_hooks(cartridge: Cartridge, hooks: H) -> Self {
        let mut bus = Bus::new(cartridge);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        Snes { cpu, bus, hooks, first_line_of_frame: true }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Runs a single main-CPU instruction, then charges the rest of the
    /// system (APU, H-DMA, V-blank) for the master cycles it took.
    pub fn step(&mut self) -> Result<(), CoreError> {
        let pc = self.cpu.pc_address().to_u32();
        if !self.hooks.should_run(pc) {
            return Ok(());
        }
        self.hooks.set_current_op(pc);

        self.cpu.step(&mut self.bus);

        if let Some(err) = self.bus.take_error() {
            error!("{}", err);
            return Err(err);
        }

        let master_cycles = self.bus.take_cycles();
        let hblank_before = self.bus.timer.hblank();
        let vblank_before = self.bus.timer.vblank();

        let events = self.bus.timer.tick(master_cycles, &mut self.bus.interrupts);

        if events.hblank_start && !hblank_before {
            self.bus.on_hblank_start(self.first_line_of_frame);
            self.first_line_of_frame = false;
        }
        if events.vblank_start && !vblank_before {
            self.bus.on_vblank_start();
            self.first_line_of_frame = true;
        }

        self.bus.apu.catch_up(master_cycles / APU_DIVIDER.max(1) * APU_DIVIDER);

        Ok(())
    }

    /// Runs up to `n` instructions, stopping early on the first bus error.
    pub fn run_instructions(&mut self, n: u64) -> Result<(), CoreError> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }
}

impl<H: DebugHooks> Drop for Snes<H> {
    fn drop(&mut self) {
        info!("SNES core shutting down at PC {}", self.cpu.pc_address());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cartridge_with_reset_vector(reset_pc: u16, program: &[(u16, u8)]) -> Cartridge {
        let mut data = vec![0u8; 0x20000];
        let title = b"SNES TEST           ";
        data[0x7FC0..0x7FC0 + title.len()].copy_from_slice(title);
        data[0x7FC0 + 0x15] = 0x00;
        let complement: u16 = 0x1111;
        let checksum = complement ^ 0xFFFF;
        data[0x7FC0 + 0x1C..0x7FC0 + 0x1E].copy_from_slice(&complement.to_le_bytes());
        data[0x7FC0 + 0x1E..0x7FC0 + 0x20].copy_from_slice(&checksum.to_le_bytes());
        // emulation-mode reset vector lives at $FFFC in bank 0, which LoROM
        // maps from the top of the ROM image's last bank.
        let reset_vec_offset = 0x1FFFC;
        data[reset_vec_offset] = reset_pc as u8;
        data[reset_vec_offset + 1] = (reset_pc >> 8) as u8;
        for &(offset, byte) in program {
            data[0x8000 + offset as usize] = byte;
        }
        Cartridge::load(data).unwrap()
    }

    #[test]
    fn stepping_an_nop_program_advances_pc_without_error() {
        let cart = test_cartridge_with_reset_vector(0x8000, &[(0, 0xEA), (1, 0xEA)]);
        let mut snes = Snes::new(cart);
        assert!(snes.step().is_ok());
        assert!(snes.step().is_ok());
    }

    #[test]
    fn run_instructions_stops_on_the_first_bus_error() {
        let cart = test_cartridge_with_reset_vector(0x8000, &[(0, 0x8D), (1, 0x80), (2, 0x21)]); // STA $2180
        let mut snes = Snes::new(cart);
        let result = snes.run_instructions(5);
        assert!(result.is_err());
    }
}
