//! The system bus: everything connected to the main CPU's two address
//! buses, dispatched by a single `match` over bank/offset the way the
//! teacher's `Peripherals::load`/`store` does it.
//!
//! `wdc65816::Bus::read8`/`write8` are infallible by design (see
//! `error::CoreError`'s doc comment for why), so an unmapped access doesn't
//! panic here: it latches into `pending_error`, which `Snes::step` checks
//! and surfaces as a `Result` after the instruction completes. This keeps
//! the CPU crate itself free of any dependency on this crate's error type.

use log::trace;
use wdc65816::bus::{Address, Bus as WdcBus};

use crate::apu::Apu;
use crate::dma::DmaEngine;
use crate::error::CoreError;
use crate::input::Input;
use crate::interrupt::InterruptFlags;
use crate::ppu_stub::PpuStub;
use crate::rom::Cartridge;
use crate::timer::Timer;

const WRAM_SIZE: usize = 128 * 1024;

/// Master-clock cost of an access, by speed class (PAL/NTSC share these).
const CYCLES_FAST: u32 = 6;
const CYCLES_SLOW: u32 = 8;
const CYCLES_XSLOW: u32 = 12;

pub struct Bus {
    wram: Box<[u8; WRAM_SIZE]>,
    pub cartridge: Cartridge,
    pub timer: Timer,
    pub dma: DmaEngine,
    pub apu: Apu,
    pub ppu: PpuStub,
    pub input: Input,
    pub interrupts: InterruptFlags,

    open_bus: u8,
    /// Shadow of the last byte written anywhere on the bus, independent of
    /// the open-bus latch. Debugger-only: real hardware has no such register.
    last_written: u8,
    cycles_elapsed: u32,
    pending_error: Option<CoreError>,
}

impl Bus {
    pub fn new(cartridge: Cartridge) -> Self {
        let mut apu = Apu::new();
        apu.reset();
        Bus {
            wram: Box::new([0; WRAM_SIZE]),
            cartridge,
            timer: Timer::new(),
            dma: DmaEngine::new(),
            apu,
            ppu: PpuStub::new(),
            input: Input::new(),
            interrupts: InterruptFlags::default(),
            open_bus: 0,
            last_written: 0,
            cycles_elapsed: 0,
            pending_error: None,
        }
    }

    /// Drains and returns the master cycles charged since the last call.
    pub fn take_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.cycles_elapsed)
    }

    /// Last byte written anywhere on the bus. Debugger observability only;
    /// distinct from the open-bus latch, which writes never touch.
    pub fn last_written(&self) -> u8 {
        self.last_written
    }

    /// Drains any bus error latched by the instruction just executed.
    pub fn take_error(&mut self) -> Option<CoreError> {
        self.pending_error.take()
    }

    fn charge(&mut self, cycles: u32) {
        self.cycles_elapsed += cycles;
    }

    fn wram_mirror(&self, addr: u16) -> u8 {
        self.wram[addr as usize]
    }

    /// Services one H-DMA line worth of transfers by running `run_hdma_line`
    /// against this bus's own address space, then applying each transfer.
    /// Called by `Snes` at H-blank start.
    pub fn run_hdma_line(&mut self, first_line_of_frame: bool) {
        let cart = &self.cartridge;
        let wram = &self.wram;
        let transfers = self.dma.run_hdma_line(first_line_of_frame, |addr| {
            if addr & 0xFF0000 == 0x7E0000 || addr & 0xFF0000 == 0x7F0000 {
                wram[(addr & 0x1FFFF) as usize]
            } else {
                cart.read_rom(addr)
            }
        });
        for t in transfers {
            let byte = self.read_a_bus_byte(t.a_addr);
            if t.to_b {
                self.write_io(t.b_addr, byte);
            } else {
                let from_io = self.read_io(t.b_addr);
                self.write_a_bus_byte(t.a_addr, from_io);
            }
        }
    }

    /// Drains pending GPDMA byte-by-byte, charging 8 master cycles per byte
    /// (the fixed GPDMA transfer rate) until no channel has bytes left.
    pub fn run_pending_gpdma(&mut self) {
        while self.dma.gpdma_active() {
            if let Some(t) = self.dma.next_gpdma_byte() {
                let byte = self.read_a_bus_byte(t.a_addr);
                if t.to_b {
                    self.write_io(t.b_addr, byte);
                } else {
                    let from_io = self.read_io(t.b_addr);
                    self.write_a_bus_byte(t.a_addr, from_io);
                }
                self.charge(CYCLES_SLOW);
            }
        }
    }

    fn read_a_bus_byte(&mut self, addr: u32) -> u8 {
        let bank = (addr >> 16) as u8;
        let offset = (addr & 0xFFFF) as u16;
        match bank {
            0x7E | 0x7F => self.wram[((bank as usize - 0x7E) * 0x10000) + offset as usize],
            _ => self.cartridge.read_rom(addr),
        }
    }

    fn write_a_bus_byte(&mut self, addr: u32, value: u8) {
        let bank = (addr >> 16) as u8;
        let offset = (addr & 0xFFFF) as u16;
        match bank {
            0x7E | 0x7F => self.wram[((bank as usize - 0x7E) * 0x10000) + offset as usize] = value,
            _ => {} // DMA into ROM is a no-op
        }
    }

    fn read_io(&mut self, reg: u16) -> u8 {
        match reg {
            0x2100..=0x213F => self.ppu.read(reg),
            0x2140..=0x217F => self.apu.read_port((reg & 0x3) as usize),
            _ => self.open_bus,
        }
    }

    fn write_io(&mut self, reg: u16, value: u8) {
        match reg {
            0x2100..=0x213F => self.ppu.write(reg, value),
            0x2140..=0x217F => self.apu.write_port((reg & 0x3) as usize, value),
            _ => {}
        }
    }

    fn read_register(&mut self, offset: u16) -> u8 {
        match offset {
            0x2100..=0x213F => self.ppu.read(offset),
            0x2140..=0x217F => self.apu.read_port((offset & 0x3) as usize),
            0x4016 => 0, // manual joypad read port, not modeled beyond auto-read
            0x4017 => 0,
            0x4210 => self.timer.read_rdnmi() | 0x02, // low nibble: CPU version
            0x4211 => self.timer.read_timeup(),
            0x4212 => self.timer.read_hvbjoy(),
            0x4218 => self.input.read_joy1_low(),
            0x4219 => self.input.read_joy1_high(),
            0x4300..=0x437F => {
                let ch = ((offset & 0x00F0) >> 4) as usize;
                self.read_dma_register(ch, (offset & 0xF) as u8)
            }
            _ => self.open_bus,
        }
    }

    fn write_register(&mut self, offset: u16, value: u8) {
        match offset {
            0x2100..=0x213F => self.ppu.write(offset, value),
            0x2140..=0x217F => self.apu.write_port((offset & 0x3) as usize, value),
            0x4016 => self.input.write_strobe(value),
            0x4200 => self.timer.write_nmitimen(value, &mut self.interrupts),
            0x4207 => self.timer.write_htime_low(value),
            0x4208 => self.timer.write_htime_high(value),
            0x4209 => self.timer.write_vtime_low(value),
            0x420A => self.timer.write_vtime_high(value),
            0x420B => {
                self.dma.write_mdmaen(value);
                self.run_pending_gpdma();
            }
            0x420C => self.dma.write_hdmaen(value),
            0x4300..=0x437F => {
                let ch = ((offset & 0x00F0) >> 4) as usize;
                self.write_dma_register(ch, (offset & 0xF) as u8, value);
            }
            _ => {}
        }
    }

    fn read_dma_register(&self, ch: usize, reg: u8) -> u8 {
        let c = &self.dma.channels[ch];
        match reg {
            0x0 => c.control,
            0x1 => c.b_addr,
            0x2 => c.a_addr as u8,
            0x3 => (c.a_addr >> 8) as u8,
            0x4 => c.a_bank,
            0x5 => c.count_or_indirect as u8,
            0x6 => (c.count_or_indirect >> 8) as u8,
            0x7 => c.indirect_bank,
            0x8 => c.table_addr as u8,
            0x9 => (c.table_addr >> 8) as u8,
            0xA => c.line_counter,
            _ => self.open_bus,
        }
    }

    fn write_dma_register(&mut self, ch: usize, reg: u8, value: u8) {
        let c = &mut self.dma.channels[ch];
        match reg {
            0x0 => c.control = value,
            0x1 => c.b_addr = value,
            0x2 => c.a_addr = (c.a_addr & 0xFF00) | value as u16,
            0x3 => c.a_addr = (c.a_addr & 0x00FF) | ((value as u16) << 8),
            0x4 => c.a_bank = value,
            0x5 => c.count_or_indirect = (c.count_or_indirect & 0xFF00) | value as u16,
            0x6 => c.count_or_indirect = (c.count_or_indirect & 0x00FF) | ((value as u16) << 8),
            0x7 => c.indirect_bank = value,
            0x8 => c.table_addr = (c.table_addr & 0xFF00) | value as u16,
            0x9 => c.table_addr = (c.table_addr & 0x00FF) | ((value as u16) << 8),
            0xA => c.line_counter = value,
            _ => {}
        }
    }

    /// Notifies the bus fabric that H-blank has started on the scanline the
    /// timer just crossed into, so H-DMA can run its line. Called by `Snes`.
    pub fn on_hblank_start(&mut self, first_line_of_frame: bool) {
        self.run_hdma_line(first_line_of_frame);
    }

    /// Notifies the bus fabric that V-blank has started, latching the
    /// auto-joypad-read registers if enabled. Called by `Snes`.
    pub fn on_vblank_start(&mut self) {
        if self.timer.read_hvbjoy() & 0x01 != 0 {
            self.input.auto_read_latch();
        }
    }
}

impl WdcBus for Bus {
    fn read8(&mut self, addr: Address) -> u8 {
        let bank = addr.bank;
        let offset = addr.offset;
        // The open-bus latch is updated only by non-I/O reads of WRAM/ROM;
        // register-dispatch arms read it (for the unused-register case) but
        // must not overwrite it.
        let value = match bank {
            0x00..=0x3F | 0x80..=0xBF => match offset {
                0x0000..=0x1FFF => {
                    self.charge(CYCLES_SLOW);
                    let v = self.wram_mirror(offset);
                    self.open_bus = v;
                    v
                }
                0x2000..=0x20FF | 0x2200..=0x3FFF => {
                    self.charge(CYCLES_FAST);
                    self.open_bus
                }
                0x2100..=0x213F | 0x2140..=0x217F => {
                    self.charge(CYCLES_FAST);
                    self.read_io(offset)
                }
                // WRAM data port: unmodeled, explicitly unsupported rather than silently open-bus.
                0x2180..=0x21FF => {
                    self.charge(CYCLES_FAST);
                    self.pending_error = Some(CoreError::UnmappedAccess { addr: addr.to_u32(), write: false });
                    self.open_bus
                }
                0x4000..=0x41FF => {
                    self.charge(CYCLES_XSLOW);
                    self.read_register(offset)
                }
                0x4200..=0x5FFF => {
                    self.charge(CYCLES_FAST);
                    self.read_register(offset)
                }
                0x6000..=0x7FFF => {
                    self.charge(CYCLES_SLOW);
                    self.cartridge.read_sram(((bank as u32) << 16) | offset as u32)
                }
                0x8000..=0xFFFF => {
                    self.charge(if self.cartridge.header.fast_speed { CYCLES_FAST } else { CYCLES_SLOW });
                    let v = self.cartridge.read_rom(((bank as u32) << 16) | offset as u32);
                    self.open_bus = v;
                    v
                }
            },
            0x7E | 0x7F => {
                self.charge(CYCLES_SLOW);
                let v = self.wram[((bank as usize - 0x7E) * 0x10000) + offset as usize];
                self.open_bus = v;
                v
            }
            0x40..=0x7D | 0xC0..=0xFF => {
                self.charge(if self.cartridge.header.fast_speed { CYCLES_FAST } else { CYCLES_SLOW });
                let v = self.cartridge.read_rom(addr.to_u32());
                self.open_bus = v;
                v
            }
        };
        trace!("read {:#08x} -> {:#04x}", addr.to_u32(), value);
        value
    }

    fn write8(&mut self, addr: Address, value: u8) {
        let bank = addr.bank;
        let offset = addr.offset;
        // The open-bus latch is written only by non-I/O reads; writes never
        // touch it, only the debugger-facing last-written shadow.
        self.last_written = value;
        match bank {
            0x00..=0x3F | 0x80..=0xBF => match offset {
                0x0000..=0x1FFF => {
                    self.charge(CYCLES_SLOW);
                    self.wram[offset as usize] = value;
                }
                0x2000..=0x20FF | 0x2200..=0x3FFF => {
                    self.charge(CYCLES_FAST); // write to an unused register: accepted, has no effect
                }
                0x2100..=0x213F | 0x2140..=0x217F => {
                    self.charge(CYCLES_FAST);
                    self.write_io(offset, value);
                }
                0x2180..=0x21FF => {
                    self.charge(CYCLES_FAST);
                    self.pending_error = Some(CoreError::UnmappedAccess { addr: addr.to_u32(), write: true });
                }
                0x4000..=0x41FF => {
                    self.charge(CYCLES_XSLOW);
                    self.write_register(offset, value);
                }
                0x4200..=0x5FFF => {
                    self.charge(CYCLES_FAST);
                    self.write_register(offset, value);
                }
                0x6000..=0x7FFF => {
                    self.charge(CYCLES_SLOW);
                    self.cartridge.write_sram(((bank as u32) << 16) | offset as u32, value);
                }
                0x8000..=0xFFFF => {
                    self.charge(if self.cartridge.header.fast_speed { CYCLES_FAST } else { CYCLES_SLOW });
                    // writes to ROM are a no-op
                }
            },
            0x7E | 0x7F => {
                self.charge(CYCLES_SLOW);
                self.wram[((bank as usize - 0x7E) * 0x10000) + offset as usize] = value;
            }
            0x40..=0x7D | 0xC0..=0xFF => {
                self.charge(if self.cartridge.header.fast_speed { CYCLES_FAST } else { CYCLES_SLOW });
            }
        }
    }

    fn take_pending_nmi(&mut self) -> bool {
        self.interrupts.take_nmi()
    }

    fn take_pending_irq(&mut self) -> bool {
        self.interrupts.take_irq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cartridge() -> Cartridge {
        let mut data = vec![0u8; 0x20000];
        let title = b"BUS TEST            ";
        data[0x7FC0..0x7FC0 + title.len()].copy_from_slice(title);
        data[0x7FC0 + 0x15] = 0x00;
        let complement: u16 = 0xBEEF;
        let checksum = complement ^ 0xFFFF;
        data[0x7FC0 + 0x1C..0x7FC0 + 0x1E].copy_from_slice(&complement.to_le_bytes());
        data[0x7FC0 + 0x1E..0x7FC0 + 0x20].copy_from_slice(&checksum.to_le_bytes());
        Cartridge::load(data).unwrap()
    }

    #[test]
    fn wram_round_trips_through_bank_0_mirror_and_bank_7e() {
        let mut bus = Bus::new(test_cartridge());
        bus.write8(Address::new(0x00, 0x0010), 0x42);
        assert_eq!(bus.read8(Address::new(0x7E, 0x0010)), 0x42);
    }

    #[test]
    fn unmapped_read_latches_a_pending_error_instead_of_panicking() {
        let mut bus = Bus::new(test_cartridge());
        bus.read8(Address::new(0x00, 0x2190));
        assert!(bus.take_error().is_some());
    }

    #[test]
    fn writes_to_unused_registers_are_silently_accepted() {
        let mut bus = Bus::new(test_cartridge());
        bus.write8(Address::new(0x00, 0x2050), 0xFF);
        assert!(bus.take_error().is_none());
    }

    #[test]
    fn mdmaen_write_drains_gpdma_immediately() {
        let mut bus = Bus::new(test_cartridge());
        bus.dma.channels[0].control = 0x01;
        bus.dma.channels[0].a_addr = 0x0000;
        bus.dma.channels[0].a_bank = 0x7E;
        bus.dma.channels[0].b_addr = 0x18;
        bus.dma.channels[0].count_or_indirect = 2;
        bus.write8(Address::new(0x00, 0x420B), 0x01);
        assert!(!bus.dma.gpdma_active());
    }
}
