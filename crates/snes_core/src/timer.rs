//! Master-clock-driven H/V counters, and the registers that read off them
//! (`RDNMI`, `HVBJOY`, `TIMEUP`) or configure them (`NMITIMEN`, `HTIME`,
//! `VTIME`).
//!
//! Grounded on `Timer::AddCycle` in `original_source`: dots (not master
//! cycles) are the unit the H-counter advances in, and H-blank/V-blank are
//! edges detected by comparing the dot/scanline counters against fixed
//! thresholds rather than maintained as independent state.

use log::trace;

use crate::interrupt::InterruptFlags;

const MASTER_CLOCKS_PER_DOT: u32 = 4;
const DOTS_PER_LINE: u16 = 341;
const LINES_PER_FRAME: u16 = 262;
/// H-blank starts once the dot counter reaches this value (non-interlace NTSC).
const HBLANK_START_DOT: u16 = 274;
const VBLANK_START_LINE: u16 = 225;
/// Auto-joypad read clears its busy flag a few lines after V-blank starts.
const JOYPAD_BUSY_END_LINE: u16 = 228;

/// Edges crossed by the most recent [`Timer::tick`] call, for the bus fabric
/// to forward to the components that care (DMA's H-blank-start hook, the
/// input shim's V-blank-start hook).
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerEvents {
    pub hblank_start: bool,
    pub vblank_start: bool,
}

#[derive(Debug)]
pub struct Timer {
    clock_acc: u32,
    dot: u16,
    pub scanline: u16,
    hblank: bool,
    vblank: bool,

    /// NMITIMEN ($4200) bit 7.
    nmi_enable: bool,
    /// NMITIMEN bit 0: auto-joypad read at V-blank start.
    auto_joypad_enable: bool,
    /// NMITIMEN bits 4/5: H-IRQ/V-IRQ enable (mode 1 = H only, 2 = V only, 3 = H+V).
    h_irq_enable: bool,
    v_irq_enable: bool,

    /// RDNMI ($4210) bit 7: set on V-blank start, cleared on read.
    rdnmi_latch: bool,
    /// HVBJOY ($4212) bit 0: set while an auto-joypad read is in flight.
    joypad_busy: bool,

    htime: u16,
    vtime: u16,
    /// TIMEUP ($4211) bit 7: set when the H/V counters match HTIME/VTIME,
    /// cleared on read.
    timeup_latch: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Timer {
            clock_acc: 0,
            dot: 0,
            scanline: 0,
            hblank: false,
            vblank: false,
            nmi_enable: false,
            auto_joypad_enable: false,
            h_irq_enable: false,
            v_irq_enable: false,
            rdnmi_latch: false,
            joypad_busy: false,
            htime: 0,
            vtime: 0,
            timeup_latch: false,
        }
    }
}

impl Timer {
    pub fn new() -> Self {
        Timer::default()
    }

    /// Advances the H/V counters by `master_cycles`, raising NMI/IRQ on the
    /// interrupt flags as the relevant edges are crossed, and returning the
    /// edges crossed so the bus can forward them to DMA/input.
    pub fn tick(&mut self, master_cycles: u32, interrupts: &mut InterruptFlags) -> TimerEvents {
        let mut events = TimerEvents::default();
        self.clock_acc += master_cycles;
        while self.clock_acc >= MASTER_CLOCKS_PER_DOT {
            self.clock_acc -= MASTER_CLOCKS_PER_DOT;
            self.advance_dot(interrupts, &mut events);
        }
        events
    }

    fn advance_dot(&mut self, interrupts: &mut InterruptFlags, events: &mut TimerEvents) {
        self.dot += 1;

        if self.dot == HBLANK_START_DOT {
            self.hblank = true;
            events.hblank_start = true;
            trace!("HBlank start at scanline {}", self.scanline);
        } else if self.dot >= DOTS_PER_LINE {
            self.dot = 0;
            self.hblank = false;
            self.scanline += 1;

            if self.scanline == VBLANK_START_LINE {
                self.vblank = true;
                self.rdnmi_latch = true;
                events.vblank_start = true;
                if self.auto_joypad_enable {
                    self.joypad_busy = true;
                }
                if self.nmi_enable {
                    interrupts.raise_nmi();
                }
                trace!("VBlank start");
            } else if self.scanline == JOYPAD_BUSY_END_LINE {
                self.joypad_busy = false;
            } else if self.scanline >= LINES_PER_FRAME {
                self.scanline = 0;
                self.vblank = false;
            }
        }

        if self.h_irq_enable && self.dot == self.htime && (!self.v_irq_enable || self.scanline == self.vtime) {
            self.timeup_latch = true;
            interrupts.raise_irq();
        } else if self.v_irq_enable && !self.h_irq_enable && self.dot == 0 && self.scanline == self.vtime {
            self.timeup_latch = true;
            interrupts.raise_irq();
        }
    }

    /// Writes to NMITIMEN ($4200). The "late enable" quirk: if RDNMI's latch
    /// is already set when bit 7 transitions 0->1, NMI fires immediately
    /// instead of waiting for the next V-blank edge.
    pub fn write_nmitimen(&mut self, value: u8, interrupts: &mut InterruptFlags) {
        let was_enabled = self.nmi_enable;
        self.nmi_enable = value & 0x80 != 0;
        self.auto_joypad_enable = value & 0x01 != 0;
        self.h_irq_enable = value & 0x10 != 0;
        self.v_irq_enable = value & 0x20 != 0;

        if !was_enabled && self.nmi_enable && self.rdnmi_latch {
            interrupts.raise_nmi();
        }
    }

    pub fn write_htime_low(&mut self, value: u8) {
        self.htime = (self.htime & 0xFF00) | value as u16;
    }
    pub fn write_htime_high(&mut self, value: u8) {
        self.htime = (self.htime & 0x00FF) | ((value as u16 & 1) << 8);
    }
    pub fn write_vtime_low(&mut self, value: u8) {
        self.vtime = (self.vtime & 0xFF00) | value as u16;
    }
    pub fn write_vtime_high(&mut self, value: u8) {
        self.vtime = (self.vtime & 0x00FF) | ((value as u16 & 1) << 8);
    }

    /// Reads RDNMI ($4210): bit 7 is cleared as a side effect.
    pub fn read_rdnmi(&mut self) -> u8 {
        let v = if self.rdnmi_latch { 0x80 } else { 0x00 };
        self.rdnmi_latch = false;
        v
    }

    /// Reads HVBJOY ($4212): bit 7 V-blank, bit 6 H-blank, bit 0 joypad busy.
    pub fn read_hvbjoy(&self) -> u8 {
        let mut v = 0;
        if self.vblank {
            v |= 0x80;
        }
        if self.hblank {
            v |= 0x40;
        }
        if self.joypad_busy {
            v |= 0x01;
        }
        v
    }

    /// Reads TIMEUP ($4211): bit 7 is cleared as a side effect.
    pub fn read_timeup(&mut self) -> u8 {
        let v = if self.timeup_latch { 0x80 } else { 0x00 };
        self.timeup_latch = false;
        v
    }

    pub fn vblank(&self) -> bool {
        self.vblank
    }
    pub fn hblank(&self) -> bool {
        self.hblank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_vblank(timer: &mut Timer, interrupts: &mut InterruptFlags) {
        let dots_to_vblank = DOTS_PER_LINE as u32 * VBLANK_START_LINE as u32;
        timer.tick(dots_to_vblank * MASTER_CLOCKS_PER_DOT as u32, interrupts);
    }

    #[test]
    fn vblank_sets_rdnmi_and_raises_nmi_when_enabled() {
        let mut timer = Timer::new();
        let mut interrupts = InterruptFlags::default();
        timer.write_nmitimen(0x80, &mut interrupts);
        run_to_vblank(&mut timer, &mut interrupts);
        assert!(interrupts.take_nmi());
        assert_eq!(timer.read_rdnmi(), 0x80);
        assert_eq!(timer.read_rdnmi(), 0x00);
    }

    #[test]
    fn late_enable_fires_nmi_immediately_if_rdnmi_already_latched() {
        let mut timer = Timer::new();
        let mut interrupts = InterruptFlags::default();
        run_to_vblank(&mut timer, &mut interrupts);
        assert!(!interrupts.take_nmi());
        assert!(timer.rdnmi_latch);

        timer.write_nmitimen(0x80, &mut interrupts);
        assert!(interrupts.take_nmi());
    }

    #[test]
    fn hblank_event_fires_once_per_line() {
        let mut timer = Timer::new();
        let mut interrupts = InterruptFlags::default();
        let events = timer.tick(HBLANK_START_DOT as u32 * MASTER_CLOCKS_PER_DOT as u32, &mut interrupts);
        assert!(events.hblank_start);
        assert!(timer.hblank());
    }
}
