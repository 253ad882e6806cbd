//! Instruction bodies and the opcode dispatch table.
//!
//! Every opcode is represented by one arm of [`execute`], pairing a handler
//! (grouped by mnemonic family below, following `spec.md` §4.5) with the
//! addressing mode it needs. Handlers are generic over the width flags (`m`,
//! `x`) they consult at runtime rather than being duplicated per width.

use crate::addressing::AddressingMode::{self, *};
use crate::bus::{Address, Bus};
use crate::cpu::Cpu;
use crate::status::BREAK;

type Am = AddressingMode;

// ---------------------------------------------------------------------
// Register transfers
// ---------------------------------------------------------------------

impl Cpu {
    fn transfer_to_acc(&mut self, value: u16) {
        self.a = if self.p.small_acc() {
            (self.a & 0xFF00) | self.p.set_nz8(value as u8) as u16
        } else {
            self.p.set_nz16(value)
        };
    }

    fn transfer_to_index(&mut self, value: u16) -> u16 {
        if self.p.small_index() {
            self.p.set_nz8(value as u8) as u16
        } else {
            self.p.set_nz16(value)
        }
    }

    fn acc_value(&self) -> u16 {
        if self.p.small_acc() {
            self.a & 0xFF
        } else {
            self.a
        }
    }

    fn tax(&mut self) {
        let v = self.acc_value();
        self.x = self.transfer_to_index(v);
    }
    fn tay(&mut self) {
        let v = self.acc_value();
        self.y = self.transfer_to_index(v);
    }
    fn txa(&mut self) {
        let v = self.x;
        self.transfer_to_acc(v);
    }
    fn tya(&mut self) {
        let v = self.y;
        self.transfer_to_acc(v);
    }
    fn txy(&mut self) {
        let v = self.x;
        self.y = self.transfer_to_index(v);
    }
    fn tyx(&mut self) {
        let v = self.y;
        self.x = self.transfer_to_index(v);
    }
    fn tsx(&mut self) {
        let v = self.s;
        self.x = self.transfer_to_index(v);
    }
    fn txs(&mut self) {
        self.s = if self.emulation { 0x0100 | (self.x & 0xFF) } else { self.x };
    }
    fn tcd(&mut self) {
        let a = self.a;
        self.d = self.p.set_nz16(a);
    }
    fn tdc(&mut self) {
        let d = self.d;
        self.a = self.p.set_nz16(d);
    }
    fn tcs(&mut self) {
        self.s = if self.emulation { 0x0100 | (self.a & 0xFF) } else { self.a };
    }
    fn tsc(&mut self) {
        let s = self.s;
        self.a = self.p.set_nz16(s);
    }
    fn xba(&mut self) {
        let lo = self.a as u8;
        let hi = (self.a >> 8) as u8;
        self.a = ((lo as u16) << 8) | hi as u16;
        self.p.set_nz8(hi);
    }
}

// ---------------------------------------------------------------------
// Loads / stores
// ---------------------------------------------------------------------

impl Cpu {
    fn lda(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            self.a = (self.a & 0xFF00) | self.p.set_nz8(v) as u16;
        } else {
            let v = am.loadw(self, bus);
            self.a = self.p.set_nz16(v);
        }
    }
    fn ldx(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_index() {
            let v = am.loadb(self, bus);
            self.x = self.p.set_nz8(v) as u16;
        } else {
            let v = am.loadw(self, bus);
            self.x = self.p.set_nz16(v);
        }
    }
    fn ldy(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_index() {
            let v = am.loadb(self, bus);
            self.y = self.p.set_nz8(v) as u16;
        } else {
            let v = am.loadw(self, bus);
            self.y = self.p.set_nz16(v);
        }
    }
    fn sta(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = self.a as u8;
            am.storeb(self, bus, v);
        } else {
            let v = self.a;
            am.storew(self, bus, v);
        }
    }
    fn stx(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_index() {
            let v = self.x as u8;
            am.storeb(self, bus, v);
        } else {
            let v = self.x;
            am.storew(self, bus, v);
        }
    }
    fn sty(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_index() {
            let v = self.y as u8;
            am.storeb(self, bus, v);
        } else {
            let v = self.y;
            am.storew(self, bus, v);
        }
    }
    fn stz(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            am.storeb(self, bus, 0);
        } else {
            am.storew(self, bus, 0);
        }
    }
}

// ---------------------------------------------------------------------
// Stack operations
// ---------------------------------------------------------------------

impl Cpu {
    fn pha(&mut self, bus: &mut impl Bus) {
        if self.p.small_acc() {
            let v = self.a as u8;
            self.pushb(bus, v);
        } else {
            let v = self.a;
            self.pushw(bus, v);
        }
    }
    fn pla(&mut self, bus: &mut impl Bus) {
        if self.p.small_acc() {
            let v = self.popb(bus);
            self.a = (self.a & 0xFF00) | self.p.set_nz8(v) as u16;
        } else {
            let v = self.popw(bus);
            self.a = self.p.set_nz16(v);
        }
    }
    fn phx(&mut self, bus: &mut impl Bus) {
        if self.p.small_index() {
            let v = self.x as u8;
            self.pushb(bus, v);
        } else {
            let v = self.x;
            self.pushw(bus, v);
        }
    }
    fn plx(&mut self, bus: &mut impl Bus) {
        if self.p.small_index() {
            let v = self.popb(bus);
            self.x = self.p.set_nz8(v) as u16;
        } else {
            let v = self.popw(bus);
            self.x = self.p.set_nz16(v);
        }
    }
    fn phy(&mut self, bus: &mut impl Bus) {
        if self.p.small_index() {
            let v = self.y as u8;
            self.pushb(bus, v);
        } else {
            let v = self.y;
            self.pushw(bus, v);
        }
    }
    fn ply(&mut self, bus: &mut impl Bus) {
        if self.p.small_index() {
            let v = self.popb(bus);
            self.y = self.p.set_nz8(v) as u16;
        } else {
            let v = self.popw(bus);
            self.y = self.p.set_nz16(v);
        }
    }
    fn phb(&mut self, bus: &mut impl Bus) {
        let v = self.dbr;
        self.pushb(bus, v);
    }
    fn plb(&mut self, bus: &mut impl Bus) {
        let v = self.popb(bus);
        self.dbr = self.p.set_nz8(v);
    }
    fn phd(&mut self, bus: &mut impl Bus) {
        let v = self.d;
        self.pushw(bus, v);
    }
    fn pld(&mut self, bus: &mut impl Bus) {
        let v = self.popw(bus);
        self.d = self.p.set_nz16(v);
    }
    fn phk(&mut self, bus: &mut impl Bus) {
        let v = self.pbr;
        self.pushb(bus, v);
    }
    fn php(&mut self, bus: &mut impl Bus) {
        let v = self.p.0;
        self.pushb(bus, v);
    }
    fn plp(&mut self, bus: &mut impl Bus) {
        let v = self.popb(bus);
        self.p.0 = v;
        self.normalize_widths();
    }
    fn pea(&mut self, bus: &mut impl Bus) {
        let v = self.fetchw(bus);
        self.pushw(bus, v);
    }
    fn pei(&mut self, bus: &mut impl Bus, am: Am) {
        let addr = am.address(self, bus);
        self.pushw(bus, addr.offset);
    }
    fn per(&mut self, bus: &mut impl Bus, am: Am) {
        // `am` is the already-resolved Relative16 target; push it as a value.
        let addr = am.address(self, bus);
        self.pushw(bus, addr.offset);
    }
}

// ---------------------------------------------------------------------
// Logical
// ---------------------------------------------------------------------

impl Cpu {
    fn and(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            let r = self.p.set_nz8(self.a as u8 & v);
            self.a = (self.a & 0xFF00) | r as u16;
        } else {
            let v = am.loadw(self, bus);
            self.a = self.p.set_nz16(self.a & v);
        }
    }
    fn ora(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            let r = self.p.set_nz8(self.a as u8 | v);
            self.a = (self.a & 0xFF00) | r as u16;
        } else {
            let v = am.loadw(self, bus);
            self.a = self.p.set_nz16(self.a | v);
        }
    }
    fn eor(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            let r = self.p.set_nz8(self.a as u8 ^ v);
            self.a = (self.a & 0xFF00) | r as u16;
        } else {
            let v = am.loadw(self, bus);
            self.a = self.p.set_nz16(self.a ^ v);
        }
    }

    fn bit(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            self.p.set_zero(self.a as u8 & v == 0);
            if !matches!(am, Immediate8(_)) {
                self.p.set_negative(v & 0x80 != 0);
                self.p.set_overflow(v & 0x40 != 0);
            }
        } else {
            let v = am.loadw(self, bus);
            self.p.set_zero(self.a & v == 0);
            if !matches!(am, Immediate(_)) {
                self.p.set_negative(v & 0x8000 != 0);
                self.p.set_overflow(v & 0x4000 != 0);
            }
        }
    }

    fn trb(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            self.p.set_zero(self.a as u8 & v == 0);
            am.storeb(self, bus, !(self.a as u8) & v);
        } else {
            let v = am.loadw(self, bus);
            self.p.set_zero(self.a & v == 0);
            am.storew(self, bus, !self.a & v);
        }
    }
    fn tsb(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            self.p.set_zero(self.a as u8 & v == 0);
            am.storeb(self, bus, self.a as u8 | v);
        } else {
            let v = am.loadw(self, bus);
            self.p.set_zero(self.a & v == 0);
            am.storew(self, bus, self.a | v);
        }
    }
}

// ---------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------

impl Cpu {
    /// Shared ADC path for both widths. `operand` has already been
    /// bitwise-inverted by the caller when implementing SBC.
    fn adc8(&mut self, a: u8, operand: u8) -> u8 {
        let c = self.p.carry() as u16;
        if !self.p.decimal() {
            let result = a as u16 + operand as u16 + c;
            self.p.set_overflow((a ^ operand as u8) & 0x80 == 0 && (a ^ result as u8) & 0x80 != 0);
            self.p.set_carry(result > 0xFF);
            self.p.set_nz8(result as u8)
        } else {
            let mut result = (a & 0x0F) as u16 + (operand & 0x0F) as u16 + c;
            if result >= 0x0A {
                result = ((result + 0x06) & 0x0F) + 0x10;
            }
            result = (a & 0xF0) as u16 + (operand & 0xF0) as u16 + result;
            self.p.set_overflow((a as u16 ^ result) & !(a as u16 ^ operand as u16) & 0x80 != 0);
            if result >= 0xA0 {
                result = (result + 0x60) & 0xFF;
            }
            self.p.set_carry(result > 0xFF);
            self.p.set_nz8(result as u8)
        }
    }

    fn adc16(&mut self, a: u16, operand: u16) -> u16 {
        let c = self.p.carry() as u32;
        if !self.p.decimal() {
            let result = a as u32 + operand as u32 + c;
            self.p.set_overflow((a ^ operand) & !(a ^ result as u16) & 0x8000 != 0);
            self.p.set_carry(result > 0xFFFF);
            self.p.set_nz16(result as u16)
        } else {
            let mut result = (a & 0x000F) as u32 + (operand & 0x000F) as u32 + c;
            if result >= 0x0A {
                result = ((result + 0x06) & 0x0F) + 0x10;
            }
            result = (a & 0x00F0) as u32 + (operand & 0x00F0) as u32 + result;
            if result >= 0xA0 {
                result = ((result + 0x60) & 0xFF) + 0x100;
            }
            result = (a & 0x0F00) as u32 + (operand & 0x0F00) as u32 + result;
            if result >= 0x0A00 {
                result = ((result + 0x600) & 0x0FFF) + 0x1000;
            }
            result = (a & 0xF000) as u32 + (operand & 0xF000) as u32 + result;
            // Overflow is set from the pre-final-adjustment result, per the
            // reference implementation this behavior is grounded on.
            self.p.set_overflow((a as u32 ^ result) & !(a as u32 ^ operand as u32) & 0x8000 != 0);
            if result >= 0xA000 {
                result += 0x6000;
            }
            self.p.set_carry(result > 0xFFFF);
            self.p.set_nz16(result as u16)
        }
    }

    fn adc(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let operand = am.loadb(self, bus);
            let a = self.a as u8;
            let r = self.adc8(a, operand);
            self.a = (self.a & 0xFF00) | r as u16;
        } else {
            let operand = am.loadw(self, bus);
            let a = self.a;
            self.a = self.adc16(a, operand);
        }
    }

    fn sbc(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let operand = !am.loadb(self, bus);
            let a = self.a as u8;
            let r = self.adc8(a, operand);
            self.a = (self.a & 0xFF00) | r as u16;
        } else {
            let operand = !am.loadw(self, bus);
            let a = self.a;
            self.a = self.adc16(a, operand);
        }
    }
}

// ---------------------------------------------------------------------
// Compare
// ---------------------------------------------------------------------

impl Cpu {
    fn compare8(&mut self, a: u8, b: u8) {
        self.p.set_carry(a >= b);
        let r = a.wrapping_sub(b);
        self.p.set_zero(r == 0);
        self.p.set_negative(r & 0x80 != 0);
    }
    fn compare16(&mut self, a: u16, b: u16) {
        self.p.set_carry(a >= b);
        let r = a.wrapping_sub(b);
        self.p.set_zero(r == 0);
        self.p.set_negative(r & 0x8000 != 0);
    }

    fn cmp(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let b = am.loadb(self, bus);
            let a = self.a as u8;
            self.compare8(a, b);
        } else {
            let b = am.loadw(self, bus);
            let a = self.a;
            self.compare16(a, b);
        }
    }
    fn cpx(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_index() {
            let b = am.loadb(self, bus);
            let x = self.x as u8;
            self.compare8(x, b);
        } else {
            let b = am.loadw(self, bus);
            let x = self.x;
            self.compare16(x, b);
        }
    }
    fn cpy(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_index() {
            let b = am.loadb(self, bus);
            let y = self.y as u8;
            self.compare8(y, b);
        } else {
            let b = am.loadw(self, bus);
            let y = self.y;
            self.compare16(y, b);
        }
    }
}

// ---------------------------------------------------------------------
// Increment / decrement
// ---------------------------------------------------------------------

impl Cpu {
    fn inc(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus).wrapping_add(1);
            self.p.set_nz8(v);
            am.storeb(self, bus, v);
        } else {
            let v = am.loadw(self, bus).wrapping_add(1);
            self.p.set_nz16(v);
            am.storew(self, bus, v);
        }
    }
    fn dec(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus).wrapping_sub(1);
            self.p.set_nz8(v);
            am.storeb(self, bus, v);
        } else {
            let v = am.loadw(self, bus).wrapping_sub(1);
            self.p.set_nz16(v);
            am.storew(self, bus, v);
        }
    }
    fn inx(&mut self) {
        self.x = if self.p.small_index() {
            self.p.set_nz8((self.x as u8).wrapping_add(1)) as u16
        } else {
            self.p.set_nz16(self.x.wrapping_add(1))
        };
    }
    fn iny(&mut self) {
        self.y = if self.p.small_index() {
            self.p.set_nz8((self.y as u8).wrapping_add(1)) as u16
        } else {
            self.p.set_nz16(self.y.wrapping_add(1))
        };
    }
    fn dex(&mut self) {
        self.x = if self.p.small_index() {
            self.p.set_nz8((self.x as u8).wrapping_sub(1)) as u16
        } else {
            self.p.set_nz16(self.x.wrapping_sub(1))
        };
    }
    fn dey(&mut self) {
        self.y = if self.p.small_index() {
            self.p.set_nz8((self.y as u8).wrapping_sub(1)) as u16
        } else {
            self.p.set_nz16(self.y.wrapping_sub(1))
        };
    }
}

// ---------------------------------------------------------------------
// Shifts / rotates
// ---------------------------------------------------------------------

impl Cpu {
    fn asl(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            self.p.set_carry(v & 0x80 != 0);
            let r = self.p.set_nz8(v << 1);
            am.storeb(self, bus, r);
        } else {
            let v = am.loadw(self, bus);
            self.p.set_carry(v & 0x8000 != 0);
            let r = self.p.set_nz16(v << 1);
            am.storew(self, bus, r);
        }
    }
    fn lsr(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            self.p.set_carry(v & 0x01 != 0);
            let r = self.p.set_nz8(v >> 1);
            am.storeb(self, bus, r);
        } else {
            let v = am.loadw(self, bus);
            self.p.set_carry(v & 0x01 != 0);
            let r = self.p.set_nz16(v >> 1);
            am.storew(self, bus, r);
        }
    }
    fn rol(&mut self, bus: &mut impl Bus, am: Am) {
        let c = self.p.carry() as u16;
        if self.p.small_acc() {
            let v = am.loadb(self, bus);
            self.p.set_carry(v & 0x80 != 0);
            let r = self.p.set_nz8((v << 1) | c as u8);
            am.storeb(self, bus, r);
        } else {
            let v = am.loadw(self, bus);
            self.p.set_carry(v & 0x8000 != 0);
            let r = self.p.set_nz16((v << 1) | c);
            am.storew(self, bus, r);
        }
    }
    fn ror(&mut self, bus: &mut impl Bus, am: Am) {
        if self.p.small_acc() {
            let c = (self.p.carry() as u8) << 7;
            let v = am.loadb(self, bus);
            self.p.set_carry(v & 0x01 != 0);
            let r = self.p.set_nz8((v >> 1) | c);
            am.storeb(self, bus, r);
        } else {
            let c = (self.p.carry() as u16) << 15;
            let v = am.loadw(self, bus);
            self.p.set_carry(v & 0x01 != 0);
            let r = self.p.set_nz16((v >> 1) | c);
            am.storew(self, bus, r);
        }
    }
}

// ---------------------------------------------------------------------
// Branches / jumps
// ---------------------------------------------------------------------

impl Cpu {
    fn branch_if(&mut self, bus: &mut impl Bus, am: Am, cond: bool) {
        if cond {
            let addr = am.address(self, bus);
            self.pbr = addr.bank;
            self.pc = addr.offset;
        }
    }

    fn jmp(&mut self, bus: &mut impl Bus, am: Am) {
        let addr = am.address(self, bus);
        self.pc = addr.offset;
    }
    fn jml(&mut self, bus: &mut impl Bus, am: Am) {
        let addr = am.address(self, bus);
        self.pbr = addr.bank;
        self.pc = addr.offset;
    }
    fn jsr(&mut self, bus: &mut impl Bus, am: Am) {
        let addr = am.address(self, bus);
        let ret = self.pc.wrapping_sub(1);
        self.pushw(bus, ret);
        self.pc = addr.offset;
    }
    fn jsl(&mut self, bus: &mut impl Bus, am: Am) {
        let addr = am.address(self, bus);
        let pbr = self.pbr;
        self.pushb(bus, pbr);
        let ret = self.pc.wrapping_sub(1);
        self.pushw(bus, ret);
        self.pbr = addr.bank;
        self.pc = addr.offset;
    }
    fn rts(&mut self, bus: &mut impl Bus) {
        let ret = self.popw(bus);
        self.pc = ret.wrapping_add(1);
    }
    fn rtl(&mut self, bus: &mut impl Bus) {
        let ret = self.popw(bus);
        self.pc = ret.wrapping_add(1);
        self.pbr = self.popb(bus);
    }
    fn rti(&mut self, bus: &mut impl Bus) {
        let p = self.popb(bus);
        self.p.0 = p;
        self.normalize_widths();
        self.pc = self.popw(bus);
        if !self.emulation {
            self.pbr = self.popb(bus);
        }
    }
}

// ---------------------------------------------------------------------
// Software interrupts
// ---------------------------------------------------------------------

impl Cpu {
    fn software_interrupt(&mut self, bus: &mut impl Bus, is_brk: bool) {
        if !self.emulation {
            self.pushb(bus, self.pbr);
        }
        let ret = self.pc.wrapping_add(1);
        self.pushw(bus, ret);
        let p = if self.emulation { self.p.0 | BREAK } else { self.p.0 };
        self.pushb(bus, p);
        self.p.set_decimal(false);
        self.p.set_irq_disable(true);
        self.pbr = 0;
        let vector = match (self.emulation, is_brk) {
            (true, true) => crate::cpu::IRQ_VEC_E,
            (true, false) => crate::cpu::COP_VEC_E,
            (false, true) => crate::cpu::BRK_VEC_N,
            (false, false) => crate::cpu::COP_VEC_N,
        };
        let lo = bus.read8(Address::new(0, vector)) as u16;
        let hi = bus.read8(Address::new(0, vector + 1)) as u16;
        self.pc = (hi << 8) | lo;
    }
}

// ---------------------------------------------------------------------
// Flag operations
// ---------------------------------------------------------------------

impl Cpu {
    fn rep(&mut self, bus: &mut impl Bus) {
        let mask = self.am_immediate8(bus).loadb(self, bus);
        self.p.0 &= !mask;
        self.normalize_widths();
    }
    fn sep(&mut self, bus: &mut impl Bus) {
        let mask = self.am_immediate8(bus).loadb(self, bus);
        self.p.0 |= mask;
        self.normalize_widths();
    }
    fn xce(&mut self) {
        let carry = self.p.carry();
        let e = self.emulation;
        self.p.set_carry(e);
        self.set_emulation(carry);
    }
}

// ---------------------------------------------------------------------
// Block moves
// ---------------------------------------------------------------------

impl Cpu {
    /// `dir` is `+1` for MVN, `-1` for MVP.
    fn block_move(&mut self, bus: &mut impl Bus, dir: i32) {
        let dst_bank = self.fetchb(bus);
        let src_bank = self.fetchb(bus);
        self.dbr = dst_bank;
        let byte = bus.read8(Address::new(src_bank, self.x));
        bus.write8(Address::new(dst_bank, self.y), byte);
        if dir > 0 {
            self.x = self.x.wrapping_add(1);
            self.y = self.y.wrapping_add(1);
        } else {
            self.x = self.x.wrapping_sub(1);
            self.y = self.y.wrapping_sub(1);
        }
        if self.p.small_index() {
            self.x &= 0xFF;
            self.y &= 0xFF;
        }
        self.a = self.a.wrapping_sub(1);
        if self.a != 0xFFFF {
            // Re-execute: rewind PC to the start of this 3-byte instruction.
            self.pc = self.pc.wrapping_sub(3);
        }
    }
}

// ---------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------

macro_rules! am {
    ($cpu:expr, $bus:expr, immediate_acc) => {
        $cpu.am_immediate_acc($bus)
    };
    ($cpu:expr, $bus:expr, immediate_index) => {
        $cpu.am_immediate_index($bus)
    };
    ($cpu:expr, $bus:expr, immediate8) => {
        $cpu.am_immediate8($bus)
    };
    ($cpu:expr, $bus:expr, absolute) => {
        $cpu.am_absolute($bus)
    };
    ($cpu:expr, $bus:expr, absolute_long) => {
        $cpu.am_absolute_long($bus)
    };
    ($cpu:expr, $bus:expr, abs_x) => {
        $cpu.am_abs_indexed_x($bus)
    };
    ($cpu:expr, $bus:expr, abs_y) => {
        $cpu.am_abs_indexed_y($bus)
    };
    ($cpu:expr, $bus:expr, abs_long_x) => {
        $cpu.am_abs_long_indexed_x($bus)
    };
    ($cpu:expr, $bus:expr, abs_indirect) => {
        $cpu.am_abs_indirect($bus)
    };
    ($cpu:expr, $bus:expr, abs_indirect_long) => {
        $cpu.am_abs_indirect_long($bus)
    };
    ($cpu:expr, $bus:expr, abs_indexed_indirect) => {
        $cpu.am_abs_indexed_indirect($bus)
    };
    ($cpu:expr, $bus:expr, direct) => {
        $cpu.am_direct($bus)
    };
    ($cpu:expr, $bus:expr, direct_x) => {
        $cpu.am_direct_indexed_x($bus)
    };
    ($cpu:expr, $bus:expr, direct_y) => {
        $cpu.am_direct_indexed_y($bus)
    };
    ($cpu:expr, $bus:expr, direct_indirect) => {
        $cpu.am_direct_indirect($bus)
    };
    ($cpu:expr, $bus:expr, direct_indirect_y) => {
        $cpu.am_direct_indirect_idx_y($bus)
    };
    ($cpu:expr, $bus:expr, direct_indirect_long) => {
        $cpu.am_direct_indirect_long($bus)
    };
    ($cpu:expr, $bus:expr, direct_indirect_long_y) => {
        $cpu.am_direct_indirect_long_idx_y($bus)
    };
    ($cpu:expr, $bus:expr, direct_indexed_indirect) => {
        $cpu.am_direct_indexed_indirect($bus)
    };
    ($cpu:expr, $bus:expr, stack_rel) => {
        $cpu.am_stack_relative($bus)
    };
    ($cpu:expr, $bus:expr, stack_rel_indirect_y) => {
        $cpu.am_stack_relative_ind_idx_y($bus)
    };
    ($cpu:expr, $bus:expr, rel8) => {
        $cpu.am_relative8($bus)
    };
    ($cpu:expr, $bus:expr, rel16) => {
        $cpu.am_relative16($bus)
    };
    ($cpu:expr, $bus:expr, accumulator) => {
        Accumulator
    };
}

/// Decodes and executes one instruction. `op` has already been fetched.
pub fn execute(cpu: &mut Cpu, bus: &mut impl Bus, op: u8) {
    macro_rules! rw {
        ($name:ident, $mode:tt) => {{
            let mode = am!(cpu, bus, $mode);
            cpu.$name(bus, mode)
        }};
    }
    macro_rules! branch {
        ($cond:expr) => {{
            let mode = cpu.am_relative8(bus);
            cpu.branch_if(bus, mode, $cond)
        }};
    }

    match op {
        // ---- Loads ----
        0xA9 => rw!(lda, immediate_acc),
        0xA5 => rw!(lda, direct),
        0xB5 => rw!(lda, direct_x),
        0xAD => rw!(lda, absolute),
        0xBD => rw!(lda, abs_x),
        0xB9 => rw!(lda, abs_y),
        0xAF => rw!(lda, absolute_long),
        0xBF => rw!(lda, abs_long_x),
        0xA1 => rw!(lda, direct_indexed_indirect),
        0xB1 => rw!(lda, direct_indirect_y),
        0xB2 => rw!(lda, direct_indirect),
        0xA7 => rw!(lda, direct_indirect_long),
        0xB7 => rw!(lda, direct_indirect_long_y),
        0xA3 => rw!(lda, stack_rel),
        0xB3 => rw!(lda, stack_rel_indirect_y),

        0xA2 => rw!(ldx, immediate_index),
        0xA6 => rw!(ldx, direct),
        0xB6 => rw!(ldx, direct_y),
        0xAE => rw!(ldx, absolute),
        0xBE => rw!(ldx, abs_y),

        0xA0 => rw!(ldy, immediate_index),
        0xA4 => rw!(ldy, direct),
        0xB4 => rw!(ldy, direct_x),
        0xAC => rw!(ldy, absolute),
        0xBC => rw!(ldy, abs_x),

        // ---- Stores ----
        0x85 => rw!(sta, direct),
        0x95 => rw!(sta, direct_x),
        0x8D => rw!(sta, absolute),
        0x9D => rw!(sta, abs_x),
        0x99 => rw!(sta, abs_y),
        0x8F => rw!(sta, absolute_long),
        0x9F => rw!(sta, abs_long_x),
        0x81 => rw!(sta, direct_indexed_indirect),
        0x91 => rw!(sta, direct_indirect_y),
        0x92 => rw!(sta, direct_indirect),
        0x87 => rw!(sta, direct_indirect_long),
        0x97 => rw!(sta, direct_indirect_long_y),
        0x83 => rw!(sta, stack_rel),
        0x93 => rw!(sta, stack_rel_indirect_y),

        0x86 => rw!(stx, direct),
        0x96 => rw!(stx, direct_y),
        0x8E => rw!(stx, absolute),

        0x84 => rw!(sty, direct),
        0x94 => rw!(sty, direct_x),
        0x8C => rw!(sty, absolute),

        0x64 => rw!(stz, direct),
        0x74 => rw!(stz, direct_x),
        0x9C => rw!(stz, absolute),
        0x9E => rw!(stz, abs_x),

        // ---- Register transfers ----
        0xAA => cpu.tax(),
        0xA8 => cpu.tay(),
        0x8A => cpu.txa(),
        0x98 => cpu.tya(),
        0x9B => cpu.txy(),
        0xBB => cpu.tyx(),
        0xBA => cpu.tsx(),
        0x9A => cpu.txs(),
        0x5B => cpu.tcd(),
        0x7B => cpu.tdc(),
        0x1B => cpu.tcs(),
        0x3B => cpu.tsc(),
        0xEB => cpu.xba(),

        // ---- Stack ----
        0x48 => cpu.pha(bus),
        0x68 => cpu.pla(bus),
        0xDA => cpu.phx(bus),
        0xFA => cpu.plx(bus),
        0x5A => cpu.phy(bus),
        0x7A => cpu.ply(bus),
        0x8B => cpu.phb(bus),
        0xAB => cpu.plb(bus),
        0x0B => cpu.phd(bus),
        0x2B => cpu.pld(bus),
        0x4B => cpu.phk(bus),
        0x08 => cpu.php(bus),
        0x28 => cpu.plp(bus),
        0xF4 => cpu.pea(bus),
        0xD4 => {
            let mode = cpu.am_direct(bus);
            cpu.pei(bus, mode)
        }
        0x62 => {
            let mode = cpu.am_relative16(bus);
            cpu.per(bus, mode)
        }

        // ---- Logical ----
        0x29 => rw!(and, immediate_acc),
        0x25 => rw!(and, direct),
        0x35 => rw!(and, direct_x),
        0x2D => rw!(and, absolute),
        0x3D => rw!(and, abs_x),
        0x39 => rw!(and, abs_y),
        0x2F => rw!(and, absolute_long),
        0x3F => rw!(and, abs_long_x),
        0x21 => rw!(and, direct_indexed_indirect),
        0x31 => rw!(and, direct_indirect_y),
        0x32 => rw!(and, direct_indirect),
        0x27 => rw!(and, direct_indirect_long),
        0x37 => rw!(and, direct_indirect_long_y),
        0x23 => rw!(and, stack_rel),
        0x33 => rw!(and, stack_rel_indirect_y),

        0x09 => rw!(ora, immediate_acc),
        0x05 => rw!(ora, direct),
        0x15 => rw!(ora, direct_x),
        0x0D => rw!(ora, absolute),
        0x1D => rw!(ora, abs_x),
        0x19 => rw!(ora, abs_y),
        0x0F => rw!(ora, absolute_long),
        0x1F => rw!(ora, abs_long_x),
        0x01 => rw!(ora, direct_indexed_indirect),
        0x11 => rw!(ora, direct_indirect_y),
        0x12 => rw!(ora, direct_indirect),
        0x07 => rw!(ora, direct_indirect_long),
        0x17 => rw!(ora, direct_indirect_long_y),
        0x03 => rw!(ora, stack_rel),
        0x13 => rw!(ora, stack_rel_indirect_y),

        0x49 => rw!(eor, immediate_acc),
        0x45 => rw!(eor, direct),
        0x55 => rw!(eor, direct_x),
        0x4D => rw!(eor, absolute),
        0x5D => rw!(eor, abs_x),
        0x59 => rw!(eor, abs_y),
        0x4F => rw!(eor, absolute_long),
        0x5F => rw!(eor, abs_long_x),
        0x41 => rw!(eor, direct_indexed_indirect),
        0x51 => rw!(eor, direct_indirect_y),
        0x52 => rw!(eor, direct_indirect),
        0x47 => rw!(eor, direct_indirect_long),
        0x57 => rw!(eor, direct_indirect_long_y),
        0x43 => rw!(eor, stack_rel),
        0x53 => rw!(eor, stack_rel_indirect_y),

        0x89 => rw!(bit, immediate_acc),
        0x24 => rw!(bit, direct),
        0x34 => rw!(bit, direct_x),
        0x2C => rw!(bit, absolute),
        0x3C => rw!(bit, abs_x),

        0x14 => rw!(trb, direct),
        0x1C => rw!(trb, absolute),
        0x04 => rw!(tsb, direct),
        0x0C => rw!(tsb, absolute),

        // ---- Arithmetic ----
        0x69 => rw!(adc, immediate_acc),
        0x65 => rw!(adc, direct),
        0x75 => rw!(adc, direct_x),
        0x6D => rw!(adc, absolute),
        0x7D => rw!(adc, abs_x),
        0x79 => rw!(adc, abs_y),
        0x6F => rw!(adc, absolute_long),
        0x7F => rw!(adc, abs_long_x),
        0x61 => rw!(adc, direct_indexed_indirect),
        0x71 => rw!(adc, direct_indirect_y),
        0x72 => rw!(adc, direct_indirect),
        0x67 => rw!(adc, direct_indirect_long),
        0x77 => rw!(adc, direct_indirect_long_y),
        0x63 => rw!(adc, stack_rel),
        0x73 => rw!(adc, stack_rel_indirect_y),

        0xE9 => rw!(sbc, immediate_acc),
        0xE5 => rw!(sbc, direct),
        0xF5 => rw!(sbc, direct_x),
        0xED => rw!(sbc, absolute),
        0xFD => rw!(sbc, abs_x),
        0xF9 => rw!(sbc, abs_y),
        0xEF => rw!(sbc, absolute_long),
        0xFF => rw!(sbc, abs_long_x),
        0xE1 => rw!(sbc, direct_indexed_indirect),
        0xF1 => rw!(sbc, direct_indirect_y),
        0xF2 => rw!(sbc, direct_indirect),
        0xE7 => rw!(sbc, direct_indirect_long),
        0xF7 => rw!(sbc, direct_indirect_long_y),
        0xE3 => rw!(sbc, stack_rel),
        0xF3 => rw!(sbc, stack_rel_indirect_y),

        // ---- Compare ----
        0xC9 => rw!(cmp, immediate_acc),
        0xC5 => rw!(cmp, direct),
        0xD5 => rw!(cmp, direct_x),
        0xCD => rw!(cmp, absolute),
        0xDD => rw!(cmp, abs_x),
        0xD9 => rw!(cmp, abs_y),
        0xCF => rw!(cmp, absolute_long),
        0xDF => rw!(cmp, abs_long_x),
        0xC1 => rw!(cmp, direct_indexed_indirect),
        0xD1 => rw!(cmp, direct_indirect_y),
        0xD2 => rw!(cmp, direct_indirect),
        0xC7 => rw!(cmp, direct_indirect_long),
        0xD7 => rw!(cmp, direct_indirect_long_y),
        0xC3 => rw!(cmp, stack_rel),
        0xD3 => rw!(cmp, stack_rel_indirect_y),

        0xE0 => rw!(cpx, immediate_index),
        0xE4 => rw!(cpx, direct),
        0xEC => rw!(cpx, absolute),
        0xC0 => rw!(cpy, immediate_index),
        0xC4 => rw!(cpy, direct),
        0xCC => rw!(cpy, absolute),

        // ---- Increment / decrement ----
        0xE6 => rw!(inc, direct),
        0xF6 => rw!(inc, direct_x),
        0xEE => rw!(inc, absolute),
        0xFE => rw!(inc, abs_x),
        0x1A => rw!(inc, accumulator),
        0xC6 => rw!(dec, direct),
        0xD6 => rw!(dec, direct_x),
        0xCE => rw!(dec, absolute),
        0xDE => rw!(dec, abs_x),
        0x3A => rw!(dec, accumulator),
        0xE8 => cpu.inx(),
        0xC8 => cpu.iny(),
        0xCA => cpu.dex(),
        0x88 => cpu.dey(),

        // ---- Shifts / rotates ----
        0x0A => rw!(asl, accumulator),
        0x06 => rw!(asl, direct),
        0x16 => rw!(asl, direct_x),
        0x0E => rw!(asl, absolute),
        0x1E => rw!(asl, abs_x),
        0x4A => rw!(lsr, accumulator),
        0x46 => rw!(lsr, direct),
        0x56 => rw!(lsr, direct_x),
        0x4E => rw!(lsr, absolute),
        0x5E => rw!(lsr, abs_x),
        0x2A => rw!(rol, accumulator),
        0x26 => rw!(rol, direct),
        0x36 => rw!(rol, direct_x),
        0x2E => rw!(rol, absolute),
        0x3E => rw!(rol, abs_x),
        0x6A => rw!(ror, accumulator),
        0x66 => rw!(ror, direct),
        0x76 => rw!(ror, direct_x),
        0x6E => rw!(ror, absolute),
        0x7E => rw!(ror, abs_x),

        // ---- Branches ----
        0x80 => {
            let mode = cpu.am_relative8(bus);
            cpu.branch_if(bus, mode, true)
        }
        0x90 => branch!(!cpu.p.carry()),
        0xB0 => branch!(cpu.p.carry()),
        0xF0 => branch!(cpu.p.zero()),
        0xD0 => branch!(!cpu.p.zero()),
        0x10 => branch!(!cpu.p.negative()),
        0x30 => branch!(cpu.p.negative()),
        0x50 => branch!(!cpu.p.overflow()),
        0x70 => branch!(cpu.p.overflow()),
        0x82 => {
            let mode = cpu.am_relative16(bus);
            cpu.branch_if(bus, mode, true)
        }

        // ---- Jumps ----
        0x4C => rw!(jmp, absolute),
        0x6C => rw!(jmp, abs_indirect),
        0x7C => rw!(jmp, abs_indexed_indirect),
        0x5C => rw!(jml, absolute_long),
        0xDC => rw!(jml, abs_indirect_long),
        0x20 => rw!(jsr, absolute),
        0xFC => rw!(jsr, abs_indexed_indirect),
        0x22 => rw!(jsl, absolute_long),
        0x60 => cpu.rts(bus),
        0x6B => cpu.rtl(bus),
        0x40 => cpu.rti(bus),

        // ---- Software interrupts ----
        0x00 => cpu.software_interrupt(bus, true),
        0x02 => cpu.software_interrupt(bus, false),

        // ---- Flags ----
        0x18 => cpu.p.set_carry(false),
        0x38 => cpu.p.set_carry(true),
        0x58 => cpu.p.set_irq_disable(false),
        0x78 => cpu.p.set_irq_disable(true),
        0xB8 => cpu.p.set_overflow(false),
        0xD8 => cpu.p.set_decimal(false),
        0xF8 => cpu.p.set_decimal(true),
        0xC2 => cpu.rep(bus),
        0xE2 => cpu.sep(bus),
        0xFB => cpu.xce(),

        // ---- Block moves ----
        0x54 => cpu.block_move(bus, 1),
        0x44 => cpu.block_move(bus, -1),

        // ---- Misc ----
        0xEA => {}
        0x42 => {
            cpu.fetchb(bus);
        }
        0xCB => cpu.waiting = true,
        0xDB => cpu.waiting = true,

        _ => {
            log::error!("illegal 65C816 opcode: {:02X} at {:02X}:{:04X}", op, cpu.pbr, cpu.pc.wrapping_sub(1));
        }
    }
}
