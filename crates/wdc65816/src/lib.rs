//! A standalone 65C816 core.
//!
//! Holds no memory itself: every access goes through the [`bus::Bus`] trait,
//! so this crate has no opinion on address decoding, cartridge mapping, or
//! cycle accounting — that is the host's job (see `snes_core::bus`).

pub mod addressing;
pub mod bus;
pub mod cpu;
mod opcodes;
pub mod status;

pub use addressing::AddressingMode;
pub use bus::{Address, Bus};
pub use cpu::Cpu;
pub use status::StatusReg;
