//! The 64 KiB address space the SPC700 talks to.
//!
//! Mirrors [`wdc65816::bus::Bus`] in shape (the orchestrator wires both CPUs
//! through a small trait rather than a shared concrete memory type) but drops
//! the bank byte: the audio CPU's address space has none.

/// Abstraction over the audio RAM + I/O space, as seen by the SPC700.
pub trait Bus {
    fn read8(&mut self, addr: u16) -> u8;
    fn write8(&mut self, addr: u16, value: u8);
}
