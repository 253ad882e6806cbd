//! The core's fatal-error taxonomy.
//!
//! The teacher's era of code treats all of these as `panic!`; `Result`-based
//! propagation is used instead so an embedder (CLI, future UI) can catch the
//! failure, log it, and stop the run loop cleanly rather than unwinding.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("illegal opcode {opcode:#04x} at {pc:#08x}")]
    IllegalDecode { opcode: u8, pc: u32 },

    #[error("unmapped bus {kind} at {addr:#08x}", kind = if *write { "write" } else { "read" })]
    UnmappedAccess { addr: u32, write: bool },

    #[error("invalid ROM image: {reason}")]
    InvalidRom { reason: String },

    #[error("unsupported ROM: {reason}")]
    UnsupportedRom { reason: String },
}
