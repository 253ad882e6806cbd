//! The contract a host debugger/UI layer can hook into.
//!
//! The core never spawns a thread or takes a lock itself — see `snes::Snes`'s
//! doc comment for the worker/UI boundary this trait stands in for. Calls are
//! synchronous, made from the orchestrator's `step`.

pub trait DebugHooks {
    /// Called before each main-CPU instruction; returning `false` pauses the
    /// run loop (the host is expected to re-poll once it wants to resume).
    fn should_run(&mut self, pc: u32) -> bool {
        let _ = pc;
        true
    }

    /// Called with the program-bank-relative address of the opcode about to
    /// execute, before it is fetched.
    fn set_current_op(&mut self, pc: u32) {
        let _ = pc;
    }

    /// Called after a write lands, so a debugger can invalidate any cached
    /// view of the touched range.
    fn memory_changed(&mut self, address: u32, len: usize) {
        let _ = (address, len);
    }
}

/// The default hook set: never pauses, observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDebugHooks;

impl DebugHooks for NullDebugHooks {}
