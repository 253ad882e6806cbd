pub mod apu;
pub mod audio_bus;
pub mod bus;
pub mod debug;
pub mod dma;
pub mod error;
pub mod input;
pub mod interrupt;
pub mod ppu_stub;
pub mod rom;
pub mod snes;
pub mod timer;

pub use bus::Bus;
pub use debug::{DebugHooks, NullDebugHooks};
pub use error::CoreError;
pub use rom::Cartridge;
pub use snes::Snes;
