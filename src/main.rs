//! Command-line front end: loads a ROM image and runs the core for a fixed
//! number of instructions, logging any fatal bus/decode error it hits.
//!
//! No video/audio backend is wired up here -- see `SPEC_FULL.md`'s
//! Non-goals. This exists to exercise the core end to end the way the
//! teacher's binary exercises its own `Snes::run`.

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use snes_core::{Cartridge, Snes};

#[derive(Parser, Debug)]
#[command(name = "snes-emu", about = "A cycle-charged SNES core")]
struct Args {
    /// Path to a .sfc/.smc ROM image.
    rom: String,

    /// Number of main-CPU instructions to run before exiting.
    #[arg(short = 'n', long, default_value_t = 1_000_000)]
    instructions: u64,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let data = match fs::read(&args.rom) {
        Ok(d) => d,
        Err(e) => {
            error!("failed to read {}: {}", args.rom, e);
            return ExitCode::FAILURE;
        }
    };

    let cartridge = match Cartridge::load(data) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load cartridge: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("loaded \"{}\" ({:?})", cartridge.header.title, cartridge.header.map);

    let mut snes = Snes::new(cartridge);
    match snes.run_instructions(args.instructions) {
        Ok(()) => {
            info!("ran {} instructions cleanly", args.instructions);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("core halted: {}", e);
            ExitCode::FAILURE
        }
    }
}
