// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Headless emulator runner
//!
//! Boots the machine and runs a fixed number of video frames, logging
//! per-frame draw statistics. Useful for exercising the core without a
//! display: BIOS bring-up, disc probing and regression timing all show up
//! in the logs.
//!
//! ```text
//! psemu-cli --bios SCPH1001.BIN --frames 120
//! ```

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use clap::Parser;

use psemu::config::Config;
use psemu::core::cdrom::Disc;
use psemu::core::cpu::{disassemble, Instruction};
use psemu::core::gpu::{CollectingRenderer, HardwareType};
use psemu::core::memory::Bios;
use psemu::core::system::System;
use psemu::core::{EmulatorError, Result};

/// Headless PlayStation emulator core runner
#[derive(Parser)]
#[command(name = "psemu-cli", version, about)]
struct Args {
    /// Path to the 512KB BIOS image (overrides the config file)
    #[arg(long)]
    bios: Option<PathBuf>,

    /// Path to a raw BIN disc image (overrides the config file)
    #[arg(long)]
    disc: Option<PathBuf>,

    /// Number of video frames to emulate before exiting
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Log every executed instruction (very slow)
    #[arg(long)]
    trace: bool,

    /// Alternative configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    // Pick up RUST_LOG & friends from a .env if present
    let _ = dotenvy::dotenv();

    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("psemu-cli: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    let bios_path = args
        .bios
        .or(config.bios)
        .ok_or_else(|| EmulatorError::InvalidConfig("no BIOS path given".into()))?;

    let bios = Bios::from_file(&bios_path)?;

    let renderer = Rc::new(RefCell::new(CollectingRenderer::new()));

    // An explicit region override beats the disc's license sector
    let region = config.region.map(|r| r.hardware_type());

    let mut system = match args.disc.or(config.disc) {
        Some(disc_path) => {
            let disc = Disc::from_file(&disc_path)?;

            System::with_disc(bios, disc, region, Box::new(renderer.clone()))
        }
        None => System::new(
            bios,
            region.unwrap_or(HardwareType::Ntsc),
            Box::new(renderer.clone()),
        ),
    };

    let start = Instant::now();

    for frame in 0..args.frames {
        if args.trace {
            run_frame_traced(&mut system)?;
        } else {
            system.run_frame()?;
        }

        log::info!(
            "frame {:4}: {} triangles, {} cycles total",
            frame,
            renderer.borrow().last_frame_triangles,
            system.cycles()
        );
    }

    let elapsed = start.elapsed();

    println!(
        "{} frames in {:.2?} ({:.1} fps), {} CPU cycles, {} illegal instructions",
        args.frames,
        elapsed,
        args.frames as f64 / elapsed.as_secs_f64(),
        system.cycles(),
        system.cpu().illegal_instruction_count()
    );

    Ok(())
}

/// One frame with per-instruction disassembly on the trace log
fn run_frame_traced(system: &mut System) -> Result<()> {
    let frame = system.frame();

    while system.frame() == frame {
        let pc = system.pc();

        if let Ok(word) = system.interconnect().load_instruction(pc) {
            log::trace!("0x{:08X}: {}", pc, disassemble(Instruction(word)));
        }

        system.step()?;
    }

    Ok(())
}
