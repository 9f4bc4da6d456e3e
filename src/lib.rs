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

//! psemu: A PlayStation (PSX) emulator core
//!
//! This crate implements the heart of a PSX emulator: the MIPS R3000A
//! interpreter, the memory interconnect, DMA, interrupt controller, GPU
//! command/timing front end, GTE, CD-ROM sub-CPU, timers and the gamepad
//! serial port. Rasterization and input presentation are left to the host,
//! which plugs in through the [`core::gpu::Renderer`] trait and
//! [`core::system::System::set_button_state`].
//!
//! # Architecture
//!
//! The emulator is organized into the following modules:
//!
//! - [`core`]: Core emulation components (CPU, Memory, GPU, GTE, System)
//! - [`config`]: Optional TOML configuration consumed by the CLI binary
//!
//! # Example
//!
//! ```no_run
//! use psemu::core::gpu::NullRenderer;
//! use psemu::core::memory::Bios;
//! use psemu::core::system::{HardwareType, System};
//!
//! let bios = Bios::from_file("path/to/bios.bin")?;
//! let mut system = System::new(bios, HardwareType::Ntsc, Box::new(NullRenderer));
//! system.run_frame()?;
//! # Ok::<(), psemu::core::error::EmulatorError>(())
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias
//! for `Result<T, EmulatorError>`. Emulated CPU exceptions are not errors;
//! they are handled inside the machine through COP0.

pub mod config;
pub mod core;

// Re-export commonly used types
pub use core::error::{EmulatorError, Result};
