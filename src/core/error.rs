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

//! Emulator error types
//!
//! Only fatal invariant violations surface as [`EmulatorError`]: a missing or
//! wrongly-sized BIOS image, a malformed disc, an access that escapes every
//! mapped region. Emulated CPU exceptions (interrupts, address errors,
//! syscalls) are routed through COP0 and never reach the host; recoverable
//! oddities (unknown hardware registers, unimplemented commands) are logged
//! and answered with deterministic garbage instead.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Fatal emulator errors
///
/// The host may catch these and discard the machine; the core does not
/// promise resumable recovery once one has been returned.
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// BIOS file could not be opened
    #[error("BIOS file not found: {0}")]
    BiosNotFound(String),

    /// BIOS image has the wrong size (must be exactly 512KB)
    #[error("Invalid BIOS size: expected {expected} bytes, got {got}")]
    InvalidBiosSize { expected: usize, got: usize },

    /// Disc image file could not be opened
    #[error("Disc image not found: {0}")]
    DiscNotFound(String),

    /// Disc image is malformed (truncated, bad license sector, ...)
    #[error("Invalid disc image: {0}")]
    InvalidDisc(String),

    /// MSF triple is not valid BCD or out of range
    #[error("Invalid MSF address: {m:02x}:{s:02x}:{f:02x}")]
    InvalidMsf { m: u8, s: u8, f: u8 },

    /// Sector lookup past the end of the disc image
    #[error("Sector out of range: {0}")]
    SectorOutOfRange(u32),

    /// Memory access that escapes every mapped region
    #[error("Invalid memory access at 0x{address:08X}")]
    InvalidMemoryAccess { address: u32 },

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
