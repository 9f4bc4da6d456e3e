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

//! CD-ROM controller emulation
//!
//! The CD-ROM drive is driven by its own sub-CPU running mask ROM firmware.
//! Instead of emulating that processor, this module scripts the externally
//! observable behavior: a command written by the main CPU walks a fixed
//! sequence of micro-states with measured durations before the response
//! bytes and the interrupt become visible:
//!
//! ```text
//! Idle -> CommandPending (~9400) -> ParamPush (~1800/param)
//!      -> Execution (~2000) -> RxFlush (~3500) -> RxPush (~1500/byte)
//!      -> BusyDelay (~3300) -> IrqDelay (~2000) -> Idle
//! ```
//!
//! Asynchronous events (seek completion, sector reads, second responses)
//! are queued with their own deadline and delivered through `AsyncRxPush`
//! once the controller is idle and the previous interrupt has been
//! acknowledged. Only one interrupt can be latched at a time.
//!
//! # Register Map
//!
//! Four byte-wide registers at 0x1F801800-0x1F801803, paged by the index
//! field of register 0:
//!
//! | Offset | Read              | Write (idx 0)   | Write (idx 1)   |
//! |--------|-------------------|-----------------|-----------------|
//! | 0      | Status            | Index           | Index           |
//! | 1      | Response pop      | Command         | -               |
//! | 2      | Data FIFO byte    | Parameter push  | IRQ mask        |
//! | 3      | IRQ mask / flags  | Request         | IRQ acknowledge |
//!
//! # References
//!
//! - [PSX-SPX: CDROM Controller](http://problemkaputt.de/psx-spx.htm#cdromcontroller)

mod commands;
pub mod disc;

pub use disc::{Disc, Msf, Region};

use crate::core::fifo::Fifo;
use crate::core::interrupt::{interrupts, InterruptController};
use crate::core::timing::{Cycles, Peripheral, TimeHandler};

/// Sub-CPU micro-states of a command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    /// No command in flight
    Idle,
    /// Command byte received, firmware hasn't picked it up yet
    CommandPending,
    /// Parameters are being copied from the host FIFO
    ParamPush,
    /// Command handler runs
    Execution,
    /// Stale response FIFO contents are flushed
    RxFlush,
    /// Response bytes are pushed one at a time
    RxPush,
    /// Busy flag lingers after the response is complete
    BusyDelay,
    /// Interrupt is about to be signaled
    IrqDelay,
    /// An asynchronous response is being pushed
    AsyncRxPush,
}

/// Interrupt codes latched in the low bits of the IRQ flag register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IrqCode {
    /// A sector is ready in the data FIFO
    SectorReady = 1,
    /// Second (completion) response of a two-phase command
    Done = 2,
    /// First response of a command that executed correctly
    Ok = 3,
    /// Command error
    Error = 5,
}

/// Asynchronous drive events that complete after a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AsyncResponse {
    /// SeekL reached its target
    SeekDone,
    /// GetID identification completed
    GetIdDone,
    /// Init completed
    InitDone,
    /// Pause completed
    PauseDone,
    /// The head passed over the next sector while reading
    SectorReady,
}

// Sequencer step durations, in CPU cycles
/// Delay before the firmware notices a pending command
const TIMING_COMMAND_PENDING: Cycles = 9_400;
/// Per-parameter transfer time
const TIMING_PARAM_PUSH: Cycles = 1_800;
/// Command execution time
const TIMING_EXECUTION: Cycles = 2_000;
/// Response FIFO flush time
const TIMING_RX_FLUSH: Cycles = 3_500;
/// Per-byte response push time
const TIMING_RX_PUSH: Cycles = 1_500;
/// Busy flag release delay
const TIMING_BUSY_DELAY: Cycles = 3_300;
/// Interrupt assertion delay
const TIMING_IRQ_DELAY: Cycles = 2_000;

/// CPU cycles per sector at 1x speed (75 sectors per second)
const CYCLES_PER_SECTOR_1X: Cycles = 33_868_500 / 75;

/// CD-ROM controller
pub struct CdRom {
    /// Currently inserted disc, if any
    disc: Option<Disc>,
    /// Register page selected through register 0
    index: u8,
    /// Host-visible parameter FIFO
    params: Fifo,
    /// Host-visible response FIFO
    response: Fifo,
    /// 5-bit interrupt mask
    irq_mask: u8,
    /// Latched interrupt code (0 when no interrupt pending)
    irq_flags: u8,
    /// Sequencer state
    sequence: Sequence,
    /// Cycles left in the current sequencer state
    timer: Cycles,
    /// Command byte being processed
    command: Option<u8>,
    /// Response staged by the command handler, pushed during Rx states
    staged_response: Fifo,
    /// Interrupt code staged by the command handler
    staged_irq: IrqCode,
    /// Pending asynchronous event: remaining delay and kind
    async_response: Option<(Cycles, AsyncResponse)>,
    /// Seek target set by SetLoc, consumed by SeekL/ReadN
    seek_target: Msf,
    /// Current head position
    position: Msf,
    /// Double speed mode (SetMode bit 7)
    double_speed: bool,
    /// Raw 2340-byte sectors instead of 2048 bytes of user data (SetMode
    /// bit 5)
    read_whole_sector: bool,
    /// True while the drive streams sectors (ReadN/ReadS)
    reading: bool,
    /// Sector waiting to be moved into the data FIFO by the request
    /// register
    pending_data: Vec<u8>,
    /// Data FIFO contents
    data: Vec<u8>,
    /// Read pointer into the data FIFO
    data_index: usize,
}

impl CdRom {
    /// Create a controller, optionally with a disc inserted
    pub fn new(disc: Option<Disc>) -> CdRom {
        CdRom {
            disc,
            index: 0,
            params: Fifo::new(),
            response: Fifo::new(),
            irq_mask: 0,
            irq_flags: 0,
            sequence: Sequence::Idle,
            timer: 0,
            command: None,
            staged_response: Fifo::new(),
            staged_irq: IrqCode::Ok,
            async_response: None,
            seek_target: Msf::zero(),
            position: Msf::zero(),
            double_speed: false,
            read_whole_sector: false,
            reading: false,
            pending_data: Vec::new(),
            data: Vec::new(),
            data_index: 0,
        }
    }

    /// Access the inserted disc
    pub fn disc(&self) -> Option<&Disc> {
        self.disc.as_ref()
    }

    /// Catch up with the shared clock, stepping the sequencer
    pub fn sync(&mut self, th: &mut TimeHandler, irq: &mut InterruptController) {
        let elapsed = th.sync(Peripheral::CdRom);

        // Asynchronous events age independently of the sequencer
        if let Some((ref mut delay, _)) = self.async_response {
            *delay = delay.saturating_sub(elapsed);
        }

        // Deliver a mature async event once the controller is idle and the
        // previous interrupt has been acknowledged; the push below then
        // runs on this window's cycles
        if self.sequence == Sequence::Idle && self.irq_flags == 0 {
            if let Some((0, which)) = self.async_response {
                self.async_response = None;
                self.start_async_delivery(which);
            }
        }

        // Step the command sequencer
        let mut delta = elapsed;
        while delta > 0 && self.sequence != Sequence::Idle {
            if self.timer > delta {
                self.timer -= delta;
                break;
            }

            delta -= self.timer;
            self.timer = 0;
            self.sequence_step(irq);
        }

        self.predict_next_sync(th);
    }

    /// Advance the sequencer by one state
    fn sequence_step(&mut self, irq: &mut InterruptController) {
        self.sequence = match self.sequence {
            Sequence::Idle => Sequence::Idle,
            Sequence::CommandPending => {
                self.timer = TIMING_PARAM_PUSH * self.params.len() as Cycles;
                Sequence::ParamPush
            }
            Sequence::ParamPush => {
                self.timer = TIMING_EXECUTION;
                Sequence::Execution
            }
            Sequence::Execution => {
                self.execute_command();
                self.timer = TIMING_RX_FLUSH;
                Sequence::RxFlush
            }
            Sequence::RxFlush => {
                // The first response byte becomes visible, the rest follow
                // one push period apart
                self.response.clear();

                let remaining = if self.staged_response.is_empty() {
                    0
                } else {
                    self.response.push(self.staged_response.pop());
                    self.staged_response.len() as Cycles
                };

                self.timer = TIMING_RX_PUSH * remaining;
                Sequence::RxPush
            }
            Sequence::RxPush => {
                while !self.staged_response.is_empty() {
                    let b = self.staged_response.pop();
                    self.response.push(b);
                }

                self.timer = TIMING_BUSY_DELAY;
                Sequence::BusyDelay
            }
            Sequence::BusyDelay => {
                self.timer = TIMING_IRQ_DELAY;
                Sequence::IrqDelay
            }
            Sequence::IrqDelay => {
                if self.irq_flags != 0 {
                    // The previous interrupt hasn't been acknowledged yet,
                    // hold the new one back
                    self.timer = TIMING_IRQ_DELAY;
                    Sequence::IrqDelay
                } else {
                    self.trigger_irq(self.staged_irq, irq);
                    Sequence::Idle
                }
            }
            Sequence::AsyncRxPush => {
                self.response.clear();
                while !self.staged_response.is_empty() {
                    let b = self.staged_response.pop();
                    self.response.push(b);
                }

                self.trigger_irq(self.staged_irq, irq);
                Sequence::Idle
            }
        };
    }

    /// Latch an interrupt code and raise the controller IRQ if unmasked
    fn trigger_irq(&mut self, code: IrqCode, irq: &mut InterruptController) {
        self.irq_flags = code as u8;

        if self.irq_flags & self.irq_mask != 0 {
            irq.request(interrupts::CDROM);
        }

        log::trace!("CDROM: IRQ {:?} latched", code);
    }

    /// Begin pushing an asynchronous response
    fn start_async_delivery(&mut self, which: AsyncResponse) {
        self.run_async_handler(which);

        self.timer = TIMING_RX_PUSH * (self.staged_response.len() as Cycles + 1);
        self.sequence = Sequence::AsyncRxPush;
    }

    /// Schedule the next mandatory sync
    fn predict_next_sync(&self, th: &mut TimeHandler) {
        let mut delta = Cycles::MAX;

        if self.sequence != Sequence::Idle {
            // The timer can only be 0 transiently inside sync
            delta = delta.min(self.timer.max(1));
        }

        if let Some((delay, _)) = self.async_response {
            if delay > 0 {
                delta = delta.min(delay);
            } else {
                // Mature but blocked on the IRQ handshake, poll again soon
                delta = delta.min(1_000);
            }
        }

        if delta == Cycles::MAX {
            th.no_sync_needed(Peripheral::CdRom);
        } else {
            th.set_next_sync_delta(Peripheral::CdRom, delta);
        }
    }

    /// CPU cycles between two sectors at the current read speed
    fn cycles_per_sector(&self) -> Cycles {
        if self.double_speed {
            CYCLES_PER_SECTOR_1X / 2
        } else {
            CYCLES_PER_SECTOR_1X
        }
    }

    /// Drive status byte returned by most commands
    fn drive_status(&self) -> u8 {
        match self.disc {
            Some(_) => {
                let mut status = 0u8;

                // Motor on
                status |= 1 << 1;
                status |= (self.reading as u8) << 5;

                status
            }
            // Door open: without a disc the BIOS treats the drive as empty
            None => 0x10,
        }
    }

    /// Issue a command byte (register 1, index 0)
    fn command(&mut self, cmd: u8) {
        if self.sequence != Sequence::Idle {
            log::error!(
                "CDROM: command 0x{:02X} while controller is busy (ignored)",
                cmd
            );
            return;
        }

        self.command = Some(cmd);
        self.sequence = Sequence::CommandPending;
        self.timer = TIMING_COMMAND_PENDING;
    }

    // ========== Host register interface ==========

    /// Hardware status register (offset 0, any index)
    fn host_status(&self) -> u8 {
        let mut r = self.index & 3;

        // Parameter FIFO empty
        r |= (self.params.is_empty() as u8) << 3;
        // Parameter FIFO not full
        r |= ((!self.params.is_full()) as u8) << 4;
        // Response FIFO not empty
        r |= ((!self.response.is_empty()) as u8) << 5;
        // Data FIFO not empty
        r |= ((self.data_index < self.data.len()) as u8) << 6;
        // Busy while a command sequence is in flight
        r |= ((self.sequence != Sequence::Idle) as u8) << 7;

        r
    }

    /// Byte read from the paged register window
    ///
    /// `offset` is relative to 0x1F801800.
    pub fn load8(&mut self, th: &mut TimeHandler, irq: &mut InterruptController, offset: u32) -> u8 {
        self.sync(th, irq);

        match offset {
            0 => self.host_status(),
            1 => self.response.pop(),
            2 => self.data_byte(),
            3 => match self.index {
                0 | 2 => self.irq_mask | 0xE0,
                1 | 3 => self.irq_flags | 0xE0,
                _ => unreachable!(),
            },
            _ => {
                log::warn!("CDROM: read from unknown register {}", offset);
                0xFF
            }
        }
    }

    /// Byte write to the paged register window
    ///
    /// `offset` is relative to 0x1F801800.
    pub fn store8(
        &mut self,
        th: &mut TimeHandler,
        irq: &mut InterruptController,
        offset: u32,
        val: u8,
    ) {
        self.sync(th, irq);

        match (offset, self.index) {
            (0, _) => self.index = val & 3,
            (1, 0) => self.command(val),
            (1, 3) => log::trace!("CDROM: right-right volume 0x{:02X}", val),
            (2, 0) => {
                if self.params.is_full() {
                    log::warn!("CDROM: parameter FIFO overflow");
                } else {
                    self.params.push(val);
                }
            }
            (2, 1) => {
                self.irq_mask = val & 0x1F;
                log::trace!("CDROM: IRQ mask 0x{:02X}", self.irq_mask);

                // Unmasking can make an already-latched interrupt visible
                if self.irq_flags & self.irq_mask != 0 {
                    irq.request(interrupts::CDROM);
                }
            }
            (2, 2) => log::trace!("CDROM: left-left volume 0x{:02X}", val),
            (2, 3) => log::trace!("CDROM: right-left volume 0x{:02X}", val),
            (3, 0) => self.set_request(val),
            (3, 1) => {
                // Acknowledge: clear the written interrupt bits
                self.irq_flags &= !(val & 0x1F);

                if val & 0x40 != 0 {
                    self.params.clear();
                }
            }
            (3, 2) => log::trace!("CDROM: left-right volume 0x{:02X}", val),
            (3, 3) => log::trace!("CDROM: volume apply 0x{:02X}", val),
            (offset, index) => {
                log::warn!(
                    "CDROM: unhandled write {}.{} = 0x{:02X}",
                    offset,
                    index,
                    val
                );
            }
        }

        self.predict_next_sync(th);
    }

    /// Request register (offset 3, index 0)
    fn set_request(&mut self, val: u8) {
        if val & 0x80 != 0 {
            // Load the pending sector into the data FIFO
            if self.data_index >= self.data.len() {
                self.data = std::mem::take(&mut self.pending_data);
                self.data_index = 0;
            }
        } else {
            // Reset the data FIFO
            self.data.clear();
            self.data_index = 0;
        }
    }

    /// Pop one byte from the data FIFO
    fn data_byte(&mut self) -> u8 {
        match self.data.get(self.data_index) {
            Some(&b) => {
                self.data_index += 1;
                b
            }
            None => {
                // Reading an empty data FIFO returns garbage; be
                // deterministic about it
                0
            }
        }
    }

    /// Pop one little-endian word from the data FIFO (DMA channel 3)
    pub fn dma_read_word(&mut self) -> u32 {
        let b0 = self.data_byte() as u32;
        let b1 = self.data_byte() as u32;
        let b2 = self.data_byte() as u32;
        let b3 = self.data_byte() as u32;

        b0 | (b1 << 8) | (b2 << 16) | (b3 << 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_cdrom() -> (CdRom, TimeHandler, InterruptController) {
        (
            CdRom::new(None),
            TimeHandler::new(),
            InterruptController::new(),
        )
    }

    /// Run the controller forward by `cycles`
    fn run(cdrom: &mut CdRom, th: &mut TimeHandler, irq: &mut InterruptController, cycles: Cycles) {
        th.tick(cycles);
        cdrom.sync(th, irq);
    }

    // ========== Command Sequencing Tests ==========

    #[test]
    fn test_get_stat_response_timing() {
        let (mut cdrom, mut th, mut irq) = create_test_cdrom();

        // Enable all CDROM interrupt codes
        cdrom.store8(&mut th, &mut irq, 0, 1); // index = 1
        cdrom.store8(&mut th, &mut irq, 2, 0x1F); // IRQ mask
        cdrom.store8(&mut th, &mut irq, 0, 0); // back to index 0

        cdrom.store8(&mut th, &mut irq, 1, 0x01); // GetStat

        // Immediately after the write the controller is busy with no
        // response
        assert_ne!(cdrom.load8(&mut th, &mut irq, 0) & 0x80, 0, "busy");
        assert_eq!(cdrom.load8(&mut th, &mut irq, 0) & 0x20, 0, "no response");

        // Long before the sequence finishes nothing is visible
        run(&mut cdrom, &mut th, &mut irq, 9_000);
        assert_eq!(irq.read_status() & interrupts::CDROM as u32, 0);

        // Run long past the full sequence
        run(&mut cdrom, &mut th, &mut irq, 50_000);

        assert_eq!(cdrom.load8(&mut th, &mut irq, 0) & 0x80, 0, "idle again");
        assert_ne!(
            cdrom.load8(&mut th, &mut irq, 0) & 0x20,
            0,
            "response available"
        );
        assert_ne!(
            irq.read_status() & interrupts::CDROM as u32,
            0,
            "CDROM IRQ raised"
        );

        // Without a disc the status byte reports the shell open
        assert_eq!(cdrom.load8(&mut th, &mut irq, 1), 0x10);

        // IRQ code 3 (Ok) in the flag register (index 1)
        cdrom.store8(&mut th, &mut irq, 0, 1);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 3) & 0x1F, 3);
    }

    #[test]
    fn test_masked_irq_not_raised() {
        let (mut cdrom, mut th, mut irq) = create_test_cdrom();

        // Leave the IRQ mask at 0
        cdrom.store8(&mut th, &mut irq, 1, 0x01);
        run(&mut cdrom, &mut th, &mut irq, 100_000);

        assert_eq!(
            irq.read_status() & interrupts::CDROM as u32,
            0,
            "masked interrupt must not be forwarded"
        );

        // The code is still latched in the flag register
        cdrom.store8(&mut th, &mut irq, 0, 1);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 3) & 0x1F, 3);
    }

    #[test]
    fn test_command_while_busy_is_dropped() {
        let (mut cdrom, mut th, mut irq) = create_test_cdrom();

        cdrom.store8(&mut th, &mut irq, 1, 0x01);
        cdrom.store8(&mut th, &mut irq, 1, 0x01); // busy, ignored

        run(&mut cdrom, &mut th, &mut irq, 100_000);

        // Only one response (one status byte) was generated
        assert_eq!(cdrom.load8(&mut th, &mut irq, 1), 0x10);
        assert_eq!(
            cdrom.load8(&mut th, &mut irq, 0) & 0x20,
            0,
            "response FIFO drained after a single pop"
        );
    }

    #[test]
    fn test_test_command_version() {
        let (mut cdrom, mut th, mut irq) = create_test_cdrom();

        cdrom.store8(&mut th, &mut irq, 2, 0x20); // parameter
        cdrom.store8(&mut th, &mut irq, 1, 0x19); // Test

        run(&mut cdrom, &mut th, &mut irq, 100_000);

        let version: Vec<u8> = (0..4)
            .map(|_| cdrom.load8(&mut th, &mut irq, 1))
            .collect();

        assert_eq!(version, [0x98, 0x06, 0x10, 0xC3]);
    }

    #[test]
    fn test_get_id_async_error_without_disc() {
        let (mut cdrom, mut th, mut irq) = create_test_cdrom();

        // Unmask everything
        cdrom.store8(&mut th, &mut irq, 0, 1);
        cdrom.store8(&mut th, &mut irq, 2, 0x1F);
        cdrom.store8(&mut th, &mut irq, 0, 0);

        cdrom.store8(&mut th, &mut irq, 1, 0x1A); // GetID

        run(&mut cdrom, &mut th, &mut irq, 50_000);

        // First response: drive status, IRQ 3
        assert_eq!(cdrom.load8(&mut th, &mut irq, 1), 0x10);
        cdrom.store8(&mut th, &mut irq, 0, 1);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 3) & 0x1F, 3);

        // Acknowledge so the async response can be delivered
        cdrom.store8(&mut th, &mut irq, 3, 0x1F);
        cdrom.store8(&mut th, &mut irq, 0, 0);

        run(&mut cdrom, &mut th, &mut irq, 100_000);

        // Second response: "no disc" error, IRQ 5
        cdrom.store8(&mut th, &mut irq, 0, 1);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 3) & 0x1F, 5);
        cdrom.store8(&mut th, &mut irq, 0, 0);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 1), 0x08);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 1), 0x40);
    }

    #[test]
    fn test_async_response_waits_for_ack() {
        let (mut cdrom, mut th, mut irq) = create_test_cdrom();

        cdrom.store8(&mut th, &mut irq, 1, 0x1A); // GetID

        // Run long enough for both responses, without acknowledging
        run(&mut cdrom, &mut th, &mut irq, 500_000);

        // The async response must still be held back
        cdrom.store8(&mut th, &mut irq, 0, 1);
        assert_eq!(
            cdrom.load8(&mut th, &mut irq, 3) & 0x1F,
            3,
            "first IRQ still latched"
        );

        cdrom.store8(&mut th, &mut irq, 3, 0x1F); // acknowledge
        cdrom.store8(&mut th, &mut irq, 0, 0);

        run(&mut cdrom, &mut th, &mut irq, 50_000);

        cdrom.store8(&mut th, &mut irq, 0, 1);
        assert_eq!(
            cdrom.load8(&mut th, &mut irq, 3) & 0x1F,
            5,
            "async response delivered after acknowledge"
        );
    }

    #[test]
    fn test_unknown_command_errors() {
        let (mut cdrom, mut th, mut irq) = create_test_cdrom();

        cdrom.store8(&mut th, &mut irq, 1, 0x7F);

        run(&mut cdrom, &mut th, &mut irq, 100_000);

        cdrom.store8(&mut th, &mut irq, 0, 1);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 3) & 0x1F, 5, "error IRQ");
        cdrom.store8(&mut th, &mut irq, 0, 0);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 1), 0x11);
        assert_eq!(cdrom.load8(&mut th, &mut irq, 1), 0x40);
    }

    #[test]
    fn test_param_fifo_status_bits() {
        let (mut cdrom, mut th, mut irq) = create_test_cdrom();

        let status = cdrom.load8(&mut th, &mut irq, 0);
        assert_ne!(status & 0x08, 0, "parameter FIFO empty");
        assert_ne!(status & 0x10, 0, "parameter FIFO not full");

        cdrom.store8(&mut th, &mut irq, 2, 0xAA);

        let status = cdrom.load8(&mut th, &mut irq, 0);
        assert_eq!(status & 0x08, 0, "parameter FIFO no longer empty");
    }
}
