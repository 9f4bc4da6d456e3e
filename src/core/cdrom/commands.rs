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

//! CD-ROM command handlers
//!
//! Handlers run at the `Execution` step of the sub-CPU sequence. They stage
//! the first response and interrupt code; commands with a completion phase
//! additionally queue an asynchronous event that fires once the mechanics
//! would have finished (seek settled, sector under the head, ...).

use super::disc::Msf;
use super::{AsyncResponse, CdRom, IrqCode};
use crate::core::fifo::Fifo;
use crate::core::timing::Cycles;

/// Delay before a seek reports completion
const TIMING_SEEK: Cycles = 1_000_000;

/// Delay before GetID's identification response
const TIMING_GET_ID: Cycles = 33_800;

/// Delay before Init's completion response
const TIMING_INIT: Cycles = 900_000;

/// Delay before Pause's completion response
const TIMING_PAUSE: Cycles = 1_000_000;

impl CdRom {
    /// Dispatch the pending command (Execution sequencer step)
    pub(super) fn execute_command(&mut self) {
        let cmd = match self.command.take() {
            Some(cmd) => cmd,
            None => {
                log::error!("CDROM: execution step without a pending command");
                return;
            }
        };

        log::debug!("CDROM: command 0x{:02X}", cmd);

        match cmd {
            0x01 => self.cmd_get_stat(),
            0x02 => self.cmd_set_loc(),
            0x06 => self.cmd_read(),
            0x09 => self.cmd_pause(),
            0x0A => self.cmd_init(),
            0x0B => self.cmd_mute(),
            0x0C => self.cmd_demute(),
            0x0E => self.cmd_set_mode(),
            0x15 => self.cmd_seek_l(),
            0x19 => self.cmd_test(),
            0x1A => self.cmd_get_id(),
            0x1B => self.cmd_read(),
            _ => {
                log::warn!("CDROM: unhandled command 0x{:02X}", cmd);
                self.stage_error(0x40);
            }
        }

        // Parameters not consumed by the handler are discarded
        self.params.clear();
    }

    /// Run the handler for a matured asynchronous event
    pub(super) fn run_async_handler(&mut self, which: AsyncResponse) {
        match which {
            AsyncResponse::SeekDone => self.async_seek_done(),
            AsyncResponse::GetIdDone => self.async_get_id_done(),
            AsyncResponse::InitDone => self.async_init_done(),
            AsyncResponse::PauseDone => self.async_pause_done(),
            AsyncResponse::SectorReady => self.async_sector_ready(),
        }
    }

    /// Stage a single-status-byte response
    fn stage_status(&mut self, code: IrqCode) {
        self.staged_response = Fifo::from_bytes(&[self.drive_status()]);
        self.staged_irq = code;
    }

    /// Stage the standard two-byte error response
    fn stage_error(&mut self, detail: u8) {
        self.staged_response = Fifo::from_bytes(&[0x11, detail]);
        self.staged_irq = IrqCode::Error;
    }

    /// CdRom(0x01): GetStat - report the drive status byte
    fn cmd_get_stat(&mut self) {
        self.stage_status(IrqCode::Ok);
    }

    /// CdRom(0x02): SetLoc - set the seek target from 3 BCD parameters
    fn cmd_set_loc(&mut self) {
        if self.params.len() < 3 {
            log::warn!("CDROM: SetLoc with {} parameters", self.params.len());
            self.stage_error(0x20);
            return;
        }

        let m = self.params.pop();
        let s = self.params.pop();
        let f = self.params.pop();

        match Msf::from_bcd(m, s, f) {
            Ok(msf) => {
                log::debug!("CDROM: SetLoc {}", msf);
                self.seek_target = msf;
                self.stage_status(IrqCode::Ok);
            }
            Err(_) => {
                log::warn!(
                    "CDROM: SetLoc with invalid MSF {:02x}:{:02x}:{:02x}",
                    m,
                    s,
                    f
                );
                self.stage_error(0x10);
            }
        }
    }

    /// CdRom(0x06)/CdRom(0x1B): ReadN/ReadS - start streaming data sectors
    ///
    /// The retry semantics that distinguish the two variants don't matter
    /// for image-backed discs.
    fn cmd_read(&mut self) {
        if self.disc.is_none() {
            self.stage_error(0x80);
            return;
        }

        self.position = self.seek_target;
        self.reading = true;

        self.stage_status(IrqCode::Ok);

        self.async_response = Some((self.cycles_per_sector(), AsyncResponse::SectorReady));
    }

    /// CdRom(0x09): Pause - stop reading
    fn cmd_pause(&mut self) {
        self.stage_status(IrqCode::Ok);

        self.reading = false;
        self.async_response = Some((TIMING_PAUSE, AsyncResponse::PauseDone));
    }

    /// CdRom(0x0A): Init - reset the drive mode and restart the motor
    fn cmd_init(&mut self) {
        self.double_speed = false;
        self.read_whole_sector = false;
        self.reading = false;

        self.stage_status(IrqCode::Ok);

        self.async_response = Some((TIMING_INIT, AsyncResponse::InitDone));
    }

    /// CdRom(0x0B): Mute - disable audio output
    fn cmd_mute(&mut self) {
        // Audio streaming isn't emulated, only the handshake is
        self.stage_status(IrqCode::Ok);
    }

    /// CdRom(0x0C): Demute - re-enable audio output
    fn cmd_demute(&mut self) {
        self.stage_status(IrqCode::Ok);
    }

    /// CdRom(0x0E): SetMode - configure read speed and sector layout
    fn cmd_set_mode(&mut self) {
        if self.params.is_empty() {
            self.stage_error(0x20);
            return;
        }

        let mode = self.params.pop();

        self.double_speed = mode & 0x80 != 0;
        self.read_whole_sector = mode & 0x20 != 0;

        if mode & !0xA0 != 0 {
            log::warn!("CDROM: unhandled mode bits 0x{:02X}", mode);
        }

        self.stage_status(IrqCode::Ok);
    }

    /// CdRom(0x15): SeekL - data-mode seek to the SetLoc target
    fn cmd_seek_l(&mut self) {
        if self.disc.is_none() {
            self.stage_error(0x80);
            return;
        }

        self.reading = false;
        self.stage_status(IrqCode::Ok);

        self.async_response = Some((TIMING_SEEK, AsyncResponse::SeekDone));
    }

    /// CdRom(0x19): Test - diagnostic sub-commands
    fn cmd_test(&mut self) {
        if self.params.is_empty() {
            self.stage_error(0x20);
            return;
        }

        match self.params.pop() {
            // Firmware version
            0x20 => {
                self.staged_response = Fifo::from_bytes(&[0x98, 0x06, 0x10, 0xC3]);
                self.staged_irq = IrqCode::Ok;
            }
            sub => {
                log::warn!("CDROM: unhandled Test sub-command 0x{:02X}", sub);
                self.stage_error(0x10);
            }
        }
    }

    /// CdRom(0x1A): GetID - identify the inserted disc
    fn cmd_get_id(&mut self) {
        self.stage_status(IrqCode::Ok);

        self.async_response = Some((TIMING_GET_ID, AsyncResponse::GetIdDone));
    }

    // ========== Async completion handlers ==========

    /// Seek settled at the target position
    fn async_seek_done(&mut self) {
        self.position = self.seek_target;

        self.staged_response = Fifo::from_bytes(&[self.drive_status()]);
        self.staged_irq = IrqCode::Done;
    }

    /// GetID identification data
    fn async_get_id_done(&mut self) {
        match self.disc.as_ref() {
            Some(disc) => {
                let status = self.drive_status();
                let region = disc.region();

                // Status, licensed flag, disc type, session info and the
                // SCEx region string
                self.staged_response = Fifo::from_bytes(&[
                    status,
                    0x00,
                    0x20,
                    0x00,
                    b'S',
                    b'C',
                    b'E',
                    region.scex_byte(),
                ]);
                self.staged_irq = IrqCode::Done;
            }
            None => {
                self.staged_response = Fifo::from_bytes(&[0x08, 0x40, 0, 0, 0, 0, 0, 0]);
                self.staged_irq = IrqCode::Error;
            }
        }
    }

    /// Init completed
    fn async_init_done(&mut self) {
        self.staged_response = Fifo::from_bytes(&[self.drive_status()]);
        self.staged_irq = IrqCode::Done;
    }

    /// Pause completed
    fn async_pause_done(&mut self) {
        self.staged_response = Fifo::from_bytes(&[self.drive_status()]);
        self.staged_irq = IrqCode::Done;
    }

    /// A sector passed under the head while reading
    fn async_sector_ready(&mut self) {
        if !self.reading {
            // A Pause raced with the last scheduled sector; drop it
            self.staged_response = Fifo::from_bytes(&[self.drive_status()]);
            self.staged_irq = IrqCode::Done;
            return;
        }

        let position = self.position;

        let payload = match self.disc.as_mut() {
            Some(disc) => disc.read_sector(position),
            None => {
                log::error!("CDROM: sector read without a disc");
                self.stage_error(0x80);
                self.reading = false;
                return;
            }
        };

        match payload {
            Ok(sector) => {
                self.pending_data = if self.read_whole_sector {
                    sector.data_2340().to_vec()
                } else {
                    sector.data_2048().to_vec()
                };

                self.staged_response = Fifo::from_bytes(&[self.drive_status()]);
                self.staged_irq = IrqCode::SectorReady;

                // Keep streaming
                match position.next() {
                    Ok(next) => {
                        self.position = next;
                        self.async_response =
                            Some((self.cycles_per_sector(), AsyncResponse::SectorReady));
                    }
                    Err(_) => {
                        log::warn!("CDROM: read reached the end of the disc");
                        self.reading = false;
                    }
                }
            }
            Err(e) => {
                log::error!("CDROM: read error at {}: {}", position, e);
                self.stage_error(0x04);
                self.reading = false;
            }
        }
    }
}
