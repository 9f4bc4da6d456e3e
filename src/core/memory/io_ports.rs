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

//! Hardware register window dispatch
//!
//! Accesses to 0x1F801000-0x1F802000 land on the memory-mapped peripheral
//! registers. Peripherals are synchronized lazily: a register access first
//! catches the device up with the shared clock, then performs the access,
//! so observable side effects (counter values, FIFO states, interrupt
//! flags) are exact even though the devices only run on demand.
//!
//! Unknown registers answer zero on reads and swallow writes with a
//! warning; the BIOS probes a number of latency/configuration registers we
//! deliberately don't model.

use super::region;
use super::Interconnect;
use crate::core::dma::Port;
use crate::core::error::{EmulatorError, Result};
use crate::core::timing::TimeHandler;

impl Interconnect {
    /// 8-bit read in the hardware register window
    pub(super) fn load_io8(
        &mut self,
        th: &mut TimeHandler,
        abs: u32,
        addr: u32,
    ) -> Result<u8> {
        if let Some(offset) = region::CDROM.contains(abs) {
            return Ok(self.cdrom.load8(th, &mut self.irq, offset));
        }

        if let Some(offset) = region::PAD_MEMCARD.contains(abs) {
            self.padmemcard.sync(th, &mut self.irq);

            if offset == 0 {
                return Ok(self.padmemcard.read_response());
            }
        }

        if region::DMA.contains(abs).is_some() {
            // Byte reads of the DMA registers pick the addressed byte out
            // of the 32-bit register
            let word = self.dma_reg(abs & !3);
            return Ok((word >> (8 * (abs & 3))) as u8);
        }

        if region::MEM_CONTROL.contains(abs).is_some()
            || region::RAM_SIZE.contains(abs).is_some()
        {
            return Ok(0);
        }

        log::warn!("Unhandled IO read8 at 0x{:08X}", addr);

        if abs >= 0x1F80_1000 && abs < 0x1F80_2000 {
            // Inside the register window: answer deterministic garbage
            return Ok(0);
        }

        Err(EmulatorError::InvalidMemoryAccess { address: addr })
    }

    /// 16-bit read in the hardware register window
    pub(super) fn load_io16(
        &mut self,
        th: &mut TimeHandler,
        abs: u32,
        addr: u32,
    ) -> Result<u16> {
        if let Some(offset) = region::IRQ_CONTROL.contains(abs) {
            let val = match offset {
                0 => self.irq.read_status(),
                4 => self.irq.read_mask(),
                _ => 0,
            };
            return Ok(val as u16);
        }

        if let Some(offset) = region::TIMERS.contains(abs) {
            return Ok(self.timers.load(th, &mut self.irq, offset));
        }

        if let Some(offset) = region::PAD_MEMCARD.contains(abs) {
            self.padmemcard.sync(th, &mut self.irq);

            let val = match offset {
                0x0 => self.padmemcard.read_response() as u16,
                0x4 => self.padmemcard.stat() as u16,
                0x8 => self.padmemcard.mode(),
                0xA => self.padmemcard.control(),
                0xE => self.padmemcard.baud(),
                _ => {
                    log::warn!("Unhandled pad register read16 at 0x{:08X}", addr);
                    0
                }
            };
            return Ok(val);
        }

        if region::SPU.contains(abs).is_some() {
            // The SPU is not part of the core; its registers read back as
            // zero which keeps the BIOS initialization happy
            log::trace!("SPU read16 at 0x{:08X}", addr);
            return Ok(0);
        }

        if region::MEM_CONTROL.contains(abs).is_some()
            || region::RAM_SIZE.contains(abs).is_some()
        {
            return Ok(0);
        }

        log::warn!("Unhandled IO read16 at 0x{:08X}", addr);

        if abs >= 0x1F80_1000 && abs < 0x1F80_2000 {
            return Ok(0);
        }

        Err(EmulatorError::InvalidMemoryAccess { address: addr })
    }

    /// 32-bit read in the hardware register window
    pub(super) fn load_io32(
        &mut self,
        th: &mut TimeHandler,
        abs: u32,
        addr: u32,
    ) -> Result<u32> {
        if let Some(offset) = region::IRQ_CONTROL.contains(abs) {
            let val = match offset {
                0 => self.irq.read_status(),
                4 => self.irq.read_mask(),
                _ => 0,
            };
            return Ok(val);
        }

        if region::DMA.contains(abs).is_some() {
            return Ok(self.dma_reg(abs));
        }

        if let Some(offset) = region::GPU.contains(abs) {
            let val = match offset {
                0 => self.gpu.read(),
                4 => {
                    // GPUSTAT bit 31 depends on the current scanline
                    self.gpu.sync(th, &mut self.irq);
                    self.gpu.status()
                }
                _ => unreachable!(),
            };
            return Ok(val);
        }

        if let Some(offset) = region::TIMERS.contains(abs) {
            return Ok(self.timers.load(th, &mut self.irq, offset) as u32);
        }

        if let Some(offset) = region::PAD_MEMCARD.contains(abs) {
            self.padmemcard.sync(th, &mut self.irq);

            let val = match offset {
                0x0 => self.padmemcard.read_response() as u32,
                0x4 => self.padmemcard.stat(),
                _ => {
                    log::warn!("Unhandled pad register read32 at 0x{:08X}", addr);
                    0
                }
            };
            return Ok(val);
        }

        if region::MDEC.contains(abs).is_some() {
            log::warn!("MDEC read32 at 0x{:08X} (not implemented)", addr);
            return Ok(0);
        }

        if region::SPU.contains(abs).is_some() {
            log::trace!("SPU read32 at 0x{:08X}", addr);
            return Ok(0);
        }

        if region::MEM_CONTROL.contains(abs).is_some()
            || region::RAM_SIZE.contains(abs).is_some()
        {
            return Ok(0);
        }

        log::warn!("Unhandled IO read32 at 0x{:08X}", addr);

        if abs >= 0x1F80_1000 && abs < 0x1F80_2000 {
            return Ok(0);
        }

        Err(EmulatorError::InvalidMemoryAccess { address: addr })
    }

    /// 8-bit write in the hardware register window
    pub(super) fn store_io8(
        &mut self,
        th: &mut TimeHandler,
        abs: u32,
        addr: u32,
        val: u8,
    ) -> Result<()> {
        if let Some(offset) = region::CDROM.contains(abs) {
            self.cdrom.store8(th, &mut self.irq, offset, val);
            return Ok(());
        }

        if let Some(offset) = region::PAD_MEMCARD.contains(abs) {
            self.padmemcard.sync(th, &mut self.irq);

            if offset == 0 {
                self.padmemcard.send_command(val);
                self.padmemcard.sync(th, &mut self.irq);
                return Ok(());
            }
        }

        log::warn!("Unhandled IO write8 at 0x{:08X} = 0x{:02X}", addr, val);

        if abs >= 0x1F80_1000 && abs < 0x1F80_2000 {
            return Ok(());
        }

        Err(EmulatorError::InvalidMemoryAccess { address: addr })
    }

    /// 16-bit write in the hardware register window
    pub(super) fn store_io16(
        &mut self,
        th: &mut TimeHandler,
        abs: u32,
        addr: u32,
        val: u16,
    ) -> Result<()> {
        if let Some(offset) = region::IRQ_CONTROL.contains(abs) {
            match offset {
                0 => self.irq.write_status(val as u32),
                4 => self.irq.write_mask(val as u32),
                _ => log::warn!("Unhandled IRQ write16 at 0x{:08X}", addr),
            }
            return Ok(());
        }

        if let Some(offset) = region::TIMERS.contains(abs) {
            self.timers.store(th, &mut self.irq, &self.gpu, offset, val);
            return Ok(());
        }

        if let Some(offset) = region::PAD_MEMCARD.contains(abs) {
            self.padmemcard.sync(th, &mut self.irq);

            match offset {
                0x0 => {
                    self.padmemcard.send_command(val as u8);
                    self.padmemcard.sync(th, &mut self.irq);
                }
                0x8 => self.padmemcard.set_mode(val),
                0xA => self.padmemcard.set_control(val),
                0xE => self.padmemcard.set_baud(val),
                _ => log::warn!(
                    "Unhandled pad register write16 at 0x{:08X} = 0x{:04X}",
                    addr,
                    val
                ),
            }
            return Ok(());
        }

        if region::SPU.contains(abs).is_some() {
            log::trace!("SPU write16 at 0x{:08X} = 0x{:04X}", addr, val);
            return Ok(());
        }

        if region::MEM_CONTROL.contains(abs).is_some()
            || region::RAM_SIZE.contains(abs).is_some()
        {
            return Ok(());
        }

        log::warn!("Unhandled IO write16 at 0x{:08X} = 0x{:04X}", addr, val);

        if abs >= 0x1F80_1000 && abs < 0x1F80_2000 {
            return Ok(());
        }

        Err(EmulatorError::InvalidMemoryAccess { address: addr })
    }

    /// 32-bit write in the hardware register window
    pub(super) fn store_io32(
        &mut self,
        th: &mut TimeHandler,
        abs: u32,
        addr: u32,
        val: u32,
    ) -> Result<()> {
        if let Some(offset) = region::IRQ_CONTROL.contains(abs) {
            match offset {
                0 => self.irq.write_status(val),
                4 => self.irq.write_mask(val),
                _ => log::warn!("Unhandled IRQ write32 at 0x{:08X}", addr),
            }
            return Ok(());
        }

        if region::DMA.contains(abs).is_some() {
            self.set_dma_reg(th, abs, val);
            return Ok(());
        }

        if let Some(offset) = region::GPU.contains(abs) {
            match offset {
                0 => self.gpu.gp0(val),
                4 => {
                    self.gpu.gp1(val, th, &mut self.irq);

                    // Display mode and reset commands change the video
                    // timings the GPU-sourced timers depend on
                    let opcode = (val >> 24) & 0xFF;
                    if opcode == 0x00 || opcode == 0x08 {
                        self.timers.video_timings_changed(th, &mut self.irq, &self.gpu);
                    }
                }
                _ => unreachable!(),
            }
            return Ok(());
        }

        if let Some(offset) = region::TIMERS.contains(abs) {
            self.timers
                .store(th, &mut self.irq, &self.gpu, offset, val as u16);
            return Ok(());
        }

        if region::MEM_CONTROL.contains(abs).is_some() {
            // Expansion base addresses and bus latency configuration; the
            // values written by the BIOS are the only ones we support
            log::trace!("MEM_CONTROL write at 0x{:08X} = 0x{:08X}", addr, val);
            return Ok(());
        }

        if region::RAM_SIZE.contains(abs).is_some() {
            log::trace!("RAM_SIZE = 0x{:08X}", val);
            return Ok(());
        }

        if region::MDEC.contains(abs).is_some() {
            log::warn!("MDEC write32 at 0x{:08X} = 0x{:08X} (ignored)", addr, val);
            return Ok(());
        }

        if region::SPU.contains(abs).is_some() {
            log::trace!("SPU write32 at 0x{:08X} = 0x{:08X}", addr, val);
            return Ok(());
        }

        log::warn!("Unhandled IO write32 at 0x{:08X} = 0x{:08X}", addr, val);

        if abs >= 0x1F80_1000 && abs < 0x1F80_2000 {
            return Ok(());
        }

        Err(EmulatorError::InvalidMemoryAccess { address: addr })
    }

    /// Read a DMA register by its physical address
    fn dma_reg(&self, abs: u32) -> u32 {
        // Offset within the DMA register window
        let offset = abs - 0x1F80_1080;

        let major = (offset & 0x70) >> 4;
        let minor = offset & 0xF;

        match major {
            // Per-channel registers
            0..=6 => {
                let channel = self.dma.channel(Port::from_index(major));

                match minor {
                    0x0 => channel.base(),
                    0x4 => channel.block_control(),
                    0x8 => channel.control(),
                    _ => {
                        log::warn!("Unhandled DMA register read 0x{:08X}", abs);
                        0
                    }
                }
            }
            // Common registers
            7 => match minor {
                0x0 => self.dma.control(),
                0x4 => self.dma.interrupt(),
                _ => {
                    log::warn!("Unhandled DMA register read 0x{:08X}", abs);
                    0
                }
            },
            _ => unreachable!(),
        }
    }

    /// Write a DMA register by its physical address, starting any transfer
    /// the write activates
    fn set_dma_reg(&mut self, th: &mut TimeHandler, abs: u32, val: u32) {
        let offset = abs - 0x1F80_1080;

        let major = (offset & 0x70) >> 4;
        let minor = offset & 0xF;

        let active_port = match major {
            0..=6 => {
                let port = Port::from_index(major);
                let channel = self.dma.channel_mut(port);

                match minor {
                    0x0 => channel.set_base(val),
                    0x4 => channel.set_block_control(val),
                    0x8 => channel.set_control(val),
                    _ => log::warn!("Unhandled DMA register write 0x{:08X}", abs),
                }

                channel.active().then_some(port)
            }
            7 => {
                match minor {
                    0x0 => self.dma.set_control(val),
                    0x4 => self.dma.set_interrupt(val, &mut self.irq),
                    _ => log::warn!("Unhandled DMA register write 0x{:08X}", abs),
                }

                None
            }
            _ => unreachable!(),
        };

        if let Some(port) = active_port {
            self.do_dma(th, port);
        }
    }
}
