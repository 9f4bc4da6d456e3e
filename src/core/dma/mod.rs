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

//! DMA (Direct Memory Access) Controller
//!
//! This module implements the PlayStation's DMA controller, which provides
//! high-speed data transfers between RAM and peripherals without CPU
//! intervention.
//!
//! # DMA Channels
//!
//! | Channel | Device      | Base Address |
//! |---------|-------------|--------------|
//! | 0       | MDEC In     | 0x1F801080   |
//! | 1       | MDEC Out    | 0x1F801090   |
//! | 2       | GPU         | 0x1F8010A0   |
//! | 3       | CD-ROM      | 0x1F8010B0   |
//! | 4       | SPU         | 0x1F8010C0   |
//! | 5       | PIO         | 0x1F8010D0   |
//! | 6       | OTC         | 0x1F8010E0   |
//!
//! # Channel Registers
//!
//! Each channel has three 32-bit registers:
//! - **MADR** (+0x00): Memory address register (24 bits)
//! - **BCR** (+0x04): Block control register
//! - **CHCR** (+0x08): Channel control register
//!
//! # Transfer Modes
//!
//! - **Manual** (sync 0): one block of `block_size` words, started by the
//!   trigger bit
//! - **Request** (sync 1): `block_count × block_size` words
//! - **Linked list** (sync 2): GPU command lists; each node's top byte is a
//!   word count, the low 24 bits point to the next node, `0xFFFFFF`
//!   terminates
//!
//! Transfers run to completion as soon as a channel becomes active; the
//! emulated CPU is effectively stalled for their duration.
//!
//! # References
//!
//! - [PSX-SPX: DMA Controller](http://problemkaputt.de/psx-spx.htm#dmacontroller)

use crate::core::cdrom::CdRom;
use crate::core::gpu::Gpu;
use crate::core::interrupt::{interrupts, InterruptController};
use crate::core::memory::Ram;

/// The 7 DMA ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Macroblock decoder input
    MdecIn = 0,
    /// Macroblock decoder output
    MdecOut = 1,
    /// Graphics Processing Unit
    Gpu = 2,
    /// CD-ROM drive
    CdRom = 3,
    /// Sound Processing Unit
    Spu = 4,
    /// Extension port
    Pio = 5,
    /// Used to clear the ordering table
    Otc = 6,
}

impl Port {
    /// Decode a port from its channel index
    pub fn from_index(index: u32) -> Port {
        match index {
            0 => Port::MdecIn,
            1 => Port::MdecOut,
            2 => Port::Gpu,
            3 => Port::CdRom,
            4 => Port::Spu,
            5 => Port::Pio,
            6 => Port::Otc,
            n => panic!("Invalid DMA channel {}", n),
        }
    }
}

/// DMA transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToRam = 0,
    FromRam = 1,
}

/// DMA address stepping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Increment = 0,
    Decrement = 1,
}

/// DMA synchronization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sync {
    /// Transfer starts when the CPU writes to the Trigger bit and
    /// transfers everything at once
    Manual = 0,
    /// Sync blocks to DMA requests
    Request = 1,
    /// Used to transfer GPU command lists
    LinkedList = 2,
}

/// Per-channel state, decoded from the CHCR/MADR/BCR registers
pub struct Channel {
    /// Enabled flag (CHCR bit 24)
    enable: bool,
    /// Transfer direction (CHCR bit 0)
    direction: Direction,
    /// Address step (CHCR bit 1)
    step: Step,
    /// Synchronization mode (CHCR bits 9-10)
    sync: Sync,
    /// Manual-sync start flag (CHCR bit 28)
    trigger: bool,
    /// Chopping enable (CHCR bit 8); chopping is not emulated since
    /// transfers complete instantly
    chop: bool,
    /// Chopping DMA window size (CHCR bits 16-18)
    chop_dma_sz: u8,
    /// Chopping CPU window size (CHCR bits 20-22)
    chop_cpu_sz: u8,
    /// Unknown RW bits (CHCR bits 29-30)
    dummy: u8,
    /// Transfer start address, masked to 24 bits
    base: u32,
    /// Block size in words (Manual/Request sync)
    block_size: u16,
    /// Block count (Request sync only)
    block_count: u16,
}

impl Channel {
    fn new() -> Channel {
        Channel {
            enable: false,
            direction: Direction::ToRam,
            step: Step::Increment,
            sync: Sync::Manual,
            trigger: false,
            chop: false,
            chop_dma_sz: 0,
            chop_cpu_sz: 0,
            dummy: 0,
            base: 0,
            block_size: 0,
            block_count: 0,
        }
    }

    /// Retrieve the channel's CHCR register value
    pub fn control(&self) -> u32 {
        let mut r = 0u32;

        r |= (self.direction as u32) << 0;
        r |= (self.step as u32) << 1;
        r |= (self.chop as u32) << 8;
        r |= (self.sync as u32) << 9;
        r |= (self.chop_dma_sz as u32) << 16;
        r |= (self.chop_cpu_sz as u32) << 20;
        r |= (self.enable as u32) << 24;
        r |= (self.trigger as u32) << 28;
        r |= (self.dummy as u32) << 29;

        r
    }

    /// Write the channel's CHCR register
    pub fn set_control(&mut self, val: u32) {
        self.direction = if val & 1 != 0 {
            Direction::FromRam
        } else {
            Direction::ToRam
        };

        self.step = if (val >> 1) & 1 != 0 {
            Step::Decrement
        } else {
            Step::Increment
        };

        self.chop = (val >> 8) & 1 != 0;

        self.sync = match (val >> 9) & 3 {
            0 => Sync::Manual,
            1 => Sync::Request,
            2 => Sync::LinkedList,
            n => {
                log::warn!("Unknown DMA sync mode {}", n);
                Sync::Manual
            }
        };

        self.chop_dma_sz = ((val >> 16) & 7) as u8;
        self.chop_cpu_sz = ((val >> 20) & 7) as u8;

        self.enable = (val >> 24) & 1 != 0;
        self.trigger = (val >> 28) & 1 != 0;

        self.dummy = ((val >> 29) & 3) as u8;

        if self.chop {
            log::warn!("DMA chopping requested (transfers run to completion)");
        }
    }

    /// Retrieve the channel's MADR register value
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Write the channel's MADR register (masked to 24 bits)
    pub fn set_base(&mut self, val: u32) {
        self.base = val & 0xFF_FFFF;
    }

    /// Retrieve the channel's BCR register value
    pub fn block_control(&self) -> u32 {
        let bs = self.block_size as u32;
        let bc = self.block_count as u32;

        (bc << 16) | bs
    }

    /// Write the channel's BCR register
    pub fn set_block_control(&mut self, val: u32) {
        self.block_size = val as u16;
        self.block_count = (val >> 16) as u16;
    }

    /// A channel is active when it's enabled and, for manual sync, when
    /// the trigger has been set
    pub fn active(&self) -> bool {
        let trigger = match self.sync {
            Sync::Manual => self.trigger,
            _ => true,
        };

        self.enable && trigger
    }

    /// Number of words to transfer for block-mode syncs
    ///
    /// Returns None for linked-list mode where the size is discovered
    /// while walking the list.
    fn transfer_size(&self) -> Option<u32> {
        let bs = self.block_size as u32;
        let bc = self.block_count as u32;

        match self.sync {
            // A block size of 0 means 0x10000 words
            Sync::Manual => Some(if bs == 0 { 0x10000 } else { bs }),
            Sync::Request => Some(bc * bs),
            Sync::LinkedList => None,
        }
    }

    /// The transfer completed: clear the start flags
    fn done(&mut self) {
        self.enable = false;
        self.trigger = false;
    }
}

/// DMA controller: 7 channels plus the DPCR/DICR registers
pub struct Dma {
    /// DMA Control Register (DPCR): channel priorities and master enables
    control: u32,
    /// DICR master IRQ enable (bit 23)
    irq_en: bool,
    /// DICR per-channel IRQ enables (bits 16-22)
    channel_irq_en: u8,
    /// DICR per-channel IRQ flags (bits 24-30)
    channel_irq_flags: u8,
    /// DICR force-IRQ bit (bit 15)
    force_irq: bool,
    /// The 7 channels
    channels: [Channel; 7],
}

impl Dma {
    /// Create the DMA controller in its post-reset state
    pub fn new() -> Dma {
        Dma {
            // Reset value of the DPCR, priorities in channel order
            control: 0x0765_4321,
            irq_en: false,
            channel_irq_en: 0,
            channel_irq_flags: 0,
            force_irq: false,
            channels: [
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
                Channel::new(),
            ],
        }
    }

    /// Read the DPCR register
    pub fn control(&self) -> u32 {
        self.control
    }

    /// Write the DPCR register
    pub fn set_control(&mut self, val: u32) {
        self.control = val;
        log::trace!("DPCR = 0x{:08X}", val);
    }

    /// Status of the master interrupt flag (DICR bit 31)
    fn irq(&self) -> bool {
        let channel_irq = self.channel_irq_flags & self.channel_irq_en;

        self.force_irq || (self.irq_en && channel_irq != 0)
    }

    /// Read the DICR register
    ///
    /// Bits 0-5 always read zero.
    pub fn interrupt(&self) -> u32 {
        let mut r = 0u32;

        r |= (self.force_irq as u32) << 15;
        r |= (self.channel_irq_en as u32) << 16;
        r |= (self.irq_en as u32) << 23;
        r |= (self.channel_irq_flags as u32) << 24;
        r |= (self.irq() as u32) << 31;

        r
    }

    /// Write the DICR register
    ///
    /// Flag bits (24-30) are write-1-to-clear. A 0→1 edge of the master
    /// flag raises the DMA interrupt.
    pub fn set_interrupt(&mut self, val: u32, irq: &mut InterruptController) {
        let prev_irq = self.irq();

        // Bits 0-5 are discarded
        self.force_irq = (val >> 15) & 1 != 0;
        self.channel_irq_en = ((val >> 16) & 0x7F) as u8;
        self.irq_en = (val >> 23) & 1 != 0;

        let ack = ((val >> 24) & 0x7F) as u8;
        self.channel_irq_flags &= !ack;

        if !prev_irq && self.irq() {
            irq.request(interrupts::DMA);
        }

        log::trace!("DICR = 0x{:08X}", self.interrupt());
    }

    /// Access a channel by port
    pub fn channel(&self, port: Port) -> &Channel {
        &self.channels[port as usize]
    }

    /// Mutable access to a channel by port
    pub fn channel_mut(&mut self, port: Port) -> &mut Channel {
        &mut self.channels[port as usize]
    }

    /// Execute the pending transfer for `port`
    ///
    /// Transfers run to completion immediately. When the channel finishes
    /// its DICR flag is set (if enabled) and the DMA interrupt is raised on
    /// the master flag's rising edge.
    pub fn run(
        &mut self,
        port: Port,
        ram: &mut Ram,
        gpu: &mut Gpu,
        cdrom: &mut CdRom,
        irq: &mut InterruptController,
    ) {
        log::debug!(
            "DMA{} transfer: base=0x{:06X} bcr=0x{:08X} chcr=0x{:08X}",
            port as usize,
            self.channels[port as usize].base(),
            self.channels[port as usize].block_control(),
            self.channels[port as usize].control()
        );

        match self.channels[port as usize].sync {
            Sync::LinkedList => self.do_linked_list(port, ram, gpu),
            _ => self.do_block(port, ram, gpu, cdrom),
        }

        self.channels[port as usize].done();

        // Completion interrupt
        let prev_irq = self.irq();

        if self.channel_irq_en & (1 << port as usize) != 0 {
            self.channel_irq_flags |= 1 << port as usize;
        }

        if !prev_irq && self.irq() {
            irq.request(interrupts::DMA);
        }
    }

    /// Execute a Manual or Request mode transfer
    fn do_block(&mut self, port: Port, ram: &mut Ram, gpu: &mut Gpu, cdrom: &mut CdRom) {
        let channel = &mut self.channels[port as usize];

        let increment: u32 = match channel.step {
            Step::Increment => 4,
            Step::Decrement => 4u32.wrapping_neg(),
        };

        let mut addr = channel.base();

        let mut remsz = match channel.transfer_size() {
            Some(n) => n,
            None => {
                log::warn!("DMA{}: block transfer in linked-list mode", port as usize);
                return;
            }
        };

        while remsz > 0 {
            // Addresses are masked to the RAM size and word aligned
            let cur_addr = addr & 0x1F_FFFC;

            match channel.direction {
                Direction::FromRam => {
                    let src_word = ram.load32(cur_addr);

                    match port {
                        Port::Gpu => gpu.gp0(src_word),
                        _ => log::warn!(
                            "DMA{}: unhandled RAM-to-device word 0x{:08X}",
                            port as usize,
                            src_word
                        ),
                    }
                }
                Direction::ToRam => {
                    let src_word = match port {
                        // The ordering table builds a reverse linked list:
                        // each entry points to the previous one, the last
                        // entry is the end-of-list marker
                        Port::Otc => {
                            if remsz == 1 {
                                0xFF_FFFF
                            } else {
                                addr.wrapping_sub(4) & 0x1F_FFFF
                            }
                        }
                        Port::Gpu => gpu.read(),
                        Port::CdRom => cdrom.dma_read_word(),
                        _ => {
                            log::warn!("DMA{}: unhandled device-to-RAM read", port as usize);
                            0
                        }
                    };

                    ram.store32(cur_addr, src_word);
                }
            }

            addr = addr.wrapping_add(increment);
            remsz -= 1;
        }
    }

    /// Execute a linked-list mode transfer (GPU command lists)
    fn do_linked_list(&mut self, port: Port, ram: &mut Ram, gpu: &mut Gpu) {
        let channel = &mut self.channels[port as usize];

        let mut addr = channel.base() & 0x1F_FFFC;

        if channel.direction == Direction::ToRam {
            log::warn!("DMA{}: invalid linked list direction", port as usize);
            return;
        }

        // The linked list is only used to feed GPU command lists
        if port != Port::Gpu {
            log::warn!("DMA{}: linked list on a non-GPU port", port as usize);
            return;
        }

        loop {
            // The header word holds the number of command words in its top
            // byte and the next node's address in the low 24 bits
            let header = ram.load32(addr);

            let mut remsz = header >> 24;

            while remsz > 0 {
                addr = (addr + 4) & 0x1F_FFFC;

                let command = ram.load32(addr);
                gpu.gp0(command);

                remsz -= 1;
            }

            // The end-of-list marker is 0xFFFFFF; testing the MSB of the
            // pointer is how the hardware recognizes it
            if header & 0x80_0000 != 0 {
                break;
            }

            addr = header & 0x1F_FFFC;
        }
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}
