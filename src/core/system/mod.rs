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

//! System integration
//!
//! [`System`] is the machine owner: it holds the CPU, the interconnect
//! (which owns every peripheral) and the shared [`TimeHandler`], and wires
//! them together for the fetch-decode-execute loop. Hosts drive it one
//! instruction ([`System::step`]) or one video frame
//! ([`System::run_frame`]) at a time and feed input through
//! [`System::set_button_state`].

use crate::core::cdrom::Disc;
use crate::core::cpu::Cpu;
use crate::core::error::Result;
use crate::core::gpu::Renderer;
use crate::core::memory::{Bios, Interconnect};
use crate::core::padmemcard::{Button, ButtonState};
use crate::core::timing::{Cycles, TimeHandler};

pub use crate::core::gpu::HardwareType;

/// The whole machine
pub struct System {
    /// MIPS R3000A CPU (owns COP0, the GTE and the instruction cache)
    cpu: Cpu,
    /// Memory interconnect (owns RAM, BIOS and every peripheral)
    inter: Interconnect,
    /// Shared cycle accounting
    th: TimeHandler,
}

impl System {
    /// Build a machine without a disc
    ///
    /// # Example
    /// ```
    /// use psemu::core::gpu::NullRenderer;
    /// use psemu::core::memory::Bios;
    /// use psemu::core::system::{HardwareType, System};
    ///
    /// let bios = Bios::new(vec![0; Bios::SIZE]).unwrap();
    /// let system = System::new(bios, HardwareType::Ntsc, Box::new(NullRenderer));
    /// assert_eq!(system.pc(), 0xBFC0_0000);
    /// ```
    pub fn new(bios: Bios, hardware: HardwareType, renderer: Box<dyn Renderer>) -> System {
        System {
            cpu: Cpu::new(),
            inter: Interconnect::new(bios, hardware, None, renderer),
            th: TimeHandler::new(),
        }
    }

    /// Build a machine with a disc inserted
    ///
    /// The video standard comes from the disc region unless `hardware`
    /// overrides it.
    pub fn with_disc(
        bios: Bios,
        disc: Disc,
        hardware: Option<HardwareType>,
        renderer: Box<dyn Renderer>,
    ) -> System {
        let hardware = hardware.unwrap_or_else(|| disc.region().hardware_type());

        log::info!("Video standard: {:?}", hardware);

        System {
            cpu: Cpu::new(),
            inter: Interconnect::new(bios, hardware, Some(disc), renderer),
            th: TimeHandler::new(),
        }
    }

    /// Emulate one CPU instruction (and any peripheral work it is due)
    pub fn step(&mut self) -> Result<()> {
        self.cpu.run_next_instruction(&mut self.inter, &mut self.th)
    }

    /// Run until the GPU finishes the current frame
    pub fn run_frame(&mut self) -> Result<()> {
        let frame = self.inter.gpu().frame();

        while self.inter.gpu().frame() == frame {
            self.step()?;
        }

        Ok(())
    }

    /// Number of completed video frames
    pub fn frame(&self) -> u64 {
        self.inter.gpu().frame()
    }

    /// Total emulated CPU cycles
    pub fn cycles(&self) -> Cycles {
        self.th.now()
    }

    /// Current program counter
    pub fn pc(&self) -> u32 {
        self.cpu.pc()
    }

    /// Access the CPU
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Access the interconnect and its peripherals
    pub fn interconnect(&self) -> &Interconnect {
        &self.inter
    }

    /// Mutable access to the interconnect and its peripherals
    pub fn interconnect_mut(&mut self) -> &mut Interconnect {
        &mut self.inter
    }

    /// Report a button transition on one of the two pads
    ///
    /// This is the asynchronous input entry point; the serial engine
    /// latches the state at each exchanged command byte.
    pub fn set_button_state(&mut self, pad: usize, button: Button, state: ButtonState) {
        self.inter
            .padmemcard_mut()
            .set_button_state(pad, button, state);
    }
}
