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

use super::super::{Cpu, Instruction};
use crate::core::error::Result;

impl Cpu {
    // === Jump Instructions ===

    /// J: jump within the current 256MB region
    ///
    /// Format: j target
    pub(crate) fn op_j(&mut self, instruction: Instruction) -> Result<()> {
        // The target region comes from the delay slot address
        self.next_pc = (self.pc & 0xF000_0000) | (instruction.imm_jump() << 2);
        self.branch = true;

        Ok(())
    }

    /// JAL: jump and link
    ///
    /// The return address is the instruction after the delay slot.
    ///
    /// Format: jal target
    pub(crate) fn op_jal(&mut self, instruction: Instruction) -> Result<()> {
        let ra = self.next_pc;

        self.set_reg(31, ra);

        self.op_j(instruction)
    }

    /// JR: jump to a register address
    ///
    /// A misaligned target faults on the following fetch.
    ///
    /// Format: jr rs
    pub(crate) fn op_jr(&mut self, instruction: Instruction) -> Result<()> {
        self.next_pc = self.reg(instruction.rs());
        self.branch = true;

        Ok(())
    }

    /// JALR: jump to a register address and link
    ///
    /// Format: jalr rd, rs
    pub(crate) fn op_jalr(&mut self, instruction: Instruction) -> Result<()> {
        let ra = self.next_pc;

        self.set_reg(instruction.rd(), ra);

        self.next_pc = self.reg(instruction.rs());
        self.branch = true;

        Ok(())
    }
}
