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
    // === Logical Instructions ===

    /// AND: bitwise and
    ///
    /// Format: and rd, rs, rt
    pub(crate) fn op_and(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) & self.reg(instruction.rt());

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// ANDI: bitwise and with zero-extended immediate
    ///
    /// Format: andi rt, rs, imm
    pub(crate) fn op_andi(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) & instruction.imm();

        self.set_reg(instruction.rt(), v);

        Ok(())
    }

    /// OR: bitwise or
    ///
    /// Format: or rd, rs, rt
    pub(crate) fn op_or(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) | self.reg(instruction.rt());

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// ORI: bitwise or with zero-extended immediate
    ///
    /// Format: ori rt, rs, imm
    pub(crate) fn op_ori(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) | instruction.imm();

        self.set_reg(instruction.rt(), v);

        Ok(())
    }

    /// XOR: bitwise exclusive or
    ///
    /// Format: xor rd, rs, rt
    pub(crate) fn op_xor(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) ^ self.reg(instruction.rt());

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// XORI: bitwise exclusive or with zero-extended immediate
    ///
    /// Format: xori rt, rs, imm
    pub(crate) fn op_xori(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) ^ instruction.imm();

        self.set_reg(instruction.rt(), v);

        Ok(())
    }

    /// NOR: bitwise not-or
    ///
    /// Format: nor rd, rs, rt
    pub(crate) fn op_nor(&mut self, instruction: Instruction) -> Result<()> {
        let v = !(self.reg(instruction.rs()) | self.reg(instruction.rt()));

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// LUI: load immediate into the upper halfword
    ///
    /// The lower halfword is cleared.
    ///
    /// Format: lui rt, imm
    pub(crate) fn op_lui(&mut self, instruction: Instruction) -> Result<()> {
        self.set_reg(instruction.rt(), instruction.imm() << 16);

        Ok(())
    }
}
