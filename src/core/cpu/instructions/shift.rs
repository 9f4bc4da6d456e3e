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
    // === Shift Instructions ===

    /// SLL: shift left logical by an immediate amount
    ///
    /// `sll r0, r0, 0` is the canonical NOP.
    ///
    /// Format: sll rd, rt, shamt
    pub(crate) fn op_sll(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rt()) << instruction.shift();

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// SRL: shift right logical by an immediate amount
    ///
    /// Format: srl rd, rt, shamt
    pub(crate) fn op_srl(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rt()) >> instruction.shift();

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// SRA: shift right arithmetic by an immediate amount
    ///
    /// Format: sra rd, rt, shamt
    pub(crate) fn op_sra(&mut self, instruction: Instruction) -> Result<()> {
        let v = (self.reg(instruction.rt()) as i32) >> instruction.shift();

        self.set_reg(instruction.rd(), v as u32);

        Ok(())
    }

    /// SLLV: shift left logical by a register amount
    ///
    /// Only the low 5 bits of rs are used.
    ///
    /// Format: sllv rd, rt, rs
    pub(crate) fn op_sllv(&mut self, instruction: Instruction) -> Result<()> {
        let shift = self.reg(instruction.rs()) & 0x1F;
        let v = self.reg(instruction.rt()) << shift;

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// SRLV: shift right logical by a register amount
    ///
    /// Format: srlv rd, rt, rs
    pub(crate) fn op_srlv(&mut self, instruction: Instruction) -> Result<()> {
        let shift = self.reg(instruction.rs()) & 0x1F;
        let v = self.reg(instruction.rt()) >> shift;

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// SRAV: shift right arithmetic by a register amount
    ///
    /// Format: srav rd, rt, rs
    pub(crate) fn op_srav(&mut self, instruction: Instruction) -> Result<()> {
        let shift = self.reg(instruction.rs()) & 0x1F;
        let v = (self.reg(instruction.rt()) as i32) >> shift;

        self.set_reg(instruction.rd(), v as u32);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::cpu::test_support::*;

    #[test]
    fn test_sll_srl() {
        let mut t = TestCpu::new();

        t.load_program(&[
            addiu(1, 0, 0x0081),
            rtype(0x00, 0, 1, 2, 4), // sll r2, r1, 4
            rtype(0x02, 0, 1, 3, 4), // srl r3, r1, 4
        ]);
        t.step_n(3);

        assert_eq!(t.reg(2), 0x0810);
        assert_eq!(t.reg(3), 0x0008);
    }

    #[test]
    fn test_sra_keeps_sign() {
        let mut t = TestCpu::new();

        t.load_program(&[
            lui(1, 0x8000),          // r1 = 0x80000000
            rtype(0x03, 0, 1, 2, 4), // sra r2, r1, 4
            rtype(0x02, 0, 1, 3, 4), // srl r3, r1, 4
        ]);
        t.step_n(3);

        assert_eq!(t.reg(2), 0xF800_0000, "arithmetic shift extends the sign");
        assert_eq!(t.reg(3), 0x0800_0000, "logical shift does not");
    }

    #[test]
    fn test_variable_shift_masks_to_5_bits() {
        let mut t = TestCpu::new();

        t.load_program(&[
            addiu(1, 0, 1),
            addiu(2, 0, 33),         // shift amount 33 -> effective 1
            rtype(0x04, 2, 1, 3, 0), // sllv r3, r1, r2
        ]);
        t.step_n(3);

        assert_eq!(t.reg(3), 2);
    }
}
