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
    // === Branch Instructions ===
    //
    // All branches are relative to the delay slot address and take effect
    // after the delay slot executes.

    /// BEQ: branch if equal
    ///
    /// Format: beq rs, rt, offset
    pub(crate) fn op_beq(&mut self, instruction: Instruction) -> Result<()> {
        if self.reg(instruction.rs()) == self.reg(instruction.rt()) {
            self.branch(instruction.imm_se());
        }

        Ok(())
    }

    /// BNE: branch if not equal
    ///
    /// Format: bne rs, rt, offset
    pub(crate) fn op_bne(&mut self, instruction: Instruction) -> Result<()> {
        if self.reg(instruction.rs()) != self.reg(instruction.rt()) {
            self.branch(instruction.imm_se());
        }

        Ok(())
    }

    /// BLEZ: branch if less than or equal to zero (signed)
    ///
    /// Format: blez rs, offset
    pub(crate) fn op_blez(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) as i32;

        if v <= 0 {
            self.branch(instruction.imm_se());
        }

        Ok(())
    }

    /// BGTZ: branch if greater than zero (signed)
    ///
    /// Format: bgtz rs, offset
    pub(crate) fn op_bgtz(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) as i32;

        if v > 0 {
            self.branch(instruction.imm_se());
        }

        Ok(())
    }

    /// BGEZ, BLTZ, BGEZAL, BLTZAL
    ///
    /// The four opcode-1 branches share an encoding: bit 16 selects the
    /// "greater or equal" test and bits [20:17] equal to 8 select the
    /// linking variants. The link register is written whether or not the
    /// branch is taken.
    pub(crate) fn op_bxx(&mut self, instruction: Instruction) -> Result<()> {
        let word = instruction.0;

        let is_bgez = (word >> 16) & 1;
        let is_link = (word >> 17) & 0xF == 8;

        let v = self.reg(instruction.rs()) as i32;

        // Test "less than zero", then flip the result for the GEZ
        // variants
        let test = (v < 0) as u32;
        let test = test ^ is_bgez;

        if is_link {
            let ra = self.next_pc;
            self.set_reg(31, ra);
        }

        if test != 0 {
            self.branch(instruction.imm_se());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::cpu::test_support::*;

    #[test]
    fn test_bne_taken_and_not_taken() {
        let mut t = TestCpu::new();

        // bne r1, r0, +2; delay; skipped; target
        t.load_program(&[
            addiu(1, 0, 1),
            itype(0x05, 1, 0, 2),
            nop(),
            addiu(2, 0, 0xBAD),
            addiu(3, 0, 0x600D),
        ]);
        t.step_n(4);

        assert_eq!(t.reg(2), 0, "skipped instruction never ran");
        assert_eq!(t.reg(3), 0x600D);
    }

    #[test]
    fn test_beq_backwards_loop() {
        let mut t = TestCpu::new();

        // r1 counts down from 3: addiu r1, r1, -1; bne r1, r0, -2; nop
        t.load_program(&[
            addiu(1, 0, 3),
            addiu(1, 1, 0xFFFF),
            itype(0x05, 1, 0, 0xFFFE), // bne r1, r0, -2
            nop(),
            addiu(2, 0, 1),
        ]);

        // 3 loop iterations of 3 instructions plus setup and epilogue
        t.step_n(1 + 3 * 3 + 1);

        assert_eq!(t.reg(1), 0);
        assert_eq!(t.reg(2), 1, "loop exited to the epilogue");
    }

    #[test]
    fn test_blez_bgtz() {
        let mut t = TestCpu::new();

        // r1 = -5: blez taken, bgtz not taken
        t.load_program(&[
            addiu(1, 0, 0xFFFB),
            itype(0x06, 1, 0, 2), // blez r1, +2
            nop(),
            addiu(2, 0, 0xBAD),
            itype(0x07, 1, 0, 2), // bgtz r1, +2 (not taken)
            nop(),
            addiu(3, 0, 0x600D),
        ]);
        t.step_n(6);

        assert_eq!(t.reg(2), 0);
        assert_eq!(t.reg(3), 0x600D, "fall-through after untaken bgtz");
    }

    #[test]
    fn test_bltz_bgez() {
        let mut t = TestCpu::new();

        // r1 = -1: bltz taken
        t.load_program(&[
            addiu(1, 0, 0xFFFF),
            itype(0x01, 1, 0x00, 2), // bltz r1, +2
            nop(),
            addiu(2, 0, 0xBAD),
            addiu(3, 0, 1),
        ]);
        t.step_n(4);

        assert_eq!(t.reg(2), 0);
        assert_eq!(t.reg(3), 1);

        // r1 = 0: bgez taken
        let mut t = TestCpu::new();
        t.load_program(&[
            itype(0x01, 1, 0x01, 2), // bgez r1, +2
            nop(),
            addiu(2, 0, 0xBAD),
            addiu(3, 0, 2),
        ]);
        t.step_n(3);

        assert_eq!(t.reg(2), 0);
        assert_eq!(t.reg(3), 2);
    }

    #[test]
    fn test_bltzal_links_even_when_not_taken() {
        let mut t = TestCpu::new();

        // r1 = 1: bltzal not taken, but r31 still gets the return address
        t.load_program(&[
            addiu(1, 0, 1),
            itype(0x01, 1, 0x10, 4), // bltzal r1, +4
            nop(),
        ]);
        t.step_n(3);

        assert_eq!(t.reg(31), 12, "link register written regardless");
        assert_eq!(t.cpu.pc(), 12, "branch not taken");
    }
}
