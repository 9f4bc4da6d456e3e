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

use super::super::{Cpu, ExceptionCause, Instruction};
use crate::core::error::Result;
use crate::core::memory::Interconnect;
use crate::core::timing::TimeHandler;

impl Cpu {
    // === Coprocessor Instructions ===

    /// COP1 doesn't exist on the PlayStation
    pub(crate) fn op_cop1(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::CoprocessorUnusable);

        Ok(())
    }

    /// COP3 doesn't exist on the PlayStation
    pub(crate) fn op_cop3(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::CoprocessorUnusable);

        Ok(())
    }

    /// Dispatch the COP2 (GTE) opcode space
    pub(crate) fn op_cop2(&mut self, instruction: Instruction) -> Result<()> {
        let cop_opcode = instruction.cop_opcode();

        if cop_opcode & 0x10 != 0 {
            // GTE command
            self.gte.command(instruction.0 & 0x1FF_FFFF);

            return Ok(());
        }

        match cop_opcode {
            // MFC2: read a GTE data register (delayed like a load)
            0x00 => {
                let v = self.gte.data(instruction.rd() as u32);

                self.delayed_load(instruction.rt(), v);
            }
            // CFC2: read a GTE control register
            0x02 => {
                let v = self.gte.control(instruction.rd() as u32);

                self.delayed_load(instruction.rt(), v);
            }
            // MTC2: write a GTE data register
            0x04 => {
                let v = self.reg(instruction.rt());

                self.gte.set_data(instruction.rd() as u32, v);
            }
            // CTC2: write a GTE control register
            0x06 => {
                let v = self.reg(instruction.rt());

                self.gte.set_control(instruction.rd() as u32, v);
            }
            _ => return self.op_illegal(instruction),
        }

        Ok(())
    }

    /// LWC2: load a word straight into a GTE data register
    ///
    /// Format: lwc2 rt, offset(rs)
    pub(crate) fn op_lwc2(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        if addr % 4 == 0 {
            let v = inter.load32(th, addr)?;

            self.gte.set_data(instruction.rt() as u32, v);
        } else {
            self.exception(ExceptionCause::AddressErrorLoad);
        }

        Ok(())
    }

    /// SWC2: store a GTE data register to memory
    ///
    /// Format: swc2 rt, offset(rs)
    pub(crate) fn op_swc2(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        if addr % 4 == 0 {
            let v = self.gte.data(instruction.rt() as u32);

            inter.store32(th, addr, v)?;
        } else {
            self.exception(ExceptionCause::AddressErrorStore);
        }

        Ok(())
    }

    /// LWC0/LWC1/LWC3: no coprocessor answers these
    pub(crate) fn op_lwc0(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::CoprocessorUnusable);
        Ok(())
    }

    pub(crate) fn op_lwc1(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::CoprocessorUnusable);
        Ok(())
    }

    pub(crate) fn op_lwc3(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::CoprocessorUnusable);
        Ok(())
    }

    /// SWC0/SWC1/SWC3: no coprocessor answers these
    pub(crate) fn op_swc0(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::CoprocessorUnusable);
        Ok(())
    }

    pub(crate) fn op_swc1(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::CoprocessorUnusable);
        Ok(())
    }

    pub(crate) fn op_swc3(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::CoprocessorUnusable);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::cpu::test_support::*;

    /// mtc2 rt, rd
    fn mtc2(rt: u8, rd: u8) -> u32 {
        (0x12 << 26) | (0x04 << 21) | ((rt as u32) << 16) | ((rd as u32) << 11)
    }

    /// mfc2 rt, rd
    fn mfc2(rt: u8, rd: u8) -> u32 {
        (0x12 << 26) | ((rt as u32) << 16) | ((rd as u32) << 11)
    }

    #[test]
    fn test_mtc2_mfc2_roundtrip() {
        let mut t = TestCpu::new();

        t.load_program(&[
            addiu(1, 0, 0x1234),
            mtc2(1, 7),  // OTZ
            mfc2(2, 7),
            nop(),
        ]);
        t.step_n(4);

        assert_eq!(t.reg(2), 0x1234);
    }

    #[test]
    fn test_gte_command_through_cop2() {
        let mut t = TestCpu::new();

        // Feed LZCS through MTC2 and run nothing: LZCR updates on write
        t.load_program(&[
            lui(1, 0x8000),
            mtc2(1, 30), // LZCS = 0x80000000
            mfc2(2, 31), // LZCR
            nop(),
        ]);
        t.step_n(4);

        assert_eq!(t.reg(2), 1);
    }

    #[test]
    fn test_lwc2_swc2() {
        let mut t = TestCpu::new();

        t.inter.ram_mut().store32(0x100, 0x0000_4242);

        t.load_program(&[
            (0x32 << 26) | (7 << 16) | 0x100,  // lwc2 r7(OTZ), 0x100(r0)
            nop(),
            (0x3A << 26) | (7 << 16) | 0x200,  // swc2 r7, 0x200(r0)
        ]);
        t.step_n(3);

        assert_eq!(t.inter.ram_mut().load32(0x200), 0x4242);
    }

    #[test]
    fn test_cop1_raises_coprocessor_error() {
        let mut t = TestCpu::new();

        t.load_program(&[(0x11 << 26), nop()]);
        t.step();

        assert_eq!(t.cpu.pc(), 0x8000_0080);
    }
}
