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

impl Cpu {
    // === Arithmetic Instructions ===

    /// ADD: add with signed overflow trap
    ///
    /// Format: add rd, rs, rt
    ///
    /// On overflow the destination is left untouched and an Overflow
    /// exception is taken.
    pub(crate) fn op_add(&mut self, instruction: Instruction) -> Result<()> {
        let a = self.reg(instruction.rs()) as i32;
        let b = self.reg(instruction.rt()) as i32;

        match a.checked_add(b) {
            Some(v) => self.set_reg(instruction.rd(), v as u32),
            None => self.exception(ExceptionCause::Overflow),
        }

        Ok(())
    }

    /// ADDU: add, wrapping on overflow
    ///
    /// Format: addu rd, rs, rt
    pub(crate) fn op_addu(&mut self, instruction: Instruction) -> Result<()> {
        let v = self
            .reg(instruction.rs())
            .wrapping_add(self.reg(instruction.rt()));

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// ADDI: add sign-extended immediate with overflow trap
    ///
    /// Format: addi rt, rs, imm
    pub(crate) fn op_addi(&mut self, instruction: Instruction) -> Result<()> {
        let imm = instruction.imm_se() as i32;
        let a = self.reg(instruction.rs()) as i32;

        match a.checked_add(imm) {
            Some(v) => self.set_reg(instruction.rt(), v as u32),
            None => self.exception(ExceptionCause::Overflow),
        }

        Ok(())
    }

    /// ADDIU: add sign-extended immediate, wrapping
    ///
    /// Despite the name the immediate is sign extended; "unsigned" only
    /// means "no overflow trap".
    ///
    /// Format: addiu rt, rs, imm
    pub(crate) fn op_addiu(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        self.set_reg(instruction.rt(), v);

        Ok(())
    }

    /// SUB: subtract with signed overflow trap
    ///
    /// Format: sub rd, rs, rt
    pub(crate) fn op_sub(&mut self, instruction: Instruction) -> Result<()> {
        let a = self.reg(instruction.rs()) as i32;
        let b = self.reg(instruction.rt()) as i32;

        match a.checked_sub(b) {
            Some(v) => self.set_reg(instruction.rd(), v as u32),
            None => self.exception(ExceptionCause::Overflow),
        }

        Ok(())
    }

    /// SUBU: subtract, wrapping
    ///
    /// Format: subu rd, rs, rt
    pub(crate) fn op_subu(&mut self, instruction: Instruction) -> Result<()> {
        let v = self
            .reg(instruction.rs())
            .wrapping_sub(self.reg(instruction.rt()));

        self.set_reg(instruction.rd(), v);

        Ok(())
    }

    /// SLT: set on signed less-than
    ///
    /// Format: slt rd, rs, rt
    pub(crate) fn op_slt(&mut self, instruction: Instruction) -> Result<()> {
        let a = self.reg(instruction.rs()) as i32;
        let b = self.reg(instruction.rt()) as i32;

        self.set_reg(instruction.rd(), (a < b) as u32);

        Ok(())
    }

    /// SLTU: set on unsigned less-than
    ///
    /// Format: sltu rd, rs, rt
    pub(crate) fn op_sltu(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) < self.reg(instruction.rt());

        self.set_reg(instruction.rd(), v as u32);

        Ok(())
    }

    /// SLTI: set on signed less-than against a sign-extended immediate
    ///
    /// Format: slti rt, rs, imm
    pub(crate) fn op_slti(&mut self, instruction: Instruction) -> Result<()> {
        let a = self.reg(instruction.rs()) as i32;
        let imm = instruction.imm_se() as i32;

        self.set_reg(instruction.rt(), (a < imm) as u32);

        Ok(())
    }

    /// SLTIU: set on unsigned less-than against a sign-extended immediate
    ///
    /// Format: sltiu rt, rs, imm
    pub(crate) fn op_sltiu(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rs()) < instruction.imm_se();

        self.set_reg(instruction.rt(), v as u32);

        Ok(())
    }
}
