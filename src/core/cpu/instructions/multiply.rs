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
    // === Multiply / Divide Instructions ===

    /// MULT: signed 32x32 -> 64 multiplication into HI/LO
    ///
    /// Format: mult rs, rt
    pub(crate) fn op_mult(&mut self, instruction: Instruction) -> Result<()> {
        let a = self.reg(instruction.rs()) as i32 as i64;
        let b = self.reg(instruction.rt()) as i32 as i64;

        let v = (a * b) as u64;

        self.hi = (v >> 32) as u32;
        self.lo = v as u32;

        Ok(())
    }

    /// MULTU: unsigned 32x32 -> 64 multiplication into HI/LO
    ///
    /// Format: multu rs, rt
    pub(crate) fn op_multu(&mut self, instruction: Instruction) -> Result<()> {
        let a = self.reg(instruction.rs()) as u64;
        let b = self.reg(instruction.rt()) as u64;

        let v = a * b;

        self.hi = (v >> 32) as u32;
        self.lo = v as u32;

        Ok(())
    }

    /// DIV: signed division, quotient in LO and remainder in HI
    ///
    /// Division by zero and the 0x80000000/-1 overflow don't trap; they
    /// produce the sentinel values the hardware (and the BIOS) expects.
    ///
    /// Format: div rs, rt
    pub(crate) fn op_div(&mut self, instruction: Instruction) -> Result<()> {
        let n = self.reg(instruction.rs()) as i32;
        let d = self.reg(instruction.rt()) as i32;

        if d == 0 {
            // Division by zero: HI holds the dividend, LO saturates by
            // sign
            self.hi = n as u32;

            self.lo = if n >= 0 { 0xFFFF_FFFF } else { 1 };
        } else if n as u32 == 0x8000_0000 && d == -1 {
            // The result doesn't fit in 32 bits
            self.hi = 0;
            self.lo = 0x8000_0000;
        } else {
            self.hi = (n % d) as u32;
            self.lo = (n / d) as u32;
        }

        Ok(())
    }

    /// DIVU: unsigned division, quotient in LO and remainder in HI
    ///
    /// Format: divu rs, rt
    pub(crate) fn op_divu(&mut self, instruction: Instruction) -> Result<()> {
        let n = self.reg(instruction.rs());
        let d = self.reg(instruction.rt());

        if d == 0 {
            self.hi = n;
            self.lo = 0xFFFF_FFFF;
        } else {
            self.hi = n % d;
            self.lo = n / d;
        }

        Ok(())
    }

    /// MFHI: move from HI
    ///
    /// Format: mfhi rd
    pub(crate) fn op_mfhi(&mut self, instruction: Instruction) -> Result<()> {
        let hi = self.hi;

        self.set_reg(instruction.rd(), hi);

        Ok(())
    }

    /// MTHI: move to HI
    ///
    /// Format: mthi rs
    pub(crate) fn op_mthi(&mut self, instruction: Instruction) -> Result<()> {
        self.hi = self.reg(instruction.rs());

        Ok(())
    }

    /// MFLO: move from LO
    ///
    /// Format: mflo rd
    pub(crate) fn op_mflo(&mut self, instruction: Instruction) -> Result<()> {
        let lo = self.lo;

        self.set_reg(instruction.rd(), lo);

        Ok(())
    }

    /// MTLO: move to LO
    ///
    /// Format: mtlo rs
    pub(crate) fn op_mtlo(&mut self, instruction: Instruction) -> Result<()> {
        self.lo = self.reg(instruction.rs());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::cpu::test_support::*;

    #[test]
    fn test_mult_signed() {
        let mut t = TestCpu::new();

        t.load_program(&[
            addiu(1, 0, 0xFFFF),     // r1 = -1
            addiu(2, 0, 100),
            rtype(0x18, 1, 2, 0, 0), // mult r1, r2
            rtype(0x10, 0, 0, 3, 0), // mfhi r3
            rtype(0x12, 0, 0, 4, 0), // mflo r4
        ]);
        t.step_n(5);

        assert_eq!(t.reg(4) as i32, -100);
        assert_eq!(t.reg(3), 0xFFFF_FFFF, "sign extension into HI");
    }

    #[test]
    fn test_multu_large_product() {
        let mut t = TestCpu::new();

        t.load_program(&[
            lui(1, 0x8000),          // r1 = 0x80000000
            addiu(2, 0, 4),
            rtype(0x19, 1, 2, 0, 0), // multu
            rtype(0x10, 0, 0, 3, 0), // mfhi
            rtype(0x12, 0, 0, 4, 0), // mflo
        ]);
        t.step_n(5);

        assert_eq!(t.reg(3), 2, "product overflows into HI");
        assert_eq!(t.reg(4), 0);
    }

    #[test]
    fn test_div_basic() {
        let mut t = TestCpu::new();

        t.load_program(&[
            addiu(1, 0, 47),
            addiu(2, 0, 10),
            rtype(0x1A, 1, 2, 0, 0), // div
            rtype(0x12, 0, 0, 3, 0), // mflo
            rtype(0x10, 0, 0, 4, 0), // mfhi
        ]);
        t.step_n(5);

        assert_eq!(t.reg(3), 4, "quotient");
        assert_eq!(t.reg(4), 7, "remainder");
    }

    #[test]
    fn test_div_by_zero_sentinels() {
        let mut t = TestCpu::new();

        // Positive dividend
        t.load_program(&[
            addiu(1, 0, 42),
            rtype(0x1A, 1, 0, 0, 0), // div r1, r0
            rtype(0x12, 0, 0, 3, 0),
            rtype(0x10, 0, 0, 4, 0),
        ]);
        t.step_n(4);

        assert_eq!(t.reg(3), 0xFFFF_FFFF, "LO = -1 for positive dividend");
        assert_eq!(t.reg(4), 42, "HI keeps the dividend");

        // Negative dividend
        let mut t = TestCpu::new();
        t.load_program(&[
            addiu(1, 0, 0xFFFF), // r1 = -1
            rtype(0x1A, 1, 0, 0, 0),
            rtype(0x12, 0, 0, 3, 0),
        ]);
        t.step_n(3);

        assert_eq!(t.reg(3), 1, "LO = +1 for negative dividend");
    }

    #[test]
    fn test_div_overflow_sentinel() {
        let mut t = TestCpu::new();

        t.load_program(&[
            lui(1, 0x8000),          // r1 = i32::MIN
            addiu(2, 0, 0xFFFF),     // r2 = -1
            rtype(0x1A, 1, 2, 0, 0),
            rtype(0x12, 0, 0, 3, 0),
            rtype(0x10, 0, 0, 4, 0),
        ]);
        t.step_n(5);

        assert_eq!(t.reg(3), 0x8000_0000, "LO = 0x80000000");
        assert_eq!(t.reg(4), 0, "HI = 0");
    }

    #[test]
    fn test_divu_by_zero() {
        let mut t = TestCpu::new();

        t.load_program(&[
            addiu(1, 0, 7),
            rtype(0x1B, 1, 0, 0, 0), // divu r1, r0
            rtype(0x12, 0, 0, 3, 0),
            rtype(0x10, 0, 0, 4, 0),
        ]);
        t.step_n(4);

        assert_eq!(t.reg(3), 0xFFFF_FFFF);
        assert_eq!(t.reg(4), 7);
    }

    #[test]
    fn test_mthi_mtlo() {
        let mut t = TestCpu::new();

        t.load_program(&[
            addiu(1, 0, 0x123),
            rtype(0x11, 1, 0, 0, 0), // mthi r1
            rtype(0x13, 1, 0, 0, 0), // mtlo r1
            rtype(0x10, 0, 0, 2, 0), // mfhi r2
            rtype(0x12, 0, 0, 3, 0), // mflo r3
        ]);
        t.step_n(5);

        assert_eq!(t.reg(2), 0x123);
        assert_eq!(t.reg(3), 0x123);
    }
}
