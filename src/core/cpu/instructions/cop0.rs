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
use crate::core::memory::Interconnect;

impl Cpu {
    // === Coprocessor 0 Instructions ===

    /// Dispatch the COP0 opcode space
    pub(crate) fn op_cop0(
        &mut self,
        instruction: Instruction,
        inter: &Interconnect,
    ) -> Result<()> {
        match instruction.cop_opcode() {
            0x00 => self.op_mfc0(instruction, inter),
            0x04 => self.op_mtc0(instruction),
            0x10 => self.op_rfe(instruction),
            _ => self.op_illegal(instruction),
        }
    }

    /// MFC0: move from a COP0 register
    ///
    /// The value arrives through the load delay slot, like a memory load.
    ///
    /// Format: mfc0 rt, rd
    fn op_mfc0(&mut self, instruction: Instruction, inter: &Interconnect) -> Result<()> {
        let v = match instruction.rd() {
            // Breakpoint registers, unimplemented but probed by the BIOS
            3 | 5 | 6 | 7 | 9 | 11 => 0,
            // BadVaddr, not modeled
            8 => 0,
            12 => self.cop0.sr(),
            // The interrupt controller drives CAUSE bit 10 live
            13 => self.cop0.cause(inter.irq_pending()),
            14 => self.cop0.epc(),
            // Processor ID
            15 => 0x0000_0002,
            reg => {
                log::warn!("Read from unhandled COP0 register {}", reg);
                0
            }
        };

        self.delayed_load(instruction.rt(), v);

        Ok(())
    }

    /// MTC0: move to a COP0 register
    ///
    /// Format: mtc0 rt, rd
    fn op_mtc0(&mut self, instruction: Instruction) -> Result<()> {
        let v = self.reg(instruction.rt());

        match instruction.rd() {
            // Breakpoint registers: the BIOS zeroes them at boot, anything
            // else would arm hardware we don't emulate
            3 | 5 | 6 | 7 | 9 | 11 => {
                if v != 0 {
                    log::warn!(
                        "Nonzero write to COP0 breakpoint register {}: 0x{:08X}",
                        instruction.rd(),
                        v
                    );
                }
            }
            12 => self.cop0.set_sr(v),
            13 => self.cop0.set_cause(v),
            14 => {
                if v != 0 {
                    log::warn!("Nonzero write to EPC: 0x{:08X}", v);
                }
            }
            reg => log::warn!("Write to unhandled COP0 register {}: 0x{:08X}", reg, v),
        }

        Ok(())
    }

    /// RFE: return from exception
    ///
    /// Pops the interrupt-enable/user-mode stack. The only instruction in
    /// the "virtual memory" opcode space the R3000A implements.
    fn op_rfe(&mut self, instruction: Instruction) -> Result<()> {
        if instruction.0 & 0x3F != 0x10 {
            // The other TLB opcodes don't exist on this CPU
            return self.op_illegal(instruction);
        }

        self.cop0.return_from_exception();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::cpu::test_support::*;

    /// mtc0 rt, rd
    fn mtc0(rt: u8, rd: u8) -> u32 {
        (0x10 << 26) | (0x04 << 21) | ((rt as u32) << 16) | ((rd as u32) << 11)
    }

    /// mfc0 rt, rd
    fn mfc0(rt: u8, rd: u8) -> u32 {
        (0x10 << 26) | ((rt as u32) << 16) | ((rd as u32) << 11)
    }

    #[test]
    fn test_mtc0_mfc0_sr_roundtrip() {
        let mut t = TestCpu::new();

        t.load_program(&[
            lui(1, 0x1090),
            ori(1, 1, 0x0401), // IEc + IM2 on top of the boot value
            mtc0(1, 12),
            mfc0(2, 12),
            nop(),
        ]);
        t.step_n(5);

        assert_eq!(t.reg(2), 0x1090_0401);
    }

    #[test]
    fn test_mfc0_uses_load_delay() {
        let mut t = TestCpu::new();

        t.load_program(&[
            mfc0(2, 12),             // r2 <- SR (delayed)
            rtype(0x21, 2, 0, 3, 0), // addu r3, r2, r0 in the delay slot
            nop(),
        ]);
        t.step_n(3);

        assert_eq!(t.reg(3), 0, "delay slot sees the stale r2");
        assert_eq!(t.reg(2), 0x1090_0000, "value lands afterwards");
    }

    #[test]
    fn test_syscall_and_rfe_restore_mode() {
        let mut t = TestCpu::new();

        // Enable interrupts, trigger a syscall, then RFE from the handler
        t.load_program(&[
            addiu(1, 0, 0x0001),
            mtc0(1, 12),    // SR = IEc
            0x0000_000C,    // syscall
        ]);

        // Handler: rfe; nop
        t.inter.ram_mut().store32(0x80, (0x10 << 26) | (0x10 << 21) | 0x10);
        t.inter.ram_mut().store32(0x84, nop());

        t.step_n(3);

        // In the handler: interrupts disabled by the mode push
        assert_eq!(t.cpu.pc(), 0x8000_0080);

        t.step_n(2);

        // After RFE the pre-exception mode is back
        assert_eq!(t.cpu.cop0.sr() & 0x3F, 0x01, "IEc restored");
    }
}
