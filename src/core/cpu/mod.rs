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

//! CPU (MIPS R3000A) interpreter
//!
//! One call to [`Cpu::run_next_instruction`] emulates one instruction:
//!
//! 1. Peripherals are synchronized up to the current date
//! 2. A misaligned PC raises an address error
//! 3. The instruction is fetched, through the instruction cache when the
//!    region is cached and the cache is enabled
//! 4. The PC triad advances (`pc <- next_pc`), implementing the branch
//!    delay slot
//! 5. The pending load (if any) lands in the output register bank,
//!    implementing the load delay slot
//! 6. If an enabled interrupt is pending it preempts the instruction,
//!    otherwise the instruction executes
//! 7. The output bank is committed and becomes the next input bank
//!
//! Two register banks make the one-cycle load delay exact: instructions
//! read their operands from the input bank (which does not yet contain the
//! value loaded by the directly preceding load) and write their results to
//! the output bank.
//!
//! # Specifications
//! - Architecture: MIPS I (32-bit)
//! - Clock frequency: 33.8685 MHz
//! - Registers: 32 general-purpose registers + HI/LO

use crate::core::error::Result;
use crate::core::gte::Gte;
use crate::core::memory::Interconnect;
use crate::core::timing::TimeHandler;

mod cop0;
mod disassembler;
pub mod icache;
mod instruction;
mod instructions;

pub use cop0::ExceptionCause;
pub use disassembler::disassemble;
pub use instruction::Instruction;

use cop0::Cop0;
use icache::InstructionCache;

/// CPU state
pub struct Cpu {
    /// Address of the instruction currently being executed, used to set
    /// EPC on exceptions
    current_pc: u32,
    /// Program counter of the next fetch
    pc: u32,
    /// Fetch address after the next one, making the branch delay slot
    /// explicit
    next_pc: u32,
    /// Input register bank; r0 is hardwired to 0
    regs: [u32; 32],
    /// Output register bank: holds the results of the current instruction
    /// and becomes the input bank once it commits
    out_regs: [u32; 32],
    /// Pending load: (target register, value), applied before the next
    /// instruction executes
    load: (u8, u32),
    /// HI register: multiplication high half / division remainder
    hi: u32,
    /// LO register: multiplication low half / division quotient
    lo: u32,
    /// Set by any branch/jump; becomes `delay_slot` on the next step
    branch: bool,
    /// True while the current instruction sits in a branch delay slot
    delay_slot: bool,
    /// Coprocessor 0: exception handling
    cop0: Cop0,
    /// Coprocessor 2: geometry engine
    gte: Gte,
    /// Instruction cache
    icache: InstructionCache,
    /// Count of reserved-instruction exceptions taken, for diagnostics
    illegal_instructions: u64,
}

impl Cpu {
    /// Create a CPU in its reset state, ready to fetch the BIOS entry
    /// point
    ///
    /// # Example
    /// ```
    /// use psemu::core::cpu::Cpu;
    ///
    /// let cpu = Cpu::new();
    /// assert_eq!(cpu.pc(), 0xBFC0_0000);
    /// assert_eq!(cpu.reg(0), 0);
    /// ```
    pub fn new() -> Cpu {
        Cpu {
            current_pc: 0xBFC0_0000,
            pc: 0xBFC0_0000,
            next_pc: 0xBFC0_0004,
            regs: [0; 32],
            out_regs: [0; 32],
            load: (0, 0),
            hi: 0,
            lo: 0,
            branch: false,
            delay_slot: false,
            cop0: Cop0::new(),
            gte: Gte::new(),
            icache: InstructionCache::new(),
            illegal_instructions: 0,
        }
    }

    /// Current program counter
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Redirect execution, clearing any in-flight branch state
    ///
    /// Used when side-loading executables.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
        self.next_pc = pc.wrapping_add(4);
        self.current_pc = pc;
        self.branch = false;
        self.delay_slot = false;
    }

    /// Read a general purpose register from the input bank
    ///
    /// r0 always reads 0.
    #[inline(always)]
    pub fn reg(&self, index: u8) -> u32 {
        self.regs[index as usize]
    }

    /// Write a general purpose register in the output bank
    ///
    /// Writes to r0 are swallowed.
    #[inline(always)]
    fn set_reg(&mut self, index: u8, val: u32) {
        self.out_regs[index as usize] = val;

        // Much cheaper than branching on the index
        self.out_regs[0] = 0;
    }

    /// Schedule a delayed load: the value becomes visible to the
    /// instruction after the next one
    #[inline(always)]
    fn delayed_load(&mut self, index: u8, val: u32) {
        self.load = (index, val);
    }

    /// Number of reserved-instruction exceptions taken so far
    pub fn illegal_instruction_count(&self) -> u64 {
        self.illegal_instructions
    }

    /// Emulate one instruction
    pub fn run_next_instruction(
        &mut self,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        // Let the peripherals catch up with us
        inter.sync(th);

        let pc = self.pc;
        self.current_pc = pc;

        if pc % 4 != 0 {
            // PC is not correctly aligned
            self.exception(ExceptionCause::AddressErrorLoad);
            return Ok(());
        }

        let instruction = Instruction(self.fetch_instruction(inter, th)?);

        // Advance the pipeline: the instruction after this one is already
        // decided (branch delay slot)
        self.pc = self.next_pc;
        self.next_pc = self.next_pc.wrapping_add(4);

        // The pending load commits before the instruction executes
        let (reg, val) = self.load;
        self.set_reg(reg, val);
        self.load = (0, 0);

        // If the last instruction was a branch then we're in the delay
        // slot
        self.delay_slot = self.branch;
        self.branch = false;

        if self.cop0.irq_active(inter.irq_pending()) {
            self.exception(ExceptionCause::Interrupt);
        } else {
            self.decode_and_execute(instruction, inter, th)?;
        }

        // The output bank becomes the input bank of the next instruction
        self.regs = self.out_regs;

        Ok(())
    }

    /// Fetch the instruction at `current_pc` through the instruction
    /// cache
    fn fetch_instruction(&mut self, inter: &mut Interconnect, th: &mut TimeHandler) -> Result<u32> {
        let pc = self.current_pc;

        // KSEG1 is the uncached mirror; everything below is cached
        let cached = pc < 0xA000_0000;

        if cached && inter.cache_enabled() {
            let line = self.icache.line(pc);

            let tag = pc & 0xFFFF_F000;
            let index = (pc >> 2) & 3;

            if line.tag() != tag || line.valid_index() > index {
                // Cache miss: the prefetcher refills from the missed word
                // to the end of the line
                th.tick(3);

                let mut cpc = pc;

                for i in index..4 {
                    th.tick(1);

                    let instruction = inter.load_instruction(cpc)?;
                    line.set_instruction(i, instruction);

                    cpc = cpc.wrapping_add(4);
                }

                line.set_tag_valid(pc);
            } else {
                // Cache hits still cost one cycle
                th.tick(1);
            }

            Ok(line.instruction(index))
        } else {
            // Uncached fetch pays the full memory latency
            th.tick(4);

            inter.load_instruction(pc)
        }
    }

    /// Take an exception: COP0 records the context and the PC jumps to the
    /// handler without a delay slot
    pub(crate) fn exception(&mut self, cause: ExceptionCause) {
        let handler = self
            .cop0
            .enter_exception(cause, self.current_pc, self.delay_slot);

        log::debug!(
            "Exception {:?} at 0x{:08X} -> handler 0x{:08X}",
            cause,
            self.current_pc,
            handler
        );

        self.pc = handler;
        self.next_pc = handler.wrapping_add(4);
    }

    /// Record a branch to `offset` (in words, relative to the delay slot)
    fn branch(&mut self, offset: u32) {
        let offset = offset << 2;

        // `pc` already points at the delay slot
        self.next_pc = self.pc.wrapping_add(offset);
        self.branch = true;
    }

    /// Decode `instruction` and run it
    fn decode_and_execute(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        match instruction.function() {
            0x00 => match instruction.subfunction() {
                0x00 => self.op_sll(instruction),
                0x02 => self.op_srl(instruction),
                0x03 => self.op_sra(instruction),
                0x04 => self.op_sllv(instruction),
                0x06 => self.op_srlv(instruction),
                0x07 => self.op_srav(instruction),
                0x08 => self.op_jr(instruction),
                0x09 => self.op_jalr(instruction),
                0x0C => self.op_syscall(instruction),
                0x0D => self.op_break(instruction),
                0x10 => self.op_mfhi(instruction),
                0x11 => self.op_mthi(instruction),
                0x12 => self.op_mflo(instruction),
                0x13 => self.op_mtlo(instruction),
                0x18 => self.op_mult(instruction),
                0x19 => self.op_multu(instruction),
                0x1A => self.op_div(instruction),
                0x1B => self.op_divu(instruction),
                0x20 => self.op_add(instruction),
                0x21 => self.op_addu(instruction),
                0x22 => self.op_sub(instruction),
                0x23 => self.op_subu(instruction),
                0x24 => self.op_and(instruction),
                0x25 => self.op_or(instruction),
                0x26 => self.op_xor(instruction),
                0x27 => self.op_nor(instruction),
                0x2A => self.op_slt(instruction),
                0x2B => self.op_sltu(instruction),
                _ => self.op_illegal(instruction),
            },
            0x01 => self.op_bxx(instruction),
            0x02 => self.op_j(instruction),
            0x03 => self.op_jal(instruction),
            0x04 => self.op_beq(instruction),
            0x05 => self.op_bne(instruction),
            0x06 => self.op_blez(instruction),
            0x07 => self.op_bgtz(instruction),
            0x08 => self.op_addi(instruction),
            0x09 => self.op_addiu(instruction),
            0x0A => self.op_slti(instruction),
            0x0B => self.op_sltiu(instruction),
            0x0C => self.op_andi(instruction),
            0x0D => self.op_ori(instruction),
            0x0E => self.op_xori(instruction),
            0x0F => self.op_lui(instruction),
            0x10 => self.op_cop0(instruction, inter),
            0x11 => self.op_cop1(instruction),
            0x12 => self.op_cop2(instruction),
            0x13 => self.op_cop3(instruction),
            0x20 => self.op_lb(instruction, inter, th),
            0x21 => self.op_lh(instruction, inter, th),
            0x22 => self.op_lwl(instruction, inter, th),
            0x23 => self.op_lw(instruction, inter, th),
            0x24 => self.op_lbu(instruction, inter, th),
            0x25 => self.op_lhu(instruction, inter, th),
            0x26 => self.op_lwr(instruction, inter, th),
            0x28 => self.op_sb(instruction, inter, th),
            0x29 => self.op_sh(instruction, inter, th),
            0x2A => self.op_swl(instruction, inter, th),
            0x2B => self.op_sw(instruction, inter, th),
            0x2E => self.op_swr(instruction, inter, th),
            0x30 => self.op_lwc0(instruction),
            0x31 => self.op_lwc1(instruction),
            0x32 => self.op_lwc2(instruction, inter, th),
            0x33 => self.op_lwc3(instruction),
            0x38 => self.op_swc0(instruction),
            0x39 => self.op_swc1(instruction),
            0x3A => self.op_swc2(instruction, inter, th),
            0x3B => self.op_swc3(instruction),
            _ => self.op_illegal(instruction),
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    // ========== Pipeline Tests ==========

    #[test]
    fn test_reset_vector() {
        let cpu = Cpu::new();

        assert_eq!(cpu.pc(), 0xBFC0_0000);
    }

    #[test]
    fn test_r0_always_reads_zero() {
        let mut t = TestCpu::new();

        // addiu r0, r0, 0xFFFF; addiu r1, r0, 5
        t.load_program(&[addiu(0, 0, 0xFFFF), addiu(1, 0, 5)]);
        t.step_n(2);

        assert_eq!(t.reg(0), 0, "writes to r0 are swallowed");
        assert_eq!(t.reg(1), 5, "r0 reads back 0 as an operand");
    }

    #[test]
    fn test_sequential_pc_advance() {
        let mut t = TestCpu::new();

        t.load_program(&[nop(), nop(), nop()]);

        assert_eq!(t.cpu.pc(), 0);
        t.step();
        assert_eq!(t.cpu.pc(), 4);
        t.step();
        assert_eq!(t.cpu.pc(), 8);
    }

    #[test]
    fn test_load_delay_slot() {
        let mut t = TestCpu::new();

        // Store a marker in RAM, then:
        //   lw r2, 0x100(r0)
        //   addu r3, r2, r0   <- delay slot: must see the OLD r2
        //   addu r4, r2, r0   <- must see the loaded value
        t.inter.ram_mut().store32(0x100, 0xABCD_1234);

        t.load_program(&[
            itype(0x23, 0, 2, 0x100),
            rtype(0x21, 2, 0, 3, 0),
            rtype(0x21, 2, 0, 4, 0),
        ]);

        t.step_n(3);

        assert_eq!(t.reg(3), 0, "load delay slot sees the previous value");
        assert_eq!(t.reg(4), 0xABCD_1234, "value visible one instruction later");
    }

    #[test]
    fn test_load_delay_cancelled_by_write() {
        let mut t = TestCpu::new();

        // lw r2, 0x100(r0); addiu r2, r0, 7
        // The direct write in the delay slot must win over the load
        t.inter.ram_mut().store32(0x100, 0xABCD_1234);

        t.load_program(&[itype(0x23, 0, 2, 0x100), addiu(2, 0, 7), nop()]);

        t.step_n(3);

        assert_eq!(t.reg(2), 7, "the later write overrides the delayed load");
    }

    #[test]
    fn test_branch_delay_slot_executes() {
        let mut t = TestCpu::new();

        // beq r0, r0, +2 (to index 3); addiu r1, r0, 1 (delay slot);
        // addiu r2, r0, 2 (skipped); addiu r3, r0, 3 (branch target)
        t.load_program(&[
            itype(0x04, 0, 0, 2),
            addiu(1, 0, 1),
            addiu(2, 0, 2),
            addiu(3, 0, 3),
        ]);

        t.step_n(3);

        assert_eq!(t.reg(1), 1, "delay slot executed");
        assert_eq!(t.reg(2), 0, "branched-over instruction skipped");
        assert_eq!(t.reg(3), 3, "branch target executed");
    }

    #[test]
    fn test_misaligned_pc_raises_address_error() {
        let mut t = TestCpu::new();

        t.cpu.set_pc(0x102);
        t.step();

        // The reset SR has BEV clear, so the handler lives in RAM
        assert_eq!(t.cpu.pc(), 0x8000_0080);
        assert_eq!(t.cpu.cop0.epc(), 0x102);
    }

    #[test]
    fn test_epc_adjusts_for_delay_slot() {
        let mut t = TestCpu::new();

        // beq r0, r0, 0 with a BREAK in the delay slot
        t.load_program(&[itype(0x04, 0, 0, 0), 0x0000_000D, nop()]);

        t.step_n(2);

        assert_eq!(t.cpu.cop0.epc(), 0, "EPC points at the branch");
        assert_eq!(
            t.cpu.cop0.cause(false) >> 31,
            1,
            "CAUSE bit 31 flags the delay slot"
        );
    }

    // ========== Instruction Cache Tests ==========

    #[test]
    fn test_cached_fetch_survives_ram_change() {
        let mut t = TestCpu::new();

        // Enable the instruction cache
        let mut th = TimeHandler::new();
        t.inter.store32(&mut th, 0xFFFE_0130, 0x800).unwrap();

        // Run a first pass so the line is cached
        t.load_program(&[addiu(1, 0, 1), nop(), nop(), nop()]);
        t.step_n(4);

        // Overwrite the instruction in RAM, run the same address again
        t.inter.ram_mut().store32(0, addiu(1, 0, 2));
        t.cpu.set_pc(0);
        t.step();

        assert_eq!(t.reg(1), 1, "stale cached instruction executed");
    }

    #[test]
    fn test_uncached_region_bypasses_cache() {
        let mut t = TestCpu::new();

        let mut th = TimeHandler::new();
        t.inter.store32(&mut th, 0xFFFE_0130, 0x800).unwrap();

        // Execute from the KSEG1 mirror
        t.inter.ram_mut().store32(0, addiu(1, 0, 1));
        t.cpu.set_pc(0xA000_0000);
        t.step();

        t.inter.ram_mut().store32(0, addiu(1, 0, 2));
        t.cpu.set_pc(0xA000_0000);
        t.step();

        assert_eq!(t.reg(1), 2, "uncached fetches always hit memory");
    }

    #[test]
    fn test_isolated_store_invalidates_cache_line() {
        let mut t = TestCpu::new();

        let mut th = TimeHandler::new();
        // Cache enabled, tag-test mode
        t.inter.store32(&mut th, 0xFFFE_0130, 0x804).unwrap();

        // Cache the line at 0
        t.load_program(&[addiu(1, 0, 1), nop(), nop(), nop()]);
        t.step_n(4);

        // Isolate the cache (SR bit 16) and store to address 0: the write
        // must invalidate the cache line, not touch RAM. The isolation
        // program runs from the uncached KSEG1 mirror so it doesn't fight
        // for cache lines itself.
        let isolate = [
            lui(2, 0x0001),                                   // r2 = 0x10000 (IsC)
            0x4082_6000,                                      // mtc0 r2, SR
            itype(0x2B, 0, 0, 0),                             // sw r0, 0(r0)
        ];

        for (i, &word) in isolate.iter().enumerate() {
            t.inter.ram_mut().store32(0x200 + (i * 4) as u32, word);
        }
        t.cpu.set_pc(0xA000_0200);
        t.step_n(3);

        // RAM untouched: address 0 still holds the first program's word
        assert_eq!(t.inter.ram_mut().load32(0), addiu(1, 0, 1));

        // The cached line at index 0 must now miss
        assert!(t.cpu.icache.line(0).valid_index() > 3);
    }

    #[test]
    fn test_illegal_instruction_counter() {
        let mut t = TestCpu::new();

        t.load_program(&[0xFC00_0000, nop()]);
        t.step();

        assert_eq!(t.cpu.illegal_instruction_count(), 1);
    }
}
