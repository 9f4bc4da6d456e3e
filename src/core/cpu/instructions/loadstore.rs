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
    // === Load / Store Instructions ===
    //
    // Loads land in the pending-load slot and become visible one
    // instruction later; stores go straight to the interconnect unless the
    // cache is isolated.

    /// LB: load sign-extended byte
    ///
    /// Format: lb rt, offset(rs)
    pub(crate) fn op_lb(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        let v = inter.load8(th, addr)? as i8;

        self.delayed_load(instruction.rt(), v as u32);

        Ok(())
    }

    /// LBU: load zero-extended byte
    ///
    /// Format: lbu rt, offset(rs)
    pub(crate) fn op_lbu(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        let v = inter.load8(th, addr)?;

        self.delayed_load(instruction.rt(), v as u32);

        Ok(())
    }

    /// LH: load sign-extended halfword
    ///
    /// Format: lh rt, offset(rs)
    pub(crate) fn op_lh(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        if addr % 2 == 0 {
            let v = inter.load16(th, addr)? as i16;

            self.delayed_load(instruction.rt(), v as u32);
        } else {
            self.exception(ExceptionCause::AddressErrorLoad);
        }

        Ok(())
    }

    /// LHU: load zero-extended halfword
    ///
    /// Format: lhu rt, offset(rs)
    pub(crate) fn op_lhu(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        if addr % 2 == 0 {
            let v = inter.load16(th, addr)?;

            self.delayed_load(instruction.rt(), v as u32);
        } else {
            self.exception(ExceptionCause::AddressErrorLoad);
        }

        Ok(())
    }

    /// LW: load word
    ///
    /// Format: lw rt, offset(rs)
    pub(crate) fn op_lw(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        if addr % 4 == 0 {
            let v = inter.load32(th, addr)?;

            self.delayed_load(instruction.rt(), v);
        } else {
            self.exception(ExceptionCause::AddressErrorLoad);
        }

        Ok(())
    }

    /// LWL: load word left (unaligned load, high bytes)
    ///
    /// Merges the high part of an unaligned word into the target
    /// register. Pairs with LWR; the pair can observe a still-pending load
    /// of the same register, so the merge source is the output bank.
    ///
    /// Format: lwl rt, offset(rs)
    pub(crate) fn op_lwl(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        let aligned_addr = addr & !3;
        let aligned_word = inter.load32(th, aligned_addr)?;

        let cur_v = self.out_regs[instruction.rt() as usize];

        let v = match addr & 3 {
            0 => (cur_v & 0x00FF_FFFF) | (aligned_word << 24),
            1 => (cur_v & 0x0000_FFFF) | (aligned_word << 16),
            2 => (cur_v & 0x0000_00FF) | (aligned_word << 8),
            3 => aligned_word,
            _ => unreachable!(),
        };

        self.delayed_load(instruction.rt(), v);

        Ok(())
    }

    /// LWR: load word right (unaligned load, low bytes)
    ///
    /// Format: lwr rt, offset(rs)
    pub(crate) fn op_lwr(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        let aligned_addr = addr & !3;
        let aligned_word = inter.load32(th, aligned_addr)?;

        let cur_v = self.out_regs[instruction.rt() as usize];

        let v = match addr & 3 {
            0 => aligned_word,
            1 => (cur_v & 0xFF00_0000) | (aligned_word >> 8),
            2 => (cur_v & 0xFFFF_0000) | (aligned_word >> 16),
            3 => (cur_v & 0xFFFF_FF00) | (aligned_word >> 24),
            _ => unreachable!(),
        };

        self.delayed_load(instruction.rt(), v);

        Ok(())
    }

    /// SB: store byte
    ///
    /// Format: sb rt, offset(rs)
    pub(crate) fn op_sb(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        if self.cop0.cache_isolated() {
            log::trace!("Byte store with isolated cache (ignored)");
            return Ok(());
        }

        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());
        let v = self.reg(instruction.rt());

        inter.store8(th, addr, v as u8)
    }

    /// SH: store halfword
    ///
    /// Format: sh rt, offset(rs)
    pub(crate) fn op_sh(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        if self.cop0.cache_isolated() {
            log::trace!("Halfword store with isolated cache (ignored)");
            return Ok(());
        }

        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        if addr % 2 == 0 {
            let v = self.reg(instruction.rt());

            inter.store16(th, addr, v as u16)?;
        } else {
            self.exception(ExceptionCause::AddressErrorStore);
        }

        Ok(())
    }

    /// SW: store word
    ///
    /// With the cache isolated the store is redirected into the
    /// instruction cache (tag invalidation or direct word plant depending
    /// on the cache control mode) and never reaches memory.
    ///
    /// Format: sw rt, offset(rs)
    pub(crate) fn op_sw(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());

        if addr % 4 == 0 {
            let v = self.reg(instruction.rt());

            if self.cop0.cache_isolated() {
                self.cache_maintenance(inter, addr, v);
            } else {
                inter.store32(th, addr, v)?;
            }
        } else {
            self.exception(ExceptionCause::AddressErrorStore);
        }

        Ok(())
    }

    /// SWL: store word left (unaligned store, high bytes)
    ///
    /// Format: swl rt, offset(rs)
    pub(crate) fn op_swl(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());
        let v = self.reg(instruction.rt());

        let aligned_addr = addr & !3;
        let cur = inter.load32(th, aligned_addr)?;

        let new = match addr & 3 {
            0 => (cur & 0xFFFF_FF00) | (v >> 24),
            1 => (cur & 0xFFFF_0000) | (v >> 16),
            2 => (cur & 0xFF00_0000) | (v >> 8),
            3 => v,
            _ => unreachable!(),
        };

        inter.store32(th, aligned_addr, new)
    }

    /// SWR: store word right (unaligned store, low bytes)
    ///
    /// Format: swr rt, offset(rs)
    pub(crate) fn op_swr(
        &mut self,
        instruction: Instruction,
        inter: &mut Interconnect,
        th: &mut TimeHandler,
    ) -> Result<()> {
        let addr = self.reg(instruction.rs()).wrapping_add(instruction.imm_se());
        let v = self.reg(instruction.rt());

        let aligned_addr = addr & !3;
        let cur = inter.load32(th, aligned_addr)?;

        let new = match addr & 3 {
            0 => v,
            1 => (cur & 0x0000_00FF) | (v << 8),
            2 => (cur & 0x0000_FFFF) | (v << 16),
            3 => (cur & 0x00FF_FFFF) | (v << 24),
            _ => unreachable!(),
        };

        inter.store32(th, aligned_addr, new)
    }

    /// Isolated-cache store: maintain the instruction cache instead of
    /// writing memory
    fn cache_maintenance(&mut self, inter: &Interconnect, addr: u32, val: u32) {
        if !inter.cache_enabled() {
            log::warn!("Cache maintenance while the cache is disabled");
        }

        let line = self.icache.line(addr);

        if inter.tag_test_mode() {
            // Tag test mode: the write invalidates the whole line
            line.invalidate();
        } else {
            // Otherwise the word is planted directly in the line
            let index = (addr >> 2) & 3;

            line.set_instruction(index, val);
        }
    }
}
