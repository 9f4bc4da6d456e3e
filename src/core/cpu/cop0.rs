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

//! Coprocessor 0 (System Control)
//!
//! COP0 handles exception entry and return, the interrupt gate and the
//! cache isolation bit. Only the three registers the exception model needs
//! are stateful: SR (status), CAUSE and EPC; the breakpoint registers
//! accept writes of zero and read back zero.

/// Exception cause codes for the MIPS R3000A
///
/// These are the values stored in bits [6:2] of the CAUSE register when an
/// exception is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ExceptionCause {
    /// External or software interrupt
    Interrupt = 0x0,
    /// Address error on load (also misaligned instruction fetch)
    AddressErrorLoad = 0x4,
    /// Address error on store
    AddressErrorStore = 0x5,
    /// Syscall instruction executed
    Syscall = 0x8,
    /// Breakpoint instruction executed
    Breakpoint = 0x9,
    /// Reserved or illegal instruction
    ReservedInstruction = 0xA,
    /// Access to a missing coprocessor
    CoprocessorUnusable = 0xB,
    /// Signed arithmetic overflow
    Overflow = 0xC,
}

/// Coprocessor 0: status, cause and exception PC
pub(super) struct Cop0 {
    /// Status register (SR)
    sr: u32,
    /// Cause register: exception code, pending interrupts, delay slot bit
    cause: u32,
    /// Exception PC: address of the faulting instruction
    epc: u32,
}

impl Cop0 {
    /// Create COP0 in its reset state
    ///
    /// SR powers up to 0x10900000: COP0 usable, boot exception vectors
    /// mapped, interrupts disabled.
    pub(super) fn new() -> Cop0 {
        Cop0 {
            sr: 0x1090_0000,
            cause: 0,
            epc: 0,
        }
    }

    /// Read the status register
    pub(super) fn sr(&self) -> u32 {
        self.sr
    }

    /// Write the status register
    pub(super) fn set_sr(&mut self, val: u32) {
        self.sr = val;
    }

    /// Read the CAUSE register
    ///
    /// Bit 10 mirrors the external interrupt line driven by the interrupt
    /// controller.
    pub(super) fn cause(&self, irq_pending: bool) -> u32 {
        self.cause | ((irq_pending as u32) << 10)
    }

    /// Write the CAUSE register: only the two software interrupt bits are
    /// writable
    pub(super) fn set_cause(&mut self, val: u32) {
        self.cause &= !0x300;
        self.cause |= val & 0x300;
    }

    /// Read the exception PC
    pub(super) fn epc(&self) -> u32 {
        self.epc
    }

    /// True when the cache is isolated: stores are redirected into the
    /// instruction cache instead of memory
    pub(super) fn cache_isolated(&self) -> bool {
        self.sr & 0x10000 != 0
    }

    /// True when an enabled interrupt is pending
    ///
    /// Combines the external line (CAUSE bit 10), the software interrupt
    /// bits (CAUSE [9:8]) and the matching SR mask bits with the master
    /// interrupt enable.
    pub(super) fn irq_active(&self, irq_pending: bool) -> bool {
        let cause = self.cause(irq_pending);

        // Bits [9:8] are the software interrupts, bit 10 the hardware
        // interrupt; the matching SR bits mask them individually
        let pending = (cause & self.sr) & 0x700;

        let irq_enabled = self.sr & 1 != 0;

        irq_enabled && pending != 0
    }

    /// Enter an exception, returning the handler address
    ///
    /// Shifts the interrupt-enable/user-mode stack two bits left (entering
    /// kernel mode with interrupts disabled), records the cause code with a
    /// read-modify-write and latches EPC. When the faulting instruction sat
    /// in a branch delay slot, EPC points at the branch and CAUSE bit 31 is
    /// set.
    pub(super) fn enter_exception(
        &mut self,
        cause: ExceptionCause,
        pc: u32,
        in_delay_slot: bool,
    ) -> u32 {
        // Push the mode stack
        let mode = self.sr & 0x3F;
        self.sr &= !0x3F;
        self.sr |= (mode << 2) & 0x3F;

        // Update the cause code without touching the other bits
        self.cause &= !0x7C;
        self.cause |= (cause as u32) << 2;

        if in_delay_slot {
            self.epc = pc.wrapping_sub(4);
            self.cause |= 1 << 31;
        } else {
            self.epc = pc;
            self.cause &= !(1 << 31);
        }

        // SR.BEV selects between the boot and RAM exception vectors
        if self.sr & (1 << 22) != 0 {
            0xBFC0_0180
        } else {
            0x8000_0080
        }
    }

    /// Return from exception (RFE): pop the mode stack
    ///
    /// The third stack entry keeps its value.
    pub(super) fn return_from_exception(&mut self) {
        let mode = self.sr & 0x3F;

        self.sr &= !0xF;
        self.sr |= mode >> 2;
    }
}
