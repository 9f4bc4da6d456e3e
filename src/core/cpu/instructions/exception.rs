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

use super::super::{disassemble, Cpu, ExceptionCause, Instruction};
use crate::core::error::Result;

impl Cpu {
    // === Trap Instructions ===

    /// SYSCALL: system call trap
    pub(crate) fn op_syscall(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::Syscall);

        Ok(())
    }

    /// BREAK: breakpoint trap
    pub(crate) fn op_break(&mut self, _instruction: Instruction) -> Result<()> {
        self.exception(ExceptionCause::Breakpoint);

        Ok(())
    }

    /// Reserved or malformed encodings trap as illegal instructions
    pub(crate) fn op_illegal(&mut self, instruction: Instruction) -> Result<()> {
        self.illegal_instructions += 1;

        log::warn!(
            "Illegal instruction 0x{:08X} ({}) at 0x{:08X}",
            instruction.0,
            disassemble(instruction),
            self.current_pc
        );

        self.exception(ExceptionCause::ReservedInstruction);

        Ok(())
    }
}
