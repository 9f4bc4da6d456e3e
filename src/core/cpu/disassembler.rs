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

//! MIPS disassembler
//!
//! Renders instruction words as human-readable mnemonics for the CLI trace
//! mode and the interpreter's diagnostics. Registers use their ABI names.

use super::instruction::Instruction;

/// ABI names of the general purpose registers
const REGISTER_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

/// ABI name of register `index`
fn reg(index: u8) -> &'static str {
    REGISTER_NAMES[index as usize]
}

/// Render one instruction as a mnemonic string
pub fn disassemble(instruction: Instruction) -> String {
    let i = instruction;

    match i.function() {
        0x00 => disassemble_rtype(i),
        0x01 => {
            let op = match (i.0 >> 16) & 0x1F {
                0x00 => "bltz",
                0x01 => "bgez",
                0x10 => "bltzal",
                0x11 => "bgezal",
                _ => "b??",
            };
            format!("{} ${}, {}", op, reg(i.rs()), i.imm_se() as i32)
        }
        0x02 => format!("j 0x{:07X}", i.imm_jump() << 2),
        0x03 => format!("jal 0x{:07X}", i.imm_jump() << 2),
        0x04 => format!("beq ${}, ${}, {}", reg(i.rs()), reg(i.rt()), i.imm_se() as i32),
        0x05 => format!("bne ${}, ${}, {}", reg(i.rs()), reg(i.rt()), i.imm_se() as i32),
        0x06 => format!("blez ${}, {}", reg(i.rs()), i.imm_se() as i32),
        0x07 => format!("bgtz ${}, {}", reg(i.rs()), i.imm_se() as i32),
        0x08 => format!("addi ${}, ${}, {}", reg(i.rt()), reg(i.rs()), i.imm_se() as i32),
        0x09 => format!("addiu ${}, ${}, {}", reg(i.rt()), reg(i.rs()), i.imm_se() as i32),
        0x0A => format!("slti ${}, ${}, {}", reg(i.rt()), reg(i.rs()), i.imm_se() as i32),
        0x0B => format!("sltiu ${}, ${}, {}", reg(i.rt()), reg(i.rs()), i.imm_se() as i32),
        0x0C => format!("andi ${}, ${}, 0x{:04X}", reg(i.rt()), reg(i.rs()), i.imm()),
        0x0D => format!("ori ${}, ${}, 0x{:04X}", reg(i.rt()), reg(i.rs()), i.imm()),
        0x0E => format!("xori ${}, ${}, 0x{:04X}", reg(i.rt()), reg(i.rs()), i.imm()),
        0x0F => format!("lui ${}, 0x{:04X}", reg(i.rt()), i.imm()),
        0x10 => disassemble_cop0(i),
        0x11 => "cop1 (none)".to_string(),
        0x12 => disassemble_cop2(i),
        0x13 => "cop3 (none)".to_string(),
        0x20 => mem_op("lb", i),
        0x21 => mem_op("lh", i),
        0x22 => mem_op("lwl", i),
        0x23 => mem_op("lw", i),
        0x24 => mem_op("lbu", i),
        0x25 => mem_op("lhu", i),
        0x26 => mem_op("lwr", i),
        0x28 => mem_op("sb", i),
        0x29 => mem_op("sh", i),
        0x2A => mem_op("swl", i),
        0x2B => mem_op("sw", i),
        0x2E => mem_op("swr", i),
        0x30 => mem_op("lwc0", i),
        0x31 => mem_op("lwc1", i),
        0x32 => mem_op("lwc2", i),
        0x33 => mem_op("lwc3", i),
        0x38 => mem_op("swc0", i),
        0x39 => mem_op("swc1", i),
        0x3A => mem_op("swc2", i),
        0x3B => mem_op("swc3", i),
        _ => format!("!UNKNOWN! 0x{:08X}", i.0),
    }
}

/// Render a load/store: `op $rt, offset($rs)`
fn mem_op(op: &str, i: Instruction) -> String {
    format!(
        "{} ${}, {}(${})",
        op,
        reg(i.rt()),
        i.imm_se() as i32,
        reg(i.rs())
    )
}

fn disassemble_rtype(i: Instruction) -> String {
    match i.subfunction() {
        0x00 => {
            if i.0 == 0 {
                "nop".to_string()
            } else {
                format!("sll ${}, ${}, {}", reg(i.rd()), reg(i.rt()), i.shift())
            }
        }
        0x02 => format!("srl ${}, ${}, {}", reg(i.rd()), reg(i.rt()), i.shift()),
        0x03 => format!("sra ${}, ${}, {}", reg(i.rd()), reg(i.rt()), i.shift()),
        0x04 => format!("sllv ${}, ${}, ${}", reg(i.rd()), reg(i.rt()), reg(i.rs())),
        0x06 => format!("srlv ${}, ${}, ${}", reg(i.rd()), reg(i.rt()), reg(i.rs())),
        0x07 => format!("srav ${}, ${}, ${}", reg(i.rd()), reg(i.rt()), reg(i.rs())),
        0x08 => format!("jr ${}", reg(i.rs())),
        0x09 => format!("jalr ${}, ${}", reg(i.rd()), reg(i.rs())),
        0x0C => "syscall".to_string(),
        0x0D => "break".to_string(),
        0x10 => format!("mfhi ${}", reg(i.rd())),
        0x11 => format!("mthi ${}", reg(i.rs())),
        0x12 => format!("mflo ${}", reg(i.rd())),
        0x13 => format!("mtlo ${}", reg(i.rs())),
        0x18 => format!("mult ${}, ${}", reg(i.rs()), reg(i.rt())),
        0x19 => format!("multu ${}, ${}", reg(i.rs()), reg(i.rt())),
        0x1A => format!("div ${}, ${}", reg(i.rs()), reg(i.rt())),
        0x1B => format!("divu ${}, ${}", reg(i.rs()), reg(i.rt())),
        0x20 => format!("add ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x21 => format!("addu ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x22 => format!("sub ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x23 => format!("subu ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x24 => format!("and ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x25 => format!("or ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x26 => format!("xor ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x27 => format!("nor ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x2A => format!("slt ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        0x2B => format!("sltu ${}, ${}, ${}", reg(i.rd()), reg(i.rs()), reg(i.rt())),
        _ => format!("!UNKNOWN! 0x{:08X}", i.0),
    }
}

fn disassemble_cop0(i: Instruction) -> String {
    match i.cop_opcode() {
        0x00 => format!("mfc0 ${}, cop0_{}", reg(i.rt()), i.rd()),
        0x04 => format!("mtc0 ${}, cop0_{}", reg(i.rt()), i.rd()),
        0x10 => "rfe".to_string(),
        _ => format!("!COP0! 0x{:08X}", i.0),
    }
}

fn disassemble_cop2(i: Instruction) -> String {
    if i.cop_opcode() & 0x10 != 0 {
        return format!("gte 0x{:07X}", i.0 & 0x1FF_FFFF);
    }

    match i.cop_opcode() {
        0x00 => format!("mfc2 ${}, gte_d{}", reg(i.rt()), i.rd()),
        0x02 => format!("cfc2 ${}, gte_c{}", reg(i.rt()), i.rd()),
        0x04 => format!("mtc2 ${}, gte_d{}", reg(i.rt()), i.rd()),
        0x06 => format!("ctc2 ${}, gte_c{}", reg(i.rt()), i.rd()),
        _ => format!("!COP2! 0x{:08X}", i.0),
    }
}
