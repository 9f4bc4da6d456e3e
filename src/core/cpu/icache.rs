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

//! Instruction cache for the MIPS R3000A CPU
//!
//! The CPU has a 4KB instruction cache organized as 256 direct-mapped
//! lines of four words each:
//!
//! ```text
//! Address format (32 bits):
//! [31:12] Tag (20 bits)   - identifies which address is cached
//! [11:4]  Line (8 bits)   - selects one of the 256 cache lines
//! [3:2]   Word (2 bits)   - selects a word within the line
//! ```
//!
//! Instead of one valid bit per word, a line carries a *valid index*: the
//! first word index that holds valid data. A fetch hits when the tag
//! matches and the fetched word's index is at or past the valid index; a
//! refill only fills from the missed word through the end of the line,
//! which is exactly what the hardware prefetcher does. An invalidated line
//! has a valid index above 3 so every word misses.
//!
//! The tag and the valid index share one register: tag in bits [31:12],
//! valid index in bits [4:2].

/// A single 4-word instruction cache line
#[derive(Debug, Clone, Copy)]
pub struct ICacheLine {
    /// Tag (bits [31:12]) and first valid word index (bits [4:2])
    tag_valid: u32,
    /// Four words of cached instructions
    line: [u32; 4],
}

impl ICacheLine {
    fn new() -> ICacheLine {
        ICacheLine {
            // Tag 0 with all words invalid
            tag_valid: 0x10,
            // BREAK opcodes: if something ever slips through the valid
            // index check we'll hear about it
            line: [0x0000_000D; 4],
        }
    }

    /// Cached tag of this line
    pub fn tag(&self) -> u32 {
        self.tag_valid & 0xFFFF_F000
    }

    /// Index of the first valid word; values above 3 mean nothing is
    /// valid
    pub fn valid_index(&self) -> u32 {
        (self.tag_valid >> 2) & 0x7
    }

    /// Set the tag and the valid index from a fetch address
    pub fn set_tag_valid(&mut self, pc: u32) {
        self.tag_valid = pc & 0xFFFF_F00C;
    }

    /// Invalidate the whole line by pushing the valid index out of range
    pub fn invalidate(&mut self) {
        self.tag_valid |= 0x10;
    }

    /// Cached instruction word at `index`
    pub fn instruction(&self, index: u32) -> u32 {
        self.line[index as usize]
    }

    /// Plant an instruction word at `index`
    pub fn set_instruction(&mut self, index: u32, instruction: u32) {
        self.line[index as usize] = instruction;
    }
}

/// The 256-line instruction cache
pub struct InstructionCache {
    lines: [ICacheLine; 256],
}

impl InstructionCache {
    /// Create a cache with every line invalid
    pub fn new() -> InstructionCache {
        InstructionCache {
            lines: [ICacheLine::new(); 256],
        }
    }

    /// The cache line for address `pc`
    #[inline(always)]
    pub fn line(&mut self, pc: u32) -> &mut ICacheLine {
        &mut self.lines[((pc >> 4) & 0xFF) as usize]
    }
}

impl Default for InstructionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lines_are_invalid() {
        let mut cache = InstructionCache::new();

        let line = cache.line(0);

        assert!(line.valid_index() > 3, "all word indices must miss");
    }

    #[test]
    fn test_tag_and_valid_index_encoding() {
        let mut cache = InstructionCache::new();

        let pc = 0x0001_2348; // tag 0x12000, line 0x34, word 2
        let line = cache.line(pc);

        line.set_tag_valid(pc);

        assert_eq!(line.tag(), 0x0001_2000);
        assert_eq!(line.valid_index(), 2);
    }

    #[test]
    fn test_invalidate_pushes_valid_index_out() {
        let mut cache = InstructionCache::new();

        let line = cache.line(0x100);
        line.set_tag_valid(0x100);
        assert_eq!(line.valid_index(), 0);

        line.invalidate();

        assert!(line.valid_index() > 3);
    }

    #[test]
    fn test_line_selection() {
        let mut cache = InstructionCache::new();

        cache.line(0x0000_0100).set_instruction(0, 0xAAAA_AAAA);

        // Same line index, different word
        assert_eq!(cache.line(0x0000_0104).instruction(0), 0xAAAA_AAAA);

        // Next line
        cache.line(0x0000_0110).set_instruction(0, 0xBBBB_BBBB);
        assert_eq!(cache.line(0x0000_0100).instruction(0), 0xAAAA_AAAA);
    }

    #[test]
    fn test_word_storage() {
        let mut cache = InstructionCache::new();

        let line = cache.line(0);

        for i in 0..4 {
            line.set_instruction(i, 0x1000 + i);
        }

        for i in 0..4 {
            assert_eq!(line.instruction(i), 0x1000 + i);
        }
    }
}
