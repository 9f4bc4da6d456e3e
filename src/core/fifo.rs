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

//! Fixed 16-byte hardware FIFO
//!
//! The CD-ROM controller's parameter and response queues are 16-byte
//! hardware FIFOs whose full/empty distinction is visible through the status
//! register. The indices carry one extra wrap bit so that a full FIFO
//! (`write == read ^ 0x10`) can be told apart from an empty one
//! (`write == read`).

/// 16-byte circular byte queue with wrap+carry indices
pub struct Fifo {
    /// Data buffer
    buffer: [u8; 16],
    /// Write pointer (5 bits, the MSB is the carry)
    write_idx: u8,
    /// Read pointer (5 bits, the MSB is the carry)
    read_idx: u8,
}

impl Fifo {
    /// Create an empty FIFO
    pub fn new() -> Fifo {
        Fifo {
            buffer: [0; 16],
            write_idx: 0,
            read_idx: 0,
        }
    }

    /// Create a FIFO pre-loaded with `bytes`
    ///
    /// # Panics
    ///
    /// Panics if more than 16 bytes are provided.
    pub fn from_bytes(bytes: &[u8]) -> Fifo {
        let mut fifo = Fifo::new();

        for &b in bytes {
            fifo.push(b);
        }

        fifo
    }

    /// True when no byte is queued
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        // Same index and same carry
        self.write_idx == self.read_idx
    }

    /// True when all 16 slots are used
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        // Same index, opposite carry
        self.write_idx == self.read_idx ^ 0x10
    }

    /// Drop all queued bytes
    pub fn clear(&mut self) {
        self.write_idx = 0;
        self.read_idx = 0;
        self.buffer = [0; 16];
    }

    /// Number of queued bytes (0..=16)
    pub fn len(&self) -> u8 {
        self.write_idx.wrapping_sub(self.read_idx) & 0x1F
    }

    /// Queue one byte
    ///
    /// Pushing into a full FIFO silently overwrites the oldest slot, like
    /// the hardware does.
    pub fn push(&mut self, val: u8) {
        let idx = (self.write_idx & 0xF) as usize;

        self.buffer[idx] = val;

        self.write_idx = self.write_idx.wrapping_add(1) & 0x1F;
    }

    /// Dequeue one byte
    ///
    /// Popping an empty FIFO returns whatever stale byte the slot holds.
    pub fn pop(&mut self) -> u8 {
        let idx = (self.read_idx & 0xF) as usize;

        self.read_idx = self.read_idx.wrapping_add(1) & 0x1F;

        self.buffer[idx]
    }
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_fifo_is_empty() {
        let fifo = Fifo::new();

        assert!(fifo.is_empty());
        assert!(!fifo.is_full());
        assert_eq!(fifo.len(), 0);
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let mut fifo = Fifo::new();

        fifo.push(0xAB);
        assert!(!fifo.is_empty());
        assert_eq!(fifo.len(), 1);

        assert_eq!(fifo.pop(), 0xAB);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_fifo_ordering() {
        let mut fifo = Fifo::new();

        for b in 0..8u8 {
            fifo.push(b);
        }
        for b in 0..8u8 {
            assert_eq!(fifo.pop(), b, "bytes must come out in push order");
        }
    }

    #[test]
    fn test_full_after_16_pushes() {
        let mut fifo = Fifo::new();

        for b in 0..16u8 {
            assert!(!fifo.is_full());
            fifo.push(b);
        }

        assert!(fifo.is_full());
        assert_eq!(fifo.len(), 16);

        for b in 0..16u8 {
            assert_eq!(fifo.pop(), b);
        }

        assert!(fifo.is_empty());
        assert!(!fifo.is_full());
    }

    #[test]
    fn test_wraparound() {
        let mut fifo = Fifo::new();

        // Skew the indices so push/pop cross the end of the buffer
        for _ in 0..12 {
            fifo.push(0);
            fifo.pop();
        }

        for b in 100..116u8 {
            fifo.push(b);
        }
        assert!(fifo.is_full());
        for b in 100..116u8 {
            assert_eq!(fifo.pop(), b);
        }
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut fifo = Fifo::from_bytes(&[1, 2, 3]);

        fifo.clear();

        assert!(fifo.is_empty());
        assert_eq!(fifo.len(), 0);
    }

    #[test]
    fn test_from_bytes() {
        let mut fifo = Fifo::from_bytes(&[0xDE, 0xAD]);

        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.pop(), 0xDE);
        assert_eq!(fifo.pop(), 0xAD);
    }

    proptest! {
        /// FIFO behaves as a FIFO under arbitrary push/pop interleavings
        /// while never exceeding 16 queued bytes.
        #[test]
        fn prop_fifo_matches_model(ops in proptest::collection::vec(any::<Option<u8>>(), 0..256)) {
            let mut fifo = Fifo::new();
            let mut model: std::collections::VecDeque<u8> = Default::default();

            for op in ops {
                match op {
                    Some(b) => {
                        if !fifo.is_full() {
                            fifo.push(b);
                            model.push_back(b);
                        }
                    }
                    None => {
                        if !fifo.is_empty() {
                            let expected = model.pop_front().unwrap();
                            prop_assert_eq!(fifo.pop(), expected);
                        }
                    }
                }

                prop_assert_eq!(fifo.len() as usize, model.len());
                prop_assert!(fifo.len() <= 16);
                prop_assert_eq!(fifo.is_empty(), model.is_empty());
                prop_assert_eq!(fifo.is_full(), model.len() == 16);
            }
        }
    }
}
