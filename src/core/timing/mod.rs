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

//! Shared cycle accounting
//!
//! The CPU interpreter is the only component that actively consumes time;
//! every peripheral is lazy and only catches up when something observes it
//! (a register read, a DMA transfer) or when its own deadline passes.
//!
//! The [`TimeHandler`] keeps the master cycle counter and one "time sheet"
//! per peripheral recording when that peripheral was last synchronized and
//! when it next *must* be synchronized (to raise an interrupt on time, for
//! instance). The interconnect polls [`TimeHandler::sync_pending`] once per
//! instruction and only then walks the peripherals that asked to be woken.
//!
//! [`FracCycles`] is a fixed-point cycle count with 16 fractional bits, used
//! wherever two clock domains meet (CPU vs. GPU pixel clock, timer dividers).

/// Plain CPU cycle count
pub type Cycles = u64;

/// Peripherals tracked by the [`TimeHandler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peripheral {
    /// Graphics Processing Unit
    Gpu,
    /// Timer 0 (sysclock / dotclock)
    Timer0,
    /// Timer 1 (sysclock / hsync)
    Timer1,
    /// Timer 2 (sysclock / sysclock÷8)
    Timer2,
    /// Gamepad / memory card serial port
    PadMemCard,
    /// CD-ROM controller
    CdRom,
}

impl Peripheral {
    const COUNT: usize = 6;
}

/// Synchronization bookkeeping for one peripheral
#[derive(Debug, Clone, Copy)]
struct TimeSheet {
    /// Cycle count at the peripheral's last synchronization
    last_sync: Cycles,
    /// Date of the next mandatory synchronization
    next_sync: Cycles,
}

impl TimeSheet {
    fn new() -> TimeSheet {
        TimeSheet {
            last_sync: 0,
            // Force a sync on the very first instruction so every peripheral
            // gets a chance to initialize its own deadline.
            next_sync: 0,
        }
    }

    /// Advance `last_sync` to `now`, returning the elapsed delta
    fn sync(&mut self, now: Cycles) -> Cycles {
        let delta = now - self.last_sync;
        self.last_sync = now;
        delta
    }
}

/// Master clock and per-peripheral synchronization deadlines
pub struct TimeHandler {
    /// Counter keeping track of the current date, in CPU clock periods.
    /// The unit is the CPU clock speed (~33.8685MHz); fractions of a cycle
    /// never appear here.
    cycles: Cycles,
    /// Date of the next mandatory synchronization across all peripherals
    next_sync: Cycles,
    /// One time sheet per peripheral, indexed by `Peripheral as usize`
    timesheets: [TimeSheet; Peripheral::COUNT],
}

impl TimeHandler {
    /// Create a time handler at date 0 with every peripheral due for sync
    pub fn new() -> TimeHandler {
        TimeHandler {
            cycles: 0,
            next_sync: 0,
            timesheets: [TimeSheet::new(); Peripheral::COUNT],
        }
    }

    /// Advance the master counter by `cycles` CPU clock periods
    #[inline(always)]
    pub fn tick(&mut self, cycles: Cycles) {
        self.cycles += cycles;
    }

    /// Current date in CPU cycles
    #[inline(always)]
    pub fn now(&self) -> Cycles {
        self.cycles
    }

    /// Synchronize `who` with the master counter
    ///
    /// Returns the number of CPU cycles elapsed since `who` was last
    /// synchronized and stamps its time sheet with the current date.
    pub fn sync(&mut self, who: Peripheral) -> Cycles {
        self.timesheets[who as usize].sync(self.cycles)
    }

    /// Schedule the next mandatory synchronization of `who` in `delta` cycles
    pub fn set_next_sync_delta(&mut self, who: Peripheral, delta: Cycles) {
        let date = self.cycles + delta;

        self.timesheets[who as usize].next_sync = date;

        if date < self.next_sync {
            self.next_sync = date;
        }
    }

    /// Schedule a sync for `who` only if `delta` lands before its current one
    pub fn set_next_sync_delta_if_sooner(&mut self, who: Peripheral, delta: Cycles) {
        let date = self.cycles + delta;

        if date < self.timesheets[who as usize].next_sync {
            self.set_next_sync_delta(who, delta);
        }
    }

    /// Mark `who` as having no deadline at all
    ///
    /// The peripheral will still be synchronized lazily when its registers
    /// are accessed, it just won't force the main loop to stop for it.
    pub fn no_sync_needed(&mut self, who: Peripheral) {
        self.timesheets[who as usize].next_sync = Cycles::MAX;
    }

    /// True if at least one peripheral's deadline has been reached
    #[inline(always)]
    pub fn sync_pending(&self) -> bool {
        self.next_sync <= self.cycles
    }

    /// True if `who`'s own deadline has been reached
    pub fn needs_sync(&self, who: Peripheral) -> bool {
        self.timesheets[who as usize].next_sync <= self.cycles
    }

    /// Recompute the global deadline after peripherals rescheduled themselves
    pub fn update_sync_pending(&mut self) {
        self.next_sync = self
            .timesheets
            .iter()
            .map(|sheet| sheet.next_sync)
            .min()
            .unwrap();
    }
}

impl Default for TimeHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-point cycle count with 16 fractional bits
///
/// Used to convert between the CPU clock and the GPU pixel clock without
/// drifting: remainders are carried in the fractional part instead of being
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FracCycles(Cycles);

impl FracCycles {
    /// Number of fractional bits
    pub const FRAC_BITS: u32 = 16;

    /// Build from a raw fixed-point value
    pub fn from_fp(val: Cycles) -> FracCycles {
        FracCycles(val)
    }

    /// Build from a whole number of cycles
    pub fn from_cycles(val: Cycles) -> FracCycles {
        FracCycles(val << Self::FRAC_BITS)
    }

    /// Build from a float (used for clock ratios)
    pub fn from_f32(val: f32) -> FracCycles {
        let precision = (1u32 << Self::FRAC_BITS) as f32;

        FracCycles((val * precision) as Cycles)
    }

    /// Smallest representable non-zero value
    pub fn epsilon() -> FracCycles {
        FracCycles(1)
    }

    /// Raw fixed-point representation
    pub fn get_fp(self) -> Cycles {
        self.0
    }

    /// Sum of two fractional cycle counts
    pub fn add(self, other: FracCycles) -> FracCycles {
        FracCycles(self.0 + other.0)
    }

    /// Product of two fractional cycle counts
    pub fn multiply(self, mul: FracCycles) -> FracCycles {
        let v = self.0 * mul.0;

        // The shift must be re-applied once since the product carries twice
        // the fractional precision.
        FracCycles(v >> Self::FRAC_BITS)
    }

    /// Quotient of two fractional cycle counts
    pub fn divide(self, denominator: FracCycles) -> FracCycles {
        // Pre-shift the numerator to preserve the fractional precision
        // through the division.
        let numerator = self.0 << Self::FRAC_BITS;

        FracCycles(numerator / denominator.0)
    }

    /// Round up to a whole number of cycles
    pub fn ceil(self) -> Cycles {
        let frac_mask = (1 << Self::FRAC_BITS) - 1;
        let t = self.0 >> Self::FRAC_BITS;

        if self.0 & frac_mask != 0 {
            t + 1
        } else {
            t
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== TimeHandler Tests ==========

    #[test]
    fn test_sync_returns_elapsed_delta() {
        let mut th = TimeHandler::new();

        th.tick(100);
        assert_eq!(th.sync(Peripheral::Gpu), 100, "first sync sees all cycles");

        th.tick(25);
        assert_eq!(
            th.sync(Peripheral::Gpu),
            25,
            "second sync only sees cycles since the first"
        );
    }

    #[test]
    fn test_sync_stamps_last_sync() {
        let mut th = TimeHandler::new();

        th.tick(42);
        th.sync(Peripheral::Timer1);

        // An immediate re-sync must observe zero elapsed cycles
        assert_eq!(th.sync(Peripheral::Timer1), 0);
    }

    #[test]
    fn test_peripherals_have_independent_sheets() {
        let mut th = TimeHandler::new();

        th.tick(10);
        th.sync(Peripheral::Gpu);
        th.tick(5);

        assert_eq!(th.sync(Peripheral::Gpu), 5);
        assert_eq!(th.sync(Peripheral::CdRom), 15, "CdRom never synced before");
    }

    #[test]
    fn test_sync_pending_initially() {
        let th = TimeHandler::new();

        // All deadlines start at 0 so the first instruction syncs everyone
        assert!(th.sync_pending());
    }

    #[test]
    fn test_next_sync_deadline() {
        let mut th = TimeHandler::new();

        for &p in &[
            Peripheral::Gpu,
            Peripheral::Timer0,
            Peripheral::Timer1,
            Peripheral::Timer2,
            Peripheral::PadMemCard,
            Peripheral::CdRom,
        ] {
            th.set_next_sync_delta(p, 100);
        }
        th.update_sync_pending();

        assert!(!th.sync_pending());

        th.tick(99);
        assert!(!th.sync_pending());

        th.tick(1);
        assert!(th.sync_pending());
        assert!(th.needs_sync(Peripheral::Gpu));
    }

    #[test]
    fn test_update_sync_pending_takes_minimum() {
        let mut th = TimeHandler::new();

        th.set_next_sync_delta(Peripheral::Gpu, 500);
        th.set_next_sync_delta(Peripheral::Timer0, 50);
        th.set_next_sync_delta(Peripheral::Timer1, 1000);
        th.no_sync_needed(Peripheral::Timer2);
        th.no_sync_needed(Peripheral::PadMemCard);
        th.no_sync_needed(Peripheral::CdRom);
        th.update_sync_pending();

        th.tick(49);
        assert!(!th.sync_pending());
        th.tick(1);
        assert!(th.sync_pending());
        assert!(th.needs_sync(Peripheral::Timer0));
        assert!(!th.needs_sync(Peripheral::Gpu));
    }

    #[test]
    fn test_set_next_sync_delta_if_sooner() {
        let mut th = TimeHandler::new();

        th.set_next_sync_delta(Peripheral::CdRom, 100);
        th.set_next_sync_delta_if_sooner(Peripheral::CdRom, 500);

        th.tick(100);
        assert!(
            th.needs_sync(Peripheral::CdRom),
            "later deadline must not displace a sooner one"
        );

        let mut th = TimeHandler::new();
        th.set_next_sync_delta(Peripheral::CdRom, 500);
        th.set_next_sync_delta_if_sooner(Peripheral::CdRom, 100);

        th.tick(100);
        assert!(th.needs_sync(Peripheral::CdRom));
    }

    // ========== FracCycles Tests ==========

    #[test]
    fn test_frac_cycles_roundtrip() {
        let f = FracCycles::from_cycles(123);
        assert_eq!(f.get_fp(), 123 << 16);
        assert_eq!(f.ceil(), 123);
    }

    #[test]
    fn test_frac_cycles_ceil_rounds_up() {
        let f = FracCycles::from_fp((5 << 16) | 1);
        assert_eq!(f.ceil(), 6, "any fractional remainder rounds up");

        let f = FracCycles::from_fp(5 << 16);
        assert_eq!(f.ceil(), 5, "exact values stay put");
    }

    #[test]
    fn test_frac_cycles_multiply() {
        let a = FracCycles::from_cycles(6);
        let b = FracCycles::from_f32(0.5);

        assert_eq!(a.multiply(b).ceil(), 3);
    }

    #[test]
    fn test_frac_cycles_divide() {
        let a = FracCycles::from_cycles(10);
        let b = FracCycles::from_cycles(4);

        // 10 / 4 = 2.5
        assert_eq!(a.divide(b).get_fp(), (2 << 16) | 0x8000);
    }

    #[test]
    fn test_frac_cycles_clock_ratio() {
        // The NTSC GPU / CPU clock ratio used by the GPU timing code
        let ratio = FracCycles::from_f32(53.69 / 33.8685);

        // One CPU cycle is ~1.585 GPU ticks
        let ticks = FracCycles::from_cycles(1).multiply(ratio);
        assert_eq!(ticks.ceil(), 2);
        assert!(ticks.get_fp() > 1 << 16);
    }
}
