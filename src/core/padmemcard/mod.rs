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

//! Gamepad and memory card serial interface
//!
//! Controllers and memory cards share one synchronous serial bus. The CPU
//! writes a command byte to JOY_DATA which is clocked out to the selected
//! device over `8 × baud_divider` CPU cycles; the byte clocked back in the
//! same window lands in the RX buffer. If the device wants the exchange to
//! continue it pulses DSR for about 10 CPU cycles, which can raise the
//! controller interrupt.
//!
//! # Registers (0x1F801040-0x1F80104E)
//!
//! | Offset | Name      | Access | Purpose                           |
//! |--------|-----------|--------|-----------------------------------|
//! | 0x0    | JOY_DATA  | R/W    | RX buffer / TX command byte       |
//! | 0x4    | JOY_STAT  | R      | TX/RX/DSR/IRQ status              |
//! | 0x8    | JOY_MODE  | R/W    | Serial format (stored, not used)  |
//! | 0xA    | JOY_CTRL  | R/W    | TX enable, select, ack, target    |
//! | 0xE    | JOY_BAUD  | R/W    | Baud rate divider                 |
//!
//! Memory cards are not implemented: selecting one behaves like an empty
//! slot (0xFF responses, no DSR).
//!
//! # References
//!
//! - [PSX-SPX: Controllers and Memory Cards](http://problemkaputt.de/psx-spx.htm#controllersandmemorycards)

pub mod gamepad;

pub use gamepad::{Button, ButtonState, DigitalPad, DisconnectedPad, GamePad};

use crate::core::interrupt::{interrupts, InterruptController};
use crate::core::timing::{Cycles, Peripheral, TimeHandler};

/// Duration of the DSR pulse in CPU cycles
const DSR_PULSE_DURATION: Cycles = 10;

/// Device addressed by bit 13 of JOY_CTRL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Controller/memory card port 1
    PadMemCard1 = 0,
    /// Controller/memory card port 2
    PadMemCard2 = 1,
}

/// Serial bus activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusState {
    /// Bus idle
    Idle,
    /// A byte is being exchanged
    Transfer {
        /// Cycles until the exchange completes
        remaining: Cycles,
        /// Byte the device will answer
        response: u8,
        /// Whether the device will pulse DSR afterwards
        dsr: bool,
    },
    /// The device holds DSR asserted
    Dsr {
        /// Cycles until DSR is released
        remaining: Cycles,
    },
}

/// Gamepad/memory card serial port controller
pub struct PadMemCard {
    /// Serial clock divider: one exchanged byte takes 8 × this many CPU
    /// cycles
    baud_div: u16,
    /// Serial mode register (stored for readback only)
    mode: u8,
    /// Transmission enabled
    tx_en: bool,
    /// Device select signal
    select: bool,
    /// Port addressed by the next exchange
    target: Target,
    /// JOY_CTRL bits 3 and 5, stored for readback
    unknown: u8,
    /// RX enable (JOY_CTRL bit 2)
    rx_en: bool,
    /// Raise an interrupt on the DSR pulse
    dsr_it: bool,
    /// Interrupt level
    interrupt: bool,
    /// Last received byte
    response: u8,
    /// True when `response` hasn't been read yet
    rx_not_empty: bool,
    /// DSR input level
    dsr: bool,
    /// Bus state machine
    bus: BusState,
    /// Gamepad in port 1
    pad1: GamePad,
    /// Gamepad in port 2
    pad2: GamePad,
}

impl PadMemCard {
    /// Create the port controller with a digital pad in port 1 and nothing
    /// in port 2
    pub fn new() -> PadMemCard {
        PadMemCard {
            baud_div: 0,
            mode: 0,
            tx_en: false,
            select: false,
            target: Target::PadMemCard1,
            unknown: 0,
            rx_en: false,
            dsr_it: false,
            interrupt: false,
            response: 0xFF,
            rx_not_empty: false,
            dsr: false,
            bus: BusState::Idle,
            pad1: GamePad::new(Box::new(DigitalPad::new())),
            pad2: GamePad::new(Box::new(DisconnectedPad)),
        }
    }

    /// Forward a button transition to one of the gamepads
    ///
    /// `pad` is 0 for port 1 and 1 for port 2. This is the input-provider
    /// entry point; it can be called at any time, each exchanged command
    /// byte re-latches the state.
    pub fn set_button_state(&mut self, pad: usize, button: Button, state: ButtonState) {
        let gamepad = match pad {
            0 => &mut self.pad1,
            1 => &mut self.pad2,
            n => {
                log::warn!("Button state for invalid pad {}", n);
                return;
            }
        };

        gamepad.profile_mut().set_button_state(button, state);
    }

    /// Catch up with the shared clock, advancing the bus state machine
    pub fn sync(&mut self, th: &mut TimeHandler, irq: &mut InterruptController) {
        let mut delta = th.sync(Peripheral::PadMemCard);

        while delta > 0 {
            match self.bus {
                BusState::Idle => break,
                BusState::Transfer {
                    remaining,
                    response,
                    dsr,
                } => {
                    if remaining > delta {
                        self.bus = BusState::Transfer {
                            remaining: remaining - delta,
                            response,
                            dsr,
                        };
                        break;
                    }

                    delta -= remaining;

                    // The byte is fully clocked in
                    self.response = response;
                    self.rx_not_empty = true;

                    if dsr {
                        self.dsr = true;

                        if self.dsr_it && !self.interrupt {
                            self.interrupt = true;
                            irq.request(interrupts::PADMEMCARD);
                        }

                        self.bus = BusState::Dsr {
                            remaining: DSR_PULSE_DURATION,
                        };
                    } else {
                        self.bus = BusState::Idle;
                    }
                }
                BusState::Dsr { remaining } => {
                    if remaining > delta {
                        self.bus = BusState::Dsr {
                            remaining: remaining - delta,
                        };
                        break;
                    }

                    delta -= remaining;
                    self.dsr = false;
                    self.bus = BusState::Idle;
                }
            }
        }

        self.predict_next_sync(th);
    }

    /// Schedule the next mandatory sync at the next bus event
    fn predict_next_sync(&self, th: &mut TimeHandler) {
        match self.bus {
            BusState::Idle => th.no_sync_needed(Peripheral::PadMemCard),
            BusState::Transfer { remaining, .. } | BusState::Dsr { remaining } => {
                th.set_next_sync_delta(Peripheral::PadMemCard, remaining.max(1));
            }
        }
    }

    /// Write to JOY_DATA: exchange one byte with the selected device
    pub fn send_command(&mut self, cmd: u8) {
        if !self.tx_en {
            log::warn!("Pad command 0x{:02X} with TX disabled", cmd);
            return;
        }

        if self.bus != BusState::Idle {
            log::warn!("Pad command 0x{:02X} while bus is busy", cmd);
        }

        let (response, dsr) = if self.select {
            match self.target {
                Target::PadMemCard1 => self.pad1.send_command(cmd),
                Target::PadMemCard2 => self.pad2.send_command(cmd),
            }
        } else {
            // Nothing is listening
            (0xFF, false)
        };

        let tx_duration = 8 * self.baud_div.max(1) as Cycles;

        self.bus = BusState::Transfer {
            remaining: tx_duration,
            response,
            dsr,
        };
    }

    /// Read JOY_DATA: pop the RX buffer
    pub fn read_response(&mut self) -> u8 {
        if self.rx_not_empty {
            self.rx_not_empty = false;
            self.response
        } else {
            // Reading an empty RX buffer
            0xFF
        }
    }

    /// Read JOY_STAT
    pub fn stat(&self) -> u32 {
        let mut r = 0u32;

        // TX ready (can always accept a byte)
        r |= 1;
        r |= (self.rx_not_empty as u32) << 1;
        // TX done
        r |= (!matches!(self.bus, BusState::Transfer { .. }) as u32) << 2;
        r |= (self.dsr as u32) << 7;
        r |= (self.interrupt as u32) << 9;

        r
    }

    /// Read JOY_MODE
    pub fn mode(&self) -> u16 {
        self.mode as u16
    }

    /// Write JOY_MODE
    pub fn set_mode(&mut self, mode: u16) {
        self.mode = mode as u8;
    }

    /// Read JOY_CTRL
    pub fn control(&self) -> u16 {
        let mut r = 0u16;

        r |= self.tx_en as u16;
        r |= (self.select as u16) << 1;
        r |= (self.rx_en as u16) << 2;
        r |= self.unknown as u16;
        r |= (self.dsr_it as u16) << 12;
        r |= (self.target as u16) << 13;

        r
    }

    /// Write JOY_CTRL
    pub fn set_control(&mut self, ctrl: u16) {
        if ctrl & 0x40 != 0 {
            // Soft reset
            self.baud_div = 0;
            self.mode = 0;
            self.tx_en = false;
            self.select = false;
            self.target = Target::PadMemCard1;
            self.unknown = 0;
            self.rx_en = false;
            self.dsr_it = false;
            self.interrupt = false;
            self.response = 0xFF;
            self.rx_not_empty = false;
            self.dsr = false;
            self.bus = BusState::Idle;
            return;
        }

        if ctrl & 0x10 != 0 {
            // Interrupt acknowledge
            self.interrupt = false;
        }

        self.unknown = (ctrl & 0x28) as u8;
        self.tx_en = ctrl & 1 != 0;
        self.rx_en = (ctrl >> 2) & 1 != 0;
        self.dsr_it = (ctrl >> 12) & 1 != 0;

        self.target = if (ctrl >> 13) & 1 != 0 {
            Target::PadMemCard2
        } else {
            Target::PadMemCard1
        };

        let select = (ctrl >> 1) & 1 != 0;

        if !self.select && select {
            // Rising edge of the select signal restarts the exchange on
            // both ports
            self.pad1.select();
            self.pad2.select();
        }

        self.select = select;
    }

    /// Read JOY_BAUD
    pub fn baud(&self) -> u16 {
        self.baud_div
    }

    /// Write JOY_BAUD
    pub fn set_baud(&mut self, baud: u16) {
        self.baud_div = baud;
    }
}

impl Default for PadMemCard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_port() -> (PadMemCard, TimeHandler, InterruptController) {
        (
            PadMemCard::new(),
            TimeHandler::new(),
            InterruptController::new(),
        )
    }

    /// Run one full byte exchange and return the response
    fn exchange(
        pad: &mut PadMemCard,
        th: &mut TimeHandler,
        irq: &mut InterruptController,
        cmd: u8,
    ) -> u8 {
        pad.send_command(cmd);

        // 8 * baud_div cycles plus the DSR pulse
        th.tick(8 * pad.baud() as Cycles + 64);
        pad.sync(th, irq);

        pad.read_response()
    }

    // ========== Bus State Machine Tests ==========

    #[test]
    fn test_transfer_takes_baud_cycles() {
        let (mut pad, mut th, mut irq) = create_test_port();

        pad.set_baud(0x88);
        pad.set_control(0x1003); // TX enable, select, DSR interrupt

        pad.send_command(0x01);

        // Nothing received before 8 * 0x88 = 1088 cycles
        th.tick(1000);
        pad.sync(&mut th, &mut irq);
        assert_eq!(pad.stat() & 2, 0, "RX must still be empty");
        assert_eq!(pad.stat() & 4, 0, "TX still in progress");

        th.tick(100);
        pad.sync(&mut th, &mut irq);
        assert_ne!(pad.stat() & 2, 0, "RX buffer filled");
        assert_ne!(pad.stat() & 4, 0, "TX done");
        assert_eq!(pad.read_response(), 0xFF);

        // Reading pops the buffer
        assert_eq!(pad.stat() & 2, 0);
    }

    #[test]
    fn test_dsr_pulse_and_interrupt() {
        let (mut pad, mut th, mut irq) = create_test_port();

        pad.set_baud(0x88);
        pad.set_control(0x1003);

        pad.send_command(0x01);

        // Land inside the DSR pulse window
        th.tick(8 * 0x88 + 5);
        pad.sync(&mut th, &mut irq);

        assert_ne!(pad.stat() & 0x80, 0, "DSR asserted");
        assert_ne!(
            irq.read_status() & interrupts::PADMEMCARD as u32,
            0,
            "DSR interrupt raised"
        );

        // The pulse lasts 10 cycles
        th.tick(10);
        pad.sync(&mut th, &mut irq);
        assert_eq!(pad.stat() & 0x80, 0, "DSR released");
    }

    #[test]
    fn test_no_dsr_interrupt_when_disabled() {
        let (mut pad, mut th, mut irq) = create_test_port();

        pad.set_baud(0x88);
        pad.set_control(0x0003); // no DSR interrupt

        pad.send_command(0x01);
        th.tick(8 * 0x88 + 5);
        pad.sync(&mut th, &mut irq);

        assert_eq!(irq.read_status() & interrupts::PADMEMCARD as u32, 0);
    }

    // ========== Digital Pad Exchange Tests ==========

    #[test]
    fn test_full_digital_pad_exchange() {
        let (mut pad, mut th, mut irq) = create_test_port();

        pad.set_baud(0x88);
        pad.set_control(0x1003);

        pad.set_button_state(0, Button::Cross, ButtonState::Pressed);

        let responses: Vec<u8> = [0x01, 0x42, 0x00, 0x00, 0x00]
            .iter()
            .map(|&cmd| exchange(&mut pad, &mut th, &mut irq, cmd))
            .collect();

        assert_eq!(responses[0], 0xFF);
        assert_eq!(responses[1], 0x41, "digital pad ID");
        assert_eq!(responses[2], 0x5A);
        assert_eq!(responses[3], 0xFF, "low button byte, nothing pressed");
        assert_eq!(responses[4], 0xBF, "high button byte, Cross pressed");

        assert_eq!(pad.stat() & 0x80, 0, "DSR low after the 5th byte");
    }

    #[test]
    fn test_port2_is_disconnected() {
        let (mut pad, mut th, mut irq) = create_test_port();

        pad.set_baud(0x88);
        // TX enable, select, target port 2
        pad.set_control(0x2003);

        let response = exchange(&mut pad, &mut th, &mut irq, 0x01);

        assert_eq!(response, 0xFF);
        assert_eq!(pad.stat() & 0x80, 0, "no DSR from an empty port");
    }

    #[test]
    fn test_control_soft_reset() {
        let (mut pad, mut th, mut irq) = create_test_port();

        pad.set_baud(0x88);
        pad.set_control(0x1003);
        pad.send_command(0x01);
        th.tick(5000);
        pad.sync(&mut th, &mut irq);

        pad.set_control(0x40);

        assert_eq!(pad.baud(), 0);
        assert_eq!(pad.control(), 0);
        assert_eq!(pad.stat() & 2, 0, "RX flushed by reset");
    }

    #[test]
    fn test_interrupt_acknowledge() {
        let (mut pad, mut th, mut irq) = create_test_port();

        pad.set_baud(0x88);
        pad.set_control(0x1003);
        pad.send_command(0x01);
        th.tick(5000);
        pad.sync(&mut th, &mut irq);

        assert_ne!(pad.stat() & (1 << 9), 0, "interrupt latched");

        // Ack through JOY_CTRL bit 4
        pad.set_control(0x1013);

        assert_eq!(pad.stat() & (1 << 9), 0);
    }
}
