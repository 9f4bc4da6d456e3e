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

//! Gamepad profiles
//!
//! A [`GamePad`] tracks the serial exchange position for one controller
//! port and forwards command bytes to its [`Profile`], which implements a
//! specific device (digital pad, nothing plugged in). Button state uses
//! active-low encoding on the wire: 0 means pressed.

use bitflags::bitflags;

bitflags! {
    /// Button state word as transmitted on the wire (active low)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Buttons: u16 {
        const SELECT = 1 << 0;
        const L3 = 1 << 1;
        const R3 = 1 << 2;
        const START = 1 << 3;
        const DUP = 1 << 4;
        const DRIGHT = 1 << 5;
        const DDOWN = 1 << 6;
        const DLEFT = 1 << 7;
        const L2 = 1 << 8;
        const R2 = 1 << 9;
        const L1 = 1 << 10;
        const R1 = 1 << 11;
        const TRIANGLE = 1 << 12;
        const CIRCLE = 1 << 13;
        const CROSS = 1 << 14;
        const SQUARE = 1 << 15;
    }
}

/// Identifier for a single physical button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Select,
    L3,
    R3,
    Start,
    DUp,
    DRight,
    DDown,
    DLeft,
    L2,
    R2,
    L1,
    R1,
    Triangle,
    Circle,
    Cross,
    Square,
}

impl Button {
    /// Wire bit for this button
    fn mask(self) -> Buttons {
        match self {
            Button::Select => Buttons::SELECT,
            Button::L3 => Buttons::L3,
            Button::R3 => Buttons::R3,
            Button::Start => Buttons::START,
            Button::DUp => Buttons::DUP,
            Button::DRight => Buttons::DRIGHT,
            Button::DDown => Buttons::DDOWN,
            Button::DLeft => Buttons::DLEFT,
            Button::L2 => Buttons::L2,
            Button::R2 => Buttons::R2,
            Button::L1 => Buttons::L1,
            Button::R1 => Buttons::R1,
            Button::Triangle => Buttons::TRIANGLE,
            Button::Circle => Buttons::CIRCLE,
            Button::Cross => Buttons::CROSS,
            Button::Square => Buttons::SQUARE,
        }
    }
}

/// Button transition reported by the input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Controller behavior behind one port
pub trait Profile {
    /// Handle the `seq`-th command byte of the current exchange
    ///
    /// Returns the response byte and whether the device pulses DSR to
    /// request more bytes.
    fn handle_command(&mut self, seq: u8, cmd: u8) -> (u8, bool);

    /// Update the state of one button
    fn set_button_state(&mut self, button: Button, state: ButtonState);
}

/// Standard digital controller (SCPH-1080)
pub struct DigitalPad {
    /// Wire-encoded button state (active low)
    buttons: Buttons,
}

impl DigitalPad {
    pub fn new() -> DigitalPad {
        DigitalPad {
            buttons: Buttons::all(),
        }
    }
}

impl Default for DigitalPad {
    fn default() -> Self {
        Self::new()
    }
}

impl Profile for DigitalPad {
    fn handle_command(&mut self, seq: u8, cmd: u8) -> (u8, bool) {
        match seq {
            // First byte should be 0x01 if the command targets a
            // controller
            0 => (0xFF, cmd == 0x01),
            // Digital pad ID; the exchange continues only for the
            // "read state" command
            1 => (0x41, cmd == 0x42),
            // From then on the command byte no longer matters
            2 => (0x5A, true),
            // Button state, low byte
            3 => (self.buttons.bits() as u8, true),
            // Button state, high byte. DSR is not asserted after the last
            // byte of the exchange.
            4 => ((self.buttons.bits() >> 8) as u8, false),
            _ => (0xFF, false),
        }
    }

    fn set_button_state(&mut self, button: Button, state: ButtonState) {
        // Active low: pressing clears the bit
        match state {
            ButtonState::Pressed => self.buttons.remove(button.mask()),
            ButtonState::Released => self.buttons.insert(button.mask()),
        }
    }
}

/// Empty port: every byte reads back 0xFF and DSR never pulses
pub struct DisconnectedPad;

impl Profile for DisconnectedPad {
    fn handle_command(&mut self, _seq: u8, _cmd: u8) -> (u8, bool) {
        (0xFF, false)
    }

    fn set_button_state(&mut self, _button: Button, _state: ButtonState) {}
}

/// One controller port: exchange position plus the plugged-in profile
pub struct GamePad {
    /// Device plugged into this port
    profile: Box<dyn Profile>,
    /// Position within the current exchange
    seq: u8,
    /// False once the device stopped asserting DSR for this exchange
    active: bool,
}

impl GamePad {
    pub fn new(profile: Box<dyn Profile>) -> GamePad {
        GamePad {
            profile,
            seq: 0,
            active: true,
        }
    }

    /// The port select signal was asserted, restart the exchange
    pub fn select(&mut self) {
        self.active = true;
        self.seq = 0;
    }

    /// Exchange one byte with the device
    ///
    /// Returns the response byte and the DSR state.
    pub fn send_command(&mut self, cmd: u8) -> (u8, bool) {
        if !self.active {
            return (0xFF, false);
        }

        let (response, dsr) = self.profile.handle_command(self.seq, cmd);

        self.seq += 1;
        self.active = dsr;

        (response, dsr)
    }

    /// Access the plugged-in device
    pub fn profile_mut(&mut self) -> &mut dyn Profile {
        &mut *self.profile
    }
}
