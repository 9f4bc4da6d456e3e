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

//! Cold boot scenario
//!
//! Runs a real BIOS with no disc inserted. Needs a BIOS image, so the test
//! is ignored unless `PSEMU_BIOS` points at one:
//!
//! ```text
//! PSEMU_BIOS=roms/SCPH1001.BIN cargo test --release -- --ignored
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use psemu::core::gpu::{CollectingRenderer, HardwareType};
use psemu::core::memory::Bios;
use psemu::core::system::System;

#[test]
#[ignore = "requires a BIOS image in PSEMU_BIOS"]
fn cold_boot_no_disc() {
    let path = std::env::var("PSEMU_BIOS").expect("set PSEMU_BIOS to a 512KB BIOS image");

    let bios = Bios::from_file(path).unwrap();

    let renderer = Rc::new(RefCell::new(CollectingRenderer::new()));
    let mut system = System::new(bios, HardwareType::Ntsc, Box::new(renderer.clone()));

    // 200 million instructions is a few seconds of emulated time, enough
    // for the BIOS to initialize and idle in its shell
    for _ in 0..200_000_000u64 {
        system.step().expect("fatal error during BIOS boot");
    }

    assert!(
        system.frame() >= 1,
        "the GPU must emit at least one frame during boot"
    );
    assert_eq!(renderer.borrow().frames, system.frame());

    // At 60 frames per emulated second the blanking interval comes around
    // well over 30 times
    assert!(
        system.frame() >= 30,
        "expected at least 30 blanking intervals, got {}",
        system.frame()
    );

    assert_eq!(
        system.cpu().illegal_instruction_count(),
        0,
        "the BIOS must never hit a reserved instruction"
    );
}
