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

//! Interpreter throughput benchmark
//!
//! Runs a tight arithmetic loop from RAM and measures instructions per
//! second through the full fetch/decode/execute path, peripheral sync
//! included.

use criterion::{criterion_group, criterion_main, Criterion};

use psemu::core::cpu::Cpu;
use psemu::core::gpu::{HardwareType, NullRenderer};
use psemu::core::memory::{Bios, Interconnect};
use psemu::core::timing::TimeHandler;

fn build_machine() -> (Cpu, Interconnect, TimeHandler) {
    let bios = Bios::new(vec![0; Bios::SIZE]).unwrap();
    let mut inter = Interconnect::new(bios, HardwareType::Ntsc, None, Box::new(NullRenderer));

    // addiu $at, $at, 1; j 0; nop
    let program: [u32; 3] = [0x2421_0001, 0x0800_0000, 0x0000_0000];

    for (i, &word) in program.iter().enumerate() {
        inter.ram_mut().store32((i * 4) as u32, word);
    }

    let mut cpu = Cpu::new();
    cpu.set_pc(0);

    (cpu, inter, TimeHandler::new())
}

fn cpu_benchmark(c: &mut Criterion) {
    let (mut cpu, mut inter, mut th) = build_machine();

    c.bench_function("interpreter_loop_1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                cpu.run_next_instruction(&mut inter, &mut th).unwrap();
            }
        })
    });
}

criterion_group!(benches, cpu_benchmark);
criterion_main!(benches);
