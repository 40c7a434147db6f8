// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Staging Cycle Benchmark
//!
//! Measures one full telemetry cycle per reference: stage the live bytes,
//! swap buffers, render. The scheduler runs stage() inside the simulation
//! frame, so the staging half must stay flat regardless of render cost.

#![allow(clippy::uninlined_format_args)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use simtap::{MemoryDirectory, VarRegistry, VariableReference};
use std::sync::Arc;

fn subscribe(reg: &Arc<VarRegistry>, name: &str) -> VariableReference {
    VariableReference::new(name, Arc::clone(reg) as Arc<dyn MemoryDirectory>)
}

/// Benchmark: stage + swap for a scalar double (the scheduler's hot path).
fn bench_stage_scalar(c: &mut Criterion) {
    let reg = VarRegistry::shared();
    let speed: f64 = 867.309;
    unsafe { reg.declare_scalar("ball.speed", &speed) };
    let r = subscribe(&reg, "ball.speed");

    c.bench_function("stage_scalar_f64", |b| {
        b.iter(|| {
            r.stage();
            r.prepare_for_write().expect("staged");
            black_box(r.byte_count());
        });
    });
}

/// Benchmark: full cycle with ASCII rendering for a scalar double.
fn bench_ascii_cycle_scalar(c: &mut Criterion) {
    let reg = VarRegistry::shared();
    let speed: f64 = 867.309;
    unsafe { reg.declare_scalar("ball.speed", &speed) };
    let r = subscribe(&reg, "ball.speed");

    c.bench_function("ascii_cycle_f64", |b| {
        let mut out = String::with_capacity(64);
        b.iter(|| {
            r.stage();
            r.prepare_for_write().expect("staged");
            out.clear();
            r.write_value_ascii(&mut out).expect("committed");
            black_box(out.len());
        });
    });
}

/// Benchmark: full cycle with binary rendering for a 256-element array.
fn bench_binary_cycle_array(c: &mut Criterion) {
    let reg = VarRegistry::shared();
    let wave: Vec<i32> = (0..256).collect();
    unsafe { reg.declare_array("wave", wave.as_ptr(), wave.len()) };
    let r = subscribe(&reg, "wave");

    c.bench_function("binary_cycle_i32x256", |b| {
        let mut out = Vec::with_capacity(1024);
        b.iter(|| {
            r.stage();
            r.prepare_for_write().expect("staged");
            out.clear();
            r.write_value_binary(&mut out, false).expect("committed");
            black_box(out.len());
        });
    });
}

/// Benchmark: byte-swapped binary rendering for the same array.
fn bench_binary_swap_array(c: &mut Criterion) {
    let reg = VarRegistry::shared();
    let wave: Vec<i32> = (0..256).collect();
    unsafe { reg.declare_array("wave", wave.as_ptr(), wave.len()) };
    let r = subscribe(&reg, "wave");

    c.bench_function("binary_swap_i32x256", |b| {
        let mut out = Vec::with_capacity(1024);
        b.iter(|| {
            r.stage();
            r.prepare_for_write().expect("staged");
            out.clear();
            r.write_value_binary(&mut out, true).expect("committed");
            black_box(out.len());
        });
    });
}

criterion_group!(
    benches,
    bench_stage_scalar,
    bench_ascii_cycle_scalar,
    bench_binary_cycle_array,
    bench_binary_swap_array
);
criterion_main!(benches);
