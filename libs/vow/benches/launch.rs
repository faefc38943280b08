// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vow::executor::{InlineExecutor, ThreadPool};
use vow::spawn;

fn launch(c: &mut Criterion) {
    let pool = ThreadPool::new(4);

    c.bench_function("spawn_get", |b| {
        b.iter(|| spawn(&pool, || black_box(1u32)).get().unwrap());
    });

    c.bench_function("spawn_inline", |b| {
        b.iter(|| spawn(&InlineExecutor, || black_box(1u32)).get().unwrap());
    });

    c.bench_function("then_chain", |b| {
        b.iter(|| {
            spawn(&pool, || black_box(2u32))
                .then(|x| x * 3)
                .then(|y| y + 1)
                .get()
                .unwrap()
        });
    });

    c.bench_function("count_if_5000", |b| {
        let data: Vec<u32> = (1..=5000).collect();
        b.iter(|| vow::algorithm::count_if(black_box(&data), |x| x % 2 == 1));
    });
}

criterion_group!(benches, launch);
criterion_main!(benches);
