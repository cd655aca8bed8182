// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for resolving and configuring layered module graphs.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use modflow::module::ModuleId;
use modflow::services::ServiceCollection;
use modflow::{plan, ModFlow, ModuleDescriptor, StaticCatalog};

const LAYERS: usize = 8;
const WIDTH: usize = 16;

/// Builds `LAYERS` layers of `WIDTH` modules where every module depends on
/// every module of the next layer, plus a root over the first layer.
fn layered_catalog() -> StaticCatalog {
    let id = |layer: usize, index: usize| format!("m{}_{}", layer, index);
    let mut catalog = StaticCatalog::new();

    let first_layer: Vec<String> = (0..WIDTH).map(|index| id(0, index)).collect();
    catalog
        .register(ModuleDescriptor::new("root", "Root", first_layer))
        .unwrap();

    for layer in 0..LAYERS {
        let next: Vec<String> = if layer + 1 < LAYERS {
            (0..WIDTH).map(|index| id(layer + 1, index)).collect()
        } else {
            Vec::new()
        };
        for index in 0..WIDTH {
            let module_id = id(layer, index);
            catalog
                .register(ModuleDescriptor::new(
                    module_id.clone(),
                    module_id,
                    next.clone(),
                ))
                .unwrap();
        }
    }
    catalog
}

fn benchmark_plan(c: &mut Criterion) {
    let catalog = layered_catalog();
    let root = ModuleId::new("root");

    _ = c.bench_function("plan_layered_graph", |b| {
        b.iter(|| black_box(plan(black_box(&root), &catalog).unwrap()))
    });
}

fn benchmark_configure(c: &mut Criterion) {
    let flow = ModFlow::new(layered_catalog());
    let root = ModuleId::new("root");

    _ = c.bench_function("configure_layered_graph", |b| {
        b.iter(|| {
            black_box(
                flow.configure_modules(black_box(&root), ServiceCollection::new())
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, benchmark_plan, benchmark_configure);
criterion_main!(benches);
