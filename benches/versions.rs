// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use easel::model::{NewVersion, VersionScope};
use easel::store::DataDir;

mod fixtures;
mod profiler;

use fixtures::{Case, TempDir};

// Benchmark identity (keep stable):
// - Group names in this file: `versions.list`, `versions.create`
// - Case IDs (the string after the `/`) must remain stable so results stay comparable over
//   time.
fn benches_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("versions.list");

    for (id, case) in [("small", Case::Small), ("medium", Case::Medium)] {
        let store = fixtures::populated_store(case, None);
        let account = fixtures::account();
        let diagram = fixtures::diagram(2);

        group.bench_function(format!("diagram_{id}"), |b| {
            b.iter(|| {
                let rows =
                    store.list_versions(black_box(&account), VersionScope::Diagram(&diagram));
                black_box(rows.len())
            })
        });
        group.bench_function(format!("account_{id}"), |b| {
            b.iter(|| {
                let rows = store.list_versions(black_box(&account), VersionScope::Account);
                black_box(rows.len())
            })
        });
    }

    group.finish();
}

fn benches_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("versions.create");

    let store = fixtures::populated_store(Case::Small, None);
    let scene = fixtures::scene(200, 0);
    group.bench_function("memory_small", |b| {
        b.iter(|| {
            store
                .create_version(
                    &fixtures::account(),
                    &fixtures::diagram(0),
                    black_box(scene.clone()),
                    NewVersion::auto_save(),
                )
                .expect("create version")
        })
    });

    group.bench_function("io_small", |b| {
        b.iter_batched_ref(
            || {
                let tmp = TempDir::new("versions_create_io_small");
                let store = fixtures::populated_store(Case::Small, Some(DataDir::new(tmp.path())));
                (tmp, store)
            },
            |(_tmp, store)| {
                store
                    .create_version(
                        &fixtures::account(),
                        &fixtures::diagram(0),
                        black_box(scene.clone()),
                        NewVersion::auto_save(),
                    )
                    .expect("create version")
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = profiler::criterion();
    targets = benches_list, benches_create
}
criterion_main!(benches);
