// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use criterion::Criterion;

use pprof::criterion::{Output, PProfProfiler};

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|raw| raw.trim().parse::<T>().ok()).unwrap_or(default)
}

/// Criterion settings for the bench suite. `EASEL_BENCH_PROFILE=0` turns the flamegraph
/// profiler off; the other knobs clamp to sane ranges.
pub fn criterion() -> Criterion {
    let sample_size = env_parse("EASEL_BENCH_SAMPLE_SIZE", 60usize).clamp(10, 200);
    let warmup_secs = env_parse("EASEL_BENCH_WARMUP_SECS", 3u64).clamp(1, 60);
    let measurement_secs = env_parse("EASEL_BENCH_MEASUREMENT_SECS", 5u64).clamp(1, 120);

    let criterion = Criterion::default()
        .sample_size(sample_size)
        .warm_up_time(Duration::from_secs(warmup_secs))
        .measurement_time(Duration::from_secs(measurement_secs));

    if env_parse("EASEL_BENCH_PROFILE", 1u8) == 0 {
        return criterion;
    }
    let frequency = env_parse("EASEL_BENCH_PROFILE_FREQ", 100i32).clamp(1, 1000);
    criterion.with_profiler(PProfProfiler::new(frequency, Output::Flamegraph(None)))
}
