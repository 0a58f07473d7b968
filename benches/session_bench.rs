// Copyright (c) 2026 Bountyy Oy. All rights reserved.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sessionjar::{merge, CookieJar, KeyValues, OrderedMap, Override, Overrides, RequestOptions, Session};

fn overrides(n: usize, offset: usize) -> Overrides<String, String> {
    KeyValues::Map(
        (0..n)
            .map(|i| (format!("key-{}", i + offset), Override::Set(format!("value-{}", i))))
            .collect::<OrderedMap<_, _>>(),
    )
}

fn merge_benchmark(c: &mut Criterion) {
    let default = overrides(32, 0);
    let mut local = overrides(8, 28);
    if let KeyValues::Map(map) = &mut local {
        map.insert("key-0".to_string(), Override::Unset);
    }

    c.bench_function("merge_32_defaults_8_overrides", |b| {
        b.iter(|| {
            let merged = merge(black_box(Some(local.clone())), black_box(Some(default.clone())));
            black_box(merged)
        })
    });
}

fn cookie_reconciliation_benchmark(c: &mut Criterion) {
    let jar = CookieJar::from_mapping((0..50).map(|i| (format!("c{}", i), "v".to_string())));
    let session = Session::builder().cookies(jar).build().unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("build_request_50_session_cookies", |b| {
        b.iter(|| {
            let opts = RequestOptions::new()
                .cookie("call", "1")
                .unset_cookie("c3")
                .header("X-Bench", "1")
                .return_response(false);
            let outcome = runtime.block_on(session.get("https://example.com/", opts));
            black_box(outcome)
        })
    });
}

criterion_group!(benches, merge_benchmark, cookie_reconciliation_benchmark);
criterion_main!(benches);
