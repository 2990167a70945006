// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use x509_util::{order_chain, CertPool};

fn benchmark_order(c: &mut Criterion) {
    let bundle = include_bytes!("../../trust_root/tests/data/chain-unordered.pem");

    c.bench_function("ParseBundle", |b| {
        b.iter(|| {
            let pool = CertPool::from_pem(black_box(bundle)).unwrap();
            assert_eq!(pool.len(), 3);
        });
    });

    let certs = CertPool::from_pem(bundle).unwrap().certs;
    c.bench_function("OrderChain", |b| {
        b.iter(|| {
            let chain = order_chain(black_box(certs.clone())).unwrap();
            assert_eq!(chain.len(), 3);
        });
    });
}

criterion_group!(benches, benchmark_order);
criterion_main!(benches);
