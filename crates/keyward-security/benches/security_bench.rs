// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for AES-GCM and the wrapped key codec in the
// keyward-security crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use keyward_core::types::{AuthorizationList, KeyFormat};
use keyward_security::{KeyDescription, WrappedKeyBundle, aead, authlist};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// AES-256-GCM seal then open at payload sizes from a short token to 1 MiB.
fn bench_aes_gcm_roundtrip(c: &mut Criterion) {
    let key = [0x42u8; 32];
    let iv = [0u8; 12];
    let sizes: &[(&str, usize)] = &[
        ("64 B", 64),
        ("10 KiB", 10 * 1024),
        ("1 MiB", 1024 * 1024),
    ];

    let mut group = c.benchmark_group("aes_gcm_roundtrip");
    for &(label, size) in sizes {
        let plaintext = vec![0xABu8; size];
        group.bench_function(label, |b| {
            b.iter(|| {
                let sealed = aead::seal(&key, &iv, b"", black_box(&plaintext)).expect("seal failed");
                let opened = aead::open(&key, &iv, b"", &sealed).expect("open failed");
                black_box(opened);
            });
        });
    }
    group.finish();
}

/// Encoding plus strict decoding of the AES-GCM import list.
fn bench_authlist_codec(c: &mut Criterion) {
    let list = AuthorizationList::aes_gcm_import(256, true);
    c.bench_function("authlist encode+decode", |b| {
        b.iter(|| {
            let der = authlist::encode(black_box(&list));
            let decoded = authlist::decode(&der).expect("decode failed");
            black_box(decoded);
        });
    });
}

/// Parsing a bundle with a 2048-bit transport key.
fn bench_bundle_parse(c: &mut Criterion) {
    let bundle = WrappedKeyBundle::new(
        vec![0x11; 256],
        [0x22; 12],
        KeyDescription::new(KeyFormat::Raw, AuthorizationList::aes_gcm_import(256, true)),
        vec![0x33; 32],
        [0x44; 16],
    );
    let der = bundle.to_der();

    c.bench_function("bundle from_der", |b| {
        b.iter(|| {
            let parsed = WrappedKeyBundle::from_der(black_box(&der)).expect("parse failed");
            black_box(parsed);
        });
    });
}

criterion_group!(
    benches,
    bench_aes_gcm_roundtrip,
    bench_authlist_codec,
    bench_bundle_parse,
);
criterion_main!(benches);
