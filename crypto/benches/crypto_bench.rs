use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use dpos_crypto::{
    blake2b_256, hash_block_header, keypair_from_seed, sign_message, verify_signature,
};

fn header_sign_bench(c: &mut Criterion) {
    let kp = keypair_from_seed(&[1u8; 32]);
    let header = [42u8; 112];

    c.bench_function("sign_block_header", |b| {
        b.iter(|| sign_message(black_box(&header), &kp.private))
    });
}

/// Verifying every signature of a block is the dominant cost of a push.
fn block_signature_batch_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify_transaction_signatures");
    for count in [1usize, 10, 100] {
        let signed: Vec<_> = (0..count)
            .map(|i| {
                let kp = keypair_from_seed(&[(i % 251) as u8; 32]);
                let digest = blake2b_256(&i.to_le_bytes());
                let sig = sign_message(&digest, &kp.private);
                (digest, sig, kp.public)
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &signed, |b, signed| {
            b.iter(|| {
                signed
                    .iter()
                    .all(|(digest, sig, key)| verify_signature(black_box(digest), sig, key))
            })
        });
    }
    group.finish();
}

fn header_hash_bench(c: &mut Criterion) {
    let header_bytes = vec![0xFFu8; 112];

    c.bench_function("hash_block_header", |b| {
        b.iter(|| hash_block_header(black_box(&header_bytes)))
    });
}

fn transaction_hash_1kb_bench(c: &mut Criterion) {
    let data = vec![0xCDu8; 1024];

    c.bench_function("blake2b_256_1KB", |b| b.iter(|| blake2b_256(black_box(&data))));
}

criterion_group!(
    benches,
    header_sign_bench,
    block_signature_batch_bench,
    header_hash_bench,
    transaction_hash_1kb_bench,
);
criterion_main!(benches);
