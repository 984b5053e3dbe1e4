//! Chunked encryption throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tessera_mail::{decrypt_bytes, encrypt_bytes, EncryptionKeypair};

fn bench_chunked(c: &mut Criterion) {
    let pair = EncryptionKeypair::generate(2048).expect("key generation");
    let mut group = c.benchmark_group("chunked");

    for len in [0usize, 190, 2000, 16 * 1024] {
        let plaintext = vec![0x5au8; len];
        let ciphertext = encrypt_bytes(&pair.public, &plaintext).expect("encrypt");
        group.throughput(Throughput::Bytes(len as u64));

        group.bench_with_input(BenchmarkId::new("encrypt", len), &plaintext, |b, p| {
            b.iter(|| encrypt_bytes(&pair.public, black_box(p)))
        });
        group.bench_with_input(BenchmarkId::new("decrypt", len), &ciphertext, |b, ct| {
            b.iter(|| decrypt_bytes(&pair.private, black_box(ct)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chunked);
criterion_main!(benches);
