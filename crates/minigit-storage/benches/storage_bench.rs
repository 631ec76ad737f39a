//! Storage benchmarks for Minigit.
//!
//! Benchmarks critical storage operations including:
//! - Object hashing at various sizes
//! - Loose object write/read through the on-disk store
//! - Compression/decompression performance
//! - Tree encoding and decoding

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use minigit_storage::compression::{self, CompressionLevel};
use minigit_storage::{Blob, EntryMode, Object, ObjectId, ObjectStore, ObjectType, Tree, TreeEntry};
use std::hint::black_box;
use tempfile::TempDir;

/// Generate test data of specified size
fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Benchmark object hashing
fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing");

    for size in [1_024, 10_240, 102_400, 1_048_576].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("sha1", size), size, |b, &size| {
            let data = generate_data(size);
            b.iter(|| black_box(ObjectId::hash_object(ObjectType::Blob, &data)));
        });
    }

    group.finish();
}

/// Benchmark loose object writes
fn bench_object_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("object_store_write");

    for size in [1_024, 10_240, 102_400].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("write", size), size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let store = ObjectStore::new(dir.path());
            let mut data = generate_data(size);
            let mut counter = 0u64;

            b.iter(|| {
                // distinct content every iteration so the write is not skipped
                counter += 1;
                data[..8].copy_from_slice(&counter.to_le_bytes());
                let object = Object::from(Blob::new(data.clone()));
                black_box(store.write(&object).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark loose object reads
fn bench_object_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("object_store_read");

    for size in [1_024, 10_240, 102_400].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("read", size), size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let store = ObjectStore::new(dir.path());
            let id = store
                .write(&Object::from(Blob::new(generate_data(size))))
                .unwrap();

            b.iter(|| black_box(store.read(&id).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark object compression
fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");

    for size in [1_024, 10_240, 102_400, 1_048_576].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("compress", size), size, |b, &size| {
            let raw = Object::from(Blob::new(generate_data(size))).encode();
            b.iter(|| black_box(compression::compress(&raw, CompressionLevel::Default).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("decompress", size), size, |b, &size| {
            let raw = Object::from(Blob::new(generate_data(size))).encode();
            let compressed = compression::compress(&raw, CompressionLevel::Default).unwrap();
            b.iter(|| black_box(compression::decompress(&compressed).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark tree construction and parsing
fn bench_tree_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_codec");

    for count in [10, 100, 1_000].iter() {
        let entries: Vec<_> = (0..*count)
            .map(|i| {
                let blob = Blob::new(format!("file {}", i).into_bytes());
                TreeEntry::new(EntryMode::File, format!("file-{:05}.txt", i), *blob.id())
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("build", count), &entries, |b, entries| {
            b.iter(|| black_box(Tree::new(entries.clone()).unwrap()));
        });

        let data = Tree::new(entries).unwrap().data().clone();
        group.bench_with_input(BenchmarkId::new("decode", count), &data, |b, data| {
            b.iter(|| black_box(Tree::decode(data.clone()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_hashing,
    bench_object_write,
    bench_object_read,
    bench_compression,
    bench_tree_codec,
);

criterion_main!(benches);
