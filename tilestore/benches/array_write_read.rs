//! Benchmark dense and sparse array writes and reads.
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tilestore::array::{
    Array, ArraySchema, ArraySchemaBuilder, ArrayType, Attribute, AttributeBuffer, DataType,
    Dimension, QueryLayout, QueryRegion, ReadQuery, Subarray, WriteBatch,
};
use tilestore::codec::{Compressor, Lz4Compressor};
use tilestore::storage::store::MemoryStore;

fn dense_schema(size: i64, compressor: Compressor) -> ArraySchema {
    let mut builder = ArraySchemaBuilder::new(ArrayType::Dense);
    builder
        .dimension(Dimension::new("y", DataType::Int64, [0, size - 1], Some(64)))
        .dimension(Dimension::new("x", DataType::Int64, [0, size - 1], Some(64)))
        .attribute(Attribute::new("a", DataType::UInt16).with_compressor(compressor));
    builder.build().unwrap()
}

fn sparse_schema(size: i64) -> ArraySchema {
    let mut builder = ArraySchemaBuilder::new(ArrayType::Sparse);
    builder
        .dimension(Dimension::new("y", DataType::Int64, [0, size - 1], Some(64)))
        .dimension(Dimension::new("x", DataType::Int64, [0, size - 1], Some(64)))
        .attribute(Attribute::new("a", DataType::UInt16))
        .capacity(4096);
    builder.build().unwrap()
}

fn dense_batch(size: i64) -> WriteBatch {
    let data = vec![1u16; (size * size).try_into().unwrap()];
    WriteBatch::new(QueryLayout::RowMajor).with_attribute("a", AttributeBuffer::from_elements(&data))
}

/// Every other cell of a `size` squared domain, in reverse order.
fn sparse_batch(size: i64) -> WriteBatch {
    let coordinates: Vec<i64> = (0..size)
        .rev()
        .flat_map(|y| (0..size).rev().step_by(2).flat_map(move |x| [y, x]))
        .collect();
    let data = vec![1u16; coordinates.len() / 2];
    WriteBatch::new(QueryLayout::Unordered)
        .with_coordinates_elements(&coordinates)
        .with_attribute("a", AttributeBuffer::from_elements(&data))
}

fn all_cells(size: i64) -> ReadQuery {
    ReadQuery::new(
        QueryRegion::Subarray(Subarray::new(vec![[0, size - 1]; 2])),
        QueryLayout::RowMajor,
    )
}

fn array_write_dense(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_write_dense");
    for size in [256i64, 512, 1024] {
        group.throughput(Throughput::Bytes((size * size * 2).try_into().unwrap()));
        let batch = dense_batch(size);
        for (name, compressor) in [
            ("none", Compressor::None),
            ("lz4", Compressor::Lz4(Lz4Compressor::new())),
        ] {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                b.iter(|| {
                    let store = Arc::new(MemoryStore::new());
                    let array =
                        Array::create(store, "/", dense_schema(size, compressor.clone())).unwrap();
                    array.write(&batch).unwrap();
                });
            });
        }
    }
    group.finish();
}

fn array_read_dense(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_read_dense");
    for size in [256i64, 512, 1024] {
        group.throughput(Throughput::Bytes((size * size * 2).try_into().unwrap()));
        let store = Arc::new(MemoryStore::new());
        let array = Array::create(store, "/", dense_schema(size, Compressor::None)).unwrap();
        array.write(&dense_batch(size)).unwrap();
        let query = all_cells(size);
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| array.read(&query).unwrap());
        });
    }
    group.finish();
}

fn array_write_read_sparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_write_read_sparse");
    for size in [256i64, 512] {
        group.throughput(Throughput::Elements((size * size / 2).try_into().unwrap()));
        let batch = sparse_batch(size);
        group.bench_with_input(BenchmarkId::new("write", size), &size, |b, &size| {
            b.iter(|| {
                let store = Arc::new(MemoryStore::new());
                let array = Array::create(store, "/", sparse_schema(size)).unwrap();
                array.write(&batch).unwrap();
            });
        });

        let store = Arc::new(MemoryStore::new());
        let array = Array::create(store, "/", sparse_schema(size)).unwrap();
        array.write(&batch).unwrap();
        let query = all_cells(size);
        group.bench_function(BenchmarkId::new("read", size), |b| {
            b.iter(|| array.read(&query).unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    array_write_dense,
    array_read_dense,
    array_write_read_sparse
);
criterion_main!(benches);
