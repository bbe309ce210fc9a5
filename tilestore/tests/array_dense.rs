#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use tilestore::array::{
    Array, ArrayError, ArraySchema, ArraySchemaBuilder, ArrayType, Attribute, AttributeBuffer,
    BufferSizeMismatchError, COORDS, CellValNum, DataType, Dimension, OutputBuffer, OutputSize,
    QueryLayout, QueryRegion, ReadQuery, Subarray, WriteBatch,
};
use tilestore::codec::{
    Compressor, GzipCompressor, Lz4Compressor, ShuffleCompressor, ZstdCompressor,
};
use tilestore::storage::storage_adapter::performance_metrics::PerformanceMetricsStorageAdapter;
use tilestore::storage::store::MemoryStore;

/// A 4x4 array with 2x2 tiles.
fn schema_2d() -> ArraySchema {
    let mut builder = ArraySchemaBuilder::new(ArrayType::Dense);
    builder
        .dimension(Dimension::new("rows", DataType::Int32, [1, 4], Some(2)))
        .dimension(Dimension::new("cols", DataType::Int32, [1, 4], Some(2)))
        .attribute(Attribute::new("a", DataType::Int32).with_fill_value((-1i32).to_ne_bytes().to_vec()))
        .attribute(
            Attribute::new("s", DataType::Char)
                .with_cell_val_num(CellValNum::Var)
                .with_fill_value(b"?".to_vec()),
        );
    builder.build().unwrap()
}

fn batch(layout: QueryLayout, subarray: Option<Vec<[i64; 2]>>, a: &[i32]) -> WriteBatch {
    let s: Vec<String> = a.iter().map(ToString::to_string).collect();
    let batch = WriteBatch::new(layout)
        .with_attribute("a", AttributeBuffer::from_elements(a))
        .with_attribute("s", AttributeBuffer::from_strings(&s));
    match subarray {
        Some(ranges) => batch.with_subarray(Subarray::new(ranges)),
        None => batch,
    }
}

fn query(ranges: Vec<[i64; 2]>, layout: QueryLayout) -> ReadQuery {
    ReadQuery::new(QueryRegion::Subarray(Subarray::new(ranges)), layout)
}

fn full_domain() -> Vec<[i64; 2]> {
    vec![[1, 4], [1, 4]]
}

#[test]
fn array_dense_read_layouts() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = Array::create(store, "/dense", schema_2d())?;
    let elements: Vec<i32> = (1..=16).collect();
    let fragment = array.write(&batch(QueryLayout::RowMajor, None, &elements))?;
    assert_eq!(fragment.tile_count(), 4);
    assert_eq!(fragment.non_empty_domain(), &Subarray::new(full_domain()));

    let result = array.read(&query(full_domain(), QueryLayout::RowMajor))?;
    assert_eq!(result.cell_count(), 16);
    assert_eq!(result.buffer("a")?.to_elements::<i32>()?, elements);
    assert_eq!(
        result.buffer("s")?.to_strings(),
        elements.iter().map(ToString::to_string).collect::<Vec<_>>()
    );

    let result = array.read(&query(full_domain(), QueryLayout::ColMajor).with_attributes(["a"]))?;
    assert_eq!(
        result.buffer("a")?.to_elements::<i32>()?,
        vec![1, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15, 4, 8, 12, 16]
    );

    let result =
        array.read(&query(full_domain(), QueryLayout::GlobalOrder).with_attributes(["a"]))?;
    assert_eq!(
        result.buffer("a")?.to_elements::<i32>()?,
        vec![1, 2, 5, 6, 3, 4, 7, 8, 9, 10, 13, 14, 11, 12, 15, 16]
    );

    let result = array.read(&query(vec![[2, 3], [3, 4]], QueryLayout::RowMajor))?;
    assert_eq!(result.buffer("a")?.to_elements::<i32>()?, vec![7, 8, 11, 12]);
    assert_eq!(result.buffer("s")?.to_strings(), vec!["7", "8", "11", "12"]);
    Ok(())
}

#[test]
fn array_dense_write_layouts() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = Array::create(store, "/dense", schema_2d())?;

    // (1,1) (2,1) (1,2) (2,2) (1,3) (2,3)
    array.write(&batch(
        QueryLayout::ColMajor,
        Some(vec![[1, 2], [1, 3]]),
        &[11, 21, 12, 22, 13, 23],
    ))?;
    let result = array.read(&query(vec![[1, 2], [1, 3]], QueryLayout::RowMajor))?;
    assert_eq!(
        result.buffer("a")?.to_elements::<i32>()?,
        vec![11, 12, 13, 21, 22, 23]
    );

    let global: Vec<i32> = vec![1, 2, 5, 6, 3, 4, 7, 8, 9, 10, 13, 14, 11, 12, 15, 16];
    array.write(&batch(QueryLayout::GlobalOrder, None, &global))?;
    let result = array.read(&query(full_domain(), QueryLayout::RowMajor))?;
    assert_eq!(
        result.buffer("a")?.to_elements::<i32>()?,
        (1..=16).collect::<Vec<i32>>()
    );
    Ok(())
}

#[test]
fn array_dense_fill_and_shadowing() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = Array::create(store, "/dense", schema_2d())?;

    let result = array.read(&query(full_domain(), QueryLayout::RowMajor))?;
    assert!(result.is_empty());
    assert!(result.buffer("a")?.values().is_empty());

    array.write(&batch(
        QueryLayout::RowMajor,
        Some(vec![[1, 2], [1, 2]]),
        &[1, 2, 3, 4],
    ))?;

    // no cell of the region has been written
    let result = array.read(&query(vec![[3, 4], [3, 4]], QueryLayout::RowMajor))?;
    assert!(result.is_empty());

    let result = array.read(&query(vec![[2, 3], [2, 3]], QueryLayout::RowMajor))?;
    assert_eq!(result.cell_count(), 4);
    assert_eq!(result.buffer("a")?.to_elements::<i32>()?, vec![4, -1, -1, -1]);
    assert_eq!(result.buffer("s")?.to_strings(), vec!["4", "?", "?", "?"]);

    array.write(&batch(
        QueryLayout::RowMajor,
        Some(vec![[2, 3], [2, 3]]),
        &[100, 101, 102, 103],
    ))?;
    assert_eq!(array.non_empty_domain(), Some(Subarray::new(vec![[1, 3], [1, 3]])));
    let result = array.read(&query(vec![[1, 3], [1, 3]], QueryLayout::RowMajor).with_attributes(["a"]))?;
    assert_eq!(
        result.buffer("a")?.to_elements::<i32>()?,
        vec![1, 2, -1, 3, 100, 101, -1, 102, 103]
    );
    Ok(())
}

#[test]
fn array_dense_coordinate_reads() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = Array::create(store, "/dense", schema_2d())?;
    array.write(&batch(
        QueryLayout::RowMajor,
        Some(vec![[1, 2], [1, 2]]),
        &[1, 2, 3, 4],
    ))?;

    let points = QueryRegion::Coordinates(vec![vec![2, 1], vec![4, 4], vec![1, 2]]);
    let result = array.read(&ReadQuery::new(points, QueryLayout::Unordered).with_attributes(["a", COORDS]))?;
    assert_eq!(result.cell_count(), 3);
    assert_eq!(result.buffer("a")?.to_elements::<i32>()?, vec![3, -1, 2]);
    assert_eq!(
        result.buffer(COORDS)?.to_elements::<i32>()?,
        vec![2, 1, 4, 4, 1, 2]
    );

    let outside = QueryRegion::Coordinates(vec![vec![0, 1]]);
    assert!(matches!(
        array.read(&ReadQuery::new(outside, QueryLayout::Unordered)),
        Err(ArrayError::InvalidQueryRegion(_))
    ));
    Ok(())
}

#[test]
fn array_dense_read_into() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = Array::create(store, "/dense", schema_2d())?;
    array.write(&batch(QueryLayout::RowMajor, None, &(1..=16).collect::<Vec<_>>()))?;
    let row = query(vec![[1, 1], [1, 4]], QueryLayout::RowMajor);

    let mut a = vec![0u8; 8];
    let mut outputs = BTreeMap::from([("a".to_string(), OutputBuffer::Fixed(&mut a))]);
    let err = array.read_into(&row.clone().with_attributes(["a"]), &mut outputs);
    assert!(matches!(
        err,
        Err(ArrayError::BufferSizeMismatchError(
            BufferSizeMismatchError::OutputTooSmall {
                required: 16,
                provided: 8,
                ..
            }
        ))
    ));
    drop(outputs);
    assert_eq!(a, vec![0; 8]);

    let mut a = vec![0u8; 32];
    let mut offsets = vec![0u64; 4];
    let mut values = vec![0u8; 16];
    let mut outputs = BTreeMap::from([
        ("a".to_string(), OutputBuffer::Fixed(&mut a)),
        (
            "s".to_string(),
            OutputBuffer::Variable {
                offsets: &mut offsets,
                values: &mut values,
            },
        ),
    ]);
    let sizes = array.read_into(&row, &mut outputs)?;
    drop(outputs);
    assert_eq!(sizes.cell_count, 4);
    assert_eq!(
        sizes.sizes["a"],
        OutputSize {
            values: 16,
            offsets: None
        }
    );
    assert_eq!(
        sizes.sizes["s"],
        OutputSize {
            values: 4,
            offsets: Some(4)
        }
    );
    assert_eq!(bytemuck::pod_collect_to_vec::<u8, i32>(&a[..16]), vec![1, 2, 3, 4]);
    assert_eq!(offsets, vec![0, 1, 2, 3]);
    assert_eq!(&values[..4], b"1234");
    Ok(())
}

#[test]
fn array_dense_reads_only_overlapping_tiles() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let store_perf = Arc::new(PerformanceMetricsStorageAdapter::new(store));
    let array = Array::create(store_perf.clone(), "/dense", schema_2d())?;
    array.write(&batch(QueryLayout::RowMajor, None, &(1..=16).collect::<Vec<_>>()))?;

    store_perf.reset();
    array.read(&query(vec![[1, 2], [1, 2]], QueryLayout::RowMajor).with_attributes(["a"]))?;
    assert_eq!(store_perf.reads(), 1);

    store_perf.reset();
    array.read(&query(vec![[2, 3], [2, 3]], QueryLayout::RowMajor).with_attributes(["a"]))?;
    assert_eq!(store_perf.reads(), 4);

    // a variable length tile is an offsets tile and a values tile
    store_perf.reset();
    array.read(&query(vec![[3, 4], [3, 4]], QueryLayout::RowMajor))?;
    assert_eq!(store_perf.reads(), 3);
    Ok(())
}

#[test]
fn array_dense_read_outside_written_cells_is_empty() -> Result<(), Box<dyn std::error::Error>> {
    const UPPER: i64 = (1 << 24) - 1;
    let mut builder = ArraySchemaBuilder::new(ArrayType::Dense);
    builder
        .dimension(Dimension::new("rows", DataType::Int64, [0, UPPER], Some(16)))
        .dimension(Dimension::new("cols", DataType::Int64, [0, UPPER], Some(16)))
        .attribute(Attribute::new("a", DataType::Int64));
    let store = Arc::new(MemoryStore::new());
    let store_perf = Arc::new(PerformanceMetricsStorageAdapter::new(store));
    let array = Array::create(store_perf.clone(), "/dense", builder.build()?)?;

    // an empty array over a domain far too large to visit cell by cell
    let result = array.read(&query(vec![[0, UPPER], [0, UPPER]], QueryLayout::RowMajor))?;
    assert!(result.is_empty());
    assert!(result.buffer("a")?.values().is_empty());

    array.write(
        &WriteBatch::new(QueryLayout::RowMajor)
            .with_subarray(Subarray::new(vec![[0, 1], [0, 1]]))
            .with_attribute("a", AttributeBuffer::from_elements(&[1i64, 2, 3, 4])),
    )?;

    store_perf.reset();
    for layout in [QueryLayout::RowMajor, QueryLayout::GlobalOrder] {
        let result = array.read(&query(vec![[2, UPPER], [0, UPPER]], layout))?;
        assert!(result.is_empty());
    }
    let result = array.read(&ReadQuery::new(
        QueryRegion::Coordinates(vec![vec![UPPER, UPPER], vec![5, 0]]),
        QueryLayout::Unordered,
    ))?;
    assert!(result.is_empty());
    assert_eq!(store_perf.reads(), 0);

    let result = array.read(&query(vec![[1, 2], [1, 1]], QueryLayout::RowMajor))?;
    assert_eq!(result.buffer("a")?.to_elements::<i64>()?, vec![4, 0]);
    Ok(())
}

#[test]
fn array_dense_invalid_queries() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = Array::create(store, "/dense", schema_2d())?;

    assert!(matches!(
        array.write(&batch(QueryLayout::Unordered, None, &[0; 16])),
        Err(ArrayError::InvalidLayout { .. })
    ));
    assert!(matches!(
        array.write(&batch(QueryLayout::RowMajor, None, &[0; 15])),
        Err(ArrayError::BufferSizeMismatchError(_))
    ));
    assert!(matches!(
        array.write(&batch(QueryLayout::RowMajor, Some(vec![[0, 1], [1, 1]]), &[0; 2])),
        Err(ArrayError::CoordinateOutOfDomainError(_))
    ));
    assert!(matches!(
        array.write(&batch(QueryLayout::RowMajor, None, &[0; 16]).with_coordinates_elements(&[1i32, 1])),
        Err(ArrayError::InvalidWriteBatch(_))
    ));
    assert_eq!(array.fragment_count(), 0);

    assert!(matches!(
        array.read(&query(vec![[1, 5], [1, 4]], QueryLayout::RowMajor)),
        Err(ArrayError::InvalidQueryRegion(_))
    ));
    assert!(matches!(
        array.read(&query(vec![[1, 4]], QueryLayout::RowMajor)),
        Err(ArrayError::InvalidQueryRegion(_))
    ));
    assert!(matches!(
        array.read(&query(full_domain(), QueryLayout::RowMajor).with_attributes(["b"])),
        Err(ArrayError::UnknownAttribute(_))
    ));
    Ok(())
}

#[test]
fn array_dense_compressors() -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = ArraySchemaBuilder::new(ArrayType::Dense);
    builder
        .dimension(Dimension::new("x", DataType::Int64, [0, 999], Some(100)))
        .attribute(Attribute::new("gzip", DataType::Int64).with_compressor(Compressor::Gzip(GzipCompressor::new(6)?)))
        .attribute(Attribute::new("zstd", DataType::Float32).with_compressor(Compressor::Zstd(ZstdCompressor::new(5)?)))
        .attribute(Attribute::new("lz4", DataType::UInt16).with_compressor(Compressor::Lz4(Lz4Compressor::new())))
        .attribute(
            Attribute::new("shuffle", DataType::Float64).with_compressor(Compressor::Shuffle(
                ShuffleCompressor::new(Compressor::Zstd(ZstdCompressor::new(1)?))?,
            )),
        )
        .attribute(
            Attribute::new("pairs", DataType::Int32)
                .with_cell_val_num(CellValNum::Fixed(2))
                .with_compressor(Compressor::Lz4(Lz4Compressor::new())),
        );
    let store = Arc::new(MemoryStore::new());
    let array = Array::create(store, "/compressed", builder.build()?)?;

    let gzip: Vec<i64> = (0..1000).map(|i| i * 3).collect();
    let zstd: Vec<f32> = (0..1000).map(|i| i as f32 / 4.0).collect();
    let lz4: Vec<u16> = (0..1000).map(|i| (i % 7) as u16).collect();
    let shuffle: Vec<f64> = (0..1000).map(|i| f64::from(i).sqrt()).collect();
    let pairs: Vec<i32> = (0..2000).collect();
    let fragment = array.write(
        &WriteBatch::new(QueryLayout::RowMajor)
            .with_attribute("gzip", AttributeBuffer::from_elements(&gzip))
            .with_attribute("zstd", AttributeBuffer::from_elements(&zstd))
            .with_attribute("lz4", AttributeBuffer::from_elements(&lz4))
            .with_attribute("shuffle", AttributeBuffer::from_elements(&shuffle))
            .with_attribute("pairs", AttributeBuffer::from_elements(&pairs)),
    )?;
    assert_eq!(fragment.tile_count(), 10);
    let lz4_region = &fragment.metadata().attributes["lz4"].fixed;
    assert_eq!(lz4_region.tiles.len(), 10);
    assert!(lz4_region.tiles.iter().all(|tile| tile.uncompressed_size == 200));

    let result = array.read(&query(vec![[0, 999]], QueryLayout::RowMajor))?;
    assert_eq!(result.buffer("gzip")?.to_elements::<i64>()?, gzip);
    assert_eq!(result.buffer("zstd")?.to_elements::<f32>()?, zstd);
    assert_eq!(result.buffer("lz4")?.to_elements::<u16>()?, lz4);
    assert_eq!(result.buffer("shuffle")?.to_elements::<f64>()?, shuffle);
    assert_eq!(result.buffer("pairs")?.to_elements::<i32>()?, pairs);

    let result = array.read(&query(vec![[150, 151]], QueryLayout::RowMajor).with_attributes(["pairs"]))?;
    assert_eq!(result.buffer("pairs")?.to_elements::<i32>()?, vec![300, 301, 302, 303]);
    Ok(())
}
