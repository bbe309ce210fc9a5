#![allow(missing_docs)]

use std::sync::Arc;

use serial_test::serial;
use tilestore::array::{
    Array, ArraySchemaBuilder, ArrayType, Attribute, AttributeBuffer, DataType, Dimension,
    QueryLayout, QueryOptions, QueryRegion, ReadQuery, Subarray, WriteBatch,
};
use tilestore::concurrency::{
    ThreadPoolInitError, init_thread_pool, thread_pool, thread_pool_thread_count,
};
use tilestore::config::global_config_mut;
use tilestore::storage::store::MemoryStore;

#[test]
#[serial]
fn thread_pool_init_conflict() {
    init_thread_pool(4).unwrap();
    assert_eq!(thread_pool_thread_count(), Some(4));
    init_thread_pool(4).unwrap();
    assert!(matches!(
        init_thread_pool(8),
        Err(ThreadPoolInitError::ConfigConflict {
            requested: 8,
            configured: 4
        })
    ));
    assert_eq!(thread_pool().unwrap().current_num_threads(), 4);
}

#[test]
#[serial]
fn thread_pool_array_concurrent_targets() -> Result<(), Box<dyn std::error::Error>> {
    init_thread_pool(4)?;

    let mut builder = ArraySchemaBuilder::new(ArrayType::Dense);
    builder
        .dimension(Dimension::new("x", DataType::Int64, [0, 9999], Some(100)))
        .attribute(Attribute::new("a", DataType::UInt64));
    let array = Array::create(Arc::new(MemoryStore::new()), "/", builder.build()?)?;
    let elements: Vec<u64> = (0..10_000).collect();
    let batch = WriteBatch::new(QueryLayout::RowMajor)
        .with_attribute("a", AttributeBuffer::from_elements(&elements));
    let query = ReadQuery::new(
        QueryRegion::Subarray(Subarray::new(vec![[0, 9999]])),
        QueryLayout::RowMajor,
    );

    for concurrent_target in [1, 3, 64] {
        let options = QueryOptions::default().with_concurrent_target(concurrent_target);
        let fragment = array.write_opt(&batch, &options)?;
        assert_eq!(fragment.tile_count(), 100);
        let result = array.read_opt(&query, &options)?;
        assert_eq!(result.buffer("a")?.to_elements::<u64>()?, elements);
    }

    global_config_mut().set_tile_concurrent_target(Some(2));
    let result = array.read(&query)?;
    assert_eq!(result.buffer("a")?.to_elements::<u64>()?, elements);
    global_config_mut().set_tile_concurrent_target(None);
    assert_eq!(thread_pool_thread_count(), Some(4));
    Ok(())
}
