//! `tilestore` is a Rust library for storing dense and sparse multidimensional arrays as collections of compressed tiles.
//!
//! An [`Array`](array::Array) is described by an [`ArraySchema`](array::ArraySchema): an ordered set of integer [dimensions](array::Dimension) with a domain and optional tile extent, an ordered set of [attributes](array::Attribute) holding fixed or variable length cells, and a cell and tile order.
//!
//! Every write produces one immutable *fragment*:
//! - cells are assigned to tiles (dense arrays by the regular tile grid, sparse arrays by sorting into the global cell order and splitting into tiles of at most `capacity` cells),
//! - each tile is filled and compressed in parallel on a bounded [thread pool](concurrency),
//! - compressed tiles are persisted one region per attribute and dimension, and
//! - the fragment metadata is written last, so a failed write never leaves a visible partial fragment.
//!
//! Reads select the tiles of each fragment that overlap a [`QueryRegion`](array::QueryRegion), decompress them in parallel, and resolve every cell from the newest fragment that holds it.
//!
//! ## Storage
//! Arrays are persisted in any store implementing the [`storage`] traits, such as the in-memory [`MemoryStore`](storage::store::MemoryStore) or the [`FilesystemStore`](filesystem::FilesystemStore) (with the `filesystem` feature).
//!
//! ```text
//! <array>/__array_schema.json
//! <array>/__<timestamp>_<pid>/__fragment_metadata.json
//! <array>/__<timestamp>_<pid>/<attribute>.tdb
//! <array>/__<timestamp>_<pid>/<attribute>_var.tdb
//! <array>/__<timestamp>_<pid>/__coords_<dimension>.tdb
//! ```
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use tilestore::array::{
//!     Array, ArraySchemaBuilder, ArrayType, Attribute, AttributeBuffer, DataType, Dimension,
//!     QueryLayout, QueryRegion, ReadQuery, Subarray, WriteBatch,
//! };
//! use tilestore::storage::store::MemoryStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let schema = ArraySchemaBuilder::new(ArrayType::Sparse)
//!     .dimension(Dimension::new("d", DataType::Int64, [1, 10], Some(5)))
//!     .attribute(Attribute::new("a", DataType::Int32))
//!     .capacity(2)
//!     .build()?;
//! let array = Array::create(store, "/array", schema)?;
//!
//! let batch = WriteBatch::new(QueryLayout::Unordered)
//!     .with_coordinates_elements(&[3i64, 1, 2])
//!     .with_attribute("a", AttributeBuffer::from_elements(&[30i32, 10, 20]));
//! array.write(&batch)?;
//!
//! let query = ReadQuery::new(QueryRegion::Subarray(Subarray::new(vec![[1, 3]])), QueryLayout::RowMajor)
//!     .with_attributes(["a"]);
//! let result = array.read(&query)?;
//! assert_eq!(result.buffer("a")?.to_elements::<i32>()?, vec![10, 20, 30]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `filesystem`: Re-export `tilestore_filesystem` as `tilestore::filesystem`.
//!  - `gzip`, `lz4`, `zstd`: Enable the corresponding compressors.
//!
//! #### Optional
//!  - `bz2`: Enable the bz2 compressor.
//!
//! ## Licence
//! `tilestore` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array;
pub mod concurrency;
pub mod config;

#[cfg(feature = "filesystem")]
pub use tilestore_filesystem as filesystem;
pub use tilestore_codec as codec;
pub use tilestore_storage as storage;
