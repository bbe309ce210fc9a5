//! Fragments: the immutable result of one write.
//!
//! A fragment is stored under its own prefix of the array:
//! ```text
//! __<timestamp>_<pid>/__fragment_metadata.json
//! __<timestamp>_<pid>/<attribute>.tdb
//! __<timestamp>_<pid>/<attribute>_var.tdb
//! __<timestamp>_<pid>/__coords_<dimension>.tdb
//! ```
//! Each region holds the compressed tiles of the fragment in tile order.
//! A fixed length attribute has one region, a variable length attribute an offsets region (`<attribute>.tdb`) and a values region (`<attribute>_var.tdb`).
//! Sparse fragments hold one coordinates region per dimension.
//!
//! The metadata is written after every region, so a prefix without metadata is not a fragment.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use tilestore_storage::{ReadableStorageTraits, StoreKey, StorePrefix};

use super::{ArrayCreateError, ArraySchema, ArrayType, Subarray};

/// The name of the fragment metadata key.
pub const FRAGMENT_METADATA_KEY: &str = "__fragment_metadata.json";

/// The fragment metadata format version written by this crate.
pub const FRAGMENT_FORMAT_VERSION: u32 = 1;

/// The location of one compressed tile in a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLocation {
    /// The byte offset of the tile in the region.
    pub offset: u64,
    /// The compressed size in bytes.
    pub compressed_size: u64,
    /// The uncompressed size in bytes.
    pub uncompressed_size: u64,
}

/// A region of a fragment: the compressed tiles of one attribute, offsets, or dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMetadata {
    /// The key of the region relative to the fragment prefix.
    pub key: String,
    /// The tiles, in tile order.
    pub tiles: Vec<TileLocation>,
}

impl RegionMetadata {
    /// The total size of the region in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.tiles.iter().map(|tile| tile.compressed_size).sum()
    }
}

/// The regions of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRegions {
    /// The fixed length cells, or the offsets of variable length cells.
    pub fixed: RegionMetadata,
    /// The values of variable length cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<RegionMetadata>,
}

/// The metadata of a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    /// The fragment metadata format version.
    pub format_version: u32,
    /// The creation timestamp in milliseconds since the unix epoch, unique within the array.
    pub timestamp: u64,
    /// The array type.
    pub array_type: ArrayType,
    /// The bounding box of every written cell.
    pub non_empty_domain: Subarray,
    /// The number of tiles.
    pub tile_count: u64,
    /// The number of cells of each tile.
    pub cell_counts: Vec<u64>,
    /// The space tile of each tile of a dense fragment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tile_ids: Vec<u64>,
    /// The minimum bounding rectangle of each tile of a sparse fragment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mbrs: Vec<Subarray>,
    /// The regions of each attribute.
    pub attributes: BTreeMap<String, AttributeRegions>,
    /// The coordinate regions of each dimension of a sparse fragment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, RegionMetadata>,
}

impl FragmentMetadata {
    /// Check the metadata is consistent with itself and `schema`.
    ///
    /// # Errors
    /// Returns a description of the first inconsistency.
    pub fn validate(&self, schema: &ArraySchema) -> Result<(), String> {
        if self.format_version != FRAGMENT_FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {}",
                self.format_version
            ));
        }
        if self.array_type != schema.array_type() {
            return Err(format!(
                "a {} fragment cannot belong to a {} array",
                self.array_type,
                schema.array_type()
            ));
        }
        let domain = schema.domain();
        if !self.non_empty_domain.is_valid() || !domain.bounds().contains_subarray(&self.non_empty_domain) {
            return Err(format!(
                "the non-empty domain {:?} is outside of the array domain",
                self.non_empty_domain.ranges()
            ));
        }
        let tile_count = usize::try_from(self.tile_count).map_err(|err| err.to_string())?;
        if self.cell_counts.len() != tile_count || self.cell_counts.contains(&0) {
            return Err("every tile must have a non-zero cell count".to_string());
        }

        if schema.is_dense() {
            let tile_ids: Vec<u64> = domain.tiles_overlapping(&self.non_empty_domain).collect();
            if tile_ids != self.tile_ids {
                return Err("the tiles do not match the non-empty domain".to_string());
            }
            for (&tile_id, &cell_count) in std::iter::zip(&self.tile_ids, &self.cell_counts) {
                let cells = domain
                    .tile_bounds(tile_id)
                    .and_then(|bounds| bounds.intersect(&self.non_empty_domain))
                    .and_then(|bounds| bounds.num_cells());
                if cells != Some(cell_count) {
                    return Err(format!("tile {tile_id} has an invalid cell count"));
                }
            }
        } else {
            if self.mbrs.len() != tile_count
                || !self
                    .mbrs
                    .iter()
                    .all(|mbr| self.non_empty_domain.contains_subarray(mbr))
            {
                return Err("every tile must have a bounding rectangle inside the non-empty domain".to_string());
            }
            if self.cell_counts.iter().any(|&count| count > schema.capacity()) {
                return Err("a tile exceeds the array capacity".to_string());
            }
            for dimension in schema.dimensions() {
                let region = self
                    .dimensions
                    .get(dimension.name())
                    .ok_or_else(|| format!("missing coordinates of dimension `{}`", dimension.name()))?;
                validate_region(region, tile_count)?;
            }
        }

        for attribute in schema.attributes() {
            let regions = self
                .attributes
                .get(attribute.name())
                .ok_or_else(|| format!("missing attribute `{}`", attribute.name()))?;
            validate_region(&regions.fixed, tile_count)?;
            match (&regions.var, attribute.is_var()) {
                (Some(var), true) => validate_region(var, tile_count)?,
                (None, false) => {}
                _ => {
                    return Err(format!(
                        "attribute `{}` has the wrong number of regions",
                        attribute.name()
                    ));
                }
            }
        }
        Ok(())
    }
}

fn validate_region(region: &RegionMetadata, tile_count: usize) -> Result<(), String> {
    if StoreKey::validate(&region.key) && !region.key.contains('/') && region.tiles.len() == tile_count {
        Ok(())
    } else {
        Err(format!("region `{}` is invalid", region.key))
    }
}

/// An immutable fragment of an array.
#[derive(Debug, Clone)]
pub struct Fragment {
    prefix: StorePrefix,
    metadata: FragmentMetadata,
}

impl Fragment {
    pub(crate) fn new(prefix: StorePrefix, metadata: FragmentMetadata) -> Self {
        Self { prefix, metadata }
    }

    /// Load the fragment under `prefix`.
    ///
    /// Returns [`None`] if there is no fragment metadata under `prefix`.
    ///
    /// # Errors
    /// Returns an [`ArrayCreateError`] if the metadata cannot be read, parsed, or is inconsistent with `schema`.
    pub fn open<TStorage: ?Sized + ReadableStorageTraits>(
        storage: &TStorage,
        prefix: StorePrefix,
        schema: &ArraySchema,
    ) -> Result<Option<Self>, ArrayCreateError> {
        let key = prefix
            .key(FRAGMENT_METADATA_KEY)
            .map_err(|err| ArrayCreateError::InvalidFragmentMetadata(err.to_string()))?;
        let Some(bytes) = storage.get(&key)? else {
            return Ok(None);
        };
        let metadata: FragmentMetadata = serde_json::from_slice(&bytes).map_err(|err| {
            ArrayCreateError::InvalidFragmentMetadata(format!("{prefix}: {err}"))
        })?;
        metadata
            .validate(schema)
            .map_err(|err| ArrayCreateError::InvalidFragmentMetadata(format!("{prefix}: {err}")))?;
        Ok(Some(Self { prefix, metadata }))
    }

    /// The fragment prefix.
    #[must_use]
    pub fn prefix(&self) -> &StorePrefix {
        &self.prefix
    }

    /// The fragment metadata.
    #[must_use]
    pub fn metadata(&self) -> &FragmentMetadata {
        &self.metadata
    }

    /// The creation timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.metadata.timestamp
    }

    /// The bounding box of every written cell.
    #[must_use]
    pub fn non_empty_domain(&self) -> &Subarray {
        &self.metadata.non_empty_domain
    }

    /// The number of tiles.
    #[must_use]
    pub fn tile_count(&self) -> u64 {
        self.metadata.tile_count
    }

    /// The store key of `region`.
    pub(crate) fn region_key(&self, region: &RegionMetadata) -> StoreKey {
        StoreKey::new_unchecked(format!("{}{}", self.prefix.as_str(), region.key))
    }
}

/// The region key of the fixed length cells or offsets of an attribute.
pub(crate) fn attribute_region_key(attribute: &str) -> String {
    format!("{attribute}.tdb")
}

/// The region key of the variable length values of an attribute.
pub(crate) fn attribute_var_region_key(attribute: &str) -> String {
    format!("{attribute}_var.tdb")
}

/// The region key of the coordinates of a dimension.
pub(crate) fn coords_region_key(dimension: &str) -> String {
    format!("__coords_{dimension}.tdb")
}

/// The name of the prefix of a fragment created at `timestamp` by this process.
pub(crate) fn fragment_name(timestamp: u64) -> String {
    format!("__{timestamp}_{}", std::process::id())
}

/// The timestamp of a fragment prefix name.
pub(crate) fn fragment_name_timestamp(name: &str) -> Option<u64> {
    let (timestamp, _) = name.strip_prefix("__")?.split_once('_')?;
    timestamp.parse().ok()
}

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// A fragment timestamp after `after` and after every timestamp previously returned in this process.
///
/// Timestamps follow the system clock in milliseconds while it increases.
pub(crate) fn next_timestamp(after: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
    let next = |last: u64| now.max(after.saturating_add(1)).max(last.saturating_add(1));
    let last = LAST_TIMESTAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(next(last)))
        .unwrap_or_else(|last| last);
    next(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{ArraySchemaBuilder, Attribute, CellValNum, DataType, Dimension};

    fn sparse_schema() -> ArraySchema {
        let mut builder = ArraySchemaBuilder::new(ArrayType::Sparse);
        builder
            .dimension(Dimension::new("d", DataType::Int64, [1, 10], Some(5)))
            .attribute(Attribute::new("a", DataType::Int32))
            .attribute(Attribute::new("s", DataType::Char).with_cell_val_num(CellValNum::Var))
            .capacity(2);
        builder.build().unwrap()
    }

    fn region(key: &str, sizes: &[u64]) -> RegionMetadata {
        let mut offset = 0;
        RegionMetadata {
            key: key.to_string(),
            tiles: sizes
                .iter()
                .map(|&size| {
                    let tile = TileLocation {
                        offset,
                        compressed_size: size,
                        uncompressed_size: size,
                    };
                    offset += size;
                    tile
                })
                .collect(),
        }
    }

    fn sparse_metadata() -> FragmentMetadata {
        FragmentMetadata {
            format_version: FRAGMENT_FORMAT_VERSION,
            timestamp: 7,
            array_type: ArrayType::Sparse,
            non_empty_domain: Subarray::new(vec![[1, 3]]),
            tile_count: 2,
            cell_counts: vec![2, 1],
            tile_ids: vec![],
            mbrs: vec![Subarray::new(vec![[1, 2]]), Subarray::new(vec![[3, 3]])],
            attributes: BTreeMap::from([
                (
                    "a".to_string(),
                    AttributeRegions {
                        fixed: region("a.tdb", &[8, 4]),
                        var: None,
                    },
                ),
                (
                    "s".to_string(),
                    AttributeRegions {
                        fixed: region("s.tdb", &[16, 8]),
                        var: Some(region("s_var.tdb", &[3, 3])),
                    },
                ),
            ]),
            dimensions: BTreeMap::from([("d".to_string(), region("__coords_d.tdb", &[16, 8]))]),
        }
    }

    #[test]
    fn fragment_metadata_validate() {
        let schema = sparse_schema();
        let metadata = sparse_metadata();
        metadata.validate(&schema).unwrap();
        assert_eq!(metadata.attributes["s"].var.as_ref().unwrap().size(), 6);

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(!json.contains("tile_ids"));
        assert_eq!(serde_json::from_str::<FragmentMetadata>(&json).unwrap(), metadata);

        let mut invalid = metadata.clone();
        invalid.cell_counts = vec![3, 0];
        assert!(invalid.validate(&schema).is_err());

        let mut invalid = metadata.clone();
        invalid.cell_counts = vec![3, 1];
        assert!(invalid.validate(&schema).is_err());

        let mut invalid = metadata.clone();
        invalid.non_empty_domain = Subarray::new(vec![[0, 3]]);
        assert!(invalid.validate(&schema).is_err());

        let mut invalid = metadata.clone();
        invalid.attributes.get_mut("s").unwrap().var = None;
        assert!(invalid.validate(&schema).is_err());

        let mut invalid = metadata.clone();
        invalid.dimensions.clear();
        assert!(invalid.validate(&schema).is_err());

        let mut invalid = metadata;
        invalid.mbrs[1] = Subarray::new(vec![[3, 4]]);
        assert!(invalid.validate(&schema).is_err());
    }

    #[test]
    fn fragment_metadata_validate_dense() {
        let mut builder = ArraySchemaBuilder::new(ArrayType::Dense);
        builder
            .dimension(Dimension::new("d", DataType::Int64, [1, 10], Some(5)))
            .attribute(Attribute::new("a", DataType::Int32));
        let schema = builder.build().unwrap();
        let mut metadata = FragmentMetadata {
            format_version: FRAGMENT_FORMAT_VERSION,
            timestamp: 1,
            array_type: ArrayType::Dense,
            non_empty_domain: Subarray::new(vec![[4, 7]]),
            tile_count: 2,
            cell_counts: vec![2, 2],
            tile_ids: vec![0, 1],
            mbrs: vec![],
            attributes: BTreeMap::from([(
                "a".to_string(),
                AttributeRegions {
                    fixed: region("a.tdb", &[8, 8]),
                    var: None,
                },
            )]),
            dimensions: BTreeMap::new(),
        };
        metadata.validate(&schema).unwrap();
        assert!(metadata.validate(&sparse_schema()).is_err());
        metadata.cell_counts = vec![1, 3];
        assert!(metadata.validate(&schema).is_err());
        metadata.cell_counts = vec![2, 2];
        metadata.tile_ids = vec![1];
        assert!(metadata.validate(&schema).is_err());
    }

    #[test]
    fn fragment_names_and_timestamps() {
        let name = fragment_name(1234);
        assert!(name.starts_with("__1234_"));
        assert_eq!(fragment_name_timestamp(&name), Some(1234));
        assert_eq!(fragment_name_timestamp("__array_schema.json"), None);
        assert_eq!(fragment_name_timestamp("1234_1"), None);

        let a = next_timestamp(0);
        let b = next_timestamp(0);
        assert!(b > a);
        let far = u64::MAX / 2;
        assert!(next_timestamp(far) > far);
        assert!(next_timestamp(0) > far);

        assert_eq!(attribute_region_key("a"), "a.tdb");
        assert_eq!(attribute_var_region_key("a"), "a_var.tdb");
        assert_eq!(coords_region_key("d"), "__coords_d.tdb");
    }

    #[test]
    fn fragment_timestamps_unique_across_threads() {
        let timestamps: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| (0..100).map(|_| next_timestamp(0)).collect::<Vec<_>>()))
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });
        let unique: std::collections::HashSet<_> = timestamps.iter().collect();
        assert_eq!(unique.len(), timestamps.len());
    }
}
