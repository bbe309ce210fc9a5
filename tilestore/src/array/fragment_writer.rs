//! The fragment writer.
//!
//! A write is validated, partitioned into tiles, then each tile is filled and compressed on the thread pool.
//! The compressed tiles are persisted region by region and the fragment metadata is written last.

use std::{collections::BTreeMap, ops::Range};

use tilestore_storage::{Bytes, StoreKey, StorePrefix, WritableStorageTraits};

use super::{
    ArrayError, ArraySchema, AttributeBuffer, BufferSizeMismatchError, COORDS,
    CoordinateOutOfDomainError, MajorOrder, QueryLayout, QueryOptions, Subarray, Tile, VarTile, WriteBatch,
    fragment::{
        AttributeRegions, FRAGMENT_FORMAT_VERSION, FRAGMENT_METADATA_KEY, Fragment,
        FragmentMetadata, RegionMetadata, TileLocation, attribute_region_key,
        attribute_var_region_key, coords_region_key,
    },
};
use crate::{
    concurrency::{run_tile_tasks, thread_pool},
    config::PresortedCheck,
};

/// The cells of a write partitioned into tiles.
#[derive(Debug)]
struct TilePlan {
    non_empty_domain: Subarray,
    /// The batch cell index of every cell of each tile, in the cell order of the tile.
    tiles: Vec<Vec<usize>>,
    tile_ids: Vec<u64>,
    mbrs: Vec<Subarray>,
}

/// Write `batch` as a new fragment named `fragment_name` under `array_prefix`.
///
/// The fragment is only visible once its metadata is written.
/// If any step fails, the fragment prefix is erased on a best-effort basis.
pub(crate) fn write_fragment<TStorage: ?Sized + WritableStorageTraits>(
    storage: &TStorage,
    array_prefix: &StorePrefix,
    fragment_name: &str,
    timestamp: u64,
    schema: &ArraySchema,
    batch: &WriteBatch,
    options: &QueryOptions,
) -> Result<Fragment, ArrayError> {
    let cell_count = validate_batch(schema, batch)?;
    let coordinates = if schema.is_dense() {
        None
    } else {
        Some(decode_coordinates(schema, batch, cell_count)?)
    };
    let plan = match &coordinates {
        None => plan_dense(schema, batch)?,
        Some(coordinates) => plan_sparse(schema, batch.layout(), coordinates, options)?,
    };

    let prefix = array_prefix.child(fragment_name).map_err(tilestore_storage::StorageError::from)?;
    let result = compress_and_persist(storage, &prefix, timestamp, schema, batch, plan, options);
    match result {
        Ok(fragment) => {
            log::debug!(
                "wrote fragment {prefix} with {} cells in {} tiles",
                cell_count,
                fragment.tile_count()
            );
            Ok(fragment)
        }
        Err(err) => {
            if let Err(cleanup_err) = storage.erase_prefix(&prefix) {
                log::warn!("failed to clean up incomplete fragment {prefix}: {cleanup_err}");
            }
            Err(err)
        }
    }
}

fn compress_and_persist<TStorage: ?Sized + WritableStorageTraits>(
    storage: &TStorage,
    prefix: &StorePrefix,
    timestamp: u64,
    schema: &ArraySchema,
    batch: &WriteBatch,
    plan: TilePlan,
    options: &QueryOptions,
) -> Result<Fragment, ArrayError> {
    let pool = thread_pool()?;
    let coordinates = if schema.is_dense() {
        None
    } else {
        batch.coordinates()
    };
    let tiles = run_tile_tasks(&pool, options.concurrent_target(), plan.tiles.len(), |index| {
        compress_tile(schema, batch, coordinates, &plan.tiles[index])
    })?;

    let region_keys = region_keys(schema);
    let regions = persist_regions(storage, prefix, &region_keys, tiles)?;

    let mut regions = regions.into_iter();
    let mut attributes = BTreeMap::new();
    for attribute in schema.attributes() {
        let missing = || ArrayError::InvalidFragmentMetadata("missing region".to_string());
        let fixed = regions.next().ok_or_else(missing)?;
        let var = if attribute.is_var() {
            Some(regions.next().ok_or_else(missing)?)
        } else {
            None
        };
        attributes.insert(attribute.name().to_string(), AttributeRegions { fixed, var });
    }
    let dimensions = std::iter::zip(schema.dimensions(), regions)
        .map(|(dimension, region)| (dimension.name().to_string(), region))
        .collect();

    let metadata = FragmentMetadata {
        format_version: FRAGMENT_FORMAT_VERSION,
        timestamp,
        array_type: schema.array_type(),
        non_empty_domain: plan.non_empty_domain,
        tile_count: plan.tiles.len() as u64,
        cell_counts: plan.tiles.iter().map(|cells| cells.len() as u64).collect(),
        tile_ids: plan.tile_ids,
        mbrs: plan.mbrs,
        attributes,
        dimensions,
    };
    let metadata_json = serde_json::to_vec_pretty(&metadata)
        .map_err(|err| ArrayError::SerializationError(err.to_string()))?;
    let metadata_key = StoreKey::new(format!("{}{FRAGMENT_METADATA_KEY}", prefix.as_str()))
        .map_err(tilestore_storage::StorageError::from)?;
    storage.set(&metadata_key, Bytes::from(metadata_json))?;
    Ok(Fragment::new(prefix.clone(), metadata))
}

/// The region keys of a fragment in the order tiles are produced by [`compress_tile`].
fn region_keys(schema: &ArraySchema) -> Vec<String> {
    let mut keys = Vec::new();
    for attribute in schema.attributes() {
        keys.push(attribute_region_key(attribute.name()));
        if attribute.is_var() {
            keys.push(attribute_var_region_key(attribute.name()));
        }
    }
    if !schema.is_dense() {
        keys.extend(
            schema
                .dimensions()
                .iter()
                .map(|dimension| coords_region_key(dimension.name())),
        );
    }
    keys
}

/// Allocate each region then write its tiles at their offsets.
///
/// `tiles` holds the compressed tile of every region for each fragment tile.
fn persist_regions<TStorage: ?Sized + WritableStorageTraits>(
    storage: &TStorage,
    prefix: &StorePrefix,
    region_keys: &[String],
    tiles: Vec<Vec<Tile>>,
) -> Result<Vec<RegionMetadata>, ArrayError> {
    let mut regions: Vec<RegionMetadata> = region_keys
        .iter()
        .map(|key| RegionMetadata {
            key: key.clone(),
            tiles: Vec::with_capacity(tiles.len()),
        })
        .collect();
    for tile_regions in &tiles {
        for (region, tile) in std::iter::zip(&mut regions, tile_regions) {
            let offset = region.size();
            region.tiles.push(TileLocation {
                offset,
                compressed_size: tile.size() as u64,
                uncompressed_size: tile.uncompressed_size() as u64,
            });
        }
    }

    let store_keys = regions
        .iter()
        .map(|region| StoreKey::new(format!("{}{}", prefix.as_str(), region.key)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(tilestore_storage::StorageError::from)?;
    for (region, key) in std::iter::zip(&regions, &store_keys) {
        storage.allocate(key, region.size())?;
    }
    for (tile_index, tile_regions) in tiles.into_iter().enumerate() {
        for ((region, key), tile) in std::iter::zip(&regions, &store_keys).zip(tile_regions) {
            let location = region.tiles[tile_index];
            storage.set_partial(key, location.offset, tile.as_bytes())?;
            log::trace!(
                "persisted tile {tile_index} of {key}: {} bytes at offset {}",
                location.compressed_size,
                location.offset
            );
        }
    }
    Ok(regions)
}

/// Fill and compress the tiles of every region for the batch cells `cells`.
fn compress_tile(
    schema: &ArraySchema,
    batch: &WriteBatch,
    coordinates: Option<&[u8]>,
    cells: &[usize],
) -> Result<Vec<Tile>, ArrayError> {
    let capacity = cells.len() as u64;
    let mut tiles = Vec::new();
    for attribute in schema.attributes() {
        let buffer = batch
            .attributes()
            .get(attribute.name())
            .ok_or_else(|| BufferSizeMismatchError::MissingBuffer(attribute.name().to_string()))?;
        let element_size = attribute.data_type().size();
        match (buffer, attribute.cell_size()) {
            (AttributeBuffer::Fixed(bytes), Some(cell_size)) => {
                let mut tile = Tile::new(
                    cell_size,
                    element_size,
                    capacity,
                    attribute.compressor().clone(),
                );
                for run in contiguous_runs(cells) {
                    tile.fill(&bytes[run.start * cell_size..run.end * cell_size])?;
                }
                tile.compress()?;
                tiles.push(tile);
            }
            (AttributeBuffer::Variable { .. }, None) => {
                let mut tile = VarTile::new(
                    element_size,
                    capacity,
                    schema.offsets_compressor().clone(),
                    attribute.compressor().clone(),
                );
                for &cell in cells {
                    tile.fill_cell(buffer.cell(cell, 0))?;
                }
                tile.compress()?;
                let (offsets, values) = tile.into_tiles();
                tiles.push(offsets);
                tiles.push(values);
            }
            (buffer, _) => {
                return Err(BufferSizeMismatchError::BufferKind {
                    name: attribute.name().to_string(),
                    expected: if attribute.is_var() {
                        "variable length"
                    } else {
                        "fixed length"
                    },
                    found: buffer.kind(),
                }
                .into());
            }
        }
    }

    if let Some(coordinates) = coordinates {
        let coordinate_size = schema.coordinate_type().size();
        let dimensionality = schema.dimensionality();
        for dimension in 0..dimensionality {
            let mut tile = Tile::new(
                coordinate_size,
                coordinate_size,
                capacity,
                schema.coords_compressor().clone(),
            );
            for &cell in cells {
                let offset = (cell * dimensionality + dimension) * coordinate_size;
                tile.fill(&coordinates[offset..offset + coordinate_size])?;
            }
            tile.compress()?;
            tiles.push(tile);
        }
    }
    Ok(tiles)
}

/// Split `cells` into runs of consecutive indices.
fn contiguous_runs(cells: &[usize]) -> impl Iterator<Item = Range<usize>> + '_ {
    cells
        .chunk_by(|a, b| a.checked_add(1) == Some(*b))
        .map(|run| run[0]..run[run.len() - 1] + 1)
}

/// Check the batch matches the array type and every buffer holds the same number of cells.
///
/// Returns the number of cells in the batch.
fn validate_batch(schema: &ArraySchema, batch: &WriteBatch) -> Result<usize, ArrayError> {
    for name in batch.attributes().keys() {
        if schema.attribute(name).is_none() {
            return Err(ArrayError::UnknownAttribute(name.clone()));
        }
    }

    let cell_count = if schema.is_dense() {
        if batch.coordinates().is_some() {
            return Err(ArrayError::InvalidWriteBatch(
                "coordinates cannot be written to a dense array".to_string(),
            ));
        }
        if !matches!(
            batch.layout(),
            QueryLayout::RowMajor | QueryLayout::ColMajor | QueryLayout::GlobalOrder
        ) {
            return Err(ArrayError::InvalidLayout {
                layout: batch.layout(),
                reason: "dense writes require a row-major, column-major, or global order layout",
            });
        }
        let subarray = write_subarray(schema, batch)?;
        subarray
            .num_cells()
            .and_then(|cells| usize::try_from(cells).ok())
            .ok_or_else(|| {
                ArrayError::InvalidWriteBatch("the write subarray has too many cells".to_string())
            })?
    } else {
        if batch.subarray().is_some() {
            return Err(ArrayError::InvalidWriteBatch(
                "a sparse write is located by its coordinates, not a subarray".to_string(),
            ));
        }
        if !matches!(batch.layout(), QueryLayout::Unordered | QueryLayout::GlobalOrder) {
            return Err(ArrayError::InvalidLayout {
                layout: batch.layout(),
                reason: "sparse writes require an unordered or global order layout",
            });
        }
        let coordinates = batch
            .coordinates()
            .ok_or_else(|| BufferSizeMismatchError::MissingBuffer(COORDS.to_string()))?;
        let cell_size = schema.coordinate_type().size() * schema.dimensionality();
        if coordinates.len() % cell_size != 0 {
            return Err(BufferSizeMismatchError::NotMultipleOfCellSize {
                name: COORDS.to_string(),
                length: coordinates.len(),
                cell_size,
            }
            .into());
        }
        let cell_count = coordinates.len() / cell_size;
        if cell_count == 0 {
            return Err(ArrayError::InvalidWriteBatch(
                "a sparse write must have at least one cell".to_string(),
            ));
        }
        cell_count
    };

    for attribute in schema.attributes() {
        let buffer = batch
            .attributes()
            .get(attribute.name())
            .ok_or_else(|| BufferSizeMismatchError::MissingBuffer(attribute.name().to_string()))?;
        let found = buffer.cell_count(
            attribute.name(),
            attribute.cell_size(),
            attribute.data_type().size(),
        )?;
        if found != cell_count as u64 {
            return Err(BufferSizeMismatchError::CellCountMismatch {
                name: attribute.name().to_string(),
                expected: cell_count as u64,
                found,
            }
            .into());
        }
    }
    Ok(cell_count)
}

/// The subarray of a dense write, checked against the domain.
fn write_subarray(schema: &ArraySchema, batch: &WriteBatch) -> Result<Subarray, ArrayError> {
    let bounds = schema.domain().bounds();
    let Some(subarray) = batch.subarray() else {
        return Ok(bounds.clone());
    };
    if subarray.dimensionality() != schema.dimensionality() || !subarray.is_valid() {
        return Err(ArrayError::InvalidWriteBatch(format!(
            "invalid write subarray {:?}",
            subarray.ranges()
        )));
    }
    for (dimension, (&[lower, upper], &[domain_lower, domain_upper])) in
        std::iter::zip(schema.dimensions(), std::iter::zip(subarray.ranges(), bounds.ranges()))
    {
        for value in [lower, upper] {
            if value < domain_lower || value > domain_upper {
                return Err(CoordinateOutOfDomainError {
                    dimension: dimension.name().to_string(),
                    value: i128::from(value),
                    lower: domain_lower,
                    upper: domain_upper,
                }
                .into());
            }
        }
    }
    Ok(subarray.clone())
}

/// Decode the interleaved coordinates of a sparse batch and check they are inside the domain.
///
/// Returns one coordinate per dimension for each cell, flattened.
fn decode_coordinates(
    schema: &ArraySchema,
    batch: &WriteBatch,
    cell_count: usize,
) -> Result<Vec<i64>, ArrayError> {
    let coordinates = batch.coordinates().unwrap_or_default();
    let data_type = schema.coordinate_type();
    let size = data_type.size();
    let bounds = schema.domain().bounds().ranges();
    let mut decoded = Vec::with_capacity(cell_count * schema.dimensionality());
    for (bytes, (dimension, &[lower, upper])) in coordinates
        .chunks_exact(size)
        .zip(std::iter::zip(schema.dimensions(), bounds).cycle())
    {
        match data_type.decode_coordinate(bytes) {
            Some(value) if (lower..=upper).contains(&value) => decoded.push(value),
            value => {
                // only uint64 coordinates can exceed i64
                let value = value.map_or_else(
                    || <[u8; 8]>::try_from(bytes).map_or(0, |bytes| i128::from(u64::from_ne_bytes(bytes))),
                    i128::from,
                );
                return Err(CoordinateOutOfDomainError {
                    dimension: dimension.name().to_string(),
                    value,
                    lower,
                    upper,
                }
                .into());
            }
        }
    }
    Ok(decoded)
}

/// Partition a dense write into the space tiles overlapping its subarray.
fn plan_dense(schema: &ArraySchema, batch: &WriteBatch) -> Result<TilePlan, ArrayError> {
    let domain = schema.domain();
    let subarray = write_subarray(schema, batch)?;
    let cell_order = domain.cell_order().major_order().unwrap_or_default();
    let tile_ids: Vec<u64> = domain.tiles_overlapping(&subarray).collect();
    let mut tiles = Vec::with_capacity(tile_ids.len());
    let mut global_offset = 0;
    for &tile_id in &tile_ids {
        let tile_subarray = domain
            .tile_bounds(tile_id)
            .and_then(|bounds| bounds.intersect(&subarray))
            .ok_or_else(|| {
                ArrayError::InvalidWriteBatch(format!(
                    "tile {tile_id} does not overlap the write subarray"
                ))
            })?;
        let cells: Vec<usize> = match batch.layout() {
            QueryLayout::RowMajor | QueryLayout::ColMajor => {
                let order = if batch.layout() == QueryLayout::ColMajor {
                    MajorOrder::ColMajor
                } else {
                    MajorOrder::RowMajor
                };
                tile_subarray
                    .cells(cell_order)
                    .map(|coordinates| subarray.linear_index(&coordinates, order) as usize)
                    .collect()
            }
            _ => {
                let cell_count = tile_subarray.num_cells().unwrap_or(0) as usize;
                let cells = (global_offset..global_offset + cell_count).collect();
                global_offset += cell_count;
                cells
            }
        };
        tiles.push(cells);
    }
    Ok(TilePlan {
        non_empty_domain: subarray,
        tiles,
        tile_ids,
        mbrs: Vec::new(),
    })
}

/// Sort a sparse write into global order (or verify it is sorted) and partition it into tiles of at most the array capacity.
fn plan_sparse(
    schema: &ArraySchema,
    layout: QueryLayout,
    coordinates: &[i64],
    options: &QueryOptions,
) -> Result<TilePlan, ArrayError> {
    let domain = schema.domain();
    let dimensionality = schema.dimensionality();
    let points: Vec<&[i64]> = coordinates.chunks_exact(dimensionality).collect();
    let keys: Vec<Vec<u64>> = points
        .iter()
        .map(|point| domain.global_order_key(point))
        .collect();

    let mut order: Vec<usize> = (0..points.len()).collect();
    match (layout, options.presorted_check()) {
        (QueryLayout::GlobalOrder, PresortedCheck::Trust) => {}
        (QueryLayout::GlobalOrder, PresortedCheck::Verify) => {
            for (index, pair) in keys.windows(2).enumerate() {
                match pair[0].cmp(&pair[1]) {
                    std::cmp::Ordering::Less => {}
                    std::cmp::Ordering::Equal => {
                        return Err(ArrayError::DuplicateCoordinates(points[index].to_vec()));
                    }
                    std::cmp::Ordering::Greater => {
                        return Err(ArrayError::UnsortedCoordinates(index + 1));
                    }
                }
            }
        }
        _ => {
            order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
            if let Some(pair) = order.windows(2).find(|pair| keys[pair[0]] == keys[pair[1]]) {
                return Err(ArrayError::DuplicateCoordinates(points[pair[0]].to_vec()));
            }
        }
    }

    let capacity = usize::try_from(schema.capacity()).unwrap_or(usize::MAX);
    let tiles: Vec<Vec<usize>> = order.chunks(capacity).map(<[usize]>::to_vec).collect();
    let mbrs = tiles
        .iter()
        .map(|cells| Subarray::bounding_box(cells.iter().map(|&cell| points[cell])))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default();
    let non_empty_domain = Subarray::bounding_box(points.iter().copied()).ok_or_else(|| {
        ArrayError::InvalidWriteBatch("a sparse write must have at least one cell".to_string())
    })?;
    log::debug!(
        "partitioned {} sparse cells into {} tiles of capacity {capacity}",
        points.len(),
        tiles.len()
    );
    Ok(TilePlan {
        non_empty_domain,
        tiles,
        tile_ids: Vec::new(),
        mbrs,
    })
}
