//! The fragment reader.
//!
//! A read resolves every result cell to the newest fragment tile holding it, decompresses only those tiles on the thread pool, and assembles the result buffers in the requested order.
//!
//! Dense fragments shadow by position: a cell inside the non-empty domain of a newer fragment takes its value from that fragment.
//! Sparse fragments shadow by exact coordinates.

use std::collections::{BTreeMap, HashMap, HashSet, hash_map::Entry};

use tilestore_codec::Compressor;
use tilestore_storage::{ReadableStorageTraits, byte_range::ByteRange};

use super::{
    ArrayError, ArraySchema, Attribute, COORDS, MajorOrder, QueryLayout, QueryOptions,
    QueryRegion, ReadQuery, ReadResult, ResultBuffer, Subarray, Tile, TileError, VarTile,
    fragment::{Fragment, RegionMetadata},
    tile::OFFSET_SIZE,
};
use crate::concurrency::{run_tile_tasks, thread_pool};

/// A tile of a fragment: the fragment index and the tile index within the fragment.
type TileRef = (usize, usize);

/// A result cell and the tile cell holding its value, if any.
#[derive(Debug)]
struct ResolvedCell {
    coordinates: Vec<i64>,
    /// The index into [`Resolution::tiles`] and the cell index within that tile.
    source: Option<(usize, usize)>,
}

/// The result cells of a read in output order and the tiles they read from.
#[derive(Debug, Default)]
struct Resolution {
    cells: Vec<ResolvedCell>,
    tiles: Vec<TileRef>,
    tile_indices: HashMap<TileRef, usize>,
}

impl Resolution {
    fn tile_index(&mut self, tile: TileRef) -> usize {
        *self.tile_indices.entry(tile).or_insert_with(|| {
            self.tiles.push(tile);
            self.tiles.len() - 1
        })
    }

    fn push(&mut self, coordinates: Vec<i64>, source: Option<(TileRef, usize)>) {
        let source = source.map(|(tile, cell)| (self.tile_index(tile), cell));
        self.cells.push(ResolvedCell {
            coordinates,
            source,
        });
    }

    fn has_sources(&self) -> bool {
        self.cells.iter().any(|cell| cell.source.is_some())
    }
}

/// A decompressed tile of one attribute.
#[derive(Debug)]
enum DecodedTile {
    Fixed(Tile),
    Var(VarTile),
}

impl DecodedTile {
    fn cell(&self, index: usize) -> Result<&[u8], TileError> {
        match self {
            Self::Fixed(tile) => tile.cell(index),
            Self::Var(tile) => tile.cell(index),
        }
    }
}

/// Read `query` from `fragments`, which are ordered oldest to newest.
pub(crate) fn read_fragments<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    schema: &ArraySchema,
    fragments: &[&Fragment],
    query: &ReadQuery,
    options: &QueryOptions,
) -> Result<ReadResult, ArrayError> {
    let names = requested_names(schema, query)?;
    validate_region(schema, query.region())?;

    let overlapping = overlapping_fragments(fragments, query.region());
    if overlapping.is_empty() {
        log::debug!("read overlaps no fragment");
        return Ok(empty_result(schema, &names));
    }

    let pool = thread_pool()?;
    let reader = FragmentReader {
        storage,
        schema,
        fragments,
        pool: &pool,
        options,
    };
    let resolution = match (schema.is_dense(), query.region()) {
        (true, QueryRegion::Subarray(subarray)) => {
            reader.resolve_dense(&overlapping, dense_positions(schema, subarray, query.layout()))?
        }
        (true, QueryRegion::Coordinates(points)) => {
            reader.resolve_dense(&overlapping, points.iter().cloned())?
        }
        (false, QueryRegion::Subarray(subarray)) => {
            reader.resolve_sparse_subarray(subarray, query.layout())?
        }
        (false, QueryRegion::Coordinates(points)) => reader.resolve_sparse_points(points)?,
    };

    if !resolution.has_sources() {
        log::debug!("read overlaps no written cells");
        return Ok(empty_result(schema, &names));
    }
    let result = reader.assemble(&names, &resolution)?;
    log::debug!(
        "read {} cells from {} tiles of {} fragments",
        result.cell_count(),
        resolution.tiles.len(),
        fragments.len()
    );
    Ok(result)
}

/// The requested buffer names, or every attribute if none are requested.
fn requested_names(schema: &ArraySchema, query: &ReadQuery) -> Result<Vec<String>, ArrayError> {
    if query.attributes().is_empty() {
        return Ok(schema
            .attributes()
            .iter()
            .map(|attribute| attribute.name().to_string())
            .collect());
    }
    let mut names = Vec::with_capacity(query.attributes().len());
    for name in query.attributes() {
        if name != COORDS && schema.attribute(name).is_none() {
            return Err(ArrayError::UnknownAttribute(name.clone()));
        }
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    Ok(names)
}

fn validate_region(schema: &ArraySchema, region: &QueryRegion) -> Result<(), ArrayError> {
    let bounds = schema.domain().bounds();
    match region {
        QueryRegion::Subarray(subarray) => {
            if subarray.dimensionality() != schema.dimensionality() || !subarray.is_valid() {
                return Err(ArrayError::InvalidQueryRegion(format!(
                    "{:?} is not a subarray of a {}-dimensional array",
                    subarray.ranges(),
                    schema.dimensionality()
                )));
            }
            if !bounds.contains_subarray(subarray) {
                return Err(ArrayError::InvalidQueryRegion(format!(
                    "{:?} is outside of the domain {:?}",
                    subarray.ranges(),
                    bounds.ranges()
                )));
            }
        }
        QueryRegion::Coordinates(points) => {
            if let Some(point) = points
                .iter()
                .find(|point| point.len() != schema.dimensionality() || !bounds.contains(point))
            {
                return Err(ArrayError::InvalidQueryRegion(format!(
                    "{point:?} is not a cell of the domain {:?}",
                    bounds.ranges()
                )));
            }
        }
    }
    Ok(())
}

/// The indices of the fragments whose non-empty domain meets `region`, oldest first.
fn overlapping_fragments(fragments: &[&Fragment], region: &QueryRegion) -> Vec<usize> {
    fragments
        .iter()
        .enumerate()
        .filter(|(_, fragment)| {
            let non_empty_domain = fragment.non_empty_domain();
            match region {
                QueryRegion::Subarray(subarray) => non_empty_domain.overlaps(subarray),
                QueryRegion::Coordinates(points) => {
                    points.iter().any(|point| non_empty_domain.contains(point))
                }
            }
        })
        .map(|(index, _)| index)
        .collect()
}

/// The cells of `subarray` in the order of `layout`.
///
/// The global order visits the tiles overlapping the subarray in tile order, then the cells of each tile in cell order.
fn dense_positions<'a>(
    schema: &'a ArraySchema,
    subarray: &'a Subarray,
    layout: QueryLayout,
) -> Box<dyn Iterator<Item = Vec<i64>> + 'a> {
    let domain = schema.domain();
    match layout {
        QueryLayout::RowMajor => Box::new(subarray.cells(MajorOrder::RowMajor)),
        QueryLayout::ColMajor => Box::new(subarray.cells(MajorOrder::ColMajor)),
        QueryLayout::GlobalOrder | QueryLayout::Unordered => {
            let cell_order = domain.cell_order().major_order().unwrap_or_default();
            Box::new(domain.tiles_overlapping(subarray).flat_map(move |tile_id| {
                domain
                    .tile_bounds(tile_id)
                    .and_then(|bounds| bounds.intersect(subarray))
                    .map(|cells| cells.cells(cell_order))
                    .into_iter()
                    .flatten()
            }))
        }
    }
}

fn empty_result(schema: &ArraySchema, names: &[String]) -> ReadResult {
    let buffers = names
        .iter()
        .map(|name| {
            let buffer = if schema.attribute(name).is_some_and(Attribute::is_var) {
                ResultBuffer::Variable {
                    offsets: Vec::new(),
                    values: Vec::new(),
                }
            } else {
                ResultBuffer::Fixed(Vec::new())
            };
            (name.clone(), buffer)
        })
        .collect();
    ReadResult::new(0, buffers)
}

struct FragmentReader<'a, TStorage: ?Sized> {
    storage: &'a TStorage,
    schema: &'a ArraySchema,
    fragments: &'a [&'a Fragment],
    pool: &'a rayon::ThreadPool,
    options: &'a QueryOptions,
}

impl<TStorage: ?Sized + ReadableStorageTraits> FragmentReader<'_, TStorage> {
    /// Resolve each dense cell to the newest of the `overlapping` fragments whose non-empty domain holds it.
    fn resolve_dense(
        &self,
        overlapping: &[usize],
        positions: impl Iterator<Item = Vec<i64>>,
    ) -> Result<Resolution, ArrayError> {
        let domain = self.schema.domain();
        let cell_order = domain.cell_order().major_order().unwrap_or_default();
        let mut tile_cells: HashMap<TileRef, Subarray> = HashMap::new();
        let mut resolution = Resolution::default();
        for coordinates in positions {
            let mut source = None;
            for &fragment_index in overlapping.iter().rev() {
                let fragment = self.fragments[fragment_index];
                if !fragment.non_empty_domain().contains(&coordinates) {
                    continue;
                }
                let tile_id = domain.cell_to_tile(&coordinates).ok_or_else(|| {
                    ArrayError::InvalidQueryRegion(format!("{coordinates:?} is not in a tile"))
                })?;
                let slot = fragment
                    .metadata()
                    .tile_ids
                    .binary_search(&tile_id)
                    .map_err(|_| missing_tile(fragment, tile_id))?;
                let tile = (fragment_index, slot);
                let cells = match tile_cells.entry(tile) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => entry.insert(
                        domain
                            .tile_bounds(tile_id)
                            .and_then(|bounds| bounds.intersect(fragment.non_empty_domain()))
                            .ok_or_else(|| missing_tile(fragment, tile_id))?,
                    ),
                };
                let cell = cells.linear_index(&coordinates, cell_order) as usize;
                source = Some((tile, cell));
                break;
            }
            resolution.push(coordinates, source);
        }
        Ok(resolution)
    }

    /// Resolve the sparse cells inside `subarray`, newest first at equal coordinates, in the order of `layout`.
    fn resolve_sparse_subarray(
        &self,
        subarray: &Subarray,
        layout: QueryLayout,
    ) -> Result<Resolution, ArrayError> {
        let candidates = self.sparse_candidates(|mbr| mbr.overlaps(subarray));
        let coordinates = self.read_coordinates(&candidates)?;

        let domain = self.schema.domain();
        let mut cells: BTreeMap<Vec<u64>, (&[i64], TileRef, usize)> = BTreeMap::new();
        for (&tile, tile_coordinates) in std::iter::zip(&candidates, &coordinates) {
            for (cell, point) in tile_coordinates
                .chunks_exact(self.schema.dimensionality())
                .enumerate()
            {
                if !subarray.contains(point) {
                    continue;
                }
                let key = match layout {
                    QueryLayout::RowMajor => domain.major_order_key(point, MajorOrder::RowMajor),
                    QueryLayout::ColMajor => domain.major_order_key(point, MajorOrder::ColMajor),
                    QueryLayout::GlobalOrder | QueryLayout::Unordered => {
                        domain.global_order_key(point)
                    }
                };
                // candidates are visited oldest to newest, so newer cells replace older ones
                cells.insert(key, (point, tile, cell));
            }
        }

        let mut resolution = Resolution::default();
        for (point, tile, cell) in cells.into_values() {
            resolution.push(point.to_vec(), Some((tile, cell)));
        }
        Ok(resolution)
    }

    /// Resolve the sparse cells at `points` that exist, in the order of `points`.
    fn resolve_sparse_points(&self, points: &[Vec<i64>]) -> Result<Resolution, ArrayError> {
        let wanted: HashSet<&[i64]> = points.iter().map(Vec::as_slice).collect();
        let candidates =
            self.sparse_candidates(|mbr| points.iter().any(|point| mbr.contains(point)));
        let coordinates = self.read_coordinates(&candidates)?;

        let mut cells: HashMap<&[i64], (TileRef, usize)> = HashMap::new();
        for (&tile, tile_coordinates) in std::iter::zip(&candidates, &coordinates) {
            for (cell, point) in tile_coordinates
                .chunks_exact(self.schema.dimensionality())
                .enumerate()
            {
                if wanted.contains(point) {
                    cells.insert(point, (tile, cell));
                }
            }
        }

        let mut resolution = Resolution::default();
        for point in points {
            if let Some(&source) = cells.get(point.as_slice()) {
                resolution.push(point.clone(), Some(source));
            }
        }
        Ok(resolution)
    }

    /// The sparse tiles whose bounding rectangle satisfies `select`, oldest fragment first.
    fn sparse_candidates(&self, select: impl Fn(&Subarray) -> bool) -> Vec<TileRef> {
        let mut candidates = Vec::new();
        for (fragment_index, fragment) in self.fragments.iter().enumerate() {
            if !select(fragment.non_empty_domain()) {
                continue;
            }
            for (slot, mbr) in fragment.metadata().mbrs.iter().enumerate() {
                if select(mbr) {
                    candidates.push((fragment_index, slot));
                }
            }
        }
        candidates
    }

    /// Decompress the coordinate tiles of `tiles` and interleave them per cell.
    fn read_coordinates(&self, tiles: &[TileRef]) -> Result<Vec<Vec<i64>>, ArrayError> {
        let data_type = self.schema.coordinate_type();
        let size = data_type.size();
        run_tile_tasks(
            self.pool,
            self.options.concurrent_target(),
            tiles.len(),
            |index| {
                let (fragment_index, slot) = tiles[index];
                let fragment = self.fragments[fragment_index];
                let cell_count = fragment.metadata().cell_counts[slot];
                let dimensionality = self.schema.dimensionality();
                let mut coordinates = vec![0; usize::try_from(cell_count).unwrap_or(0) * dimensionality];
                for (dimension_index, dimension) in self.schema.dimensions().iter().enumerate() {
                    let region = fragment.metadata().dimensions.get(dimension.name()).ok_or_else(|| {
                        ArrayError::InvalidFragmentMetadata(format!(
                            "{} has no coordinates of dimension `{}`",
                            fragment.prefix(),
                            dimension.name()
                        ))
                    })?;
                    let tile = self.read_tile(
                        fragment,
                        region,
                        slot,
                        Some(size),
                        size,
                        self.schema.coords_compressor(),
                    )?;
                    for (cell, bytes) in tile.as_bytes().chunks_exact(size).enumerate() {
                        coordinates[cell * dimensionality + dimension_index] =
                            data_type.decode_coordinate(bytes).ok_or_else(|| {
                                ArrayError::InvalidFragmentMetadata(format!(
                                    "{} holds a coordinate outside of the domain",
                                    fragment.prefix()
                                ))
                            })?;
                    }
                }
                Ok(coordinates)
            },
        )
    }

    /// Decompress the attribute tiles referenced by `resolution` and assemble the result buffers.
    fn assemble(
        &self,
        names: &[String],
        resolution: &Resolution,
    ) -> Result<ReadResult, ArrayError> {
        let attributes: Vec<&Attribute> = names
            .iter()
            .filter_map(|name| self.schema.attribute(name))
            .collect();
        let tiles: Vec<Vec<DecodedTile>> = run_tile_tasks(
            self.pool,
            self.options.concurrent_target(),
            resolution.tiles.len(),
            |index| {
                let (fragment_index, slot) = resolution.tiles[index];
                attributes
                    .iter()
                    .map(|attribute| {
                        self.read_attribute_tile(self.fragments[fragment_index], attribute, slot)
                    })
                    .collect::<Result<Vec<_>, _>>()
            },
        )?;

        let mut buffers = BTreeMap::new();
        for name in names {
            let buffer = if name == COORDS {
                let data_type = self.schema.coordinate_type();
                let mut values = Vec::with_capacity(
                    resolution.cells.len() * self.schema.dimensionality() * data_type.size(),
                );
                for &value in resolution.cells.iter().flat_map(|cell| &cell.coordinates) {
                    data_type.encode_coordinate(value, &mut values).ok_or_else(|| {
                        ArrayError::InvalidQueryRegion(format!(
                            "coordinate {value} is not representable as {data_type}"
                        ))
                    })?;
                }
                ResultBuffer::Fixed(values)
            } else {
                let (attribute_index, attribute) = attributes
                    .iter()
                    .enumerate()
                    .find(|(_, attribute)| attribute.name() == name)
                    .ok_or_else(|| ArrayError::UnknownAttribute(name.clone()))?;
                let fill = attribute.fill_cell();
                let mut offsets = Vec::new();
                let mut values = Vec::new();
                for cell in &resolution.cells {
                    if attribute.is_var() {
                        offsets.push(values.len() as u64);
                    }
                    match cell.source {
                        Some((tile, cell)) => {
                            values.extend_from_slice(tiles[tile][attribute_index].cell(cell)?);
                        }
                        None => values.extend_from_slice(&fill),
                    }
                }
                if attribute.is_var() {
                    ResultBuffer::Variable { offsets, values }
                } else {
                    ResultBuffer::Fixed(values)
                }
            };
            buffers.insert(name.clone(), buffer);
        }
        Ok(ReadResult::new(resolution.cells.len() as u64, buffers))
    }

    fn read_attribute_tile(
        &self,
        fragment: &Fragment,
        attribute: &Attribute,
        slot: usize,
    ) -> Result<DecodedTile, ArrayError> {
        let regions = fragment
            .metadata()
            .attributes
            .get(attribute.name())
            .ok_or_else(|| {
                ArrayError::InvalidFragmentMetadata(format!(
                    "{} has no attribute `{}`",
                    fragment.prefix(),
                    attribute.name()
                ))
            })?;
        let element_size = attribute.data_type().size();
        match (attribute.cell_size(), &regions.var) {
            (Some(cell_size), None) => Ok(DecodedTile::Fixed(self.read_tile(
                fragment,
                &regions.fixed,
                slot,
                Some(cell_size),
                element_size,
                attribute.compressor(),
            )?)),
            (None, Some(var)) => {
                let offsets = self.read_tile_compressed(
                    fragment,
                    &regions.fixed,
                    slot,
                    Some(OFFSET_SIZE),
                    OFFSET_SIZE,
                    self.schema.offsets_compressor(),
                )?;
                let values = self.read_tile_compressed(
                    fragment,
                    var,
                    slot,
                    None,
                    element_size,
                    attribute.compressor(),
                )?;
                let mut tile = VarTile::from_tiles(offsets, values)?;
                tile.decompress()?;
                Ok(DecodedTile::Var(tile))
            }
            _ => Err(ArrayError::InvalidFragmentMetadata(format!(
                "{} has the wrong regions for attribute `{}`",
                fragment.prefix(),
                attribute.name()
            ))),
        }
    }

    fn read_tile(
        &self,
        fragment: &Fragment,
        region: &RegionMetadata,
        slot: usize,
        cell_size: Option<usize>,
        element_size: usize,
        compressor: &Compressor,
    ) -> Result<Tile, ArrayError> {
        let mut tile =
            self.read_tile_compressed(fragment, region, slot, cell_size, element_size, compressor)?;
        tile.decompress()?;
        Ok(tile)
    }

    /// Fetch the compressed bytes of tile `slot` of `region`.
    fn read_tile_compressed(
        &self,
        fragment: &Fragment,
        region: &RegionMetadata,
        slot: usize,
        cell_size: Option<usize>,
        element_size: usize,
        compressor: &Compressor,
    ) -> Result<Tile, ArrayError> {
        let invalid = |reason: &str| {
            ArrayError::InvalidFragmentMetadata(format!(
                "tile {slot} of {}{}: {reason}",
                fragment.prefix(),
                region.key
            ))
        };
        let location = region.tiles.get(slot).ok_or_else(|| invalid("no such tile"))?;
        let cell_count = fragment
            .metadata()
            .cell_counts
            .get(slot)
            .copied()
            .ok_or_else(|| invalid("no cell count"))?;
        let key = fragment.region_key(region);
        let bytes = self
            .storage
            .get_partial(
                &key,
                ByteRange::FromStart(location.offset, Some(location.compressed_size)),
            )?
            .ok_or_else(|| invalid("the region is missing"))?;
        if bytes.len() as u64 != location.compressed_size {
            return Err(invalid("the region is truncated"));
        }
        let uncompressed_size = usize::try_from(location.uncompressed_size)
            .map_err(|_| invalid("the uncompressed size is too large"))?;
        Ok(Tile::from_compressed(
            bytes.to_vec(),
            uncompressed_size,
            cell_size,
            element_size,
            cell_count,
            compressor.clone(),
        ))
    }
}

fn missing_tile(fragment: &Fragment, tile_id: u64) -> ArrayError {
    ArrayError::InvalidFragmentMetadata(format!(
        "{} has no tile {tile_id} inside its non-empty domain",
        fragment.prefix()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{ArraySchemaBuilder, ArrayType, DataType, Dimension};

    fn dense_schema() -> ArraySchema {
        let mut builder = ArraySchemaBuilder::new(ArrayType::Dense);
        builder
            .dimension(Dimension::new("x", DataType::Int32, [0, 3], Some(2)))
            .dimension(Dimension::new("y", DataType::Int32, [0, 3], Some(2)))
            .attribute(Attribute::new("a", DataType::UInt16));
        builder.build().unwrap()
    }

    #[test]
    fn fragment_reader_dense_positions() {
        let schema = dense_schema();
        let subarray = Subarray::new(vec![[1, 2], [1, 2]]);
        let row_major: Vec<_> = dense_positions(&schema, &subarray, QueryLayout::RowMajor).collect();
        assert_eq!(row_major, vec![vec![1, 1], vec![1, 2], vec![2, 1], vec![2, 2]]);
        let col_major: Vec<_> = dense_positions(&schema, &subarray, QueryLayout::ColMajor).collect();
        assert_eq!(col_major, vec![vec![1, 1], vec![2, 1], vec![1, 2], vec![2, 2]]);
        // one cell from each of the four tiles
        let global: Vec<_> = dense_positions(&schema, &subarray, QueryLayout::GlobalOrder).collect();
        assert_eq!(global, vec![vec![1, 1], vec![1, 2], vec![2, 1], vec![2, 2]]);

        let subarray = Subarray::new(vec![[0, 1], [0, 3]]);
        let global: Vec<_> = dense_positions(&schema, &subarray, QueryLayout::GlobalOrder).collect();
        assert_eq!(
            global,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![1, 0],
                vec![1, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3]
            ]
        );
    }

    #[test]
    fn fragment_reader_requested_names() {
        let schema = dense_schema();
        let query = ReadQuery::new(
            QueryRegion::Subarray(Subarray::new(vec![[0, 0], [0, 0]])),
            QueryLayout::RowMajor,
        );
        assert_eq!(requested_names(&schema, &query).unwrap(), vec!["a"]);
        let query = query.with_attributes([COORDS, "a", COORDS]);
        assert_eq!(requested_names(&schema, &query).unwrap(), vec![COORDS, "a"]);
        let query = query.with_attributes(["b"]);
        assert!(matches!(
            requested_names(&schema, &query),
            Err(ArrayError::UnknownAttribute(name)) if name == "b"
        ));
    }

    #[test]
    fn fragment_reader_validate_region() {
        let schema = dense_schema();
        assert!(validate_region(&schema, &QueryRegion::Subarray(Subarray::new(vec![[0, 3], [0, 3]]))).is_ok());
        for region in [
            QueryRegion::Subarray(Subarray::new(vec![[0, 3]])),
            QueryRegion::Subarray(Subarray::new(vec![[2, 1], [0, 3]])),
            QueryRegion::Subarray(Subarray::new(vec![[0, 4], [0, 3]])),
            QueryRegion::Coordinates(vec![vec![0, 0], vec![0, 4]]),
            QueryRegion::Coordinates(vec![vec![0]]),
        ] {
            assert!(matches!(
                validate_region(&schema, &region),
                Err(ArrayError::InvalidQueryRegion(_))
            ));
        }
    }

    #[test]
    fn fragment_reader_empty_result() {
        let mut builder = ArraySchemaBuilder::new(ArrayType::Sparse);
        builder
            .dimension(Dimension::new("d", DataType::Int64, [1, 10], None))
            .attribute(Attribute::new("a", DataType::Int32))
            .attribute(
                Attribute::new("s", DataType::Char)
                    .with_cell_val_num(crate::array::CellValNum::Var),
            );
        let schema = builder.build().unwrap();
        let result = empty_result(&schema, &["a".to_string(), "s".to_string(), COORDS.to_string()]);
        assert!(result.is_empty());
        assert_eq!(result.buffer("a").unwrap(), &ResultBuffer::Fixed(vec![]));
        assert_eq!(result.buffer("s").unwrap().offsets(), Some([].as_slice()));
        assert_eq!(result.buffer(COORDS).unwrap().values(), b"");
    }
}
