//! Domain and tiling geometry.
//!
//! A [`Domain`] maps cell coordinates to space tiles, tiles to their bounds, and regions to the tiles that overlap them.
//! It also defines the global cell order of an array: tiles in tile order, then cells in cell order.

mod hilbert;

use itertools::Itertools;

use super::{CellOrder, MajorOrder, Subarray, subarray::Indices};

/// The domain of an array with its tiling and orders.
///
/// Coordinates passed to a [`Domain`] are assumed to lie inside [`Domain::bounds`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    bounds: Subarray,
    tile_extents: Option<Vec<u64>>,
    tile_grid_shape: Option<Vec<u64>>,
    cell_order: CellOrder,
    tile_order: MajorOrder,
    hilbert_bits: u32,
}

impl Domain {
    /// Create a domain.
    ///
    /// `bounds` must be valid with a [`u64`] representable shape and `tile_extents` must be non-zero with one per dimension.
    pub(crate) fn new(
        bounds: Subarray,
        tile_extents: Option<Vec<u64>>,
        cell_order: CellOrder,
        tile_order: MajorOrder,
    ) -> Self {
        let tile_grid_shape = tile_extents.as_ref().map(|tile_extents| {
            std::iter::zip(bounds.ranges(), tile_extents)
                .map(|(&[lower, upper], extent)| upper.wrapping_sub(lower) as u64 / extent + 1)
                .collect()
        });
        let hilbert_bits = u32::try_from(63 / bounds.dimensionality().max(1)).unwrap_or(63);
        Self {
            bounds,
            tile_extents,
            tile_grid_shape,
            cell_order,
            tile_order,
            hilbert_bits,
        }
    }

    /// The domain bounds.
    #[must_use]
    pub fn bounds(&self) -> &Subarray {
        &self.bounds
    }

    /// The number of dimensions.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.bounds.dimensionality()
    }

    /// The tile extent of each dimension, or [`None`] if the domain is not tiled.
    #[must_use]
    pub fn tile_extents(&self) -> Option<&[u64]> {
        self.tile_extents.as_deref()
    }

    /// The number of tiles along each dimension, or [`None`] if the domain is not tiled.
    #[must_use]
    pub fn tile_grid_shape(&self) -> Option<&[u64]> {
        self.tile_grid_shape.as_deref()
    }

    /// The cell order.
    #[must_use]
    pub const fn cell_order(&self) -> CellOrder {
        self.cell_order
    }

    /// The tile order.
    #[must_use]
    pub const fn tile_order(&self) -> MajorOrder {
        self.tile_order
    }

    /// The identifier of the tile holding `coordinates`.
    ///
    /// Returns [`None`] if the domain is not tiled or `coordinates` are outside of the domain.
    #[must_use]
    pub fn cell_to_tile(&self, coordinates: &[i64]) -> Option<u64> {
        if !self.bounds.contains(coordinates) {
            return None;
        }
        let tile_indices = self.tile_indices(coordinates)?;
        Some(self.linearise_tile(&tile_indices))
    }

    /// The bounds of tile `tile_id`, clipped to the domain.
    ///
    /// Returns [`None`] if the domain is not tiled or `tile_id` is not a tile.
    #[must_use]
    pub fn tile_bounds(&self, tile_id: u64) -> Option<Subarray> {
        let tile_extents = self.tile_extents.as_ref()?;
        let tile_grid_shape = self.tile_grid_shape.as_ref()?;
        let tile_count = tile_grid_shape.iter().try_fold(1u64, |n, &s| n.checked_mul(s))?;
        if tile_id >= tile_count {
            return None;
        }
        let mut tile_indices = vec![0; tile_grid_shape.len()];
        let mut remainder = tile_id;
        let dimensions: Vec<usize> = match self.tile_order {
            MajorOrder::RowMajor => (0..tile_indices.len()).rev().collect(),
            MajorOrder::ColMajor => (0..tile_indices.len()).collect(),
        };
        for dimension in dimensions {
            tile_indices[dimension] = remainder % tile_grid_shape[dimension];
            remainder /= tile_grid_shape[dimension];
        }
        Some(Subarray::new(
            itertools::izip!(self.bounds.ranges(), tile_extents, &tile_indices)
                .map(|(&[lower, upper], &extent, &index)| {
                    let tile_lower = lower.wrapping_add_unsigned(index * extent);
                    let tile_upper = tile_lower.saturating_add_unsigned(extent - 1).min(upper);
                    [tile_lower, tile_upper]
                })
                .collect(),
        ))
    }

    /// The identifiers of the tiles overlapping `region`, in ascending order.
    ///
    /// The sequence is empty if the domain is not tiled or `region` does not overlap the domain.
    /// It is lazy and can be restarted by cloning.
    #[must_use]
    pub fn tiles_overlapping(&self, region: &Subarray) -> TilesOverlapping {
        let tile_box = self
            .bounds
            .intersect(region)
            .and_then(|region| {
                let lower = region.ranges().iter().map(|&[lower, _]| lower).collect_vec();
                let upper = region.ranges().iter().map(|&[_, upper]| upper).collect_vec();
                Some((self.tile_indices(&lower)?, self.tile_indices(&upper)?))
            });
        match (tile_box, &self.tile_grid_shape) {
            (Some((first, last)), Some(tile_grid_shape)) => {
                let shape = std::iter::zip(&first, &last).map(|(f, l)| l - f + 1).collect();
                TilesOverlapping {
                    first,
                    tile_grid_shape: tile_grid_shape.clone(),
                    tile_order: self.tile_order,
                    indices: Indices::new(shape, self.tile_order),
                }
            }
            _ => TilesOverlapping {
                first: Vec::new(),
                tile_grid_shape: Vec::new(),
                tile_order: self.tile_order,
                indices: Indices::empty(),
            },
        }
    }

    /// The key of `coordinates` in the global order of the array.
    ///
    /// Keys compare lexicographically: first the tile identifier (if the domain is tiled), then the position within the cell order.
    /// Distinct coordinates have distinct keys.
    #[must_use]
    pub fn global_order_key(&self, coordinates: &[i64]) -> Vec<u64> {
        let mut key = Vec::with_capacity(coordinates.len() + 2);
        if let Some(tile_indices) = self.tile_indices(coordinates) {
            key.push(self.linearise_tile(&tile_indices));
        }
        let offsets = self.offsets(coordinates);
        match self.cell_order {
            CellOrder::RowMajor => key.extend(offsets),
            CellOrder::ColMajor => key.extend(offsets.rev()),
            CellOrder::Hilbert => {
                let normalised = std::iter::zip(offsets.clone(), self.bounds.ranges())
                    .map(|(offset, &[lower, upper])| {
                        normalise(offset, upper.wrapping_sub(lower) as u64, self.hilbert_bits)
                    })
                    .collect_vec();
                key.push(hilbert::hilbert_index(&normalised, self.hilbert_bits));
                key.extend(offsets);
            }
        }
        key
    }

    /// The key of `coordinates` in a [`MajorOrder`] over the whole domain.
    pub(crate) fn major_order_key(&self, coordinates: &[i64], order: MajorOrder) -> Vec<u64> {
        match order {
            MajorOrder::RowMajor => self.offsets(coordinates).collect(),
            MajorOrder::ColMajor => self.offsets(coordinates).rev().collect(),
        }
    }

    fn offsets<'a>(
        &'a self,
        coordinates: &'a [i64],
    ) -> impl DoubleEndedIterator<Item = u64> + Clone + 'a {
        std::iter::zip(coordinates, self.bounds.ranges())
            .map(|(c, [lower, _])| c.wrapping_sub(*lower) as u64)
    }

    fn tile_indices(&self, coordinates: &[i64]) -> Option<Vec<u64>> {
        let tile_extents = self.tile_extents.as_ref()?;
        Some(
            std::iter::zip(self.offsets(coordinates), tile_extents)
                .map(|(offset, extent)| offset / extent)
                .collect(),
        )
    }

    fn linearise_tile(&self, tile_indices: &[u64]) -> u64 {
        let Some(tile_grid_shape) = &self.tile_grid_shape else {
            return 0;
        };
        let accumulate = |id: u64, (index, shape): (&u64, &u64)| id * shape + index;
        match self.tile_order {
            MajorOrder::RowMajor => std::iter::zip(tile_indices, tile_grid_shape).fold(0, accumulate),
            MajorOrder::ColMajor => std::iter::zip(tile_indices, tile_grid_shape)
                .rev()
                .fold(0, accumulate),
        }
    }
}

/// Scale `offset` in `[0, range]` onto `[0, 2^bits)`.
fn normalise(offset: u64, range: u64, bits: u32) -> u64 {
    let max = (1u64 << bits) - 1;
    if range == 0 {
        0
    } else {
        u64::try_from(u128::from(offset) * u128::from(max) / u128::from(range)).unwrap_or(max)
    }
}

/// An iterator over the identifiers of tiles overlapping a region, created by [`Domain::tiles_overlapping`].
#[derive(Debug, Clone)]
pub struct TilesOverlapping {
    first: Vec<u64>,
    tile_grid_shape: Vec<u64>,
    tile_order: MajorOrder,
    indices: Indices,
}

impl Iterator for TilesOverlapping {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.indices.next()?;
        let accumulate = |id: u64, ((index, first), shape): ((u64, &u64), &u64)| {
            id * shape + first + index
        };
        let dimensions = std::iter::zip(std::iter::zip(indices, &self.first), &self.tile_grid_shape);
        Some(match self.tile_order {
            MajorOrder::RowMajor => dimensions.fold(0, accumulate),
            MajorOrder::ColMajor => dimensions.rev().fold(0, accumulate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_2d(tile_order: MajorOrder) -> Domain {
        // 4x6 domain of 2x3 tiles: a 2x2 tile grid
        Domain::new(
            Subarray::new(vec![[1, 4], [0, 5]]),
            Some(vec![2, 3]),
            CellOrder::RowMajor,
            tile_order,
        )
    }

    #[test]
    fn domain_cell_to_tile() {
        let domain = domain_2d(MajorOrder::RowMajor);
        assert_eq!(domain.tile_grid_shape(), Some([2, 2].as_slice()));
        assert_eq!(domain.cell_to_tile(&[1, 0]), Some(0));
        assert_eq!(domain.cell_to_tile(&[2, 3]), Some(1));
        assert_eq!(domain.cell_to_tile(&[3, 2]), Some(2));
        assert_eq!(domain.cell_to_tile(&[4, 5]), Some(3));
        assert_eq!(domain.cell_to_tile(&[5, 5]), None);

        let domain = domain_2d(MajorOrder::ColMajor);
        assert_eq!(domain.cell_to_tile(&[2, 3]), Some(2));
        assert_eq!(domain.cell_to_tile(&[3, 2]), Some(1));
    }

    #[test]
    fn domain_tile_bounds() {
        let domain = domain_2d(MajorOrder::RowMajor);
        assert_eq!(
            domain.tile_bounds(1),
            Some(Subarray::new(vec![[1, 2], [3, 5]]))
        );
        assert_eq!(
            domain.tile_bounds(2),
            Some(Subarray::new(vec![[3, 4], [0, 2]]))
        );
        assert_eq!(domain.tile_bounds(4), None);
        for tile_id in 0..4 {
            let bounds = domain.tile_bounds(tile_id).unwrap();
            for cell in bounds.cells(MajorOrder::RowMajor) {
                assert_eq!(domain.cell_to_tile(&cell), Some(tile_id));
            }
        }

        // a sparse extent need not divide the domain
        let domain = Domain::new(
            Subarray::new(vec![[1, 10]]),
            Some(vec![4]),
            CellOrder::RowMajor,
            MajorOrder::RowMajor,
        );
        assert_eq!(domain.tile_grid_shape(), Some([3].as_slice()));
        assert_eq!(domain.tile_bounds(2), Some(Subarray::new(vec![[9, 10]])));
    }

    #[test]
    fn domain_tiles_overlapping() {
        for tile_order in [MajorOrder::RowMajor, MajorOrder::ColMajor] {
            let domain = domain_2d(tile_order);
            let overlapping = domain.tiles_overlapping(&Subarray::new(vec![[2, 3], [1, 4]]));
            assert_eq!(overlapping.clone().collect_vec(), vec![0, 1, 2, 3]);
            assert_eq!(overlapping.count(), 4);
            assert_eq!(
                domain
                    .tiles_overlapping(&Subarray::new(vec![[3, 9], [4, 4]]))
                    .collect_vec(),
                vec![3]
            );
            assert_eq!(
                domain
                    .tiles_overlapping(&Subarray::new(vec![[1, 4], [4, 5]]))
                    .collect_vec(),
                match tile_order {
                    MajorOrder::RowMajor => vec![1, 3],
                    MajorOrder::ColMajor => vec![2, 3],
                }
            );
        }
        let domain = domain_2d(MajorOrder::RowMajor);
        assert_eq!(
            domain
                .tiles_overlapping(&Subarray::new(vec![[5, 6], [0, 0]]))
                .count(),
            0
        );
    }

    #[test]
    fn domain_global_order() {
        let domain = domain_2d(MajorOrder::RowMajor);
        let mut cells = domain.bounds().cells(MajorOrder::RowMajor).collect_vec();
        cells.sort_by_key(|cell| domain.global_order_key(cell));
        // tile 0 in row-major cell order first
        assert_eq!(
            cells[..6],
            [
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
                vec![2, 0],
                vec![2, 1],
                vec![2, 2]
            ]
        );
        assert_eq!(cells[6], vec![1, 3]);

        let domain = Domain::new(
            Subarray::new(vec![[1, 4], [0, 5]]),
            Some(vec![2, 3]),
            CellOrder::ColMajor,
            MajorOrder::RowMajor,
        );
        let mut cells = domain.bounds().cells(MajorOrder::RowMajor).collect_vec();
        cells.sort_by_key(|cell| domain.global_order_key(cell));
        assert_eq!(cells[..3], [vec![1, 0], vec![2, 0], vec![1, 1]]);
    }

    #[test]
    fn domain_hilbert_order() {
        let domain = Domain::new(
            Subarray::new(vec![[0, 1], [0, 1]]),
            None,
            CellOrder::Hilbert,
            MajorOrder::RowMajor,
        );
        let mut cells = domain.bounds().cells(MajorOrder::RowMajor).collect_vec();
        cells.sort_by_key(|cell| domain.global_order_key(cell));
        assert_eq!(cells, vec![vec![0, 0], vec![0, 1], vec![1, 1], vec![1, 0]]);

        // keys of distinct cells are distinct even when normalisation collides
        let domain = Domain::new(
            Subarray::new(vec![[i64::MIN, i64::MAX - 1]]),
            None,
            CellOrder::Hilbert,
            MajorOrder::RowMajor,
        );
        assert!(domain.global_order_key(&[0]) < domain.global_order_key(&[1]));
        assert_ne!(
            domain.global_order_key(&[i64::MIN]),
            domain.global_order_key(&[i64::MIN + 1])
        );
    }
}
