//! Subarrays: hyperrectangles of inclusive ranges.

use serde::{Deserialize, Serialize};

use super::MajorOrder;

/// A hyperrectangular region of an array: one inclusive `[lower, upper]` range per dimension.
///
/// Coordinates of every integer data type are widened to [`i64`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subarray {
    ranges: Vec<[i64; 2]>,
}

impl Subarray {
    /// Create a new subarray from inclusive ranges.
    ///
    /// The ranges are not validated, see [`Subarray::is_valid`].
    #[must_use]
    pub fn new(ranges: Vec<[i64; 2]>) -> Self {
        Self { ranges }
    }

    /// Create a subarray holding a single cell.
    #[must_use]
    pub fn from_point(coordinates: &[i64]) -> Self {
        Self {
            ranges: coordinates.iter().map(|&c| [c, c]).collect(),
        }
    }

    /// Create the bounding box of `points`.
    ///
    /// Returns [`None`] if there are no points.
    #[must_use]
    pub fn bounding_box<'a>(mut points: impl Iterator<Item = &'a [i64]>) -> Option<Self> {
        let mut bounding_box = Self::from_point(points.next()?);
        for point in points {
            bounding_box.expand(point);
        }
        Some(bounding_box)
    }

    /// The inclusive ranges.
    #[must_use]
    pub fn ranges(&self) -> &[[i64; 2]] {
        &self.ranges
    }

    /// The number of dimensions.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.ranges.len()
    }

    /// Returns true if every range has `lower <= upper`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.ranges.iter().all(|[lower, upper]| lower <= upper)
    }

    /// The number of cells per dimension.
    ///
    /// Returns [`None`] if a range is invalid or holds more than [`u64::MAX`] cells.
    #[must_use]
    pub fn shape(&self) -> Option<Vec<u64>> {
        self.ranges
            .iter()
            .map(|&[lower, upper]| range_length(lower, upper))
            .collect()
    }

    /// The number of cells.
    ///
    /// Returns [`None`] if the subarray is invalid or the count overflows [`u64`].
    #[must_use]
    pub fn num_cells(&self) -> Option<u64> {
        self.shape()?
            .into_iter()
            .try_fold(1u64, u64::checked_mul)
    }

    /// Returns true if `coordinates` lie inside the subarray.
    #[must_use]
    pub fn contains(&self, coordinates: &[i64]) -> bool {
        coordinates.len() == self.ranges.len()
            && std::iter::zip(coordinates, &self.ranges)
                .all(|(c, [lower, upper])| lower <= c && c <= upper)
    }

    /// Returns true if `other` lies entirely inside the subarray.
    #[must_use]
    pub fn contains_subarray(&self, other: &Self) -> bool {
        other.ranges.len() == self.ranges.len()
            && std::iter::zip(&other.ranges, &self.ranges).all(
                |([other_lower, other_upper], [lower, upper])| {
                    lower <= other_lower && other_upper <= upper
                },
            )
    }

    /// Returns the intersection with `other`, or [`None`] if they are disjoint or of different dimensionality.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if self.ranges.len() != other.ranges.len() {
            return None;
        }
        std::iter::zip(&self.ranges, &other.ranges)
            .map(|([lower_a, upper_a], [lower_b, upper_b])| {
                let lower = *lower_a.max(lower_b);
                let upper = *upper_a.min(upper_b);
                (lower <= upper).then_some([lower, upper])
            })
            .collect::<Option<Vec<_>>>()
            .map(Self::new)
    }

    /// Returns true if the subarray intersects `other`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.ranges.len() == other.ranges.len()
            && std::iter::zip(&self.ranges, &other.ranges).all(
                |([lower_a, upper_a], [lower_b, upper_b])| lower_a <= upper_b && lower_b <= upper_a,
            )
    }

    /// Grow the subarray to include `coordinates`.
    pub fn expand(&mut self, coordinates: &[i64]) {
        for (range, &c) in self.ranges.iter_mut().zip(coordinates) {
            range[0] = range[0].min(c);
            range[1] = range[1].max(c);
        }
    }

    /// The linear index of `coordinates` within the subarray in `order`.
    ///
    /// `coordinates` must lie inside the subarray and the subarray must have a valid [`num_cells`](Self::num_cells).
    pub(crate) fn linear_index(&self, coordinates: &[i64], order: MajorOrder) -> u64 {
        let mut index = 0u64;
        let mut accumulate = |[lower, upper]: [i64; 2], c: i64| {
            let length = upper.wrapping_sub(lower) as u64 + 1;
            index = index * length + c.wrapping_sub(lower) as u64;
        };
        match order {
            MajorOrder::RowMajor => {
                for (&range, &c) in std::iter::zip(&self.ranges, coordinates) {
                    accumulate(range, c);
                }
            }
            MajorOrder::ColMajor => {
                for (&range, &c) in std::iter::zip(&self.ranges, coordinates).rev() {
                    accumulate(range, c);
                }
            }
        }
        index
    }

    /// Iterate over the coordinates of every cell of the subarray in `order`.
    pub(crate) fn cells(&self, order: MajorOrder) -> SubarrayCells {
        SubarrayCells {
            lower: self.ranges.iter().map(|[lower, _]| *lower).collect(),
            indices: self
                .shape()
                .map(|shape| Indices::new(shape, order))
                .unwrap_or_else(Indices::empty),
        }
    }
}

impl From<Vec<[i64; 2]>> for Subarray {
    fn from(ranges: Vec<[i64; 2]>) -> Self {
        Self::new(ranges)
    }
}

/// The number of integers in `[lower, upper]`, or [`None`] if that is empty or exceeds [`u64::MAX`].
pub(crate) fn range_length(lower: i64, upper: i64) -> Option<u64> {
    if lower > upper {
        None
    } else {
        (upper.wrapping_sub(lower) as u64).checked_add(1)
    }
}

/// An iterator over the multidimensional indices `[0, shape)` in a [`MajorOrder`].
#[derive(Debug, Clone)]
pub(crate) struct Indices {
    shape: Vec<u64>,
    order: MajorOrder,
    next: Option<Vec<u64>>,
}

impl Indices {
    pub(crate) fn new(shape: Vec<u64>, order: MajorOrder) -> Self {
        let next = (!shape.contains(&0)).then(|| vec![0; shape.len()]);
        Self { shape, order, next }
    }

    pub(crate) fn empty() -> Self {
        Self {
            shape: Vec::new(),
            order: MajorOrder::RowMajor,
            next: None,
        }
    }
}

impl Iterator for Indices {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut next = current.clone();
        let mut advance = |dimension: usize| {
            next[dimension] += 1;
            if next[dimension] < self.shape[dimension] {
                true
            } else {
                next[dimension] = 0;
                false
            }
        };
        let advanced = match self.order {
            MajorOrder::RowMajor => (0..self.shape.len()).rev().any(&mut advance),
            MajorOrder::ColMajor => (0..self.shape.len()).any(&mut advance),
        };
        if advanced {
            self.next = Some(next);
        }
        Some(current)
    }
}

/// An iterator over the cell coordinates of a [`Subarray`].
#[derive(Debug, Clone)]
pub(crate) struct SubarrayCells {
    lower: Vec<i64>,
    indices: Indices,
}

impl Iterator for SubarrayCells {
    type Item = Vec<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.indices.next()?;
        Some(
            std::iter::zip(&self.lower, indices)
                .map(|(lower, index)| lower.wrapping_add_unsigned(index))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subarray_geometry() {
        let a = Subarray::new(vec![[1, 4], [-2, 2]]);
        assert!(a.is_valid());
        assert_eq!(a.shape(), Some(vec![4, 5]));
        assert_eq!(a.num_cells(), Some(20));
        assert!(a.contains(&[4, -2]));
        assert!(!a.contains(&[5, 0]));
        assert!(!a.contains(&[1]));

        let b = Subarray::new(vec![[3, 8], [0, 0]]);
        assert!(a.overlaps(&b));
        assert_eq!(a.intersect(&b), Some(Subarray::new(vec![[3, 4], [0, 0]])));
        assert!(!a.contains_subarray(&b));
        assert!(a.contains_subarray(&Subarray::new(vec![[2, 3], [0, 1]])));

        let c = Subarray::new(vec![[5, 8], [0, 0]]);
        assert!(!a.overlaps(&c));
        assert_eq!(a.intersect(&c), None);

        assert!(!Subarray::new(vec![[2, 1]]).is_valid());
        assert_eq!(Subarray::new(vec![[2, 1]]).num_cells(), None);
        assert_eq!(Subarray::new(vec![[i64::MIN, i64::MAX]]).num_cells(), None);
        assert_eq!(
            Subarray::new(vec![[i64::MIN, i64::MAX - 1]]).num_cells(),
            Some(u64::MAX)
        );
    }

    #[test]
    fn subarray_bounding_box() {
        let points: [&[i64]; 3] = [&[3, 1], &[1, 5], &[2, -1]];
        let bounding_box = Subarray::bounding_box(points.into_iter()).unwrap();
        assert_eq!(bounding_box, Subarray::new(vec![[1, 3], [-1, 5]]));
        assert_eq!(Subarray::bounding_box(std::iter::empty()), None);
    }

    #[test]
    fn subarray_cells_and_linear_index() {
        let subarray = Subarray::new(vec![[1, 2], [10, 12]]);
        let row_major: Vec<_> = subarray.cells(MajorOrder::RowMajor).collect();
        assert_eq!(
            row_major,
            vec![
                vec![1, 10],
                vec![1, 11],
                vec![1, 12],
                vec![2, 10],
                vec![2, 11],
                vec![2, 12]
            ]
        );
        for (index, cell) in row_major.iter().enumerate() {
            assert_eq!(
                subarray.linear_index(cell, MajorOrder::RowMajor),
                index as u64
            );
        }

        let col_major: Vec<_> = subarray.cells(MajorOrder::ColMajor).collect();
        assert_eq!(col_major[..3], [vec![1, 10], vec![2, 10], vec![1, 11]]);
        for (index, cell) in col_major.iter().enumerate() {
            assert_eq!(
                subarray.linear_index(cell, MajorOrder::ColMajor),
                index as u64
            );
        }

        assert_eq!(Subarray::new(vec![[3, 2]]).cells(MajorOrder::RowMajor).count(), 0);
        let clone = subarray.cells(MajorOrder::RowMajor);
        assert_eq!(clone.clone().count(), clone.count());
    }

    #[test]
    fn subarray_serde() {
        let subarray = Subarray::new(vec![[1, 3], [-1, 4]]);
        let json = serde_json::to_string(&subarray).unwrap();
        assert_eq!(json, "[[1,3],[-1,4]]");
        assert_eq!(serde_json::from_str::<Subarray>(&json).unwrap(), subarray);
    }
}
