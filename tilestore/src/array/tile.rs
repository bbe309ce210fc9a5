//! Tiles: the unit of compression and storage.
//!
//! A [`Tile`] owns the bytes of one attribute, offsets, or dimension region within one tile of a fragment.
//! It is filled while uncompressed, then compressed once before it is persisted.
//! On read it is created compressed from the stored bytes and decompressed before its cells are accessed.
//!
//! A [`VarTile`] pairs an offsets tile with a values tile for variable length cells.

use tilestore_codec::Compressor;

use super::TileError;

/// The size of one offset of a variable length tile.
pub(crate) const OFFSET_SIZE: usize = size_of::<u64>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileState {
    Uncompressed,
    Compressed { uncompressed_size: usize },
}

/// A tile of cells of one region.
#[derive(Debug, Clone)]
pub struct Tile {
    data: Vec<u8>,
    state: TileState,
    cell_size: Option<usize>,
    element_size: usize,
    cell_count: u64,
    capacity: u64,
    compressor: Compressor,
}

impl Tile {
    /// Create an empty tile of at most `capacity` cells of `cell_size` bytes.
    ///
    /// `element_size` is passed to the compressor for type aware transforms.
    #[must_use]
    pub fn new(cell_size: usize, element_size: usize, capacity: u64, compressor: Compressor) -> Self {
        let reserve = usize::try_from(capacity)
            .ok()
            .and_then(|capacity| capacity.checked_mul(cell_size))
            .unwrap_or(0);
        Self {
            data: Vec::with_capacity(reserve),
            state: TileState::Uncompressed,
            cell_size: Some(cell_size),
            element_size,
            cell_count: 0,
            capacity,
            compressor,
        }
    }

    /// Create an empty tile for the values of at most `capacity` variable length cells.
    #[must_use]
    pub fn new_var_values(element_size: usize, capacity: u64, compressor: Compressor) -> Self {
        Self {
            data: Vec::new(),
            state: TileState::Uncompressed,
            cell_size: None,
            element_size,
            cell_count: 0,
            capacity,
            compressor,
        }
    }

    /// Create a compressed tile of `cell_count` cells from stored bytes.
    #[must_use]
    pub fn from_compressed(
        data: Vec<u8>,
        uncompressed_size: usize,
        cell_size: Option<usize>,
        element_size: usize,
        cell_count: u64,
        compressor: Compressor,
    ) -> Self {
        Self {
            data,
            state: TileState::Compressed { uncompressed_size },
            cell_size,
            element_size,
            cell_count,
            capacity: cell_count,
            compressor,
        }
    }

    /// Append whole cells to the tile.
    ///
    /// # Errors
    /// Returns a [`TileError`] if
    ///  - the tile is compressed or holds variable length values,
    ///  - `cells` is not a multiple of the cell size, or
    ///  - the tile capacity would be exceeded.
    pub fn fill(&mut self, cells: &[u8]) -> Result<(), TileError> {
        let Some(cell_size) = self.cell_size else {
            return Err(TileError::Inconsistent(
                "a variable length values tile is filled through its var tile".to_string(),
            ));
        };
        if cell_size == 0 || cells.len() % cell_size != 0 {
            return Err(TileError::NotMultipleOfCellSize {
                length: cells.len(),
                cell_size,
            });
        }
        self.append(cells, (cells.len() / cell_size) as u64)
    }

    fn append(&mut self, bytes: &[u8], cells: u64) -> Result<(), TileError> {
        if self.is_compressed() {
            return Err(TileError::Compressed);
        }
        let remaining = self.capacity - self.cell_count;
        if cells > remaining {
            return Err(TileError::CapacityExceeded { cells, remaining });
        }
        self.data.extend_from_slice(bytes);
        self.cell_count += cells;
        Ok(())
    }

    /// Compress the tile. This is a no-op if it is already compressed.
    ///
    /// # Errors
    /// Returns [`TileError::Compression`] if the compressor fails.
    pub fn compress(&mut self) -> Result<(), TileError> {
        if self.is_compressed() {
            return Ok(());
        }
        let compressed = self
            .compressor
            .compress_to_vec(self.element_size, &self.data)
            .map_err(TileError::Compression)?;
        self.state = TileState::Compressed {
            uncompressed_size: self.data.len(),
        };
        self.data = compressed;
        Ok(())
    }

    /// Decompress the tile. This is a no-op if it is not compressed.
    ///
    /// # Errors
    /// Returns [`TileError::Decompression`] if the data is corrupt or does not decompress to the expected size.
    pub fn decompress(&mut self) -> Result<(), TileError> {
        let TileState::Compressed { uncompressed_size } = self.state else {
            return Ok(());
        };
        if let Some(cell_size) = self.cell_size {
            let expected = usize::try_from(self.cell_count)
                .ok()
                .and_then(|cell_count| cell_count.checked_mul(cell_size));
            if expected != Some(uncompressed_size) {
                return Err(TileError::Inconsistent(format!(
                    "{} cells of {cell_size} bytes cannot have an uncompressed size of {uncompressed_size} bytes",
                    self.cell_count
                )));
            }
        }
        self.data = self
            .compressor
            .decompress_to_vec(self.element_size, &self.data, uncompressed_size)
            .map_err(TileError::Decompression)?;
        self.state = TileState::Uncompressed;
        Ok(())
    }

    /// Read `length` bytes at `offset` of an uncompressed tile.
    ///
    /// # Errors
    /// Returns a [`TileError`] if the tile is compressed or the range is out of bounds.
    pub fn read_range(&self, offset: usize, length: usize) -> Result<&[u8], TileError> {
        if self.is_compressed() {
            return Err(TileError::Compressed);
        }
        offset
            .checked_add(length)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(TileError::OutOfBounds {
                offset,
                length,
                size: self.data.len(),
            })
    }

    /// Read cell `index` of an uncompressed fixed length tile.
    ///
    /// # Errors
    /// Returns a [`TileError`] if the tile is compressed, holds variable length values, or `index` is out of bounds.
    pub fn cell(&self, index: usize) -> Result<&[u8], TileError> {
        let cell_size = self.cell_size.ok_or_else(|| {
            TileError::Inconsistent("variable length values have no cell size".to_string())
        })?;
        self.read_range(index * cell_size, cell_size)
    }

    /// Returns true if the tile is compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        matches!(self.state, TileState::Compressed { .. })
    }

    /// The number of cells.
    #[must_use]
    pub fn cell_count(&self) -> u64 {
        self.cell_count
    }

    /// The maximum number of cells.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The size of the tile data in its current state.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The size of the tile data when uncompressed.
    #[must_use]
    pub fn uncompressed_size(&self) -> usize {
        match self.state {
            TileState::Uncompressed => self.data.len(),
            TileState::Compressed { uncompressed_size } => uncompressed_size,
        }
    }

    /// The tile data in its current state.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the tile and return its data.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// A tile of variable length cells: an offsets tile and a values tile kept in lock-step.
///
/// The offsets tile holds one native endian [`u64`] per cell: the byte offset of the cell in the values tile.
#[derive(Debug, Clone)]
pub struct VarTile {
    offsets: Tile,
    values: Tile,
}

impl VarTile {
    /// Create an empty variable length tile of at most `capacity` cells.
    #[must_use]
    pub fn new(
        element_size: usize,
        capacity: u64,
        offsets_compressor: Compressor,
        values_compressor: Compressor,
    ) -> Self {
        Self {
            offsets: Tile::new(OFFSET_SIZE, OFFSET_SIZE, capacity, offsets_compressor),
            values: Tile::new_var_values(element_size, capacity, values_compressor),
        }
    }

    /// Pair an offsets tile with a values tile.
    ///
    /// # Errors
    /// Returns [`TileError::Inconsistent`] if the tiles do not hold the same number of cells.
    pub fn from_tiles(offsets: Tile, values: Tile) -> Result<Self, TileError> {
        if offsets.cell_count() != values.cell_count() || offsets.cell_size != Some(OFFSET_SIZE)
        {
            return Err(TileError::Inconsistent(format!(
                "{} offsets for {} values",
                offsets.cell_count(),
                values.cell_count()
            )));
        }
        Ok(Self { offsets, values })
    }

    /// Append one cell.
    ///
    /// # Errors
    /// Returns a [`TileError`] if either tile is compressed or the capacity would be exceeded.
    pub fn fill_cell(&mut self, value: &[u8]) -> Result<(), TileError> {
        let offset = self.values.size() as u64;
        self.offsets.fill(&offset.to_ne_bytes())?;
        self.values.append(value, 1)
    }

    /// Compress both tiles.
    ///
    /// # Errors
    /// Returns [`TileError::Compression`] if a compressor fails.
    pub fn compress(&mut self) -> Result<(), TileError> {
        self.offsets.compress()?;
        self.values.compress()
    }

    /// Decompress both tiles and check the offsets are monotonic and in bounds.
    ///
    /// # Errors
    /// Returns a [`TileError`] if decompression fails or the offsets are invalid.
    pub fn decompress(&mut self) -> Result<(), TileError> {
        self.offsets.decompress()?;
        self.values.decompress()?;
        let mut previous = 0;
        for index in 0..self.cell_count_usize() {
            let offset = self.offset(index)?;
            if offset < previous || offset > self.values.size() {
                return Err(TileError::Inconsistent(format!(
                    "offset {offset} of cell {index} is out of order or out of bounds"
                )));
            }
            previous = offset;
        }
        Ok(())
    }

    fn cell_count_usize(&self) -> usize {
        usize::try_from(self.offsets.cell_count()).unwrap_or(usize::MAX)
    }

    fn offset(&self, index: usize) -> Result<usize, TileError> {
        let bytes = self.offsets.cell(index)?;
        let mut offset = [0; OFFSET_SIZE];
        offset.copy_from_slice(bytes);
        usize::try_from(u64::from_ne_bytes(offset)).map_err(|_| TileError::OutOfBounds {
            offset: usize::MAX,
            length: 0,
            size: self.values.size(),
        })
    }

    /// Read cell `index` of a decompressed tile.
    ///
    /// # Errors
    /// Returns a [`TileError`] if the tile is compressed or `index` is out of bounds.
    pub fn cell(&self, index: usize) -> Result<&[u8], TileError> {
        let start = self.offset(index)?;
        let end = if index + 1 < self.cell_count_usize() {
            self.offset(index + 1)?
        } else {
            self.values.size()
        };
        let length = end.checked_sub(start).ok_or(TileError::OutOfBounds {
            offset: start,
            length: 0,
            size: self.values.size(),
        })?;
        self.values.read_range(start, length)
    }

    /// The number of cells.
    #[must_use]
    pub fn cell_count(&self) -> u64 {
        self.offsets.cell_count()
    }

    /// The offsets tile.
    #[must_use]
    pub fn offsets(&self) -> &Tile {
        &self.offsets
    }

    /// The values tile.
    #[must_use]
    pub fn values(&self) -> &Tile {
        &self.values
    }

    /// Consume the tile and return the offsets and values tiles.
    #[must_use]
    pub fn into_tiles(self) -> (Tile, Tile) {
        (self.offsets, self.values)
    }
}

#[cfg(test)]
mod tests {
    use tilestore_codec::{GzipCompressor, Lz4Compressor, ShuffleCompressor, ZstdCompressor};

    use super::*;

    fn compressors() -> Vec<Compressor> {
        vec![
            Compressor::None,
            Compressor::Gzip(GzipCompressor::new(5).unwrap()),
            Compressor::Zstd(ZstdCompressor::new(3).unwrap()),
            Compressor::Lz4(Lz4Compressor::new()),
            Compressor::Shuffle(
                ShuffleCompressor::new(Compressor::Lz4(Lz4Compressor::new())).unwrap(),
            ),
        ]
    }

    fn cells(count: u32) -> Vec<u8> {
        (0..count).flat_map(|i| (i * 7 % 13).to_ne_bytes()).collect()
    }

    #[test]
    fn tile_compression_round_trip() {
        let capacity = 100;
        for compressor in compressors() {
            // empty, single cell, and full tiles
            for count in [0, 1, capacity] {
                let data = cells(count);
                let mut tile = Tile::new(4, 4, u64::from(capacity), compressor.clone());
                tile.fill(&data).unwrap();
                assert_eq!(tile.cell_count(), u64::from(count));
                tile.compress().unwrap();
                assert!(tile.is_compressed());
                let compressed = tile.as_bytes().to_vec();
                // compressing twice is a no-op
                tile.compress().unwrap();
                assert_eq!(tile.as_bytes(), compressed);
                assert_eq!(tile.uncompressed_size(), data.len());

                let mut tile = Tile::from_compressed(
                    compressed,
                    data.len(),
                    Some(4),
                    4,
                    u64::from(count),
                    compressor.clone(),
                );
                tile.decompress().unwrap();
                tile.decompress().unwrap();
                assert_eq!(tile.as_bytes(), data);
            }
        }
    }

    #[test]
    fn tile_capacity() {
        let mut tile = Tile::new(2, 2, 3, Compressor::None);
        tile.fill(&[0; 4]).unwrap();
        assert!(matches!(
            tile.fill(&[0; 4]),
            Err(TileError::CapacityExceeded {
                cells: 2,
                remaining: 1
            })
        ));
        assert!(matches!(
            tile.fill(&[0; 3]),
            Err(TileError::NotMultipleOfCellSize { .. })
        ));
        tile.fill(&[1, 2]).unwrap();
        assert_eq!(tile.cell_count(), tile.capacity());
        assert_eq!(tile.cell(2).unwrap(), &[1, 2]);
        assert!(tile.cell(3).is_err());
        assert_eq!(tile.read_range(1, 4).unwrap(), &[0, 0, 0, 1]);
        assert!(tile.read_range(4, 3).is_err());

        tile.compress().unwrap();
        assert!(matches!(tile.fill(&[0; 2]), Err(TileError::Compressed)));
        assert!(matches!(tile.read_range(0, 1), Err(TileError::Compressed)));
    }

    #[test]
    fn tile_corrupt() {
        let compressor = Compressor::Lz4(Lz4Compressor::new());
        let mut tile = Tile::new(4, 4, 100, compressor.clone());
        tile.fill(&cells(100)).unwrap();
        tile.compress().unwrap();
        let mut bytes = tile.into_bytes();
        bytes.truncate(bytes.len() / 2);
        let mut tile = Tile::from_compressed(bytes, 400, Some(4), 4, 100, compressor);
        assert!(matches!(tile.decompress(), Err(TileError::Decompression(_))));

        let mut tile = Tile::from_compressed(vec![0; 8], 8, Some(4), 4, 3, Compressor::None);
        assert!(matches!(tile.decompress(), Err(TileError::Inconsistent(_))));
    }

    #[test]
    fn var_tile() {
        let mut tile = VarTile::new(
            1,
            3,
            Compressor::Lz4(Lz4Compressor::new()),
            Compressor::Zstd(ZstdCompressor::new(1).unwrap()),
        );
        for value in ["a", "bb", "ccc"] {
            tile.fill_cell(value.as_bytes()).unwrap();
        }
        assert!(matches!(
            tile.fill_cell(b"d"),
            Err(TileError::CapacityExceeded { .. })
        ));
        assert_eq!(tile.cell(1).unwrap(), b"bb");
        assert_eq!(tile.values().as_bytes(), b"abbccc");
        assert_eq!(
            tile.offsets().as_bytes(),
            [0u64, 1, 3].iter().flat_map(|o| o.to_ne_bytes()).collect::<Vec<_>>()
        );

        tile.compress().unwrap();
        assert!(tile.cell(0).is_err());
        let (offsets, values) = tile.into_tiles();
        let offsets = Tile::from_compressed(
            offsets.into_bytes(),
            24,
            Some(OFFSET_SIZE),
            OFFSET_SIZE,
            3,
            Compressor::Lz4(Lz4Compressor::new()),
        );
        let values = Tile::from_compressed(
            values.into_bytes(),
            6,
            None,
            1,
            3,
            Compressor::Zstd(ZstdCompressor::new(1).unwrap()),
        );
        let mut tile = VarTile::from_tiles(offsets, values).unwrap();
        tile.decompress().unwrap();
        assert_eq!(tile.cell_count(), 3);
        assert_eq!(tile.cell(0).unwrap(), b"a");
        assert_eq!(tile.cell(2).unwrap(), b"ccc");
    }

    #[test]
    fn var_tile_invalid_offsets() {
        let offsets: Vec<u8> = [0u64, 4, 2].iter().flat_map(|o| o.to_ne_bytes()).collect();
        let offsets = Tile::from_compressed(offsets, 24, Some(OFFSET_SIZE), OFFSET_SIZE, 3, Compressor::None);
        let values = Tile::from_compressed(vec![0; 5], 5, None, 1, 3, Compressor::None);
        let mut tile = VarTile::from_tiles(offsets, values).unwrap();
        assert!(matches!(tile.decompress(), Err(TileError::Inconsistent(_))));

        let offsets = Tile::from_compressed(vec![0; 8], 8, Some(OFFSET_SIZE), OFFSET_SIZE, 1, Compressor::None);
        let values = Tile::from_compressed(vec![0; 5], 5, None, 1, 2, Compressor::None);
        assert!(VarTile::from_tiles(offsets, values).is_err());
    }
}
