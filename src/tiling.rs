//! Tile grid planning.
//!
//! Tiles are numbered row-major: tile `i` sits in grid row `i / tiles_x`
//! and grid column `i % tiles_x`.

use crate::errors::{Result, TilerError};

/// Pixel rectangle of one tile within the source raster.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TileRect {
    pub x_offset: usize,
    pub y_offset: usize,
    pub width: usize,
    pub height: usize,
}

impl TileRect {
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Returns `true` if both rectangles share at least one pixel.
    pub fn intersects(&self, other: &TileRect) -> bool {
        self.x_offset < other.x_offset + other.width
            && other.x_offset < self.x_offset + self.width
            && self.y_offset < other.y_offset + other.height
            && other.y_offset < self.y_offset + self.height
    }
}

/// The tile grid laid over a source raster.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TileGrid {
    raster_size: (usize, usize),
    tile_size: (usize, usize),
    tiles: (usize, usize),
    pad_tile: bool,
}

impl TileGrid {
    /// Plans the grid for a raster of `raster_size` (`(cols, rows)`).
    ///
    /// A `0` in `tile_size` uses the full raster extent on that axis, which
    /// yields a single tile along it.
    pub fn new(raster_size: (usize, usize), tile_size: (usize, usize), pad_tile: bool) -> Result<Self> {
        if raster_size.0 == 0 || raster_size.1 == 0 {
            return Err(TilerError::BadArgument(format!(
                "cannot tile an empty raster of size {}x{}",
                raster_size.0, raster_size.1
            )));
        }
        let tile_size = (
            if tile_size.0 == 0 { raster_size.0 } else { tile_size.0 },
            if tile_size.1 == 0 { raster_size.1 } else { tile_size.1 },
        );
        let tiles = (
            raster_size.0.div_ceil(tile_size.0),
            raster_size.1.div_ceil(tile_size.1),
        );
        Ok(TileGrid {
            raster_size,
            tile_size,
            tiles,
            pad_tile,
        })
    }

    pub fn raster_size(&self) -> (usize, usize) {
        self.raster_size
    }

    /// Effective tile size, with `0` already replaced by the raster extent.
    pub fn tile_size(&self) -> (usize, usize) {
        self.tile_size
    }

    /// Number of tiles along each axis, `(tiles_x, tiles_y)`.
    pub fn tiles(&self) -> (usize, usize) {
        self.tiles
    }

    pub fn total(&self) -> usize {
        self.tiles.0 * self.tiles.1
    }

    pub fn pad_tile(&self) -> bool {
        self.pad_tile
    }

    /// Grid coordinate `(xtile, ytile)` of the tile at linear `index`.
    pub fn coords(&self, index: usize) -> Result<(usize, usize)> {
        if index >= self.total() {
            return Err(TilerError::BadArgument(format!(
                "tile index {index} out of range, grid has {} tiles",
                self.total()
            )));
        }
        Ok((index % self.tiles.0, index / self.tiles.0))
    }

    /// Pixel rectangle of the tile at linear `index`.
    ///
    /// Tiles in the last column/row are truncated to the raster edge unless
    /// the grid pads edge tiles, in which case they keep the full tile size.
    pub fn rect(&self, index: usize) -> Result<TileRect> {
        let (xtile, ytile) = self.coords(index)?;
        let x_offset = xtile * self.tile_size.0;
        let y_offset = ytile * self.tile_size.1;

        let width = if !self.pad_tile && xtile == self.tiles.0 - 1 {
            self.raster_size.0 - x_offset
        } else {
            self.tile_size.0
        };
        let height = if !self.pad_tile && ytile == self.tiles.1 - 1 {
            self.raster_size.1 - y_offset
        } else {
            self.tile_size.1
        };

        Ok(TileRect {
            x_offset,
            y_offset,
            width,
            height,
        })
    }

    /// Iterates over all tile rectangles in index order.
    pub fn rects(&self) -> impl Iterator<Item = TileRect> + '_ {
        (0..self.total()).filter_map(move |i| self.rect(i).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_400_by_400() {
        let grid = TileGrid::new((400, 400), (100, 100), false).unwrap();
        assert_eq!(grid.tiles(), (4, 4));
        assert_eq!(grid.total(), 16);
        assert_eq!(
            grid.rect(5).unwrap(),
            TileRect {
                x_offset: 100,
                y_offset: 100,
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn test_zero_tile_size_uses_full_extent() {
        let grid = TileGrid::new((250, 120), (0, 0), false).unwrap();
        assert_eq!(grid.tiles(), (1, 1));
        assert_eq!(grid.tile_size(), (250, 120));

        let grid = TileGrid::new((250, 120), (100, 0), false).unwrap();
        assert_eq!(grid.tiles(), (3, 1));
        assert_eq!(grid.rect(2).unwrap().height, 120);
    }

    #[test]
    fn test_row_major_order() {
        let grid = TileGrid::new((300, 200), (100, 100), false).unwrap();
        let coords: Vec<_> = (0..grid.total()).map(|i| grid.coords(i).unwrap()).collect();
        assert_eq!(
            coords,
            vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]
        );
    }

    #[test]
    fn test_truncated_last_column() {
        let grid = TileGrid::new((250, 100), (100, 100), false).unwrap();
        assert_eq!(grid.tiles(), (3, 1));
        let last = grid.rect(2).unwrap();
        assert_eq!(last.x_offset, 200);
        assert_eq!(last.width, 50);
        assert_eq!(last.height, 100);
    }

    #[test]
    fn test_padded_edges_keep_full_size() {
        let grid = TileGrid::new((250, 130), (100, 100), true).unwrap();
        assert_eq!(grid.tiles(), (3, 2));
        for rect in grid.rects() {
            assert_eq!((rect.width, rect.height), (100, 100));
        }
    }

    #[test]
    fn test_partition_covers_raster() {
        for (size, tile) in [
            ((400, 400), (100, 100)),
            ((250, 100), (100, 100)),
            ((257, 131), (64, 32)),
            ((10, 10), (3, 7)),
            ((1, 1), (5, 5)),
        ] {
            let grid = TileGrid::new(size, tile, false).unwrap();
            let rects: Vec<_> = grid.rects().collect();
            assert_eq!(rects.len(), grid.total());
            let area: usize = rects.iter().map(TileRect::area).sum();
            assert_eq!(area, size.0 * size.1);
            for (i, a) in rects.iter().enumerate() {
                assert!(a.x_offset + a.width <= size.0);
                assert!(a.y_offset + a.height <= size.1);
                for b in &rects[i + 1..] {
                    assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_even_division() {
        let grid = TileGrid::new((640, 480), (160, 120), false).unwrap();
        let (tiles_x, tiles_y) = grid.tiles();
        assert_eq!(tiles_x * 160, 640);
        assert_eq!(tiles_y * 120, 480);
    }

    #[test]
    fn test_planning_is_idempotent() {
        let a = TileGrid::new((1000, 700), (256, 256), false).unwrap();
        let b = TileGrid::new((1000, 700), (256, 256), false).unwrap();
        assert_eq!(a, b);
        for i in 0..a.total() {
            assert_eq!(a.rect(i).unwrap(), b.rect(i).unwrap());
        }
    }

    #[test]
    fn test_out_of_range_index() {
        let grid = TileGrid::new((100, 100), (50, 50), false).unwrap();
        assert!(grid.rect(4).is_err());
        assert!(grid.coords(usize::MAX).is_err());
    }

    #[test]
    fn test_empty_raster() {
        assert!(TileGrid::new((0, 10), (5, 5), false).is_err());
    }
}
