//! Paginated tile production.

use tracing::{debug, trace};

use crate::config::RasterConfig;
use crate::errors::{Result, TilerError};
use crate::raster::{assemble_raster, RasterSource, Scratch, SourceRasterInfo, TileView};
use crate::tiling::TileGrid;
use crate::wkb::{encode, EncodedTile};

/// Where a [`BatchCursor`] stands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CursorState {
    /// No batch requested yet.
    Init,
    /// Tiles remain.
    Streaming,
    /// Every tile has been produced.
    Eof,
}

/// Produces the tiles of a source raster in batches.
///
/// Tiles come out in row-major grid order. Every call to
/// [`BatchCursor::next_batch`] returns at most `batch_size` tiles; a batch
/// shorter than that means the cursor reached the end. A failing call
/// returns no tiles and leaves the position untouched.
///
/// ```
/// use rastertile::raster::{Buffer, MemSource};
/// use rastertile::{BatchCursor, RasterConfig};
///
/// let mut source = MemSource::new(250, 100);
/// source.add_band(Buffer::new((250, 100), vec![7u8; 250 * 100]), None).unwrap();
/// let config = RasterConfig::builder().tile_size(100, 100).batch_size(2).build().unwrap();
///
/// let mut cursor = BatchCursor::new(source, config).unwrap();
/// assert_eq!(cursor.total_tiles(), 3);
/// assert_eq!(cursor.next_batch().unwrap().len(), 2);
/// assert_eq!(cursor.next_batch().unwrap().len(), 1);
/// assert!(cursor.next_batch().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct BatchCursor<S> {
    source: S,
    config: RasterConfig,
    info: SourceRasterInfo,
    grid: TileGrid,
    scratch: Scratch,
    next_tile_index: usize,
    produced: usize,
    started: bool,
    failed: bool,
}

impl<S: RasterSource> BatchCursor<S> {
    /// Plans the tiling of `source`. No pixel is read yet.
    pub fn new(source: S, config: RasterConfig) -> Result<Self> {
        Self::resume(source, config, 0)
    }

    /// Like [`BatchCursor::new`], but skips the first `start_index` tiles.
    ///
    /// A `start_index` at or past the total tile count leaves the cursor at
    /// its end, so the next batch is empty.
    pub fn resume(source: S, config: RasterConfig, start_index: usize) -> Result<Self> {
        let info = SourceRasterInfo::from_source(&source, &config)?;
        let grid = TileGrid::new(info.raster_size, config.tile_size(), config.pad_tile())?;
        if start_index > grid.total() {
            debug!(
                start_index,
                total = grid.total(),
                "Resume index past the last tile, cursor is at its end"
            );
        }
        let start_index = start_index.min(grid.total());
        debug!(
            tiles_x = grid.tiles().0,
            tiles_y = grid.tiles().1,
            total = grid.total(),
            start_index,
            batch_size = config.batch_size(),
            "Planned tile grid"
        );
        Ok(BatchCursor {
            source,
            config,
            info,
            grid,
            scratch: Scratch::new(),
            next_tile_index: start_index,
            produced: 0,
            started: false,
            failed: false,
        })
    }

    pub fn state(&self) -> CursorState {
        if self.next_tile_index == self.grid.total() {
            CursorState::Eof
        } else if self.started {
            CursorState::Streaming
        } else {
            CursorState::Init
        }
    }

    pub fn total_tiles(&self) -> usize {
        self.grid.total()
    }

    /// Index of the tile the next batch starts with.
    pub fn next_tile_index(&self) -> usize {
        self.next_tile_index
    }

    pub fn remaining(&self) -> usize {
        self.grid.total() - self.next_tile_index
    }

    /// Tiles produced by this cursor, excluding any skipped by
    /// [`BatchCursor::resume`].
    pub fn produced(&self) -> usize {
        self.produced
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn info(&self) -> &SourceRasterInfo {
        &self.info
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Gives the source back.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Produces the next batch as upper-case hex WKB strings.
    pub fn next_batch(&mut self) -> Result<Vec<String>> {
        Ok(self
            .next_encoded_batch()?
            .into_iter()
            .map(|tile| tile.hex)
            .collect())
    }

    /// Produces the next batch, keeping the binary size of every tile.
    pub fn next_encoded_batch(&mut self) -> Result<Vec<EncodedTile>> {
        self.started = true;
        let count = self.config.batch_size().min(self.remaining());

        let mut tiles = Vec::new();
        tiles
            .try_reserve_exact(count)
            .map_err(|e| TilerError::allocation("tile batch", count, e))?;

        let start = self.next_tile_index;
        for index in start..start + count {
            tiles.push(self.produce_tile(index)?);
        }

        self.next_tile_index += count;
        self.produced += count;
        debug!(
            produced = count,
            next_tile_index = self.next_tile_index,
            total = self.grid.total(),
            "Produced tile batch"
        );
        Ok(tiles)
    }

    fn produce_tile(&mut self, index: usize) -> Result<EncodedTile> {
        let (xtile, ytile) = self.grid.coords(index)?;
        let rect = self.grid.rect(index)?;
        debug!(
            index,
            xtile,
            ytile,
            x_offset = rect.x_offset,
            y_offset = rect.y_offset,
            width = rect.width,
            height = rect.height,
            "Assembling tile"
        );

        let view = TileView::new(&self.source, &self.info, rect);
        let raster = {
            let mut scratch = self.scratch.guard();
            assemble_raster(&view, &mut scratch)?
        };
        let tile = encode(raster, self.config.endian())?;
        trace!(index, wkb_size = tile.wkb_size, "Encoded tile");
        Ok(tile)
    }
}

impl<S: RasterSource> Iterator for BatchCursor<S> {
    type Item = Result<Vec<String>>;

    /// Yields non-empty batches until the end, then stops. A failed batch is
    /// yielded once as an error and ends the iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining() == 0 {
            return None;
        }
        let batch = self.next_batch();
        self.failed = batch.is_err();
        Some(batch)
    }
}
