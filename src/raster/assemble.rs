use std::ops::{Deref, DerefMut};

use tracing::trace;

use crate::config::RasterConfig;
use crate::errors::{Result, TilerError};
use crate::geo_transform::DEFAULT_GEO_TRANSFORM;
use crate::raster::{Band, PixelType, Raster, RasterSource, SourceRasterInfo, TileView};
use crate::tiling::TileRect;

/// Reusable scratch memory for block reads.
///
/// One `Scratch` serves a whole conversion; its contents only matter while a
/// single tile is being assembled, so it is reset after each tile while the
/// allocation is kept.
#[derive(Debug, Default)]
pub struct Scratch {
    block: Vec<u8>,
}

impl Scratch {
    pub fn new() -> Self {
        Scratch::default()
    }

    /// Returns `len` zeroed bytes, growing the allocation when needed.
    pub fn acquire(&mut self, len: usize) -> Result<&mut [u8]> {
        self.block.clear();
        self.block
            .try_reserve_exact(len)
            .map_err(|e| TilerError::allocation("block buffer", len, e))?;
        self.block.resize(len, 0);
        Ok(&mut self.block)
    }

    /// Bytes currently handed out.
    pub fn len(&self) -> usize {
        self.block.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.block.capacity()
    }

    pub fn reset(&mut self) {
        self.block.clear();
    }

    /// Scoped access that resets the scratch when dropped, whether the work
    /// done through it succeeded or not.
    pub fn guard(&mut self) -> ScratchGuard<'_> {
        ScratchGuard { scratch: self }
    }
}

/// Resets the borrowed [`Scratch`] on drop.
#[derive(Debug)]
pub struct ScratchGuard<'a> {
    scratch: &'a mut Scratch,
}

impl Deref for ScratchGuard<'_> {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        self.scratch
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scratch {
        self.scratch
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        self.scratch.reset();
    }
}

/// Reads the whole of `source` into a new [`Raster`].
///
/// Pixels are pulled along the source's natural blocks. The geotransform
/// defaults to `(0, 1, 0, 0, 0, -1)` and the srid to `0` when the source has
/// none. Any failure drops the raster under construction.
pub fn assemble_raster<S: RasterSource + ?Sized>(
    source: &S,
    scratch: &mut Scratch,
) -> Result<Raster<'static>> {
    let (width, height) = source.raster_size();
    let mut raster = Raster::new(width, height)?;
    raster.set_geo_transform(source.geo_transform().unwrap_or(DEFAULT_GEO_TRANSFORM));
    raster.set_srid(source.srid().unwrap_or(0));

    for band_index in 1..=source.raster_count() {
        let pixel_type = PixelType::from_native(source.band_type(band_index)?)?;
        let no_data = source.no_data_value(band_index)?;
        let mut band = Band::generate(
            width,
            height,
            pixel_type,
            no_data.unwrap_or(0.0),
            no_data,
        )?;
        copy_blocks(source, band_index, &mut band, scratch)?;
        band.check_is_no_data();
        raster.add_band(band)?;
    }

    Ok(raster)
}

/// Reads the whole of `source` into one [`Raster`] as a single tile.
///
/// Unlike [`assemble_raster`] on the bare source, the configured fallbacks
/// apply: the no-data override when the band has none and the configured
/// srid when the source has no EPSG code. Only single-band sources are
/// accepted.
pub fn assemble_full_extent<S: RasterSource + ?Sized>(
    source: &S,
    config: &RasterConfig,
    scratch: &mut Scratch,
) -> Result<Raster<'static>> {
    let info = SourceRasterInfo::from_source(source, config)?;
    let (width, height) = info.raster_size;
    let view = TileView::new(
        source,
        &info,
        TileRect {
            x_offset: 0,
            y_offset: 0,
            width,
            height,
        },
    );
    let mut scratch = scratch.guard();
    assemble_raster(&view, &mut scratch)
}

fn copy_blocks<S: RasterSource + ?Sized>(
    source: &S,
    band_index: usize,
    band: &mut Band<'static>,
    scratch: &mut Scratch,
) -> Result<()> {
    let (width, height) = band.size();
    let pixel_size = band.pixel_type().size();
    let (block_x, block_y) = source.block_size(band_index)?;
    if width == 0 || height == 0 {
        return Ok(());
    }
    // a block never exceeds the band
    let (block_x, block_y) = (block_x.clamp(1, width), block_y.clamp(1, height));
    let blocks_x = width.div_ceil(block_x);
    let blocks_y = height.div_ceil(block_y);
    trace!(band_index, block_x, block_y, blocks_x, blocks_y, "Copying natural blocks");

    let values = scratch.acquire(block_x * block_y * pixel_size)?;

    for iy in 0..blocks_y {
        for ix in 0..blocks_x {
            let x = ix * block_x;
            let y = iy * block_y;
            let valid_x = block_x.min(width - x);
            let valid_y = block_y.min(height - y);

            let chunk = &mut values[..valid_x * valid_y * pixel_size];
            chunk.fill(0);
            source.read_into(band_index, (x, y), (valid_x, valid_y), chunk)?;

            if blocks_x == 1 && block_y > 1 && valid_x == width {
                // rows of the block are contiguous in the band
                band.set_pixel_line(0, y, chunk)?;
            } else {
                for (row, line) in chunk.chunks_exact(valid_x * pixel_size).enumerate() {
                    band.set_pixel_line(x, y + row, line)?;
                }
            }
        }
    }

    Ok(())
}
