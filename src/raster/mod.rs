//! In-memory rasters and the sources they are assembled from.

mod assemble;
mod band;
mod buffer;
mod source;
mod types;

pub use assemble::{assemble_full_extent, assemble_raster, Scratch, ScratchGuard};
pub use band::{Band, BandData};
pub use buffer::{Buffer, ByteBuffer};
pub use source::{BandInfo, MemSource, RasterSource, SourceRasterInfo, TileView};
pub use types::{NativeType, PixelType, PixelValue};

use geo_types::Rect;

use crate::errors::{Result, TilerError};
use crate::geo_transform::{GeoTransform, GeoTransformEx, DEFAULT_GEO_TRANSFORM};
use band::checked_dim;

/// A georeferenced raster made of bands of identical size.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<'a> {
    geo_transform: GeoTransform,
    srid: i32,
    width: u16,
    height: u16,
    bands: Vec<Band<'a>>,
}

impl<'a> Raster<'a> {
    /// Creates a raster without bands and with the default north-up transform.
    ///
    /// Both dimensions are limited to 65535 pixels.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        Ok(Raster {
            geo_transform: DEFAULT_GEO_TRANSFORM,
            srid: 0,
            width: checked_dim(width, "raster width")?,
            height: checked_dim(height, "raster height")?,
            bands: Vec::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    /// `(cols, rows)`
    pub fn size(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    pub fn set_geo_transform(&mut self, geo_transform: GeoTransform) {
        self.geo_transform = geo_transform;
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn set_srid(&mut self, srid: i32) {
        self.srid = srid;
    }

    /// Georeferenced envelope of the raster.
    pub fn extent(&self) -> Rect<f64> {
        self.geo_transform.extent(self.width(), self.height())
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band at 0-based `index`.
    pub fn band(&self, index: usize) -> Option<&Band<'a>> {
        self.bands.get(index)
    }

    pub fn band_mut(&mut self, index: usize) -> Option<&mut Band<'a>> {
        self.bands.get_mut(index)
    }

    pub fn bands(&self) -> &[Band<'a>] {
        &self.bands
    }

    /// Appends `band` and returns its 0-based index.
    ///
    /// The band must have the raster's dimensions.
    pub fn add_band(&mut self, band: Band<'a>) -> Result<usize> {
        if band.size() != self.size() {
            return Err(TilerError::BadArgument(format!(
                "band of {}x{} does not match raster of {}x{}",
                band.width(),
                band.height(),
                self.width,
                self.height
            )));
        }
        if self.bands.len() >= u16::MAX as usize {
            return Err(TilerError::BadArgument(
                "raster already has the maximum number of bands".to_string(),
            ));
        }
        self.bands.push(band);
        Ok(self.bands.len() - 1)
    }
}

#[cfg(test)]
mod tests;
