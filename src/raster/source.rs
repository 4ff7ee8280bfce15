use tracing::debug;

use crate::config::RasterConfig;
use crate::errors::{Result, TilerError};
use crate::geo_transform::{GeoTransform, GeoTransformEx, DEFAULT_GEO_TRANSFORM};
use crate::raster::{Buffer, NativeType, PixelType, PixelValue};
use crate::tiling::TileRect;

/// Read access to a gridded raster dataset.
///
/// Band indexes are 1-based, as in GDAL.
pub trait RasterSource {
    /// `(cols, rows)`
    fn raster_size(&self) -> (usize, usize);

    fn raster_count(&self) -> usize;

    /// `None` when the dataset carries no geotransform.
    fn geo_transform(&self) -> Option<GeoTransform>;

    /// Spatial reference definition (usually WKT), `None` when absent.
    fn projection(&self) -> Option<String>;

    /// EPSG code of the spatial reference, if it has one.
    fn srid(&self) -> Option<i32>;

    fn band_type(&self, band_index: usize) -> Result<NativeType>;

    fn no_data_value(&self, band_index: usize) -> Result<Option<f64>>;

    /// Natural block size of the band, the chunk the dataset reads most efficiently.
    fn block_size(&self, band_index: usize) -> Result<(usize, usize)>;

    /// Reads the `window_size` pixels at `window` (top left) into `buffer`.
    ///
    /// Pixels are written row-major, packed, in the band's native type and
    /// native byte order. `buffer` must hold exactly
    /// `window_size.0 * window_size.1` pixels.
    fn read_into(
        &self,
        band_index: usize,
        window: (usize, usize),
        window_size: (usize, usize),
        buffer: &mut [u8],
    ) -> Result<()>;
}

impl<S: RasterSource + ?Sized> RasterSource for &S {
    fn raster_size(&self) -> (usize, usize) {
        (**self).raster_size()
    }

    fn raster_count(&self) -> usize {
        (**self).raster_count()
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        (**self).geo_transform()
    }

    fn projection(&self) -> Option<String> {
        (**self).projection()
    }

    fn srid(&self) -> Option<i32> {
        (**self).srid()
    }

    fn band_type(&self, band_index: usize) -> Result<NativeType> {
        (**self).band_type(band_index)
    }

    fn no_data_value(&self, band_index: usize) -> Result<Option<f64>> {
        (**self).no_data_value(band_index)
    }

    fn block_size(&self, band_index: usize) -> Result<(usize, usize)> {
        (**self).block_size(band_index)
    }

    fn read_into(
        &self,
        band_index: usize,
        window: (usize, usize),
        window_size: (usize, usize),
        buffer: &mut [u8],
    ) -> Result<()> {
        (**self).read_into(band_index, window, window_size, buffer)
    }
}

/// Per-band facts resolved once when a source is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct BandInfo {
    /// 1-based band index in the source.
    pub index: usize,
    pub native_type: NativeType,
    pub pixel_type: PixelType,
    /// The band's own no-data value, or the configured override.
    pub no_data: Option<f64>,
}

/// Facts about a source raster resolved once per conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRasterInfo {
    pub raster_size: (usize, usize),
    pub srid: i32,
    pub srs: Option<String>,
    pub geo_transform: GeoTransform,
    pub bands: Vec<BandInfo>,
}

impl SourceRasterInfo {
    /// Inspects `source`.
    ///
    /// Exactly one band is supported; any other count is an error, as is a
    /// band whose pixel type cannot be stored in a tile.
    pub fn from_source<S: RasterSource + ?Sized>(source: &S, config: &RasterConfig) -> Result<Self> {
        let count = source.raster_count();
        if count != 1 {
            return Err(TilerError::BandCount(count));
        }

        let srs = source.projection().filter(|p| !p.is_empty());
        let srid = source.srid().unwrap_or(config.srid());
        let geo_transform = source.geo_transform().unwrap_or_else(|| {
            debug!("Using default geotransform matrix (0, 1, 0, 0, 0, -1)");
            DEFAULT_GEO_TRANSFORM
        });

        let mut bands = Vec::with_capacity(count);
        for index in 1..=count {
            let native_type = source.band_type(index)?;
            let pixel_type = PixelType::from_native(native_type)?;
            let no_data = source.no_data_value(index)?.or(config.no_data());
            bands.push(BandInfo {
                index,
                native_type,
                pixel_type,
                no_data,
            });
        }

        let info = SourceRasterInfo {
            raster_size: source.raster_size(),
            srid,
            srs,
            geo_transform,
            bands,
        };
        debug!(
            width = info.raster_size.0,
            height = info.raster_size.1,
            srid = info.srid,
            "Resolved source raster info"
        );
        Ok(info)
    }

    fn band(&self, band_index: usize) -> Result<&BandInfo> {
        self.bands
            .iter()
            .find(|b| b.index == band_index)
            .ok_or_else(|| TilerError::BadArgument(format!("no band {band_index}")))
    }
}

/// Read-only window of a source limited to one tile.
///
/// Pixel `(0, 0)` of the view is pixel `(rect.x_offset, rect.y_offset)` of
/// the source. Parts of the window beyond the source extent read as the
/// band's no-data value, or zero when it has none.
#[derive(Debug)]
pub struct TileView<'s, S: ?Sized> {
    source: &'s S,
    info: &'s SourceRasterInfo,
    rect: TileRect,
}

impl<'s, S: RasterSource + ?Sized> TileView<'s, S> {
    pub fn new(source: &'s S, info: &'s SourceRasterInfo, rect: TileRect) -> Self {
        TileView { source, info, rect }
    }

    pub fn rect(&self) -> TileRect {
        self.rect
    }
}

impl<S: RasterSource + ?Sized> RasterSource for TileView<'_, S> {
    fn raster_size(&self) -> (usize, usize) {
        (self.rect.width, self.rect.height)
    }

    fn raster_count(&self) -> usize {
        self.info.bands.len()
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        Some(
            self.info
                .geo_transform
                .translated(self.rect.x_offset, self.rect.y_offset),
        )
    }

    fn projection(&self) -> Option<String> {
        self.info.srs.clone()
    }

    fn srid(&self) -> Option<i32> {
        Some(self.info.srid)
    }

    fn band_type(&self, band_index: usize) -> Result<NativeType> {
        Ok(self.info.band(band_index)?.native_type)
    }

    fn no_data_value(&self, band_index: usize) -> Result<Option<f64>> {
        Ok(self.info.band(band_index)?.no_data)
    }

    fn block_size(&self, band_index: usize) -> Result<(usize, usize)> {
        let (bx, by) = self.source.block_size(band_index)?;
        Ok((bx.min(self.rect.width), by.min(self.rect.height)))
    }

    fn read_into(
        &self,
        band_index: usize,
        window: (usize, usize),
        window_size: (usize, usize),
        buffer: &mut [u8],
    ) -> Result<()> {
        let band = self.info.band(band_index)?;
        let pixel_size = band.pixel_type.size();
        check_buffer(buffer, window_size, pixel_size)?;
        if window.0 + window_size.0 > self.rect.width || window.1 + window_size.1 > self.rect.height
        {
            return Err(read_error(band_index, window, window_size, "window outside tile"));
        }

        let (src_w, src_h) = self.info.raster_size;
        let x0 = self.rect.x_offset + window.0;
        let y0 = self.rect.y_offset + window.1;
        let valid_w = src_w.saturating_sub(x0).min(window_size.0);
        let valid_h = src_h.saturating_sub(y0).min(window_size.1);

        if valid_w == window_size.0 && valid_h == window_size.1 {
            return self
                .source
                .read_into(band_index, (x0, y0), window_size, buffer);
        }

        let fill = band
            .pixel_type
            .value_to_ne_bytes(band.no_data.unwrap_or(0.0));
        for px in buffer.chunks_exact_mut(pixel_size) {
            px.copy_from_slice(&fill);
        }
        if valid_w == 0 || valid_h == 0 {
            return Ok(());
        }

        let len = valid_w * valid_h * pixel_size;
        let mut valid = Vec::new();
        valid
            .try_reserve_exact(len)
            .map_err(|e| TilerError::allocation("padded tile window", len, e))?;
        valid.resize(len, 0);
        self.source
            .read_into(band_index, (x0, y0), (valid_w, valid_h), &mut valid)?;

        let src_stride = valid_w * pixel_size;
        let dst_stride = window_size.0 * pixel_size;
        for (row, line) in valid.chunks_exact(src_stride).enumerate() {
            let start = row * dst_stride;
            buffer[start..start + src_stride].copy_from_slice(line);
        }
        Ok(())
    }
}

fn check_buffer(buffer: &[u8], window_size: (usize, usize), pixel_size: usize) -> Result<()> {
    let expected = window_size.0 * window_size.1 * pixel_size;
    if buffer.len() != expected {
        return Err(TilerError::BadArgument(format!(
            "read buffer holds {} bytes, window of {}x{} needs {expected}",
            buffer.len(),
            window_size.0,
            window_size.1
        )));
    }
    Ok(())
}

fn read_error(
    band: usize,
    window: (usize, usize),
    window_size: (usize, usize),
    msg: &str,
) -> TilerError {
    TilerError::ReadFailed {
        band,
        x: window.0,
        y: window.1,
        width: window_size.0,
        height: window_size.1,
        msg: msg.to_string(),
    }
}

#[derive(Debug, Clone)]
struct MemBand {
    native_type: NativeType,
    no_data: Option<f64>,
    data: Vec<u8>,
}

/// An in-memory raster dataset.
///
/// Reports a configurable natural block size so the block-copy path can be
/// driven with any chunking, scanlines (`(width, 1)`) by default.
///
/// ```
/// use rastertile::raster::{Buffer, MemSource, RasterSource};
///
/// let mut source = MemSource::new(4, 2).with_block_size(2, 2);
/// source.add_band(Buffer::new((4, 2), vec![1u8, 2, 3, 4, 5, 6, 7, 8]), None).unwrap();
///
/// let mut window = vec![0u8; 4];
/// source.read_into(1, (1, 0), (2, 2), &mut window).unwrap();
/// assert_eq!(window, vec![2, 3, 6, 7]);
/// ```
#[derive(Debug, Clone)]
pub struct MemSource {
    size: (usize, usize),
    geo_transform: Option<GeoTransform>,
    projection: Option<String>,
    srid: Option<i32>,
    block_size: (usize, usize),
    bands: Vec<MemBand>,
}

impl MemSource {
    pub fn new(width: usize, height: usize) -> Self {
        MemSource {
            size: (width, height),
            geo_transform: None,
            projection: None,
            srid: None,
            block_size: (width.max(1), 1),
            bands: Vec::new(),
        }
    }

    pub fn with_geo_transform(mut self, geo_transform: GeoTransform) -> Self {
        self.geo_transform = Some(geo_transform);
        self
    }

    /// Sets the spatial reference definition and, when known, its EPSG code.
    pub fn with_projection(mut self, projection: &str, srid: Option<i32>) -> Self {
        self.projection = Some(projection.to_string());
        self.srid = srid;
        self
    }

    pub fn with_block_size(mut self, block_x: usize, block_y: usize) -> Self {
        self.block_size = (block_x.max(1), block_y.max(1));
        self
    }

    /// Appends a band holding `buffer`.
    pub fn add_band<T: PixelValue>(&mut self, buffer: Buffer<T>, no_data: Option<f64>) -> Result<()> {
        self.add_raw_band(T::native_type(), buffer.to_ne_bytes(), no_data)
    }

    /// Appends a band from native-endian bytes of `native_type`.
    ///
    /// The length is only checked for types with a known size, so bands of
    /// packed or unknown encodings can be modelled too.
    pub fn add_raw_band(
        &mut self,
        native_type: NativeType,
        data: Vec<u8>,
        no_data: Option<f64>,
    ) -> Result<()> {
        if let Some(size) = native_type.bytes() {
            let expected = self.size.0 * self.size.1 * size;
            if data.len() != expected {
                return Err(TilerError::BadArgument(format!(
                    "band of {}x{} {native_type:?} needs {expected} bytes, got {}",
                    self.size.0,
                    self.size.1,
                    data.len()
                )));
            }
        }
        self.bands.push(MemBand {
            native_type,
            no_data,
            data,
        });
        Ok(())
    }

    fn band(&self, band_index: usize) -> Result<&MemBand> {
        band_index
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .ok_or_else(|| TilerError::BadArgument(format!("no band {band_index}")))
    }
}

impl RasterSource for MemSource {
    fn raster_size(&self) -> (usize, usize) {
        self.size
    }

    fn raster_count(&self) -> usize {
        self.bands.len()
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn projection(&self) -> Option<String> {
        self.projection.clone()
    }

    fn srid(&self) -> Option<i32> {
        self.srid
    }

    fn band_type(&self, band_index: usize) -> Result<NativeType> {
        Ok(self.band(band_index)?.native_type)
    }

    fn no_data_value(&self, band_index: usize) -> Result<Option<f64>> {
        Ok(self.band(band_index)?.no_data)
    }

    fn block_size(&self, band_index: usize) -> Result<(usize, usize)> {
        self.band(band_index)?;
        Ok(self.block_size)
    }

    fn read_into(
        &self,
        band_index: usize,
        window: (usize, usize),
        window_size: (usize, usize),
        buffer: &mut [u8],
    ) -> Result<()> {
        let band = self.band(band_index)?;
        let pixel_size = band
            .native_type
            .bytes()
            .ok_or(TilerError::UnsupportedPixelType(band.native_type))?;
        check_buffer(buffer, window_size, pixel_size)?;
        if window.0 + window_size.0 > self.size.0 || window.1 + window_size.1 > self.size.1 {
            return Err(read_error(
                band_index,
                window,
                window_size,
                "window outside raster",
            ));
        }

        let src_stride = self.size.0 * pixel_size;
        let line = window_size.0 * pixel_size;
        for row in 0..window_size.1 {
            let src = (window.1 + row) * src_stride + window.0 * pixel_size;
            buffer[row * line..(row + 1) * line].copy_from_slice(&band.data[src..src + line]);
        }
        Ok(())
    }
}
