use std::path::{Path, PathBuf};

use crate::errors::{Result, TilerError};
use crate::raster::{Buffer, PixelType, PixelValue};

/// Storage behind a [`Band`].
///
/// Tiles produced by this crate always own their pixels. Offline bands
/// reference pixels that live elsewhere (a band of an out-of-db raster file);
/// the optional slice is borrowed and must outlive the band.
#[derive(Debug, Clone, PartialEq)]
pub enum BandData<'a> {
    /// Pixels owned by the band, native-endian, row-major.
    Inline(Vec<u8>),
    /// Pixels owned by someone else.
    Offline {
        /// 0-based band number inside the external raster.
        band_num: u8,
        path: PathBuf,
        mem: Option<&'a [u8]>,
    },
}

/// A single band of a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Band<'a> {
    pixel_type: PixelType,
    width: u16,
    height: u16,
    no_data: Option<f64>,
    is_no_data: bool,
    data: BandData<'a>,
}

pub(crate) fn checked_dim(value: usize, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| {
        TilerError::BadArgument(format!("{what} {value} exceeds the 65535 pixel limit"))
    })
}

impl Band<'static> {
    /// Creates an inline band from native-endian pixel bytes.
    pub fn new_inline(
        width: usize,
        height: usize,
        pixel_type: PixelType,
        no_data: Option<f64>,
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = width * height * pixel_type.size();
        if data.len() != expected {
            return Err(TilerError::BadArgument(format!(
                "band of {width}x{height} {pixel_type} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Band {
            pixel_type,
            width: checked_dim(width, "band width")?,
            height: checked_dim(height, "band height")?,
            no_data: no_data.map(|v| pixel_type.clamp(v)),
            is_no_data: false,
            data: BandData::Inline(data),
        })
    }

    /// Allocates an inline band with every pixel set to `initial_value`.
    ///
    /// Fails with [`TilerError::Allocation`] instead of aborting when the
    /// pixel buffer cannot be reserved.
    pub fn generate(
        width: usize,
        height: usize,
        pixel_type: PixelType,
        initial_value: f64,
        no_data: Option<f64>,
    ) -> Result<Self> {
        checked_dim(width, "band width")?;
        checked_dim(height, "band height")?;
        let pixel = pixel_type.value_to_ne_bytes(initial_value);
        let len = width * height * pixel.len();

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| TilerError::allocation("band pixels", len, e))?;
        if pixel.iter().all(|b| *b == 0) {
            data.resize(len, 0);
        } else {
            for _ in 0..width * height {
                data.extend_from_slice(&pixel);
            }
        }

        let mut band = Band::new_inline(width, height, pixel_type, no_data, data)?;
        if let Some(nodata) = band.no_data {
            band.is_no_data = pixel_type.clamp(initial_value) == nodata;
        }
        Ok(band)
    }

    /// Creates an inline band from a typed buffer.
    pub fn from_buffer<T: PixelValue>(buffer: Buffer<T>, no_data: Option<f64>) -> Result<Self> {
        let bytes = buffer.to_ne_bytes();
        Band::new_inline(buffer.size.0, buffer.size.1, T::pixel_type(), no_data, bytes)
    }
}

impl<'a> Band<'a> {
    /// Creates a band whose pixels live in band `band_num` of the raster at `path`.
    pub fn new_offline(
        width: usize,
        height: usize,
        pixel_type: PixelType,
        no_data: Option<f64>,
        band_num: u8,
        path: PathBuf,
        mem: Option<&'a [u8]>,
    ) -> Result<Self> {
        Ok(Band {
            pixel_type,
            width: checked_dim(width, "band width")?,
            height: checked_dim(height, "band height")?,
            no_data: no_data.map(|v| pixel_type.clamp(v)),
            is_no_data: false,
            data: BandData::Offline {
                band_num,
                path,
                mem,
            },
        })
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
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

    pub fn no_data(&self) -> Option<f64> {
        self.no_data
    }

    pub fn has_no_data(&self) -> bool {
        self.no_data.is_some()
    }

    /// `true` when every pixel of the band is the no-data value.
    pub fn is_no_data(&self) -> bool {
        self.is_no_data
    }

    /// Flags the band as made only of no-data pixels.
    ///
    /// The flag cannot be raised on a band without a no-data value.
    pub fn set_is_no_data(&mut self, flag: bool) -> Result<()> {
        if flag && self.no_data.is_none() {
            return Err(TilerError::BadArgument(
                "cannot flag a band without a no-data value as all no-data".to_string(),
            ));
        }
        self.is_no_data = flag;
        Ok(())
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.data, BandData::Offline { .. })
    }

    pub fn band_data(&self) -> &BandData<'a> {
        &self.data
    }

    /// Pixel bytes, if loaded.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.data {
            BandData::Inline(data) => Some(data),
            BandData::Offline { mem, .. } => *mem,
        }
    }

    /// Path of the external raster for offline bands.
    pub fn offline_path(&self) -> Option<&Path> {
        match &self.data {
            BandData::Inline(_) => None,
            BandData::Offline { path, .. } => Some(path),
        }
    }

    /// Writes `values` (native-endian pixels) starting at pixel `(x, y)`.
    ///
    /// The run continues on the following rows when it is longer than the
    /// rest of the row. Only inline bands can be written.
    pub fn set_pixel_line(&mut self, x: usize, y: usize, values: &[u8]) -> Result<()> {
        let (width, height) = self.size();
        let pixel_size = self.pixel_type.size();
        if x >= width || y >= height {
            return Err(TilerError::BadArgument(format!(
                "pixel ({x}, {y}) outside band of {width}x{height}"
            )));
        }
        if values.len() % pixel_size != 0 {
            return Err(TilerError::BadArgument(format!(
                "{} bytes is not a whole number of {} pixels",
                values.len(),
                self.pixel_type
            )));
        }
        let start = (y * width + x) * pixel_size;
        let end = start + values.len();
        let data = match &mut self.data {
            BandData::Inline(data) => data,
            BandData::Offline { .. } => {
                return Err(TilerError::BadArgument(
                    "cannot write pixels of an offline band".to_string(),
                ))
            }
        };
        if end > data.len() {
            return Err(TilerError::BadArgument(format!(
                "pixel line of {} pixels at ({x}, {y}) runs past the end of the band",
                values.len() / pixel_size
            )));
        }
        data[start..end].copy_from_slice(values);
        Ok(())
    }

    /// Value of pixel `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> Result<f64> {
        let (width, height) = self.size();
        if x >= width || y >= height {
            return Err(TilerError::BadArgument(format!(
                "pixel ({x}, {y}) outside band of {width}x{height}"
            )));
        }
        let data = self.loaded_data()?;
        let size = self.pixel_type.size();
        let offset = (y * width + x) * size;
        Ok(self.pixel_type.value_from_ne_bytes(&data[offset..offset + size]))
    }

    /// Re-evaluates the all-no-data flag from the pixel values and returns it.
    pub fn check_is_no_data(&mut self) -> bool {
        let Some(nodata) = self.no_data else {
            self.is_no_data = false;
            return false;
        };
        let Some(data) = self.data() else {
            return self.is_no_data;
        };
        let pixel_type = self.pixel_type;
        let all = data
            .chunks_exact(pixel_type.size())
            .map(|px| pixel_type.value_from_ne_bytes(px))
            .all(|v| {
                if pixel_type.is_floating() {
                    (v - nodata).abs() <= f32::EPSILON as f64 || (v.is_nan() && nodata.is_nan())
                } else {
                    v == nodata
                }
            });
        self.is_no_data = all;
        all
    }

    /// Copies the pixels into a typed [`Buffer`].
    pub fn read_as<T: PixelValue>(&self) -> Result<Buffer<T>> {
        if T::pixel_type() != self.pixel_type {
            return Err(TilerError::BadArgument(format!(
                "band holds {} pixels, requested {}",
                self.pixel_type,
                T::pixel_type()
            )));
        }
        let data = self.loaded_data()?;
        let values = data
            .chunks_exact(self.pixel_type.size())
            .map(T::from_ne_slice)
            .collect();
        Ok(Buffer::new(self.size(), values))
    }

    fn loaded_data(&self) -> Result<&[u8]> {
        self.data().ok_or_else(|| {
            TilerError::BadArgument("offline band data is not loaded".to_string())
        })
    }
}
