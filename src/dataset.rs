//! GDAL-backed raster source.

use std::ffi::{c_int, c_void, CString};
use std::path::Path;
use std::ptr;
use std::sync::Once;

use gdal_sys::{self, CPLErr, GDALDatasetH, GDALRWFlag, GDALRasterBandH, OGRErr};
use tracing::debug;

use crate::config::RasterConfig;
use crate::cursor::BatchCursor;
use crate::errors::*;
use crate::geo_transform::GeoTransform;
use crate::options::GdalOpenFlags;
use crate::raster::{NativeType, RasterSource};
use crate::utils::{_last_cpl_err, _last_null_pointer_err, _path_to_c_string, _string};

static START: Once = Once::new();

pub fn _register_drivers() {
    START.call_once(|| unsafe {
        gdal_sys::GDALAllRegister();
    });
}

/// A raster dataset opened read-only through GDAL.
///
/// The handle may be moved to another thread but must not be used by two at
/// once; concurrent consumers open their own dataset.
#[derive(Debug)]
pub struct Dataset {
    c_dataset: GDALDatasetH,
    srid: Option<i32>,
}

// GDAL Docs state: The returned dataset should only be accessed by one thread at a time.
// See: https://gdal.org/api/raster_c_api.html#_CPPv48GDALOpenPKc10GDALAccess
unsafe impl Send for Dataset {}

impl Dataset {
    /// Returns the wrapped C pointer
    ///
    /// # Safety
    /// This method returns a raw C pointer
    pub unsafe fn c_dataset(&self) -> GDALDatasetH {
        self.c_dataset
    }

    /// Opens the raster at `path` with the default flags.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        Self::open_ex(path.as_ref(), GdalOpenFlags::default())
    }

    pub fn open_ex(path: &Path, open_flags: GdalOpenFlags) -> Result<Dataset> {
        _register_drivers();
        let c_filename = _path_to_c_string(path)?;
        let c_dataset = unsafe {
            gdal_sys::GDALOpenEx(
                c_filename.as_ptr(),
                open_flags.bits(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
            )
        };
        if c_dataset.is_null() {
            let msg = match _last_null_pointer_err("GDALOpenEx") {
                TilerError::NullPointer { msg, .. } => msg,
                other => other.to_string(),
            };
            return Err(TilerError::SourceOpen {
                path: path.to_string_lossy().into_owned(),
                msg,
            });
        }

        let mut dataset = Dataset {
            c_dataset,
            srid: None,
        };
        dataset.srid = dataset.projection().as_deref().and_then(epsg_code);
        debug!(
            path = %path.display(),
            width = dataset.raster_size().0,
            height = dataset.raster_size().1,
            bands = dataset.raster_count(),
            srid = ?dataset.srid,
            "Opened raster dataset"
        );
        Ok(dataset)
    }

    fn c_band(&self, band_index: usize) -> Result<GDALRasterBandH> {
        let c_index = c_int::try_from(band_index)?;
        let c_band = unsafe { gdal_sys::GDALGetRasterBand(self.c_dataset, c_index) };
        if c_band.is_null() {
            return Err(_last_null_pointer_err("GDALGetRasterBand"));
        }
        Ok(c_band)
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        unsafe {
            gdal_sys::GDALClose(self.c_dataset);
        }
    }
}

impl RasterSource for Dataset {
    fn raster_size(&self) -> (usize, usize) {
        let size_x = unsafe { gdal_sys::GDALGetRasterXSize(self.c_dataset) } as usize;
        let size_y = unsafe { gdal_sys::GDALGetRasterYSize(self.c_dataset) } as usize;
        (size_x, size_y)
    }

    fn raster_count(&self) -> usize {
        (unsafe { gdal_sys::GDALGetRasterCount(self.c_dataset) }) as usize
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        let mut transformation = GeoTransform::default();
        let rv =
            unsafe { gdal_sys::GDALGetGeoTransform(self.c_dataset, transformation.as_mut_ptr()) };
        if rv != CPLErr::CE_None {
            unsafe { gdal_sys::CPLErrorReset() };
            return None;
        }
        Some(transformation)
    }

    fn projection(&self) -> Option<String> {
        let rv = unsafe { gdal_sys::GDALGetProjectionRef(self.c_dataset) };
        _string(rv).filter(|p| !p.is_empty())
    }

    fn srid(&self) -> Option<i32> {
        self.srid
    }

    fn band_type(&self, band_index: usize) -> Result<NativeType> {
        let c_band = self.c_band(band_index)?;
        Ok(unsafe { gdal_sys::GDALGetRasterDataType(c_band) }.into())
    }

    fn no_data_value(&self, band_index: usize) -> Result<Option<f64>> {
        let c_band = self.c_band(band_index)?;
        let mut pb_success = 1;
        let no_data = unsafe { gdal_sys::GDALGetRasterNoDataValue(c_band, &mut pb_success) };
        if pb_success == 1 {
            return Ok(Some(no_data));
        }
        Ok(None)
    }

    fn block_size(&self, band_index: usize) -> Result<(usize, usize)> {
        let c_band = self.c_band(band_index)?;
        let mut size_x = 0;
        let mut size_y = 0;
        unsafe { gdal_sys::GDALGetBlockSize(c_band, &mut size_x, &mut size_y) };
        Ok((size_x as usize, size_y as usize))
    }

    fn read_into(
        &self,
        band_index: usize,
        window: (usize, usize),
        window_size: (usize, usize),
        buffer: &mut [u8],
    ) -> Result<()> {
        let c_band = self.c_band(band_index)?;
        let native = self.band_type(band_index)?;
        let pixel_size = native
            .bytes()
            .ok_or(TilerError::UnsupportedPixelType(native))?;
        if buffer.len() != window_size.0 * window_size.1 * pixel_size {
            return Err(TilerError::BadArgument(format!(
                "read buffer holds {} bytes, window of {}x{} needs {}",
                buffer.len(),
                window_size.0,
                window_size.1,
                window_size.0 * window_size.1 * pixel_size
            )));
        }
        let (x, y) = (c_int::try_from(window.0)?, c_int::try_from(window.1)?);
        let (w, h) = (
            c_int::try_from(window_size.0)?,
            c_int::try_from(window_size.1)?,
        );

        let rv = unsafe {
            gdal_sys::GDALRasterIO(
                c_band,
                GDALRWFlag::GF_Read,
                x,
                y,
                w,
                h,
                buffer.as_mut_ptr() as *mut c_void,
                w,
                h,
                gdal_sys::GDALGetRasterDataType(c_band),
                0,
                0,
            )
        };
        if rv != CPLErr::CE_None {
            return Err(TilerError::ReadFailed {
                band: band_index,
                x: window.0,
                y: window.1,
                width: window_size.0,
                height: window_size.1,
                msg: _last_cpl_err(rv).to_string(),
            });
        }
        Ok(())
    }
}

/// EPSG code of a spatial reference definition, if its authority is EPSG.
fn epsg_code(definition: &str) -> Option<i32> {
    let c_definition = CString::new(definition).ok()?;
    unsafe {
        let c_srs = gdal_sys::OSRNewSpatialReference(ptr::null());
        if c_srs.is_null() {
            return None;
        }
        let mut code = None;
        if gdal_sys::OSRSetFromUserInput(c_srs, c_definition.as_ptr()) == OGRErr::OGRERR_NONE {
            let name = _string(gdal_sys::OSRGetAuthorityName(c_srs, ptr::null()));
            let value = _string(gdal_sys::OSRGetAuthorityCode(c_srs, ptr::null()));
            if name.as_deref() == Some("EPSG") {
                code = value.and_then(|v| v.parse().ok());
            }
        }
        gdal_sys::OSRDestroySpatialReference(c_srs);
        code
    }
}

/// Opens the raster at `path` and plans its tiling.
pub fn open_cursor<P: AsRef<Path>>(path: P, config: RasterConfig) -> Result<BatchCursor<Dataset>> {
    BatchCursor::new(Dataset::open(path)?, config)
}

/// Produces the batch of hex WKB tiles that starts at tile `start_index`.
///
/// This is the one-shot form used by row-oriented hosts that re-open the
/// source for every fetch and pass the number of rows already consumed.
pub fn convert_raster<P: AsRef<Path>>(
    path: P,
    config: RasterConfig,
    start_index: usize,
) -> Result<Vec<String>> {
    BatchCursor::resume(Dataset::open(path)?, config, start_index)?.next_batch()
}
