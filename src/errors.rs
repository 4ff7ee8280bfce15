use std::collections::TryReserveError;
use std::ffi::NulError;
use std::num::TryFromIntError;

#[cfg(feature = "gdal")]
use gdal_sys::CPLErr;
use thiserror::Error;

use crate::raster::NativeType;

pub type Result<T> = std::result::Result<T, TilerError>;

#[derive(Debug, Error)]
pub enum TilerError {
    #[error("Invalid raster configuration: {0}")]
    Config(String),
    #[error("Unable to read configuration file: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("Unable to open raster source '{path}': {msg}")]
    SourceOpen { path: String, msg: String },
    #[error("Raster source has {0} bands, exactly one band is supported")]
    BandCount(usize),
    #[error("Pixel type {0:?} cannot be stored in a raster tile")]
    UnsupportedPixelType(NativeType),
    #[error("Could not allocate {bytes} bytes for {what}")]
    Allocation {
        what: &'static str,
        bytes: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("Could not read block at ({x}, {y}) size {width}x{height} from band {band}: {msg}")]
    ReadFailed {
        band: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        msg: String,
    },
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[error("Malformed raster WKB at byte {offset}: {msg}")]
    InvalidWkb { offset: usize, msg: String },
    #[error(transparent)]
    HexDecode(#[from] hex::FromHexError),
    #[error(transparent)]
    IntConversionError(#[from] TryFromIntError),
    #[error("FfiNulError")]
    FfiNulError(#[from] NulError),
    #[cfg(feature = "gdal")]
    #[error("CPL error class: '{class:?}', error number: '{number}', error msg: '{msg}'")]
    CplError {
        class: CPLErr::Type,
        number: i32,
        msg: String,
    },
    #[cfg(feature = "gdal")]
    #[error("GDAL method '{method_name}' returned a NULL pointer. Error msg: '{msg}'")]
    NullPointer {
        method_name: &'static str,
        msg: String,
    },
    #[cfg(feature = "ndarray")]
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl TilerError {
    /// Builds an [`TilerError::Allocation`] for a failed `try_reserve`.
    pub(crate) fn allocation(what: &'static str, bytes: usize, source: TryReserveError) -> Self {
        TilerError::Allocation {
            what,
            bytes,
            source,
        }
    }

    pub(crate) fn invalid_wkb(offset: usize, msg: impl Into<String>) -> Self {
        TilerError::InvalidWkb {
            offset,
            msg: msg.into(),
        }
    }
}
