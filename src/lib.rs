#![crate_name = "rastertile"]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Splits rasters into georeferenced tiles encoded as hex raster WKB.
//!
//! A source raster (anything implementing [`RasterSource`], such as an
//! in-memory [`raster::MemSource`] or, with the `gdal` feature, a GDAL
//! [`Dataset`]) is cut along a [`TileGrid`]. Each tile is read along the
//! source's natural blocks into a [`Raster`], serialized to raster WKB and
//! expanded to upper-case hexadecimal. A [`BatchCursor`] hands the tiles out
//! in bounded batches and can resume from any tile index.
//!
//! ```
//! use rastertile::raster::{Buffer, MemSource};
//! use rastertile::{BatchCursor, Raster, RasterConfig};
//!
//! let mut source = MemSource::new(400, 400)
//!     .with_geo_transform([500000.0, 30.0, 0.0, 4000000.0, 0.0, -30.0]);
//! source.add_band(Buffer::new((400, 400), vec![1u8; 400 * 400]), None).unwrap();
//!
//! let config = RasterConfig::builder().tile_size(100, 100).batch_size(100).build().unwrap();
//! let mut cursor = BatchCursor::new(source, config).unwrap();
//!
//! let tiles = cursor.next_batch().unwrap();
//! assert_eq!(tiles.len(), 16);
//! assert!(cursor.next_batch().unwrap().is_empty());
//!
//! let tile = Raster::from_hex_wkb(&tiles[5]).unwrap();
//! assert_eq!(tile.geo_transform()[0], 503000.0);
//! ```
//!
//! ### Features
//!
//! - `gdal`: GDAL-backed [`Dataset`] source, [`open_cursor`] and [`convert_raster`].
//!   Needs `libgdal` on the system.
//! - `bundled`: builds GDAL from source through `gdal-src` and links it statically.
//! - `array`: conversions between [`raster::Buffer`] and `ndarray` arrays.

pub mod config;
pub mod cursor;
pub mod errors;
pub mod geo_transform;
pub mod raster;
pub mod tiling;
pub mod wkb;

#[cfg(feature = "gdal")]
pub mod dataset;
#[cfg(feature = "gdal")]
pub mod options;
#[cfg(feature = "gdal")]
mod utils;

#[cfg(test)]
mod test_utils;

// links the GDAL built from source
#[cfg(feature = "bundled")]
use gdal_src as _;

pub use config::{RasterConfig, RasterConfigBuilder, DEFAULT_BATCH_SIZE};
pub use cursor::{BatchCursor, CursorState};
pub use errors::{Result, TilerError};
pub use geo_transform::{GeoTransform, GeoTransformEx};
pub use raster::{Band, PixelType, Raster, RasterSource};
pub use tiling::{TileGrid, TileRect};
pub use wkb::{encode, EncodedTile, Endian};

#[cfg(feature = "gdal")]
#[cfg_attr(docsrs, doc(cfg(feature = "gdal")))]
pub use dataset::{convert_raster, open_cursor, Dataset};
