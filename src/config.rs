//! Tiling and batching parameters.
//!
//! A [`RasterConfig`] is usually read from a small line-oriented file:
//!
//! ```text
//! # 100x100 pixel tiles, 50 tiles per batch
//! tile_size=100x100
//! batchsize=50
//! pad_tile=false
//! nodata=-9999
//! ```
//!
//! ```
//! use rastertile::config::RasterConfig;
//!
//! let config: RasterConfig = "tile_size=256x128\nbatchsize=10".parse().unwrap();
//! assert_eq!(config.tile_size(), (256, 128));
//! assert_eq!(config.batch_size(), 10);
//! ```
//!
//! Lines without `=`, unknown keys and values that do not parse are logged
//! and skipped.

use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::errors::{Result, TilerError};
use crate::wkb::Endian;

/// Number of tiles produced per batch when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Validated tiling configuration. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterConfig {
    tile_size: (usize, usize),
    batch_size: usize,
    pad_tile: bool,
    no_data: Option<f64>,
    srid: i32,
    out_srid: i32,
    endian: Endian,
}

impl Default for RasterConfig {
    fn default() -> Self {
        RasterConfig {
            tile_size: (0, 0),
            batch_size: DEFAULT_BATCH_SIZE,
            pad_tile: false,
            no_data: None,
            srid: 0,
            out_srid: 0,
            endian: Endian::native(),
        }
    }
}

impl RasterConfig {
    pub fn builder() -> RasterConfigBuilder {
        RasterConfigBuilder {
            config: RasterConfig::default(),
        }
    }

    /// Reads a configuration file. See the [module docs](self) for the format.
    pub fn from_conf_file<P: AsRef<Path>>(path: P) -> Result<RasterConfig> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading raster configuration");
        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }

    /// Tile size in pixels, `(cols, rows)`. `0` on an axis means the full
    /// raster extent on that axis.
    pub fn tile_size(&self) -> (usize, usize) {
        self.tile_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether edge tiles keep the full tile size (padded) or are truncated.
    pub fn pad_tile(&self) -> bool {
        self.pad_tile
    }

    /// No-data value applied to bands that do not carry their own.
    pub fn no_data(&self) -> Option<f64> {
        self.no_data
    }

    /// Spatial reference id used when the source has no EPSG authority.
    pub fn srid(&self) -> i32 {
        self.srid
    }

    /// Requested output spatial reference id. Carried only, pixels are never
    /// reprojected.
    pub fn out_srid(&self) -> i32 {
        self.out_srid
    }

    /// Byte order of the produced raster WKB.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    fn apply_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let Some((key, value)) = line.split_once('=') else {
            info!(line, "Skipping configuration line without '='");
            return;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "tile_size" => match parse_tile_size(value) {
                Some(size) => {
                    self.tile_size = size;
                    debug!(width = size.0, height = size.1, "Configured tile size");
                }
                None => info!(value, "Skipping malformed tile_size"),
            },
            "batchsize" => match value.parse::<i64>() {
                Ok(n) if n > 0 => {
                    self.batch_size = n as usize;
                    debug!(batch_size = self.batch_size, "Configured batch size");
                }
                Ok(n) => {
                    warn!(
                        batchsize = n,
                        default = DEFAULT_BATCH_SIZE,
                        "Non-positive batchsize, using default"
                    );
                    self.batch_size = DEFAULT_BATCH_SIZE;
                }
                Err(_) => info!(value, "Skipping malformed batchsize"),
            },
            "pad_tile" => match parse_bool(value) {
                Some(flag) => self.pad_tile = flag,
                None => info!(value, "Skipping malformed pad_tile"),
            },
            "nodata" => match value.parse::<f64>() {
                Ok(v) => self.no_data = Some(v),
                Err(_) => info!(value, "Skipping malformed nodata"),
            },
            "srid" => match value.parse::<i32>() {
                Ok(v) => self.srid = v,
                Err(_) => info!(value, "Skipping malformed srid"),
            },
            "out_srid" => match value.parse::<i32>() {
                Ok(v) => self.out_srid = v,
                Err(_) => info!(value, "Skipping malformed out_srid"),
            },
            _ => info!(key, "Skipping unknown configuration key"),
        }
    }
}

impl FromStr for RasterConfig {
    type Err = TilerError;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = RasterConfig::default();
        for line in s.lines() {
            config.apply_line(line);
        }
        Ok(config)
    }
}

/// `<W>x<H>`, both non-negative.
fn parse_tile_size(value: &str) -> Option<(usize, usize)> {
    let (w, h) = value.split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Programmatic construction of a [`RasterConfig`].
#[derive(Debug)]
pub struct RasterConfigBuilder {
    config: RasterConfig,
}

impl RasterConfigBuilder {
    pub fn tile_size(mut self, width: usize, height: usize) -> Self {
        self.config.tile_size = (width, height);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn pad_tile(mut self, pad_tile: bool) -> Self {
        self.config.pad_tile = pad_tile;
        self
    }

    pub fn no_data(mut self, no_data: f64) -> Self {
        self.config.no_data = Some(no_data);
        self
    }

    pub fn srid(mut self, srid: i32) -> Self {
        self.config.srid = srid;
        self
    }

    pub fn out_srid(mut self, out_srid: i32) -> Self {
        self.config.out_srid = out_srid;
        self
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.config.endian = endian;
        self
    }

    pub fn build(self) -> Result<RasterConfig> {
        if self.config.batch_size == 0 {
            return Err(TilerError::Config(
                "batch size must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}
