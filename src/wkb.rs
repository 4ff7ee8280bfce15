//! Raster WKB, the binary form tiles are stored in.
//!
//! The layout is the PostGIS raster WKB (version 0):
//!
//! ```text
//! u8   endianness   1 = little endian (NDR), 0 = big endian (XDR)
//! u16  version      0
//! u16  band count
//! f64  scale_x, scale_y, ip_x, ip_y, skew_x, skew_y
//! i32  srid
//! u16  width, height
//!
//! per band
//! u8   flags | pixel type   0x80 offline, 0x40 has no-data, 0x20 all no-data
//! ..   no-data value, one pixel wide
//! ..   inline: width * height pixels, row-major
//!      offline: u8 band number, NUL-terminated path
//! ```
//!
//! Multi-byte values use the byte order announced by the first byte.
//! [`Raster::to_hex_wkb`] expands the bytes as upper-case hexadecimal.

use std::path::PathBuf;

use bitflags::bitflags;

use crate::errors::{Result, TilerError};
use crate::geo_transform::GeoTransform;
use crate::raster::{Band, PixelType, Raster};

/// Raster WKB format version written and accepted.
pub const WKB_VERSION: u16 = 0;

const HEADER_SIZE: usize = 1 + 2 + 2 + 6 * 8 + 4 + 2 + 2;

/// Byte order of the encoded raster.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Endian {
    /// XDR
    Big,
    /// NDR
    Little,
}

impl Endian {
    /// Byte order of the running machine.
    pub fn native() -> Endian {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// Value of the leading endianness byte.
    pub fn marker(&self) -> u8 {
        match self {
            Endian::Big => 0,
            Endian::Little => 1,
        }
    }

    pub fn from_marker(marker: u8) -> Option<Endian> {
        match marker {
            0 => Some(Endian::Big),
            1 => Some(Endian::Little),
            _ => None,
        }
    }
}

bitflags! {
    /// High bits of the first byte of a band record. The low nibble is the
    /// [`PixelType`] tag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BandFlags: u8 {
        const OFFLINE = 0x80;
        const HAS_NODATA = 0x40;
        const IS_NODATA = 0x20;
        /// Reserved, must be zero.
        const RESERVED = 0x10;
    }
}

const PIXEL_TYPE_MASK: u8 = 0x0F;

/// One encoded tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTile {
    /// Upper-case hexadecimal expansion of the WKB.
    pub hex: String,
    /// Size of the binary WKB in bytes; `hex` is twice as long.
    pub wkb_size: usize,
}

/// Encodes `raster` and releases it.
///
/// The raster is consumed whether encoding succeeds or not, so a tile can
/// never be encoded twice.
pub fn encode(raster: Raster<'_>, endian: Endian) -> Result<EncodedTile> {
    let wkb = raster.to_wkb(endian)?;
    drop(raster);
    Ok(EncodedTile {
        hex: hex::encode_upper(&wkb),
        wkb_size: wkb.len(),
    })
}

struct Writer {
    endian: Endian,
    out: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    fn bytes<const N: usize>(&mut self, le: [u8; N], be: [u8; N]) {
        match self.endian {
            Endian::Little => self.out.extend_from_slice(&le),
            Endian::Big => self.out.extend_from_slice(&be),
        }
    }

    fn u16(&mut self, v: u16) {
        self.bytes(v.to_le_bytes(), v.to_be_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.bytes(v.to_le_bytes(), v.to_be_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.bytes(v.to_le_bytes(), v.to_be_bytes());
    }

    /// Native-endian pixels, `size` bytes each.
    fn pixels(&mut self, data: &[u8], size: usize) {
        if size == 1 || self.endian == Endian::native() {
            self.out.extend_from_slice(data);
        } else {
            for px in data.chunks_exact(size) {
                self.out.extend(px.iter().rev());
            }
        }
    }
}

impl Raster<'_> {
    /// Size of the WKB produced by [`Raster::to_wkb`].
    pub fn wkb_size(&self) -> usize {
        HEADER_SIZE
            + self
                .bands()
                .iter()
                .map(|band| {
                    let size = band.pixel_type().size();
                    1 + size
                        + match band.offline_path() {
                            Some(path) => 1 + path.as_os_str().len() + 1,
                            None => band.width() * band.height() * size,
                        }
                })
                .sum::<usize>()
    }

    /// Serializes the raster to WKB in the given byte order.
    pub fn to_wkb(&self, endian: Endian) -> Result<Vec<u8>> {
        let len = self.wkb_size();
        let mut out = Vec::new();
        out.try_reserve_exact(len)
            .map_err(|e| TilerError::allocation("raster WKB", len, e))?;
        let mut w = Writer { endian, out };

        let gt = self.geo_transform();
        w.u8(endian.marker());
        w.u16(WKB_VERSION);
        w.u16(u16::try_from(self.band_count())?);
        // scale_x, scale_y, ip_x, ip_y, skew_x, skew_y
        for v in [gt[1], gt[5], gt[0], gt[3], gt[2], gt[4]] {
            w.f64(v);
        }
        w.i32(self.srid());
        w.u16(u16::try_from(self.width())?);
        w.u16(u16::try_from(self.height())?);

        for band in self.bands() {
            let pixel_type = band.pixel_type();
            let mut flags = BandFlags::empty();
            flags.set(BandFlags::OFFLINE, band.is_offline());
            flags.set(BandFlags::HAS_NODATA, band.has_no_data());
            flags.set(BandFlags::IS_NODATA, band.is_no_data());
            w.u8(flags.bits() | pixel_type as u8);

            let nodata = pixel_type.value_to_ne_bytes(band.no_data().unwrap_or(0.0));
            w.pixels(&nodata, pixel_type.size());

            match band.offline_path() {
                Some(path) => {
                    let band_num = match band.band_data() {
                        crate::raster::BandData::Offline { band_num, .. } => *band_num,
                        crate::raster::BandData::Inline(_) => 0,
                    };
                    let path = path.to_str().ok_or_else(|| {
                        TilerError::BadArgument(format!(
                            "offline band path {} is not valid UTF-8",
                            path.display()
                        ))
                    })?;
                    if path.as_bytes().contains(&0) {
                        return Err(TilerError::BadArgument(
                            "offline band path contains a NUL byte".to_string(),
                        ));
                    }
                    w.u8(band_num);
                    w.out.extend_from_slice(path.as_bytes());
                    w.u8(0);
                }
                None => {
                    let data = band.data().ok_or_else(|| {
                        TilerError::BadArgument("band has no pixel data".to_string())
                    })?;
                    w.pixels(data, pixel_type.size());
                }
            }
        }

        Ok(w.out)
    }

    /// Serializes the raster to upper-case hex WKB.
    pub fn to_hex_wkb(&self, endian: Endian) -> Result<String> {
        Ok(hex::encode_upper(self.to_wkb(endian)?))
    }
}

struct Reader<'b> {
    bytes: &'b [u8],
    pos: usize,
    endian: Endian,
}

impl<'b> Reader<'b> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'b [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(TilerError::invalid_wkb(
                self.pos,
                format!("truncated while reading {what}"),
            )),
        }
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.array(what)?;
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        })
    }

    fn i32(&mut self, what: &str) -> Result<i32> {
        let b = self.array(what)?;
        Ok(match self.endian {
            Endian::Little => i32::from_le_bytes(b),
            Endian::Big => i32::from_be_bytes(b),
        })
    }

    fn f64(&mut self, what: &str) -> Result<f64> {
        let b = self.array(what)?;
        Ok(match self.endian {
            Endian::Little => f64::from_le_bytes(b),
            Endian::Big => f64::from_be_bytes(b),
        })
    }

    /// `count` pixels of `size` bytes, converted to native byte order.
    fn pixels(&mut self, count: usize, size: usize, what: &str) -> Result<Vec<u8>> {
        let len = count
            .checked_mul(size)
            .ok_or_else(|| TilerError::invalid_wkb(self.pos, format!("{what} too large")))?;
        let raw = self.take(len, what)?;
        let mut out = Vec::new();
        out.try_reserve_exact(len)
            .map_err(|e| TilerError::allocation("decoded band pixels", len, e))?;
        if size == 1 || self.endian == Endian::native() {
            out.extend_from_slice(raw);
        } else {
            for px in raw.chunks_exact(size) {
                out.extend(px.iter().rev());
            }
        }
        Ok(out)
    }
}

impl Raster<'static> {
    /// Parses raster WKB in either byte order.
    pub fn from_wkb(bytes: &[u8]) -> Result<Self> {
        let marker = *bytes
            .first()
            .ok_or_else(|| TilerError::invalid_wkb(0, "empty input"))?;
        let endian = Endian::from_marker(marker)
            .ok_or_else(|| TilerError::invalid_wkb(0, format!("bad endianness byte {marker}")))?;
        let mut r = Reader {
            bytes,
            pos: 1,
            endian,
        };

        let version = r.u16("version")?;
        if version != WKB_VERSION {
            return Err(TilerError::invalid_wkb(
                1,
                format!("unsupported version {version}"),
            ));
        }
        let band_count = r.u16("band count")?;
        let scale_x = r.f64("scale x")?;
        let scale_y = r.f64("scale y")?;
        let ip_x = r.f64("ip x")?;
        let ip_y = r.f64("ip y")?;
        let skew_x = r.f64("skew x")?;
        let skew_y = r.f64("skew y")?;
        let srid = r.i32("srid")?;
        let width = r.u16("width")? as usize;
        let height = r.u16("height")? as usize;

        let geo_transform: GeoTransform = [ip_x, scale_x, skew_x, ip_y, skew_y, scale_y];
        let mut raster = Raster::new(width, height)?;
        raster.set_geo_transform(geo_transform);
        raster.set_srid(srid);

        for _ in 0..band_count {
            let offset = r.pos;
            let head = r.u8("band header")?;
            let flags = BandFlags::from_bits_truncate(head & !PIXEL_TYPE_MASK);
            let pixel_type = PixelType::try_from(head & PIXEL_TYPE_MASK)
                .map_err(|e| TilerError::invalid_wkb(offset, e.to_string()))?;
            let size = pixel_type.size();

            let nodata_bytes = r.pixels(1, size, "no-data value")?;
            let no_data = flags
                .contains(BandFlags::HAS_NODATA)
                .then(|| pixel_type.value_from_ne_bytes(&nodata_bytes));

            let mut band = if flags.contains(BandFlags::OFFLINE) {
                let band_num = r.u8("offline band number")?;
                let rest = &r.bytes[r.pos..];
                let nul = rest.iter().position(|b| *b == 0).ok_or_else(|| {
                    TilerError::invalid_wkb(r.pos, "offline band path is not NUL-terminated")
                })?;
                let path = std::str::from_utf8(&rest[..nul]).map_err(|_| {
                    TilerError::invalid_wkb(r.pos, "offline band path is not valid UTF-8")
                })?;
                r.pos += nul + 1;
                Band::new_offline(
                    width,
                    height,
                    pixel_type,
                    no_data,
                    band_num,
                    PathBuf::from(path),
                    None,
                )?
            } else {
                let data = r.pixels(width * height, size, "band pixels")?;
                Band::new_inline(width, height, pixel_type, no_data, data)?
            };
            band.set_is_no_data(flags.contains(BandFlags::IS_NODATA) && no_data.is_some())?;
            raster.add_band(band)?;
        }

        if r.pos != bytes.len() {
            return Err(TilerError::invalid_wkb(
                r.pos,
                format!("{} trailing bytes", bytes.len() - r.pos),
            ));
        }
        Ok(raster)
    }

    /// Parses hex-encoded raster WKB (either case).
    pub fn from_hex_wkb(hex: &str) -> Result<Self> {
        Raster::from_wkb(&hex::decode(hex.trim())?)
    }
}
