use std::fmt::{Display, Formatter};

use crate::errors::{Result, TilerError};

/// Pixel encoding reported by a raster source.
///
/// This mirrors the data types a GDAL band can carry. Only a subset of them
/// can be stored in a raster tile, see [`PixelType::from_native`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NativeType {
    /// Unknown or unspecified type, including driver specific packed encodings.
    Unknown,
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
    CInt16,
    CInt32,
    CFloat32,
    CFloat64,
}

impl NativeType {
    /// Size of one pixel in **bytes**, `None` for [`NativeType::Unknown`].
    pub fn bytes(&self) -> Option<usize> {
        use NativeType::*;
        match self {
            Unknown => None,
            UInt8 | Int8 => Some(1),
            UInt16 | Int16 => Some(2),
            UInt32 | Int32 | Float32 | CInt16 => Some(4),
            UInt64 | Int64 | Float64 | CInt32 | CFloat32 => Some(8),
            CFloat64 => Some(16),
        }
    }
}

#[cfg(feature = "gdal")]
impl From<gdal_sys::GDALDataType::Type> for NativeType {
    fn from(value: gdal_sys::GDALDataType::Type) -> Self {
        use gdal_sys::GDALDataType::*;
        match value {
            GDT_Byte => NativeType::UInt8,
            GDT_UInt16 => NativeType::UInt16,
            GDT_Int16 => NativeType::Int16,
            GDT_UInt32 => NativeType::UInt32,
            GDT_Int32 => NativeType::Int32,
            GDT_Float32 => NativeType::Float32,
            GDT_Float64 => NativeType::Float64,
            GDT_CInt16 => NativeType::CInt16,
            GDT_CInt32 => NativeType::CInt32,
            GDT_CFloat32 => NativeType::CFloat32,
            GDT_CFloat64 => NativeType::CFloat64,
            _ => NativeType::Unknown,
        }
    }
}

#[cfg(feature = "gdal")]
impl From<NativeType> for gdal_sys::GDALDataType::Type {
    fn from(value: NativeType) -> Self {
        use gdal_sys::GDALDataType::*;
        match value {
            NativeType::UInt8 => GDT_Byte,
            NativeType::UInt16 => GDT_UInt16,
            NativeType::Int16 => GDT_Int16,
            NativeType::UInt32 => GDT_UInt32,
            NativeType::Int32 => GDT_Int32,
            NativeType::Float32 => GDT_Float32,
            NativeType::Float64 => GDT_Float64,
            NativeType::CInt16 => GDT_CInt16,
            NativeType::CInt32 => GDT_CInt32,
            NativeType::CFloat32 => GDT_CFloat32,
            NativeType::CFloat64 => GDT_CFloat64,
            _ => GDT_Unknown,
        }
    }
}

/// Pixel type tag of a tile band.
///
/// The discriminant is the value written in the low nibble of a band header
/// in raster WKB. Sub-byte types are stored one pixel per byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum PixelType {
    Bool1 = 0,
    UInt2 = 1,
    UInt4 = 2,
    Int8 = 3,
    UInt8 = 4,
    Int16 = 5,
    UInt16 = 6,
    Int32 = 7,
    UInt32 = 8,
    Float32 = 10,
    Float64 = 11,
}

impl PixelType {
    /// Maps the encoding of a source band to the tile pixel type.
    ///
    /// Anything outside the 8/16/32-bit integer and 32/64-bit float encodings
    /// is rejected with [`TilerError::UnsupportedPixelType`].
    pub fn from_native(native: NativeType) -> Result<PixelType> {
        match native {
            NativeType::UInt8 => Ok(PixelType::UInt8),
            NativeType::UInt16 => Ok(PixelType::UInt16),
            NativeType::Int16 => Ok(PixelType::Int16),
            NativeType::UInt32 => Ok(PixelType::UInt32),
            NativeType::Int32 => Ok(PixelType::Int32),
            NativeType::Float32 => Ok(PixelType::Float32),
            NativeType::Float64 => Ok(PixelType::Float64),
            other => Err(TilerError::UnsupportedPixelType(other)),
        }
    }

    /// Size of one stored pixel in **bytes**.
    pub fn size(&self) -> usize {
        use PixelType::*;
        match self {
            Bool1 | UInt2 | UInt4 | Int8 | UInt8 => 1,
            Int16 | UInt16 => 2,
            Int32 | UInt32 | Float32 => 4,
            Float64 => 8,
        }
    }

    /// Short name as used by PostGIS (`8BUI`, `32BF`, ...).
    pub fn name(&self) -> &'static str {
        use PixelType::*;
        match self {
            Bool1 => "1BB",
            UInt2 => "2BUI",
            UInt4 => "4BUI",
            Int8 => "8BSI",
            UInt8 => "8BUI",
            Int16 => "16BSI",
            UInt16 => "16BUI",
            Int32 => "32BSI",
            UInt32 => "32BUI",
            Float32 => "32BF",
            Float64 => "64BF",
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, PixelType::Float32 | PixelType::Float64)
    }

    /// Clamps `value` into the range representable by this pixel type.
    ///
    /// Integer types truncate toward zero, `NaN` becomes `0` for them.
    pub fn clamp(&self, value: f64) -> f64 {
        use PixelType::*;
        match self {
            Bool1 => (value.clamp(0.0, 1.0) as u8) as f64,
            UInt2 => (value.clamp(0.0, 3.0) as u8) as f64,
            UInt4 => (value.clamp(0.0, 15.0) as u8) as f64,
            Int8 => (value as i8) as f64,
            UInt8 => (value as u8) as f64,
            Int16 => (value as i16) as f64,
            UInt16 => (value as u16) as f64,
            Int32 => (value as i32) as f64,
            UInt32 => (value as u32) as f64,
            Float32 => (value.clamp(f32::MIN as f64, f32::MAX as f64) as f32) as f64,
            Float64 => value,
        }
    }

    /// Native-endian bytes of `value` after clamping to this type.
    pub fn value_to_ne_bytes(&self, value: f64) -> Vec<u8> {
        use PixelType::*;
        let value = self.clamp(value);
        match self {
            Bool1 | UInt2 | UInt4 | UInt8 => vec![value as u8],
            Int8 => (value as i8).to_ne_bytes().to_vec(),
            Int16 => (value as i16).to_ne_bytes().to_vec(),
            UInt16 => (value as u16).to_ne_bytes().to_vec(),
            Int32 => (value as i32).to_ne_bytes().to_vec(),
            UInt32 => (value as u32).to_ne_bytes().to_vec(),
            Float32 => (value as f32).to_ne_bytes().to_vec(),
            Float64 => value.to_ne_bytes().to_vec(),
        }
    }

    /// Reads one native-endian pixel from the start of `bytes`.
    ///
    /// # Panic
    /// Will panic if `bytes` is shorter than [`PixelType::size`].
    pub fn value_from_ne_bytes(&self, bytes: &[u8]) -> f64 {
        use PixelType::*;
        match self {
            Bool1 | UInt2 | UInt4 | UInt8 => bytes[0] as f64,
            Int8 => bytes[0] as i8 as f64,
            Int16 => i16::from_ne_bytes(head(bytes)) as f64,
            UInt16 => u16::from_ne_bytes(head(bytes)) as f64,
            Int32 => i32::from_ne_bytes(head(bytes)) as f64,
            UInt32 => u32::from_ne_bytes(head(bytes)) as f64,
            Float32 => f32::from_ne_bytes(head(bytes)) as f64,
            Float64 => f64::from_ne_bytes(head(bytes)),
        }
    }
}

fn head<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

impl Display for PixelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for PixelType {
    type Error = TilerError;

    fn try_from(value: u8) -> Result<Self> {
        use PixelType::*;
        Ok(match value {
            0 => Bool1,
            1 => UInt2,
            2 => UInt4,
            3 => Int8,
            4 => UInt8,
            5 => Int16,
            6 => UInt16,
            7 => Int32,
            8 => UInt32,
            10 => Float32,
            11 => Float64,
            other => {
                return Err(TilerError::BadArgument(format!(
                    "unknown pixel type tag {other}"
                )))
            }
        })
    }
}

/// Type-level constraint for the primitive numeric values a band buffer can hold.
pub trait PixelValue: Copy + 'static {
    fn pixel_type() -> PixelType;
    fn native_type() -> NativeType;
    fn extend_ne_bytes(self, out: &mut Vec<u8>);
    /// # Panic
    /// Will panic if `bytes` is shorter than the type.
    fn from_ne_slice(bytes: &[u8]) -> Self;
}

macro_rules! pixel_value {
    ($t:ty, $pixel:ident, $native:ident) => {
        impl PixelValue for $t {
            fn pixel_type() -> PixelType {
                PixelType::$pixel
            }

            fn native_type() -> NativeType {
                NativeType::$native
            }

            fn extend_ne_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }

            fn from_ne_slice(bytes: &[u8]) -> Self {
                <$t>::from_ne_bytes(head(bytes))
            }
        }
    };
}

pixel_value!(u8, UInt8, UInt8);
pixel_value!(i8, Int8, Int8);
pixel_value!(u16, UInt16, UInt16);
pixel_value!(i16, Int16, Int16);
pixel_value!(u32, UInt32, UInt32);
pixel_value!(i32, Int32, Int32);
pixel_value!(f32, Float32, Float32);
pixel_value!(f64, Float64, Float64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_mapping() {
        assert_eq!(
            PixelType::from_native(NativeType::UInt8).unwrap(),
            PixelType::UInt8
        );
        assert_eq!(
            PixelType::from_native(NativeType::UInt16).unwrap(),
            PixelType::UInt16
        );
        assert_eq!(
            PixelType::from_native(NativeType::Int16).unwrap(),
            PixelType::Int16
        );
        assert_eq!(
            PixelType::from_native(NativeType::UInt32).unwrap(),
            PixelType::UInt32
        );
        assert_eq!(
            PixelType::from_native(NativeType::Int32).unwrap(),
            PixelType::Int32
        );
        assert_eq!(
            PixelType::from_native(NativeType::Float32).unwrap(),
            PixelType::Float32
        );
        assert_eq!(
            PixelType::from_native(NativeType::Float64).unwrap(),
            PixelType::Float64
        );
    }

    #[test]
    fn test_unsupported_native_types() {
        for native in [
            NativeType::Unknown,
            NativeType::Int8,
            NativeType::UInt64,
            NativeType::Int64,
            NativeType::CInt16,
            NativeType::CFloat64,
        ] {
            match PixelType::from_native(native) {
                Err(TilerError::UnsupportedPixelType(t)) => assert_eq!(t, native),
                other => panic!("expected unsupported pixel type, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_clamp() {
        assert_eq!(PixelType::Bool1.clamp(7.0), 1.0);
        assert_eq!(PixelType::UInt2.clamp(-2.0), 0.0);
        assert_eq!(PixelType::UInt4.clamp(99.0), 15.0);
        assert_eq!(PixelType::Int8.clamp(-300.0), -128.0);
        assert_eq!(PixelType::UInt8.clamp(255.9), 255.0);
        assert_eq!(PixelType::UInt16.clamp(-1.0), 0.0);
        assert_eq!(PixelType::Int32.clamp(1e12), i32::MAX as f64);
        assert_eq!(PixelType::Float32.clamp(1e300), f32::MAX as f64);
        assert_eq!(PixelType::Float64.clamp(-9999.5), -9999.5);
    }

    #[test]
    fn test_value_bytes() {
        let bytes = PixelType::Int16.value_to_ne_bytes(-9999.0);
        assert_eq!(bytes.len(), 2);
        assert_eq!(PixelType::Int16.value_from_ne_bytes(&bytes), -9999.0);

        let bytes = PixelType::Float32.value_to_ne_bytes(0.5);
        assert_eq!(bytes, 0.5f32.to_ne_bytes().to_vec());
    }

    #[test]
    fn test_tag_roundtrip() {
        for tag in [0u8, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11] {
            assert_eq!(PixelType::try_from(tag).unwrap() as u8, tag);
        }
        assert!(PixelType::try_from(9).is_err());
        assert!(PixelType::try_from(13).is_err());
    }
}
