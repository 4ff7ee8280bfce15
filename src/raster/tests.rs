use crate::assert_near;
use crate::config::RasterConfig;
use crate::errors::TilerError;
use crate::raster::{
    assemble_full_extent, assemble_raster, Band, Buffer, MemSource, NativeType, PixelType, Raster,
    RasterSource, Scratch, SourceRasterInfo, TileView,
};
use crate::test_utils::{gradient_source, gradient_value};
use crate::tiling::{TileGrid, TileRect};

fn assert_gradient(raster: &Raster, x_offset: usize, y_offset: usize) {
    let band = raster.band(0).unwrap();
    for y in 0..raster.height() {
        for x in 0..raster.width() {
            assert_eq!(
                band.pixel(x, y).unwrap(),
                gradient_value(x + x_offset, y + y_offset) as f64,
                "pixel ({x}, {y})"
            );
        }
    }
}

#[test]
fn test_assemble_scanline_blocks() {
    let source = gradient_source(37, 11);
    let raster = assemble_raster(&source, &mut Scratch::new()).unwrap();
    assert_eq!(raster.size(), (37, 11));
    assert_eq!(raster.band_count(), 1);
    assert_eq!(raster.band(0).unwrap().pixel_type(), PixelType::UInt8);
    assert_gradient(&raster, 0, 0);
}

#[test]
fn test_assemble_any_block_shape() {
    // square, uneven edges, full-width multi-row and single column
    for (bx, by) in [(8, 8), (5, 3), (37, 4), (1, 11), (64, 64)] {
        let source = gradient_source(37, 11).with_block_size(bx, by);
        let raster = assemble_raster(&source, &mut Scratch::new()).unwrap();
        assert_gradient(&raster, 0, 0);
    }
}

#[test]
fn test_assemble_defaults() {
    let raster = assemble_raster(&gradient_source(3, 3), &mut Scratch::new()).unwrap();
    assert_eq!(raster.geo_transform(), [0.0, 1.0, 0.0, 0.0, 0.0, -1.0]);
    assert_eq!(raster.srid(), 0);
    assert_eq!(raster.band(0).unwrap().no_data(), None);
    assert!(!raster.band(0).unwrap().is_no_data());
}

#[test]
fn test_assemble_wide_types() {
    let values: Vec<f32> = (0..12).map(|v| v as f32 * 0.25 - 1.0).collect();
    let mut source = MemSource::new(4, 3).with_block_size(3, 2);
    source
        .add_band(Buffer::new((4, 3), values.clone()), Some(-9999.0))
        .unwrap();
    let raster = assemble_raster(&source, &mut Scratch::new()).unwrap();
    let band = raster.band(0).unwrap();
    assert_eq!(band.pixel_type(), PixelType::Float32);
    assert_eq!(band.no_data(), Some(-9999.0));
    assert_eq!(band.read_as::<f32>().unwrap().data, values);
}

#[test]
fn test_assemble_all_nodata_band() {
    let mut source = MemSource::new(2, 2);
    source
        .add_band(Buffer::new((2, 2), vec![255u8; 4]), Some(255.0))
        .unwrap();
    let raster = assemble_raster(&source, &mut Scratch::new()).unwrap();
    assert!(raster.band(0).unwrap().is_no_data());
}

#[test]
fn test_scratch_is_reset_by_guard() {
    let mut scratch = Scratch::new();
    {
        let mut guard = scratch.guard();
        assemble_raster(&gradient_source(16, 16).with_block_size(8, 8), &mut guard).unwrap();
        assert_eq!(guard.len(), 64);
    }
    assert!(scratch.is_empty());
    assert!(scratch.capacity() >= 64);
}

#[test]
fn test_scratch_is_reset_on_failure() {
    // info of a larger raster makes the view read past the real source
    let info = SourceRasterInfo::from_source(&gradient_source(8, 8), &RasterConfig::default())
        .unwrap();
    let source = gradient_source(4, 4);
    let view = TileView::new(
        &source,
        &info,
        TileRect {
            x_offset: 0,
            y_offset: 0,
            width: 4,
            height: 8,
        },
    );
    let mut scratch = Scratch::new();
    {
        let mut guard = scratch.guard();
        assert!(matches!(
            assemble_raster(&view, &mut guard),
            Err(TilerError::ReadFailed { y: 4, .. })
        ));
    }
    assert!(scratch.is_empty());
}

#[test]
fn test_unsupported_pixel_types() {
    for native in [
        NativeType::Unknown,
        NativeType::Int8,
        NativeType::UInt64,
        NativeType::CInt16,
        NativeType::CFloat64,
    ] {
        let mut source = MemSource::new(2, 2);
        source.add_raw_band(native, Vec::new(), None).ok();
        if source.raster_count() == 0 {
            // sized types need a full buffer
            let size = native.bytes().unwrap();
            source.add_raw_band(native, vec![0; 4 * size], None).unwrap();
        }
        assert!(matches!(
            assemble_raster(&source, &mut Scratch::new()),
            Err(TilerError::UnsupportedPixelType(t)) if t == native
        ));
        assert!(matches!(
            SourceRasterInfo::from_source(&source, &RasterConfig::default()),
            Err(TilerError::UnsupportedPixelType(_))
        ));
    }
}

#[test]
fn test_band_count() {
    let empty = MemSource::new(2, 2);
    assert!(matches!(
        SourceRasterInfo::from_source(&empty, &RasterConfig::default()),
        Err(TilerError::BandCount(0))
    ));

    let mut two = gradient_source(2, 2);
    two.add_band(Buffer::new((2, 2), vec![0u8; 4]), None).unwrap();
    assert!(matches!(
        SourceRasterInfo::from_source(&two, &RasterConfig::default()),
        Err(TilerError::BandCount(2))
    ));
}

#[test]
fn test_source_info() {
    let source = gradient_source(10, 5)
        .with_geo_transform([100.0, 2.0, 0.0, 50.0, 0.0, -2.0])
        .with_projection("EPSG:32633", Some(32633));
    let config = RasterConfig::builder()
        .no_data(0.0)
        .srid(4326)
        .build()
        .unwrap();
    let info = SourceRasterInfo::from_source(&source, &config).unwrap();
    assert_eq!(info.raster_size, (10, 5));
    assert_eq!(info.srid, 32633);
    assert_eq!(info.srs.as_deref(), Some("EPSG:32633"));
    assert_eq!(info.bands.len(), 1);
    assert_eq!(info.bands[0].pixel_type, PixelType::UInt8);
    // configured override applies when the band has none
    assert_eq!(info.bands[0].no_data, Some(0.0));

    let info = SourceRasterInfo::from_source(&gradient_source(2, 2), &config).unwrap();
    assert_eq!(info.srid, 4326);
    assert_eq!(info.geo_transform, [0.0, 1.0, 0.0, 0.0, 0.0, -1.0]);
}

#[test]
fn test_source_nodata_wins_over_override() {
    let mut source = MemSource::new(2, 2);
    source
        .add_band(Buffer::new((2, 2), vec![1i16, 2, 3, 4]), Some(-1.0))
        .unwrap();
    let config = RasterConfig::builder().no_data(7.0).build().unwrap();
    let info = SourceRasterInfo::from_source(&source, &config).unwrap();
    assert_eq!(info.bands[0].no_data, Some(-1.0));
}

#[test]
fn test_tile_view_georeference() {
    let source = gradient_source(250, 100)
        .with_geo_transform([1000.0, 10.0, 0.0, 5000.0, 0.0, -10.0])
        .with_projection("EPSG:3857", Some(3857));
    let info = SourceRasterInfo::from_source(&source, &RasterConfig::default()).unwrap();
    let grid = TileGrid::new(info.raster_size, (100, 100), false).unwrap();

    let rect = grid.rect(2).unwrap();
    let view = TileView::new(&source, &info, rect);
    let raster = assemble_raster(&view, &mut Scratch::new()).unwrap();
    assert_eq!(raster.size(), (50, 100));
    assert_eq!(raster.srid(), 3857);
    let gt = raster.geo_transform();
    assert_near!(gt[0], 3000.0);
    assert_near!(gt[3], 5000.0);
    assert_eq!(gt[1], 10.0);
    assert_eq!(gt[5], -10.0);
    assert_gradient(&raster, 200, 0);
}

#[test]
fn test_padded_edge_tile_uses_nodata() {
    let mut source = MemSource::new(5, 3).with_block_size(2, 2);
    source
        .add_band(Buffer::from_fn((5, 3), |x, y| (x + 10 * y) as u16), Some(999.0))
        .unwrap();
    let info = SourceRasterInfo::from_source(&source, &RasterConfig::default()).unwrap();
    let grid = TileGrid::new((5, 3), (4, 4), true).unwrap();
    assert_eq!(grid.total(), 2);

    let view = TileView::new(&source, &info, grid.rect(1).unwrap());
    let raster = assemble_raster(&view, &mut Scratch::new()).unwrap();
    assert_eq!(raster.size(), (4, 4));
    let band = raster.band(0).unwrap();
    assert_eq!(band.pixel(0, 0).unwrap(), 4.0);
    assert_eq!(band.pixel(0, 2).unwrap(), 24.0);
    assert_eq!(band.pixel(1, 0).unwrap(), 999.0);
    assert_eq!(band.pixel(0, 3).unwrap(), 999.0);
    assert_eq!(band.pixel(3, 3).unwrap(), 999.0);
    assert!(!band.is_no_data());
}

#[test]
fn test_padded_edge_tile_without_nodata_uses_zero() {
    let source = gradient_source(5, 5);
    let info = SourceRasterInfo::from_source(&source, &RasterConfig::default()).unwrap();
    let grid = TileGrid::new((5, 5), (3, 3), true).unwrap();
    let view = TileView::new(&source, &info, grid.rect(3).unwrap());
    let raster = assemble_raster(&view, &mut Scratch::new()).unwrap();
    let band = raster.band(0).unwrap();
    assert_eq!(band.pixel(0, 0).unwrap(), gradient_value(3, 3) as f64);
    assert_eq!(band.pixel(1, 1).unwrap(), gradient_value(4, 4) as f64);
    assert_eq!(band.pixel(2, 0).unwrap(), 0.0);
    assert_eq!(band.pixel(0, 2).unwrap(), 0.0);
}

#[test]
fn test_read_outside_source_fails() {
    let source = gradient_source(4, 4);
    let mut buffer = vec![0u8; 4];
    assert!(matches!(
        source.read_into(1, (3, 3), (2, 2), &mut buffer),
        Err(TilerError::ReadFailed { band: 1, x: 3, y: 3, .. })
    ));
}

#[test]
fn test_raster_rejects_mismatched_band() {
    let mut raster = Raster::new(4, 4).unwrap();
    let band = Band::generate(3, 4, PixelType::UInt8, 0.0, None).unwrap();
    assert!(raster.add_band(band).is_err());
    assert!(Raster::new(70_000, 1).is_err());
}

#[test]
fn test_raster_extent() {
    let mut raster = Raster::new(100, 50).unwrap();
    raster.set_geo_transform([10.0, 0.5, 0.0, 20.0, 0.0, -0.5]);
    let extent = raster.extent();
    assert_near!(extent.min().x, 10.0);
    assert_near!(extent.max().x, 60.0);
    assert_near!(extent.min().y, -5.0);
    assert_near!(extent.max().y, 20.0);
}

#[test]
fn test_band_pixel_line_and_flags() {
    let mut band = Band::generate(3, 2, PixelType::Int16, -5.0, Some(-5.0)).unwrap();
    assert!(band.is_no_data());
    band.set_pixel_line(2, 0, &[&7i16.to_ne_bytes()[..], &8i16.to_ne_bytes()[..]].concat())
        .unwrap();
    assert_eq!(band.pixel(2, 0).unwrap(), 7.0);
    assert_eq!(band.pixel(0, 1).unwrap(), 8.0);
    assert!(!band.check_is_no_data());
    assert!(band.set_pixel_line(0, 1, &[0u8; 8]).is_err());
    assert!(band.set_pixel_line(0, 0, &[0u8; 3]).is_err());

    let mut plain = Band::generate(1, 1, PixelType::UInt8, 0.0, None).unwrap();
    assert!(plain.set_is_no_data(true).is_err());
}

#[test]
fn test_block_larger_than_raster() {
    let source = gradient_source(10, 10).with_block_size(1 << 20, 1 << 20);
    let mut scratch = Scratch::new();
    let raster = assemble_raster(&source, &mut scratch).unwrap();
    assert_gradient(&raster, 0, 0);
    assert_eq!(scratch.len(), 100);
}

#[test]
fn test_full_extent_applies_config_fallbacks() {
    let source = gradient_source(6, 4).with_block_size(4, 4);
    let config = RasterConfig::builder()
        .no_data(250.0)
        .srid(3035)
        .build()
        .unwrap();
    let mut scratch = Scratch::new();
    let raster = assemble_full_extent(&source, &config, &mut scratch).unwrap();
    assert!(scratch.is_empty());
    assert_eq!(raster.size(), (6, 4));
    assert_eq!(raster.srid(), 3035);
    assert_eq!(raster.geo_transform(), [0.0, 1.0, 0.0, 0.0, 0.0, -1.0]);
    assert_eq!(raster.band(0).unwrap().no_data(), Some(250.0));
    assert_gradient(&raster, 0, 0);

    // the source's own marker and EPSG code win
    let mut source = MemSource::new(2, 2).with_projection("EPSG:4326", Some(4326));
    source
        .add_band(Buffer::new((2, 2), vec![1u8, 2, 3, 4]), Some(0.0))
        .unwrap();
    let raster = assemble_full_extent(&source, &config, &mut scratch).unwrap();
    assert_eq!(raster.srid(), 4326);
    assert_eq!(raster.band(0).unwrap().no_data(), Some(0.0));
}

#[test]
fn test_full_extent_checks_band_count() {
    let mut source = gradient_source(2, 2);
    source.add_band(Buffer::new((2, 2), vec![0u8; 4]), None).unwrap();
    assert!(matches!(
        assemble_full_extent(&source, &RasterConfig::default(), &mut Scratch::new()),
        Err(TilerError::BandCount(2))
    ));
}
