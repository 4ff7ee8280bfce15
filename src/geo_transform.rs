use geo_types::{coord, Rect};

/// An affine transform.
///
/// A six-element array storing the coefficients of an [affine transform]
/// used in mapping coordinates between pixel/line `(P, L)` (raster) space,
/// and `(Xp,Yp)` (projection) space.
///
/// # Interpretation
///
/// A `GeoTransform`'s components have the following meanings:
///
///   * `GeoTransform[0]`: x-coordinate of the upper-left corner of the upper-left pixel.
///   * `GeoTransform[1]`: W-E pixel resolution (pixel width).
///   * `GeoTransform[2]`: row rotation (typically zero).
///   * `GeoTransform[3]`: y-coordinate of the upper-left corner of the upper-left pixel.
///   * `GeoTransform[4]`: column rotation (typically zero).
///   * `GeoTransform[5]`: N-S pixel resolution (pixel height), negative value for a North-up image.
///
/// Raster WKB stores the same coefficients in a different order
/// (`scale_x, scale_y, ip_x, ip_y, skew_x, skew_y`), see [`crate::wkb`].
///
/// [affine transform]: https://en.wikipedia.org/wiki/Affine_transformation
pub type GeoTransform = [f64; 6];

/// Geotransform used when a source does not carry one: origin at `(0, 0)`,
/// unit pixels, north-up.
pub const DEFAULT_GEO_TRANSFORM: GeoTransform = [0.0, 1.0, 0.0, 0.0, 0.0, -1.0];

/// Extension methods on [`GeoTransform`]
pub trait GeoTransformEx {
    /// Apply GeoTransform to x/y coordinate.
    ///
    /// Same arithmetic as [GDALApplyGeoTransform].
    ///
    /// [GDALApplyGeoTransform]: https://gdal.org/api/raster_c_api.html#_CPPv421GDALApplyGeoTransformPdddPdPd
    fn apply(&self, pixel: f64, line: f64) -> (f64, f64);

    /// Transform of the sub-raster whose upper-left pixel is `(x_offset, y_offset)`
    /// in this raster: the origin moves, scale and skew are kept.
    fn translated(&self, x_offset: usize, y_offset: usize) -> GeoTransform;

    /// Georeferenced envelope of a `width` x `height` raster.
    fn extent(&self, width: usize, height: usize) -> Rect<f64>;
}

impl GeoTransformEx for GeoTransform {
    fn apply(&self, pixel: f64, line: f64) -> (f64, f64) {
        let geo_x = self[0] + pixel * self[1] + line * self[2];
        let geo_y = self[3] + pixel * self[4] + line * self[5];
        (geo_x, geo_y)
    }

    fn translated(&self, x_offset: usize, y_offset: usize) -> GeoTransform {
        let (x, y) = self.apply(x_offset as f64, y_offset as f64);
        [x, self[1], self[2], y, self[4], self[5]]
    }

    fn extent(&self, width: usize, height: usize) -> Rect<f64> {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(0.0, h),
            self.apply(w, h),
        ];
        let (mut min_x, mut min_y) = corners[0];
        let (mut max_x, mut max_y) = corners[0];
        for (x, y) in &corners[1..] {
            min_x = min_x.min(*x);
            min_y = min_y.min(*y);
            max_x = max_x.max(*x);
            max_y = max_y.max(*y);
        }
        Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y })
    }
}
