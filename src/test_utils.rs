use std::path::{Path, PathBuf};

use crate::raster::{Buffer, MemSource};

/// A struct that contains a temporary directory and a path to a file in that directory.
pub struct TempFixture {
    _temp_dir: tempfile::TempDir,
    temp_path: PathBuf,
}

impl TempFixture {
    /// Creates a copy of the test file in a temporary directory.
    pub fn fixture(name: &str) -> Self {
        let staging = Self::empty(name);
        std::fs::copy(fixture(name), &staging.temp_path).unwrap();
        staging
    }

    /// Creates a temporary directory and path to a non-existent file with given `name`.
    /// Useful for writing configuration files during testing.
    pub fn empty(name: &str) -> Self {
        let _temp_dir = tempfile::tempdir().unwrap();
        let temp_path = _temp_dir.path().join(name);
        Self {
            _temp_dir,
            temp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.temp_path
    }
}

impl AsRef<Path> for TempFixture {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Returns the fully qualified path to `filename` in `${CARGO_MANIFEST_DIR}/fixtures`.
pub fn fixture(filename: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(filename)
}

/// Value of pixel `(x, y)` in [`gradient_source`].
pub fn gradient_value(x: usize, y: usize) -> u8 {
    ((x + 3 * y) % 251) as u8
}

/// Single-band `u8` source whose pixels follow [`gradient_value`], read in
/// scanlines.
pub fn gradient_source(width: usize, height: usize) -> MemSource {
    let mut source = MemSource::new(width, height);
    let buffer = Buffer::from_fn((width, height), |x, y| gradient_value(x, y));
    source.add_band(buffer, None).unwrap();
    source
}

/// Assert numerical difference between two expressions is less than
/// 64-bit machine epsilon or a specified epsilon.
///
/// ```rust, ignore
/// assert_near!(PI / E, 1.1557273497909217);
/// assert_near!(PI / E, 1.15572734, epsilon = 1e-8);
/// ```
#[macro_export]
macro_rules! assert_near {
    ($left:expr, $right:expr) => {
        assert_near!($left, $right, epsilon = f64::EPSILON)
    };
    ($left:expr, $right:expr, epsilon = $ep:expr) => {
        assert!(
            ($left - $right).abs() < $ep,
            "|{} - {}| = {} is greater than epsilon {:.4e}",
            $left,
            $right,
            ($left - $right).abs(),
            $ep
        )
    };
}
