//! Raw microscopy images and the loader collaborator.

mod tiff;


use std::path::{Path, PathBuf};

use common::Buffer2;

use crate::error::InputError;

pub use self::tiff::{read_label_tiff, write_float_tiff, write_label_tiff, TiffLoader};

/// Single-channel intensities in row-major order.
pub type RawImage = Buffer2<f32>;

/// Physical pixel size in the file's length unit. `None` when the file
/// does not carry the metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelSize {
    pub xy: Option<f64>,
    pub z: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub pixels: RawImage,
    pub pixel_size: PixelSize,
}

impl LoadedImage {
    pub fn dimensions(&self) -> (usize, usize) {
        self.pixels.dimensions()
    }
}

/// The two channels of one field of view.
#[derive(Debug, Clone)]
pub struct RawPair {
    pub vsv: LoadedImage,
    pub delta: LoadedImage,
}

impl RawPair {
    /// Pixel size of the pair, taken from the VSV channel.
    pub fn pixel_size(&self) -> &PixelSize {
        &self.vsv.pixel_size
    }
}

/// Reads one raw image from storage.
pub trait ImageLoader {
    fn load(&self, path: &Path) -> Result<LoadedImage, InputError>;
}

/// Load both channels and check they cover the same field of view.
pub fn load_pair(
    loader: &dyn ImageLoader,
    vsv_path: &Path,
    delta_path: &Path,
) -> Result<RawPair, InputError> {
    let vsv = loader.load(vsv_path)?;
    let delta = loader.load(delta_path)?;

    if vsv.dimensions() != delta.dimensions() {
        return Err(InputError::ShapeMismatch {
            what: "Delta image",
            expected: vsv.dimensions(),
            actual: delta.dimensions(),
        });
    }

    tracing::info!(
        vsv = %vsv_path.display(),
        delta = %delta_path.display(),
        width = vsv.pixels.width(),
        height = vsv.pixels.height(),
        pixel_size = ?vsv.pixel_size.xy,
        "Loaded image pair"
    );

    Ok(RawPair { vsv, delta })
}

/// Maximum intensity projection of same-sized planes.
pub fn max_projection(planes: &[RawImage]) -> Option<RawImage> {
    let (first, rest) = planes.split_first()?;
    let mut projected = first.clone();
    for plane in rest {
        debug_assert!(plane.same_dimensions(&projected));
        for (dst, &src) in projected.iter_mut().zip(plane.iter()) {
            *dst = dst.max(src);
        }
    }
    Some(projected)
}
