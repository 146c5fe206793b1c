//! Source location from the brightest image pixel.

use crate::extractor::{extract, ExtractOptions};
use crate::runner::ToolRunner;
use crate::{Error, Result};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use swiftmon_core::PixelPosition;
use swiftmon_io::{FitsFile, Workspace};
use tracing::debug;

/// Input to centroid on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentroidSource {
    /// Event file; a scratch image is extracted from it first.
    Events(PathBuf),
    /// Existing image whose primary HDU is used directly.
    Image(PathBuf),
}

/// Locates the source as the maximum pixel of an image.
///
/// Suited to bright point sources in WT mode, where the peak pixel is a
/// good enough centroid for ARF generation.
///
/// # Errors
/// Returns an error if the scratch extraction fails, the image cannot be
/// read, or it has no finite pixel.
pub fn find_centroid<R: ToolRunner + ?Sized>(
    workspace: &Workspace,
    runner: &R,
    source: &CentroidSource,
) -> Result<PixelPosition> {
    match source {
        CentroidSource::Image(path) => image_centroid(&workspace.resolve(path)),
        CentroidSource::Events(events) => {
            let image = workspace.scratch_product("temp", ".img");
            extract(workspace, runner, image.root(), events, &ExtractOptions::image_only())?;
            image_centroid(image.path())
        }
    }
}

fn image_centroid(path: &Path) -> Result<PixelPosition> {
    let image = FitsFile::open(path)?.read_image(0)?;
    let centroid = max_pixel(&image).ok_or_else(|| Error::EmptyImage {
        path: path.to_path_buf(),
    })?;
    debug!(image = %path.display(), %centroid, "max-pixel centroid");
    Ok(centroid)
}

/// 1-based (column, row) of the first maximum in row-major order.
///
/// Non-finite pixels are ignored; `None` if none are left.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn max_pixel(image: &Array2<f64>) -> Option<PixelPosition> {
    let mut best: Option<((usize, usize), f64)> = None;
    for (index, &value) in image.indexed_iter() {
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, max)) if value <= max => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|((row, col), _)| PixelPosition::new((col + 1) as f64, (row + 1) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_max_pixel_is_one_based() {
        let image = array![[0.0, 1.0, 0.0], [0.0, 0.0, 9.0]];
        assert_eq!(max_pixel(&image), Some(PixelPosition::new(3.0, 2.0)));
    }

    #[test]
    fn test_first_maximum_wins() {
        let image = array![[0.0, 5.0], [5.0, 0.0]];
        assert_eq!(max_pixel(&image), Some(PixelPosition::new(2.0, 1.0)));
    }

    #[test]
    fn test_non_finite_pixels_ignored() {
        let image = array![[f64::NAN, 2.0], [f64::INFINITY, 1.0]];
        assert_eq!(max_pixel(&image), Some(PixelPosition::new(2.0, 1.0)));

        let blank = array![[f64::NAN, f64::NAN]];
        assert_eq!(max_pixel(&blank), None);
        assert_eq!(max_pixel(&Array2::zeros((0, 0))), None);
    }
}
