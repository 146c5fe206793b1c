//! Manifests of the files produced by each reduction stage.

use crate::region::{PixelPosition, Region};
use crate::weights::StackWeights;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Products written by one extractor run. Disabled products are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractedProducts {
    pub events: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub spectrum: Option<PathBuf>,
    pub lightcurve: Option<PathBuf>,
}

impl ExtractedProducts {
    /// Iterates over the products that were requested.
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.events, &self.image, &self.spectrum, &self.lightcurve]
            .into_iter()
            .flatten()
    }

    /// True if no product was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Grouped source spectrum and its matched calibration files.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpectrumProducts {
    /// Grouped source spectrum (`<root>_source.pha`).
    pub source: PathBuf,
    /// Background spectrum (`<root>_back.pha`).
    pub background: PathBuf,
    /// Ancillary response (`<root>_source.arf`).
    pub arf: PathBuf,
    /// CALDB response matrix selected by the ARF generator.
    pub rmf: String,
    /// Source centroid used for the ARF.
    pub centroid: PixelPosition,
}

/// Per-interval event files split from one event file, in GTI row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GtiPartition {
    pub intervals: Vec<PathBuf>,
}

impl GtiPartition {
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// Exposure-weighted stack of several spectra.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StackedSpectrum {
    /// Summed, optionally grouped source spectrum (`<root>.pha`).
    pub spectrum: PathBuf,
    /// Summed background (`<root>.bak`).
    pub background: PathBuf,
    /// Weighted response (`<root>.rsp`).
    pub response: PathBuf,
    /// Weights applied to each contributing response.
    pub weights: StackWeights,
}

impl StackedSpectrum {
    /// Exposure of the stacked spectrum (sum of contributions).
    #[must_use]
    pub fn exposure(&self) -> f64 {
        self.weights.total_exposure()
    }
}

/// Default WT-mode source and background region files.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WtRegions {
    pub source_file: PathBuf,
    pub source: Region,
    pub background_file: PathBuf,
    pub background: Region,
}

/// Exposure map produced by `xrtexpomap`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExposureMap {
    /// Output stem passed to the generator.
    pub stem: String,
    /// Output directory passed to the generator.
    pub outdir: PathBuf,
    /// Expected exposure map image (`<outdir>/<stem>_ex.img`).
    pub image: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracted_products_iteration() {
        let mut products = ExtractedProducts::default();
        assert!(products.is_empty());

        products.image = Some(PathBuf::from("temp.img"));
        products.events = Some(PathBuf::from("obs.evt"));
        let paths: Vec<_> = products.iter().collect();
        assert_eq!(paths, [&PathBuf::from("obs.evt"), &PathBuf::from("temp.img")]);
    }
}
