//! swiftmon-core: Core types for Swift XRT spectral and timing reduction.
//!
//! This crate provides the pure building blocks of the pipeline: DS9
//! regions and WT-mode background scaling, PI channel bands, exposure
//! weights for stacking, stage manifests, and pulsed-flux measurement.
//!

pub mod band;
pub mod error;
pub mod manifest;
pub mod pulsed;
pub mod region;
pub mod weights;

pub use band::{ChannelRange, SpectralBand, CHANNELS_PER_KEV};
pub use error::{Error, Result};
pub use manifest::{
    ExposureMap, ExtractedProducts, GtiPartition, SpectrumProducts, StackedSpectrum, WtRegions,
};
pub use pulsed::{pulsed_flux, ProfileWarning, PulseProfile, PulsedFlux, PulsedFluxOptions, RmsEstimator};
pub use region::{BackgroundScale, PixelPosition, Region, Shape};
pub use weights::StackWeights;
