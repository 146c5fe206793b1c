//! PI channel ranges and energy-band conversion.

use crate::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// XRT PI channels per keV.
pub const CHANNELS_PER_KEV: f64 = 100.0;

/// Lowest PI channel.
pub const MIN_CHANNEL: u32 = 0;

/// Highest PI channel.
pub const MAX_CHANNEL: u32 = 1023;

const CHANNEL_TOLERANCE: f64 = 1e-6;

/// Inclusive PI channel range used to filter events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelRange {
    low: u32,
    high: u32,
}

impl Default for ChannelRange {
    fn default() -> Self {
        Self::full()
    }
}

impl ChannelRange {
    /// Creates a channel range.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannelRange`] if `low > high` or `high`
    /// exceeds the last PI channel.
    pub fn new(low: u32, high: u32) -> Result<Self> {
        if low > high || high > MAX_CHANNEL {
            return Err(Error::InvalidChannelRange {
                low: i64::from(low),
                high: i64::from(high),
            });
        }
        Ok(Self { low, high })
    }

    /// The full 0..=1023 band.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            low: MIN_CHANNEL,
            high: MAX_CHANNEL,
        }
    }

    /// Converts an energy band in keV to channels at 100 channels/keV.
    ///
    /// Products are truncated to the channel containing them. A small
    /// tolerance keeps e.g. 0.3 keV on channel 30 despite float error.
    /// Upper bounds past the last channel are clamped to it, which selects
    /// the same events.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannelRange`] for negative, non-finite or
    /// inverted bounds.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_energy(low_kev: f64, high_kev: f64) -> Result<Self> {
        let to_channel = |kev: f64| (kev * CHANNELS_PER_KEV + CHANNEL_TOLERANCE).floor();
        let (low, high) = (to_channel(low_kev), to_channel(high_kev));

        if !low.is_finite() || !high.is_finite() || low < 0.0 || high < 0.0 {
            return Err(Error::InvalidChannelRange {
                low: low as i64,
                high: high as i64,
            });
        }

        let high = high.min(f64::from(MAX_CHANNEL));
        if low > high {
            return Err(Error::InvalidChannelRange {
                low: low as i64,
                high: high as i64,
            });
        }
        Self::new(low as u32, high as u32)
    }

    #[must_use]
    pub fn low(&self) -> u32 {
        self.low
    }

    #[must_use]
    pub fn high(&self) -> u32 {
        self.high
    }

    /// Extractor row filter, e.g. `[PI = 30 : 1000]`.
    #[must_use]
    pub fn pi_filter(&self) -> String {
        format!("[PI = {} : {}]", self.low, self.high)
    }
}

impl fmt::Display for ChannelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// Band selection for spectral extraction.
///
/// Channel and energy bounds are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpectralBand {
    /// Every PI channel.
    #[default]
    Full,
    /// Explicit PI channel bounds.
    Channels(ChannelRange),
    /// Energy bounds in keV.
    Energy { low_kev: f64, high_kev: f64 },
}

impl SpectralBand {
    /// Resolves the band to PI channels.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannelRange`] if energy bounds do not convert
    /// to a valid range.
    pub fn resolve(&self) -> Result<ChannelRange> {
        match *self {
            SpectralBand::Full => Ok(ChannelRange::full()),
            SpectralBand::Channels(range) => Ok(range),
            SpectralBand::Energy { low_kev, high_kev } => {
                ChannelRange::from_energy(low_kev, high_kev)
            }
        }
    }
}
