//! RMS pulsed flux and pulsed fraction from folded profiles.
//!
//! The harmonic RMS estimate itself comes from an external estimator behind
//! [`RmsEstimator`]; this module prepares the profile (cycle handling and
//! background subtraction) and normalizes the result.

use crate::{Error, Result};
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Harmonic RMS estimator for a binned pulse profile.
pub trait RmsEstimator {
    /// Returns the RMS pulsed amplitude and its uncertainty using the first
    /// `harmonics` Fourier harmonics.
    fn estimate(&self, histogram: &[f64], uncertainties: &[f64], harmonics: usize) -> (f64, f64);
}

/// Folded pulse profile: counts and uncertainties per phase bin.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PulseProfile {
    counts: Vec<f64>,
    errors: Vec<f64>,
}

impl PulseProfile {
    /// Creates a profile from matching count and error columns.
    ///
    /// # Errors
    /// Returns [`Error::InvalidProfile`] if the columns are empty or differ
    /// in length.
    pub fn new(counts: Vec<f64>, errors: Vec<f64>) -> Result<Self> {
        if counts.is_empty() {
            return Err(Error::InvalidProfile("profile has no bins".into()));
        }
        if counts.len() != errors.len() {
            return Err(Error::InvalidProfile(format!(
                "{} count bins but {} error bins",
                counts.len(),
                errors.len()
            )));
        }
        Ok(Self { counts, errors })
    }

    /// Reads a whitespace-separated `bin counts error` profile file.
    ///
    /// # Errors
    /// Returns an I/O error or [`Error::InvalidProfile`] for malformed rows.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::read_to_string(path)?.parse()
    }

    #[must_use]
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    #[must_use]
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn halves_match(&self) -> bool {
        let half = self.counts.len() / 2;
        self.counts[..half] == self.counts[half..2 * half]
    }
}

impl FromStr for PulseProfile {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut counts = Vec::new();
        let mut errors = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let columns = line
                .split_whitespace()
                .map(str::parse::<f64>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::InvalidProfile(format!("line {}: {e}", lineno + 1)))?;
            let [_, count, error, ..] = columns.as_slice() else {
                return Err(Error::InvalidProfile(format!(
                    "line {}: expected bin, counts and error columns",
                    lineno + 1
                )));
            };
            counts.push(*count);
            errors.push(*error);
        }

        Self::new(counts, errors)
    }
}

/// Non-fatal oddities noticed while preparing a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProfileWarning {
    /// A single-cycle profile has identical halves.
    LooksLikeTwoCycles,
    /// A two-cycle profile has an odd number of bins.
    OddTwoCycleLength,
    /// A two-cycle profile has halves that differ.
    HalvesDiffer,
}

/// Options for [`pulsed_flux`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulsedFluxOptions {
    /// Profile repeats the cycle twice (default: true).
    pub two_cycles: bool,
    /// Harmonics used by the RMS estimator (default: 5).
    pub harmonics: usize,
    /// Total background counts to remove, spread evenly over the bins.
    /// `None` for profiles that are already background corrected.
    pub background_counts: Option<f64>,
}

impl Default for PulsedFluxOptions {
    fn default() -> Self {
        Self {
            two_cycles: true,
            harmonics: 5,
            background_counts: None,
        }
    }
}

impl PulsedFluxOptions {
    /// Set two-cycle handling.
    #[must_use]
    pub fn with_two_cycles(mut self, two_cycles: bool) -> Self {
        self.two_cycles = two_cycles;
        self
    }

    /// Set the number of harmonics.
    #[must_use]
    pub fn with_harmonics(mut self, harmonics: usize) -> Self {
        self.harmonics = harmonics;
        self
    }

    /// Subtract `counts` of background from the profile.
    #[must_use]
    pub fn with_background_counts(mut self, counts: f64) -> Self {
        self.background_counts = Some(counts);
        self
    }
}

/// RMS pulsed flux and pulsed fraction with uncertainties.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PulsedFlux {
    pub flux: f64,
    pub flux_error: f64,
    pub fraction: f64,
    pub fraction_error: f64,
    /// Mean (background-subtracted) counts per bin.
    pub mean_flux: f64,
    pub warnings: Vec<ProfileWarning>,
}

/// Measures the RMS pulsed flux and fraction of a folded profile.
///
/// # Errors
/// Returns [`Error::InvalidProfile`] if a two-cycle profile has fewer than two
/// bins, or the mean flux after background subtraction is zero.
#[allow(clippy::cast_precision_loss)]
pub fn pulsed_flux<E: RmsEstimator + ?Sized>(
    profile: &PulseProfile,
    options: &PulsedFluxOptions,
    estimator: &E,
) -> Result<PulsedFlux> {
    let mut warnings = Vec::new();
    let n = profile.len();

    let (mut histogram, uncertainties) = if options.two_cycles {
        if n < 2 {
            return Err(Error::InvalidProfile(
                "two-cycle profile needs at least two bins".into(),
            ));
        }
        if n % 2 == 1 {
            warnings.push(ProfileWarning::OddTwoCycleLength);
        }
        if !profile.halves_match() {
            warnings.push(ProfileWarning::HalvesDiffer);
        }
        (
            profile.counts[..n / 2].to_vec(),
            profile.errors[..n / 2].to_vec(),
        )
    } else {
        if n % 2 == 0 && profile.halves_match() {
            warnings.push(ProfileWarning::LooksLikeTwoCycles);
        }
        (profile.counts.clone(), profile.errors.clone())
    };

    if let Some(background) = options.background_counts {
        let per_bin = background / histogram.len() as f64;
        histogram.iter_mut().for_each(|c| *c -= per_bin);
    }

    let mean_flux = histogram.iter().sum::<f64>() / histogram.len() as f64;
    if mean_flux == 0.0 || !mean_flux.is_finite() {
        return Err(Error::InvalidProfile(format!(
            "mean flux {mean_flux} cannot normalize a pulsed fraction"
        )));
    }

    let (flux, flux_error) = estimator.estimate(&histogram, &uncertainties, options.harmonics);

    Ok(PulsedFlux {
        flux,
        flux_error,
        fraction: flux / mean_flux,
        fraction_error: flux_error / mean_flux,
        mean_flux,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    /// Records its input and returns a fixed estimate.
    #[derive(Default)]
    struct FixedEstimator {
        seen: RefCell<Vec<(Vec<f64>, Vec<f64>, usize)>>,
    }

    impl RmsEstimator for FixedEstimator {
        fn estimate(&self, histogram: &[f64], uncertainties: &[f64], harmonics: usize) -> (f64, f64) {
            self.seen
                .borrow_mut()
                .push((histogram.to_vec(), uncertainties.to_vec(), harmonics));
            (2.0, 0.5)
        }
    }

    fn two_cycle_profile() -> PulseProfile {
        "# bin counts err\n\
         0 10 1\n1 14 1.5\n2 12 1\n3 8 1\n\
         4 10 1\n5 14 1.5\n6 12 1\n7 8 1\n"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_parse_profile() {
        let profile = two_cycle_profile();
        assert_eq!(profile.len(), 8);
        assert_eq!(profile.counts()[1], 14.0);
        assert_eq!(profile.errors()[1], 1.5);
    }

    #[test]
    fn test_parse_rejects_short_rows() {
        assert!("0 10\n".parse::<PulseProfile>().is_err());
        assert!("0 ten 1\n".parse::<PulseProfile>().is_err());
        assert!("# empty\n".parse::<PulseProfile>().is_err());
    }

    #[test]
    fn test_two_cycle_profile_uses_first_cycle() {
        let estimator = FixedEstimator::default();
        let result =
            pulsed_flux(&two_cycle_profile(), &PulsedFluxOptions::default(), &estimator).unwrap();

        let seen = estimator.seen.borrow();
        assert_eq!(seen[0].0, vec![10.0, 14.0, 12.0, 8.0]);
        assert_eq!(seen[0].1, vec![1.0, 1.5, 1.0, 1.0]);
        assert_eq!(seen[0].2, 5);

        assert_relative_eq!(result.mean_flux, 11.0);
        assert_relative_eq!(result.flux, 2.0);
        assert_relative_eq!(result.fraction, 2.0 / 11.0);
        assert_relative_eq!(result.fraction_error, 0.5 / 11.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_background_subtraction() {
        let estimator = FixedEstimator::default();
        let options = PulsedFluxOptions::default().with_background_counts(20.0);
        let result = pulsed_flux(&two_cycle_profile(), &options, &estimator).unwrap();

        // 20 counts over 4 bins
        assert_eq!(estimator.seen.borrow()[0].0, vec![5.0, 9.0, 7.0, 3.0]);
        assert_relative_eq!(result.mean_flux, 6.0);
    }

    #[test]
    fn test_cycle_warnings() {
        let estimator = FixedEstimator::default();

        let single = PulsedFluxOptions::default().with_two_cycles(false);
        let result = pulsed_flux(&two_cycle_profile(), &single, &estimator).unwrap();
        assert_eq!(result.warnings, vec![ProfileWarning::LooksLikeTwoCycles]);

        let odd: PulseProfile = "0 1 1\n1 2 1\n2 3 1\n".parse().unwrap();
        let result = pulsed_flux(&odd, &PulsedFluxOptions::default(), &estimator).unwrap();
        assert_eq!(
            result.warnings,
            vec![ProfileWarning::OddTwoCycleLength, ProfileWarning::HalvesDiffer]
        );
    }

    #[test]
    fn test_zero_mean_is_rejected() {
        let estimator = FixedEstimator::default();
        let flat: PulseProfile = "0 5 1\n1 5 1\n".parse().unwrap();
        let options = PulsedFluxOptions::default()
            .with_two_cycles(false)
            .with_background_counts(10.0);
        assert!(pulsed_flux(&flat, &options, &estimator).is_err());
    }
}
