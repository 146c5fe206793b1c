//! Exposure weights for stacking spectra.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Exposure-proportional weights for combining response matrices.
///
/// Weights are the contributing exposures divided by their sum, so they
/// always add up to one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StackWeights {
    exposures: Vec<f64>,
    weights: Vec<f64>,
}

impl StackWeights {
    /// Normalizes raw exposure times (seconds).
    ///
    /// # Errors
    /// Returns [`Error::InvalidExposure`] for an empty set, any negative or
    /// non-finite exposure, or a zero total.
    pub fn from_exposures(exposures: Vec<f64>) -> Result<Self> {
        if exposures.is_empty() {
            return Err(Error::InvalidExposure("no spectra to stack".into()));
        }
        if let Some(bad) = exposures.iter().find(|e| !e.is_finite() || **e < 0.0) {
            return Err(Error::InvalidExposure(format!("exposure {bad} is not usable")));
        }

        let total: f64 = exposures.iter().sum();
        if total <= 0.0 {
            return Err(Error::InvalidExposure("total exposure is zero".into()));
        }

        let weights = exposures.iter().map(|e| e / total).collect();
        Ok(Self { exposures, weights })
    }

    /// Normalized weights in input order.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Raw exposures in input order.
    #[must_use]
    pub fn exposures(&self) -> &[f64] {
        &self.exposures
    }

    /// Summed exposure of the stack.
    #[must_use]
    pub fn total_exposure(&self) -> f64 {
        self.exposures.iter().sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Comma-separated weights as passed to `addrmf`.
    #[must_use]
    pub fn to_list(&self) -> String {
        self.weights
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
