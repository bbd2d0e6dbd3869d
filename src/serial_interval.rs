use statrs::distribution::{ContinuousCDF, Gamma};

use crate::error::{EpiError, Result};

/// Default gamma shape parameter of the generation interval.
pub const DEFAULT_SHAPE: f64 = 2.0;

/// Upper bound on the mean generation interval in days.
pub const MAX_MEAN_INTERVAL: f64 = 365.0;

/// Discretised generation-interval distribution over lags `1..=k_max` days.
///
/// `weights[s - 1]` is the probability that a secondary case was infected
/// by a primary case exactly `s` days earlier. Weights are non-negative and
/// sum to 1, or are all zero when the continuous distribution put no mass
/// on the window.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialIntervalKernel {
    weights: Vec<f64>,
}

impl SerialIntervalKernel {
    /// Discretise a gamma(shape, scale = mean_interval / shape) distribution.
    pub fn new(mean_interval: f64, shape: f64) -> Result<Self> {
        if !mean_interval.is_finite() || mean_interval <= 0.0 || mean_interval > MAX_MEAN_INTERVAL {
            return Err(EpiError::invalid_param(
                "mean_interval",
                format!("must be in (0, {}], got {}", MAX_MEAN_INTERVAL, mean_interval),
            ));
        }
        if !shape.is_finite() || shape <= 0.0 {
            return Err(EpiError::invalid_param(
                "shape",
                format!("must be positive, got {}", shape),
            ));
        }

        // statrs parameterises the gamma by rate = 1 / scale.
        let rate = shape / mean_interval;
        let dist = Gamma::new(shape, rate)
            .map_err(|e| EpiError::invalid_param("shape", e.to_string()))?;

        let k_max = Self::k_max_for(mean_interval);
        let mut weights: Vec<f64> = (1..=k_max)
            .map(|s| {
                let mass = dist.cdf(s as f64) - dist.cdf((s - 1) as f64);
                mass.max(0.0)
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter_mut().for_each(|w| *w /= total);
        }

        Ok(Self { weights })
    }

    /// Maximum look-back lag: `max(1, round(5 * mean_interval))`.
    pub fn k_max_for(mean_interval: f64) -> usize {
        ((5.0 * mean_interval).round() as usize).max(1)
    }

    pub fn k_max(&self) -> usize {
        self.weights.len()
    }

    /// Weights ordered by lag, index 0 is lag 1.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// True when the kernel carries no probability mass.
    pub fn is_degenerate(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }

    pub fn mean_lag(&self) -> f64 {
        self.weights
            .iter()
            .enumerate()
            .map(|(i, w)| (i + 1) as f64 * w)
            .sum()
    }
}
