//! Static counterfactual: what the smoothed curve would have looked like
//! with a uniform case reduction applied.
//!
//! Multiplicative and memoryless. Nothing feeds back into transmission, so
//! this is an illustration rather than a mechanistic projection; use
//! [`SeirSimulator`](crate::seir::SeirSimulator) for the latter.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::InterventionConfig;
use crate::error::{EpiError, Result};
use crate::series::{centered_moving_average, TimeSeries};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterventionResult {
    pub dates: Vec<NaiveDate>,
    /// Centered moving average of the observed series.
    pub original: Vec<f64>,
    pub counterfactual: Vec<f64>,
}

/// Counterfactual with the default 7-day smoothing window.
pub fn simulate_intervention(series: &TimeSeries, effectiveness: f64) -> Result<InterventionResult> {
    simulate_intervention_with_config(series, effectiveness, &InterventionConfig::default())
}

pub fn simulate_intervention_with_config(
    series: &TimeSeries,
    effectiveness: f64,
    config: &InterventionConfig,
) -> Result<InterventionResult> {
    if !(0.0..=1.0).contains(&effectiveness) {
        return Err(EpiError::invalid_param(
            "effectiveness",
            format!("must be in [0, 1], got {}", effectiveness),
        ));
    }
    if config.window == 0 {
        return Err(EpiError::invalid_param("window", "must be at least 1"));
    }

    let original = centered_moving_average(series.values(), config.window);
    let factor = 1.0 - effectiveness;
    let counterfactual = original.iter().map(|&x| (x * factor).max(0.0)).collect();

    log::debug!(
        "intervention counterfactual over {} days (effectiveness={})",
        series.len(),
        effectiveness
    );
    Ok(InterventionResult {
        dates: series.dates().to_vec(),
        original,
        counterfactual,
    })
}
