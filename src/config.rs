//! Engine configuration.
//!
//! Every section has defaults so a partial TOML document is valid:
//!
//! ```toml
//! [rt]
//! mean_interval = 5.0
//!
//! [forecast]
//! kind = "seasonal"
//! maxiter = 100
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{EpiError, Result};
use crate::search::OrderGrid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rt: RtConfig,
    pub seir: SeirConfig,
    pub intervention: InterventionConfig,
    pub forecast: ForecastConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| EpiError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EpiError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RtConfig {
    /// Mean generation interval in days.
    pub mean_interval: f64,
    /// Gamma shape of the generation interval.
    pub shape: f64,
    pub smoothing_window: usize,
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            mean_interval: 4.0,
            shape: crate::serial_interval::DEFAULT_SHAPE,
            smoothing_window: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeirConfig {
    /// RK4 steps per simulated day.
    pub substeps_per_day: usize,
}

impl Default for SeirConfig {
    fn default() -> Self {
        Self { substeps_per_day: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterventionConfig {
    pub window: usize,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self { window: 7 }
    }
}

/// Which [`Forecaster`](crate::forecaster::Forecaster) implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecasterKind {
    Seasonal,
    LinearTrend,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub kind: ForecasterKind,
    pub seasonal_period: usize,
    pub grid: OrderGrid,
    /// Optimizer iteration budget per candidate.
    pub maxiter: u64,
    /// Fit AR parts in the stationary region. On by default; turning it off
    /// leaves degenerate explosive fits to be discarded by the search.
    pub enforce_stationarity: bool,
    pub enforce_invertibility: bool,
    /// Evaluate candidates on the rayon thread pool.
    pub parallel: bool,
    /// Observations used by the linear-trend fallback.
    pub fallback_window: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            kind: ForecasterKind::Seasonal,
            seasonal_period: 7,
            grid: OrderGrid::default(),
            maxiter: 200,
            enforce_stationarity: true,
            enforce_invertibility: true,
            parallel: true,
            fallback_window: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert!((cfg.rt.mean_interval - 4.0).abs() < 1e-12);
        assert_eq!(cfg.rt.smoothing_window, 7);
        assert_eq!(cfg.intervention.window, 7);
        assert_eq!(cfg.forecast.seasonal_period, 7);
        assert_eq!(cfg.forecast.kind, ForecasterKind::Seasonal);
        assert_eq!(cfg.forecast.grid.len(), 324);
        assert_eq!(cfg.forecast.fallback_window, 30);
    }

    #[test]
    fn test_forecast_constraints_enforced_by_default() {
        let cfg = ForecastConfig::default();
        assert!(cfg.enforce_stationarity);
        assert!(cfg.enforce_invertibility);

        let cfg = EngineConfig::from_toml_str(
            "[forecast]\nenforce_stationarity = false\nenforce_invertibility = false",
        )
        .unwrap();
        assert!(!cfg.forecast.enforce_stationarity);
        assert!(!cfg.forecast.enforce_invertibility);
    }

    #[test]
    fn test_partial_toml() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [rt]
            mean_interval = 5.5

            [forecast]
            kind = "linear_trend"
            maxiter = 50

            [forecast.grid]
            p = [0, 1]
            "#,
        )
        .unwrap();
        assert!((cfg.rt.mean_interval - 5.5).abs() < 1e-12);
        assert_eq!(cfg.rt.smoothing_window, 7);
        assert_eq!(cfg.forecast.kind, ForecasterKind::LinearTrend);
        assert_eq!(cfg.forecast.maxiter, 50);
        assert_eq!(cfg.forecast.grid.p, vec![0, 1]);
        assert_eq!(cfg.forecast.grid.q, vec![0, 1, 2]);
        assert_eq!(cfg.seir.substeps_per_day, 20);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("[forecast]\nkind = \"prophet\"");
        assert!(matches!(err, Err(EpiError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(EngineConfig::from_path("/nonexistent/outbreak.toml").is_err());
    }
}
