//! Outbreak analytics on daily case counts: renewal-equation R_t, SEIR
//! projections, intervention counterfactuals and seasonal ARIMA forecasts.
//!
//! The library never installs a logger; events go through the `log` facade.

pub mod config;
pub mod error;
pub mod intervention;
pub mod observer;
pub mod rt;
pub mod seir;
pub mod serial_interval;
pub mod series;

// SARIMA engine
pub mod forecast;
pub mod initialization;
pub mod kalman;
pub mod optimizer;
pub mod params;
pub mod polynomial;
pub mod start_params;
pub mod state_space;
pub mod types;

pub mod forecaster;
pub mod search;

pub use config::{EngineConfig, ForecastConfig, ForecasterKind, InterventionConfig, RtConfig, SeirConfig};
pub use error::{EpiError, Result};
pub use forecaster::{
    build_forecaster, ForecastPoint, ForecastResult, ForecastSource, Forecaster, LinearTrendForecaster,
    ModelSummary, SeasonalForecaster,
};
pub use intervention::{simulate_intervention, simulate_intervention_with_config, InterventionResult};
pub use observer::{CandidateReport, FallbackReport, LogObserver, NoopObserver, SearchObserver};
pub use rt::RtEstimator;
pub use search::OrderGrid;
pub use seir::{SeirParams, SeirSimulator, SeirTrajectory};
pub use serial_interval::SerialIntervalKernel;
pub use series::{RtPoint, RtSeries, TimeSeries};
