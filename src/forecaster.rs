//! Case-count forecasters.
//!
//! [`SeasonalForecaster`] searches a grid of seasonal ARIMA orders on the
//! `log1p` series and forecasts with the lowest-AIC model. When no candidate
//! can be fitted it degrades to the linear extrapolation that
//! [`LinearTrendForecaster`] also offers on its own.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::config::{ForecastConfig, ForecasterKind};
use crate::error::{EpiError, Result};
use crate::forecast::{forecast_pipeline, StateForecast};
use crate::observer::{FallbackReport, LogObserver, SearchObserver};
use crate::params::SarimaParams;
use crate::search::{search, SelectedModel};
use crate::series::TimeSeries;
use crate::types::SarimaxOrder;

pub const MAX_HORIZON: usize = 365;

/// One forecast day. Every bound is non-negative and
/// `lower_95 <= lower_80 <= mean <= upper_80 <= upper_95`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub mean: f64,
    pub lower_80: f64,
    pub upper_80: f64,
    pub lower_95: f64,
    pub upper_95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub order: SarimaxOrder,
    pub aic: f64,
    pub bic: f64,
    pub loglike: f64,
    pub n_obs: usize,
    pub method: String,
    pub candidates_tried: usize,
    pub candidates_converged: usize,
}

/// Which model produced a [`ForecastResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForecastSource {
    Sarima(ModelSummary),
    LinearTrendFallback { reason: String },
    LinearTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    /// Exactly `horizon` days, starting the day after the last observation.
    pub points: Vec<ForecastPoint>,
    pub source: ForecastSource,
}

impl ForecastResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ForecastSource::LinearTrendFallback { .. })
    }
}

pub trait Forecaster: Send + Sync {
    /// Forecast `horizon` days past the end of `series`.
    ///
    /// # Errors
    /// [`EpiError::InvalidParameter`] when `horizon` is outside
    /// `[1, MAX_HORIZON]` and [`EpiError::InvalidSeries`] for an empty series.
    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult>;
}

/// Build the forecaster named by `config.kind`.
pub fn build_forecaster(config: &ForecastConfig) -> Box<dyn Forecaster> {
    match config.kind {
        ForecasterKind::Seasonal => Box::new(SeasonalForecaster::from_config(config.clone())),
        ForecasterKind::LinearTrend => Box::new(LinearTrendForecaster::new(config.fallback_window)),
    }
}

fn validate_request(series: &TimeSeries, horizon: usize) -> Result<NaiveDate> {
    if !(1..=MAX_HORIZON).contains(&horizon) {
        return Err(EpiError::invalid_param(
            "horizon",
            format!("must be in [1, {}], got {}", MAX_HORIZON, horizon),
        ));
    }
    series
        .last_date()
        .ok_or_else(|| EpiError::InvalidSeries("cannot forecast an empty series".into()))
}

fn forecast_dates(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    (1..=horizon as u64)
        .map(|h| {
            last.checked_add_days(Days::new(h))
                .ok_or_else(|| EpiError::InvalidSeries(format!("date overflow {} days after {}", h, last)))
        })
        .collect()
}

/// Least-squares line through the last `window` values, extrapolated from
/// the last observation. Bounds are fixed fractions of the point forecast.
fn linear_trend_points(values: &[f64], dates: &[NaiveDate], window: usize) -> Vec<ForecastPoint> {
    let n = values.len();
    let tail = &values[n - window.clamp(1, n)..];
    let last = tail[tail.len() - 1];

    let m = tail.len() as f64;
    let x_mean = (m - 1.0) / 2.0;
    let y_mean = tail.iter().sum::<f64>() / m;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in tail.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    dates
        .iter()
        .enumerate()
        .map(|(i, &date)| {
            let mean = (last + slope * (i + 1) as f64).max(0.0);
            ForecastPoint {
                date,
                mean,
                lower_80: mean * 0.8,
                upper_80: mean * 1.2,
                lower_95: mean * 0.6,
                upper_95: mean * 1.4,
            }
        })
        .collect()
}

/// Extrapolates a straight line fitted to recent observations.
#[derive(Debug, Clone)]
pub struct LinearTrendForecaster {
    window: usize,
}

impl Default for LinearTrendForecaster {
    fn default() -> Self {
        Self::new(ForecastConfig::default().fallback_window)
    }
}

impl LinearTrendForecaster {
    /// A `window` of zero is treated as one.
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1) }
    }
}

impl Forecaster for LinearTrendForecaster {
    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        let last = validate_request(series, horizon)?;
        let dates = forecast_dates(last, horizon)?;
        Ok(ForecastResult {
            points: linear_trend_points(series.values(), &dates, self.window),
            source: ForecastSource::LinearTrend,
        })
    }
}

/// Seasonal ARIMA forecaster with automatic order selection.
#[derive(Clone)]
pub struct SeasonalForecaster {
    config: ForecastConfig,
    observer: Arc<dyn SearchObserver>,
}

impl Default for SeasonalForecaster {
    fn default() -> Self {
        Self::from_config(ForecastConfig::default())
    }
}

impl std::fmt::Debug for SeasonalForecaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeasonalForecaster")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SeasonalForecaster {
    pub fn from_config(config: ForecastConfig) -> Self {
        Self {
            config,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.config.seasonal_period = period;
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    fn fallback(&self, series: &TimeSeries, dates: &[NaiveDate], reason: String, tried: usize) -> ForecastResult {
        self.observer.on_fallback(&FallbackReport {
            reason: reason.clone(),
            candidates_tried: tried,
        });
        ForecastResult {
            points: linear_trend_points(series.values(), dates, self.config.fallback_window),
            source: ForecastSource::LinearTrendFallback { reason },
        }
    }

    /// Forecast on the `log1p` scale with the selected model and map back.
    fn model_points(&self, log_values: &[f64], selected: &SelectedModel, dates: &[NaiveDate]) -> Result<Vec<ForecastPoint>> {
        let params = SarimaParams::from_flat(&selected.fit.params, &selected.config)?;
        let StateForecast {
            mean,
            lower_80,
            upper_80,
            lower_95,
            upper_95,
            ..
        } = forecast_pipeline(log_values, &selected.config, &params, dates.len())?;

        let back = |v: f64| v.exp_m1().max(0.0);
        let points: Vec<ForecastPoint> = dates
            .iter()
            .enumerate()
            .map(|(h, &date)| ForecastPoint {
                date,
                mean: back(mean[h]),
                lower_80: back(lower_80[h]),
                upper_80: back(upper_80[h]),
                lower_95: back(lower_95[h]),
                upper_95: back(upper_95[h]),
            })
            .collect();

        let finite = points
            .iter()
            .all(|p| [p.mean, p.lower_80, p.upper_80, p.lower_95, p.upper_95].iter().all(|v| v.is_finite()));
        if !finite {
            return Err(EpiError::OptimizationFailed(format!(
                "non-finite forecast from {}",
                selected.config.order
            )));
        }
        Ok(points)
    }
}

impl Forecaster for SeasonalForecaster {
    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        let last = validate_request(series, horizon)?;
        if self.config.seasonal_period < 2 {
            return Err(EpiError::invalid_param(
                "seasonal_period",
                format!("must be at least 2, got {}", self.config.seasonal_period),
            ));
        }
        let dates = forecast_dates(last, horizon)?;
        let log_values: Vec<f64> = series.values().iter().map(|v| v.max(0.0).ln_1p()).collect();

        let outcome = search(&log_values, &self.config, self.observer.as_ref());
        let Some(selected) = outcome.best else {
            let reason = format!("no candidate converged on {} observations", series.len());
            return Ok(self.fallback(series, &dates, reason, outcome.candidates_tried));
        };

        match self.model_points(&log_values, &selected, &dates) {
            Ok(points) => Ok(ForecastResult {
                points,
                source: ForecastSource::Sarima(ModelSummary {
                    order: selected.config.order,
                    aic: selected.fit.aic,
                    bic: selected.fit.bic,
                    loglike: selected.fit.loglike,
                    n_obs: selected.fit.n_obs,
                    method: selected.fit.method.clone(),
                    candidates_tried: outcome.candidates_tried,
                    candidates_converged: outcome.candidates_converged,
                }),
            }),
            Err(e) => Ok(self.fallback(series, &dates, e.to_string(), outcome.candidates_tried)),
        }
    }
}
