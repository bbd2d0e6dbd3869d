//! Information-criterion search over a grid of seasonal ARIMA orders.

use rayon::prelude::*;
use serde::Deserialize;

use crate::config::ForecastConfig;
use crate::error::{EpiError, Result};
use crate::observer::{CandidateReport, SearchObserver};
use crate::optimizer::{fit, FitMethod};
use crate::params::{is_stationary, SarimaParams};
use crate::types::{FitResult, SarimaxConfig, SarimaxOrder, Trend};

/// Candidate values for each order component.
///
/// Enumeration runs seasonal orders outermost and non-seasonal innermost:
/// `P, D, Q, p, d, q`. The winner on tied AIC is the first in this order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OrderGrid {
    pub p: Vec<usize>,
    pub d: Vec<usize>,
    pub q: Vec<usize>,
    #[serde(rename = "P")]
    pub pp: Vec<usize>,
    #[serde(rename = "D")]
    pub dd: Vec<usize>,
    #[serde(rename = "Q")]
    pub qq: Vec<usize>,
}

impl Default for OrderGrid {
    fn default() -> Self {
        Self {
            p: vec![0, 1, 2],
            d: vec![0, 1],
            q: vec![0, 1, 2],
            pp: vec![0, 1, 2],
            dd: vec![0, 1],
            qq: vec![0, 1, 2],
        }
    }
}

impl OrderGrid {
    pub fn len(&self) -> usize {
        [&self.p, &self.d, &self.q, &self.pp, &self.dd, &self.qq]
            .iter()
            .map(|v| v.len())
            .product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every order in enumeration order.
    pub fn candidates(&self, seasonal_period: usize) -> Vec<SarimaxOrder> {
        let mut out = Vec::with_capacity(self.len());
        for &pp in &self.pp {
            for &dd in &self.dd {
                for &qq in &self.qq {
                    for &p in &self.p {
                        for &d in &self.d {
                            for &q in &self.q {
                                out.push(SarimaxOrder::new(p, d, q, pp, dd, qq, seasonal_period));
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

/// Fitted scales below this fraction of the sample variance mean the
/// likelihood ran off to a degenerate optimum.
const MIN_RELATIVE_SCALE: f64 = 1e-6;

/// Best candidate of a finished search.
#[derive(Debug, Clone)]
pub struct SelectedModel {
    /// Position of the winner in enumeration order.
    pub index: usize,
    pub config: SarimaxConfig,
    pub fit: FitResult,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Option<SelectedModel>,
    pub candidates_tried: usize,
    pub candidates_converged: usize,
}

fn candidate_config(order: SarimaxOrder, config: &ForecastConfig) -> SarimaxConfig {
    SarimaxConfig {
        order,
        trend: Trend::Constant,
        enforce_stationarity: config.enforce_stationarity,
        enforce_invertibility: config.enforce_invertibility,
    }
}

fn sample_variance(y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Reject fits that are numerically usable but statistically degenerate.
///
/// Without enforced stationarity the optimiser can reach explosive AR roots
/// where the concentrated likelihood grows without bound.
fn check_fit(endog: &[f64], model: &SarimaxConfig, fitted: &FitResult) -> Result<()> {
    if !fitted.aic.is_finite() {
        return Err(EpiError::OptimizationFailed(format!("non-finite AIC for {}", model.order)));
    }
    let params = SarimaParams::from_flat(&fitted.params, model)?;
    if !model.enforce_stationarity && !(is_stationary(&params.ar) && is_stationary(&params.sar)) {
        return Err(EpiError::OptimizationFailed(format!(
            "{} converged to a non-stationary AR polynomial",
            model.order
        )));
    }
    let floor = MIN_RELATIVE_SCALE * sample_variance(endog);
    if fitted.scale < floor {
        return Err(EpiError::OptimizationFailed(format!(
            "{}: scale {:e} below {:e}",
            model.order, fitted.scale, floor
        )));
    }
    Ok(())
}

fn evaluate(endog: &[f64], model: &SarimaxConfig, maxiter: u64) -> Result<FitResult> {
    let fitted = fit(endog, model, FitMethod::Lbfgs, maxiter)?;
    check_fit(endog, model, &fitted)?;
    Ok(fitted)
}

/// Fit every grid candidate to `endog` and keep the lowest AIC.
///
/// A candidate that errors is skipped. Fits may run on the rayon pool, but
/// results are reduced in enumeration order so the winner does not depend
/// on scheduling.
pub fn search(endog: &[f64], config: &ForecastConfig, observer: &dyn SearchObserver) -> SearchOutcome {
    let models: Vec<SarimaxConfig> = config
        .grid
        .candidates(config.seasonal_period)
        .into_iter()
        .map(|order| candidate_config(order, config))
        .collect();

    let results: Vec<Result<FitResult>> = if config.parallel {
        models
            .par_iter()
            .map(|m| evaluate(endog, m, config.maxiter))
            .collect()
    } else {
        models.iter().map(|m| evaluate(endog, m, config.maxiter)).collect()
    };

    let mut best: Option<SelectedModel> = None;
    let mut converged = 0usize;
    for (index, (model, result)) in models.into_iter().zip(results).enumerate() {
        observer.on_candidate(&CandidateReport {
            index,
            order: model.order,
            outcome: result.as_ref().map(|f| f.aic).map_err(|e| e.to_string()),
        });
        let Ok(fitted) = result else { continue };
        converged += 1;
        let better = best.as_ref().map_or(true, |b| fitted.aic < b.fit.aic);
        if better {
            best = Some(SelectedModel {
                index,
                config: model,
                fit: fitted,
            });
        }
    }

    if let Some(b) = &best {
        log::info!(
            "selected SARIMA{} (#{}) aic={:.3} ({} of {} candidates fitted)",
            b.config.order,
            b.index,
            b.fit.aic,
            converged,
            config.grid.len()
        );
    }
    SearchOutcome {
        best,
        candidates_tried: config.grid.len(),
        candidates_converged: converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        indices: Mutex<Vec<usize>>,
    }

    impl SearchObserver for Recorder {
        fn on_candidate(&self, report: &CandidateReport) {
            self.indices.lock().unwrap().push(report.index);
        }
    }

    fn weekly_series(n: usize) -> Vec<f64> {
        let mut state: u64 = 99;
        (0..n)
            .map(|t| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let e = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
                4.0 + 0.5 * ((t % 7) as f64 / 7.0 * std::f64::consts::TAU).sin() + 0.3 * e
            })
            .collect()
    }

    fn small_config(parallel: bool) -> ForecastConfig {
        ForecastConfig {
            grid: OrderGrid {
                p: vec![0, 1],
                d: vec![0],
                q: vec![0, 1],
                pp: vec![0, 1],
                dd: vec![0],
                qq: vec![0],
            },
            maxiter: 50,
            parallel,
            ..ForecastConfig::default()
        }
    }

    #[test]
    fn test_default_grid_size() {
        let grid = OrderGrid::default();
        assert_eq!(grid.len(), 324);
        assert_eq!(grid.candidates(7).len(), 324);
    }

    #[test]
    fn test_enumeration_order() {
        let c = OrderGrid::default().candidates(7);
        assert_eq!(c[0], SarimaxOrder::new(0, 0, 0, 0, 0, 0, 7));
        // q varies fastest, then d, then p
        assert_eq!(c[1], SarimaxOrder::new(0, 0, 1, 0, 0, 0, 7));
        assert_eq!(c[3], SarimaxOrder::new(0, 1, 0, 0, 0, 0, 7));
        assert_eq!(c[6], SarimaxOrder::new(1, 0, 0, 0, 0, 0, 7));
        // then Q, D, P
        assert_eq!(c[18], SarimaxOrder::new(0, 0, 0, 0, 0, 1, 7));
        assert_eq!(c[54], SarimaxOrder::new(0, 0, 0, 0, 1, 0, 7));
        assert_eq!(c[108], SarimaxOrder::new(0, 0, 0, 1, 0, 0, 7));
        assert_eq!(c[323], SarimaxOrder::new(2, 1, 2, 2, 1, 2, 7));
    }

    #[test]
    fn test_search_picks_minimum_aic() {
        let y = weekly_series(70);
        let cfg = small_config(false);
        let outcome = search(&y, &cfg, &NoopObserver);
        assert_eq!(outcome.candidates_tried, 8);
        let best = outcome.best.expect("some candidate fits");
        // no other candidate beats the winner
        for order in cfg.grid.candidates(7) {
            if let Ok(f) = evaluate(&y, &candidate_config(order, &cfg), cfg.maxiter) {
                assert!(f.aic >= best.fit.aic - 1e-9);
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let y = weekly_series(70);
        let seq = search(&y, &small_config(false), &NoopObserver);
        let par = search(&y, &small_config(true), &NoopObserver);
        let (a, b) = (seq.best.unwrap(), par.best.unwrap());
        assert_eq!(a.config.order, b.config.order);
        assert_eq!(a.fit.aic, b.fit.aic);
        assert_eq!(seq.candidates_converged, par.candidates_converged);
    }

    #[test]
    fn test_observer_sees_candidates_in_order() {
        let y = weekly_series(40);
        let rec = Recorder::default();
        search(&y, &small_config(true), &rec);
        assert_eq!(*rec.indices.lock().unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_tied_candidates_keep_first() {
        // the repeated Q value enumerates every (p, P) pair twice with
        // identical fits
        let y = weekly_series(70);
        for parallel in [false, true] {
            let cfg = ForecastConfig {
                grid: OrderGrid {
                    p: vec![0, 1],
                    d: vec![0],
                    q: vec![0],
                    pp: vec![0],
                    dd: vec![0],
                    qq: vec![0, 0],
                },
                maxiter: 50,
                parallel,
                ..ForecastConfig::default()
            };
            let outcome = search(&y, &cfg, &NoopObserver);
            let best = outcome.best.unwrap();
            assert!(best.index < 2, "winner #{} is a later duplicate", best.index);
            let twin = evaluate(&y, &candidate_config(cfg.grid.candidates(7)[best.index + 2], &cfg), cfg.maxiter)
                .unwrap();
            assert_eq!(twin.aic, best.fit.aic);
        }
    }

    fn unconstrained(order: SarimaxOrder) -> SarimaxConfig {
        SarimaxConfig {
            order,
            trend: Trend::Constant,
            enforce_stationarity: false,
            enforce_invertibility: false,
        }
    }

    fn fit_with(params: Vec<f64>, scale: f64) -> FitResult {
        FitResult {
            params,
            loglike: 10.0,
            scale,
            n_obs: 70,
            n_params: 3,
            n_iter: 50,
            converged: false,
            method: "lbfgs".into(),
            aic: 0.0,
            bic: 0.0,
        }
        .with_information_criteria()
    }

    #[test]
    fn test_explosive_unconstrained_fit_rejected() {
        let y = weekly_series(70);
        let model = unconstrained(SarimaxOrder::new(1, 1, 0, 1, 0, 0, 7));
        assert!(check_fit(&y, &model, &fit_with(vec![0.1, 0.4, -0.3], 0.05)).is_ok());
        assert!(check_fit(&y, &model, &fit_with(vec![0.1, 10.7, -0.3], 0.05)).is_err());
        assert!(check_fit(&y, &model, &fit_with(vec![0.1, 0.4, 1.2], 0.05)).is_err());
    }

    #[test]
    fn test_vanishing_scale_rejected() {
        let y = weekly_series(70);
        let model = unconstrained(SarimaxOrder::new(1, 1, 0, 1, 0, 0, 7));
        assert!(check_fit(&y, &model, &fit_with(vec![0.1, 0.4, -0.3], 1.2e-10)).is_err());
    }

    #[test]
    fn test_unconstrained_search_skips_degenerate_fits() {
        let y = weekly_series(70);
        let floor = MIN_RELATIVE_SCALE * sample_variance(&y);
        let cfg = ForecastConfig {
            enforce_stationarity: false,
            enforce_invertibility: false,
            ..small_config(true)
        };
        if let Some(best) = search(&y, &cfg, &NoopObserver).best {
            let params = SarimaParams::from_flat(&best.fit.params, &best.config).unwrap();
            assert!(is_stationary(&params.ar) && is_stationary(&params.sar));
            assert!(best.fit.scale >= floor);
        }
    }

    #[test]
    fn test_too_short_series_has_no_winner() {
        let outcome = search(&[0.0, 0.0], &small_config(true), &NoopObserver);
        assert!(outcome.best.is_none());
        assert_eq!(outcome.candidates_converged, 0);
    }
}
