use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{EpiError, Result};
use crate::initialization::{KalmanInit, DIFFUSE_KAPPA};
use crate::kalman::{kalman_filter, KalmanFilterOutput};
use crate::params::SarimaParams;
use crate::state_space::StateSpace;
use crate::types::SarimaxConfig;

/// Two-sided interval levels reported with every forecast.
pub const ALPHA_80: f64 = 0.2;
pub const ALPHA_95: f64 = 0.05;

/// h-step forecasts on the model's scale.
#[derive(Debug, Clone)]
pub struct StateForecast {
    pub mean: Vec<f64>,
    /// Forecast error variance, scale included.
    pub variance: Vec<f64>,
    pub lower_80: Vec<f64>,
    pub upper_80: Vec<f64>,
    pub lower_95: Vec<f64>,
    pub upper_95: Vec<f64>,
}

/// Standard normal quantile at `1 - alpha / 2`.
pub fn z_score(alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(EpiError::invalid_param("alpha", format!("must be in (0, 1), got {}", alpha)));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| EpiError::invalid_param("alpha", e.to_string()))?;
    Ok(normal.inverse_cdf(1.0 - alpha / 2.0))
}

/// Propagate the filter's final prediction `steps` periods ahead:
///
/// ```text
/// y_h = Z' a_h,  Var = sigma2 Z' P_h Z
/// a_{h+1} = T a_h + c,  P_{h+1} = T P_h T' + R R'
/// ```
pub fn forecast(ss: &StateSpace, filtered: &KalmanFilterOutput, steps: usize) -> Result<StateForecast> {
    let z80 = z_score(ALPHA_80)?;
    let z95 = z_score(ALPHA_95)?;

    let z = &ss.design;
    let t_mat = &ss.transition;
    let rrt = ss.disturbance_cov();

    let mut a = filtered.predicted_state.clone();
    let mut p = filtered.predicted_cov.clone();
    let mut out = StateForecast {
        mean: Vec::with_capacity(steps),
        variance: Vec::with_capacity(steps),
        lower_80: Vec::with_capacity(steps),
        upper_80: Vec::with_capacity(steps),
        lower_95: Vec::with_capacity(steps),
        upper_95: Vec::with_capacity(steps),
    };

    for _ in 0..steps {
        let y_hat = z.dot(&a);
        let var = (z.dot(&(&p * z)) * filtered.scale).max(0.0);
        let se = var.sqrt();
        out.mean.push(y_hat);
        out.variance.push(var);
        out.lower_80.push(y_hat - z80 * se);
        out.upper_80.push(y_hat + z80 * se);
        out.lower_95.push(y_hat - z95 * se);
        out.upper_95.push(y_hat + z95 * se);

        a = t_mat * &a + &ss.state_intercept;
        p = t_mat * &p * t_mat.transpose() + &rrt;
    }
    Ok(out)
}

/// Filter `endog` at the given parameters, then forecast.
pub fn forecast_pipeline(
    endog: &[f64],
    config: &SarimaxConfig,
    params: &SarimaParams,
    steps: usize,
) -> Result<StateForecast> {
    let ss = StateSpace::new(config, params)?;
    let init = KalmanInit::from_config(&ss, config, DIFFUSE_KAPPA);
    let filtered = kalman_filter(endog, &ss, &init)?;
    forecast(&ss, &filtered, steps)
}
