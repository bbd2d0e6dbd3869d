use nalgebra::{DMatrix, DVector};

use crate::error::{EpiError, Result};
use crate::initialization::KalmanInit;
use crate::state_space::StateSpace;

/// Concentrated scales at or below this mean the model reproduces the data
/// exactly and the likelihood is unbounded.
const MIN_SCALE: f64 = 1e-12;

/// Filter pass over the whole sample.
#[derive(Debug, Clone)]
pub struct KalmanFilterOutput {
    pub loglike: f64,
    /// Concentrated innovation variance sigma2_hat.
    pub scale: f64,
    /// One-step prediction errors `v_t`.
    pub innovations: Vec<f64>,
    /// Prediction error variances `F_t`, per unit of scale.
    pub innovation_vars: Vec<f64>,
    /// `a_{n+1|n}`, the starting point of a forecast.
    pub predicted_state: DVector<f64>,
    /// `P_{n+1|n}` per unit of scale.
    pub predicted_cov: DMatrix<f64>,
    pub n_obs_effective: usize,
}

/// Run the filter with the scale concentrated out of the likelihood:
///
/// ```text
/// v_t = y_t - Z' a_t,  F_t = Z' P_t Z
/// a_{t+1} = T (a_t + P_t Z v_t / F_t) + c
/// P_{t+1} = T (P_t - P_t Z Z' P_t / F_t) T' + R R'
/// sigma2  = sum(v_t^2 / F_t) / n_eff
/// llf     = -n_eff/2 (ln 2pi + ln sigma2 + 1) - 1/2 sum(ln F_t)
/// ```
///
/// Sums run over `t >= burn`; steps with a non-positive `F_t` carry no
/// information and are left out of `n_eff` as well.
pub fn kalman_filter(endog: &[f64], ss: &StateSpace, init: &KalmanInit) -> Result<KalmanFilterOutput> {
    let n = endog.len();
    let burn = init.loglikelihood_burn;
    if n <= burn {
        return Err(EpiError::DataError(format!(
            "not enough observations: n={} <= burn={}",
            n, burn
        )));
    }
    let t_mat = &ss.transition;
    let z = &ss.design;
    let rrt = ss.disturbance_cov();

    let mut a = init.initial_state.clone();
    let mut p = init.initial_state_cov.clone();

    let mut innovations = Vec::with_capacity(n);
    let mut innovation_vars = Vec::with_capacity(n);
    let mut sum_log_f = 0.0;
    let mut sum_v2_f = 0.0;
    let mut n_eff = 0usize;

    for (t, &y) in endog.iter().enumerate() {
        let v = y - z.dot(&a);
        let pz = &p * z;
        let f = z.dot(&pz);
        innovations.push(v);
        innovation_vars.push(f);

        if f > 0.0 && f.is_finite() {
            let a_upd = &a + &pz * (v / f);
            let p_upd = &p - &pz * pz.transpose() / f;
            a = t_mat * a_upd + &ss.state_intercept;
            p = t_mat * p_upd * t_mat.transpose() + &rrt;
            if t >= burn {
                sum_log_f += f.ln();
                sum_v2_f += v * v / f;
                n_eff += 1;
            }
        } else {
            a = t_mat * &a + &ss.state_intercept;
            p = t_mat * &p * t_mat.transpose() + &rrt;
        }
    }

    if n_eff == 0 {
        return Err(EpiError::DataError(
            "no informative observations after burn-in".into(),
        ));
    }
    let scale = sum_v2_f / n_eff as f64;
    if !scale.is_finite() || scale <= MIN_SCALE {
        return Err(EpiError::DataError(format!(
            "degenerate innovation variance {:e}",
            scale
        )));
    }
    let n_eff_f = n_eff as f64;
    let loglike = -0.5 * n_eff_f * ((2.0 * std::f64::consts::PI).ln() + scale.ln() + 1.0)
        - 0.5 * sum_log_f;

    Ok(KalmanFilterOutput {
        loglike,
        scale,
        innovations,
        innovation_vars,
        predicted_state: a,
        predicted_cov: p,
        n_obs_effective: n_eff,
    })
}

/// Concentrated log-likelihood and scale.
pub fn kalman_loglike(endog: &[f64], ss: &StateSpace, init: &KalmanInit) -> Result<(f64, f64)> {
    let out = kalman_filter(endog, ss, init)?;
    Ok((out.loglike, out.scale))
}
