use nalgebra::{DMatrix, DVector};

use crate::state_space::StateSpace;
use crate::types::SarimaxConfig;

/// Variance given to states with no prior information.
pub const DIFFUSE_KAPPA: f64 = 1e6;

const LYAPUNOV_MAX_DOUBLINGS: usize = 64;
const LYAPUNOV_TOL: f64 = 1e-10;

/// Initial state mean, covariance and likelihood burn-in for the filter.
#[derive(Debug, Clone)]
pub struct KalmanInit {
    pub initial_state: DVector<f64>,
    pub initial_state_cov: DMatrix<f64>,
    /// Leading observations excluded from the log-likelihood.
    pub loglikelihood_burn: usize,
}

impl KalmanInit {
    /// `a_0 = 0`, `P_0 = kappa I`, burn = `k_states`.
    pub fn approximate_diffuse(k_states: usize, kappa: f64) -> Self {
        Self {
            initial_state: DVector::zeros(k_states),
            initial_state_cov: DMatrix::identity(k_states, k_states) * kappa,
            loglikelihood_burn: k_states,
        }
    }

    /// Initialisation matching the model's constraints.
    ///
    /// With stationarity enforced the ARMA block starts from its
    /// unconditional mean and covariance and only the differencing states
    /// are diffuse. Otherwise, or when the Lyapunov iteration does not
    /// settle, every state is approximately diffuse.
    pub fn from_config(ss: &StateSpace, config: &SarimaxConfig, kappa: f64) -> Self {
        if !config.enforce_stationarity {
            return Self::approximate_diffuse(ss.k_states, kappa);
        }
        match stationary_block(ss) {
            Some((mean, cov)) => {
                let k = ss.k_states;
                let sd = ss.k_states_diff;
                let mut a0 = DVector::zeros(k);
                let mut p0 = DMatrix::zeros(k, k);
                for i in 0..sd {
                    p0[(i, i)] = kappa;
                }
                a0.rows_mut(sd, k - sd).copy_from(&mean);
                p0.view_mut((sd, sd), (k - sd, k - sd)).copy_from(&cov);
                Self {
                    initial_state: a0,
                    initial_state_cov: p0,
                    loglikelihood_burn: sd,
                }
            }
            None => {
                log::trace!("stationary initialisation failed; using approximate diffuse");
                Self::approximate_diffuse(ss.k_states, kappa)
            }
        }
    }
}

/// Unconditional mean and covariance of the ARMA block.
fn stationary_block(ss: &StateSpace) -> Option<(DVector<f64>, DMatrix<f64>)> {
    let sd = ss.k_states_diff;
    let ko = ss.k_states - sd;
    let t = ss.transition.view((sd, sd), (ko, ko)).into_owned();
    let r = ss.selection.rows(sd, ko).into_owned();
    let c = ss.state_intercept.rows(sd, ko).into_owned();

    let cov = solve_discrete_lyapunov(&t, &(&r * r.transpose()))?;

    let mean = if c.iter().all(|&x| x == 0.0) {
        DVector::zeros(ko)
    } else {
        let i_minus_t = DMatrix::<f64>::identity(ko, ko) - &t;
        i_minus_t.lu().solve(&c)?
    };
    Some((mean, cov))
}

/// Solve `P = T P T' + Q` by the doubling iteration.
pub fn solve_discrete_lyapunov(t: &DMatrix<f64>, q: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let mut a = t.clone();
    let mut p = q.clone();
    for _ in 0..LYAPUNOV_MAX_DOUBLINGS {
        let step = &a * &p * a.transpose();
        p += &step;
        if !p.iter().all(|x| x.is_finite()) {
            return None;
        }
        if step.amax() <= LYAPUNOV_TOL * p.amax().max(1.0) {
            return Some(p);
        }
        a = &a * &a;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SarimaParams;
    use crate::types::{SarimaxOrder, Trend};

    fn state_space(order: SarimaxOrder, ar: &[f64], intercept: Option<f64>) -> (StateSpace, SarimaxConfig) {
        let mut cfg = SarimaxConfig::new(order);
        if intercept.is_none() {
            cfg.trend = Trend::None;
        }
        let params = SarimaParams {
            intercept,
            ar: ar.to_vec(),
            ma: vec![],
            sar: vec![],
            sma: vec![],
        };
        (StateSpace::new(&cfg, &params).unwrap(), cfg)
    }

    #[test]
    fn test_approximate_diffuse() {
        let init = KalmanInit::approximate_diffuse(3, DIFFUSE_KAPPA);
        assert_eq!(init.loglikelihood_burn, 3);
        assert!(init.initial_state.iter().all(|&x| x == 0.0));
        assert!((init.initial_state_cov[(2, 2)] - 1e6).abs() < 1e-6);
        assert_eq!(init.initial_state_cov[(0, 1)], 0.0);
    }

    #[test]
    fn test_ar1_stationary_variance() {
        // Var = 1 / (1 - phi^2)
        let (ss, cfg) = state_space(SarimaxOrder::new(1, 0, 0, 0, 0, 0, 7), &[0.6], None);
        let init = KalmanInit::from_config(&ss, &cfg, DIFFUSE_KAPPA);
        assert_eq!(init.loglikelihood_burn, 0);
        assert!((init.initial_state_cov[(0, 0)] - 1.0 / 0.64).abs() < 1e-8);
    }

    #[test]
    fn test_ar1_stationary_mean_with_intercept() {
        // mean = c / (1 - phi)
        let (ss, cfg) = state_space(SarimaxOrder::new(1, 0, 0, 0, 0, 0, 7), &[0.5], Some(2.0));
        let init = KalmanInit::from_config(&ss, &cfg, DIFFUSE_KAPPA);
        assert!((init.initial_state[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_differenced_model_mixes_diffuse_and_stationary() {
        let (ss, cfg) = state_space(SarimaxOrder::new(1, 1, 0, 0, 0, 0, 7), &[0.5], None);
        let init = KalmanInit::from_config(&ss, &cfg, DIFFUSE_KAPPA);
        assert_eq!(init.loglikelihood_burn, 1);
        assert!((init.initial_state_cov[(0, 0)] - DIFFUSE_KAPPA).abs() < 1e-6);
        assert!((init.initial_state_cov[(1, 1)] - 1.0 / 0.75).abs() < 1e-8);
        assert_eq!(init.initial_state_cov[(0, 1)], 0.0);
    }

    #[test]
    fn test_unenforced_is_fully_diffuse() {
        let (ss, mut cfg) = state_space(SarimaxOrder::new(1, 0, 0, 0, 0, 0, 7), &[0.5], None);
        cfg.enforce_stationarity = false;
        let init = KalmanInit::from_config(&ss, &cfg, DIFFUSE_KAPPA);
        assert_eq!(init.loglikelihood_burn, 1);
    }

    #[test]
    fn test_lyapunov_rejects_explosive() {
        let t = DMatrix::from_element(1, 1, 1.5);
        let q = DMatrix::from_element(1, 1, 1.0);
        assert!(solve_discrete_lyapunov(&t, &q).is_none());
    }
}
