use nalgebra::{DMatrix, DVector};

use crate::error::{EpiError, Result};
use crate::params::SarimaParams;
use crate::polynomial::{reduced_ar, reduced_ma};
use crate::types::SarimaxConfig;

/// Harvey representation of a seasonal ARIMA model with the differencing
/// kept inside the state.
///
/// ```text
/// alpha_{t+1} = T alpha_t + c + R eta_t,   eta_t ~ N(0, sigma2)
/// y_t         = Z' alpha_t
/// ```
///
/// State layout: `d` integration states, `D` blocks of `s` seasonal lags,
/// then `k_order` ARMA states. The constant `c` is non-zero only at the
/// first ARMA state.
#[derive(Debug, Clone)]
pub struct StateSpace {
    pub k_states: usize,
    pub k_states_diff: usize,
    pub transition: DMatrix<f64>,
    pub design: DVector<f64>,
    pub selection: DVector<f64>,
    pub state_intercept: DVector<f64>,
}

impl StateSpace {
    pub fn new(config: &SarimaxConfig, params: &SarimaParams) -> Result<Self> {
        let order = &config.order;
        if order.dd > 1 {
            return Err(EpiError::StateSpaceError(format!(
                "seasonal differencing D={} is not supported",
                order.dd
            )));
        }
        if order.dd > 0 && order.s < 2 {
            return Err(EpiError::StateSpaceError(format!(
                "seasonal differencing needs a period >= 2, got {}",
                order.s
            )));
        }
        if (order.pp > 0 || order.qq > 0) && order.s < 2 {
            return Err(EpiError::StateSpaceError(format!(
                "seasonal ARMA terms need a period >= 2, got {}",
                order.s
            )));
        }

        let k_states = order.k_states();
        let k_states_diff = order.k_states_diff();
        let transition = Self::build_transition(config, params);
        let design = Self::build_design(config);
        let selection = Self::build_selection(config, params);

        let mut state_intercept = DVector::zeros(k_states);
        state_intercept[k_states_diff] = params.intercept_or_zero();

        Ok(Self {
            k_states,
            k_states_diff,
            transition,
            design,
            selection,
            state_intercept,
        })
    }

    fn build_transition(config: &SarimaxConfig, params: &SarimaParams) -> DMatrix<f64> {
        let order = &config.order;
        let (d, dd, s) = (order.d, order.dd, order.s);
        let sd = order.k_states_diff();
        let ko = order.k_order();
        let mut t = DMatrix::<f64>::zeros(order.k_states(), order.k_states());

        // integration: y_{t} = y_{t-1} + (lower-order differences)
        for i in 0..d {
            for j in i..d {
                t[(i, j)] = 1.0;
            }
            t[(i, sd)] = 1.0;
        }

        // seasonal lags rotate; the first slot takes lag s plus the ARMA term
        for layer in 0..dd {
            let base = d + layer * s;
            t[(base, base + s - 1)] = 1.0;
            for i in 0..s - 1 {
                t[(base + i + 1, base + i)] = 1.0;
            }
            t[(base, sd)] = 1.0;
            for i in 0..d {
                t[(i, base + s - 1)] = 1.0;
            }
        }

        // ARMA companion block
        let ar = reduced_ar(params, order);
        for i in 0..ko {
            if let Some(&c) = ar.get(i + 1) {
                t[(sd + i, sd)] = -c;
            }
            if i + 1 < ko {
                t[(sd + i, sd + i + 1)] = 1.0;
            }
        }
        t
    }

    fn build_design(config: &SarimaxConfig) -> DVector<f64> {
        let order = &config.order;
        let mut z = DVector::<f64>::zeros(order.k_states());
        for i in 0..order.d {
            z[i] = 1.0;
        }
        for layer in 0..order.dd {
            z[order.d + (layer + 1) * order.s - 1] = 1.0;
        }
        z[order.k_states_diff()] = 1.0;
        z
    }

    fn build_selection(config: &SarimaxConfig, params: &SarimaParams) -> DVector<f64> {
        let order = &config.order;
        let sd = order.k_states_diff();
        let ma = reduced_ma(params, order);
        let mut r = DVector::<f64>::zeros(order.k_states());
        for (i, &c) in ma.iter().enumerate().take(order.k_order()) {
            r[sd + i] = c;
        }
        r
    }

    /// `R R'`, the state disturbance covariance per unit of scale.
    pub fn disturbance_cov(&self) -> DMatrix<f64> {
        &self.selection * self.selection.transpose()
    }
}
