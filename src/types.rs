use serde::Serialize;

/// Seasonal ARIMA order (p,d,q)x(P,D,Q,s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SarimaxOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    /// Seasonal AR order (P).
    pub pp: usize,
    /// Seasonal differencing order (D).
    pub dd: usize,
    /// Seasonal MA order (Q).
    pub qq: usize,
    /// Seasonal period.
    pub s: usize,
}

impl SarimaxOrder {
    pub fn new(p: usize, d: usize, q: usize, pp: usize, dd: usize, qq: usize, s: usize) -> Self {
        Self { p, d, q, pp, dd, qq, s }
    }

    /// Lag of the expanded AR polynomial, p + s*P.
    pub fn k_ar(&self) -> usize {
        self.p + self.s * self.pp
    }

    /// Lag of the expanded MA polynomial, q + s*Q.
    pub fn k_ma(&self) -> usize {
        self.q + self.s * self.qq
    }

    /// ARMA block of the state: max(k_ar, k_ma + 1).
    pub fn k_order(&self) -> usize {
        self.k_ar().max(self.k_ma() + 1)
    }

    /// Differencing block of the state: d + s*D.
    pub fn k_states_diff(&self) -> usize {
        self.d + self.s * self.dd
    }

    pub fn k_states(&self) -> usize {
        self.k_order() + self.k_states_diff()
    }

    pub fn is_seasonal(&self) -> bool {
        self.pp + self.dd + self.qq > 0
    }
}

impl std::fmt::Display for SarimaxOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{},{})x({},{},{},{})",
            self.p, self.d, self.q, self.pp, self.dd, self.qq, self.s
        )
    }
}

/// Deterministic trend entering the state equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    None,
    /// Constant intercept on the (differenced) ARMA process.
    Constant,
}

impl Trend {
    pub fn k_trend(&self) -> usize {
        match self {
            Trend::None => 0,
            Trend::Constant => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SarimaxConfig {
    pub order: SarimaxOrder,
    pub trend: Trend,
    pub enforce_stationarity: bool,
    pub enforce_invertibility: bool,
}

impl SarimaxConfig {
    /// Constant-trend model with both transforms enforced.
    pub fn new(order: SarimaxOrder) -> Self {
        Self {
            order,
            trend: Trend::Constant,
            enforce_stationarity: true,
            enforce_invertibility: true,
        }
    }

    /// Length of the optimised parameter vector. The scale is concentrated
    /// out and never part of it.
    pub fn n_free_params(&self) -> usize {
        self.trend.k_trend() + self.order.p + self.order.q + self.order.pp + self.order.qq
    }

    /// Parameters counted by the information criteria, including sigma2.
    pub fn n_estimated_params(&self) -> usize {
        self.n_free_params() + 1
    }

    /// Observations a fit needs before the likelihood is informative.
    pub fn min_obs(&self) -> usize {
        self.n_free_params().max(self.order.k_states() + 1)
    }
}

/// Maximum likelihood fit of one candidate.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Constrained parameters `[intercept? | ar | ma | sar | sma]`.
    pub params: Vec<f64>,
    pub loglike: f64,
    /// Concentrated innovation variance.
    pub scale: f64,
    pub n_obs: usize,
    pub n_params: usize,
    pub n_iter: u64,
    pub converged: bool,
    pub method: String,
    pub aic: f64,
    pub bic: f64,
}

impl FitResult {
    /// Fill `aic` and `bic` from the log-likelihood.
    pub fn with_information_criteria(mut self) -> Self {
        let k = self.n_params as f64;
        self.aic = -2.0 * self.loglike + 2.0 * k;
        self.bic = -2.0 * self.loglike + k * (self.n_obs as f64).ln();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekly_sarima_dimensions() {
        // (2,1,2)x(2,1,2,7): k_ar = 16, k_ma = 16, k_order = 17, diff = 8
        let order = SarimaxOrder::new(2, 1, 2, 2, 1, 2, 7);
        assert_eq!(order.k_ar(), 16);
        assert_eq!(order.k_ma(), 16);
        assert_eq!(order.k_order(), 17);
        assert_eq!(order.k_states_diff(), 8);
        assert_eq!(order.k_states(), 25);
        assert!(order.is_seasonal());
    }

    #[test]
    fn test_white_noise_dimensions() {
        let order = SarimaxOrder::new(0, 0, 0, 0, 0, 0, 7);
        assert_eq!(order.k_order(), 1);
        assert_eq!(order.k_states(), 1);
        assert!(!order.is_seasonal());
    }

    #[test]
    fn test_param_counts() {
        let config = SarimaxConfig::new(SarimaxOrder::new(1, 1, 1, 1, 0, 1, 7));
        assert_eq!(config.n_free_params(), 5);
        assert_eq!(config.n_estimated_params(), 6);
        // k_states = max(8, 9) + 1 = 10
        assert_eq!(config.min_obs(), 11);
    }

    #[test]
    fn test_information_criteria() {
        let fit = FitResult {
            params: vec![],
            loglike: -100.0,
            scale: 1.0,
            n_obs: 50,
            n_params: 3,
            n_iter: 0,
            converged: true,
            method: "lbfgs".into(),
            aic: 0.0,
            bic: 0.0,
        }
        .with_information_criteria();
        assert!((fit.aic - 206.0).abs() < 1e-12);
        assert!((fit.bic - (200.0 + 3.0 * 50f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_order_display() {
        assert_eq!(SarimaxOrder::new(1, 0, 2, 0, 1, 1, 7).to_string(), "(1,0,2)x(0,1,1,7)");
    }
}
