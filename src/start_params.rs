//! Starting values for the likelihood optimiser.
//!
//! The series is differenced as the candidate order asks, then:
//! 1. AR by Burg's method (Yule-Walker if Burg breaks down)
//! 2. MA by the innovations algorithm on the AR residuals
//! 3. Seasonal AR / MA the same way on autocovariances at lags s, 2s, ...
//! 4. The intercept from the mean of the differenced series
//!
//! Blocks that come out non-stationary or non-invertible are reset to zero
//! when the configuration enforces those constraints.

use crate::params::{is_invertible, is_stationary, SarimaParams};
use crate::types::{SarimaxConfig, Trend};

const MA_START_CLAMP: f64 = 0.99;

fn difference(y: &[f64], lag: usize, times: usize) -> Vec<f64> {
    let mut out = y.to_vec();
    for _ in 0..times {
        if out.len() <= lag {
            return Vec::new();
        }
        out = (lag..out.len()).map(|i| out[i] - out[i - lag]).collect();
    }
    out
}

fn mean(y: &[f64]) -> f64 {
    if y.is_empty() {
        0.0
    } else {
        y.iter().sum::<f64>() / y.len() as f64
    }
}

/// Biased (1/n) sample autocovariance at `lag`.
fn autocovariance(y: &[f64], lag: usize) -> f64 {
    let n = y.len();
    if lag >= n {
        return 0.0;
    }
    let m = mean(y);
    (0..n - lag).map(|i| (y[i] - m) * (y[i + lag] - m)).sum::<f64>() / n as f64
}

fn burg_ar(y: &[f64], p: usize) -> Option<Vec<f64>> {
    if p == 0 {
        return Some(Vec::new());
    }
    let n = y.len();
    if n <= p {
        return None;
    }
    let m = mean(y);
    let mut ef: Vec<f64> = y.iter().map(|&v| v - m).collect();
    let mut eb = ef.clone();
    let mut a = vec![0.0; p];

    for k in 0..p {
        let (mut num, mut den) = (0.0, 0.0);
        for t in (k + 1)..n {
            num += ef[t] * eb[t - 1];
            den += ef[t] * ef[t] + eb[t - 1] * eb[t - 1];
        }
        if den.abs() < 1e-15 {
            return None;
        }
        let kk = 2.0 * num / den;
        if kk.abs() >= 1.0 {
            return None;
        }
        let prev = a[..k].to_vec();
        a[k] = kk;
        for j in 0..k {
            a[j] = prev[j] - kk * prev[k - 1 - j];
        }
        // reverse so eb[t - 1] is read before it is overwritten
        for t in ((k + 1)..n).rev() {
            let f = ef[t];
            ef[t] = f - kk * eb[t - 1];
            eb[t] = eb[t - 1] - kk * f;
        }
    }
    Some(a)
}

/// Levinson-Durbin solve of the Yule-Walker system for `gammas[0..=p]`.
fn yule_walker(gammas: &[f64], p: usize) -> Option<Vec<f64>> {
    if p == 0 {
        return Some(Vec::new());
    }
    if gammas.len() <= p || gammas[0].abs() < 1e-15 {
        return None;
    }
    let mut phi = vec![0.0; p];
    let mut var = gammas[0];
    for k in 0..p {
        if var.abs() < 1e-15 {
            return None;
        }
        let num = gammas[k + 1] - (0..k).map(|j| phi[j] * gammas[k - j]).sum::<f64>();
        let lambda = num / var;
        let prev = phi.clone();
        phi[k] = lambda;
        for j in 0..k {
            phi[j] = prev[j] - lambda * prev[k - 1 - j];
        }
        var *= 1.0 - lambda * lambda;
    }
    Some(phi)
}

/// Innovations algorithm (Brockwell & Davis 5.2) on the autocovariances at
/// lags `0, step, 2 step, ..., q step`.
fn innovations_ma(resid: &[f64], q: usize, step: usize) -> Vec<f64> {
    if q == 0 || resid.len() <= q * step {
        return vec![0.0; q];
    }
    let gamma: Vec<f64> = (0..=q).map(|k| autocovariance(resid, k * step)).collect();
    if gamma[0].abs() < 1e-15 {
        return vec![0.0; q];
    }

    let mut theta = vec![vec![0.0; q]; q + 1];
    let mut v = vec![0.0; q + 1];
    v[0] = gamma[0];
    for i in 1..=q {
        for k in 0..i {
            let mut sum = gamma[i - k];
            for j in 0..k {
                sum -= theta[k][k - 1 - j] * theta[i][i - 1 - j] * v[j];
            }
            theta[i][i - 1 - k] = if v[k].abs() > 1e-15 { sum / v[k] } else { 0.0 };
        }
        v[i] = gamma[0] - (0..i).map(|j| theta[i][i - 1 - j].powi(2) * v[j]).sum::<f64>();
        v[i] = v[i].max(1e-15);
    }
    theta[q].iter().map(|t| t.clamp(-MA_START_CLAMP, MA_START_CLAMP)).collect()
}

/// `y[t] - sum_j coeffs[j] * y[t - (j + 1) * step]`.
fn ar_filter(y: &[f64], coeffs: &[f64], step: usize) -> Vec<f64> {
    let start = coeffs.len() * step;
    if coeffs.is_empty() {
        return y.to_vec();
    }
    if y.len() <= start {
        return Vec::new();
    }
    (start..y.len())
        .map(|t| {
            y[t] - coeffs
                .iter()
                .enumerate()
                .map(|(j, c)| c * y[t - (j + 1) * step])
                .sum::<f64>()
        })
        .collect()
}

/// Constrained starting parameters in the [`SarimaParams`] flat layout.
/// Never fails: anything that cannot be estimated starts at zero.
pub fn compute_start_params(endog: &[f64], config: &SarimaxConfig) -> Vec<f64> {
    let o = &config.order;
    let s = o.s.max(1);
    let diffed = difference(&difference(endog, 1, o.d), s, o.dd);

    let zeros = SarimaParams {
        intercept: (config.trend == Trend::Constant).then_some(0.0),
        ar: vec![0.0; o.p],
        ma: vec![0.0; o.q],
        sar: vec![0.0; o.pp],
        sma: vec![0.0; o.qq],
    };
    if diffed.len() < 3 {
        return zeros.to_flat();
    }

    let mut ar = burg_ar(&diffed, o.p)
        .or_else(|| {
            let g: Vec<f64> = (0..=o.p).map(|k| autocovariance(&diffed, k)).collect();
            yule_walker(&g, o.p)
        })
        .unwrap_or_else(|| vec![0.0; o.p]);
    if config.enforce_stationarity && !is_stationary(&ar) {
        ar = vec![0.0; o.p];
    }
    let resid = ar_filter(&diffed, &ar, 1);
    let mut ma = innovations_ma(&resid, o.q, 1);
    if config.enforce_invertibility && !is_invertible(&ma) {
        ma = vec![0.0; o.q];
    }

    let mut sar = if o.pp > 0 && diffed.len() > o.pp * s {
        let g: Vec<f64> = (0..=o.pp).map(|k| autocovariance(&diffed, k * s)).collect();
        yule_walker(&g, o.pp).unwrap_or_else(|| vec![0.0; o.pp])
    } else {
        vec![0.0; o.pp]
    };
    if config.enforce_stationarity && !is_stationary(&sar) {
        sar = vec![0.0; o.pp];
    }
    let sresid = ar_filter(&resid, &sar, s);
    let mut sma = innovations_ma(&sresid, o.qq, s);
    if config.enforce_invertibility && !is_invertible(&sma) {
        sma = vec![0.0; o.qq];
    }

    let intercept = (config.trend == Trend::Constant).then(|| {
        let ar_gain = 1.0 - ar.iter().sum::<f64>();
        let sar_gain = 1.0 - sar.iter().sum::<f64>();
        mean(&diffed) * ar_gain * sar_gain
    });

    SarimaParams {
        intercept,
        ar,
        ma,
        sar,
        sma,
    }
    .to_flat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SarimaxOrder;

    /// Deterministic AR(1) sample driven by a small LCG.
    fn ar1_series(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        let mut noise = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
        };
        let mut y = vec![0.0; n];
        for t in 1..n {
            y[t] = phi * y[t - 1] + noise();
        }
        y
    }

    #[test]
    fn test_difference() {
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 1, 1), vec![2.0, 3.0, 4.0]);
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 1, 2), vec![1.0, 1.0]);
        assert_eq!(difference(&[1.0, 2.0, 3.0, 5.0, 7.0], 2, 1), vec![2.0, 3.0, 4.0]);
        assert!(difference(&[1.0, 2.0], 7, 1).is_empty());
    }

    #[test]
    fn test_burg_recovers_ar1() {
        let y = ar1_series(0.7, 2000, 42);
        let a = burg_ar(&y, 1).unwrap();
        assert!((a[0] - 0.7).abs() < 0.05, "burg {}", a[0]);
    }

    #[test]
    fn test_yule_walker_ar1_from_acov() {
        // gamma(k) = phi^k / (1 - phi^2)
        let phi: f64 = 0.6;
        let g: Vec<f64> = (0..3).map(|k| phi.powi(k) / (1.0 - phi * phi)).collect();
        let a = yule_walker(&g, 2).unwrap();
        assert!((a[0] - 0.6).abs() < 1e-12);
        assert!(a[1].abs() < 1e-12);
    }

    #[test]
    fn test_start_params_layout_and_constraints() {
        let y: Vec<f64> = ar1_series(0.5, 120, 7).iter().map(|v| v + 3.0).collect();
        let cfg = SarimaxConfig::new(SarimaxOrder::new(2, 0, 1, 1, 0, 1, 7));
        let sp = compute_start_params(&y, &cfg);
        assert_eq!(sp.len(), cfg.n_free_params());
        let parsed = SarimaParams::from_flat(&sp, &cfg).unwrap();
        assert!(is_stationary(&parsed.ar));
        assert!(is_stationary(&parsed.sar));
        assert!(is_invertible(&parsed.ma));
        assert!(is_invertible(&parsed.sma));
        assert!(parsed.intercept.unwrap() > 0.0);
    }

    #[test]
    fn test_short_series_gives_zeros() {
        let cfg = SarimaxConfig::new(SarimaxOrder::new(1, 1, 1, 0, 1, 0, 7));
        let sp = compute_start_params(&[1.0, 2.0, 3.0], &cfg);
        assert_eq!(sp, vec![0.0; cfg.n_free_params()]);
    }
}
