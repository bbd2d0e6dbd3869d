//! Parameter vector layout and the constrained/unconstrained transforms
//! used by the optimiser.

use crate::error::{EpiError, Result};
use crate::types::SarimaxConfig;

/// Structured view of a candidate's parameter vector.
///
/// Flat order: `[intercept? | ar(p) | ma(q) | sar(P) | sma(Q)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SarimaParams {
    pub intercept: Option<f64>,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sar: Vec<f64>,
    pub sma: Vec<f64>,
}

impl SarimaParams {
    pub fn from_flat(flat: &[f64], config: &SarimaxConfig) -> Result<Self> {
        let expected = config.n_free_params();
        if flat.len() != expected {
            return Err(EpiError::ParamLengthMismatch {
                expected,
                got: flat.len(),
            });
        }
        let o = &config.order;
        let (intercept, rest) = if config.trend.k_trend() == 1 {
            (Some(flat[0]), &flat[1..])
        } else {
            (None, flat)
        };
        let (ar, rest) = rest.split_at(o.p);
        let (ma, rest) = rest.split_at(o.q);
        let (sar, sma) = rest.split_at(o.pp);
        Ok(Self {
            intercept,
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            sar: sar.to_vec(),
            sma: sma.to_vec(),
        })
    }

    pub fn to_flat(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(
            self.intercept.is_some() as usize + self.ar.len() + self.ma.len() + self.sar.len() + self.sma.len(),
        );
        v.extend(self.intercept);
        v.extend(&self.ar);
        v.extend(&self.ma);
        v.extend(&self.sar);
        v.extend(&self.sma);
        v
    }

    pub fn intercept_or_zero(&self) -> f64 {
        self.intercept.unwrap_or(0.0)
    }
}

/// Map unconstrained reals to the coefficients of a stationary AR polynomial
/// through partial autocorrelations (Monahan 1984).
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return Vec::new();
    }
    let pacf: Vec<f64> = unconstrained.iter().map(|&x| x / (1.0 + x * x).sqrt()).collect();

    // Durbin-Levinson: phi_k = pacf_k, phi_j <- phi_j - pacf_k * phi_{k-j}
    let mut phi: Vec<f64> = Vec::with_capacity(n);
    for (k, &r) in pacf.iter().enumerate() {
        let prev = phi.clone();
        for j in 0..k {
            phi[j] = prev[j] - r * prev[k - 1 - j];
        }
        phi.push(r);
    }
    phi
}

/// Inverse of [`constrain_stationary`].
pub fn unconstrain_stationary(constrained: &[f64]) -> Vec<f64> {
    let n = constrained.len();
    if n == 0 {
        return Vec::new();
    }
    let mut phi = constrained.to_vec();
    let mut pacf = vec![0.0; n];
    for k in (0..n).rev() {
        let r = phi[k];
        pacf[k] = r;
        let denom = (1.0 - r * r).max(1e-15);
        let prev = phi.clone();
        for j in 0..k {
            phi[j] = (prev[j] + r * prev[k - 1 - j]) / denom;
        }
        phi.truncate(k);
    }
    pacf.iter()
        .map(|&r| {
            let r = r.clamp(-1.0 + 1e-12, 1.0 - 1e-12);
            r / (1.0 - r * r).sqrt()
        })
        .collect()
}

/// True when `1 - phi_1 L - ... - phi_p L^p` has all roots outside the unit
/// circle, i.e. every implied partial autocorrelation is inside (-1, 1).
pub fn is_stationary(coeffs: &[f64]) -> bool {
    let mut phi = coeffs.to_vec();
    for k in (0..phi.len()).rev() {
        let r = phi[k];
        if !r.is_finite() || r.abs() >= 1.0 {
            return false;
        }
        let denom = 1.0 - r * r;
        let prev = phi.clone();
        for j in 0..k {
            phi[j] = (prev[j] + r * prev[k - 1 - j]) / denom;
        }
        phi.truncate(k);
    }
    true
}

/// True when `1 + theta_1 L + ...` is invertible.
pub fn is_invertible(coeffs: &[f64]) -> bool {
    let negated: Vec<f64> = coeffs.iter().map(|&x| -x).collect();
    is_stationary(&negated)
}

/// MA coefficients of an invertible polynomial `1 + theta_1 L + ...`.
pub fn constrain_invertible(unconstrained: &[f64]) -> Vec<f64> {
    constrain_stationary(unconstrained).into_iter().map(|x| -x).collect()
}

pub fn unconstrain_invertible(constrained: &[f64]) -> Vec<f64> {
    let negated: Vec<f64> = constrained.iter().map(|&x| -x).collect();
    unconstrain_stationary(&negated)
}

fn map_blocks(
    flat: &[f64],
    config: &SarimaxConfig,
    stationary: fn(&[f64]) -> Vec<f64>,
    invertible: fn(&[f64]) -> Vec<f64>,
) -> Result<Vec<f64>> {
    let sp = SarimaParams::from_flat(flat, config)?;
    let apply = |coeffs: &[f64], enforce: bool, f: fn(&[f64]) -> Vec<f64>| {
        if enforce && !coeffs.is_empty() {
            f(coeffs)
        } else {
            coeffs.to_vec()
        }
    };
    Ok(SarimaParams {
        intercept: sp.intercept,
        ar: apply(&sp.ar, config.enforce_stationarity, stationary),
        ma: apply(&sp.ma, config.enforce_invertibility, invertible),
        sar: apply(&sp.sar, config.enforce_stationarity, stationary),
        sma: apply(&sp.sma, config.enforce_invertibility, invertible),
    }
    .to_flat())
}

/// Unconstrained optimiser space to model coefficients.
pub fn transform_params(unconstrained: &[f64], config: &SarimaxConfig) -> Result<Vec<f64>> {
    map_blocks(unconstrained, config, constrain_stationary, constrain_invertible)
}

/// Model coefficients to unconstrained optimiser space.
pub fn untransform_params(constrained: &[f64], config: &SarimaxConfig) -> Result<Vec<f64>> {
    map_blocks(constrained, config, unconstrain_stationary, unconstrain_invertible)
}
