//! Lag polynomials of the multiplicative seasonal model.

use crate::params::SarimaParams;
use crate::types::SarimaxOrder;

/// Product of two polynomials in ascending-power coefficient order.
pub fn polymul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] += ai * bj;
        }
    }
    out
}

/// `1 + sign * (c_1 L^step + c_2 L^(2 step) + ...)`.
fn lag_poly(coeffs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coeffs.len() * step + 1];
    poly[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

/// `(1 - phi(L)) (1 - Phi(L^s))`.
pub fn reduced_ar(params: &SarimaParams, order: &SarimaxOrder) -> Vec<f64> {
    polymul(
        &lag_poly(&params.ar, 1, -1.0),
        &lag_poly(&params.sar, order.s.max(1), -1.0),
    )
}

/// `(1 + theta(L)) (1 + Theta(L^s))`.
pub fn reduced_ma(params: &SarimaParams, order: &SarimaxOrder) -> Vec<f64> {
    polymul(
        &lag_poly(&params.ma, 1, 1.0),
        &lag_poly(&params.sma, order.s.max(1), 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ar: &[f64], ma: &[f64], sar: &[f64], sma: &[f64]) -> SarimaParams {
        SarimaParams {
            intercept: None,
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            sar: sar.to_vec(),
            sma: sma.to_vec(),
        }
    }

    #[test]
    fn test_polymul() {
        // (1 + 2x)(1 + 3x) = 1 + 5x + 6x^2
        assert_eq!(polymul(&[1.0, 2.0], &[1.0, 3.0]), vec![1.0, 5.0, 6.0]);
        assert!(polymul(&[], &[1.0]).is_empty());
    }

    #[test]
    fn test_weekly_reduced_ar() {
        // (1 - 0.5L)(1 - 0.3L^7) = 1 - 0.5L - 0.3L^7 + 0.15L^8
        let order = SarimaxOrder::new(1, 0, 0, 1, 0, 0, 7);
        let r = reduced_ar(&params(&[0.5], &[], &[0.3], &[]), &order);
        assert_eq!(r.len(), 9);
        assert!((r[1] + 0.5).abs() < 1e-12);
        assert!(r[2..7].iter().all(|&x| x.abs() < 1e-12));
        assert!((r[7] + 0.3).abs() < 1e-12);
        assert!((r[8] - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_weekly_reduced_ma() {
        // (1 + 0.2L + 0.1L^2)(1 + 0.4L^7)
        let order = SarimaxOrder::new(0, 0, 2, 0, 0, 1, 7);
        let r = reduced_ma(&params(&[], &[0.2, 0.1], &[], &[0.4]), &order);
        assert_eq!(r.len(), 10);
        assert!((r[2] - 0.1).abs() < 1e-12);
        assert!((r[7] - 0.4).abs() < 1e-12);
        assert!((r[8] - 0.08).abs() < 1e-12);
        assert!((r[9] - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_empty_polynomials_are_one() {
        let order = SarimaxOrder::new(0, 0, 0, 0, 0, 0, 7);
        assert_eq!(reduced_ar(&params(&[], &[], &[], &[]), &order), vec![1.0]);
        assert_eq!(reduced_ma(&params(&[], &[], &[], &[]), &order), vec![1.0]);
    }
}
