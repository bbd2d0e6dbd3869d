//! Renewal-equation estimate of the effective reproduction number.
//!
//! Incidence is first smoothed with a centered moving average, then for each
//! day `t >= 1`
//!
//! ```text
//! R_t = I[t] / sum_j w_j * I[t - 1 - j]
//! ```
//!
//! over the `min(t, k_max)` most recent smoothed values. The weights are the
//! last `min(t, k_max)` entries of the serial-interval kernel, so early days
//! with a short history use the tail of the kernel.
//!
//! Known limitation: the centered window averages up to `window / 2` days
//! after `t`, so the estimate is retrospective and not suitable for
//! real-time use on the most recent days.

use crate::config::RtConfig;
use crate::error::Result;
use crate::serial_interval::SerialIntervalKernel;
use crate::series::{centered_moving_average, validate_window, RtPoint, RtSeries, TimeSeries};

/// Denominators at or below this are treated as carrying no information.
pub const MIN_DENOMINATOR: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct RtEstimator {
    shape: f64,
}

impl Default for RtEstimator {
    fn default() -> Self {
        Self {
            shape: crate::serial_interval::DEFAULT_SHAPE,
        }
    }
}

impl RtEstimator {
    /// Estimator with a custom gamma shape for the generation interval.
    pub fn with_shape(shape: f64) -> Self {
        Self { shape }
    }

    /// Estimate R_t per day.
    ///
    /// # Errors
    /// Returns an input error when `mean_interval` is not in `(0, 365]` or
    /// `smoothing_window` is outside `[1, series.len()]`. Days without enough
    /// history are `None`, never errors.
    pub fn estimate(
        &self,
        series: &TimeSeries,
        mean_interval: f64,
        smoothing_window: usize,
    ) -> Result<RtSeries> {
        validate_window(smoothing_window, series.len())?;
        let kernel = SerialIntervalKernel::new(mean_interval, self.shape)?;
        Ok(estimate_with_kernel(series, &kernel, smoothing_window))
    }

    pub fn estimate_with_config(&self, series: &TimeSeries, config: &RtConfig) -> Result<RtSeries> {
        Self::with_shape(config.shape).estimate(series, config.mean_interval, config.smoothing_window)
    }
}

/// Estimate R_t from a prebuilt kernel.
///
/// Never fails: a window outside `[1, len]` or a degenerate kernel yields an
/// all-undefined series.
pub fn estimate_with_kernel(
    series: &TimeSeries,
    kernel: &SerialIntervalKernel,
    smoothing_window: usize,
) -> RtSeries {
    let dates = series.dates();
    if smoothing_window == 0 || smoothing_window > series.len() || kernel.is_degenerate() {
        log::debug!(
            "R_t estimation skipped: window={} len={} degenerate_kernel={}",
            smoothing_window,
            series.len(),
            kernel.is_degenerate()
        );
        return RtSeries::undefined(dates);
    }

    let incidence = centered_moving_average(series.values(), smoothing_window);
    let w = kernel.weights();
    let k_max = w.len();

    let mut points = Vec::with_capacity(incidence.len());
    let mut n_undefined = 0usize;
    for (t, &date) in dates.iter().enumerate() {
        let r_t = if t == 0 {
            None
        } else {
            let m = t.min(k_max);
            let w_tail = &w[k_max - m..];
            let denom: f64 = w_tail
                .iter()
                .enumerate()
                .map(|(j, wj)| wj * incidence[t - 1 - j])
                .sum();
            if denom <= MIN_DENOMINATOR {
                None
            } else {
                Some(incidence[t] / denom)
            }
        };
        if r_t.is_none() {
            n_undefined += 1;
        }
        points.push(RtPoint { date, r_t });
    }

    log::debug!(
        "R_t estimated for {} days ({} undefined, k_max={})",
        points.len(),
        n_undefined,
        k_max
    );
    RtSeries { points }
}
