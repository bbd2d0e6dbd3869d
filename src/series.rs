//! Daily case series and the derived per-day series returned by the analytics.
//!
//! A [`TimeSeries`] always holds strictly increasing dates with one finite,
//! non-negative value per date. Components borrow it immutably and return
//! new series.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{EpiError, Result};

/// Ordered (date, value) observations of daily counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from already-ordered columns.
    ///
    /// # Errors
    /// [`EpiError::InvalidSeries`] on a length mismatch, non-increasing or
    /// duplicate dates, and negative or non-finite values.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(EpiError::InvalidSeries(format!(
                "length mismatch: {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(EpiError::InvalidSeries(format!(
                "dates must be strictly increasing: {} followed by {}",
                w[0], w[1]
            )));
        }
        if let Some((i, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(EpiError::InvalidSeries(format!(
                "value at {} must be finite and non-negative, got {}",
                dates[i], v
            )));
        }
        Ok(Self { dates, values })
    }

    /// Build a series from unordered records, sorting by date and treating
    /// missing values as zero.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut rows: Vec<(NaiveDate, f64)> = records
            .into_iter()
            .map(|(d, v)| (d, v.unwrap_or(0.0)))
            .collect();
        rows.sort_by_key(|(d, _)| *d);
        let (dates, values) = rows.into_iter().unzip();
        Self::new(dates, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

/// One R_t estimate; `r_t` is `None` when no estimate is possible that day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RtPoint {
    pub date: NaiveDate,
    pub r_t: Option<f64>,
}

/// Per-day reproduction number estimates, one entry per input date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtSeries {
    pub points: Vec<RtPoint>,
}

impl RtSeries {
    /// A series with every entry undefined.
    pub fn undefined(dates: &[NaiveDate]) -> Self {
        Self {
            points: dates.iter().map(|&date| RtPoint { date, r_t: None }).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.r_t).collect()
    }
}

/// Centered rolling mean with edge windows shrinking instead of padding.
///
/// The window at index `t` ends at `t + window / 2`, so even widths lean one
/// day into the future. Every output averages at least one input.
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 || window == 0 {
        return values.to_vec();
    }

    // prefix[i] = sum of values[..i]
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for &v in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v);
    }

    (0..n)
        .map(|t| {
            let hi = (t + window / 2).min(n - 1);
            let lo = (t + window / 2 + 1).saturating_sub(window);
            let count = (hi + 1 - lo) as f64;
            (prefix[hi + 1] - prefix[lo]) / count
        })
        .collect()
}

/// Check a smoothing window against the series length.
pub(crate) fn validate_window(window: usize, len: usize) -> Result<()> {
    if window == 0 || window > len {
        return Err(EpiError::invalid_param(
            "smoothing_window",
            format!("must be between 1 and the series length {}, got {}", len, window),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, n).unwrap()
    }

    #[test]
    fn test_new_rejects_unsorted_dates() {
        let err = TimeSeries::new(vec![day(2), day(1)], vec![1.0, 2.0]);
        assert!(matches!(err, Err(EpiError::InvalidSeries(_))));
    }

    #[test]
    fn test_new_rejects_duplicate_dates() {
        assert!(TimeSeries::new(vec![day(1), day(1)], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_new_rejects_negative_and_nan() {
        assert!(TimeSeries::new(vec![day(1), day(2)], vec![1.0, -2.0]).is_err());
        assert!(TimeSeries::new(vec![day(1)], vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        assert!(TimeSeries::new(vec![day(1), day(2)], vec![1.0]).is_err());
    }

    #[test]
    fn test_from_records_sorts_and_fills() {
        let ts = TimeSeries::from_records(vec![
            (day(3), Some(3.0)),
            (day(1), None),
            (day(2), Some(2.0)),
        ])
        .unwrap();
        assert_eq!(ts.dates(), &[day(1), day(2), day(3)]);
        assert_eq!(ts.values(), &[0.0, 2.0, 3.0]);
        assert_eq!(ts.last_date(), Some(day(3)));
    }

    #[test]
    fn test_centered_ma_odd_window_shrinks_at_edges() {
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ma = centered_moving_average(&v, 3);
        // edges: mean(1,2)=1.5, mean(4,5)=4.5
        assert!((ma[0] - 1.5).abs() < 1e-12);
        assert!((ma[1] - 2.0).abs() < 1e-12);
        assert!((ma[2] - 3.0).abs() < 1e-12);
        assert!((ma[4] - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_centered_ma_even_window_leans_forward() {
        // window 4 at t=1 covers indices 0..=3
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ma = centered_moving_average(&v, 4);
        assert!((ma[1] - 2.5).abs() < 1e-12);
        // t=0 covers 0..=2
        assert!((ma[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_centered_ma_window_one_is_identity() {
        let v = vec![3.0, 0.0, 7.5];
        assert_eq!(centered_moving_average(&v, 1), v);
    }

    #[test]
    fn test_centered_ma_window_longer_than_series() {
        let v = vec![2.0, 4.0];
        let ma = centered_moving_average(&v, 7);
        assert!(ma.iter().all(|x| (x - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_validate_window_bounds() {
        assert!(validate_window(0, 5).is_err());
        assert!(validate_window(6, 5).is_err());
        assert!(validate_window(5, 5).is_ok());
    }

    #[test]
    fn test_rt_series_serializes_missing_as_null() {
        let rt = RtSeries {
            points: vec![RtPoint { date: day(1), r_t: None }],
        };
        let json = serde_json::to_string(&rt).unwrap();
        assert!(json.contains("\"2020-03-01\""));
        assert!(json.contains("null"));
    }
}
