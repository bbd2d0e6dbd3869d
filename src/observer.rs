//! Extension points for the forecaster's model search.

use crate::types::SarimaxOrder;

/// Outcome of fitting one grid candidate.
#[derive(Debug, Clone)]
pub struct CandidateReport {
    /// Position in enumeration order.
    pub index: usize,
    pub order: SarimaxOrder,
    /// `Ok(aic)` for a converged fit, `Err(message)` when it was discarded.
    pub outcome: std::result::Result<f64, String>,
}

impl CandidateReport {
    pub fn converged(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct FallbackReport {
    pub reason: String,
    pub candidates_tried: usize,
}

/// Hooks invoked on the calling thread, in enumeration order, after the
/// candidate fits complete.
pub trait SearchObserver: Send + Sync {
    fn on_candidate(&self, _report: &CandidateReport) {}
    fn on_fallback(&self, _report: &FallbackReport) {}
}

/// Forwards search events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SearchObserver for LogObserver {
    fn on_candidate(&self, report: &CandidateReport) {
        match &report.outcome {
            Ok(aic) => log::debug!("candidate #{} {}: aic={:.4}", report.index, report.order, aic),
            Err(msg) => log::trace!("candidate #{} {} discarded: {}", report.index, report.order, msg),
        }
    }

    fn on_fallback(&self, report: &FallbackReport) {
        log::warn!(
            "no SARIMA candidate converged ({} tried): {}; using linear trend",
            report.candidates_tried,
            report.reason
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}
