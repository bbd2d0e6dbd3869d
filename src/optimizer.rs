//! Maximum likelihood fit of one SARIMA candidate.
//!
//! The optimiser works on unconstrained parameters (see
//! [`transform_params`]); the objective is the negative concentrated
//! log-likelihood from the Kalman filter. L-BFGS with a More-Thuente line
//! search runs first on a central-difference gradient. If it errors out,
//! Nelder-Mead restarts from the same point.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;

use crate::error::{EpiError, Result};
use crate::initialization::{KalmanInit, DIFFUSE_KAPPA};
use crate::kalman::kalman_loglike;
use crate::params::{transform_params, untransform_params, SarimaParams};
use crate::start_params::compute_start_params;
use crate::state_space::StateSpace;
use crate::types::{FitResult, SarimaxConfig};

/// Cost assigned where the likelihood cannot be evaluated. Finite so that
/// finite differences across the boundary stay finite.
const INVALID_COST: f64 = 1e10;

const LBFGS_MEMORY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMethod {
    /// L-BFGS, falling back to Nelder-Mead if the solver errors.
    Lbfgs,
    NelderMead,
}

impl FitMethod {
    fn name(&self) -> &'static str {
        match self {
            FitMethod::Lbfgs => "lbfgs",
            FitMethod::NelderMead => "nelder-mead",
        }
    }
}

/// Evaluate the concentrated log-likelihood and scale at constrained params.
pub fn loglike_at(endog: &[f64], config: &SarimaxConfig, constrained: &[f64]) -> Result<(f64, f64)> {
    let params = SarimaParams::from_flat(constrained, config)?;
    let ss = StateSpace::new(config, &params)?;
    let init = KalmanInit::from_config(&ss, config, DIFFUSE_KAPPA);
    let (ll, scale) = kalman_loglike(endog, &ss, &init)?;
    if !ll.is_finite() {
        return Err(EpiError::OptimizationFailed("non-finite log-likelihood".into()));
    }
    Ok((ll, scale))
}

#[derive(Clone)]
struct NegLogLike {
    endog: Vec<f64>,
    config: SarimaxConfig,
}

impl NegLogLike {
    fn eval(&self, unconstrained: &[f64]) -> f64 {
        transform_params(unconstrained, &self.config)
            .and_then(|c| loglike_at(&self.endog, &self.config, &c))
            .map(|(ll, _)| -ll)
            .unwrap_or(INVALID_COST)
    }
}

impl CostFunction for NegLogLike {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Vec<f64>) -> std::result::Result<f64, argmin::core::Error> {
        Ok(self.eval(param))
    }
}

impl Gradient for NegLogLike {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// Central differences, step `eps^(1/3) * max(1, |x_i|)`.
    fn gradient(&self, param: &Vec<f64>) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        let base_step = f64::EPSILON.cbrt();
        let mut work = param.clone();
        let mut grad = vec![0.0; param.len()];
        for i in 0..param.len() {
            let x = param[i];
            let h = base_step * x.abs().max(1.0);
            work[i] = x + h;
            let f_plus = self.eval(&work);
            work[i] = x - h;
            let f_minus = self.eval(&work);
            work[i] = x;
            let g = (f_plus - f_minus) / (2.0 * h);
            grad[i] = if g.is_finite() { g } else { 0.0 };
        }
        Ok(grad)
    }
}

struct SolverOutcome {
    params: Vec<f64>,
    n_iter: u64,
    converged: bool,
}

fn terminated_cleanly(reason: Option<&TerminationReason>) -> bool {
    matches!(
        reason,
        Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached)
    )
}

fn run_lbfgs(objective: NegLogLike, start: Vec<f64>, maxiter: u64) -> std::result::Result<SolverOutcome, String> {
    let solver = LBFGS::new(MoreThuenteLineSearch::new(), LBFGS_MEMORY)
        .with_tolerance_grad(1e-5)
        .map_err(|e| e.to_string())?
        .with_tolerance_cost(1e-9)
        .map_err(|e| e.to_string())?;

    let result = Executor::new(objective, solver)
        .configure(|state: argmin::core::IterState<Vec<f64>, Vec<f64>, (), (), (), f64>| {
            state.param(start).max_iters(maxiter)
        })
        .run()
        .map_err(|e| format!("L-BFGS failed: {}", e))?;

    let state = result.state();
    let params = state
        .get_best_param()
        .ok_or("L-BFGS: no best parameter")?
        .clone();
    Ok(SolverOutcome {
        params,
        n_iter: state.get_iter(),
        converged: terminated_cleanly(state.get_termination_reason()),
    })
}

fn run_nelder_mead(objective: NegLogLike, start: Vec<f64>, maxiter: u64) -> std::result::Result<SolverOutcome, String> {
    let mut simplex = vec![start.clone()];
    for i in 0..start.len() {
        let mut vertex = start.clone();
        vertex[i] += if vertex[i].abs() > 1e-8 { 0.05 * vertex[i] } else { 0.00025 };
        simplex.push(vertex);
    }
    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(1e-6)
        .map_err(|e| e.to_string())?;

    let result = Executor::new(objective, solver)
        .configure(|state: argmin::core::IterState<Vec<f64>, (), (), (), (), f64>| state.max_iters(maxiter))
        .run()
        .map_err(|e| format!("Nelder-Mead failed: {}", e))?;

    let state = result.state();
    let params = state
        .get_best_param()
        .ok_or("Nelder-Mead: no best parameter")?
        .clone();
    Ok(SolverOutcome {
        params,
        n_iter: state.get_iter(),
        converged: terminated_cleanly(state.get_termination_reason()),
    })
}

/// Fit one candidate by maximum likelihood.
///
/// # Errors
/// `DataError` when the series is too short for the order, and
/// `OptimizationFailed` when no solver produces a finite likelihood.
pub fn fit(endog: &[f64], config: &SarimaxConfig, method: FitMethod, maxiter: u64) -> Result<FitResult> {
    let min_obs = config.min_obs();
    if endog.len() <= min_obs {
        return Err(EpiError::DataError(format!(
            "not enough observations for {}: n={} <= {}",
            config.order,
            endog.len(),
            min_obs
        )));
    }

    let constrained_start = compute_start_params(endog, config);
    let n_params = config.n_estimated_params();
    let finish = |constrained: Vec<f64>, n_iter: u64, converged: bool, method: String| -> Result<FitResult> {
        let (loglike, scale) = loglike_at(endog, config, &constrained)?;
        Ok(FitResult {
            params: constrained,
            loglike,
            scale,
            n_obs: endog.len(),
            n_params,
            n_iter,
            converged,
            method,
            aic: 0.0,
            bic: 0.0,
        }
        .with_information_criteria())
    };

    if maxiter == 0 || config.n_free_params() == 0 {
        // nothing to optimise; a parameter-free model is trivially at its optimum
        let converged = config.n_free_params() == 0;
        return finish(constrained_start, 0, converged, method.name().to_string());
    }

    let start = untransform_params(&constrained_start, config)?;
    let objective = NegLogLike {
        endog: endog.to_vec(),
        config: config.clone(),
    };

    let (outcome, used) = match method {
        FitMethod::NelderMead => (
            run_nelder_mead(objective, start, maxiter).map_err(EpiError::OptimizationFailed)?,
            "nelder-mead".to_string(),
        ),
        FitMethod::Lbfgs => match run_lbfgs(objective.clone(), start.clone(), maxiter) {
            Ok(o) => (o, "lbfgs".to_string()),
            Err(e) => {
                log::trace!("{}: {}; retrying with Nelder-Mead", config.order, e);
                (
                    run_nelder_mead(objective, start, maxiter).map_err(EpiError::OptimizationFailed)?,
                    "nelder-mead (fallback)".to_string(),
                )
            }
        },
    };

    let constrained = transform_params(&outcome.params, config)?;
    finish(constrained, outcome.n_iter, outcome.converged, used)
}
