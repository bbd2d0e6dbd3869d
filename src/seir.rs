//! Deterministic SEIR compartmental projection.
//!
//! ```text
//! dS/dt = -beta S I / N
//! dE/dt =  beta S I / N - sigma E
//! dI/dt =  sigma E - gamma I
//! dR/dt =  gamma I
//! ```
//!
//! The right-hand side sums to zero, so `S + E + I + R = N` is conserved by
//! the integrator up to round-off.

use chrono::{Days, Local, NaiveDate};
use nalgebra::Vector4;
use serde::Serialize;

use crate::config::SeirConfig;
use crate::error::{EpiError, Result};

/// Population size, initial compartments and rate constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeirParams {
    pub population: f64,
    pub exposed0: f64,
    pub infectious0: f64,
    pub removed0: f64,
    /// Transmission rate per day.
    pub beta: f64,
    /// Incubation rate (1 / latent period).
    pub sigma: f64,
    /// Removal rate (1 / infectious period).
    pub gamma: f64,
}

impl SeirParams {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("population", self.population),
            ("exposed0", self.exposed0),
            ("infectious0", self.infectious0),
            ("removed0", self.removed0),
            ("beta", self.beta),
            ("sigma", self.sigma),
            ("gamma", self.gamma),
        ];
        for (name, v) in finite {
            if !v.is_finite() {
                return Err(EpiError::invalid_param(name, format!("must be finite, got {}", v)));
            }
        }
        if self.population <= 0.0 {
            return Err(EpiError::invalid_param("population", "must be positive"));
        }
        for (name, v) in [
            ("exposed0", self.exposed0),
            ("infectious0", self.infectious0),
            ("removed0", self.removed0),
        ] {
            if v < 0.0 {
                return Err(EpiError::invalid_param(name, format!("must be non-negative, got {}", v)));
            }
        }
        if self.susceptible0() < 0.0 {
            return Err(EpiError::invalid_param(
                "population",
                format!(
                    "implied S0 = {} - {} - {} - {} is negative",
                    self.population, self.exposed0, self.infectious0, self.removed0
                ),
            ));
        }
        if self.beta < 0.0 {
            return Err(EpiError::invalid_param("beta", "must be non-negative"));
        }
        if self.sigma <= 0.0 {
            return Err(EpiError::invalid_param("sigma", "must be positive"));
        }
        if self.gamma <= 0.0 {
            return Err(EpiError::invalid_param("gamma", "must be positive"));
        }
        Ok(())
    }

    pub fn susceptible0(&self) -> f64 {
        self.population - self.exposed0 - self.infectious0 - self.removed0
    }

    fn initial_state(&self) -> Vector4<f64> {
        Vector4::new(self.susceptible0(), self.exposed0, self.infectious0, self.removed0)
    }

    fn derivatives(&self, y: &Vector4<f64>) -> Vector4<f64> {
        let (s, e, i) = (y[0], y[1], y[2]);
        let infection = self.beta * s * i / self.population;
        let onset = self.sigma * e;
        let removal = self.gamma * i;
        Vector4::new(-infection, infection - onset, onset - removal, removal)
    }
}

/// Daily SEIR state trajectory over `days + 1` points.
#[derive(Debug, Clone, Serialize)]
pub struct SeirTrajectory {
    pub population: f64,
    /// Anchor date of day 0.
    pub start: NaiveDate,
    /// Day offsets `0..=days`.
    pub t: Vec<usize>,
    /// Display dates, `start + t`.
    pub dates: Vec<NaiveDate>,
    pub s: Vec<f64>,
    pub e: Vec<f64>,
    pub i: Vec<f64>,
    pub r: Vec<f64>,
    /// `max(0, I[t] - I[t-1])`, 0 on day 0.
    pub new_cases_proxy: Vec<f64>,
    #[serde(skip)]
    beta: f64,
    #[serde(skip)]
    gamma: f64,
}

impl SeirTrajectory {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// beta / gamma.
    pub fn basic_reproduction_number(&self) -> f64 {
        self.beta / self.gamma
    }

    /// Day and size of the largest infectious compartment.
    pub fn peak_infectious(&self) -> (usize, f64) {
        self.i
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (day, v)| if v > best.1 { (day, v) } else { best })
    }

    /// Fraction of the population removed by the last day.
    pub fn attack_rate(&self) -> f64 {
        self.r.last().map_or(0.0, |r| r / self.population)
    }
}

#[derive(Debug, Clone)]
pub struct SeirSimulator {
    substeps_per_day: usize,
}

impl Default for SeirSimulator {
    fn default() -> Self {
        Self::from_config(&SeirConfig::default())
    }
}

impl SeirSimulator {
    pub fn from_config(config: &SeirConfig) -> Self {
        Self {
            substeps_per_day: config.substeps_per_day.max(1),
        }
    }

    /// Integrate the SEIR system for `days` days, anchoring display dates at
    /// `start`.
    pub fn simulate(&self, params: &SeirParams, days: usize, start: NaiveDate) -> Result<SeirTrajectory> {
        params.validate()?;

        let n_points = days
            .checked_add(1)
            .ok_or_else(|| EpiError::invalid_param("days", format!("too many days: {}", days)))?;
        let dates = (0..n_points as u64)
            .map(|d| {
                start.checked_add_days(Days::new(d)).ok_or_else(|| {
                    EpiError::invalid_param("days", format!("{} days after {} is out of the calendar range", d, start))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let dt = 1.0 / self.substeps_per_day as f64;
        let mut y = params.initial_state();

        let mut traj = SeirTrajectory {
            population: params.population,
            start,
            t: (0..n_points).collect(),
            dates,
            s: Vec::with_capacity(n_points),
            e: Vec::with_capacity(n_points),
            i: Vec::with_capacity(n_points),
            r: Vec::with_capacity(n_points),
            new_cases_proxy: Vec::with_capacity(n_points),
            beta: params.beta,
            gamma: params.gamma,
        };

        let mut n_clipped = 0usize;
        for day in 0..n_points {
            if day > 0 {
                for _ in 0..self.substeps_per_day {
                    y = rk4_step(params, &y, dt);
                    // RK4 stages can dip below zero when a compartment is nearly empty.
                    for v in y.iter_mut() {
                        if *v < 0.0 {
                            *v = 0.0;
                            n_clipped += 1;
                        }
                    }
                }
            }
            traj.s.push(y[0]);
            traj.e.push(y[1]);
            traj.i.push(y[2]);
            traj.r.push(y[3]);
            let proxy = if day == 0 {
                0.0
            } else {
                (y[2] - traj.i[day - 1]).max(0.0)
            };
            traj.new_cases_proxy.push(proxy);
        }

        if n_clipped > 0 {
            log::debug!("SEIR: clipped {} negative round-off values", n_clipped);
        }
        log::debug!(
            "SEIR simulated {} days (R0={:.3}, peak I={:.1})",
            days,
            traj.basic_reproduction_number(),
            traj.peak_infectious().1
        );
        Ok(traj)
    }

    /// [`simulate`](Self::simulate) anchored at the local calendar date.
    pub fn simulate_from_today(&self, params: &SeirParams, days: usize) -> Result<SeirTrajectory> {
        self.simulate(params, days, Local::now().date_naive())
    }
}

fn rk4_step(params: &SeirParams, y: &Vector4<f64>, dt: f64) -> Vector4<f64> {
    let k1 = params.derivatives(y);
    let k2 = params.derivatives(&(y + k1 * (0.5 * dt)));
    let k3 = params.derivatives(&(y + k2 * (0.5 * dt)));
    let k4 = params.derivatives(&(y + k3 * dt));
    y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}
