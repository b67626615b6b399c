//! Constrained nonlinear minimization
//!
//! The optimization driver only needs a routine that takes an objective with
//! its gradient, a feasible starting point, box bounds and linear inequality
//! constraints, and returns a candidate with a success flag. That routine is
//! the [`NonlinearSolver`] trait; [`ProjectedGradientSolver`] is the built-in
//! implementation.

use super::constraints::{Bounds, LinearConstraints};
use crate::config::SolverConfig;
use nalgebra::DVector;
use std::time::{Duration, Instant};

/// Objective returning value and gradient at a point
pub type Objective<'a> = dyn FnMut(&DVector<f64>) -> (f64, DVector<f64>) + 'a;

/// Result of a solver run
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub x: DVector<f64>,
    pub success: bool,
    pub message: String,
    pub iterations: usize,
    pub elapsed: Duration,
}

/// Black-box constrained minimizer
pub trait NonlinearSolver {
    fn minimize(
        &self,
        objective: &mut Objective,
        x0: &DVector<f64>,
        bounds: &Bounds,
        constraints: &LinearConstraints,
    ) -> SolverOutcome;
}

/// Armijo sufficient-decrease constant
const ARMIJO: f64 = 1e-4;
const PROJECTION_SWEEPS: usize = 1000;
/// Accuracy of the projection; step and gradient tolerances never go below it
const PROJECTION_TOLERANCE: f64 = 1e-14;
/// Relative objective decrease below which an accepted step ends the search
const OBJECTIVE_RTOL: f64 = 1e-12;

/// Gradient projection along the projection arc
///
/// Every trial point is `P(x - t·∇f(x))`, the Euclidean projection of a
/// gradient step onto the feasible polyhedron, computed with Dykstra's
/// alternating projections over the constraint rows and the box. Steps are
/// accepted on strict, sufficient decrease; an accepted step doubles the step
/// length for the next iteration (capped by `max_step`), a rejected one halves
/// it. Step and gradient tolerances are floored at the projection accuracy,
/// and a step that no longer changes the objective ends the search.
#[derive(Debug, Clone, Default)]
pub struct ProjectedGradientSolver {
    config: SolverConfig,
}

impl ProjectedGradientSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl NonlinearSolver for ProjectedGradientSolver {
    fn minimize(
        &self,
        objective: &mut Objective,
        x0: &DVector<f64>,
        bounds: &Bounds,
        constraints: &LinearConstraints,
    ) -> SolverOutcome {
        let start = Instant::now();
        let cfg = &self.config;
        let deadline = cfg.time_limit().map(|limit| start + limit);
        let projector = Projector::new(bounds, constraints);
        let feasible = |x: &DVector<f64>| {
            bounds.max_violation(x) <= cfg.feasibility_tolerance
                && constraints.max_violation(x) <= cfg.feasibility_tolerance
        };

        let xtol = cfg.xtol.max(PROJECTION_TOLERANCE);
        let mut x = x0.clone();
        let (mut fx, mut gx) = objective(&x);
        let mut step = cfg.initial_step;

        let finish = |x: DVector<f64>, success: bool, message: String, iterations: usize| SolverOutcome {
            x,
            success,
            message,
            iterations,
            elapsed: start.elapsed(),
        };

        if !fx.is_finite() {
            return finish(x, false, "objective is not finite at the initial point".into(), 0);
        }

        for iteration in 1..=cfg.max_iterations {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return finish(x, false, "time limit reached".into(), iteration - 1);
            }

            // stationarity: the unit-step projected gradient vanishes
            let unit_step = projector.project(&(&x - &gx));
            let gtol = cfg.gtol.max(PROJECTION_TOLERANCE * (1.0 + x.norm()));
            if (&unit_step - &x).norm() <= gtol {
                return finish(
                    x,
                    true,
                    "projected gradient below tolerance".into(),
                    iteration - 1,
                );
            }

            let mut accepted = None;
            for _ in 0..=cfg.max_backtracks {
                let trial = projector.project(&(&x - &gx * step));
                let moved = &trial - &x;
                if moved.norm() <= xtol * (1.0 + x.norm()) {
                    break;
                }
                if feasible(&trial) {
                    let (ft, gt) = objective(&trial);
                    if ft.is_finite() && ft < fx && ft <= fx + ARMIJO * gx.dot(&moved) {
                        accepted = Some((trial, ft, gt, moved.norm()));
                        break;
                    }
                }
                step *= 0.5;
            }

            let Some((trial, ft, gt, moved)) = accepted else {
                return finish(x, true, "no further descent along the projection arc".into(), iteration);
            };

            log::debug!(
                "iteration {}: objective {:.6e} -> {:.6e}, step {:.3e}",
                iteration,
                fx,
                ft,
                step
            );
            let stalled = fx - ft <= OBJECTIVE_RTOL * fx.abs().max(1.0);
            x = trial;
            fx = ft;
            gx = gt;
            step = (step * 2.0).min(cfg.max_step);

            if moved <= xtol * (1.0 + x.norm()) {
                return finish(x, true, "step below tolerance".into(), iteration);
            }
            if stalled {
                return finish(x, true, "objective change below tolerance".into(), iteration);
            }
        }

        finish(
            x,
            false,
            format!("iteration limit ({}) reached", cfg.max_iterations),
            cfg.max_iterations,
        )
    }
}

/// Euclidean projection onto `{x : lower <= A·x <= upper, box}`
struct Projector<'a> {
    bounds: &'a Bounds,
    constraints: &'a LinearConstraints,
    /// Nonzero `(column, coefficient)` pairs per row
    rows: Vec<Vec<(usize, f64)>>,
    norms: Vec<f64>,
}

impl<'a> Projector<'a> {
    fn new(bounds: &'a Bounds, constraints: &'a LinearConstraints) -> Self {
        let matrix = &constraints.matrix;
        let rows: Vec<Vec<(usize, f64)>> = (0..matrix.nrows())
            .map(|r| {
                (0..matrix.ncols())
                    .filter(|&c| matrix[(r, c)] != 0.0)
                    .map(|c| (c, matrix[(r, c)]))
                    .collect()
            })
            .collect();
        let norms = rows
            .iter()
            .map(|row| row.iter().map(|(_, a)| a * a).sum())
            .collect();
        Self {
            bounds,
            constraints,
            rows,
            norms,
        }
    }

    /// Dykstra's algorithm; the correction of a row is a multiple of the row
    fn project(&self, point: &DVector<f64>) -> DVector<f64> {
        let mut y = point.clone();
        if self.rows.is_empty() {
            self.bounds.project(&mut y);
            return y;
        }

        let mut row_corrections = vec![0.0; self.rows.len()];
        let mut box_correction = DVector::<f64>::zeros(y.len());

        for _ in 0..PROJECTION_SWEEPS {
            let mut change = 0.0_f64;

            for (r, row) in self.rows.iter().enumerate() {
                let norm = self.norms[r];
                if norm == 0.0 {
                    continue;
                }
                // z = y + c·a, then project z onto the slab
                let c = row_corrections[r];
                let az: f64 = row.iter().map(|&(j, a)| a * (y[j] + c * a)).sum();
                let target = az.clamp(self.constraints.lower[r], self.constraints.upper[r]);
                let shift = (target - az) / norm;
                // y_new = z + shift·a; new correction is z - y_new = -shift·a
                let delta = c + shift;
                for &(j, a) in row {
                    y[j] += delta * a;
                }
                row_corrections[r] = -shift;
                change = change.max(delta.abs());
            }

            let z = &y + &box_correction;
            let mut clamped = z.clone();
            self.bounds.project(&mut clamped);
            change = change.max((&clamped - &y).amax());
            box_correction = &z - &clamped;
            y = clamped;

            if change <= PROJECTION_TOLERANCE * (1.0 + y.amax()) {
                break;
            }
        }
        y
    }
}
