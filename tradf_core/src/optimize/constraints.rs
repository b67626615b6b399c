//! Linear constraints and box bounds of the start-time problem
//!
//! Rows come in a fixed order: forward edges, then backedges, then latency
//! pairs. Every row has `-1` in the producer's column and `+1` in the
//! consumer's.
//!
//! | row            | constraint                          |
//! |----------------|-------------------------------------|
//! | forward `u→v`  | `Ts(v) - Ts(u) >= WCET(u)`          |
//! | backedge `u→v` | `Ts(v) - Ts(u) >= WCET(u) - period` |
//! | latency `(u,v)`| `Ts(v) - Ts(u) <= L - WCET(v)`      |

use crate::graph::TradfGraph;
use crate::scheduling::LatencyMap;
use nalgebra::{DMatrix, DVector};

/// Per-dimension box `lower <= x <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Bounds {
    /// `0 <= x < inf`
    pub fn non_negative(dim: usize) -> Self {
        Self {
            lower: DVector::zeros(dim),
            upper: DVector::from_element(dim, f64::INFINITY),
        }
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Clamp `x` into the box
    pub fn project(&self, x: &mut DVector<f64>) {
        for i in 0..x.len() {
            x[i] = x[i].clamp(self.lower[i], self.upper[i]);
        }
    }

    pub fn max_violation(&self, x: &DVector<f64>) -> f64 {
        (0..x.len())
            .map(|i| (self.lower[i] - x[i]).max(x[i] - self.upper[i]).max(0.0))
            .fold(0.0, f64::max)
    }
}

/// `lower <= A·x <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraints {
    pub matrix: DMatrix<f64>,
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl LinearConstraints {
    /// Precedence, backedge and latency rows for a period and latency bounds
    pub fn assemble(graph: &TradfGraph, period: f64, latencies: &LatencyMap) -> Self {
        let forward = graph.forward_pairs();
        let backward = graph.backward_pairs();
        let rows = forward.len() + backward.len() + latencies.len();
        let n = graph.actor_count();

        let mut matrix = DMatrix::zeros(rows, n);
        let mut lower = DVector::from_element(rows, f64::NEG_INFINITY);
        let mut upper = DVector::from_element(rows, f64::INFINITY);

        let mut row = 0;
        for &(u, v) in &forward {
            matrix[(row, u)] = -1.0;
            matrix[(row, v)] = 1.0;
            lower[row] = graph.wcet(u);
            row += 1;
        }
        for &(u, v) in &backward {
            matrix[(row, u)] = -1.0;
            matrix[(row, v)] = 1.0;
            lower[row] = graph.wcet(u) - period;
            row += 1;
        }
        for (&(u, v), &bound) in latencies {
            matrix[(row, u)] = -1.0;
            matrix[(row, v)] = 1.0;
            upper[row] = bound - graph.wcet(v);
            row += 1;
        }

        Self {
            matrix,
            lower,
            upper,
        }
    }

    pub fn row_count(&self) -> usize {
        self.matrix.nrows()
    }

    /// Largest amount by which `x` leaves any row's interval
    pub fn max_violation(&self, x: &DVector<f64>) -> f64 {
        let ax = &self.matrix * x;
        (0..ax.len())
            .map(|i| (self.lower[i] - ax[i]).max(ax[i] - self.upper[i]).max(0.0))
            .fold(0.0, f64::max)
    }

    pub fn is_satisfied(&self, x: &DVector<f64>, tolerance: f64) -> bool {
        self.max_violation(x) <= tolerance
    }
}
