use super::constraints::{Bounds, LinearConstraints};
use super::session::{Session, SessionMode, SessionState};
use super::solver::{NonlinearSolver, ProjectedGradientSolver};
use crate::artifact::ScheduledGraph;
use crate::config::SchedulerConfig;
use crate::error::{TradfError, TradfResult};
use crate::graph::analysis::path_to_channels;
use crate::graph::{ChannelKey, TradfGraph};
use crate::quality::{snr_db, QualityEngine};
use crate::scheduling::allocation::tighten;
use crate::scheduling::{
    reference_constraints, schedule_graph, verify_constraints, BudgetAllocator, Constraints,
    LatencyBudget, LatencyMap, RandomAllocator, Relation, UniformAllocator,
};
use crate::stats::{EvaluationProfiler, EvaluationStats, GraphStats};
use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Why the optimized schedule was replaced by the baseline
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The solver reported failure
    SolverFailed(String),
    /// The candidate is not strictly better than the baseline
    NotImproved { baseline: f64, candidate: f64 },
    /// The candidate leaves the feasible region
    Infeasible(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::SolverFailed(msg) => write!(f, "optimization failed ({})", msg),
            FallbackReason::NotImproved { baseline, candidate } => write!(
                f,
                "optimization failed to find a better solution ({:.3} <= {:.3})",
                baseline, candidate
            ),
            FallbackReason::Infeasible(msg) => write!(f, "optimized schedule is infeasible ({})", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Optimized,
    Fallback(FallbackReason),
}

impl Outcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback(_))
    }
}

/// Result of an optimizing run
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub constraints: Constraints,
    /// Baseline start times, indexed by actor
    pub baseline: Vec<f64>,
    /// Final start times (the baseline after a fallback)
    pub optimized: Vec<f64>,
    pub baseline_value: f64,
    pub optimized_value: f64,
    pub baseline_snr_db: f64,
    pub optimized_snr_db: f64,
    pub outcome: Outcome,
    pub solver_message: String,
    pub iterations: usize,
    pub execution_time: Duration,
    pub evaluations: EvaluationStats,
    pub graph_stats: GraphStats,
    pub baseline_graph: ScheduledGraph,
    pub optimized_graph: ScheduledGraph,
    pub history: Vec<SessionState>,
}

impl OptimizationReport {
    /// SNR improvement of the optimized schedule in percent of the baseline
    pub fn delta_snr_percent(&self) -> f64 {
        percent_change(self.baseline_snr_db, self.optimized_snr_db)
    }

    pub fn final_state(&self) -> SessionState {
        self.history
            .last()
            .copied()
            .unwrap_or(SessionState::Loaded)
    }
}

/// Result of a random or manual run
#[derive(Debug, Clone)]
pub struct BaselineReport {
    pub rho: Option<f64>,
    pub period: f64,
    pub start_times: Vec<f64>,
    pub value: f64,
    pub snr_db: f64,
    pub graph_stats: GraphStats,
    pub graph: ScheduledGraph,
    pub history: Vec<SessionState>,
}

impl BaselineReport {
    pub fn final_state(&self) -> SessionState {
        self.history
            .last()
            .copied()
            .unwrap_or(SessionState::Loaded)
    }
}

/// One point of a rho sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepEntry {
    pub rho: f64,
    pub delta_snr_percent: f64,
    pub execution_time: Duration,
    pub fallback: bool,
}

/// `100 · (new - reference) / |reference|`
pub fn percent_change(reference: f64, new: f64) -> f64 {
    100.0 * (new - reference) / reference.abs()
}

/// Optimization driver over one graph
///
/// Derives constraints from a ratio, builds a feasible baseline, hands it to
/// the solver together with the quality engine, and reconciles the result.
pub struct Scheduler {
    graph: TradfGraph,
    config: SchedulerConfig,
    graph_stats: GraphStats,
    solver: Box<dyn NonlinearSolver>,
}

impl Scheduler {
    pub fn new(graph: TradfGraph, config: SchedulerConfig) -> TradfResult<Self> {
        config.validate()?;
        let graph_stats = GraphStats::collect(&graph);
        let solver = Box::new(ProjectedGradientSolver::new(config.solver.clone()));
        Ok(Self {
            graph,
            config,
            graph_stats,
            solver,
        })
    }

    /// Load the graph and network descriptions from disk
    pub fn load(graph_path: &Path, network_path: &Path, config: SchedulerConfig) -> TradfResult<Self> {
        Self::new(TradfGraph::load(graph_path, network_path)?, config)
    }

    /// Replace the built-in solver
    pub fn with_solver(mut self, solver: Box<dyn NonlinearSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn graph(&self) -> &TradfGraph {
        &self.graph
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn graph_stats(&self) -> &GraphStats {
        &self.graph_stats
    }

    pub fn engine(&self) -> QualityEngine<'_> {
        QualityEngine::new(&self.graph, &self.config.quality)
    }

    /// Interpolate period and latency bounds between the low and high
    /// reference percentiles
    pub fn derive_constraints(&self, rho: f64) -> TradfResult<Constraints> {
        if !(0.0..=1.0).contains(&rho) {
            return Err(TradfError::RhoOutOfRange(rho));
        }
        let min = reference_constraints(&self.graph, self.config.reference.low_percentile)?;
        let max = reference_constraints(&self.graph, self.config.reference.high_percentile)?;
        log::debug!("reference period: {:.3} .. {:.3}", min.period, max.period);

        let scale = |lo: f64, hi: f64| lo + rho * (hi - lo);
        let latencies: LatencyMap = min
            .latencies
            .iter()
            .map(|(&pair, &lo)| {
                let hi = max.latencies.get(&pair).copied().unwrap_or(lo);
                (pair, scale(lo, hi))
            })
            .collect();
        let constraints = Constraints {
            period: scale(min.period, max.period),
            latencies,
        };
        log::debug!(
            "rho {}: period constraint {:.3}, {} latency constraints",
            rho,
            constraints.period,
            constraints.latencies.len()
        );
        Ok(constraints)
    }

    /// Feasible start times for the constraints under an allocation policy
    ///
    /// Backedges get the period as budget; the slack of every simple path
    /// between a constrained pair is split over its channels and each channel
    /// keeps the smallest share.
    pub fn build_schedule(
        &self,
        constraints: &Constraints,
        allocator: &mut dyn BudgetAllocator,
    ) -> TradfResult<Vec<f64>> {
        let graph = &self.graph;
        let mut budgets: HashMap<ChannelKey, f64> = graph
            .backward_pairs()
            .into_iter()
            .map(|pair| (pair, constraints.period))
            .collect();

        for (&(source, sink), &bound) in &constraints.latencies {
            for path in graph.structure().simple_paths(source, sink) {
                let slack = bound - graph.path_wcet(path);
                if !(slack > 0.0) {
                    return Err(TradfError::NonPositiveSlack {
                        source_actor: graph.actor_name(source).to_string(),
                        sink: graph.actor_name(sink).to_string(),
                        slack,
                    });
                }
                let channels = path_to_channels(path);
                let shares = allocator.allocate(slack, channels.len());
                tighten(&mut budgets, &channels, &shares);
            }
        }

        let start_times = schedule_graph(graph, Relation::LessThan, &LatencyBudget::PerChannel(&budgets));
        verify_constraints(
            graph,
            &start_times.current,
            constraints.period,
            Some(&constraints.latencies),
            &self.config.validation,
        )?;
        Ok(start_times.current)
    }

    pub fn optimize_by_rho(&self, rho: f64) -> TradfResult<OptimizationReport> {
        let mut session = Session::start(SessionMode::Optimize);
        let constraints = self.derive_constraints(rho)?;
        session.advance(SessionState::ConstraintsDerived)?;
        self.run_optimization(session, constraints)
    }

    /// Optimize under explicit period and latency bounds
    pub fn optimize(&self, constraints: &Constraints) -> TradfResult<OptimizationReport> {
        let mut session = Session::start(SessionMode::Optimize);
        session.advance(SessionState::ConstraintsDerived)?;
        self.run_optimization(session, constraints.clone())
    }

    fn run_optimization(&self, mut session: Session, constraints: Constraints) -> TradfResult<OptimizationReport> {
        let graph = &self.graph;
        let engine = self.engine();
        let period = constraints.period;

        let baseline = self.build_schedule(&constraints, &mut UniformAllocator)?;
        session.advance(SessionState::BaselineBuilt)?;

        let lc = LinearConstraints::assemble(graph, period, &constraints.latencies);
        let bounds = Bounds::non_negative(graph.actor_count());
        let x0 = DVector::from_column_slice(&baseline);

        let mut profiler = EvaluationProfiler::new();
        let mut state = engine.state();
        let outcome = {
            let mut objective = |x: &DVector<f64>| {
                let evaluation = profiler.time(|| engine.evaluate(x.as_slice(), period, &mut state));
                (evaluation.value, evaluation.gradient)
            };
            self.solver.minimize(&mut objective, &x0, &bounds, &lc)
        };

        let y0 = engine.evaluate(&baseline, period, &mut state).value;
        let candidate: Vec<f64> = outcome.x.iter().copied().collect();
        let y1 = engine.evaluate(&candidate, period, &mut state).value;

        let tolerance = self.config.solver.feasibility_tolerance;
        let result = if !outcome.success {
            Outcome::Fallback(FallbackReason::SolverFailed(outcome.message.clone()))
        } else if bounds.max_violation(&outcome.x) > tolerance || !lc.is_satisfied(&outcome.x, tolerance) {
            Outcome::Fallback(FallbackReason::Infeasible(format!(
                "largest violation {:.3e}",
                bounds.max_violation(&outcome.x).max(lc.max_violation(&outcome.x))
            )))
        } else if let Err(err) = verify_constraints(
            graph,
            &candidate,
            period,
            Some(&constraints.latencies),
            &self.config.validation,
        ) {
            Outcome::Fallback(FallbackReason::Infeasible(err.to_string()))
        } else if !(y1 < y0) {
            Outcome::Fallback(FallbackReason::NotImproved {
                baseline: y0,
                candidate: y1,
            })
        } else {
            Outcome::Optimized
        };

        let (optimized, y1) = match &result {
            Outcome::Optimized => {
                session.advance(SessionState::Optimized)?;
                (candidate, y1)
            }
            Outcome::Fallback(reason) => {
                match reason {
                    FallbackReason::SolverFailed(_) => log::warn!("{}", reason),
                    _ => log::info!("{}", reason),
                }
                session.advance(SessionState::OptimizationFallback)?;
                (baseline.clone(), y0)
            }
        };

        verify_constraints(
            graph,
            &optimized,
            period,
            Some(&constraints.latencies),
            &self.config.validation,
        )?;
        session.advance(SessionState::Validated)?;

        let snr0 = snr_db(y0);
        let snr1 = snr_db(y1);
        log::info!(
            "estimated SNR {:.3} dB -> {:.3} dB after {} iterations ({:.3}s)",
            snr0,
            snr1,
            outcome.iterations,
            outcome.elapsed.as_secs_f64()
        );

        let epsilon = self.config.buffer_epsilon;
        Ok(OptimizationReport {
            baseline_graph: ScheduledGraph::build(&engine, &baseline, period, snr0, epsilon),
            optimized_graph: ScheduledGraph::build(&engine, &optimized, period, snr1, epsilon),
            constraints,
            baseline,
            optimized,
            baseline_value: y0,
            optimized_value: y1,
            baseline_snr_db: snr0,
            optimized_snr_db: snr1,
            outcome: result,
            solver_message: outcome.message,
            iterations: outcome.iterations,
            execution_time: outcome.elapsed,
            evaluations: profiler.into_stats(),
            graph_stats: self.graph_stats.clone(),
            history: session.history().to_vec(),
        })
    }

    /// Randomly allocated baseline, seeded from the config when a seed is set
    pub fn random(&self, rho: f64) -> TradfResult<BaselineReport> {
        match self.config.allocation.seed {
            Some(seed) => self.random_with_rng(rho, ChaCha8Rng::seed_from_u64(seed)),
            None => self.random_with_rng(rho, ChaCha8Rng::from_entropy()),
        }
    }

    pub fn random_with_rng<R: Rng>(&self, rho: f64, rng: R) -> TradfResult<BaselineReport> {
        let mut session = Session::start(SessionMode::Random);
        let constraints = self.derive_constraints(rho)?;
        session.advance(SessionState::ConstraintsDerived)?;

        let mut allocator = RandomAllocator::new(rng, self.config.allocation.spread);
        let start_times = self.build_schedule(&constraints, &mut allocator)?;
        session.advance(SessionState::BaselineBuilt)?;
        session.advance(SessionState::Validated)?;

        Ok(self.baseline_report(Some(rho), constraints.period, start_times, session))
    }

    /// Evaluate given start times; only precedence and backedge constraints
    /// are checked
    pub fn manual(&self, period: f64, start_times: &[f64]) -> TradfResult<BaselineReport> {
        let mut session = Session::start(SessionMode::Manual);
        verify_constraints(&self.graph, start_times, period, None, &self.config.validation)?;
        session.advance(SessionState::BaselineBuilt)?;
        session.advance(SessionState::Validated)?;
        Ok(self.baseline_report(None, period, start_times.to_vec(), session))
    }

    /// Start-time vector from a name-keyed map; absent actors start at 0
    pub fn start_times_from_names(&self, named: &HashMap<String, f64>) -> TradfResult<Vec<f64>> {
        let mut start_times = vec![0.0; self.graph.actor_count()];
        for (name, &ts) in named {
            let actor = self
                .graph
                .actor_id(name)
                .ok_or_else(|| TradfError::config(format!("no actor named '{}'", name)))?;
            start_times[actor] = ts;
        }
        Ok(start_times)
    }

    /// Optimize at every rho and report the SNR gain
    pub fn sweep(&self, rhos: &[f64]) -> TradfResult<Vec<SweepEntry>> {
        rhos.iter()
            .map(|&rho| {
                let report = self.optimize_by_rho(rho)?;
                Ok(SweepEntry {
                    rho,
                    delta_snr_percent: report.delta_snr_percent(),
                    execution_time: report.execution_time,
                    fallback: report.outcome.is_fallback(),
                })
            })
            .collect()
    }

    fn baseline_report(
        &self,
        rho: Option<f64>,
        period: f64,
        start_times: Vec<f64>,
        session: Session,
    ) -> BaselineReport {
        let engine = self.engine();
        let value = engine.evaluate_once(&start_times, period).value;
        let snr = snr_db(value);
        BaselineReport {
            rho,
            period,
            graph: ScheduledGraph::build(&engine, &start_times, period, snr, self.config.buffer_epsilon),
            start_times,
            value,
            snr_db: snr,
            graph_stats: self.graph_stats.clone(),
            history: session.history().to_vec(),
        }
    }
}
