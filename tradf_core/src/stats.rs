use crate::graph::TradfGraph;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Structural statistics reported with every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    /// Simple paths per sink, per source
    pub path_counts: BTreeMap<String, BTreeMap<String, usize>>,
    pub actor_count: usize,
    pub cycle_count: usize,
    /// Includes self-loops
    pub channel_count: usize,
    /// Backedges between distinct actors
    pub backedge_count: usize,
}

impl GraphStats {
    pub fn collect(graph: &TradfGraph) -> Self {
        let structure = graph.structure();
        let mut path_counts = BTreeMap::new();
        for sink in graph.sinks() {
            let per_source: BTreeMap<String, usize> = graph
                .sources()
                .iter()
                .map(|source| {
                    (
                        graph.actor_name(source.actor).to_string(),
                        structure.simple_path_count(source.actor, sink.actor),
                    )
                })
                .collect();
            path_counts.insert(graph.actor_name(sink.actor).to_string(), per_source);
        }

        Self {
            path_counts,
            actor_count: graph.actor_count(),
            cycle_count: structure.cycle_count(),
            channel_count: graph.channel_count(),
            backedge_count: graph.backward_pairs().len(),
        }
    }
}

/// Objective evaluation timings
/// Uses Welford's online algorithm for variance calculation
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationStats {
    /// Number of objective evaluations
    pub count: usize,
    /// Average evaluation time in microseconds
    pub avg_us: f64,
    /// Standard deviation in microseconds
    pub stddev_us: f64,
    pub min_us: f64,
    pub max_us: f64,
    #[serde(skip)]
    mean: f64,
    #[serde(skip)]
    m2: f64,
}

impl Default for EvaluationStats {
    fn default() -> Self {
        Self {
            count: 0,
            avg_us: 0.0,
            stddev_us: 0.0,
            min_us: 0.0,
            max_us: 0.0,
            mean: 0.0,
            m2: 0.0,
        }
    }
}

impl EvaluationStats {
    pub fn update(&mut self, duration_us: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min_us = duration_us;
            self.max_us = duration_us;
        } else {
            self.min_us = self.min_us.min(duration_us);
            self.max_us = self.max_us.max(duration_us);
        }

        let delta = duration_us - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = duration_us - self.mean;
        self.m2 += delta * delta2;

        self.avg_us = self.mean;
        if self.count > 1 {
            self.stddev_us = (self.m2 / (self.count - 1) as f64).sqrt();
        }
    }
}

/// Collects evaluation timings during an optimization
#[derive(Debug, Clone, Default)]
pub struct EvaluationProfiler {
    stats: EvaluationStats,
}

impl EvaluationProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, duration: Duration) {
        self.stats.update(duration.as_secs_f64() * 1e6);
    }

    /// Run `f` and record how long it took
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.record(start.elapsed());
        result
    }

    pub fn stats(&self) -> &EvaluationStats {
        &self.stats
    }

    pub fn into_stats(self) -> EvaluationStats {
        self.stats
    }
}
