//! Start-time generation by edge propagation
//!
//! A schedule is built in two passes over the graph. The forward pass walks
//! the scheduling order and pushes every consumer behind its producer's
//! finish time plus the channel's latency budget. The backward pass then
//! derives the *next* firing of every backedge destination from the current
//! firing of the backedge source. The gap between the two firings of an actor
//! is its period.

use crate::config::ValidationConfig;
use crate::error::{TradfError, TradfResult};
use crate::graph::{ActorId, Channel, ChannelKey, TradfGraph};
use std::collections::{BTreeMap, HashMap};

/// End-to-end latency per `(source actor, sink actor)` pair
pub type LatencyMap = BTreeMap<(ActorId, ActorId), f64>;

/// How a candidate start time is compared with the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Replace when the current value is smaller; keeps the latest candidate
    LessThan,
    /// Replace when the current value is larger; keeps the earliest candidate
    GreaterThan,
}

impl Relation {
    fn initial(self) -> f64 {
        match self {
            Relation::LessThan => 0.0,
            Relation::GreaterThan => f64::INFINITY,
        }
    }

    fn improves(self, current: f64, candidate: f64) -> bool {
        match self {
            Relation::LessThan => current < candidate,
            Relation::GreaterThan => current > candidate,
        }
    }
}

/// Latency budget of each channel
pub enum LatencyBudget<'a> {
    /// Fixed budgets; channels without an entry get 0
    PerChannel(&'a HashMap<ChannelKey, f64>),
    /// Budget computed from the channel
    Computed(&'a dyn Fn(&Channel) -> f64),
}

impl LatencyBudget<'_> {
    fn of(&self, channel: &Channel) -> f64 {
        match self {
            LatencyBudget::PerChannel(budgets) => {
                budgets.get(&channel.key()).copied().unwrap_or(0.0)
            }
            LatencyBudget::Computed(f) => f(channel),
        }
    }
}

/// Current and next firing of every actor
#[derive(Debug, Clone, PartialEq)]
pub struct StartTimes {
    pub current: Vec<f64>,
    pub next: Vec<f64>,
}

/// Period and latency bounds a schedule has to meet
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    pub period: f64,
    pub latencies: LatencyMap,
}

/// Run the forward and backward passes
pub fn schedule_graph(graph: &TradfGraph, relation: Relation, budget: &LatencyBudget) -> StartTimes {
    let mut current = vec![relation.initial(); graph.actor_count()];
    for actor in graph.structure().initial_nodes() {
        current[actor] = 0.0;
    }

    for key in graph.structure().scheduling_order() {
        let Some(channel) = graph.channel(key) else {
            continue;
        };
        let (u, v) = key;
        let candidate = current[u] + graph.wcet(u) + budget.of(channel);
        if relation.improves(current[v], candidate) {
            current[v] = candidate;
        }
    }

    let mut next = current.clone();
    for channel in graph.backedges() {
        let (u, v) = channel.key();
        let mut candidate = current[u] + graph.wcet(u);
        if !channel.is_self_loop() {
            candidate += budget.of(channel);
        }
        if relation.improves(next[v], candidate) {
            next[v] = candidate;
        }
    }

    StartTimes { current, next }
}

/// Largest gap between the current and next firing of any actor
///
/// Actors that no backedge points to fire again right after they finish.
pub fn period(graph: &TradfGraph, start_times: &StartTimes) -> TradfResult<f64> {
    let mut refired = vec![false; graph.actor_count()];
    for channel in graph.backedges() {
        refired[channel.target] = true;
    }

    let mut period = 0.0_f64;
    for actor in 0..graph.actor_count() {
        let next = if refired[actor] {
            start_times.next[actor]
        } else {
            start_times.current[actor] + graph.wcet(actor)
        };
        let diff = next - start_times.current[actor];
        if !(diff > 0.0) {
            return Err(TradfError::NonPositivePeriod {
                actor: graph.actor_name(actor).to_string(),
                diff,
            });
        }
        period = period.max(diff);
    }
    Ok(period)
}

/// End-to-end latency of every `(source, sink)` pair
pub fn latencies(graph: &TradfGraph, start_times: &[f64]) -> LatencyMap {
    let mut latencies = LatencyMap::new();
    for sink in graph.sinks() {
        if start_times[sink.actor].abs() <= f64::EPSILON {
            log::warn!(
                "sink '{}' start time is set to zero, make sure this is valid",
                graph.actor_name(sink.actor)
            );
        }
        let end_time = start_times[sink.actor] + graph.wcet(sink.actor);
        for source in graph.sources() {
            latencies.insert((source.actor, sink.actor), end_time - start_times[source.actor]);
        }
    }
    latencies
}

/// Period and latencies of the schedule that gives every channel its
/// `percentile` delay
pub fn reference_constraints(graph: &TradfGraph, percentile: f64) -> TradfResult<Constraints> {
    let channel_latency = |channel: &Channel| {
        channel
            .ndd
            .as_ref()
            .map(|ndd| ndd.ppf(percentile).max(0.0))
            .unwrap_or(0.0)
    };
    let start_times = schedule_graph(graph, Relation::LessThan, &LatencyBudget::Computed(&channel_latency));
    Ok(Constraints {
        period: period(graph, &start_times)?,
        latencies: latencies(graph, &start_times.current),
    })
}

/// Check non-negativity, precedence, backedge and (optionally) latency
/// constraints of a start-time vector
pub fn verify_constraints(
    graph: &TradfGraph,
    start_times: &[f64],
    period: f64,
    latency_bounds: Option<&LatencyMap>,
    tolerance: &ValidationConfig,
) -> TradfResult<()> {
    if start_times.len() != graph.actor_count() {
        return Err(TradfError::violation(format!(
            "expected {} start times, got {}",
            graph.actor_count(),
            start_times.len()
        )));
    }

    for (actor, &ts) in start_times.iter().enumerate() {
        if !tolerance.at_least(ts, 0.0) {
            return Err(TradfError::violation(format!(
                "start time of '{}' is negative ({})",
                graph.actor_name(actor),
                ts
            )));
        }
    }

    if let Some(bounds) = latency_bounds {
        for (&(source, sink), &bound) in bounds {
            let latency = start_times[sink] + graph.wcet(sink) - start_times[source];
            if !tolerance.at_least(bound, latency) {
                return Err(TradfError::violation(format!(
                    "latency from '{}' to '{}' is {} but bound is {}",
                    graph.actor_name(source),
                    graph.actor_name(sink),
                    latency,
                    bound
                )));
            }
        }
    }

    for channel in graph.channels().iter().filter(|c| !c.is_self_loop()) {
        let (u, v) = channel.key();
        let finish = start_times[u] + graph.wcet(u);
        let (start, kind) = if channel.is_backedge {
            (start_times[v] + period, "next start")
        } else {
            (start_times[v], "start")
        };
        if !tolerance.at_least(start, finish) {
            return Err(TradfError::violation(format!(
                "channel ({},{}): {} {} of '{}' precedes finish {} of '{}'",
                graph.actor_name(u),
                graph.actor_name(v),
                kind,
                start,
                graph.actor_name(v),
                finish,
                graph.actor_name(u)
            )));
        }
    }
    Ok(())
}
