// End-to-end scheduling scenarios
use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tempfile::TempDir;
use tradf_core::artifact::ScheduledChannel;
use tradf_core::config::SchedulerConfig;
use tradf_core::optimize::{Outcome, Scheduler, SessionState};
use tradf_core::scheduling::{Constraints, LatencyMap};
use tradf_core::{TradfGraph, TradfResult};

const PIPELINE: &str = r#"{
    "actors": [
        {"name": "filter", "host": "h1", "wcet": "1ms"},
        {"name": "mixer", "host": "h2", "wcet": "2ms"}
    ],
    "channels": [
        {"source": "mic", "target": "filter", "weight": 1.0},
        {"source": "filter", "target": "mixer", "weight": 1.0},
        {"source": "mixer", "weight": 1.0}
    ]
}"#;

const FEEDBACK: &str = r#"{
    "actors": [
        {"name": "ctrl", "host": "h1", "wcet": "1ms"},
        {"name": "plant", "host": "h2", "wcet": "2ms"}
    ],
    "channels": [
        {"source": "ref", "target": "ctrl", "weight": 1.0},
        {"source": "ctrl", "target": "plant", "weight": 0.8},
        {"source": "plant", "target": "ctrl", "weight": 0.5, "hasInitialToken": true},
        {"source": "plant", "weight": 1.0}
    ]
}"#;

const DIAMOND: &str = r#"{
    "actors": [
        {"name": "a", "host": "h1", "wcet": "1ms"},
        {"name": "b", "host": "h2", "wcet": "1ms"},
        {"name": "c", "host": "h2", "wcet": "3ms"},
        {"name": "d", "host": "h1", "wcet": "1ms"}
    ],
    "channels": [
        {"source": "in", "target": "a", "weight": 1.0},
        {"source": "a", "target": "b", "weight": 1.0},
        {"source": "a", "target": "c", "weight": 1.0},
        {"source": "b", "target": "d", "weight": 0.5},
        {"source": "c", "target": "d", "weight": 0.5},
        {"source": "d", "weight": 1.0}
    ]
}"#;

const FIXED: &str = r#"{"dist": "fixed", "loc": 0.0, "scale": 1.0}"#;
const GAMMA: &str = r#"{"dist": "gamma", "shape": 2.0, "loc": 0.5, "scale": 1.0, "u": 0.01}"#;

/// Graph and network files in a scratch directory
struct Fixture {
    _dir: TempDir,
    graph: PathBuf,
    network: PathBuf,
}

fn fixture(graph: &str, ndd: &str) -> Fixture {
    let network = format!(
        r#"{{"h1": {{"h1": {ndd}, "h2": {ndd}}}, "h2": {{"h1": {ndd}, "h2": {ndd}}}}}"#,
        ndd = ndd
    );
    fixture_with_network(graph, &network)
}

fn fixture_with_network(graph: &str, network: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let graph_path = dir.path().join("test.tradf.json");
    let network_path = dir.path().join("network.json");
    std::fs::write(&graph_path, graph).unwrap();
    std::fs::write(&network_path, network).unwrap();
    Fixture {
        _dir: dir,
        graph: graph_path,
        network: network_path,
    }
}

fn scheduler(graph: &str, ndd: &str) -> TradfResult<Scheduler> {
    let files = fixture(graph, ndd);
    Scheduler::load(&files.graph, &files.network, SchedulerConfig::default())
}

fn assert_schedule_valid(graph: &TradfGraph, start_times: &[f64], constraints: &Constraints) {
    let eps = 1e-6;
    for channel in graph.channels().iter().filter(|c| !c.is_self_loop()) {
        let (u, v) = channel.key();
        let finish = start_times[u] + graph.wcet(u);
        if channel.is_backedge {
            assert!(start_times[v] + constraints.period >= finish - eps);
        } else {
            assert!(start_times[v] >= finish - eps);
        }
    }
    for (&(u, v), &bound) in &constraints.latencies {
        assert!(start_times[v] + graph.wcet(v) - start_times[u] <= bound + eps);
    }
    assert!(start_times.iter().all(|&t| t >= -eps));
}

#[test]
fn test_zero_delay_pipeline() {
    let scheduler = scheduler(PIPELINE, FIXED).unwrap();
    let graph = scheduler.graph();
    let filter = graph.actor_id("filter").unwrap();
    let mixer = graph.actor_id("mixer").unwrap();

    let constraints = Constraints {
        period: 3.0,
        latencies: LatencyMap::from([((filter, mixer), 6.0)]),
    };
    let report = scheduler.optimize(&constraints).unwrap();

    assert_eq!(report.baseline[filter], 0.0);
    assert!(report.baseline[mixer] >= 3.0);
    // every token arrives; the SNR sits at its cap
    assert_abs_diff_eq!(report.baseline_snr_db, 120.0, epsilon = 1e-6);
    assert!(report.optimized_snr_db >= report.baseline_snr_db - 1e-9);

    let dp = report
        .baseline_graph
        .channels
        .iter()
        .find_map(|c| match c {
            ScheduledChannel::Link { dp, .. } => Some(*dp),
            _ => None,
        })
        .unwrap();
    assert_eq!(dp, 1.0);
}

#[test]
fn test_feedback_loop_at_half_rho() {
    let scheduler = scheduler(FEEDBACK, GAMMA).unwrap();
    let graph = scheduler.graph();
    assert!(graph.is_cyclic());
    assert_eq!(scheduler.graph_stats().cycle_count, 1);

    let constraints = scheduler.derive_constraints(0.5).unwrap();
    assert!(constraints.period > 0.0);
    assert_abs_diff_eq!(constraints.period, 13.28, epsilon = 0.05);
    let ctrl = graph.actor_id("ctrl").unwrap();
    let plant = graph.actor_id("plant").unwrap();
    assert_abs_diff_eq!(constraints.latencies[&(ctrl, plant)], 8.14, epsilon = 0.05);

    let report = scheduler.optimize_by_rho(0.5).unwrap();
    assert_eq!(report.final_state(), SessionState::Validated);
    assert_schedule_valid(graph, &report.baseline, &report.constraints);
    assert_schedule_valid(graph, &report.optimized, &report.constraints);
    assert!(report.optimized_snr_db >= report.baseline_snr_db - 1e-9);
    assert!(report.evaluations.count > 0);

    match &report.outcome {
        Outcome::Optimized => assert!(report.optimized_value < report.baseline_value),
        Outcome::Fallback(_) => assert_eq!(report.optimized, report.baseline),
    }
}

#[test]
fn test_slow_link_gets_the_slack() {
    // a -> b crosses hosts with a heavy-tailed delay, b -> c stays local and
    // is always on time once its margin exceeds 0.5ms
    let graph = r#"{
        "actors": [
            {"name": "a", "host": "h1", "wcet": "1ms"},
            {"name": "b", "host": "h2", "wcet": "1ms"},
            {"name": "c", "host": "h2", "wcet": "1ms"}
        ],
        "channels": [
            {"source": "in", "target": "a", "weight": 1.0},
            {"source": "a", "target": "b", "weight": 1.0},
            {"source": "b", "target": "c", "weight": 1.0},
            {"source": "c", "weight": 1.0}
        ]
    }"#;
    let local = r#"{"dist": "uniform", "loc": 0.0, "scale": 0.5}"#;
    let network = format!(
        r#"{{"h1": {{"h1": {local}, "h2": {GAMMA}}}, "h2": {{"h1": {GAMMA}, "h2": {local}}}}}"#
    );
    let files = fixture_with_network(graph, &network);
    let scheduler = Scheduler::load(&files.graph, &files.network, SchedulerConfig::default()).unwrap();
    let graph = scheduler.graph();
    let id = |name| graph.actor_id(name).unwrap();
    let constraints = Constraints {
        period: 4.0,
        latencies: LatencyMap::from([((id("a"), id("c")), 9.0)]),
    };

    let report = scheduler.optimize(&constraints).unwrap();

    // uniform split: 3ms of margin on each channel
    assert_abs_diff_eq!(report.baseline[id("b")], 4.0, epsilon = 1e-12);
    assert_abs_diff_eq!(report.baseline[id("c")], 8.0, epsilon = 1e-12);
    assert_eq!(report.outcome, Outcome::Optimized, "{}", report.solver_message);
    assert!(report.optimized_value < report.baseline_value);
    assert!(report.optimized_snr_db > report.baseline_snr_db);
    assert!(report.delta_snr_percent() > 0.0);
    // b moves later to widen the cross-host margin
    assert!(report.optimized[id("b")] > report.baseline[id("b")]);
    assert_schedule_valid(graph, &report.optimized, &constraints);
    assert_eq!(report.final_state(), SessionState::Validated);
}

#[test]
fn test_period_monotone_in_rho() {
    let scheduler = scheduler(PIPELINE, GAMMA).unwrap();
    let mut last = f64::NEG_INFINITY;
    for step in 0..=10 {
        let rho = step as f64 / 10.0;
        let constraints = scheduler.derive_constraints(rho).unwrap();
        assert!(constraints.period >= last);
        last = constraints.period;
    }
}

#[test]
fn test_optimized_never_worse_across_sweep() {
    let scheduler = scheduler(DIAMOND, GAMMA).unwrap();
    let entries = scheduler.sweep(&[0.25, 0.5, 0.75, 1.0]).unwrap();
    assert_eq!(entries.len(), 4);
    for entry in entries {
        assert!(entry.delta_snr_percent >= -1e-9, "rho {}", entry.rho);
    }
}

#[test]
fn test_slack_split_per_path() {
    let scheduler = scheduler(DIAMOND, GAMMA).unwrap();
    let graph = scheduler.graph();
    let id = |name| graph.actor_id(name).unwrap();
    let constraints = Constraints {
        period: 3.0,
        latencies: LatencyMap::from([((id("a"), id("d")), 11.0)]),
    };
    let baseline = scheduler
        .build_schedule(&constraints, &mut tradf_core::scheduling::UniformAllocator)
        .unwrap();

    // a->b->d has slack 8 (4 per channel), a->c->d has slack 6 (3 per channel)
    assert_eq!(baseline[id("a")], 0.0);
    assert_abs_diff_eq!(baseline[id("b")], 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(baseline[id("c")], 4.0, epsilon = 1e-12);
    // both branches reach d at 10
    assert_abs_diff_eq!(baseline[id("d")], 10.0, epsilon = 1e-12);
    assert_schedule_valid(graph, &baseline, &constraints);
}

#[test]
fn test_shared_channel_takes_tightest_budget() {
    // two inputs share the a->b channel; the longer path bounds it
    let graph = r#"{
        "actors": [
            {"name": "a", "host": "h1", "wcet": "1ms"},
            {"name": "b", "host": "h2", "wcet": "1ms"},
            {"name": "s", "host": "h1", "wcet": "2ms"}
        ],
        "channels": [
            {"source": "in0", "target": "s", "weight": 1.0},
            {"source": "s", "target": "a", "weight": 1.0},
            {"source": "in1", "target": "a", "weight": 1.0},
            {"source": "a", "target": "b", "weight": 1.0},
            {"source": "b", "weight": 1.0}
        ]
    }"#;
    let scheduler = scheduler(graph, GAMMA).unwrap();
    let graph = scheduler.graph();
    let id = |name| graph.actor_id(name).unwrap();
    let constraints = Constraints {
        period: 3.0,
        latencies: LatencyMap::from([
            ((id("a"), id("b")), 8.0),
            ((id("s"), id("b")), 10.0),
        ]),
    };
    let baseline = scheduler
        .build_schedule(&constraints, &mut tradf_core::scheduling::UniformAllocator)
        .unwrap();

    // a->b alone would get 6, the path through s grants it (10 - 4) / 2 = 3
    assert_abs_diff_eq!(baseline[id("a")], 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(baseline[id("b")], 9.0, epsilon = 1e-12);
    assert_schedule_valid(graph, &baseline, &constraints);
}

#[test]
fn test_random_baseline_is_reproducible() {
    let scheduler = scheduler(DIAMOND, GAMMA).unwrap();
    let first = scheduler
        .random_with_rng(0.5, ChaCha8Rng::seed_from_u64(7))
        .unwrap();
    let second = scheduler
        .random_with_rng(0.5, ChaCha8Rng::seed_from_u64(7))
        .unwrap();

    assert_eq!(first.start_times, second.start_times);
    assert_eq!(first.final_state(), SessionState::Validated);
    assert_eq!(first.rho, Some(0.5));
    let constraints = scheduler.derive_constraints(0.5).unwrap();
    assert_schedule_valid(scheduler.graph(), &first.start_times, &constraints);
}

#[test]
fn test_seeded_config_drives_random_policy() {
    let files = fixture(PIPELINE, GAMMA);
    let config = SchedulerConfig::from_toml("[allocation]\nseed = 42\n").unwrap();
    let scheduler = Scheduler::load(&files.graph, &files.network, config).unwrap();
    let a = scheduler.random(0.3).unwrap();
    let b = scheduler.random(0.3).unwrap();
    assert_eq!(a.start_times, b.start_times);
    assert!(a.snr_db.is_finite());
}

#[test]
fn test_artifact_written_under_output_dir() {
    let scheduler = scheduler(FEEDBACK, GAMMA).unwrap();
    let report = scheduler.optimize_by_rho(0.75).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optimized").join("test_rho_0.75.tradf.json");
    report.optimized_graph.write(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(json["period"].as_str().unwrap().ends_with("ms"));
    assert!(json["estimatedSNR"].as_str().unwrap().ends_with("dB"));
    assert_eq!(json["executionOrder"], serde_json::json!(["ctrl", "plant"]));
    assert!(json["latencies"].get("(ctrl,plant)").is_some());
}
