// Graph loading and structural analysis through the public API
use std::collections::HashMap;
use tradf_core::error::{ErrorKind, TradfError};
use tradf_core::graph::{GraphDescription, TradfGraph};
use tradf_core::ndd::{NetworkDelay, NetworkDescription};
use tradf_core::GraphStats;

fn network() -> NetworkDescription {
    let ndd: NetworkDelay =
        serde_json::from_str(r#"{"dist": "norm", "loc": 2.0, "scale": 0.5}"#).unwrap();
    let mut network: NetworkDescription = HashMap::new();
    network
        .entry("h1".to_string())
        .or_default()
        .insert("h1".to_string(), ndd);
    network
}

fn build(json: &str) -> Result<TradfGraph, TradfError> {
    TradfGraph::new(&GraphDescription::from_json(json)?, &network())
}

#[test]
fn test_unbound_entry() {
    let err = build(
        r#"{
            "actors": [
                {"name": "a", "host": "h1", "wcet": "1ms"},
                {"name": "b", "host": "h1", "wcet": "1ms"}
            ],
            "channels": [
                {"source": "a", "target": "b", "weight": 1.0},
                {"source": "b", "weight": 1.0}
            ]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, TradfError::UnboundEntry(ref name) if name == "a"));
    assert_eq!(err.kind(), ErrorKind::Load);
}

#[test]
fn test_isolated_actor() {
    let err = build(
        r#"{
            "actors": [
                {"name": "a", "host": "h1", "wcet": "1ms"},
                {"name": "b", "host": "h1", "wcet": "1ms"},
                {"name": "lonely", "host": "h1", "wcet": "1ms"}
            ],
            "channels": [
                {"source": "in", "target": "a", "weight": 1.0},
                {"source": "aux", "target": "lonely", "weight": 1.0},
                {"source": "a", "target": "b", "weight": 1.0},
                {"source": "b", "weight": 1.0},
                {"source": "lonely", "weight": 1.0}
            ]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, TradfError::IsolatedActor(ref name) if name == "lonely"));
}

#[test]
fn test_unweighted_exit() {
    let err = build(
        r#"{
            "actors": [
                {"name": "a", "host": "h1", "wcet": "1ms"},
                {"name": "b", "host": "h1", "wcet": "1ms"}
            ],
            "channels": [
                {"source": "in", "target": "a", "weight": 1.0},
                {"source": "a", "target": "b", "weight": 1.0}
            ]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, TradfError::UnweightedExit(ref name) if name == "b"));
}

#[test]
fn test_unknown_duration_unit() {
    let err = build(
        r#"{
            "actors": [{"name": "a", "host": "h1", "wcet": "1min"}],
            "channels": []
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, TradfError::UnknownUnit { .. }));
    assert_eq!(err.kind(), ErrorKind::Load);
}

#[test]
fn test_missing_host_pair() {
    let err = build(
        r#"{
            "actors": [
                {"name": "a", "host": "h1", "wcet": "1ms"},
                {"name": "b", "host": "h9", "wcet": "1ms"}
            ],
            "channels": [
                {"source": "in", "target": "a", "weight": 1.0},
                {"source": "a", "target": "b", "weight": 1.0},
                {"source": "b", "weight": 1.0}
            ]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, TradfError::UnknownHostPair { .. }));
}

#[test]
fn test_untokened_loop_is_rejected() {
    let err = build(
        r#"{
            "actors": [
                {"name": "a", "host": "h1", "wcet": "1ms"},
                {"name": "b", "host": "h1", "wcet": "1ms"}
            ],
            "channels": [
                {"source": "in", "target": "a", "weight": 1.0},
                {"source": "a", "target": "b", "weight": 1.0},
                {"source": "b", "target": "a", "weight": 1.0},
                {"source": "b", "weight": 1.0}
            ]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, TradfError::PrecedenceCycle(_)));
}

#[test]
fn test_structure_of_two_loops() {
    // in -> a -> b -> c -> out, with c -> a and b -> a fed back
    let graph = build(
        r#"{
            "actors": [
                {"name": "a", "host": "h1", "wcet": "1ms"},
                {"name": "b", "host": "h1", "wcet": "500us"},
                {"name": "c", "host": "h1", "wcet": "0.002s"}
            ],
            "channels": [
                {"source": "in", "target": "a", "weight": 1.0},
                {"source": "a", "target": "b", "weight": 1.0},
                {"source": "b", "target": "c", "weight": 1.0},
                {"source": "c", "target": "a", "weight": 0.3, "hasInitialToken": true},
                {"source": "b", "target": "a", "weight": 0.2, "hasInitialToken": true},
                {"source": "a", "target": "a", "weight": 1.0, "hasInitialToken": true},
                {"source": "c", "weight": 1.0}
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(graph.wcet(graph.actor_id("b").unwrap()), 0.5);
    assert_eq!(graph.wcet(graph.actor_id("c").unwrap()), 2.0);
    assert!(graph.is_cyclic());
    assert_eq!(graph.forward_pairs().len(), 2);
    assert_eq!(graph.backward_pairs().len(), 2);
    assert_eq!(graph.backedges().count(), 3);

    let structure = graph.structure();
    assert_eq!(structure.components().len(), 1);
    assert_eq!(structure.cycle_count(), 2);
    assert_eq!(structure.execution_order(), vec![0, 1, 2]);

    let stats = GraphStats::collect(&graph);
    assert_eq!(stats.actor_count, 3);
    assert_eq!(stats.channel_count, 5);
    assert_eq!(stats.backedge_count, 2);
    assert_eq!(stats.path_counts["c"]["a"], 1);
}
