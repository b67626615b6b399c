//! Synthetic TRADF graphs for benchmarking
//!
//! All generated actors live on two alternating hosts and every host pair
//! shares one gamma delay model.

use serde_json::{json, Value};
use tradf_core::{GraphDescription, NetworkDescription, TradfGraph};

const HOSTS: [&str; 2] = ["h0", "h1"];

fn actor(i: usize) -> Value {
    json!({
        "name": format!("a{:03}", i),
        "host": HOSTS[i % 2],
        "wcet": format!("{}ms", 1 + i % 3),
    })
}

fn link(from: usize, to: usize, weight: f64) -> Value {
    json!({"source": format!("a{:03}", from), "target": format!("a{:03}", to), "weight": weight})
}

fn feedback(from: usize, to: usize, weight: f64) -> Value {
    json!({
        "source": format!("a{:03}", from),
        "target": format!("a{:03}", to),
        "weight": weight,
        "hasInitialToken": true,
    })
}

/// Straight pipeline of `len` actors
pub fn chain(len: usize) -> GraphDescription {
    let len = len.max(2);
    let actors: Vec<Value> = (0..len).map(actor).collect();
    let mut channels = vec![json!({"source": "in", "target": "a000", "weight": 1.0})];
    channels.extend((1..len).map(|i| link(i - 1, i, 1.0)));
    channels.push(json!({"source": format!("a{:03}", len - 1), "weight": 1.0}));
    describe(actors, channels)
}

/// Two parallel rails of `len` actors with rungs between them and a
/// feedback edge from the end of each rail to its start
///
/// The number of simple paths grows quickly with `len`.
pub fn ladder(len: usize) -> GraphDescription {
    let len = len.max(2);
    let actors: Vec<Value> = (0..2 * len).map(actor).collect();
    let top = |i: usize| i;
    let bottom = |i: usize| len + i;

    let mut channels = vec![
        json!({"source": "in0", "target": "a000", "weight": 1.0}),
        json!({"source": "in1", "target": format!("a{:03}", bottom(0)), "weight": 1.0}),
    ];
    for i in 1..len {
        channels.push(link(top(i - 1), top(i), 0.9));
        channels.push(link(bottom(i - 1), bottom(i), 0.9));
        if i % 2 == 1 {
            channels.push(link(top(i - 1), bottom(i), 0.3));
        }
    }
    channels.push(feedback(top(len - 1), top(0), 0.2));
    channels.push(feedback(bottom(len - 1), bottom(0), 0.2));
    channels.push(json!({"source": format!("a{:03}", top(len - 1)), "weight": 1.0}));
    channels.push(json!({"source": format!("a{:03}", bottom(len - 1)), "weight": 2.0}));
    describe(actors, channels)
}

fn describe(actors: Vec<Value>, channels: Vec<Value>) -> GraphDescription {
    serde_json::from_value(json!({"actors": actors, "channels": channels}))
        .expect("generated description is well formed")
}

/// Every host pair with the same gamma delay
pub fn network() -> NetworkDescription {
    let ndd = json!({"dist": "gamma", "shape": 2.0, "loc": 0.5, "scale": 1.0, "u": 0.01});
    let mut table = serde_json::Map::new();
    for src in HOSTS {
        let row: serde_json::Map<String, Value> =
            HOSTS.iter().map(|dst| (dst.to_string(), ndd.clone())).collect();
        table.insert(src.to_string(), Value::Object(row));
    }
    serde_json::from_value(Value::Object(table)).expect("generated network is well formed")
}

pub fn build(desc: &GraphDescription) -> TradfGraph {
    TradfGraph::new(desc, &network()).expect("generated graph is closed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_graphs_load() {
        let graph = build(&chain(5));
        assert_eq!(graph.actor_count(), 5);
        assert!(!graph.is_cyclic());

        let graph = build(&ladder(4));
        assert_eq!(graph.actor_count(), 8);
        assert!(graph.is_cyclic());
        assert_eq!(graph.backward_pairs().len(), 2);
    }
}
