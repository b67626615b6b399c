//! Scheduled graph artifact
//!
//! The graph description extended with the schedule: start times, channel
//! delivery probabilities, buffer sizes and margins, plus graph-level period,
//! estimated SNR, execution order and end-to-end latencies. Durations are
//! written as `"<value>ms"` strings.

use crate::error::TradfResult;
use crate::quality::QualityEngine;
use crate::scheduling::latencies;
use crate::units::{format_ms, round3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledActor {
    pub name: String,
    pub host: String,
    pub wcet: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduledChannel {
    /// Actor-to-actor channel (self-loops are omitted)
    Link {
        source: String,
        target: String,
        weight: f64,
        /// Delivery probability
        dp: f64,
        /// Buffer size in tokens
        mem: u64,
        dprime: String,
        #[serde(rename = "hasInitialToken", skip_serializing_if = "Option::is_none", default)]
        has_initial_token: Option<bool>,
    },
    /// External input bound to an actor
    Input {
        source: String,
        weight: f64,
        target: String,
    },
    /// Weighted output of an actor
    Output { source: String, weight: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGraph {
    pub actors: Vec<ScheduledActor>,
    pub channels: Vec<ScheduledChannel>,
    pub period: String,
    #[serde(rename = "estimatedSNR")]
    pub estimated_snr: String,
    #[serde(rename = "executionOrder")]
    pub execution_order: Vec<String>,
    /// Keyed `"(source,sink)"`
    pub latencies: BTreeMap<String, String>,
}

impl ScheduledGraph {
    /// Snapshot a schedule of the engine's graph
    pub fn build(
        engine: &QualityEngine,
        start_times: &[f64],
        period: f64,
        snr_db: f64,
        buffer_epsilon: f64,
    ) -> Self {
        let graph = engine.graph();

        let actors = graph
            .actors()
            .iter()
            .zip(start_times)
            .map(|(actor, &ts)| ScheduledActor {
                name: actor.name.clone(),
                host: actor.host.clone(),
                wcet: format_ms(actor.wcet),
                ts: format_ms(ts),
            })
            .collect();

        let mut channels = Vec::with_capacity(
            graph.sinks().len() + graph.sources().len() + graph.channel_count(),
        );
        for sink in graph.sinks() {
            channels.push(ScheduledChannel::Output {
                source: graph.actor_name(sink.actor).to_string(),
                weight: sink.weight,
            });
        }
        for source in graph.sources() {
            channels.push(ScheduledChannel::Input {
                source: source.input.clone(),
                weight: source.weight,
                target: graph.actor_name(source.actor).to_string(),
            });
        }
        let stats = engine.channel_stats(start_times, period, buffer_epsilon);
        for (channel, stat) in graph.channels().iter().zip(&stats) {
            if channel.is_self_loop() {
                continue;
            }
            channels.push(ScheduledChannel::Link {
                source: graph.actor_name(channel.source).to_string(),
                target: graph.actor_name(channel.target).to_string(),
                weight: channel.weight,
                dp: round3(stat.delivery),
                mem: stat.buffer_size,
                dprime: format_ms(stat.dprime),
                has_initial_token: channel.is_backedge.then_some(true),
            });
        }

        let execution_order = graph
            .structure()
            .execution_order()
            .into_iter()
            .map(|actor| graph.actor_name(actor).to_string())
            .collect();

        let latencies = latencies(graph, start_times)
            .into_iter()
            .map(|((source, sink), latency)| {
                (
                    format!("({},{})", graph.actor_name(source), graph.actor_name(sink)),
                    format_ms(latency),
                )
            })
            .collect();

        Self {
            actors,
            channels,
            period: format_ms(period),
            estimated_snr: format!("{:?}dB", snr_db),
            execution_order,
            latencies,
        }
    }

    pub fn to_json(&self) -> TradfResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the artifact, creating parent directories as needed
    pub fn write(&self, path: &Path) -> TradfResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
