//! # TRADF graph model
//!
//! A timed dataflow graph: actors placed on hosts, each with a worst-case
//! execution time, connected by channels that cross the network. Channels
//! carrying an initial token are *backedges*; they close feedback loops that
//! are realized across one period.
//!
//! Loading classifies every channel entry of the description:
//!
//! - no `target`: the source actor's output is a weighted sink
//! - `source` is not an actor: an external input bound to `target`
//! - `hasInitialToken: true`: a backedge
//! - anything else: a forward edge of the precedence graph
//!
//! The graph must be closed at its boundary: every actor without a producer
//! is bound to an input and has a consumer, every actor without a consumer is
//! a weighted sink. Actors are indexed by name in sorted order, so `ActorId`s
//! are stable for a given description.

pub mod analysis;
pub mod desc;

pub use analysis::{Component, Structure};
pub use desc::{ActorDesc, ChannelDesc, GraphDescription};

use crate::error::{TradfError, TradfResult};
use crate::ndd::{self, NetworkDelay, NetworkDescription};
use crate::units::parse_duration_ms;
use std::collections::HashMap;
use std::path::Path;

/// Index of an actor in name order
pub type ActorId = usize;

/// `(producer, consumer)` actor pair identifying a channel
pub type ChannelKey = (ActorId, ActorId);

#[derive(Debug, Clone)]
pub struct Actor {
    pub name: String,
    pub host: String,
    /// Worst-case execution time in milliseconds
    pub wcet: f64,
}

/// An actor-to-actor channel
#[derive(Debug, Clone)]
pub struct Channel {
    pub source: ActorId,
    pub target: ActorId,
    pub weight: f64,
    /// Delay model of the host pair; `None` for self-loops
    pub ndd: Option<NetworkDelay>,
    pub is_backedge: bool,
}

impl Channel {
    pub fn key(&self) -> ChannelKey {
        (self.source, self.target)
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Backedge between two different actors
    pub fn is_feedback(&self) -> bool {
        self.is_backedge && !self.is_self_loop()
    }
}

/// External input feeding an entry actor
#[derive(Debug, Clone)]
pub struct SourceBinding {
    pub actor: ActorId,
    pub input: String,
    pub weight: f64,
}

/// Weighted output of an actor
#[derive(Debug, Clone)]
pub struct SinkBinding {
    pub actor: ActorId,
    pub weight: f64,
}

/// Immutable TRADF graph with its structural analysis
#[derive(Debug, Clone)]
pub struct TradfGraph {
    actors: Vec<Actor>,
    index: HashMap<String, ActorId>,
    channels: Vec<Channel>,
    channel_index: HashMap<ChannelKey, usize>,
    sources: Vec<SourceBinding>,
    sinks: Vec<SinkBinding>,
    structure: Structure,
}

impl TradfGraph {
    /// Load a graph and its network description from disk
    pub fn load(graph_path: &Path, network_path: &Path) -> TradfResult<Self> {
        let desc = GraphDescription::load(graph_path)?;
        let network = desc::load_network(network_path)?;
        Self::new(&desc, &network)
    }

    /// Build and analyze a graph
    pub fn new(desc: &GraphDescription, network: &NetworkDescription) -> TradfResult<Self> {
        let actors = Self::load_actors(&desc.actors)?;
        let index: HashMap<String, ActorId> = actors
            .iter()
            .enumerate()
            .map(|(id, actor)| (actor.name.clone(), id))
            .collect();

        let mut graph = Self {
            actors,
            index,
            channels: Vec::new(),
            channel_index: HashMap::new(),
            sources: Vec::new(),
            sinks: Vec::new(),
            structure: Structure::default(),
        };

        for entry in &desc.channels {
            graph.load_channel(entry, network)?;
        }
        graph.verify_external()?;

        let names: Vec<String> = graph.actors.iter().map(|a| a.name.clone()).collect();
        let source_actors: Vec<ActorId> = graph.sources.iter().map(|s| s.actor).collect();
        let sink_actors: Vec<ActorId> = graph.sinks.iter().map(|s| s.actor).collect();
        graph.structure = Structure::analyze(
            &names,
            &graph.forward_pairs(),
            &graph.backward_pairs(),
            &source_actors,
            &sink_actors,
        )?;

        log::info!(
            "graph is {}, has {} actors and {} channels",
            if graph.is_cyclic() { "cyclic" } else { "acyclic" },
            graph.actor_count(),
            graph.channel_count()
        );
        Ok(graph)
    }

    fn load_actors(descs: &[ActorDesc]) -> TradfResult<Vec<Actor>> {
        let mut actors = Vec::with_capacity(descs.len());
        for desc in descs {
            actors.push(Actor {
                name: desc.name.clone(),
                host: desc.host.clone(),
                wcet: parse_duration_ms(&desc.wcet)?,
            });
        }
        actors.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = actors.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(TradfError::DuplicateActor(pair[0].name.clone()));
        }
        Ok(actors)
    }

    fn load_channel(&mut self, entry: &ChannelDesc, network: &NetworkDescription) -> TradfResult<()> {
        let Some(target_name) = entry.target.as_deref() else {
            let actor = self
                .actor_id(&entry.source)
                .ok_or_else(|| TradfError::UnknownOutput(entry.source.clone()))?;
            if self.sinks.iter().any(|s| s.actor == actor) {
                return Err(TradfError::DuplicateSink(entry.source.clone()));
            }
            self.sinks.push(SinkBinding {
                actor,
                weight: entry.weight,
            });
            return Ok(());
        };

        let target = self.actor_id(target_name).ok_or_else(|| TradfError::UnknownActor {
            source_actor: entry.source.clone(),
            target: target_name.to_string(),
        })?;

        let Some(source) = self.actor_id(&entry.source) else {
            if self.sources.iter().any(|s| s.actor == target) {
                return Err(TradfError::DuplicateSource(target_name.to_string()));
            }
            self.sources.push(SourceBinding {
                actor: target,
                input: entry.source.clone(),
                weight: entry.weight,
            });
            return Ok(());
        };

        let key = (source, target);
        if self.channel_index.contains_key(&key) {
            return Err(TradfError::DuplicateChannel {
                source_actor: entry.source.clone(),
                target: target_name.to_string(),
            });
        }

        let is_backedge = entry.has_initial_token();
        if source == target && !is_backedge {
            return Err(TradfError::PrecedenceCycle(entry.source.clone()));
        }

        let ndd = if source == target {
            None
        } else {
            let src_host = &self.actors[source].host;
            let dst_host = &self.actors[target].host;
            Some(ndd::lookup(network, src_host, dst_host)?.clone())
        };

        self.channel_index.insert(key, self.channels.len());
        self.channels.push(Channel {
            source,
            target,
            weight: entry.weight,
            ndd,
            is_backedge,
        });
        Ok(())
    }

    /// Every actor must be reachable from an input and must reach an output
    fn verify_external(&self) -> TradfResult<()> {
        let mut has_producer = vec![false; self.actors.len()];
        let mut has_consumer = vec![false; self.actors.len()];
        for channel in self.channels.iter().filter(|c| !c.is_self_loop()) {
            has_consumer[channel.source] = true;
            has_producer[channel.target] = true;
        }

        for (id, actor) in self.actors.iter().enumerate() {
            if !has_producer[id] {
                if !self.is_source(id) {
                    return Err(TradfError::UnboundEntry(actor.name.clone()));
                }
                if !has_consumer[id] {
                    return Err(TradfError::IsolatedActor(actor.name.clone()));
                }
            }
            if !has_consumer[id] && !self.is_sink(id) {
                return Err(TradfError::UnweightedExit(actor.name.clone()));
            }
        }

        if self.sinks.iter().map(|s| s.weight).sum::<f64>() == 0.0 {
            return Err(TradfError::ZeroOutputWeight);
        }
        Ok(())
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor(&self, id: ActorId) -> &Actor {
        &self.actors[id]
    }

    pub fn actor_id(&self, name: &str) -> Option<ActorId> {
        self.index.get(name).copied()
    }

    pub fn actor_name(&self, id: ActorId) -> &str {
        &self.actors[id].name
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn wcet(&self, id: ActorId) -> f64 {
        self.actors[id].wcet
    }

    /// Sum of WCETs along a path of actors
    pub fn path_wcet(&self, path: &[ActorId]) -> f64 {
        path.iter().map(|&actor| self.wcet(actor)).sum()
    }

    /// Actor-to-actor channels in description order, self-loops included
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, key: ChannelKey) -> Option<&Channel> {
        self.channel_index.get(&key).map(|&i| &self.channels[i])
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_backedge(&self, key: ChannelKey) -> bool {
        self.channel(key).is_some_and(|c| c.is_backedge)
    }

    /// Precedence edges (no backedges, no self-loops)
    pub fn forward_pairs(&self) -> Vec<ChannelKey> {
        self.channels
            .iter()
            .filter(|c| !c.is_backedge)
            .map(Channel::key)
            .collect()
    }

    /// Backedges between distinct actors
    pub fn backward_pairs(&self) -> Vec<ChannelKey> {
        self.channels
            .iter()
            .filter(|c| c.is_feedback())
            .map(Channel::key)
            .collect()
    }

    /// All backedges, self-loops included
    pub fn backedges(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.is_backedge)
    }

    /// Whether any backedge joins two different actors
    pub fn is_cyclic(&self) -> bool {
        self.channels.iter().any(Channel::is_feedback)
    }

    pub fn sources(&self) -> &[SourceBinding] {
        &self.sources
    }

    pub fn sinks(&self) -> &[SinkBinding] {
        &self.sinks
    }

    pub fn source(&self, actor: ActorId) -> Option<&SourceBinding> {
        self.sources.iter().find(|s| s.actor == actor)
    }

    pub fn is_source(&self, actor: ActorId) -> bool {
        self.source(actor).is_some()
    }

    pub fn is_sink(&self, actor: ActorId) -> bool {
        self.sinks.iter().any(|s| s.actor == actor)
    }

    /// Every `(source actor, sink actor)` pair, sink-major
    pub fn latency_pairs(&self) -> Vec<(ActorId, ActorId)> {
        let mut pairs = Vec::with_capacity(self.sources.len() * self.sinks.len());
        for sink in &self.sinks {
            for source in &self.sources {
                pairs.push((source.actor, sink.actor));
            }
        }
        pairs
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }
}
