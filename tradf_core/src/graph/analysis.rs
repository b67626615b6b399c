//! Structural analysis of the precedence graph
//!
//! The precedence graph is the TRADF graph with every backedge removed. It is
//! acyclic by construction (a loop without an initial token is a load error).
//! Everything here is computed once when the graph is loaded:
//!
//! - weakly-connected components, each with its initial nodes and a
//!   topological order
//! - the per-component scheduling order, i.e. `(producer, consumer)` pairs in
//!   topological sequence, which every later propagation walks
//! - cycles: paths from an initial node to a backedge source, closed by the
//!   backedge destination
//! - simple paths between every (source-bound, sink-bound) actor pair

use super::{ActorId, ChannelKey};
use crate::error::{TradfError, TradfResult};
use petgraph::algo::{all_simple_paths, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::Direction;
use std::collections::BTreeMap;

/// One weakly-connected component of the precedence graph
#[derive(Debug, Clone)]
pub struct Component {
    pub actors: Vec<ActorId>,
    /// Actors without a producer inside the component
    pub initial_nodes: Vec<ActorId>,
    pub topological_order: Vec<ActorId>,
    /// `(producer, consumer)` pairs in topological sequence
    pub scheduling_order: Vec<ChannelKey>,
}

/// Immutable structural facts about a loaded graph
#[derive(Debug, Clone, Default)]
pub struct Structure {
    precedence: DiGraph<ActorId, ()>,
    components: Vec<Component>,
    cycles: Vec<Vec<ActorId>>,
    simple_paths: BTreeMap<(ActorId, ActorId), Vec<Vec<ActorId>>>,
}

impl Structure {
    /// Analyze a graph given its forward edges and its non-self-loop backedges
    ///
    /// `names` maps actor ids to names for error reporting.
    pub fn analyze(
        names: &[String],
        forward: &[ChannelKey],
        backedges: &[ChannelKey],
        sources: &[ActorId],
        sinks: &[ActorId],
    ) -> TradfResult<Self> {
        let actor_count = names.len();
        let mut precedence = DiGraph::with_capacity(actor_count, forward.len());
        for id in 0..actor_count {
            precedence.add_node(id);
        }
        for &(u, v) in forward {
            precedence.add_edge(NodeIndex::new(u), NodeIndex::new(v), ());
        }

        let global_order = toposort(&precedence, None).map_err(|cycle| {
            TradfError::PrecedenceCycle(names[cycle.node_id().index()].clone())
        })?;

        let mut structure = Self {
            precedence,
            components: Vec::new(),
            cycles: Vec::new(),
            simple_paths: BTreeMap::new(),
        };

        let mut counts = Vec::new();
        for actors in structure.weak_components(forward) {
            let component = structure.build_component(actors, &global_order);
            log::debug!(
                "component {:?} has initial nodes {:?}",
                component.actors,
                component.initial_nodes
            );
            counts.push(component.actors.len());
            structure.add_cycles(&component, backedges);
            structure.components.push(component);
        }
        log::debug!("size of components of precedence graph: {:?}", counts);

        for &sink in sinks {
            for &source in sources {
                let paths = structure.paths_between(source, sink);
                structure.simple_paths.insert((source, sink), paths);
            }
        }

        Ok(structure)
    }

    /// Partition actors into weakly-connected components, ordered by their
    /// smallest actor id
    fn weak_components(&self, forward: &[ChannelKey]) -> Vec<Vec<ActorId>> {
        let actor_count = self.precedence.node_count();
        let mut sets = UnionFind::<usize>::new(actor_count);
        for &(u, v) in forward {
            sets.union(u, v);
        }

        let mut slot_of_root: BTreeMap<usize, usize> = BTreeMap::new();
        let mut components: Vec<Vec<ActorId>> = Vec::new();
        for actor in 0..actor_count {
            let root = sets.find(actor);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(actor);
        }
        components
    }

    fn build_component(&self, actors: Vec<ActorId>, global_order: &[NodeIndex]) -> Component {
        let mut member = vec![false; self.precedence.node_count()];
        for &actor in &actors {
            member[actor] = true;
        }

        let initial_nodes = actors
            .iter()
            .copied()
            .filter(|&actor| self.producers(actor).is_empty())
            .collect();

        let topological_order: Vec<ActorId> = global_order
            .iter()
            .map(|node| node.index())
            .filter(|&actor| member[actor])
            .collect();

        let mut scheduling_order = Vec::new();
        for &actor in &topological_order {
            for producer in self.producers(actor) {
                scheduling_order.push((producer, actor));
            }
        }

        Component {
            actors,
            initial_nodes,
            topological_order,
            scheduling_order,
        }
    }

    fn add_cycles(&mut self, component: &Component, backedges: &[ChannelKey]) {
        for &(u, v) in backedges {
            if !component.actors.contains(&u) {
                continue;
            }
            for &initial in &component.initial_nodes {
                if initial == u {
                    self.cycles.push(vec![u, v]);
                    continue;
                }
                for mut path in self.paths_between(initial, u) {
                    path.push(v);
                    self.cycles.push(path);
                }
            }
        }
    }

    fn paths_between(&self, from: ActorId, to: ActorId) -> Vec<Vec<ActorId>> {
        let paths: Vec<Vec<NodeIndex>> = all_simple_paths(
            &self.precedence,
            NodeIndex::new(from),
            NodeIndex::new(to),
            0,
            None,
        )
        .collect();
        paths
            .into_iter()
            .map(|path| path.into_iter().map(|node| node.index()).collect())
            .collect()
    }

    /// Producers of `actor` in the precedence graph, sorted by id
    pub fn producers(&self, actor: ActorId) -> Vec<ActorId> {
        let mut producers: Vec<ActorId> = self
            .precedence
            .neighbors_directed(NodeIndex::new(actor), Direction::Incoming)
            .map(|node| node.index())
            .collect();
        producers.sort_unstable();
        producers.dedup();
        producers
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Initial nodes of all components
    pub fn initial_nodes(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.components
            .iter()
            .flat_map(|c| c.initial_nodes.iter().copied())
    }

    pub fn is_initial(&self, actor: ActorId) -> bool {
        self.initial_nodes().any(|a| a == actor)
    }

    /// The canonical edge-visitation order, component after component
    pub fn scheduling_order(&self) -> impl Iterator<Item = ChannelKey> + '_ {
        self.components
            .iter()
            .flat_map(|c| c.scheduling_order.iter().copied())
    }

    /// Concatenated topological orders of all components
    pub fn execution_order(&self) -> Vec<ActorId> {
        self.components
            .iter()
            .flat_map(|c| c.topological_order.iter().copied())
            .collect()
    }

    pub fn cycles(&self) -> &[Vec<ActorId>] {
        &self.cycles
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Channels along a cycle, the closing backedge last
    pub fn cycle_channels(&self, index: usize) -> Vec<ChannelKey> {
        self.cycles
            .get(index)
            .map(|path| path_to_channels(path))
            .unwrap_or_default()
    }

    pub fn simple_paths(&self, source: ActorId, sink: ActorId) -> &[Vec<ActorId>] {
        self.simple_paths
            .get(&(source, sink))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn simple_path_count(&self, source: ActorId, sink: ActorId) -> usize {
        self.simple_paths(source, sink).len()
    }
}

/// Consecutive actor pairs of a path
pub fn path_to_channels(path: &[ActorId]) -> Vec<ChannelKey> {
    path.windows(2).map(|pair| (pair[0], pair[1])).collect()
}
