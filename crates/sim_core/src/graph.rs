//! Graph & metric service: the static directed road network and the
//! node-to-node shortest-path duration/distance it serves.
//!
//! This is the "out of scope... assumed to expose `duration(u,v)` and
//! `distance(u,v)`" collaborator from the spec. It is deliberately thin: a
//! directed edge list plus a dense travel-time table loaded from input
//! files, with a Dijkstra fallback (`pathfinding::prelude::dijkstra`) for any
//! node pair the input's table left sparse.

use std::collections::HashMap;

use bevy_ecs::prelude::Resource;
use pathfinding::prelude::dijkstra;
use serde::Deserialize;

use crate::rng::SimRng;

pub type NodeId = u32;

/// One directed edge of the road graph, as loaded from the edge-list input.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EdgeRecord {
    pub source: NodeId,
    pub target: NodeId,
    pub distance: f64,
    pub duration: f64,
}

/// Node position, used only for attribute injection upstream; carried here so
/// the graph loader has a single input shape but never consulted by the core
/// (lon/lat → on-network mapping is out of scope).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    target: NodeId,
    length_m: f64,
    duration_s: f64,
}

/// The static directed road graph plus its node-pair shortest-path tables.
#[derive(Resource, Debug, Default)]
pub struct RoadGraph {
    node_ids: Vec<NodeId>,
    adjacency: HashMap<NodeId, Vec<Edge>>,
    duration_table: HashMap<(NodeId, NodeId), f64>,
    distance_table: HashMap<(NodeId, NodeId), f64>,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId) {
        if !self.node_ids.contains(&id) {
            self.node_ids.push(id);
        }
        self.adjacency.entry(id).or_default();
    }

    pub fn add_edge(&mut self, edge: EdgeRecord) {
        self.add_node(edge.source);
        self.add_node(edge.target);
        self.adjacency.entry(edge.source).or_default().push(Edge {
            target: edge.target,
            length_m: edge.distance,
            duration_s: edge.duration,
        });
    }

    /// Seed the dense duration/distance tables from a precomputed input file.
    /// Entries not present are filled lazily via Dijkstra on first query.
    pub fn seed_duration(&mut self, source: NodeId, target: NodeId, duration_s: f64) {
        self.duration_table.insert((source, target), duration_s);
    }

    pub fn seed_distance(&mut self, source: NodeId, target: NodeId, distance_m: f64) {
        self.distance_table.insert((source, target), distance_m);
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Pick an on-network node uniformly at random (§4.2 "random on-network
    /// location" for HV entry). Panics on an empty graph, a construction bug.
    pub fn random_node(&self, rng: &mut SimRng) -> NodeId {
        self.node_ids[rng.gen_index(self.node_ids.len())]
    }

    fn edge(&self, source: NodeId, target: NodeId) -> Option<Edge> {
        self.adjacency
            .get(&source)
            .and_then(|edges| edges.iter().find(|e| e.target == target))
            .copied()
    }

    /// Edge length in meters for the directed edge `source -> target`.
    pub fn edge_length(&self, source: NodeId, target: NodeId) -> f64 {
        self.edge(source, target).map(|e| e.length_m).unwrap_or(0.0)
    }

    /// Edge free-flow duration in seconds for the directed edge `source -> target`.
    pub fn edge_duration(&self, source: NodeId, target: NodeId) -> f64 {
        self.edge(source, target).map(|e| e.duration_s).unwrap_or(0.0)
    }

    fn shortest_duration_nodes(&self, from: NodeId, to: NodeId) -> f64 {
        if from == to {
            return 0.0;
        }
        if let Some(d) = self.duration_table.get(&(from, to)) {
            return *d;
        }
        // Scale to integer centiseconds for pathfinding's integer-weight dijkstra.
        let result = dijkstra(
            &from,
            |node| {
                self.adjacency
                    .get(node)
                    .map(|edges| {
                        edges
                            .iter()
                            .map(|e| (e.target, (e.duration_s * 100.0).round() as u64))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            },
            |node| *node == to,
        );
        result.map(|(_, cost)| cost as f64 / 100.0).unwrap_or(f64::INFINITY)
    }

    fn shortest_distance_nodes(&self, from: NodeId, to: NodeId) -> f64 {
        if from == to {
            return 0.0;
        }
        if let Some(d) = self.distance_table.get(&(from, to)) {
            return *d;
        }
        let result = dijkstra(
            &from,
            |node| {
                self.adjacency
                    .get(node)
                    .map(|edges| {
                        edges
                            .iter()
                            .map(|e| (e.target, e.length_m.round() as u64))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            },
            |node| *node == to,
        );
        result.map(|(_, cost)| cost as f64).unwrap_or(f64::INFINITY)
    }

    /// Shortest-path duration (seconds) between two nodes.
    pub fn node_duration(&self, from: NodeId, to: NodeId) -> f64 {
        self.shortest_duration_nodes(from, to)
    }

    /// Shortest-path distance (meters) between two nodes.
    pub fn node_distance(&self, from: NodeId, to: NodeId) -> f64 {
        self.shortest_distance_nodes(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> RoadGraph {
        let mut g = RoadGraph::new();
        g.add_edge(EdgeRecord {
            source: 0,
            target: 1,
            distance: 100.0,
            duration: 10.0,
        });
        g.add_edge(EdgeRecord {
            source: 1,
            target: 2,
            distance: 200.0,
            duration: 20.0,
        });
        g
    }

    #[test]
    fn direct_edge_duration() {
        let g = sample_graph();
        assert_eq!(g.node_duration(0, 1), 10.0);
    }

    #[test]
    fn multi_hop_via_dijkstra() {
        let g = sample_graph();
        assert_eq!(g.node_duration(0, 2), 30.0);
        assert_eq!(g.node_distance(0, 2), 300.0);
    }

    #[test]
    fn same_node_is_zero() {
        let g = sample_graph();
        assert_eq!(g.node_duration(0, 0), 0.0);
    }

    #[test]
    fn unreachable_is_infinite() {
        let g = sample_graph();
        assert_eq!(g.node_duration(2, 0), f64::INFINITY);
    }

    #[test]
    fn seeded_table_takes_precedence() {
        let mut g = sample_graph();
        g.seed_duration(0, 2, 1.0);
        assert_eq!(g.node_duration(0, 2), 1.0);
    }

    #[test]
    fn random_node_stays_on_the_graph() {
        let g = sample_graph();
        let mut rng = crate::rng::SimRng::new(1);
        for _ in 0..20 {
            assert!(g.nodes().contains(&g.random_node(&mut rng)));
        }
    }
}
