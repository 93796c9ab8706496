//! Location value type: a point on the directed road graph.
//!
//! A `Location` is either anchored at an intersection (a graph node) or sits
//! partway along a directed edge (`Road`). Road points collapse to the
//! corresponding `Intersection` at either endpoint, so every location has a
//! single canonical representation. Locations are immutable value types —
//! movement produces a new `Location`, never mutates one in place.

use serde::Deserialize;

use crate::graph::{NodeId, RoadGraph};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    Intersection(NodeId),
    Road {
        source: NodeId,
        target: NodeId,
        /// Distance from `source` along the edge, in meters.
        /// Invariant: `0 < distance_from_source < edge_length`.
        distance_from_source: f64,
    },
}

impl Location {
    /// Build a location on the edge `source -> target`, collapsing to an
    /// intersection if `distance_from_source` lands on either endpoint.
    pub fn on_edge(graph: &RoadGraph, source: NodeId, target: NodeId, distance_from_source: f64) -> Self {
        let length = graph.edge_length(source, target);
        let d = distance_from_source.clamp(0.0, length);
        if d <= 0.0 {
            Location::Intersection(source)
        } else if d >= length {
            Location::Intersection(target)
        } else {
            Location::Road {
                source,
                target,
                distance_from_source: d,
            }
        }
    }

    /// Time from the edge's source node to this location, by linear
    /// interpolation of the edge's free-flow duration. Zero for intersections.
    pub fn time_from_source(&self, graph: &RoadGraph) -> f64 {
        match *self {
            Location::Intersection(_) => 0.0,
            Location::Road {
                source,
                target,
                distance_from_source,
            } => {
                let length = graph.edge_length(source, target);
                let duration = graph.edge_duration(source, target);
                if length <= 0.0 {
                    0.0
                } else {
                    duration * (distance_from_source / length)
                }
            }
        }
    }

    /// Time from this location to the edge's target node. Zero for intersections.
    pub fn time_from_target(&self, graph: &RoadGraph) -> f64 {
        match *self {
            Location::Intersection(_) => 0.0,
            Location::Road {
                source,
                target,
                distance_from_source,
            } => {
                let length = graph.edge_length(source, target);
                let duration = graph.edge_duration(source, target);
                if length <= 0.0 {
                    0.0
                } else {
                    duration * (1.0 - distance_from_source / length)
                }
            }
        }
    }

    fn distance_from_target(&self, graph: &RoadGraph) -> f64 {
        match *self {
            Location::Intersection(_) => 0.0,
            Location::Road {
                source,
                target,
                distance_from_source,
            } => graph.edge_length(source, target) - distance_from_source,
        }
    }

    /// Travel duration (seconds) from `self` to `other` over the road graph.
    /// A `Road` location can only continue forward toward its edge's target
    /// node (edges are directed; a vehicle never backs up mid-edge).
    pub fn duration(&self, other: &Location, graph: &RoadGraph) -> f64 {
        let to_node = |loc: &Location, node: NodeId| -> f64 {
            match *loc {
                Location::Intersection(n) => graph.node_duration(n, node),
                Location::Road { target, .. } => {
                    loc.time_from_target(graph) + graph.node_duration(target, node)
                }
            }
        };
        match *other {
            Location::Intersection(n) => to_node(self, n),
            Location::Road {
                source: other_source,
                ..
            } => to_node(self, other_source) + other.time_from_source(graph),
        }
    }

    /// Travel distance (meters) from `self` to `other` over the road graph.
    pub fn distance(&self, other: &Location, graph: &RoadGraph) -> f64 {
        let to_node = |loc: &Location, node: NodeId| -> f64 {
            match *loc {
                Location::Intersection(n) => graph.node_distance(n, node),
                Location::Road { target, .. } => {
                    loc.distance_from_target(graph) + graph.node_distance(target, node)
                }
            }
        };
        match *other {
            Location::Intersection(n) => to_node(self, n),
            Location::Road {
                source: other_source,
                distance_from_source,
                ..
            } => to_node(self, other_source) + distance_from_source,
        }
    }
}

/// On-disk representation of a `Location` field within a passenger record
/// (e.g. `o_source`, `o_target`, `o_loc`): a directed edge plus an offset.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LocationRecord {
    pub source: NodeId,
    pub target: NodeId,
    pub loc: f64,
}

impl LocationRecord {
    pub fn resolve(&self, graph: &RoadGraph) -> Location {
        Location::on_edge(graph, self.source, self.target, self.loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeRecord;

    fn graph() -> RoadGraph {
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
    fn endpoint_collapses_to_intersection() {
        let g = graph();
        assert_eq!(Location::on_edge(&g, 0, 1, 0.0), Location::Intersection(0));
        assert_eq!(Location::on_edge(&g, 0, 1, 100.0), Location::Intersection(1));
    }

    #[test]
    fn midpoint_interpolates_time() {
        let g = graph();
        let mid = Location::on_edge(&g, 0, 1, 50.0);
        assert_eq!(mid.time_from_source(&g), 5.0);
        assert_eq!(mid.time_from_target(&g), 5.0);
    }

    #[test]
    fn duration_between_road_points_crosses_nodes() {
        let g = graph();
        let a = Location::on_edge(&g, 0, 1, 50.0); // 5s to node 1
        let b = Location::on_edge(&g, 1, 2, 100.0); // node1 -> here is 10s
        // a -> node1 (5s) -> node1 -> node1 (0) -> b's source (1) already node1 -> + 10s into edge
        assert_eq!(a.duration(&b, &g), 5.0 + 10.0);
    }

    #[test]
    fn intersection_to_intersection_uses_table() {
        let g = graph();
        let a = Location::Intersection(0);
        let b = Location::Intersection(2);
        assert_eq!(a.duration(&b, &g), 30.0);
    }
}
