//! Kuhn-Munkres (Hungarian) maximum-weight bipartite assignment, generalised
//! from the teacher's H3-cell `HungarianMatching` to the road-graph
//! `duration()` metric, with a greedy small-batch fast path that guarantees
//! the spec's `(vehicle_id, passenger_id)` ascending tie-break exactly.

use std::collections::HashSet;

use bevy_ecs::prelude::Entity;
use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};

use crate::graph::RoadGraph;
use crate::location::Location;

use super::types::MatchResult;
use super::BipartiteMatcher;

/// Below this batch size, a simple greedy pass (lowest id wins ties) is both
/// cheaper and gives an exact tie-break guarantee; above it, Kuhn-Munkres
/// gives the provably optimal total weight at the cost of an approximate
/// tie-break among equal-weight alternatives.
const GREEDY_THRESHOLD: usize = 12;

/// Scale factor converting `1/duration` scores to integer weights.
const SCALE: f64 = 1_000_000.0;

const INFEASIBLE: i64 = i64::MIN / 4;

struct I64Weights(Vec<Vec<i64>>);

impl Weights<i64> for I64Weights {
    fn rows(&self) -> usize {
        self.0.len()
    }
    fn columns(&self) -> usize {
        self.0.first().map_or(0, |r| r.len())
    }
    fn at(&self, row: usize, col: usize) -> i64 {
        self.0[row][col]
    }
    fn neg(&self) -> Self {
        I64Weights(self.0.iter().map(|r| r.iter().map(|x| -x).collect()).collect())
    }
}

fn score(duration_s: f64) -> f64 {
    1.0 / duration_s.max(1e-6)
}

#[derive(Default)]
pub struct HungarianMatcher;

impl HungarianMatcher {
    fn greedy(
        &self,
        vehicles: &[(Entity, u64, Location)],
        passengers: &[(Entity, u64, Location)],
        graph: &RoadGraph,
    ) -> Vec<MatchResult> {
        let mut vehicles: Vec<_> = vehicles.to_vec();
        vehicles.sort_by_key(|(_, id, _)| *id);
        let mut passengers: Vec<_> = passengers.to_vec();
        passengers.sort_by_key(|(_, id, _)| *id);

        // All feasible pairs, sorted by descending weight then ascending ids
        // so the first un-consumed pair for each side is always the correct
        // tie-break winner.
        let mut pairs: Vec<(f64, usize, usize, f64)> = Vec::new();
        for (vi, (_, _, v_loc)) in vehicles.iter().enumerate() {
            for (pi, (_, _, p_loc)) in passengers.iter().enumerate() {
                let duration = v_loc.duration(p_loc, graph);
                pairs.push((score(duration), vi, pi, duration));
            }
        }
        pairs.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap()
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        let mut used_vehicles = HashSet::new();
        let mut used_passengers = HashSet::new();
        let mut results = Vec::new();
        for (_, vi, pi, duration) in pairs {
            if used_vehicles.contains(&vi) || used_passengers.contains(&pi) {
                continue;
            }
            used_vehicles.insert(vi);
            used_passengers.insert(pi);
            results.push(MatchResult {
                vehicle: vehicles[vi].0,
                passenger: passengers[pi].0,
                pickup_duration_s: duration,
            });
        }
        results
    }

    fn optimal(
        &self,
        vehicles: &[(Entity, u64, Location)],
        passengers: &[(Entity, u64, Location)],
        graph: &RoadGraph,
    ) -> Vec<MatchResult> {
        let mut vehicles: Vec<_> = vehicles.to_vec();
        vehicles.sort_by_key(|(_, id, _)| *id);
        let mut passengers: Vec<_> = passengers.to_vec();
        passengers.sort_by_key(|(_, id, _)| *id);

        // Kuhn-Munkres requires rows <= columns.
        let rows_are_vehicles = vehicles.len() <= passengers.len();
        let (rows, cols) = if rows_are_vehicles {
            (vehicles.len(), passengers.len())
        } else {
            (passengers.len(), vehicles.len())
        };

        let mut durations = vec![vec![0.0_f64; cols]; rows];
        let mut matrix = vec![vec![INFEASIBLE; cols]; rows];
        for r in 0..rows {
            for c in 0..cols {
                let (v_loc, p_loc) = if rows_are_vehicles {
                    (&vehicles[r].2, &passengers[c].2)
                } else {
                    (&vehicles[c].2, &passengers[r].2)
                };
                let duration = v_loc.duration(p_loc, graph);
                durations[r][c] = duration;
                matrix[r][c] = (score(duration) * SCALE) as i64;
            }
        }
        let weights = I64Weights(matrix);
        let (_, assignment) = kuhn_munkres(&weights);

        let mut results = Vec::new();
        for (r, &c) in assignment.iter().enumerate() {
            if weights.at(r, c) <= INFEASIBLE {
                continue;
            }
            let (vehicle, passenger) = if rows_are_vehicles {
                (vehicles[r].0, passengers[c].0)
            } else {
                (vehicles[c].0, passengers[r].0)
            };
            results.push(MatchResult {
                vehicle,
                passenger,
                pickup_duration_s: durations[r][c],
            });
        }
        results
    }
}

impl BipartiteMatcher for HungarianMatcher {
    fn solve(
        &self,
        vehicles: &[(Entity, u64, Location)],
        passengers: &[(Entity, u64, Location)],
        graph: &RoadGraph,
    ) -> Vec<MatchResult> {
        if vehicles.is_empty() || passengers.is_empty() {
            return Vec::new();
        }
        if vehicles.len() <= GREEDY_THRESHOLD && passengers.len() <= GREEDY_THRESHOLD {
            self.greedy(vehicles, passengers, graph)
        } else {
            self.optimal(vehicles, passengers, graph)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeRecord;

    fn line_graph() -> RoadGraph {
        let mut g = RoadGraph::new();
        g.add_edge(EdgeRecord { source: 0, target: 1, distance: 100.0, duration: 10.0 });
        g.add_edge(EdgeRecord { source: 1, target: 2, distance: 100.0, duration: 10.0 });
        g
    }

    #[test]
    fn tie_breaks_by_lowest_id() {
        let g = line_graph();
        let v1 = Entity::from_raw(5);
        let v2 = Entity::from_raw(1);
        let p1 = Entity::from_raw(0);
        let vehicles = vec![(v1, 5, Location::Intersection(0)), (v2, 1, Location::Intersection(0))];
        let passengers = vec![(p1, 0, Location::Intersection(0))];
        let matcher = HungarianMatcher;
        let results = matcher.solve(&vehicles, &passengers, &g);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].vehicle, v2, "lowest vehicle id should win an exact tie");
    }

    #[test]
    fn empty_side_yields_no_match() {
        let g = line_graph();
        let matcher = HungarianMatcher;
        let v = vec![(Entity::from_raw(0), 0, Location::Intersection(0))];
        assert!(matcher.solve(&v, &[], &g).is_empty());
        assert!(matcher.solve(&[], &v, &g).is_empty());
    }

    #[test]
    fn prefers_closer_pairing() {
        let g = line_graph();
        let near = Entity::from_raw(0);
        let far = Entity::from_raw(1);
        let vehicles = vec![
            (near, 0, Location::Intersection(1)),
            (far, 1, Location::Intersection(2)),
        ];
        let passengers = vec![(Entity::from_raw(10), 10, Location::Intersection(1))];
        let matcher = HungarianMatcher;
        let results = matcher.solve(&vehicles, &passengers, &g);
        assert_eq!(results[0].vehicle, near);
    }
}
