//! Pluggable bipartite assignment: "given a cost matrix over (vacant x
//! waiting), return a one-to-one assignment maximising total utility".
//! `HungarianMatcher` is the default and only shipped implementation;
//! the trait boundary exists so an LP or min-cost-max-flow solver could be
//! swapped in without touching the `Assign` event trigger.

mod hungarian;
mod types;

use bevy_ecs::prelude::{Entity, Resource};

pub use hungarian::HungarianMatcher;
pub use types::MatchResult;

use crate::graph::RoadGraph;
use crate::location::Location;

/// A candidate on one side of the bipartite instance: its entity id and its
/// current location (a vehicle's position, or a passenger's origin).
pub type Candidate = (Entity, Location);

pub trait BipartiteMatcher: Send + Sync {
    /// Edge weight is `1 / duration(vehicle, passenger.origin)`: maximising
    /// total weight is equivalent to minimising total pickup travel time.
    /// Ties resolve by `(vehicle_id, passenger_id)` ascending.
    fn solve(
        &self,
        vehicles: &[(Entity, u64, Location)],
        passengers: &[(Entity, u64, Location)],
        graph: &RoadGraph,
    ) -> Vec<MatchResult>;
}

#[derive(Resource)]
pub struct MatcherResource(pub Box<dyn BipartiteMatcher>);
