//! Entity components: vehicles, passengers, and trips.
//!
//! `Vehicle` is the shared structural record for both human-driven and
//! autonomous fleets; kind-specific data lives in a sibling `HvProfile` or
//! `AvProfile` component rather than a subclass, per the discriminated-union
//! guidance (kind tag + shared fields + kind-specific sub-record). All
//! kind-specific rules (decide-exit, depot routing, control application)
//! dispatch on `Vehicle::kind`.

use bevy_ecs::prelude::{Component, Entity};
use serde::Serialize;

use crate::graph::NodeId;
use crate::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Kind {
    Hv,
    Av,
}

impl Kind {
    pub fn both() -> [Kind; 2] {
        [Kind::Hv, Kind::Av]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VehicleState {
    /// AV only: parked at a depot, not assignable.
    Inactive,
    Vacant,
    Assigned,
    Occupied,
    /// AV only: en route to its depot after `DeactivateAv`, not assignable.
    Deactivating,
    /// Terminal. The vehicle never re-enters a membership set.
    Exited,
}

#[derive(Debug, Clone, Copy, Component)]
pub struct Vehicle {
    pub id: u64,
    pub kind: Kind,
    pub location: Location,
    pub state: VehicleState,
    pub entry_time: u64,
    pub last_assignment_time: u64,
    pub occupied_seconds: u64,
    pub income: f64,
    /// Backlink to the active `Trip` entity; `None` unless `state` is
    /// `Assigned` or `Occupied`.
    pub active_trip: Option<Entity>,
}

/// HV-specific behavioural parameters, per spec.md §4.2's decide-exit rule.
#[derive(Debug, Clone, Copy, Component)]
pub struct HvProfile {
    pub neoclassical: bool,
    pub hourly_cost: f64,
    pub target_income: f64,
}

/// AV-specific data: the depot a deactivated AV returns to.
#[derive(Debug, Clone, Copy, Component)]
pub struct AvProfile {
    pub depot: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChosenMode {
    Hv,
    Av,
    Outside,
}

/// Per-passenger per-mode utility coefficients, drawn once at input-validation
/// time (attribute injection, out of scope) and carried verbatim thereafter.
#[derive(Debug, Clone, Copy)]
pub struct UtilityParams {
    pub const_hv: f64,
    pub const_av: f64,
    pub fare_coef_hv: f64,
    pub fare_coef_av: f64,
    pub base_fare_hv: f64,
    pub base_fare_av: f64,
    pub unit_fare_hv: f64,
    pub unit_fare_av: f64,
    pub const_outside: f64,
}

#[derive(Debug, Clone, Copy, Component)]
pub struct Passenger {
    pub id: u64,
    pub request_time: u64,
    pub origin: Location,
    pub destination: Location,
    pub trip_distance: f64,
    /// In-vehicle trip duration, seconds.
    pub trip_duration: f64,
    /// Patience, seconds; cancellation deadline is `request_time + patience`.
    pub patience: u64,
    pub expired_time: u64,
    pub value_of_time: f64,
    pub utility: UtilityParams,
    pub chosen_mode: ChosenMode,
    pub fare: f64,
}

/// Marker: the passenger is waiting in the `kind`-preferring queue. Removed
/// on match or expiration; a passenger is never re-inserted after removal.
#[derive(Debug, Clone, Copy, Component)]
pub struct Waiting {
    pub kind: Kind,
}

#[derive(Debug, Clone, Copy, Component)]
pub struct Trip {
    pub vehicle: Entity,
    pub passenger: Entity,
    pub kind: Kind,
    pub dispatch_time: u64,
    pub meeting_time: u64,
    pub delivery_time: u64,
}
