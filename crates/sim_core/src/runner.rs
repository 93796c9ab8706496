//! The event loop itself: pop an event, install it as `CurrentEvent`, run the
//! one bevy_ecs system gated to that event's kind, repeat until the clock is
//! empty. `simulation_schedule()` builds the `Schedule` once; `run_next_event`
//! drives a single step; `run_to_completion` drains the clock, including the
//! §4.1 end-of-window drain phase.

use bevy_ecs::prelude::{IntoSystemConfigs, Schedule, World};
use bevy_ecs::schedule::common_conditions::resource_exists;

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::systems;

fn is_kind(kind: EventKind) -> impl Fn(bevy_ecs::prelude::Res<CurrentEvent>) -> bool {
    move |current: bevy_ecs::prelude::Res<CurrentEvent>| current.0.kind == kind
}

/// Build the schedule that runs exactly one system per tick: the one whose
/// `run_if` matches the kind of the freshly-installed `CurrentEvent`.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            systems::vehicle::on_new_hv.run_if(is_kind(EventKind::NewHv)),
            systems::vehicle::on_activate_av.run_if(is_kind(EventKind::ActivateAv)),
            systems::vehicle::on_deactivate_av.run_if(is_kind(EventKind::DeactivateAv)),
            systems::vehicle::on_deactivate_av_arrival.run_if(is_kind(EventKind::DeactivateAvArrival)),
            systems::vehicle::on_occupancy_delta.run_if(is_kind(EventKind::OccupancyDelta)),
            systems::vehicle::on_trip_completion.run_if(is_kind(EventKind::TripCompletion)),
            systems::vehicle::on_post_trip_decision.run_if(is_kind(EventKind::PostTripDecision)),
        )
            .run_if(resource_exists::<CurrentEvent>),
    );
    schedule.add_systems(
        (
            systems::phi::on_update_phi.run_if(is_kind(EventKind::UpdatePhi)),
            systems::spawn::on_new_passenger.run_if(is_kind(EventKind::NewPassenger)),
            systems::states::on_update_states.run_if(is_kind(EventKind::UpdateStates)),
            systems::assign::on_assign.run_if(is_kind(EventKind::Assign)),
            systems::mpc::on_mpc.run_if(is_kind(EventKind::Mpc)),
        )
            .run_if(resource_exists::<CurrentEvent>),
    );
    schedule
}

/// Pop the earliest event, install it as `CurrentEvent`, and run the
/// schedule once. Returns `false` once the clock is empty.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    let event = {
        let mut clock = world.resource_mut::<SimulationClock>();
        clock.pop_next()
    };
    let Some(event) = event else { return false };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    world.remove_resource::<CurrentEvent>();
    true
}

/// Run until the clock is empty, then perform the §4.1 end-of-window drain:
/// expire every waiting passenger, force-exit every vacant HV, deactivate
/// every active AV — while still allowing any `TripCompletion` events that
/// drain produces to fire to completion before the run ends.
pub fn run_to_completion(world: &mut World, schedule: &mut Schedule) {
    while run_next_event(world, schedule) {}
    systems::lifecycle::drain(world);
    while run_next_event(world, schedule) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::EventSubject;
    use crate::ecs::{HvProfile, Kind, Vehicle, VehicleState};
    use crate::market::{MarketState, PickupDropoffHistograms};

    #[test]
    fn schedule_runs_matching_system_only() {
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        world.insert_resource(MarketState::default());
        world.insert_resource(PickupDropoffHistograms::default());
        world.insert_resource(crate::rng::SimRng::new(1));
        let mut graph = crate::graph::RoadGraph::new();
        graph.add_node(0);
        world.insert_resource(graph);

        let vehicle = world
            .spawn((
                Vehicle {
                    id: 1,
                    kind: Kind::Hv,
                    location: crate::location::Location::Intersection(0),
                    state: VehicleState::Inactive,
                    entry_time: 0,
                    last_assignment_time: 0,
                    occupied_seconds: 0,
                    income: 0.0,
                    active_trip: None,
                },
                HvProfile {
                    neoclassical: false,
                    hourly_cost: 15.0,
                    target_income: 100.0,
                },
            ))
            .id();
        world.resource_mut::<SimulationClock>().schedule_at(
            0,
            EventKind::NewHv,
            Some(EventSubject::Vehicle(vehicle)),
            0,
        );
        let mut schedule = simulation_schedule();
        assert!(run_next_event(&mut world, &mut schedule));
        let v = world.get::<Vehicle>(vehicle).unwrap();
        assert_eq!(v.state, VehicleState::Vacant);
        assert!(!run_next_event(&mut world, &mut schedule));
    }
}
