//! Periodic bipartite assignment (`Assign`, §4.3): expire passengers past
//! patience, evaluate HV decide-exit for vacant drivers, match vacant
//! vehicles to waiting passengers of the same kind via the configured
//! `BipartiteMatcher`, then post the trip's successor events.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::config::SimConfig;
use crate::ecs::{HvProfile, Kind, Passenger, Trip, Vehicle, VehicleState, Waiting};
use crate::graph::RoadGraph;
use crate::location::Location;
use crate::market::{MarketState, PickupDropoffHistograms};
use crate::matching::MatcherResource;
use crate::rng::SimRng;
use crate::systems::vehicle::hv_wants_to_exit;
use crate::telemetry::SimTelemetry;

pub fn on_assign(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut market: ResMut<MarketState>,
    mut histograms: ResMut<PickupDropoffHistograms>,
    mut telemetry: ResMut<SimTelemetry>,
    mut rng: ResMut<SimRng>,
    config: Res<SimConfig>,
    graph: Res<RoadGraph>,
    matcher: Res<MatcherResource>,
    mut commands: Commands,
    mut vehicles: Query<(Entity, &mut Vehicle, Option<&HvProfile>)>,
    passengers: Query<&Passenger>,
    waiting: Query<(Entity, &Waiting)>,
) {
    let now = current.0.time;

    // §4.3/§4.4: remove expired passengers before matching.
    for (entity, marker) in waiting.iter() {
        let passenger = passengers.get(entity).expect("waiting entity must carry Passenger");
        if now >= passenger.expired_time {
            commands.entity(entity).remove::<Waiting>();
            commands.entity(entity).despawn();
            let counts = market.counts_mut(marker.kind);
            counts.waiting = counts.waiting.saturating_sub(1);
            market.record_expiration(marker.kind);
            telemetry.record_expiration(now, marker.kind, passenger.id);
        }
    }

    // §4.2: HV decide-exit is also evaluated at each Assign tick for vacant HVs.
    let vacant_hvs: Vec<Entity> = vehicles
        .iter()
        .filter(|(_, v, profile)| profile.is_some() && v.state == VehicleState::Vacant)
        .map(|(e, _, _)| e)
        .collect();
    for entity in vacant_hvs {
        let (_, mut vehicle, profile) = vehicles.get_mut(entity).unwrap();
        let profile = profile.expect("filtered for HvProfile above");
        if hv_wants_to_exit(now, &vehicle, profile, &market, &config, &mut rng) {
            vehicle.state = VehicleState::Exited;
            let counts = market.counts_mut(Kind::Hv);
            counts.total -= 1;
            counts.vacant -= 1;
            telemetry.record_vehicle(now, vehicle.id, vehicle.kind, vehicle.state, vehicle.income);
        }
    }

    for kind in Kind::both() {
        let vacant: Vec<(Entity, u64, Location)> = vehicles
            .iter()
            .filter(|(_, v, _)| v.kind == kind && v.state == VehicleState::Vacant)
            .map(|(e, v, _)| (e, v.id, v.location))
            .collect();
        let waiters: Vec<(Entity, u64, Location)> = waiting
            .iter()
            .filter(|(_, w)| w.kind == kind)
            .map(|(e, _)| {
                let p = passengers.get(e).expect("waiting entity must carry Passenger");
                (e, p.id, p.origin)
            })
            .collect();

        let results = matcher.0.solve(&vacant, &waiters, &graph);

        for result in results {
            let passenger = *passengers.get(result.passenger).unwrap();
            let pickup_duration = result.pickup_duration_s.round() as u64;
            let meeting_time = now + pickup_duration;
            let delivery_time = meeting_time + passenger.trip_duration.round() as u64;

            let vehicle_id = vehicles.get(result.vehicle).unwrap().1.id;
            let vehicle_kind = {
                let (_, mut vehicle, _) = vehicles.get_mut(result.vehicle).unwrap();
                vehicle.state = VehicleState::Assigned;
                if vehicle.kind == Kind::Hv {
                    vehicle.income += market.hv_wage * passenger.trip_duration / 3600.0;
                }
                vehicle.kind
            };

            telemetry.record_assignment(
                now,
                vehicle_kind,
                vehicle_id,
                passenger.id,
                result.pickup_duration_s,
                meeting_time,
                delivery_time,
            );

            let counts = market.counts_mut(vehicle_kind);
            counts.vacant -= 1;
            counts.assigned += 1;
            counts.waiting = counts.waiting.saturating_sub(1);

            commands.entity(result.passenger).remove::<Waiting>();

            let trip_entity = commands
                .spawn(Trip {
                    vehicle: result.vehicle,
                    passenger: result.passenger,
                    kind: vehicle_kind,
                    dispatch_time: now,
                    meeting_time,
                    delivery_time,
                })
                .id();
            vehicles.get_mut(result.vehicle).unwrap().1.active_trip = Some(trip_entity);

            histograms.record_pickup(vehicle_kind, meeting_time);
            histograms.record_dropoff(vehicle_kind, delivery_time);

            clock.schedule_at(
                meeting_time,
                EventKind::OccupancyDelta,
                Some(EventSubject::Vehicle(result.vehicle)),
                1,
            );
            clock.schedule_at(
                delivery_time,
                EventKind::OccupancyDelta,
                Some(EventSubject::Vehicle(result.vehicle)),
                -1,
            );
            clock.schedule_at(
                delivery_time,
                EventKind::TripCompletion,
                Some(EventSubject::Vehicle(result.vehicle)),
                0,
            );
        }
    }

    let match_interval = current.0.payload.max(1) as u64;
    clock.schedule_in(match_interval, EventKind::Assign, None, current.0.payload);
}
