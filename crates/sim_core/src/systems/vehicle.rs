//! Vehicle lifecycle: entry (`NewHv`), fleet-size changes (`ActivateAv`,
//! `DeactivateAv`), occupancy bookkeeping (`OccupancyDelta`), and trip
//! completion with the HV decide-exit rule (`TripCompletion`,
//! `PostTripDecision`). §4.2.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject};
use crate::clock::SimulationClock;
use crate::config::SimConfig;
use crate::ecs::{AvProfile, HvProfile, Kind, Trip, Vehicle, VehicleState};
use crate::forecast::ExogenousForecasts;
use crate::graph::RoadGraph;
use crate::location::Location;
use crate::market::MarketState;
use crate::rng::SimRng;
use crate::telemetry::SimTelemetry;

/// Simulated seconds before running averages/occupancy are considered
/// meaningful (§4.3/§4.6 warm-up).
const WARMUP_SECONDS: u64 = 3600;

fn subject_vehicle(current: &CurrentEvent) -> Entity {
    match current.0.subject {
        Some(EventSubject::Vehicle(e)) => e,
        other => panic!("expected a vehicle subject for {:?}, got {:?}", current.0.kind, other),
    }
}

/// The shared HV decide-exit sigmoid (§4.2): `g = wage*occupancy -
/// hourlyCost`, continue-probability `0.5 - g/(2*sqrt(1+g^2))`. Used both for
/// the neoclassical continue/exit draw and, with the sign of `g` flipped by
/// the caller, for the HV-entry defer/abandon draw — the entry rule names no
/// separate formula for "probability depending on the cost gap", so reusing
/// this sigmoid is the grounded choice (DECIDED in DESIGN.md).
fn sigmoid_probability(g: f64) -> f64 {
    (0.5 - g / (2.0 * (1.0 + g * g).sqrt())).clamp(0.0, 1.0)
}

/// HV decide-exit rule (§4.2): exits once `maximum_work_duration` has
/// elapsed since entry; otherwise a neoclassical driver continues with
/// probability `sigmoid_probability(g)`, and an income-targeting driver
/// exits once `income >= target_income`. Shared by trip completion
/// (`on_post_trip_decision`) and the per-tick vacant-HV sweep in `on_assign`.
pub fn hv_wants_to_exit(now: u64, vehicle: &Vehicle, profile: &HvProfile, market: &MarketState, config: &SimConfig, rng: &mut SimRng) -> bool {
    let elapsed = now.saturating_sub(vehicle.entry_time);
    if elapsed >= config.maximum_work_duration {
        return true;
    }
    if profile.neoclassical {
        let occupancy = market.occupancy.get(&Kind::Hv).copied().unwrap_or(0.0);
        let g = market.hv_wage * occupancy - profile.hourly_cost;
        !rng.gen_bool(sigmoid_probability(g))
    } else {
        vehicle.income >= profile.target_income
    }
}

/// HV entry (§4.2): a neoclassical driver facing `wage*occupancy <
/// hourlyCost` either defers 300 seconds or abandons entirely; otherwise the
/// HV enters the vacant set at the event time, at a random on-network
/// location.
pub fn on_new_hv(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut market: ResMut<MarketState>,
    mut rng: ResMut<SimRng>,
    graph: Res<RoadGraph>,
    mut vehicles: Query<(&mut Vehicle, &HvProfile)>,
) {
    let entity = subject_vehicle(&current);
    let (mut vehicle, profile) = vehicles.get_mut(entity).expect("NewHv subject must carry HvProfile");

    if profile.neoclassical {
        let occupancy = market.occupancy.get(&Kind::Hv).copied().unwrap_or(0.0);
        let g = market.hv_wage * occupancy - profile.hourly_cost;
        if g < 0.0 {
            if rng.gen_bool(sigmoid_probability(g)) {
                clock.schedule_at(current.0.time + 300, EventKind::NewHv, Some(EventSubject::Vehicle(entity)), 0);
            }
            return;
        }
    }

    vehicle.state = VehicleState::Vacant;
    vehicle.entry_time = current.0.time;
    vehicle.location = Location::Intersection(graph.random_node(&mut rng));
    let counts = market.counts_mut(Kind::Hv);
    counts.total += 1;
    counts.vacant += 1;
}

/// Move `min(payload, |inactive|)` Inactive AVs to Vacant, chosen uniformly
/// at random (§4.2, §9 "fleet activation samples" through the single seeded
/// `SimRng`).
pub fn on_activate_av(
    current: Res<CurrentEvent>,
    mut market: ResMut<MarketState>,
    mut rng: ResMut<SimRng>,
    mut vehicles: Query<(Entity, &mut Vehicle, &AvProfile)>,
) {
    let quota = current.0.payload.max(0) as usize;
    let mut candidates: Vec<Entity> = vehicles
        .iter()
        .filter(|(_, v, _)| v.state == VehicleState::Inactive)
        .map(|(e, _, _)| e)
        .collect();

    let take = quota.min(candidates.len());
    let counts = market.counts_mut(Kind::Av);
    for _ in 0..take {
        let idx = rng.gen_index(candidates.len());
        let entity = candidates.swap_remove(idx);
        let (_, mut vehicle, _) = vehicles.get_mut(entity).unwrap();
        vehicle.state = VehicleState::Vacant;
        vehicle.entry_time = current.0.time;
        counts.total += 1;
        counts.vacant += 1;
    }
}

/// Move up to `payload` Vacant AVs back toward Inactive (§4.2): each is
/// routed to its depot, with time and location advanced by the shortest-path
/// duration (`on_deactivate_av_arrival` lands it there and flips it
/// Inactive). If fewer than `payload` AVs are vacant, the shortfall
/// re-schedules itself at `time+1`, bounded by the last recorded passenger
/// request time so it doesn't retry forever once demand has stopped.
pub fn on_deactivate_av(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut market: ResMut<MarketState>,
    graph: Res<RoadGraph>,
    forecasts: Res<ExogenousForecasts>,
    mut vehicles: Query<(Entity, &mut Vehicle, &AvProfile)>,
) {
    let now = current.0.time;
    let quota = current.0.payload.max(0) as usize;

    let mut candidates: Vec<Entity> = vehicles
        .iter()
        .filter(|(_, v, _)| v.state == VehicleState::Vacant)
        .map(|(e, _, _)| e)
        .collect();
    candidates.sort();
    let take = quota.min(candidates.len());

    {
        let counts = market.counts_mut(Kind::Av);
        for _ in 0..take {
            counts.total -= 1;
            counts.vacant -= 1;
        }
    }

    for &entity in candidates.iter().take(take) {
        let (_, mut vehicle, profile) = vehicles.get_mut(entity).unwrap();
        let depot = Location::Intersection(profile.depot);
        let travel = vehicle.location.duration(&depot, &graph);
        let travel_s = if travel.is_finite() { travel.round() as u64 } else { 0 };
        vehicle.state = VehicleState::Deactivating;
        clock.schedule_at(now + travel_s, EventKind::DeactivateAvArrival, Some(EventSubject::Vehicle(entity)), 0);
    }

    let residual = quota.saturating_sub(take);
    if residual > 0 {
        let last_passenger_time = forecasts.max_demand_time().unwrap_or(now);
        if now + 1 <= last_passenger_time {
            clock.schedule_at(now + 1, EventKind::DeactivateAv, None, residual as i64);
        }
    }
}

/// An AV routed by `on_deactivate_av` reaches its depot: finalise the
/// location and flip it Inactive. Population counters were already
/// decremented when the trip to the depot began.
pub fn on_deactivate_av_arrival(current: Res<CurrentEvent>, mut vehicles: Query<(&mut Vehicle, &AvProfile)>) {
    let entity = subject_vehicle(&current);
    let (mut vehicle, profile) = vehicles
        .get_mut(entity)
        .expect("DeactivateAvArrival subject must carry AvProfile");
    vehicle.location = Location::Intersection(profile.depot);
    vehicle.state = VehicleState::Inactive;
}

/// `payload` is +1 at meeting time (Assigned -> Occupied) or -1 at delivery
/// time (occupied counter decremented; the state transition back to Vacant
/// or Exited happens in `on_trip_completion`/`on_post_trip_decision`).
pub fn on_occupancy_delta(
    current: Res<CurrentEvent>,
    mut market: ResMut<MarketState>,
    mut vehicles: Query<&mut Vehicle>,
) {
    let entity = subject_vehicle(&current);
    let mut vehicle = vehicles.get_mut(entity).expect("OccupancyDelta subject vehicle must exist");
    let counts = market.counts_mut(vehicle.kind);
    match current.0.payload {
        1 => {
            vehicle.state = VehicleState::Occupied;
            counts.assigned -= 1;
            counts.occupied += 1;
        }
        -1 => {
            counts.occupied -= 1;
        }
        other => panic!("unexpected OccupancyDelta payload {other}"),
    }
}

pub fn on_trip_completion(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    mut market: ResMut<MarketState>,
    mut telemetry: ResMut<SimTelemetry>,
    mut commands: Commands,
    mut vehicles: Query<&mut Vehicle>,
    trips: Query<&Trip>,
    passengers: Query<&crate::ecs::Passenger>,
) {
    let entity = subject_vehicle(&current);
    let trip_entity = {
        let vehicle = vehicles.get(entity).expect("TripCompletion subject vehicle must exist");
        vehicle.active_trip.expect("TripCompletion fired on a vehicle with no active trip")
    };
    let trip = *trips.get(trip_entity).expect("active_trip must point at a live Trip entity");
    let destination = passengers
        .get(trip.passenger)
        .expect("trip.passenger must still exist at delivery time")
        .destination;

    {
        let mut vehicle = vehicles.get_mut(entity).unwrap();
        vehicle.active_trip = None;
        vehicle.location = destination;
    }

    commands.entity(trip_entity).despawn();
    commands.entity(trip.passenger).despawn();

    // §4.3: running averages only update after the warm-up hour.
    if current.0.time > WARMUP_SECONDS {
        let pickup_duration = (trip.meeting_time - trip.dispatch_time) as f64;
        let trip_duration = (trip.delivery_time - trip.meeting_time) as f64;
        market.record_match_durations(trip.kind, pickup_duration, trip_duration);
    }

    match trip.kind {
        Kind::Av => {
            let mut vehicle = vehicles.get_mut(entity).unwrap();
            vehicle.state = VehicleState::Vacant;
            market.counts_mut(Kind::Av).vacant += 1;
        }
        Kind::Hv => {
            clock.schedule_at(
                current.0.time,
                EventKind::PostTripDecision,
                Some(EventSubject::Vehicle(entity)),
                0,
            );
        }
    }

    let vehicle = vehicles.get(entity).unwrap();
    telemetry.record_vehicle(current.0.time, vehicle.id, vehicle.kind, vehicle.state, vehicle.income);
}

/// HV decide-exit at trip completion, via the shared `hv_wants_to_exit` rule.
pub fn on_post_trip_decision(
    current: Res<CurrentEvent>,
    mut market: ResMut<MarketState>,
    mut rng: ResMut<SimRng>,
    mut telemetry: ResMut<SimTelemetry>,
    config: Res<SimConfig>,
    mut vehicles: Query<(&mut Vehicle, &HvProfile)>,
) {
    let entity = subject_vehicle(&current);
    let (mut vehicle, profile) = vehicles.get_mut(entity).expect("PostTripDecision subject must carry HvProfile");

    let wants_to_exit = hv_wants_to_exit(current.0.time, &vehicle, profile, &market, &config, &mut rng);

    let counts = market.counts_mut(Kind::Hv);
    if wants_to_exit {
        vehicle.state = VehicleState::Exited;
        counts.total -= 1;
    } else {
        vehicle.state = VehicleState::Vacant;
        counts.vacant += 1;
    }

    telemetry.record_vehicle(current.0.time, vehicle.id, vehicle.kind, vehicle.state, vehicle.income);
}

/// Force-exit every vacant HV and deactivate every active AV during the
/// §4.1 end-of-window drain. Returns the number of vehicles moved, for
/// logging.
pub fn force_drain_vehicles(
    market: &mut MarketState,
    vehicles: &mut [(&mut Vehicle, Option<&AvProfile>)],
) -> (u64, u64) {
    let mut hv_exited = 0;
    let mut av_deactivated = 0;
    for (vehicle, av_profile) in vehicles.iter_mut() {
        if vehicle.state != VehicleState::Vacant {
            continue;
        }
        match vehicle.kind {
            Kind::Hv => {
                vehicle.state = VehicleState::Exited;
                market.counts_mut(Kind::Hv).total -= 1;
                market.counts_mut(Kind::Hv).vacant -= 1;
                hv_exited += 1;
            }
            Kind::Av => {
                if let Some(profile) = av_profile {
                    vehicle.state = VehicleState::Inactive;
                    vehicle.location = Location::Intersection(profile.depot);
                    market.counts_mut(Kind::Av).total -= 1;
                    market.counts_mut(Kind::Av).vacant -= 1;
                    av_deactivated += 1;
                }
            }
        }
    }
    (hv_exited, av_deactivated)
}
