//! Scenario build: load the static road graph, AV depots, and passenger
//! records from disk, spawn HV/AV entities over their entry-time
//! distributions, and pre-schedule the periodic events (§4.1 "Scheduling at
//! start").

use std::collections::BTreeSet;

use bevy_ecs::prelude::World;
use serde::Deserialize;

use crate::clock::{EventKind, EventSubject, SimulationClock};
use crate::config::SimConfig;
use crate::ecs::{AvProfile, ChosenMode, HvProfile, Kind, Passenger, UtilityParams, Vehicle, VehicleState};
use crate::error::{InputError, InputResult};
use crate::forecast::ExogenousForecasts;
use crate::graph::{EdgeRecord, RoadGraph};
use crate::location::LocationRecord;
use crate::market::{MarketState, PickupDropoffHistograms};
use crate::matching::{HungarianMatcher, MatcherResource};
use crate::mpc::{MpcConfig, MpcRuntime};
use crate::rng::SimRng;
use crate::telemetry::SimTelemetry;

#[derive(Debug, Deserialize)]
struct ShortestPathRecord {
    source: u32,
    target: u32,
    duration: f64,
    distance: f64,
}

#[derive(Debug, Deserialize)]
struct DepotRecord {
    vehicle_id: u64,
    node: u32,
}

#[derive(Debug, Deserialize)]
struct PassengerRecord {
    id: u64,
    request_time: u64,
    origin_source: u32,
    origin_target: u32,
    origin_loc: f64,
    destination_source: u32,
    destination_target: u32,
    destination_loc: f64,
    trip_distance: f64,
    trip_duration: f64,
    patience: u64,
    value_of_time: f64,
    const_hv: f64,
    const_av: f64,
    fare_coef_hv: f64,
    fare_coef_av: f64,
    base_fare_hv: f64,
    base_fare_av: f64,
    unit_fare_hv: f64,
    unit_fare_av: f64,
    const_outside: f64,
}

fn read_csv<T: for<'de> Deserialize<'de>>(path: &str) -> InputResult<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| InputError::Csv {
        path: path.to_string(),
        source,
    })?;
    reader
        .deserialize()
        .map(|r| {
            r.map_err(|source| InputError::Csv {
                path: path.to_string(),
                source,
            })
        })
        .collect()
}

fn load_graph(config: &SimConfig) -> InputResult<RoadGraph> {
    let edges: Vec<EdgeRecord> = read_csv(&config.map_file)?;
    let mut graph = RoadGraph::new();
    for edge in edges {
        graph.add_edge(edge);
    }
    let table: Vec<ShortestPathRecord> = read_csv(&config.shortest_path_time_file)?;
    for row in table {
        graph.seed_duration(row.source, row.target, row.duration);
        graph.seed_distance(row.source, row.target, row.distance);
    }
    Ok(graph)
}

/// Synthetic HV shift-start distribution: a two-component mixture
/// approximating a morning/evening bimodal commute pattern, sampled from the
/// single shared PRNG (§9 "synthetic driver start-times" is treated as an
/// internal KDE substitute rather than an external input, since §6 lists no
/// shift-start-distribution file).
fn sample_hv_entry_time(rng: &mut SimRng, seconds_in_day: u64) -> u64 {
    let morning_peak = 8.0 * 3600.0;
    let evening_peak = 17.5 * 3600.0;
    let spread = 2.0 * 3600.0_f64;
    let pick_morning = rng.gen_bool(0.55);
    let mean = if pick_morning { morning_peak } else { evening_peak };
    // Sum of two uniforms approximates a triangular (smoothed) distribution
    // without pulling in a normal-distribution crate the teacher never uses.
    let noise = (rng.gen_f64() + rng.gen_f64() - 1.0) * spread;
    (mean + noise).clamp(0.0, seconds_in_day as f64 - 1.0) as u64
}

pub fn build_scenario(world: &mut World, config: SimConfig, seed: u64) -> InputResult<()> {
    let graph = load_graph(&config)?;
    let depots: Vec<DepotRecord> = read_csv(&config.depot_file)?;
    let passengers: Vec<PassengerRecord> = read_csv(&config.passenger_file)?;

    let mut rng = SimRng::new(seed);
    let mut clock = SimulationClock::default();
    let mut market = MarketState::default();
    market.hv_wage = 20.0;
    let mut forecasts = ExogenousForecasts::default();
    let histograms = PickupDropoffHistograms::default();

    let seconds_in_day = 24 * 3600;

    let mut distinct_request_times: BTreeSet<u64> = BTreeSet::new();
    for record in &passengers {
        distinct_request_times.insert(record.request_time);
    }

    for record in passengers {
        let origin = LocationRecord {
            source: record.origin_source,
            target: record.origin_target,
            loc: record.origin_loc,
        }
        .resolve(&graph);
        let destination = LocationRecord {
            source: record.destination_source,
            target: record.destination_target,
            loc: record.destination_loc,
        }
        .resolve(&graph);

        let passenger = world
            .spawn(Passenger {
                id: record.id,
                request_time: record.request_time,
                origin,
                destination,
                trip_distance: record.trip_distance,
                trip_duration: record.trip_duration,
                patience: record.patience,
                expired_time: record.request_time + record.patience,
                value_of_time: record.value_of_time,
                utility: UtilityParams {
                    const_hv: record.const_hv,
                    const_av: record.const_av,
                    fare_coef_hv: record.fare_coef_hv,
                    fare_coef_av: record.fare_coef_av,
                    base_fare_hv: record.base_fare_hv,
                    base_fare_av: record.base_fare_av,
                    unit_fare_hv: record.unit_fare_hv,
                    unit_fare_av: record.unit_fare_av,
                    const_outside: record.const_outside,
                },
                chosen_mode: ChosenMode::Outside,
                fare: 0.0,
            })
            .id();
        clock.schedule_at(
            record.request_time,
            EventKind::NewPassenger,
            Some(EventSubject::Passenger(passenger)),
            0,
        );
        forecasts.record_demand(record.request_time);
    }

    for request_time in distinct_request_times {
        clock.schedule_at(request_time, EventKind::UpdatePhi, None, 0);
    }

    for i in 0..config.hv_fleet_size {
        let entry_time = sample_hv_entry_time(&mut rng, seconds_in_day);
        forecasts.record_hv_supply(entry_time);
        let neoclassical = rng.gen_bool(config.neoclassical);
        let vehicle = world
            .spawn((
                Vehicle {
                    id: i,
                    kind: Kind::Hv,
                    location: crate::location::Location::Intersection(0),
                    state: VehicleState::Inactive,
                    entry_time,
                    last_assignment_time: 0,
                    occupied_seconds: 0,
                    income: 0.0,
                    active_trip: None,
                },
                HvProfile {
                    neoclassical,
                    hourly_cost: 15.0 + rng.gen_f64() * 10.0,
                    target_income: 80.0 + rng.gen_f64() * 120.0,
                },
            ))
            .id();
        clock.schedule_at(entry_time, EventKind::NewHv, Some(EventSubject::Vehicle(vehicle)), 0);
    }

    for i in 0..config.av_fleet_size {
        let depot_node = depots
            .get((i as usize) % depots.len().max(1))
            .map(|d| d.node)
            .unwrap_or(0);
        let vehicle = world
            .spawn((
                Vehicle {
                    id: config.hv_fleet_size + i,
                    kind: Kind::Av,
                    location: crate::location::Location::Intersection(depot_node),
                    state: VehicleState::Inactive,
                    entry_time: 0,
                    last_assignment_time: 0,
                    occupied_seconds: 0,
                    income: 0.0,
                    active_trip: None,
                },
                AvProfile { depot: depot_node },
            ))
            .id();
        if i < config.av_initial_size {
            clock.schedule_at(0, EventKind::ActivateAv, Some(EventSubject::Vehicle(vehicle)), 1);
        }
    }

    let mut t = config.match_interval;
    while t < seconds_in_day {
        clock.schedule_at(t, EventKind::Assign, None, config.match_interval as i64);
        t += config.match_interval;
    }

    let mut t = 1u64;
    while t < seconds_in_day {
        clock.schedule_at(t, EventKind::UpdateStates, None, 0);
        t += 1;
    }

    let control_interval = config.mpc_control_interval.round() as u64;
    let mut t = (config.mpc_start_hour * 3600.0).round() as u64;
    let end = (config.mpc_end_hour * 3600.0).round() as u64;
    while t < end {
        clock.schedule_at(t, EventKind::Mpc, None, 0);
        t += control_interval;
    }

    let mpc_config = MpcConfig {
        start_hour: config.mpc_start_hour,
        end_hour: config.mpc_end_hour,
        control_interval_s: config.mpc_control_interval,
        prediction_interval_s: config.mpc_prediction_interval,
        steps: config.mpc_steps,
        control_steps: config.mpc_control_steps,
    };

    world.insert_resource(graph);
    world.insert_resource(clock);
    world.insert_resource(market);
    world.insert_resource(histograms);
    world.insert_resource(forecasts);
    world.insert_resource(mpc_config);
    world.insert_resource(MpcRuntime::default());
    world.insert_resource(rng);
    world.insert_resource(MatcherResource(Box::new(HungarianMatcher)));
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(config);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn builds_a_minimal_scenario_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let map_file = write_csv(&dir, "map.csv", "source,target,distance,duration\n0,1,100.0,10.0\n1,0,100.0,10.0\n");
        let shortest_path_time_file = write_csv(
            &dir,
            "spt.csv",
            "source,target,duration,distance\n0,1,10.0,100.0\n1,0,10.0,100.0\n",
        );
        let depot_file = write_csv(&dir, "depots.csv", "vehicle_id,node\n0,0\n");
        let passenger_file = write_csv(
            &dir,
            "passengers.csv",
            "id,request_time,origin_source,origin_target,origin_loc,destination_source,destination_target,destination_loc,trip_distance,trip_duration,patience,value_of_time,const_hv,const_av,fare_coef_hv,fare_coef_av,base_fare_hv,base_fare_av,unit_fare_hv,unit_fare_av,const_outside\n0,0,0,1,0.0,1,0,0.0,100.0,60.0,300,0.1,1.0,1.0,1.0,1.0,2.5,2.5,30.0,30.0,0.5\n",
        );

        let config = SimConfig {
            passenger_file,
            map_file,
            shortest_path_time_file,
            depot_file,
            hv_fleet_size: 2,
            av_fleet_size: 1,
            av_initial_size: 1,
            match_interval: 30,
            default_waiting_time: 300,
            maximum_work_duration: 28800,
            mpc_start_hour: 6.0,
            mpc_end_hour: 6.1,
            mpc_control_interval: 300.0,
            mpc_prediction_interval: 60.0,
            mpc_steps: 5,
            mpc_control_steps: 2,
            neoclassical: 0.5,
            data_output_path: dir.path().to_str().unwrap().to_string(),
            output_number: 1,
        };

        let mut world = World::new();
        build_scenario(&mut world, config, 7).unwrap();
        assert!(world.contains_resource::<RoadGraph>());
        assert!(world.contains_resource::<SimulationClock>());
        let clock = world.resource::<SimulationClock>();
        assert!(clock.pending_event_count() > 0);
    }
}
