//! Receding-horizon MPC invocation (`Mpc`, §4.7): build the model from live
//! state, call the solver, apply the first active interval's controls.

use std::collections::HashMap;

use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::CurrentEvent;
use crate::config::SimConfig;
use crate::ecs::Kind;
use crate::forecast::ExogenousForecasts;
use crate::market::{MarketState, PickupDropoffHistograms};
use crate::mpc::corrections::CorrectionStreams;
use crate::mpc::model::{KindState, MarketParams, ModelSpec, StepInputs};
use crate::mpc::solver::solve;
use crate::mpc::{MpcConfig, MpcRuntime, SolveStatus};
use crate::rng::SimRng;
use crate::telemetry::SimTelemetry;

/// Internal model constants not exposed as configuration (§4.7's objective
/// coefficients): fixed across a run, not tuned per scenario.
const BASE_FARE: f64 = 2.5;
const OP_COST: f64 = 0.02;
const VAC_COST: f64 = 0.01;
const BETA: f64 = 0.1;
const HALF_EXIT_RATIO: f64 = 0.5;
const PENALTY: f64 = 10.0;
const OUTSIDE_PENALTY: f64 = 5.0;

pub fn on_mpc(
    current: Res<CurrentEvent>,
    config: Res<SimConfig>,
    mpc_config: Res<MpcConfig>,
    mut market: ResMut<MarketState>,
    mut histograms: ResMut<PickupDropoffHistograms>,
    forecasts: Res<ExogenousForecasts>,
    mut runtime: ResMut<MpcRuntime>,
    mut rng: ResMut<SimRng>,
    mut telemetry: ResMut<SimTelemetry>,
) {
    let now = current.0.time;
    histograms.prune_before(now);
    if !mpc_config.in_window(now) {
        return;
    }

    let tau_k = mpc_config.prediction_interval_s;
    let steps_per_control = mpc_config.steps_per_control();

    let initial_state: HashMap<Kind, KindState> = Kind::both()
        .into_iter()
        .map(|k| {
            let counts = market.counts(k);
            (
                k,
                KindState {
                    pw: counts.waiting as f64,
                    nv: counts.vacant as f64,
                    na: counts.assigned as f64,
                    no: counts.occupied as f64,
                },
            )
        })
        .collect();

    let inputs: HashMap<Kind, StepInputs> = Kind::both()
        .into_iter()
        .map(|k| {
            let demand = forecasts.demand_steps(now, tau_k as u64, mpc_config.steps);
            let hv_supply = if k == Kind::Hv {
                forecasts.hv_supply_steps(now, tau_k as u64, mpc_config.steps)
            } else {
                vec![0.0; mpc_config.steps]
            };
            (k, StepInputs { demand, hv_supply })
        })
        .collect();

    let market_params: HashMap<Kind, MarketParams> = Kind::both()
        .into_iter()
        .map(|k| {
            (
                k,
                MarketParams {
                    ta: market.running_ta.get(&k).copied().unwrap_or(300.0).max(1.0),
                    to: market.running_to.get(&k).copied().unwrap_or(600.0).max(1.0),
                    hv_wage: market.hv_wage,
                    base_fare: BASE_FARE,
                    op_cost: OP_COST,
                    vac_cost: VAC_COST,
                    beta: BETA,
                    half_exit_ratio: HALF_EXIT_RATIO,
                    penalty: PENALTY,
                    outside_penalty: OUTSIDE_PENALTY,
                },
            )
        })
        .collect();

    let model = ModelSpec {
        steps: mpc_config.steps,
        control_steps: mpc_config.control_steps,
        steps_per_control,
        initial_state,
        inputs,
        market: market_params,
        fare_bounds: (0.0, 180.0),
        fleet_delta_bounds: (
            -(market.counts(Kind::Av).vacant as f64),
            (config.av_fleet_size.saturating_sub(market.counts(Kind::Av).total)) as f64,
        ),
    };

    // The fixed duration-draw distribution is approximated by the current
    // running-average pickup/trip durations: the market aggregator does not
    // retain raw per-trip samples, only running means.
    let durations: HashMap<Kind, Vec<f64>> = Kind::both()
        .into_iter()
        .map(|k| (k, vec![market.running_ta.get(&k).copied().unwrap_or(tau_k)]))
        .collect();
    let mut correction_rng = rng.child(runtime.invocation_count);
    let corrections = CorrectionStreams::sample(&mut correction_rng, tau_k, &durations, &durations);

    let outcome = solve(&model, &corrections, &runtime.last_controls);

    let (hv_fare, av_fare, av_fleet_delta) = match outcome.status {
        SolveStatus::Failed => {
            market.av_fleet_delta = 0;
            (market.unit_fare[&Kind::Hv], market.unit_fare[&Kind::Av], 0.0)
        }
        _ => {
            let applied = outcome.controls.at(0);
            market.unit_fare.insert(Kind::Hv, applied.hv_fare);
            market.unit_fare.insert(Kind::Av, applied.av_fare);
            market.av_fleet_delta = applied.av_fleet_delta.round() as i64;
            (applied.hv_fare, applied.av_fare, applied.av_fleet_delta)
        }
    };

    telemetry.record_control(now, &format!("{:?}", outcome.status), hv_fare, av_fare, av_fleet_delta);
    for kind in Kind::both() {
        if let Some(states) = outcome.trajectory.state_by_kind.get(&kind) {
            for (step, state) in states.iter().enumerate() {
                telemetry.record_prediction_step(now, kind, step, *state);
            }
        }
    }

    runtime.last_status = Some(outcome.status);
    runtime.last_trajectory = outcome.trajectory;
    runtime.last_controls = outcome.controls;
    runtime.invocation_count += 1;
}
