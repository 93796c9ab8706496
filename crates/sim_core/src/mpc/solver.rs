//! The NLP collaborator behind the `solve(model) -> (status, controls,
//! trajectory)` boundary (§9 "MPC solver boundary"). No interior-point or
//! QP crate exists anywhere the simulator's stack draws from, so this is a
//! small hand-rolled projected-gradient-ascent optimiser: numeric gradient
//! of the §4.7 objective with respect to the control vector, a line search
//! clipped to the control bounds, repeated for a bounded iteration budget.
//! The simulator only ever sees it through `solve()`; swapping in a real
//! interior-point solver later means rewriting this file alone.

use crate::ecs::Kind;

use super::corrections::CorrectionStreams;
use super::dynamics::{choice_probabilities, step};
use super::model::{ControlStep, Controls, KindState, ModelSpec, SolveOutcome, SolveStatus, Trajectory};

const MAX_ITERATIONS: usize = 60;
const GRADIENT_EPSILON: f64 = 1e-3;
const CONVERGENCE_TOLERANCE: f64 = 1e-4;
const INITIAL_STEP: f64 = 0.5;

/// Simulate the full horizon under a fixed control sequence, returning the
/// realised trajectory and the §4.7 objective value.
fn simulate(model: &ModelSpec, corrections: &CorrectionStreams, controls: &Controls) -> (Trajectory, f64) {
    let tau_k = corrections.tau_k();
    let tau_c = tau_k * model.steps_per_control as f64;

    let mut state: std::collections::HashMap<Kind, KindState> = model.initial_state.clone();
    let mut trajectory = Trajectory::default();
    for kind in Kind::both() {
        trajectory
            .state_by_kind
            .insert(kind, vec![*state.get(&kind).unwrap_or(&KindState::default())]);
    }

    let mut objective = 0.0;
    let mut pickup_correction: std::collections::HashMap<Kind, Vec<f64>> = Kind::both()
        .into_iter()
        .map(|k| (k, vec![0.0; model.steps]))
        .collect();
    let mut dropoff_correction = pickup_correction.clone();

    for s in 0..model.steps {
        let active_interval = s / model.steps_per_control;
        let control = controls.at(active_interval);
        let at_boundary = s % model.steps_per_control == 0;

        let (choice_prob_hv, choice_prob_av) = match (model.market.get(&Kind::Hv), model.market.get(&Kind::Av)) {
            (Some(hv_market), Some(av_market)) => {
                choice_probabilities(control.hv_fare, control.av_fare, hv_market, av_market, 0.0, 0.0, 0.0, 1.0, 1.0)
            }
            _ => (0.0, 0.0),
        };

        for kind in Kind::both() {
            let Some(inputs) = model.inputs.get(&kind) else { continue };
            let Some(market) = model.market.get(&kind) else { continue };
            let cur = *state.get(&kind).unwrap_or(&KindState::default());

            let choice_prob = match kind {
                Kind::Hv => choice_prob_hv,
                Kind::Av => choice_prob_av,
            };

            let demand = inputs.demand.get(s).copied().unwrap_or(0.0);
            let hv_supply = inputs.hv_supply.get(s).copied().unwrap_or(0.0);
            let pc = pickup_correction[&kind][s];
            let dc = dropoff_correction[&kind][s];

            let next = step(
                kind, cur, demand, choice_prob, hv_supply, pc, dc, control, at_boundary, market, tau_k, tau_c,
            );

            let match_k = cur.pw.min(cur.nv).max(0.0);
            corrections.apply_match(
                kind,
                s,
                match_k,
                &mut pickup_correction.get_mut(&kind).unwrap()[..],
                &mut dropoff_correction.get_mut(&kind).unwrap()[..],
            );

            let revenue = match kind {
                Kind::Av => match_k * (control.av_fare * market.to / 3600.0 + market.base_fare),
                Kind::Hv => match_k * ((control.hv_fare - market.hv_wage) * market.to / 3600.0 + market.base_fare),
            };
            let op_cost = if kind == Kind::Av {
                tau_k * (market.op_cost * (next.na + next.no) + market.vac_cost * next.nv)
            } else {
                0.0
            };
            let expiration = market.beta * (tau_k / tau_c) * (cur.pw - cur.nv).max(0.0);
            objective += revenue - op_cost - market.penalty * expiration;

            state.insert(kind, next);
            trajectory.state_by_kind.get_mut(&kind).unwrap().push(next);
        }
    }
    (trajectory, objective)
}

fn clamp_control(control: &mut ControlStep, model: &ModelSpec) {
    control.hv_fare = control.hv_fare.clamp(model.fare_bounds.0, model.fare_bounds.1);
    control.av_fare = control.av_fare.clamp(model.fare_bounds.0, model.fare_bounds.1);
    control.av_fleet_delta = control
        .av_fleet_delta
        .clamp(model.fleet_delta_bounds.0, model.fleet_delta_bounds.1);
}

fn objective_at(model: &ModelSpec, corrections: &CorrectionStreams, controls: &Controls) -> f64 {
    simulate(model, corrections, controls).1
}

/// Numeric gradient of the objective with respect to each active interval's
/// three controls, via central differences.
fn gradient(model: &ModelSpec, corrections: &CorrectionStreams, controls: &Controls) -> Vec<ControlStep> {
    let mut grad = vec![ControlStep::default(); controls.steps.len()];
    for i in 0..controls.steps.len() {
        for field in 0..3 {
            let mut plus = controls.clone();
            let mut minus = controls.clone();
            bump(&mut plus.steps[i], field, GRADIENT_EPSILON);
            bump(&mut minus.steps[i], field, -GRADIENT_EPSILON);
            let f_plus = objective_at(model, corrections, &plus);
            let f_minus = objective_at(model, corrections, &minus);
            let d = (f_plus - f_minus) / (2.0 * GRADIENT_EPSILON);
            set_field(&mut grad[i], field, d);
        }
    }
    grad
}

fn bump(control: &mut ControlStep, field: usize, delta: f64) {
    match field {
        0 => control.hv_fare += delta,
        1 => control.av_fare += delta,
        _ => control.av_fleet_delta += delta,
    }
}

fn set_field(control: &mut ControlStep, field: usize, value: f64) {
    match field {
        0 => control.hv_fare = value,
        1 => control.av_fare = value,
        _ => control.av_fleet_delta = value,
    }
}

/// Solve the receding-horizon NLP via projected gradient ascent, starting
/// from `warm_start` (typically the previous invocation's converged
/// controls, or the bound midpoint on the first call).
pub fn solve(model: &ModelSpec, corrections: &CorrectionStreams, warm_start: &Controls) -> SolveOutcome {
    if model.control_steps == 0 || model.steps == 0 {
        return SolveOutcome {
            status: SolveStatus::Failed,
            controls: Controls::default(),
            trajectory: Trajectory::default(),
        };
    }

    let mut controls = if warm_start.steps.len() == model.control_steps {
        warm_start.clone()
    } else {
        let mid = ControlStep {
            hv_fare: (model.fare_bounds.0 + model.fare_bounds.1) / 2.0,
            av_fare: (model.fare_bounds.0 + model.fare_bounds.1) / 2.0,
            av_fleet_delta: 0.0,
        };
        Controls { steps: vec![mid; model.control_steps] }
    };
    for c in &mut controls.steps {
        clamp_control(c, model);
    }

    let mut prev_objective = objective_at(model, corrections, &controls);
    let mut status = SolveStatus::MaxIterationsReached;
    let mut step_size = INITIAL_STEP;

    for _ in 0..MAX_ITERATIONS {
        let grad = gradient(model, corrections, &controls);
        let norm: f64 = grad
            .iter()
            .map(|g| g.hv_fare.powi(2) + g.av_fare.powi(2) + g.av_fleet_delta.powi(2))
            .sum::<f64>()
            .sqrt();
        if norm < CONVERGENCE_TOLERANCE {
            status = SolveStatus::Converged;
            break;
        }

        let mut candidate = controls.clone();
        for (c, g) in candidate.steps.iter_mut().zip(&grad) {
            c.hv_fare += step_size * g.hv_fare;
            c.av_fare += step_size * g.av_fare;
            c.av_fleet_delta += step_size * g.av_fleet_delta;
            clamp_control(c, model);
        }
        let candidate_objective = objective_at(model, corrections, &candidate);

        if candidate_objective >= prev_objective {
            controls = candidate;
            prev_objective = candidate_objective;
            step_size *= 1.2;
        } else {
            step_size *= 0.5;
            if step_size < 1e-6 {
                status = SolveStatus::Converged;
                break;
            }
        }
    }

    let (trajectory, _) = simulate(model, corrections, &controls);
    SolveOutcome { status, controls, trajectory }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::mpc::model::MarketParams;
    use crate::rng::SimRng;

    fn trivial_model() -> ModelSpec {
        let market = MarketParams {
            ta: 300.0,
            to: 600.0,
            hv_wage: 15.0,
            base_fare: 2.5,
            op_cost: 0.02,
            vac_cost: 0.01,
            beta: 0.1,
            half_exit_ratio: 0.5,
            penalty: 5.0,
            outside_penalty: 2.0,
        };
        let inputs = super::super::model::StepInputs {
            demand: vec![2.0; 5],
            hv_supply: vec![1.0; 5],
        };
        ModelSpec {
            steps: 5,
            control_steps: 1,
            steps_per_control: 5,
            initial_state: Kind::both().into_iter().map(|k| (k, KindState { pw: 3.0, nv: 3.0, na: 0.0, no: 0.0 })).collect(),
            inputs: Kind::both().into_iter().map(|k| (k, inputs.clone())).collect(),
            market: Kind::both().into_iter().map(|k| (k, market)).collect(),
            fare_bounds: (0.0, 180.0),
            fleet_delta_bounds: (-5.0, 5.0),
        }
    }

    #[test]
    fn solve_converges_within_bounds() {
        let model = trivial_model();
        let durations: HashMap<Kind, Vec<f64>> = Kind::both().into_iter().map(|k| (k, vec![60.0, 120.0])).collect();
        let mut rng = SimRng::new(9).child(3);
        let corrections = CorrectionStreams::sample(&mut rng, 60.0, &durations, &durations);
        let outcome = solve(&model, &corrections, &Controls::default());
        assert_ne!(outcome.status, SolveStatus::Failed);
        let c = outcome.controls.at(0);
        assert!(c.hv_fare >= 0.0 && c.hv_fare <= 180.0);
        assert!(c.av_fare >= 0.0 && c.av_fare <= 180.0);
        assert!(c.av_fleet_delta >= -5.0 && c.av_fleet_delta <= 5.0);
    }

    #[test]
    fn empty_horizon_fails_cleanly() {
        let mut model = trivial_model();
        model.steps = 0;
        let durations: HashMap<Kind, Vec<f64>> = HashMap::new();
        let mut rng = SimRng::new(1).child(0);
        let corrections = CorrectionStreams::sample(&mut rng, 60.0, &durations, &durations);
        let outcome = solve(&model, &corrections, &Controls::default());
        assert_eq!(outcome.status, SolveStatus::Failed);
    }
}
