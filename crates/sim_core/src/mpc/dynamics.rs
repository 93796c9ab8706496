//! Per-step (`t -> t + tau_k`) state transition (§4.7 "Dynamics per step").

use crate::ecs::Kind;
use crate::mode_choice::generalized_cost;

use super::model::{ControlStep, KindState, MarketParams};

/// `(choiceProb_HV(t), choiceProb_AV(t))`: the §4.4 logit over the full
/// three-way choice set {HV, AV, outside}, using the control-variable fares
/// and each kind's current running-average ta/to in place of a
/// per-passenger nearest-ETA draw. Both weights share one denominator so the
/// two probabilities never sum past 1.
#[allow(clippy::too_many_arguments)]
pub fn choice_probabilities(
    hv_fare_per_hour: f64,
    av_fare_per_hour: f64,
    hv_market: &MarketParams,
    av_market: &MarketParams,
    const_hv: f64,
    const_av: f64,
    const_outside: f64,
    value_of_time: f64,
    phi: f64,
) -> (f64, f64) {
    let weight = |fare_per_hour: f64, const_k: f64, market: &MarketParams| {
        let fare = fare_per_hour / 3600.0 * (120.0 * market.to.max(1.0).ln());
        let gc_k = generalized_cost(1.0, const_k, 1.0, fare, value_of_time, phi, market.ta, market.ta);
        (-gc_k).exp()
    };
    let w_hv = weight(hv_fare_per_hour, const_hv, hv_market);
    let w_av = weight(av_fare_per_hour, const_av, av_market);
    let w_out = (-const_outside).exp();
    let total = w_hv + w_av + w_out;
    (w_hv / total, w_av / total)
}

/// Advance `state` by one prediction step. `demand`/`hv_supply` are this
/// step's exogenous inflows; `pickup_correction`/`dropoff_correction` are
/// this step's synthetic correction estimates; `control` is the active
/// interval's decision variables; `at_control_boundary` gates AV fleet-size
/// application to control-interval boundaries only.
#[allow(clippy::too_many_arguments)]
pub fn step(
    kind: Kind,
    state: KindState,
    demand: f64,
    choice_prob: f64,
    hv_supply: f64,
    pickup_correction: f64,
    dropoff_correction: f64,
    control: ControlStep,
    at_control_boundary: bool,
    market: &MarketParams,
    tau_k: f64,
    tau_c: f64,
) -> KindState {
    let match_k = state.pw.min(state.nv).max(0.0);
    let expiration_k = market.beta * (tau_k / tau_c) * (state.pw - state.nv).max(0.0);

    let supply_inflow = match kind {
        Kind::Hv => hv_supply,
        Kind::Av => {
            if at_control_boundary {
                control.av_fleet_delta
            } else {
                0.0
            }
        }
    };

    let exit_discount = if kind == Kind::Hv {
        1.0 - market.half_exit_ratio
    } else {
        1.0
    };

    KindState {
        pw: (state.pw + demand * choice_prob - match_k - expiration_k).max(0.0),
        nv: (state.nv + supply_inflow - match_k + exit_discount * dropoff_correction).max(0.0),
        na: (state.na + match_k - pickup_correction).max(0.0),
        no: (state.no + pickup_correction - dropoff_correction).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MarketParams {
        MarketParams {
            ta: 300.0,
            to: 600.0,
            hv_wage: 20.0,
            base_fare: 2.5,
            op_cost: 0.01,
            vac_cost: 0.005,
            beta: 0.1,
            half_exit_ratio: 0.5,
            penalty: 10.0,
            outside_penalty: 5.0,
        }
    }

    #[test]
    fn choice_probabilities_never_double_count_demand() {
        let (p_hv, p_av) = choice_probabilities(20.0, 25.0, &params(), &params(), 0.0, 0.0, 0.0, 1.0, 1.0);
        assert!(p_hv > 0.0 && p_av > 0.0);
        assert!(p_hv + p_av < 1.0);
    }

    #[test]
    fn match_count_is_bounded_by_smaller_queue() {
        let state = KindState { pw: 10.0, nv: 3.0, na: 0.0, no: 0.0 };
        let next = step(
            Kind::Hv,
            state,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            ControlStep::default(),
            false,
            &params(),
            60.0,
            300.0,
        );
        // match_k = min(10,3) = 3, so na should increase by 3 (minus pickup_correction=0)
        assert_eq!(next.na, 3.0);
    }

    #[test]
    fn av_fleet_delta_only_applies_at_control_boundary() {
        let state = KindState { pw: 0.0, nv: 5.0, na: 0.0, no: 0.0 };
        let control = ControlStep { hv_fare: 0.0, av_fare: 0.0, av_fleet_delta: 2.0 };
        let boundary = step(Kind::Av, state, 0.0, 0.0, 0.0, 0.0, 0.0, control, true, &params(), 60.0, 300.0);
        let non_boundary = step(Kind::Av, state, 0.0, 0.0, 0.0, 0.0, 0.0, control, false, &params(), 60.0, 300.0);
        assert_eq!(boundary.nv, 7.0);
        assert_eq!(non_boundary.nv, 5.0);
    }

    #[test]
    fn states_never_go_negative() {
        let state = KindState { pw: 1.0, nv: 0.0, na: 0.0, no: 0.0 };
        let next = step(
            Kind::Hv,
            state,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            ControlStep::default(),
            false,
            &params(),
            60.0,
            300.0,
        );
        assert!(next.pw >= 0.0 && next.nv >= 0.0 && next.na >= 0.0 && next.no >= 0.0);
    }
}
