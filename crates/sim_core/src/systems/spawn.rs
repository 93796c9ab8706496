//! Passenger arrival (`NewPassenger`, §4.4): mode choice over {HV, AV,
//! Outside} via the multinomial logit, then either joining the matching
//! queue for the chosen kind or leaving the market immediately.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};

use crate::clock::{CurrentEvent, EventSubject};
use crate::ecs::{ChosenMode, Kind, Passenger, Waiting};
use crate::market::MarketState;
use crate::mode_choice::{fare, generalized_cost, softmax_choice};
use crate::rng::SimRng;
use crate::telemetry::SimTelemetry;

fn subject_passenger(current: &CurrentEvent) -> Entity {
    match current.0.subject {
        Some(EventSubject::Passenger(e)) => e,
        other => panic!("expected a passenger subject for NewPassenger, got {:?}", other),
    }
}

pub fn on_new_passenger(
    current: Res<CurrentEvent>,
    mut market: ResMut<MarketState>,
    mut rng: ResMut<SimRng>,
    mut telemetry: ResMut<SimTelemetry>,
    mut commands: Commands,
    mut passengers: Query<&mut Passenger>,
) {
    let entity = subject_passenger(&current);
    let mut passenger = passengers.get_mut(entity).expect("NewPassenger subject must carry Passenger");

    let hv_phi = market.phi.get(&Kind::Hv).copied().unwrap_or(1.0);
    let av_phi = market.phi.get(&Kind::Av).copied().unwrap_or(1.0);
    let hv_eta = market.running_ta.get(&Kind::Hv).copied().unwrap_or(300.0);
    let av_eta = market.running_ta.get(&Kind::Av).copied().unwrap_or(300.0);
    let default_eta = 600.0;

    let hv_fare = fare(passenger.utility.base_fare_hv, passenger.utility.unit_fare_hv, passenger.trip_duration);
    let av_fare = fare(passenger.utility.base_fare_av, passenger.utility.unit_fare_av, passenger.trip_duration);

    let gc_hv = generalized_cost(
        1.0,
        passenger.utility.const_hv,
        passenger.utility.fare_coef_hv,
        hv_fare,
        passenger.value_of_time,
        hv_phi,
        hv_eta,
        default_eta,
    );
    let gc_av = generalized_cost(
        1.0,
        passenger.utility.const_av,
        passenger.utility.fare_coef_av,
        av_fare,
        passenger.value_of_time,
        av_phi,
        av_eta,
        default_eta,
    );
    let gc_outside = passenger.utility.const_outside;

    let choice = softmax_choice(&mut rng, &[gc_hv, gc_av, gc_outside]);
    passenger.chosen_mode = match choice {
        0 => ChosenMode::Hv,
        1 => ChosenMode::Av,
        _ => ChosenMode::Outside,
    };

    match passenger.chosen_mode {
        ChosenMode::Hv => {
            passenger.fare = hv_fare;
            passenger.expired_time = passenger.request_time + passenger.patience;
            commands.entity(entity).insert(Waiting { kind: Kind::Hv });
            market.counts_mut(Kind::Hv).waiting += 1;
        }
        ChosenMode::Av => {
            passenger.fare = av_fare;
            passenger.expired_time = passenger.request_time + passenger.patience;
            commands.entity(entity).insert(Waiting { kind: Kind::Av });
            market.counts_mut(Kind::Av).waiting += 1;
        }
        ChosenMode::Outside => {
            commands.entity(entity).despawn();
        }
    }

    telemetry.record_passenger(
        passenger.request_time,
        passenger.id,
        passenger.chosen_mode,
        passenger.fare,
        passenger.trip_distance,
        passenger.trip_duration,
    );
}
