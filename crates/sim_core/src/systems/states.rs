//! Per-second market aggregation (`UpdateStates`, §4.6). Passenger-patience
//! expiration is evaluated on the `Assign` tick instead (§4.3/§4.4), not here.

use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::CurrentEvent;
use crate::ecs::Kind;
use crate::market::MarketState;
use crate::telemetry::SimTelemetry;

/// Simulated seconds before occupancy is considered meaningful (§4.6 warm-up).
const WARMUP_SECONDS: u64 = 3600;

pub fn on_update_states(current: Res<CurrentEvent>, mut market: ResMut<MarketState>, mut telemetry: ResMut<SimTelemetry>) {
    let now = current.0.time;

    for kind in Kind::both() {
        let counts = market.counts(kind);
        counts.check_invariant(kind);
        if now > WARMUP_SECONDS && counts.total > 0 {
            let occupancy = counts.occupied as f64 / counts.total as f64;
            market.occupancy.insert(kind, occupancy);
        }
        let utilisation = market.utilisation.get(&kind).copied().unwrap_or(0.0);
        let occupancy = market.occupancy.get(&kind).copied().unwrap_or(0.0);
        telemetry.record_utilisation(now, kind, utilisation, occupancy);
    }
}
