//! Refresh the per-kind ETA-ratio correction factor (`UpdatePhi`, §4.5).

use bevy_ecs::prelude::ResMut;

use crate::ecs::Kind;
use crate::market::MarketState;
use crate::mode_choice::phi_for_queue;

pub fn on_update_phi(mut market: ResMut<MarketState>) {
    for kind in Kind::both() {
        let counts = market.counts(kind);
        let phi = phi_for_queue(counts.waiting, counts.vacant);
        market.phi.insert(kind, phi);
    }
}
