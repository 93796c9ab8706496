//! End-of-window drain (§4.1): once the clock empties, expire every waiting
//! passenger and force-exit every vacant vehicle, without disturbing any
//! `TripCompletion` events already queued for vehicles still in transit.

use bevy_ecs::prelude::{Entity, World};

use crate::ecs::{AvProfile, Vehicle, Waiting};
use crate::market::MarketState;

use super::vehicle::force_drain_vehicles;

pub fn drain(world: &mut World) {
    let waiting_entities: Vec<(Entity, crate::ecs::Kind)> = world
        .query::<(Entity, &Waiting)>()
        .iter(world)
        .map(|(e, w)| (e, w.kind))
        .collect();

    world.resource_scope(|world, mut market: bevy_ecs::prelude::Mut<MarketState>| {
        for (entity, kind) in &waiting_entities {
            world.entity_mut(*entity).remove::<Waiting>();
            world.despawn(*entity);
            let counts = market.counts_mut(*kind);
            counts.waiting = counts.waiting.saturating_sub(1);
            market.record_expiration(*kind);
        }
    });

    world.resource_scope(|world, mut market: bevy_ecs::prelude::Mut<MarketState>| {
        let mut query = world.query::<(&mut Vehicle, Option<&AvProfile>)>();
        let mut owned: Vec<_> = query.iter_mut(world).collect();
        let mut items: Vec<(&mut Vehicle, Option<&AvProfile>)> =
            owned.iter_mut().map(|(v, p)| (&mut **v, *p)).collect();
        force_drain_vehicles(&mut market, &mut items);
    });
}
