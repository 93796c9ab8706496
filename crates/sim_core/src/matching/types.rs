use bevy_ecs::prelude::Entity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub vehicle: Entity,
    pub passenger: Entity,
    pub pickup_duration_s: f64,
}
