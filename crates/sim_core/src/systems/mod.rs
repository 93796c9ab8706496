//! One bevy_ecs system per `EventKind`, gated by `run_if` in
//! `runner::simulation_schedule`. Each system reads `CurrentEvent` to find
//! the triggering event's subject and payload, mutates world state, and may
//! push successor events onto `SimulationClock`.

pub mod assign;
pub mod lifecycle;
pub mod mpc;
pub mod phi;
pub mod spawn;
pub mod states;
pub mod vehicle;
