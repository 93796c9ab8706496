//! Receding-horizon MPC controller (§4.7): builds a `ModelSpec` from live
//! simulator state, calls the opaque `solver::solve` collaborator, and
//! applies the first active interval's controls back to `MarketState`.

pub mod corrections;
pub mod dynamics;
pub mod model;
pub mod solver;

use bevy_ecs::prelude::Resource;

pub use model::{ControlStep, Controls, ModelSpec, SolveOutcome, SolveStatus, Trajectory};

/// Static MPC configuration, loaded once at scenario build time (§6).
#[derive(Debug, Clone, Copy, Resource)]
pub struct MpcConfig {
    pub start_hour: f64,
    pub end_hour: f64,
    pub control_interval_s: f64,
    pub prediction_interval_s: f64,
    pub steps: usize,
    pub control_steps: usize,
}

impl MpcConfig {
    pub fn steps_per_control(&self) -> usize {
        (self.control_interval_s / self.prediction_interval_s).round().max(1.0) as usize
    }

    pub fn in_window(&self, simulated_seconds: u64) -> bool {
        let hour = simulated_seconds as f64 / 3600.0;
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// MPC-owned mutable state carried across invocations: the warm-start
/// control sequence and the last solve's outcome (for `prediction_data`,
/// `control_data` output and the §8.5 "fare must not rise under oversupply"
/// soft property).
#[derive(Resource, Default)]
pub struct MpcRuntime {
    pub last_controls: Controls,
    pub last_status: Option<SolveStatus>,
    pub last_trajectory: Trajectory,
    pub invocation_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_are_half_open() {
        let cfg = MpcConfig {
            start_hour: 6.0,
            end_hour: 22.0,
            control_interval_s: 300.0,
            prediction_interval_s: 60.0,
            steps: 30,
            control_steps: 5,
        };
        assert!(!cfg.in_window(5 * 3600));
        assert!(cfg.in_window(6 * 3600));
        assert!(!cfg.in_window(22 * 3600));
        assert_eq!(cfg.steps_per_control(), 5);
    }
}
