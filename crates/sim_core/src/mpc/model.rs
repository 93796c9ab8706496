//! The receding-horizon model spec and solve result: the narrow interface
//! between the simulator and the NLP collaborator (§4.7, §9 "MPC solver
//! boundary"). Building a `ModelSpec` and interpreting a `SolveOutcome` is
//! the simulator's job; nothing outside `solver.rs` needs to know how the
//! optimisation is actually carried out.

use std::collections::HashMap;

use crate::ecs::Kind;

/// Per-kind, per-step state: `pw` waiting, `nv` vacant, `na` assigned, `no` occupied.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindState {
    pub pw: f64,
    pub nv: f64,
    pub na: f64,
    pub no: f64,
}

/// Exogenous inputs, one entry per prediction step. Pickup/dropoff
/// corrections are not carried here: they depend on each trajectory's own
/// simulated match counts, so the solver recomputes them per evaluation from
/// a `CorrectionStreams` held fixed for the whole invocation.
#[derive(Debug, Clone, Default)]
pub struct StepInputs {
    pub demand: Vec<f64>,
    pub hv_supply: Vec<f64>,
}

/// Bounds and running-average parameters the dynamics and objective need but
/// that do not themselves vary across the horizon.
#[derive(Debug, Clone, Copy)]
pub struct MarketParams {
    pub ta: f64,
    pub to: f64,
    pub hv_wage: f64,
    pub base_fare: f64,
    pub op_cost: f64,
    pub vac_cost: f64,
    pub beta: f64,
    pub half_exit_ratio: f64,
    pub penalty: f64,
    pub outside_penalty: f64,
}

/// A fully-specified receding-horizon instance: initial state, exogenous
/// inputs over `steps` prediction steps, and the bounds/coefficients the
/// objective and dynamics need. `control_steps` (`Nc`) of the `steps` (`N`)
/// prediction steps carry an independently-optimised control; the rest share
/// the last active control.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub steps: usize,
    pub control_steps: usize,
    /// How many prediction steps make up one control interval (`tau_c / tau_k`).
    pub steps_per_control: usize,
    pub initial_state: HashMap<Kind, KindState>,
    pub inputs: HashMap<Kind, StepInputs>,
    pub market: HashMap<Kind, MarketParams>,
    pub fare_bounds: (f64, f64),
    pub fleet_delta_bounds: (f64, f64),
}

/// The decision variables for one active control interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlStep {
    pub hv_fare: f64,
    pub av_fare: f64,
    pub av_fleet_delta: f64,
}

/// The full control sequence over the `Nc` active intervals.
#[derive(Debug, Clone, Default)]
pub struct Controls {
    pub steps: Vec<ControlStep>,
}

impl Controls {
    /// The control active at active-interval index `k`, clamped to the last
    /// active interval once `k >= control_steps` (shared-control tail).
    pub fn at(&self, k: usize) -> ControlStep {
        if self.steps.is_empty() {
            return ControlStep::default();
        }
        self.steps[k.min(self.steps.len() - 1)]
    }
}

/// The simulated state trajectory the solver converged on, kept for the
/// `prediction_data` output stream.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub state_by_kind: HashMap<Kind, Vec<KindState>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    /// Ran out of iterations without meeting the tolerance; the solution is
    /// still returned and applied (best-effort, per spec "small tolerance
    /// budget") rather than treated as failure.
    MaxIterationsReached,
    /// No feasible direction could be found; the caller must retain previous
    /// controls.
    Failed,
}

pub struct SolveOutcome {
    pub status: SolveStatus,
    pub controls: Controls,
    pub trajectory: Trajectory,
}
