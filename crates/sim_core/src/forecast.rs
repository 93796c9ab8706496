//! Pre-binned exogenous histograms the MPC treats as known future inputs
//! (§4.7 "Parameters... exogenous demand per step... exogenous HV supply per
//! step"): request counts and HV shift-start counts, binned by the second
//! they land in. Built once at scenario load time from the same records that
//! seed the event queue.

use std::collections::BTreeMap;

use bevy_ecs::prelude::Resource;

#[derive(Resource, Debug, Default)]
pub struct ExogenousForecasts {
    demand_by_second: BTreeMap<u64, f64>,
    hv_supply_by_second: BTreeMap<u64, f64>,
}

impl ExogenousForecasts {
    pub fn record_demand(&mut self, at: u64) {
        *self.demand_by_second.entry(at).or_insert(0.0) += 1.0;
    }

    pub fn record_hv_supply(&mut self, at: u64) {
        *self.hv_supply_by_second.entry(at).or_insert(0.0) += 1.0;
    }

    /// Sum of counts landing in `[from, from + step_len)`, one entry per
    /// prediction step over `steps` steps starting at `from`.
    pub fn demand_steps(&self, from: u64, step_len: u64, steps: usize) -> Vec<f64> {
        bin(&self.demand_by_second, from, step_len, steps)
    }

    pub fn hv_supply_steps(&self, from: u64, step_len: u64, steps: usize) -> Vec<f64> {
        bin(&self.hv_supply_by_second, from, step_len, steps)
    }

    /// The simulated second of the last recorded passenger request
    /// (`lastPassengerTime`, §4.2), used to bound how long a residual
    /// `DeactivateAv` re-schedule keeps retrying.
    pub fn max_demand_time(&self) -> Option<u64> {
        self.demand_by_second.keys().next_back().copied()
    }
}

fn bin(table: &BTreeMap<u64, f64>, from: u64, step_len: u64, steps: usize) -> Vec<f64> {
    (0..steps)
        .map(|i| {
            let lo = from + i as u64 * step_len;
            let hi = lo + step_len;
            table.range(lo..hi).map(|(_, c)| *c).sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_counts_into_fixed_width_steps() {
        let mut forecasts = ExogenousForecasts::default();
        forecasts.record_demand(10);
        forecasts.record_demand(15);
        forecasts.record_demand(65);
        let steps = forecasts.demand_steps(0, 60, 2);
        assert_eq!(steps, vec![2.0, 1.0]);
    }

    #[test]
    fn max_demand_time_is_the_latest_request() {
        let mut forecasts = ExogenousForecasts::default();
        assert_eq!(forecasts.max_demand_time(), None);
        forecasts.record_demand(10);
        forecasts.record_demand(65);
        assert_eq!(forecasts.max_demand_time(), Some(65));
    }
}
