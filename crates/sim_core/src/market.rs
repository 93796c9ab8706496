//! Market-state aggregator: the process-wide, per-kind counters, running
//! averages, and control variables that the matcher, the phi updater, and
//! the MPC controller all read and write.

use std::collections::{BTreeMap, HashMap};

use bevy_ecs::prelude::Resource;

use crate::ecs::Kind;

/// Per-kind population counters. Spec invariant: `total == vacant + assigned
/// + occupied`, and `waiting == |waiting set|`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindCounts {
    pub total: u64,
    pub vacant: u64,
    pub assigned: u64,
    pub occupied: u64,
    pub waiting: u64,
}

impl KindCounts {
    pub fn check_invariant(&self, kind: Kind) {
        assert_eq!(
            self.total,
            self.vacant + self.assigned + self.occupied,
            "kind {kind:?} counter drift: total={} vacant={} assigned={} occupied={}",
            self.total,
            self.vacant,
            self.assigned,
            self.occupied
        );
    }
}

fn per_kind<T: Default + Copy>() -> HashMap<Kind, T> {
    Kind::both().into_iter().map(|k| (k, T::default())).collect()
}

#[derive(Resource, Debug)]
pub struct MarketState {
    pub counts: HashMap<Kind, KindCounts>,
    /// Current per-kind unit fare ($/hr), mutated by the MPC controller.
    pub unit_fare: HashMap<Kind, f64>,
    pub hv_wage: f64,
    pub phi: HashMap<Kind, f64>,
    /// Running mean of occupied/elapsed ratio per kind (utilisation), an EMA.
    pub utilisation: HashMap<Kind, f64>,
    /// occupied / total, recomputed each UpdateStates tick after warm-up.
    pub occupancy: HashMap<Kind, f64>,
    /// Pending AV fleet-size delta written by the MPC, consumed by the fleet
    /// loader on the next activation/deactivation opportunity.
    pub av_fleet_delta: i64,
    /// Running mean pickup duration (`ta`) per kind, updated after warm-up.
    pub running_ta: HashMap<Kind, f64>,
    /// Running mean trip (in-vehicle) duration (`to`) per kind.
    pub running_to: HashMap<Kind, f64>,
    /// Cumulative count of passengers who exceeded their patience while
    /// waiting, per kind (feeds `expiration_data`).
    pub expired: HashMap<Kind, u64>,
    match_samples: HashMap<Kind, u64>,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            counts: per_kind(),
            unit_fare: Kind::both().into_iter().map(|k| (k, 0.0)).collect(),
            hv_wage: 0.0,
            phi: Kind::both().into_iter().map(|k| (k, 1.0)).collect(),
            utilisation: per_kind(),
            occupancy: per_kind(),
            av_fleet_delta: 0,
            running_ta: per_kind(),
            running_to: per_kind(),
            expired: per_kind(),
            match_samples: per_kind(),
        }
    }
}

impl MarketState {
    pub fn counts(&self, kind: Kind) -> KindCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn counts_mut(&mut self, kind: Kind) -> &mut KindCounts {
        self.counts.entry(kind).or_default()
    }

    /// Update the running mean of pickup (`ta`) and trip (`to`) durations
    /// for `kind` with a new sample, as a simple running average (not EMA):
    /// `mean_{n+1} = mean_n + (sample - mean_n) / (n + 1)`.
    pub fn record_match_durations(&mut self, kind: Kind, pickup_duration: f64, trip_duration: f64) {
        let n = self.match_samples.entry(kind).or_insert(0);
        *n += 1;
        let count = *n as f64;
        let ta = self.running_ta.entry(kind).or_insert(0.0);
        *ta += (pickup_duration - *ta) / count;
        let to = self.running_to.entry(kind).or_insert(0.0);
        *to += (trip_duration - *to) / count;
    }

    /// Update the EMA of per-trip occupied/elapsed utilisation for `kind`.
    pub fn record_utilisation_sample(&mut self, kind: Kind, sample: f64, alpha: f64) {
        let sample = sample.clamp(0.0, 1.0);
        let entry = self.utilisation.entry(kind).or_insert(sample);
        *entry = alpha * sample + (1.0 - alpha) * *entry;
    }

    pub fn record_expiration(&mut self, kind: Kind) {
        *self.expired.entry(kind).or_insert(0) += 1;
    }
}

/// Known or forecast pickup/dropoff landings, keyed by the simulated second
/// they land in. Fed by the matcher (§4.3: "increment the per-kind
/// pickup/dropoff histograms keyed by meetingTime and deliveryTime") and
/// consumed, pruned of stale entries, by the MPC's correction terms.
#[derive(Resource, Debug, Default)]
pub struct PickupDropoffHistograms {
    pub pickups: HashMap<Kind, BTreeMap<u64, u64>>,
    pub dropoffs: HashMap<Kind, BTreeMap<u64, u64>>,
}

impl PickupDropoffHistograms {
    pub fn record_pickup(&mut self, kind: Kind, at: u64) {
        *self.pickups.entry(kind).or_default().entry(at).or_insert(0) += 1;
    }

    pub fn record_dropoff(&mut self, kind: Kind, at: u64) {
        *self.dropoffs.entry(kind).or_default().entry(at).or_insert(0) += 1;
    }

    /// Drop entries strictly before `now`; they can no longer affect a
    /// forward-looking MPC horizon.
    pub fn prune_before(&mut self, now: u64) {
        for table in self.pickups.values_mut() {
            table.retain(|&t, _| t >= now);
        }
        for table in self.dropoffs.values_mut() {
            table.retain(|&t, _| t >= now);
        }
    }

    /// Sum of counts landing within `[from, from + window)`.
    pub fn pickups_in_window(&self, kind: Kind, from: u64, window: u64) -> u64 {
        self.pickups
            .get(&kind)
            .map(|t| t.range(from..from + window).map(|(_, c)| *c).sum())
            .unwrap_or(0)
    }

    pub fn dropoffs_in_window(&self, kind: Kind, from: u64, window: u64) -> u64 {
        self.dropoffs
            .get(&kind)
            .map(|t| t.range(from..from + window).map(|(_, c)| *c).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_invariant_holds_and_panics_on_drift() {
        let counts = KindCounts {
            total: 5,
            vacant: 2,
            assigned: 2,
            occupied: 1,
            waiting: 0,
        };
        counts.check_invariant(Kind::Hv);
    }

    #[test]
    #[should_panic(expected = "counter drift")]
    fn drifted_counts_panic() {
        let counts = KindCounts {
            total: 5,
            vacant: 2,
            assigned: 2,
            occupied: 2,
            waiting: 0,
        };
        counts.check_invariant(Kind::Av);
    }

    #[test]
    fn running_average_matches_simple_mean() {
        let mut market = MarketState::default();
        market.record_match_durations(Kind::Hv, 10.0, 100.0);
        market.record_match_durations(Kind::Hv, 20.0, 200.0);
        assert!((market.running_ta[&Kind::Hv] - 15.0).abs() < 1e-9);
        assert!((market.running_to[&Kind::Hv] - 150.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_prune_drops_stale_entries() {
        let mut hist = PickupDropoffHistograms::default();
        hist.record_pickup(Kind::Av, 10);
        hist.record_pickup(Kind::Av, 50);
        hist.prune_before(20);
        assert_eq!(hist.pickups_in_window(Kind::Av, 0, 100), 1);
    }
}
