//! The priority event queue and the simulated-time clock it drives.
//!
//! Ordering is strict lexicographic on `(time, priority, sequence)`: `time`
//! is simulated seconds, `priority` is the fixed precedence class from the
//! spec's event table (0 = vehicle lifecycle, highest precedence, down to
//! 6 = MPC), and `sequence` is a monotonically increasing counter assigned
//! at `schedule()` time that breaks ties in insertion order. Events are
//! single-use: once popped they are discarded, never re-inserted.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

/// Fixed event-kind catalogue with its priority baked in via `priority()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A scheduled human-driven-vehicle entry attempt.
    NewHv,
    /// Move a batch of inactive AVs to the vacant set.
    ActivateAv,
    /// Move a batch of vacant AVs back to their depots.
    DeactivateAv,
    /// An AV reaches its depot after `DeactivateAv`, going Inactive.
    DeactivateAvArrival,
    /// +1/-1 occupancy counter delta posted at meeting/delivery time.
    OccupancyDelta,
    /// A vehicle reaches drop-off.
    TripCompletion,
    /// HV decide-exit evaluation, a consequence of `TripCompletion` ordered
    /// just after it within the same timestamp.
    PostTripDecision,
    /// Refresh the per-kind ETA-ratio (phi).
    UpdatePhi,
    /// A passenger request arrives.
    NewPassenger,
    /// Recompute per-kind market counters.
    UpdateStates,
    /// A batch matching tick.
    Assign,
    /// A receding-horizon MPC solve.
    Mpc,
}

impl EventKind {
    pub fn priority(self) -> u8 {
        match self {
            EventKind::NewHv
            | EventKind::ActivateAv
            | EventKind::DeactivateAv
            | EventKind::DeactivateAvArrival
            | EventKind::OccupancyDelta
            | EventKind::TripCompletion => 0,
            EventKind::PostTripDecision => 1,
            EventKind::UpdatePhi => 2,
            EventKind::NewPassenger => 3,
            EventKind::UpdateStates => 4,
            EventKind::Assign => 5,
            EventKind::Mpc => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubject {
    Vehicle(Entity),
    Passenger(Entity),
}

/// A single-use scheduled event. `time` is simulated seconds. `payload` is a
/// small signed integer used by the handful of event kinds that need one
/// (e.g. the residual fleet size on a re-scheduled `DeactivateAv`); it is
/// zero for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: u64,
    pub priority: u8,
    pub sequence: u64,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
    pub payload: i64,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so `pop()` returns the
        // lexicographically smallest (time, priority, sequence).
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event currently being triggered, inserted as a resource by the runner
/// before running the schedule for this step.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Resource)]
pub struct SimulationClock {
    now: u64,
    sequence_counter: u64,
    events: BinaryHeap<Event>,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            now: 0,
            sequence_counter: 0,
            events: BinaryHeap::new(),
        }
    }
}

impl SimulationClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|e| e.time)
    }

    /// Schedule an event at an absolute simulated time. Fails fast (per the
    /// spec's error-handling policy) if `at` is before the current time —
    /// that is a programming error, not a recoverable condition.
    pub fn schedule_at(
        &mut self,
        at: u64,
        kind: EventKind,
        subject: Option<EventSubject>,
        payload: i64,
    ) {
        assert!(
            at >= self.now,
            "cannot schedule {kind:?} at {at} when clock is already at {}",
            self.now
        );
        let sequence = self.sequence_counter;
        self.sequence_counter += 1;
        self.events.push(Event {
            time: at,
            priority: kind.priority(),
            sequence,
            kind,
            subject,
            payload,
        });
    }

    pub fn schedule_in(
        &mut self,
        delta: u64,
        kind: EventKind,
        subject: Option<EventSubject>,
        payload: i64,
    ) {
        self.schedule_at(self.now.saturating_add(delta), kind, subject, payload);
    }

    /// Pop the earliest event and advance `now` to its time. Fails fast if
    /// the popped event's time is somehow before `now` (would indicate a
    /// corrupted heap ordering — a programming error).
    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        assert!(
            event.time >= self.now,
            "out-of-order dispatch: popped {:?} at {} but clock is at {}",
            event.kind,
            event.time,
            self.now
        );
        self.now = event.time;
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_then_priority_then_sequence_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(10, EventKind::Assign, None, 0);
        clock.schedule_at(10, EventKind::NewPassenger, None, 0);
        clock.schedule_at(5, EventKind::Mpc, None, 0);
        clock.schedule_at(10, EventKind::NewPassenger, None, 0);

        let first = clock.pop_next().unwrap();
        assert_eq!(first.time, 5);

        let second = clock.pop_next().unwrap();
        assert_eq!(second.kind, EventKind::NewPassenger);
        assert_eq!(second.sequence, 1);

        let third = clock.pop_next().unwrap();
        assert_eq!(third.kind, EventKind::NewPassenger);
        assert_eq!(third.sequence, 3);

        let fourth = clock.pop_next().unwrap();
        assert_eq!(fourth.kind, EventKind::Assign);

        assert!(clock.pop_next().is_none());
    }

    #[test]
    #[should_panic(expected = "cannot schedule")]
    fn scheduling_in_the_past_panics() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(10, EventKind::Assign, None, 0);
        clock.pop_next();
        clock.schedule_at(5, EventKind::Assign, None, 0);
    }
}
