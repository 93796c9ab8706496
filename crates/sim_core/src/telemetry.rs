//! Output record buffers (§6): the seven record types the driver appends to
//! over a run — `vehicle_data`, `passenger_data`, `expiration_data`,
//! `assignment_data`, `utilisation_data`, `prediction_data`, `control_data`.
//!
//! Systems push rows as the corresponding event fires; `output::write_all`
//! drains the buffers to CSV once the run completes.

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::ecs::{ChosenMode, Kind, VehicleState};

#[derive(Debug, Clone, Serialize)]
pub struct VehicleRecord {
    pub time: u64,
    pub vehicle_id: u64,
    pub kind: Kind,
    pub state: VehicleState,
    pub income: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassengerRecord {
    pub request_time: u64,
    pub passenger_id: u64,
    pub chosen_mode: ChosenMode,
    pub fare: f64,
    pub trip_distance: f64,
    pub trip_duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpirationRecord {
    pub time: u64,
    pub kind: Kind,
    pub passenger_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentRecord {
    pub time: u64,
    pub kind: Kind,
    pub vehicle_id: u64,
    pub passenger_id: u64,
    pub pickup_duration_s: f64,
    pub meeting_time: u64,
    pub delivery_time: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UtilisationRecord {
    pub time: u64,
    pub kind: Kind,
    pub utilisation: f64,
    pub occupancy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub invocation_time: u64,
    pub kind: Kind,
    pub step: usize,
    pub waiting: f64,
    pub vacant: f64,
    pub assigned: f64,
    pub occupied: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlRecord {
    pub invocation_time: u64,
    pub status: String,
    pub hv_fare: f64,
    pub av_fare: f64,
    pub av_fleet_delta: f64,
}

#[derive(Resource, Debug, Default)]
pub struct SimTelemetry {
    pub vehicle: Vec<VehicleRecord>,
    pub passenger: Vec<PassengerRecord>,
    pub expiration: Vec<ExpirationRecord>,
    pub assignment: Vec<AssignmentRecord>,
    pub utilisation: Vec<UtilisationRecord>,
    pub prediction: Vec<PredictionRecord>,
    pub control: Vec<ControlRecord>,
}

impl SimTelemetry {
    pub fn record_vehicle(&mut self, time: u64, vehicle_id: u64, kind: Kind, state: VehicleState, income: f64) {
        self.vehicle.push(VehicleRecord {
            time,
            vehicle_id,
            kind,
            state,
            income,
        });
    }

    pub fn record_passenger(
        &mut self,
        request_time: u64,
        passenger_id: u64,
        chosen_mode: ChosenMode,
        fare: f64,
        trip_distance: f64,
        trip_duration: f64,
    ) {
        self.passenger.push(PassengerRecord {
            request_time,
            passenger_id,
            chosen_mode,
            fare,
            trip_distance,
            trip_duration,
        });
    }

    pub fn record_expiration(&mut self, time: u64, kind: Kind, passenger_id: u64) {
        self.expiration.push(ExpirationRecord { time, kind, passenger_id });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_assignment(
        &mut self,
        time: u64,
        kind: Kind,
        vehicle_id: u64,
        passenger_id: u64,
        pickup_duration_s: f64,
        meeting_time: u64,
        delivery_time: u64,
    ) {
        self.assignment.push(AssignmentRecord {
            time,
            kind,
            vehicle_id,
            passenger_id,
            pickup_duration_s,
            meeting_time,
            delivery_time,
        });
    }

    pub fn record_utilisation(&mut self, time: u64, kind: Kind, utilisation: f64, occupancy: f64) {
        self.utilisation.push(UtilisationRecord {
            time,
            kind,
            utilisation,
            occupancy,
        });
    }

    pub fn record_prediction_step(
        &mut self,
        invocation_time: u64,
        kind: Kind,
        step: usize,
        state: crate::mpc::model::KindState,
    ) {
        self.prediction.push(PredictionRecord {
            invocation_time,
            kind,
            step,
            waiting: state.pw,
            vacant: state.nv,
            assigned: state.na,
            occupied: state.no,
        });
    }

    pub fn record_control(&mut self, invocation_time: u64, status: &str, hv_fare: f64, av_fare: f64, av_fleet_delta: f64) {
        self.control.push(ControlRecord {
            invocation_time,
            status: status.to_string(),
            hv_fare,
            av_fare,
            av_fleet_delta,
        });
    }
}
