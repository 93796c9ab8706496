//! CSV sinks for the seven §6 output record types, written to
//! `{data_output_path}/{output_number}_{name}.csv`.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::SimConfig;
use crate::error::{InputError, InputResult};
use crate::telemetry::SimTelemetry;

fn write_records<T: Serialize>(path: PathBuf, records: &[T]) -> InputResult<()> {
    let mut writer = csv::Writer::from_path(&path).map_err(|source| InputError::Csv {
        path: path.display().to_string(),
        source,
    })?;
    for record in records {
        writer.serialize(record).map_err(|source| InputError::Csv {
            path: path.display().to_string(),
            source,
        })?;
    }
    writer.flush().map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

fn output_path(config: &SimConfig, name: &str) -> PathBuf {
    PathBuf::from(&config.data_output_path).join(format!("{}_{}.csv", config.output_number, name))
}

/// Flush every telemetry buffer to its own CSV file under `data_output_path`.
pub fn write_all(config: &SimConfig, telemetry: &SimTelemetry) -> InputResult<()> {
    std::fs::create_dir_all(&config.data_output_path).map_err(|source| InputError::Io {
        path: config.data_output_path.clone(),
        source,
    })?;
    write_records(output_path(config, "vehicle_data"), &telemetry.vehicle)?;
    write_records(output_path(config, "passenger_data"), &telemetry.passenger)?;
    write_records(output_path(config, "expiration_data"), &telemetry.expiration)?;
    write_records(output_path(config, "assignment_data"), &telemetry.assignment)?;
    write_records(output_path(config, "utilisation_data"), &telemetry.utilisation)?;
    write_records(output_path(config, "prediction_data"), &telemetry.prediction)?;
    write_records(output_path(config, "control_data"), &telemetry.control)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::VehicleRecord;
    use crate::ecs::{Kind, VehicleState};

    #[test]
    fn writes_one_csv_per_record_kind() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimConfig {
            passenger_file: String::new(),
            map_file: String::new(),
            shortest_path_time_file: String::new(),
            depot_file: String::new(),
            hv_fleet_size: 0,
            av_fleet_size: 0,
            av_initial_size: 0,
            match_interval: 30,
            default_waiting_time: 300,
            maximum_work_duration: 28800,
            mpc_start_hour: 6.0,
            mpc_end_hour: 22.0,
            mpc_control_interval: 300.0,
            mpc_prediction_interval: 60.0,
            mpc_steps: 5,
            mpc_control_steps: 2,
            neoclassical: 0.5,
            data_output_path: dir.path().to_str().unwrap().to_string(),
            output_number: 3,
        };
        let mut telemetry = SimTelemetry::default();
        telemetry.vehicle.push(VehicleRecord {
            time: 10,
            vehicle_id: 1,
            kind: Kind::Hv,
            state: VehicleState::Vacant,
            income: 0.0,
        });

        write_all(&config, &telemetry).unwrap();
        assert!(dir.path().join("3_vehicle_data.csv").exists());
        assert!(dir.path().join("3_control_data.csv").exists());
    }
}
