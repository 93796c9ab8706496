//! Scenario configuration (§6 "Configuration"): everything that is fixed for
//! one simulation run, loaded once from a JSON file at startup.

use std::fs;
use std::path::Path;

use bevy_ecs::prelude::Resource;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Deserialize, Resource)]
pub struct SimConfig {
    pub passenger_file: String,
    pub map_file: String,
    pub shortest_path_time_file: String,
    pub depot_file: String,

    pub hv_fleet_size: u64,
    pub av_fleet_size: u64,
    pub av_initial_size: u64,

    pub match_interval: u64,
    pub default_waiting_time: u64,
    pub maximum_work_duration: u64,

    pub mpc_start_hour: f64,
    pub mpc_end_hour: f64,
    pub mpc_control_interval: f64,
    pub mpc_prediction_interval: f64,
    pub mpc_steps: usize,
    pub mpc_control_steps: usize,

    /// Fraction of HVs that follow the neoclassical continuation rule rather
    /// than income-targeting, in [0, 1].
    pub neoclassical: f64,

    pub data_output_path: String,
    pub output_number: u64,
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: SimConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.av_initial_size > self.av_fleet_size {
            return Err(ConfigError::Inconsistent(format!(
                "av_initial_size ({}) exceeds av_fleet_size ({})",
                self.av_initial_size, self.av_fleet_size
            )));
        }
        if !(0.0..=1.0).contains(&self.neoclassical) {
            return Err(ConfigError::Inconsistent(format!(
                "neoclassical fraction must be in [0,1], got {}",
                self.neoclassical
            )));
        }
        if self.mpc_start_hour > self.mpc_end_hour {
            return Err(ConfigError::Inconsistent(format!(
                "mpc_start_hour ({}) is after mpc_end_hour ({})",
                self.mpc_start_hour, self.mpc_end_hour
            )));
        }
        if self.mpc_control_interval < self.mpc_prediction_interval
            || (self.mpc_control_interval / self.mpc_prediction_interval).fract() > 1e-9
        {
            return Err(ConfigError::Inconsistent(
                "mpc_control_interval must be a positive integer multiple of mpc_prediction_interval".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "passenger_file": "p.csv", "map_file": "m.csv",
            "shortest_path_time_file": "t.csv", "depot_file": "d.csv",
            "hv_fleet_size": 100, "av_fleet_size": 50, "av_initial_size": 10,
            "match_interval": 30, "default_waiting_time": 300, "maximum_work_duration": 28800,
            "mpc_start_hour": 6.0, "mpc_end_hour": 22.0,
            "mpc_control_interval": 300.0, "mpc_prediction_interval": 60.0,
            "mpc_steps": 30, "mpc_control_steps": 5,
            "neoclassical": 0.5,
            "data_output_path": "out/", "output_number": 1
        }"#
        .to_string()
    }

    #[test]
    fn loads_and_validates_a_well_formed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, sample_json()).unwrap();
        let config = SimConfig::load(&path).unwrap();
        assert_eq!(config.hv_fleet_size, 100);
    }

    #[test]
    fn rejects_av_initial_size_over_fleet_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let bad = sample_json().replace("\"av_initial_size\": 10", "\"av_initial_size\": 999");
        fs::write(&path, bad).unwrap();
        assert!(matches!(SimConfig::load(&path), Err(ConfigError::Inconsistent(_))));
    }

    #[test]
    fn rejects_non_multiple_mpc_intervals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let bad = sample_json().replace("\"mpc_prediction_interval\": 60.0", "\"mpc_prediction_interval\": 70.0");
        fs::write(&path, bad).unwrap();
        assert!(matches!(SimConfig::load(&path), Err(ConfigError::Inconsistent(_))));
    }
}
