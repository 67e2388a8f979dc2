use std::path::PathBuf;

use config::{Config, ConfigError};
use ds_drone::DroneConfig;
use ds_flight::FlightPlan;
use ds_inference::InferenceConfig;
use ds_video::{DecoderConfig, SamplerConfig};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct DroneSystemConfig {
    #[serde(default)]
    pub drone: DroneConfig,
    #[serde(default)]
    pub flight: FlightPlan,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl DroneSystemConfig {
    pub fn read_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let mut c = Config::default();

        c.merge(config::File::from(path))?;
        c.merge(config::Environment::with_prefix("DRONE_SYSTEM").separator("__"))?;

        let config: Self = c.try_into()?;
        config.validate()?;

        Ok(config)
    }

    /// Rejects values that would only fail once the drone is in the air.
    fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("sampler.period", self.sampler.period),
            ("flight.video_keepalive", self.flight.video_keepalive),
        ];

        for (key, period) in periods {
            if period.is_zero() {
                return Err(ConfigError::Message(format!("{key} must be non-zero")));
            }
        }

        if let DroneConfig::Simulated(sim) = &self.drone {
            if sim.packet_interval.is_zero() {
                return Err(ConfigError::Message(
                    "drone.packet_interval must be non-zero".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ds_inference::DispatcherKind;

    use super::*;

    fn try_read(name: &str, contents: &str) -> Result<DroneSystemConfig, ConfigError> {
        let path = std::env::temp_dir().join(format!("{name}-{}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        let config = DroneSystemConfig::read_from_path(path.clone());
        std::fs::remove_file(&path).unwrap();
        config
    }

    fn read(name: &str, contents: &str) -> DroneSystemConfig {
        try_read(name, contents).unwrap()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = read("ds-config-empty", "");

        assert!(matches!(config.drone, DroneConfig::Tello(_)));
        assert_eq!(config.flight.maneuver_delay, Duration::from_secs(15));
        assert_eq!(config.decoder.program, "ffmpeg");
        assert_eq!(config.sampler.period, Duration::from_secs(1));
        assert_eq!(config.inference.address, "http://127.0.0.1:5000/");
        assert_eq!(config.inference.dispatcher, DispatcherKind::Noop);
    }

    #[test]
    fn sections_override_defaults() {
        let config = read(
            "ds-config-sections",
            r#"
            [drone]
            kind = "simulated"
            connect_delay = 250

            [flight]
            rotate_angle = 90

            [sampler]
            period = 500

            [inference]
            address = "http://10.0.0.2:8000/infer"
            timeout = 3000
            dispatcher = "command"
            "#,
        );

        match config.drone {
            DroneConfig::Simulated(sim) => {
                assert_eq!(sim.connect_delay, Duration::from_millis(250));
                assert_eq!(sim.packet_size, 1460);
            }
            other => panic!("expected simulated drone, got {other:?}"),
        }
        assert_eq!(config.flight.rotate_angle, 90);
        assert_eq!(config.flight.forward_distance, 21);
        assert_eq!(config.sampler.period, Duration::from_millis(500));
        assert_eq!(config.inference.timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.inference.dispatcher, DispatcherKind::Command);
    }

    #[test]
    fn zero_periods_are_rejected() {
        let err = try_read("ds-config-zero-sampler", "[sampler]\nperiod = 0\n").unwrap_err();
        assert!(err.to_string().contains("sampler.period"));

        let err = try_read("ds-config-zero-keepalive", "[flight]\nvideo_keepalive = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("flight.video_keepalive"));

        assert!(try_read(
            "ds-config-zero-packets",
            "[drone]\nkind = \"simulated\"\npacket_interval = 0\n"
        )
        .is_err());
    }
}
