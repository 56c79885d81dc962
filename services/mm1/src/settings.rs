//! Model parameters, the `[model]` section of `config/mm1.toml`

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Parameters of one M/M/1 run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mm1Settings {
    /// Mean arrivals per unit of simulation time (lambda)
    pub arrival_rate: f64,
    /// Mean completions per unit of simulation time (mu)
    pub service_rate: f64,
    /// Arrivals to generate when no `duration` is set
    pub num_arrivals: usize,
    /// Generate `arrival_rate * duration` arrivals instead of `num_arrivals`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub seed: u64,
    /// Simulation time between the last arrival and the statistics report
    pub report_delay: f64,
    /// Message type of an arriving entity
    pub entity_name: String,
}

impl Default for Mm1Settings {
    fn default() -> Self {
        Self {
            arrival_rate: 1.0,
            service_rate: 1.25,
            num_arrivals: 1_000,
            duration: None,
            seed: 333,
            report_delay: 100.0,
            entity_name: "customer".to_string(),
        }
    }
}

impl Mm1Settings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.arrival_rate.is_finite() && self.arrival_rate > 0.0,
            "arrival_rate must be positive, got {}",
            self.arrival_rate
        );
        ensure!(
            self.service_rate.is_finite() && self.service_rate > 0.0,
            "service_rate must be positive, got {}",
            self.service_rate
        );
        ensure!(
            self.report_delay.is_finite() && self.report_delay >= 0.0,
            "report_delay must be non-negative, got {}",
            self.report_delay
        );
        if let Some(duration) = self.duration {
            ensure!(
                duration.is_finite() && duration > 0.0,
                "duration must be positive, got {duration}"
            );
        }
        ensure!(self.arrival_count() > 0, "model would generate no arrivals");
        ensure!(!self.entity_name.is_empty(), "entity_name must not be empty");
        Ok(())
    }

    /// Number of arrivals the generator produces
    pub fn arrival_count(&self) -> usize {
        match self.duration {
            Some(duration) => (self.arrival_rate * duration) as usize,
            None => self.num_arrivals,
        }
    }

    /// Offered load rho = lambda / mu
    pub fn offered_load(&self) -> f64 {
        self.arrival_rate / self.service_rate
    }

    /// Seed of the server's service-time stream, derived so the two streams differ
    pub fn service_seed(&self) -> u64 {
        self.seed.wrapping_add(0x9E37_79B9_7F4A_7C15)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Mm1Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.arrival_count(), 1_000);
        assert!(settings.offered_load() < 1.0);
    }

    #[test]
    fn test_duration_overrides_count() {
        let settings = Mm1Settings {
            arrival_rate: 2.0,
            duration: Some(250.0),
            ..Default::default()
        };
        assert_eq!(settings.arrival_count(), 500);
    }

    #[test]
    fn test_rejects_bad_rates() {
        let settings = Mm1Settings {
            service_rate: 0.0,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("service_rate"));

        let settings = Mm1Settings {
            arrival_rate: f64::NAN,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_run() {
        let settings = Mm1Settings {
            num_arrivals: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = Mm1Settings {
            arrival_rate: 0.5,
            duration: Some(1.0),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_streams_use_distinct_seeds() {
        let settings = Mm1Settings::default();
        assert_ne!(settings.seed, settings.service_seed());
    }
}
