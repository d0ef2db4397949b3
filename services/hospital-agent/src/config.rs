//! Configuration for the hospital agent.

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Hospital agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// World model API base URL.
    pub world_model_url: String,

    /// Facility name sent at registration.
    pub facility_name: String,

    /// Number of patients that can be treated at once.
    pub max_capacity: usize,

    /// Probability that a patient dies during treatment.
    pub death_rate: f64,

    /// Snapshot poll interval, before time-rate scaling.
    pub poll_interval: Duration,

    /// Admission pass interval, before time-rate scaling.
    pub admission_interval: Duration,

    /// Base delay between registration attempts.
    pub registration_retry: Duration,

    /// Upper bound on every world model request.
    pub request_timeout: Duration,

    /// Wall-clock length of one simulated time unit.
    pub time_unit: Duration,

    /// Number of snapshots kept for audit.
    pub snapshot_history: usize,

    /// Seed for reproducible treatment sampling.
    pub rng_seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world_model_url: "http://localhost:8000/api".to_string(),
            facility_name: "test".to_string(),
            max_capacity: 15,
            death_rate: 0.2,
            poll_interval: Duration::from_secs(10),
            admission_interval: Duration::from_secs(5),
            registration_retry: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
            time_unit: Duration::from_secs(1),
            snapshot_history: 64,
            rng_seed: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let parse = |key: &str| -> Result<Option<u64>> {
            lookup(key)
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .with_context(|| format!("{key} must be a non-negative integer"))
        };
        let count = |key: &str| -> Result<Option<usize>> {
            parse(key)?
                .map(|v| usize::try_from(v).with_context(|| format!("{key} is too large")))
                .transpose()
        };

        let world_model_url = lookup("FACILITY_WORLD_MODEL_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.world_model_url);

        let facility_name = lookup("FACILITY_NAME").unwrap_or(defaults.facility_name);

        let max_capacity = count("FACILITY_MAX_CAPACITY")?.unwrap_or(defaults.max_capacity);
        if max_capacity == 0 {
            bail!("FACILITY_MAX_CAPACITY must be greater than zero");
        }

        let death_rate = lookup("FACILITY_DEATH_RATE")
            .map(|v| v.trim().parse::<f64>())
            .transpose()
            .context("FACILITY_DEATH_RATE must be a number")?
            .unwrap_or(defaults.death_rate);
        if !(0.0..=1.0).contains(&death_rate) {
            bail!("FACILITY_DEATH_RATE must be within [0, 1], got {death_rate}");
        }

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            Ok(parse(key)?.map(Duration::from_secs).unwrap_or(default))
        };

        let time_unit = parse("FACILITY_TIME_UNIT_MILLIS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.time_unit);
        if time_unit.is_zero() {
            bail!("FACILITY_TIME_UNIT_MILLIS must be greater than zero");
        }

        Ok(Self {
            world_model_url,
            facility_name,
            max_capacity,
            death_rate,
            poll_interval: secs("FACILITY_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            admission_interval: secs(
                "FACILITY_ADMISSION_INTERVAL_SECS",
                defaults.admission_interval,
            )?,
            registration_retry: secs(
                "FACILITY_REGISTRATION_RETRY_SECS",
                defaults.registration_retry,
            )?,
            request_timeout: secs("FACILITY_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            time_unit,
            snapshot_history: count("FACILITY_SNAPSHOT_HISTORY")?
                .unwrap_or(defaults.snapshot_history),
            rng_seed: parse("FACILITY_RNG_SEED")?,
            log_level: lookup("FACILITY_LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}
