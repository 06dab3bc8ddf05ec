use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Verbosity of the per-job lifecycle messages.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a log level string is not recognised.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown log level `{0}`")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" | "FINE" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "SEVERE" => Ok(LogLevel::Error),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-job configuration, snapshotted when the job is created.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Disabled jobs are registered but can never be claimed for execution.
    pub enabled: bool,
    /// Deadline for a single worker invocation, in milliseconds.
    pub timeout_ms: u64,
    /// Total execution attempts allowed per logical submission.
    pub max_retries: u16,
    /// Level used for this job's lifecycle messages.
    pub log_level: LogLevel,
}

impl JobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u16) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 30_000,
            max_retries: 3,
            log_level: LogLevel::Info,
        }
    }
}

/// Delay growth between poll attempts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Sleep `interval_ms` between every attempt.
    #[default]
    Fixed,
    /// Multiply the delay by `factor` after each attempt, capped at
    /// `max_interval_ms`.
    Exponential { factor: f32, max_interval_ms: u64 },
}

/// Client-side polling configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Base delay between status checks, in milliseconds.
    pub interval_ms: u64,
    /// Number of status checks before giving up.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            max_attempts,
            backoff: Backoff::Fixed,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_attempts: 60,
            backoff: Backoff::Fixed,
        }
    }
}

/// Configuration for a [`JobManager`](crate::runtime::JobManager).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Config used when a submission does not carry its own.
    pub default_job: JobConfig,
    /// Polling defaults handed to pollers created by the manager.
    pub poll: PollConfig,
    /// Buffer size of the lifecycle event channel.
    pub event_capacity: usize,
    /// How long `close` waits for in-flight executions, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl ManagerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn with_default_job(mut self, job: JobConfig) -> Self {
        self.default_job = job;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_job: JobConfig::default(),
            poll: PollConfig::default(),
            event_capacity: 256,
            shutdown_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_config_defaults() {
        let config = JobConfig::default();
        assert!(config.enabled);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_log_level_parsing_is_case_insensitive() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" Warning ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("SEVERE".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_job_config_from_partial_json() {
        let config: JobConfig =
            serde_json::from_str(r#"{"timeout_ms": 100, "log_level": "debug"}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.timeout(), Duration::from_millis(100));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_manager_config_with_exponential_backoff() {
        let config: ManagerConfig = serde_json::from_str(
            r#"{
                "poll": {
                    "interval_ms": 50,
                    "max_attempts": 3,
                    "backoff": {"kind": "exponential", "factor": 2.0, "max_interval_ms": 400}
                },
                "event_capacity": 16
            }"#,
        )
        .unwrap();
        assert_eq!(config.poll.interval(), Duration::from_millis(50));
        assert_eq!(
            config.poll.backoff,
            Backoff::Exponential {
                factor: 2.0,
                max_interval_ms: 400
            }
        );
        assert_eq!(config.event_capacity, 16);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_builders_round_durations_to_millis() {
        let job = JobConfig::default()
            .with_timeout(Duration::from_millis(100))
            .with_max_retries(1)
            .with_enabled(false);
        assert_eq!(job.timeout_ms, 100);
        assert_eq!(job.max_retries, 1);
        assert!(!job.enabled);

        let poll = PollConfig::new(Duration::from_millis(50), 3);
        assert_eq!(poll.interval_ms, 50);
        assert_eq!(poll.backoff, Backoff::Fixed);
    }
}
