use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AthenaError;
use crate::services::{LiteralPolicy, PollPolicy};

const MAX_BACKOFF_FACTOR: f64 = 10.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub athena: AthenaConfig,
    pub storage: StorageConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AthenaConfig {
    pub region: String,
    pub database: String,
    #[serde(default)]
    pub prefix: String,
    pub work_group: String,
    /// Athena-compatible endpoint (emulator or signing gateway). Requests are
    /// sent unsigned, so the public regional endpoint is never assumed.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub pretend: bool,
    #[serde(default)]
    pub escape_bindings: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub output_folder: String,
    /// Local folder that receives staging files
    pub staging_dir: PathBuf,
    /// S3-compatible endpoint, same constraints as `athena.endpoint`
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    pub backoff_factor: f64,
    /// 0 disables the deadline
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env first so its values take part in the overrides below
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("athena.region", "us-east-1")?
            .set_default("athena.database", "")?
            .set_default("athena.prefix", "")?
            .set_default("athena.work_group", "primary")?
            .set_default("athena.pretend", false)?
            .set_default("athena.escape_bindings", false)?
            .set_default("storage.bucket", "")?
            .set_default("storage.output_folder", "")?
            .set_default("storage.staging_dir", "./storage")?
            .set_default("polling.interval_ms", 1000)?
            .set_default("polling.max_interval_ms", 1000)?
            .set_default("polling.backoff_factor", 1.0)?
            .set_default("polling.timeout_secs", 1800)?
            .set_default("logging.level", "info")?;

        let overrides = [
            ("ATHENA_AWS_REGION", "athena.region"),
            ("ATHENA_DB", "athena.database"),
            ("ATHENA_TABLE_PREFIX", "athena.prefix"),
            ("ATHENA_WORK_GROUP", "athena.work_group"),
            ("ATHENA_ENDPOINT", "athena.endpoint"),
            ("ATHENA_PRETEND", "athena.pretend"),
            ("ATHENA_ESCAPE_BINDINGS", "athena.escape_bindings"),
            ("ATHENA_S3_BUCKET", "storage.bucket"),
            ("ATHENA_OUTPUT_FOLDER", "storage.output_folder"),
            ("ATHENA_STAGING_DIR", "storage.staging_dir"),
            ("ATHENA_S3_ENDPOINT", "storage.endpoint"),
            ("ATHENA_POLL_INTERVAL_MS", "polling.interval_ms"),
            ("ATHENA_POLL_MAX_INTERVAL_MS", "polling.max_interval_ms"),
            ("ATHENA_POLL_BACKOFF", "polling.backoff_factor"),
            ("ATHENA_POLL_TIMEOUT_SECS", "polling.timeout_secs"),
            ("RUST_LOG", "logging.level"),
        ];

        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Reject settings the pipeline cannot run without
    pub fn validate(&self) -> Result<(), AthenaError> {
        if self.athena.database.trim().is_empty() {
            return Err(AthenaError::Config("ATHENA_DB must be set".to_string()));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(AthenaError::Config("ATHENA_S3_BUCKET must be set".to_string()));
        }
        if self.storage.output_folder.trim().is_empty() {
            return Err(AthenaError::Config(
                "ATHENA_OUTPUT_FOLDER must be set".to_string(),
            ));
        }
        self.athena_endpoint()?;
        self.s3_endpoint()?;

        let backoff = self.polling.backoff_factor;
        if !backoff.is_finite() || !(1.0..=MAX_BACKOFF_FACTOR).contains(&backoff) {
            return Err(AthenaError::Config(format!(
                "ATHENA_POLL_BACKOFF must be between 1.0 and {}, got {}",
                MAX_BACKOFF_FACTOR, backoff
            )));
        }
        if self.polling.interval_ms == 0 {
            return Err(AthenaError::Config(
                "ATHENA_POLL_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Full output location handed to the engine, `s3://bucket/folder`
    pub fn s3output(&self) -> String {
        format!(
            "s3://{}/{}",
            self.storage.bucket,
            self.storage.output_folder.trim_matches('/')
        )
    }

    pub fn athena_endpoint(&self) -> Result<&str, AthenaError> {
        required_endpoint(self.athena.endpoint.as_deref(), "ATHENA_ENDPOINT")
    }

    pub fn s3_endpoint(&self) -> Result<&str, AthenaError> {
        required_endpoint(self.storage.endpoint.as_deref(), "ATHENA_S3_ENDPOINT")
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_interval: Duration::from_millis(self.polling.max_interval_ms),
            backoff_factor: self.polling.backoff_factor,
            timeout: match self.polling.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    pub fn literal_policy(&self) -> LiteralPolicy {
        if self.athena.escape_bindings {
            LiteralPolicy::EscapeQuotes
        } else {
            LiteralPolicy::Verbatim
        }
    }
}

fn required_endpoint<'a>(endpoint: Option<&'a str>, var: &str) -> Result<&'a str, AthenaError> {
    match endpoint.map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => Ok(endpoint),
        _ => Err(AthenaError::Config(format!(
            "{} must be set, requests are not signed so a gateway or emulator endpoint is required",
            var
        ))),
    }
}

#[cfg(test)]
pub(crate) fn test_config(staging_dir: PathBuf) -> Config {
    Config {
        athena: AthenaConfig {
            region: "us-east-1".to_string(),
            database: "analytics".to_string(),
            prefix: String::new(),
            work_group: "primary".to_string(),
            endpoint: Some("http://localhost:4566".to_string()),
            pretend: false,
            escape_bindings: false,
        },
        storage: StorageConfig {
            bucket: "query-results".to_string(),
            output_folder: "athena".to_string(),
            staging_dir,
            endpoint: Some("http://localhost:4566".to_string()),
        },
        polling: PollingConfig {
            interval_ms: 1,
            max_interval_ms: 1,
            backoff_factor: 1.0,
            timeout_secs: 0,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        // Clear environment variables for this test
        env::remove_var("ATHENA_AWS_REGION");
        env::remove_var("ATHENA_WORK_GROUP");
        env::remove_var("ATHENA_POLL_INTERVAL_MS");

        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert_eq!(config.athena.region, "us-east-1");
        assert_eq!(config.athena.work_group, "primary");
        assert_eq!(config.polling.interval_ms, 1000);
    }

    #[test]
    fn test_derived_locations() {
        let config = test_config(PathBuf::from("/tmp"));
        assert_eq!(config.s3output(), "s3://query-results/athena");
        assert_eq!(config.athena_endpoint().unwrap(), "http://localhost:4566");
        assert_eq!(config.s3_endpoint().unwrap(), "http://localhost:4566");
    }

    #[test]
    fn test_validate_requires_endpoints() {
        let mut config = test_config(PathBuf::from("/tmp"));
        config.athena.endpoint = None;
        assert!(matches!(config.validate(), Err(AthenaError::Config(_))));

        let mut config = test_config(PathBuf::from("/tmp"));
        config.storage.endpoint = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(AthenaError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_backoff() {
        for factor in [f64::NAN, f64::INFINITY, 0.5, 1e300] {
            let mut config = test_config(PathBuf::from("/tmp"));
            config.polling.backoff_factor = factor;
            assert!(
                matches!(config.validate(), Err(AthenaError::Config(_))),
                "backoff {} should be rejected",
                factor
            );
        }

        let mut config = test_config(PathBuf::from("/tmp"));
        config.polling.backoff_factor = 2.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_database() {
        let mut config = test_config(PathBuf::from("/tmp"));
        assert!(config.validate().is_ok());

        config.athena.database = String::new();
        assert!(matches!(config.validate(), Err(AthenaError::Config(_))));
    }

    #[test]
    fn test_poll_policy_without_deadline() {
        let config = test_config(PathBuf::from("/tmp"));
        let policy = config.poll_policy();
        assert_eq!(policy.interval, Duration::from_millis(1));
        assert!(policy.timeout.is_none());
    }
}
