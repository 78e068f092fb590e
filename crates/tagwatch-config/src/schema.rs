// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema for tagwatch.
//!
//! # Example Configuration (YAML)
//!
//! ```yaml
//! server_url: "opc.tcp://192.168.0.10:4840"
//! input_path: Taglist.txt
//! output_path: results/resultTagList
//! sampling_interval_ms: 1000
//! observation_window_secs: 15
//! batch_size: 200
//! inter_batch_delay_secs: 0.5
//!
//! session:
//!   application_name: tagwatch
//!   security_mode: none
//!   security_policy: none
//!   user:
//!     type: user_name
//!     username: operator
//!     password: "${OPCUA_PASSWORD}"
//! ```

use std::ffi::OsString;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use tagwatch_opcua::{PipelineSettings, SecurityMode, SecurityPolicy, SessionConfig, UserIdentity};

use crate::error::{ConfigError, ConfigResult};

/// Default OPC UA endpoint.
pub const DEFAULT_SERVER_URL: &str = "opc.tcp://localhost:4840";

/// Default tag list file.
pub const DEFAULT_INPUT_PATH: &str = "Taglist.txt";

/// Default output prefix.
pub const DEFAULT_OUTPUT_PATH: &str = "resultTagList";

/// Suffix pattern appended to the output prefix when `timestamp_output` is set.
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "_%Y_%m_%d_%H_%M_%S.csv";

// =============================================================================
// TagwatchConfig
// =============================================================================

/// Root configuration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagwatchConfig {
    /// OPC UA endpoint URL.
    pub server_url: String,

    /// Tag list, one identifier per line.
    pub input_path: PathBuf,

    /// Output file, or prefix when `timestamp_output` is set.
    pub output_path: PathBuf,

    /// Append a local timestamp and `.csv` to `output_path`.
    pub timestamp_output: bool,

    /// Subscription publishing and sampling interval in milliseconds.
    pub sampling_interval_ms: u64,

    /// How long notifications are collected, in seconds.
    pub observation_window_secs: u64,

    /// Nodes registered per batch; 0 registers everything at once.
    pub batch_size: usize,

    /// Pause between batches, in seconds.
    pub inter_batch_delay_secs: f64,

    /// Session settings.
    pub session: SessionSettings,
}

impl Default for TagwatchConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            timestamp_output: true,
            sampling_interval_ms: 500,
            observation_window_secs: 10,
            batch_size: 100,
            inter_batch_delay_secs: 1.0,
            session: SessionSettings::default(),
        }
    }
}

impl TagwatchConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.server_url.trim();
        if url.is_empty() {
            return Err(ConfigError::validation("server_url", "cannot be empty"));
        }
        if !url.starts_with("opc.tcp://") {
            return Err(ConfigError::validation(
                "server_url",
                format!("must start with 'opc.tcp://', got '{}'", url),
            ));
        }
        if self.sampling_interval_ms == 0 {
            return Err(ConfigError::validation(
                "sampling_interval_ms",
                "must be greater than 0",
            ));
        }
        if Duration::try_from_secs_f64(self.inter_batch_delay_secs).is_err() {
            return Err(ConfigError::validation(
                "inter_batch_delay_secs",
                format!(
                    "must be a non-negative number of seconds in range, got {}",
                    self.inter_batch_delay_secs
                ),
            ));
        }
        if self.input_path.as_os_str().is_empty() {
            return Err(ConfigError::validation("input_path", "cannot be empty"));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::validation("output_path", "cannot be empty"));
        }
        self.session.validate()?;
        Ok(())
    }

    /// Sampling interval as a duration.
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    /// Observation window as a duration.
    pub fn observation_window(&self) -> Duration {
        Duration::from_secs(self.observation_window_secs)
    }

    /// Inter-batch delay as a duration.
    ///
    /// [`validate`](Self::validate) rejects values that do not fit; an
    /// unvalidated out-of-range value yields no delay.
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.inter_batch_delay_secs).unwrap_or(Duration::ZERO)
    }

    /// Timing and batching for the run pipeline.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            sampling_interval: self.sampling_interval(),
            observation_window: self.observation_window(),
            batch_size: self.batch_size,
            batch_delay: self.inter_batch_delay(),
        }
    }

    /// Session configuration for the OPC UA client.
    pub fn session_config(&self) -> ConfigResult<SessionConfig> {
        SessionConfig::builder()
            .endpoint(self.server_url.trim())
            .application_name(self.session.application_name.as_str())
            .security(self.session.security_mode, self.session.security_policy)
            .user(self.session.user.clone())
            .session_timeout(Duration::from_millis(self.session.session_timeout_ms))
            .trust_server_certs(self.session.trust_server_certs)
            .verify_nodes(self.session.verify_nodes)
            .build()
            .map_err(|e| ConfigError::validation("session", e.to_string()))
    }

    /// The output file for a run started at `now`.
    ///
    /// With `timestamp_output` the prefix gets `_YYYY_MM_DD_HH_MM_SS.csv`
    /// appended; otherwise `output_path` is used as is.
    pub fn output_file_path<Tz>(&self, now: &DateTime<Tz>) -> PathBuf
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        if !self.timestamp_output {
            return self.output_path.clone();
        }
        let mut name = OsString::from(self.output_path.as_os_str());
        name.push(now.format(OUTPUT_TIMESTAMP_FORMAT).to_string());
        PathBuf::from(name)
    }
}

// =============================================================================
// SessionSettings
// =============================================================================

/// OPC UA session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    /// Client application name.
    pub application_name: String,

    /// Message security mode.
    pub security_mode: SecurityMode,

    /// Security policy.
    pub security_policy: SecurityPolicy,

    /// User identity.
    pub user: UserIdentity,

    /// Session timeout in milliseconds.
    pub session_timeout_ms: u64,

    /// Accept the server certificate without a trust store lookup.
    pub trust_server_certs: bool,

    /// Check during resolution that each node exists.
    pub verify_nodes: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            application_name: "tagwatch".to_string(),
            security_mode: SecurityMode::None,
            security_policy: SecurityPolicy::None,
            user: UserIdentity::Anonymous,
            session_timeout_ms: 300_000,
            trust_server_certs: true,
            verify_nodes: true,
        }
    }
}

impl SessionSettings {
    /// Validates the session settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.application_name.trim().is_empty() {
            return Err(ConfigError::validation(
                "session.application_name",
                "cannot be empty",
            ));
        }
        if self.session_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "session.session_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.security_mode.is_none() != matches!(self.security_policy, SecurityPolicy::None) {
            return Err(ConfigError::validation(
                "session.security_policy",
                format!(
                    "policy '{}' does not match security mode '{}'",
                    self.security_policy, self.security_mode
                ),
            ));
        }
        if let UserIdentity::UserName { username, .. } = &self.user {
            if username.is_empty() {
                return Err(ConfigError::validation("session.user.username", "cannot be empty"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_defaults() {
        let config = TagwatchConfig::default();
        assert_eq!(config.server_url, "opc.tcp://localhost:4840");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.sampling_interval(), Duration::from_millis(500));
        assert_eq!(config.observation_window(), Duration::from_secs(10));
        assert_eq!(config.inter_batch_delay(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TagwatchConfig::default();
        config.server_url = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = TagwatchConfig::default();
        config.server_url = "http://plc:4840".to_string();
        assert!(config.validate().is_err());

        let mut config = TagwatchConfig::default();
        config.sampling_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = TagwatchConfig::default();
        config.inter_batch_delay_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = TagwatchConfig::default();
        config.inter_batch_delay_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = TagwatchConfig::default();
        config.input_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_delay() {
        for delay in [1e300, f64::INFINITY] {
            let config = TagwatchConfig {
                inter_batch_delay_secs: delay,
                ..TagwatchConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("inter_batch_delay_secs"), "unexpected {}", err);
        }
    }

    #[test]
    fn test_zero_batch_size_is_valid() {
        let config = TagwatchConfig {
            batch_size: 0,
            ..TagwatchConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline_settings().batch_size, 0);
    }

    #[test]
    fn test_fractional_delay() {
        let config = TagwatchConfig {
            inter_batch_delay_secs: 0.25,
            ..TagwatchConfig::default()
        };
        assert_eq!(config.pipeline_settings().batch_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_session_config() {
        let mut config = TagwatchConfig::default();
        config.server_url = "opc.tcp://plc:4840".to_string();
        config.session.application_name = "line3".to_string();
        config.session.verify_nodes = false;

        let session = config.session_config().unwrap();
        assert_eq!(session.endpoint, "opc.tcp://plc:4840");
        assert_eq!(session.application_uri, "urn:line3:client");
        assert!(!session.verify_nodes);
        assert_eq!(session.session_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_security_mismatch() {
        let mut config = TagwatchConfig::default();
        config.session.security_mode = SecurityMode::SignAndEncrypt;
        assert!(config.validate().is_err());

        config.session.security_policy = SecurityPolicy::Basic256Sha256;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_file_path() {
        let now = FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 7, 14, 5, 9)
            .unwrap();

        let config = TagwatchConfig {
            output_path: PathBuf::from("out/resultTagList"),
            ..TagwatchConfig::default()
        };
        assert_eq!(
            config.output_file_path(&now),
            PathBuf::from("out/resultTagList_2024_03_07_14_05_09.csv")
        );

        let config = TagwatchConfig {
            output_path: PathBuf::from("values.csv"),
            timestamp_output: false,
            ..TagwatchConfig::default()
        };
        assert_eq!(config.output_file_path(&Utc::now()), PathBuf::from("values.csv"));
    }

    #[test]
    fn test_json_roundtrip_defaults() {
        let config: TagwatchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TagwatchConfig::default());

        assert!(serde_json::from_str::<TagwatchConfig>(r#"{"unknown": 1}"#).is_err());
    }
}
