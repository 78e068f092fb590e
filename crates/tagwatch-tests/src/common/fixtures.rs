// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built tag lists, payloads and configurations.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use tagwatch_core::{DataValue, StatusCode, TagIdentifier, Variant};
use tagwatch_opcua::PipelineSettings;

// =============================================================================
// Tag Fixtures
// =============================================================================

/// Tag list fixtures.
pub struct TagFixtures;

impl TagFixtures {
    /// Two resolvable tags and one malformed identifier.
    pub const MIXED: [&'static str; 3] = ["ns=2;s=tag1", "ns=2;s=tag2", "bad.tag"];

    /// Builds identifiers from raw strings.
    pub fn parse(tags: &[&str]) -> Vec<TagIdentifier> {
        tags.iter().map(TagIdentifier::new).collect()
    }

    /// `count` string node ids in namespace 2: `ns=2;s=Tag1`, `ns=2;s=Tag2`, ...
    pub fn numbered(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("ns=2;s=Tag{}", i)).collect()
    }

    /// Tag list file content with one tag per line.
    pub fn file_content(tags: &[&str]) -> String {
        let mut content = tags.join("\n");
        content.push('\n');
        content
    }
}

// =============================================================================
// Payload Fixtures
// =============================================================================

/// Value payload fixtures.
pub struct PayloadFixtures;

impl PayloadFixtures {
    /// Fixed source timestamp used by every fixture payload.
    pub fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap()
    }

    /// The rendered form of [`timestamp`](Self::timestamp).
    pub const TIMESTAMP: &'static str = "2024-03-15T10:30:00Z";

    /// A good double value.
    pub fn double(value: f64) -> DataValue {
        Self::good(Variant::Double(value))
    }

    /// A good string value.
    pub fn text(value: &str) -> DataValue {
        Self::good(Variant::String(value.to_string()))
    }

    /// A good payload with any variant.
    pub fn good(value: Variant) -> DataValue {
        DataValue::new(value)
            .with_status(StatusCode::GOOD)
            .with_source_timestamp(Self::timestamp())
    }

    /// A payload missing its status code.
    pub fn without_status(value: Variant) -> DataValue {
        DataValue::new(value).with_source_timestamp(Self::timestamp())
    }
}

// =============================================================================
// Settings Fixtures
// =============================================================================

/// Pipeline settings fixtures.
pub struct SettingsFixtures;

impl SettingsFixtures {
    /// Small batches with a one second pause and a ten second window.
    pub fn paced(batch_size: usize) -> PipelineSettings {
        PipelineSettings {
            sampling_interval: Duration::from_millis(100),
            observation_window: Duration::from_secs(10),
            batch_size,
            batch_delay: Duration::from_secs(1),
        }
    }

    /// No pause and no observation window.
    pub fn immediate() -> PipelineSettings {
        PipelineSettings {
            sampling_interval: Duration::from_millis(100),
            observation_window: Duration::ZERO,
            batch_size: 0,
            batch_delay: Duration::ZERO,
        }
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Configuration file fixtures.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Minimal YAML configuration.
    pub fn minimal_yaml() -> &'static str {
        r#"
server_url: "opc.tcp://plc.local:4840"
"#
    }

    /// YAML configuration setting every top-level field.
    pub fn full_yaml() -> &'static str {
        r#"
server_url: "opc.tcp://plc.local:4840"
input_path: "tags/line1.txt"
output_path: "out/line1"
timestamp_output: false
sampling_interval_ms: 250
observation_window_secs: 30
batch_size: 50
inter_batch_delay_secs: 0.5
session:
  application_name: "line1-watch"
  security_mode: sign_and_encrypt
  security_policy: basic256_sha256
  user:
    type: user_name
    username: "operator"
    password: "secret"
  session_timeout_ms: 60000
  trust_server_certs: false
  verify_nodes: true
"#
    }

    /// Equivalent TOML configuration.
    pub fn full_toml() -> &'static str {
        r#"
server_url = "opc.tcp://plc.local:4840"
input_path = "tags/line1.txt"
output_path = "out/line1"
timestamp_output = false
sampling_interval_ms = 250
observation_window_secs = 30
batch_size = 50
inter_batch_delay_secs = 0.5

[session]
application_name = "line1-watch"
security_mode = "sign_and_encrypt"
security_policy = "basic256_sha256"
session_timeout_ms = 60000
trust_server_certs = false
verify_nodes = true

[session.user]
type = "user_name"
username = "operator"
password = "secret"
"#
    }
}
