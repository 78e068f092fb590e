// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagwatch-config
//!
//! Run configuration for tagwatch.
//!
//! ## Features
//!
//! - **Schema**: [`TagwatchConfig`] with documented defaults for every field
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `TAGWATCH_*` variables and `${VAR:default}` placeholders
//! - **Output Naming**: timestamped result file names
//!
//! ## Quick Start
//!
//! ```no_run
//! use tagwatch_config::loader::load_config;
//!
//! let config = load_config("tagwatch.yaml").unwrap();
//! println!("Server: {}", config.server_url);
//! println!("Batch size: {}", config.batch_size);
//! ```
//!
//! ## Environment Variables
//!
//! ```text
//! TAGWATCH_SERVER_URL=opc.tcp://plc:4840
//! TAGWATCH_SAMPLING_INTERVAL_MS=1000
//! TAGWATCH_OBSERVATION_WINDOW_SECS=15
//! TAGWATCH_USERNAME=operator
//! TAGWATCH_PASSWORD=secret
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder};
pub use schema::{
    SessionSettings, TagwatchConfig, DEFAULT_INPUT_PATH, DEFAULT_OUTPUT_PATH, DEFAULT_SERVER_URL,
    OUTPUT_TIMESTAMP_FORMAT,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(NAME, "tagwatch-config");
        assert!(!VERSION.is_empty());
    }
}
