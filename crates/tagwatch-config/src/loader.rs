// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading for tagwatch.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and resolve `${VAR}` / `${VAR:default}` placeholders
//! 2. Parse YAML, TOML or JSON, chosen by extension
//! 3. Apply `TAGWATCH_*` environment overrides
//! 4. Resolve relative paths against the config file's directory
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! TAGWATCH_SERVER_URL=opc.tcp://plc:4840
//! TAGWATCH_BATCH_SIZE=200
//! TAGWATCH_INTER_BATCH_DELAY_SECS=0.5
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::TagwatchConfig;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tagwatch_opcua::UserIdentity;
use tracing::{debug, info, warn};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for tagwatch.
///
/// # Examples
///
/// ```no_run
/// use tagwatch_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("tagwatch.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,

    /// Whether to validate after loading.
    validate: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: "TAGWATCH".to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
            validate: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables validation.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Environment variable prefix in use.
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<TagwatchConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        if self.resolve_paths {
            resolve_relative_paths(&mut config, &base_path);
        }

        if self.validate {
            config.validate()?;
        }

        debug!(
            server_url = %config.server_url,
            batch_size = config.batch_size,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<TagwatchConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let mut config = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        if self.validate {
            config.validate()?;
        }

        Ok(config)
    }

    /// Loads from `path` when given, otherwise starts from the defaults.
    ///
    /// Environment overrides and validation apply either way.
    pub fn load_or_default(&self, path: Option<&Path>) -> ConfigResult<TagwatchConfig> {
        if let Some(path) = path {
            return self.load(path);
        }

        debug!("No configuration file given, using defaults");
        let mut config = TagwatchConfig::default();
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if self.validate {
            config.validate()?;
        }
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<TagwatchConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&self, config: &mut TagwatchConfig) -> ConfigResult<()> {
        self.apply_overrides_from(config, |name| env::var(name).ok())
    }

    /// Applies overrides looked up through `lookup`.
    pub fn apply_overrides_from<F>(&self, config: &mut TagwatchConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}_{}", self.env_prefix, suffix);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, value)) = var("SERVER_URL") {
            config.server_url = value;
        }
        if let Some((_, value)) = var("INPUT_PATH") {
            config.input_path = PathBuf::from(value);
        }
        if let Some((_, value)) = var("OUTPUT_PATH") {
            config.output_path = PathBuf::from(value);
        }
        if let Some((_, value)) = var("TIMESTAMP_OUTPUT") {
            config.timestamp_output = parse_bool(&value);
        }
        if let Some((name, value)) = var("SAMPLING_INTERVAL_MS") {
            config.sampling_interval_ms = parse_number(&name, &value)?;
        }
        if let Some((name, value)) = var("OBSERVATION_WINDOW_SECS") {
            config.observation_window_secs = parse_number(&name, &value)?;
        }
        if let Some((name, value)) = var("BATCH_SIZE") {
            config.batch_size = parse_number(&name, &value)?;
        }
        if let Some((name, value)) = var("INTER_BATCH_DELAY_SECS") {
            config.inter_batch_delay_secs = parse_number(&name, &value)?;
        }

        if let Some((_, value)) = var("APPLICATION_NAME") {
            config.session.application_name = value;
        }
        if let Some((name, value)) = var("SECURITY_MODE") {
            config.session.security_mode =
                value.parse().map_err(|e| ConfigError::invalid_env_var(name, format!("{}", e)))?;
        }
        if let Some((name, value)) = var("SECURITY_POLICY") {
            config.session.security_policy =
                value.parse().map_err(|e| ConfigError::invalid_env_var(name, format!("{}", e)))?;
        }
        if let Some((name, value)) = var("SESSION_TIMEOUT_MS") {
            config.session.session_timeout_ms = parse_number(&name, &value)?;
        }
        if let Some((_, value)) = var("TRUST_SERVER_CERTS") {
            config.session.trust_server_certs = parse_bool(&value);
        }
        if let Some((_, value)) = var("VERIFY_NODES") {
            config.session.verify_nodes = parse_bool(&value);
        }

        match (var("USERNAME"), var("PASSWORD")) {
            (Some((_, username)), password) => {
                let password = password.map(|(_, p)| p).unwrap_or_default();
                config.session.user = UserIdentity::user_name(username, password);
            }
            (None, Some((name, _))) => {
                warn!("{} is set without a username and is ignored", name);
            }
            (None, None) => {}
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for ConfigLoader.
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    base_path: Option<PathBuf>,
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    resolve_paths: Option<bool>,
    validate: Option<bool>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base path.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Enables or disables path resolution.
    pub fn resolve_paths(mut self, enabled: bool) -> Self {
        self.resolve_paths = Some(enabled);
        self
    }

    /// Enables or disables validation after loading.
    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate = Some(enabled);
        self
    }

    /// Builds the ConfigLoader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();

        if let Some(base_path) = self.base_path {
            loader.base_path = Some(base_path);
        }
        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(resolve_env_vars) = self.resolve_env_vars {
            loader.resolve_env_vars = resolve_env_vars;
        }
        if let Some(resolve_paths) = self.resolve_paths {
            loader.resolve_paths = resolve_paths;
        }
        if let Some(validate) = self.validate {
            loader.validate = validate;
        }

        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<TagwatchConfig> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

/// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
///
/// Unknown variables without a default are left in place.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!("Environment variable '{}' not found", name);
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }

        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn resolve_relative_paths(config: &mut TagwatchConfig, base_path: &Path) {
    if config.input_path.is_relative() {
        config.input_path = base_path.join(&config.input_path);
    }
    if config.output_path.is_relative() {
        config.output_path = base_path.join(&config.output_path);
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_env_var(name, format!("expected a number, got '{}'", value)))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<TagwatchConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<TagwatchConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
