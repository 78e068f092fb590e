// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session settings and endpoint security types.
//!
//! These types are serde-friendly so the configuration crate can embed them
//! directly in the run configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OpcUaError;

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No security (messages are neither signed nor encrypted).
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }

    /// Returns `true` if this mode provides no security.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "sign" => Ok(Self::Sign),
            "signandencrypt" => Ok(Self::SignAndEncrypt),
            _ => Err(OpcUaError::configuration(format!(
                "Invalid security mode: '{}'. Valid values: none, sign, sign_and_encrypt",
                s
            ))),
        }
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security policy.
    #[default]
    None,

    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,

    /// Basic256 (deprecated).
    Basic256,

    /// Basic256Sha256.
    Basic256Sha256,

    /// Aes128Sha256RsaOaep.
    Aes128Sha256RsaOaep,

    /// Aes256Sha256RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "basic128rsa15" => Ok(Self::Basic128Rsa15),
            "basic256" => Ok(Self::Basic256),
            "basic256sha256" => Ok(Self::Basic256Sha256),
            "aes128sha256rsaoaep" => Ok(Self::Aes128Sha256RsaOaep),
            "aes256sha256rsapss" => Ok(Self::Aes256Sha256RsaPss),
            _ => Err(OpcUaError::configuration(format!(
                "Invalid security policy: '{}'",
                s
            ))),
        }
    }
}

// =============================================================================
// UserIdentity
// =============================================================================

/// Identity presented when activating the session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserIdentity {
    /// Anonymous access.
    #[default]
    Anonymous,

    /// Username and password.
    UserName {
        /// Login name.
        username: String,
        /// Password.
        password: String,
    },
}

impl UserIdentity {
    /// Creates a username/password identity.
    pub fn user_name(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserName {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns `true` for anonymous access.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

// =============================================================================
// SessionConfig
// =============================================================================

/// Everything needed to open a session and a subscription on it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Server endpoint URL (`opc.tcp://host:port`).
    pub endpoint: String,

    /// Client application name.
    pub application_name: String,

    /// Client application URI.
    pub application_uri: String,

    /// Message security mode.
    pub security_mode: SecurityMode,

    /// Security policy.
    pub security_policy: SecurityPolicy,

    /// User identity.
    pub user: UserIdentity,

    /// Requested session timeout.
    pub session_timeout: Duration,

    /// Accept the server certificate without a trust store lookup.
    pub trust_server_certs: bool,

    /// Check that resolved nodes exist on the server.
    pub verify_nodes: bool,

    /// Subscription lifetime count.
    pub lifetime_count: u32,

    /// Subscription keep-alive count.
    pub max_keep_alive_count: u32,

    /// Server-side queue size per monitored item.
    pub queue_size: u32,
}

impl SessionConfig {
    /// Creates a configuration for the endpoint with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Creates a builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "opc.tcp://localhost:4840".to_string(),
            application_name: "tagwatch".to_string(),
            application_uri: "urn:tagwatch:client".to_string(),
            security_mode: SecurityMode::None,
            security_policy: SecurityPolicy::None,
            user: UserIdentity::Anonymous,
            session_timeout: Duration::from_millis(300_000),
            trust_server_certs: true,
            verify_nodes: true,
            lifetime_count: 60,
            max_keep_alive_count: 10,
            queue_size: 10,
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Sets the endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets the application name; the URI follows it.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.config.application_uri = format!("urn:{}:client", name);
        self.config.application_name = name;
        self
    }

    /// Sets the security mode and policy.
    pub fn security(mut self, mode: SecurityMode, policy: SecurityPolicy) -> Self {
        self.config.security_mode = mode;
        self.config.security_policy = policy;
        self
    }

    /// Sets the user identity.
    pub fn user(mut self, user: UserIdentity) -> Self {
        self.config.user = user;
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Sets whether server certificates are trusted automatically.
    pub fn trust_server_certs(mut self, trust: bool) -> Self {
        self.config.trust_server_certs = trust;
        self
    }

    /// Sets whether resolution verifies node existence.
    pub fn verify_nodes(mut self, verify: bool) -> Self {
        self.config.verify_nodes = verify;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<SessionConfig, OpcUaError> {
        if self.config.endpoint.trim().is_empty() {
            return Err(OpcUaError::configuration("Endpoint URL cannot be empty"));
        }
        if !self.config.endpoint.starts_with("opc.tcp://") {
            return Err(OpcUaError::configuration(format!(
                "Endpoint URL must start with 'opc.tcp://': '{}'",
                self.config.endpoint
            )));
        }
        if self.config.security_mode.is_none() != matches!(self.config.security_policy, SecurityPolicy::None) {
            return Err(OpcUaError::configuration(format!(
                "Security mode '{}' does not match policy '{}'",
                self.config.security_mode, self.config.security_policy
            )));
        }
        Ok(self.config)
    }
}

// =============================================================================
// Tests
// =============================================================================
