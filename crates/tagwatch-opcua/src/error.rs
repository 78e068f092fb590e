// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA error types.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - endpoint discovery and connect failures      (fatal)
//! ├── Session       - session lifecycle errors                     (fatal)
//! ├── Resolution    - tag does not map to a node                   (per tag)
//! ├── Operation     - read failures                                (per tag)
//! ├── Subscription  - subscription and monitored item errors       (creation fatal, rest per item)
//! └── Configuration - invalid settings                             (fatal)
//! ```
//!
//! Per-item errors are converted into diagnostic records by the caller and
//! never abort a run. [`OpcUaError::is_session_fatal`] picks out the rest.
//!
//! # Examples
//!
//! ```
//! use tagwatch_opcua::error::{OpcUaError, ErrorSeverity};
//!
//! let error = OpcUaError::connection_refused("opc.tcp://localhost:4840");
//! assert!(error.is_session_fatal());
//! assert_eq!(error.severity(), ErrorSeverity::Critical);
//!
//! let error = OpcUaError::unknown_node("ns=2;s=Missing");
//! assert!(!error.is_session_fatal());
//! ```

use std::fmt;

use thiserror::Error;
use tracing::Level;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for OPC UA operations.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Tag resolution errors.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// Read operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Subscription and monitoring errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Configuration errors.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message.
        message: String,
    },
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates a resolution error.
    #[inline]
    pub fn resolution(error: ResolutionError) -> Self {
        Self::Resolution(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(error: SubscriptionError) -> Self {
        Self::Subscription(error)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    // =========================================================================
    // Convenience Constructors
    // =========================================================================

    /// Creates a connection refused error.
    pub fn connection_refused(endpoint: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::refused(endpoint))
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a session creation error.
    pub fn session_failed(message: impl Into<String>) -> Self {
        Self::Session(SessionError::creation_failed(message))
    }

    /// Creates an invalid identifier error.
    pub fn invalid_identifier(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution(ResolutionError::invalid_identifier(tag, reason))
    }

    /// Creates an unknown node error.
    pub fn unknown_node(node_id: impl Into<String>) -> Self {
        Self::Resolution(ResolutionError::unknown_node(node_id))
    }

    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::read_failed(node_id, message))
    }

    /// Creates a monitored item registration error.
    pub fn registration_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription(SubscriptionError::registration_failed(node_id, message))
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Returns `true` if the run cannot continue after this error.
    ///
    /// Connection, session, configuration and subscription-creation failures
    /// are fatal. Everything else is reported per item.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Session(_) | Self::Configuration { .. } => true,
            Self::Subscription(e) => e.is_fatal(),
            Self::Resolution(_) | Self::Operation(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(_) | Self::Session(_) | Self::Configuration { .. } => {
                ErrorSeverity::Critical
            }
            Self::Subscription(e) if e.is_fatal() => ErrorSeverity::Critical,
            Self::Subscription(_) => ErrorSeverity::Warning,
            Self::Resolution(_) => ErrorSeverity::Warning,
            Self::Operation(_) => ErrorSeverity::Error,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Resolution(_) => "resolution",
            Self::Operation(_) => "operation",
            Self::Subscription(_) => "subscription",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                category = self.category(),
                context = context,
                fatal = self.is_session_fatal(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                category = self.category(),
                context = context,
                fatal = self.is_session_fatal(),
                "{self}"
            ),
            _ => tracing::debug!(
                category = self.category(),
                context = context,
                fatal = self.is_session_fatal(),
                "{self}"
            ),
        }
    }
}

/// Result type for OPC UA operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection refused.
    #[error("Connection refused to '{endpoint}'")]
    Refused {
        /// Target endpoint.
        endpoint: String,
    },

    /// Endpoint discovery failed.
    #[error("Endpoint not found: '{endpoint}'")]
    EndpointNotFound {
        /// The endpoint URL.
        endpoint: String,
    },

    /// No endpoint matched the requested security settings.
    #[error("No suitable endpoint found with security mode '{security_mode}' and policy '{security_policy}'")]
    NoSuitableEndpoint {
        /// Required security mode.
        security_mode: String,
        /// Required security policy.
        security_policy: String,
    },

    /// Not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
        }
    }

    /// Creates an endpoint not found error.
    pub fn endpoint_not_found(endpoint: impl Into<String>) -> Self {
        Self::EndpointNotFound {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(
        security_mode: impl Into<String>,
        security_policy: impl Into<String>,
    ) -> Self {
        Self::NoSuitableEndpoint {
            security_mode: security_mode.into(),
            security_policy: security_policy.into(),
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session could not be created or activated.
    #[error("Failed to create session: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// Session was closed.
    #[error("Session closed: {reason}")]
    Closed {
        /// Reason for closure.
        reason: String,
    },
}

impl SessionError {
    /// Creates a session creation error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a session closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// ResolutionError
// =============================================================================

/// A tag identifier does not map to a server node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The identifier is not a valid node id.
    #[error("Invalid node id '{tag}': {reason}")]
    InvalidIdentifier {
        /// The rejected identifier.
        tag: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The server does not know the node.
    #[error("Unknown node '{node_id}'")]
    UnknownNode {
        /// The node id.
        node_id: String,
    },

    /// The lookup itself failed.
    #[error("Lookup of '{tag}' failed: {message}")]
    LookupFailed {
        /// The identifier being resolved.
        tag: String,
        /// Underlying failure.
        message: String,
    },
}

impl ResolutionError {
    /// Creates an invalid identifier error.
    pub fn invalid_identifier(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unknown node error.
    pub fn unknown_node(node_id: impl Into<String>) -> Self {
        Self::UnknownNode {
            node_id: node_id.into(),
        }
    }

    /// Creates a lookup failed error.
    pub fn lookup_failed(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LookupFailed {
            tag: tag.into(),
            message: message.into(),
        }
    }
}

impl From<tagwatch_core::NodeIdParseError> for ResolutionError {
    fn from(e: tagwatch_core::NodeIdParseError) -> Self {
        Self::InvalidIdentifier {
            tag: e.input,
            reason: e.reason,
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read operation errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Read failed.
    #[error("Read failed for node '{node_id}': {message}")]
    ReadFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Service call returned a bad status.
    #[error("Bad status for node '{node_id}': {status}")]
    BadStatus {
        /// Node ID.
        node_id: String,
        /// Status code name.
        status: String,
    },
}

impl OperationError {
    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status: impl fmt::Display) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status: status.to_string(),
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitored item errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Subscription creation failed.
    #[error("Failed to create subscription: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// A node could not be added to the subscription.
    #[error("Failed to create monitored item for node '{node_id}': {message}")]
    RegistrationFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// A monitored item could not be removed.
    #[error("Failed to delete monitored item {item_id}: {message}")]
    UnregistrationFailed {
        /// Monitored item ID.
        item_id: u32,
        /// Error message.
        message: String,
    },

    /// The subscription could not be deleted.
    #[error("Failed to delete subscription {subscription_id}: {message}")]
    DeletionFailed {
        /// Subscription ID.
        subscription_id: u32,
        /// Error message.
        message: String,
    },

    /// An operation needs an open subscription.
    #[error("Subscription is not open")]
    NotOpen,

    /// The subscription has already been torn down.
    #[error("Subscription is closed")]
    Closed,
}

impl SubscriptionError {
    /// Creates a creation failed error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a registration failed error.
    pub fn registration_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates an unregistration failed error.
    pub fn unregistration_failed(item_id: u32, message: impl Into<String>) -> Self {
        Self::UnregistrationFailed {
            item_id,
            message: message.into(),
        }
    }

    /// Creates a deletion failed error.
    pub fn deletion_failed(subscription_id: u32, message: impl Into<String>) -> Self {
        Self::DeletionFailed {
            subscription_id,
            message: message.into(),
        }
    }

    /// Returns `true` if no subscription can exist after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CreationFailed { .. })
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - one item affected, run continues.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - the run stops.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error => Level::ERROR,
            Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
