// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA side of tagwatch.
//!
//! This crate turns a tag list into records: it resolves tags against a live
//! session, registers the resulting nodes on one subscription in paced
//! batches, formats every value change and tears the subscription down after
//! the observation window.
//!
//! # Features
//!
//! - [`OpcUaSession`] collaborator trait, mockable in tests
//! - [`TagResolver`] with per-tag failure isolation
//! - [`SubscriptionManager`] with a single notification dispatcher
//! - [`TagPipeline`] for subscription and one-shot read runs
//! - A real session on the `opcua` crate behind the `real-transport` feature
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint and connection issues
//! ├── Session       - Session lifecycle errors
//! ├── Resolution    - Tag does not map to a node
//! ├── Operation     - Read failures
//! ├── Subscription  - Subscription and monitored item errors
//! └── Configuration - Invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tagwatch_opcua::{PipelineSettings, RealOpcUaSession, SessionConfig, TagPipeline};
//!
//! let session = RealOpcUaSession::new(SessionConfig::new("opc.tcp://localhost:4840"));
//! let pipeline = TagPipeline::new(Arc::new(Mutex::new(session)), PipelineSettings::default());
//! let summary = pipeline.run_subscription(&tags, records).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod types;

pub use error::{
    ConnectionError, ErrorSeverity, OpcUaError, OpcUaResult, OperationError, ResolutionError,
    SessionError, SubscriptionError,
};

pub use types::{SecurityMode, SecurityPolicy, SessionConfig, SessionConfigBuilder, UserIdentity};

pub use client::{
    notification_channel, BatchOutcome, CloseReport, DataChangeNotification, MonitoredItemId,
    NotificationReceiver, NotificationSender, OpcUaSession, SubscriptionId, SubscriptionManager,
    SubscriptionState, SubscriptionStats,
};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaSession;

pub use pipeline::{PipelineError, PipelineSettings, RunSummary, TagPipeline};
pub use resolver::{Resolution, TagResolver};
