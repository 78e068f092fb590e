// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client side.
//!
//! - **Session**: the [`OpcUaSession`] collaborator trait and its identifiers
//! - **Subscription**: [`SubscriptionManager`], one subscription and its dispatcher
//! - **Real session**: the `opcua`-backed implementation (feature `real-transport`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TagPipeline                              │
//! │          (resolve, batch, subscribe, observe, close)            │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SubscriptionManager                          │
//! │          (registrations, dispatcher, teardown)                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OpcUaSession                               │
//! │               (RealOpcUaSession or a mock)                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod session;
pub mod subscription;

#[cfg(feature = "real-transport")]
mod real_session;

pub use session::{
    notification_channel, DataChangeNotification, MonitoredItemId, NotificationReceiver,
    NotificationSender, OpcUaSession, SubscriptionId,
};
pub use subscription::{BatchOutcome, CloseReport, SubscriptionManager, SubscriptionState, SubscriptionStats};

#[cfg(feature = "real-transport")]
pub use real_session::RealOpcUaSession;
