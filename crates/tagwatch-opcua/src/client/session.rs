// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA session abstraction.
//!
//! [`OpcUaSession`] is the collaborator every other component talks to. The
//! real implementation wraps the `opcua` crate; tests substitute a mock.
//!
//! # Subscription Model
//!
//! ```text
//! create_subscription(interval, sender) ──► SubscriptionId
//!        │
//!        ├── watch(id, handle)   ──► MonitoredItemId ─┐
//!        ├── watch(id, handle)   ──► MonitoredItemId ─┤  transport thread
//!        │                                            ▼
//!        │                          sender.send(DataChangeNotification)
//!        ├── unwatch(id, item)
//!        └── delete_subscription(id)
//! ```
//!
//! The transport must never block on the notification sender: it is an
//! unbounded channel and send errors (receiver gone) are ignored.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use tagwatch_core::{DataValue, NodeHandle, TagIdentifier};

use crate::error::OpcUaResult;

// =============================================================================
// Identifiers
// =============================================================================

/// Server-assigned subscription id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned monitored item id.
///
/// This is the subscription handle of a single watched node; it is only
/// meaningful while its subscription exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitoredItemId(pub u32);

impl fmt::Display for MonitoredItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// A value change pushed by the server for one monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChangeNotification {
    /// Item whose value changed.
    pub item: MonitoredItemId,
    /// The new value.
    pub value: DataValue,
}

impl DataChangeNotification {
    /// Creates a notification.
    pub fn new(item: MonitoredItemId, value: DataValue) -> Self {
        Self { item, value }
    }
}

/// Sending half handed to the transport when a subscription is created.
pub type NotificationSender = mpsc::UnboundedSender<DataChangeNotification>;

/// Receiving half consumed by the subscription dispatcher.
pub type NotificationReceiver = mpsc::UnboundedReceiver<DataChangeNotification>;

/// Creates a notification channel.
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::unbounded_channel()
}

// =============================================================================
// OpcUaSession
// =============================================================================

/// A live connection to one OPC UA server.
///
/// Implementations must be `Send + Sync`; the manager serializes calls
/// through a mutex, so methods taking `&self` need no internal locking for
/// correctness against each other.
#[async_trait]
pub trait OpcUaSession: Send + Sync {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connects and activates the session.
    async fn connect(&mut self) -> OpcUaResult<()>;

    /// Closes the session. Safe to call when not connected.
    async fn disconnect(&mut self) -> OpcUaResult<()>;

    /// Returns `true` while the session is usable.
    fn is_connected(&self) -> bool;

    /// The endpoint URL this session targets.
    fn endpoint(&self) -> &str;

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Resolves a tag identifier to a node on the server.
    async fn resolve_node(&self, tag: &TagIdentifier) -> OpcUaResult<NodeHandle>;

    /// Reads the current value of a node once.
    async fn read_value(&self, handle: &NodeHandle) -> OpcUaResult<DataValue>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Creates a subscription publishing at `interval`.
    ///
    /// Every value change of an item later added with [`watch`](Self::watch)
    /// is sent on `sender`.
    async fn create_subscription(
        &self,
        interval: Duration,
        sender: NotificationSender,
    ) -> OpcUaResult<SubscriptionId>;

    /// Adds a node to the subscription.
    async fn watch(
        &self,
        subscription: SubscriptionId,
        handle: &NodeHandle,
    ) -> OpcUaResult<MonitoredItemId>;

    /// Adds several nodes in one request.
    ///
    /// The outer error means the whole request failed; inner results are per
    /// node, in input order. The default issues one [`watch`](Self::watch)
    /// per node.
    async fn watch_many(
        &self,
        subscription: SubscriptionId,
        handles: &[NodeHandle],
    ) -> OpcUaResult<Vec<OpcUaResult<MonitoredItemId>>> {
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(self.watch(subscription, handle).await);
        }
        Ok(results)
    }

    /// Removes a monitored item.
    async fn unwatch(&self, subscription: SubscriptionId, item: MonitoredItemId) -> OpcUaResult<()>;

    /// Deletes the subscription.
    async fn delete_subscription(&self, subscription: SubscriptionId) -> OpcUaResult<()>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tagwatch_core::Variant;

    #[tokio::test]
    async fn test_notification_channel() {
        let (tx, mut rx) = notification_channel();
        tx.send(DataChangeNotification::new(
            MonitoredItemId(4),
            DataValue::new(Variant::Int32(1)),
        ))
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.item, MonitoredItemId(4));
        assert_eq!(received.item.to_string(), "4");
    }
}
