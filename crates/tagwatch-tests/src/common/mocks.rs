// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! An in-memory OPC UA session for driving the pipeline without a server.
//!
//! ## Design Principles
//!
//! - Configurable behavior for different test scenarios
//! - Recording of interactions for verification
//! - Cheap to clone; clones share state so a test keeps a handle after
//!   moving the session into a pipeline

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use tagwatch_core::{DataValue, NodeHandle, NodeId, TagIdentifier};
use tagwatch_opcua::{
    DataChangeNotification, MonitoredItemId, NotificationSender, OpcUaError, OpcUaResult,
    OpcUaSession, OperationError, ResolutionError, SubscriptionError, SubscriptionId,
};

use super::fixtures::PayloadFixtures;

// =============================================================================
// MockCall
// =============================================================================

/// One recorded session call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `resolve_node` with the raw tag.
    Resolve(String),
    /// `read_value`
    Read(NodeId),
    /// `create_subscription` with the requested interval.
    CreateSubscription(Duration),
    /// `watch_many` with the batch size.
    WatchBatch(usize),
    /// `unwatch`
    Unwatch(MonitoredItemId),
    /// `delete_subscription`
    DeleteSubscription(SubscriptionId),
}

// =============================================================================
// MockSession
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    connected: AtomicBool,

    /// Values served by the address space, keyed by node.
    values: RwLock<HashMap<NodeId, DataValue>>,

    fail_connect: AtomicBool,
    fail_create_subscription: AtomicBool,
    fail_watch_request: AtomicBool,
    fail_unwatch: AtomicBool,
    fail_delete: AtomicBool,

    /// Tags whose lookup fails with a transport error.
    failing_lookups: RwLock<HashSet<String>>,
    /// Nodes that exist but reject monitoring.
    failing_watches: RwLock<HashSet<NodeId>>,
    /// Nodes that exist but fail to read.
    failing_reads: RwLock<HashSet<NodeId>>,

    /// Send the current value when a node is watched.
    initial_values: AtomicBool,

    next_subscription: AtomicU32,
    next_item: AtomicU32,
    sender: Mutex<Option<NotificationSender>>,
    items: RwLock<HashMap<MonitoredItemId, NodeId>>,

    calls: Mutex<Vec<MockCall>>,
    batch_times: Mutex<Vec<(Instant, usize)>>,
}

/// A scriptable OPC UA session.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    state: Arc<MockState>,
}

impl MockSession {
    /// Creates a session with an empty address space.
    pub fn new() -> Self {
        let session = Self::default();
        session.state.initial_values.store(true, Ordering::SeqCst);
        session
    }

    /// Creates a session serving each node string with a default payload.
    pub fn with_nodes(nodes: &[&str]) -> Self {
        let session = Self::new();
        for (i, node) in nodes.iter().enumerate() {
            session.set_value(node, PayloadFixtures::double(i as f64 + 1.0));
        }
        session
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Sets the value of a node, adding it to the address space.
    pub fn set_value(&self, node: &str, value: DataValue) {
        self.state.values.write().insert(parse_node(node), value);
    }

    /// Makes `connect` fail.
    pub fn fail_connect(&self) {
        self.state.fail_connect.store(true, Ordering::SeqCst);
    }

    /// Makes `create_subscription` fail.
    pub fn fail_create_subscription(&self) {
        self.state.fail_create_subscription.store(true, Ordering::SeqCst);
    }

    /// Makes every `watch_many` request fail as a whole.
    pub fn fail_watch_request(&self) {
        self.state.fail_watch_request.store(true, Ordering::SeqCst);
    }

    /// Makes every `unwatch` fail.
    pub fn fail_unwatch(&self) {
        self.state.fail_unwatch.store(true, Ordering::SeqCst);
    }

    /// Makes `delete_subscription` fail.
    pub fn fail_delete(&self) {
        self.state.fail_delete.store(true, Ordering::SeqCst);
    }

    /// Makes the lookup of `tag` fail with a transport error.
    pub fn fail_lookup(&self, tag: &str) {
        self.state.failing_lookups.write().insert(tag.to_string());
    }

    /// Makes monitoring of `node` fail.
    pub fn fail_watch(&self, node: &str) {
        self.state.failing_watches.write().insert(parse_node(node));
    }

    /// Makes reads of `node` fail.
    pub fn fail_read(&self, node: &str) {
        self.state.failing_reads.write().insert(parse_node(node));
    }

    /// Stops sending the current value when a node is watched.
    pub fn without_initial_values(self) -> Self {
        self.state.initial_values.store(false, Ordering::SeqCst);
        self
    }

    // =========================================================================
    // Notification injection
    // =========================================================================

    /// Pushes a value change for `node` to every monitored item on it.
    ///
    /// Returns how many notifications were queued.
    pub fn emit(&self, node: &str, value: DataValue) -> usize {
        let node = parse_node(node);
        let items: Vec<MonitoredItemId> = self
            .state
            .items
            .read()
            .iter()
            .filter(|(_, n)| **n == node)
            .map(|(item, _)| *item)
            .collect();

        let sender = self.state.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return 0;
        };
        items
            .into_iter()
            .filter(|item| sender.send(DataChangeNotification::new(*item, value.clone())).is_ok())
            .count()
    }

    /// Pushes a notification for an item the manager never registered.
    pub fn emit_for_item(&self, item: MonitoredItemId, value: DataValue) -> bool {
        self.state
            .sender
            .lock()
            .as_ref()
            .map(|s| s.send(DataChangeNotification::new(item, value)).is_ok())
            .unwrap_or(false)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// All recorded calls in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.calls.lock().clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.state.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Sizes of every `watch_many` batch, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.batch_times.lock().iter().map(|(_, size)| *size).collect()
    }

    /// Time between consecutive `watch_many` batches.
    pub fn batch_gaps(&self) -> Vec<Duration> {
        let times = self.state.batch_times.lock();
        times.windows(2).map(|w| w[1].0 - w[0].0).collect()
    }

    /// Monitored items still registered.
    pub fn active_items(&self) -> usize {
        self.state.items.read().len()
    }

    fn record(&self, call: MockCall) {
        self.state.calls.lock().push(call);
    }

    fn ensure_connected(&self) -> OpcUaResult<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OpcUaError::not_connected())
        }
    }
}

#[async_trait]
impl OpcUaSession for MockSession {
    async fn connect(&mut self) -> OpcUaResult<()> {
        self.record(MockCall::Connect);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(OpcUaError::connection_refused(self.endpoint()));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        self.record(MockCall::Disconnect);
        self.state.connected.store(false, Ordering::SeqCst);
        self.state.sender.lock().take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> &str {
        "opc.tcp://mock:4840"
    }

    async fn resolve_node(&self, tag: &TagIdentifier) -> OpcUaResult<NodeHandle> {
        self.record(MockCall::Resolve(tag.to_string()));
        self.ensure_connected()?;

        if self.state.failing_lookups.read().contains(tag.as_str()) {
            return Err(OpcUaError::read_failed(tag.as_str(), "BadTimeout"));
        }

        let node_id: NodeId = tag.as_str().parse().map_err(ResolutionError::from)?;
        if !self.state.values.read().contains_key(&node_id) {
            return Err(OpcUaError::unknown_node(node_id.to_string()));
        }
        Ok(NodeHandle::new(tag.clone(), node_id))
    }

    async fn read_value(&self, handle: &NodeHandle) -> OpcUaResult<DataValue> {
        self.record(MockCall::Read(handle.node_id().clone()));
        self.ensure_connected()?;

        if self.state.failing_reads.read().contains(handle.node_id()) {
            return Err(OpcUaError::operation(OperationError::bad_status(
                handle.node_id().to_string(),
                "BadNotReadable",
            )));
        }
        self.state
            .values
            .read()
            .get(handle.node_id())
            .cloned()
            .ok_or_else(|| OpcUaError::unknown_node(handle.node_id().to_string()))
    }

    async fn create_subscription(
        &self,
        interval: Duration,
        sender: NotificationSender,
    ) -> OpcUaResult<SubscriptionId> {
        self.record(MockCall::CreateSubscription(interval));
        self.ensure_connected()?;

        if self.state.fail_create_subscription.load(Ordering::SeqCst) {
            return Err(SubscriptionError::creation_failed("BadTooManySubscriptions").into());
        }
        *self.state.sender.lock() = Some(sender);
        let id = self.state.next_subscription.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SubscriptionId(id))
    }

    async fn watch(
        &self,
        _subscription: SubscriptionId,
        handle: &NodeHandle,
    ) -> OpcUaResult<MonitoredItemId> {
        self.ensure_connected()?;

        let node_id = handle.node_id();
        if self.state.failing_watches.read().contains(node_id) {
            return Err(OpcUaError::registration_failed(
                node_id.to_string(),
                "BadMonitoredItemFilterInvalid",
            ));
        }

        let item = MonitoredItemId(self.state.next_item.fetch_add(1, Ordering::SeqCst) + 1);
        self.state.items.write().insert(item, node_id.clone());

        if self.state.initial_values.load(Ordering::SeqCst) {
            let value = self.state.values.read().get(node_id).cloned();
            if let (Some(value), Some(sender)) = (value, self.state.sender.lock().as_ref()) {
                let _ = sender.send(DataChangeNotification::new(item, value));
            }
        }
        Ok(item)
    }

    async fn watch_many(
        &self,
        subscription: SubscriptionId,
        handles: &[NodeHandle],
    ) -> OpcUaResult<Vec<OpcUaResult<MonitoredItemId>>> {
        self.record(MockCall::WatchBatch(handles.len()));
        self.state.batch_times.lock().push((Instant::now(), handles.len()));

        if self.state.fail_watch_request.load(Ordering::SeqCst) {
            return Err(OpcUaError::session_failed("BadTooManyOperations"));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(self.watch(subscription, handle).await);
        }
        Ok(results)
    }

    async fn unwatch(&self, _subscription: SubscriptionId, item: MonitoredItemId) -> OpcUaResult<()> {
        self.record(MockCall::Unwatch(item));
        if self.state.fail_unwatch.load(Ordering::SeqCst) {
            return Err(SubscriptionError::unregistration_failed(item.0, "BadMonitoredItemIdInvalid").into());
        }
        self.state.items.write().remove(&item);
        Ok(())
    }

    async fn delete_subscription(&self, subscription: SubscriptionId) -> OpcUaResult<()> {
        self.record(MockCall::DeleteSubscription(subscription));
        if self.state.fail_delete.load(Ordering::SeqCst) {
            return Err(SubscriptionError::deletion_failed(subscription.0, "BadSubscriptionIdInvalid").into());
        }
        self.state.sender.lock().take();
        Ok(())
    }
}

fn parse_node(node: &str) -> NodeId {
    node.parse()
        .unwrap_or_else(|e| panic!("mock node '{}' is not a valid node id: {}", node, e))
}
