// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription lifecycle and notification dispatch.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────────────────────────────────┐
//!                │             SubscriptionManager              │
//!                │  state: Created → Active → Closing → Closed  │
//!                └──────────────────────────────────────────────┘
//!                    │ open / register_batch / close
//!                    ▼
//!            ┌───────────────┐   DataChangeNotification   ┌────────────┐
//!            │  OpcUaSession │ ─────────────────────────► │ dispatcher │
//!            │  (transport)  │     unbounded channel      │   task     │
//!            └───────────────┘                            └────────────┘
//!                                                               │ format
//!                                                               ▼
//!                                                        RecordSender ──► ResultSink
//! ```
//!
//! The dispatcher only looks up the item, formats a record and queues it. It
//! never calls back into the session, so notifications are never held up by
//! network round trips.
//!
//! Servers publish a monitored item's current value as soon as the item
//! exists, often before the create request returns. `register_batch` holds
//! the registration gate exclusively until every new item is in the
//! registry, and the dispatcher takes it shared before each lookup, so an
//! initial value is never mistaken for a notification of an unknown item.
//!
//! # Teardown
//!
//! [`SubscriptionManager::close`] first stops the dispatcher, draining every
//! notification already queued, then removes each monitored item and finally
//! deletes the subscription. Notifications the transport produces after the
//! dispatcher stopped are discarded by the closed channel. Each step is best
//! effort and `close` may be called any number of times.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;

use tagwatch_core::{NodeHandle, RecordSender, ValueRecordFormatter};

use crate::error::{OpcUaError, OpcUaResult, SubscriptionError};

use super::session::{
    notification_channel, DataChangeNotification, MonitoredItemId, NotificationReceiver,
    OpcUaSession, SubscriptionId,
};

// =============================================================================
// SubscriptionState
// =============================================================================

/// State of the managed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Manager exists; no node is registered yet.
    #[default]
    Created,

    /// At least one node is registered.
    Active,

    /// Teardown in progress.
    Closing,

    /// Everything released.
    Closed,
}

impl SubscriptionState {
    /// Returns `true` if notifications are being collected.
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` once teardown has started.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Active => write!(f, "Active"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of registering one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Nodes added to the subscription.
    pub registered: usize,
    /// Nodes that could not be added.
    pub failed: usize,
}

impl BatchOutcome {
    /// Total nodes attempted.
    pub fn attempted(&self) -> usize {
        self.registered + self.failed
    }
}

/// Result of tearing the subscription down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseReport {
    /// Monitored items removed.
    pub unregistered: usize,
    /// Monitored items whose removal failed.
    pub unregistration_failures: usize,
    /// Whether the server-side subscription was deleted.
    pub subscription_deleted: bool,
    /// `true` when close had already run; nothing was done.
    pub already_closed: bool,
}

impl CloseReport {
    fn already_closed() -> Self {
        Self {
            already_closed: true,
            ..Self::default()
        }
    }
}

// =============================================================================
// SubscriptionStats
// =============================================================================

/// Counters for one managed subscription.
#[derive(Debug, Default)]
pub struct SubscriptionStats {
    registered: AtomicU64,
    registration_failures: AtomicU64,
    notifications_received: AtomicU64,
    notifications_dropped: AtomicU64,
    records_lost: AtomicU64,
    unregistered: AtomicU64,
    unregistration_failures: AtomicU64,
}

impl SubscriptionStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful registration.
    pub fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed registration.
    pub fn record_registration_failure(&self) {
        self.registration_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a notification turned into a record.
    pub fn record_notification(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a notification for an item no longer registered.
    pub fn record_notification_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a record the sink refused.
    pub fn record_record_lost(&self) {
        self.records_lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a monitored item removal.
    pub fn record_unregistered(&self) {
        self.unregistered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed monitored item removal.
    pub fn record_unregistration_failure(&self) {
        self.unregistration_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Nodes registered.
    pub fn registered(&self) -> u64 {
        self.registered.load(Ordering::Relaxed)
    }

    /// Registrations that failed.
    pub fn registration_failures(&self) -> u64 {
        self.registration_failures.load(Ordering::Relaxed)
    }

    /// Notifications formatted into records.
    pub fn notifications_received(&self) -> u64 {
        self.notifications_received.load(Ordering::Relaxed)
    }

    /// Notifications discarded because the item was unknown.
    pub fn notifications_dropped(&self) -> u64 {
        self.notifications_dropped.load(Ordering::Relaxed)
    }

    /// Records the sink refused.
    pub fn records_lost(&self) -> u64 {
        self.records_lost.load(Ordering::Relaxed)
    }

    /// Monitored items removed.
    pub fn unregistered(&self) -> u64 {
        self.unregistered.load(Ordering::Relaxed)
    }

    /// Monitored item removals that failed.
    pub fn unregistration_failures(&self) -> u64 {
        self.unregistration_failures.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

type Registry = Arc<RwLock<HashMap<MonitoredItemId, NodeHandle>>>;
type RegistrationGate = Arc<AsyncRwLock<()>>;

struct Dispatcher {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct DispatchContext {
    registry: Registry,
    gate: RegistrationGate,
    records: RecordSender,
    formatter: ValueRecordFormatter,
    stats: Arc<SubscriptionStats>,
}

impl DispatchContext {
    async fn run(self, mut notifications: NotificationReceiver, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    while let Ok(notification) = notifications.try_recv() {
                        self.deliver(notification).await;
                    }
                    break;
                }

                received = notifications.recv() => match received {
                    Some(notification) => self.deliver(notification).await,
                    None => break,
                },
            }
        }
        tracing::debug!("Notification dispatcher stopped");
    }

    async fn deliver(&self, notification: DataChangeNotification) {
        let handle = {
            let _registered = self.gate.read().await;
            self.registry.read().get(&notification.item).cloned()
        };
        let Some(handle) = handle else {
            self.stats.record_notification_dropped();
            tracing::trace!(item = %notification.item, "Notification for unregistered item dropped");
            return;
        };

        let record = self.formatter.format(&handle, &notification.value);
        tracing::trace!(tag = %handle.tag(), item = %notification.item, "Data change");

        if self.records.send(record).is_err() {
            self.stats.record_record_lost();
            tracing::warn!(tag = %handle.tag(), "Result sink closed, notification lost");
        } else {
            self.stats.record_notification();
        }
    }
}

// =============================================================================
// SubscriptionManager
// =============================================================================

/// Owns one subscription on a session and every node registered on it.
///
/// # Example
///
/// ```rust,ignore
/// let manager = SubscriptionManager::new(session, records);
/// manager.open(Duration::from_millis(500)).await?;
/// manager.register_batch(&handles).await?;
/// tokio::time::sleep(window).await;
/// let report = manager.close().await;
/// ```
pub struct SubscriptionManager<T: OpcUaSession> {
    session: Arc<Mutex<T>>,
    records: RecordSender,
    formatter: ValueRecordFormatter,
    state: RwLock<SubscriptionState>,
    subscription: RwLock<Option<SubscriptionId>>,
    registry: Registry,
    gate: RegistrationGate,
    dispatcher: parking_lot::Mutex<Option<Dispatcher>>,
    stats: Arc<SubscriptionStats>,
}

impl<T: OpcUaSession + 'static> SubscriptionManager<T> {
    /// Creates a manager for the session. Nothing is sent to the server yet.
    pub fn new(session: Arc<Mutex<T>>, records: RecordSender) -> Self {
        Self {
            session,
            records,
            formatter: ValueRecordFormatter::new(),
            state: RwLock::new(SubscriptionState::Created),
            subscription: RwLock::new(None),
            registry: Arc::new(RwLock::new(HashMap::new())),
            gate: Arc::new(AsyncRwLock::new(())),
            dispatcher: parking_lot::Mutex::new(None),
            stats: Arc::new(SubscriptionStats::new()),
        }
    }

    /// Uses a custom record formatter.
    pub fn with_formatter(mut self, formatter: ValueRecordFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Current state.
    pub fn state(&self) -> SubscriptionState {
        *self.state.read()
    }

    /// Server subscription id, once open.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        *self.subscription.read()
    }

    /// Number of nodes currently registered.
    pub fn registered_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Returns `true` if the node behind `item` is currently registered.
    pub fn is_registered(&self, item: MonitoredItemId) -> bool {
        self.registry.read().contains_key(&item)
    }

    /// Statistics.
    pub fn stats(&self) -> &SubscriptionStats {
        &self.stats
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates the server-side subscription and starts the dispatcher.
    ///
    /// A failure here is fatal to the run. The manager stays `Created` until
    /// the first node registers.
    pub async fn open(&self, sampling_interval: Duration) -> OpcUaResult<SubscriptionId> {
        if self.state().is_terminal() {
            return Err(SubscriptionError::Closed.into());
        }
        if let Some(id) = self.subscription_id() {
            tracing::debug!(subscription_id = %id, "Subscription already open");
            return Ok(id);
        }

        let (sender, receiver) = notification_channel();
        let id = {
            let session = self.session.lock().await;
            session.create_subscription(sampling_interval, sender).await?
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let context = DispatchContext {
            registry: Arc::clone(&self.registry),
            gate: Arc::clone(&self.gate),
            records: self.records.clone(),
            formatter: self.formatter,
            stats: Arc::clone(&self.stats),
        };
        let task = tokio::spawn(context.run(receiver, shutdown_rx));

        *self.dispatcher.lock() = Some(Dispatcher {
            shutdown: shutdown_tx,
            task,
        });
        *self.subscription.write() = Some(id);

        tracing::info!(
            subscription_id = %id,
            interval_ms = sampling_interval.as_millis() as u64,
            "Subscription created"
        );
        Ok(id)
    }

    /// Registers every handle of one batch.
    ///
    /// Per-node failures are written as diagnostic records and counted; they
    /// never fail the call. The only errors are calling this before
    /// [`open`](Self::open) or after [`close`](Self::close).
    pub async fn register_batch(&self, handles: &[NodeHandle]) -> OpcUaResult<BatchOutcome> {
        if self.state().is_terminal() {
            return Err(SubscriptionError::Closed.into());
        }
        let subscription = self.subscription_id().ok_or(SubscriptionError::NotOpen)?;

        // held until every new item is in the registry
        let registering = self.gate.write().await;
        let results = {
            let session = self.session.lock().await;
            session.watch_many(subscription, handles).await
        };

        let mut outcome = BatchOutcome::default();
        match results {
            Ok(per_node) => {
                for (handle, result) in handles.iter().zip(per_node) {
                    match result {
                        Ok(item) => {
                            self.registry.write().insert(item, handle.clone());
                            self.stats.record_registered();
                            outcome.registered += 1;
                        }
                        Err(e) => {
                            self.registration_failed(handle, &e);
                            outcome.failed += 1;
                        }
                    }
                }
                // a short response leaves the tail unregistered
                for handle in handles.iter().skip(outcome.attempted()) {
                    let e = OpcUaError::registration_failed(
                        handle.node_id().to_string(),
                        "no result returned for node",
                    );
                    self.registration_failed(handle, &e);
                    outcome.failed += 1;
                }
            }
            Err(e) => {
                for handle in handles {
                    self.registration_failed(handle, &e);
                }
                outcome.failed = handles.len();
            }
        }
        drop(registering);

        if outcome.registered > 0 {
            let mut state = self.state.write();
            if *state == SubscriptionState::Created {
                *state = SubscriptionState::Active;
            }
        }

        tracing::info!(
            subscription_id = %subscription,
            registered = outcome.registered,
            failed = outcome.failed,
            "Batch registered"
        );
        Ok(outcome)
    }

    /// Tears everything down. Idempotent and never fails.
    pub async fn close(&self) -> CloseReport {
        {
            let mut state = self.state.write();
            if state.is_terminal() {
                return CloseReport::already_closed();
            }
            *state = SubscriptionState::Closing;
        }

        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            // the receiver may already be gone if the task ended on its own
            let _ = dispatcher.shutdown.send(());
            if let Err(e) = dispatcher.task.await {
                tracing::warn!(error = %e, "Notification dispatcher ended abnormally");
            }
        }

        let mut report = CloseReport::default();
        let subscription = self.subscription.write().take();

        if let Some(subscription) = subscription {
            let items: Vec<(MonitoredItemId, NodeHandle)> = self.registry.write().drain().collect();
            let session = self.session.lock().await;

            for (item, handle) in items {
                match session.unwatch(subscription, item).await {
                    Ok(()) => {
                        self.stats.record_unregistered();
                        report.unregistered += 1;
                    }
                    Err(e) => {
                        self.stats.record_unregistration_failure();
                        report.unregistration_failures += 1;
                        tracing::warn!(
                            tag = %handle.tag(),
                            item = %item,
                            error = %e,
                            "Failed to unregister node"
                        );
                    }
                }
            }

            match session.delete_subscription(subscription).await {
                Ok(()) => {
                    report.subscription_deleted = true;
                    tracing::info!(subscription_id = %subscription, "Subscription deleted");
                }
                Err(e) => {
                    tracing::warn!(subscription_id = %subscription, error = %e, "Failed to delete subscription");
                }
            }
        }

        *self.state.write() = SubscriptionState::Closed;
        report
    }

    fn registration_failed(&self, handle: &NodeHandle, error: &OpcUaError) {
        self.stats.record_registration_failure();
        tracing::warn!(tag = %handle.tag(), node_id = %handle.node_id(), error = %error, "Failed to register node");

        let record = self.formatter.format_registration_failure(handle, error);
        if self.records.send(record).is_err() {
            self.stats.record_record_lost();
        }
    }
}

impl<T: OpcUaSession> Drop for SubscriptionManager<T> {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.get_mut().take() {
            dispatcher.task.abort();
        }
    }
}

impl<T: OpcUaSession> fmt::Debug for SubscriptionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("state", &*self.state.read())
            .field("subscription", &*self.subscription.read())
            .field("registered", &self.registry.read().len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
