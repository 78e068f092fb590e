// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Subscription Integration Tests
//!
//! [`SubscriptionManager`] and [`TagResolver`] driven directly against the
//! mock session.
//!
//! ## Test Categories
//!
//! - `test_manager_*`: Lifecycle, registration and teardown
//! - `test_resolver_*`: Tag resolution

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use tagwatch_core::{record_channel, NodeHandle, RecordOutcome, RecordReceiver, TagIdentifier};
use tagwatch_opcua::{
    MonitoredItemId, OpcUaError, OpcUaSession, ResolutionError, SubscriptionError,
    SubscriptionManager, SubscriptionState, TagResolver,
};
use tagwatch_tests::common::{MockCall, MockSession, PayloadFixtures, TagFixtures};

const INTERVAL: Duration = Duration::from_millis(500);

async fn connected(session: MockSession) -> Arc<Mutex<MockSession>> {
    let session = Arc::new(Mutex::new(session));
    session.lock().await.connect().await.unwrap();
    session
}

async fn resolve(session: &Arc<Mutex<MockSession>>, tags: &[&str]) -> Vec<NodeHandle> {
    let guard = session.lock().await;
    let mut handles = Vec::new();
    for tag in tags {
        handles.push(guard.resolve_node(&TagIdentifier::new(tag)).await.unwrap());
    }
    handles
}

fn drain(receiver: &mut RecordReceiver) -> Vec<String> {
    receiver.drain().iter().map(|r| r.render()).collect()
}

// =============================================================================
// SubscriptionManager
// =============================================================================

#[tokio::test]
async fn test_manager_state_transitions() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1"]);
    let session = connected(mock).await;
    let handles = resolve(&session, &["ns=2;s=tag1"]).await;
    let (records, _receiver) = record_channel();

    let manager = SubscriptionManager::new(Arc::clone(&session), records);
    assert_eq!(manager.state(), SubscriptionState::Created);

    manager.open(INTERVAL).await.unwrap();
    assert_eq!(manager.state(), SubscriptionState::Created);
    assert!(manager.subscription_id().is_some());

    manager.register_batch(&handles).await.unwrap();
    assert_eq!(manager.state(), SubscriptionState::Active);
    assert_eq!(manager.registered_count(), 1);

    manager.close().await;
    assert_eq!(manager.state(), SubscriptionState::Closed);
    assert_eq!(manager.registered_count(), 0);
    assert!(manager.subscription_id().is_none());
}

#[tokio::test]
async fn test_manager_open_is_idempotent() {
    let mock = MockSession::new();
    let session = connected(mock.clone()).await;
    let (records, _receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);

    let first = manager.open(INTERVAL).await.unwrap();
    let second = manager.open(INTERVAL).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.calls().last(), Some(&MockCall::CreateSubscription(INTERVAL)));
    assert_eq!(mock.count_calls(|c| matches!(c, MockCall::CreateSubscription(_))), 1);
}

#[tokio::test]
async fn test_manager_register_before_open() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1"]);
    let session = connected(mock).await;
    let handles = resolve(&session, &["ns=2;s=tag1"]).await;
    let (records, _receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);

    let err = manager.register_batch(&handles).await.unwrap_err();
    assert!(matches!(err, OpcUaError::Subscription(SubscriptionError::NotOpen)));
}

#[tokio::test]
async fn test_manager_outcome_per_node() {
    let tags = TagFixtures::numbered(6);
    let nodes: Vec<&str> = tags.iter().map(String::as_str).collect();
    let mock = MockSession::with_nodes(&nodes).without_initial_values();
    mock.fail_watch(nodes[1]);
    mock.fail_watch(nodes[4]);

    let session = connected(mock).await;
    let handles = resolve(&session, &nodes).await;
    let (records, mut receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();

    let outcome = manager.register_batch(&handles).await.unwrap();

    assert_eq!(outcome.attempted(), 6);
    assert_eq!(outcome.registered, 4);
    assert_eq!(outcome.failed, 2);
    assert_eq!(manager.stats().registered(), 4);
    assert_eq!(manager.stats().registration_failures(), 2);

    let failures = receiver.drain();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|r| r.outcome == RecordOutcome::RegistrationFailed));
    assert_eq!(failures[0].tag_id, "Tag2");
    assert_eq!(failures[1].tag_id, "Tag5");

    manager.close().await;
}

#[tokio::test]
async fn test_manager_close_is_idempotent() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2", "ns=2;s=tag3"]);
    let session = connected(mock.clone()).await;
    let handles = resolve(&session, &["ns=2;s=tag1", "ns=2;s=tag2", "ns=2;s=tag3"]).await;
    let (records, _receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();
    manager.register_batch(&handles).await.unwrap();

    let first = manager.close().await;
    assert_eq!(first.unregistered, 3);
    assert!(first.subscription_deleted);
    assert!(!first.already_closed);

    let second = manager.close().await;
    assert!(second.already_closed);
    assert_eq!(second.unregistered, 0);

    assert_eq!(mock.count_calls(|c| matches!(c, MockCall::Unwatch(_))), 3);
    assert_eq!(mock.count_calls(|c| matches!(c, MockCall::DeleteSubscription(_))), 1);
}

#[tokio::test]
async fn test_manager_close_without_open() {
    let mock = MockSession::new();
    let session = connected(mock.clone()).await;
    let (records, _receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);

    let report = manager.close().await;

    assert!(!report.subscription_deleted);
    assert_eq!(manager.state(), SubscriptionState::Closed);
    assert_eq!(mock.count_calls(|c| matches!(c, MockCall::DeleteSubscription(_))), 0);
}

#[tokio::test]
async fn test_manager_register_after_close() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1"]);
    let session = connected(mock).await;
    let handles = resolve(&session, &["ns=2;s=tag1"]).await;
    let (records, _receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();
    manager.close().await;

    let err = manager.register_batch(&handles).await.unwrap_err();
    assert!(matches!(err, OpcUaError::Subscription(SubscriptionError::Closed)));
    assert!(manager.open(INTERVAL).await.is_err());
}

#[tokio::test]
async fn test_manager_teardown_failures_are_counted() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    mock.fail_unwatch();
    mock.fail_delete();
    let session = connected(mock.clone()).await;
    let handles = resolve(&session, &["ns=2;s=tag1", "ns=2;s=tag2"]).await;
    let (records, _receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();
    manager.register_batch(&handles).await.unwrap();

    let report = manager.close().await;

    assert_eq!(report.unregistered, 0);
    assert_eq!(report.unregistration_failures, 2);
    assert!(!report.subscription_deleted);
    assert_eq!(manager.stats().unregistration_failures(), 2);
    assert_eq!(manager.state(), SubscriptionState::Closed);
    // the delete is still attempted after every unwatch failed
    assert_eq!(mock.count_calls(|c| matches!(c, MockCall::DeleteSubscription(_))), 1);
}

#[tokio::test]
async fn test_manager_notifications_become_records() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1"]).without_initial_values();
    let session = connected(mock.clone()).await;
    let handles = resolve(&session, &["ns=2;s=tag1"]).await;
    let (records, mut receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();
    manager.register_batch(&handles).await.unwrap();

    assert_eq!(mock.emit("ns=2;s=tag1", PayloadFixtures::double(1.5)), 1);
    assert_eq!(mock.emit("ns=2;s=tag1", PayloadFixtures::text("on, off")), 1);
    manager.close().await;

    let lines = drain(&mut receiver);
    assert_eq!(
        lines,
        vec![
            format!("tag1, 1.5, Good, {}, Double(1.5)", PayloadFixtures::TIMESTAMP),
            format!("tag1, on; off, Good, {}, String(on; off)", PayloadFixtures::TIMESTAMP),
        ]
    );
    assert_eq!(manager.stats().notifications_received(), 2);
}

#[tokio::test]
async fn test_manager_unknown_item_dropped() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1"]).without_initial_values();
    let session = connected(mock.clone()).await;
    let handles = resolve(&session, &["ns=2;s=tag1"]).await;
    let (records, mut receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();
    manager.register_batch(&handles).await.unwrap();

    assert!(mock.emit_for_item(MonitoredItemId(999), PayloadFixtures::double(1.0)));
    manager.close().await;

    assert!(receiver.drain().is_empty());
    assert_eq!(manager.stats().notifications_dropped(), 1);
    assert_eq!(manager.stats().notifications_received(), 0);
}

#[tokio::test]
async fn test_manager_counts_lost_records() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1"]);
    let session = connected(mock).await;
    let handles = resolve(&session, &["ns=2;s=tag1"]).await;
    let (records, receiver) = record_channel();
    drop(receiver);

    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();
    manager.register_batch(&handles).await.unwrap();
    manager.close().await;

    assert_eq!(manager.stats().records_lost(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_manager_initial_values_kept_under_parallel_dispatch() {
    let tags = TagFixtures::numbered(2000);
    let nodes: Vec<&str> = tags.iter().map(String::as_str).collect();
    let session = connected(MockSession::with_nodes(&nodes)).await;
    let handles = resolve(&session, &nodes).await;
    let (records, mut receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();

    let outcome = manager.register_batch(&handles).await.unwrap();
    assert_eq!(outcome.registered, 2000);
    manager.close().await;

    let records = receiver.drain();
    let tag_ids: HashSet<&str> = records.iter().map(|r| r.tag_id.as_str()).collect();
    assert_eq!(records.len(), 2000);
    assert_eq!(tag_ids.len(), 2000);
    assert!(records.iter().all(|r| r.outcome == RecordOutcome::Value));
    assert_eq!(manager.stats().notifications_dropped(), 0);
    assert_eq!(manager.stats().notifications_received(), 2000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_manager_initial_values_kept_across_batches() {
    let tags = TagFixtures::numbered(600);
    let nodes: Vec<&str> = tags.iter().map(String::as_str).collect();
    let session = connected(MockSession::with_nodes(&nodes)).await;
    let handles = resolve(&session, &nodes).await;
    let (records, mut receiver) = record_channel();
    let manager = SubscriptionManager::new(session, records);
    manager.open(INTERVAL).await.unwrap();

    for batch in handles.chunks(50) {
        manager.register_batch(batch).await.unwrap();
    }
    manager.close().await;

    assert_eq!(receiver.drain().len(), 600);
    assert_eq!(manager.stats().notifications_dropped(), 0);
}

// =============================================================================
// TagResolver
// =============================================================================

#[tokio::test]
async fn test_resolver_keeps_input_order() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    mock.fail_lookup("ns=2;s=tag2");
    let session = connected(mock).await;

    let tags = TagFixtures::parse(&["ns=2;s=tag2", "bad.tag", "ns=2;s=tag1", "ns=2;s=nope"]);
    let resolutions = TagResolver::new(session).resolve(&tags).await;

    assert_eq!(resolutions.len(), 4);
    for ((tag, _), expected) in resolutions.iter().zip(&tags) {
        assert_eq!(tag, expected);
    }
    assert!(matches!(resolutions[0].1, Err(ResolutionError::LookupFailed { .. })));
    assert!(matches!(resolutions[1].1, Err(ResolutionError::InvalidIdentifier { .. })));
    assert!(resolutions[2].1.is_ok());
    assert!(matches!(resolutions[3].1, Err(ResolutionError::UnknownNode { .. })));
}

#[tokio::test]
async fn test_resolver_not_connected() {
    let mock = MockSession::with_nodes(&["ns=2;s=tag1"]);
    let session = Arc::new(Mutex::new(mock));

    let resolutions = TagResolver::new(session)
        .resolve(&TagFixtures::parse(&["ns=2;s=tag1"]))
        .await;

    assert!(matches!(resolutions[0].1, Err(ResolutionError::LookupFailed { .. })));
}
