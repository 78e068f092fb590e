// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA Integration Tests
//!
//! These tests require a running OPC UA simulator server and the
//! `real-transport` feature.
//!
//! # Environment Variables
//!
//! - `OPCUA_TEST_ENDPOINT`: OPC UA server endpoint (default: opc.tcp://localhost:4840)
//! - `OPCUA_TEST_TAG`: a readable, changing node (default: ns=3;i=1001)
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tagwatch-opcua --features real-transport --test opcua_integration -- --ignored
//! ```

#![cfg(feature = "real-transport")]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use tagwatch_core::{record_channel, TagIdentifier};
use tagwatch_opcua::{
    OpcUaSession, PipelineSettings, RealOpcUaSession, SessionConfig, TagPipeline, TagResolver,
};

// =============================================================================
// Test Configuration
// =============================================================================

const DEFAULT_TEST_ENDPOINT: &str = "opc.tcp://localhost:4840";

const DEFAULT_TEST_TAG: &str = "ns=3;i=1001";

fn test_endpoint() -> String {
    std::env::var("OPCUA_TEST_ENDPOINT").unwrap_or_else(|_| DEFAULT_TEST_ENDPOINT.to_string())
}

fn test_tag() -> TagIdentifier {
    TagIdentifier::new(std::env::var("OPCUA_TEST_TAG").unwrap_or_else(|_| DEFAULT_TEST_TAG.to_string()))
}

fn session() -> Arc<Mutex<RealOpcUaSession>> {
    let config = SessionConfig::builder()
        .endpoint(test_endpoint())
        .application_name("tagwatch-it")
        .build()
        .unwrap();
    Arc::new(Mutex::new(RealOpcUaSession::new(config)))
}

// =============================================================================
// Offline
// =============================================================================

#[tokio::test]
async fn test_connect_refused() {
    let config = SessionConfig::builder()
        .endpoint("opc.tcp://127.0.0.1:1")
        .build()
        .unwrap();
    let mut session = RealOpcUaSession::new(config);

    let err = session.connect().await.unwrap_err();
    assert!(err.is_session_fatal());
    assert!(!session.is_connected());
}

// =============================================================================
// Real server
// =============================================================================

#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_resolve() {
    let session = session();
    session.lock().await.connect().await.unwrap();

    let tags = vec![test_tag(), TagIdentifier::new("ns=3;s=DoesNotExist"), TagIdentifier::new("garbage")];
    let resolved = TagResolver::new(Arc::clone(&session)).resolve(&tags).await;

    assert_eq!(resolved.len(), 3);
    assert!(resolved[0].1.is_ok());
    assert!(resolved[1].1.is_err());
    assert!(resolved[2].1.is_err());

    session.lock().await.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_read_run() {
    let pipeline = TagPipeline::new(session(), PipelineSettings::default());
    let (records, mut rx) = record_channel();

    let summary = pipeline.run_read(&[test_tag()], records).await.unwrap();

    assert_eq!(summary.resolved, 1);
    let record = rx.recv().await.unwrap();
    assert!(!record.has_errors(), "{}", record.render());
}

#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_subscription_run() {
    let settings = PipelineSettings {
        sampling_interval: Duration::from_millis(200),
        observation_window: Duration::from_secs(3),
        ..PipelineSettings::default()
    };
    let pipeline = TagPipeline::new(session(), settings);
    let (records, mut rx) = record_channel();

    let summary = pipeline.run_subscription(&[test_tag()], records).await.unwrap();

    assert_eq!(summary.registered, 1);
    assert_eq!(summary.unregistration_failures, 0);
    assert!(summary.notifications >= 1);
    assert_eq!(rx.drain().len() as u64, summary.notifications);
}
