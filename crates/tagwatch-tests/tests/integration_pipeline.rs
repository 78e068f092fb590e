// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Pipeline Integration Tests
//!
//! End-to-end runs of the subscription and read pipelines against the mock
//! session, checked through the result file they produce.
//!
//! ## Test Categories
//!
//! - `test_subscribe_*`: Subscription runs
//! - `test_batch_*`: Batch pacing
//! - `test_read_*`: One-shot reads
//! - `test_record_*`: Record rendering in the result file
//! - `test_runtime_*`: The binary runtime

use std::time::Duration;

use tagwatch_bin::{RunMode, TagwatchRuntime};
use tagwatch_config::TagwatchConfig;
use tagwatch_core::{Variant, HEADER};
use tagwatch_opcua::{OpcUaError, PipelineError, PipelineSettings};
use tagwatch_tests::common::{
    init_test_logging, temp_test_dir, MockCall, MockSession, PayloadFixtures, PipelineHarness,
    SettingsFixtures, TagFixtures,
};

fn tag_line(tag: &str, value: &str) -> String {
    format!(
        "{tag}, {value}, Good, {ts}, Double({value})",
        ts = PayloadFixtures::TIMESTAMP
    )
}

// =============================================================================
// Subscription Runs
// =============================================================================

#[tokio::test]
async fn test_subscribe_mixed_tags() {
    init_test_logging();
    let session = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    let harness = PipelineHarness::new(session);

    let output = harness.subscribe(&TagFixtures::parse(&TagFixtures::MIXED)).await;
    let summary = output.summary();

    assert_eq!(output.lines.len(), 3);
    assert!(output.lines[0].starts_with("bad.tag, Cannot resolve tag from source. Error message: "));
    assert!(output.lines.contains(&tag_line("tag1", "1")));
    assert!(output.lines.contains(&tag_line("tag2", "2")));

    assert_eq!(summary.tags_read, 3);
    assert_eq!(summary.resolved, 2);
    assert_eq!(summary.unresolved, 1);
    assert_eq!(summary.registered, 2);
    assert_eq!(summary.notifications, 2);
    assert_eq!(summary.records_written, 3);
    assert_eq!(output.written, 3);
}

#[tokio::test]
async fn test_subscribe_unresolved_line_has_two_fields() {
    let harness = PipelineHarness::new(MockSession::new());

    let output = harness.subscribe(&TagFixtures::parse(&["bad.tag"])).await;

    assert_eq!(output.lines.len(), 1);
    let fields: Vec<&str> = output.lines[0].split(", ").collect();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0], "bad.tag");
    assert!(fields[1].contains("Invalid node id 'bad.tag'"));
}

#[tokio::test]
async fn test_subscribe_unknown_node() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1"]);
    let harness = PipelineHarness::new(session);

    let output = harness.subscribe(&TagFixtures::parse(&["ns=2;s=missing"])).await;

    assert_eq!(
        output.lines,
        vec!["ns=2;s=missing, Cannot resolve tag from source. Error message: Unknown node 'ns=2;s=missing'"]
    );
}

#[tokio::test]
async fn test_subscribe_lookup_failure_reported() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    session.fail_lookup("ns=2;s=tag1");
    let harness = PipelineHarness::new(session);

    let output = harness
        .subscribe(&TagFixtures::parse(&["ns=2;s=tag1", "ns=2;s=tag2"]))
        .await;

    let failures = output.lines_for("ns=2;s=tag1, Cannot resolve tag from source.");
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("BadTimeout"));
    assert!(output.lines.contains(&tag_line("tag2", "2")));
    assert_eq!(output.summary().unresolved, 1);
}

#[tokio::test]
async fn test_subscribe_no_tag_resolves() {
    let harness = PipelineHarness::new(MockSession::new());

    let output = harness
        .subscribe(&TagFixtures::parse(&["bad.tag", "ns=2;s=missing"]))
        .await;

    assert_eq!(output.lines.len(), 2);
    assert_eq!(output.summary().registered, 0);
    assert_eq!(
        harness.session().count_calls(|c| matches!(c, MockCall::CreateSubscription(_))),
        0
    );
    assert_eq!(harness.session().calls().last(), Some(&MockCall::Disconnect));
}

#[tokio::test]
async fn test_subscribe_empty_tag_list() {
    let harness = PipelineHarness::new(MockSession::new());

    let output = harness.subscribe(&[]).await;

    assert!(output.lines.is_empty());
    assert_eq!(output.summary().tags_read, 0);
    assert_eq!(harness.session().calls(), vec![MockCall::Connect, MockCall::Disconnect]);
}

#[tokio::test]
async fn test_subscribe_registration_failure_rows() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    session.fail_watch("ns=2;s=tag2");
    let harness = PipelineHarness::new(session);

    let output = harness
        .subscribe(&TagFixtures::parse(&["ns=2;s=tag1", "ns=2;s=tag2"]))
        .await;
    let summary = output.summary();

    assert_eq!(output.lines.len(), 2);
    assert!(output.lines.contains(&tag_line("tag1", "1")));
    let failures = output.lines_for("tag2, Cannot subscribe tag. Error message: ");
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("BadMonitoredItemFilterInvalid"));

    assert_eq!(summary.registered, 1);
    assert_eq!(summary.registration_failures, 1);
    assert_eq!(summary.records_written, 2);
}

#[tokio::test]
async fn test_subscribe_rejected_batch_still_tears_down() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    session.fail_watch_request();
    let harness = PipelineHarness::new(session);

    let output = harness
        .subscribe(&TagFixtures::parse(&["ns=2;s=tag1", "ns=2;s=tag2"]))
        .await;

    assert_eq!(output.lines_for("tag1, Cannot subscribe tag.").len(), 1);
    assert_eq!(output.lines_for("tag2, Cannot subscribe tag.").len(), 1);
    assert_eq!(output.summary().registered, 0);
    assert_eq!(output.summary().registration_failures, 2);

    let session = harness.session();
    assert_eq!(session.count_calls(|c| matches!(c, MockCall::DeleteSubscription(_))), 1);
    assert_eq!(session.calls().last(), Some(&MockCall::Disconnect));
}

#[tokio::test]
async fn test_subscribe_open_failure_is_fatal() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1"]);
    session.fail_create_subscription();
    let harness = PipelineHarness::new(session);

    let output = harness
        .subscribe(&TagFixtures::parse(&["ns=2;s=tag1", "bad.tag"]))
        .await;

    assert!(matches!(output.result, Err(PipelineError::Session(OpcUaError::Subscription(_)))));
    // unresolved rows written before the failure are kept
    assert_eq!(output.lines.len(), 1);
    assert!(output.lines[0].starts_with("bad.tag, "));

    let session = harness.session();
    assert_eq!(session.count_calls(|c| matches!(c, MockCall::WatchBatch(_))), 0);
    assert_eq!(session.calls().last(), Some(&MockCall::Disconnect));
}

#[tokio::test]
async fn test_subscribe_connect_failure() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1"]);
    session.fail_connect();
    let harness = PipelineHarness::new(session);

    let output = harness.subscribe(&TagFixtures::parse(&["ns=2;s=tag1"])).await;

    assert!(matches!(output.result, Err(PipelineError::Session(OpcUaError::Connection(_)))));
    assert!(output.lines.is_empty());
    assert_eq!(harness.session().calls(), vec![MockCall::Connect, MockCall::Disconnect]);
}

#[tokio::test]
async fn test_subscribe_teardown_order() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    let harness = PipelineHarness::new(session);

    harness
        .subscribe(&TagFixtures::parse(&["ns=2;s=tag1", "ns=2;s=tag2"]))
        .await
        .summary();

    let calls = harness.session().calls();
    let tail: Vec<&MockCall> = calls.iter().rev().take(4).rev().collect();
    assert!(matches!(tail[0], MockCall::Unwatch(_)));
    assert!(matches!(tail[1], MockCall::Unwatch(_)));
    assert!(matches!(tail[2], MockCall::DeleteSubscription(_)));
    assert_eq!(tail[3], &MockCall::Disconnect);
    assert_eq!(harness.session().active_items(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_notifications_during_window() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    let harness = PipelineHarness::new(session.clone()).with_settings(SettingsFixtures::paced(10));

    let emitter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        session.emit("ns=2;s=tag1", PayloadFixtures::double(42.0))
    });

    let output = harness
        .subscribe(&TagFixtures::parse(&["ns=2;s=tag1", "ns=2;s=tag2"]))
        .await;

    assert_eq!(emitter.await.unwrap(), 1);
    assert_eq!(output.lines.len(), 3);
    assert!(output.lines.contains(&tag_line("tag1", "42")));
    assert_eq!(output.summary().notifications, 3);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_stop_cuts_window_short() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1"]);
    let settings = tagwatch_opcua::PipelineSettings {
        observation_window: Duration::from_secs(3600),
        ..SettingsFixtures::paced(10)
    };
    let harness = PipelineHarness::new(session).with_settings(settings);

    let started = tokio::time::Instant::now();
    let output = harness
        .subscribe_until(
            &TagFixtures::parse(&["ns=2;s=tag1"]),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(output.lines.len(), 1);
    assert_eq!(
        harness.session().count_calls(|c| matches!(c, MockCall::DeleteSubscription(_))),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_subscribe_every_node_reported_under_parallel_dispatch() {
    let tags = TagFixtures::numbered(1000);
    let nodes: Vec<&str> = tags.iter().map(String::as_str).collect();
    let harness = PipelineHarness::new(MockSession::with_nodes(&nodes)).with_settings(
        PipelineSettings {
            batch_size: 100,
            ..SettingsFixtures::immediate()
        },
    );

    let output = harness.subscribe(&TagFixtures::parse(&nodes)).await;
    let summary = output.summary();

    assert_eq!(summary.registered, 1000);
    assert_eq!(summary.notifications, 1000);
    assert_eq!(output.lines.len(), 1000);
    assert_eq!(output.lines_for("Tag1000, ").len(), 1);
    assert_eq!(output.written, 1000);
}

// =============================================================================
// Batch Pacing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_batch_sizes_and_delay() {
    let tags = TagFixtures::numbered(5);
    let nodes: Vec<&str> = tags.iter().map(String::as_str).collect();
    let harness = PipelineHarness::new(MockSession::with_nodes(&nodes))
        .with_settings(SettingsFixtures::paced(2));

    let output = harness.subscribe(&TagFixtures::parse(&nodes)).await;

    assert_eq!(harness.session().batch_sizes(), vec![2, 2, 1]);
    for gap in harness.session().batch_gaps() {
        assert!(gap >= Duration::from_secs(1), "gap {:?} shorter than the delay", gap);
    }
    assert_eq!(output.summary().registered, 5);
    assert_eq!(output.lines.len(), 5);
}

#[tokio::test]
async fn test_batch_size_zero_is_single_batch() {
    let tags = TagFixtures::numbered(7);
    let nodes: Vec<&str> = tags.iter().map(String::as_str).collect();
    let harness = PipelineHarness::new(MockSession::with_nodes(&nodes));

    harness.subscribe(&TagFixtures::parse(&nodes)).await.summary();

    assert_eq!(harness.session().batch_sizes(), vec![7]);
}

#[tokio::test(start_paused = true)]
async fn test_batch_exact_multiple() {
    let tags = TagFixtures::numbered(4);
    let nodes: Vec<&str> = tags.iter().map(String::as_str).collect();
    let harness = PipelineHarness::new(MockSession::with_nodes(&nodes))
        .with_settings(SettingsFixtures::paced(2));

    harness.subscribe(&TagFixtures::parse(&nodes)).await.summary();

    assert_eq!(harness.session().batch_sizes(), vec![2, 2]);
    assert_eq!(harness.session().batch_gaps().len(), 1);
}

// =============================================================================
// Read Mode
// =============================================================================

#[tokio::test]
async fn test_read_mixed_tags() {
    let session = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    session.fail_read("ns=2;s=tag2");
    let harness = PipelineHarness::new(session);

    let output = harness.read(&TagFixtures::parse(&TagFixtures::MIXED)).await;
    let summary = output.summary();

    assert_eq!(output.lines.len(), 3);
    assert!(output.lines[0].starts_with("bad.tag, Cannot resolve tag from source."));
    assert_eq!(output.lines[1], tag_line("tag1", "1"));
    assert!(output.lines[2].starts_with("tag2, Error message: "));
    assert!(output.lines[2].contains("Bad status for node 'ns=2;s=tag2': BadNotReadable"));

    assert_eq!(summary.registered, 1);
    assert_eq!(summary.registration_failures, 1);
    assert_eq!(
        harness.session().count_calls(|c| matches!(c, MockCall::CreateSubscription(_))),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_read_is_paced() {
    let tags = TagFixtures::numbered(3);
    let nodes: Vec<&str> = tags.iter().map(String::as_str).collect();
    let harness = PipelineHarness::new(MockSession::with_nodes(&nodes))
        .with_settings(SettingsFixtures::paced(1));

    let started = tokio::time::Instant::now();
    let output = harness.read(&TagFixtures::parse(&nodes)).await;

    assert_eq!(output.lines.len(), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

// =============================================================================
// Record Rendering
// =============================================================================

#[tokio::test]
async fn test_record_separator_substituted() {
    let session = MockSession::new();
    session.set_value("ns=2;s=Label", PayloadFixtures::text("a,b\nc"));
    let harness = PipelineHarness::new(session);

    let output = harness.subscribe(&TagFixtures::parse(&["ns=2;s=Label"])).await;

    assert_eq!(
        output.lines,
        vec![format!(
            "Label, a;b c, Good, {}, String(a;b c)",
            PayloadFixtures::TIMESTAMP
        )]
    );
}

#[tokio::test]
async fn test_record_missing_status_isolated() {
    let session = MockSession::new();
    session.set_value("ns=2;i=1001", PayloadFixtures::without_status(Variant::Int32(7)));
    let harness = PipelineHarness::new(session);

    let output = harness.read(&TagFixtures::parse(&["ns=2;i=1001"])).await;

    let fields: Vec<&str> = output.lines[0].split(", ").collect();
    assert_eq!(fields.len(), 6);
    assert_eq!(fields[0], "1001");
    assert_eq!(fields[1], "7");
    assert!(fields[2].starts_with("Error message: "));
    assert_eq!(fields[3], PayloadFixtures::TIMESTAMP);
    assert_eq!(fields[4], "Int32(7)");
    assert!(fields[5].starts_with("error trying to read the "));
}

// =============================================================================
// Runtime
// =============================================================================

#[tokio::test]
async fn test_runtime_writes_result_file() {
    let dir = temp_test_dir("tagwatch-runtime");
    let input = dir.path().join("Taglist.txt");
    std::fs::write(&input, TagFixtures::file_content(&TagFixtures::MIXED)).unwrap();

    let config = TagwatchConfig {
        input_path: input,
        output_path: dir.path().join("out").join("result.csv"),
        timestamp_output: false,
        observation_window_secs: 0,
        inter_batch_delay_secs: 0.0,
        ..TagwatchConfig::default()
    };

    let session = MockSession::with_nodes(&["ns=2;s=tag1", "ns=2;s=tag2"]);
    let report = TagwatchRuntime::new(config, RunMode::Subscribe)
        .run_with_session(session, std::future::pending())
        .await
        .unwrap();

    assert_eq!(report.records_written, 3);
    assert_eq!(report.summary.unresolved, 1);

    let content = std::fs::read_to_string(&report.output_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], HEADER);
    assert_eq!(lines.len(), 4);
}

#[tokio::test]
async fn test_runtime_session_failure_keeps_file() {
    let dir = temp_test_dir("tagwatch-runtime");
    let input = dir.path().join("Taglist.txt");
    std::fs::write(&input, TagFixtures::file_content(&["ns=2;s=tag1"])).unwrap();
    let output = dir.path().join("result.csv");

    let config = TagwatchConfig {
        input_path: input,
        output_path: output.clone(),
        timestamp_output: false,
        ..TagwatchConfig::default()
    };

    let session = MockSession::with_nodes(&["ns=2;s=tag1"]);
    session.fail_connect();
    let err = TagwatchRuntime::new(config, RunMode::Read)
        .run_with_session(session, std::future::pending())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 5);
    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content.trim_end(), HEADER);
}
