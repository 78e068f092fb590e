// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagwatch Integration Tests
//!
//! Integration tests for tagwatch, plus the shared utilities they use.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Pre-built tag lists, payloads and configurations
//!   - `mocks`: Scriptable in-memory OPC UA session
//!   - `harness`: Runs a pipeline into a temporary result file
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p tagwatch-tests
//!
//! # Run specific test suite
//! cargo test -p tagwatch-tests --test integration_pipeline
//! cargo test -p tagwatch-tests --test integration_subscription
//! cargo test -p tagwatch-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Pipeline Tests (`integration_pipeline.rs`)
//! - Resolution, registration and notification records end to end
//! - Batch pacing
//! - Read mode
//! - The binary runtime against the mock session
//!
//! ### Subscription Tests (`integration_subscription.rs`)
//! - Manager lifecycle and idempotent close
//! - Per-node registration failures
//! - Teardown failures
//!
//! ### Config Tests (`integration_config.rs`)
//! - File formats and environment overrides
//! - Validation rules
//! - Output file naming
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use tagwatch_tests::common::{MockSession, PipelineHarness, TagFixtures};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_something() {
//!     let session = MockSession::with_nodes(&["ns=2;s=tag1"]);
//!     let output = PipelineHarness::new(session.clone())
//!         .subscribe(&TagFixtures::parse(&["ns=2;s=tag1"]))
//!         .await;
//!     assert_eq!(output.lines.len(), 1);
//! }
//! ```

pub mod common;

pub use common::*;
