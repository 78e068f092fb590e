// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Runs a [`TagPipeline`] against a [`MockSession`] into a real result file
//! in a temporary directory, then reads the file back.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::Mutex;

use tagwatch_core::{RecordWriter, ResultSink, TagIdentifier, HEADER};
use tagwatch_opcua::{PipelineError, PipelineSettings, RunSummary, TagPipeline};

use super::mocks::MockSession;
use super::temp_test_dir;

/// What a harness run produced.
#[derive(Debug)]
pub struct HarnessOutput {
    /// The pipeline result.
    pub result: Result<RunSummary, PipelineError>,
    /// Result file lines after the header.
    pub lines: Vec<String>,
    /// Records the writer task reports as written.
    pub written: u64,
    /// The result file.
    pub path: PathBuf,
}

impl HarnessOutput {
    /// The summary, panicking if the run failed.
    pub fn summary(&self) -> &RunSummary {
        match &self.result {
            Ok(summary) => summary,
            Err(e) => panic!("pipeline failed: {}", e),
        }
    }

    /// Lines starting with `prefix`.
    pub fn lines_for(&self, prefix: &str) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }
}

/// Pipeline harness around a mock session.
pub struct PipelineHarness {
    session: MockSession,
    settings: PipelineSettings,
    dir: TempDir,
}

impl PipelineHarness {
    /// Creates a harness with settings that neither pause nor wait.
    pub fn new(session: MockSession) -> Self {
        Self {
            session,
            settings: super::fixtures::SettingsFixtures::immediate(),
            dir: temp_test_dir("tagwatch-harness"),
        }
    }

    /// Uses different pipeline settings.
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The session handle shared with the pipeline.
    pub fn session(&self) -> &MockSession {
        &self.session
    }

    /// Runs a subscription for the full observation window.
    pub async fn subscribe(&self, tags: &[TagIdentifier]) -> HarnessOutput {
        self.subscribe_until(tags, std::future::pending()).await
    }

    /// Runs a subscription that `stop` may cut short.
    pub async fn subscribe_until<S>(&self, tags: &[TagIdentifier], stop: S) -> HarnessOutput
    where
        S: Future<Output = ()> + Send,
    {
        let pipeline = self.pipeline();
        self.capture(|records| async move {
            pipeline.run_subscription_until(tags, records, stop).await
        })
        .await
    }

    /// Runs a one-shot read.
    pub async fn read(&self, tags: &[TagIdentifier]) -> HarnessOutput {
        let pipeline = self.pipeline();
        self.capture(|records| async move { pipeline.run_read(tags, records).await })
            .await
    }

    fn pipeline(&self) -> TagPipeline<MockSession> {
        TagPipeline::new(Arc::new(Mutex::new(self.session.clone())), self.settings)
    }

    async fn capture<F, Fut>(&self, run: F) -> HarnessOutput
    where
        F: FnOnce(tagwatch_core::RecordSender) -> Fut,
        Fut: Future<Output = Result<RunSummary, PipelineError>>,
    {
        let path = self.dir.path().join("result.csv");
        let sink = ResultSink::create(&path).expect("Failed to create result file");
        sink.write_header().expect("Failed to write header");

        let (records, writer) = RecordWriter::spawn(Arc::new(sink));
        let result = run(records).await;
        let written = writer.finish().await.expect("Record writer failed");

        let content = std::fs::read_to_string(&path).expect("Failed to read result file");
        let mut lines = content.lines().map(str::to_string);
        assert_eq!(lines.next().as_deref(), Some(HEADER), "header must be the first line");

        HarnessOutput {
            result,
            lines: lines.collect(),
            written,
            path,
        }
    }
}
