// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Run orchestration.
//!
//! Wires the pieces of one run together:
//!
//! - Tag list loading
//! - Result file creation and the record writer task
//! - Session construction
//! - The subscription or read pipeline
//! - Draining the writer once the pipeline is done

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::sync::Mutex;
use tracing::{info, warn};

use tagwatch_config::TagwatchConfig;
use tagwatch_core::{read_tag_list, RecordWriter, ResultSink};
use tagwatch_opcua::{OpcUaSession, RunSummary, TagPipeline};

use crate::error::{BinError, BinResult};

// =============================================================================
// RunMode
// =============================================================================

/// What the run does with the resolved tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Subscribe for the observation window.
    Subscribe,
    /// Read every node once.
    Read,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscribe => write!(f, "subscribe"),
            Self::Read => write!(f, "read"),
        }
    }
}

// =============================================================================
// RunReport
// =============================================================================

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Pipeline summary.
    pub summary: RunSummary,
    /// The result file.
    pub output_path: PathBuf,
    /// Lines written after the header.
    pub records_written: u64,
}

// =============================================================================
// TagwatchRuntime
// =============================================================================

/// One configured run.
pub struct TagwatchRuntime {
    config: TagwatchConfig,
    mode: RunMode,
}

impl TagwatchRuntime {
    /// Creates a runtime for a validated configuration.
    pub fn new(config: TagwatchConfig, mode: RunMode) -> Self {
        Self { config, mode }
    }

    /// The configuration in use.
    pub fn config(&self) -> &TagwatchConfig {
        &self.config
    }

    /// Runs against the configured server.
    #[cfg(feature = "real-transport")]
    pub async fn run(self) -> BinResult<RunReport> {
        let session_config = self.config.session_config()?;
        let session = tagwatch_opcua::RealOpcUaSession::new(session_config);
        self.run_with_session(session, crate::shutdown::shutdown_signal()).await
    }

    /// Without a transport there is nothing to connect to.
    #[cfg(not(feature = "real-transport"))]
    pub async fn run(self) -> BinResult<RunReport> {
        Err(BinError::init(
            "this build has no OPC UA transport; rebuild with the `real-transport` feature",
        ))
    }

    /// Runs against `session`; in subscription mode `stop` ends the
    /// observation window early.
    pub async fn run_with_session<T, S>(self, session: T, stop: S) -> BinResult<RunReport>
    where
        T: OpcUaSession + 'static,
        S: Future<Output = ()> + Send,
    {
        let tags = read_tag_list(&self.config.input_path)?;
        info!(
            mode = %self.mode,
            tags = tags.len(),
            input = %self.config.input_path.display(),
            "Tag list loaded"
        );

        let output_path = self.config.output_file_path(&Local::now());
        let sink = open_sink(&output_path)?;
        let (records, writer) = RecordWriter::spawn(Arc::new(sink));

        let pipeline = TagPipeline::new(Arc::new(Mutex::new(session)), self.config.pipeline_settings());
        let outcome = match self.mode {
            RunMode::Subscribe => pipeline.run_subscription_until(&tags, records, stop).await,
            RunMode::Read => pipeline.run_read(&tags, records).await,
        };
        // every sender is gone once the pipeline returns
        drop(pipeline);

        let written = writer.finish().await;
        let summary = outcome?;
        let records_written = written?;

        if records_written != summary.records_written {
            warn!(
                queued = summary.records_written,
                written = records_written,
                "Record count mismatch"
            );
        }

        info!(
            output = %output_path.display(),
            records = records_written,
            "Results written"
        );

        Ok(RunReport {
            summary,
            output_path,
            records_written,
        })
    }
}

fn open_sink(path: &Path) -> BinResult<ResultSink> {
    let sink = ResultSink::create(path)
        .map_err(|e| BinError::from(e).with_context("Cannot create result file"))?;
    sink.write_header()?;
    Ok(sink)
}

// =============================================================================
// Tests
// =============================================================================
