// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! End-to-end run over a tag list.
//!
//! # Subscription mode
//!
//! ```text
//! connect ─► resolve ─► open ─► register (batched, paced) ─► observe ─► close ─► disconnect
//!               │                       │                       │
//!               ▼                       ▼                       ▼
//!        unresolved records    registration records      value records
//!               └───────────────────────┴───────────────────────┘
//!                                       ▼
//!                                  RecordSender
//! ```
//!
//! # Read mode
//!
//! Resolves every tag, then reads each node once, batch by batch.
//!
//! Only session-level failures end a run early. Everything that goes wrong
//! for a single tag becomes a record.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use tagwatch_core::{BatchScheduler, CoreError, NodeHandle, RecordSender, TagIdentifier, ValueRecordFormatter};

use crate::client::{OpcUaSession, SubscriptionManager};
use crate::error::OpcUaError;
use crate::resolver::{partition, TagResolver};

// =============================================================================
// PipelineSettings
// =============================================================================

/// Timing and batching for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Subscription publishing and sampling interval.
    pub sampling_interval: Duration,
    /// How long notifications are collected.
    pub observation_window: Duration,
    /// Nodes per registration batch; 0 registers everything at once.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_millis(500),
            observation_window: Duration::from_secs(10),
            batch_size: 100,
            batch_delay: Duration::from_secs(1),
        }
    }
}

impl PipelineSettings {
    fn scheduler(&self) -> BatchScheduler {
        BatchScheduler::new(self.batch_size, self.batch_delay)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// A failure that ends the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Connecting or opening the subscription failed.
    #[error("Session failure: {0}")]
    Session(#[from] OpcUaError),

    /// The result sink stopped accepting records.
    #[error("Result sink failure: {0}")]
    Sink(#[from] CoreError),
}

// =============================================================================
// RunSummary
// =============================================================================

/// What a run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique id of this run, also present on its log events.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Tags in the input list.
    pub tags_read: usize,
    /// Tags resolved to nodes.
    pub resolved: usize,
    /// Tags that could not be resolved.
    pub unresolved: usize,
    /// Nodes added to the subscription (subscription mode) or read successfully (read mode).
    pub registered: usize,
    /// Nodes that could not be added (subscription mode) or read (read mode).
    pub registration_failures: usize,
    /// Records handed to the sink.
    pub records_written: u64,
    /// Value change notifications turned into records.
    pub notifications: u64,
    /// Monitored items whose removal failed.
    pub unregistration_failures: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            tags_read: 0,
            resolved: 0,
            unresolved: 0,
            registered: 0,
            registration_failures: 0,
            records_written: 0,
            notifications: 0,
            unregistration_failures: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Logs the summary at info level.
    pub fn log(&self) {
        tracing::info!(
            run_id = %self.run_id,
            tags = self.tags_read,
            resolved = self.resolved,
            unresolved = self.unresolved,
            registered = self.registered,
            registration_failures = self.registration_failures,
            records = self.records_written,
            notifications = self.notifications,
            unregistration_failures = self.unregistration_failures,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Run finished"
        );
    }
}

// =============================================================================
// TagPipeline
// =============================================================================

/// Drives a whole run against one session.
pub struct TagPipeline<T: OpcUaSession> {
    session: Arc<Mutex<T>>,
    settings: PipelineSettings,
    formatter: ValueRecordFormatter,
}

impl<T: OpcUaSession + 'static> TagPipeline<T> {
    /// Creates a pipeline.
    pub fn new(session: Arc<Mutex<T>>, settings: PipelineSettings) -> Self {
        Self {
            session,
            settings,
            formatter: ValueRecordFormatter::new(),
        }
    }

    /// Uses a custom record formatter.
    pub fn with_formatter(mut self, formatter: ValueRecordFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Settings in use.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Subscribes to every tag for the full observation window.
    pub async fn run_subscription(
        &self,
        tags: &[TagIdentifier],
        records: RecordSender,
    ) -> Result<RunSummary, PipelineError> {
        self.run_subscription_until(tags, records, std::future::pending()).await
    }

    /// Like [`run_subscription`](Self::run_subscription), but the observation
    /// window also ends when `stop` completes. Teardown runs either way.
    pub async fn run_subscription_until<S>(
        &self,
        tags: &[TagIdentifier],
        records: RecordSender,
        stop: S,
    ) -> Result<RunSummary, PipelineError>
    where
        S: Future<Output = ()> + Send,
    {
        let started = Instant::now();
        let mut summary = RunSummary::start();
        summary.tags_read = tags.len();
        tracing::info!(run_id = %summary.run_id, tags = tags.len(), "Starting subscription run");

        self.connect().await?;

        let handles = match self.resolve(tags, &records, &mut summary).await {
            Ok(handles) => handles,
            Err(e) => {
                self.disconnect().await;
                return Err(e);
            }
        };

        if handles.is_empty() {
            tracing::warn!("No tag resolved, nothing to subscribe");
            self.disconnect().await;
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        let manager = SubscriptionManager::new(Arc::clone(&self.session), records.clone())
            .with_formatter(self.formatter);

        if let Err(e) = manager.open(self.settings.sampling_interval).await {
            e.log("open subscription");
            manager.close().await;
            self.disconnect().await;
            return Err(e.into());
        }

        let scheduler = self.settings.scheduler();
        let plan = scheduler.plan(handles.len());
        tracing::info!(
            nodes = handles.len(),
            batches = plan.len(),
            batch_size = scheduler.batch_size(),
            pacing_ms = plan.total_delay().as_millis() as u64,
            "Registering nodes"
        );

        let outcomes = scheduler.run(&handles, |batch| manager.register_batch(batch)).await;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(outcome) => {
                    summary.registered += outcome.registered;
                    summary.registration_failures += outcome.failed;
                }
                Err(e) => {
                    tracing::warn!(batch = index + 1, error = %e, "Batch not registered");
                }
            }
        }
        summary.records_written += summary.registration_failures as u64;

        if manager.registered_count() > 0 {
            tracing::info!(
                window_secs = self.settings.observation_window.as_secs_f64(),
                registered = manager.registered_count(),
                "Collecting notifications"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.settings.observation_window) => {}
                _ = stop => tracing::info!("Observation window cut short"),
            }
        } else {
            tracing::warn!("No node registered, skipping observation window");
        }

        let report = manager.close().await;
        summary.unregistration_failures = report.unregistration_failures;
        summary.notifications = manager.stats().notifications_received();
        summary.records_written += summary.notifications;

        self.disconnect().await;

        if manager.stats().records_lost() > 0 {
            return Err(CoreError::SinkClosed.into());
        }

        summary.elapsed = started.elapsed();
        summary.log();
        Ok(summary)
    }

    /// Reads every tag once.
    pub async fn run_read(
        &self,
        tags: &[TagIdentifier],
        records: RecordSender,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let mut summary = RunSummary::start();
        summary.tags_read = tags.len();
        tracing::info!(run_id = %summary.run_id, tags = tags.len(), "Starting read run");

        self.connect().await?;

        let handles = match self.resolve(tags, &records, &mut summary).await {
            Ok(handles) => handles,
            Err(e) => {
                self.disconnect().await;
                return Err(e);
            }
        };

        let outcomes = self
            .settings
            .scheduler()
            .run(&handles, |batch| self.read_batch(batch, &records))
            .await;

        let mut result = Ok(());
        for outcome in outcomes {
            match outcome {
                Ok((ok, failed)) => {
                    summary.registered += ok;
                    summary.registration_failures += failed;
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        summary.records_written += (summary.registered + summary.registration_failures) as u64;

        self.disconnect().await;
        result?;

        summary.elapsed = started.elapsed();
        summary.log();
        Ok(summary)
    }

    // =========================================================================
    // Steps
    // =========================================================================

    async fn connect(&self) -> Result<(), PipelineError> {
        let mut session = self.session.lock().await;
        if session.is_connected() {
            return Ok(());
        }
        if let Err(e) = session.connect().await {
            e.log("connect");
            // a half-opened session may still hold resources
            if let Err(close_err) = session.disconnect().await {
                tracing::debug!(error = %close_err, "Disconnect after failed connect");
            }
            return Err(e.into());
        }
        tracing::info!(endpoint = session.endpoint(), "Connected");
        Ok(())
    }

    async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        match session.disconnect().await {
            Ok(()) => tracing::info!(endpoint = session.endpoint(), "Disconnected"),
            Err(e) => tracing::warn!(error = %e, "Disconnect failed"),
        }
    }

    /// Resolves the tags, writing one record per unresolved tag.
    async fn resolve(
        &self,
        tags: &[TagIdentifier],
        records: &RecordSender,
        summary: &mut RunSummary,
    ) -> Result<Vec<NodeHandle>, PipelineError> {
        let resolutions = TagResolver::new(Arc::clone(&self.session)).resolve(tags).await;
        let (handles, failures) = partition(resolutions);

        for (tag, error) in &failures {
            records.send(self.formatter.format_unresolved(tag, error))?;
        }

        summary.resolved = handles.len();
        summary.unresolved = failures.len();
        summary.records_written += failures.len() as u64;
        tracing::info!(resolved = handles.len(), unresolved = failures.len(), "Tags resolved");
        Ok(handles)
    }

    async fn read_batch(
        &self,
        batch: &[NodeHandle],
        records: &RecordSender,
    ) -> Result<(usize, usize), PipelineError> {
        let session = self.session.lock().await;
        let (mut ok, mut failed) = (0, 0);

        for handle in batch {
            let record = match session.read_value(handle).await {
                Ok(value) => {
                    ok += 1;
                    self.formatter.format(handle, &value)
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(tag = %handle.tag(), error = %e, "Read failed");
                    self.formatter.format_read_failure(handle, &e)
                }
            };
            records.send(record)?;
        }

        Ok((ok, failed))
    }
}

// =============================================================================
// Tests
// =============================================================================
