// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Append-only result sink and the single-writer record task.
//!
//! Records may be produced from several places at once: the resolution pass,
//! the batch scheduler and the notification dispatcher. They all push into a
//! [`RecordSender`]; one [`RecordWriter`] task drains the channel and appends
//! to the [`ResultSink`], so lines are never interleaved.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tagwatch_core::{RecordWriter, ResultSink};
//!
//! # async fn example() -> tagwatch_core::CoreResult<()> {
//! let sink = Arc::new(ResultSink::create("resultTagList.csv")?);
//! sink.write_header()?;
//!
//! let (sender, writer) = RecordWriter::spawn(sink);
//! // ... hand `sender` clones to producers ...
//! drop(sender);
//! let written = writer.finish().await?;
//! # Ok(())
//! # }
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{CoreError, CoreResult};
use crate::record::{TagRecord, HEADER};

// =============================================================================
// ResultSink
// =============================================================================

/// Line-oriented, append-only output destination.
///
/// Each append is flushed immediately so a crash loses at most the record in
/// flight.
pub struct ResultSink {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    path: Option<PathBuf>,
    records_written: AtomicU64,
    bytes_written: AtomicU64,
}

impl ResultSink {
    /// Creates (or truncates) the result file, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
            }
        }

        let file = File::create(path).map_err(|e| CoreError::io(path, e))?;
        tracing::debug!(path = %path.display(), "Result file created");

        Ok(Self {
            writer: Mutex::new(BufWriter::new(Box::new(file))),
            path: Some(path.to_path_buf()),
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        })
    }

    /// Wraps an arbitrary writer, e.g. stdout or an in-memory buffer.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(Box::new(writer))),
            path: None,
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    /// Path of the underlying file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the column header line.
    pub fn write_header(&self) -> CoreResult<()> {
        self.write_line(HEADER)
    }

    /// Appends one record as a single line.
    pub fn append(&self, record: &TagRecord) -> CoreResult<()> {
        self.write_line(&record.render())?;
        self.records_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Appends a raw line and flushes.
    pub fn write_line(&self, line: &str) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line).map_err(CoreError::write)?;
        writer.flush().map_err(CoreError::write)?;
        self.bytes_written
            .fetch_add(line.len() as u64 + 1, Ordering::Relaxed);
        Ok(())
    }

    /// Flushes buffered output.
    pub fn flush(&self) -> CoreResult<()> {
        self.writer.lock().flush().map_err(CoreError::write)
    }

    /// Number of records appended.
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    /// Number of bytes appended, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSink")
            .field("path", &self.path)
            .field("records_written", &self.records_written())
            .finish()
    }
}

// =============================================================================
// Record channel
// =============================================================================

/// Creates an unbounded record channel.
pub fn record_channel() -> (RecordSender, RecordReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RecordSender { inner: tx }, RecordReceiver { inner: rx })
}

/// Producer side of the record channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RecordSender {
    inner: mpsc::UnboundedSender<TagRecord>,
}

impl RecordSender {
    /// Queues a record for writing.
    ///
    /// Never blocks; fails only once the writer has gone away.
    pub fn send(&self, record: TagRecord) -> CoreResult<()> {
        self.inner.send(record).map_err(|_| CoreError::SinkClosed)
    }

    /// Returns `true` if the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Consumer side of the record channel.
#[derive(Debug)]
pub struct RecordReceiver {
    inner: mpsc::UnboundedReceiver<TagRecord>,
}

impl RecordReceiver {
    /// Waits for the next record; `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<TagRecord> {
        self.inner.recv().await
    }

    /// Returns a queued record without waiting.
    pub fn try_recv(&mut self) -> Option<TagRecord> {
        self.inner.try_recv().ok()
    }

    /// Drains every queued record without waiting.
    pub fn drain(&mut self) -> Vec<TagRecord> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

// =============================================================================
// RecordWriter
// =============================================================================

/// Spawns the task that owns all appends to a [`ResultSink`].
pub struct RecordWriter;

impl RecordWriter {
    /// Spawns the writer task on the current tokio runtime.
    ///
    /// The task ends when every [`RecordSender`] clone is dropped, or on the
    /// first write failure.
    pub fn spawn(sink: Arc<ResultSink>) -> (RecordSender, RecordWriterHandle) {
        let (sender, mut receiver) = record_channel();

        let task_sink = Arc::clone(&sink);
        let handle = tokio::spawn(async move {
            let mut written = 0u64;
            while let Some(record) = receiver.recv().await {
                if let Err(e) = task_sink.append(&record) {
                    tracing::error!(error = %e, "Failed to append record, writer stopping");
                    return Err(e);
                }
                written += 1;
            }
            task_sink.flush()?;
            tracing::debug!(records = written, "Record writer drained");
            Ok::<u64, CoreError>(written)
        });

        (sender, RecordWriterHandle { handle, sink })
    }
}

/// Join handle for the record writer task.
#[derive(Debug)]
pub struct RecordWriterHandle {
    handle: JoinHandle<CoreResult<u64>>,
    sink: Arc<ResultSink>,
}

impl RecordWriterHandle {
    /// The sink being written.
    pub fn sink(&self) -> &Arc<ResultSink> {
        &self.sink
    }

    /// Waits for the writer to drain and returns the number of records it wrote.
    ///
    /// Every [`RecordSender`] must be dropped first or this waits forever.
    pub async fn finish(self) -> CoreResult<u64> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(CoreError::writer(e.to_string())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
