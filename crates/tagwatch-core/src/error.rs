// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for tagwatch-core.
//!
//! # Error Hierarchy
//!
//! ```text
//! CoreError                - propagated, fatal to the run
//! ├── Io                   - opening the tag list or result file
//! ├── Write                - appending a record to the result file
//! ├── SinkClosed           - record writer is gone
//! └── Writer               - record writer task aborted
//!
//! FieldExtractionError     - never propagated; becomes a diagnostic placeholder
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::RecordField;

// =============================================================================
// CoreError
// =============================================================================

/// Errors raised by the result sink and input reader.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A file could not be opened or read.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A record could not be appended to the result stream.
    #[error("Failed to write record: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The record writer stopped accepting records.
    #[error("Result sink is closed")]
    SinkClosed,

    /// The record writer task terminated abnormally.
    #[error("Record writer failed: {message}")]
    Writer {
        /// Failure description.
        message: String,
    },
}

impl CoreError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a write error.
    pub fn write(source: io::Error) -> Self {
        Self::Write { source }
    }

    /// Creates a writer task error.
    pub fn writer(message: impl Into<String>) -> Self {
        Self::Writer {
            message: message.into(),
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Write { .. } => "write",
            Self::SinkClosed => "sink_closed",
            Self::Writer { .. } => "writer",
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// FieldExtractionError
// =============================================================================

/// One record field could not be extracted from a raw value.
///
/// The formatter turns this into a placeholder in the affected column and a
/// note in the record's error segment; the other columns are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to extract {field}: {cause}")]
pub struct FieldExtractionError {
    /// Field that failed.
    pub field: RecordField,
    /// Human-readable cause.
    pub cause: String,
}

impl FieldExtractionError {
    /// Creates a new extraction error.
    pub fn new(field: RecordField, cause: impl Into<String>) -> Self {
        Self {
            field,
            cause: cause.into(),
        }
    }

    /// Text substituted into the failed column.
    pub fn placeholder(&self) -> String {
        format!("Error message: {}", self.cause)
    }

    /// Note appended to the record's error segment.
    pub fn note(&self) -> String {
        format!("error trying to read the {} from the tag", self.field.label())
    }
}

// =============================================================================
// Tests
// =============================================================================
