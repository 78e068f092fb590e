// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagwatch-core
//!
//! Transport-neutral building blocks for the tagwatch tag collector.
//!
//! This crate holds everything that does not need a live OPC UA session:
//!
//! - **Node**: `TagIdentifier`, `NodeId` and the resolved `NodeHandle`
//! - **Value**: `Variant`, `StatusCode` and `DataValue` payloads
//! - **Record**: `TagRecord` and the fault-isolating `ValueRecordFormatter`
//! - **Sink**: `ResultSink` plus the single-writer record task
//! - **Batch**: `BatchPlan` and the paced `BatchScheduler`
//! - **Input**: tag list reader
//!
//! ## Data Flow
//!
//! ```text
//! Taglist.txt ──► input ──► TagIdentifier ──► (resolution) ──► NodeHandle
//!                                                                │
//!                 DataValue ──► ValueRecordFormatter ──► TagRecord
//!                                                                │
//!                          RecordSender ──► RecordWriter ──► ResultSink ──► file
//! ```
//!
//! ## Example
//!
//! ```
//! use tagwatch_core::{DataValue, NodeHandle, NodeId, StatusCode, TagIdentifier, ValueRecordFormatter, Variant};
//!
//! let handle = NodeHandle::new(TagIdentifier::new("ns=2;s=Pump.Speed"), NodeId::string(2, "Pump.Speed"));
//! let payload = DataValue::new(Variant::Double(3.14)).with_status(StatusCode::GOOD);
//!
//! let record = ValueRecordFormatter::new().format(&handle, &payload);
//! assert_eq!(record.scalar_value, "3.14");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod batch;
pub mod error;
pub mod input;
pub mod node;
pub mod record;
pub mod sink;
pub mod value;

// =============================================================================
// Re-exports
// =============================================================================

pub use batch::{BatchPlan, BatchScheduler};
pub use error::{CoreError, CoreResult, FieldExtractionError};
pub use input::{parse_tag_list, read_tag_list};
pub use node::{NodeHandle, NodeId, NodeIdParseError, NodeIdentifier, TagIdentifier};
pub use record::{RecordField, RecordOutcome, TagRecord, ValueRecordFormatter, FIELD_SEPARATOR, HEADER};
pub use sink::{record_channel, RecordReceiver, RecordSender, RecordWriter, RecordWriterHandle, ResultSink};
pub use value::{DataValue, StatusCode, Variant};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
