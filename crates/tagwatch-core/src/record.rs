// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-tag output records and their formatter.
//!
//! A [`TagRecord`] is always fully shaped: any field the formatter could not
//! extract carries a diagnostic placeholder instead of being left out, so a
//! consumer can split every line the same way.
//!
//! # Line Layout
//!
//! ```text
//! Tagid, Value, StatusCode, Timestamp, Variant value, Error messages
//! 1001, 3.14, Good, 2024-01-01T00:00:00Z, Double(3.14)
//! 1002, Error message: no value in payload, Good, 2024-01-01T00:00:00Z, Error message: no value in payload, error trying to read the variant value from the tag; error trying to read the value from the tag
//! bad.tag, Cannot resolve tag from source. Error message: Invalid node id 'bad.tag'
//! ```
//!
//! Commas inside any value are replaced with `;` and line breaks with a space,
//! so the separator only ever appears between fields.

use std::fmt;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::error::FieldExtractionError;
use crate::node::{NodeHandle, TagIdentifier};
use crate::value::DataValue;

/// Separator placed between rendered fields.
pub const FIELD_SEPARATOR: &str = ", ";

/// Header line of a result file.
pub const HEADER: &str = "Tagid, Value, StatusCode, Timestamp, Variant value, Error messages";

const SEPARATOR_CHAR: char = ',';
const DEFAULT_SUBSTITUTE: char = ';';
const NOTE_JOINER: &str = "; ";

// =============================================================================
// RecordField
// =============================================================================

/// The five independently extracted fields of a value record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    /// Server-side identifier of the node.
    TagId,
    /// Full variant including its type.
    RawVariant,
    /// Scalar value only.
    ScalarValue,
    /// Status code.
    StatusCode,
    /// Source timestamp.
    SourceTimestamp,
}

impl RecordField {
    /// Human-readable label used in error notes.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::TagId => "tag id",
            Self::RawVariant => "variant value",
            Self::ScalarValue => "value",
            Self::StatusCode => "status code",
            Self::SourceTimestamp => "source timestamp",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// TagRecord
// =============================================================================

/// What a record reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// A value from a read or a change notification.
    Value,
    /// The tag identifier did not resolve to a node.
    Unresolved,
    /// The node could not be added to the subscription.
    RegistrationFailed,
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    /// Identifier from the tag list, when known.
    pub tag: Option<TagIdentifier>,
    /// Server-side identifier of the node.
    pub tag_id: String,
    /// Full variant rendering, e.g. `Double(3.14)`.
    pub raw_variant: String,
    /// Scalar value rendering.
    pub scalar_value: String,
    /// Status code name.
    pub status_code: String,
    /// ISO-8601 source timestamp with a trailing `Z`.
    pub source_timestamp: String,
    /// Per-field extraction failures, in extraction order.
    pub error_notes: Vec<String>,
    /// Kind of record.
    pub outcome: RecordOutcome,
}

impl TagRecord {
    /// Returns `true` if any field failed to extract or the record is a failure row.
    pub fn has_errors(&self) -> bool {
        !self.error_notes.is_empty()
    }

    /// Returns the rendered fields in output order.
    pub fn fields(&self) -> Vec<String> {
        match self.outcome {
            RecordOutcome::Value => {
                let mut fields = vec![
                    self.tag_id.clone(),
                    self.scalar_value.clone(),
                    self.status_code.clone(),
                    self.source_timestamp.clone(),
                    self.raw_variant.clone(),
                ];
                if self.has_errors() {
                    fields.push(self.error_notes.join(NOTE_JOINER));
                }
                fields
            }
            RecordOutcome::Unresolved => vec![
                self.tag.as_ref().map(|t| t.to_string()).unwrap_or_default(),
                self.error_notes.join(NOTE_JOINER),
            ],
            RecordOutcome::RegistrationFailed => vec![
                self.tag_id.clone(),
                self.error_notes.join(NOTE_JOINER),
            ],
        }
    }

    /// Renders the record as a single line without a trailing newline.
    pub fn render(&self) -> String {
        self.fields()
            .iter()
            .map(|f| sanitize(f, DEFAULT_SUBSTITUTE))
            .collect::<Vec<_>>()
            .join(FIELD_SEPARATOR)
    }
}

impl fmt::Display for TagRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Replaces the field separator and line breaks so a value stays inside its column.
fn sanitize(value: &str, substitute: char) -> String {
    value
        .chars()
        .map(|c| match c {
            SEPARATOR_CHAR => substitute,
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

// =============================================================================
// ValueRecordFormatter
// =============================================================================

/// Turns raw payloads into [`TagRecord`]s.
///
/// Each of the five fields is extracted on its own; a failure puts
/// `Error message: <cause>` into that column and a note into the error
/// segment, and the remaining fields are still extracted.
///
/// The formatter is cheap and allocation-only. It is safe to call from a
/// notification path.
#[derive(Debug, Clone, Copy)]
pub struct ValueRecordFormatter {
    substitute: char,
}

impl Default for ValueRecordFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueRecordFormatter {
    /// Creates a formatter that substitutes `;` for embedded commas.
    pub fn new() -> Self {
        Self {
            substitute: DEFAULT_SUBSTITUTE,
        }
    }

    /// Uses a different substitute character for embedded commas.
    pub fn with_substitute(mut self, substitute: char) -> Self {
        // a comma substitute would reintroduce the separator
        if substitute != SEPARATOR_CHAR {
            self.substitute = substitute;
        }
        self
    }

    /// Formats a value payload for a resolved node.
    pub fn format(&self, handle: &NodeHandle, payload: &DataValue) -> TagRecord {
        let mut notes = Vec::new();

        let tag_id = self.settle(Self::extract_tag_id(handle), &mut notes);
        let raw_variant = self.settle(Self::extract_raw_variant(payload), &mut notes);
        let scalar_value = self.settle(Self::extract_scalar(payload), &mut notes);
        let status_code = self.settle(Self::extract_status(payload), &mut notes);
        let source_timestamp = self.settle(Self::extract_timestamp(payload), &mut notes);

        TagRecord {
            tag: Some(handle.tag().clone()),
            tag_id,
            raw_variant,
            scalar_value,
            status_code,
            source_timestamp,
            error_notes: notes,
            outcome: RecordOutcome::Value,
        }
    }

    /// Formats a read that failed before any payload arrived.
    ///
    /// The tag id is still extracted; the four payload fields carry the cause.
    pub fn format_read_failure(&self, handle: &NodeHandle, cause: &dyn fmt::Display) -> TagRecord {
        let mut notes = Vec::new();
        let cause = cause.to_string();

        let tag_id = self.settle(Self::extract_tag_id(handle), &mut notes);
        let mut fail = |field| {
            self.settle(Err(FieldExtractionError::new(field, cause.clone())), &mut notes)
        };
        let raw_variant = fail(RecordField::RawVariant);
        let scalar_value = fail(RecordField::ScalarValue);
        let status_code = fail(RecordField::StatusCode);
        let source_timestamp = fail(RecordField::SourceTimestamp);

        TagRecord {
            tag: Some(handle.tag().clone()),
            tag_id,
            raw_variant,
            scalar_value,
            status_code,
            source_timestamp,
            error_notes: notes,
            outcome: RecordOutcome::Value,
        }
    }

    /// Formats a tag that did not resolve. Only the identifier is reported.
    pub fn format_unresolved(&self, tag: &TagIdentifier, cause: &dyn fmt::Display) -> TagRecord {
        TagRecord {
            tag: Some(tag.clone()),
            tag_id: String::new(),
            raw_variant: String::new(),
            scalar_value: String::new(),
            status_code: String::new(),
            source_timestamp: String::new(),
            error_notes: vec![self.clean(&format!(
                "Cannot resolve tag from source. Error message: {}",
                cause
            ))],
            outcome: RecordOutcome::Unresolved,
        }
    }

    /// Formats a node that could not be added to the subscription.
    pub fn format_registration_failure(
        &self,
        handle: &NodeHandle,
        cause: &dyn fmt::Display,
    ) -> TagRecord {
        let tag_id = match Self::extract_tag_id(handle) {
            Ok(id) => self.clean(&id),
            Err(_) => self.clean(handle.tag().as_str()),
        };
        TagRecord {
            tag: Some(handle.tag().clone()),
            tag_id,
            raw_variant: String::new(),
            scalar_value: String::new(),
            status_code: String::new(),
            source_timestamp: String::new(),
            error_notes: vec![self.clean(&format!(
                "Cannot subscribe tag. Error message: {}",
                cause
            ))],
            outcome: RecordOutcome::RegistrationFailed,
        }
    }

    // =========================================================================
    // Field extraction
    // =========================================================================

    /// Extracts the server-side identifier.
    pub fn extract_tag_id(handle: &NodeHandle) -> Result<String, FieldExtractionError> {
        let node_id = handle.node_id();
        if node_id.is_null() {
            return Err(FieldExtractionError::new(RecordField::TagId, "node id is null"));
        }
        Ok(node_id.identifier.raw_value())
    }

    /// Extracts the full variant rendering.
    pub fn extract_raw_variant(payload: &DataValue) -> Result<String, FieldExtractionError> {
        payload
            .value
            .as_ref()
            .map(|v| v.describe())
            .ok_or_else(|| FieldExtractionError::new(RecordField::RawVariant, "no value in payload"))
    }

    /// Extracts the scalar value rendering.
    pub fn extract_scalar(payload: &DataValue) -> Result<String, FieldExtractionError> {
        match payload.value.as_ref() {
            None => Err(FieldExtractionError::new(
                RecordField::ScalarValue,
                "no value in payload",
            )),
            Some(v) if v.is_empty() => Err(FieldExtractionError::new(
                RecordField::ScalarValue,
                "variant is empty",
            )),
            Some(v) => Ok(v.to_string()),
        }
    }

    /// Extracts the status code name.
    pub fn extract_status(payload: &DataValue) -> Result<String, FieldExtractionError> {
        payload
            .status
            .map(|s| s.to_string())
            .ok_or_else(|| FieldExtractionError::new(RecordField::StatusCode, "no status code in payload"))
    }

    /// Extracts the source timestamp as ISO-8601 with a trailing `Z`.
    pub fn extract_timestamp(payload: &DataValue) -> Result<String, FieldExtractionError> {
        payload
            .source_timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .ok_or_else(|| {
                FieldExtractionError::new(RecordField::SourceTimestamp, "no source timestamp in payload")
            })
    }

    fn settle(&self, result: Result<String, FieldExtractionError>, notes: &mut Vec<String>) -> String {
        match result {
            Ok(value) => self.clean(&value),
            Err(err) => {
                notes.push(err.note());
                self.clean(&err.placeholder())
            }
        }
    }

    fn clean(&self, value: &str) -> String {
        sanitize(value, self.substitute)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use crate::value::{StatusCode, Variant};
    use chrono::{TimeZone, Utc};

    fn handle(id: &str) -> NodeHandle {
        NodeHandle::new(TagIdentifier::new(id), id.parse::<NodeId>().unwrap())
    }

    fn full_payload(value: Variant) -> DataValue {
        DataValue::new(value)
            .with_status(StatusCode::GOOD)
            .with_source_timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_format_complete_record() {
        let formatter = ValueRecordFormatter::new();
        let record = formatter.format(&handle("ns=2;s=Tank.Level"), &full_payload(Variant::Double(3.14)));

        assert_eq!(record.outcome, RecordOutcome::Value);
        assert!(record.error_notes.is_empty());
        assert_eq!(record.tag_id, "Tank.Level");
        assert_eq!(record.scalar_value, "3.14");
        assert_eq!(record.raw_variant, "Double(3.14)");
        assert_eq!(record.status_code, "Good");
        assert_eq!(record.source_timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(
            record.render(),
            "Tank.Level, 3.14, Good, 2024-01-01T00:00:00Z, Double(3.14)"
        );
    }

    #[test]
    fn test_missing_status_isolated() {
        let formatter = ValueRecordFormatter::new();
        let mut payload = full_payload(Variant::Boolean(true));
        payload.status = None;

        let record = formatter.format(&handle("ns=2;i=42"), &payload);

        assert_eq!(record.error_notes, vec!["error trying to read the status code from the tag"]);
        assert_eq!(record.status_code, "Error message: no status code in payload");
        assert_eq!(record.tag_id, "42");
        assert_eq!(record.scalar_value, "true");
        assert_eq!(record.raw_variant, "Boolean(true)");
        assert_eq!(record.source_timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(record.fields().len(), 6);
    }

    #[test]
    fn test_missing_timestamp_isolated() {
        let formatter = ValueRecordFormatter::new();
        let mut payload = full_payload(Variant::Int32(7));
        payload.source_timestamp = None;

        let record = formatter.format(&handle("ns=2;i=42"), &payload);
        assert_eq!(
            record.error_notes,
            vec!["error trying to read the source timestamp from the tag"]
        );
        assert_eq!(record.scalar_value, "7");
        assert_eq!(record.status_code, "Good");
    }

    #[test]
    fn test_null_node_id_isolated() {
        let formatter = ValueRecordFormatter::new();
        let null_handle = NodeHandle::new(TagIdentifier::new("ghost"), NodeId::null());
        let record = formatter.format(&null_handle, &full_payload(Variant::Double(1.5)));

        assert_eq!(record.error_notes, vec!["error trying to read the tag id from the tag"]);
        assert_eq!(record.tag_id, "Error message: node id is null");
        assert_eq!(record.scalar_value, "1.5");
    }

    #[test]
    fn test_empty_variant_fails_scalar_only() {
        let formatter = ValueRecordFormatter::new();
        let record = formatter.format(&handle("ns=2;i=1"), &full_payload(Variant::Empty));

        assert_eq!(record.error_notes, vec!["error trying to read the value from the tag"]);
        assert_eq!(record.raw_variant, "Empty");
        assert_eq!(record.scalar_value, "Error message: variant is empty");
    }

    #[test]
    fn test_missing_value_fails_two_fields() {
        let formatter = ValueRecordFormatter::new();
        let payload = DataValue::empty()
            .with_status(StatusCode::BAD)
            .with_source_timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let record = formatter.format(&handle("ns=2;i=1"), &payload);

        assert_eq!(record.error_notes.len(), 2);
        assert_eq!(record.status_code, "Bad");
    }

    #[test]
    fn test_separator_substituted() {
        let formatter = ValueRecordFormatter::new();
        let payload = full_payload(Variant::String("12,5 bar,\nhigh".into()));
        let record = formatter.format(&handle("ns=2;s=Line,1"), &payload);

        assert_eq!(record.scalar_value, "12;5 bar; high");
        assert_eq!(record.tag_id, "Line;1");

        let line = record.render();
        assert_eq!(line.split(FIELD_SEPARATOR).count(), 5);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_array_value_substituted() {
        let formatter = ValueRecordFormatter::new();
        let payload = full_payload(Variant::Array(vec![Variant::Int32(1), Variant::Int32(2)]));
        let record = formatter.format(&handle("ns=2;i=9"), &payload);

        assert_eq!(record.scalar_value, "[1; 2]");
        assert_eq!(record.raw_variant, "Array([1; 2])");
    }

    #[test]
    fn test_custom_substitute() {
        let formatter = ValueRecordFormatter::new().with_substitute('|');
        let record = formatter.format(&handle("ns=2;i=9"), &full_payload(Variant::String("a,b".into())));
        assert_eq!(record.scalar_value, "a|b");

        let ignored = ValueRecordFormatter::new().with_substitute(',');
        let record = ignored.format(&handle("ns=2;i=9"), &full_payload(Variant::String("a,b".into())));
        assert_eq!(record.scalar_value, "a;b");
    }

    #[test]
    fn test_render_splits_back_into_fields() {
        let formatter = ValueRecordFormatter::new();
        let record = formatter.format(&handle("ns=3;s=Boiler.Temp"), &full_payload(Variant::Float(81.5)));

        let line = record.render();
        let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        assert_eq!(parts, record.fields());
    }

    #[test]
    fn test_unresolved_record() {
        let formatter = ValueRecordFormatter::new();
        let record = formatter.format_unresolved(&TagIdentifier::new("bad.tag"), &"unknown node, sorry");

        assert_eq!(record.outcome, RecordOutcome::Unresolved);
        assert_eq!(
            record.render(),
            "bad.tag, Cannot resolve tag from source. Error message: unknown node; sorry"
        );
    }

    #[test]
    fn test_registration_failure_record() {
        let formatter = ValueRecordFormatter::new();
        let record = formatter.format_registration_failure(&handle("ns=2;i=77"), &"BadTooManyMonitoredItems");

        assert_eq!(record.outcome, RecordOutcome::RegistrationFailed);
        assert_eq!(
            record.render(),
            "77, Cannot subscribe tag. Error message: BadTooManyMonitoredItems"
        );
    }

    #[test]
    fn test_read_failure_record() {
        let formatter = ValueRecordFormatter::new();
        let record = formatter.format_read_failure(&handle("ns=2;i=5"), &"BadTimeout");

        assert_eq!(record.tag_id, "5");
        assert_eq!(record.scalar_value, "Error message: BadTimeout");
        assert_eq!(record.error_notes.len(), 4);
        assert_eq!(record.fields().len(), 6);
    }

    #[test]
    fn test_header_field_count() {
        assert_eq!(HEADER.split(FIELD_SEPARATOR).count(), 6);
    }
}
