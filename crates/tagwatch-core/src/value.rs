// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Raw values as delivered by a read or a change notification.
//!
//! These types mirror the OPC UA `DataValue` closely enough that every part of
//! a payload may be absent: the formatter decides what an absent part means.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Variant
// =============================================================================

/// OPC UA variant value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// Variant with no value.
    #[default]
    Empty,

    /// Boolean value.
    Boolean(bool),

    /// Signed byte.
    SByte(i8),

    /// Unsigned byte.
    Byte(u8),

    /// 16-bit signed integer.
    Int16(i16),

    /// 16-bit unsigned integer.
    UInt16(u16),

    /// 32-bit signed integer.
    Int32(i32),

    /// 32-bit unsigned integer.
    UInt32(u32),

    /// 64-bit signed integer.
    Int64(i64),

    /// 64-bit unsigned integer.
    UInt64(u64),

    /// 32-bit float.
    Float(f32),

    /// 64-bit double.
    Double(f64),

    /// String value.
    String(String),

    /// Date/time value.
    DateTime(DateTime<Utc>),

    /// GUID value.
    Guid(uuid::Uuid),

    /// Byte string.
    ByteString(Vec<u8>),

    /// Array of values.
    Array(Vec<Variant>),

    /// Any other built-in type, kept as its debug rendering.
    Other {
        /// Type name reported by the transport.
        type_name: String,
        /// Rendered value.
        text: String,
    },
}

impl Variant {
    /// Returns the OPC UA type name of this variant.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Empty => "Empty",
            Self::Boolean(_) => "Boolean",
            Self::SByte(_) => "SByte",
            Self::Byte(_) => "Byte",
            Self::Int16(_) => "Int16",
            Self::UInt16(_) => "UInt16",
            Self::Int32(_) => "Int32",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::UInt64(_) => "UInt64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Guid(_) => "Guid",
            Self::ByteString(_) => "ByteString",
            Self::Array(_) => "Array",
            Self::Other { type_name, .. } => type_name,
        }
    }

    /// Returns `true` for the empty variant.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Renders the whole variant including its type, e.g. `Double(3.14)`.
    pub fn describe(&self) -> String {
        match self {
            Self::Empty => "Empty".to_string(),
            other => format!("{}({})", other.type_name(), other),
        }
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::SByte(v) => Some(*v as f64),
            Self::Byte(v) => Some(*v as f64),
            Self::Int16(v) => Some(*v as f64),
            Self::UInt16(v) => Some(*v as f64),
            Self::Int32(v) => Some(*v as f64),
            Self::UInt32(v) => Some(*v as f64),
            Self::Int64(v) => Some(*v as f64),
            Self::UInt64(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    /// Renders the scalar value only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
            Self::DateTime(v) => f.write_str(&v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Other { text, .. } => f.write_str(text),
        }
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);
    /// Uncertain.
    pub const UNCERTAIN: StatusCode = StatusCode(0x4000_0000);
    /// Bad.
    pub const BAD: StatusCode = StatusCode(0x8000_0000);
    /// BadNodeIdUnknown.
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);

    /// Returns the raw status bits.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` if the severity is Good.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if the severity is Uncertain.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        self.0 & 0x4000_0000 != 0 && self.0 & 0x8000_0000 == 0
    }

    /// Returns `true` if the severity is Bad.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name of this code, if known.
    ///
    /// The low 16 info bits are ignored for the lookup.
    pub fn name(&self) -> Option<&'static str> {
        let name = match self.0 & 0xFFFF_0000 {
            0x0000_0000 => "Good",
            0x4000_0000 => "Uncertain",
            0x8000_0000 => "Bad",
            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8003_0000 => "BadOutOfMemory",
            0x8004_0000 => "BadResourceUnavailable",
            0x8005_0000 => "BadCommunicationError",
            0x800A_0000 => "BadTimeout",
            0x800B_0000 => "BadServiceUnsupported",
            0x800C_0000 => "BadShutdown",
            0x800D_0000 => "BadServerNotConnected",
            0x800E_0000 => "BadServerHalted",
            0x8010_0000 => "BadTooManyOperations",
            0x8020_0000 => "BadIdentityTokenInvalid",
            0x8021_0000 => "BadIdentityTokenRejected",
            0x8025_0000 => "BadSessionIdInvalid",
            0x8026_0000 => "BadSessionClosed",
            0x8028_0000 => "BadSubscriptionIdInvalid",
            0x8031_0000 => "BadNoCommunication",
            0x8032_0000 => "BadWaitingForInitialData",
            0x8033_0000 => "BadNodeIdInvalid",
            0x8034_0000 => "BadNodeIdUnknown",
            0x8035_0000 => "BadAttributeIdInvalid",
            0x803A_0000 => "BadNotReadable",
            0x8042_0000 => "BadMonitoredItemIdInvalid",
            0x8043_0000 => "BadMonitoredItemFilterInvalid",
            0x8074_0000 => "BadTypeMismatch",
            0x808B_0000 => "BadDeviceFailure",
            0x808C_0000 => "BadSensorFailure",
            0x808D_0000 => "BadOutOfService",
            0x80DB_0000 => "BadTooManyMonitoredItems",
            0x4090_0000 => "UncertainLastUsableValue",
            0x4091_0000 => "UncertainSubstituteValue",
            0x4092_0000 => "UncertainInitialValue",
            0x4093_0000 => "UncertainSensorNotAccurate",
            0x4094_0000 => "UncertainEngineeringUnitsExceeded",
            0x4095_0000 => "UncertainSubNormal",
            0x0096_0000 => "GoodLocalOverride",
            0x00A5_0000 => "GoodNoData",
            _ => return None,
        };
        Some(name)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::GOOD
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// =============================================================================
// DataValue
// =============================================================================

/// A value payload from a read or a change notification.
///
/// Every part is optional; servers and transports may omit any of them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value, if the payload carried one.
    pub value: Option<Variant>,

    /// Status code reported by the server.
    pub status: Option<StatusCode>,

    /// Time the underlying source recorded the value.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Time the server received the value.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a payload carrying only a value.
    pub fn new(value: Variant) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Creates a payload with no parts at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sets the status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }

    /// Sets the server timestamp.
    pub fn with_server_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.server_timestamp = Some(timestamp);
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
