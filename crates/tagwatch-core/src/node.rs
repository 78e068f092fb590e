// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tag identifiers, node identifiers and resolved node handles.
//!
//! - **TagIdentifier**: the raw string read from the tag list
//! - **NodeId**: a parsed OPC UA node identifier (`ns=2;s=Pump.Speed`)
//! - **NodeHandle**: the pairing produced by a successful resolution

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// TagIdentifier
// =============================================================================

/// A tag identifier as read from the input list.
///
/// Surrounding whitespace is trimmed on construction; the value is otherwise
/// opaque and immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagIdentifier(String);

impl TagIdentifier {
    /// Creates a tag identifier, trimming surrounding whitespace.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_string())
    }

    /// Returns the identifier text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TagIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagIdentifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TagIdentifier {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for TagIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA node identifier.
///
/// # Examples
///
/// ```
/// use tagwatch_core::NodeId;
///
/// let parsed: NodeId = "ns=2;s=Pump.Speed".parse().unwrap();
/// assert_eq!(parsed, NodeId::string(2, "Pump.Speed"));
/// assert_eq!(parsed.identifier.raw_value(), "Pump.Speed");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// Returns the null node ID (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(0),
        }
    }

    /// Returns `true` if this is the null node ID.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Converts to the OPC UA string format `ns=<namespace>;{i|s|g|b}=<identifier>`.
    ///
    /// The namespace prefix is omitted for namespace 0.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=1001` / `s=MyNode` (namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest
                    .split_once(';')
                    .ok_or_else(|| NodeIdParseError::new(s, "missing identifier after namespace"))?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| NodeIdParseError::new(s, "invalid namespace index"))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            let value: u32 = id
                .parse()
                .map_err(|_| NodeIdParseError::new(s, "invalid numeric identifier"))?;
            NodeIdentifier::Numeric(value)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(NodeIdParseError::new(s, "empty string identifier"));
            }
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id)
                .map_err(|e| NodeIdParseError::new(s, format!("invalid GUID: {e}")))?;
            NodeIdentifier::Guid(uuid)
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            let bytes = BASE64
                .decode(id)
                .map_err(|e| NodeIdParseError::new(s, format!("invalid base64: {e}")))?;
            NodeIdentifier::Opaque(bytes)
        } else {
            return Err(NodeIdParseError::new(
                s,
                "unknown identifier type, expected i=, s=, g= or b=",
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

/// A string could not be parsed as a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid node id '{input}': {reason}")]
pub struct NodeIdParseError {
    /// The rejected input.
    pub input: String,
    /// Why it was rejected.
    pub reason: String,
}

impl NodeIdParseError {
    fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// The four OPC UA node identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier (application-specific byte array).
    Opaque(Vec<u8>),
}

impl NodeIdentifier {
    /// Returns the identifier value without its type prefix.
    ///
    /// This is the "tag id" column of a record.
    pub fn raw_value(&self) -> String {
        match self {
            Self::Numeric(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::Guid(v) => v.to_string(),
            Self::Opaque(v) => BASE64.encode(v),
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// NodeHandle
// =============================================================================

/// A tag that resolved to a server node.
///
/// Created once per successfully resolved [`TagIdentifier`] and valid for the
/// lifetime of the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    tag: TagIdentifier,
    node_id: NodeId,
}

impl NodeHandle {
    /// Pairs a tag identifier with the node it resolved to.
    pub fn new(tag: TagIdentifier, node_id: NodeId) -> Self {
        Self { tag, node_id }
    }

    /// The identifier as read from the tag list.
    #[inline]
    pub fn tag(&self) -> &TagIdentifier {
        &self.tag
    }

    /// The resolved node.
    #[inline]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.tag, self.node_id)
    }
}

// =============================================================================
// Tests
// =============================================================================
