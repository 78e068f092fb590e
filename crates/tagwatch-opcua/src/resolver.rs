// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tag identifier resolution.

use std::sync::Arc;

use tokio::sync::Mutex;

use tagwatch_core::{NodeHandle, TagIdentifier};

use crate::client::OpcUaSession;
use crate::error::{OpcUaError, ResolutionError};

/// Outcome of resolving one tag.
pub type Resolution = (TagIdentifier, Result<NodeHandle, ResolutionError>);

/// Resolves tag identifiers against a live session.
///
/// Each tag is resolved on its own: a failure is returned for that tag and
/// the next one is attempted. Output order matches input order.
pub struct TagResolver<T: OpcUaSession> {
    session: Arc<Mutex<T>>,
}

impl<T: OpcUaSession> TagResolver<T> {
    /// Creates a resolver over the session.
    pub fn new(session: Arc<Mutex<T>>) -> Self {
        Self { session }
    }

    /// Resolves every tag, in order.
    pub async fn resolve(&self, tags: &[TagIdentifier]) -> Vec<Resolution> {
        let session = self.session.lock().await;
        let mut resolutions = Vec::with_capacity(tags.len());

        for tag in tags {
            let result = session.resolve_node(tag).await.map_err(|e| into_resolution_error(tag, e));
            match &result {
                Ok(handle) => tracing::debug!(tag = %tag, node_id = %handle.node_id(), "Tag resolved"),
                Err(e) => tracing::warn!(tag = %tag, error = %e, "Cannot resolve tag"),
            }
            resolutions.push((tag.clone(), result));
        }

        resolutions
    }
}

fn into_resolution_error(tag: &TagIdentifier, error: OpcUaError) -> ResolutionError {
    match error {
        OpcUaError::Resolution(e) => e,
        other => ResolutionError::lookup_failed(tag.as_str(), other.to_string()),
    }
}

/// Splits resolutions into handles and failures, keeping order within each.
pub fn partition(resolutions: Vec<Resolution>) -> (Vec<NodeHandle>, Vec<(TagIdentifier, ResolutionError)>) {
    let mut handles = Vec::new();
    let mut failures = Vec::new();
    for (tag, result) in resolutions {
        match result {
            Ok(handle) => handles.push(handle),
            Err(e) => failures.push((tag, e)),
        }
    }
    (handles, failures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_resolution_error() {
        let tag = TagIdentifier::new("ns=2;i=1");

        let err = into_resolution_error(&tag, OpcUaError::unknown_node("ns=2;i=1"));
        assert_eq!(err, ResolutionError::unknown_node("ns=2;i=1"));

        let err = into_resolution_error(&tag, OpcUaError::read_failed("ns=2;i=1", "BadTimeout"));
        assert!(matches!(err, ResolutionError::LookupFailed { ref tag, .. } if tag == "ns=2;i=1"));
    }

    #[test]
    fn test_partition_keeps_order() {
        let ok = |t: &str| {
            let tag = TagIdentifier::new(t);
            let handle = NodeHandle::new(tag.clone(), tagwatch_core::NodeId::string(2, t));
            (tag, Ok(handle))
        };
        let bad = |t: &str| (TagIdentifier::new(t), Err(ResolutionError::unknown_node(t)));

        let (handles, failures) = partition(vec![ok("a"), bad("x"), ok("b"), bad("y")]);
        let names: Vec<&str> = handles.iter().map(|h| h.tag().as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(failures[0].0.as_str(), "x");
        assert_eq!(failures[1].0.as_str(), "y");
    }
}
