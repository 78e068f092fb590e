// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tag list reader.
//!
//! One identifier per line. Surrounding whitespace is trimmed and blank lines
//! are skipped; order is preserved.

use std::path::Path;

use crate::error::{CoreError, CoreResult};
use crate::node::TagIdentifier;

/// Parses tag identifiers from text.
pub fn parse_tag_list(content: &str) -> Vec<TagIdentifier> {
    content
        .lines()
        .map(TagIdentifier::new)
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Reads tag identifiers from a file.
pub fn read_tag_list(path: impl AsRef<Path>) -> CoreResult<Vec<TagIdentifier>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    let tags = parse_tag_list(&content);
    tracing::debug!(path = %path.display(), count = tags.len(), "Tag list loaded");
    Ok(tags)
}
