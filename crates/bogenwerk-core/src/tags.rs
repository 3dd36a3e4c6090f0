// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tag names and the append-only registry of known tags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Substring that marks a tag as a redaction tag (matched case-insensitively).
pub const REDACTION_MARKER: &str = "redact";

/// Whether `tag` requests redaction of the element carrying it.
pub fn is_redaction_tag(tag: &str) -> bool {
    tag.to_lowercase().contains(REDACTION_MARKER)
}

/// Every tag name seen in the session. Names are only ever added.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagRegistry {
    names: BTreeSet<String>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag name. Blank names are ignored. Returns `true` if the
    /// name was not known before.
    pub fn register(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.names.insert(name.to_owned())
    }

    pub fn register_all<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            self.register(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_match_is_case_insensitive_substring() {
        assert!(is_redaction_tag("redact-text"));
        assert!(is_redaction_tag("Auto-REDACTED"));
        assert!(!is_redaction_tag("review"));
    }

    #[test]
    fn registry_ignores_blank_and_duplicate_names() {
        let mut registry = TagRegistry::new();
        assert!(registry.register("confidential"));
        assert!(!registry.register("confidential"));
        assert!(!registry.register("   "));
        assert_eq!(registry.len(), 1);
    }
}
