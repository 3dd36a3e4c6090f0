// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Caller-supplied asset pool — binary payloads keyed by file name.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

/// File-name keyed binaries supplied at intake. Entries are only ever added;
/// the first payload stored under a name is kept.
#[derive(Debug, Clone, Default)]
pub struct AssetPool {
    files: HashMap<String, Arc<[u8]>>,
}

impl AssetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a payload. Returns `false` (and keeps the existing payload) when
    /// the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> bool {
        let name = name.into();
        if self.files.contains_key(&name) {
            debug!(%name, "asset pool already holds this name; keeping first payload");
            return false;
        }
        self.files.insert(name, data.into());
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<[u8]>> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}
