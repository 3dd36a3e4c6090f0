// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Markup module — owned SVG tree and tag annotations.

pub mod tags;
pub mod tree;

pub use tags::{ElementKind, TAGS_ATTRIBUTE, TagSet, TaggedElement};
pub use tree::{Attribute, Element, ElementPath, Markup, Node};
