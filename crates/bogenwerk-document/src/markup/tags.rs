// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tag annotations on markup elements.
//
// Tags live in a comma-joined `data-tags` attribute but are handled as a set:
// order is irrelevant and duplicates collapse. Every operation here mutates
// only the tree it is given.

use std::collections::BTreeSet;

use bogenwerk_core::error::{BogenwerkError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{Element, ElementPath, Markup};

/// Attribute carrying an element's tag list.
pub const TAGS_ATTRIBUTE: &str = "data-tags";

/// A set of tag names.
pub type TagSet = BTreeSet<String>;

/// Split a comma-joined tag list into a set, dropping blanks.
pub fn parse_tag_list(value: &str) -> TagSet {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Re-split caller-supplied names the way stored lists are parsed, so a name
/// with stray spaces or an embedded comma matches what ends up persisted.
pub fn normalize_tags(tags: &TagSet) -> TagSet {
    tags.iter().flat_map(|tag| parse_tag_list(tag)).collect()
}

pub fn format_tag_list(tags: &TagSet) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Coarse element category used by tag queries and bulk tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Image,
    Text,
    /// Any other graphic or structural element.
    Graphic,
}

impl ElementKind {
    pub fn of(element: &Element) -> Self {
        match element.local_name() {
            "image" => Self::Image,
            "text" | "tspan" | "textPath" => Self::Text,
            _ => Self::Graphic,
        }
    }
}

/// An element carrying at least one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedElement {
    pub path: ElementPath,
    pub tags: TagSet,
    pub kind: ElementKind,
}

impl Element {
    pub fn tags(&self) -> TagSet {
        self.attr(TAGS_ATTRIBUTE)
            .map(parse_tag_list)
            .unwrap_or_default()
    }

    /// Replace the element's tags. An empty set removes the attribute.
    pub fn set_tags(&mut self, tags: &TagSet) {
        if tags.is_empty() {
            self.remove_attr(TAGS_ATTRIBUTE);
        } else {
            self.set_attr(TAGS_ATTRIBUTE, format_tag_list(tags));
        }
    }
}

impl Markup {
    /// Every element with a non-empty tag set, in document order.
    pub fn tagged_elements(&self) -> Vec<TaggedElement> {
        let mut found = Vec::new();
        self.root().walk(&mut |path, element| {
            let tags = element.tags();
            if !tags.is_empty() {
                found.push(TaggedElement {
                    path: ElementPath::from(path),
                    tags,
                    kind: ElementKind::of(element),
                });
            }
        });
        found
    }

    /// Union of all tags used anywhere in the tree.
    pub fn all_tags(&self) -> TagSet {
        let mut all = TagSet::new();
        self.root().walk(&mut |_, element| all.extend(element.tags()));
        all
    }

    /// Flip each active tag on one element: present tags are removed, absent
    /// ones added. Returns the element's resulting tag set.
    pub fn toggle_tags(&mut self, path: &ElementPath, active: &TagSet) -> Result<TagSet> {
        let element = self
            .element_mut(path)
            .ok_or_else(|| BogenwerkError::InvalidElementPath(path.to_string()))?;

        let mut tags = element.tags();
        for tag in normalize_tags(active) {
            if !tags.remove(&tag) {
                tags.insert(tag);
            }
        }
        element.set_tags(&tags);

        debug!(%path, ?tags, "Tags toggled");
        Ok(tags)
    }

    /// Add `tags` to every element of `kind`. Never removes a tag.
    ///
    /// Text tagging targets outermost text containers only, so a `tspan` inside
    /// a tagged `text` is not tagged twice. Returns the number of elements the
    /// tags were applied to.
    pub fn apply_tags(&mut self, kind: ElementKind, tags: &TagSet) -> usize {
        let tags = normalize_tags(tags);
        let targets = self.bulk_targets(kind);
        for path in &targets {
            if let Some(element) = self.element_mut(path) {
                let mut current = element.tags();
                current.extend(tags.iter().cloned());
                element.set_tags(&current);
            }
        }
        debug!(?kind, count = targets.len(), "Tags applied");
        targets.len()
    }

    /// Number of elements [`Markup::apply_tags`] would touch for `kind`.
    pub fn count_kind(&self, kind: ElementKind) -> usize {
        self.bulk_targets(kind).len()
    }

    /// Remove every tag annotation. Returns how many elements lost tags.
    pub fn clear_tags(&mut self) -> usize {
        let mut cleared = 0;
        self.root_mut().walk_mut(&mut |_, element| {
            if element.remove_attr(TAGS_ATTRIBUTE).is_some() {
                cleared += 1;
            }
        });
        cleared
    }

    fn bulk_targets(&self, kind: ElementKind) -> Vec<ElementPath> {
        let mut targets: Vec<ElementPath> = Vec::new();
        self.root().walk(&mut |path, element| {
            if ElementKind::of(element) != kind {
                return;
            }
            let nested = kind == ElementKind::Text
                && targets
                    .iter()
                    .any(|outer| path.starts_with(outer.as_slice()));
            if !nested {
                targets.push(ElementPath::from(path));
            }
        });
        targets
    }
}
