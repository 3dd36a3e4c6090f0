// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bogenwerk document pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a document in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a document's asset resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Parsed and waiting for its references to be bundled.
    Unresolved,
    /// A resolution call is in flight.
    Resolving,
    /// Resolution finished; individual references may still have errors.
    Resolved,
    /// Resolution aborted with a hard error.
    Failed,
}

impl DocumentStatus {
    /// Whether a document in this state may be written to an archive.
    pub fn is_exportable(&self) -> bool {
        matches!(self, Self::Unresolved | Self::Resolved)
    }
}

/// File extensions treated as fonts. Everything else is an image.
pub const FONT_EXTENSIONS: &[&str] = &["woff2", "woff", "ttf", "otf", "eot"];

/// Category of a bundled binary asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Image,
    Font,
}

impl AssetKind {
    /// Infer the asset category from a file name's extension.
    pub fn from_filename(name: &str) -> Self {
        match extension(name) {
            Some(ext) if FONT_EXTENSIONS.contains(&ext.as_str()) => Self::Font,
            _ => Self::Image,
        }
    }

    /// Bundle folder holding assets of this kind (`images` or `fonts`).
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Font => "fonts",
        }
    }

    /// Bundle-relative path for an asset of this kind.
    pub fn bundle_path(&self, local_name: &str) -> String {
        format!("{}/{}", self.folder(), local_name)
    }
}

/// Lowercased extension of a file name, without the dot.
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains('/') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// A named binary resource referenced by a page.
///
/// The payload is shared between a document's asset list and the process-wide
/// asset pool; it is never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Reference string exactly as it appeared in the source markup.
    pub original_reference: String,
    /// File name inside the bundle folder for `kind`.
    pub local_name: String,
    pub data: Arc<[u8]>,
    pub kind: AssetKind,
}

impl Asset {
    /// Bundle-relative path (`images/<name>` or `fonts/<name>`).
    pub fn bundle_path(&self) -> String {
        self.kind.bundle_path(&self.local_name)
    }
}

/// A reference that could not be resolved, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionError {
    pub reference: String,
    pub reason: String,
}

impl std::fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reference, self.reason)
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Landscape when strictly wider than tall, portrait otherwise.
    pub fn for_dimensions(width: f32, height: f32) -> Self {
        if width > height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// Physical size of an output page in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageSize {
    pub fn new(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::for_dimensions(self.width_mm, self.height_mm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fonts_are_classified_by_extension() {
        assert_eq!(AssetKind::from_filename("Inter.WOFF2"), AssetKind::Font);
        assert_eq!(AssetKind::from_filename("icon.eot"), AssetKind::Font);
        assert_eq!(AssetKind::from_filename("photo.jpg"), AssetKind::Image);
        assert_eq!(AssetKind::from_filename("no-extension"), AssetKind::Image);
    }

    #[test]
    fn extension_ignores_dotfiles_and_directories() {
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("dir.v2/file"), None);
        assert_eq!(extension("a.PNG").as_deref(), Some("png"));
    }

    #[test]
    fn only_idle_states_are_exportable() {
        assert!(DocumentStatus::Unresolved.is_exportable());
        assert!(DocumentStatus::Resolved.is_exportable());
        assert!(!DocumentStatus::Resolving.is_exportable());
        assert!(!DocumentStatus::Failed.is_exportable());
    }

    #[test]
    fn square_pages_are_portrait() {
        assert_eq!(PageSize::new(100.0, 100.0).orientation(), Orientation::Portrait);
        assert_eq!(PageSize::new(297.0, 210.0).orientation(), Orientation::Landscape);
    }
}
