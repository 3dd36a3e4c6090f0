// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::PageSize;

/// Settings for the paginated PDF export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Every output page is this wide; its height follows the page's aspect ratio.
    pub page_width_mm: f32,
    /// Raster density used when rendering a page to a bitmap.
    pub pixels_per_mm: f32,
    /// Largest raster canvas, in pixels, a single page may allocate. Taller
    /// or wider pages fail to render and become placeholders.
    pub max_canvas_pixels: u64,
    /// Lossy (JPEG) encoding quality, 1-100.
    pub jpeg_quality: u8,
    /// Intrinsic size assumed for pages that declare no usable dimensions.
    pub default_page_width: f32,
    pub default_page_height: f32,
    /// Size of the diagnostic page emitted in place of a page that failed.
    pub placeholder_page: PageSize,
    /// Load installed system fonts into the rasterizer's font database.
    pub load_system_fonts: bool,
    /// Title written to the PDF metadata.
    pub title: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            pixels_per_mm: 6.0,
            max_canvas_pixels: 50_000_000,
            jpeg_quality: 85,
            default_page_width: 595.0,
            default_page_height: 842.0,
            placeholder_page: PageSize::new(210.0, 297.0),
            load_system_fonts: true,
            title: "Bogenwerk Export".into(),
        }
    }
}

/// Settings for remote asset fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Deadline for a single fetch, connection included.
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            user_agent: concat!("bogenwerk/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub export: ExportConfig,
    pub resolver: ResolverConfig,
}

impl AppConfig {
    /// Load settings from a JSON file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }
}
