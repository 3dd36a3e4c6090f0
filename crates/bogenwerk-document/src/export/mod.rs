// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paginated export — redacted, raster-backed pages assembled into one PDF.

pub mod cover;
pub mod embed;
pub mod layout;
pub mod pdf;
pub mod raster;

use bogenwerk_core::types::Asset;

use crate::markup::Markup;

pub use pdf::{ExportOutcome, PageReport, PageStage, PdfExporter};
pub use raster::Rasterizer;

/// One input page: its markup and the assets its bundle paths point at.
#[derive(Debug, Clone, Copy)]
pub struct ExportPage<'a> {
    pub name: &'a str,
    pub markup: &'a Markup,
    pub assets: &'a [Asset],
}
