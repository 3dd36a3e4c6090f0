// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bogenwerk.

use thiserror::Error;

use crate::types::DocumentId;

/// Top-level error type for all Bogenwerk operations.
///
/// Per-reference resolution failures and per-page render failures are not
/// represented here: they are collected as data (`ResolutionError`, placeholder
/// pages) and never abort the surrounding operation.
#[derive(Debug, Error)]
pub enum BogenwerkError {
    // -- Markup errors --
    #[error("markup parse failed: {0}")]
    Parse(String),

    #[error("markup serialization failed: {0}")]
    Markup(String),

    #[error("no element at path {0}")]
    InvalidElementPath(String),

    // -- Collection errors --
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),

    // -- Resolution errors --
    #[error("fetch failed: {0}")]
    Fetch(String),

    // -- Export errors --
    #[error("rasterization failed: {0}")]
    Render(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("archive operation failed: {0}")]
    Archive(String),

    #[error("no page could be rendered")]
    NoPagesRendered,

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BogenwerkError>;
