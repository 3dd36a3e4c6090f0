// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bogenwerk-document — The SVG page pipeline.
//
// Provides the markup tree with tag annotations, asset resolution into a
// self-contained bundle, tag-driven redaction, paginated PDF export, and the
// zip bundle format, tied together by `DocumentCollection`.

pub mod archive;
pub mod collection;
pub mod export;
pub mod markup;
pub mod redact;
pub mod resolve;

// Re-export the primary types so callers can use `bogenwerk_document::Markup` etc.
pub use archive::{ArchiveOutput, BundleDocument, ImportedArchive, export_archive, import_archive};
pub use collection::{BulkApply, Document, DocumentCollection};
pub use export::{ExportOutcome, ExportPage, PageReport, PageStage, PdfExporter, Rasterizer};
pub use markup::{ElementKind, ElementPath, Markup, TagSet, TaggedElement};
pub use redact::{RedactionSummary, Redactor};
pub use resolve::{AssetPool, AssetResolver, FetchedAsset, Fetcher, HttpFetcher, Resolution};
