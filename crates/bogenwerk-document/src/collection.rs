// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document collection — the ordered page list together with the shared asset
// pool and tag registry.

use bogenwerk_core::error::{BogenwerkError, Result};
use bogenwerk_core::tags::TagRegistry;
use bogenwerk_core::types::{Asset, DocumentId, DocumentStatus, ResolutionError};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::archive::{self, ArchiveOutput, BundleDocument};
use crate::export::{ExportOutcome, ExportPage, PdfExporter};
use crate::markup::tags::normalize_tags;
use crate::markup::{ElementKind, ElementPath, Markup, TagSet};
use crate::redact::Redactor;
use crate::resolve::{AssetPool, AssetResolver};

/// A page in the collection.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    /// Source file name.
    pub name: String,
    pub markup: Markup,
    pub status: DocumentStatus,
    /// Resolution progress, 0-100.
    pub progress: u8,
    /// Problems from the latest resolution run.
    pub errors: Vec<ResolutionError>,
    pub assets: Vec<Asset>,
}

impl Document {
    fn new(name: impl Into<String>, markup: Markup) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            markup,
            status: DocumentStatus::Unresolved,
            progress: 0,
            errors: Vec::new(),
            assets: Vec::new(),
        }
    }
}

/// Result of a collection-wide bulk tag operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkApply {
    /// Nothing was changed; the caller must confirm the scope first.
    NeedsConfirmation { documents: usize, elements: usize },
    Applied { documents: usize, elements: usize },
}

#[derive(Debug, Default)]
pub struct DocumentCollection {
    documents: Vec<Document>,
    pool: AssetPool,
    tags: TagRegistry,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Intake and ordering ------------------------------------------------

    /// Parse and append a document. Malformed markup is rejected and nothing
    /// is added.
    pub fn add(&mut self, name: impl Into<String>, text: &str) -> Result<DocumentId> {
        let name = name.into();
        let markup = Markup::parse(text).map_err(|err| {
            warn!(%name, %err, "Document rejected at intake");
            err
        })?;
        Ok(self.add_parsed(name, markup))
    }

    /// Append an already-parsed document.
    pub fn add_parsed(&mut self, name: impl Into<String>, markup: Markup) -> DocumentId {
        self.tags.register_all(&markup.all_tags());
        let document = Document::new(name, markup);
        let id = document.id;
        info!(%id, name = %document.name, "Document added");
        self.documents.push(document);
        id
    }

    pub fn remove(&mut self, id: DocumentId) -> Result<Document> {
        let index = self.index_of(id)?;
        Ok(self.documents.remove(index))
    }

    /// Move a document to `index` (clamped to the end of the list).
    pub fn move_to(&mut self, id: DocumentId, index: usize) -> Result<()> {
        let from = self.index_of(id)?;
        let document = self.documents.remove(from);
        let to = index.min(self.documents.len());
        self.documents.insert(to, document);
        Ok(())
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn pool(&self) -> &AssetPool {
        &self.pool
    }

    /// Offer a binary to the asset pool. The first payload under a name wins.
    pub fn add_asset(&mut self, name: impl Into<String>, data: Vec<u8>) -> bool {
        self.pool.insert(name, data)
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn register_tag(&mut self, name: &str) -> bool {
        self.tags.register(name)
    }

    // -- Tagging --------------------------------------------------------------

    pub fn toggle_tags(&mut self, id: DocumentId, path: &ElementPath, active: &TagSet) -> Result<TagSet> {
        let active = normalize_tags(active);
        let tags = self.document_mut(id)?.markup.toggle_tags(path, &active)?;
        self.tags.register_all(&active);
        Ok(tags)
    }

    /// Add `tags` to every element of `kind` in one document.
    pub fn apply_tags(&mut self, id: DocumentId, kind: ElementKind, tags: &TagSet) -> Result<usize> {
        let tags = normalize_tags(tags);
        let applied = self.document_mut(id)?.markup.apply_tags(kind, &tags);
        self.tags.register_all(&tags);
        Ok(applied)
    }

    /// Add `tags` to every element of `kind` in every document. Without
    /// `confirmed` nothing changes and the affected scope is reported back.
    pub fn apply_tags_everywhere(&mut self, kind: ElementKind, tags: &TagSet, confirmed: bool) -> BulkApply {
        if !confirmed {
            let counts: Vec<usize> = self
                .documents
                .iter()
                .map(|doc| doc.markup.count_kind(kind))
                .collect();
            return BulkApply::NeedsConfirmation {
                documents: counts.iter().filter(|&&n| n > 0).count(),
                elements: counts.iter().sum(),
            };
        }

        self.tags.register_all(&normalize_tags(tags));
        let mut documents = 0;
        let mut elements = 0;
        for document in &mut self.documents {
            let applied = document.markup.apply_tags(kind, tags);
            if applied > 0 {
                documents += 1;
                elements += applied;
            }
        }
        info!(?kind, documents, elements, "Tags applied across collection");
        BulkApply::Applied {
            documents,
            elements,
        }
    }

    pub fn clear_tags(&mut self, id: DocumentId) -> Result<usize> {
        Ok(self.document_mut(id)?.markup.clear_tags())
    }

    // -- Resolution -----------------------------------------------------------

    /// Resolve one document's references against the pool.
    ///
    /// The document is `Resolving` while the call runs and ends `Resolved`
    /// (progress 100) or `Failed`. Every update is written to the document's
    /// `progress` before `on_progress` sees it.
    #[instrument(skip(self, resolver, on_progress))]
    pub async fn resolve<P>(&mut self, id: DocumentId, resolver: &AssetResolver, mut on_progress: P) -> Result<&Document>
    where
        P: FnMut(DocumentId, u8),
    {
        let index = self.index_of(id)?;
        let pool = &self.pool;
        let document = &mut self.documents[index];
        document.status = DocumentStatus::Resolving;
        document.progress = 0;

        let progress = &mut document.progress;
        let outcome = resolver
            .resolve(&document.markup, pool, &document.assets, |pct| {
                *progress = pct;
                on_progress(id, pct);
            })
            .await;

        match outcome {
            Ok(resolution) => {
                document.markup = resolution.markup;
                document.assets.extend(resolution.assets);
                document.errors = resolution.errors;
                document.status = DocumentStatus::Resolved;
                document.progress = 100;
                info!(%id, errors = document.errors.len(), "Document resolved");
                Ok(document)
            }
            Err(err) => {
                warn!(%id, %err, "Document resolution failed");
                document.status = DocumentStatus::Failed;
                Err(err)
            }
        }
    }

    /// Resolve every document in order. Returns the number that failed.
    pub async fn resolve_all<P>(&mut self, resolver: &AssetResolver, mut on_progress: P) -> usize
    where
        P: FnMut(DocumentId, u8),
    {
        let ids: Vec<DocumentId> = self.documents.iter().map(|doc| doc.id).collect();
        let mut failed = 0;
        for id in ids {
            if self.resolve(id, resolver, &mut on_progress).await.is_err() {
                failed += 1;
            }
        }
        failed
    }

    // -- Output ---------------------------------------------------------------

    /// Documents that may be written out (not mid-resolution, not failed).
    pub fn exportable(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|doc| doc.status.is_exportable())
    }

    /// Zip bundle of every exportable document with its assets, tags intact.
    pub fn export_archive(&self) -> Result<ArchiveOutput> {
        let bundle: Vec<BundleDocument<'_>> = self
            .exportable()
            .map(|doc| BundleDocument {
                name: &doc.name,
                markup: &doc.markup,
                assets: &doc.assets,
            })
            .collect();
        archive::export_archive(&bundle)
    }

    /// Load a bundle: its markup files become documents, its asset folders
    /// feed the pool. Returns the ids of the added documents.
    pub fn import_archive(&mut self, bytes: &[u8]) -> Result<Vec<DocumentId>> {
        let imported = archive::import_archive(bytes)?;
        for (name, data) in imported.assets {
            self.pool.insert(name, data);
        }
        for (name, reason) in &imported.rejected {
            warn!(%name, %reason, "Bundle document skipped");
        }
        Ok(imported
            .documents
            .into_iter()
            .map(|(name, markup)| self.add_parsed(name, markup))
            .collect())
    }

    /// Single PDF of every exportable document with redactions baked in.
    pub fn export_pdf(&self, exporter: &PdfExporter) -> Result<ExportOutcome> {
        let pages: Vec<ExportPage<'_>> = self
            .exportable()
            .map(|doc| ExportPage {
                name: &doc.name,
                markup: &doc.markup,
                assets: &doc.assets,
            })
            .collect();
        exporter.export(&pages)
    }

    /// Serialized markup of one document with redactions applied.
    pub fn redacted_markup(&self, id: DocumentId) -> Result<String> {
        let document = self.get(id).ok_or(BogenwerkError::DocumentNotFound(id))?;
        Redactor::new().redact(&document.markup).to_markup_string()
    }

    fn index_of(&self, id: DocumentId) -> Result<usize> {
        self.documents
            .iter()
            .position(|doc| doc.id == id)
            .ok_or(BogenwerkError::DocumentNotFound(id))
    }

    fn document_mut(&mut self, id: DocumentId) -> Result<&mut Document> {
        self.documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or(BogenwerkError::DocumentNotFound(id))
    }
}
