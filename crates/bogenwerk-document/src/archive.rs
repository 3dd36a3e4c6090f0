// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bundle archive — tag-preserving markup plus `images/` and `fonts/` folders
// in one zip file, and the reverse import.

use std::collections::HashSet;
use std::io::{Cursor, Read, Write};

use bogenwerk_core::error::{BogenwerkError, Result};
use bogenwerk_core::types::{Asset, AssetKind};
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::markup::Markup;

/// A document to write into a bundle.
#[derive(Debug, Clone, Copy)]
pub struct BundleDocument<'a> {
    pub name: &'a str,
    pub markup: &'a Markup,
    pub assets: &'a [Asset],
}

/// A written bundle and what went into it.
#[derive(Debug, Clone)]
pub struct ArchiveOutput {
    pub bytes: Vec<u8>,
    /// Entry names of the markup files, in order.
    pub documents: Vec<String>,
    /// Entry names of the asset files, in order.
    pub assets: Vec<String>,
    /// Assets dropped because an earlier one already used the name.
    pub skipped_duplicates: usize,
}

/// Write `documents` and their assets to a zip bundle.
///
/// Assets go to `fonts/` or `images/` by file extension and are deduplicated
/// by name across the whole bundle: the first asset written under a name wins.
#[instrument(skip_all, fields(documents = documents.len()))]
pub fn export_archive(documents: &[BundleDocument<'_>]) -> Result<ArchiveOutput> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used_names: HashSet<String> = HashSet::new();
    let mut written_assets: HashSet<String> = HashSet::new();
    let mut output_documents = Vec::new();
    let mut output_assets = Vec::new();
    let mut skipped_duplicates = 0;

    for document in documents {
        let entry = unique_markup_name(document.name, &mut used_names);
        let text = document.markup.to_markup_string()?;
        zip.start_file(entry.as_str(), options).map_err(archive_error)?;
        zip.write_all(text.as_bytes())?;
        debug!(%entry, "Markup written");
        output_documents.push(entry);

        for asset in document.assets {
            let path = AssetKind::from_filename(&asset.local_name).bundle_path(&asset.local_name);
            if !written_assets.insert(path.clone()) {
                debug!(%path, "Asset already in bundle; skipping");
                skipped_duplicates += 1;
                continue;
            }
            zip.start_file(path.as_str(), options).map_err(archive_error)?;
            zip.write_all(&asset.data)?;
            output_assets.push(path);
        }
    }

    let bytes = zip.finish().map_err(archive_error)?.into_inner();
    info!(
        documents = output_documents.len(),
        assets = output_assets.len(),
        skipped_duplicates,
        bytes = bytes.len(),
        "Archive written"
    );
    Ok(ArchiveOutput {
        bytes,
        documents: output_documents,
        assets: output_assets,
        skipped_duplicates,
    })
}

/// Contents of an imported bundle.
#[derive(Debug, Clone, Default)]
pub struct ImportedArchive {
    pub documents: Vec<(String, Markup)>,
    /// Asset file name and payload from `images/` and `fonts/`.
    pub assets: Vec<(String, Vec<u8>)>,
    /// Markup entries that failed to parse, with the reason.
    pub rejected: Vec<(String, String)>,
}

/// Read a bundle written by [`export_archive`] (or any zip of the same shape).
#[instrument(skip_all, fields(bytes = bytes.len()))]
pub fn import_archive(bytes: &[u8]) -> Result<ImportedArchive> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
    let mut imported = ImportedArchive::default();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(archive_error)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_owned();
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if let Some(asset_name) = asset_file_name(&name) {
            imported.assets.push((asset_name.to_owned(), data));
        } else if name.to_ascii_lowercase().ends_with(".svg") {
            let parsed = String::from_utf8(data)
                .map_err(|err| BogenwerkError::Parse(format!("not UTF-8: {err}")))
                .and_then(|text| Markup::parse(&text));
            match parsed {
                Ok(markup) => imported.documents.push((name, markup)),
                Err(err) => {
                    warn!(entry = %name, %err, "Bundle entry rejected");
                    imported.rejected.push((name, err.to_string()));
                }
            }
        } else {
            debug!(entry = %name, "Ignoring unrelated bundle entry");
        }
    }

    info!(
        documents = imported.documents.len(),
        assets = imported.assets.len(),
        rejected = imported.rejected.len(),
        "Archive imported"
    );
    Ok(imported)
}

/// `<name>` for entries directly inside `images/` or `fonts/`.
fn asset_file_name(entry: &str) -> Option<&str> {
    let name = entry
        .strip_prefix("images/")
        .or_else(|| entry.strip_prefix("fonts/"))?;
    (!name.is_empty() && !name.contains('/')).then_some(name)
}

/// Entry name for a markup file: its base name, suffixed `-2`, `-3`, ... when
/// an earlier document already took it.
fn unique_markup_name(name: &str, used: &mut HashSet<String>) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let base = if base.is_empty() { "page.svg" } else { base };
    if used.insert(base.to_owned()) {
        return base.to_owned();
    }
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (base, String::new()),
    };
    let mut counter = 2;
    loop {
        let candidate = format!("{stem}-{counter}{ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn archive_error(err: zip::result::ZipError) -> BogenwerkError {
    BogenwerkError::Archive(err.to_string())
}
