// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inline bundled assets as base64 data URIs so a page renders on its own.

use std::collections::HashMap;
use std::ops::Range;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bogenwerk_core::types::{Asset, AssetKind, extension};

use crate::markup::{Element, Markup, Node};
use crate::resolve::css::{font_urls, replace_ranges, url_token};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// How many references were inlined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedCounts {
    pub images: usize,
    pub fonts: usize,
}

/// Replace every bundle-path reference in `markup` with an inline payload.
pub fn embed_assets(markup: &mut Markup, assets: &[Asset]) -> EmbedCounts {
    let by_path: HashMap<String, &Asset> = assets
        .iter()
        .map(|asset| (asset.bundle_path(), asset))
        .collect();
    let mut counts = EmbedCounts::default();

    markup.root_mut().walk_mut(&mut |_, element| match element.local_name() {
        "image" => {
            let Some(attribute) = element.href_attribute() else {
                return;
            };
            let target = element.href().and_then(|href| by_path.get(href.trim()));
            if let Some(asset) = target.filter(|asset| asset.kind == AssetKind::Image) {
                element.set_attr(attribute, data_uri(asset));
                counts.images += 1;
            }
        }
        "style" => counts.fonts += embed_fonts(element, &by_path),
        _ => {}
    });

    declare_namespaces(markup.root_mut());
    counts
}

fn embed_fonts(style: &mut Element, by_path: &HashMap<String, &Asset>) -> usize {
    let mut embedded = 0;
    for child in &mut style.children {
        let (Node::Text(css) | Node::CData(css)) = child else {
            continue;
        };
        let edits: Vec<(Range<usize>, String)> = font_urls(css)
            .into_iter()
            .filter_map(|token| {
                let asset = by_path.get(token.url.as_str())?;
                Some((token.range, url_token(&data_uri(asset))))
            })
            .collect();
        if !edits.is_empty() {
            embedded += edits.len();
            *css = replace_ranges(css, &edits);
        }
    }
    embedded
}

/// `data:<mime>;base64,<payload>` for an asset.
pub fn data_uri(asset: &Asset) -> String {
    let mime = match asset.kind {
        AssetKind::Font => font_mime(&asset.local_name).to_owned(),
        AssetKind::Image => mime_guess::from_path(&asset.local_name)
            .first_or_octet_stream()
            .essence_str()
            .to_owned(),
    };
    format!("data:{mime};base64,{}", STANDARD.encode(&asset.data))
}

/// MIME type for a font file, by extension.
pub fn font_mime(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("woff2") => "font/woff2",
        Some("woff") => "font/woff",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

/// The renderer resolves names by namespace; hand-written pages often omit
/// the declarations.
fn declare_namespaces(root: &mut Element) {
    if root.attr("xmlns").is_none() && !root.name.contains(':') {
        root.set_attr("xmlns", SVG_NAMESPACE);
    }
    if root.attr("xmlns:xlink").is_none() {
        let mut uses_xlink = false;
        root.walk(&mut |_, element| {
            uses_xlink |= element
                .attributes
                .iter()
                .any(|attr| attr.name.starts_with("xlink:"));
        });
        if uses_xlink {
            root.set_attr("xmlns:xlink", XLINK_NAMESPACE);
        }
    }
}
