// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `url(...)` tokens in embedded stylesheet text.

use std::ops::Range;
use std::sync::LazyLock;

use bogenwerk_core::types::{FONT_EXTENSIONS, extension};
use regex::Regex;

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^'"\s)]+))\s*\)"#).expect("valid css url regex")
});

/// One `url(...)` token: its byte range in the stylesheet and the unquoted URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssUrl {
    pub range: Range<usize>,
    pub url: String,
}

/// Every `url(...)` token in `css` that names a font file by extension.
pub fn font_urls(css: &str) -> Vec<CssUrl> {
    CSS_URL_RE
        .captures_iter(css)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let url = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))?
                .as_str()
                .trim();
            is_font_url(url).then(|| CssUrl {
                range: whole.range(),
                url: url.to_owned(),
            })
        })
        .collect()
}

/// Whether the path part of `url` ends in a font extension.
pub fn is_font_url(url: &str) -> bool {
    let path = strip_query_and_fragment(url);
    extension(path).is_some_and(|ext| FONT_EXTENSIONS.contains(&ext.as_str()))
}

/// `url` up to its first `?` or `#`.
pub fn strip_query_and_fragment(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Format a `url(...)` token, quoting the target when it needs it.
pub fn url_token(target: &str) -> String {
    if target.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '\'' | '"')) {
        format!("url(\"{}\")", target.replace('"', "%22"))
    } else {
        format!("url({target})")
    }
}

/// Replace byte ranges of `css`. Ranges must not overlap.
pub fn replace_ranges(css: &str, replacements: &[(Range<usize>, String)]) -> String {
    let mut ordered: Vec<&(Range<usize>, String)> = replacements.iter().collect();
    ordered.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for (range, replacement) in ordered {
        out.push_str(&css[cursor..range.start]);
        out.push_str(replacement);
        cursor = range.end;
    }
    out.push_str(&css[cursor..]);
    out
}
