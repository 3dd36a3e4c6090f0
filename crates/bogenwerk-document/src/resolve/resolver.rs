// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Asset resolver — rewrites a page's external references into bundle paths.
//
// References are discovered in document order (image hrefs, then font
// `url(...)` tokens inside `<style>` as they appear) and resolved strictly one
// at a time, so the dedup map and the progress counter never race:
//
//   1. already resolved in this call   → reuse the assigned name
//   2. file name present in the pool   → adopt the pooled payload
//   3. absolute http(s) address        → fetch, name from URL or sniffed type
//   4. anything else                   → record a resolution error, leave as is
//
// Errors never abort the call; the caller gets a partially rewritten page.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

use bogenwerk_core::config::ResolverConfig;
use bogenwerk_core::error::{BogenwerkError, Result};
use bogenwerk_core::types::{Asset, AssetKind, FONT_EXTENSIONS, ResolutionError, extension};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::css::{font_urls, replace_ranges, strip_query_and_fragment, url_token};
use super::fetch::{FetchedAsset, Fetcher, HttpFetcher, sniff_extension};
use super::pool::AssetPool;
use crate::markup::{ElementPath, Markup, Node};

/// Result of one resolution call.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The page with every successfully resolved reference rewritten.
    pub markup: Markup,
    /// Assets first resolved by this call.
    pub assets: Vec<Asset>,
    pub errors: Vec<ResolutionError>,
}

/// Where a discovered reference lives in the tree.
#[derive(Debug, Clone)]
enum Site {
    Href {
        path: ElementPath,
        attribute: &'static str,
    },
    Css {
        path: ElementPath,
        child: usize,
        range: Range<usize>,
    },
}

#[derive(Debug, Clone)]
struct Reference {
    site: Site,
    original: String,
    kind: AssetKind,
}

enum Outcome {
    Rewrite(String),
    Keep,
    Failed(String),
}

/// Stateless resolution service. Construct one per caller; it holds nothing
/// but the fetch capability.
pub struct AssetResolver {
    fetcher: Arc<dyn Fetcher>,
}

impl AssetResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolver fetching over HTTP(S) with the configured deadline.
    pub fn http(config: &ResolverConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpFetcher::new(config)?)))
    }

    /// Resolve every external reference in `markup`.
    ///
    /// `existing` are assets the document already holds; references to them in
    /// bundle form (`images/<name>`, `fonts/<name>`) are left alone.
    /// `on_progress` receives the floored percentage of processed references
    /// after each one.
    #[instrument(skip_all, fields(existing = existing.len(), pool = pool.len()))]
    pub async fn resolve<P>(
        &self,
        markup: &Markup,
        pool: &AssetPool,
        existing: &[Asset],
        mut on_progress: P,
    ) -> Result<Resolution>
    where
        P: FnMut(u8),
    {
        let references = discover(markup);
        let total = references.len();
        info!(total, "Resolving asset references");

        let mut state = ResolveState::new(existing);
        let mut rewrites: Vec<(Site, String)> = Vec::new();

        for (index, reference) in references.into_iter().enumerate() {
            match self.resolve_one(&reference, pool, &mut state).await {
                Outcome::Rewrite(target) if target != reference.original => {
                    debug!(original = %reference.original, %target, "Reference resolved");
                    rewrites.push((reference.site, target));
                }
                Outcome::Rewrite(_) | Outcome::Keep => {}
                Outcome::Failed(reason) => {
                    warn!(reference = %reference.original, %reason, "Reference unresolved");
                    state.errors.push(ResolutionError {
                        reference: reference.original,
                        reason,
                    });
                }
            }
            on_progress(((index + 1) * 100 / total) as u8);
        }

        let mut rewritten = markup.clone();
        apply_rewrites(&mut rewritten, rewrites)?;

        info!(
            assets = state.assets.len(),
            errors = state.errors.len(),
            "Resolution complete"
        );
        Ok(Resolution {
            markup: rewritten,
            assets: state.assets,
            errors: state.errors,
        })
    }

    async fn resolve_one(
        &self,
        reference: &Reference,
        pool: &AssetPool,
        state: &mut ResolveState<'_>,
    ) -> Outcome {
        let original = reference.original.as_str();
        let kind = reference.kind;

        if let Some(target) = state.dedup.get(original) {
            return Outcome::Rewrite(target.clone());
        }

        if let Some(name) = bundle_relative_name(original, kind) {
            if state.holds(kind, name) {
                return Outcome::Keep;
            }
            return match pool.get(name) {
                Some(data) => {
                    state.record(original, name, Arc::clone(data), kind);
                    Outcome::Keep
                }
                None => Outcome::Failed(format!("{name} is not in the asset pool")),
            };
        }

        let url = network_url(original);
        let candidate = derive_filename(original, url.as_ref());

        if let Some(name) = candidate.as_deref() {
            if let Some(data) = pool.get(name) {
                state.record(original, name, Arc::clone(data), kind);
                return Outcome::Rewrite(kind.bundle_path(name));
            }
        }

        let Some(url) = url else {
            return Outcome::Failed("not in the asset pool and not a network address".into());
        };

        match self.fetcher.fetch(url.as_str()).await {
            Ok(fetched) => {
                let name = state.name_for_fetch(candidate.as_deref(), &fetched, kind);
                state.record(original, &name, fetched.bytes.into(), kind);
                Outcome::Rewrite(kind.bundle_path(&name))
            }
            Err(err) => Outcome::Failed(err.to_string()),
        }
    }
}

/// Per-call bookkeeping: the dedup map and what has been produced so far.
struct ResolveState<'a> {
    existing: &'a [Asset],
    /// Original reference → bundle path.
    dedup: HashMap<String, String>,
    assets: Vec<Asset>,
    errors: Vec<ResolutionError>,
}

impl<'a> ResolveState<'a> {
    fn new(existing: &'a [Asset]) -> Self {
        Self {
            existing,
            dedup: HashMap::new(),
            assets: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn holds(&self, kind: AssetKind, name: &str) -> bool {
        self.existing
            .iter()
            .chain(self.assets.iter())
            .any(|asset| asset.kind == kind && asset.local_name == name)
    }

    /// Map `original` to `name`, adding an asset unless one with that name
    /// is already held.
    fn record(&mut self, original: &str, name: &str, data: Arc<[u8]>, kind: AssetKind) {
        if !self.holds(kind, name) {
            self.assets.push(Asset {
                original_reference: original.to_owned(),
                local_name: name.to_owned(),
                data,
                kind,
            });
        }
        self.dedup.insert(original.to_owned(), kind.bundle_path(name));
    }

    /// Local name for a fetched payload. The URL's file name is used when it
    /// carries a suitable extension and is still free; otherwise a name is
    /// synthesised from the sniffed type plus a random suffix.
    fn name_for_fetch(&self, candidate: Option<&str>, fetched: &FetchedAsset, kind: AssetKind) -> String {
        let candidate_ext = candidate.and_then(extension);
        let reliable = match (&candidate_ext, kind) {
            (Some(ext), AssetKind::Font) => FONT_EXTENSIONS.contains(&ext.as_str()),
            (Some(_), AssetKind::Image) => true,
            (None, _) => false,
        };

        if let Some(name) = candidate.filter(|_| reliable) {
            if !self.holds(kind, name) {
                return name.to_owned();
            }
        }

        let sniffed = sniff_extension(&fetched.bytes, fetched.content_type.as_deref());
        let ext = match (reliable, sniffed) {
            (true, _) => candidate_ext.unwrap_or_default(),
            (false, Some(sniffed)) => sniffed.to_owned(),
            (false, None) => candidate_ext.unwrap_or_else(|| "bin".to_owned()),
        };
        let stem = candidate.map(file_stem).filter(|stem| !stem.is_empty());
        let stem = stem.unwrap_or_else(|| match kind {
            AssetKind::Font => "font".to_owned(),
            AssetKind::Image => "image".to_owned(),
        });
        format!("{stem}-{}.{ext}", short_suffix())
    }
}

fn discover(markup: &Markup) -> Vec<Reference> {
    let mut found = Vec::new();
    markup.root().walk(&mut |path, element| match element.local_name() {
        "image" => {
            if let (Some(attribute), Some(href)) = (element.href_attribute(), element.href()) {
                if !is_skipped(href) {
                    found.push(Reference {
                        site: Site::Href {
                            path: ElementPath::from(path),
                            attribute,
                        },
                        original: href.to_owned(),
                        kind: AssetKind::Image,
                    });
                }
            }
        }
        "style" => {
            for (child, node) in element.children.iter().enumerate() {
                let (Node::Text(css) | Node::CData(css)) = node else {
                    continue;
                };
                for token in font_urls(css) {
                    if is_skipped(&token.url) {
                        continue;
                    }
                    found.push(Reference {
                        site: Site::Css {
                            path: ElementPath::from(path),
                            child,
                            range: token.range,
                        },
                        original: token.url,
                        kind: AssetKind::Font,
                    });
                }
            }
        }
        _ => {}
    });
    found
}

/// Inline data and same-document fragments need no resolution.
fn is_skipped(reference: &str) -> bool {
    let trimmed = reference.trim();
    trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("data:")
}

/// `<name>` when `reference` is already in `images/<name>` / `fonts/<name>` form.
fn bundle_relative_name(reference: &str, kind: AssetKind) -> Option<&str> {
    let name = reference.strip_prefix(kind.folder())?.strip_prefix('/')?;
    (!name.is_empty() && !name.contains('/')).then_some(name)
}

/// Absolute http(s) address of `reference`, if it is one. Protocol-relative
/// references are treated as https.
fn network_url(reference: &str) -> Option<reqwest::Url> {
    let trimmed = reference.trim();
    let absolute: Cow<'_, str> = if trimmed.starts_with("//") {
        Cow::Owned(format!("https:{trimmed}"))
    } else {
        Cow::Borrowed(trimmed)
    };
    let url = reqwest::Url::parse(&absolute).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Last path segment of the reference, query string and fragment removed and
/// percent-escapes decoded.
fn derive_filename(reference: &str, url: Option<&reqwest::Url>) -> Option<String> {
    let segment = match url {
        Some(url) => url.path_segments()?.next_back()?,
        None => strip_query_and_fragment(reference.trim()).rsplit('/').next()?,
    };
    let name = urlencoding::decode(segment).ok()?.into_owned();
    (!name.is_empty() && !name.contains(['/', '\\'])).then_some(name)
}

fn file_stem(name: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    stem.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

fn short_suffix() -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    suffix
}

fn apply_rewrites(markup: &mut Markup, rewrites: Vec<(Site, String)>) -> Result<()> {
    let mut css_edits: BTreeMap<(ElementPath, usize), Vec<(Range<usize>, String)>> =
        BTreeMap::new();

    for (site, target) in rewrites {
        match site {
            Site::Href { path, attribute } => {
                let element = markup
                    .element_mut(&path)
                    .ok_or_else(|| BogenwerkError::InvalidElementPath(path.to_string()))?;
                element.set_attr(attribute, target);
            }
            Site::Css { path, child, range } => {
                css_edits
                    .entry((path, child))
                    .or_default()
                    .push((range, url_token(&target)));
            }
        }
    }

    for ((path, child), edits) in css_edits {
        let element = markup
            .element_mut(&path)
            .ok_or_else(|| BogenwerkError::InvalidElementPath(path.to_string()))?;
        if let Some(Node::Text(css) | Node::CData(css)) = element.children.get_mut(child) {
            *css = replace_ranges(css, &edits);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory fetcher recording every requested URL.
    #[derive(Default)]
    struct StubFetcher {
        responses: HashMap<String, FetchedAsset>,
        requests: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn with(mut self, url: &str, bytes: &[u8], content_type: Option<&str>) -> Self {
            self.responses.insert(
                url.to_owned(),
                FetchedAsset {
                    bytes: bytes.to_vec(),
                    content_type: content_type.map(str::to_owned),
                },
            );
            self
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
            self.requests.lock().unwrap().push(url.to_owned());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| BogenwerkError::Fetch(format!("{url} returned 404 Not Found")))
        }
    }

    fn resolver(fetcher: StubFetcher) -> (AssetResolver, Arc<StubFetcher>) {
        let fetcher = Arc::new(fetcher);
        (AssetResolver::new(fetcher.clone()), fetcher)
    }

    fn hrefs(markup: &Markup) -> Vec<String> {
        let mut out = Vec::new();
        markup.root().walk(&mut |_, element| {
            if let Some(href) = element.href() {
                out.push(href.to_owned());
            }
        });
        out
    }

    #[tokio::test]
    async fn remote_image_is_fetched_and_rewritten() {
        let markup = Markup::parse(r#"<svg><image href="https://ex.com/a.jpg"/></svg>"#).unwrap();
        let (resolver, _) =
            resolver(StubFetcher::default().with("https://ex.com/a.jpg", b"\xFF\xD8\xFFjpeg", None));

        let result = resolver
            .resolve(&markup, &AssetPool::new(), &[], |_| {})
            .await
            .unwrap();

        assert!(result.errors.is_empty());
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].local_name, "a.jpg");
        assert_eq!(result.assets[0].original_reference, "https://ex.com/a.jpg");
        assert_eq!(result.assets[0].kind, AssetKind::Image);
        assert_eq!(hrefs(&result.markup), ["images/a.jpg"]);
    }

    #[tokio::test]
    async fn repeated_reference_is_fetched_once() {
        let markup = Markup::parse(
            r#"<svg>
                <image href="https://ex.com/a.jpg"/>
                <g><image xlink:href="https://ex.com/a.jpg"/></g>
                <image href="https://ex.com/a.jpg"/>
            </svg>"#,
        )
        .unwrap();
        let (resolver, fetcher) =
            resolver(StubFetcher::default().with("https://ex.com/a.jpg", b"jpeg", Some("image/jpeg")));

        let result = resolver
            .resolve(&markup, &AssetPool::new(), &[], |_| {})
            .await
            .unwrap();

        assert_eq!(fetcher.request_count(), 1);
        assert_eq!(result.assets.len(), 1);
        assert_eq!(hrefs(&result.markup), ["images/a.jpg"; 3]);
    }

    #[tokio::test]
    async fn pooled_file_is_adopted_without_fetching() {
        let markup = Markup::parse(
            r#"<svg><image href="https://cdn.test/x/shared.png?v=2"/><image href="../art/shared.png"/></svg>"#,
        )
        .unwrap();
        let mut pool = AssetPool::new();
        pool.insert("shared.png", vec![7u8; 4]);
        let (resolver, fetcher) = resolver(StubFetcher::default());

        let result = resolver.resolve(&markup, &pool, &[], |_| {}).await.unwrap();

        assert_eq!(fetcher.request_count(), 0);
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].data.as_ref(), &[7u8; 4]);
        assert_eq!(hrefs(&result.markup), ["images/shared.png", "images/shared.png"]);
    }

    #[tokio::test]
    async fn escaped_names_match_pooled_files() {
        let markup = Markup::parse(
            r#"<svg><image href="https://ex.com/art/my photo.png"/><image href="../art/my%20photo.png"/></svg>"#,
        )
        .unwrap();
        let mut pool = AssetPool::new();
        pool.insert("my photo.png", vec![5u8; 3]);
        let (resolver, fetcher) = resolver(StubFetcher::default());

        let result = resolver.resolve(&markup, &pool, &[], |_| {}).await.unwrap();

        assert_eq!(fetcher.request_count(), 0);
        assert!(result.errors.is_empty());
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].local_name, "my photo.png");
        assert_eq!(hrefs(&result.markup), ["images/my photo.png", "images/my photo.png"]);
    }

    #[tokio::test]
    async fn unresolvable_references_are_reported_and_left_untouched() {
        let markup = Markup::parse(
            r#"<svg><image href="missing.png"/><image href="https://ex.com/gone.png"/><image href="https://ex.com/ok.png"/></svg>"#,
        )
        .unwrap();
        let (resolver, _) =
            resolver(StubFetcher::default().with("https://ex.com/ok.png", b"png", Some("image/png")));

        let result = resolver
            .resolve(&markup, &AssetPool::new(), &[], |_| {})
            .await
            .unwrap();

        let failed: Vec<&str> = result.errors.iter().map(|e| e.reference.as_str()).collect();
        assert_eq!(failed, ["missing.png", "https://ex.com/gone.png"]);
        assert!(result.errors[1].reason.contains("404"));
        assert_eq!(
            hrefs(&result.markup),
            ["missing.png", "https://ex.com/gone.png", "images/ok.png"]
        );
    }

    #[tokio::test]
    async fn inline_and_fragment_references_are_skipped() {
        let markup = Markup::parse(
            r##"<svg><image href="data:image/png;base64,AAAA"/><image href="#sprite"/></svg>"##,
        )
        .unwrap();
        let (resolver, fetcher) = resolver(StubFetcher::default());
        let mut calls = 0;

        let result = resolver
            .resolve(&markup, &AssetPool::new(), &[], |_| calls += 1)
            .await
            .unwrap();

        assert_eq!(calls, 0);
        assert_eq!(fetcher.request_count(), 0);
        assert!(result.errors.is_empty());
        assert!(result.assets.is_empty());
        assert_eq!(result.markup, markup);
    }

    #[tokio::test]
    async fn resolving_a_resolved_page_changes_nothing() {
        let markup = Markup::parse(
            r#"<svg><style>@font-face { src: url('https://f.test/s/inter.woff2'); }</style><image href="https://ex.com/a.jpg"/></svg>"#,
        )
        .unwrap();
        let (resolver, _) = resolver(
            StubFetcher::default()
                .with("https://ex.com/a.jpg", b"jpeg", None)
                .with("https://f.test/s/inter.woff2", b"wOF2", None),
        );
        let first = resolver
            .resolve(&markup, &AssetPool::new(), &[], |_| {})
            .await
            .unwrap();
        let before = first.markup.to_markup_string().unwrap();

        let second = resolver
            .resolve(&first.markup, &AssetPool::new(), &first.assets, |_| {})
            .await
            .unwrap();

        assert!(second.assets.is_empty());
        assert!(second.errors.is_empty());
        assert_eq!(second.markup.to_markup_string().unwrap(), before);
    }

    #[tokio::test]
    async fn bundle_paths_pick_up_pooled_files() {
        let markup = Markup::parse(r#"<svg><image href="images/logo.png"/></svg>"#).unwrap();
        let mut pool = AssetPool::new();
        pool.insert("logo.png", vec![1u8]);
        let (resolver, _) = resolver(StubFetcher::default());

        let result = resolver.resolve(&markup, &pool, &[], |_| {}).await.unwrap();

        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].local_name, "logo.png");
        assert_eq!(result.markup, markup);
    }

    #[tokio::test]
    async fn font_urls_in_stylesheets_are_rewritten() {
        let markup = Markup::parse(
            r#"<svg><style><![CDATA[
@font-face { font-family: Inter; src: url("https://f.test/s/inter.woff2") format("woff2"); }
.x { background: url(bg.png); }
]]></style></svg>"#,
        )
        .unwrap();
        let (resolver, _) =
            resolver(StubFetcher::default().with("https://f.test/s/inter.woff2", b"wOF2", None));

        let result = resolver
            .resolve(&markup, &AssetPool::new(), &[], |_| {})
            .await
            .unwrap();

        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].kind, AssetKind::Font);
        let css = result.markup.root().child_elements().next().unwrap().text_content();
        assert!(css.contains(r#"src: url(fonts/inter.woff2) format("woff2")"#));
        assert!(css.contains("url(bg.png)"));
    }

    #[tokio::test]
    async fn clashing_file_names_get_distinct_local_names() {
        let markup = Markup::parse(
            r#"<svg><style>
@font-face { src: url(https://a.test/font.woff2); }
@font-face { src: url(https://b.test/font.woff2); }
</style></svg>"#,
        )
        .unwrap();
        let (resolver, _) = resolver(
            StubFetcher::default()
                .with("https://a.test/font.woff2", b"wOF2a", None)
                .with("https://b.test/font.woff2", b"wOF2b", None),
        );

        let result = resolver
            .resolve(&markup, &AssetPool::new(), &[], |_| {})
            .await
            .unwrap();

        assert_eq!(result.assets.len(), 2);
        assert_eq!(result.assets[0].local_name, "font.woff2");
        let second = &result.assets[1].local_name;
        assert!(second.starts_with("font-") && second.ends_with(".woff2"), "{second}");
        assert_ne!(second, "font.woff2");
    }

    #[tokio::test]
    async fn extensionless_download_is_named_from_its_content() {
        let markup = Markup::parse(r#"<svg><image href="//img.test/avatar"/></svg>"#).unwrap();
        let (resolver, fetcher) = resolver(StubFetcher::default().with(
            "https://img.test/avatar",
            &[0x89, b'P', b'N', b'G', 0x0D, 0x0A],
            None,
        ));

        let result = resolver
            .resolve(&markup, &AssetPool::new(), &[], |_| {})
            .await
            .unwrap();

        assert_eq!(fetcher.request_count(), 1);
        let name = &result.assets[0].local_name;
        assert!(name.starts_with("avatar-") && name.ends_with(".png"), "{name}");
        assert_eq!(hrefs(&result.markup), [format!("images/{name}")]);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_finishes_at_100() {
        let markup = Markup::parse(
            r#"<svg><image href="a.png"/><image href="b.png"/><image href="c.png"/></svg>"#,
        )
        .unwrap();
        let (resolver, _) = resolver(StubFetcher::default());
        let mut seen = Vec::new();

        resolver
            .resolve(&markup, &AssetPool::new(), &[], |pct| seen.push(pct))
            .await
            .unwrap();

        assert_eq!(seen, [33, 66, 100]);
    }

    #[test]
    fn derived_names_drop_query_and_fragment() {
        assert_eq!(derive_filename("../img/a.png?x=1#y", None).as_deref(), Some("a.png"));
        let url = network_url("https://ex.com/p/b.jpg?size=2").unwrap();
        assert_eq!(derive_filename("", Some(&url)).as_deref(), Some("b.jpg"));
        let bare = network_url("https://ex.com/").unwrap();
        assert_eq!(derive_filename("", Some(&bare)), None);
        assert!(network_url("ftp://ex.com/a.png").is_none());
        assert!(network_url("relative/a.png").is_none());
    }

    #[test]
    fn derived_names_are_percent_decoded() {
        let url = network_url("https://ex.com/art/my photo.png").unwrap();
        assert_eq!(derive_filename("", Some(&url)).as_deref(), Some("my photo.png"));
        assert_eq!(derive_filename("fonts/Caf%C3%A9.woff2", None).as_deref(), Some("Café.woff2"));
        let smuggled = network_url("https://ex.com/a%2Fb.png").unwrap();
        assert_eq!(derive_filename("", Some(&smuggled)), None);
    }
}
