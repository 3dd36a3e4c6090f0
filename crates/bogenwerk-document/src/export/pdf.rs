// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paginated PDF export using `printpdf` 0.8.
//
// Every input page runs through the same stages on a private copy:
//
//   redact → embed → measure → layout → rasterize → append
//
// A failure at any stage turns that page into a labelled placeholder and the
// export moves on. After the first page renders, a blank inside-cover page
// sized like the second page is inserted when more than one page is exported.

use std::fmt;

use bogenwerk_core::config::ExportConfig;
use bogenwerk_core::error::{BogenwerkError, Result};
use bogenwerk_core::types::{AssetKind, Orientation, PageSize};
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::ExportPage;
use super::cover::cover_fill;
use super::embed::embed_assets;
use super::layout::{layout, measure, pin_intrinsic_size};
use super::raster::Rasterizer;
use crate::redact::Redactor;

/// Per-page pipeline stage, reported when a page fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStage {
    Redact,
    Embed,
    Measure,
    Layout,
    Rasterize,
    Append,
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Redact => "redact",
            Self::Embed => "embed",
            Self::Measure => "measure",
            Self::Layout => "layout",
            Self::Rasterize => "rasterize",
            Self::Append => "append",
        };
        f.write_str(name)
    }
}

/// What ended up on one output page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageReport {
    Rendered {
        name: String,
        size: PageSize,
        orientation: Orientation,
    },
    InsideCover {
        size: PageSize,
        orientation: Orientation,
        /// `None` when the page was left unfilled.
        fill: Option<[u8; 3]>,
    },
    Placeholder {
        name: String,
        stage: PageStage,
        reason: String,
    },
}

/// A finished export: the PDF and one report per output page.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub pdf: Vec<u8>,
    pub pages: Vec<PageReport>,
}

impl ExportOutcome {
    pub fn rendered_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| matches!(page, PageReport::Rendered { .. }))
            .count()
    }

    pub fn placeholder_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| matches!(page, PageReport::Placeholder { .. }))
            .count()
    }
}

#[derive(Debug)]
struct PageFailure {
    stage: PageStage,
    reason: String,
}

impl PageFailure {
    fn at(stage: PageStage) -> impl FnOnce(BogenwerkError) -> Self {
        move |err| Self {
            stage,
            reason: err.to_string(),
        }
    }
}

/// Builds one PDF out of an ordered list of pages.
pub struct PdfExporter {
    config: ExportConfig,
    rasterizer: Rasterizer,
    redactor: Redactor,
}

impl PdfExporter {
    pub fn new(config: ExportConfig) -> Self {
        let rasterizer = Rasterizer::new(&config);
        Self {
            config,
            rasterizer,
            redactor: Redactor::new(),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export `pages` in order. Fails only when no page renders or the PDF
    /// itself cannot be assembled.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn export(&self, pages: &[ExportPage<'_>]) -> Result<ExportOutcome> {
        info!(title = %self.config.title, "Starting paginated export");

        let mut doc = PdfDocument::new(&self.config.title);
        let mut pdf_pages: Vec<PdfPage> = Vec::new();
        let mut reports: Vec<PageReport> = Vec::new();
        let mut rendered = 0usize;

        for (index, page) in pages.iter().enumerate() {
            match self.render_page(&mut doc, page) {
                Ok((pdf_page, size)) => {
                    pdf_pages.push(pdf_page);
                    reports.push(PageReport::Rendered {
                        name: page.name.to_owned(),
                        size,
                        orientation: size.orientation(),
                    });
                    rendered += 1;
                    debug!(index, name = page.name, ?size, "Page appended");

                    if index == 0 {
                        if let Some(next) = pages.get(1) {
                            let (cover, report) = self.inside_cover(&mut doc, next);
                            pdf_pages.push(cover);
                            reports.push(report);
                        }
                    }
                }
                Err(failure) => {
                    warn!(
                        index,
                        name = page.name,
                        stage = %failure.stage,
                        reason = %failure.reason,
                        "Page failed; emitting placeholder"
                    );
                    pdf_pages.push(self.placeholder(page.name, &failure));
                    reports.push(PageReport::Placeholder {
                        name: page.name.to_owned(),
                        stage: failure.stage,
                        reason: failure.reason,
                    });
                }
            }
        }

        if rendered == 0 {
            return Err(BogenwerkError::NoPagesRendered);
        }

        doc.with_pages(pdf_pages);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let pdf = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if pdf.is_empty() {
            return Err(BogenwerkError::PdfError("PDF serialization produced no output".into()));
        }

        info!(
            rendered,
            total = reports.len(),
            bytes = pdf.len(),
            warnings = warnings.len(),
            "Export complete"
        );
        Ok(ExportOutcome {
            pdf,
            pages: reports,
        })
    }

    fn render_page(
        &self,
        doc: &mut PdfDocument,
        page: &ExportPage<'_>,
    ) -> std::result::Result<(PdfPage, PageSize), PageFailure> {
        let (jpeg, size) = self.rasterize_page(page)?;
        let ops = self
            .place_background(doc, &jpeg, size)
            .map_err(PageFailure::at(PageStage::Append))?;
        Ok((PdfPage::new(Mm(size.width_mm), Mm(size.height_mm), ops), size))
    }

    /// Redact, embed, measure, lay out and rasterize a private copy of `page`.
    fn rasterize_page(
        &self,
        page: &ExportPage<'_>,
    ) -> std::result::Result<(Vec<u8>, PageSize), PageFailure> {
        let mut working = self.redactor.redact(page.markup);
        embed_assets(&mut working, page.assets);

        let intrinsic = measure(working.root(), &self.config);
        if intrinsic.fallback {
            debug!(name = page.name, "No usable dimensions; using default page size");
        }
        let size = layout(intrinsic, &self.config);
        if !(size.height_mm.is_finite() && size.height_mm > 0.0) {
            return Err(PageFailure {
                stage: PageStage::Layout,
                reason: format!("invalid page height {}", size.height_mm),
            });
        }

        pin_intrinsic_size(working.root_mut(), intrinsic);
        let svg = working
            .to_markup_string()
            .map_err(PageFailure::at(PageStage::Embed))?;

        let fonts: Vec<&[u8]> = page
            .assets
            .iter()
            .filter(|asset| asset.kind == AssetKind::Font)
            .map(|asset| asset.data.as_ref())
            .collect();
        let jpeg = self
            .rasterizer
            .rasterize(&svg, &fonts, size)
            .map_err(PageFailure::at(PageStage::Rasterize))?;
        Ok((jpeg, size))
    }

    /// Blank page sized like `next`, flooded with its background colour.
    fn inside_cover(&self, doc: &mut PdfDocument, next: &ExportPage<'_>) -> (PdfPage, PageReport) {
        let size = layout(measure(next.markup.root(), &self.config), &self.config);
        let mut fill = cover_fill(next.markup.root());

        let mut ops = Vec::new();
        if let Some(rgb) = fill {
            match self
                .rasterizer
                .solid(rgb, size)
                .and_then(|jpeg| self.place_background(doc, &jpeg, size))
            {
                Ok(background) => ops = background,
                Err(err) => {
                    warn!(%err, "Inside-cover fill failed; leaving page blank");
                    fill = None;
                }
            }
        }

        info!(?size, ?fill, "Inside-cover page inserted");
        let page = PdfPage::new(Mm(size.width_mm), Mm(size.height_mm), ops);
        let report = PageReport::InsideCover {
            size,
            orientation: size.orientation(),
            fill,
        };
        (page, report)
    }

    /// Decode `jpeg`, add it to the document and return ops covering the page.
    fn place_background(&self, doc: &mut PdfDocument, jpeg: &[u8], size: PageSize) -> Result<Vec<Op>> {
        let decoded = ::image::load_from_memory(jpeg).map_err(|err| {
            BogenwerkError::ImageError(format!("failed to decode page raster: {err}"))
        })?;
        let width = decoded.width() as usize;
        let height = decoded.height() as usize;

        let raw = RawImage {
            pixels: RawImageData::U8(decoded.to_rgb8().into_raw()),
            width,
            height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = doc.add_image(&raw);

        // At this dpi one pixel is 1/pixels_per_mm millimetres; the scale
        // absorbs the rounding of the pixel grid.
        let pixels_per_mm = self.rasterizer.pixels_per_mm();
        let dpi = pixels_per_mm * 25.4;
        let scale_x = size.width_mm * pixels_per_mm / width as f32;
        let scale_y = size.height_mm * pixels_per_mm / height as f32;

        Ok(vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                dpi: Some(dpi),
                rotate: None,
            },
        }])
    }

    /// Diagnostic page for a page that could not be rendered.
    fn placeholder(&self, name: &str, failure: &PageFailure) -> PdfPage {
        let size = self.config.placeholder_page;
        let margin_pt = Mm(20.0).into_pt().0;
        let top_pt = Mm(size.height_mm).into_pt().0 - margin_pt;

        let lines = [
            ("Page could not be rendered".to_owned(), 16.0),
            (name.to_owned(), 12.0),
            (format!("{} stage: {}", failure.stage, truncate(&failure.reason, 90)), 10.0),
        ];

        let mut ops: Vec<Op> = Vec::new();
        let mut y_pt = top_pt;
        for (text, font_size) in lines {
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(margin_pt),
                    y: Pt(y_pt),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(font_size),
                font: BuiltinFont::Helvetica,
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(text)],
                font: BuiltinFont::Helvetica,
            });
            ops.push(Op::EndTextSection);
            y_pt -= font_size * 1.6;
        }

        PdfPage::new(Mm(size.width_mm), Mm(size.height_mm), ops)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Markup;

    const PORTRAIT: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="200"><rect width="100" height="200" fill="#224466"/></svg>"##;
    const LANDSCAPE: &str = r##"<svg width="300" height="100"><rect width="100%" height="100%" fill="#ff0000"/><text data-tags="redact">Top secret</text></svg>"##;
    const SQUARE: &str = r#"<svg viewBox="0 0 50 50"><circle cx="25" cy="25" r="20"/></svg>"#;
    const BROKEN: &str = r#"<svg width="0" height="0"><rect/></svg>"#;

    fn exporter() -> PdfExporter {
        PdfExporter::new(ExportConfig {
            page_width_mm: 20.0,
            pixels_per_mm: 2.0,
            load_system_fonts: false,
            ..ExportConfig::default()
        })
    }

    fn pages<'a>(markups: &'a [(&'a str, Markup)]) -> Vec<ExportPage<'a>> {
        markups
            .iter()
            .map(|(name, markup)| ExportPage {
                name,
                markup,
                assets: &[],
            })
            .collect()
    }

    fn page_count(pdf: &[u8]) -> usize {
        lopdf::Document::load_mem(pdf).unwrap().get_pages().len()
    }

    #[test]
    fn inside_cover_follows_the_first_page_and_matches_the_second() {
        let markups = [
            ("one.svg", Markup::parse(PORTRAIT).unwrap()),
            ("two.svg", Markup::parse(LANDSCAPE).unwrap()),
            ("three.svg", Markup::parse(SQUARE).unwrap()),
        ];
        let outcome = exporter().export(&pages(&markups)).unwrap();

        assert_eq!(outcome.pages.len(), 4);
        assert_eq!(page_count(&outcome.pdf), 4);

        let PageReport::Rendered { size: second, orientation, .. } = &outcome.pages[2] else {
            panic!("expected second document on page 3: {:?}", outcome.pages[2]);
        };
        assert_eq!(*orientation, Orientation::Landscape);
        match &outcome.pages[1] {
            PageReport::InsideCover {
                size,
                orientation,
                fill,
            } => {
                assert_eq!(size, second);
                assert_eq!(*orientation, Orientation::Landscape);
                assert_eq!(*fill, Some([255, 0, 0]));
            }
            other => panic!("expected inside cover, got {other:?}"),
        }
    }

    #[test]
    fn single_page_export_has_no_inside_cover() {
        let markups = [("only.svg", Markup::parse(SQUARE).unwrap())];
        let outcome = exporter().export(&pages(&markups)).unwrap();
        assert_eq!(outcome.pages.len(), 1);
        assert_eq!(page_count(&outcome.pdf), 1);
    }

    #[test]
    fn failed_page_becomes_placeholder_and_export_continues() {
        let markups = [
            ("bad.svg", Markup::parse(BROKEN).unwrap()),
            ("good.svg", Markup::parse(SQUARE).unwrap()),
        ];
        let outcome = exporter().export(&pages(&markups)).unwrap();

        assert_eq!(outcome.placeholder_count(), 1);
        assert_eq!(outcome.rendered_count(), 1);
        assert_eq!(page_count(&outcome.pdf), 2);
        assert!(matches!(
            &outcome.pages[0],
            PageReport::Placeholder { stage: PageStage::Rasterize, .. }
        ));
    }

    #[test]
    fn oversized_page_degrades_instead_of_aborting() {
        let markups = [
            ("small.svg", Markup::parse(r#"<svg width="10" height="10"/>"#).unwrap()),
            (
                "tall.svg",
                Markup::parse(r#"<svg viewBox="0 0 1 20000" style="background:#123456"/>"#).unwrap(),
            ),
        ];
        let exporter = PdfExporter::new(ExportConfig {
            load_system_fonts: false,
            ..ExportConfig::default()
        });
        let outcome = exporter.export(&pages(&markups)).unwrap();

        assert_eq!(page_count(&outcome.pdf), 3);
        assert!(matches!(&outcome.pages[0], PageReport::Rendered { .. }));
        assert!(matches!(&outcome.pages[1], PageReport::InsideCover { fill: None, .. }));
        assert!(matches!(
            &outcome.pages[2],
            PageReport::Placeholder { stage: PageStage::Rasterize, .. }
        ));
    }

    #[test]
    fn view_box_fills_the_page_when_size_attributes_disagree() {
        let markup = Markup::parse(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 50" width="10" height="40"><rect width="100" height="50" fill="#000000"/></svg>"##,
        )
        .unwrap();
        let page = ExportPage {
            name: "skewed.svg",
            markup: &markup,
            assets: &[],
        };

        let (jpeg, size) = exporter().rasterize_page(&page).unwrap();
        assert_eq!(size, PageSize::new(20.0, 10.0));
        let image = ::image::load_from_memory(&jpeg).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (40, 20));
        for (x, y) in [(1, 1), (38, 1), (1, 18), (38, 18), (20, 10)] {
            let pixel = image.get_pixel(x, y);
            assert!(pixel.0.iter().all(|&c| c < 40), "({x}, {y}) is {pixel:?}");
        }
    }

    #[test]
    fn no_rendered_page_is_an_error() {
        let markups = [("bad.svg", Markup::parse(BROKEN).unwrap())];
        let result = exporter().export(&pages(&markups));
        assert!(matches!(result, Err(BogenwerkError::NoPagesRendered)));
        assert!(matches!(
            exporter().export(&[]),
            Err(BogenwerkError::NoPagesRendered)
        ));
    }

    #[test]
    fn export_never_touches_the_source_markup() {
        let source = Markup::parse(LANDSCAPE).unwrap();
        let before = source.clone();
        let markups = [("two.svg", source)];
        exporter().export(&pages(&markups)).unwrap();
        assert_eq!(markups[0].1, before);
    }

    #[test]
    fn long_reasons_are_truncated() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
