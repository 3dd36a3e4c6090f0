// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterizer — renders a self-contained page to a white-backed bitmap with
// `resvg` and encodes it as JPEG for use as a PDF page background.

use std::sync::Arc;

use bogenwerk_core::config::ExportConfig;
use bogenwerk_core::error::{BogenwerkError, Result};
use bogenwerk_core::types::PageSize;
use image::{DynamicImage, RgbImage, RgbaImage};
use resvg::tiny_skia::{self, Pixmap, Transform};
use resvg::usvg::{self, fontdb};
use tracing::{debug, info, instrument};

/// Renders markup to JPEG at a fixed pixel density.
///
/// The font database is built once; per-page embedded fonts are layered on a
/// copy only when a page brings its own.
pub struct Rasterizer {
    fontdb: Arc<fontdb::Database>,
    pixels_per_mm: f32,
    max_canvas_pixels: u64,
    jpeg_quality: u8,
}

impl Rasterizer {
    pub fn new(config: &ExportConfig) -> Self {
        let mut db = fontdb::Database::new();
        if config.load_system_fonts {
            db.load_system_fonts();
        }
        info!(faces = db.len(), "Font database ready");
        Self {
            fontdb: Arc::new(db),
            pixels_per_mm: config.pixels_per_mm,
            max_canvas_pixels: config.max_canvas_pixels,
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Pixel dimensions of a page of `size` at this rasterizer's density.
    /// Canvases over the configured pixel limit are refused.
    pub fn pixel_size(&self, size: PageSize) -> Result<(u32, u32)> {
        let to_px = |mm: f32| (f64::from(mm) * f64::from(self.pixels_per_mm)).round().max(1.0);
        let (width, height) = (to_px(size.width_mm), to_px(size.height_mm));
        let area = width * height;
        if !area.is_finite() || area > self.max_canvas_pixels as f64 {
            return Err(BogenwerkError::Render(format!(
                "a {width}x{height} canvas exceeds the {} pixel limit",
                self.max_canvas_pixels
            )));
        }
        Ok((width as u32, height as u32))
    }

    pub fn pixels_per_mm(&self) -> f32 {
        self.pixels_per_mm
    }

    /// Render `svg` stretched to `size` over a white canvas and return the
    /// JPEG bytes.
    #[instrument(skip(self, svg, fonts), fields(svg_len = svg.len(), fonts = fonts.len()))]
    pub fn rasterize(&self, svg: &str, fonts: &[&[u8]], size: PageSize) -> Result<Vec<u8>> {
        let (width, height) = self.pixel_size(size)?;

        let mut options = usvg::Options::default();
        options.fontdb = Arc::clone(&self.fontdb);
        for font in fonts {
            options.fontdb_mut().load_font_data(font.to_vec());
        }

        let tree = usvg::Tree::from_str(svg, &options)
            .map_err(|err| BogenwerkError::Render(format!("failed to parse page: {err}")))?;

        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            BogenwerkError::Render(format!("cannot allocate a {width}x{height} canvas"))
        })?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let tree_size = tree.size();
        let transform = Transform::from_scale(
            width as f32 / tree_size.width(),
            height as f32 / tree_size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        debug!(width, height, "Page rendered");

        // The canvas is opaque, so premultiplied and straight RGBA coincide.
        let rgba = RgbaImage::from_raw(width, height, pixmap.take()).ok_or_else(|| {
            BogenwerkError::Render("pixmap size does not match its dimensions".into())
        })?;
        encode_jpeg(&DynamicImage::ImageRgba8(rgba).to_rgb8(), self.jpeg_quality)
    }

    /// JPEG of a page-sized canvas flooded with `rgb`.
    pub fn solid(&self, rgb: [u8; 3], size: PageSize) -> Result<Vec<u8>> {
        let (width, height) = self.pixel_size(size)?;
        let canvas = RgbImage::from_pixel(width, height, image::Rgb(rgb));
        encode_jpeg(&canvas, self.jpeg_quality)
    }
}

/// Encode RGB pixels as JPEG with the given quality (1-100).
pub fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|err| BogenwerkError::ImageError(format!("JPEG encoding failed: {err}")))?;
    Ok(buffer)
}
