// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page measurement and physical layout.

use bogenwerk_core::config::ExportConfig;
use bogenwerk_core::types::PageSize;

use crate::markup::Element;

/// Size of a page in its own user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntrinsicSize {
    pub width: f32,
    pub height: f32,
    /// Whether the configured default was used.
    pub fallback: bool,
}

/// Intrinsic size of a page: the `viewBox` extent when both components are
/// positive, else numeric `width`/`height`, else the configured default.
pub fn measure(root: &Element, config: &ExportConfig) -> IntrinsicSize {
    if let Some((width, height)) = root.attr("viewBox").and_then(view_box_extent) {
        return IntrinsicSize {
            width,
            height,
            fallback: false,
        };
    }

    let width = root.attr("width").and_then(parse_length);
    let height = root.attr("height").and_then(parse_length);
    if let (Some(width), Some(height)) = (width, height) {
        return IntrinsicSize {
            width,
            height,
            fallback: false,
        };
    }

    IntrinsicSize {
        width: config.default_page_width,
        height: config.default_page_height,
        fallback: true,
    }
}

/// Output page at the configured fixed width, height following the aspect
/// ratio.
pub fn layout(intrinsic: IntrinsicSize, config: &ExportConfig) -> PageSize {
    let aspect = intrinsic.width / intrinsic.height;
    PageSize::new(config.page_width_mm, config.page_width_mm / aspect)
}

/// Pin the root's `width`/`height` to the measured extent, so the renderer
/// maps the viewBox onto the whole canvas without letterboxing. Pages that
/// fell back to the default size are left as they are.
pub fn pin_intrinsic_size(root: &mut Element, intrinsic: IntrinsicSize) {
    if intrinsic.fallback {
        return;
    }
    root.set_attr("width", intrinsic.width.to_string());
    root.set_attr("height", intrinsic.height.to_string());
}

/// Third and fourth numbers of a `viewBox`, if both are positive.
fn view_box_extent(value: &str) -> Option<(f32, f32)> {
    let numbers: Vec<f32> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match numbers.as_slice() {
        [_, _, width, height] if *width > 0.0 && *height > 0.0 => Some((*width, *height)),
        _ => None,
    }
}

/// A positive, finite user-unit length; a trailing `px` is accepted.
fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number
        .parse::<f32>()
        .ok()
        .filter(|n| n.is_finite() && *n > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Markup;
    use bogenwerk_core::types::Orientation;

    fn root(svg: &str) -> Element {
        Markup::parse(svg).unwrap().root().clone()
    }

    #[test]
    fn view_box_wins_over_attributes() {
        let size = measure(
            &root(r#"<svg width="10" height="10" viewBox="0 0 400,200"/>"#),
            &ExportConfig::default(),
        );
        assert_eq!((size.width, size.height, size.fallback), (400.0, 200.0, false));
    }

    #[test]
    fn degenerate_view_box_falls_back_to_attributes() {
        let size = measure(
            &root(r#"<svg width="300px" height="150" viewBox="0 0 0 100"/>"#),
            &ExportConfig::default(),
        );
        assert_eq!((size.width, size.height), (300.0, 150.0));
    }

    #[test]
    fn missing_dimensions_use_the_default_page() {
        let config = ExportConfig::default();
        for svg in [
            "<svg/>",
            r#"<svg width="100%" height="100%"/>"#,
            r#"<svg width="120"/>"#,
            r#"<svg viewBox="0 0 a b"/>"#,
        ] {
            let size = measure(&root(svg), &config);
            assert!(size.fallback, "{svg}");
            assert_eq!(size.width, config.default_page_width);
            assert_eq!(size.height, config.default_page_height);
        }
    }

    #[test]
    fn pinning_replaces_disagreeing_attributes() {
        let config = ExportConfig::default();
        let mut page = root(r#"<svg viewBox="0 0 100 50" width="10" height="40"/>"#);
        let size = measure(&page, &config);
        pin_intrinsic_size(&mut page, size);
        assert_eq!(page.attr("width"), Some("100"));
        assert_eq!(page.attr("height"), Some("50"));

        let mut unsized_page = root(r#"<svg width="100%"/>"#);
        let size = measure(&unsized_page, &config);
        pin_intrinsic_size(&mut unsized_page, size);
        assert_eq!(unsized_page.attr("width"), Some("100%"));
        assert_eq!(unsized_page.attr("height"), None);
    }

    #[test]
    fn layout_keeps_aspect_ratio_at_fixed_width() {
        let config = ExportConfig::default();
        let wide = layout(
            IntrinsicSize {
                width: 400.0,
                height: 200.0,
                fallback: false,
            },
            &config,
        );
        assert_eq!(wide.width_mm, 210.0);
        assert_eq!(wide.height_mm, 105.0);
        assert_eq!(wide.orientation(), Orientation::Landscape);

        let default = layout(measure(&root("<svg/>"), &config), &config);
        assert_eq!(default.orientation(), Orientation::Portrait);
        assert!((default.height_mm - 297.18).abs() < 0.01);
    }
}
