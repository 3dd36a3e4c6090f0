// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inside-cover colour detection.

use std::str::FromStr;

use svgtypes::Color;
use tracing::debug;

use crate::markup::Element;

/// Fill colour for the inside-cover page taken from the page that follows it.
///
/// Checked in order: a background in the root's `style`, then the first shape
/// covering the whole page (its size equals the root's declared size, or is
/// `100%` by `100%`). Returns `None` when nothing is found, the colour is fully
/// transparent, or it is white.
pub fn cover_fill(root: &Element) -> Option<[u8; 3]> {
    let color = root_background(root).or_else(|| full_bleed_fill(root))?;
    debug!(?color, "Inside-cover colour detected");
    if color.alpha == 0 || (color.red, color.green, color.blue) == (255, 255, 255) {
        return None;
    }
    Some([color.red, color.green, color.blue])
}

fn root_background(root: &Element) -> Option<Color> {
    let style = root.attr("style")?;
    let declarations: Vec<(&str, &str)> = style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
        .collect();

    let lookup = |property: &str| {
        declarations
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(property))
            .map(|(_, value)| *value)
    };

    if let Some(color) = lookup("background-color").and_then(parse_color) {
        return Some(color);
    }
    // `background` is a shorthand; take the first token that is a colour.
    lookup("background")?
        .split_whitespace()
        .find_map(parse_color)
}

fn full_bleed_fill(root: &Element) -> Option<Color> {
    let page_width = root.attr("width").map(str::trim);
    let page_height = root.attr("height").map(str::trim);

    let mut found = None;
    root.walk(&mut |path, element| {
        if found.is_some() || path.is_empty() || !is_shape(element) {
            return;
        }
        let width = element.attr("width").map(str::trim);
        let height = element.attr("height").map(str::trim);
        let full_percent = width == Some("100%") && height == Some("100%");
        let matches_page = width.is_some()
            && height.is_some()
            && same_length(width, page_width)
            && same_length(height, page_height);
        if full_percent || matches_page {
            found = Some(shape_fill(element));
        }
    });
    found.flatten()
}

fn is_shape(element: &Element) -> bool {
    matches!(element.local_name(), "rect" | "image" | "foreignObject")
}

fn same_length(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let strip = |v: &str| v.strip_suffix("px").unwrap_or(v).trim().to_owned();
            match (strip(a).parse::<f32>(), strip(b).parse::<f32>()) {
                (Ok(a), Ok(b)) => (a - b).abs() < f32::EPSILON,
                _ => a == b,
            }
        }
        _ => false,
    }
}

/// `fill` from the style attribute, falling back to the presentation attribute.
fn shape_fill(element: &Element) -> Option<Color> {
    let from_style = element.attr("style").and_then(|style| {
        style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("fill"))
            .map(|(_, value)| value.trim())
    });
    from_style.or_else(|| element.attr("fill")).and_then(parse_color)
}

fn parse_color(value: &str) -> Option<Color> {
    Color::from_str(value.trim()).ok()
}
