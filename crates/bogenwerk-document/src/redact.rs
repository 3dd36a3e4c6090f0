// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redaction — derives blur filters and masked text from "redact" tags.
//
// The transform reads tag annotations and never writes them. Images tagged for
// redaction point at one shared blur filter; text beneath any other tagged
// element has every non-whitespace character replaced by a mask glyph.

use bogenwerk_core::tags::is_redaction_tag;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::markup::{Element, ElementKind, ElementPath, Markup, Node};

/// Id of the shared blur filter in `<defs>`.
pub const BLUR_FILTER_ID: &str = "bogenwerk-redact-blur";

/// Replacement for every non-whitespace character of redacted text.
pub const MASK_GLYPH: char = '\u{2588}';

const BLUR_STD_DEVIATION: &str = "12";

/// What one redaction pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionSummary {
    pub images: usize,
    pub text_nodes: usize,
    /// Whether the blur filter definition had to be created.
    pub filter_created: bool,
}

/// Stateless redaction service.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redactor;

impl Redactor {
    pub fn new() -> Self {
        Self
    }

    /// Redacted copy of `markup`; the input is left untouched.
    pub fn redact(&self, markup: &Markup) -> Markup {
        let mut copy = markup.clone();
        self.redact_in_place(&mut copy);
        copy
    }

    #[instrument(skip_all)]
    pub fn redact_in_place(&self, markup: &mut Markup) -> RedactionSummary {
        let mut images = Vec::new();
        let mut containers = Vec::new();
        markup.root().walk(&mut |path, element| {
            if !element.tags().iter().any(|tag| is_redaction_tag(tag)) {
                return;
            }
            let path = ElementPath::from(path);
            match ElementKind::of(element) {
                ElementKind::Image => images.push(path),
                _ => containers.push(path),
            }
        });

        let mut summary = RedactionSummary::default();

        for path in &images {
            if let Some(image) = markup.element_mut(path) {
                image.set_attr("filter", format!("url(#{BLUR_FILTER_ID})"));
                summary.images += 1;
            }
        }

        for path in &containers {
            if let Some(container) = markup.element_mut(path) {
                summary.text_nodes += mask_subtree(container);
            }
        }

        // Last: inserting <defs> shifts the root's child indices.
        if !images.is_empty() {
            summary.filter_created = ensure_blur_filter(markup.root_mut());
        }

        debug!(?summary, "Redaction applied");
        summary
    }
}

/// `text` with every non-whitespace character masked.
pub fn mask_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { c } else { MASK_GLYPH })
        .collect()
}

/// Mask every text leaf beneath `element`. Returns the number of leaves changed.
fn mask_subtree(element: &mut Element) -> usize {
    if matches!(element.local_name(), "style" | "script") {
        return 0;
    }
    let mut masked = 0;
    for child in &mut element.children {
        match child {
            Node::Text(text) | Node::CData(text) => {
                if text.chars().any(|c| !c.is_whitespace()) {
                    *text = mask_text(text);
                    masked += 1;
                }
            }
            Node::Element(inner) => masked += mask_subtree(inner),
            Node::Comment(_) => {}
        }
    }
    masked
}

/// Add the blur filter under the root's `<defs>` unless an element with its id
/// already exists. Returns whether it was created.
fn ensure_blur_filter(root: &mut Element) -> bool {
    let mut present = false;
    root.walk(&mut |_, element| present |= element.attr("id") == Some(BLUR_FILTER_ID));
    if present {
        return false;
    }

    let defs_index = match root
        .children
        .iter()
        .position(|node| node.as_element().is_some_and(|el| el.local_name() == "defs"))
    {
        Some(index) => index,
        None => {
            root.children.insert(0, Node::Element(Element::new("defs")));
            0
        }
    };

    let filter = Element::new("filter")
        .with_attr("id", BLUR_FILTER_ID)
        .with_attr("x", "-20%")
        .with_attr("y", "-20%")
        .with_attr("width", "140%")
        .with_attr("height", "140%")
        .with_child(Node::Element(
            Element::new("feGaussianBlur").with_attr("stdDeviation", BLUR_STD_DEVIATION),
        ));

    if let Some(defs) = root.children[defs_index].as_element_mut() {
        defs.children.push(Node::Element(filter));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<svg width="100" height="100">
  <image href="images/a.png" data-tags="Redact-Photo"/>
  <image href="images/b.png" data-tags="keep"/>
  <text data-tags="redact-text">Hello World</text>
  <text data-tags="REDACTED"><tspan>  a b </tspan><tspan>   </tspan></text>
  <text>Public</text>
</svg>"#;

    fn filter_count(markup: &Markup) -> usize {
        let mut count = 0;
        markup.root().walk(&mut |_, element| {
            if element.attr("id") == Some(BLUR_FILTER_ID) {
                count += 1;
            }
        });
        count
    }

    fn texts(markup: &Markup) -> Vec<String> {
        markup
            .root()
            .child_elements()
            .filter(|el| el.local_name() == "text")
            .map(Element::text_content)
            .collect()
    }

    #[test]
    fn hello_world_is_masked_word_by_word() {
        let redacted = Redactor::new().redact(&Markup::parse(PAGE).unwrap());
        assert_eq!(texts(&redacted)[0], "█████ █████");
    }

    #[test]
    fn masking_preserves_length_and_whitespace() {
        let samples = ["Hello World", " \ttabs\tand\nnewlines ", "ünïcödé ✓", ""];
        for text in samples {
            let masked = mask_text(text);
            assert_eq!(masked.chars().count(), text.chars().count());
            for (original, out) in text.chars().zip(masked.chars()) {
                assert_eq!(original.is_whitespace(), out.is_whitespace());
            }
        }
    }

    #[test]
    fn nested_spans_are_masked_and_blank_nodes_left_alone() {
        let redacted = Redactor::new().redact(&Markup::parse(PAGE).unwrap());
        assert_eq!(texts(&redacted)[1], "  █ █    ");
        assert_eq!(texts(&redacted)[2], "Public");
    }

    #[test]
    fn tagged_images_share_one_filter() {
        let redacted = Redactor::new().redact(&Markup::parse(PAGE).unwrap());
        assert_eq!(filter_count(&redacted), 1);

        let defs = redacted.root().child_elements().next().unwrap();
        assert_eq!(defs.local_name(), "defs");

        let images: Vec<&Element> = redacted
            .root()
            .child_elements()
            .filter(|el| el.local_name() == "image")
            .collect();
        assert_eq!(images[0].attr("filter"), Some("url(#bogenwerk-redact-blur)"));
        assert_eq!(images[1].attr("filter"), None);
    }

    #[test]
    fn repeated_runs_do_not_duplicate_the_filter() {
        let redactor = Redactor::new();
        let once = redactor.redact(&Markup::parse(PAGE).unwrap());
        let mut twice = once.clone();
        let summary = redactor.redact_in_place(&mut twice);

        assert!(!summary.filter_created);
        assert_eq!(filter_count(&twice), 1);
        assert_eq!(
            once.to_markup_string().unwrap(),
            twice.to_markup_string().unwrap()
        );
    }

    #[test]
    fn existing_defs_are_reused() {
        let markup = Markup::parse(
            r#"<svg><rect/><defs><linearGradient id="g"/></defs><image href="x.png" data-tags="redact"/></svg>"#,
        )
        .unwrap();
        let redacted = Redactor::new().redact(&markup);
        let defs: Vec<&Element> = redacted
            .root()
            .child_elements()
            .filter(|el| el.local_name() == "defs")
            .collect();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].child_elements().count(), 2);
    }

    #[test]
    fn redaction_is_deterministic_and_leaves_source_alone() {
        let source = Markup::parse(PAGE).unwrap();
        let a = Redactor::new().redact(&source).to_markup_string().unwrap();
        let b = Redactor::new().redact(&source).to_markup_string().unwrap();
        assert_eq!(a, b);
        assert_eq!(source, Markup::parse(PAGE).unwrap());
    }

    #[test]
    fn untagged_page_is_unchanged() {
        let source = Markup::parse(r#"<svg><text>Secret</text><image href="a.png"/></svg>"#).unwrap();
        let mut copy = source.clone();
        let summary = Redactor::new().redact_in_place(&mut copy);
        assert_eq!(summary, RedactionSummary::default());
        assert_eq!(copy, source);
    }

    #[test]
    fn stylesheets_inside_targets_are_not_masked() {
        let source = Markup::parse(
            r#"<svg><g data-tags="redact"><style>.a{fill:red}</style><text>Hi</text></g></svg>"#,
        )
        .unwrap();
        let redacted = Redactor::new().redact(&source);
        let group = redacted.root().child_elements().next().unwrap();
        assert_eq!(group.text_content(), ".a{fill:red}██");
    }
}
