//! DOM caption mutator: wraps `<img class="caption">` elements of a parsed tree in a
//! figure/figcaption structure, reading geometry from a [`Layout`].

use std::borrow::Cow;

use html5ever::{LocalName, QualName, namespace_url, ns};
use kuchiki::traits::*;
use kuchiki::{Attribute, ElementData, ExpandedName, NodeRef};
use log::{debug, trace};

use crate::attributes::{ImageAttributes, parse_px, remove_height_declaration, set_style_property};
use crate::config::ActiveClasses;
use crate::descriptor::{
    Alignment, CaptionedImage, FigureBuilder, PROCESSED_MARKER, Px, Qualified, qualify,
};

/// Class that triggers the DOM mutator unless overridden.
pub const DEFAULT_TRIGGER_CLASS: &str = "caption";

/// Line height [`StaticLayout`] assumes for caption text.
pub const DEFAULT_LINE_HEIGHT: f64 = 20.0;

impl ImageAttributes for ElementData {
    fn attribute(&self, name: &str) -> Option<Cow<'_, str>> {
        self.attributes
            .borrow()
            .get(name)
            .map(|value| Cow::Owned(value.to_string()))
    }
}

/// Source of rendered geometry and computed style.
pub trait Layout {
    /// Rendered width in pixels, `None` when unknown.
    fn width(&self, node: &NodeRef) -> Option<f64>;
    /// Rendered height in pixels, `None` when unknown.
    fn height(&self, node: &NodeRef) -> Option<f64>;
    /// Computed value of a CSS property.
    fn computed_style(&self, node: &NodeRef, property: &str) -> Option<String>;
}

/// A layout engine for documents that are never painted.
///
/// Sizes come from inline style, then from legacy `width`/`height` attributes. Elements
/// other than images without an explicit height are sized by their text: `line_height`
/// per line.
#[derive(Debug, Clone, Copy)]
pub struct StaticLayout {
    pub line_height: f64,
}

impl Default for StaticLayout {
    fn default() -> Self {
        Self {
            line_height: DEFAULT_LINE_HEIGHT,
        }
    }
}

impl StaticLayout {
    fn dimension(node: &NodeRef, property: &str) -> Option<f64> {
        let element = node.as_element()?;
        if let Some(value) = element.style_property(property) {
            return parse_px(&value);
        }
        element
            .attribute(property)
            .and_then(|value| value.trim().parse().ok())
    }
}

impl Layout for StaticLayout {
    fn width(&self, node: &NodeRef) -> Option<f64> {
        Self::dimension(node, "width")
    }

    fn height(&self, node: &NodeRef) -> Option<f64> {
        if let Some(height) = Self::dimension(node, "height") {
            return Some(height);
        }

        let element = node.as_element()?;
        if &*element.name.local == "img" {
            return None;
        }
        let text = node.text_contents();
        let lines = text.lines().filter(|line| !line.trim().is_empty()).count();
        (lines > 0).then(|| lines as f64 * self.line_height)
    }

    fn computed_style(&self, node: &NodeRef, property: &str) -> Option<String> {
        node.as_element()?.style_property(property)
    }
}

/// Wraps captioned images of a DOM subtree in place.
#[derive(Debug, Clone)]
pub struct CaptionMutator<L> {
    layout: L,
    trigger: ActiveClasses,
}

impl<L: Layout> CaptionMutator<L> {
    pub fn new(layout: L) -> Self {
        Self {
            layout,
            trigger: ActiveClasses::parse(DEFAULT_TRIGGER_CLASS),
        }
    }

    /// Replaces the trigger class.
    pub fn with_trigger_class(mut self, class: &str) -> Self {
        self.trigger = ActiveClasses::parse(class);
        self
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Wraps every unprocessed, titled trigger-class image below `root`.
    ///
    /// Each wrapped image gets [`PROCESSED_MARKER`], so calling this again over the same
    /// subtree changes nothing. Returns how many images were wrapped.
    pub fn process(&self, root: &NodeRef) -> usize {
        let candidates: Vec<(NodeRef, Qualified)> = root
            .descendants()
            .elements()
            .filter(|element| &*element.name.local == "img")
            .filter_map(|element| {
                let qualified = qualify(&*element, &self.trigger)?;
                Some((element.as_node().clone(), qualified))
            })
            .collect();

        let figure = DomFigure {
            layout: &self.layout,
        };
        let mut wrapped = 0;
        for (image, qualified) in candidates {
            if image.parent().is_none() {
                continue;
            }
            let captioned = self.describe(&image, qualified);
            trace!("captioning DOM <img> aligned {}", captioned.alignment.as_str());
            figure.build(image, &captioned);
            wrapped += 1;
        }

        if wrapped > 0 {
            debug!("wrapped {wrapped} captioned image(s) in DOM");
        }
        wrapped
    }

    /// Reads geometry, caption and alignment, moving a legacy `align` onto the image's
    /// inline float first.
    fn describe(&self, image: &NodeRef, qualified: Qualified) -> CaptionedImage {
        let mut captioned = CaptionedImage::new(qualified.classes, qualified.title);
        captioned.width = positive(self.layout.width(image));
        captioned.height = positive(self.layout.height(image));
        captioned.margin = non_empty(self.layout.computed_style(image, "margin"));
        captioned.padding = non_empty(self.layout.computed_style(image, "padding"));

        let align = image.as_element().and_then(|element| {
            let mut attributes = element.attributes.borrow_mut();
            let align = attributes.remove("align")?.value;
            let align = align.trim();
            if align.is_empty() {
                return None;
            }
            let style = set_style_property(attributes.get("style").unwrap_or(""), "float", align);
            attributes.insert("style", style);
            Some(align.to_string())
        });

        captioned.alignment = match align {
            Some(align) => Alignment::from_float(&align),
            None => match self.layout.computed_style(image, "float") {
                Some(float) if !float.trim().eq_ignore_ascii_case("none") => {
                    Alignment::from_float(&float)
                }
                _ => Alignment::Normal,
            },
        };

        captioned.style = image
            .as_element()
            .and_then(|element| element.attribute("style"))
            .map(|style| remove_height_declaration(&style).into_owned())
            .filter(|style| !style.trim().is_empty());

        captioned
    }
}

/// Builds the figure around an image that is already attached to a tree.
pub struct DomFigure<'l, L> {
    layout: &'l L,
}

impl<L: Layout> FigureBuilder for DomFigure<'_, L> {
    type Image = NodeRef;
    type Output = NodeRef;

    fn build(&self, image: NodeRef, captioned: &CaptionedImage) -> NodeRef {
        if let Some(element) = image.as_element() {
            let mut attributes = element.attributes.borrow_mut();
            for name in ["width", "height", "align", "style"] {
                attributes.remove(name);
            }
        }

        let wrapper_style = format!(
            "display:inline-block;{}",
            captioned.style.as_deref().unwrap_or_default()
        );
        let figure = new_element(
            "figure",
            &[
                (
                    "class",
                    format!(
                        "image-caption-container image-caption-container-{}",
                        captioned.alignment.as_str()
                    ),
                ),
                ("style", wrapper_style),
            ],
        );
        image.insert_before(figure.clone());
        figure.append(image.clone());

        if let Some(width) = captioned.width {
            set_inline_style(&image, "width", &width.to_string());
            set_inline_style(&figure, "width", &width.to_string());
        }
        if let Some(height) = captioned.height {
            set_inline_style(&image, "height", &height.to_string());
        }
        if let Some(margin) = &captioned.margin {
            set_inline_style(&figure, "margin", margin);
        }
        if let Some(padding) = &captioned.padding {
            set_inline_style(&figure, "padding", padding);
        }

        let caption = new_element(
            "figcaption",
            &[
                ("class", "caption".to_string()),
                ("style", "display:block;".to_string()),
            ],
        );
        caption.append(NodeRef::new_text(captioned.caption.clone()));
        figure.append(caption.clone());

        // The caption sits under the image in normal flow.
        let total = self.layout.height(&image).unwrap_or(0.0)
            + self.layout.height(&caption).unwrap_or(0.0);
        if total > 0.0 {
            set_inline_style(&figure, "height", &Px(total).to_string());
        }

        add_class(&image, PROCESSED_MARKER);
        figure
    }
}

/// Parses `html` as a fragment, captions it, and serialises the fragment back.
pub fn caption_fragment<L: Layout>(html: &str, mutator: &CaptionMutator<L>) -> String {
    let document = kuchiki::parse_html().one(html);
    mutator.process(&document);

    let body = document
        .descendants()
        .elements()
        .find(|element| &*element.name.local == "body");
    match body {
        Some(body) => body
            .as_node()
            .children()
            .map(|child| child.to_string())
            .collect(),
        None => document.to_string(),
    }
}

fn new_element(name: &str, attributes: &[(&str, String)]) -> NodeRef {
    let node = NodeRef::new_element(
        QualName::new(None, ns!(html), LocalName::from(name)),
        std::iter::empty::<(ExpandedName, Attribute)>(),
    );
    if let Some(element) = node.as_element() {
        let mut attrs = element.attributes.borrow_mut();
        for (name, value) in attributes {
            attrs.insert(*name, value.clone());
        }
    }
    node
}

fn set_inline_style(node: &NodeRef, property: &str, value: &str) {
    if let Some(element) = node.as_element() {
        let mut attributes = element.attributes.borrow_mut();
        let style = set_style_property(attributes.get("style").unwrap_or(""), property, value);
        attributes.insert("style", style);
    }
}

fn add_class(node: &NodeRef, class: &str) {
    if let Some(element) = node.as_element() {
        let mut attributes = element.attributes.borrow_mut();
        let current = attributes.get("class").unwrap_or("");
        if current.split_whitespace().any(|token| token == class) {
            return;
        }
        let updated = if current.trim().is_empty() {
            class.to_string()
        } else {
            format!("{} {class}", current.trim())
        };
        attributes.insert("class", updated);
    }
}

fn positive(value: Option<f64>) -> Option<Px> {
    value.filter(|value| *value > 0.0).map(Px)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::*;
    use pretty_assertions::assert_eq;

    fn parse(html: &str) -> NodeRef {
        kuchiki::parse_html().one(html)
    }

    fn first(root: &NodeRef, name: &str) -> NodeRef {
        root.descendants()
            .elements()
            .find(|element| &*element.name.local == name)
            .map(|element| element.as_node().clone())
            .unwrap()
    }

    fn attr(node: &NodeRef, name: &str) -> Option<String> {
        node.as_element()
            .unwrap()
            .attributes
            .borrow()
            .get(name)
            .map(str::to_owned)
    }

    fn count(root: &NodeRef, name: &str) -> usize {
        root.descendants()
            .elements()
            .filter(|element| &*element.name.local == name)
            .count()
    }

    #[test]
    fn wraps_image_with_geometry() {
        let doc = parse(
            r#"<p><img class="caption" src="a.png" title="Hello" width="200" height="100"></p>"#,
        );
        let mutator = CaptionMutator::new(StaticLayout::default());

        assert_eq!(mutator.process(&doc), 1);

        let figure = first(&doc, "figure");
        let img = first(&doc, "img");
        let caption = first(&doc, "figcaption");
        assert_eq!(
            attr(&figure, "class").as_deref(),
            Some("image-caption-container image-caption-container-normal")
        );
        assert_eq!(
            attr(&figure, "style").as_deref(),
            Some("display:inline-block;width:200px;height:120px;")
        );
        assert_eq!(attr(&img, "style").as_deref(), Some("width:200px;height:100px;"));
        assert_eq!(attr(&img, "width"), None);
        assert_eq!(attr(&img, "height"), None);
        assert_eq!(attr(&img, "class").as_deref(), Some("caption caption-processed"));
        assert_eq!(attr(&caption, "class").as_deref(), Some("caption"));
        assert_eq!(caption.text_contents(), "Hello");
        assert!(img.parent().unwrap() == figure);
        assert!(img.next_sibling().unwrap() == caption);
    }

    #[test]
    fn align_attribute_becomes_float() {
        let doc = parse(
            r#"<img class="caption" title="T" align="right" style="height: 50px; border: 1px">"#,
        );
        CaptionMutator::new(StaticLayout::default()).process(&doc);

        let figure = first(&doc, "figure");
        let img = first(&doc, "img");
        assert_eq!(
            attr(&figure, "class").as_deref(),
            Some("image-caption-container image-caption-container-right")
        );
        assert_eq!(
            attr(&figure, "style").as_deref(),
            Some("display:inline-block;border:1px;float:right;height:70px;")
        );
        assert_eq!(attr(&img, "align"), None);
        assert_eq!(attr(&img, "style").as_deref(), Some("height:50px;"));
    }

    #[test]
    fn computed_float_sets_alignment() {
        let doc = parse(r#"<img class="caption" title="T" style="float:left">"#);
        CaptionMutator::new(StaticLayout::default()).process(&doc);

        let figure = first(&doc, "figure");
        assert_eq!(
            attr(&figure, "class").as_deref(),
            Some("image-caption-container image-caption-container-left")
        );
    }

    #[test]
    fn float_none_is_normal() {
        let doc = parse(r#"<img class="caption" title="T" style="float: none">"#);
        CaptionMutator::new(StaticLayout::default()).process(&doc);

        assert!(attr(&first(&doc, "figure"), "class")
            .unwrap()
            .ends_with("-normal"));
    }

    #[test]
    fn forwards_margin_and_padding() {
        let doc = parse(r#"<img class="caption" title="T" style="margin: 4px 8px; padding:2px">"#);
        CaptionMutator::new(StaticLayout::default()).process(&doc);

        let style = attr(&first(&doc, "figure"), "style").unwrap();
        assert!(style.contains("margin:4px 8px;"));
        assert!(style.contains("padding:2px;"));
    }

    #[test]
    fn unknown_geometry_is_left_unset() {
        let doc = parse(r#"<img class="caption" title="">"#);
        CaptionMutator::new(StaticLayout::default()).process(&doc);

        let figure = first(&doc, "figure");
        let img = first(&doc, "img");
        assert_eq!(attr(&figure, "style").as_deref(), Some("display:inline-block;"));
        assert_eq!(attr(&img, "style"), None);
        assert_eq!(first(&doc, "figcaption").text_contents(), "");
    }

    #[test]
    fn skips_untitled_and_unmarked_images() {
        let doc = parse(
            r#"<img class="caption" src="a.png"><img src="b.png" title="T"><img class="wide" title="T">"#,
        );

        assert_eq!(CaptionMutator::new(StaticLayout::default()).process(&doc), 0);
        assert_eq!(count(&doc, "figure"), 0);
    }

    #[test]
    fn trigger_class_can_be_changed() {
        let doc = parse(r#"<img class="wide" title="T"><img class="caption" title="U">"#);
        let mutator = CaptionMutator::new(StaticLayout::default()).with_trigger_class("wide");

        assert_eq!(mutator.process(&doc), 1);
        assert_eq!(first(&doc, "figcaption").text_contents(), "T");
    }

    #[test]
    fn second_pass_changes_nothing() {
        let doc = parse(
            r#"<div><img class="caption" title="One" width="10"><img class="caption" title="Two"></div>"#,
        );
        let mutator = CaptionMutator::new(StaticLayout::default());

        assert_eq!(mutator.process(&doc), 2);
        let once = doc.to_string();
        assert_eq!(mutator.process(&doc), 0);
        assert_eq!(doc.to_string(), once);
        assert_eq!(count(&doc, "figure"), 2);
    }

    #[test]
    fn caption_is_text_not_markup() {
        let html = caption_fragment(
            r#"<img class="caption" title="a <b>bold</b> claim">"#,
            &CaptionMutator::new(StaticLayout::default()),
        );

        assert!(html.contains("a &lt;b&gt;bold&lt;/b&gt; claim</figcaption>"));
        assert!(html.starts_with("<figure"));
    }

    #[test]
    fn custom_layout_drives_geometry() {
        struct Fixed;
        impl Layout for Fixed {
            fn width(&self, node: &NodeRef) -> Option<f64> {
                node.as_element().map(|_| 64.0)
            }
            fn height(&self, node: &NodeRef) -> Option<f64> {
                let element = node.as_element()?;
                Some(if &*element.name.local == "img" { 48.0 } else { 16.0 })
            }
            fn computed_style(&self, _: &NodeRef, _: &str) -> Option<String> {
                None
            }
        }

        let doc = parse(r#"<img class="caption" title="T">"#);
        CaptionMutator::new(Fixed).process(&doc);

        assert_eq!(
            attr(&first(&doc, "figure"), "style").as_deref(),
            Some("display:inline-block;width:64px;height:64px;")
        );
        assert_eq!(
            attr(&first(&doc, "img"), "style").as_deref(),
            Some("width:64px;height:48px;")
        );
    }
}
