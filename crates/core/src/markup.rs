//! Tag scanner and rewriter: wraps qualifying `<img>` tags of an HTML text in
//! `<figure>`/`<figcaption>` markup.

use std::borrow::Cow;
use std::sync::LazyLock;

use html_escape::encode_double_quoted_attribute;
use log::{debug, trace};
use regex::{Captures, Regex};

use crate::attributes::{ImageAttributes, MarkupTag, parse_px};
use crate::config::ActiveClasses;
use crate::descriptor::{
    Alignment, CaptionedImage, FigureBuilder, Px, Qualified, caption_html, decode_title, qualify,
};

// `<img`, then unquoted characters or whole quoted values, up to the first `>` outside quotes.
// A quoted value may hold `<` unless it starts another tag, so an unterminated quote stops
// at the next real tag.
static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<img\b(?:[^>"']|"(?:[^"<]|<+[^a-z/!?"<])*<*"|'(?:[^'<]|<+[^a-z/!?'<])*<*')*>"#,
    )
        .expect("IMG_TAG_RE: hardcoded regex is valid")
});

/// Rewrites every qualifying `<img>` tag in `html`.
///
/// Tags are matched against the original text in order of appearance; everything that is
/// not a qualifying tag is copied through untouched. Returns the input borrowed when no tag
/// matched at all.
pub fn rewrite<'a>(html: &'a str, active: &ActiveClasses) -> Cow<'a, str> {
    if active.is_empty() {
        return Cow::Borrowed(html);
    }

    let figure = MarkupFigure;
    let mut wrapped = 0usize;
    let output = IMG_TAG_RE.replace_all(html, |caps: &Captures<'_>| {
        let raw = &caps[0];
        match rewrite_tag(raw, active, &figure) {
            Some(replacement) => {
                wrapped += 1;
                replacement
            }
            None => raw.to_string(),
        }
    });

    if wrapped > 0 {
        debug!("wrapped {wrapped} captioned image(s) in markup");
    }

    output
}

fn rewrite_tag(raw: &str, active: &ActiveClasses, figure: &MarkupFigure) -> Option<String> {
    let tag = MarkupTag::parse(raw);
    let qualified = qualify(&tag, active)?;
    let captioned = describe(&tag, qualified);
    trace!("captioning {raw}");

    let image = tag.without_attribute("class").into_owned();
    Some(figure.build(image, &captioned))
}

/// Builds the descriptor for a qualified markup image: decoded title, width, float.
pub(crate) fn describe<A>(attrs: &A, qualified: Qualified) -> CaptionedImage
where
    A: ImageAttributes + ?Sized,
{
    let mut captioned = CaptionedImage::new(qualified.classes, decode_title(&qualified.title));
    captioned.width = markup_width(attrs);
    captioned.alignment = attrs
        .style_property("float")
        .map(|value| {
            let token: String = value
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            Alignment::from_float(&token)
        })
        .unwrap_or_default();
    captioned
}

/// `width:<N>px` from the inline style, else a numeric `width` attribute.
fn markup_width<A>(attrs: &A) -> Option<Px>
where
    A: ImageAttributes + ?Sized,
{
    if let Some(width) = attrs.style_property("width").as_deref().and_then(parse_px) {
        return Some(Px(width));
    }

    let width = attrs.attribute("width")?;
    let width = width.trim();
    if width.is_empty() || !width.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    width.parse().ok().map(Px)
}

/// Serialises the figure wrapper as markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupFigure;

impl MarkupFigure {
    /// Opening `<figure>` tag carrying the image's classes and forwarded style.
    pub fn open(&self, captioned: &CaptionedImage) -> String {
        let mut style = String::from("display:block;");
        if let Some(width) = captioned.width {
            style.push_str(&format!("width:{width};"));
        }
        if let Alignment::Float(token) = &captioned.alignment {
            style.push_str(&format!("float:{token};"));
        }

        format!(
            r#"<figure class="{}" style="{}">"#,
            encode_double_quoted_attribute(&captioned.classes.join(" ")),
            encode_double_quoted_attribute(&style),
        )
    }

    /// The caption element followed by the closing `</figure>`.
    pub fn close(&self, captioned: &CaptionedImage) -> String {
        format!(
            r#"<figcaption class="caption" style="display:block;">{}</figcaption></figure>"#,
            caption_html(&captioned.caption),
        )
    }
}

impl FigureBuilder for MarkupFigure {
    type Image = String;
    type Output = String;

    fn build(&self, image: String, captioned: &CaptionedImage) -> String {
        let mut out = self.open(captioned);
        out.push_str(&image);
        out.push_str(&self.close(captioned));
        out
    }
}
