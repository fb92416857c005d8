//! The captionable-image descriptor shared by every rendering path.
//!
//! Qualification lives here so the markup rewriter, the streaming rewriter and the DOM
//! mutator all make the same decision for the same attributes.

use std::fmt;

use crate::attributes::ImageAttributes;
use crate::config::ActiveClasses;

/// Class added to an image once it has been wrapped.
pub const PROCESSED_MARKER: &str = "caption-processed";

/// Marker inserted before every newline of a markup caption.
pub const LINE_BREAK: &str = "<br />";

/// An image that passed qualification: an active class and a `title` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualified {
    pub classes: Vec<String>,
    /// The title exactly as read from the element; may be empty.
    pub title: String,
}

/// Decides whether an image gets a caption.
///
/// Returns `None` when the image has no class in `active`, has no `title` attribute, or
/// already carries [`PROCESSED_MARKER`].
pub fn qualify<A>(attrs: &A, active: &ActiveClasses) -> Option<Qualified>
where
    A: ImageAttributes + ?Sized,
{
    let classes = attrs.class_tokens();
    if classes.iter().any(|class| class == PROCESSED_MARKER) {
        return None;
    }
    if !active.intersects(classes.iter().map(String::as_str)) {
        return None;
    }

    let title = attrs.attribute("title")?.into_owned();
    Some(Qualified { classes, title })
}

/// A CSS pixel length.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Px(pub f64);

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}

/// How the wrapped image sits in the flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Normal,
    /// A float token (`left`, `right`, ...) taken as written.
    Float(String),
}

impl Alignment {
    pub fn from_float(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() {
            Alignment::Normal
        } else {
            Alignment::Float(token.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Alignment::Normal => "normal",
            Alignment::Float(token) => token,
        }
    }
}

/// Everything a figure builder needs to wrap one image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptionedImage {
    /// Class tokens of the original image.
    pub classes: Vec<String>,
    /// Decoded, plain caption text.
    pub caption: String,
    pub width: Option<Px>,
    pub height: Option<Px>,
    pub alignment: Alignment,
    pub margin: Option<String>,
    pub padding: Option<String>,
    /// Inline style carried from the image onto the wrapper.
    pub style: Option<String>,
}

impl CaptionedImage {
    pub fn new(classes: Vec<String>, caption: impl Into<String>) -> Self {
        Self {
            classes,
            caption: caption.into(),
            ..Self::default()
        }
    }
}

/// Turns a qualified image into its figure/figcaption form.
///
/// Implemented once per representation: markup text and a live DOM.
pub trait FigureBuilder {
    type Image;
    type Output;

    fn build(&self, image: Self::Image, captioned: &CaptionedImage) -> Self::Output;
}

/// Undoes HTML entity encoding in a title taken from markup.
pub fn decode_title(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

/// Escapes caption text for use as element content and marks every line break.
pub fn caption_html(text: &str) -> String {
    insert_line_breaks(&html_escape::encode_text(text))
}

/// Puts [`LINE_BREAK`] in front of each `\r\n`, `\n\r`, `\n` or `\r`, keeping the newline.
pub fn insert_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\r' | '\n' => {
                out.push_str(LINE_BREAK);
                out.push(ch);
                let pair = if ch == '\r' { '\n' } else { '\r' };
                if chars.next_if_eq(&pair).is_some() {
                    out.push(pair);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}
