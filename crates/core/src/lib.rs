//! Image caption filter.
//!
//! Turns `<img class="caption" title="...">` into a `<figure>` holding the image and a
//! `<figcaption>` built from the title. Three paths share one qualification rule:
//!
//! - [`markup::rewrite`] scans HTML text with patterns and rewrites matching tags.
//! - [`CaptionRewriter`] does the same while streaming through lol_html.
//! - [`CaptionMutator`] mutates a parsed DOM in place, taking geometry from a [`Layout`].
//!
//! [`CaptionFilter`] picks between markup rewriting and the client-side library based on
//! [`FilterSettings`].

pub mod attributes;
pub mod config;
pub mod descriptor;
pub mod dom;
pub mod error;
pub mod filter;
pub mod markup;
pub mod streaming_rewriter;

pub use attributes::{ImageAttributes, MarkupTag};
pub use config::{ActiveClasses, CaptionMode, FilterSettings};
pub use descriptor::{Alignment, CaptionedImage, FigureBuilder, PROCESSED_MARKER, Px, qualify};
pub use dom::{CaptionMutator, DomFigure, Layout, StaticLayout, caption_fragment};
pub use error::{CaptionError, Result};
pub use filter::{CLIENT_LIBRARY, CaptionFilter, FilterResult};
pub use markup::{MarkupFigure, rewrite};
pub use streaming_rewriter::{CaptionRewriter, rewrite_streaming};

/// Crate version, as reported to bindings.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
