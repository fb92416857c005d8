//! Streaming variant of the caption rewriter, built on lol_html so documents can be fed in
//! chunks without buffering.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, trace};
use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, Element};
use lol_html::{HtmlRewriter, OutputSink, Selector, Settings, element};

use crate::attributes::ImageAttributes;
use crate::config::ActiveClasses;
use crate::descriptor::qualify;
use crate::error::Result;
use crate::markup::{MarkupFigure, describe};

impl ImageAttributes for Element<'_, '_> {
    fn attribute(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get_attribute(name).map(Cow::Owned)
    }
}

/// Implements [`Write`] so HTML can be pushed through lol_html chunk by chunk.
///
/// The destination writer is shared through a single `Rc<RefCell<Option<W>>>`, which is the
/// only allocation needed to satisfy lol_html's `OutputSink` without buffering output.
pub struct CaptionRewriter<W: Write> {
    rewriter: Option<HtmlRewriter<'static, OutputProxy<W>>>,
    target: Rc<RefCell<Option<W>>>,
    sink_error: Rc<RefCell<Option<io::Error>>>,
    wrapped: Rc<Cell<usize>>,
}

impl<W: Write> CaptionRewriter<W> {
    /// Creates a rewriter that captions images carrying one of `active` and forwards the
    /// result into `writer`.
    pub fn new(writer: W, active: ActiveClasses) -> Self {
        let target = Rc::new(RefCell::new(Some(writer)));
        let sink_error = Rc::new(RefCell::new(None));
        let wrapped = Rc::new(Cell::new(0));
        let output_sink = OutputProxy::new(Rc::clone(&target), Rc::clone(&sink_error));

        let mut settings = Settings::default();
        settings.element_content_handlers = vec![caption_handler(active, Rc::clone(&wrapped))];
        let rewriter = HtmlRewriter::new(settings, output_sink);

        Self {
            rewriter: Some(rewriter),
            target,
            sink_error,
            wrapped,
        }
    }

    /// Number of images wrapped so far.
    pub fn wrapped(&self) -> usize {
        self.wrapped.get()
    }

    /// Consumes the rewriter, ensures lol_html has flushed, and returns the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.finalize_if_needed()?;

        let cell = Rc::try_unwrap(self.target)
            .map_err(|_| io::Error::other("rewriter still borrowed"))?;

        cell.into_inner()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "writer missing"))
    }

    fn finalize_if_needed(&mut self) -> io::Result<()> {
        if let Some(rewriter) = self.rewriter.take() {
            rewriter.end().map_err(rewriting_error_to_io)?;
            if self.wrapped.get() > 0 {
                debug!("wrapped {} captioned image(s) in stream", self.wrapped.get());
            }
        }

        Self::take_sink_error(&self.sink_error)
    }

    fn take_sink_error(cell: &Rc<RefCell<Option<io::Error>>>) -> io::Result<()> {
        if let Some(err) = cell.borrow_mut().take() {
            Err(err)
        } else {
            Ok(())
        }
    }
}

impl<W: Write> Write for CaptionRewriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let rewriter = self
            .rewriter
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "rewriter finalized"))?;

        rewriter.write(buf).map_err(rewriting_error_to_io)?;
        Self::take_sink_error(&self.sink_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.finalize_if_needed()
    }
}

/// Runs `html` through a [`CaptionRewriter`] and collects the output.
pub fn rewrite_streaming(html: &str, active: &ActiveClasses) -> Result<String> {
    let mut rewriter = CaptionRewriter::new(Vec::with_capacity(html.len()), active.clone());
    rewriter.write_all(html.as_bytes())?;
    let bytes = rewriter.into_inner()?;
    String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
}

fn caption_handler(
    active: ActiveClasses,
    wrapped: Rc<Cell<usize>>,
) -> (
    Cow<'static, Selector>,
    lol_html::ElementContentHandlers<'static>,
) {
    let figure = MarkupFigure;
    element!("img", move |el| {
        let Some(qualified) = qualify(&*el, &active) else {
            return Ok(());
        };
        let captioned = describe(&*el, qualified);
        trace!("captioning streamed <img> with caption {:?}", captioned.caption);

        el.remove_attribute("class");
        el.before(&figure.open(&captioned), ContentType::Html);
        el.after(&figure.close(&captioned), ContentType::Html);
        wrapped.set(wrapped.get() + 1);

        Ok(())
    })
}

fn rewriting_error_to_io(err: RewritingError) -> io::Error {
    io::Error::other(err)
}

struct OutputProxy<W: Write> {
    target: Rc<RefCell<Option<W>>>,
    sink_error: Rc<RefCell<Option<io::Error>>>,
}

impl<W: Write> OutputProxy<W> {
    fn new(target: Rc<RefCell<Option<W>>>, sink_error: Rc<RefCell<Option<io::Error>>>) -> Self {
        OutputProxy { target, sink_error }
    }
}

impl<W: Write> OutputSink for OutputProxy<W> {
    fn handle_chunk(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }

        if self.sink_error.borrow().is_some() {
            return;
        }

        let mut borrow = self.target.borrow_mut();

        if let Some(writer) = borrow.as_mut() {
            if let Err(err) = writer.write_all(chunk) {
                *self.sink_error.borrow_mut() = Some(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn caption() -> ActiveClasses {
        ActiveClasses::parse("caption")
    }

    #[test]
    fn wraps_qualifying_image() {
        let output = rewrite_streaming(
            r#"<p><img class="caption" src="a.png" title="Hello"></p>"#,
            &caption(),
        )
        .unwrap();

        assert!(output.starts_with(r#"<p><figure class="caption" style="display:block;"><img"#));
        assert!(output.ends_with(
            r#"<figcaption class="caption" style="display:block;">Hello</figcaption></figure></p>"#
        ));
        assert!(!output.contains(r#"class="caption" src"#));
    }

    #[test]
    fn passes_plain_images_through() {
        let input = r#"<p><img src="a.png" title="T"><img class="other" title="T"></p>"#;

        assert_eq!(rewrite_streaming(input, &caption()).unwrap(), input);
    }

    #[test]
    fn handles_tags_split_across_chunks() {
        let mut rewriter = CaptionRewriter::new(Vec::new(), caption());
        rewriter
            .write_all(br#"<div><img class="cap"#)
            .expect("stream write should succeed");
        rewriter
            .write_all(br#"tion" title="Split" style="float: right"></div>"#)
            .expect("stream write should succeed");
        assert_eq!(rewriter.wrapped(), 1);

        let output = String::from_utf8(rewriter.into_inner().unwrap()).unwrap();
        assert!(output.contains(r#"style="display:block;float:right;""#));
        assert!(output.contains(">Split</figcaption></figure></div>"));
    }

    #[test]
    fn writes_after_flush_are_rejected() {
        let mut rewriter = CaptionRewriter::new(Vec::new(), caption());
        rewriter.flush().unwrap();

        let err = rewriter.write(b"<p>late</p>").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
