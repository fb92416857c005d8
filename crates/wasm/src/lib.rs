use imgcaption_core::{
    ActiveClasses, CaptionFilter, CaptionMutator, CaptionRewriter, StaticLayout, caption_fragment,
};
use js_sys::Function;
use std::io::{self, Write};
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;

/// Runs the configured filter (settings as a JSON string) over `input`.
#[wasm_bindgen(js_name = filter_html)]
pub fn filter_html(input: &str, settings: &str) -> Result<String, JsError> {
    let filter = CaptionFilter::from_json(settings).map_err(to_js_error)?;
    Ok(filter.process(input).text.into_owned())
}

/// Wraps titled images carrying one of `classes` (space separated) in figure markup.
#[wasm_bindgen(js_name = rewrite_html)]
pub fn rewrite_html(input: &str, classes: &str) -> String {
    imgcaption_core::rewrite(input, &ActiveClasses::parse(classes)).into_owned()
}

/// Streams rewritten HTML chunks into the provided JavaScript callback.
///
/// The callback is invoked with each UTF-8 chunk produced by lol_html, so callers can
/// forward output to a `WritableStream` or append to the DOM incrementally.
#[wasm_bindgen(js_name = stream_html)]
pub fn stream_html(input: &str, classes: &str, chunk_callback: &Function) -> Result<(), JsError> {
    let writer = JsChunkWriter::new(chunk_callback.clone());
    let mut rewriter = CaptionRewriter::new(writer, ActiveClasses::parse(classes));

    rewriter
        .write_all(input.as_bytes())
        .map_err(|err| JsError::new(&err.to_string()))?;
    rewriter
        .into_inner()
        .map_err(|err| JsError::new(&err.to_string()))?;
    Ok(())
}

/// Applies the DOM caption mutator to an HTML fragment and returns the serialised result.
///
/// `line_height` sizes caption text when computing the wrapper height.
#[wasm_bindgen(js_name = caption_markup)]
pub fn caption_markup(input: &str, line_height: Option<f64>) -> String {
    let mut layout = StaticLayout::default();
    if let Some(line_height) = line_height {
        layout.line_height = line_height;
    }
    caption_fragment(input, &CaptionMutator::new(layout))
}

/// Returns the version string reported by the core crate.
#[wasm_bindgen]
pub fn version() -> String {
    imgcaption_core::version().to_string()
}

fn to_js_error<E: ToString>(err: E) -> JsError {
    JsError::new(&err.to_string())
}

struct JsChunkWriter {
    callback: Function,
}

impl JsChunkWriter {
    fn new(callback: Function) -> Self {
        Self { callback }
    }
}

impl Write for JsChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let chunk = std::str::from_utf8(buf)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        self.callback
            .call1(&JsValue::UNDEFINED, &JsValue::from_str(chunk))
            .map_err(js_callback_error)?;

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn js_callback_error(err: JsValue) -> io::Error {
    let message = err
        .as_string()
        .or_else(|| {
            js_sys::JSON::stringify(&err)
                .ok()
                .and_then(|s| s.as_string())
        })
        .unwrap_or_else(|| "callback threw".to_string());
    io::Error::other(message)
}
