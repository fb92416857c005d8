//! The text filter: picks markup rewriting or client-side mutation from the settings.

use std::borrow::Cow;

use log::debug;

use crate::config::{ActiveClasses, CaptionMode, FilterSettings};
use crate::error::Result;
use crate::markup;

/// Client library that performs DOM mutation at render time.
pub const CLIENT_LIBRARY: &str = "image_caption/image_caption";

/// Filtered text plus the client assets the page needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult<'a> {
    pub text: Cow<'a, str>,
    pub attachments: Vec<&'static str>,
}

/// A configured caption filter.
#[derive(Debug, Clone)]
pub struct CaptionFilter {
    settings: FilterSettings,
    active: ActiveClasses,
}

impl CaptionFilter {
    /// Validates `settings`; `without_script` needs at least one class.
    pub fn new(settings: FilterSettings) -> Result<Self> {
        let active = settings.active_classes()?;
        Ok(Self { settings, active })
    }

    pub fn from_json(settings: &str) -> Result<Self> {
        Self::new(FilterSettings::from_json(settings)?)
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn active_classes(&self) -> &ActiveClasses {
        &self.active
    }

    /// Runs the filter over one document.
    pub fn process<'a>(&self, text: &'a str) -> FilterResult<'a> {
        debug!("image caption filter running in {} mode", self.settings.mode.as_str());

        match self.settings.mode {
            CaptionMode::WithScript => FilterResult {
                text: Cow::Borrowed(text),
                attachments: vec![CLIENT_LIBRARY],
            },
            CaptionMode::WithoutScript => FilterResult {
                text: markup::rewrite(text, &self.active),
                attachments: Vec::new(),
            },
        }
    }

    /// Describes what the filter does, for display next to the text format.
    pub fn tips(&self, long: bool) -> String {
        let how = match self.settings.mode {
            CaptionMode::WithScript => "by using a client-side script",
            CaptionMode::WithoutScript => "without using a client-side script",
        };
        let mut tip = format!(
            "Adds captions, from the title attribute, to images with one of the following classes: {} {how}.",
            self.active
        );
        if long {
            tip.push_str(
                " The image is wrapped in a figure element and the title becomes its figcaption.",
            );
        }
        tip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptionError;
    use pretty_assertions::assert_eq;

    const IMAGE: &str = r#"<img class="caption" title="Hello">"#;

    #[test]
    fn without_script_rewrites_markup() {
        let filter = CaptionFilter::new(FilterSettings::default()).unwrap();
        let result = filter.process(IMAGE);

        assert!(result.text.contains("<figcaption"));
        assert!(result.attachments.is_empty());
    }

    #[test]
    fn with_script_attaches_library_and_keeps_text() {
        let filter = CaptionFilter::from_json(r#"{"mode": "with_script"}"#).unwrap();
        let result = filter.process(IMAGE);

        assert_eq!(result.text, IMAGE);
        assert_eq!(result.attachments, vec![CLIENT_LIBRARY]);
    }

    #[test]
    fn uses_configured_classes() {
        let filter = CaptionFilter::from_json(r#"{"classes": "photo  figure"}"#).unwrap();

        assert_eq!(filter.process(IMAGE).text, IMAGE);
        assert!(filter
            .process(r#"<img class="figure" title="T">"#)
            .text
            .starts_with(r#"<figure class="figure""#));
    }

    #[test]
    fn rejects_empty_classes_for_markup_mode() {
        let err = CaptionFilter::from_json(r#"{"mode": "without_script", "classes": ""}"#)
            .unwrap_err();

        assert!(matches!(err, CaptionError::MissingClasses));
    }

    #[test]
    fn tips_name_classes_and_mode() {
        let filter = CaptionFilter::from_json(r#"{"classes": "right left"}"#).unwrap();

        assert_eq!(
            filter.tips(false),
            "Adds captions, from the title attribute, to images with one of the following classes: left right without using a client-side script."
        );
        assert!(filter.tips(true).contains("figcaption"));
    }
}
