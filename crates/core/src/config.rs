//! Filter settings and the active class set derived from them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CaptionError, Result};

/// Which strategy renders captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionMode {
    /// Leave the markup alone and attach the client library that mutates the DOM.
    #[serde(alias = "with_js")]
    WithScript,
    /// Rewrite `<img>` tags in the markup itself.
    #[default]
    #[serde(alias = "without_js")]
    WithoutScript,
}

impl CaptionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptionMode::WithScript => "with_script",
            CaptionMode::WithoutScript => "without_script",
        }
    }
}

/// The two options the filter recognises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(default, alias = "javascript_status")]
    pub mode: CaptionMode,
    /// Whitespace separated class tokens; required for `without_script`.
    #[serde(default = "default_classes")]
    pub classes: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            mode: CaptionMode::default(),
            classes: default_classes(),
        }
    }
}

fn default_classes() -> String {
    "caption".to_string()
}

impl FilterSettings {
    /// Parses settings from a JSON object. Missing keys fall back to the defaults.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parses `classes` into an [`ActiveClasses`] set.
    ///
    /// Fails when the markup rewriter would have nothing to look for.
    pub fn active_classes(&self) -> Result<ActiveClasses> {
        let active = ActiveClasses::parse(&self.classes);
        if active.is_empty() && self.mode == CaptionMode::WithoutScript {
            return Err(CaptionError::MissingClasses);
        }
        Ok(active)
    }
}

/// Class tokens that mark an image as caption-eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveClasses(BTreeSet<String>);

impl ActiveClasses {
    /// Splits on any run of whitespace, dropping empty tokens.
    pub fn parse(classes: &str) -> Self {
        Self(classes.split_whitespace().map(str::to_owned).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    /// True when at least one of `tokens` is active.
    pub fn intersects<'a, I>(&self, tokens: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        tokens.into_iter().any(|token| self.contains(token))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ActiveClasses {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ActiveClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, class) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            f.write_str(class)?;
        }
        Ok(())
    }
}
