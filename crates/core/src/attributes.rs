//! Attribute extraction for image tags.
//!
//! Callers only see [`ImageAttributes`]; the regex scanner in [`MarkupTag`] is one
//! implementation, lol_html elements and kuchiki nodes are the others.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

// Whitespace, a name, then an optional `=value` in double quotes, single quotes or bare.
// The leading whitespace belongs to the match so removing an attribute removes it too.
static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+([a-z_:][-a-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("ATTRIBUTE_RE: hardcoded regex is valid")
});

static HEIGHT_DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|;)\s*height\s*:[^;]*;?")
        .expect("HEIGHT_DECLARATION_RE: hardcoded regex is valid")
});

/// Read access to the attributes of one image element.
pub trait ImageAttributes {
    /// Value of the first attribute called `name` (ASCII case-insensitive).
    ///
    /// `Some("")` means the attribute is present but empty.
    fn attribute(&self, name: &str) -> Option<Cow<'_, str>>;

    /// Class tokens, split on any run of whitespace.
    fn class_tokens(&self) -> Vec<String> {
        self.attribute("class")
            .map(|class| class.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Value of one declaration in the inline `style` attribute.
    fn style_property(&self, property: &str) -> Option<String> {
        let style = self.attribute("style")?;
        style_property(&style, property).map(str::to_owned)
    }
}

#[derive(Debug, Clone)]
struct RawAttribute<'a> {
    name: &'a str,
    value: &'a str,
    span: Range<usize>,
}

/// A single `<img ...>` tag as it appears in markup.
#[derive(Debug, Clone)]
pub struct MarkupTag<'a> {
    raw: &'a str,
    attributes: Vec<RawAttribute<'a>>,
}

impl<'a> MarkupTag<'a> {
    /// Splits `raw` (a complete `<name ...>` tag) into attributes. Never fails; text the
    /// pattern cannot make sense of is skipped.
    pub fn parse(raw: &'a str) -> Self {
        let body_start = raw
            .char_indices()
            .skip(1)
            .find(|(_, c)| !c.is_ascii_alphanumeric())
            .map_or(raw.len(), |(idx, _)| idx);
        let body = &raw[body_start..];

        let attributes = ATTRIBUTE_RE
            .captures_iter(body)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps.get(1)?.as_str();
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map_or("", |m| m.as_str());
                Some(RawAttribute {
                    name,
                    value,
                    span: body_start + whole.start()..body_start + whole.end(),
                })
            })
            .collect();

        Self { raw, attributes }
    }

    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// The tag text with the first `name` attribute (and its leading whitespace) cut out.
    pub fn without_attribute(&self, name: &str) -> Cow<'a, str> {
        match self.find(name) {
            Some(attr) => {
                let mut out = String::with_capacity(self.raw.len());
                out.push_str(&self.raw[..attr.span.start]);
                out.push_str(&self.raw[attr.span.end..]);
                Cow::Owned(out)
            }
            None => Cow::Borrowed(self.raw),
        }
    }

    fn find(&self, name: &str) -> Option<&RawAttribute<'a>> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }
}

impl ImageAttributes for MarkupTag<'_> {
    fn attribute(&self, name: &str) -> Option<Cow<'_, str>> {
        self.find(name).map(|attr| Cow::Borrowed(attr.value))
    }
}

/// Looks up `property` in a `;` separated declaration list.
pub fn style_property<'s>(style: &'s str, property: &str) -> Option<&'s str> {
    style
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
        .map(|(_, value)| value.trim())
}

/// Parses a `<digits>[.<digits>]px` length; signs, exponents and non-finite values are
/// rejected.
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value
        .strip_suffix("px")
        .or_else(|| value.strip_suffix("PX"))?
        .trim();

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !digits(whole) || !digits(fraction) {
        return None;
    }
    number.parse().ok()
}

/// Drops the `height` declaration from an inline style, leaving `line-height` and
/// `max-height` alone.
pub fn remove_height_declaration(style: &str) -> Cow<'_, str> {
    HEIGHT_DECLARATION_RE.replace_all(style, "$1")
}

/// Sets (or replaces) one declaration, normalising the list to `name:value;` form.
pub fn set_style_property(style: &str, property: &str, value: &str) -> String {
    let mut declarations: Vec<(String, String)> = style
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect();

    match declarations
        .iter_mut()
        .find(|(name, _)| name.eq_ignore_ascii_case(property))
    {
        Some(existing) => existing.1 = value.to_string(),
        None => declarations.push((property.to_string(), value.to_string())),
    }

    declarations
        .iter()
        .map(|(name, value)| format!("{name}:{value};"))
        .collect()
}
