//! Structured views over an element's `class` and `style` attributes.
//!
//! `decode` splits the raw attribute text into an ordered, de-duplicated list
//! of class tokens and an ordered property map; `encode` writes both back.

use crate::dom::dom_tree::ElementNode;
use crate::style::owned_css::parse_declarations;

/// The decoded `class` / `style` attributes of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedAttributes {
    /// Class tokens in source order, each at most once.
    pub class_tokens: Vec<String>,
    /// Inline declarations in source order, keys unique.
    pub inline_style: InlineStyle,
    pub has_class: bool,
    pub has_style: bool,
}

/// Property -> value map that remembers insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    entries: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn contains_key(&self, property: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == property)
    }

    /// Later duplicates overwrite the value but keep the first position.
    pub fn insert(&mut self, property: String, value: String) {
        match self.entries.iter_mut().find(|(key, _)| *key == property) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((property, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// `prop: value; prop: value`, no trailing semicolon.
    pub fn to_attribute_value(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub fn decode(element: &ElementNode) -> DecodedAttributes {
    let class_attr = element.attr("class");
    let style_attr = element.attr("style");
    DecodedAttributes {
        class_tokens: class_attr.map(parse_class_tokens).unwrap_or_default(),
        inline_style: style_attr.map(parse_inline_style).unwrap_or_default(),
        has_class: class_attr.is_some(),
        has_style: style_attr.is_some(),
    }
}

/// Writes the decoded view back onto the element.
///
/// An attribute that was absent stays absent; a class attribute left with
/// no tokens is dropped entirely.
pub fn encode(element: &mut ElementNode, decoded: &DecodedAttributes) {
    if decoded.has_class {
        if decoded.class_tokens.is_empty() {
            element.remove_attr("class");
        } else {
            element.set_attr("class", decoded.class_tokens.join(" "));
        }
    }
    if decoded.has_style {
        element.set_attr("style", decoded.inline_style.to_attribute_value());
    }
}

pub fn parse_class_tokens(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in raw.split_ascii_whitespace() {
        if !tokens.iter().any(|seen| seen == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Property names keep their case, so `COLOR` and `color` are different keys.
pub fn parse_inline_style(raw: &str) -> InlineStyle {
    let mut style = InlineStyle::default();
    for declaration in parse_declarations(raw) {
        style.insert(declaration.property, declaration.value);
    }
    style
}
