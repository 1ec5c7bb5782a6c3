//! Removes `<style>` rules that inlining made redundant, together with the
//! class tokens that only existed to trigger them.
//!
//! A rule is judged by the property of its first declaration. For each
//! element the rule matches, the rule is redundant when the element's inline
//! style already has that property, or has a shorthand whose name is
//! contained in it (`margin` for a `margin-bottom` rule, after longhands were
//! merged). A redundant match drops every class token of that element that
//! appears anywhere in the selector text, and removes the rule from its block.
//!
//! Work happens in two phases per rule: all matches are decided against the
//! attributes as they are, then the decisions are written back.

use crate::dom::dom_tree::{Document, ElementNode, Handle};
use crate::error::InlineCullError;
use crate::parser::attributes::{self, DecodedAttributes, InlineStyle};
use crate::parser::dom_indices::DomIndices;
use crate::style::css_matcher::{match_elements, parse_selector_list};
use crate::style::owned_css::{OwnedRule, StyleBlock};

/// Counters for one pass over a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub style_blocks: usize,
    /// Blocks left untouched because their CSS could not be parsed.
    pub skipped_blocks: usize,
    pub rules_removed: usize,
    pub classes_removed: usize,
}

/// Which condition made a rule redundant for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redundancy {
    /// The inline style has the rule's property itself.
    Exact,
    /// The inline style has a property whose name is part of the rule's
    /// property (`margin` covers `margin-bottom`).
    ShorthandFamily,
}

/// Decision for one matched element.
#[derive(Debug)]
struct ElementDecision {
    node: Handle,
    decoded: DecodedAttributes,
    /// Indices into `decoded.class_tokens`.
    drop_tokens: Vec<usize>,
}

#[derive(Debug, Default)]
struct RuleDecision {
    remove_rule: bool,
    elements: Vec<ElementDecision>,
}

/// Runs the pass over every `<style>` element of the document, in place.
pub fn eliminate_document(document: &Document) -> PassSummary {
    let indices = DomIndices::build(document);
    let mut summary = PassSummary::default();

    for style in document.style_elements() {
        summary.style_blocks += 1;
        match cull_style_element(&indices, &style) {
            Ok((rules_removed, classes_removed)) => {
                summary.rules_removed += rules_removed;
                summary.classes_removed += classes_removed;
            }
            Err(err) => {
                log::warn!(
                    "leaving <style> block #{} as is: {}",
                    summary.style_blocks,
                    err
                );
                summary.skipped_blocks += 1;
            }
        }
    }

    log::debug!(
        "visited {} style block(s), skipped {}, removed {} rule(s) and {} class token(s)",
        summary.style_blocks,
        summary.skipped_blocks,
        summary.rules_removed,
        summary.classes_removed
    );
    summary
}

/// Processes one `<style>` element and rewrites its content.
/// Returns `(rules removed, class tokens removed)`.
fn cull_style_element(
    indices: &DomIndices,
    style: &Handle,
) -> Result<(usize, usize), InlineCullError> {
    let css_text = style
        .borrow()
        .as_element()
        .map(ElementNode::text_content)
        .unwrap_or_default();
    let mut block = StyleBlock::parse(&css_text)?;

    let rules: Vec<(usize, OwnedRule)> = block
        .rules()
        .map(|(index, rule)| (index, rule.clone()))
        .collect();

    let mut classes_removed = 0;
    for (index, rule) in &rules {
        let Some(decision) = decide_rule(indices, rule) else {
            continue;
        };
        classes_removed += apply_decision(decision.elements);
        if decision.remove_rule && block.remove(*index) {
            log::debug!("removed rule `{}`", rule.selector);
        }
    }

    if let Some(elem) = style.borrow_mut().as_element_mut() {
        elem.set_text_content(block.to_css_string());
    }
    Ok((block.removed_count(), classes_removed))
}

/// Phase one: decide, for every element the rule matches, whether the rule
/// is redundant there and which class tokens go. Nothing is mutated.
///
/// Returns `None` for rules that cannot be judged: no declarations, or a
/// selector that does not compile (such rules are kept).
fn decide_rule(indices: &DomIndices, rule: &OwnedRule) -> Option<RuleDecision> {
    let property = rule.representative_property()?;
    let selectors = match parse_selector_list(&rule.selector) {
        Ok(selectors) => selectors,
        Err(err) => {
            log::debug!("{}; keeping the rule", InlineCullError::from(err));
            return None;
        }
    };

    let mut decision = RuleDecision::default();
    for node in match_elements(indices, &selectors) {
        let decoded = match node.borrow().as_element() {
            Some(elem) => attributes::decode(elem),
            None => continue,
        };
        let drop_tokens = match redundancy(property, &decoded.inline_style) {
            Some(kind) => {
                log::trace!(
                    "`{}` is redundant ({:?}) for an element with style `{}`",
                    rule.selector,
                    kind,
                    decoded.inline_style.to_attribute_value()
                );
                decision.remove_rule = true;
                tokens_in_selector(&rule.selector, &decoded.class_tokens)
            }
            None => Vec::new(),
        };
        decision.elements.push(ElementDecision {
            node,
            decoded,
            drop_tokens,
        });
    }
    Some(decision)
}

/// Phase two: drop the chosen tokens and write `class`/`style` back onto
/// every matched element, changed or not. Returns the number of tokens dropped.
fn apply_decision(elements: Vec<ElementDecision>) -> usize {
    let mut dropped = 0;
    for ElementDecision {
        node,
        mut decoded,
        drop_tokens,
    } in elements
    {
        dropped += drop_tokens.len();
        decoded.class_tokens = decoded
            .class_tokens
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !drop_tokens.contains(index))
            .map(|(_, token)| token)
            .collect();
        if let Some(elem) = node.borrow_mut().as_element_mut() {
            attributes::encode(elem, &decoded);
        }
    }
    dropped
}

/// The redundancy predicate for one element.
///
/// Both checks are plain substring/equality tests on property names, which
/// means `max-width` is considered covered by an inline `width`.
pub fn redundancy(property: &str, inline_style: &InlineStyle) -> Option<Redundancy> {
    if inline_style.contains_key(property) {
        return Some(Redundancy::Exact);
    }
    if inline_style.keys().any(|key| property.contains(key)) {
        return Some(Redundancy::ShorthandFamily);
    }
    None
}

/// Indices of the class tokens that occur anywhere in the selector text.
///
/// Deliberately loose: `.m-0` also claims a token `m`, and `#valid` claims `id`.
pub fn tokens_in_selector(selector: &str, class_tokens: &[String]) -> Vec<usize> {
    class_tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| selector.contains(token.as_str()))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::attributes::parse_inline_style;
    use crate::parser::html::{create_dom_tree, serialize_document};
    use pretty_assertions::assert_eq;

    fn run(html: &str) -> (String, PassSummary) {
        let document = create_dom_tree(html);
        let summary = eliminate_document(&document);
        (serialize_document(&document).unwrap(), summary)
    }

    #[test]
    fn test_redundancy_predicate() {
        let style = parse_inline_style("margin: 0 0 16px; color: red");
        assert_eq!(redundancy("color", &style), Some(Redundancy::Exact));
        assert_eq!(
            redundancy("margin-bottom", &style),
            Some(Redundancy::ShorthandFamily)
        );
        assert_eq!(redundancy("padding", &style), None);
        // Containment runs one way only: the inline key must sit inside the property.
        assert_eq!(redundancy("marg", &style), None);
        // Property names are compared as written.
        assert_eq!(redundancy("COLOR", &style), None);
    }

    #[test]
    fn test_substring_sharp_edges() {
        let style = parse_inline_style("width: 600px");
        assert_eq!(
            redundancy("max-width", &style),
            Some(Redundancy::ShorthandFamily)
        );
        let tokens = vec!["id".to_string(), "other".to_string()];
        assert_eq!(tokens_in_selector("#valid", &tokens), vec![0]);
    }

    #[test]
    fn test_exact_match_removes_rule_and_class() {
        let (out, summary) =
            run(r#"<style>.foo { color: red }</style><p class="foo" style="color: red">x</p>"#);
        assert_eq!(out, r#"<style></style><p style="color: red">x</p>"#);
        assert_eq!(summary.rules_removed, 1);
        assert_eq!(summary.classes_removed, 1);
    }

    #[test]
    fn test_rule_without_declarations_is_skipped() {
        let html = r#"<style>.foo {}</style><p class="foo" style="color: red;">x</p>"#;
        let (out, summary) = run(html);
        // Nothing matched, so not even the style attribute is rewritten.
        assert_eq!(out, html);
        assert_eq!(summary.rules_removed, 0);
    }

    #[test]
    fn test_per_element_independence() {
        let (out, summary) = run(concat!(
            r#"<style>.c { color: red }</style>"#,
            r#"<p class="c a" style="color: red">1</p>"#,
            r#"<p class="c b">2</p>"#
        ));
        assert_eq!(
            out,
            concat!(
                r#"<style></style>"#,
                r#"<p class="a" style="color: red">1</p>"#,
                r#"<p class="c b">2</p>"#
            )
        );
        assert_eq!(summary.classes_removed, 1);
    }

    #[test]
    fn test_invalid_selector_keeps_rule() {
        let html =
            r#"<style>.1col { color: red }</style><p class="1col" style="color: red">x</p>"#;
        let (out, summary) = run(html);
        assert_eq!(out, html);
        assert_eq!(summary.rules_removed, 0);
    }

    #[test]
    fn test_unparseable_block_is_left_alone_but_others_are_pruned() {
        let (out, summary) = run(concat!(
            r#"<style>.a { color: red</style>"#,
            r#"<style>.b { color: red }</style>"#,
            r#"<p class="a b" style="color: red">x</p>"#
        ));
        assert_eq!(
            out,
            concat!(
                r#"<style>.a { color: red</style>"#,
                r#"<style></style>"#,
                r#"<p class="a" style="color: red">x</p>"#
            )
        );
        assert_eq!(summary.style_blocks, 2);
        assert_eq!(summary.skipped_blocks, 1);
    }

    #[test]
    fn test_earlier_pruning_is_seen_by_later_rules() {
        // Once `.x` is dropped from the element, the second `.x` rule no longer matches it.
        let (out, summary) = run(concat!(
            r#"<style>.x { color: red } .x { padding: 0 }</style>"#,
            r#"<p class="x" style="color: red; padding: 0">x</p>"#
        ));
        assert_eq!(
            out,
            concat!(
                r#"<style>.x { padding: 0 }</style>"#,
                r#"<p style="color: red; padding: 0">x</p>"#
            )
        );
        assert_eq!(summary.rules_removed, 1);
    }
}
