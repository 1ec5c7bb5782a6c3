use crate::dom::dom_tree::{ElementNode, Handle, Node};
use crate::error::SelectorError;
use crate::parser::attributes::parse_class_tokens;
use crate::parser::dom_indices::DomIndices;
use cssparser::{ParseError, Parser, ParserInput, SourcePosition, Token};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use std::collections::HashSet;
use std::rc::Rc;

/// ------------------------------
/// 1. Selector Parsing
/// ------------------------------

/// Supported attribute selector operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeOperator {
    /// [attr="value"]
    Exact,
    /// [attr~="value"]
    Includes,
    /// [attr|="value"]
    DashMatch,
    /// [attr^="value"]
    Prefix,
    /// [attr$="value"]
    Suffix,
    /// [attr*="value"]
    Substring,
}

/// Represents one attribute condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    pub name: String,
    pub operator: Option<AttributeOperator>, // None means only existence check
    pub value: Option<String>,
    /// `[attr="value" i]`
    pub case_insensitive: bool,
}

/// A compound selector: an optional tag, id, classes, attribute conditions
/// and pseudo-classes/elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: HashSet<String>,
    pub attributes: Vec<AttributeSelector>,
    /// Pseudo-class and pseudo-element names, without colons or arguments.
    pub pseudos: Vec<String>,
}

/// A complex selector composed of a key compound selector and a list of ancestor parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub key: CompoundSelector,
    /// Ancestors with their combinators, in right-to-left order.
    pub ancestors: Vec<(Combinator, CompoundSelector)>,
}

/// A comma-separated group of complex selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<ComplexSelector>,
}

/// Supported combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Descendant combinator (a space).
    Descendant,
    /// Child combinator (`>`).
    Child,
    /// Adjacent sibling combinator (`+`).
    AdjacentSibling,
    /// General sibling combinator (`~`).
    GeneralSibling,
}

/// Parse a selector list such as `"h1.title, .card > p"`.
///
/// The text is first run through lightningcss so anything a CSS parser would
/// reject is reported as an error before the matcher builds its own structure.
pub fn parse_selector_list(selector: &str) -> Result<SelectorList, SelectorError> {
    validate_selector(selector)?;
    let selectors = split_selector_list(selector)
        .map_err(|_| SelectorError::new(selector, "malformed selector list"))?
        .into_iter()
        .map(|part| {
            parse_complex_selector(part.trim())
                .map_err(|reason| SelectorError::new(selector, reason))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SelectorList { selectors })
}

fn validate_selector(selector: &str) -> Result<(), SelectorError> {
    if selector.trim().is_empty() {
        return Err(SelectorError::new(selector, "empty selector"));
    }
    let sheet_text = format!("{}{{}}", selector);
    let result = match StyleSheet::parse(&sheet_text, ParserOptions::default()) {
        Ok(_) => Ok(()),
        Err(err) => Err(SelectorError::new(selector, err.to_string())),
    };
    result
}

/// Parse a complex selector string (e.g. "div.red > p#header + span.foo") into a ComplexSelector.
pub fn parse_complex_selector(selector: &str) -> Result<ComplexSelector, String> {
    let mut compounds: Vec<CompoundSelector> = Vec::new();
    let mut combinators: Vec<Combinator> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize_complex(selector)? {
        match token {
            ComplexToken::Combinator(combinator) => {
                if compounds.is_empty() {
                    return Err(format!("selector starts with combinator {:?}", combinator));
                }
                // An explicit combinator overrides the whitespace around it.
                pending = match (pending, combinator) {
                    (Some(Combinator::Descendant), explicit) | (None, explicit) => Some(explicit),
                    (Some(previous), Combinator::Descendant) => Some(previous),
                    (Some(_), _) => return Err("two combinators in a row".to_string()),
                };
            }
            ComplexToken::Compound(text) => {
                let compound = parse_compound_selector(text)?;
                if !compounds.is_empty() {
                    combinators.push(pending.take().unwrap_or(Combinator::Descendant));
                }
                compounds.push(compound);
            }
        }
    }

    if matches!(pending, Some(explicit) if explicit != Combinator::Descendant) {
        return Err("selector ends with a combinator".to_string());
    }
    let Some(key) = compounds.pop() else {
        return Err("empty selector".to_string());
    };
    let ancestors = combinators
        .into_iter()
        .rev()
        .zip(compounds.into_iter().rev())
        .collect();
    Ok(ComplexSelector { key, ancestors })
}

enum ComplexToken<'a> {
    Compound(&'a str),
    Combinator(Combinator),
}

/// Splits a compound/combinator sequence. Brackets, parentheses and strings
/// are single tokens to cssparser, so `[title="a > b"]` stays in one piece.
fn tokenize_complex(selector: &str) -> Result<Vec<ComplexToken<'_>>, String> {
    let mut input = ParserInput::new(selector);
    let mut parser = Parser::new(&mut input);
    let mut tokens = Vec::new();
    let mut compound_start: Option<SourcePosition> = None;

    loop {
        let start = parser.position();
        let combinator = match parser.next_including_whitespace() {
            Ok(Token::WhiteSpace(_)) => Some(Combinator::Descendant),
            Ok(Token::Delim('>')) => Some(Combinator::Child),
            Ok(Token::Delim('+')) => Some(Combinator::AdjacentSibling),
            Ok(Token::Delim('~')) => Some(Combinator::GeneralSibling),
            Ok(
                token @ (Token::CloseSquareBracket
                | Token::CloseParenthesis
                | Token::CloseCurlyBracket),
            ) => return Err(format!("unbalanced `{:?}`", token)),
            Ok(_) => None,
            Err(_) => break,
        };
        match combinator {
            Some(combinator) => {
                if let Some(begin) = compound_start.take() {
                    tokens.push(ComplexToken::Compound(parser.slice(begin..start)));
                }
                tokens.push(ComplexToken::Combinator(combinator));
            }
            None => {
                compound_start.get_or_insert(start);
            }
        }
    }
    if let Some(begin) = compound_start {
        tokens.push(ComplexToken::Compound(parser.slice_from(begin)));
    }
    Ok(tokens)
}

/// Top-level comma split; commas inside `:is(a, b)` or `[title="a,b"]` are kept.
fn split_selector_list(selector: &str) -> Result<Vec<&str>, ParseError<'_, ()>> {
    let mut input = ParserInput::new(selector);
    let mut parser = Parser::new(&mut input);
    parser.parse_comma_separated(|part| {
        let start = part.position();
        while part.next_including_whitespace_and_comments().is_ok() {}
        Ok(part.slice_from(start).trim())
    })
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
}

/// Reads an identifier, resolving backslash escapes (`.sm\:hidden` -> `sm:hidden`).
fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&ch) = chars.peek() {
        if ch == '\\' {
            chars.next();
            if let Some(escaped) = chars.next() {
                ident.push(escaped);
            }
        } else if is_ident_char(ch) {
            ident.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|ch| ch.is_whitespace()) {
        chars.next();
    }
}

/// Parse a compound selector string, e.g. "div.red#header[disabled][data-type~=\"main\"]:hover"
pub fn parse_compound_selector(selector: &str) -> Result<CompoundSelector, String> {
    let mut compound = CompoundSelector::default();
    let mut chars = selector.chars().peekable();

    // If first char is alphabetic or '*' assume tag.
    match chars.peek() {
        Some('*') => {
            chars.next();
        }
        Some(&ch) if is_ident_char(ch) || ch == '\\' => {
            compound.tag = Some(read_ident(&mut chars).to_ascii_lowercase());
        }
        _ => {}
    }

    while let Some(ch) = chars.next() {
        match ch {
            '#' => {
                let id = read_ident(&mut chars);
                if id.is_empty() {
                    return Err("empty id selector".to_string());
                }
                compound.id = Some(id);
            }
            '.' => {
                let class = read_ident(&mut chars);
                if class.is_empty() {
                    return Err("empty class selector".to_string());
                }
                compound.classes.insert(class);
            }
            '[' => compound.attributes.push(parse_attribute_selector(&mut chars)?),
            ':' => {
                if chars.peek() == Some(&':') {
                    chars.next();
                }
                let name = read_ident(&mut chars);
                if name.is_empty() {
                    return Err("empty pseudo selector".to_string());
                }
                if chars.peek() == Some(&'(') {
                    skip_parenthesized(&mut chars)?;
                }
                compound.pseudos.push(name.to_ascii_lowercase());
            }
            other => return Err(format!("unexpected `{}` in `{}`", other, selector)),
        }
    }

    Ok(compound)
}

fn skip_parenthesized(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<(), String> {
    let mut depth = 0usize;
    for ch in chars.by_ref() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    Err("unclosed `(`".to_string())
}

fn parse_attribute_selector(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<AttributeSelector, String> {
    skip_whitespace(chars);
    let name = read_ident(chars).to_ascii_lowercase();
    if name.is_empty() {
        return Err("empty attribute name".to_string());
    }
    skip_whitespace(chars);

    let mut operator = None;
    let mut value = None;
    let mut case_insensitive = false;

    if let Some(&ch) = chars.peek() {
        if ch != ']' {
            chars.next();
            operator = Some(match ch {
                '=' => AttributeOperator::Exact,
                '~' | '|' | '^' | '$' | '*' => {
                    if chars.next() != Some('=') {
                        return Err(format!("expected `=` after `{}`", ch));
                    }
                    match ch {
                        '~' => AttributeOperator::Includes,
                        '|' => AttributeOperator::DashMatch,
                        '^' => AttributeOperator::Prefix,
                        '$' => AttributeOperator::Suffix,
                        _ => AttributeOperator::Substring,
                    }
                }
                other => return Err(format!("unexpected `{}` in attribute selector", other)),
            });
            skip_whitespace(chars);
            value = Some(match chars.peek() {
                Some(&quote) if quote == '"' || quote == '\'' => {
                    chars.next();
                    let mut buffer = String::new();
                    loop {
                        match chars.next() {
                            Some('\\') => {
                                if let Some(escaped) = chars.next() {
                                    buffer.push(escaped);
                                }
                            }
                            Some(c) if c == quote => break,
                            Some(c) => buffer.push(c),
                            None => return Err("unterminated string".to_string()),
                        }
                    }
                    buffer
                }
                _ => read_ident(chars),
            });
            skip_whitespace(chars);
            if matches!(chars.peek(), Some('i' | 'I')) {
                chars.next();
                case_insensitive = true;
            } else if matches!(chars.peek(), Some('s' | 'S')) {
                chars.next();
            }
            skip_whitespace(chars);
        }
    }

    if chars.next() != Some(']') {
        return Err("expected `]`".to_string());
    }
    Ok(AttributeSelector {
        name,
        operator,
        value,
        case_insensitive,
    })
}

/// ------------------------------
/// 2. Selector Matching
/// ------------------------------

/// Returns every element matching the selector list, once each, in document order.
pub fn match_elements(
    indices: &DomIndices,
    selectors: &SelectorList,
) -> Vec<Handle> {
    let mut matched: Vec<Handle> = Vec::new();
    let mut seen: HashSet<usize> = HashSet::new();
    for complex in &selectors.selectors {
        for candidate in candidates(indices, &complex.key) {
            if matches_complex_selector(candidate, complex)
                && seen.insert(Rc::as_ptr(candidate) as usize)
            {
                matched.push(Rc::clone(candidate));
            }
        }
    }
    if selectors.selectors.len() > 1 {
        matched.sort_by_key(|node| indices.position(node).unwrap_or(usize::MAX));
    }
    matched
}

/// Narrowest index bucket for the key compound; always a superset of the matches.
fn candidates<'a>(indices: &'a DomIndices, key: &CompoundSelector) -> &'a [Handle] {
    if let Some(id) = &key.id {
        return indices.id_map.get(id).map(Vec::as_slice).unwrap_or(&[]);
    }
    if let Some(class) = key.classes.iter().next() {
        return indices.class_map.get(class).map(Vec::as_slice).unwrap_or(&[]);
    }
    if let Some(tag) = &key.tag {
        return indices.tag_map.get(tag).map(Vec::as_slice).unwrap_or(&[]);
    }
    &indices.elements
}

/// Returns true if the given ElementNode matches the CompoundSelector.
/// Checks tag, id, classes, and attribute conditions. Pseudo-classes and
/// pseudo-elements describe runtime state (or generated boxes) and never
/// match a static element; `:root` is the exception, see `matches_at`.
pub fn matches_compound(elem: &ElementNode, compound: &CompoundSelector) -> bool {
    if compound.pseudos.iter().any(|pseudo| pseudo != "root") {
        return false;
    }
    if let Some(ref tag) = compound.tag {
        if !elem.tag.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(ref id_val) = compound.id {
        if elem.attr("id") != Some(id_val.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let Some(class_attr) = elem.attr("class") else {
            return false;
        };
        let elem_classes: HashSet<String> =
            parse_class_tokens(class_attr).into_iter().collect();
        if !compound.classes.is_subset(&elem_classes) {
            return false;
        }
    }
    compound
        .attributes
        .iter()
        .all(|attr_sel| matches_attribute(elem, attr_sel))
}

fn matches_attribute(elem: &ElementNode, attr_sel: &AttributeSelector) -> bool {
    let Some(actual) = elem
        .attributes
        .iter()
        .find(|(name, _)| (*name.local).eq_ignore_ascii_case(attr_sel.name.as_str()))
        .map(|(_, value)| value.as_str())
    else {
        return false;
    };
    let (Some(operator), Some(expected)) = (&attr_sel.operator, &attr_sel.value) else {
        // No operator means just existence; already confirmed.
        return true;
    };
    let (actual, expected) = if attr_sel.case_insensitive {
        (actual.to_lowercase(), expected.to_lowercase())
    } else {
        (actual.to_string(), expected.clone())
    };
    match operator {
        AttributeOperator::Exact => actual == expected,
        AttributeOperator::Includes => actual.split_ascii_whitespace().any(|word| word == expected),
        AttributeOperator::DashMatch => {
            actual == expected || actual.starts_with(&format!("{}-", expected))
        }
        AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
        AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
        AttributeOperator::Substring => !expected.is_empty() && actual.contains(&expected),
    }
}

/// Matches a ComplexSelector against a candidate Element.
/// The matching proceeds right-to-left and backtracks over descendant and
/// general-sibling combinators.
pub fn matches_complex_selector(candidate: &Handle, complex: &ComplexSelector) -> bool {
    matches_at(candidate, &complex.key) && matches_ancestors(candidate, &complex.ancestors)
}

fn matches_at(node: &Handle, compound: &CompoundSelector) -> bool {
    let node_ref = node.borrow();
    let Node::Element(elem) = &*node_ref else {
        return false;
    };
    if !matches_compound(elem, compound) {
        return false;
    }
    if compound.pseudos.iter().any(|pseudo| pseudo == "root") {
        let Some(parent) = get_parent(node) else {
            return false;
        };
        let is_root = matches!(&*parent.borrow(), Node::DocumentRoot(_));
        return is_root;
    }
    true
}

fn matches_ancestors(current: &Handle, rest: &[(Combinator, CompoundSelector)]) -> bool {
    let Some(((combinator, compound), remaining)) = rest.split_first() else {
        return true;
    };
    match combinator {
        Combinator::Child => get_parent(current).is_some_and(|parent| {
            matches_at(&parent, compound) && matches_ancestors(&parent, remaining)
        }),
        Combinator::Descendant => {
            let mut ancestor = get_parent(current);
            while let Some(node) = ancestor {
                if matches_at(&node, compound) && matches_ancestors(&node, remaining) {
                    return true;
                }
                ancestor = get_parent(&node);
            }
            false
        }
        Combinator::AdjacentSibling => previous_element_siblings(current)
            .into_iter()
            .next()
            .is_some_and(|sibling| {
                matches_at(&sibling, compound) && matches_ancestors(&sibling, remaining)
            }),
        Combinator::GeneralSibling => previous_element_siblings(current)
            .into_iter()
            .any(|sibling| {
                matches_at(&sibling, compound) && matches_ancestors(&sibling, remaining)
            }),
    }
}

/// Helper: get parent pointer from a node.
fn get_parent(node: &Handle) -> Option<Handle> {
    match &*node.borrow() {
        Node::Element(elem) => elem.parent.as_ref().and_then(|weak| weak.upgrade()),
        _ => None,
    }
}

/// Helper: previous element siblings, nearest first.
fn previous_element_siblings(node: &Handle) -> Vec<Handle> {
    let Some(parent) = get_parent(node) else {
        return Vec::new();
    };
    let parent_ref = parent.borrow();
    let siblings = parent_ref.children();
    let Some(index) = siblings.iter().position(|child| Rc::ptr_eq(child, node)) else {
        return Vec::new();
    };
    let elements: Vec<Handle> = siblings[..index]
        .iter()
        .rev()
        .filter(|child| matches!(&*child.borrow(), Node::Element(_)))
        .cloned()
        .collect();
    elements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::html::create_dom_tree;
    use pretty_assertions::assert_eq;

    fn matched_ids(html: &str, selector: &str) -> Vec<String> {
        let document = create_dom_tree(html);
        let indices = DomIndices::build(&document);
        let list = parse_selector_list(selector).unwrap();
        match_elements(&indices, &list)
            .iter()
            .filter_map(|node| {
                node.borrow()
                    .as_element()
                    .and_then(|elem| elem.attr("id").map(str::to_string))
            })
            .collect()
    }

    const TREE: &str = r#"
        <div id="outer" class="card" data-ogsc="">
          <h1 id="title" class="m-0 title">Title</h1>
          <p id="first" class="copy" lang="en-US">one</p>
          <p id="second" class="copy hidden">two</p>
          <section id="inner"><p id="deep" class="copy">three</p></section>
        </div>
        <p id="outside" class="copy">four</p>
    "#;

    #[test]
    fn test_parse_compound_selector() {
        let compound =
            parse_compound_selector("div.red.big#header[data-type~=\"main\"]:hover").unwrap();
        assert_eq!(compound.tag.as_deref(), Some("div"));
        assert_eq!(compound.id.as_deref(), Some("header"));
        assert_eq!(compound.classes.len(), 2);
        assert_eq!(
            compound.attributes[0].operator,
            Some(AttributeOperator::Includes)
        );
        assert_eq!(compound.attributes[0].value.as_deref(), Some("main"));
        assert_eq!(compound.pseudos, vec!["hover".to_string()]);
    }

    #[test]
    fn test_parse_complex_selector_without_spaces() {
        let complex = parse_complex_selector("ul>li+li").unwrap();
        assert_eq!(complex.key.tag.as_deref(), Some("li"));
        assert_eq!(complex.ancestors.len(), 2);
        assert_eq!(complex.ancestors[0].0, Combinator::AdjacentSibling);
        assert_eq!(complex.ancestors[1].0, Combinator::Child);
        assert_eq!(complex.ancestors[1].1.tag.as_deref(), Some("ul"));
    }

    #[test]
    fn test_escaped_class_names() {
        let compound = parse_compound_selector(r".sm\:hidden").unwrap();
        assert!(compound.classes.contains("sm:hidden"));
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(parse_selector_list("").is_err());
        assert!(parse_selector_list(".").is_err());
        assert!(parse_selector_list("div >").is_err());
        assert!(parse_selector_list("> div").is_err());
        assert!(parse_selector_list("[data-x").is_err());
        assert!(parse_selector_list(".1col").is_err());
    }

    #[test]
    fn test_class_and_type_matching() {
        assert_eq!(
            matched_ids(TREE, ".copy"),
            vec!["first", "second", "deep", "outside"]
        );
        assert_eq!(matched_ids(TREE, "h1"), vec!["title"]);
        assert_eq!(matched_ids(TREE, "p.copy.hidden"), vec!["second"]);
        assert_eq!(matched_ids(TREE, "#title"), vec!["title"]);
    }

    #[test]
    fn test_combinators() {
        assert_eq!(matched_ids(TREE, ".card > .copy"), vec!["first", "second"]);
        assert_eq!(matched_ids(TREE, ".card .copy"), vec!["first", "second", "deep"]);
        assert_eq!(matched_ids(TREE, "h1 + p"), vec!["first"]);
        assert_eq!(matched_ids(TREE, "h1 ~ p"), vec!["first", "second"]);
        assert_eq!(matched_ids(TREE, "[data-ogsc] .hidden"), vec!["second"]);
    }

    #[test]
    fn test_attribute_operators() {
        assert_eq!(matched_ids(TREE, "[lang|=en]"), vec!["first"]);
        assert_eq!(matched_ids(TREE, "[lang^=\"en\"]"), vec!["first"]);
        assert_eq!(matched_ids(TREE, "[lang$=us i]"), vec!["first"]);
        assert_eq!(matched_ids(TREE, "[class*=hid]"), vec!["second"]);
    }

    #[test]
    fn test_selector_list_is_in_document_order() {
        assert_eq!(
            matched_ids(TREE, "#outside, #title"),
            vec!["title", "outside"]
        );
        assert_eq!(
            matched_ids(TREE, ".hidden, p.copy"),
            vec!["first", "second", "deep", "outside"]
        );
    }

    #[test]
    fn test_quoted_brackets_and_commas_in_attribute_values() {
        let html = r#"<p id="a" title="]"></p><p id="b" title="x, y > z"></p>"#;
        assert_eq!(matched_ids(html, r#"[title="]"]"#), vec!["a"]);
        assert_eq!(matched_ids(html, r#"p[title="x, y > z"]"#), vec!["b"]);
        assert_eq!(
            parse_selector_list(r#"[title="]"], .x"#).unwrap().selectors.len(),
            2
        );
    }

    #[test]
    fn test_pseudo_classes_never_match() {
        assert!(matched_ids(TREE, ".title:hover").is_empty());
        assert!(matched_ids(TREE, "p::first-line").is_empty());
        assert!(matched_ids(TREE, "p:not(.copy)").is_empty());
    }
}
