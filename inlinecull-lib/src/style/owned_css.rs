// src/style/owned_css.rs: a source-preserving, fully-owned view of one <style> block.
//
// cssparser splits the block into top-level items; every item keeps the exact
// source span it was parsed from, so rules that survive a pass are written
// back byte for byte.
use crate::error::CssParseError;
use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, ParseErrorKind, Parser, ParserInput,
    ParserState, QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser, Token,
};
use std::fmt;

/// The parsed contents of one `<style>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBlock {
    nodes: Vec<CssNode>,
    removed: Vec<bool>,
    /// Raw text after the last node (usually the indentation before `</style>`).
    after: String,
}

/// One top-level item of a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssNode {
    /// Whitespace between the previous node and this one.
    pub before: String,
    /// Source text of the node itself, from its first byte to its last.
    pub raw: String,
    pub kind: CssNodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssNodeKind {
    Rule(OwnedRule),
    /// `@media`, `@font-face`, `@import`... never looked into.
    AtRule(AtRule),
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRule {
    /// e.g. "div", ".red", "[data-ogsc] .hidden"
    pub selector: String,
    pub declarations: Vec<OwnedDeclaration>,
}

/// A declaration as written: the property keeps its case and the value its
/// source text (`!important` included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedDeclaration {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    pub name: String,
}

impl OwnedRule {
    /// Property of the first declaration; the rule is judged by this alone.
    pub fn representative_property(&self) -> Option<&str> {
        self.declarations.first().map(|decl| decl.property.as_str())
    }
}

impl StyleBlock {
    pub fn parse(css_text: &str) -> Result<StyleBlock, CssParseError> {
        let mut input = ParserInput::new(css_text);
        let mut parser = Parser::new(&mut input);
        let mut top_level = TopLevelParser;
        let mut items = StyleSheetParser::new(&mut parser, &mut top_level);

        let mut nodes = Vec::new();
        let mut gap_start = 0;
        while let Some(item) = items.next() {
            let end = items.input.position().byte_index();
            let item = item.map_err(|(err, _)| {
                into_css_error(err, first_non_whitespace(css_text, gap_start))
            })?;

            let before = split_gap(css_text, gap_start, item.start(), &mut nodes)?;
            // A closed block leaves its `}` between the content and `end`.
            if item.content_end() == Some(end) {
                return Err(CssParseError::UnclosedBlock(item.start()));
            }
            let raw = &css_text[item.start()..end];
            nodes.push(CssNode {
                before,
                raw: raw.to_string(),
                kind: item.into_kind(),
            });
            gap_start = end;
        }

        let after = split_gap(css_text, gap_start, css_text.len(), &mut nodes)?;
        Ok(StyleBlock {
            removed: vec![false; nodes.len()],
            nodes,
            after,
        })
    }

    pub fn nodes(&self) -> &[CssNode] {
        &self.nodes
    }

    /// Top-level style rules with their node index. Rules nested in at-rules
    /// are not part of this list.
    pub fn rules(&self) -> impl Iterator<Item = (usize, &OwnedRule)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match &node.kind {
                CssNodeKind::Rule(rule) => Some((index, rule)),
                _ => None,
            })
    }

    /// Marks a top-level rule as removed. Returns `true` only the first time.
    ///
    /// At-rules and comments are never removed.
    pub fn remove(&mut self, index: usize) -> bool {
        match self.nodes.get(index).map(|node| &node.kind) {
            Some(CssNodeKind::Rule(_)) if !self.removed[index] => {
                self.removed[index] = true;
                true
            }
            _ => false,
        }
    }

    pub fn removed_count(&self) -> usize {
        self.removed.iter().filter(|removed| **removed).count()
    }

    pub fn to_css_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StyleBlock {
    /// Writes the surviving nodes in source order. A removed node takes its
    /// leading whitespace with it, except that when the first node goes the
    /// next survivor inherits its indentation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inherited = match (self.nodes.first(), self.removed.first()) {
            (Some(first), Some(true)) => Some(first.before.as_str()),
            _ => None,
        };
        let mut leading = true;
        for (node, removed) in self.nodes.iter().zip(&self.removed) {
            if *removed {
                continue;
            }
            let before = match inherited {
                Some(before) if leading => before,
                _ => node.before.as_str(),
            };
            leading = false;
            write!(f, "{}{}", before, node.raw)?;
        }
        f.write_str(&self.after)
    }
}

/// Parses a declaration list such as the contents of a `style` attribute.
/// Items that are not `property: value` are dropped.
pub fn parse_declarations(text: &str) -> Vec<OwnedDeclaration> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    parse_declaration_list(&mut parser)
}

fn parse_declaration_list(input: &mut Parser<'_, '_>) -> Vec<OwnedDeclaration> {
    let mut collector = DeclarationCollector;
    RuleBodyParser::new(input, &mut collector)
        .flatten()
        .collect()
}

/// ------------------------------
/// Top-level items
/// ------------------------------

/// `content_end` is where the block's content stops, before its `}`.
enum TopLevelItem {
    Rule {
        start: usize,
        content_end: usize,
        rule: OwnedRule,
    },
    AtRule {
        start: usize,
        content_end: Option<usize>,
        name: String,
    },
}

impl TopLevelItem {
    fn start(&self) -> usize {
        match self {
            TopLevelItem::Rule { start, .. } | TopLevelItem::AtRule { start, .. } => *start,
        }
    }

    fn content_end(&self) -> Option<usize> {
        match self {
            TopLevelItem::Rule { content_end, .. } => Some(*content_end),
            TopLevelItem::AtRule { content_end, .. } => *content_end,
        }
    }

    fn into_kind(self) -> CssNodeKind {
        match self {
            TopLevelItem::Rule { rule, .. } => CssNodeKind::Rule(rule),
            TopLevelItem::AtRule { name, .. } => CssNodeKind::AtRule(AtRule { name }),
        }
    }
}

struct TopLevelParser;

impl<'i> QualifiedRuleParser<'i> for TopLevelParser {
    /// The selector text, comments removed.
    type Prelude = String;
    type QualifiedRule = TopLevelItem;
    type Error = CssParseError;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let state = input.state();
        consume_checked(input)?;
        input.reset(&state);
        Ok(text_without_comments(input).trim().to_string())
    }

    fn parse_block<'t>(
        &mut self,
        selector: Self::Prelude,
        start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let state = input.state();
        consume_checked(input)?;
        let content_end = input.position().byte_index();
        input.reset(&state);
        Ok(TopLevelItem::Rule {
            start: start.position().byte_index(),
            content_end,
            rule: OwnedRule {
                selector,
                declarations: parse_declaration_list(input),
            },
        })
    }
}

impl<'i> AtRuleParser<'i> for TopLevelParser {
    /// The lowercased at-rule name.
    type Prelude = String;
    type AtRule = TopLevelItem;
    type Error = CssParseError;

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        consume_checked(input)?;
        Ok(name.to_ascii_lowercase())
    }

    fn rule_without_block(
        &mut self,
        name: Self::Prelude,
        start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        Ok(TopLevelItem::AtRule {
            start: start.position().byte_index(),
            content_end: None,
            name,
        })
    }

    fn parse_block<'t>(
        &mut self,
        name: Self::Prelude,
        start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        consume_checked(input)?;
        Ok(TopLevelItem::AtRule {
            start: start.position().byte_index(),
            content_end: Some(input.position().byte_index()),
            name,
        })
    }
}

/// ------------------------------
/// Declarations
/// ------------------------------

struct DeclarationCollector;

impl<'i> DeclarationParser<'i> for DeclarationCollector {
    type Declaration = OwnedDeclaration;
    type Error = CssParseError;

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _declaration_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(OwnedDeclaration {
            property: name.to_string(),
            value: input.slice_from(start).trim().to_string(),
        })
    }
}

impl<'i> AtRuleParser<'i> for DeclarationCollector {
    type Prelude = ();
    type AtRule = OwnedDeclaration;
    type Error = CssParseError;
}

impl<'i> QualifiedRuleParser<'i> for DeclarationCollector {
    type Prelude = ();
    type QualifiedRule = OwnedDeclaration;
    type Error = CssParseError;
}

impl<'i> RuleBodyItemParser<'i, OwnedDeclaration, CssParseError> for DeclarationCollector {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

/// ------------------------------
/// Source checks
/// ------------------------------

/// Walks every token left in `input`, nested blocks included, and rejects
/// the unterminated strings, comments and blocks the tokenizer tolerates.
fn consume_checked<'i>(input: &mut Parser<'i, '_>) -> Result<(), ParseError<'i, CssParseError>> {
    loop {
        let start = input.position();
        let token = match input.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        let offset = start.byte_index();
        let problem = match token {
            Token::Comment(_) if !is_closed_comment(input.slice_from(start)) => {
                Some(CssParseError::UnterminatedComment(offset))
            }
            Token::QuotedString(_) if !is_closed_string(input.slice_from(start)) => {
                Some(CssParseError::UnterminatedString(offset))
            }
            Token::BadString(_) | Token::BadUrl(_) => {
                Some(CssParseError::UnterminatedString(offset))
            }
            Token::CloseCurlyBracket => Some(CssParseError::UnexpectedCloseBrace(offset)),
            Token::CurlyBracketBlock
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::Function(_) => {
                let content_end = input.parse_nested_block(|nested| {
                    consume_checked(nested)?;
                    Ok(nested.position())
                })?;
                // The closing bracket is missing when nothing follows the content.
                if input.slice(content_end..input.position()).is_empty() {
                    Some(CssParseError::UnclosedBlock(offset))
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(problem) = problem {
            return Err(input.new_custom_error(problem));
        }
    }
}

fn text_without_comments(input: &mut Parser<'_, '_>) -> String {
    let mut text = String::new();
    let mut chunk_start = input.position();
    loop {
        let start = input.position();
        let is_comment = match input.next_including_whitespace_and_comments() {
            Ok(token) => matches!(token, Token::Comment(_)),
            Err(_) => break,
        };
        if is_comment {
            text.push_str(input.slice(chunk_start..start));
            chunk_start = input.position();
        }
    }
    text.push_str(input.slice_from(chunk_start));
    text
}

/// Turns the comments in `css_text[from..to]` into comment nodes and returns
/// the whitespace left after the last one.
fn split_gap(
    css_text: &str,
    from: usize,
    to: usize,
    nodes: &mut Vec<CssNode>,
) -> Result<String, CssParseError> {
    let gap = &css_text[from..to];
    let mut input = ParserInput::new(gap);
    let mut parser = Parser::new(&mut input);
    let mut pending = parser.position();
    loop {
        let start = parser.position();
        let is_comment = match parser.next_including_whitespace_and_comments() {
            Ok(token) => matches!(token, Token::Comment(_)),
            Err(_) => break,
        };
        if !is_comment {
            continue;
        }
        let raw = parser.slice_from(start);
        if !is_closed_comment(raw) {
            return Err(CssParseError::UnterminatedComment(from + start.byte_index()));
        }
        nodes.push(CssNode {
            before: parser.slice(pending..start).to_string(),
            raw: raw.to_string(),
            kind: CssNodeKind::Comment,
        });
        pending = parser.position();
    }
    Ok(parser.slice_from(pending).to_string())
}

fn is_closed_comment(raw: &str) -> bool {
    raw.len() >= 4 && raw.ends_with("*/")
}

/// The last character must be the opening quote, not escaped.
fn is_closed_string(raw: &str) -> bool {
    let mut chars = raw.chars();
    let (Some(quote), Some(last)) = (chars.next(), chars.next_back()) else {
        return false;
    };
    let escapes = chars.as_str().chars().rev().take_while(|c| *c == '\\').count();
    last == quote && escapes % 2 == 0
}

fn first_non_whitespace(css_text: &str, from: usize) -> usize {
    let rest = &css_text[from..];
    from + rest.len() - rest.trim_start().len()
}

fn into_css_error(err: ParseError<'_, CssParseError>, offset: usize) -> CssParseError {
    match err.kind {
        ParseErrorKind::Custom(err) => err,
        ParseErrorKind::Basic(_) => CssParseError::InvalidRule(offset),
    }
}
