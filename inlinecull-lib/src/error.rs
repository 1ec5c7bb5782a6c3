use thiserror::Error;

/// A `<style>` block whose text could not be split into rules.
///
/// Offsets are byte positions into the block's text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CssParseError {
    #[error("unterminated comment starting at byte {0}")]
    UnterminatedComment(usize),
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),
    #[error("unclosed block starting at byte {0}")]
    UnclosedBlock(usize),
    #[error("unexpected `}}` at byte {0}")]
    UnexpectedCloseBrace(usize),
    #[error("invalid rule starting at byte {0}")]
    InvalidRule(usize),
}

/// A selector that could not be compiled for matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

impl SelectorError {
    pub fn new(selector: &str, reason: impl Into<String>) -> Self {
        SelectorError {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

/// Everything that can go wrong during a pass.
///
/// None of these abort a pass: the affected block, rule or config value is
/// skipped (or defaulted) and the rest of the document is still processed.
#[derive(Debug, Error)]
pub enum InlineCullError {
    #[error("stylesheet parse error: {0}")]
    Parse(#[from] CssParseError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("unrecognized configuration: {0}")]
    Config(String),
}
