//! Removes `<style>` rules made redundant by CSS inlining, along with the
//! class tokens that only existed to trigger them.

pub mod config;
pub mod dom;
pub mod error;
pub mod inline_cull;

pub mod parser {
    pub mod attributes;
    pub mod dom_indices;
    pub mod html;
}

pub mod style {
    pub mod css_matcher;
    pub mod eliminator;
    pub mod owned_css;
}

pub use config::Config;
pub use error::{CssParseError, InlineCullError, SelectorError};
pub use inline_cull::{eliminate, eliminate_batch};
pub use style::eliminator::{eliminate_document, PassSummary};
