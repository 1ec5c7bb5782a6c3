use crate::config::Config;
use crate::parser::html;
use crate::style::eliminator;
use rayon::prelude::*;

/// Runs the pass over one HTML string and returns the rewritten HTML.
///
/// The input comes back unchanged when the pass is disabled, when it has no
/// `<style>` element, or when the rewritten tree cannot be serialized.
pub fn eliminate(html_content: &str, config: &Config) -> String {
    if !config.is_enabled() {
        log::debug!("removeInlinedClasses is off; returning input unchanged");
        return html_content.to_string();
    }
    if !has_style_tag(html_content) {
        return html_content.to_string();
    }

    let document = html::create_dom_tree(html_content);
    let summary = eliminator::eliminate_document(&document);
    if summary.rules_removed == 0 && summary.classes_removed == 0 {
        log::trace!("nothing to remove in {} style block(s)", summary.style_blocks);
    }

    match html::serialize_document(&document) {
        Ok(output) => output,
        Err(err) => {
            log::warn!("could not serialize the rewritten document: {}", err);
            html_content.to_string()
        }
    }
}

/// Runs [`eliminate`] over independent documents in parallel.
///
/// Every document gets its own tree, so results are the same as running them
/// one after another, and come back in input order.
pub fn eliminate_batch<S>(documents: &[S], config: &Config) -> Vec<String>
where
    S: AsRef<str> + Sync,
{
    documents
        .par_iter()
        .map(|html_content| eliminate(html_content.as_ref(), config))
        .collect()
}

fn has_style_tag(html_content: &str) -> bool {
    html_content.to_ascii_lowercase().contains("<style")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disabled_is_identity() {
        let html = r#"<style>.m-0 {margin: 0}</style><div class="m-0" style="margin: 0">x</div>"#;
        assert_eq!(eliminate(html, &Config::disabled()), html);
    }

    #[test]
    fn test_no_style_is_identity() {
        // Would be normalized by the parser if it went through it.
        let html = "<DIV class=a style='margin:0'>x";
        assert_eq!(eliminate(html, &Config::default()), html);
    }

    #[test]
    fn test_uppercase_style_tag_is_processed() {
        let out = eliminate(
            r#"<STYLE>.m-0 {margin: 0}</STYLE><div class="m-0 keep" style="margin: 0">x</div>"#,
            &Config::default(),
        );
        assert_eq!(
            out,
            r#"<style></style><div class="keep" style="margin: 0">x</div>"#
        );
    }

    #[test]
    fn test_batch_keeps_order() {
        let documents = vec![
            r#"<style>.a {color: red}</style><p class="a" style="color: red">1</p>"#.to_string(),
            "<p>2</p>".to_string(),
        ];
        let out = eliminate_batch(&documents, &Config::default());
        assert_eq!(
            out,
            vec![
                r#"<style></style><p style="color: red">1</p>"#.to_string(),
                "<p>2</p>".to_string(),
            ]
        );
    }
}
