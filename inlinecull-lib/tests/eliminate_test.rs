use inlinecull_lib::{eliminate, eliminate_batch, Config};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run(html: &str) -> String {
    init_logger();
    eliminate(html, &Config::default())
}

#[test]
fn test_disabled_returns_input_unchanged() {
    init_logger();
    let html = "<style>.m-0 {margin: 0}</style>\n<DIV class=\"m-0\" style='margin:0'>x</DIV>";
    for config in [
        Config::disabled(),
        Config::from_value(&json!(false)),
        Config::from_json(r#"{"removeInlinedClasses": false}"#),
    ] {
        assert_eq!(eliminate(html, &config), html);
    }
}

#[test]
fn test_margin_reset_scenario() {
    let out = run(concat!(
        r#"<style>.m-0 {margin: 0}</style>"#,
        r#"<div class="m-0 keep" style="margin: 0">x</div>"#
    ));
    assert_eq!(
        out,
        r#"<style></style><div class="keep" style="margin: 0">x</div>"#
    );
}

#[test]
fn test_rules_inside_at_rules_are_never_touched() {
    let html = concat!(
        r#"<style>@media (max-width:600px){.ignore{color:blue}}</style>"#,
        r#"<div class="ignore" style="color: red">x</div>"#
    );
    assert_eq!(run(html), html);
}

#[test]
fn test_exact_property_match() {
    let out = run(r#"<style>.foo { color: red }</style><p class="foo" style="color: red">x</p>"#);
    assert_eq!(out, r#"<style></style><p style="color: red">x</p>"#);
}

#[test]
fn test_property_names_are_case_sensitive() {
    let html = r#"<style>.foo { COLOR: red }</style><p class="foo" style="color: red">x</p>"#;
    assert_eq!(run(html), html);
}

#[test]
fn test_shorthand_family_match() {
    let out = run(concat!(
        r#"<style>.mb-4 { margin-bottom: 16px }</style>"#,
        r#"<h1 class="mb-4 title" style="margin: 0 0 16px;">x</h1>"#
    ));
    assert_eq!(
        out,
        concat!(
            r#"<style></style>"#,
            r#"<h1 class="title" style="margin: 0 0 16px">x</h1>"#
        )
    );
}

#[test]
fn test_surviving_rules_keep_order_and_source_text() {
    let out = run(concat!(
        "<style>.a { padding: 1px; } .b {color: red}\n.c { margin : 0 }</style>",
        r#"<p class="a b c" style="color: red">x</p>"#
    ));
    assert_eq!(
        out,
        concat!(
            "<style>.a { padding: 1px; }\n.c { margin : 0 }</style>",
            r#"<p class="a c" style="color: red">x</p>"#
        )
    );
}

#[test]
fn test_class_pruning_is_per_element() {
    let out = run(concat!(
        r#"<style>.c { color: red }</style>"#,
        r#"<p class="c" style="color: red">1</p>"#,
        r#"<p class="c other">2</p>"#
    ));
    assert_eq!(
        out,
        concat!(
            r#"<style></style>"#,
            r#"<p style="color: red">1</p>"#,
            r#"<p class="c other">2</p>"#
        )
    );
}

#[test]
fn test_full_document_with_several_blocks() {
    let html = concat!(
        "<!DOCTYPE html>\n",
        "  <html>\n",
        "    <head>\n",
        "      <style>\n",
        "        img {\n",
        "          border: 0;\n",
        "          vertical-align: middle\n",
        "        }\n",
        "\n",
        "        .hover-text-blue:hover {\n",
        "          color: #00a8ff;\n",
        "        }\n",
        "\n",
        "        .m-0 {margin: 0}\n",
        "\n",
        "        .mb-4 {margin-bottom: 16px}\n",
        "\n",
        "        .mt-0 {margin-top: 0}\n",
        "\n",
        "        .remove {color: red}\n",
        "\n",
        "        [data-ogsc] .hidden {display: none}\n",
        "\n",
        "        #keepId {float:none}\n",
        "\n",
        "        @media (max-width: 600px) {\n",
        "          .ignore {color: blue}\n",
        "        }\n",
        "      </style>\n",
        "      <style>\n",
        "        .keep {margin: 0}\n",
        "      </style>\n",
        "    </head>\n",
        "    <body>\n",
        "      <div id=\"keepId\" class=\"remove keep ignore\" style=\"color: red; display: inline\">\n",
        "        <h1 class=\"m-0 mb-4 mt-0 hover-text-blue\" style=\"margin: 0 0 16px;\">Title</h1>\n",
        "        <img src=\"https://example.com/image.jpg\" style=\"border: 0; vertical-align: middle\">\n",
        "        <div id=\"keepId\" class=\"remove keep ignore\" style=\"color: red; display: inline\">text</div>\n",
        "      </div>\n",
        "    </body>\n",
        "  </html>",
    );
    // html5ever drops the whitespace before <html> and <head>, and moves the
    // whitespace after </body> inside the body.
    let expected = concat!(
        "<!DOCTYPE html><html><head>\n",
        "      <style>\n",
        "        .hover-text-blue:hover {\n",
        "          color: #00a8ff;\n",
        "        }\n",
        "\n",
        "        [data-ogsc] .hidden {display: none}\n",
        "\n",
        "        #keepId {float:none}\n",
        "\n",
        "        @media (max-width: 600px) {\n",
        "          .ignore {color: blue}\n",
        "        }\n",
        "      </style>\n",
        "      <style>\n",
        "        .keep {margin: 0}\n",
        "      </style>\n",
        "    </head>\n",
        "    <body>\n",
        "      <div id=\"keepId\" class=\"keep ignore\" style=\"color: red; display: inline\">\n",
        "        <h1 class=\"hover-text-blue\" style=\"margin: 0 0 16px\">Title</h1>\n",
        "        <img src=\"https://example.com/image.jpg\" style=\"border: 0; vertical-align: middle\">\n",
        "        <div id=\"keepId\" class=\"keep ignore\" style=\"color: red; display: inline\">text</div>\n",
        "      </div>\n",
        "    \n",
        "  </body></html>",
    );
    assert_eq!(run(html), expected);
}

#[test]
fn test_xhtml_doctype_identifiers_are_kept() {
    let doctype = concat!(
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "#,
        r#""http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#
    );
    let html = format!(
        "{}{}",
        doctype,
        concat!(
            r#"<html><head><style>.a {color: red}</style></head>"#,
            r#"<body><p class="a" style="color: red">x</p></body></html>"#
        )
    );
    assert_eq!(
        run(&html),
        format!(
            "{}{}",
            doctype,
            concat!(
                r#"<html><head><style></style></head>"#,
                r#"<body><p style="color: red">x</p></body></html>"#
            )
        )
    );
}

#[test]
fn test_system_doctype_is_kept() {
    let html = concat!(
        r#"<!DOCTYPE html SYSTEM "about:legacy-compat">"#,
        r#"<html><head><style>.k {float: none}</style></head><body></body></html>"#
    );
    assert_eq!(run(html), html);
}

#[test]
fn test_document_without_html_tag_keeps_head_and_body() {
    let out = run(concat!(
        "<!DOCTYPE html>\n",
        r#"<head><style>.a {color: red}</style></head>"#,
        r#"<body class="b"><p class="a" style="color: red">x</p></body>"#
    ));
    assert_eq!(
        out,
        concat!(
            "<!DOCTYPE html><html>",
            r#"<head><style></style></head>"#,
            r#"<body class="b"><p style="color: red">x</p></body></html>"#
        )
    );
}

#[test]
fn test_loose_token_containment_is_preserved() {
    // `id` appears inside `#valid`, so it goes too.
    let out = run(concat!(
        r#"<style>#valid { color: red }</style>"#,
        r#"<p id="valid" class="id keep" style="color: red">x</p>"#
    ));
    assert_eq!(
        out,
        concat!(
            r#"<style></style>"#,
            r#"<p id="valid" class="keep" style="color: red">x</p>"#
        )
    );
}

#[test]
fn test_batch_matches_sequential_runs() {
    init_logger();
    let documents: Vec<String> = (0..32)
        .map(|i| {
            format!(
                concat!(
                    r#"<style>.c{i} {{ color: red }} .k {{ float: none }}</style>"#,
                    r#"<p class="c{i} k" style="color: red">{i}</p>"#
                ),
                i = i
            )
        })
        .collect();
    let config = Config::default();

    let sequential: Vec<String> = documents
        .iter()
        .map(|html| eliminate(html, &config))
        .collect();
    assert_eq!(eliminate_batch(&documents, &config), sequential);
    assert_eq!(
        sequential[3],
        r#"<style>.k { float: none }</style><p class="k" style="color: red">3</p>"#
    );
}
