//! CSS post-processing passes: vendor prefixing and minification.
//!
//! `prefix` duplicates a small set of declarations under their vendor
//! prefixes; `minify` is used for inline `style="…"` attribute values during
//! HTML minification. External stylesheets are prefixed but not minified,
//! matching the per-kind stage table of the pipeline.

use std::sync::LazyLock;

use regex::Regex;

/// Properties that get vendor-prefixed copies, and the prefixes each one
/// receives. Order inside the slice is emission order.
const PREFIX_TABLE: &[(&str, &[&str])] = &[
    ("user-select", &["-webkit-", "-moz-", "-ms-"]),
    ("appearance", &["-webkit-", "-moz-"]),
    ("backdrop-filter", &["-webkit-"]),
    ("text-size-adjust", &["-webkit-", "-ms-"]),
    ("tab-size", &["-moz-"]),
];

static DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?<lead>[{;]\s*|^\s*)(?<prop>[a-zA-Z][a-zA-Z-]*)\s*:\s*(?<value>[^;{}]+)")
        .expect("valid regex")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?<p>[{};:,>])\s*").expect("valid regex"));

/// Insert vendor-prefixed duplicates ahead of each known declaration.
/// Already-prefixed declarations pass through untouched, so the pass is
/// idempotent.
pub fn prefix(css: &str) -> String {
    DECL_RE
        .replace_all(css, |caps: &regex::Captures<'_>| {
            let lead = &caps["lead"];
            let prop = &caps["prop"];
            let value = caps["value"].trim_end();

            let Some((_, prefixes)) = PREFIX_TABLE.iter().find(|(p, _)| *p == prop) else {
                return caps[0].to_string();
            };

            // Idempotence guard: a prefixed variant already present means
            // this declaration has been through the pass before.
            if prefixes.iter().any(|v| css.contains(&format!("{v}{prop}:"))) {
                return caps[0].to_string();
            }

            let mut expanded = String::from(lead);
            for vendor in prefixes.iter() {
                expanded.push_str(&format!("{vendor}{prop}: {value}; "));
            }
            expanded.push_str(&format!("{prop}: {value}"));
            expanded
        })
        .into_owned()
}

/// Minify a CSS fragment: strip comments, collapse whitespace, and drop
/// spaces around punctuation.
pub fn minify(css: &str) -> String {
    let out = COMMENT_RE.replace_all(css, "");
    let out = WS_RE.replace_all(&out, " ");
    let out = PUNCT_RE.replace_all(&out, "$p");
    let out = out.replace(";}", "}");
    out.trim().trim_end_matches(';').to_string()
}
