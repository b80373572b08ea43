//! HTML minification.
//!
//! Collapses inter-element whitespace, removes comments, and minifies inline
//! `style="…"` attribute values. `<script>`, `<style>`, `<pre>`, and
//! `<textarea>` bodies are carved out before minification and restored
//! afterwards, so split placeholders and preformatted text survive intact.
//!
//! The two custom data-binding syntaxes — `$=` attribute assigns and
//! `{{…}}` / `[[…]]` attribute surrounds — are never token-rewritten here;
//! minification only touches whitespace, comments, and style attributes, so
//! binding markers pass through verbatim.

use std::sync::LazyLock;

use regex::Regex;

use crate::css;

/// HTML minification rules, read-only during a build run.
#[derive(Debug, Clone)]
pub struct MinifyOptions {
    /// Collapse whitespace between elements and runs of spaces in text.
    pub collapse_whitespace: bool,
    /// Strip `<!-- … -->` comments (conditional comments are kept).
    pub remove_comments: bool,
    /// Minify `style="…"` attribute values.
    pub minify_inline_css: bool,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            remove_comments: true,
            minify_inline_css: true,
        }
    }
}

static PROTECTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<pre\b[^>]*>.*?</pre\s*>|<textarea\b[^>]*>.*?</textarea\s*>",
    )
    .expect("valid regex")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static INTER_TAG_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));

static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\n]+").expect("valid regex"));

static STYLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)style\s*=\s*"(?<body>[^"]*)""#).expect("valid regex")
});

// Private-use sentinels bracket carved-out blocks while the rest of the
// document is minified.
const HOLE_OPEN: char = '\u{E000}';
const HOLE_CLOSE: char = '\u{E001}';

/// Minify a markup item's content.
pub fn minify(html: &str, opts: &MinifyOptions) -> String {
    let (mut out, holes) = carve_protected(html);

    if opts.remove_comments {
        out = COMMENT_RE
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                // Conditional comments carry content for legacy engines.
                if caps[0].starts_with("<!--[") || caps[0].contains("<![endif]") {
                    caps[0].to_string()
                } else {
                    String::new()
                }
            })
            .into_owned();
    }

    if opts.collapse_whitespace {
        out = INTER_TAG_WS_RE.replace_all(&out, "><").into_owned();
        out = WS_RUN_RE.replace_all(&out, " ").into_owned();
        out = out.trim().to_string();
    }

    if opts.minify_inline_css {
        out = STYLE_ATTR_RE
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                format!(r#"style="{}""#, css::minify(&caps["body"]))
            })
            .into_owned();
    }

    restore_protected(&out, &holes)
}

/// Replace protected blocks with numbered sentinel holes.
fn carve_protected(html: &str) -> (String, Vec<String>) {
    let mut holes = Vec::new();
    let out = PROTECTED_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let idx = holes.len();
            holes.push(caps[0].to_string());
            format!("{HOLE_OPEN}{idx}{HOLE_CLOSE}")
        })
        .into_owned();
    (out, holes)
}

/// Put carved-out blocks back in place.
fn restore_protected(html: &str, holes: &[String]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find(HOLE_OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + HOLE_OPEN.len_utf8()..];
        let hole = after
            .find(HOLE_CLOSE)
            .and_then(|end| after[..end].parse::<usize>().ok().map(|idx| (end, idx)));
        match hole {
            Some((end, idx)) if idx < holes.len() => {
                out.push_str(&holes[idx]);
                rest = &after[end + HOLE_CLOSE.len_utf8()..];
            }
            // A stray sentinel character in the source document; keep it.
            _ => {
                out.push(HOLE_OPEN);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
