//! HTML splitter and rejoiner.
//!
//! `split_group` lifts the bodies of inline `<script>` and `<style>` elements
//! out of markup items into synthetic sub-items, leaving a placeholder
//! comment behind, so downstream stages can treat scripts and styles
//! uniformly regardless of whether they were inline or external.
//! `rejoin_group` is the inverse: it folds every sub-item back into its
//! parent and removes it from the stream.
//!
//! Sub-item paths are derived from the parent path (`index.html~inline-0.js`),
//! so split and rejoin need no shared state and both directions stay safe to
//! run after concurrent per-item transforms.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use siteforge_shared::{AssetItem, AssetKind, BuildPhase, Result, SiteforgeError};

/// Marker separating a parent path from an inline sub-item suffix. Chosen to
/// be invalid in descriptor globs so sub-items can never collide with real
/// project files.
const INLINE_SEP: &str = "~inline-";

static INLINE_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script(?<attrs>[^>]*)>(?<body>.*?)</script>").expect("valid regex")
});

static INLINE_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style(?<attrs>[^>]*)>(?<body>.*?)</style>").expect("valid regex")
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\*siteforge-inline:(?<idx>\d+)\*/").expect("valid regex")
});

/// True if `path` names a synthetic inline sub-item.
pub fn is_inline_item(path: &Path) -> bool {
    path.to_string_lossy().contains(INLINE_SEP)
}

fn inline_path(parent: &Path, idx: usize, kind: AssetKind) -> PathBuf {
    let ext = match kind {
        AssetKind::Script => "js",
        _ => "css",
    };
    PathBuf::from(format!(
        "{}{INLINE_SEP}{idx}.{ext}",
        parent.to_string_lossy()
    ))
}

fn placeholder(idx: usize) -> String {
    format!("/*siteforge-inline:{idx}*/")
}

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

/// Split every markup item in the group. Sub-items are inserted directly
/// after their parent, preserving the group's relative order.
pub fn split_group(items: Vec<AssetItem>) -> Result<Vec<AssetItem>> {
    let mut out = Vec::with_capacity(items.len());

    for item in items {
        if item.kind != AssetKind::Markup {
            out.push(item);
            continue;
        }

        let (parent, children) = split_markup(item);
        if !children.is_empty() {
            debug!(path = %parent.url(), count = children.len(), "split inline sub-items");
        }
        out.push(parent);
        out.extend(children);
    }

    Ok(out)
}

/// Extract inline script and style bodies from one markup item.
fn split_markup(mut item: AssetItem) -> (AssetItem, Vec<AssetItem>) {
    let mut children = Vec::new();
    let mut idx = 0usize;

    let content = INLINE_SCRIPT_RE
        .replace_all(&item.content, |caps: &regex::Captures<'_>| {
            let attrs = &caps["attrs"];
            let body = &caps["body"];
            // External scripts and empty bodies stay in place.
            if has_src_attr(attrs) || body.trim().is_empty() {
                return caps[0].to_string();
            }
            let child = make_child(&item, idx, AssetKind::Script, body);
            let replaced = format!("<script{attrs}>{}</script>", placeholder(idx));
            idx += 1;
            children.push(child);
            replaced
        })
        .into_owned();

    let content = INLINE_STYLE_RE
        .replace_all(&content, |caps: &regex::Captures<'_>| {
            let attrs = &caps["attrs"];
            let body = &caps["body"];
            if body.trim().is_empty() {
                return caps[0].to_string();
            }
            let child = make_child(&item, idx, AssetKind::Style, body);
            let replaced = format!("<style{attrs}>{}</style>", placeholder(idx));
            idx += 1;
            children.push(child);
            replaced
        })
        .into_owned();

    item.content = content;
    (item, children)
}

/// Sub-items inherit ownership and exemption tags from their parent, so an
/// inline script inside an exempt import is itself exempt.
fn make_child(parent: &AssetItem, idx: usize, kind: AssetKind, body: &str) -> AssetItem {
    let mut child = AssetItem::new(
        inline_path(&parent.path, idx, kind),
        body,
        kind,
        parent.ownership,
    );
    child.downlevel_exempt = parent.downlevel_exempt;
    child.minify_exempt = parent.minify_exempt;
    child
}

fn has_src_attr(attrs: &str) -> bool {
    let lower = attrs.to_ascii_lowercase();
    lower
        .split_whitespace()
        .any(|a| a == "src" || a.starts_with("src="))
}

// ---------------------------------------------------------------------------
// Rejoin
// ---------------------------------------------------------------------------

/// Fold sub-items back into their parent markup items and drop them from
/// the stream. Every placeholder must find its sub-item and every sub-item
/// must be consumed — a mismatch means an item was silently dropped
/// somewhere, which fails the build.
pub fn rejoin_group(items: Vec<AssetItem>) -> Result<Vec<AssetItem>> {
    let mut inline: HashMap<String, AssetItem> = HashMap::new();
    let mut out = Vec::with_capacity(items.len());

    for item in items {
        if is_inline_item(&item.path) {
            inline.insert(item.url(), item);
        } else {
            out.push(item);
        }
    }

    for item in &mut out {
        if item.kind != AssetKind::Markup {
            continue;
        }

        let mut missing: Option<String> = None;
        let content = PLACEHOLDER_RE
            .replace_all(&item.content, |caps: &regex::Captures<'_>| {
                let idx: usize = caps["idx"].parse().expect("digits");
                // Placeholder index determines the sub-item extension.
                for kind in [AssetKind::Script, AssetKind::Style] {
                    let key = to_url(&inline_path(&item.path, idx, kind));
                    if let Some(child) = inline.remove(&key) {
                        return child.content;
                    }
                }
                missing = Some(format!("{}#{idx}", item.url()));
                caps[0].to_string()
            })
            .into_owned();

        if let Some(what) = missing {
            return Err(SiteforgeError::transform(
                BuildPhase::Processing,
                item.url(),
                format!("inline sub-item '{what}' lost before rejoin"),
            ));
        }
        item.content = content;
    }

    if let Some(orphan) = inline.keys().next() {
        return Err(SiteforgeError::validation(format!(
            "inline sub-item '{orphan}' has no parent placeholder"
        )));
    }

    Ok(out)
}

fn to_url(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteforge_shared::Ownership;

    fn markup(path: &str, content: &str) -> AssetItem {
        AssetItem::new(path, content, AssetKind::Markup, Ownership::FirstParty)
    }

    #[test]
    fn split_extracts_inline_script_and_style() {
        let html = "<html><head><style>body { color: red; }</style></head>\
                    <body><script>const x = 1;</script></body></html>";
        let items = split_group(vec![markup("index.html", html)]).unwrap();

        assert_eq!(items.len(), 3);
        assert!(items[0].content.contains("/*siteforge-inline:0*/"));
        assert!(items[0].content.contains("/*siteforge-inline:1*/"));

        let script = items.iter().find(|i| i.kind == AssetKind::Script).unwrap();
        assert_eq!(script.content, "const x = 1;");
        assert!(is_inline_item(&script.path));

        let style = items.iter().find(|i| i.kind == AssetKind::Style).unwrap();
        assert_eq!(style.content, "body { color: red; }");
    }

    #[test]
    fn split_leaves_external_scripts_alone() {
        let html = r#"<body><script src="app.js"></script></body>"#;
        let items = split_group(vec![markup("index.html", html)]).unwrap();

        assert_eq!(items.len(), 1);
        assert!(items[0].content.contains(r#"src="app.js""#));
    }

    #[test]
    fn rejoin_restores_transformed_bodies() {
        let html = "<body><script>const x = 1;</script></body>";
        let mut items = split_group(vec![markup("index.html", html)]).unwrap();

        // Simulate a downleveling stage on the sub-item.
        for item in &mut items {
            if item.kind == AssetKind::Script {
                item.content = item.content.replace("const", "var");
            }
        }

        let rejoined = rejoin_group(items).unwrap();
        assert_eq!(rejoined.len(), 1);
        assert_eq!(
            rejoined[0].content,
            "<body><script>var x = 1;</script></body>"
        );
    }

    #[test]
    fn split_rejoin_roundtrip_is_identity() {
        let html = "<html><head><style>h1 { margin: 0; }</style></head>\
                    <body><p>hi</p><script>let a = 2;</script></body></html>";
        let items = split_group(vec![markup("page.html", html)]).unwrap();
        let rejoined = rejoin_group(items).unwrap();

        assert_eq!(rejoined.len(), 1);
        assert_eq!(rejoined[0].content, html);
    }

    #[test]
    fn children_inherit_exemptions() {
        let mut parent = markup("vendor/browser-polyfill.html", "<script>var p;</script>");
        parent.downlevel_exempt = true;
        parent.minify_exempt = true;

        let items = split_group(vec![parent]).unwrap();
        let child = items.iter().find(|i| i.kind == AssetKind::Script).unwrap();
        assert!(child.downlevel_exempt);
        assert!(child.minify_exempt);
    }

    #[test]
    fn rejoin_rejects_lost_sub_items() {
        let html = "<body><script>const x = 1;</script></body>";
        let items = split_group(vec![markup("index.html", html)]).unwrap();

        // Drop the sub-item to simulate a stage losing an item.
        let broken: Vec<_> = items
            .into_iter()
            .filter(|i| i.kind != AssetKind::Script)
            .collect();

        let err = rejoin_group(broken).unwrap_err();
        assert!(err.to_string().contains("lost before rejoin"));
    }

    #[test]
    fn rejoin_rejects_orphan_sub_items() {
        let orphan = AssetItem::new(
            "gone.html~inline-0.js",
            "var x;",
            AssetKind::Script,
            Ownership::FirstParty,
        );
        let err = rejoin_group(vec![orphan]).unwrap_err();
        assert!(err.to_string().contains("no parent placeholder"));
    }
}
