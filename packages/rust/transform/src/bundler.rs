//! Dependency bundler.
//!
//! Coalesces the entry point's external `<script src>` and
//! `<link rel="stylesheet">` references into inline elements and drops the
//! referenced items from the stream, reducing the request count of the built
//! application. References are inlined in document order, with no generated
//! file names, so bundled output is deterministic.
//!
//! Remote references (`http:`, `https:`, protocol-relative) and references
//! to files outside the item stream pass through untouched.

use std::collections::HashMap;
use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

use siteforge_shared::{AssetItem, BuildPhase, Result, SiteforgeError};

/// Bundle the item stream around its entry markup item.
pub fn bundle(items: Vec<AssetItem>) -> Result<Vec<AssetItem>> {
    let Some(entry_pos) = items.iter().position(|i| i.is_entrypoint) else {
        return Err(SiteforgeError::validation(
            "bundling requires an entrypoint item in the stream",
        ));
    };

    let refs = collect_references(&items[entry_pos].content);

    let by_url: HashMap<String, usize> = items
        .iter()
        .enumerate()
        .filter(|(_, i)| !i.is_entrypoint)
        .map(|(pos, i)| (i.url(), pos))
        .collect();

    let mut inlined: HashSet<usize> = HashSet::new();
    let mut entry_content = items[entry_pos].content.clone();

    for reference in &refs {
        let Some(&pos) = by_url.get(&reference.target) else {
            debug!(target = %reference.target, "reference not in item stream, left as-is");
            continue;
        };

        let replacement = match reference.kind {
            RefKind::Script => format!("<script>{}</script>", items[pos].content),
            RefKind::Stylesheet => format!("<style>{}</style>", items[pos].content),
        };

        let tag_re = reference.tag_pattern()?;
        if let Some(found) = tag_re.find(&entry_content) {
            let range = found.range();
            entry_content.replace_range(range, &replacement);
            inlined.insert(pos);
            debug!(target = %reference.target, "inlined into entrypoint");
        }
    }

    info!(inlined = inlined.len(), "bundling complete");

    let mut out = Vec::with_capacity(items.len() - inlined.len());
    for (pos, mut item) in items.into_iter().enumerate() {
        if inlined.contains(&pos) {
            continue;
        }
        if pos == entry_pos {
            item.content = std::mem::take(&mut entry_content);
        }
        out.push(item);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Reference extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Script,
    Stylesheet,
}

/// One external resource reference found in markup, in document order.
#[derive(Debug, Clone)]
pub struct MarkupRef {
    pub kind: RefKind,
    /// Normalized stream-relative URL.
    pub target: String,
    /// The raw attribute value as written in the document.
    raw: String,
}

impl MarkupRef {
    /// Regex matching the whole referencing element in the raw document.
    fn tag_pattern(&self) -> Result<Regex> {
        let raw = regex::escape(&self.raw);
        let pattern = match self.kind {
            RefKind::Script => {
                format!(r#"(?is)<script\b[^>]*src\s*=\s*["']?{raw}["']?[^>]*>\s*</script\s*>"#)
            }
            // Require rel="stylesheet" in either attribute order so a
            // preload/prefetch link sharing the href is never rewritten —
            // only the element collect_references selected.
            RefKind::Stylesheet => {
                format!(
                    r#"(?is)<link\b[^>]*rel\s*=\s*["']?stylesheet["']?[^>]*href\s*=\s*["']?{raw}["']?[^>]*/?>|<link\b[^>]*href\s*=\s*["']?{raw}["']?[^>]*rel\s*=\s*["']?stylesheet["']?[^>]*/?>"#
                )
            }
        };
        Regex::new(&pattern).map_err(|e| {
            SiteforgeError::transform(
                BuildPhase::Bundling,
                &self.raw,
                format!("cannot match referencing tag: {e}"),
            )
        })
    }
}

/// Collect local script/stylesheet references from markup, in document order.
pub fn collect_references(html: &str) -> Vec<MarkupRef> {
    let doc = Html::parse_document(html);
    let script_sel = Selector::parse("script[src]").expect("valid selector");
    let link_sel = Selector::parse(r#"link[rel="stylesheet"][href]"#).expect("valid selector");

    let mut refs = Vec::new();

    for el in doc.select(&script_sel) {
        if let Some(src) = el.value().attr("src") {
            if let Some(target) = normalize_local(src) {
                refs.push(MarkupRef {
                    kind: RefKind::Script,
                    target,
                    raw: src.to_string(),
                });
            }
        }
    }

    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            if let Some(target) = normalize_local(href) {
                refs.push(MarkupRef {
                    kind: RefKind::Stylesheet,
                    target,
                    raw: href.to_string(),
                });
            }
        }
    }

    refs
}

/// Normalize a local reference to a stream-relative URL; `None` for remote
/// or query-carrying references.
fn normalize_local(href: &str) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty()
        || trimmed.starts_with("http:")
        || trimmed.starts_with("https:")
        || trimmed.starts_with("//")
        || trimmed.starts_with("data:")
        || trimmed.contains('?')
        || trimmed.contains('#')
    {
        return None;
    }
    Some(
        trimmed
            .trim_start_matches("./")
            .trim_start_matches('/')
            .to_string(),
    )
}
