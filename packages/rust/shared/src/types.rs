//! Core domain types for the siteforge build pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File name of the generated push manifest, written next to the built assets.
pub const PUSH_MANIFEST_FILE: &str = "push-manifest.json";

/// File name of the generated offline-cache descriptor.
pub const PRECACHE_MANIFEST_FILE: &str = "precache-manifest.json";

// ---------------------------------------------------------------------------
// BuildId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying a single build run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub Uuid);

impl BuildId {
    /// Generate a new time-sortable build identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BuildId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// BuildPhase
// ---------------------------------------------------------------------------

/// The linear state machine of one build run.
///
/// `IDLE → CLEANING → PROCESSING → MERGING → ADAPTING → (BUNDLING) →
/// MANIFESTING → WRITING → CACHE-GENERATING → DONE`, with `FAILED` reachable
/// from any phase on the first error. Errors and progress reporting name the
/// phase, so its `Display` strings are part of the user-visible surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildPhase {
    Idle,
    Cleaning,
    Processing,
    Merging,
    Adapting,
    Bundling,
    Manifesting,
    Writing,
    CacheGenerating,
    Done,
    Failed,
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Cleaning => "cleaning",
            Self::Processing => "processing",
            Self::Merging => "merging",
            Self::Adapting => "adapting",
            Self::Bundling => "bundling",
            Self::Manifesting => "manifesting",
            Self::Writing => "writing",
            Self::CacheGenerating => "cache-generating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// AssetKind / Ownership
// ---------------------------------------------------------------------------

/// What a file is, decided once at ingestion from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// HTML markup.
    Markup,
    /// JavaScript.
    Script,
    /// CSS stylesheet.
    Style,
    /// Anything else; passed through the pipeline untransformed.
    Other,
}

impl AssetKind {
    /// Classify a path by extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("html") | Some("htm") => Self::Markup,
            Some("js") | Some("mjs") => Self::Script,
            Some("css") => Self::Style,
            _ => Self::Other,
        }
    }
}

/// Whether an item belongs to the project's own sources or to a third-party
/// dependency. The two groups are transformed identically but independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ownership {
    FirstParty,
    ThirdParty,
}

// ---------------------------------------------------------------------------
// AssetItem
// ---------------------------------------------------------------------------

/// A single file flowing through the pipeline.
///
/// Kind, ownership, and stage exemptions are decided once at ingestion;
/// stages read the tags instead of re-matching filename patterns.
#[derive(Debug, Clone)]
pub struct AssetItem {
    /// Path relative to the project root; also the output-relative path.
    pub path: PathBuf,
    /// File content. All transformed kinds are text.
    pub content: String,
    pub kind: AssetKind,
    pub ownership: Ownership,
    /// True for the designated entry markup item only.
    pub is_entrypoint: bool,
    /// Skip syntax downleveling (pre-compiled polyfill/adapter files that
    /// implement the downleveling runtime itself).
    pub downlevel_exempt: bool,
    /// Skip script minification.
    pub minify_exempt: bool,
}

impl AssetItem {
    /// Create an item with tags at their defaults (not entry, not exempt).
    pub fn new(
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        kind: AssetKind,
        ownership: Ownership,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            kind,
            ownership,
            is_entrypoint: false,
            downlevel_exempt: false,
            minify_exempt: false,
        }
    }

    /// The item's path rendered with forward slashes, for logs, manifests,
    /// and error messages.
    pub fn url(&self) -> String {
        self.path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_id_roundtrip() {
        let id = BuildId::new();
        let s = id.to_string();
        let parsed: BuildId = s.parse().expect("parse BuildId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn kind_classification() {
        assert_eq!(AssetKind::from_path(Path::new("index.html")), AssetKind::Markup);
        assert_eq!(AssetKind::from_path(Path::new("a/b/app.JS")), AssetKind::Script);
        assert_eq!(AssetKind::from_path(Path::new("styles.css")), AssetKind::Style);
        assert_eq!(AssetKind::from_path(Path::new("logo.svg")), AssetKind::Other);
        assert_eq!(AssetKind::from_path(Path::new("Makefile")), AssetKind::Other);
    }

    #[test]
    fn item_url_uses_forward_slashes() {
        let item = AssetItem::new(
            PathBuf::from("src").join("pages").join("about.html"),
            "<html></html>",
            AssetKind::Markup,
            Ownership::FirstParty,
        );
        assert_eq!(item.url(), "src/pages/about.html");
    }

    #[test]
    fn phase_display_names() {
        assert_eq!(BuildPhase::CacheGenerating.to_string(), "cache-generating");
        assert_eq!(BuildPhase::Processing.to_string(), "processing");
    }
}
