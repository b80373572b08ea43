//! Generated build artifacts: the push manifest and the offline-cache
//! (precache) descriptor.
//!
//! The push manifest is derived from the final entry markup — after
//! adapters and optional bundling — so it reflects exactly the resources a
//! server should hint for the entry point. The precache descriptor is
//! generated from the written output tree, strictly after the write phase.

pub mod precache;

use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use siteforge_shared::{
    AssetItem, AssetKind, BuildPhase, PUSH_MANIFEST_FILE, Result, SiteforgeError,
};
use siteforge_transform::{RefKind, collect_references};

pub use precache::{PrecacheEntry, PrecacheManifest, generate_precache};

/// Build the push-manifest item from the final entry markup item.
///
/// The manifest maps the entry URL to its referenced resources with a type
/// hint and weight, e.g.:
///
/// ```json
/// {
///   "index.html": {
///     "app.js": { "type": "script", "weight": 1 },
///     "styles.css": { "type": "style", "weight": 1 }
///   }
/// }
/// ```
#[instrument(skip_all, fields(entry = %entry.url()))]
pub fn generate_push_manifest(entry: &AssetItem) -> Result<AssetItem> {
    if entry.kind != AssetKind::Markup || !entry.is_entrypoint {
        return Err(SiteforgeError::transform(
            BuildPhase::Manifesting,
            entry.url(),
            "push manifest requires the entry markup item",
        ));
    }

    let mut resources = Map::new();
    for reference in collect_references(&entry.content) {
        let kind = match reference.kind {
            RefKind::Script => "script",
            RefKind::Stylesheet => "style",
        };
        resources.insert(
            reference.target.clone(),
            json!({ "type": kind, "weight": 1 }),
        );
    }

    debug!(resources = resources.len(), "derived push manifest");

    let manifest = Value::Object(Map::from_iter([(
        entry.url(),
        Value::Object(resources),
    )]));

    let content = serde_json::to_string_pretty(&manifest).map_err(|e| {
        SiteforgeError::validation(format!("push manifest serialization failed: {e}"))
    })?;

    Ok(AssetItem::new(
        PUSH_MANIFEST_FILE,
        content,
        AssetKind::Other,
        entry.ownership,
    ))
}
