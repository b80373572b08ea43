//! Offline-cache (precache) descriptor generation.
//!
//! Runs strictly after the write phase: the descriptor is derived from the
//! files actually present in the output directory, not from the in-memory
//! item stream, so it can never list a file that was not written. Revisions
//! are content hashes, which keeps repeated builds of unchanged sources
//! byte-identical.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use siteforge_shared::{PRECACHE_MANIFEST_FILE, PrecacheConfig, Result, SiteforgeError};

/// One cacheable file in the output tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrecacheEntry {
    /// Output-relative URL, forward slashes.
    pub url: String,
    /// Hex SHA-256 of the file content.
    pub revision: String,
}

/// The written precache descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecacheManifest {
    /// Configured version override, or a digest derived from all entry
    /// revisions when none is configured.
    pub version: String,
    /// Whether the build that produced this output was bundled.
    pub bundled: bool,
    pub entries: Vec<PrecacheEntry>,
}

/// Generate and write `precache-manifest.json` into `out_dir`.
///
/// Returns the manifest that was written. Entries are sorted by URL and
/// exclude the descriptor file itself plus anything matching the configured
/// exclusion globs.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub fn generate_precache(
    out_dir: &Path,
    bundled: bool,
    config: &PrecacheConfig,
) -> Result<PrecacheManifest> {
    let excludes = compile_excludes(&config.exclude)?;

    let mut files = Vec::new();
    collect_files(out_dir, out_dir, &mut files)?;
    files.sort();

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let url = to_url(&path);
        if url == PRECACHE_MANIFEST_FILE {
            continue;
        }
        if excludes.iter().any(|p| p.matches(&url)) {
            debug!(%url, "excluded from precache");
            continue;
        }

        let content = fs::read(out_dir.join(&path))
            .map_err(|e| SiteforgeError::io(out_dir.join(&path), e))?;
        entries.push(PrecacheEntry {
            url,
            revision: hex_digest(&content),
        });
    }

    let version = match &config.version {
        Some(v) => v.clone(),
        None => derive_version(&entries),
    };

    let manifest = PrecacheManifest {
        version,
        bundled,
        entries,
    };

    let serialized = serde_json::to_string_pretty(&manifest).map_err(|e| {
        SiteforgeError::validation(format!("precache serialization failed: {e}"))
    })?;
    let target = out_dir.join(PRECACHE_MANIFEST_FILE);
    fs::write(&target, serialized).map_err(|e| SiteforgeError::io(&target, e))?;

    info!(
        entries = manifest.entries.len(),
        version = %manifest.version,
        "precache manifest written"
    );

    Ok(manifest)
}

/// Recursively collect files under `dir` as paths relative to `root`.
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let read = fs::read_dir(dir).map_err(|e| SiteforgeError::io(dir, e))?;
    for entry in read {
        let entry = entry.map_err(|e| SiteforgeError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

fn compile_excludes(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| {
                SiteforgeError::config(format!("invalid precache exclude pattern '{p}': {e}"))
            })
        })
        .collect()
}

fn to_url(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn hex_digest(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("{digest:x}")
}

/// Version for unconfigured builds: a digest over the sorted entry
/// revisions, so it changes exactly when some cached content changes.
fn derive_version(entries: &[PrecacheEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.url.as_bytes());
        hasher.update(entry.revision.as_bytes());
    }
    let digest = hasher.finalize();
    format!("{digest:x}")[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn lists_written_files_with_revisions() {
        let dir = tempdir().unwrap();
        write(dir.path(), "index.html", "<html></html>");
        write(dir.path(), "js/app.js", "var a;");

        let manifest = generate_precache(dir.path(), true, &PrecacheConfig::default()).unwrap();

        assert!(manifest.bundled);
        let urls: Vec<_> = manifest.entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["index.html", "js/app.js"]);
        for entry in &manifest.entries {
            assert_eq!(entry.revision.len(), 64);
        }
        assert!(dir.path().join(PRECACHE_MANIFEST_FILE).exists());
    }

    #[test]
    fn own_manifest_is_never_listed() {
        let dir = tempdir().unwrap();
        write(dir.path(), "index.html", "x");
        generate_precache(dir.path(), false, &PrecacheConfig::default()).unwrap();

        // Second run over a tree that now contains the manifest file.
        let manifest = generate_precache(dir.path(), false, &PrecacheConfig::default()).unwrap();
        assert!(manifest.entries.iter().all(|e| e.url != PRECACHE_MANIFEST_FILE));
        assert_eq!(manifest.entries.len(), 1);
    }

    #[test]
    fn exclusion_globs_apply() {
        let dir = tempdir().unwrap();
        write(dir.path(), "index.html", "x");
        write(dir.path(), "maps/app.js.map", "{}");

        let config = PrecacheConfig {
            version: None,
            exclude: vec!["maps/**".to_string()],
        };
        let manifest = generate_precache(dir.path(), true, &config).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].url, "index.html");
    }

    #[test]
    fn version_override_is_honored() {
        let dir = tempdir().unwrap();
        write(dir.path(), "index.html", "x");

        let config = PrecacheConfig {
            version: Some("2.1.0".to_string()),
            exclude: Vec::new(),
        };
        let manifest = generate_precache(dir.path(), true, &config).unwrap();
        assert_eq!(manifest.version, "2.1.0");
    }

    #[test]
    fn derived_version_tracks_content() {
        let dir = tempdir().unwrap();
        write(dir.path(), "index.html", "one");
        let first = generate_precache(dir.path(), true, &PrecacheConfig::default()).unwrap();

        let dir2 = tempdir().unwrap();
        write(dir2.path(), "index.html", "one");
        let same = generate_precache(dir2.path(), true, &PrecacheConfig::default()).unwrap();
        assert_eq!(first.version, same.version);

        write(dir2.path(), "index.html", "two");
        let changed = generate_precache(dir2.path(), true, &PrecacheConfig::default()).unwrap();
        assert_ne!(first.version, changed.version);
    }

    #[test]
    fn repeated_generation_is_stable() {
        let dir = tempdir().unwrap();
        write(dir.path(), "index.html", "x");

        let first = generate_precache(dir.path(), false, &PrecacheConfig::default()).unwrap();
        let first_bytes = fs::read(dir.path().join(PRECACHE_MANIFEST_FILE)).unwrap();

        let second = generate_precache(dir.path(), false, &PrecacheConfig::default()).unwrap();
        let second_bytes = fs::read(dir.path().join(PRECACHE_MANIFEST_FILE)).unwrap();

        assert_eq!(first.version, second.version);
        assert_eq!(first_bytes, second_bytes);
    }
}
