//! Project enumeration: expand the descriptor's globs into tagged asset items.
//!
//! Enumeration runs before the destructive `clean` phase and is strictly
//! read-only. Every tag a later stage consults (kind, ownership, entrypoint,
//! downlevel/minify exemptions) is decided here, exactly once, so stages
//! never re-match filename patterns against each other's rules.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use siteforge_shared::{AssetItem, AssetKind, Ownership, ProjectDescriptor, Result, SiteforgeError};

/// The two asset groups produced by enumeration. Groups are transformed
/// identically but independently and never share mutable state.
#[derive(Debug)]
pub struct ProjectAssets {
    /// First-party items; the entrypoint is always first.
    pub sources: Vec<AssetItem>,
    /// Third-party items from `extra_dependencies` globs.
    pub dependencies: Vec<AssetItem>,
}

impl ProjectAssets {
    /// Total number of items entering the pipeline.
    pub fn len(&self) -> usize {
        self.sources.len() + self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.dependencies.is_empty()
    }
}

/// Enumerate the project into source and dependency groups.
///
/// Fails fast — before any filesystem mutation — if the entrypoint does not
/// exist or any enumerated file cannot be read as UTF-8 text.
#[instrument(skip_all, fields(root = %root.display(), entrypoint = %descriptor.entrypoint))]
pub fn enumerate(root: &Path, descriptor: &ProjectDescriptor) -> Result<ProjectAssets> {
    let entry_path = root.join(&descriptor.entrypoint);
    if !entry_path.is_file() {
        return Err(SiteforgeError::validation(format!(
            "entrypoint '{}' not found under {}",
            descriptor.entrypoint,
            root.display()
        )));
    }

    let excludes = compile_excludes(descriptor)?;

    // Entrypoint first, then glob matches in sorted order.
    let mut source_paths: Vec<PathBuf> = vec![PathBuf::from(&descriptor.entrypoint)];
    for path in expand_globs(root, &descriptor.sources, &excludes)? {
        if path != Path::new(&descriptor.entrypoint) {
            source_paths.push(path);
        }
    }

    let dependency_paths = expand_globs(root, &descriptor.extra_dependencies, &excludes)?;

    let sources = read_group(root, descriptor, &source_paths, Ownership::FirstParty)?;
    let dependencies = read_group(root, descriptor, &dependency_paths, Ownership::ThirdParty)?;

    info!(
        sources = sources.len(),
        dependencies = dependencies.len(),
        "project enumeration complete"
    );

    Ok(ProjectAssets {
        sources,
        dependencies,
    })
}

// ---------------------------------------------------------------------------
// Glob expansion
// ---------------------------------------------------------------------------

/// Compile the descriptor's exclusion globs. The output directory is always
/// excluded so a previous build is never re-ingested as input.
fn compile_excludes(descriptor: &ProjectDescriptor) -> Result<Vec<glob::Pattern>> {
    let mut patterns = Vec::with_capacity(descriptor.exclude.len() + 2);

    let build_dir = descriptor.build.dir.trim_end_matches('/');
    for implied in [build_dir.to_string(), format!("{build_dir}/**")] {
        patterns.push(glob::Pattern::new(&implied).map_err(|e| {
            SiteforgeError::config(format!("invalid build.dir pattern '{implied}': {e}"))
        })?);
    }

    for raw in &descriptor.exclude {
        patterns.push(glob::Pattern::new(raw).map_err(|e| {
            SiteforgeError::config(format!("invalid exclude pattern '{raw}': {e}"))
        })?);
    }

    Ok(patterns)
}

/// Expand glob patterns relative to `root` into sorted, deduplicated,
/// root-relative file paths.
fn expand_globs(
    root: &Path,
    patterns: &[String],
    excludes: &[glob::Pattern],
) -> Result<Vec<PathBuf>> {
    let mut matched: BTreeSet<PathBuf> = BTreeSet::new();

    for pattern in patterns {
        let absolute = root.join(pattern);
        let absolute = absolute.to_string_lossy();

        let paths = glob::glob(&absolute).map_err(|e| {
            SiteforgeError::config(format!("invalid source pattern '{pattern}': {e}"))
        })?;

        for entry in paths {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                SiteforgeError::io(path, e.into())
            })?;

            if !path.is_file() {
                continue;
            }

            let relative = path
                .strip_prefix(root)
                .map_err(|_| {
                    SiteforgeError::validation(format!(
                        "pattern '{pattern}' matched '{}' outside the project root",
                        path.display()
                    ))
                })?
                .to_path_buf();

            let url = to_url(&relative);
            if excludes.iter().any(|p| p.matches(&url)) {
                debug!(path = %url, "excluded from enumeration");
                continue;
            }

            matched.insert(relative);
        }
    }

    Ok(matched.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Item construction
// ---------------------------------------------------------------------------

/// Read and tag every file in a group, preserving the given path order.
fn read_group(
    root: &Path,
    descriptor: &ProjectDescriptor,
    paths: &[PathBuf],
    ownership: Ownership,
) -> Result<Vec<AssetItem>> {
    let mut items = Vec::with_capacity(paths.len());

    for relative in paths {
        let absolute = root.join(relative);
        let bytes = std::fs::read(&absolute).map_err(|e| SiteforgeError::io(&absolute, e))?;

        let url = to_url(relative);
        let content = String::from_utf8(bytes).map_err(|_| {
            SiteforgeError::validation(format!(
                "'{url}' is not UTF-8 text; the pipeline only carries markup, script, \
                 and style items — add it to `exclude`"
            ))
        })?;

        let kind = AssetKind::from_path(relative);
        let mut item = AssetItem::new(relative.clone(), content, kind, ownership);
        item.is_entrypoint = url == normalize(&descriptor.entrypoint);
        item.downlevel_exempt = kind == AssetKind::Script
            && descriptor.downlevel_exempt.iter().any(|m| url.contains(m.as_str()));
        item.minify_exempt = kind == AssetKind::Script
            && descriptor.minify_exempt.iter().any(|m| url.contains(m.as_str()));

        debug!(
            path = %url,
            ?kind,
            downlevel_exempt = item.downlevel_exempt,
            minify_exempt = item.minify_exempt,
            "ingested asset"
        );
        items.push(item);
    }

    Ok(items)
}

fn to_url(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> (tempfile::TempDir, ProjectDescriptor) {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "index.html", "<html><body></body></html>");
        write(tmp.path(), "src/app.js", "const x = 1;\n");
        write(tmp.path(), "src/styles.css", "body { color: red; }\n");
        write(
            tmp.path(),
            "vendor/webcomponentsjs/loader.js",
            "// precompiled loader\n",
        );
        write(
            tmp.path(),
            "vendor/browser-polyfill.js",
            "// precompiled polyfill\n",
        );

        let mut descriptor = ProjectDescriptor::new("index.html");
        descriptor.sources = vec!["index.html".into(), "src/**/*".into()];
        descriptor.extra_dependencies = vec!["vendor/**/*.js".into()];
        (tmp, descriptor)
    }

    #[test]
    fn enumerates_both_groups() {
        let (tmp, descriptor) = project();
        let assets = enumerate(tmp.path(), &descriptor).unwrap();

        assert_eq!(assets.sources.len(), 3);
        assert_eq!(assets.dependencies.len(), 2);
        assert_eq!(assets.len(), 5);

        // Entrypoint first, tagged, and only in the source group.
        assert!(assets.sources[0].is_entrypoint);
        assert_eq!(assets.sources[0].url(), "index.html");
        assert!(assets.dependencies.iter().all(|i| !i.is_entrypoint));
    }

    #[test]
    fn classifies_and_tags_at_ingestion() {
        let (tmp, descriptor) = project();
        let assets = enumerate(tmp.path(), &descriptor).unwrap();

        let app = assets.sources.iter().find(|i| i.url() == "src/app.js").unwrap();
        assert_eq!(app.kind, AssetKind::Script);
        assert!(!app.downlevel_exempt);
        assert!(!app.minify_exempt);

        let loader = assets
            .dependencies
            .iter()
            .find(|i| i.url().contains("webcomponentsjs"))
            .unwrap();
        assert!(loader.downlevel_exempt);
        // Narrower minify list: webcomponentsjs is still minified.
        assert!(!loader.minify_exempt);

        let polyfill = assets
            .dependencies
            .iter()
            .find(|i| i.url().contains("browser-polyfill"))
            .unwrap();
        assert!(polyfill.downlevel_exempt);
        assert!(polyfill.minify_exempt);
    }

    #[test]
    fn missing_entrypoint_fails_before_any_mutation() {
        let tmp = tempfile::tempdir().unwrap();
        let descriptor = ProjectDescriptor::new("index.html");

        let err = enumerate(tmp.path(), &descriptor).unwrap_err();
        assert!(err.to_string().contains("entrypoint 'index.html' not found"));
    }

    #[test]
    fn build_dir_is_never_ingested() {
        let (tmp, mut descriptor) = project();
        write(tmp.path(), "build/stale.js", "var stale = true;\n");
        descriptor.sources.push("**/*.js".into());

        let assets = enumerate(tmp.path(), &descriptor).unwrap();
        assert!(assets.sources.iter().all(|i| !i.url().starts_with("build/")));
    }

    #[test]
    fn exclude_patterns_apply() {
        let (tmp, mut descriptor) = project();
        write(tmp.path(), "src/app.test.js", "test();\n");
        descriptor.exclude = vec!["**/*.test.js".into()];

        let assets = enumerate(tmp.path(), &descriptor).unwrap();
        assert!(assets.sources.iter().all(|i| !i.url().ends_with(".test.js")));
    }

    #[test]
    fn non_utf8_input_is_rejected() {
        let (tmp, mut descriptor) = project();
        fs::write(tmp.path().join("src/blob.bin"), [0xff, 0xfe, 0x00, 0x01]).unwrap();
        descriptor.sources = vec!["src/**/*".into()];

        let err = enumerate(tmp.path(), &descriptor).unwrap_err();
        assert!(err.to_string().contains("not UTF-8"));
    }

    #[test]
    fn glob_order_is_deterministic() {
        let (tmp, descriptor) = project();
        let a = enumerate(tmp.path(), &descriptor).unwrap();
        let b = enumerate(tmp.path(), &descriptor).unwrap();

        let urls = |assets: &ProjectAssets| {
            assets.sources.iter().map(|i| i.url()).collect::<Vec<_>>()
        };
        assert_eq!(urls(&a), urls(&b));
    }
}
