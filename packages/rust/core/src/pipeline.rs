//! End-to-end build pipeline: enumerate → clean → process → merge → adapt →
//! (bundle) → manifest → write → precache.
//!
//! One build run walks the phases linearly; the first error aborts the run
//! with no retries. Per-item transforms inside the processing phase run
//! concurrently, bounded by [`BuildConfig::concurrency`], but every phase
//! boundary is a hard barrier: a phase only starts after the previous one
//! has produced its complete output stream.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use siteforge_artifacts::{generate_precache, generate_push_manifest};
use siteforge_shared::{
    AssetItem, AssetKind, BuildId, BuildPhase, PrecacheConfig, ProjectDescriptor, Result,
    SiteforgeError,
};
use siteforge_transform::{MinifyOptions, css, markup, script};

use crate::{adapters, writer};

/// Bound on concurrently transforming items within one processing group.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Configuration for one build run. Assembled by the caller from the project
/// descriptor plus CLI overrides; immutable for the duration of the run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root directory.
    pub root: PathBuf,
    /// The loaded and validated project descriptor.
    pub descriptor: ProjectDescriptor,
    /// Offline-cache configuration for the cache-generating phase.
    pub precache: PrecacheConfig,
    /// Per-group transform concurrency bound.
    pub concurrency: usize,
}

impl BuildConfig {
    pub fn new(
        root: impl Into<PathBuf>,
        descriptor: ProjectDescriptor,
        precache: PrecacheConfig,
    ) -> Self {
        Self {
            root: root.into(),
            descriptor,
            precache,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Result of a completed build run.
#[derive(Debug)]
pub struct BuildReport {
    /// Identifier of this run, for logs only — never written to artifacts.
    pub build_id: BuildId,
    /// Absolute output directory.
    pub out_dir: PathBuf,
    /// Number of files written (excluding the precache manifest, which the
    /// cache-generating phase writes itself).
    pub files_written: usize,
    /// Whether the bundling phase ran.
    pub bundled: bool,
    /// Wall-clock start of the run. In-memory only; written artifacts carry
    /// no timestamps so unchanged inputs rebuild byte-identically.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, phase: BuildPhase);
    /// Called when a per-item transform completes during processing.
    fn item_processed(&self, url: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: BuildPhase) {}
    fn item_processed(&self, _url: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &BuildReport) {}
}

/// Run the full build pipeline. The first error terminates the run; the
/// reporter observes the `Failed` phase before the error is returned.
#[instrument(skip_all, fields(root = %config.root.display(), entrypoint = %config.descriptor.entrypoint))]
pub async fn build(
    config: &BuildConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    match run_phases(config, progress).await {
        Ok(report) => Ok(report),
        Err(e) => {
            progress.phase(BuildPhase::Failed);
            Err(e)
        }
    }
}

async fn run_phases(
    config: &BuildConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    let start = Instant::now();
    let started_at = chrono::Utc::now();
    let build_id = BuildId::new();

    info!(%build_id, "starting build");

    let out_dir = config.root.join(&config.descriptor.build.dir);

    // Enumeration is read-only and runs before the destructive clean, so a
    // missing entrypoint or unreadable input aborts with the previous build
    // still on disk.
    let assets = siteforge_assets::enumerate(&config.root, &config.descriptor)?;
    let enumerated = assets.len();

    progress.phase(BuildPhase::Cleaning);
    writer::clean(&out_dir)?;

    // Both groups run the same stages, concurrently and independently.
    progress.phase(BuildPhase::Processing);
    let (sources, dependencies) = tokio::try_join!(
        process_group(assets.sources, config.concurrency, progress),
        process_group(assets.dependencies, config.concurrency, progress),
    )?;

    progress.phase(BuildPhase::Merging);
    let mut items = merge_groups(sources, dependencies);
    if items.len() != enumerated {
        return Err(SiteforgeError::validation(format!(
            "merge produced {} items from {enumerated} inputs",
            items.len()
        )));
    }

    progress.phase(BuildPhase::Adapting);
    adapters::inject(&mut items)?;

    let bundled = config.descriptor.build.bundle;
    if bundled {
        progress.phase(BuildPhase::Bundling);
        items = siteforge_transform::bundler::bundle(items)?;
    }

    progress.phase(BuildPhase::Manifesting);
    let entry = items
        .iter()
        .find(|i| i.is_entrypoint)
        .ok_or_else(|| SiteforgeError::validation("entrypoint lost before manifesting"))?;
    let manifest = generate_push_manifest(entry)?;
    items.push(manifest);

    progress.phase(BuildPhase::Writing);
    let files_written = writer::write_items(&out_dir, &items)?;
    if files_written != items.len() {
        return Err(SiteforgeError::validation(format!(
            "wrote {files_written} of {} items",
            items.len()
        )));
    }

    progress.phase(BuildPhase::CacheGenerating);
    generate_precache(&out_dir, bundled, &config.precache)?;

    let report = BuildReport {
        build_id,
        out_dir,
        files_written,
        bundled,
        started_at,
        elapsed: start.elapsed(),
    };

    progress.done(&report);

    info!(
        build_id = %report.build_id,
        files_written = report.files_written,
        bundled = report.bundled,
        elapsed_ms = report.elapsed.as_millis(),
        "build complete"
    );

    Ok(report)
}

/// Concatenate the two processed groups into one stream. Intra-group order
/// is preserved; no ordering is promised between the groups.
fn merge_groups(sources: Vec<AssetItem>, dependencies: Vec<AssetItem>) -> Vec<AssetItem> {
    let mut items = sources;
    items.extend(dependencies);
    items
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

/// Run one group through split → concurrent per-item transforms → rejoin.
///
/// Split and rejoin are sequential brackets; the per-item stage in between
/// fans out under a semaphore and is joined in input order, so the first
/// failing item wins and group order is stable regardless of scheduling.
async fn process_group(
    items: Vec<AssetItem>,
    concurrency: usize,
    progress: &dyn ProgressReporter,
) -> Result<Vec<AssetItem>> {
    let items = siteforge_transform::split_group(items)?;
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let mut handles = Vec::with_capacity(total);
    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let url = item.url();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| {
                SiteforgeError::transform(BuildPhase::Processing, item.url(), "scheduler closed")
            })?;
            Ok::<AssetItem, SiteforgeError>(transform_item(item))
        });
        handles.push((url, handle));
    }

    let mut out = Vec::with_capacity(total);
    for (current, (url, handle)) in handles.into_iter().enumerate() {
        let item = handle.await.map_err(|_| {
            SiteforgeError::transform(BuildPhase::Processing, &url, "transform task panicked")
        })??;
        progress.item_processed(&url, current + 1, total);
        out.push(item);
    }

    siteforge_transform::rejoin_group(out)
}

/// Apply the per-kind stage table to one item.
///
/// | kind   | stages                                          |
/// |--------|-------------------------------------------------|
/// | markup | minify (whitespace, comments, style attributes) |
/// | script | downlevel unless exempt, minify unless exempt   |
/// | style  | vendor prefix                                   |
/// | other  | passthrough                                     |
fn transform_item(mut item: AssetItem) -> AssetItem {
    match item.kind {
        AssetKind::Markup => {
            item.content = markup::minify(&item.content, &MinifyOptions::default());
        }
        AssetKind::Script => {
            if !item.downlevel_exempt {
                item.content = script::downlevel(&item.content);
            }
            if !item.minify_exempt {
                item.content = script::minify(&item.content);
            }
        }
        AssetKind::Style => {
            item.content = css::prefix(&item.content);
        }
        AssetKind::Other => {}
    }
    debug!(path = %item.url(), kind = ?item.kind, "item transformed");
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use siteforge_shared::{PRECACHE_MANIFEST_FILE, PUSH_MANIFEST_FILE};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project(tmp: &Path) -> ProjectDescriptor {
        write(
            tmp,
            "index.html",
            concat!(
                "<html>\n<head>\n",
                "  <link rel=\"stylesheet\" href=\"src/styles.css\">\n",
                "  <style>.app { user-select: none; }</style>\n",
                "</head>\n<body>\n",
                "  <script src=\"src/app.js\"></script>\n",
                "  <script>const boot = 1;</script>\n",
                "</body>\n</html>\n"
            ),
        );
        write(tmp, "src/app.js", "const answer = 42; // main\nlet ready = true;\n");
        write(tmp, "src/styles.css", "body { appearance: none; }\n");
        write(
            tmp,
            "vendor/webcomponentsjs/loader.js",
            "const loader = {}; // precompiled\n",
        );
        write(tmp, "vendor/browser-polyfill.js", "const polyfill = {};  \n");

        let mut descriptor = ProjectDescriptor::new("index.html");
        descriptor.sources = vec!["index.html".into(), "src/**/*".into()];
        descriptor.extra_dependencies = vec!["vendor/**/*.js".into()];
        descriptor
    }

    fn config(tmp: &Path, descriptor: ProjectDescriptor) -> BuildConfig {
        BuildConfig::new(tmp, descriptor, PrecacheConfig::default())
    }

    #[tokio::test]
    async fn bundled_build_produces_expected_file_set() {
        let tmp = tempfile::tempdir().unwrap();
        let descriptor = project(tmp.path());

        let report = build(&config(tmp.path(), descriptor), &SilentProgress)
            .await
            .unwrap();

        assert!(report.bundled);
        let out = tmp.path().join("build");
        assert!(out.join("index.html").exists());
        assert!(out.join(PUSH_MANIFEST_FILE).exists());
        assert!(out.join(PRECACHE_MANIFEST_FILE).exists());
        // Referenced files were inlined into the entrypoint.
        assert!(!out.join("src/app.js").exists());
        assert!(!out.join("src/styles.css").exists());
        // Unreferenced dependencies are still written.
        assert!(out.join("vendor/browser-polyfill.js").exists());
    }

    #[tokio::test]
    async fn entry_carries_transformed_inline_content() {
        let tmp = tempfile::tempdir().unwrap();
        let descriptor = project(tmp.path());

        build(&config(tmp.path(), descriptor), &SilentProgress)
            .await
            .unwrap();

        let entry = fs::read_to_string(tmp.path().join("build/index.html")).unwrap();
        // Inline script was downleveled and minified through the splitter.
        assert!(entry.contains("var boot = 1;"));
        // Inline style was vendor-prefixed.
        assert!(entry.contains("-webkit-user-select: none;"));
        // Bundled external script was downleveled too.
        assert!(entry.contains("var answer = 42;"));
        assert!(!entry.contains("// main"));
        // Adapters were injected.
        assert!(entry.contains("customElements.define"));
    }

    #[tokio::test]
    async fn unbundled_build_keeps_references_and_manifests_them() {
        let tmp = tempfile::tempdir().unwrap();
        let mut descriptor = project(tmp.path());
        descriptor.build.bundle = false;

        let report = build(&config(tmp.path(), descriptor), &SilentProgress)
            .await
            .unwrap();

        assert!(!report.bundled);
        let out = tmp.path().join("build");
        assert!(out.join("src/app.js").exists());

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(PUSH_MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["index.html"]["src/app.js"]["type"], "script");
        assert_eq!(manifest["index.html"]["src/styles.css"]["type"], "style");
    }

    #[tokio::test]
    async fn exemptions_flow_through_the_pipeline() {
        let tmp = tempfile::tempdir().unwrap();
        let descriptor = project(tmp.path());

        build(&config(tmp.path(), descriptor), &SilentProgress)
            .await
            .unwrap();

        // webcomponentsjs: downlevel-exempt but still minified.
        let loader =
            fs::read_to_string(tmp.path().join("build/vendor/webcomponentsjs/loader.js"))
                .unwrap();
        assert!(loader.contains("const loader"));
        assert!(!loader.contains("// precompiled"));

        // browser-polyfill: exempt from both, byte-identical to its input.
        let polyfill =
            fs::read_to_string(tmp.path().join("build/vendor/browser-polyfill.js")).unwrap();
        assert_eq!(polyfill, "const polyfill = {};  \n");
    }

    #[tokio::test]
    async fn missing_entrypoint_leaves_previous_output_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let mut descriptor = project(tmp.path());
        descriptor.entrypoint = "missing.html".into();

        write(tmp.path(), "build/previous.txt", "previous build");

        let err = build(&config(tmp.path(), descriptor), &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.html"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("build/previous.txt")).unwrap(),
            "previous build"
        );
    }

    #[test]
    fn merge_keeps_intra_group_order() {
        let script = |path: &str| {
            AssetItem::new(
                path,
                "var x;",
                AssetKind::Script,
                siteforge_shared::Ownership::FirstParty,
            )
        };
        let sources = vec![script("a1.js"), script("a2.js")];
        let dependencies = vec![script("b1.js")];

        let merged = merge_groups(sources, dependencies);
        let urls: Vec<String> = merged.iter().map(|i| i.url()).collect();

        let a1 = urls.iter().position(|u| u == "a1.js").unwrap();
        let a2 = urls.iter().position(|u| u == "a2.js").unwrap();
        assert!(a1 < a2);
        assert_eq!(urls.len(), 3);
        assert!(urls.contains(&"b1.js".to_string()));
    }

    #[tokio::test]
    async fn group_order_survives_concurrent_processing() {
        let items: Vec<AssetItem> = (0..16)
            .map(|i| {
                AssetItem::new(
                    format!("src/m{i:02}.js"),
                    format!("const v{i} = {i};"),
                    AssetKind::Script,
                    siteforge_shared::Ownership::FirstParty,
                )
            })
            .collect();
        let expected: Vec<String> = items.iter().map(|i| i.url()).collect();

        let out = process_group(items, 4, &SilentProgress).await.unwrap();
        let urls: Vec<String> = out.iter().map(|i| i.url()).collect();
        assert_eq!(urls, expected);
    }

    #[tokio::test]
    async fn repeated_builds_are_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let descriptor = project(tmp.path());
        let config = config(tmp.path(), descriptor);

        build(&config, &SilentProgress).await.unwrap();
        let first = snapshot(&tmp.path().join("build"));

        build(&config, &SilentProgress).await.unwrap();
        let second = snapshot(&tmp.path().join("build"));

        assert_eq!(first, second);
    }

    fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files = Vec::new();
        collect(dir, dir, &mut files);
        files.sort();
        files
    }

    fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                collect(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
                out.push((rel, fs::read(&path).unwrap()));
            }
        }
    }
}
