//! Project configuration for siteforge.
//!
//! The project descriptor lives at `siteforge.toml` in the project root;
//! the optional offline-cache configuration lives next to it in
//! `precache.toml`. CLI flags override descriptor values, which override
//! defaults. Both documents are read-only for the duration of a build run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteforgeError};

/// Default project descriptor file name.
pub const DESCRIPTOR_FILE_NAME: &str = "siteforge.toml";

/// Default offline-cache configuration file name.
pub const PRECACHE_FILE_NAME: &str = "precache.toml";

// ---------------------------------------------------------------------------
// Project descriptor (matching siteforge.toml schema)
// ---------------------------------------------------------------------------

/// The project descriptor, deserialized from TOML. Constructed once at
/// pipeline start and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// The top-level markup file that bootstraps the application.
    pub entrypoint: String,

    /// First-party source globs, relative to the project root.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Third-party dependency globs, relative to the project root.
    #[serde(default)]
    pub extra_dependencies: Vec<String>,

    /// Globs excluded from enumeration (the output directory is always
    /// excluded implicitly).
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Path substrings marking scripts that must not be downleveled —
    /// they implement the downleveling runtime itself.
    #[serde(default = "default_downlevel_exempt")]
    pub downlevel_exempt: Vec<String>,

    /// Path substrings marking scripts that must not be minified.
    /// Deliberately narrower than `downlevel_exempt` by default.
    #[serde(default = "default_minify_exempt")]
    pub minify_exempt: Vec<String>,

    /// `[build]` section.
    #[serde(default)]
    pub build: BuildSection,
}

/// `[build]` section of the descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Output directory, relative to the project root.
    #[serde(default = "default_build_dir")]
    pub dir: String,

    /// Whether to coalesce entry-referenced files into the entrypoint.
    #[serde(default = "default_true")]
    pub bundle: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            dir: default_build_dir(),
            bundle: default_true(),
        }
    }
}

fn default_sources() -> Vec<String> {
    vec!["src/**/*".into()]
}
fn default_downlevel_exempt() -> Vec<String> {
    vec!["webcomponentsjs".into(), "browser-polyfill".into()]
}
fn default_minify_exempt() -> Vec<String> {
    vec!["browser-polyfill".into()]
}
fn default_build_dir() -> String {
    "build".into()
}
fn default_true() -> bool {
    true
}

impl ProjectDescriptor {
    /// Minimal descriptor for the given entrypoint, everything else default.
    pub fn new(entrypoint: impl Into<String>) -> Self {
        Self {
            entrypoint: entrypoint.into(),
            sources: default_sources(),
            extra_dependencies: Vec::new(),
            exclude: Vec::new(),
            downlevel_exempt: default_downlevel_exempt(),
            minify_exempt: default_minify_exempt(),
            build: BuildSection::default(),
        }
    }

    /// Validate descriptor fields that cannot be checked by serde alone.
    /// Runs at startup, before any filesystem mutation.
    pub fn validate(&self) -> Result<()> {
        if self.entrypoint.trim().is_empty() {
            return Err(SiteforgeError::config("entrypoint must not be empty"));
        }
        if Path::new(&self.entrypoint).is_absolute() {
            return Err(SiteforgeError::config(format!(
                "entrypoint '{}' must be relative to the project root",
                self.entrypoint
            )));
        }
        if self.build.dir.trim().is_empty() {
            return Err(SiteforgeError::config("build.dir must not be empty"));
        }
        if Path::new(&self.build.dir).is_absolute() {
            return Err(SiteforgeError::config(format!(
                "build.dir '{}' must be relative to the project root",
                self.build.dir
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Offline-cache configuration (matching precache.toml schema)
// ---------------------------------------------------------------------------

/// Configuration consumed only by the cache-generating phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrecacheConfig {
    /// Explicit versioning token. When absent, the token is derived from the
    /// content hashes of the written output, which keeps repeated builds of
    /// an unmodified tree byte-identical.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// URL globs excluded from the cacheable set.
    #[serde(default)]
    pub exclude: Vec<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load the project descriptor from a specific file path.
pub fn load_descriptor(path: &Path) -> Result<ProjectDescriptor> {
    let content =
        std::fs::read_to_string(path).map_err(|e| SiteforgeError::io(path, e))?;

    let descriptor: ProjectDescriptor = toml::from_str(&content).map_err(|e| {
        SiteforgeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    descriptor.validate()?;
    Ok(descriptor)
}

/// Load the offline-cache configuration. Returns defaults if the file does
/// not exist — the precache stage always runs.
pub fn load_precache_config(path: &Path) -> Result<PrecacheConfig> {
    if !path.exists() {
        tracing::debug!(?path, "precache config not found, using defaults");
        return Ok(PrecacheConfig::default());
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| SiteforgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SiteforgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a default descriptor to `dir/siteforge.toml` and return its path.
/// Refuses to overwrite an existing descriptor.
pub fn init_descriptor(dir: &Path, entrypoint: &str) -> Result<PathBuf> {
    let path = dir.join(DESCRIPTOR_FILE_NAME);
    if path.exists() {
        return Err(SiteforgeError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let descriptor = ProjectDescriptor::new(entrypoint);
    let content = toml::to_string_pretty(&descriptor)
        .map_err(|e| SiteforgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteforgeError::io(&path, e))?;
    tracing::info!(?path, "created default project descriptor");

    Ok(path)
}
