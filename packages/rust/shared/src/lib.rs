//! Shared types, error model, and configuration for siteforge.
//!
//! This crate is the foundation depended on by all other siteforge crates.
//! It provides:
//! - [`SiteforgeError`] — the unified error type
//! - Domain types ([`AssetItem`], [`AssetKind`], [`Ownership`], [`BuildPhase`], [`BuildId`])
//! - Configuration ([`ProjectDescriptor`], [`PrecacheConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BuildSection, DESCRIPTOR_FILE_NAME, PRECACHE_FILE_NAME, PrecacheConfig, ProjectDescriptor,
    init_descriptor, load_descriptor, load_precache_config,
};
pub use error::{Result, SiteforgeError};
pub use types::{
    AssetItem, AssetKind, BuildId, BuildPhase, Ownership, PRECACHE_MANIFEST_FILE,
    PUSH_MANIFEST_FILE,
};
