//! Build pipeline orchestration for siteforge.
//!
//! Wires the asset, transform, and artifact crates into the linear phase
//! machine exposed as [`pipeline::build`]. The CLI app is a thin wrapper
//! around this crate.

pub mod adapters;
pub mod pipeline;
pub mod writer;

pub use pipeline::{
    BuildConfig, BuildReport, DEFAULT_CONCURRENCY, ProgressReporter, SilentProgress, build,
};
