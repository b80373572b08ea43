//! Per-item transform stages for the siteforge pipeline.
//!
//! Each stage is a function over item content (plus an options struct where
//! the stage is configurable), applied by the orchestrator according to the
//! item's kind and exemption tags. The stages are deliberately conservative
//! reference passes: the pipeline contract — ordering, exemptions, marker
//! preservation, fail-fast errors — is the point, not transform strength.
//! Swapping a stage for a stronger implementation means swapping one
//! function behind the same signature.

pub mod bundler;
pub mod css;
pub mod markup;
pub mod script;
pub mod splitter;

pub use bundler::{MarkupRef, RefKind, collect_references};
pub use markup::MinifyOptions;
pub use splitter::{is_inline_item, rejoin_group, split_group};
