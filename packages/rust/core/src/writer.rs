//! Output directory management: the destructive `clean` phase and the final
//! write of the transformed item stream.

use std::fs;
use std::path::Path;

use tracing::{debug, info, instrument};

use siteforge_shared::{AssetItem, Result, SiteforgeError};

/// Remove a previous build and recreate the output directory empty.
///
/// This is the only destructive filesystem operation in the pipeline and it
/// runs strictly after enumeration, so a startup failure leaves any previous
/// build untouched.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub fn clean(out_dir: &Path) -> Result<()> {
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).map_err(|e| SiteforgeError::io(out_dir, e))?;
        debug!("removed previous build output");
    }
    fs::create_dir_all(out_dir).map_err(|e| SiteforgeError::io(out_dir, e))?;
    Ok(())
}

/// Write every item under `out_dir`, preserving its project-relative path.
/// Returns the number of files written; the orchestrator checks it against
/// the stream length so a dropped item can never go unnoticed.
#[instrument(skip_all, fields(out_dir = %out_dir.display(), items = items.len()))]
pub fn write_items(out_dir: &Path, items: &[AssetItem]) -> Result<usize> {
    let mut written = 0usize;

    for item in items {
        let target = out_dir.join(&item.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| SiteforgeError::io(parent, e))?;
        }
        fs::write(&target, &item.content).map_err(|e| SiteforgeError::io(&target, e))?;
        written += 1;
    }

    info!(written, "output written");
    Ok(written)
}
