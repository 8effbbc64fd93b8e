mod helpers;
mod import;
mod search;
mod summary;

use anyhow::{Context, Result};

pub(crate) use import::{cmd_import_common, cmd_import_quick_start};
pub(crate) use search::{cmd_barcode, cmd_cache, cmd_search};
pub(crate) use summary::cmd_summary;

/// Service calls block (database lock, rate-limit waits, remote requests), so
/// commands run them off the async runtime.
pub(super) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking task failed")?
}
