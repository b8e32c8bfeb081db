use std::path::Path;

use anyhow::{Context, Result};
use openapi_sync::CacheStore;

use super::{combiner, print_combine};
use crate::config::AppConfig;

/// Rebuild the combined document from whatever is already cached.
pub fn run(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    combine_cached(&config)
}

fn combine_cached(config: &AppConfig) -> Result<()> {
    let output = config
        .combined_output_path
        .as_deref()
        .context("combined_output_path is not set in the config")?;
    let registry = config.registry()?;
    let store = CacheStore::new(registry.cache_dir());

    let report = combiner(config.patch_rules())?
        .combine(&registry, &store, output)
        .with_context(|| format!("failed to write combined document {}", output.display()))?;
    print_combine(&report);
    Ok(())
}
