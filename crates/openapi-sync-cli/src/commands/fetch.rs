use std::path::Path;

use anyhow::{Context, Result, bail};
use openapi_sync::{CacheStore, Fetcher, PatchRule, Registry, SchemaInfo, SyncOptions, SyncReport};
use openapi_sync_http::{HttpFetcher, HttpFetcherConfig};

use super::{combiner, describe_failures, print_combine, print_report};

/// Fetch one spec to `dest`, optionally writing a combined document too.
pub async fn run(
    url: &str,
    dest: &Path,
    combined_schema_file: Option<&Path>,
    logo: Option<String>,
) -> Result<()> {
    let fetcher =
        HttpFetcher::new(HttpFetcherConfig::default()).context("failed to build HTTP client")?;
    fetch_one(&fetcher, url, dest, combined_schema_file, logo).await?;
    Ok(())
}

async fn fetch_one(
    fetcher: &dyn Fetcher,
    url: &str,
    dest: &Path,
    combined_schema_file: Option<&Path>,
    logo: Option<String>,
) -> Result<SyncReport> {
    let file_name = dest
        .file_name()
        .with_context(|| format!("--dest must name a file, got {}", dest.display()))?;
    let cache_dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let registry = Registry::new(cache_dir, vec![SchemaInfo::new(url, file_name)])?;
    let store = CacheStore::new(registry.cache_dir());

    let report = openapi_sync::sync(&registry, fetcher, &store, &SyncOptions::default()).await?;
    print_report(&report);

    if report.failed() > 0 {
        bail!("failed to fetch {url}:\n{}", describe_failures(&report));
    }

    let Some(output) = combined_schema_file else {
        if logo.is_some() {
            tracing::warn!(
                "patch workarounds only apply to the combined document; \
                 pass --combined-schema-file"
            );
        }
        return Ok(report);
    };

    let patches = logo.map(PatchRule::logo).into_iter().collect();
    let combined = combiner(patches)?
        .combine(&registry, &store, output)
        .with_context(|| format!("failed to write combined document {}", output.display()))?;
    print_combine(&combined);

    Ok(report)
}
