use std::path::Path;

use anyhow::{Context, Result, bail};
use openapi_sync::{CacheStore, Fetcher, SyncError, SyncReport};
use openapi_sync_http::HttpFetcher;

use super::{combiner, describe_failures, print_combine, print_report};
use crate::config::AppConfig;

/// Sync every configured spec, then combine unless told not to.
pub async fn run(config_path: &Path, no_combine: bool) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let fetcher = HttpFetcher::new(config.fetcher_config()).context("failed to build HTTP client")?;
    sync_and_combine(&config, &fetcher, no_combine).await?;
    Ok(())
}

async fn sync_and_combine(
    config: &AppConfig,
    fetcher: &dyn Fetcher,
    no_combine: bool,
) -> Result<SyncReport> {
    let registry = config.registry()?;
    let store = CacheStore::new(registry.cache_dir());

    println!(
        "Syncing {} specs into {}...",
        registry.len(),
        registry.cache_dir().display()
    );

    let report = match openapi_sync::sync(&registry, fetcher, &store, &config.sync_options()).await
    {
        Ok(report) => report,
        Err(SyncError::Aborted { report }) => {
            print_report(&report);
            bail!(
                "sync aborted after a failure (stop_on_error is set):\n{}",
                describe_failures(&report)
            );
        }
        Err(err) => return Err(err.into()),
    };

    print_report(&report);

    if !registry.is_empty() && report.failed() == registry.len() {
        bail!("every spec failed to sync:\n{}", describe_failures(&report));
    }

    if config.debug_stop_after_sync || no_combine {
        tracing::info!("stopping after sync");
        return Ok(report);
    }

    let Some(output) = &config.combined_output_path else {
        tracing::debug!("no combined_output_path configured");
        return Ok(report);
    };

    let combined = combiner(config.patch_rules())?
        .combine(&registry, &store, output)
        .with_context(|| format!("failed to write combined document {}", output.display()))?;
    print_combine(&combined);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use openapi_sync::SyncOutcome;
    use openapi_sync_http::HttpFetcherConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const PETSTORE: &str = "openapi: 3.0.0\ninfo:\n  title: Pet Store\n  version: 1.0.0\npaths: {}\n";
    const MUSEUM: &str = r#"{"openapi":"3.1.0","info":{"title":"Museum","version":"1.0.0"},"paths":{}}"#;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(HttpFetcherConfig::default()).unwrap()
    }

    async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn config(server: &MockServer, dir: &TempDir, extra: &str) -> AppConfig {
        let toml = format!(
            r#"
cache_dir = "cache"
combined_output_path = "combined.yaml"
concurrency = 1
{extra}

[[spec_list]]
source = "{uri}/petstore.yaml"
dest = "petstore.yaml"

[[spec_list]]
source = "{uri}/museum.json"
dest = "museum.json"
"#,
            uri = server.uri()
        );
        let config_path = dir.path().join("openapi-sync.toml");
        fs::write(&config_path, toml).unwrap();
        AppConfig::load(&config_path).unwrap()
    }

    #[tokio::test]
    async fn sync_writes_cache_and_combined_document() {
        let server = MockServer::start().await;
        serve(&server, "/petstore.yaml", 200, PETSTORE).await;
        serve(&server, "/museum.json", 200, MUSEUM).await;
        let dir = TempDir::new().unwrap();
        let config = config(&server, &dir, "");

        let report = sync_and_combine(&config, &fetcher(), false).await.unwrap();

        assert_eq!(report.updated(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("cache/petstore.yaml")).unwrap(),
            PETSTORE
        );
        let combined = fs::read_to_string(dir.path().join("combined.yaml")).unwrap();
        assert!(combined.contains("Pet Store"));
        assert!(combined.contains("Museum"));
    }

    #[tokio::test]
    async fn no_combine_leaves_output_untouched() {
        let server = MockServer::start().await;
        serve(&server, "/petstore.yaml", 200, PETSTORE).await;
        serve(&server, "/museum.json", 200, MUSEUM).await;
        let dir = TempDir::new().unwrap();
        let config = config(&server, &dir, "");

        sync_and_combine(&config, &fetcher(), true).await.unwrap();

        assert!(dir.path().join("cache/museum.json").exists());
        assert!(!dir.path().join("combined.yaml").exists());
    }

    #[tokio::test]
    async fn debug_stop_after_sync_skips_combination() {
        let server = MockServer::start().await;
        serve(&server, "/petstore.yaml", 200, PETSTORE).await;
        serve(&server, "/museum.json", 200, MUSEUM).await;
        let dir = TempDir::new().unwrap();
        let config = config(&server, &dir, "debug_stop_after_sync = true");

        sync_and_combine(&config, &fetcher(), false).await.unwrap();

        assert!(!dir.path().join("combined.yaml").exists());
    }

    #[tokio::test]
    async fn stop_on_error_aborts_before_later_entries() {
        let server = MockServer::start().await;
        serve(&server, "/petstore.yaml", 500, "boom").await;
        Mock::given(method("GET"))
            .and(path("/museum.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MUSEUM))
            .expect(0)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let config = config(&server, &dir, "stop_on_error = true");

        let err = sync_and_combine(&config, &fetcher(), false)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("petstore"));
        assert!(!dir.path().join("cache/museum.json").exists());
        assert!(!dir.path().join("combined.yaml").exists());
    }

    #[tokio::test]
    async fn partial_failure_keeps_previous_cache_and_still_combines() {
        let server = MockServer::start().await;
        serve(&server, "/petstore.yaml", 404, "").await;
        serve(&server, "/museum.json", 200, MUSEUM).await;
        let dir = TempDir::new().unwrap();
        let config = config(&server, &dir, "");
        fs::create_dir_all(dir.path().join("cache")).unwrap();
        fs::write(dir.path().join("cache/petstore.yaml"), PETSTORE).unwrap();

        let report = sync_and_combine(&config, &fetcher(), false).await.unwrap();

        assert!(matches!(
            report.outcome("petstore"),
            Some(SyncOutcome::Failed(_))
        ));
        assert_eq!(
            fs::read_to_string(dir.path().join("cache/petstore.yaml")).unwrap(),
            PETSTORE
        );
        assert!(dir.path().join("combined.yaml").exists());
    }

    #[tokio::test]
    async fn every_entry_failing_is_an_error() {
        let server = MockServer::start().await;
        serve(&server, "/petstore.yaml", 503, "").await;
        serve(&server, "/museum.json", 503, "").await;
        let dir = TempDir::new().unwrap();
        let config = config(&server, &dir, "");

        let err = sync_and_combine(&config, &fetcher(), false)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("every spec failed"));
        assert!(!dir.path().join("combined.yaml").exists());
    }
}
