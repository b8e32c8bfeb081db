use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use openapi_sync::{PatchRule, Registry, SchemaInfo, SpecSource, SyncOptions, Value};
use openapi_sync_http::HttpFetcherConfig;
use serde::Deserialize;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "openapi-sync.toml";

/// Logo injected into `info.x-logo` when workarounds are on and no explicit
/// patches are configured.
pub const DEFAULT_LOGO: &str = "../../../_static/images/xbe_static_docs/logo.png";

/// Top-level configuration, loaded once per run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub spec_list: Vec<SpecEntry>,
    /// Base directory for cached specs. Defaults to the user cache dir.
    pub cache_dir: Option<PathBuf>,
    /// Where the combined document goes. Combination is skipped when unset.
    pub combined_output_path: Option<PathBuf>,
    #[serde(default)]
    pub stop_on_error: bool,
    #[serde(default)]
    pub debug_stop_after_sync: bool,
    #[serde(default)]
    pub apply_patch_workarounds: bool,
    #[serde(default)]
    pub patches: Vec<PatchEntry>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub retries: u32,
}

/// A single remote spec and its cache destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecEntry {
    pub source: String,
    pub dest: PathBuf,
    pub name: Option<String>,
}

/// A `path = value` edit applied to every spec before combining.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchEntry {
    pub path: String,
    pub value: Value,
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_concurrency() -> usize {
    4
}

/// `<user cache dir>/openapi-sync`
pub fn default_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("could not determine cache directory")?;
    Ok(base.join("openapi-sync"))
}

impl AppConfig {
    /// Parse a config file. Relative paths inside it are resolved against
    /// the file's own directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.rooted_at(base))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn rooted_at(mut self, base: &Path) -> Self {
        self.cache_dir = self.cache_dir.map(|dir| base.join(dir));
        self.combined_output_path = self.combined_output_path.map(|out| base.join(out));
        for entry in &mut self.spec_list {
            if let SpecSource::Local(path) = SpecSource::parse(&entry.source) {
                if path.is_relative() {
                    entry.source = base.join(path).to_string_lossy().into_owned();
                }
            }
        }
        self
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_cache_dir(),
        }
    }

    /// Validate `spec_list` into a registry. Fails on duplicate
    /// destinations before anything touches the network.
    pub fn registry(&self) -> Result<Registry> {
        let schemas = self
            .spec_list
            .iter()
            .map(|entry| {
                let info = SchemaInfo::new(entry.source.as_str(), entry.dest.clone());
                match &entry.name {
                    Some(name) => info.with_name(name.clone()),
                    None => info,
                }
            })
            .collect();

        Ok(Registry::new(self.cache_dir()?, schemas)?)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            stop_on_error: self.stop_on_error,
            concurrency: self.concurrency,
            retries: self.retries,
            ..SyncOptions::default()
        }
    }

    pub fn fetcher_config(&self) -> HttpFetcherConfig {
        HttpFetcherConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            ..HttpFetcherConfig::default()
        }
    }

    /// Patch rules, or none when workarounds are disabled. With workarounds
    /// on and no `[[patches]]`, the default logo rule applies.
    pub fn patch_rules(&self) -> Vec<PatchRule> {
        if !self.apply_patch_workarounds {
            return Vec::new();
        }
        if self.patches.is_empty() {
            tracing::debug!(logo = DEFAULT_LOGO, "no patches configured; using default logo");
            return vec![PatchRule::logo(DEFAULT_LOGO)];
        }
        self.patches
            .iter()
            .map(|p| PatchRule::from_dotted(&p.path, p.value.clone()))
            .collect()
    }
}
