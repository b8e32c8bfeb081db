//! Builds the aggregate document from every cached spec.
//!
//! The combined document is rebuilt from scratch on each run. Its first key
//! is the metadata block ([`METADATA_KEY`]); each spec then follows under its
//! registry name, in registry order. Nothing in the output depends on map
//! iteration order or on the wall clock unless a timestamp is supplied, so
//! identical cache contents always produce identical bytes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::cache::{self, CacheError, CacheStore, WriteError};
use crate::document::{Format, FormatError, Mapping, Value};
use crate::patch::{self, PatchRule};
use crate::registry::{METADATA_KEY, Registry};

/// Errors that stop a combination run. None of them leave a partially
/// written artifact behind.
#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    #[error("`{name}` has no cached copy at {}; run sync first", path.display())]
    MissingCache { name: String, path: PathBuf },

    #[error("failed to read cached `{name}`: {source}")]
    Cache {
        name: String,
        #[source]
        source: CacheError,
    },

    #[error("failed to parse `{name}` ({}) as {format}: {source}", path.display())]
    Parse {
        name: String,
        path: PathBuf,
        format: Format,
        #[source]
        source: FormatError,
    },

    #[error("failed to serialize combined document: {0}")]
    Serialize(#[source] FormatError),

    #[error("combined output {} would overwrite the cached copy of `{name}`", path.display())]
    OutputCollision { name: String, path: PathBuf },

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result of writing the combined document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineReport {
    pub output: PathBuf,
    pub specs: usize,
    /// False when the existing artifact already had identical bytes.
    pub written: bool,
}

/// Merges cached specs into one YAML document.
#[derive(Debug, Clone, Default)]
pub struct Combiner {
    patches: Vec<PatchRule>,
    generated_at: Option<DateTime<Utc>>,
}

impl Combiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules applied to each spec after parsing.
    pub fn with_patches(mut self, patches: Vec<PatchRule>) -> Self {
        self.patches = patches;
        self
    }

    /// Record a generation timestamp in the metadata block.
    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = Some(generated_at);
        self
    }

    /// Load, patch and nest every cached spec. Any missing or malformed
    /// input fails the whole build.
    pub fn build(&self, registry: &Registry, store: &CacheStore) -> Result<Value, CombineError> {
        let mut sources = Vec::with_capacity(registry.len());
        let mut specs = Vec::with_capacity(registry.len());

        for schema in registry {
            let path = store.path_for(schema.dest());
            let bytes = store.read(schema.dest()).map_err(|e| match e {
                CacheError::NotFound { path } => CombineError::MissingCache {
                    name: schema.name().to_owned(),
                    path,
                },
                other => CombineError::Cache {
                    name: schema.name().to_owned(),
                    source: other,
                },
            })?;

            let format = Format::from_path(schema.dest());
            let tree = format
                .parse(&bytes)
                .map_err(|source| CombineError::Parse {
                    name: schema.name().to_owned(),
                    path: path.clone(),
                    format,
                    source,
                })?;
            let tree = patch::apply(tree, &self.patches);

            let mut entry = Mapping::new();
            entry.insert("name".into(), schema.name().into());
            entry.insert("source".into(), schema.source().to_string().into());
            entry.insert(
                "dest".into(),
                schema.dest().to_string_lossy().into_owned().into(),
            );
            entry.insert("sha256".into(), digest(&bytes).into());
            sources.push(Value::Mapping(entry));

            specs.push((schema.name().to_owned(), tree));
        }

        let mut combined = Mapping::new();
        combined.insert(METADATA_KEY.into(), self.metadata(sources));
        for (name, tree) in specs {
            combined.insert(name.into(), tree);
        }
        Ok(Value::Mapping(combined))
    }

    /// Build the combined document and write it atomically to `output`.
    ///
    /// The write is skipped when `output` already holds identical bytes.
    pub fn combine(
        &self,
        registry: &Registry,
        store: &CacheStore,
        output: &Path,
    ) -> Result<CombineReport, CombineError> {
        if let Some(owner) = registry.owner_of(output) {
            return Err(CombineError::OutputCollision {
                name: owner.name().to_owned(),
                path: output.to_path_buf(),
            });
        }

        let document = self.build(registry, store)?;
        let bytes = Format::Yaml
            .serialize(&document)
            .map_err(CombineError::Serialize)?;

        let unchanged = matches!(cache::read_file(output), Ok(existing) if existing == bytes);
        if unchanged {
            tracing::debug!(output = %output.display(), "combined document unchanged");
        } else {
            cache::write_atomic(output, &bytes)?;
            tracing::info!(
                output = %output.display(),
                specs = registry.len(),
                "wrote combined document"
            );
        }

        Ok(CombineReport {
            output: output.to_path_buf(),
            specs: registry.len(),
            written: !unchanged,
        })
    }

    fn metadata(&self, sources: Vec<Value>) -> Value {
        let mut meta = Mapping::new();
        meta.insert(
            "generator".into(),
            format!("openapi-sync {}", env!("CARGO_PKG_VERSION")).into(),
        );
        if let Some(ts) = self.generated_at {
            meta.insert(
                "generated_at".into(),
                ts.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
            );
        }
        meta.insert("sources".into(), Value::Sequence(sources));
        Value::Mapping(meta)
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
