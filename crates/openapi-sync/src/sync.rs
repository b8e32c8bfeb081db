//! Brings the cache up to date with every source in a [`Registry`].
//!
//! Entries are independent: each one is fetched, compared against its
//! cached copy, and written only when the bytes changed. Up to
//! `concurrency` entries are in flight at once; results come back in
//! registry order regardless.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::cache::{CacheError, CacheStore, WriteError};
use crate::fetch::{FetchError, Fetcher};
use crate::registry::Registry;
use crate::schema::SchemaInfo;

/// Why a single entry could not be refreshed.
#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{locator} returned an empty body")]
    EmptyContent { locator: String },
}

/// What happened to one registry entry.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The cache file was created or replaced.
    Updated,
    /// The fetched bytes matched the cache; nothing was written.
    Unchanged,
    /// The fetch failed; any existing cache file was left alone.
    Failed(FailureReason),
    /// Never started because the run was already aborting.
    Skipped,
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Failed(_) => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome of one entry, tied to the entry it describes.
#[derive(Debug)]
pub struct EntryReport {
    pub schema: SchemaInfo,
    pub outcome: SyncOutcome,
}

/// Per-entry results of a sync run, in registry order.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub entries: Vec<EntryReport>,
}

impl SyncReport {
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Updated))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(SyncOutcome::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Skipped))
    }

    /// Failed entries and their causes.
    pub fn failures(&self) -> impl Iterator<Item = (&SchemaInfo, &FailureReason)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            SyncOutcome::Failed(reason) => Some((&entry.schema, reason)),
            _ => None,
        })
    }

    /// The outcome recorded for the entry named `name`.
    pub fn outcome(&self, name: &str) -> Option<&SyncOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.schema.name() == name)
            .map(|entry| &entry.outcome)
    }

    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} unchanged, {} failed",
            self.updated(),
            self.unchanged(),
            self.failed()
        )?;
        if self.skipped() > 0 {
            write!(f, ", {} skipped", self.skipped())?;
        }
        Ok(())
    }
}

/// Fatal sync errors. Per-entry fetch failures are only fatal when
/// `stop_on_error` is set.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync aborted: {} of {} spec(s) failed ({report})", report.failed(), report.entries.len())]
    Aborted { report: SyncReport },

    #[error("cache write failed for `{name}`: {source}")]
    Write {
        name: String,
        #[source]
        source: WriteError,
    },

    #[error("cache read failed for `{name}`: {source}")]
    Cache {
        name: String,
        #[source]
        source: CacheError,
    },
}

/// Knobs for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Abort on the first failed fetch instead of recording it and moving on.
    pub stop_on_error: bool,
    /// Maximum number of entries in flight at once.
    pub concurrency: usize,
    /// Extra fetch attempts per entry after the first one fails.
    pub retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            stop_on_error: false,
            concurrency: 4,
            retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Fatal, per-entry: cache integrity is in question.
enum EntryFatal {
    Write(WriteError),
    Cache(CacheError),
}

/// Refresh every cached spec in `registry`.
///
/// With `stop_on_error`, the first failure stops any further entries from
/// starting; entries already in flight run to completion. The returned
/// [`SyncError::Aborted`] carries the full report.
pub async fn sync(
    registry: &Registry,
    fetcher: &dyn Fetcher,
    store: &CacheStore,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let abort = AtomicBool::new(false);
    let concurrency = options.concurrency.max(1);

    let results: Vec<(SchemaInfo, Result<SyncOutcome, EntryFatal>)> =
        stream::iter(registry.iter())
            .map(|schema| {
                let abort = &abort;
                async move {
                    let result = sync_entry(schema, fetcher, store, options, abort).await;
                    (schema.clone(), result)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

    let mut report = SyncReport::default();
    let mut fatal = None;

    for (schema, result) in results {
        match result {
            Ok(outcome) => report.entries.push(EntryReport { schema, outcome }),
            Err(err) => {
                if fatal.is_none() {
                    fatal = Some(match err {
                        EntryFatal::Write(source) => SyncError::Write {
                            name: schema.name().to_owned(),
                            source,
                        },
                        EntryFatal::Cache(source) => SyncError::Cache {
                            name: schema.name().to_owned(),
                            source,
                        },
                    });
                }
                report.entries.push(EntryReport {
                    schema,
                    outcome: SyncOutcome::Skipped,
                });
            }
        }
    }

    if let Some(err) = fatal {
        tracing::error!(error = %err, "sync stopped");
        return Err(err);
    }

    if options.stop_on_error && report.failed() > 0 {
        return Err(SyncError::Aborted { report });
    }

    tracing::info!(%report, "sync finished");
    Ok(report)
}

async fn sync_entry(
    schema: &SchemaInfo,
    fetcher: &dyn Fetcher,
    store: &CacheStore,
    options: &SyncOptions,
    abort: &AtomicBool,
) -> Result<SyncOutcome, EntryFatal> {
    if abort.load(Ordering::SeqCst) {
        tracing::debug!(name = schema.name(), "skipped after abort");
        return Ok(SyncOutcome::Skipped);
    }

    let bytes = match fetch_with_retries(schema, fetcher, options, abort).await {
        Ok(bytes) => bytes,
        Err(reason) => {
            tracing::warn!(
                name = schema.name(),
                source = %schema.source(),
                error = %reason,
                "fetch failed; keeping existing cache"
            );
            if options.stop_on_error {
                abort.store(true, Ordering::SeqCst);
            }
            return Ok(SyncOutcome::Failed(reason));
        }
    };

    let changed = store.changed(schema.dest(), &bytes).map_err(|e| {
        abort.store(true, Ordering::SeqCst);
        EntryFatal::Cache(e)
    })?;

    if !changed {
        tracing::debug!(name = schema.name(), "unchanged");
        return Ok(SyncOutcome::Unchanged);
    }

    store.write(schema.dest(), &bytes).map_err(|e| {
        abort.store(true, Ordering::SeqCst);
        EntryFatal::Write(e)
    })?;

    tracing::info!(
        name = schema.name(),
        dest = %store.path_for(schema.dest()).display(),
        bytes = bytes.len(),
        "updated"
    );
    Ok(SyncOutcome::Updated)
}

async fn fetch_with_retries(
    schema: &SchemaInfo,
    fetcher: &dyn Fetcher,
    options: &SyncOptions,
    abort: &AtomicBool,
) -> Result<Vec<u8>, FailureReason> {
    let mut attempt = 0;
    loop {
        tracing::debug!(name = schema.name(), source = %schema.source(), attempt, "fetching");

        let result = match fetcher.fetch(schema.source()).await {
            Ok(bytes) if bytes.is_empty() => Err(FailureReason::EmptyContent {
                locator: schema.source().to_string(),
            }),
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(FailureReason::Fetch(e)),
        };

        match result {
            Ok(bytes) => return Ok(bytes),
            Err(reason) if attempt >= options.retries || abort.load(Ordering::SeqCst) => {
                return Err(reason);
            }
            Err(reason) => {
                attempt += 1;
                tracing::debug!(name = schema.name(), error = %reason, "retrying");
                tokio::time::sleep(options.retry_delay).await;
            }
        }
    }
}
