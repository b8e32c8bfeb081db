pub mod cache;
pub mod combine;
pub mod document;
pub mod fetch;
pub mod patch;
pub mod registry;
pub mod schema;
pub mod sync;

pub use cache::{CacheError, CacheStore, WriteError, write_atomic};
pub use combine::{CombineError, CombineReport, Combiner};
pub use document::{Format, FormatError, Value};
pub use fetch::{FetchError, Fetcher};
pub use patch::PatchRule;
pub use registry::{METADATA_KEY, Registry, RegistryError};
pub use schema::{SchemaInfo, SpecSource};
pub use sync::{
    EntryReport, FailureReason, SyncError, SyncOptions, SyncOutcome, SyncReport, sync,
};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
