use std::fmt;
use std::path::Path;

/// In-memory document tree shared by every format.
///
/// Mappings keep insertion order, so the same input bytes always produce
/// the same tree and the same serialized output.
pub use serde_yaml_ng::{Mapping, Value};

/// Errors from parsing or serializing a document.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Serialization format of a spec file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Infer the format from a file extension. Anything that is not `.json`
    /// is read as YAML, which also accepts plain JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    pub fn parse(self, bytes: &[u8]) -> Result<Value, FormatError> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::Yaml => Ok(serde_yaml_ng::from_slice(bytes)?),
        }
    }

    pub fn serialize(self, value: &Value) -> Result<Vec<u8>, FormatError> {
        match self {
            Self::Json => {
                let mut out = serde_json::to_vec_pretty(value)?;
                out.push(b'\n');
                Ok(out)
            }
            Self::Yaml => Ok(serde_yaml_ng::to_string(value)?.into_bytes()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}
