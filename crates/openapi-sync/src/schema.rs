use std::fmt;
use std::path::{Path, PathBuf};

/// Where a spec is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecSource {
    /// An `http://` or `https://` URL.
    Remote(String),
    /// A path on the local filesystem.
    Local(PathBuf),
}

impl SpecSource {
    /// Classify a locator string. Anything that is not an HTTP(S) URL is
    /// treated as a local path; a leading `file://` is stripped.
    pub fn parse(locator: &str) -> Self {
        let trimmed = locator.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Remote(trimmed.to_owned())
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            Self::Local(PathBuf::from(path))
        } else {
            Self::Local(PathBuf::from(trimmed))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for SpecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for SpecSource {
    fn from(locator: &str) -> Self {
        Self::parse(locator)
    }
}

impl From<String> for SpecSource {
    fn from(locator: String) -> Self {
        Self::parse(&locator)
    }
}

/// One configured entry: a source and the cache file it lands in.
///
/// `dest` is relative to the registry's cache directory. `name` keys the
/// spec inside the combined document and defaults to the file stem of
/// `dest` (`petstore.yaml` -> `petstore`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
    source: SpecSource,
    dest: PathBuf,
    name: String,
}

impl SchemaInfo {
    pub fn new(source: impl Into<SpecSource>, dest: impl Into<PathBuf>) -> Self {
        let dest = dest.into();
        let name = default_name(&dest);
        Self {
            source: source.into(),
            dest,
            name,
        }
    }

    /// Override the derived name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn source(&self) -> &SpecSource {
        &self.source
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SchemaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.name, self.source, self.dest.display())
    }
}

fn default_name(dest: &Path) -> String {
    dest.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
