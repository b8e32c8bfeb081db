use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::schema::SchemaInfo;

/// Key reserved for the metadata block of the combined document.
pub const METADATA_KEY: &str = "x-openapi-sync";

/// Configuration errors detected while building a [`Registry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("destination {} is used by both `{first}` and `{second}`", dest.display())]
    DestinationCollision {
        dest: PathBuf,
        first: String,
        second: String,
    },

    #[error("name `{name}` is used by both {first} and {second}")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("invalid destination {} for `{name}`: {reason}", dest.display())]
    InvalidDestination {
        name: String,
        dest: PathBuf,
        reason: &'static str,
    },

    #[error("invalid name for {dest}: {reason}")]
    InvalidName { dest: String, reason: String },

    #[error("could not resolve cache directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The ordered set of configured specs, rooted at a cache directory.
///
/// Construction validates every entry up front, so a registry that exists
/// has unique destinations and unique names.
#[derive(Debug, Clone)]
pub struct Registry {
    cache_dir: PathBuf,
    schemas: Vec<SchemaInfo>,
}

impl Registry {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        schemas: Vec<SchemaInfo>,
    ) -> Result<Self, RegistryError> {
        let cache_dir = cache_dir.into();
        let root = std::path::absolute(&cache_dir)
            .map(|p| normalize(&p))
            .map_err(|source| RegistryError::Io {
                path: cache_dir.clone(),
                source,
            })?;

        let mut by_dest: HashMap<PathBuf, &SchemaInfo> = HashMap::new();
        let mut by_name: HashMap<&str, &SchemaInfo> = HashMap::new();

        for schema in &schemas {
            validate_name(schema)?;
            let resolved = resolve_dest(&root, schema)?;

            if let Some(first) = by_dest.insert(resolved.clone(), schema) {
                return Err(RegistryError::DestinationCollision {
                    dest: resolved,
                    first: first.name().to_owned(),
                    second: schema.name().to_owned(),
                });
            }

            if let Some(first) = by_name.insert(schema.name(), schema) {
                return Err(RegistryError::NameCollision {
                    name: schema.name().to_owned(),
                    first: first.dest().display().to_string(),
                    second: schema.dest().display().to_string(),
                });
            }
        }

        Ok(Self {
            cache_dir: root,
            schemas,
        })
    }

    /// Absolute, normalised cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn schemas(&self) -> &[SchemaInfo] {
        &self.schemas
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaInfo> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Absolute path of a schema's cache file.
    pub fn resolve(&self, schema: &SchemaInfo) -> PathBuf {
        normalize(&self.cache_dir.join(schema.dest()))
    }

    /// The schema whose cache file would be `path`, if any.
    pub fn owner_of(&self, path: &Path) -> Option<&SchemaInfo> {
        let target = std::path::absolute(path).map(|p| normalize(&p)).ok()?;
        self.schemas.iter().find(|s| self.resolve(s) == target)
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a SchemaInfo;
    type IntoIter = std::slice::Iter<'a, SchemaInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn validate_name(schema: &SchemaInfo) -> Result<(), RegistryError> {
    let reason = if schema.name().trim().is_empty() {
        "name is empty".to_owned()
    } else if schema.name() == METADATA_KEY {
        format!("`{METADATA_KEY}` is reserved for combined metadata")
    } else {
        return Ok(());
    };

    Err(RegistryError::InvalidName {
        dest: schema.dest().display().to_string(),
        reason,
    })
}

fn resolve_dest(root: &Path, schema: &SchemaInfo) -> Result<PathBuf, RegistryError> {
    let invalid = |reason| RegistryError::InvalidDestination {
        name: schema.name().to_owned(),
        dest: schema.dest().to_path_buf(),
        reason,
    };

    let dest = schema.dest();
    if dest.as_os_str().is_empty() {
        return Err(invalid("destination is empty"));
    }
    if dest.has_root() {
        return Err(invalid("destination must be relative to the cache directory"));
    }

    let resolved = normalize(&root.join(dest));
    if resolved == root || !resolved.starts_with(root) {
        return Err(invalid("destination escapes the cache directory"));
    }
    Ok(resolved)
}

/// Lexically collapse `.` and `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(dest: &str) -> SchemaInfo {
        SchemaInfo::new(format!("https://example.com/{dest}"), dest)
    }

    #[test]
    fn unique_destinations_are_accepted() {
        let registry = Registry::new(
            "/cache",
            vec![info("petstore.yaml"), info("redocly.json"), info("v2/users.yaml")],
        )
        .unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.resolve(&registry.schemas()[2]),
            PathBuf::from("/cache/v2/users.yaml")
        );
    }

    #[test]
    fn duplicate_destination_is_rejected() {
        let result = Registry::new(
            "/cache",
            vec![
                info("petstore.yaml"),
                SchemaInfo::new("https://other.example.com/a.yaml", "petstore.yaml")
                    .with_name("other"),
            ],
        );
        assert!(matches!(
            result,
            Err(RegistryError::DestinationCollision { .. })
        ));
    }

    #[test]
    fn destinations_equal_after_normalisation_collide() {
        let result = Registry::new(
            "/cache",
            vec![
                info("specs/petstore.yaml"),
                SchemaInfo::new("b.yaml", "specs/../specs/./petstore.yaml").with_name("again"),
            ],
        );
        match result {
            Err(RegistryError::DestinationCollision { dest, first, second }) => {
                assert_eq!(dest, PathBuf::from("/cache/specs/petstore.yaml"));
                assert_eq!(first, "petstore");
                assert_eq!(second, "again");
            }
            other => panic!("expected destination collision, got {other:?}"),
        }
    }

    #[test]
    fn same_stem_in_different_directories_collides_on_name() {
        let result = Registry::new("/cache", vec![info("a/petstore.yaml"), info("b/petstore.yaml")]);
        assert!(matches!(result, Err(RegistryError::NameCollision { .. })));
    }

    #[test]
    fn explicit_names_resolve_stem_clash() {
        let result = Registry::new(
            "/cache",
            vec![
                info("a/petstore.yaml").with_name("petstore-a"),
                info("b/petstore.yaml").with_name("petstore-b"),
            ],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn absolute_destination_is_rejected() {
        let result = Registry::new("/cache", vec![info("/etc/petstore.yaml")]);
        assert!(matches!(
            result,
            Err(RegistryError::InvalidDestination { .. })
        ));
    }

    #[test]
    fn escaping_destination_is_rejected() {
        let result = Registry::new("/cache", vec![info("../petstore.yaml")]);
        assert!(matches!(
            result,
            Err(RegistryError::InvalidDestination { .. })
        ));
    }

    #[test]
    fn reserved_name_is_rejected() {
        let result = Registry::new(
            "/cache",
            vec![info("petstore.yaml").with_name(METADATA_KEY)],
        );
        assert!(matches!(result, Err(RegistryError::InvalidName { .. })));
    }

    #[test]
    fn empty_registry_is_valid() {
        let registry = Registry::new("/cache", vec![]).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn owner_of_finds_schema_by_path() {
        let registry = Registry::new("/cache", vec![info("petstore.yaml")]).unwrap();
        let owner = registry.owner_of(Path::new("/cache/./petstore.yaml"));
        assert_eq!(owner.map(|s| s.name()), Some("petstore"));
        assert!(registry.owner_of(Path::new("/cache/combined.yaml")).is_none());
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }
}
