//! Ports for local byte sources and codec decoding.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::domain::entities::{LoadOptions, ResourceUri};
use crate::domain::errors::{LoadError, LoadResult};

/// Decodes raw bytes into an image. Runs on a blocking thread.
pub trait ImageDecoderPort: Send + Sync {
    /// Decodes `bytes`, applying the size limits and processors in `options`.
    ///
    /// # Errors
    /// Returns [`LoadError::Decode`] if the bytes are not a supported image.
    fn decode(&self, bytes: &[u8], options: &LoadOptions) -> LoadResult<image::DynamicImage>;
}

/// Resolves `content://` identifiers to a byte stream.
#[async_trait]
pub trait ContentResolverPort: Send + Sync {
    /// Reads the full content behind `uri`.
    async fn open(&self, uri: &ResourceUri) -> LoadResult<Bytes>;
}

/// Looks up resources compiled into the application by name.
pub trait EmbeddedResourcePort: Send + Sync {
    /// Returns the bytes of the named resource, if present.
    fn get(&self, name: &str) -> Option<Bytes>;
}

/// Joins `relative` onto `root`, refusing paths that would leave `root`.
///
/// # Errors
/// Returns [`LoadError::Io`] if `relative` contains `..` or a drive prefix.
pub fn join_within(root: &Path, relative: &str) -> LoadResult<PathBuf> {
    let relative = Path::new(relative.trim_start_matches('/'));
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return Err(LoadError::io(format!(
            "path escapes {}: {}",
            root.display(),
            relative.display()
        )));
    }
    Ok(root.join(relative))
}

/// Content resolver mapping provider authorities to directories.
///
/// `content://<authority>/<path>` reads `<root>/<path>` for the registered root.
#[derive(Debug, Default)]
pub struct DirectoryContentResolver {
    roots: RwLock<HashMap<String, PathBuf>>,
}

impl DirectoryContentResolver {
    /// Creates a resolver with no authorities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the directory backing `authority`.
    pub fn register(&self, authority: impl Into<String>, root: impl Into<PathBuf>) {
        self.roots.write().insert(authority.into(), root.into());
    }
}

#[async_trait]
impl ContentResolverPort for DirectoryContentResolver {
    async fn open(&self, uri: &ResourceUri) -> LoadResult<Bytes> {
        let (authority, path) = uri.path().split_once('/').unwrap_or((uri.path(), ""));
        let root = self
            .roots
            .read()
            .get(authority)
            .cloned()
            .ok_or_else(|| LoadError::io(format!("no content provider for {authority}")))?;
        let bytes = tokio::fs::read(join_within(&root, path)?).await?;
        Ok(Bytes::from(bytes))
    }
}

/// In-memory table of embedded resources.
#[derive(Debug, Default)]
pub struct EmbeddedResources {
    resources: RwLock<HashMap<String, Bytes>>,
}

impl EmbeddedResources {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource under `name`.
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Bytes>) {
        self.resources.write().insert(name.into(), bytes.into());
    }
}

impl EmbeddedResourcePort for EmbeddedResources {
    fn get(&self, name: &str) -> Option<Bytes> {
        self.resources.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    #[tokio::test]
    async fn test_directory_resolver_reads_registered_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("13"), b"album-art").unwrap();

        let resolver = DirectoryContentResolver::new();
        resolver.register("media", dir.path());

        let uri = ResourceUri::parse("content://media/13").unwrap();
        let bytes = resolver.open(&uri).await.unwrap();
        assert_eq!(&bytes[..], b"album-art");
    }

    #[tokio::test]
    async fn test_directory_resolver_unknown_authority() {
        let resolver = DirectoryContentResolver::new();
        let uri = ResourceUri::parse("content://nobody/1").unwrap();
        assert!(matches!(resolver.open(&uri).await, Err(LoadError::Io(_))));
    }

    #[test_case("icons/a.png", Some("icons/a.png") ; "nested")]
    #[test_case("/a.png", Some("a.png") ; "leading slash")]
    #[test_case("./a.png", Some("a.png") ; "current dir")]
    #[test_case("../etc/passwd", None ; "parent")]
    #[test_case("icons/../../x", None ; "parent after normal")]
    fn test_join_within(relative: &str, expected: Option<&str>) {
        let root = Path::new("/srv/assets");
        let joined = join_within(root, relative).ok();
        assert_eq!(joined, expected.map(|e| root.join(e)));
    }

    #[tokio::test]
    async fn test_directory_resolver_rejects_escape() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("media")).unwrap();
        std::fs::write(dir.path().join("secret"), b"private").unwrap();
        let resolver = DirectoryContentResolver::new();
        resolver.register("media", dir.path().join("media"));

        let uri = ResourceUri::parse("content://media/../secret").unwrap();
        assert!(matches!(resolver.open(&uri).await, Err(LoadError::Io(_))));
    }

    #[test]
    fn test_embedded_lookup() {
        let resources = EmbeddedResources::new();
        resources.insert("logo", Bytes::from_static(b"png"));
        assert_eq!(resources.get("logo").as_deref(), Some(&b"png"[..]));
        assert!(resources.get("missing").is_none());
    }
}
