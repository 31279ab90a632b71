//! Bundler asset manifests, mapping entry points to their script and style files.

use crate::error::BoxError;
use parking_lot::RwLock;
use serde::Deserialize;
use std::{collections::HashMap, fmt, path::PathBuf, pin::Pin, sync::Arc};

/// Script and style files of a single entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntryAssets {
    /// Script urls, in load order.
    #[serde(default)]
    pub js: Vec<String>,
    /// Stylesheet urls, in load order.
    #[serde(default)]
    pub css: Vec<String>,
}

/// Bundler output metadata, keyed by entry point name.
///
/// Deserializes from a json object such as
/// `{"rootErrorBoundary": {"js": ["/static/eb.js"], "css": ["/static/eb.css"]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    entries: HashMap<String, EntryAssets>,
}

impl AssetManifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a manifest from its json representation.
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }

    /// Add (or replace) the assets of an entry point.
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<String>, assets: EntryAssets) -> Self {
        self.entries.insert(name.into(), assets);
        self
    }

    /// The assets of the given entry point, if known.
    pub fn entry(&self, name: &str) -> Option<&EntryAssets> {
        self.entries.get(name)
    }
}

/// Asynchronous source of an [`AssetManifest`].
pub trait AssetManifestSource: Send + Sync + 'static {
    /// Fetch the current manifest.
    fn fetch(&self) -> impl Future<Output = Result<Arc<AssetManifest>, BoxError>> + Send + '_;
}

type BoxManifestFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Arc<AssetManifest>, BoxError>> + Send + 'a>>;

/// Object safe counterpart of [`AssetManifestSource`], for dynamic dispatch.
pub(crate) trait DynAssetManifestSource: Send + Sync + 'static {
    fn fetch_box(&self) -> BoxManifestFuture<'_>;
}

impl<T: AssetManifestSource> DynAssetManifestSource for T {
    fn fetch_box(&self) -> BoxManifestFuture<'_> {
        Box::pin(self.fetch())
    }
}

/// An [`AssetManifestSource`] serving a manifest held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetManifest {
    manifest: Arc<AssetManifest>,
}

impl StaticAssetManifest {
    /// Serve the given manifest.
    pub fn new(manifest: AssetManifest) -> Self {
        Self {
            manifest: Arc::new(manifest),
        }
    }
}

impl AssetManifestSource for StaticAssetManifest {
    async fn fetch(&self) -> Result<Arc<AssetManifest>, BoxError> {
        Ok(self.manifest.clone())
    }
}

/// An [`AssetManifestSource`] reading a json manifest from disk.
///
/// By default the file is read on every fetch, so a rebuilt bundle is
/// picked up without restart. Use [`FileAssetManifest::cached`] to keep the
/// first successfully parsed manifest instead.
pub struct FileAssetManifest {
    path: PathBuf,
    cache: Option<RwLock<Option<Arc<AssetManifest>>>>,
}

impl fmt::Debug for FileAssetManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAssetManifest")
            .field("path", &self.path)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl FileAssetManifest {
    /// Read the manifest from the given path on every fetch.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
        }
    }

    /// Read the manifest from the given path once, on first successful fetch.
    pub fn cached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Some(RwLock::new(None)),
        }
    }

    async fn read(&self) -> Result<Arc<AssetManifest>, BoxError> {
        let raw = tokio::fs::read(&self.path).await.map_err(|err| {
            format!(
                "failed to read asset manifest {}: {err}",
                self.path.display()
            )
        })?;
        let manifest = AssetManifest::from_json(&raw).map_err(|err| {
            format!(
                "failed to parse asset manifest {}: {err}",
                self.path.display()
            )
        })?;
        Ok(Arc::new(manifest))
    }
}

impl AssetManifestSource for FileAssetManifest {
    async fn fetch(&self) -> Result<Arc<AssetManifest>, BoxError> {
        let Some(cache) = &self.cache else {
            return self.read().await;
        };

        if let Some(manifest) = cache.read().clone() {
            return Ok(manifest);
        }

        let manifest = self.read().await?;
        *cache.write() = Some(manifest.clone());
        Ok(manifest)
    }
}
