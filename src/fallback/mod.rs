//! Rendering of the error boundary fallback page.
//!
//! When a request fails, an application can have a dedicated page rendered
//! in place of the one that failed: the error boundary. The
//! [`FallbackRenderer`] renders that [`ErrorBoundaryComponent`], injects the
//! client side state it needs to hydrate, and links the assets of its
//! bundler entry point.
//!
//! Rendering is best effort: every failure is reported as a [`FallbackError`],
//! never as a panic, so the caller can fall back to the original error.

use crate::error::{BoxError, SerializedError};
use http::Uri;
use std::{fmt, panic::AssertUnwindSafe, sync::Arc};

pub mod manifest;
use manifest::{AssetManifestSource, DynAssetManifestSource, EntryAssets};

mod html;

/// Name of the bundler entry point holding the error boundary assets.
pub const DEFAULT_ENTRY_POINT: &str = "rootErrorBoundary";

/// Props the error boundary component is rendered with.
#[derive(Debug, Clone, Copy)]
pub struct FallbackProps<'a> {
    /// The client safe error.
    pub error: &'a SerializedError,
    /// The url of the failed request.
    pub url: &'a Uri,
}

/// An application supplied component, rendering the fallback page.
pub trait ErrorBoundaryComponent: Send + Sync + 'static {
    /// Render the component to a full html document.
    fn render(&self, props: &FallbackProps<'_>) -> Result<String, BoxError>;
}

impl<F> ErrorBoundaryComponent for F
where
    F: Fn(&FallbackProps<'_>) -> Result<String, BoxError> + Send + Sync + 'static,
{
    fn render(&self, props: &FallbackProps<'_>) -> Result<String, BoxError> {
        self(props)
    }
}

/// Reason a fallback page could not be rendered.
#[derive(Debug)]
pub enum FallbackError {
    /// No error boundary component is registered.
    NoComponent,
    /// The asset manifest could not be fetched.
    AssetManifest(BoxError),
    /// The asset manifest has no such entry point.
    MissingEntryPoint(String),
    /// The client state could not be serialized.
    State(serde_json::Error),
    /// The component failed to render.
    Render(BoxError),
    /// The component panicked while rendering.
    Panic(String),
}

impl fmt::Display for FallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoComponent => f.write_str("no error boundary component registered"),
            Self::AssetManifest(err) => write!(f, "asset manifest unavailable: {err}"),
            Self::MissingEntryPoint(name) => {
                write!(f, "asset manifest has no entry point named '{name}'")
            }
            Self::State(err) => write!(f, "failed to serialize client state: {err}"),
            Self::Render(err) => write!(f, "error boundary failed to render: {err}"),
            Self::Panic(msg) => write!(f, "error boundary panicked while rendering: {msg}"),
        }
    }
}

impl std::error::Error for FallbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AssetManifest(err) | Self::Render(err) => Some(err.as_ref()),
            Self::State(err) => Some(err),
            Self::NoComponent
            | Self::MissingEntryPoint(_) | Self::Panic(_) => None,
        }
    }
}

/// A rendered fallback document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFallback {
    /// The final markup.
    pub markup: String,
    /// Whether the client state and asset tags made it into the markup.
    ///
    /// False when the component rendered no closing head tag,
    /// in which case the markup is the component output as-is.
    pub state_injected: bool,
}

/// Renders an [`ErrorBoundaryComponent`] to a complete fallback document.
///
/// Without asset manifest source only the client state is injected.
///
/// A renderer without component (its [`Default`]) never renders,
/// it can be used to collect the settings before the component is known.
#[derive(Clone)]
pub struct FallbackRenderer {
    component: Option<Arc<dyn ErrorBoundaryComponent>>,
    manifest: Option<Arc<dyn DynAssetManifestSource>>,
    entry_point: Arc<str>,
}

impl fmt::Debug for FallbackRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackRenderer")
            .field("component", &self.component.is_some())
            .field("manifest", &self.manifest.is_some())
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

impl Default for FallbackRenderer {
    fn default() -> Self {
        Self {
            component: None,
            manifest: None,
            entry_point: DEFAULT_ENTRY_POINT.into(),
        }
    }
}

impl FallbackRenderer {
    /// Create a renderer for the given component,
    /// without asset manifest and using the [`DEFAULT_ENTRY_POINT`].
    pub fn new(component: impl ErrorBoundaryComponent) -> Self {
        Self::default().with_component(component)
    }

    /// Set the component rendering the fallback page.
    #[must_use]
    pub fn with_component(mut self, component: impl ErrorBoundaryComponent) -> Self {
        self.component = Some(Arc::new(component));
        self
    }

    /// Whether a component is registered.
    pub fn has_component(&self) -> bool {
        self.component.is_some()
    }

    /// Set the source of the asset manifest,
    /// its entry point assets are linked in the fallback page.
    #[must_use]
    pub fn with_asset_manifest(mut self, source: impl AssetManifestSource) -> Self {
        self.manifest = Some(Arc::new(source));
        self
    }

    /// Set the entry point whose assets are linked in the fallback page.
    #[must_use]
    pub fn with_entry_point(mut self, entry_point: impl AsRef<str>) -> Self {
        self.entry_point = entry_point.as_ref().into();
        self
    }

    /// The entry point whose assets are linked in the fallback page.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Render the fallback document for the given error and url.
    pub async fn render(
        &self,
        error: &SerializedError,
        url: &Uri,
    ) -> Result<RenderedFallback, FallbackError> {
        let component = self.component.as_ref().ok_or(FallbackError::NoComponent)?;
        let manifest = match &self.manifest {
            Some(source) => Some(
                source
                    .fetch_box()
                    .await
                    .map_err(FallbackError::AssetManifest)?,
            ),
            None => None,
        };
        let no_assets = EntryAssets::default();
        let assets = match &manifest {
            Some(manifest) => manifest
                .entry(&self.entry_point)
                .ok_or_else(|| FallbackError::MissingEntryPoint(self.entry_point.to_string()))?,
            None => &no_assets,
        };

        let props = FallbackProps { error, url };
        let markup = std::panic::catch_unwind(AssertUnwindSafe(|| component.render(&props)))
            .map_err(|panic_err| FallbackError::Panic(panic_message(panic_err.as_ref())))?
            .map_err(FallbackError::Render)?;

        let snippet = html::head_snippet(url, error, assets).map_err(FallbackError::State)?;
        Ok(match html::inject_into_head(markup, &snippet) {
            Ok(markup) => RenderedFallback {
                markup,
                state_injected: true,
            },
            Err(markup) => RenderedFallback {
                markup,
                state_injected: false,
            },
        })
    }
}

fn panic_message(err: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown panic".to_owned()
    }
}
