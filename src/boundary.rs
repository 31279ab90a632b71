//! Middleware turning request errors into error boundary responses.
//!
//! # Example
//!
//! ```
//! use ssr_boundary::{
//!     Layer, Request, RequestError, Service, body,
//!     boundary::{ErrorBoundaryHandler, ErrorBoundaryLayer},
//!     fallback::{FallbackProps, manifest::{AssetManifest, EntryAssets, StaticAssetManifest}},
//!     service::service_fn,
//! };
//! use http::StatusCode;
//!
//! # #[tokio::main]
//! # async fn main() {
//! fn error_page(props: &FallbackProps<'_>) -> Result<String, ssr_boundary::BoxError> {
//!     Ok(format!(
//!         "<html><head></head><body><h1>{}</h1></body></html>",
//!         props.error.message,
//!     ))
//! }
//!
//! let manifest = AssetManifest::new().with_entry("rootErrorBoundary", EntryAssets::default());
//! let handler = ErrorBoundaryHandler::new()
//!     .with_fallback(error_page)
//!     .with_asset_manifest(StaticAssetManifest::new(manifest));
//!
//! let service = ErrorBoundaryLayer::new(handler).into_layer(service_fn(async |_req: Request| {
//!     Err::<ssr_boundary::Response, _>(RequestError::http(StatusCode::BAD_GATEWAY, "upstream down"))
//! }));
//!
//! let res = service.serve(http::Request::new(body::empty())).await.unwrap();
//! assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
//! # }
//! ```

use crate::classify::{DEFAULT_REDIRECT_STATUS, LogEvent, LogLevel, Verdict, classify};
use crate::config::{ConfigError, ErrorBoundaryConfig};
use crate::diagnostics::{DiagnosticRecord, DiagnosticsSink, TracingDiagnostics, emit_classified};
use crate::error::{BoundaryError, HookStage, RequestError, SerializedError};
use crate::fallback::{
    ErrorBoundaryComponent, FallbackRenderer,
    manifest::{AssetManifestSource, FileAssetManifest},
};
use crate::hooks::{ErrorHook, HookChain};
use crate::reply::{NO_CACHE, Reply};
use crate::request::RequestHead;
use crate::{Layer, Request, Response, Service};
use http::{HeaderValue, StatusCode, header};
use std::{fmt, sync::Arc};

/// Handles errors that reached the top of the request handling stack.
///
/// For every error it, in order:
///
/// 1. runs the before hooks, any of which can take over the response;
/// 2. answers redirect errors with a redirect, skipping everything below;
/// 3. classifies the error and emits one diagnostic record;
/// 4. runs the after hooks, any of which can take over the response;
/// 5. renders the fallback page with the classified status, if configured.
///
/// When no fallback page can be rendered the original error is handed back
/// as [`BoundaryError::Unhandled`], for the host server to deal with.
#[derive(Clone)]
pub struct ErrorBoundaryHandler {
    before: HookChain,
    after: HookChain,
    fallback: FallbackRenderer,
    diagnostics: Arc<dyn DiagnosticsSink>,
    redirect_status: StatusCode,
}

impl Default for ErrorBoundaryHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorBoundaryHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorBoundaryHandler")
            .field("before", &self.before)
            .field("after", &self.after)
            .field("fallback", &self.fallback)
            .field("redirect_status", &self.redirect_status)
            .finish()
    }
}

impl ErrorBoundaryHandler {
    /// Create a handler without hooks or fallback,
    /// logging through [`TracingDiagnostics`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            before: HookChain::new(),
            after: HookChain::new(),
            fallback: FallbackRenderer::default(),
            diagnostics: Arc::new(TracingDiagnostics::new()),
            redirect_status: DEFAULT_REDIRECT_STATUS,
        }
    }

    /// Create a handler from the given configuration.
    ///
    /// The fallback component is code and still has to be set
    /// using [`Self::with_fallback`].
    pub fn try_from_config(config: &ErrorBoundaryConfig) -> Result<Self, ConfigError> {
        let mut handler = Self::new()
            .with_redirect_status(config.redirect_status()?)
            .with_entry_point(&config.entry_point);
        if let Some(path) = &config.asset_manifest {
            handler = if config.cache_asset_manifest {
                handler.with_asset_manifest(FileAssetManifest::cached(path))
            } else {
                handler.with_asset_manifest(FileAssetManifest::new(path))
            };
        }
        Ok(handler)
    }

    /// Append a hook run before the error is classified.
    #[must_use]
    pub fn with_before_hook(mut self, hook: impl ErrorHook) -> Self {
        self.before.push(hook);
        self
    }

    /// Append a hook run after the error is logged.
    #[must_use]
    pub fn with_after_hook(mut self, hook: impl ErrorHook) -> Self {
        self.after.push(hook);
        self
    }

    /// Set the component rendering the fallback page.
    #[must_use]
    pub fn with_fallback(mut self, component: impl ErrorBoundaryComponent) -> Self {
        self.fallback = self.fallback.with_component(component);
        self
    }

    /// Set the source of the asset manifest used by the fallback page.
    #[must_use]
    pub fn with_asset_manifest(mut self, source: impl AssetManifestSource) -> Self {
        self.fallback = self.fallback.with_asset_manifest(source);
        self
    }

    /// Set the bundler entry point of the fallback page.
    #[must_use]
    pub fn with_entry_point(mut self, entry_point: impl AsRef<str>) -> Self {
        self.fallback = self.fallback.with_entry_point(entry_point);
        self
    }

    /// Set the sink diagnostic records are emitted to.
    #[must_use]
    pub fn with_diagnostics(mut self, sink: impl DiagnosticsSink) -> Self {
        self.diagnostics = Arc::new(sink);
        self
    }

    /// Set the status of redirects that do not declare one.
    #[must_use]
    pub fn with_redirect_status(mut self, status: StatusCode) -> Self {
        self.redirect_status = status;
        self
    }

    /// Handle an error raised while serving the request with the given head.
    pub async fn handle(
        &self,
        error: RequestError,
        request: &RequestHead,
    ) -> Result<Response, BoundaryError> {
        let mut reply = Reply::new();

        if let Some(response) = self
            .before
            .run(&error, request, &mut reply)
            .await
            .map_err(|source| BoundaryError::Hook {
                stage: HookStage::Before,
                source,
            })?
        {
            return Ok(response);
        }

        let classification = match classify(&error) {
            Verdict::Redirect { location, status } => {
                let status = status.unwrap_or(self.redirect_status);
                let reply = std::mem::take(&mut reply);
                if let Some(response) = self.redirect(&error, request, reply, location, status) {
                    return Ok(response);
                }
                None
            }
            Verdict::Report(classification) => Some(classification),
        };
        let Some(classification) = classification else {
            return Err(BoundaryError::Unhandled {
                error,
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        };

        let fallback_available = self.fallback.has_component();
        emit_classified(
            self.diagnostics.as_ref(),
            &classification,
            &request.info,
            &error,
            fallback_available,
        );

        if let Some(response) = self
            .after
            .run(&error, request, &mut reply)
            .await
            .map_err(|source| BoundaryError::Hook {
                stage: HookStage::After,
                source,
            })?
        {
            return Ok(response);
        }

        reply.status(classification.status);

        if fallback_available {
            self.diagnostics.emit(
                LogLevel::Debug,
                &DiagnosticRecord::new(
                    LogEvent::RenderFallback,
                    "rendering error boundary fallback page",
                )
                .with_request_info(&request.info),
            );

            let serialized = SerializedError::new(&error, classification.status);
            match self.fallback.render(&serialized, &request.uri).await {
                Ok(rendered) => {
                    if !rendered.state_injected {
                        self.diagnostics.emit(
                            LogLevel::Warn,
                            &DiagnosticRecord::new(
                                LogEvent::RenderFallback,
                                "error boundary markup has no closing head tag, \
client state and assets were not injected and the page will not hydrate",
                            )
                            .with_request_info(&request.info),
                        );
                    }
                    return Ok(reply.html(rendered.markup));
                }
                Err(err) => self.diagnostics.emit(
                    LogLevel::Warn,
                    &DiagnosticRecord::new(
                        LogEvent::FailedFallbackRender,
                        format!("failed to render error boundary fallback page: {err}"),
                    )
                    .with_error(&error)
                    .with_request_info(&request.info),
                ),
            }
        }

        Err(BoundaryError::Unhandled {
            error,
            status: reply.status_code(),
        })
    }

    /// Answer a redirect error, `None` if the location is not a valid header value.
    fn redirect(
        &self,
        error: &RequestError,
        request: &RequestHead,
        mut reply: Reply,
        location: &str,
        status: StatusCode,
    ) -> Option<Response> {
        self.diagnostics.emit(
            LogLevel::Info,
            &DiagnosticRecord::new(
                LogEvent::RedirectFound,
                format!("RedirectFoundError, redirecting to {location} ({status})"),
            )
            .with_request_info(&request.info),
        );

        reply.header(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        match reply.redirect(status, location) {
            Ok(response) => Some(response),
            Err(err) => {
                self.diagnostics.emit(
                    LogLevel::Warn,
                    &DiagnosticRecord::new(
                        LogEvent::RedirectFound,
                        format!("redirect location cannot be sent as a header: {err}"),
                    )
                    .with_error(error)
                    .with_request_info(&request.info),
                );
                None
            }
        }
    }
}

/// A [`Layer`] that wraps a [`Service`] with an [`ErrorBoundary`].
#[derive(Debug, Clone, Default)]
pub struct ErrorBoundaryLayer {
    handler: Arc<ErrorBoundaryHandler>,
}

impl ErrorBoundaryLayer {
    /// Create a new [`ErrorBoundaryLayer`] using the given handler.
    pub fn new(handler: ErrorBoundaryHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl From<ErrorBoundaryHandler> for ErrorBoundaryLayer {
    fn from(handler: ErrorBoundaryHandler) -> Self {
        Self::new(handler)
    }
}

impl<S> Layer<S> for ErrorBoundaryLayer {
    type Service = ErrorBoundary<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorBoundary {
            inner,
            handler: self.handler.clone(),
        }
    }

    fn into_layer(self, inner: S) -> Self::Service {
        ErrorBoundary {
            inner,
            handler: self.handler,
        }
    }
}

/// A [`Service`] adapter handing errors of the inner service
/// to an [`ErrorBoundaryHandler`].
///
/// Responses of the inner service are passed through untouched.
pub struct ErrorBoundary<S> {
    inner: S,
    handler: Arc<ErrorBoundaryHandler>,
}

impl<S: fmt::Debug> fmt::Debug for ErrorBoundary<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorBoundary")
            .field("inner", &self.inner)
            .field("handler", &self.handler)
            .finish()
    }
}

impl<S: Clone> Clone for ErrorBoundary<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<S> ErrorBoundary<S> {
    /// Create a new [`ErrorBoundary`] wrapping the given service.
    pub fn new(inner: S, handler: ErrorBoundaryHandler) -> Self {
        Self {
            inner,
            handler: Arc::new(handler),
        }
    }

    /// Gets a reference to the underlying service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consumes `self`, returning the underlying service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, Body> Service<Request<Body>> for ErrorBoundary<S>
where
    S: Service<Request<Body>, Response = Response, Error: Into<RequestError>>,
    Body: Send + 'static,
{
    type Response = Response;
    type Error = BoundaryError;

    async fn serve(&self, req: Request<Body>) -> Result<Self::Response, Self::Error> {
        let head = RequestHead::from_request(&req);
        match self.inner.serve(req).await {
            Ok(response) => Ok(response),
            Err(error) => self.handler.handle(error.into(), &head).await,
        }
    }
}
