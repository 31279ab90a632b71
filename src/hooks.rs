//! Error hooks and the [`HookChain`] running them.
//!
//! A hook gets to see the error before (or after) the boundary does its own
//! thing with it. Returning `Some(response)` takes over: the chain stops and
//! that response is sent as-is. Returning `None` lets the next hook, and
//! eventually the boundary, continue.

use crate::Response;
use crate::error::{BoxError, RequestError};
use crate::reply::Reply;
use crate::request::RequestHead;
use std::{fmt, pin::Pin, sync::Arc};

/// An error hook, invoked with the error, the request head and the reply
/// under construction.
pub trait ErrorHook: Send + Sync + 'static {
    /// Inspect the error, optionally producing the response to send.
    fn on_error<'a>(
        &'a self,
        error: &'a RequestError,
        request: &'a RequestHead,
        reply: &'a mut Reply,
    ) -> impl Future<Output = Result<Option<Response>, BoxError>> + Send + 'a;
}

/// Create an [`ErrorHook`] from a synchronous function.
pub fn hook_fn<F>(f: F) -> HookFn<F>
where
    F: Fn(&RequestError, &RequestHead, &mut Reply) -> Result<Option<Response>, BoxError>
        + Send
        + Sync
        + 'static,
{
    HookFn { f }
}

/// An [`ErrorHook`] implemented by a synchronous function.
///
/// Created using [`hook_fn`].
#[derive(Clone)]
pub struct HookFn<F> {
    f: F,
}

impl<F> fmt::Debug for HookFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookFn")
            .field("f", &format_args!("{}", std::any::type_name::<F>()))
            .finish()
    }
}

impl<F> ErrorHook for HookFn<F>
where
    F: Fn(&RequestError, &RequestHead, &mut Reply) -> Result<Option<Response>, BoxError>
        + Send
        + Sync
        + 'static,
{
    fn on_error<'a>(
        &'a self,
        error: &'a RequestError,
        request: &'a RequestHead,
        reply: &'a mut Reply,
    ) -> impl Future<Output = Result<Option<Response>, BoxError>> + Send + 'a {
        std::future::ready((self.f)(error, request, reply))
    }
}

type BoxHookFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Response>, BoxError>> + Send + 'a>>;

/// Object safe counterpart of [`ErrorHook`], for dynamic dispatch.
trait DynErrorHook: Send + Sync + 'static {
    fn on_error_box<'a>(
        &'a self,
        error: &'a RequestError,
        request: &'a RequestHead,
        reply: &'a mut Reply,
    ) -> BoxHookFuture<'a>;
}

impl<H: ErrorHook> DynErrorHook for H {
    fn on_error_box<'a>(
        &'a self,
        error: &'a RequestError,
        request: &'a RequestHead,
        reply: &'a mut Reply,
    ) -> BoxHookFuture<'a> {
        Box::pin(self.on_error(error, request, reply))
    }
}

/// An ordered list of [`ErrorHook`]s.
///
/// Hooks run one after the other, in the order they were added,
/// each awaited before the next is called.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn DynErrorHook>>,
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain")
            .field("len", &self.hooks.len())
            .finish()
    }
}

impl HookChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to the chain.
    pub fn push(&mut self, hook: impl ErrorHook) -> &mut Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Append a hook to the chain.
    #[must_use]
    pub fn with_hook(mut self, hook: impl ErrorHook) -> Self {
        self.push(hook);
        self
    }

    /// Number of hooks in the chain.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns true if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the hooks in order, stopping at the first one
    /// that produces a response.
    ///
    /// A failing hook stops the chain, its error is returned as-is.
    pub async fn run(
        &self,
        error: &RequestError,
        request: &RequestHead,
        reply: &mut Reply,
    ) -> Result<Option<Response>, BoxError> {
        for hook in &self.hooks {
            if let Some(response) = hook.on_error_box(error, request, reply).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
