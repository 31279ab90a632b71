//! Error boundary middleware for server side rendered http services.
//!
//! Wrap the service rendering your pages with an [`ErrorBoundaryLayer`] and
//! every error it returns is handled in one place:
//!
//! - redirect signals become redirect responses;
//! - all other errors are classified ([`classify`]) into a status, a log
//!   level and an operator facing message, and logged exactly once
//!   through a [`DiagnosticsSink`](diagnostics::DiagnosticsSink);
//! - a fallback page, the error boundary, is rendered in place of the failed
//!   page, with the client side state it needs to hydrate injected into it.
//!
//! Before and after the error is logged, [error hooks](hooks) get the chance
//! to take over the response. When no fallback page can be rendered, the
//! original error is handed back as [`BoundaryError::Unhandled`] so the host
//! server can produce its own default response.
//!
//! # Example
//!
//! ```
//! use ssr_boundary::{
//!     ErrorBoundaryHandler, ErrorBoundaryLayer, Layer, Request, RequestError, Response,
//!     Service, body, hooks::hook_fn, service::service_fn,
//! };
//! use http::{HeaderValue, StatusCode};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let handler = ErrorBoundaryHandler::new().with_before_hook(hook_fn(|_err, _req, reply| {
//!     reply.header(http::header::VARY, HeaderValue::from_static("cookie"));
//!     Ok(None)
//! }));
//!
//! let service = ErrorBoundaryLayer::new(handler).into_layer(service_fn(async |_req: Request| {
//!     Err::<Response, _>(RequestError::redirect("/login"))
//! }));
//!
//! let res = service.serve(http::Request::new(body::empty())).await.unwrap();
//! assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
//! assert_eq!(res.headers()["location"], "/login");
//! assert_eq!(res.headers()["vary"], "cookie");
//! # }
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![warn(missing_debug_implementations, missing_docs)]

pub mod body;
pub mod boundary;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fallback;
pub mod hooks;
pub mod layer;
pub mod reply;
pub mod request;
pub mod service;

/// Type alias for [`http::Request`] whose body defaults to [`body::Body`].
pub type Request<T = body::Body> = http::Request<T>;

/// Type alias for [`http::Response`] whose body defaults to [`body::Body`].
pub type Response<T = body::Body> = http::Response<T>;

#[doc(inline)]
pub use crate::{
    boundary::{ErrorBoundary, ErrorBoundaryHandler, ErrorBoundaryLayer},
    classify::classify,
    error::{BoundaryError, BoxError, ErrorKind, RequestError},
    layer::Layer,
    service::Service,
};
