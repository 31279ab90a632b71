//! Error types for ssr-boundary.
//!
//! [`RequestError`] is the error an inner service hands to the
//! [`ErrorBoundary`](crate::boundary::ErrorBoundary) middleware. It is tagged
//! with an [`ErrorKind`], which is all the classifier ever looks at.
//!
//! [`BoundaryError`] is what the middleware itself fails with, when it could
//! not (or was told not to) produce a response.

use crate::body;
use crate::Response;
use http::{HeaderValue, StatusCode, header};
use std::{backtrace::Backtrace, borrow::Cow, error::Error as StdError, fmt};

/// Alias for a type-erased error type.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The tag of a [`RequestError`].
///
/// Each variant carries the fields the classifier needs for it,
/// and nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Not a failure: instructs the boundary to redirect the client.
    Redirect {
        /// Target of the redirect, used as-is for the `Location` header.
        location: String,
        /// Redirect status, `307 Temporary Redirect` when absent.
        status: Option<StatusCode>,
    },
    /// The requested resource does not exist.
    NotFound {
        /// Declared status, `404 Not Found` when absent.
        status: Option<StatusCode>,
    },
    /// An application level http error,
    /// e.g. raised by a route guard or forced by a page.
    Http {
        /// Declared status, `500 Internal Server Error` when absent.
        status: Option<StatusCode>,
    },
    /// Anything else, including errors raised by the http server itself.
    Server {
        /// Status as reported by the http layer, `500` when absent.
        status_code: Option<StatusCode>,
        /// Symbolic error code of the http layer (e.g. `FST_ERR_CTP_INVALID_MEDIA_TYPE`).
        code: Option<Cow<'static, str>>,
    },
}

/// An error raised while processing a request.
///
/// The boundary only ever reads it. When no fallback can be rendered
/// it is handed back, unchanged, as part of [`BoundaryError::Unhandled`].
pub struct RequestError {
    kind: ErrorKind,
    message: String,
    stack: Option<String>,
    source: Option<BoxError>,
}

impl RequestError {
    /// Create a new [`RequestError`] of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: None,
            source: None,
        }
    }

    /// Create a redirect signal to the given location.
    pub fn redirect(location: impl Into<String>) -> Self {
        let location = location.into();
        let message = format!("redirect to {location}");
        Self::new(
            ErrorKind::Redirect {
                location,
                status: None,
            },
            message,
        )
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound { status: None }, "Not Found")
    }

    /// Create an application level http error with the given status.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Http {
                status: Some(status),
            },
            message,
        )
    }

    /// Create a generic server error, without any status.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Server {
                status_code: None,
                code: None,
            },
            message,
        )
    }

    /// Overwrite the declared status of this error, whatever its kind.
    #[must_use]
    pub fn with_status(mut self, new_status: StatusCode) -> Self {
        match &mut self.kind {
            ErrorKind::Redirect { status, .. }
            | ErrorKind::NotFound { status }
            | ErrorKind::Http { status } => *status = Some(new_status),
            ErrorKind::Server { status_code, .. } => *status_code = Some(new_status),
        }
        self
    }

    /// Set the symbolic http layer code.
    ///
    /// Only meaningful for [`ErrorKind::Server`], ignored for other kinds.
    #[must_use]
    pub fn with_code(mut self, new_code: impl Into<Cow<'static, str>>) -> Self {
        if let ErrorKind::Server { code, .. } = &mut self.kind {
            *code = Some(new_code.into());
        }
        self
    }

    /// Attach a stack description.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Capture the current backtrace as stack.
    ///
    /// Respects `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`,
    /// when capturing is disabled no stack is attached.
    #[must_use]
    pub fn with_backtrace(self) -> Self {
        let backtrace = Backtrace::capture();
        match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => self.with_stack(backtrace.to_string()),
            _ => self,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The tag of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The stack description, if any.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Returns true if this error is a redirect signal.
    pub fn is_redirect(&self) -> bool {
        matches!(self.kind, ErrorKind::Redirect { .. })
    }
}

impl fmt::Debug for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("stack", &self.stack)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for RequestError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|err| err as &(dyn StdError + 'static))
    }
}

impl From<BoxError> for RequestError {
    fn from(error: BoxError) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => *error,
            Err(error) => Self::server(error.to_string()).with_source(error),
        }
    }
}

impl From<std::convert::Infallible> for RequestError {
    fn from(value: std::convert::Infallible) -> Self {
        match value {}
    }
}

/// The client safe subset of a [`RequestError`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SerializedError {
    /// Status the response is sent with.
    pub status: u16,
    /// Message of the original error.
    pub message: String,
    /// Stack of the original error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl SerializedError {
    /// Serialize the given error, to be sent with the given status.
    pub fn new(error: &RequestError, status: StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            message: error.message.clone(),
            stack: error.stack.clone(),
        }
    }
}

/// The hook chain a [`BoundaryError::Hook`] originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// Hooks run before classification and logging.
    Before,
    /// Hooks run after logging, before the fallback is rendered.
    After,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// Error returned by the [`ErrorBoundary`](crate::boundary::ErrorBoundary)
/// when it did not produce a response.
#[derive(Debug)]
pub enum BoundaryError {
    /// No fallback was available or it failed to render:
    /// the original error is handed back to the host server.
    Unhandled {
        /// The original error, unchanged.
        error: RequestError,
        /// Status of the reply at the moment the boundary gave up.
        status: StatusCode,
    },
    /// A registered hook failed.
    Hook {
        /// Chain the failing hook belongs to.
        stage: HookStage,
        /// Error returned by the hook.
        source: BoxError,
    },
}

impl BoundaryError {
    /// The status a host should respond with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unhandled { status, .. } => *status,
            Self::Hook { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Take the original request error back, if this error carries it.
    pub fn into_request_error(self) -> Option<RequestError> {
        match self {
            Self::Unhandled { error, .. } => Some(error),
            Self::Hook { .. } => None,
        }
    }

    /// The minimal response a host server produces for an uncaught error:
    /// the status and nothing else.
    pub fn into_response(self) -> Response {
        let mut res = Response::new(body::empty());
        *res.status_mut() = self.status();
        res.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(crate::reply::NO_CACHE),
        );
        res
    }
}

impl fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unhandled { error, status } => {
                write!(f, "unhandled request error ({status}): {error}")
            }
            Self::Hook { stage, source } => write!(f, "{stage} error hook failed: {source}"),
        }
    }
}

impl StdError for BoundaryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Unhandled { error, .. } => Some(error),
            Self::Hook { source, .. } => Some(source.as_ref()),
        }
    }
}
