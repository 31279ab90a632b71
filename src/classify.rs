//! Classification of request errors.
//!
//! [`classify`] maps a [`RequestError`] onto the status it is answered with,
//! the severity it is logged at and the message operators get to read.
//! It is a pure function of the error's [`ErrorKind`].

use crate::error::{ErrorKind, RequestError};
use http::StatusCode;
use serde::Serialize;
use std::{borrow::Cow, fmt};

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Internals of the boundary itself.
    Debug,
    /// Expected, client caused.
    Info,
    /// The boundary could not do what it was configured to do.
    Warn,
    /// A server fault, to be investigated.
    Error,
}

impl LogLevel {
    /// The level as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The symbolic event name of a diagnostic record.
///
/// These names are matched on by log pipelines, keep them stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogEvent {
    /// `redirect-found-error`
    RedirectFound,
    /// `not-found-error`
    NotFound,
    /// `http-error`
    HttpError,
    /// `send-server-error`
    SendServerError,
    /// `generic-error-4xx`
    GenericClientError,
    /// `render-fallback`
    RenderFallback,
    /// `failed-fallback-render`
    FailedFallbackRender,
}

impl LogEvent {
    /// The event name as logged.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RedirectFound => "redirect-found-error",
            Self::NotFound => "not-found-error",
            Self::HttpError => "http-error",
            Self::SendServerError => "send-server-error",
            Self::GenericClientError => "generic-error-4xx",
            Self::RenderFallback => "render-fallback",
            Self::FailedFallbackRender => "failed-fallback-render",
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// How a non-redirect error is answered and reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Status of the response.
    pub status: StatusCode,
    /// Severity of the diagnostic record.
    pub level: LogLevel,
    /// Event name of the diagnostic record.
    pub event: LogEvent,
    /// Operator facing message, listing common causes.
    pub message: Cow<'static, str>,
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<'a> {
    /// The error is a redirect signal, it bypasses classification.
    Redirect {
        /// Where to redirect to.
        location: &'a str,
        /// Declared redirect status, if any.
        ///
        /// When absent the caller picks its default,
        /// see [`DEFAULT_REDIRECT_STATUS`].
        status: Option<StatusCode>,
    },
    /// The error is to be reported and answered as classified.
    Report(Classification),
}

/// Redirect status used when a redirect error declares none.
pub const DEFAULT_REDIRECT_STATUS: StatusCode = StatusCode::TEMPORARY_REDIRECT;

const UNKNOWN_CODE: &str = "UNKNOWN_ERROR";

/// Classify the given error.
pub fn classify(error: &RequestError) -> Verdict<'_> {
    match error.kind() {
        ErrorKind::Redirect { location, status } => Verdict::Redirect {
            location,
            status: *status,
        },
        ErrorKind::NotFound { status } => {
            let status = status.unwrap_or(StatusCode::NOT_FOUND);
            Verdict::Report(Classification {
                status,
                level: LogLevel::Info,
                event: LogEvent::NotFound,
                message: format!(
                    "NotFoundError, the requested page could not be found ({status}).
Most common causes:
  - a route guard or action rejected the request with a not found error
  - the page forced the error boundary with a not found status
  - no route matches the requested url"
                )
                .into(),
            })
        }
        ErrorKind::Http { status } => {
            let status = status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                Verdict::Report(Classification {
                    status,
                    level: LogLevel::Error,
                    event: LogEvent::SendServerError,
                    message: format!(
                        "HttpError, the request failed with a server error ({status}).
Most common causes:
  - a route guard or action raised an http error with a 5xx status
  - the page forced the error boundary with a 5xx status
  - an upstream service the page depends on is unavailable"
                    )
                    .into(),
                })
            } else {
                Verdict::Report(Classification {
                    status,
                    level: LogLevel::Info,
                    event: LogEvent::HttpError,
                    message: format!(
                        "HttpError, the request was answered with an http error ({status}).
Most common causes:
  - a route guard rejected the request
  - the page forced the error boundary with a custom status
  - the client was rate limited"
                    )
                    .into(),
                })
            }
        }
        ErrorKind::Server { status_code, code } => {
            let status = status_code.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let code = code.as_deref().unwrap_or(UNKNOWN_CODE);
            Verdict::Report(classify_server_error(status, code))
        }
    }
}

fn classify_server_error(status: StatusCode, code: &str) -> Classification {
    if status.is_server_error() {
        Classification {
            status,
            level: LogLevel::Error,
            event: LogEvent::SendServerError,
            message: format!(
                "{code}, the error was raised by the http server itself ({status}), \
not by the application.
Most common causes:
  - the request body could not be read or exceeds the body limit
  - a server level timeout was hit while handling the request"
            )
            .into(),
        }
    } else if status.is_client_error() {
        Classification {
            status,
            level: LogLevel::Info,
            event: LogEvent::GenericClientError,
            message: format!(
                "{code}, the http server rejected the request ({status}).
Most common causes:
  - a malformed client request, e.g. an unsupported content-type or invalid body
  - automated scanners probing for unknown endpoints"
            )
            .into(),
        }
    } else {
        // a non error status reached the error handler, treat it as a fault
        Classification {
            status,
            level: LogLevel::Error,
            event: LogEvent::SendServerError,
            message: format!(
                "{code}, unexpected error while rendering the page ({status}).
Most common causes:
  - an error raised while rendering the page component
  - a failing page action or data loader"
            )
            .into(),
        }
    }
}
