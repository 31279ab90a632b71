//! Structured diagnostics emitted while handling request errors.
//!
//! The boundary never logs directly: it builds a [`DiagnosticRecord`] and
//! hands it to a [`DiagnosticsSink`]. The default sink, [`TracingDiagnostics`],
//! turns every record into a single [`tracing`] event.

use crate::classify::{Classification, LogEvent, LogLevel};
use crate::error::RequestError;
use crate::request::RequestInfo;
use parking_lot::Mutex;
use std::{borrow::Cow, fmt, sync::Arc};

/// A single diagnostic record.
#[derive(Debug, Clone)]
pub struct DiagnosticRecord<'a> {
    /// Symbolic event name.
    pub event: LogEvent,
    /// Operator facing message.
    pub message: Cow<'a, str>,
    /// The error the record is about, if any.
    pub error: Option<&'a RequestError>,
    /// The request the record is about, if any.
    pub request_info: Option<&'a RequestInfo>,
}

impl<'a> DiagnosticRecord<'a> {
    /// Create a record without error or request details.
    pub fn new(event: LogEvent, message: impl Into<Cow<'a, str>>) -> Self {
        Self {
            event,
            message: message.into(),
            error: None,
            request_info: None,
        }
    }

    /// Attach the error the record is about.
    #[must_use]
    pub fn with_error(mut self, error: &'a RequestError) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach the request the record is about.
    #[must_use]
    pub fn with_request_info(mut self, info: &'a RequestInfo) -> Self {
        self.request_info = Some(info);
        self
    }
}

/// Destination of [`DiagnosticRecord`]s.
///
/// Emitting is infallible: a sink that cannot deliver a record drops it.
pub trait DiagnosticsSink: Send + Sync + 'static {
    /// Emit the record at the given level.
    fn emit(&self, level: LogLevel, record: &DiagnosticRecord<'_>);
}

/// Emit the diagnostic record of a classified error.
///
/// The classification message gets one extra sentence,
/// telling whether a fallback page will be rendered.
pub fn emit_classified(
    sink: &dyn DiagnosticsSink,
    classification: &Classification,
    request_info: &RequestInfo,
    error: &RequestError,
    fallback_available: bool,
) {
    let hint = if fallback_available {
        "The error boundary fallback page will be rendered for the client."
    } else {
        "Register an error boundary fallback component to render a friendly page for the client."
    };
    let message = format!("{}\n{hint}", classification.message);
    sink.emit(
        classification.level,
        &DiagnosticRecord::new(classification.event, message)
            .with_error(error)
            .with_request_info(request_info),
    );
}

/// A [`DiagnosticsSink`] that emits [`tracing`] events.
///
/// Fields: `event`, `request.id`, `client.ip`, `url.full`, `error`, `error.stack`.
///
/// Multi-line messages are folded onto a single line,
/// keeping each record on one line in line oriented log output.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct TracingDiagnostics;

impl TracingDiagnostics {
    /// Create a new [`TracingDiagnostics`] sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

macro_rules! trace_record {
    ($lvl:ident, $record:expr) => {{
        let record = $record;
        let info = record.request_info;
        tracing::$lvl!(
            event = record.event.as_str(),
            request.id = info.and_then(|info| info.request_id.as_deref()),
            client.ip = info.and_then(|info| info.ip.as_deref()),
            url.full = info.map(|info| info.url.as_str()),
            error = record.error.map(tracing::field::display),
            error.stack = record.error.and_then(RequestError::stack),
            "{}",
            OneLine(&record.message),
        )
    }};
}

/// Displays a message with its lines trimmed and joined by a single space.
struct OneLine<'a>(&'a str);

impl fmt::Display for OneLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = self.0.lines().map(str::trim).filter(|line| !line.is_empty());
        if let Some(first) = lines.next() {
            f.write_str(first)?;
        }
        for line in lines {
            write!(f, " {line}")?;
        }
        Ok(())
    }
}

impl DiagnosticsSink for TracingDiagnostics {
    fn emit(&self, level: LogLevel, record: &DiagnosticRecord<'_>) {
        match level {
            LogLevel::Debug => trace_record!(debug, record),
            LogLevel::Info => trace_record!(info, record),
            LogLevel::Warn => trace_record!(warn, record),
            LogLevel::Error => trace_record!(error, record),
        }
    }
}

/// An owned copy of an emitted [`DiagnosticRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    /// Level the record was emitted at.
    pub level: LogLevel,
    /// Symbolic event name.
    pub event: LogEvent,
    /// Operator facing message.
    pub message: String,
    /// Message of the error the record is about, if any.
    pub error: Option<String>,
    /// The request the record is about, if any.
    pub request_info: Option<RequestInfo>,
}

/// A [`DiagnosticsSink`] keeping every record in memory.
///
/// Cheap to clone, clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryDiagnostics {
    entries: Arc<Mutex<Vec<DiagnosticEntry>>>,
}

impl fmt::Debug for MemoryDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDiagnostics")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

impl MemoryDiagnostics {
    /// Create a new, empty [`MemoryDiagnostics`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of all entries emitted so far, oldest first.
    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.entries.lock().clone()
    }

    /// The events emitted so far, with their level, oldest first.
    pub fn events(&self) -> Vec<(LogLevel, LogEvent)> {
        self.entries
            .lock()
            .iter()
            .map(|entry| (entry.level, entry.event))
            .collect()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn emit(&self, level: LogLevel, record: &DiagnosticRecord<'_>) {
        let entry = DiagnosticEntry {
            level,
            event: record.event,
            message: record.message.clone().into_owned(),
            error: record.error.map(|err| err.message().to_owned()),
            request_info: record.request_info.cloned(),
        };
        self.entries.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::classify::{Verdict, classify};
    use http::StatusCode;
    use tracing_test::traced_test;

    fn info() -> RequestInfo {
        RequestInfo {
            ip: Some("127.0.0.1".to_owned()),
            request_id: Some("req-1".to_owned()),
            url: "/cart".to_owned(),
        }
    }

    fn classification(error: &RequestError) -> Classification {
        match classify(error) {
            Verdict::Report(c) => c,
            Verdict::Redirect { .. } => panic!("unexpected redirect"),
        }
    }

    #[test]
    fn classified_message_mentions_fallback() {
        let sink = MemoryDiagnostics::new();
        let error = RequestError::http(StatusCode::SERVICE_UNAVAILABLE, "db down");
        let c = classification(&error);

        emit_classified(&sink, &c, &info(), &error, true);
        emit_classified(&sink, &c, &info(), &error, false);

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Error);
        assert_eq!(entries[0].event, LogEvent::SendServerError);
        assert_eq!(entries[0].error.as_deref(), Some("db down"));
        assert_eq!(entries[0].request_info, Some(info()));
        assert!(entries[0].message.ends_with("will be rendered for the client."));
        assert!(entries[1].message.starts_with(c.message.as_ref()));
        assert!(
            entries[1]
                .message
                .ends_with("Register an error boundary fallback component to render a friendly page for the client.")
        );

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    #[traced_test]
    fn tracing_sink_emits_structured_fields() {
        let error = RequestError::not_found().with_stack("at page::render");
        let info = info();
        TracingDiagnostics::new().emit(
            LogLevel::Info,
            &DiagnosticRecord::new(LogEvent::NotFound, "page not found")
                .with_error(&error)
                .with_request_info(&info),
        );

        assert!(logs_contain("page not found"));
        assert!(logs_contain("event=\"not-found-error\""));
        assert!(logs_contain("request.id=\"req-1\""));
        assert!(logs_contain("url.full=\"/cart\""));
        assert!(logs_contain("at page::render"));
    }

    #[test]
    #[traced_test]
    fn tracing_sink_keeps_multi_line_records_on_one_line() {
        let info = info();
        TracingDiagnostics::new().emit(
            LogLevel::Error,
            &DiagnosticRecord::new(
                LogEvent::SendServerError,
                "HttpError, upstream failed.\nMost common causes:\n  - a down database\n",
            )
            .with_request_info(&info),
        );

        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("send-server-error"))
                .count()
            {
                1 => {}
                n => return Err(format!("expected one record line, got {n}")),
            }
            let line = lines
                .iter()
                .find(|line| line.contains("send-server-error"))
                .ok_or("record line missing")?;
            for expected in [
                "HttpError, upstream failed. Most common causes: - a down database",
                "request.id=\"req-1\"",
                "client.ip=\"127.0.0.1\"",
            ] {
                if !line.contains(expected) {
                    return Err(format!("record line lacks {expected:?}: {line}"));
                }
            }
            Ok(())
        });
    }

    #[test]
    fn one_line_folds_and_trims() {
        assert_eq!(OneLine("a\n  - b\n\n  - c ").to_string(), "a - b - c");
        assert_eq!(OneLine("").to_string(), "");
    }

    #[test]
    #[traced_test]
    fn tracing_sink_uses_the_given_level() {
        TracingDiagnostics::new().emit(
            LogLevel::Warn,
            &DiagnosticRecord::new(LogEvent::FailedFallbackRender, "fallback broke"),
        );
        assert!(logs_contain("WARN"));
        assert!(logs_contain("fallback broke"));
    }
}
