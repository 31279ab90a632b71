//! The response under construction while an error is being handled.

use crate::{Response, body, body::Body};
use http::{
    HeaderMap, HeaderName, HeaderValue, StatusCode,
    header::{self, InvalidHeaderValue},
};

/// `cache-control` value used for every response produced by the boundary.
pub const NO_CACHE: &str = "no-store, no-cache, must-revalidate";

#[expect(
    clippy::declare_interior_mutable_const,
    reason = "HeaderValue::from_static is the only way to build a const HeaderValue"
)]
const TEXT_HTML_UTF8: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");

/// A reply being built for the client.
///
/// Passed mutably to error hooks, headers and status set
/// on it are kept for whatever response the boundary finally sends.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: HeaderMap,
}

impl Default for Reply {
    fn default() -> Self {
        Self::new()
    }
}

impl Reply {
    /// Create a new, empty `200 OK` reply.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    /// Set the status code.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any previous value.
    pub fn header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// The current status code.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// The headers set so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Finish the reply as a redirect to the given location.
    ///
    /// Fails if `location` cannot be used as a header value.
    pub fn redirect(
        mut self,
        status: StatusCode,
        location: &str,
    ) -> Result<Response, InvalidHeaderValue> {
        let location = HeaderValue::from_str(location)?;
        self.status = status;
        self.headers.insert(header::LOCATION, location);
        Ok(self.send(body::empty()))
    }

    /// Finish the reply with an html document.
    ///
    /// Sets `content-type`, `content-length` (utf-8 byte length of `markup`)
    /// and a no-cache `cache-control` header.
    pub fn html(mut self, markup: String) -> Response {
        self.headers.insert(header::CONTENT_TYPE, TEXT_HTML_UTF8);
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(markup.len()));
        self.headers
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        self.send(body::full(markup))
    }

    /// Finish the reply with the given body.
    pub fn send(self, body: Body) -> Response {
        let mut res = Response::new(body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}
