//! Read-only snapshots of the inbound request.
//!
//! The inner service consumes the request, so the boundary takes what it
//! needs for hooks, logging and fallback rendering up front.

use crate::Request;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use serde::Serialize;
use std::net::SocketAddr;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Peer address of the client, as inserted in the request
/// extensions by the host server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// An identifier for a request, as inserted in the request
/// extensions by request id middleware.
#[derive(Debug, Clone)]
pub struct RequestId(HeaderValue);

impl RequestId {
    /// Create a new `RequestId` from a [`HeaderValue`].
    pub const fn new(header_value: HeaderValue) -> Self {
        Self(header_value)
    }

    /// Gets a reference to the underlying [`HeaderValue`].
    pub fn header_value(&self) -> &HeaderValue {
        &self.0
    }
}

impl From<HeaderValue> for RequestId {
    fn from(value: HeaderValue) -> Self {
        Self::new(value)
    }
}

/// Request details attached to every diagnostic record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    /// Client ip address, if known.
    pub ip: Option<String>,
    /// Request id, if known.
    pub request_id: Option<String>,
    /// The request target as received.
    pub url: String,
}

impl RequestInfo {
    /// Capture the [`RequestInfo`] of the given request.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let ip = req
            .extensions()
            .get::<ClientAddr>()
            .map(|ClientAddr(addr)| addr.ip().to_string())
            .or_else(|| {
                header_str(req.headers(), &X_FORWARDED_FOR)
                    .and_then(|value| value.split(',').next())
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(ToOwned::to_owned)
            })
            .or_else(|| header_str(req.headers(), &X_REAL_IP).map(ToOwned::to_owned));

        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(RequestId::header_value)
            .or_else(|| req.headers().get(&X_REQUEST_ID))
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);

        Self {
            ip,
            request_id,
            url: req.uri().to_string(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Snapshot of the request head, handed to error hooks.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// The request method.
    pub method: Method,
    /// The request target.
    pub uri: Uri,
    /// The http version.
    pub version: Version,
    /// The request headers.
    pub headers: HeaderMap,
    /// Request details for diagnostics.
    pub info: RequestInfo,
}

impl RequestHead {
    /// Capture the head of the given request.
    ///
    /// The body is left untouched.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            headers: req.headers().clone(),
            info: RequestInfo::from_request(req),
        }
    }
}
