//! Response body type used throughout the crate.

use crate::error::BoxError;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};

/// A type-erased response body.
pub type Body = BoxBody<Bytes, BoxError>;

/// Create a body containing the given data in a single chunk.
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

/// Create an empty body.
pub fn empty() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}
