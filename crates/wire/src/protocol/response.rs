//! HTTP response head handling.
//!
//! [`ResponseHead`] is what the server side writes; [`ResponseHeader`] is a head read off
//! the wire by a client, before its body is attached.

use http::response::Parts;
use http::{Extensions, HeaderMap, Response, StatusCode, Version};

/// Type alias for HTTP response headers.
pub type ResponseHead = Response<()>;

#[derive(Debug)]
pub struct ResponseHeader {
    inner: Response<()>,
}

impl ResponseHeader {
    pub fn into_inner(self) -> Response<()> {
        self.inner
    }

    pub fn body<T>(self, body: T) -> Response<T> {
        self.inner.map(|()| body)
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn extensions(&self) -> &Extensions {
        self.inner.extensions()
    }
}

impl From<Parts> for ResponseHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Response::from_parts(parts, ()) }
    }
}

impl From<Response<()>> for ResponseHeader {
    #[inline]
    fn from(inner: Response<()>) -> Self {
        Self { inner }
    }
}
