//! Inbound request view.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Uri, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;

use crate::error::{BoxError, Error};
use crate::router::Params;

/// The request body as the engine stores it, whatever the transport supplied.
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// The inbound half of a [`Context`](crate::Context).
///
/// Rebound in place for every request the pooled context serves.
pub struct Request {
    method: http::Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    body: Option<RequestBody>,
    remote_addr: Option<SocketAddr>,
    pub(crate) params: Params,
    pub(crate) route: Option<Arc<str>>,
}

impl Request {
    pub(crate) fn empty() -> Self {
        Self {
            method: http::Method::GET,
            uri: Uri::default(),
            version: Version::default(),
            headers: HeaderMap::new(),
            extensions: Extensions::new(),
            body: None,
            remote_addr: None,
            params: Params::new(),
            route: None,
        }
    }

    pub(crate) fn rebind(&mut self, req: http::Request<RequestBody>, remote_addr: Option<SocketAddr>) {
        let (parts, body) = req.into_parts();
        self.method = parts.method;
        self.uri = parts.uri;
        self.version = parts.version;
        self.headers = parts.headers;
        self.extensions = parts.extensions;
        self.body = Some(body);
        self.remote_addr = remote_addr;
        self.params.clear();
        self.route = None;
    }

    pub fn method(&self) -> &http::Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn version(&self) -> Version { self.version }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn raw_query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn extensions(&self) -> &Extensions { &self.extensions }

    /// The transport-reported peer address, if the transport supplied one.
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &Params { &self.params }

    /// The pattern of the route that matched, e.g. `/users/{id}`.
    pub fn matched_route(&self) -> Option<&str> { self.route.as_deref() }

    /// First value of query parameter `key`, decoded.
    pub fn query(&self, key: &str) -> Option<String> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(self.raw_query()?).ok()?;
        pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Reads the whole body. The stream is consumed; later calls return an empty body.
    pub async fn body_bytes(&mut self) -> Result<Bytes, Error> {
        let Some(body) = self.body.take() else {
            return Ok(Bytes::new());
        };
        let collected = body.collect().await.map_err(Error::Body)?;
        Ok(collected.to_bytes())
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::empty()
    }
}
