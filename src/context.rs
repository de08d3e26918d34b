//! Per-request state passed through the whole middleware and handler chain.
//!
//! A [`Context`] is allocated once per pool slot and rebound with
//! [`Context::reset`] before every request it serves. Everything a previous
//! request left behind (store entries, path parameters, response status,
//! headers, and body) is cleared there.
//!
//! ```rust
//! use zest::{Context, Error, StatusCode};
//!
//! async fn get_user(c: &mut Context) -> Result<(), Error> {
//!     let name = c.param("name").unwrap_or("anonymous").to_owned();
//!     c.json(StatusCode::OK, &serde_json::json!({ "name": name }))
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE, LOCATION};
use http::StatusCode;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{BoxError, Error, HttpError};
use crate::error_handler::{self, ErrorHandler};
use crate::file;
use crate::request::{Request, RequestBody};
use crate::response::Response;

pub const MIME_APPLICATION_JSON: &str = "application/json; charset=UTF-8";
pub const MIME_TEXT_PLAIN: &str = "text/plain; charset=UTF-8";
pub const MIME_TEXT_HTML: &str = "text/html; charset=UTF-8";

type Store = HashMap<String, Box<dyn Any + Send + Sync>>;

/// Mutable per-request state.
///
/// Never shared: exactly one task holds a given context between acquire and
/// release, so none of its methods lock.
pub struct Context {
    request: Request,
    response: Response,
    store: Store,
    error_handler: ErrorHandler,
}

impl Context {
    /// An empty context bound to the default Error Handler.
    pub fn new() -> Self {
        Self {
            request: Request::empty(),
            response: Response::new(),
            store: Store::new(),
            error_handler: error_handler::default(),
        }
    }

    /// Rebinds the context to a new request and clears all per-request state.
    pub fn reset<B>(&mut self, req: http::Request<B>, remote_addr: Option<SocketAddr>)
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let req = req.map(|body| -> RequestBody { body.map_err(Into::into).boxed_unsync() });
        self.request.rebind(req, remote_addr);
        self.response.reset();
        self.store.clear();
    }

    pub(crate) fn bind_error_handler(&mut self, handler: &ErrorHandler) {
        self.error_handler = ErrorHandler::clone(handler);
    }

    // ── Request view ─────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }
    pub fn method(&self) -> &http::Method { self.request.method() }
    pub fn path(&self) -> &str { self.request.path() }
    pub fn header(&self, name: &str) -> Option<&str> { self.request.header(name) }
    pub fn param(&self, name: &str) -> Option<&str> { self.request.param(name) }
    pub fn query(&self, key: &str) -> Option<String> { self.request.query(key) }
    pub fn matched_route(&self) -> Option<&str> { self.request.matched_route() }

    /// Best guess at the originating client address.
    ///
    /// Fixed precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`,
    /// then the peer address without its port. The headers are trusted as
    /// sent, which is only safe behind a proxy that overwrites them.
    pub fn client_ip(&self) -> Option<String> {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = || {
            self.header("x-real-ip")
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        forwarded
            .or_else(real_ip)
            .map(str::to_owned)
            .or_else(|| self.request.remote_addr().map(|addr| addr.ip().to_string()))
    }

    /// Reads the whole request body.
    pub async fn body_bytes(&mut self) -> Result<Bytes, Error> {
        self.request.body_bytes().await
    }

    /// Deserialises the JSON body. Malformed input is a `400`.
    pub async fn bind_json<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let bytes = self.body_bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| HttpError::bad_request(e.to_string()).with_source(e).into())
    }

    /// Deserialises the query string. Malformed input is a `400`.
    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_urlencoded::from_str(self.request.raw_query().unwrap_or(""))
            .map_err(|e| HttpError::bad_request(e.to_string()).with_source(e).into())
    }

    // ── Store ────────────────────────────────────────────────────────────────

    /// Publishes `value` under `key` for later middleware and the handler.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    /// Reads a stored value. `None` if absent or stored with another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|v| (**v).downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    // ── Response ─────────────────────────────────────────────────────────────

    pub fn response(&self) -> &Response { &self.response }
    pub fn response_mut(&mut self) -> &mut Response { &mut self.response }

    /// Whether the status has been committed.
    pub fn committed(&self) -> bool {
        self.response.committed()
    }

    /// Commits `status`. A no-op once committed.
    pub fn set_status(&mut self, status: StatusCode) {
        self.response.write_header(status);
    }

    /// Replaces a response header. Ignored once committed.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = header_pair(name, value) {
            self.response.insert_header(name, value);
        }
    }

    /// Adds a response header value. Ignored once committed.
    pub fn append_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = header_pair(name, value) {
            self.response.append_header(name, value);
        }
    }

    /// Writes body bytes, committing with `200 OK` if nothing was committed.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.response.write(bytes)
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(value)?;
        self.send(status, MIME_APPLICATION_JSON, &body);
        Ok(())
    }

    pub fn string(&mut self, status: StatusCode, body: impl AsRef<str>) -> Result<(), Error> {
        self.send(status, MIME_TEXT_PLAIN, body.as_ref().as_bytes());
        Ok(())
    }

    pub fn html(&mut self, status: StatusCode, body: impl AsRef<str>) -> Result<(), Error> {
        self.send(status, MIME_TEXT_HTML, body.as_ref().as_bytes());
        Ok(())
    }

    pub fn no_content(&mut self, status: StatusCode) -> Result<(), Error> {
        self.set_status(status);
        Ok(())
    }

    /// Redirects to `location`. Only `3xx` statuses are accepted.
    pub fn redirect(&mut self, status: StatusCode, location: &str) -> Result<(), Error> {
        if !status.is_redirection() {
            return Err(Error::InvalidRedirect(status.as_u16()));
        }
        self.set_header(LOCATION.as_str(), location);
        self.set_status(status);
        Ok(())
    }

    /// Sends the file at `path`, with a content type derived from its extension.
    pub async fn file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        file::serve(self, path.as_ref(), file::DEFAULT_INDEX).await
    }

    /// Sends the file at `path` as a download named `name`.
    pub async fn attachment(&mut self, path: impl AsRef<Path>, name: &str) -> Result<(), Error> {
        let disposition = format!("attachment; filename*=UTF-8''{}", urlencoding::encode(name));
        self.set_header(CONTENT_DISPOSITION.as_str(), &disposition);
        self.file(path).await
    }

    fn send(&mut self, status: StatusCode, content_type: &str, body: &[u8]) {
        self.set_header(CONTENT_TYPE.as_str(), content_type);
        self.set_status(status);
        self.write(body);
    }

    /// Runs the engine's Error Handler now.
    ///
    /// Middleware that needs the final status before returning (a logger,
    /// for instance) calls this and then returns the same error; the engine's
    /// own pass is a no-op because the response is committed by then.
    pub fn error(&mut self, err: &Error) {
        let handler = ErrorHandler::clone(&self.error_handler);
        handler(err, self);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            warn!(header = name, "invalid response header dropped");
            None
        }
    }
}
