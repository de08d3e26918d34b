//! Outgoing response wrapper.
//!
//! [`Response`] records the status, headers, and body a handler produces and
//! enforces at-most-once commitment: the first call to
//! [`write_header`](Response::write_header) or the first body write fixes
//! the status, and later status or header changes are dropped.
//!
//! The transport only sees the result once dispatch finishes, via
//! [`Response::take`]. A request that fails after committing therefore sends
//! exactly the bytes written before the failure.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::debug;

/// Per-request response state, reused across pooled contexts.
#[derive(Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    size: u64,
    committed: bool,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, or `None` while unset.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Body bytes written so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the status line has been fixed.
    pub fn committed(&self) -> bool {
        self.committed
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Commits `status`. A no-op once committed.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            debug!(
                current = ?self.status,
                ignored = status.as_u16(),
                "status change after commit ignored"
            );
            return;
        }
        self.status = Some(status);
        self.committed = true;
    }

    /// Appends body bytes, committing with `200 OK` first if nothing was committed.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if !self.committed {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
        self.size += bytes.len() as u64;
        bytes.len()
    }

    /// Replaces a header. Ignored after commit.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.guard_header(&name) {
            self.headers.insert(name, value);
        }
    }

    /// Adds a header value, keeping existing ones. Ignored after commit.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.guard_header(&name) {
            self.headers.append(name, value);
        }
    }

    fn guard_header(&self, name: &HeaderName) -> bool {
        if self.committed {
            debug!(header = %name, "header change after commit ignored");
        }
        !self.committed
    }

    /// Clears all per-request state, keeping allocated capacity.
    pub fn reset(&mut self) {
        self.status = None;
        self.headers.clear();
        self.body.clear();
        self.size = 0;
        self.committed = false;
    }

    /// Hands the recorded response to the transport and resets `self`.
    ///
    /// An uncommitted response goes out as `200 OK` with an empty body.
    pub fn take(&mut self) -> http::Response<Full<Bytes>> {
        let status = self.status.unwrap_or(StatusCode::OK);
        let body = self.body.split().freeze();
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        self.reset();
        response
    }
}
