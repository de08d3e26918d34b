//! Request-id injection.

use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;

/// Store key under which the id is published.
pub const REQUEST_ID_KEY: &str = "request_id";

const DEFAULT_HEADER: &str = "X-Request-ID";

type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Tags every request with an id.
///
/// An inbound id in the configured header is reused; otherwise one is
/// generated. The id is echoed on the response and stored under
/// [`REQUEST_ID_KEY`] as a `String`.
///
/// ```rust
/// use zest::middleware::RequestId;
///
/// let ids = RequestId::default().header("X-Trace-Id");
/// ```
#[derive(Clone)]
pub struct RequestId {
    header: String,
    generator: Generator,
}

impl RequestId {
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.header = name.into();
        self
    }

    /// Replaces the generator. The default is a random UUIDv4 as 32 hex chars.
    pub fn generator<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generator = Arc::new(f);
        self
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_owned(),
            generator: Arc::new(|| uuid::Uuid::new_v4().simple().to_string()),
        }
    }
}

impl Middleware for RequestId {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(RequestIdHandler { config: self.clone(), next })
    }
}

struct RequestIdHandler {
    config: RequestId,
    next: BoxedHandler,
}

impl Handler for RequestIdHandler {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let id = match c.header(&self.config.header) {
                Some(v) if !v.is_empty() => v.to_owned(),
                _ => (self.config.generator)(),
            };

            c.set_header(&self.config.header, &id);
            c.set(REQUEST_ID_KEY, id);

            self.next.call(c).await
        })
    }
}
