//! Route groups: a shared path prefix plus inherited middleware.
//!
//! ```rust
//! use zest::{Context, Engine, Error, StatusCode};
//!
//! async fn list(c: &mut Context) -> Result<(), Error> {
//!     c.string(StatusCode::OK, "[]")
//! }
//!
//! let mut app = Engine::new();
//! let mut api = app.group("/api", []);
//! let mut v1 = api.group("v1/", []);
//! v1.get("/users", list);              // GET /api/v1/users
//! ```

use crate::engine::Engine;
use crate::error::Error;
use crate::handler::Handler;
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, IntoMiddleware};

/// A prefix- and middleware-scoped view of an [`Engine`].
///
/// Nested groups copy their parent's middleware list; later
/// [`use_middleware`](Group::use_middleware) calls on one group never reach
/// its parent or siblings.
pub struct Group<'e> {
    engine: &'e mut Engine,
    prefix: String,
    middleware: Vec<BoxedMiddleware>,
}

impl<'e> Group<'e> {
    pub(crate) fn new(
        engine: &'e mut Engine,
        prefix: &str,
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Self {
        Self {
            engine,
            prefix: join_paths("", prefix),
            middleware: middleware.into_iter().collect(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Appends group middleware. Affects routes registered afterwards.
    pub fn use_middleware(&mut self, middleware: impl IntoMiddleware) -> &mut Self {
        self.middleware.push(middleware.into_middleware());
        self
    }

    /// A child group under this one's prefix, inheriting a copy of its middleware.
    pub fn group(
        &mut self,
        prefix: &str,
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Group<'_> {
        let inherited = self.middleware.iter().cloned().chain(middleware).collect();
        Group {
            engine: &mut *self.engine,
            prefix: join_paths(&self.prefix, prefix),
            middleware: inherited,
        }
    }

    /// Registers a route under the group prefix, behind the group middleware
    /// and then `middleware`.
    ///
    /// # Panics
    ///
    /// Panics on a malformed or duplicate pattern; see [`Group::try_handle`].
    pub fn handle(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> &mut Self {
        self.try_handle(method, pattern, handler, middleware)
            .unwrap_or_else(|e| panic!("invalid route: {e}"))
    }

    pub fn try_handle(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Result<&mut Self, Error> {
        let full = join_paths(&self.prefix, pattern);
        let chain = self.middleware.iter().cloned().chain(middleware);
        self.engine.try_handle(method, &full, handler, chain)?;
        Ok(self)
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Get, pattern, handler, [])
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Post, pattern, handler, [])
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Put, pattern, handler, [])
    }

    pub fn patch(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Patch, pattern, handler, [])
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Delete, pattern, handler, [])
    }

    pub fn options(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Options, pattern, handler, [])
    }
}

/// Joins path pieces with single `/` separators, ignoring the slashes callers
/// put at either end. The empty join is `/`.
pub(crate) fn join_paths(prefix: &str, path: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + path.len() + 1);
    for part in prefix.split('/').chain(path.split('/')).filter(|p| !p.is_empty()) {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
