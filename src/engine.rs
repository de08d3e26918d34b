//! The engine: route table, global middleware, context pool, Error Handler.
//!
//! # Request dispatch
//!
//! ```text
//! transport → Engine::dispatch(request, peer)
//!   1. acquire a Context from the pool and reset it
//!   2. resolve method + path (miss → catch-all that fails with 404)
//!   3. wrap the route endpoint in the global middleware
//!   4. run it; on failure, run the Error Handler once
//!   5. take the response, release the Context
//! ```
//!
//! Route and group middleware is composed once at registration. Global
//! middleware is composed around the resolved endpoint on every request, so
//! [`Engine::use_middleware`] also covers routes registered before it.
//! Registration and `use_middleware` take `&mut self` and therefore cannot
//! race with dispatch, which takes `&self`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use tracing::debug;

use crate::context::Context;
use crate::error::{BoxError, Error, HttpError};
use crate::error_handler::{self, ErrorHandler};
use crate::file::ServeDir;
use crate::group::{join_paths, Group};
use crate::handler::{self, BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{compose, BoxedMiddleware, IntoMiddleware};
use crate::pool::ContextPool;
use crate::router::{Resolved, Router};
use crate::server::Server;

/// The application.
///
/// Build it once at startup, then hand it to [`Engine::run`] or
/// [`Server::serve`]. Independent engines share nothing, so tests can build
/// as many as they like.
///
/// ```rust,no_run
/// use zest::{Context, Engine, Error, StatusCode};
/// use zest::middleware::{Logger, Recovery, RequestId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let mut app = Engine::new();
///     app.use_middleware(RequestId::default())
///         .use_middleware(Logger::default())
///         .use_middleware(Recovery::default());
///
///     app.get("/users/{name}", get_user);
///     app.run("0.0.0.0:3000").await
/// }
///
/// async fn get_user(c: &mut Context) -> Result<(), Error> {
///     let name = c.param("name").unwrap_or_default().to_owned();
///     c.json(StatusCode::OK, &serde_json::json!({ "name": name }))
/// }
/// ```
pub struct Engine {
    router: Router,
    middleware: Vec<BoxedMiddleware>,
    pool: ContextPool,
    error_handler: ErrorHandler,
    not_found: BoxedHandler,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            middleware: Vec::new(),
            pool: ContextPool::default(),
            error_handler: error_handler::default(),
            not_found: handler::boxed(not_found),
        }
    }

    /// Caps how many idle contexts the pool keeps. Default 1024.
    pub fn pool_limit(mut self, max_idle: usize) -> Self {
        self.pool.set_max_idle(max_idle);
        self
    }

    /// Replaces the Error Handler. The default is [`default_error_handler`](crate::default_error_handler).
    pub fn set_error_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Error, &mut Context) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Appends global middleware. Call before serving.
    pub fn use_middleware(&mut self, middleware: impl IntoMiddleware) -> &mut Self {
        self.middleware.push(middleware.into_middleware());
        self
    }

    /// A route group under `prefix`.
    pub fn group(
        &mut self,
        prefix: &str,
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Group<'_> {
        Group::new(self, prefix, middleware)
    }

    /// Registers `handler` for `method` + `pattern`, wrapped by `middleware`.
    ///
    /// # Panics
    ///
    /// Panics on a malformed or duplicate pattern, the same way a typo in a
    /// route table should stop the process at startup. Use
    /// [`Engine::try_handle`] to get the error instead.
    pub fn handle(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> &mut Self {
        self.try_handle(method, pattern, handler, middleware)
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"))
    }

    pub fn try_handle(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Result<&mut Self, Error> {
        self.router.register(
            method,
            pattern,
            handler::boxed(handler),
            middleware.into_iter().collect(),
        )?;
        debug!(%method, pattern, "route registered");
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

    /// Serves files below `root` at `GET <prefix>/{path...}`.
    pub fn serve_dir(&mut self, prefix: &str, root: impl Into<PathBuf>) -> &mut Self {
        let pattern = join_paths(prefix, "{path...}");
        self.handle(Method::Get, &pattern, ServeDir::new(root), [])
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handles one request end to end. This is the transport entry point.
    pub async fn dispatch<B>(
        &self,
        req: http::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let mut c = self.pool.acquire();
        c.reset(req, remote_addr);
        c.bind_error_handler(&self.error_handler);

        let endpoint = match self.router.resolve(c.method(), c.path()) {
            Some(Resolved { route, params }) => {
                let req = c.request_mut();
                req.params = params;
                req.route = Some(route.pattern().shared());
                Arc::clone(route.endpoint())
            }
            None => Arc::clone(&self.not_found),
        };

        let chain = compose(endpoint, &self.middleware);
        if let Err(err) = chain.call(&mut *c).await {
            debug!(method = %c.method(), path = c.path(), error = %err, "request failed");
            (self.error_handler)(&err, &mut *c);
        }

        let response = c.response_mut().take();
        self.pool.release(c);
        response
    }

    /// Binds `addr` and serves until SIGTERM / Ctrl-C.
    pub async fn run(self, addr: &str) -> Result<(), Error> {
        Server::bind(addr)?.serve(self).await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// The catch-all for requests no route matched.
async fn not_found(_: &mut Context) -> Result<(), Error> {
    Err(HttpError::not_found("not found").into())
}
