//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection, panic
//! recovery, CORS, authentication, and static files.
//!
//! A middleware is a decorator: it receives the next handler and returns a new
//! handler that wraps it. [`compose`] folds a list of them around a terminal
//! handler so that the first one in the list is the outermost wrapper:
//!
//! ```text
//! compose(H, [A, B])  ==  A(B(H))
//!
//! A-before → B-before → H → B-after → A-after
//! ```
//!
//! Registration order decides nesting everywhere in the engine: global
//! middleware wraps group middleware, which wraps route middleware, which
//! wraps the handler.
//!
//! Most middleware is easiest to write as an `async fn` and lift with
//! [`from_fn`]:
//!
//! ```rust
//! use zest::{Context, Error};
//! use zest::middleware::{from_fn, Next};
//!
//! async fn powered_by(c: &mut Context, next: Next) -> Result<(), Error> {
//!     c.set_header("x-powered-by", "zest");
//!     next.run(c).await
//! }
//!
//! let mut app = zest::Engine::new();
//! app.use_middleware(from_fn(powered_by));
//! ```

mod cors;
mod jwt;
mod logger;
mod recovery;
mod request_id;
mod static_files;

use std::future::Future;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};

pub use cors::Cors;
pub use jwt::{Claims, Jwt, TokenParser};
pub use logger::{format_latency, format_size, Logger};
pub use recovery::Recovery;
pub use request_id::{RequestId, REQUEST_ID_KEY};
pub use static_files::Static;

/// A handler decorator.
pub trait Middleware: Send + Sync + 'static {
    /// Returns a handler that runs around `next`.
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// A type-erased middleware shared by every route that uses it.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Wraps `handler` so that `middleware[0]` is outermost and the last entry is
/// closest to the handler.
pub fn compose(handler: BoxedHandler, middleware: &[BoxedMiddleware]) -> BoxedHandler {
    middleware
        .iter()
        .rev()
        .fold(handler, |next, m| m.wrap(next))
}

/// Converts middleware values into the shared form the engine stores.
pub trait IntoMiddleware {
    fn into_middleware(self) -> BoxedMiddleware;
}

impl<M: Middleware> IntoMiddleware for M {
    fn into_middleware(self) -> BoxedMiddleware {
        Arc::new(self)
    }
}

impl IntoMiddleware for BoxedMiddleware {
    fn into_middleware(self) -> BoxedMiddleware {
        self
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of the chain, handed to [`from_fn`] middleware.
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    /// Runs the inner chain against `c`.
    pub async fn run(self, c: &mut Context) -> Result<(), Error> {
        self.inner.call(c).await
    }
}

// ── from_fn ───────────────────────────────────────────────────────────────────

/// Lifetime-indexed view of an async middleware function; see
/// [`HandlerFn`](crate::HandlerFn) for why this exists.
pub trait MiddlewareFn<'a>: Send + Sync + 'static {
    type Future: Future<Output = Result<(), Error>> + Send + 'a;

    fn invoke(&self, c: &'a mut Context, next: Next) -> Self::Future;
}

impl<'a, F, Fut> MiddlewareFn<'a> for F
where
    F: Fn(&'a mut Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'a,
{
    type Future = Fut;

    fn invoke(&self, c: &'a mut Context, next: Next) -> Fut {
        (self)(c, next)
    }
}

/// Turns `async fn(&mut Context, Next) -> Result<(), Error>` into a [`Middleware`].
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> MiddlewareFn<'a>,
{
    FromFn { f: Arc::new(f) }
}

/// Middleware built by [`from_fn`].
pub struct FromFn<F> {
    f: Arc<F>,
}

impl<F> Middleware for FromFn<F>
where
    F: for<'a> MiddlewareFn<'a>,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(FromFnHandler { f: Arc::clone(&self.f), next })
    }
}

struct FromFnHandler<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F> Handler for FromFnHandler<F>
where
    F: for<'a> MiddlewareFn<'a>,
{
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        let next = Next { inner: Arc::clone(&self.next) };
        Box::pin(self.f.invoke(c, next))
    }
}
