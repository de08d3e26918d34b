//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The route table holds handlers of *different* types in one collection, so
//! every handler is erased to `Arc<dyn Handler>`. A handler borrows the
//! pooled [`Context`] mutably for the duration of one call and returns
//! `Ok(())` or a failure for the Error Handler.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn hello(c: &mut Context) -> Result<(), Error> { … }   ← user writes this
//!        ↓ engine.get("/", hello)
//! impl Handler for hello  (via HandlerFn<'a> blanket)           ← no wrapper needed
//!        ↓  stored as BoxedHandler = Arc<dyn Handler>
//! handler.call(&mut ctx)  at request time                       ← one vtable dispatch
//!        ↓
//! Box::pin(hello(ctx))                                          ← BoxFuture<'a>
//! ```
//!
//! # Why `HandlerFn<'a>`
//!
//! The future returned by `async fn hello(c: &mut Context)` borrows `c`, so its
//! type differs for every lifetime. A plain `Fn(&mut Context) -> Fut` bound
//! cannot name that family of types; `for<'a> HandlerFn<'a>` can, because the
//! future is an associated type chosen per lifetime.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

/// A heap-allocated, type-erased future borrowing the request [`Context`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A callable that takes the request [`Context`] and returns an optional failure.
///
/// Implemented automatically for every `async fn(&mut Context) -> Result<(), Error>`.
/// Implement it by hand for handlers that carry their own state:
///
/// ```rust
/// use zest::{BoxFuture, Context, Error, Handler, StatusCode};
///
/// struct Greeting(&'static str);
///
/// impl Handler for Greeting {
///     fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
///         Box::pin(async move { c.string(StatusCode::OK, self.0) })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// Lifetime-indexed view of an async handler function.
///
/// You never implement this yourself; it exists so `async fn` items taking
/// `&mut Context` satisfy [`Handler`].
pub trait HandlerFn<'a>: Send + Sync + 'static {
    type Future: Future<Output = Result<(), Error>> + Send + 'a;

    fn invoke(&self, c: &'a mut Context) -> Self::Future;
}

impl<'a, F, Fut> HandlerFn<'a> for F
where
    F: Fn(&'a mut Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'a,
{
    type Future = Fut;

    fn invoke(&self, c: &'a mut Context) -> Fut {
        (self)(c)
    }
}

impl<F> Handler for F
where
    F: for<'a> HandlerFn<'a>,
{
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(self.invoke(c))
    }
}

pub(crate) fn boxed(handler: impl Handler) -> BoxedHandler {
    Arc::new(handler)
}
