//! Panic recovery.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error};

use crate::context::Context;
use crate::error::{Error, HttpError};
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;

/// Turns a panic in the inner chain into `HttpError(500, <panic message>)`.
///
/// Register it early (after the logger) so panics from everything inside it
/// are caught and still logged with their final status. A panic that reports
/// a broken pipe or a reset connection means the client is gone; the request
/// then ends quietly with no error.
///
/// Only unwinding panics can be caught; with `panic = "abort"` this
/// middleware is a pass-through.
///
/// The inner chain is treated as unwind safe: after a panic the context is
/// only touched by the Error Handler, which writes a fresh response.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recovery;

impl Middleware for Recovery {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(RecoveryHandler { next })
    }
}

struct RecoveryHandler {
    next: BoxedHandler,
}

impl Handler for RecoveryHandler {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(self.next.call(c)).catch_unwind().await;
            match outcome {
                Ok(res) => res,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    if is_broken_connection(&message) {
                        debug!(panic = %message, "client connection lost");
                        return Ok(());
                    }
                    error!(panic = %message, "panic recovered");
                    Err(HttpError::internal(message).into())
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(e) = payload.downcast_ref::<Error>() {
        e.to_string()
    } else {
        "unknown panic".to_owned()
    }
}

fn is_broken_connection(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("broken pipe") || message.contains("connection reset by peer")
}
