//! Bearer-token authentication.
//!
//! Token verification is pluggable through [`TokenParser`]; this module only
//! handles the `Authorization: Bearer <token>` framing and claim publishing.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{BoxError, Error, HttpError};
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;

/// Claims extracted from a verified token.
pub type Claims = Map<String, Value>;

/// Verifies a raw token and returns its claims.
///
/// The error's text becomes the message of the `401` response, so it should
/// be safe to show to clients.
pub trait TokenParser: Send + Sync + 'static {
    fn parse(&self, token: &str) -> Result<Claims, BoxError>;
}

impl<F> TokenParser for F
where
    F: Fn(&str) -> Result<Claims, BoxError> + Send + Sync + 'static,
{
    fn parse(&self, token: &str) -> Result<Claims, BoxError> {
        self(token)
    }
}

type Skip = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Rejects requests without a valid bearer token with `401`.
///
/// Every claim is published in the store as a [`serde_json::Value`] under its
/// claim name:
///
/// ```rust
/// use zest::{Context, Error};
///
/// async fn me(c: &mut Context) -> Result<(), Error> {
///     let sub = c.get::<serde_json::Value>("sub").cloned();
///     c.json(zest::StatusCode::OK, &sub)
/// }
/// ```
#[derive(Clone)]
pub struct Jwt {
    parser: Arc<dyn TokenParser>,
    skip: Option<Skip>,
}

impl Jwt {
    pub fn new(parser: impl TokenParser) -> Self {
        Self { parser: Arc::new(parser), skip: None }
    }

    /// Requests for which `f` returns `true` are not authenticated.
    pub fn skip<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(f));
        self
    }
}

impl Middleware for Jwt {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(JwtHandler { config: self.clone(), next })
    }
}

struct JwtHandler {
    config: Jwt,
    next: BoxedHandler,
}

impl JwtHandler {
    fn authenticate(&self, c: &Context) -> Result<Claims, Error> {
        let header = c
            .header("authorization")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HttpError::unauthorized("missing token"))?;

        let token = match header.split_once(' ') {
            Some(("Bearer", token)) => token,
            _ => return Err(HttpError::unauthorized("invalid token format").into()),
        };

        self.config
            .parser
            .parse(token)
            .map_err(|e| HttpError::unauthorized(e.to_string()).into())
    }
}

impl Handler for JwtHandler {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let skipped = self.config.skip.as_ref().is_some_and(|skip| skip(&*c));
            if !skipped {
                for (key, value) in self.authenticate(c)? {
                    c.set(key, value);
                }
            }
            self.next.call(c).await
        })
    }
}
