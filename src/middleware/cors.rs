//! Cross-origin resource sharing.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::Middleware;

/// CORS headers and preflight answers.
///
/// Requests without an `Origin` header, or from an origin not in the allow
/// list, pass through untouched. A preflight (`OPTIONS` from an allowed
/// origin) is answered with `204` and never reaches the inner chain.
///
/// ```rust
/// use std::time::Duration;
/// use zest::middleware::Cors;
///
/// let cors = Cors::default()
///     .allow_origins(["https://app.example.com"])
///     .allow_credentials(true)
///     .max_age(Duration::from_secs(600));
/// ```
#[derive(Clone, Debug)]
pub struct Cors {
    origins: Vec<String>,
    methods: Vec<String>,
    headers: Vec<String>,
    expose: Vec<String>,
    credentials: bool,
    max_age: Duration,
}

impl Cors {
    /// Allowed origins. `"*"` allows every origin.
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().map(|m| m.as_str().to_owned()).collect();
        self
    }

    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expose = headers.into_iter().map(Into::into).collect();
        self
    }

    /// With credentials, a `"*"` origin echoes the request origin instead.
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    /// Preflight cache lifetime. Zero omits `Access-Control-Max-Age`.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}

impl Default for Cors {
    fn default() -> Self {
        let methods = [
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Patch,
            Method::Delete,
            Method::Options,
        ];
        Self {
            origins: vec!["*".to_owned()],
            methods: methods.iter().map(|m| m.as_str().to_owned()).collect(),
            headers: ["Origin", "Content-Type", "Authorization"].map(String::from).to_vec(),
            expose: Vec::new(),
            credentials: false,
            max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Middleware for Cors {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(CorsHandler {
            origins: self.origins.clone(),
            methods: self.methods.join(", "),
            headers: self.headers.join(", "),
            expose: self.expose.join(", "),
            credentials: self.credentials,
            max_age: self.max_age.as_secs().to_string(),
            next,
        })
    }
}

/// [`Cors`] with the header values joined once, at wrap time.
struct CorsHandler {
    origins: Vec<String>,
    methods: String,
    headers: String,
    expose: String,
    credentials: bool,
    max_age: String,
    next: BoxedHandler,
}

impl CorsHandler {
    /// The `Access-Control-Allow-Origin` value for `origin`, if it is allowed.
    fn allow_origin(&self, origin: &str) -> Option<String> {
        let allowed = self.origins.iter().find(|o| *o == "*" || *o == origin)?;
        if allowed == "*" && self.credentials {
            Some(origin.to_owned())
        } else {
            Some(allowed.clone())
        }
    }
}

impl Handler for CorsHandler {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let Some(origin) = c.header("origin").filter(|o| !o.is_empty()) else {
                return self.next.call(c).await;
            };
            let Some(allow) = self.allow_origin(origin) else {
                return self.next.call(c).await;
            };

            c.set_header("Access-Control-Allow-Origin", &allow);
            c.set_header("Vary", "Origin");
            if self.credentials {
                c.set_header("Access-Control-Allow-Credentials", "true");
            }
            if !self.expose.is_empty() {
                c.set_header("Access-Control-Expose-Headers", &self.expose);
            }

            if c.method() == http::Method::OPTIONS {
                c.set_header("Access-Control-Allow-Methods", &self.methods);
                c.set_header("Access-Control-Allow-Headers", &self.headers);
                if self.max_age != "0" {
                    c.set_header("Access-Control-Max-Age", &self.max_age);
                }
                return c.no_content(StatusCode::NO_CONTENT);
            }

            self.next.call(c).await
        })
    }
}
