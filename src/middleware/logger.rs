//! Access logging.
//!
//! One `tracing` event per request, emitted after the inner chain finished
//! and the Error Handler had its chance to write the failure response:
//!
//! ```text
//! INFO  request status=200 method=GET path=/api/users/alice?x=1 latency="153.20 µs" size="17 B" request_id=… client_ip=10.0.0.7
//! WARN  request status=404 method=GET path=/nope latency="12.04 µs" size="21 B" …
//! ERROR request status=500 method=POST path=/orders … error="database unreachable"
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::request_id::REQUEST_ID_KEY;
use crate::middleware::Middleware;

type Skip = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Request logger.
///
/// The level follows the final status: `error` for 5xx, `warn` for 4xx,
/// `info` otherwise.
#[derive(Clone, Default)]
pub struct Logger {
    skip: Option<Skip>,
}

impl Logger {
    /// Requests for which `f` returns `true` are not logged.
    pub fn skip<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(f));
        self
    }
}

impl Middleware for Logger {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(LoggerHandler { skip: self.skip.clone(), next })
    }
}

struct LoggerHandler {
    skip: Option<Skip>,
    next: BoxedHandler,
}

impl Handler for LoggerHandler {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            if self.skip.as_ref().is_some_and(|skip| skip(&*c)) {
                return self.next.call(c).await;
            }

            let start = Instant::now();
            let path = match c.request().raw_query() {
                Some(q) => format!("{}?{q}", c.path()),
                None => c.path().to_owned(),
            };

            let res = self.next.call(c).await;

            // The status logged must be the one the client gets.
            if let Err(err) = &res {
                c.error(err);
            }

            let status = c.response().status().map_or(200, |s| s.as_u16());
            let latency = format_latency(start.elapsed());
            let size = format_size(c.response().size());
            let request_id = c.get::<String>(REQUEST_ID_KEY).map_or("-", String::as_str);
            let client_ip = c.client_ip().unwrap_or_default();
            let method = c.method().as_str();
            let failure = res.as_ref().err().map(cause);

            macro_rules! log {
                ($level:ident) => {
                    $level!(
                        status,
                        method,
                        path = %path,
                        latency = %latency,
                        size = %size,
                        request_id,
                        client_ip = %client_ip,
                        error = failure.as_deref(),
                        "request"
                    )
                };
            }

            match status {
                500.. => log!(error),
                400..=499 => log!(warn),
                _ => log!(info),
            }

            res
        })
    }
}

/// The most useful text for a failure: the wrapped cause of a structured
/// error if there is one, else the error itself.
fn cause(err: &Error) -> String {
    match err.as_http().and_then(|e| e.source.as_ref()) {
        Some(source) => source.to_string(),
        None => err.to_string(),
    }
}

/// Human-readable byte count: `512 B`, `1.50 KB`, `3.00 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

/// Human-readable duration in µs, ms or s with two decimals.
pub fn format_latency(d: Duration) -> String {
    if d >= Duration::from_secs(1) {
        format!("{:.2} s", d.as_secs_f64())
    } else if d >= Duration::from_millis(1) {
        format!("{:.2} ms", d.as_secs_f64() * 1e3)
    } else {
        format!("{:.2} µs", d.as_secs_f64() * 1e6)
    }
}
