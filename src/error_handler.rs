//! Converting handler failures into responses.
//!
//! Runs at most once per failed request and never after the response was
//! committed: a partially written response cannot be replaced.

use std::sync::Arc;

use http::StatusCode;
use serde_json::json;
use tracing::{debug, error};

use crate::context::Context;
use crate::error::Error;
use crate::method::Method;

/// The engine-wide failure-to-response mapping.
pub type ErrorHandler = Arc<dyn Fn(&Error, &mut Context) + Send + Sync + 'static>;

/// The default Error Handler.
///
/// - committed response → nothing
/// - [`HttpError`](crate::HttpError) → its status and message
/// - anything else → `500` with the error's text
///
/// The body is `{"error": "<message>"}`; `HEAD` requests get the status only.
pub fn default_error_handler(err: &Error, c: &mut Context) {
    if c.committed() {
        debug!(error = %err, "response already committed, error not written");
        return;
    }

    let (status, message) = match err {
        Error::Http(e) => (e.status, e.message.clone()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    };

    let has_body = Method::try_from(c.method())
        .map(Method::has_response_body)
        .unwrap_or(true);

    if !has_body {
        c.set_status(status);
        return;
    }

    if let Err(e) = c.json(status, &json!({ "error": message })) {
        error!(error = %e, "failed to encode error body");
        c.set_status(status);
    }
}

pub(crate) fn default() -> ErrorHandler {
    Arc::new(default_error_handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use http_body_util::Empty;

    fn context(method: http::Method) -> Context {
        let mut c = Context::new();
        let req = http::Request::builder()
            .method(method)
            .uri("/x")
            .body(Empty::<bytes::Bytes>::new())
            .unwrap();
        c.reset(req, None);
        c
    }

    fn body(c: &mut Context) -> (StatusCode, String, Option<String>) {
        let res = c.response_mut().take();
        let ct = res
            .headers()
            .get(http::header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_owned());
        let status = res.status();
        let bytes = futures::executor::block_on(http_body_util::BodyExt::collect(res.into_body()))
            .unwrap()
            .to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap(), ct)
    }

    #[test]
    fn structured_error_becomes_json_body() {
        let mut c = context(http::Method::GET);
        default_error_handler(&HttpError::not_found("not found").into(), &mut c);

        let (status, body, ct) = body(&mut c);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"error":"not found"}"#);
        assert_eq!(ct.as_deref(), Some("application/json; charset=UTF-8"));
    }

    #[test]
    fn opaque_error_becomes_500() {
        let mut c = context(http::Method::POST);
        default_error_handler(&Error::other("database unreachable"), &mut c);

        let (status, body, _) = body(&mut c);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"database unreachable"}"#);
    }

    #[test]
    fn head_gets_status_only() {
        let mut c = context(http::Method::HEAD);
        default_error_handler(&HttpError::not_found("not found").into(), &mut c);

        let (status, body, _) = body(&mut c);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[test]
    fn committed_response_is_left_alone() {
        let mut c = context(http::Method::GET);
        c.string(StatusCode::OK, "partial").unwrap();
        default_error_handler(&Error::other("late failure"), &mut c);

        let (status, body, _) = body(&mut c);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "partial");
    }
}
