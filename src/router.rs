//! Route table.
//!
//! One route list per HTTP method. Patterns are split into literal, capture,
//! and trailing-wildcard segments at registration; a request path is matched
//! against every route registered for its method and the most specific match
//! wins, never simply the first one registered.
//!
//! Specificity is decided position by position: a literal beats a `{name}`
//! capture, which beats a `{name...}` wildcard.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::middleware::{compose, BoxedMiddleware};

/// Path parameters captured while resolving a request, in pattern order.
pub type Params = Vec<(String, String)>;

/// Why a pattern could not be registered.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("wildcard `{{{name}...}}` must be the last segment of `{pattern}`")]
    WildcardNotLast { pattern: String, name: String },

    #[error("empty or invalid capture name in segment `{segment}` of `{pattern}`")]
    InvalidCapture { pattern: String, segment: String },

    #[error("capture `{name}` appears more than once in `{pattern}`")]
    DuplicateCapture { pattern: String, name: String },

    #[error("segment `{segment}` of `{pattern}` mixes literal text and braces")]
    InvalidSegment { pattern: String, segment: String },

    #[error("route {method} {pattern} conflicts with already registered {existing}")]
    Duplicate { method: Method, pattern: String, existing: String },
}

// ── Pattern ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

impl Segment {
    /// Lower is more specific.
    fn rank(&self) -> u8 {
        match self {
            Self::Literal(_) => 0,
            Self::Param(_) => 1,
            Self::Wildcard(_) => 2,
        }
    }
}

/// A parsed route pattern such as `/users/{id}` or `/assets/{path...}`.
#[derive(Clone, Debug)]
pub struct Pattern {
    raw: Arc<str>,
    segments: Vec<Segment>,
    ranks: Vec<u8>,
}

impl Pattern {
    /// Parses `raw`, rejecting wildcards that are not the final segment.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(RouteError::MissingLeadingSlash(raw.to_owned()));
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, part) in parts.iter().enumerate() {
            let segment = match capture_name(part) {
                Some(inner) => {
                    let (name, wildcard) = match inner.strip_suffix("...") {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if !is_valid_name(name) {
                        return Err(RouteError::InvalidCapture {
                            pattern: raw.to_owned(),
                            segment: (*part).to_owned(),
                        });
                    }
                    if names.contains(&name) {
                        return Err(RouteError::DuplicateCapture {
                            pattern: raw.to_owned(),
                            name: name.to_owned(),
                        });
                    }
                    names.push(name);
                    if wildcard {
                        if i + 1 != parts.len() {
                            return Err(RouteError::WildcardNotLast {
                                pattern: raw.to_owned(),
                                name: name.to_owned(),
                            });
                        }
                        Segment::Wildcard(name.to_owned())
                    } else {
                        Segment::Param(name.to_owned())
                    }
                }
                None if part.contains(['{', '}']) => {
                    return Err(RouteError::InvalidSegment {
                        pattern: raw.to_owned(),
                        segment: (*part).to_owned(),
                    });
                }
                None => Segment::Literal((*part).to_owned()),
            };
            segments.push(segment);
        }

        let ranks = segments.iter().map(Segment::rank).collect();
        Ok(Self { raw: Arc::from(raw), segments, ranks })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn shared(&self) -> Arc<str> {
        Arc::clone(&self.raw)
    }

    /// Two patterns with the same shape match exactly the same paths.
    fn same_shape(&self, other: &Pattern) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| match (a, b) {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                _ => a.rank() == b.rank(),
            })
    }

    fn matches(&self, path: &[Cow<'_, str>]) -> bool {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if path.get(i).map(|s| s.as_ref()) != Some(lit.as_str()) {
                        return false;
                    }
                }
                Segment::Param(_) => {
                    if path.get(i).is_none_or(|s| s.is_empty()) {
                        return false;
                    }
                }
                Segment::Wildcard(_) => return path.len() > i,
            }
        }
        path.len() == self.segments.len()
    }

    fn captures(&self, path: &[Cow<'_, str>]) -> Params {
        let mut params = Params::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(_) => {}
                Segment::Param(name) => {
                    params.push((name.clone(), path[i].clone().into_owned()));
                }
                Segment::Wildcard(name) => {
                    params.push((name.clone(), path[i..].join("/")));
                }
            }
        }
        params
    }
}

fn capture_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['{', '}', '.'])
}

/// Splits a request path into percent-decoded segments.
///
/// Returns `None` for request targets that are not absolute paths (e.g. `*`).
fn split_path(path: &str) -> Option<Vec<Cow<'_, str>>> {
    let rest = path.strip_prefix('/')?;
    Some(
        rest.split('/')
            .map(|s| urlencoding::decode(s).unwrap_or(Cow::Borrowed(s)))
            .collect(),
    )
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// A registered `(method, pattern)` binding. Immutable once registered.
pub struct Route {
    method: Method,
    pattern: Pattern,
    handler: BoxedHandler,
    middleware: Vec<BoxedMiddleware>,
    endpoint: BoxedHandler,
}

impl Route {
    fn new(
        method: Method,
        pattern: Pattern,
        handler: BoxedHandler,
        middleware: Vec<BoxedMiddleware>,
    ) -> Self {
        let endpoint = compose(Arc::clone(&handler), &middleware);
        Self { method, pattern, handler, middleware, endpoint }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The terminal handler, without any middleware.
    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Group and route middleware, outermost first.
    pub fn middleware(&self) -> &[BoxedMiddleware] {
        &self.middleware
    }

    /// The terminal handler wrapped by [`Route::middleware`].
    pub fn endpoint(&self) -> &BoxedHandler {
        &self.endpoint
    }
}

/// A successful lookup: the winning route and its captured parameters.
pub struct Resolved<'r> {
    pub route: &'r Route,
    pub params: Params,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The route table.
///
/// Build it once at startup; lookups take `&self` and are safe to run from
/// any number of concurrent requests.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers `handler` under `method` + `pattern`, wrapped by `middleware`.
    ///
    /// Fails on malformed patterns and on a pattern whose shape is already
    /// registered for the same method (`/users/{id}` and `/users/{name}` are
    /// the same route).
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
        middleware: Vec<BoxedMiddleware>,
    ) -> Result<(), RouteError> {
        let pattern = Pattern::parse(pattern)?;
        let routes = self.routes.entry(method).or_default();

        if let Some(existing) = routes.iter().find(|r| r.pattern.same_shape(&pattern)) {
            return Err(RouteError::Duplicate {
                method,
                pattern: pattern.as_str().to_owned(),
                existing: existing.pattern.as_str().to_owned(),
            });
        }

        routes.push(Route::new(method, pattern, handler, middleware));
        Ok(())
    }

    /// Finds the most specific route for `method` + `path`.
    ///
    /// `HEAD` falls back to the `GET` routes when no `HEAD` route matches.
    pub fn resolve<'r>(&'r self, method: &http::Method, path: &str) -> Option<Resolved<'r>> {
        let method = Method::try_from(method).ok()?;
        let segments = split_path(path)?;

        let route = self.best_match(method, &segments).or_else(|| match method {
            Method::Head => self.best_match(Method::Get, &segments),
            _ => None,
        })?;

        Some(Resolved { route, params: route.pattern.captures(&segments) })
    }

    fn best_match(&self, method: Method, segments: &[Cow<'_, str>]) -> Option<&Route> {
        self.routes
            .get(&method)?
            .iter()
            .filter(|r| r.pattern.matches(segments))
            .min_by(|a, b| a.pattern.ranks.cmp(&b.pattern.ranks))
    }

    /// Number of registered routes across all methods.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::Error;
    use crate::handler;

    async fn noop(_: &mut Context) -> Result<(), Error> {
        Ok(())
    }

    fn router(routes: &[(Method, &str)]) -> Router {
        let mut router = Router::new();
        for (method, pattern) in routes {
            router
                .register(*method, pattern, handler::boxed(noop), Vec::new())
                .unwrap();
        }
        router
    }

    fn resolve<'r>(router: &'r Router, method: http::Method, path: &str) -> Option<Resolved<'r>> {
        router.resolve(&method, path)
    }

    #[test]
    fn literal_beats_capture_regardless_of_order() {
        let router = router(&[
            (Method::Get, "/users/{id}"),
            (Method::Get, "/users/me"),
        ]);

        let hit = resolve(&router, http::Method::GET, "/users/me").unwrap();
        assert_eq!(hit.route.pattern().as_str(), "/users/me");
        assert!(hit.params.is_empty());

        let hit = resolve(&router, http::Method::GET, "/users/42").unwrap();
        assert_eq!(hit.route.pattern().as_str(), "/users/{id}");
        assert_eq!(hit.params, vec![("id".to_owned(), "42".to_owned())]);
    }

    #[test]
    fn literal_beats_wildcard() {
        let router = router(&[
            (Method::Get, "/assets/{path...}"),
            (Method::Get, "/assets/logo.png"),
        ]);

        let hit = resolve(&router, http::Method::GET, "/assets/logo.png").unwrap();
        assert_eq!(hit.route.pattern().as_str(), "/assets/logo.png");

        let hit = resolve(&router, http::Method::GET, "/assets/css/a.css").unwrap();
        assert_eq!(hit.route.pattern().as_str(), "/assets/{path...}");
        assert_eq!(hit.params, vec![("path".to_owned(), "css/a.css".to_owned())]);
    }

    #[test]
    fn capture_beats_wildcard() {
        let router = router(&[
            (Method::Get, "/files/{rest...}"),
            (Method::Get, "/files/{name}"),
        ]);

        let hit = resolve(&router, http::Method::GET, "/files/a.txt").unwrap();
        assert_eq!(hit.route.pattern().as_str(), "/files/{name}");

        let hit = resolve(&router, http::Method::GET, "/files/dir/a.txt").unwrap();
        assert_eq!(hit.route.pattern().as_str(), "/files/{rest...}");
    }

    #[test]
    fn earlier_literal_position_decides() {
        let router = router(&[
            (Method::Get, "/{org}/settings"),
            (Method::Get, "/admin/{page}"),
        ]);

        let hit = resolve(&router, http::Method::GET, "/admin/settings").unwrap();
        assert_eq!(hit.route.pattern().as_str(), "/admin/{page}");
    }

    #[test]
    fn wildcard_requires_a_trailing_position() {
        let router = router(&[(Method::Get, "/assets/{path...}")]);

        assert!(resolve(&router, http::Method::GET, "/assets").is_none());
        let hit = resolve(&router, http::Method::GET, "/assets/").unwrap();
        assert_eq!(hit.params, vec![("path".to_owned(), String::new())]);
    }

    #[test]
    fn captures_never_match_empty_segments() {
        let router = router(&[(Method::Get, "/users/{name}")]);

        assert!(resolve(&router, http::Method::GET, "/users/").is_none());
        assert!(resolve(&router, http::Method::GET, "/users/alice/").is_none());
        let hit = resolve(&router, http::Method::GET, "/users/alice").unwrap();
        assert_eq!(hit.params, vec![("name".to_owned(), "alice".to_owned())]);
    }

    #[test]
    fn captured_values_are_percent_decoded() {
        let router = router(&[(Method::Get, "/tags/{tag}")]);
        let hit = resolve(&router, http::Method::GET, "/tags/hello%20world").unwrap();
        assert_eq!(hit.params[0].1, "hello world");
    }

    #[test]
    fn methods_are_separate_and_head_falls_back_to_get() {
        let router = router(&[(Method::Get, "/"), (Method::Post, "/items")]);

        assert!(resolve(&router, http::Method::GET, "/").is_some());
        assert!(resolve(&router, http::Method::HEAD, "/").is_some());
        assert!(resolve(&router, http::Method::GET, "/items").is_none());
        assert!(resolve(&router, http::Method::POST, "/items").is_some());
        assert!(resolve(&router, http::Method::DELETE, "/items").is_none());
    }

    #[test]
    fn rejects_malformed_patterns() {
        let mut router = Router::new();
        let mut add = |p: &str| router.register(Method::Get, p, handler::boxed(noop), Vec::new());

        assert!(matches!(add("users"), Err(RouteError::MissingLeadingSlash(_))));
        assert!(matches!(add("/a/{rest...}/b"), Err(RouteError::WildcardNotLast { .. })));
        assert!(matches!(add("/a/{}"), Err(RouteError::InvalidCapture { .. })));
        assert!(matches!(add("/a/{x}/{x}"), Err(RouteError::DuplicateCapture { .. })));
        assert!(matches!(add("/a/pre{x}"), Err(RouteError::InvalidSegment { .. })));
    }

    #[test]
    fn rejects_duplicate_shapes() {
        let mut router = router(&[(Method::Get, "/users/{id}")]);

        let err = router
            .register(Method::Get, "/users/{name}", handler::boxed(noop), Vec::new())
            .unwrap_err();
        assert!(matches!(err, RouteError::Duplicate { .. }));

        router
            .register(Method::Delete, "/users/{id}", handler::boxed(noop), Vec::new())
            .unwrap();
        assert_eq!(router.len(), 2);
    }
}
